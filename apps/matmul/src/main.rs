// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Runs a matrix product through the systolic array model and prints the
//! result next to a plain host-side reference, together with the cycle
//! count. With `--fault-injection` the array gets a randomly drawn safe
//! region and the two results usually disagree.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use structopt::StructOpt;

use systolic::{
    matmul_invocation, Accelerator, AcceleratorConfig, DataType, FaultProperties,
};

#[derive(StructOpt)]
#[structopt(name = "matmul", about = "Matrix multiply on a systolic array model")]
struct Arguments {
    /// Rows of the left operand.
    #[structopt(short, long, default_value = "4")]
    m: usize,
    /// Inner dimension.
    #[structopt(short, long, default_value = "4")]
    k: usize,
    /// Columns of the right operand.
    #[structopt(short, long, default_value = "4")]
    n: usize,
    #[structopt(long, default_value = "8")]
    pe_array_rows: usize,
    #[structopt(long, default_value = "8")]
    pe_array_cols: usize,
    /// supported types: int32, int64, float16, float32, float64
    #[structopt(short, long, default_value = "int32")]
    data_type: DataType,
    #[structopt(long)]
    fault_injection: bool,
    /// Seed for the operand matrices and the fault model.
    #[structopt(short, long, default_value = "1")]
    seed: u64,
    #[structopt(long, default_value = "100000")]
    max_cycles: usize,
}

fn random_matrix(rng: &mut Xoshiro256StarStar, rows: usize, cols: usize) -> Vec<Vec<f64>> {
    (0..rows)
        .map(|_| (0..cols).map(|_| rng.gen_range(-8..8) as f64).collect())
        .collect()
}

fn reference_product(a: &[Vec<f64>], b: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let (m, k, n) = (a.len(), b.len(), b[0].len());
    let mut out = vec![vec![0.0; n]; m];
    for r in 0..m {
        for c in 0..n {
            out[r][c] = (0..k).map(|i| a[r][i] * b[i][c]).sum();
        }
    }
    out
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Arguments::from_args();

    let mut rng = Xoshiro256StarStar::seed_from_u64(args.seed);
    let a = random_matrix(&mut rng, args.m, args.k);
    let b = random_matrix(&mut rng, args.k, args.n);
    log::debug!("operand a: {:?}", a);
    log::debug!("operand b: {:?}", b);

    let config = AcceleratorConfig {
        name: "matmul".to_string(),
        pe_array_rows: args.pe_array_rows,
        pe_array_cols: args.pe_array_cols,
        data_type: args.data_type,
        fault_injection: args.fault_injection,
    };
    let faults = FaultProperties {
        rng: Box::new(Xoshiro256StarStar::seed_from_u64(args.seed)),
        ..Default::default()
    };
    let mut accel = Accelerator::new(&config, faults)?;
    let (safe_rows, safe_cols) = accel.safe_region();

    let spec = matmul_invocation(&a, &b, args.pe_array_rows, args.pe_array_cols)?;
    accel.start(&spec)?;
    let cycles = accel.run_to_completion(args.max_cycles)?;

    let mut produced = vec![vec![0.0; args.n]; args.m];
    for r in accel.results() {
        produced[r.row][r.col] = r.value;
    }
    let expected = reference_product(&a, &b);

    println!(
        "{}x{} array ({}), safe region {}x{}, {} cycles",
        args.pe_array_rows, args.pe_array_cols, args.data_type, safe_rows, safe_cols, cycles
    );
    let mut mismatches = 0;
    for r in 0..args.m {
        for c in 0..args.n {
            if produced[r][c] != expected[r][c] {
                mismatches += 1;
            }
        }
        println!("  {:?}", produced[r]);
    }
    if mismatches == 0 {
        println!("result matches the host reference");
    } else {
        println!(
            "{} of {} elements differ from the host reference",
            mismatches,
            args.m * args.n
        );
    }
    Ok(())
}
