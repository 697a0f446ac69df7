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

//! Partitions a grid into a safe sub-rectangle and checks that results are
//! exact inside it and (almost always) wrong outside it.

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

use systolic::{matmul_invocation, AcceleratorConfig, DataType, Dataflow, FaultProperties};

pub struct RegionReport {
    pub safe_wrong: usize,
    pub corrupted_wrong: usize,
    pub corrupted_total: usize,
}

/// Runs a dense GRID x GRID integer matmul on a grid with an explicit
/// `safe_rows` x `safe_cols` region and classifies each output element.
pub fn classify_outputs(safe_rows: usize, safe_cols: usize, seed: u64) -> RegionReport {
    const GRID: usize = 4;
    let config = AcceleratorConfig {
        name: "regions".to_string(),
        pe_array_rows: GRID,
        pe_array_cols: GRID,
        data_type: DataType::Int32,
        fault_injection: true,
    };
    let faults = FaultProperties {
        rng: Box::new(Xoshiro256StarStar::seed_from_u64(seed)),
        ..Default::default()
    };
    let mut grid =
        Dataflow::<i32>::with_safe_region(&config, faults, safe_rows, safe_cols).unwrap();

    // Values chosen so every output element is distinct.
    let a: Vec<Vec<f64>> = (0..GRID)
        .map(|r| (0..GRID).map(|k| (r * GRID + k + 1) as f64).collect())
        .collect();
    let b: Vec<Vec<f64>> = (0..GRID)
        .map(|k| (0..GRID).map(|c| (k * GRID + c + 1) as f64).collect())
        .collect();
    let spec = matmul_invocation(&a, &b, GRID, GRID).unwrap();
    grid.begin_invocation(spec.lower()).unwrap();

    let mut cycle = 0;
    while !grid.is_done() {
        assert!(cycle < 1000, "invocation did not finish");
        grid.evaluate(cycle);
        cycle += 1;
    }

    let mut report = RegionReport {
        safe_wrong: 0,
        corrupted_wrong: 0,
        corrupted_total: 0,
    };
    for r in 0..GRID {
        for rec in grid.row_results(r) {
            let expected: i32 = (0..GRID)
                .map(|k| a[r][k] as i32 * b[k][rec.col] as i32)
                .sum();
            let wrong = rec.value != expected;
            if grid.is_safe(r, rec.col) {
                report.safe_wrong += wrong as usize;
            } else {
                report.corrupted_total += 1;
                report.corrupted_wrong += wrong as usize;
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::classify_outputs;

    #[test]
    fn safe_region_results_are_exact() {
        for seed in 0..8 {
            let report = classify_outputs(2, 2, seed);
            assert_eq!(report.safe_wrong, 0);
            assert_eq!(report.corrupted_total, 12);
        }
    }

    #[test]
    fn corrupted_region_results_are_wrong() {
        // At the default 0.8 rate a four-step window survives untouched
        // with probability 0.2^8; twelve corrupted elements over eight
        // seeds make a clean sweep astronomically unlikely.
        let wrong: usize = (0..8)
            .map(|seed| classify_outputs(2, 2, seed).corrupted_wrong)
            .sum();
        assert!(wrong >= 94, "only {} of 96 corrupted elements wrong", wrong);
    }

    #[test]
    fn fully_safe_grid_is_exact_everywhere() {
        let report = classify_outputs(4, 4, 0);
        assert_eq!(report.safe_wrong, 0);
        assert_eq!(report.corrupted_total, 0);
    }
}
