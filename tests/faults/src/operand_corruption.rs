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

//! Measures how often a corrupted PE produces a wrong product and checks
//! the fraction against the analytic rate.

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

use systolic::{
    AcceleratorConfig, DataType, Dataflow, FaultProperties, Invocation, PixelData, TensorIndices,
    WeightShape,
};

const ACTIVATION: i32 = 3;
const WEIGHT: i32 = 4;

/// Streams `trials` independent single-element windows through a fully
/// corrupted 1x1 grid and returns the fraction of wrong products.
pub fn measure_wrong_product_fraction(rate: f64, trials: usize) -> f64 {
    let config = AcceleratorConfig {
        name: "corrupt".to_string(),
        pe_array_rows: 1,
        pe_array_cols: 1,
        data_type: DataType::Int32,
        fault_injection: true,
    };
    let faults = FaultProperties {
        operand_corruption_rate: rate,
        rng: Box::new(Xoshiro256StarStar::seed_from_u64(0x5EED)),
    };
    // Safe region 0x0: the single PE runs the corrupted MACC every cycle.
    let mut grid = Dataflow::<i32>::with_safe_region(&config, faults, 0, 0).unwrap();

    let invocation = Invocation {
        input_streams: vec![(0..trials)
            .map(|t| PixelData::element(ACTIVATION, TensorIndices::new(0, 0, t, 0)))
            .collect()],
        weight_streams: vec![(0..trials)
            .map(|_| PixelData::element(WEIGHT, TensorIndices::default()))
            .collect()],
        window: WeightShape::new(1, 1, 1),
        expected_outputs: vec![trials],
    };
    grid.begin_invocation(invocation).unwrap();

    let mut cycle = 0;
    while !grid.is_done() {
        assert!(cycle < 4 * trials + 100, "invocation did not finish");
        grid.evaluate(cycle);
        cycle += 1;
    }

    let results = grid.row_results(0);
    assert_eq!(results.len(), trials);
    let wrong = results
        .iter()
        .filter(|r| r.value != ACTIVATION * WEIGHT)
        .count();
    wrong as f64 / trials as f64
}

#[cfg(test)]
mod tests {
    use super::measure_wrong_product_fraction;

    // A product is wrong when at least one of the two multiplicands was
    // substituted (a substituted operand reproducing the original value is
    // a ~1e-5 event), so the expected wrong fraction is 1 - (1 - rate)^2.
    #[test]
    fn wrong_fraction_tracks_the_analytic_rate() {
        for &rate in &[0.25, 0.5, 0.8] {
            let expected = 1.0 - (1.0 - rate) * (1.0 - rate);
            let measured = measure_wrong_product_fraction(rate, 2000);
            assert!(
                (measured - expected).abs() < 0.03,
                "rate {}: measured {}, expected {}",
                rate,
                measured,
                expected
            );
        }
    }

    #[test]
    fn zero_rate_never_corrupts() {
        assert_eq!(measure_wrong_product_fraction(0.0, 500), 0.0);
    }
}
