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

use crate::operand_corruption::measure_wrong_product_fraction;
use crate::safe_region::classify_outputs;

mod operand_corruption;
mod safe_region;

fn main() {
    env_logger::init();

    for &rate in &[0.0, 0.25, 0.5, 0.8, 1.0] {
        let measured = measure_wrong_product_fraction(rate, 2000);
        let expected = 1.0 - (1.0 - rate) * (1.0 - rate);
        log::info!(
            "rate {:.2}: wrong product fraction {:.4} (analytic {:.4})",
            rate,
            measured,
            expected
        );
    }

    let report = classify_outputs(2, 2, 1);
    log::info!(
        "2x2 safe region on a 4x4 grid: {} safe elements wrong, {}/{} corrupted elements wrong",
        report.safe_wrong,
        report.corrupted_wrong,
        report.corrupted_total
    );
}
