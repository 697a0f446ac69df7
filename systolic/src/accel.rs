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

use half::f16;

use crate::config::{AcceleratorConfig, DataType};
use crate::dataflow::{Dataflow, FaultProperties, State};
use crate::datatypes::MaccElem;
use crate::error::Error;
use crate::register::TensorIndices;
use crate::stream::InvocationSpec;
use crate::Cycle;

/// One output element widened back to f64, tagged with the PE that
/// produced it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CommitValue {
    pub row: usize,
    pub col: usize,
    pub indices: TensorIndices,
    pub value: f64,
}

/// The grid monomorphized for the configured element kind. The variant is
/// chosen once at construction; every subsequent call dispatches through a
/// match with no per-element branching inside the hot loop.
pub enum AcceleratorCore {
    Int32(Dataflow<i32>),
    Int64(Dataflow<i64>),
    Float16(Dataflow<f16>),
    Float32(Dataflow<f32>),
    Float64(Dataflow<f64>),
}

macro_rules! for_each_core {
    ($self:expr, $df:ident => $body:expr) => {
        match $self {
            AcceleratorCore::Int32($df) => $body,
            AcceleratorCore::Int64($df) => $body,
            AcceleratorCore::Float16($df) => $body,
            AcceleratorCore::Float32($df) => $body,
            AcceleratorCore::Float64($df) => $body,
        }
    };
}

impl AcceleratorCore {
    pub fn new(config: &AcceleratorConfig, faults: FaultProperties) -> Result<Self, Error> {
        Ok(match config.data_type {
            DataType::Int32 => Self::Int32(Dataflow::new(config, faults)?),
            DataType::Int64 => Self::Int64(Dataflow::new(config, faults)?),
            DataType::Float16 => Self::Float16(Dataflow::new(config, faults)?),
            DataType::Float32 => Self::Float32(Dataflow::new(config, faults)?),
            DataType::Float64 => Self::Float64(Dataflow::new(config, faults)?),
        })
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Self::Int32(_) => DataType::Int32,
            Self::Int64(_) => DataType::Int64,
            Self::Float16(_) => DataType::Float16,
            Self::Float32(_) => DataType::Float32,
            Self::Float64(_) => DataType::Float64,
        }
    }

    pub fn begin_invocation(&mut self, spec: &InvocationSpec) -> Result<(), Error> {
        for_each_core!(self, df => df.begin_invocation(spec.lower()))
    }

    pub fn evaluate(&mut self, cycle: Cycle) {
        for_each_core!(self, df => df.evaluate(cycle))
    }

    pub fn state(&self) -> State {
        for_each_core!(self, df => df.state())
    }

    pub fn is_done(&self) -> bool {
        for_each_core!(self, df => df.is_done())
    }

    pub fn rows(&self) -> usize {
        for_each_core!(self, df => df.rows())
    }

    pub fn cols(&self) -> usize {
        for_each_core!(self, df => df.cols())
    }

    pub fn safe_region(&self) -> (usize, usize) {
        for_each_core!(self, df => df.safe_region())
    }

    /// All elements committed so far, widened to f64, in row order and
    /// drain order within a row.
    pub fn results(&self) -> Vec<CommitValue> {
        fn collect<T: MaccElem>(df: &Dataflow<T>) -> Vec<CommitValue> {
            (0..df.rows())
                .flat_map(|row| {
                    df.row_results(row).iter().map(move |rec| CommitValue {
                        row,
                        col: rec.col,
                        indices: rec.indices,
                        value: rec.value.to_f64(),
                    })
                })
                .collect()
        }
        for_each_core!(self, df => collect(df))
    }
}

/// Top level of the model: a named core plus the clock.
pub struct Accelerator {
    name: String,
    core: AcceleratorCore,
    cycles: Cycle,
}

impl Accelerator {
    pub fn new(config: &AcceleratorConfig, faults: FaultProperties) -> Result<Self, Error> {
        Ok(Self {
            name: config.name.clone(),
            core: AcceleratorCore::new(config, faults)?,
            cycles: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.core.data_type()
    }

    pub fn cycles(&self) -> Cycle {
        self.cycles
    }

    pub fn state(&self) -> State {
        self.core.state()
    }

    pub fn is_done(&self) -> bool {
        self.core.is_done()
    }

    pub fn safe_region(&self) -> (usize, usize) {
        self.core.safe_region()
    }

    pub fn results(&self) -> Vec<CommitValue> {
        self.core.results()
    }

    pub fn start(&mut self, spec: &InvocationSpec) -> Result<(), Error> {
        log::info!("{}: starting invocation at cycle {}", self.name, self.cycles);
        self.core.begin_invocation(spec)
    }

    /// One clock edge.
    pub fn tick(&mut self) {
        self.core.evaluate(self.cycles);
        self.cycles += 1;
    }

    /// Clocks the model until the current invocation drains, or fails if it
    /// has not finished after `max_cycles` additional ticks.
    pub fn run_to_completion(&mut self, max_cycles: Cycle) -> Result<Cycle, Error> {
        let deadline = self.cycles + max_cycles;
        while !self.core.is_done() {
            if self.cycles >= deadline {
                return Err(Error::CycleLimitExceeded(max_cycles));
            }
            self.tick();
        }
        log::info!(
            "{}: invocation finished at cycle {}",
            self.name,
            self.cycles
        );
        Ok(self.cycles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::matmul_invocation;
    use float_cmp::assert_approx_eq;

    fn config(data_type: DataType) -> AcceleratorConfig {
        AcceleratorConfig {
            name: "test".to_string(),
            pe_array_rows: 4,
            pe_array_cols: 4,
            data_type,
            fault_injection: false,
        }
    }

    fn product(results: &[CommitValue], rows: usize, cols: usize) -> Vec<Vec<f64>> {
        let mut out = vec![vec![0.0; cols]; rows];
        for r in results {
            out[r.row][r.col] = r.value;
        }
        out
    }

    #[test]
    fn int32_matmul_end_to_end() {
        let a = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let b = vec![vec![5.0, 6.0], vec![7.0, 8.0]];
        let spec = matmul_invocation(&a, &b, 4, 4).unwrap();
        let mut accel =
            Accelerator::new(&config(DataType::Int32), FaultProperties::default()).unwrap();
        accel.start(&spec).unwrap();
        accel.run_to_completion(200).unwrap();

        let results = accel.results();
        assert_eq!(results.len(), 4);
        let p = product(&results, 2, 2);
        assert_eq!(p, vec![vec![19.0, 22.0], vec![43.0, 50.0]]);
        assert_eq!(accel.state(), State::Idle);
    }

    #[test]
    fn float16_matmul_widens_internally() {
        // Products that fit f32 but would lose bits in a chain of f16
        // roundings compute exactly because each step rounds only once.
        let a = vec![vec![0.5, 0.25]];
        let b = vec![vec![2.0], vec![4.0]];
        let spec = matmul_invocation(&a, &b, 4, 4).unwrap();
        let mut accel =
            Accelerator::new(&config(DataType::Float16), FaultProperties::default()).unwrap();
        accel.start(&spec).unwrap();
        accel.run_to_completion(200).unwrap();
        let results = accel.results();
        assert_eq!(results.len(), 1);
        assert_approx_eq!(f64, results[0].value, 2.0);
    }

    #[test]
    fn float64_matmul_is_exact() {
        let a = vec![vec![1.5, -2.5, 3.0]];
        let b = vec![vec![2.0], vec![1.0], vec![-1.0]];
        let spec = matmul_invocation(&a, &b, 4, 4).unwrap();
        let mut accel =
            Accelerator::new(&config(DataType::Float64), FaultProperties::default()).unwrap();
        accel.start(&spec).unwrap();
        accel.run_to_completion(200).unwrap();
        assert_approx_eq!(f64, accel.results()[0].value, 1.5 * 2.0 - 2.5 + 3.0 * -1.0);
    }

    #[test]
    fn back_to_back_invocations_reuse_the_grid() {
        let spec = matmul_invocation(&[vec![2.0]], &[vec![3.0]], 4, 4).unwrap();
        let mut accel =
            Accelerator::new(&config(DataType::Int32), FaultProperties::default()).unwrap();

        accel.start(&spec).unwrap();
        accel.run_to_completion(200).unwrap();
        assert_eq!(accel.results()[0].value, 6.0);

        let spec2 = matmul_invocation(&[vec![5.0]], &[vec![7.0]], 4, 4).unwrap();
        accel.start(&spec2).unwrap();
        accel.run_to_completion(200).unwrap();
        assert_eq!(accel.results()[0].value, 35.0);
    }

    #[test]
    fn busy_accelerator_rejects_a_second_start() {
        let spec = matmul_invocation(&[vec![1.0]], &[vec![1.0]], 4, 4).unwrap();
        let mut accel =
            Accelerator::new(&config(DataType::Int32), FaultProperties::default()).unwrap();
        accel.start(&spec).unwrap();
        assert_eq!(accel.start(&spec).unwrap_err(), Error::InvocationInProgress);
    }

    #[test]
    fn cycle_limit_is_enforced() {
        let spec = matmul_invocation(&[vec![1.0]], &[vec![1.0]], 4, 4).unwrap();
        let mut accel =
            Accelerator::new(&config(DataType::Int32), FaultProperties::default()).unwrap();
        accel.start(&spec).unwrap();
        assert_eq!(
            accel.run_to_completion(1).unwrap_err(),
            Error::CycleLimitExceeded(1)
        );
    }
}
