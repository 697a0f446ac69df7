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

use rand::Rng;
use rand_core::RngCore;

use crate::datatypes::MaccElem;
use crate::register::{PixelData, RegId, RegisterFile, TensorIndices};

/// Shape of the weight tensor for the current invocation; a weight element
/// sitting on the last row, column, and channel ends the accumulation
/// window.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct WeightShape {
    pub rows: usize,
    pub cols: usize,
    pub chans: usize,
}

impl WeightShape {
    pub fn new(rows: usize, cols: usize, chans: usize) -> Self {
        Self { rows, cols, chans }
    }

    pub fn is_last(&self, indices: TensorIndices) -> bool {
        indices.row + 1 == self.rows && indices.col + 1 == self.cols && indices.chan + 1 == self.chans
    }
}

/// Multiply-accumulate unit of one PE.
///
/// Reads the activation, weight, and carry register endpoints and writes
/// the downstream output endpoint. The carry and output endpoints address
/// the same register: the PE accumulates into its own output slot.
pub struct MulAccUnit {
    macc_name: String,
    input: RegId,
    weight: RegId,
    carry: RegId,
    output: RegId,
}

impl MulAccUnit {
    pub fn new(name: String, input: RegId, weight: RegId, carry: RegId, output: RegId) -> Self {
        Self {
            macc_name: name,
            input,
            weight,
            carry,
            output,
        }
    }

    pub fn name(&self) -> &str {
        &self.macc_name
    }

    /// One exact MACC step.
    ///
    /// A bubble on either multiplicand makes this a defined no-op. The
    /// carry reads as zero when its register is marked window-end or holds
    /// no data, so a fresh window never inherits a stale partial sum.
    pub fn evaluate<T: MaccElem>(&self, regs: &mut RegisterFile<T>, window: &WeightShape) {
        let activation = *regs.read(self.input);
        let weight = *regs.read(self.weight);
        if activation.bubble || weight.bubble {
            return;
        }
        self.compute(regs, window, activation, weight);
    }

    /// The corrupted variant run by PEs outside the safe region.
    ///
    /// Same pipeline protocol as `evaluate`; before computing, each
    /// multiplicand is independently replaced with probability `rate` by a
    /// uniform draw. Downstream units cannot tell a corrupted PE apart
    /// except by the values it produces.
    pub fn evaluate_corrupt<T: MaccElem>(
        &self,
        regs: &mut RegisterFile<T>,
        window: &WeightShape,
        rng: &mut dyn RngCore,
        rate: f64,
    ) {
        let mut activation = *regs.read(self.input);
        let mut weight = *regs.read(self.weight);
        if activation.bubble || weight.bubble {
            return;
        }
        if rng.gen_bool(rate) {
            activation.value = T::corrupt_draw(rng);
            log::trace!(
                "{}: substituted activation {:?}",
                self.macc_name,
                activation.value
            );
        }
        if rng.gen_bool(rate) {
            weight.value = T::corrupt_draw(rng);
            log::trace!("{}: substituted weight {:?}", self.macc_name, weight.value);
        }
        self.compute(regs, window, activation, weight);
    }

    fn compute<T: MaccElem>(
        &self,
        regs: &mut RegisterFile<T>,
        window: &WeightShape,
        activation: PixelData<T>,
        weight: PixelData<T>,
    ) {
        let carry_slot = regs.read(self.carry);
        let carry = if carry_slot.window_end || carry_slot.size == 0 {
            T::default()
        } else {
            carry_slot.value
        };
        let mut out = PixelData {
            value: T::mul_acc(activation.value, weight.value, carry),
            indices: activation.indices,
            bubble: false,
            window_end: false,
            size: activation.size,
        };
        if window.is_last(weight.indices) {
            out.window_end = true;
        }
        log::trace!(
            "{}: IReg {}: {}, WReg {}: {}, carry: {}, OReg: {}",
            self.macc_name,
            activation.indices,
            activation.value.to_f64(),
            weight.indices,
            weight.value.to_f64(),
            carry.to_f64(),
            out.value.to_f64()
        );
        regs.write(self.output, out);
    }
}
