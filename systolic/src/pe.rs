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

use rand_core::RngCore;

use crate::datatypes::MaccElem;
use crate::macc::{MulAccUnit, WeightShape};
use crate::register::{RegId, RegisterFile};

/// One processing element: three registers, one MACC, and the forwarding
/// wires into the neighboring PEs' registers.
///
/// The forward wires are fixed at construction: `forward_input` points at
/// the next PE's input register down the row (absent on the last column),
/// `forward_weight` at the next PE's weight register down the column
/// (absent on the last row).
pub struct ProcElem {
    pe_name: String,
    pub input_reg: RegId,
    pub weight_reg: RegId,
    pub output_reg: RegId,
    forward_input: Option<RegId>,
    forward_weight: Option<RegId>,
    macc: MulAccUnit,
}

impl ProcElem {
    pub fn new(
        name: String,
        input_reg: RegId,
        weight_reg: RegId,
        output_reg: RegId,
        forward_input: Option<RegId>,
        forward_weight: Option<RegId>,
    ) -> Self {
        let macc = MulAccUnit::new(
            format!("{}.macc", name),
            input_reg,
            weight_reg,
            output_reg,
            output_reg,
        );
        Self {
            pe_name: name,
            input_reg,
            weight_reg,
            output_reg,
            forward_input,
            forward_weight,
            macc,
        }
    }

    pub fn name(&self) -> &str {
        &self.pe_name
    }

    pub fn evaluate<T: MaccElem>(&self, regs: &mut RegisterFile<T>, window: &WeightShape) {
        // Perform the MACC operation.
        self.macc.evaluate(regs, window);
        // Update the inputs to the registers of the next PE.
        self.forward(regs);
    }

    pub fn evaluate_corrupt<T: MaccElem>(
        &self,
        regs: &mut RegisterFile<T>,
        window: &WeightShape,
        rng: &mut dyn RngCore,
        rate: f64,
    ) {
        // Perform the MACC operation.
        self.macc.evaluate_corrupt(regs, window, rng, rate);
        // Update the inputs to the registers of the next PE.
        self.forward(regs);
    }

    /// Forward the pre-advance register contents so that data moves
    /// exactly one grid cell per cycle.
    fn forward<T: MaccElem>(&self, regs: &mut RegisterFile<T>) {
        if let Some(dest) = self.forward_input {
            let data = *regs.read(self.input_reg);
            regs.write(dest, data);
        }
        if let Some(dest) = self.forward_weight {
            let data = *regs.read(self.weight_reg);
            regs.write(dest, data);
        }
    }

    pub fn advance<T: MaccElem>(&self, regs: &mut RegisterFile<T>) {
        regs.advance(self.input_reg);
        regs.advance(self.weight_reg);
        regs.advance(self.output_reg);
    }
}
