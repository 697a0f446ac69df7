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

use itertools::iproduct;
use rand::{Rng, SeedableRng};
use rand_core::RngCore;
use rand_xoshiro::Xoshiro256StarStar;

use crate::commit::{CommitRecord, CommitUnit};
use crate::config::AcceleratorConfig;
use crate::datatypes::MaccElem;
use crate::error::Error;
use crate::fetch::{FetchRole, FetchUnit};
use crate::macc::WeightShape;
use crate::pe::ProcElem;
use crate::register::{PixelData, RegId, RegisterFile};
use crate::Cycle;

/// Default probability that a corrupted MACC substitutes each operand.
pub const DEFAULT_CORRUPTION_RATE: f64 = 0.8;

/// Characteristics of the faults we inject into the array.
pub struct FaultProperties {
    /// Probability that each multiplicand of a corrupted PE's MACC is
    /// replaced by a random draw, independently per operand per cycle.
    pub operand_corruption_rate: f64,

    /// Random number generator used for the safe-region draw and the
    /// operand substitutions.
    /// Note: the RNG provided by the Default implementation is deterministic.
    pub rng: Box<dyn RngCore>,
}

impl Default for FaultProperties {
    fn default() -> Self {
        Self {
            operand_corruption_rate: DEFAULT_CORRUPTION_RATE,
            rng: Box::new(Xoshiro256StarStar::seed_from_u64(0xA02C55D17E5B3C19u64)),
        }
    }
}

/// Controller phase. Terminal per invocation, cyclic across invocations.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
    Idle,
    Prefill,
    Compute,
}

/// One unit of work for the array, already typed for the configured
/// element kind: per-row activation streams, per-column weight streams,
/// the weight tensor shape, and how many elements each row must drain.
pub struct Invocation<T: MaccElem> {
    pub input_streams: Vec<Vec<PixelData<T>>>,
    pub weight_streams: Vec<Vec<PixelData<T>>>,
    pub window: WeightShape,
    pub expected_outputs: Vec<usize>,
}

struct StartEvent {
    at: Cycle,
    role: FetchRole,
    index: usize,
}

/// The PE grid and its dataflow controller.
///
/// Owns the register arena, the PEs wired into a 2-D pipeline, the fetch
/// units feeding the west and north edges, and the commit units draining
/// each row. `evaluate` is invoked externally once per clock tick.
pub struct Dataflow<T: MaccElem> {
    name: String,
    rows: usize,
    cols: usize,
    safe_rows: usize,
    safe_cols: usize,
    corruption_rate: f64,
    rng: Box<dyn RngCore>,
    regs: RegisterFile<T>,
    pes: Vec<ProcElem>,
    input_fetch: Vec<FetchUnit<T>>,
    weight_fetch: Vec<FetchUnit<T>>,
    commit_units: Vec<CommitUnit<T>>,
    window: WeightShape,
    state: State,
    done_count: usize,
    start_events: Vec<StartEvent>,
    invocation_done: bool,
}

impl<T: MaccElem> std::fmt::Debug for Dataflow<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataflow")
            .field("name", &self.name)
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish_non_exhaustive()
    }
}

impl<T: MaccElem> Dataflow<T> {
    /// Builds the grid, drawing the safe region from the fault model's RNG
    /// when fault injection is enabled.
    pub fn new(config: &AcceleratorConfig, faults: FaultProperties) -> Result<Self, Error> {
        let mut faults = faults;
        let (rows, cols) = (config.pe_array_rows, config.pe_array_cols);
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidGridShape { rows, cols });
        }
        let (safe_rows, safe_cols) = if config.fault_injection {
            (faults.rng.gen_range(0..rows), faults.rng.gen_range(0..cols))
        } else {
            (rows, cols)
        };
        Self::with_safe_region(config, faults, safe_rows, safe_cols)
    }

    /// Builds the grid with an explicit safe partition. Used by fault
    /// experiments that need a deterministic region.
    pub fn with_safe_region(
        config: &AcceleratorConfig,
        faults: FaultProperties,
        safe_rows: usize,
        safe_cols: usize,
    ) -> Result<Self, Error> {
        let (rows, cols) = (config.pe_array_rows, config.pe_array_cols);
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidGridShape { rows, cols });
        }
        assert!(
            safe_rows <= rows && safe_cols <= cols,
            "Safe region {}x{} exceeds the {}x{} array",
            safe_rows,
            safe_cols,
            rows,
            cols
        );
        if config.data_type != T::DATA_TYPE {
            return Err(Error::DataTypeMismatch {
                configured: config.data_type,
                requested: T::DATA_TYPE,
            });
        }
        let name = config.name.clone();
        if safe_rows < rows || safe_cols < cols {
            log::info!(
                "{}: fault injection active, safe region {}x{} ({} of {} PEs)",
                name,
                safe_rows,
                safe_cols,
                safe_rows * safe_cols,
                rows * cols
            );
            for (r, c) in iproduct!(0..rows, 0..cols) {
                if r >= safe_rows || c >= safe_cols {
                    log::debug!("{}: corrupted pe{}", name, r * cols + c);
                }
            }
        } else {
            log::info!("{}: no fault injection, all {} PEs safe", name, rows * cols);
        }

        // Allocate three registers per PE: input, weight, output.
        let mut regs = RegisterFile::new();
        let mut reg_ids: Vec<[RegId; 3]> = Vec::with_capacity(rows * cols);
        for _ in 0..rows * cols {
            reg_ids.push([regs.alloc(), regs.alloc(), regs.alloc()]);
        }

        // Create the PEs and chain them into the pipeline: input registers
        // connect down the row, weight registers down the column.
        let mut pes = Vec::with_capacity(rows * cols);
        for (r, c) in iproduct!(0..rows, 0..cols) {
            let idx = r * cols + c;
            let [input, weight, output] = reg_ids[idx];
            let forward_input = if c + 1 < cols {
                Some(reg_ids[idx + 1][0])
            } else {
                None
            };
            let forward_weight = if r + 1 < rows {
                Some(reg_ids[idx + cols][1])
            } else {
                None
            };
            pes.push(ProcElem::new(
                format!("{}.pe{}", name, idx),
                input,
                weight,
                output,
                forward_input,
                forward_weight,
            ));
        }

        let input_fetch = (0..rows)
            .map(|r| FetchUnit::new(FetchRole::Input, r, reg_ids[r * cols][0], &name))
            .collect();
        let weight_fetch = (0..cols)
            .map(|c| FetchUnit::new(FetchRole::Weight, c, reg_ids[c][1], &name))
            .collect();
        let commit_units = (0..rows)
            .map(|r| {
                let outputs = (0..cols).map(|c| reg_ids[r * cols + c][2]).collect();
                CommitUnit::new(r, outputs, &name)
            })
            .collect();

        Ok(Self {
            name,
            rows,
            cols,
            safe_rows,
            safe_cols,
            corruption_rate: faults.operand_corruption_rate,
            rng: faults.rng,
            regs,
            pes,
            input_fetch,
            weight_fetch,
            commit_units,
            window: WeightShape::default(),
            state: State::Idle,
            done_count: 0,
            start_events: Vec::new(),
            invocation_done: false,
        })
    }

    pub fn pe_index(&self, r: usize, c: usize) -> usize {
        assert!(
            r < self.rows && c < self.cols,
            "PE coordinate ({}, {}) out of bounds of the {}x{} array",
            r,
            c,
            self.rows,
            self.cols
        );
        r * self.cols + c
    }

    /// Accepts a new invocation and enters Prefill.
    pub fn begin_invocation(&mut self, invocation: Invocation<T>) -> Result<(), Error> {
        if self.state != State::Idle {
            return Err(Error::InvocationInProgress);
        }
        if invocation.input_streams.len() != self.rows {
            return Err(Error::StreamCountMismatch {
                unit: "input fetch",
                expected: self.rows,
                actual: invocation.input_streams.len(),
            });
        }
        if invocation.weight_streams.len() != self.cols {
            return Err(Error::StreamCountMismatch {
                unit: "weight fetch",
                expected: self.cols,
                actual: invocation.weight_streams.len(),
            });
        }
        if invocation.expected_outputs.len() != self.rows {
            return Err(Error::StreamCountMismatch {
                unit: "commit",
                expected: self.rows,
                actual: invocation.expected_outputs.len(),
            });
        }
        for (fetch, stream) in self.input_fetch.iter_mut().zip(invocation.input_streams) {
            fetch.load(stream);
        }
        for (fetch, stream) in self.weight_fetch.iter_mut().zip(invocation.weight_streams) {
            fetch.load(stream);
        }
        for (commit, expected) in self
            .commit_units
            .iter_mut()
            .zip(invocation.expected_outputs)
        {
            commit.load(expected);
        }
        self.regs.flush();
        self.window = invocation.window;
        self.done_count = 0;
        self.invocation_done = false;
        self.start_events.clear();
        self.state = State::Prefill;
        log::debug!("{}: invocation accepted, prefilling", self.name);
        Ok(())
    }

    /// One simulated clock tick.
    ///
    /// Evaluation order models synchronous RTL and must be preserved:
    /// fetch units, weight fetch units, commit units, PE compute, then the
    /// register advance. Every unit reads cycle-t register contents before
    /// any register shows cycle-t+1.
    pub fn evaluate(&mut self, cycle: Cycle) {
        if self.state == State::Idle {
            return;
        }

        // Fire due streaming-start events.
        let mut i = 0;
        while i < self.start_events.len() {
            if self.start_events[i].at <= cycle {
                let event = self.start_events.swap_remove(i);
                match event.role {
                    FetchRole::Input => self.input_fetch[event.index].start_streaming(),
                    FetchRole::Weight => self.weight_fetch[event.index].start_streaming(),
                }
            } else {
                i += 1;
            }
        }

        // Fetch and commit units run their own streaming progress in every
        // state except Idle, independent of the controller phase.
        for fetch in self.input_fetch.iter_mut() {
            fetch.evaluate(&mut self.regs);
        }
        for fetch in self.weight_fetch.iter_mut() {
            fetch.evaluate(&mut self.regs);
        }
        let mut drained_rows = 0;
        for commit in self.commit_units.iter_mut() {
            if commit.evaluate(&self.regs) {
                drained_rows += 1;
            }
        }
        for _ in 0..drained_rows {
            self.notify_row_done();
        }

        match self.state {
            State::Prefill => {
                let mut prefill_done = true;
                for fetch in self.input_fetch.iter().chain(self.weight_fetch.iter()) {
                    prefill_done &= fetch.is_unused() || fetch.filled();
                }
                if prefill_done {
                    self.schedule_streaming(cycle);
                    self.state = State::Compute;
                    log::debug!("{}: prefill done at cycle {}, computing", self.name, cycle);
                }
            }
            State::Compute => {
                for r in 0..self.rows {
                    for c in 0..self.cols {
                        let pe = &self.pes[r * self.cols + c];
                        if r < self.safe_rows && c < self.safe_cols {
                            pe.evaluate(&mut self.regs, &self.window);
                        } else {
                            pe.evaluate_corrupt(
                                &mut self.regs,
                                &self.window,
                                self.rng.as_mut(),
                                self.corruption_rate,
                            );
                        }
                    }
                }
                for pe in &self.pes {
                    pe.advance(&mut self.regs);
                }
            }
            State::Idle => {}
        }
    }

    /// Stagger the streaming starts so the fetch units do not all issue
    /// their first memory request on the same edge.
    fn schedule_streaming(&mut self, cycle: Cycle) {
        for i in 0..self.input_fetch.len() {
            self.start_events.push(StartEvent {
                at: cycle + i + 1,
                role: FetchRole::Input,
                index: i,
            });
        }
        for i in 0..self.weight_fetch.len() {
            self.start_events.push(StartEvent {
                at: cycle + i + 1,
                role: FetchRole::Weight,
                index: i,
            });
        }
    }

    fn notify_row_done(&mut self) {
        self.done_count += 1;
        if self.done_count == self.commit_units.len() {
            log::debug!("{}: all rows drained, invocation done", self.name);
            self.state = State::Idle;
            self.invocation_done = true;
        }
    }

    /// Aborts the current invocation and returns the grid to reset state.
    pub fn reset(&mut self) {
        self.regs.flush();
        self.state = State::Idle;
        self.done_count = 0;
        self.start_events.clear();
        self.invocation_done = false;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.invocation_done
    }

    pub fn safe_region(&self) -> (usize, usize) {
        (self.safe_rows, self.safe_cols)
    }

    pub fn is_safe(&self, r: usize, c: usize) -> bool {
        let _ = self.pe_index(r, c);
        r < self.safe_rows && c < self.safe_cols
    }

    pub fn row_results(&self, row: usize) -> &[CommitRecord<T>] {
        self.commit_units[row].results()
    }

    // Register introspection, mainly a test surface.

    pub fn input_reg(&self, r: usize, c: usize) -> &PixelData<T> {
        let idx = self.pe_index(r, c);
        self.regs.read(self.pes[idx].input_reg)
    }

    pub fn weight_reg(&self, r: usize, c: usize) -> &PixelData<T> {
        let idx = self.pe_index(r, c);
        self.regs.read(self.pes[idx].weight_reg)
    }

    pub fn output_reg(&self, r: usize, c: usize) -> &PixelData<T> {
        let idx = self.pe_index(r, c);
        self.regs.read(self.pes[idx].output_reg)
    }
}
