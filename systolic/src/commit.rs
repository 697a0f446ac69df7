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

use crate::datatypes::MaccElem;
use crate::register::{RegId, RegisterFile, TensorIndices};

/// One element drained out of the grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CommitRecord<T> {
    pub col: usize,
    pub indices: TensorIndices,
    pub value: T,
}

/// Drains one PE row's output registers.
///
/// Each cycle the unit commits any visible window-end element it has not
/// drained yet. An output register keeps re-exposing its last element
/// until the MACC overwrites it, so the unit remembers the indices of the
/// element last drained from each column; within one invocation every
/// output coordinate commits at most once, which makes indices a sound
/// dedup key.
pub struct CommitUnit<T: MaccElem> {
    commit_name: String,
    row: usize,
    inputs: Vec<RegId>,
    expected: usize,
    committed: Vec<CommitRecord<T>>,
    last_drained: Vec<Option<TensorIndices>>,
    signaled: bool,
}

impl<T: MaccElem> CommitUnit<T> {
    pub fn new(row: usize, inputs: Vec<RegId>, accel_name: &str) -> Self {
        let cols = inputs.len();
        Self {
            commit_name: format!("{}.commit{}", accel_name, row),
            row,
            inputs,
            expected: 0,
            committed: Vec::new(),
            last_drained: vec![None; cols],
            signaled: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.commit_name
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn load(&mut self, expected: usize) {
        self.expected = expected;
        self.committed.clear();
        self.last_drained = vec![None; self.inputs.len()];
        self.signaled = false;
    }

    /// Returns true exactly once per invocation, on the cycle the row has
    /// drained its expected output count. Rows expecting no output signal
    /// on their first evaluation.
    pub fn evaluate(&mut self, regs: &RegisterFile<T>) -> bool {
        for (col, &reg) in self.inputs.iter().enumerate() {
            let slot = regs.read(reg);
            if slot.bubble || !slot.window_end || slot.size == 0 {
                continue;
            }
            if self.last_drained[col] == Some(slot.indices) {
                continue;
            }
            self.last_drained[col] = Some(slot.indices);
            log::trace!(
                "{}: drained {} = {} from column {}",
                self.commit_name,
                slot.indices,
                slot.value.to_f64(),
                col
            );
            self.committed.push(CommitRecord {
                col,
                indices: slot.indices,
                value: slot.value,
            });
        }
        if !self.signaled && self.committed.len() >= self.expected {
            self.signaled = true;
            log::debug!(
                "{}: row drained ({} elements)",
                self.commit_name,
                self.committed.len()
            );
            return true;
        }
        false
    }

    pub fn results(&self) -> &[CommitRecord<T>] {
        &self.committed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::PixelData;

    fn window_end(value: i32, indices: TensorIndices) -> PixelData<i32> {
        let mut data = PixelData::element(value, indices);
        data.window_end = true;
        data
    }

    #[test]
    fn drains_window_end_elements_once() {
        let mut regs = RegisterFile::<i32>::new();
        let out = regs.alloc();
        let mut commit = CommitUnit::new(0, vec![out], "accel");
        commit.load(1);

        regs.write(out, window_end(12, TensorIndices::default()));
        regs.advance(out);

        assert!(commit.evaluate(&regs));
        // The register re-exposes the same element; no double drain, and
        // the completion signal fires only once.
        regs.advance(out);
        assert!(!commit.evaluate(&regs));
        assert_eq!(commit.results().len(), 1);
        assert_eq!(commit.results()[0].value, 12);
    }

    #[test]
    fn consecutive_windows_with_equal_values_both_commit() {
        let mut regs = RegisterFile::<i32>::new();
        let out = regs.alloc();
        let mut commit = CommitUnit::new(0, vec![out], "accel");
        commit.load(2);

        regs.write(out, window_end(8, TensorIndices::new(0, 0, 0, 0)));
        regs.advance(out);
        assert!(!commit.evaluate(&regs));

        // Same value, different output coordinate.
        regs.write(out, window_end(8, TensorIndices::new(0, 0, 1, 0)));
        regs.advance(out);
        assert!(commit.evaluate(&regs));
        assert_eq!(commit.results().len(), 2);
    }

    #[test]
    fn ignores_bubbles_and_partial_sums() {
        let mut regs = RegisterFile::<i32>::new();
        let out = regs.alloc();
        let mut commit = CommitUnit::new(0, vec![out], "accel");
        commit.load(1);

        assert!(!commit.evaluate(&regs));
        // A partial sum without the window-end mark must stay in the grid.
        regs.write(out, PixelData::element(5, TensorIndices::default()));
        regs.advance(out);
        assert!(!commit.evaluate(&regs));
        assert!(commit.results().is_empty());
    }

    #[test]
    fn empty_row_signals_immediately() {
        let regs = RegisterFile::<i32>::new();
        let mut commit = CommitUnit::<i32>::new(1, vec![], "accel");
        commit.load(0);
        assert!(commit.evaluate(&regs));
        assert!(!commit.evaluate(&regs));
    }
}
