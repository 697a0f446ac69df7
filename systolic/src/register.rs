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

/// Tensor coordinate carried by every pipeline element.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TensorIndices {
    pub batch: usize,
    pub row: usize,
    pub col: usize,
    pub chan: usize,
}

impl TensorIndices {
    pub fn new(batch: usize, row: usize, col: usize, chan: usize) -> Self {
        Self {
            batch,
            row,
            col,
            chan,
        }
    }
}

impl std::fmt::Display for TensorIndices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "({}, {}, {}, {})",
            self.batch, self.row, self.col, self.chan
        )
    }
}

/// One data element in flight through the pipeline.
///
/// `bubble` marks a slot with no meaningful data; a MACC never computes on
/// bubble operands. `window_end` tags the last element of an accumulation
/// window and tells the next consumer to start its partial sum fresh.
/// `size == 0` means "no data" and is treated like a bubble on the carry
/// input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelData<T> {
    pub value: T,
    pub indices: TensorIndices,
    pub bubble: bool,
    pub window_end: bool,
    pub size: usize,
}

impl<T: Default> Default for PixelData<T> {
    fn default() -> Self {
        Self {
            value: T::default(),
            indices: TensorIndices::default(),
            bubble: true,
            window_end: false,
            size: 0,
        }
    }
}

impl<T: Default> PixelData<T> {
    pub fn bubble() -> Self {
        Self::default()
    }

    pub fn element(value: T, indices: TensorIndices) -> Self {
        Self {
            value,
            indices,
            bubble: false,
            window_end: false,
            size: 1,
        }
    }
}

/// A clocked single-slot pipeline register.
///
/// The pending slot is the write endpoint, the visible slot the read
/// endpoint. `advance` atomically publishes pending as visible, which is
/// what gives the grid one cycle of latency per hop. An undriven pending
/// slot holds its last written value, like a wire nobody re-drives.
#[derive(Clone, Debug, Default)]
pub struct Register<T> {
    pending: PixelData<T>,
    visible: PixelData<T>,
}

impl<T: Copy + Default> Register<T> {
    fn advance(&mut self) {
        self.visible = self.pending;
    }

    fn flush(&mut self) {
        self.pending = PixelData::bubble();
        self.visible = PixelData::bubble();
    }
}

/// Identity of a register in the grid's arena.
///
/// Handles are handed out at construction and never escape the owning
/// grid's lifetime; the arena is the single owner of all register storage.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RegId(usize);

/// Arena of all registers in a grid.
pub struct RegisterFile<T> {
    regs: Vec<Register<T>>,
}

impl<T: Copy + Default> RegisterFile<T> {
    pub fn new() -> Self {
        Self { regs: Vec::new() }
    }

    pub fn alloc(&mut self) -> RegId {
        self.regs.push(Register::default());
        RegId(self.regs.len() - 1)
    }

    /// Read endpoint: the value visible during the current cycle.
    pub fn read(&self, id: RegId) -> &PixelData<T> {
        &self.regs[id.0].visible
    }

    /// Write endpoint: visible only after the next advance.
    pub fn write(&mut self, id: RegId, data: PixelData<T>) {
        self.regs[id.0].pending = data;
    }

    pub fn advance(&mut self, id: RegId) {
        self.regs[id.0].advance();
    }

    /// Returns every register to the reset bubble state. Run between
    /// invocations so stale window-end elements cannot leak into the next
    /// problem's commit stage.
    pub fn flush(&mut self) {
        for reg in self.regs.iter_mut() {
            reg.flush();
        }
    }

    pub fn len(&self) -> usize {
        self.regs.len()
    }
}
