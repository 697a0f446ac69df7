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

use std::collections::VecDeque;

use crate::datatypes::MaccElem;
use crate::register::{PixelData, RegId, RegisterFile};

/// Depth of a fetch unit's staging queue.
///
/// Currently fixed, and the same for all fetch units.
pub const STAGING_CAPACITY: usize = 8;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FetchRole {
    Input,
    Weight,
}

impl std::fmt::Display for FetchRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Self::Input => "ifetch".fmt(f),
            Self::Weight => "wfetch".fmt(f),
        }
    }
}

/// Streams one invocation's elements into an edge register of the grid.
///
/// Input fetch units feed the first column's input registers (one unit per
/// row); weight fetch units feed the first row's weight registers (one per
/// column). During prefill the unit stages elements from memory, one per
/// cycle; once its streaming start event fires it emits one element per
/// cycle into its destination register, then explicit bubbles after the
/// stream drains.
pub struct FetchUnit<T: MaccElem> {
    fetch_name: String,
    role: FetchRole,
    dest: RegId,
    stream: VecDeque<PixelData<T>>,
    loaded_len: usize,
    staged: usize,
    streaming: bool,
}

impl<T: MaccElem> FetchUnit<T> {
    pub fn new(role: FetchRole, index: usize, dest: RegId, accel_name: &str) -> Self {
        Self {
            fetch_name: format!("{}.{}{}", accel_name, role, index),
            role,
            dest,
            stream: VecDeque::new(),
            loaded_len: 0,
            staged: 0,
            streaming: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.fetch_name
    }

    pub fn role(&self) -> FetchRole {
        self.role
    }

    pub fn load(&mut self, elements: Vec<PixelData<T>>) {
        self.loaded_len = elements.len();
        self.stream = elements.into();
        self.staged = 0;
        self.streaming = false;
    }

    /// A unit with nothing to stream this invocation.
    pub fn is_unused(&self) -> bool {
        self.loaded_len == 0
    }

    /// Whether the staging queue holds enough to start streaming.
    pub fn filled(&self) -> bool {
        self.staged >= self.loaded_len.min(STAGING_CAPACITY)
    }

    pub fn start_streaming(&mut self) {
        log::debug!("{}: streaming start", self.fetch_name);
        self.streaming = true;
    }

    pub fn evaluate(&mut self, regs: &mut RegisterFile<T>) {
        // Stage one element per cycle until the whole stream is resident.
        if self.staged < self.loaded_len {
            self.staged += 1;
        }
        if self.streaming {
            // Emit the next element, or a bubble once drained.
            let element = self.stream.pop_front().unwrap_or_default();
            regs.write(self.dest, element);
        }
    }
}
