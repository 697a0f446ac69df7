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

//! Cycle-accurate functional model of a systolic-array accelerator.
//!
//! A rows x cols grid of processing elements streams activations west to
//! east and weights north to south through single-slot clocked registers,
//! accumulating multiply-add results in place and draining finished
//! windows through per-row commit units. A construction-time fault model
//! can mark a sub-rectangle of the grid as safe and corrupt the rest.

mod accel;
mod commit;
mod config;
mod dataflow;
mod datatypes;
mod error;
mod fetch;
mod macc;
mod pe;
mod register;
mod stream;

// Public types
// type to use for cycles
pub type Cycle = usize;

pub use crate::accel::{Accelerator, AcceleratorCore, CommitValue};
pub use crate::commit::{CommitRecord, CommitUnit};
pub use crate::config::{AcceleratorConfig, DataType};
pub use crate::dataflow::{Dataflow, FaultProperties, Invocation, State, DEFAULT_CORRUPTION_RATE};
pub use crate::datatypes::MaccElem;
pub use crate::error::Error;
pub use crate::fetch::{FetchRole, FetchUnit, STAGING_CAPACITY};
pub use crate::macc::{MulAccUnit, WeightShape};
pub use crate::pe::ProcElem;
pub use crate::register::{PixelData, RegId, Register, RegisterFile, TensorIndices};
pub use crate::stream::{matmul_invocation, InvocationSpec, StreamElement};
