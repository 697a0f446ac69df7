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

use std::fmt;

use crate::config::DataType;
use crate::Cycle;

#[derive(Debug, Eq, PartialEq)]
pub enum Error {
    InvalidGridShape {
        rows: usize,
        cols: usize,
    },
    DataTypeMismatch {
        configured: DataType,
        requested: DataType,
    },
    UnsupportedDataType(String),
    StreamCountMismatch {
        unit: &'static str,
        expected: usize,
        actual: usize,
    },
    InvocationInProgress,
    GridCapacity {
        rows: usize,
        cols: usize,
        needed_rows: usize,
        needed_cols: usize,
    },
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    CycleLimitExceeded(Cycle),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidGridShape { rows, cols } => {
                write!(f, "ERROR: Invalid PE array shape {}x{}", rows, cols)
            }
            Self::DataTypeMismatch {
                configured,
                requested,
            } => {
                write!(
                    f,
                    "ERROR: Accelerator is configured for {} but {} was requested",
                    configured, requested
                )
            }
            Self::UnsupportedDataType(name) => {
                write!(f, "ERROR: Unsupported data type '{}'", name)
            }
            Self::StreamCountMismatch {
                unit,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "ERROR: Invocation carries {} {} streams, the array has {}",
                    actual, unit, expected
                )
            }
            Self::GridCapacity {
                rows,
                cols,
                needed_rows,
                needed_cols,
            } => {
                write!(
                    f,
                    "ERROR: Problem needs a {}x{} array, only {}x{} available",
                    needed_rows, needed_cols, rows, cols
                )
            }
            Self::DimensionMismatch {
                what,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "ERROR: Dimension mismatch for {}: expected {}, got {}",
                    what, expected, actual
                )
            }
            Self::CycleLimitExceeded(limit) => {
                write!(f, "ERROR: Invocation did not finish within {} cycles", limit)
            }
            _ => write!(f, "{:?}", self),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
