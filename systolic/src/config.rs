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

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::Error;

/// Element kind flowing through the array. Fixed for a whole run; the
/// arithmetic is monomorphized once at accelerator construction.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum DataType {
    Int32,
    Int64,
    Float16,
    Float32,
    Float64,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        let name = match self {
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float16 => "float16",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        };
        name.fmt(f)
    }
}

impl std::str::FromStr for DataType {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Error> {
        match name {
            "int32" => Ok(Self::Int32),
            "int64" => Ok(Self::Int64),
            "float16" => Ok(Self::Float16),
            "float32" => Ok(Self::Float32),
            "float64" => Ok(Self::Float64),
            other => Err(Error::UnsupportedDataType(other.to_string())),
        }
    }
}

/// provides the set of parameters to configure an accelerator instance
///
/// constructed programmatically or read from a config file.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AcceleratorConfig {
    /// Name used to identify this instance in diagnostics.
    pub name: String,
    pub pe_array_rows: usize,
    pub pe_array_cols: usize,
    pub data_type: DataType,
    /// When set, a random sub-rectangle of the array is designated safe at
    /// construction and the remaining PEs are permanently corrupted.
    pub fault_injection: bool,
}

impl Default for AcceleratorConfig {
    fn default() -> Self {
        Self {
            name: "systolic".to_string(),
            pe_array_rows: 8,
            pe_array_cols: 8,
            data_type: DataType::Int32,
            fault_injection: false,
        }
    }
}

impl AcceleratorConfig {
    #[allow(dead_code)]
    pub fn from_file(file_name: &str) -> Self {
        let file = File::open(Path::new(file_name))
            .unwrap_or_else(|e| panic!("File {} not found. {:?}", file_name, e));
        let reader = BufReader::new(file);
        serde_yaml::from_reader(reader).unwrap()
    }
    #[allow(dead_code)]
    pub fn from_str(config: &str) -> Self {
        serde_yaml::from_str(config).unwrap()
    }
}
