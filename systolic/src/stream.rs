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

use crate::dataflow::Invocation;
use crate::datatypes::MaccElem;
use crate::error::Error;
use crate::macc::WeightShape;
use crate::register::{PixelData, TensorIndices};

/// One untyped stream element: a value with its tensor coordinate. Values
/// are carried as f64 and narrowed to the configured element kind when the
/// invocation is lowered.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StreamElement {
    pub indices: TensorIndices,
    pub value: f64,
}

impl StreamElement {
    pub fn new(indices: TensorIndices, value: f64) -> Self {
        Self { indices, value }
    }
}

/// An invocation before it is bound to an element kind.
///
/// Callers describe the work in f64; `lower` narrows it for whichever grid
/// the accelerator was built with.
#[derive(Clone, Debug, Default)]
pub struct InvocationSpec {
    pub input_streams: Vec<Vec<StreamElement>>,
    pub weight_streams: Vec<Vec<StreamElement>>,
    pub window: WeightShape,
    pub expected_outputs: Vec<usize>,
}

impl InvocationSpec {
    pub fn lower<T: MaccElem>(&self) -> Invocation<T> {
        let lower_streams = |streams: &[Vec<StreamElement>]| {
            streams
                .iter()
                .map(|stream| {
                    stream
                        .iter()
                        .map(|e| PixelData::element(T::from_f64(e.value), e.indices))
                        .collect()
                })
                .collect()
        };
        Invocation {
            input_streams: lower_streams(&self.input_streams),
            weight_streams: lower_streams(&self.weight_streams),
            window: self.window,
            expected_outputs: self.expected_outputs.clone(),
        }
    }
}

/// Lays out the matrix product `a * b` onto a `grid_rows` x `grid_cols`
/// array: row r of `a` streams into input row r, column c of `b` into
/// weight column c, and PE (r, c) accumulates output element (r, c) over a
/// window the length of the inner dimension.
pub fn matmul_invocation(
    a: &[Vec<f64>],
    b: &[Vec<f64>],
    grid_rows: usize,
    grid_cols: usize,
) -> Result<InvocationSpec, Error> {
    let m = a.len();
    let k = a.first().map_or(0, |row| row.len());
    for row in a {
        if row.len() != k {
            return Err(Error::DimensionMismatch {
                what: "input matrix row",
                expected: k,
                actual: row.len(),
            });
        }
    }
    if b.len() != k {
        return Err(Error::DimensionMismatch {
            what: "weight matrix rows",
            expected: k,
            actual: b.len(),
        });
    }
    let n = b.first().map_or(0, |row| row.len());
    for row in b {
        if row.len() != n {
            return Err(Error::DimensionMismatch {
                what: "weight matrix row",
                expected: n,
                actual: row.len(),
            });
        }
    }
    if m > grid_rows || n > grid_cols {
        return Err(Error::GridCapacity {
            rows: grid_rows,
            cols: grid_cols,
            needed_rows: m,
            needed_cols: n,
        });
    }

    let mut input_streams = vec![Vec::new(); grid_rows];
    for (r, row) in a.iter().enumerate() {
        input_streams[r] = row
            .iter()
            .enumerate()
            .map(|(i, &v)| StreamElement::new(TensorIndices::new(0, r, i, 0), v))
            .collect();
    }
    let mut weight_streams = vec![Vec::new(); grid_cols];
    for c in 0..n {
        weight_streams[c] = (0..k)
            .map(|i| StreamElement::new(TensorIndices::new(0, i, 0, 0), b[i][c]))
            .collect();
    }
    let mut expected_outputs = vec![0; grid_rows];
    for expected in expected_outputs.iter_mut().take(m) {
        *expected = n;
    }
    Ok(InvocationSpec {
        input_streams,
        weight_streams,
        window: WeightShape::new(k, 1, 1),
        expected_outputs,
    })
}
