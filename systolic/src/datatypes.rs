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

use half::f16;
use rand::Rng;
use rand_core::RngCore;

use crate::config::DataType;

/// Upper bound (exclusive) of the substituted operand draws in corrupted
/// MACCs. The range only needs to be wide enough that a substitution is
/// overwhelmingly distinguishable from the true pipeline value.
const CORRUPT_DRAW_LIMIT: u32 = 100_000;

/// Element arithmetic for one MACC step.
///
/// The configured [DataType] selects one implementation at accelerator
/// construction; the per-cycle path is fully monomorphized.
pub trait MaccElem: Copy + Default + PartialEq + std::fmt::Debug + 'static {
    const DATA_TYPE: DataType;

    /// One multiply-accumulate step in the element's native precision.
    fn mul_acc(activation: Self, weight: Self, carry: Self) -> Self;

    /// Replacement operand drawn uniformly from a wide range.
    fn corrupt_draw(rng: &mut dyn RngCore) -> Self;

    fn from_f64(value: f64) -> Self;
    fn to_f64(self) -> f64;
}

impl MaccElem for i32 {
    const DATA_TYPE: DataType = DataType::Int32;

    fn mul_acc(activation: Self, weight: Self, carry: Self) -> Self {
        activation.wrapping_mul(weight).wrapping_add(carry)
    }

    fn corrupt_draw(rng: &mut dyn RngCore) -> Self {
        rng.gen_range(0..CORRUPT_DRAW_LIMIT as i32)
    }

    fn from_f64(value: f64) -> Self {
        value as i32
    }

    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl MaccElem for i64 {
    const DATA_TYPE: DataType = DataType::Int64;

    fn mul_acc(activation: Self, weight: Self, carry: Self) -> Self {
        activation.wrapping_mul(weight).wrapping_add(carry)
    }

    fn corrupt_draw(rng: &mut dyn RngCore) -> Self {
        rng.gen_range(0..CORRUPT_DRAW_LIMIT as i64)
    }

    fn from_f64(value: f64) -> Self {
        value as i64
    }

    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl MaccElem for f16 {
    const DATA_TYPE: DataType = DataType::Float16;

    /// There is no native half arithmetic; widen to f32, fuse, narrow back.
    fn mul_acc(activation: Self, weight: Self, carry: Self) -> Self {
        f16::from_f32(activation.to_f32() * weight.to_f32() + carry.to_f32())
    }

    fn corrupt_draw(rng: &mut dyn RngCore) -> Self {
        f16::from_f32(rng.gen_range(0.0..CORRUPT_DRAW_LIMIT as f32))
    }

    fn from_f64(value: f64) -> Self {
        f16::from_f64(value)
    }

    fn to_f64(self) -> f64 {
        f16::to_f64(self)
    }
}

impl MaccElem for f32 {
    const DATA_TYPE: DataType = DataType::Float32;

    fn mul_acc(activation: Self, weight: Self, carry: Self) -> Self {
        activation * weight + carry
    }

    fn corrupt_draw(rng: &mut dyn RngCore) -> Self {
        rng.gen_range(0.0..CORRUPT_DRAW_LIMIT as f32)
    }

    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl MaccElem for f64 {
    const DATA_TYPE: DataType = DataType::Float64;

    fn mul_acc(activation: Self, weight: Self, carry: Self) -> Self {
        activation * weight + carry
    }

    fn corrupt_draw(rng: &mut dyn RngCore) -> Self {
        rng.gen_range(0.0..CORRUPT_DRAW_LIMIT as f64)
    }

    fn from_f64(value: f64) -> Self {
        value
    }

    fn to_f64(self) -> f64 {
        self
    }
}
