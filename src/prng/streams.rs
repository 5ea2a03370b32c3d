//! Lazy value sequences.
//!
//! Iterator forms of the scalar operations: conceptually infinite,
//! non-restartable, with the same per-element accounting. Sized views come
//! from the standard combinators (`rng.f64s().take(100)`).

use std::iter;

use super::tracked::TrackedRng;
use super::{RandomCore, RngError};

impl<C: RandomCore> TrackedRng<C> {
    /// Endless uniform `u32` values.
    pub fn u32s(&self) -> impl Iterator<Item = u32> + '_ {
        iter::repeat_with(move || self.next_u32())
    }

    /// Endless uniform `u64` values.
    pub fn u64s(&self) -> impl Iterator<Item = u64> + '_ {
        iter::repeat_with(move || self.next_u64())
    }

    /// Endless uniform `i32` values.
    pub fn i32s(&self) -> impl Iterator<Item = i32> + '_ {
        iter::repeat_with(move || self.next_i32())
    }

    /// Endless uniform `i64` values.
    pub fn i64s(&self) -> impl Iterator<Item = i64> + '_ {
        iter::repeat_with(move || self.next_i64())
    }

    /// Endless uniform `f64` values in `[0, 1)`.
    pub fn f64s(&self) -> impl Iterator<Item = f64> + '_ {
        iter::repeat_with(move || self.next_f64())
    }

    /// Endless standard-normal deviates.
    pub fn gaussians(&self) -> impl Iterator<Item = f64> + '_ {
        iter::repeat_with(move || self.next_gaussian())
    }

    /// Endless uniform values in `[origin, bound)`. The bounds are validated
    /// once, up front.
    pub fn i32s_range(
        &self,
        origin: i32,
        bound: i32,
    ) -> Result<impl Iterator<Item = i32> + '_, RngError> {
        if bound <= origin {
            return Err(RngError::InvalidRange);
        }
        Ok(iter::repeat_with(move || {
            self.ranged_i64(i64::from(origin), i64::from(bound)) as i32
        }))
    }

    /// Endless uniform values in `[origin, bound)`. The bounds are validated
    /// once, up front.
    pub fn i64s_range(
        &self,
        origin: i64,
        bound: i64,
    ) -> Result<impl Iterator<Item = i64> + '_, RngError> {
        if bound <= origin {
            return Err(RngError::InvalidRange);
        }
        Ok(iter::repeat_with(move || self.ranged_i64(origin, bound)))
    }

    /// Endless uniform values in `[origin, bound)`. The bounds are validated
    /// once, up front.
    pub fn f64s_range(
        &self,
        origin: f64,
        bound: f64,
    ) -> Result<impl Iterator<Item = f64> + '_, RngError> {
        if !origin.is_finite() || !bound.is_finite() || bound <= origin {
            return Err(RngError::InvalidRange);
        }
        Ok(iter::repeat_with(move || self.ranged_f64(origin, bound)))
    }
}
