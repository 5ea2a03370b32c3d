//! Derived-value algorithms.
//!
//! Everything here is shaped from raw 64-bit words drawn under the
//! generator's lock. Bounded integers use rejection sampling over the
//! smallest covering power-of-two domain, never modulo reduction, which
//! biases ranges that do not divide the domain evenly.
//!
//! Each operation debits its declared Shannon cost exactly once per
//! returned value; rejected draws cost nothing extra.

use super::tracked::{Inner, TrackedRng};
use super::{RandomCore, RngError};

/// Declared entropy cost of one `f64` mantissa draw.
pub const F64_ENTROPY_BITS: i64 = 53;

/// Declared entropy cost of one `f32` mantissa draw.
pub const F32_ENTROPY_BITS: i64 = 24;

const F64_UNIT: f64 = 1.0 / (1u64 << 53) as f64;
const F32_UNIT: f32 = 1.0 / (1u32 << 24) as f32;

/// Smallest `k` with `2^k >= range`; the per-draw cost of a bounded pick.
fn bits_for_range(range: u64) -> u32 {
    if range <= 1 {
        0
    } else {
        64 - (range - 1).leading_zeros()
    }
}

/// Steps one ulp from `bound` toward negative infinity.
fn largest_below(bound: f64) -> f64 {
    if bound > 0.0 {
        f64::from_bits(bound.to_bits() - 1)
    } else if bound < 0.0 {
        f64::from_bits(bound.to_bits() + 1)
    } else {
        -f64::from_bits(1)
    }
}

impl<C: RandomCore> Inner<C> {
    fn raw_bits(&mut self, n: u32) -> u64 {
        if n == 0 {
            0
        } else {
            self.core.next_raw() >> (64 - n)
        }
    }

    /// Uniform 53-bit mantissa draw in `[0, 1)`. No accounting.
    pub(crate) fn raw_f64(&mut self) -> f64 {
        (self.core.next_raw() >> 11) as f64 * F64_UNIT
    }

    /// Rejection-sampled uniform value in `[0, bound)` with `bound >= 1`.
    /// Returns the value and the declared bit cost of the pick.
    fn raw_below(&mut self, bound: u64) -> (u64, u32) {
        let bits = bits_for_range(bound);
        loop {
            let candidate = self.raw_bits(bits);
            if candidate < bound {
                return (candidate, bits);
            }
        }
    }
}

impl<C: RandomCore> TrackedRng<C> {
    // Bound-validated entry points sit on top of these unchecked forms; the
    // stream adapters reuse them after validating once.

    pub(crate) fn ranged_u64(&self, bound: u64) -> u64 {
        let mut inner = self.lock_inner();
        let (value, bits) = inner.raw_below(bound);
        inner.account.debit(i64::from(bits));
        value
    }

    pub(crate) fn ranged_i64(&self, origin: i64, bound: i64) -> i64 {
        let range = bound.wrapping_sub(origin) as u64;
        origin.wrapping_add(self.ranged_u64(range) as i64)
    }

    pub(crate) fn ranged_f64(&self, origin: f64, bound: f64) -> f64 {
        let mut inner = self.lock_inner();
        let fraction = inner.raw_f64();
        inner.account.debit(F64_ENTROPY_BITS);
        drop(inner);
        let value = origin + fraction * (bound - origin);
        if value >= bound {
            // Rounding pushed the product onto the exclusive bound.
            largest_below(bound)
        } else {
            value
        }
    }

    /// Uniform integer in `[0, bound)`. Costs `ceil(log2(bound))` bits.
    pub fn next_u64_below(&self, bound: u64) -> Result<u64, RngError> {
        if bound == 0 {
            return Err(RngError::InvalidRange);
        }
        Ok(self.ranged_u64(bound))
    }

    /// Uniform integer in `[0, bound)`. Costs `ceil(log2(bound))` bits.
    pub fn next_u32_below(&self, bound: u32) -> Result<u32, RngError> {
        self.next_u64_below(u64::from(bound)).map(|v| v as u32)
    }

    /// Uniform integer in `[origin, bound)`. Costs `ceil(log2(range))` bits.
    pub fn next_i64_range(&self, origin: i64, bound: i64) -> Result<i64, RngError> {
        if bound <= origin {
            return Err(RngError::InvalidRange);
        }
        Ok(self.ranged_i64(origin, bound))
    }

    /// Uniform integer in `[origin, bound)`. Costs `ceil(log2(range))` bits.
    pub fn next_i32_range(&self, origin: i32, bound: i32) -> Result<i32, RngError> {
        self.next_i64_range(i64::from(origin), i64::from(bound))
            .map(|v| v as i32)
    }

    /// Uniform `f64` in `[0, 1)`. Costs 53 bits.
    pub fn next_f64(&self) -> f64 {
        let mut inner = self.lock_inner();
        let value = inner.raw_f64();
        inner.account.debit(F64_ENTROPY_BITS);
        value
    }

    /// Uniform `f32` in `[0, 1)`. Costs 24 bits.
    pub fn next_f32(&self) -> f32 {
        let mut inner = self.lock_inner();
        let value = (inner.core.next_raw() >> 40) as f32 * F32_UNIT;
        inner.account.debit(F32_ENTROPY_BITS);
        value
    }

    /// Uniform `f64` in `[0, bound)`; the bound stays exclusive even when
    /// scaling rounds up. Costs 53 bits.
    pub fn next_f64_below(&self, bound: f64) -> Result<f64, RngError> {
        self.next_f64_range(0.0, bound)
    }

    /// Uniform `f64` in `[origin, bound)`; the bound stays exclusive even
    /// when scaling rounds up. Costs 53 bits.
    pub fn next_f64_range(&self, origin: f64, bound: f64) -> Result<f64, RngError> {
        if !origin.is_finite() || !bound.is_finite() || bound <= origin {
            return Err(RngError::InvalidRange);
        }
        Ok(self.ranged_f64(origin, bound))
    }

    /// Standard-normal deviate via the Marsaglia polar transform. The
    /// transform yields two independent deviates; the second is cached and
    /// served by the next call unless a reseed intervenes. Costs 53 bits per
    /// returned value.
    pub fn next_gaussian(&self) -> f64 {
        let mut inner = self.lock_inner();
        if let Some(spare) = inner.gauss_spare.take() {
            inner.account.debit(F64_ENTROPY_BITS);
            return spare;
        }
        loop {
            let u = 2.0 * inner.raw_f64() - 1.0;
            let v = 2.0 * inner.raw_f64() - 1.0;
            let s = u * u + v * v;
            if s < 1.0 && s != 0.0 {
                let scale = (-2.0 * s.ln() / s).sqrt();
                inner.gauss_spare = Some(v * scale);
                inner.account.debit(F64_ENTROPY_BITS);
                return u * scale;
            }
        }
    }

    /// Uniform boolean. Costs 1 bit.
    pub fn next_bool(&self) -> bool {
        let mut inner = self.lock_inner();
        let value = inner.core.next_raw() >> 63 != 0;
        inner.account.debit(1);
        value
    }

    /// True with probability `p`. The degenerate cases (`p <= 0`, `p >= 1`)
    /// are answered without touching the generator and consume no entropy;
    /// anything in between costs 1 bit.
    pub fn with_probability(&self, p: f64) -> bool {
        if p <= 0.0 {
            return false;
        }
        if p >= 1.0 {
            return true;
        }
        let mut inner = self.lock_inner();
        let hit = inner.raw_f64() < p;
        inner.account.debit(1);
        hit
    }

    /// Uniform pick from a slice. Every element is reachable. Costs
    /// `ceil(log2(len))` bits.
    pub fn next_element<'a, T>(&self, items: &'a [T]) -> Result<&'a T, RngError> {
        if items.is_empty() {
            return Err(RngError::InvalidRange);
        }
        let index = self.ranged_u64(items.len() as u64) as usize;
        Ok(&items[index])
    }

    /// Uniform pick from an enum's variants slice, by value.
    pub fn next_enum<T: Copy>(&self, variants: &[T]) -> Result<T, RngError> {
        self.next_element(variants).copied()
    }
}
