use core::num::NonZeroU64;

use easy_ext::ext;
use num_bigint::BigUint;
use num_traits::{One as _, Zero as _};

#[ext(U64Ext)]
pub impl u64 {
    #[inline]
    #[must_use]
    fn prev_multiple_of(self, factor: NonZeroU64) -> Self {
        self - self % factor
    }
}

#[ext(BigUintExt)]
pub impl BigUint {
    /// Narrows `self` to `u64`, saturating at `u64::MAX`.
    ///
    /// Quotients of the form `a * b / c` where `b <= c` always fit, so saturation only matters for
    /// states that are already corrupt.
    #[inline]
    #[must_use]
    fn saturating_to_u64(&self) -> u64 {
        self.try_into().unwrap_or(u64::MAX)
    }
}

/// Floor square root computed with Newton's method.
///
/// The initial guess `2 ^ ceil(bits / 2)` is never below the root, so the iterates decrease
/// monotonically and the first one that fails to decrease is the answer.
#[must_use]
pub fn integer_sqrt(value: &BigUint) -> BigUint {
    if value.is_zero() {
        return BigUint::zero();
    }

    let mut estimate = BigUint::one() << value.bits().div_ceil(2);

    loop {
        let next = (&estimate + value / &estimate) >> 1_u8;

        if next >= estimate {
            return estimate;
        }

        estimate = next;
    }
}
