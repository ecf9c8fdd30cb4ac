// m_fixed.rs — 16.16 fixed point arithmetic
//
// Every multiply and divide here must truncate exactly like the 32-bit
// routines recorded demos were made with, so both go through 64-bit
// intermediates and are narrowed with `as`.

pub type Fixed = i32;

pub const FRACBITS: i32 = 16;
pub const FRACUNIT: Fixed = 1 << FRACBITS;

/// Whole map units to fixed point.
#[inline]
pub const fn fixed_from_int(n: i32) -> Fixed {
    n << FRACBITS
}

/// Fixed point to whole map units, rounding toward negative infinity.
#[inline]
pub const fn fixed_to_int(f: Fixed) -> i32 {
    f >> FRACBITS
}

#[inline]
pub fn fixed_mul(a: Fixed, b: Fixed) -> Fixed {
    ((a as i64 * b as i64) >> FRACBITS) as Fixed
}

/// Saturates to `i32::MIN` / `i32::MAX` when the quotient would not fit,
/// using the same `abs(a) >> 14 >= abs(b)` test as the legacy routine.
#[inline]
pub fn fixed_div(a: Fixed, b: Fixed) -> Fixed {
    if b == 0 || (a.wrapping_abs() >> 14) >= b.wrapping_abs() {
        return if (a ^ b) < 0 { i32::MIN } else { i32::MAX };
    }
    fixed_div2(a, b)
}

#[inline]
fn fixed_div2(a: Fixed, b: Fixed) -> Fixed {
    (((a as i64) << FRACBITS) / b as i64) as Fixed
}
