//! Exact integer pro-rata allocation.
//!
//! [`distribute`] splits an integer total across weighted recipients with the
//! largest-remainder method: each share is first rounded down, then the units
//! lost to rounding go one each to the recipients with the largest
//! fractional remainders. Ties go to the lower id. The shares always sum to
//! the total exactly.

use clearbook_types::{EntityId, invariant_violation};

const LOW_MASK: u128 = (1 << 64) - 1;

/// 256-bit product of two `u128`s as `(high, low)`.
fn widening_mul(a: u128, b: u128) -> (u128, u128) {
    let (a0, a1) = (a & LOW_MASK, a >> 64);
    let (b0, b1) = (b & LOW_MASK, b >> 64);

    let p00 = a0 * b0;
    let p01 = a0 * b1;
    let p10 = a1 * b0;
    let p11 = a1 * b1;

    let mid = (p00 >> 64) + (p01 & LOW_MASK) + (p10 & LOW_MASK);
    let low = (p00 & LOW_MASK) | ((mid & LOW_MASK) << 64);
    let high = p11 + (p01 >> 64) + (p10 >> 64) + (mid >> 64);
    (high, low)
}

/// `floor(a * b / c)` and the remainder, without intermediate overflow.
///
/// Returns `None` when `c` is zero or the quotient does not fit a `u128`.
#[must_use]
pub fn mul_div_floor(a: u128, b: u128, c: u128) -> Option<(u128, u128)> {
    if c == 0 {
        return None;
    }
    let (high, low) = widening_mul(a, b);
    if high == 0 {
        return Some((low / c, low % c));
    }
    if high >= c {
        return None;
    }

    // Restoring long division of (high, low) by c, one bit at a time.
    let mut rem = high;
    let mut quot = 0u128;
    for i in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((low >> i) & 1);
        quot <<= 1;
        if carry == 1 || rem >= c {
            rem = rem.wrapping_sub(c);
            quot |= 1;
        }
    }
    Some((quot, rem))
}

/// Unsigned 256-bit value as `(high, low)`. The derived ordering compares
/// `high` first, which is numeric order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Wide {
    high: u128,
    low: u128,
}

impl Wide {
    const ZERO: Self = Self { high: 0, low: 0 };

    fn from_mul(a: u128, b: u128) -> Self {
        let (high, low) = widening_mul(a, b);
        Self { high, low }
    }

    fn checked_add_u128(self, rhs: u128) -> Option<Self> {
        let (low, carry) = self.low.overflowing_add(rhs);
        let high = self.high.checked_add(u128::from(carry))?;
        Some(Self { high, low })
    }

    fn wrapping_sub(self, rhs: Self) -> Self {
        let (low, borrow) = self.low.overflowing_sub(rhs.low);
        let high = self
            .high
            .wrapping_sub(rhs.high)
            .wrapping_sub(u128::from(borrow));
        Self { high, low }
    }

    /// Shift left by one, shifting `bit` in. Returns the bit shifted out.
    fn shl1(self, bit: u128) -> (Self, bool) {
        let out = self.high >> 127 == 1;
        let high = (self.high << 1) | (self.low >> 127);
        let low = (self.low << 1) | bit;
        (Self { high, low }, out)
    }

    fn bit(self, i: u32) -> u128 {
        if i >= 128 {
            (self.high >> (i - 128)) & 1
        } else {
            (self.low >> i) & 1
        }
    }
}

/// `floor(a * b / c)` and the remainder for a 256-bit divisor.
///
/// The caller guarantees `0 < c` and `b <= c`, so the quotient never exceeds
/// `a`.
fn mul_div_wide(a: u128, b: u128, c: Wide) -> (u128, Wide) {
    if c.high == 0 {
        if let Some((quot, rem)) = mul_div_floor(a, b, c.low) {
            return (quot, Wide { high: 0, low: rem });
        }
    }

    let num = Wide::from_mul(a, b);
    let mut rem = Wide::ZERO;
    let mut quot = Wide::ZERO;
    for i in (0..256).rev() {
        let (shifted, carry) = rem.shl1(num.bit(i));
        rem = shifted;
        quot = quot.shl1(0).0;
        if carry || rem >= c {
            rem = rem.wrapping_sub(c);
            quot.low |= 1;
        }
    }
    if quot.high != 0 {
        invariant_violation(format!("pro-rata share of {a} exceeds the total"));
    }
    (quot.low, rem)
}

/// Split `total` across `weights` in proportion, exactly.
///
/// Returns one share per weight, in input order. When `total` does not
/// exceed the sum of weights, no share exceeds its weight. A zero weight
/// sum yields all-zero shares. The weight sum is kept in 256 bits, so
/// weights adding up past `u128::MAX` still split exactly.
#[must_use]
pub fn distribute(total: u128, weights: &[(EntityId, u128)]) -> Vec<u128> {
    let weight_sum = weights.iter().fold(Wide::ZERO, |acc, (_, w)| {
        acc.checked_add_u128(*w)
            .unwrap_or_else(|| invariant_violation("pro-rata weight sum exceeds 256 bits"))
    });
    if weight_sum == Wide::ZERO || total == 0 {
        return vec![0; weights.len()];
    }

    let mut shares = Vec::with_capacity(weights.len());
    let mut remainders = Vec::with_capacity(weights.len());
    let mut assigned = 0u128;
    for (i, &(id, w)) in weights.iter().enumerate() {
        let (share, rem) = mul_div_wide(total, w, weight_sum);
        assigned = assigned
            .checked_add(share)
            .unwrap_or_else(|| invariant_violation("pro-rata shares overflow"));
        shares.push(share);
        remainders.push((rem, id, i));
    }

    // Fewer leftover units than recipients.
    let leftover = total
        .checked_sub(assigned)
        .unwrap_or_else(|| invariant_violation("pro-rata shares exceed the total"));
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for &(_, _, i) in remainders.iter().take(usize::try_from(leftover).unwrap_or(usize::MAX)) {
        shares[i] += 1;
    }
    shares
}
