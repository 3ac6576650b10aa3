//! Deterministic fixed-point decimals
//!
//! `UFixed<D>` and `Fixed<D>` store a raw integer scaled by `10^D`. The
//! settlement core works in 18 decimals (`UFixed18` / `Fixed18`); the
//! 6-decimal pair only appears at token boundaries and is converted with
//! [`UFixed::convert`] / [`Fixed::convert`], never implicitly.
//!
//! Addition and subtraction are exact. Multiplication and division go
//! through a 256-bit intermediate product so `a * b / c` rounds exactly
//! once, toward zero unless a [`Rounding`] is passed explicitly.

use core::fmt;
use core::marker::PhantomData;
use core::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Arithmetic failures. None of these are ever silently coerced.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum FixedError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("fixed-point overflow")]
    Overflow,
    #[error("unsigned fixed-point underflow")]
    Underflow,
    #[error("invalid decimal literal")]
    Parse,
}

/// Rounding mode for multiplication, division and precision conversion.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Rounding {
    #[default]
    TowardZero,
    Floor,
    Ceil,
}

impl Rounding {
    /// Whether a magnitude with a non-zero remainder is bumped up.
    #[inline]
    fn away_from_zero(self, negative: bool) -> bool {
        match self {
            Rounding::TowardZero => false,
            Rounding::Floor => negative,
            Rounding::Ceil => !negative,
        }
    }
}

const fn scale(decimals: u32) -> u128 {
    10u128.pow(decimals)
}

/// 256-bit intermediate arithmetic on 64-bit limbs.
mod wide {
    const LO: u128 = (1u128 << 64) - 1;

    /// Full product of two 128-bit values as `(hi, lo)`.
    ///
    /// a = a1 * 2^64 + a0, b = b1 * 2^64 + b0
    /// a * b = a1*b1 * 2^128 + (a1*b0 + a0*b1) * 2^64 + a0*b0
    #[inline]
    pub(super) fn mul_wide(a: u128, b: u128) -> (u128, u128) {
        let (a1, a0) = (a >> 64, a & LO);
        let (b1, b0) = (b >> 64, b & LO);

        let p00 = a0 * b0;
        let p01 = a0 * b1;
        let p10 = a1 * b0;
        let p11 = a1 * b1;

        let mid = (p00 >> 64) + (p01 & LO) + (p10 & LO);
        let lo = (p00 & LO) | (mid << 64);
        let hi = p11 + (p01 >> 64) + (p10 >> 64) + (mid >> 64);
        (hi, lo)
    }

    /// `a * b / d` with a single rounding step.
    ///
    /// Returns `None` when the quotient does not fit in 128 bits.
    /// `d` must be non-zero.
    pub(super) fn mul_div(a: u128, b: u128, d: u128, round_up: bool) -> Option<u128> {
        debug_assert!(d != 0);
        let (hi, lo) = mul_wide(a, b);

        if hi == 0 {
            let q = lo / d;
            return if round_up && lo % d != 0 {
                q.checked_add(1)
            } else {
                Some(q)
            };
        }

        if hi >= d {
            return None;
        }

        // Restoring long division of (hi:lo) by d. rem < d holds on entry
        // to every iteration; `carry` keeps the bit shifted out of rem.
        let mut rem = hi;
        let mut quot = 0u128;
        for i in (0..128).rev() {
            let carry = rem >> 127;
            rem = (rem << 1) | ((lo >> i) & 1);
            if carry == 1 || rem >= d {
                rem = rem.wrapping_sub(d);
                quot |= 1u128 << i;
            }
        }

        if round_up && rem != 0 {
            quot.checked_add(1)
        } else {
            Some(quot)
        }
    }
}

/// Unsigned fixed-point decimal with `D` decimal places.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct UFixed<const D: u32>(u128);

/// Signed fixed-point decimal with `D` decimal places.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Fixed<const D: u32>(i128);

pub type UFixed18 = UFixed<18>;
pub type Fixed18 = Fixed<18>;
pub type UFixed6 = UFixed<6>;
pub type Fixed6 = Fixed<6>;

impl<const D: u32> UFixed<D> {
    pub const SCALE: u128 = scale(D);
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(Self::SCALE);
    pub const MAX: Self = Self(u128::MAX);

    #[inline]
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u128 {
        self.0
    }

    /// Whole-number value. `D` is at most 18, so any `u64` fits.
    #[inline]
    pub const fn from_int(n: u64) -> Self {
        Self(n as u128 * Self::SCALE)
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self, FixedError> {
        self.0.checked_add(rhs.0).map(Self).ok_or(FixedError::Overflow)
    }

    pub fn checked_sub(self, rhs: Self) -> Result<Self, FixedError> {
        self.0.checked_sub(rhs.0).map(Self).ok_or(FixedError::Underflow)
    }

    #[inline]
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    #[inline]
    pub fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    pub fn checked_mul(self, rhs: Self) -> Result<Self, FixedError> {
        self.mul_rounded(rhs, Rounding::TowardZero)
    }

    pub fn mul_rounded(self, rhs: Self, rounding: Rounding) -> Result<Self, FixedError> {
        wide::mul_div(self.0, rhs.0, Self::SCALE, rounding.away_from_zero(false))
            .map(Self)
            .ok_or(FixedError::Overflow)
    }

    pub fn checked_div(self, rhs: Self) -> Result<Self, FixedError> {
        self.div_rounded(rhs, Rounding::TowardZero)
    }

    pub fn div_rounded(self, rhs: Self, rounding: Rounding) -> Result<Self, FixedError> {
        if rhs.is_zero() {
            return Err(FixedError::DivisionByZero);
        }
        wide::mul_div(self.0, Self::SCALE, rhs.0, rounding.away_from_zero(false))
            .map(Self)
            .ok_or(FixedError::Overflow)
    }

    /// `self * num / den`, rounded toward zero once.
    pub fn mul_div(self, num: Self, den: Self) -> Result<Self, FixedError> {
        if den.is_zero() {
            return Err(FixedError::DivisionByZero);
        }
        wide::mul_div(self.0, num.0, den.0, false)
            .map(Self)
            .ok_or(FixedError::Overflow)
    }

    /// `num / den` as a fixed-point ratio.
    pub fn ratio(num: Self, den: Self) -> Result<Self, FixedError> {
        num.checked_div(den)
    }

    pub fn to_signed(self) -> Result<Fixed<D>, FixedError> {
        i128::try_from(self.0)
            .map(Fixed)
            .map_err(|_| FixedError::Overflow)
    }

    /// Rescale to `E` decimals. Widening is exact; narrowing rounds.
    pub fn convert<const E: u32>(self, rounding: Rounding) -> Result<UFixed<E>, FixedError> {
        if E >= D {
            self.0
                .checked_mul(scale(E - D))
                .map(UFixed)
                .ok_or(FixedError::Overflow)
        } else {
            let factor = scale(D - E);
            let q = self.0 / factor;
            if rounding.away_from_zero(false) && self.0 % factor != 0 {
                q.checked_add(1).map(UFixed).ok_or(FixedError::Overflow)
            } else {
                Ok(UFixed(q))
            }
        }
    }
}

impl<const D: u32> Fixed<D> {
    pub const SCALE: i128 = scale(D) as i128;
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(Self::SCALE);

    #[inline]
    pub const fn from_raw(raw: i128) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> i128 {
        self.0
    }

    #[inline]
    pub const fn from_int(n: i64) -> Self {
        Self(n as i128 * Self::SCALE)
    }

    /// Build from a sign flag and a magnitude.
    pub fn with_sign(negative: bool, magnitude: UFixed<D>) -> Result<Self, FixedError> {
        Self::from_magnitude(negative, magnitude.0)
    }

    fn from_magnitude(negative: bool, magnitude: u128) -> Result<Self, FixedError> {
        if negative {
            if magnitude > (i128::MAX as u128) + 1 {
                return Err(FixedError::Overflow);
            }
            // 2^127 maps onto i128::MIN through the wrapping negation.
            Ok(Self((magnitude as i128).wrapping_neg()))
        } else {
            i128::try_from(magnitude)
                .map(Self)
                .map_err(|_| FixedError::Overflow)
        }
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn sign(self) -> i32 {
        self.0.signum() as i32
    }

    /// Magnitude as an unsigned value of the same precision.
    #[inline]
    pub const fn abs(self) -> UFixed<D> {
        UFixed(self.0.unsigned_abs())
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self, FixedError> {
        self.0.checked_add(rhs.0).map(Self).ok_or(FixedError::Overflow)
    }

    pub fn checked_sub(self, rhs: Self) -> Result<Self, FixedError> {
        self.0.checked_sub(rhs.0).map(Self).ok_or(FixedError::Overflow)
    }

    pub fn checked_neg(self) -> Result<Self, FixedError> {
        self.0.checked_neg().map(Self).ok_or(FixedError::Overflow)
    }

    pub fn checked_mul(self, rhs: Self) -> Result<Self, FixedError> {
        self.mul_rounded(rhs, Rounding::TowardZero)
    }

    pub fn mul_rounded(self, rhs: Self, rounding: Rounding) -> Result<Self, FixedError> {
        let negative = (self.0 < 0) != (rhs.0 < 0);
        let magnitude = wide::mul_div(
            self.0.unsigned_abs(),
            rhs.0.unsigned_abs(),
            scale(D),
            rounding.away_from_zero(negative),
        )
        .ok_or(FixedError::Overflow)?;
        Self::from_magnitude(negative, magnitude)
    }

    pub fn checked_div(self, rhs: Self) -> Result<Self, FixedError> {
        self.div_rounded(rhs, Rounding::TowardZero)
    }

    pub fn div_rounded(self, rhs: Self, rounding: Rounding) -> Result<Self, FixedError> {
        if rhs.is_zero() {
            return Err(FixedError::DivisionByZero);
        }
        let negative = (self.0 < 0) != (rhs.0 < 0);
        let magnitude = wide::mul_div(
            self.0.unsigned_abs(),
            scale(D),
            rhs.0.unsigned_abs(),
            rounding.away_from_zero(negative),
        )
        .ok_or(FixedError::Overflow)?;
        Self::from_magnitude(negative, magnitude)
    }

    /// `self * num / den`, rounded toward zero once.
    pub fn mul_div(self, num: Self, den: Self) -> Result<Self, FixedError> {
        if den.is_zero() {
            return Err(FixedError::DivisionByZero);
        }
        let negative = ((self.0 < 0) != (num.0 < 0)) != (den.0 < 0);
        let magnitude = wide::mul_div(
            self.0.unsigned_abs(),
            num.0.unsigned_abs(),
            den.0.unsigned_abs(),
            false,
        )
        .ok_or(FixedError::Overflow)?;
        Self::from_magnitude(negative, magnitude)
    }

    /// Signed value times an unsigned quantity.
    pub fn mul_unsigned(self, rhs: UFixed<D>) -> Result<Self, FixedError> {
        let magnitude = wide::mul_div(self.0.unsigned_abs(), rhs.0, scale(D), false)
            .ok_or(FixedError::Overflow)?;
        Self::from_magnitude(self.0 < 0, magnitude)
    }

    /// Signed value divided by an unsigned quantity.
    pub fn div_unsigned(self, rhs: UFixed<D>) -> Result<Self, FixedError> {
        if rhs.is_zero() {
            return Err(FixedError::DivisionByZero);
        }
        let magnitude = wide::mul_div(self.0.unsigned_abs(), scale(D), rhs.0, false)
            .ok_or(FixedError::Overflow)?;
        Self::from_magnitude(self.0 < 0, magnitude)
    }

    /// Rescale to `E` decimals. Widening is exact; narrowing rounds.
    pub fn convert<const E: u32>(self, rounding: Rounding) -> Result<Fixed<E>, FixedError> {
        let negative = self.0 < 0;
        let magnitude = self.0.unsigned_abs();
        let scaled = if E >= D {
            magnitude
                .checked_mul(scale(E - D))
                .ok_or(FixedError::Overflow)?
        } else {
            let factor = scale(D - E);
            let q = magnitude / factor;
            if rounding.away_from_zero(negative) && magnitude % factor != 0 {
                q + 1
            } else {
                q
            }
        };
        Fixed::<E>::from_magnitude(negative, scaled)
    }
}

fn write_decimal(f: &mut fmt::Formatter<'_>, negative: bool, magnitude: u128, decimals: u32) -> fmt::Result {
    let unit = scale(decimals);
    let int = magnitude / unit;
    let frac = magnitude % unit;
    if negative && magnitude != 0 {
        f.write_str("-")?;
    }
    write!(f, "{int}")?;
    if frac != 0 {
        let digits = format!("{:0width$}", frac, width = decimals as usize);
        write!(f, ".{}", digits.trim_end_matches('0'))?;
    }
    Ok(())
}

/// Parse `[-+]int[.frac]` into a sign flag and raw magnitude.
fn parse_decimal(s: &str, decimals: u32) -> Result<(bool, u128), FixedError> {
    let s = s.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (int, frac) = digits.split_once('.').unwrap_or((digits, ""));

    if int.is_empty() && frac.is_empty() {
        return Err(FixedError::Parse);
    }
    if !int.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FixedError::Parse);
    }
    // More fractional digits than the type holds would lose precision.
    if frac.len() > decimals as usize {
        return Err(FixedError::Parse);
    }

    let int_value: u128 = if int.is_empty() {
        0
    } else {
        int.parse().map_err(|_| FixedError::Overflow)?
    };
    let frac_value: u128 = if frac.is_empty() {
        0
    } else {
        let raw: u128 = frac.parse().map_err(|_| FixedError::Parse)?;
        raw * scale(decimals - frac.len() as u32)
    };

    let magnitude = int_value
        .checked_mul(scale(decimals))
        .and_then(|v| v.checked_add(frac_value))
        .ok_or(FixedError::Overflow)?;
    Ok((negative, magnitude))
}

impl<const D: u32> fmt::Display for UFixed<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_decimal(f, false, self.0, D)
    }
}

impl<const D: u32> fmt::Debug for UFixed<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl<const D: u32> fmt::Display for Fixed<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_decimal(f, self.0 < 0, self.0.unsigned_abs(), D)
    }
}

impl<const D: u32> fmt::Debug for Fixed<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl<const D: u32> FromStr for UFixed<D> {
    type Err = FixedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negative, magnitude) = parse_decimal(s, D)?;
        if negative && magnitude != 0 {
            return Err(FixedError::Underflow);
        }
        Ok(Self(magnitude))
    }
}

impl<const D: u32> FromStr for Fixed<D> {
    type Err = FixedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negative, magnitude) = parse_decimal(s, D)?;
        Self::from_magnitude(negative, magnitude)
    }
}

/// Decimal values cross serde boundaries as strings (`"0.30"`); bare
/// integers are accepted on input for convenience.
trait DecimalLiteral: FromStr<Err = FixedError> {
    const EXPECTING: &'static str;
    fn from_integer(value: i128) -> Result<Self, FixedError>;
}

impl<const D: u32> DecimalLiteral for UFixed<D> {
    const EXPECTING: &'static str = "an unsigned decimal string or integer";

    fn from_integer(value: i128) -> Result<Self, FixedError> {
        let value = u128::try_from(value).map_err(|_| FixedError::Underflow)?;
        value.checked_mul(scale(D)).map(Self).ok_or(FixedError::Overflow)
    }
}

impl<const D: u32> DecimalLiteral for Fixed<D> {
    const EXPECTING: &'static str = "a decimal string or integer";

    fn from_integer(value: i128) -> Result<Self, FixedError> {
        value.checked_mul(scale(D) as i128).map(Self).ok_or(FixedError::Overflow)
    }
}

struct DecimalVisitor<T>(PhantomData<T>);

impl<'de, T: DecimalLiteral> de::Visitor<'de> for DecimalVisitor<T> {
    type Value = T;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(T::EXPECTING)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<T, E> {
        v.parse().map_err(|e| E::custom(format!("{e}: {v:?}")))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<T, E> {
        T::from_integer(v as i128).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<T, E> {
        T::from_integer(v as i128).map_err(E::custom)
    }
}

impl<const D: u32> Serialize for UFixed<D> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de, const D: u32> Deserialize<'de> for UFixed<D> {
    fn deserialize<De: Deserializer<'de>>(deserializer: De) -> Result<Self, De::Error> {
        deserializer.deserialize_any(DecimalVisitor(PhantomData))
    }
}

impl<const D: u32> Serialize for Fixed<D> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de, const D: u32> Deserialize<'de> for Fixed<D> {
    fn deserialize<De: Deserializer<'de>>(deserializer: De) -> Result<Self, De::Error> {
        deserializer.deserialize_any(DecimalVisitor(PhantomData))
    }
}
