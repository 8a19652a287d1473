//! Pixel dimensions and rational scale factors
//!
//! Scale factors are kept as exact fractions so that products of several
//! factors (for example the magnification still owed by the rest of a stage
//! chain) do not accumulate floating-point error.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Mul;
use std::str::FromStr;

/// Pixel size of a texture or drawable region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Dimensions {
    /// Creates dimensions from a width and height in pixels
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns true if either side is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Scales both sides by `factor`, rounding down and never going below one pixel
    pub fn scaled(&self, factor: ScaleFactor) -> Self {
        Self {
            width: factor.apply(self.width).max(1),
            height: factor.apply(self.height).max(1),
        }
    }

    /// Converts to a wgpu extent with a single layer
    pub fn to_extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Represents a rational scale factor as a fraction
///
/// Accepts `"2"` and `"3/2"` style strings as well as plain numbers when
/// deserialized, and always stores the fraction in lowest terms. Products
/// whose terms outgrow `u32` are replaced by their closest convergent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScaleFactor {
    numerator: u32,
    denominator: u32,
}

impl ScaleFactor {
    /// The unit scale factor
    pub const ONE: ScaleFactor = ScaleFactor { numerator: 1, denominator: 1 };

    /// Creates a scale factor, rejecting zero numerators and denominators
    pub fn new(numerator: u32, denominator: u32) -> Result<Self, ScaleFactorParseError> {
        if denominator == 0 {
            return Err(ScaleFactorParseError::ZeroDenominator);
        }
        if numerator == 0 {
            return Err(ScaleFactorParseError::NotPositive);
        }
        Ok(Self::reduced(numerator as u64, denominator as u64))
    }

    /// Creates an integral scale factor such as x2 or x4
    pub fn integer(factor: u32) -> Result<Self, ScaleFactorParseError> {
        Self::new(factor, 1)
    }

    fn reduced(numerator: u64, denominator: u64) -> Self {
        let divisor = gcd(numerator, denominator);
        let (numerator, denominator) = (numerator / divisor, denominator / divisor);
        match (u32::try_from(numerator), u32::try_from(denominator)) {
            (Ok(numerator), Ok(denominator)) => Self { numerator, denominator },
            _ => Self::approximated(numerator, denominator),
        }
    }

    /// Nearest continued-fraction convergent of a reduced fraction too large for `u32`
    ///
    /// The result stays on the same side of 1 as the exact value.
    fn approximated(numerator: u64, denominator: u64) -> Self {
        let limit = u128::from(u32::MAX);
        let (mut n, mut d) = (u128::from(numerator), u128::from(denominator));
        let (mut h_prev, mut h) = (0u128, 1u128);
        let (mut k_prev, mut k) = (1u128, 0u128);
        let mut best = None;

        while d != 0 {
            let term = n / d;
            let h_next = term * h + h_prev;
            let k_next = term * k + k_prev;
            if h_next > limit || k_next > limit {
                break;
            }
            (h_prev, h) = (h, h_next);
            (k_prev, k) = (k, k_next);
            best = Some((h_next as u32, k_next as u32));
            (n, d) = (d, n % d);
        }

        let (approx_numerator, approx_denominator) = match best {
            None => (u32::MAX, 1),
            Some((0, _)) => (1, u32::MAX),
            Some(fraction) => fraction,
        };

        if approx_numerator == approx_denominator && numerator != denominator {
            return if numerator > denominator {
                Self { numerator: u32::MAX, denominator: u32::MAX - 1 }
            } else {
                Self { numerator: u32::MAX - 1, denominator: u32::MAX }
            };
        }

        Self {
            numerator: approx_numerator,
            denominator: approx_denominator,
        }
    }

    /// The numerator of the reduced fraction
    pub fn numerator(&self) -> u32 {
        self.numerator
    }

    /// The denominator of the reduced fraction
    pub fn denominator(&self) -> u32 {
        self.denominator
    }

    /// Converts the scale factor to a floating-point value
    pub fn to_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Returns true if this scale factor equals 1 (no scaling)
    pub fn is_unity(&self) -> bool {
        self.numerator == self.denominator
    }

    /// Returns true if this scale factor is greater than 1 (upscaling)
    pub fn is_upscale(&self) -> bool {
        self.numerator > self.denominator
    }

    /// Returns true if this scale factor is less than 1 (downscaling)
    pub fn is_downscale(&self) -> bool {
        self.numerator < self.denominator
    }

    /// Applies the factor to a pixel length, rounding down
    pub fn apply(&self, length: u32) -> u32 {
        let scaled = length as u64 * self.numerator as u64 / self.denominator as u64;
        u32::try_from(scaled).unwrap_or(u32::MAX)
    }

    /// Product of a sequence of factors; the empty product is [`ScaleFactor::ONE`]
    pub fn product<'a>(factors: impl IntoIterator<Item = &'a ScaleFactor>) -> ScaleFactor {
        factors.into_iter().fold(ScaleFactor::ONE, |acc, factor| acc * *factor)
    }
}

impl Default for ScaleFactor {
    fn default() -> Self {
        Self::ONE
    }
}

impl Mul for ScaleFactor {
    type Output = ScaleFactor;

    fn mul(self, rhs: ScaleFactor) -> ScaleFactor {
        ScaleFactor::reduced(
            self.numerator as u64 * rhs.numerator as u64,
            self.denominator as u64 * rhs.denominator as u64,
        )
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.max(1)
}

impl FromStr for ScaleFactor {
    type Err = ScaleFactorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((numerator, denominator)) = s.split_once('/') {
            let numerator = numerator.trim().parse::<u32>().map_err(|_| ScaleFactorParseError::InvalidNumerator)?;
            let denominator = denominator.trim().parse::<u32>().map_err(|_| ScaleFactorParseError::InvalidDenominator)?;
            ScaleFactor::new(numerator, denominator)
        } else {
            // Whole numbers like "2" or "4"
            let numerator = s.parse::<u32>().map_err(|_| ScaleFactorParseError::InvalidNumerator)?;
            ScaleFactor::new(numerator, 1)
        }
    }
}

impl fmt::Display for ScaleFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denominator == 1 {
            write!(f, "{}", self.numerator)
        } else {
            write!(f, "{}/{}", self.numerator, self.denominator)
        }
    }
}

impl Serialize for ScaleFactor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.denominator == 1 {
            serializer.serialize_u32(self.numerator)
        } else {
            serializer.collect_str(self)
        }
    }
}

impl<'de> Deserialize<'de> for ScaleFactor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ScaleFactorVisitor;

        impl serde::de::Visitor<'_> for ScaleFactorVisitor {
            type Value = ScaleFactor;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a positive number or an \"n/d\" fraction")
            }

            fn visit_u64<E: serde::de::Error>(self, value: u64) -> Result<ScaleFactor, E> {
                let value = u32::try_from(value).map_err(|_| E::custom("scale factor out of range"))?;
                ScaleFactor::integer(value).map_err(E::custom)
            }

            fn visit_i64<E: serde::de::Error>(self, value: i64) -> Result<ScaleFactor, E> {
                let value = u64::try_from(value).map_err(|_| E::custom(ScaleFactorParseError::NotPositive))?;
                self.visit_u64(value)
            }

            fn visit_f64<E: serde::de::Error>(self, value: f64) -> Result<ScaleFactor, E> {
                if !value.is_finite() || value <= 0.0 {
                    return Err(E::custom(ScaleFactorParseError::NotPositive));
                }
                // Settings written by hand occasionally carry 1.5 style factors
                let thousandths = (value * 1000.0).round();
                if thousandths < 1.0 || thousandths > u32::MAX as f64 {
                    return Err(E::custom("scale factor out of range"));
                }
                ScaleFactor::new(thousandths as u32, 1000).map_err(E::custom)
            }

            fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<ScaleFactor, E> {
                value.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(ScaleFactorVisitor)
    }
}

/// Error types for scale factor parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScaleFactorParseError {
    /// The numerator is not a valid integer
    #[error("invalid numerator")]
    InvalidNumerator,
    /// The denominator is not a valid integer
    #[error("invalid denominator")]
    InvalidDenominator,
    /// The denominator is zero (division by zero)
    #[error("denominator cannot be zero")]
    ZeroDenominator,
    /// The factor is zero or negative
    #[error("scale factor must be positive")]
    NotPositive,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factor(numerator: u32, denominator: u32) -> ScaleFactor {
        ScaleFactor::new(numerator, denominator).unwrap()
    }

    #[test]
    fn test_scale_factor_parsing() {
        assert_eq!("1".parse::<ScaleFactor>().unwrap(), ScaleFactor::ONE);
        assert_eq!("2".parse::<ScaleFactor>().unwrap(), factor(2, 1));
        assert_eq!("3/2".parse::<ScaleFactor>().unwrap(), factor(3, 2));
        assert_eq!("4/2".parse::<ScaleFactor>().unwrap(), factor(2, 1));

        assert_eq!("0".parse::<ScaleFactor>(), Err(ScaleFactorParseError::NotPositive));
        assert_eq!("1/0".parse::<ScaleFactor>(), Err(ScaleFactorParseError::ZeroDenominator));
        assert_eq!("x2".parse::<ScaleFactor>(), Err(ScaleFactorParseError::InvalidNumerator));
        assert_eq!("2/two".parse::<ScaleFactor>(), Err(ScaleFactorParseError::InvalidDenominator));
    }

    #[test]
    fn test_scale_factor_properties() {
        assert!(ScaleFactor::ONE.is_unity());
        assert!(factor(2, 1).is_upscale());
        assert!(factor(1, 2).is_downscale());
        assert_eq!(factor(3, 2).to_string(), "3/2");
        assert_eq!(factor(4, 1).to_string(), "4");
    }

    #[test]
    fn test_product_is_exact() {
        let factors = [factor(3, 2), factor(2, 3), factor(2, 1)];
        assert_eq!(ScaleFactor::product(&factors), factor(2, 1));
        assert_eq!(ScaleFactor::product(&[]), ScaleFactor::ONE);
    }

    #[test]
    fn test_overflowing_product_keeps_its_side_of_one() {
        let slight = factor(1001, 1000);
        let product = ScaleFactor::product(&[slight, slight, slight, slight]);
        assert!(product.is_upscale());
        assert!((product.to_f64() - 1.004006004001).abs() < 1e-12);
        assert_eq!(gcd(product.numerator() as u64, product.denominator() as u64), 1);

        let shrink = factor(1000, 1001);
        assert!(ScaleFactor::product(&[shrink, shrink, shrink, shrink]).is_downscale());

        // Within 2^-32 of unity
        let barely = factor(u32::MAX, u32::MAX - 1) * factor(u32::MAX - 2, u32::MAX - 1);
        assert!(barely.is_downscale());
        assert_eq!(factor(u32::MAX, 1) * factor(u32::MAX, 1), factor(u32::MAX, 1));
        assert_eq!(factor(1, u32::MAX) * factor(1, u32::MAX), factor(1, u32::MAX));
    }

    #[test]
    fn test_apply_rounds_down() {
        assert_eq!(factor(3, 2).apply(641), 961);
        assert_eq!(factor(2, 1).apply(640), 1280);
        assert_eq!(Dimensions::new(1, 1).scaled(factor(1, 4)), Dimensions::new(1, 1));
    }

    #[test]
    fn test_deserialize_numbers_and_strings() {
        assert_eq!(serde_json::from_str::<ScaleFactor>("2").unwrap(), factor(2, 1));
        assert_eq!(serde_json::from_str::<ScaleFactor>("2.0").unwrap(), factor(2, 1));
        assert_eq!(serde_json::from_str::<ScaleFactor>("1.5").unwrap(), factor(3, 2));
        assert_eq!(serde_json::from_str::<ScaleFactor>("\"3/2\"").unwrap(), factor(3, 2));
        assert!(serde_json::from_str::<ScaleFactor>("0").is_err());
        assert!(serde_json::from_str::<ScaleFactor>("-2").is_err());
    }

    #[test]
    fn test_serialize_round_trips_through_display() {
        assert_eq!(serde_json::to_string(&factor(2, 1)).unwrap(), "2");
        assert_eq!(serde_json::to_string(&factor(3, 2)).unwrap(), "\"3/2\"");
    }
}
