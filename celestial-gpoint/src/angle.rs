//! Angles with an explicit unit tag.
//!
//! [`Angle`] always stores radians; [`AngleUnit`] only matters at the text
//! boundary, where model files carry values as `12.5"` (arcseconds),
//! `3.1'` (arcminutes), `0.2d` or `0.2°` (degrees) or a bare number (radians).

use core::fmt;
use core::ops::{Add, Div, Mul, Neg, Sub};
use core::str::FromStr;
use std::f64::consts::{PI, TAU};

use crate::error::{Error, Result};

pub const ARCSEC_PER_RAD: f64 = 206_264.806_247_096_36;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Angle(f64);

impl Angle {
    pub const ZERO: Angle = Angle(0.0);

    #[inline]
    pub const fn from_radians(rad: f64) -> Self {
        Angle(rad)
    }

    #[inline]
    pub fn from_degrees(deg: f64) -> Self {
        Angle(deg.to_radians())
    }

    #[inline]
    pub fn from_arcminutes(arcmin: f64) -> Self {
        Angle((arcmin / 60.0).to_radians())
    }

    #[inline]
    pub fn from_arcseconds(arcsec: f64) -> Self {
        Angle(arcsec / ARCSEC_PER_RAD)
    }

    #[inline]
    pub fn from_hours(hours: f64) -> Self {
        Angle((hours * 15.0).to_radians())
    }

    pub fn from_unit(value: f64, unit: AngleUnit) -> Self {
        match unit {
            AngleUnit::Radians => Angle::from_radians(value),
            AngleUnit::Degrees => Angle::from_degrees(value),
            AngleUnit::Arcminutes => Angle::from_arcminutes(value),
            AngleUnit::Arcseconds => Angle::from_arcseconds(value),
        }
    }

    #[inline]
    pub const fn radians(self) -> f64 {
        self.0
    }

    #[inline]
    pub fn degrees(self) -> f64 {
        self.0.to_degrees()
    }

    #[inline]
    pub fn arcminutes(self) -> f64 {
        self.0.to_degrees() * 60.0
    }

    #[inline]
    pub fn arcseconds(self) -> f64 {
        self.0 * ARCSEC_PER_RAD
    }

    pub fn in_unit(self, unit: AngleUnit) -> f64 {
        match unit {
            AngleUnit::Radians => self.radians(),
            AngleUnit::Degrees => self.degrees(),
            AngleUnit::Arcminutes => self.arcminutes(),
            AngleUnit::Arcseconds => self.arcseconds(),
        }
    }

    /// Wrapped to [0, 2π).
    pub fn normalized(self) -> Self {
        Angle(wrap_0_2pi(self.0))
    }

    /// Wrapped to (−π, π].
    pub fn wrapped(self) -> Self {
        Angle(wrap_signed(self.0))
    }

    /// Formats with the unit suffix understood by [`Angle::from_str`].
    pub fn display_in(self, unit: AngleUnit) -> String {
        format!("{}{}", self.in_unit(unit), unit.suffix())
    }
}

impl Add for Angle {
    type Output = Angle;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Angle(self.0 + rhs.0)
    }
}

impl Sub for Angle {
    type Output = Angle;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Angle(self.0 - rhs.0)
    }
}

impl Mul<f64> for Angle {
    type Output = Angle;
    #[inline]
    fn mul(self, k: f64) -> Self {
        Angle(self.0 * k)
    }
}

impl Div<f64> for Angle {
    type Output = Angle;
    #[inline]
    fn div(self, k: f64) -> Self {
        Angle(self.0 / k)
    }
}

impl Neg for Angle {
    type Output = Angle;
    #[inline]
    fn neg(self) -> Self {
        Angle(-self.0)
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}\"", self.arcseconds())
    }
}

/// Reads `<number>[d|°|'|m|"|s]`; a bare number is radians.
impl FromStr for Angle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (number, unit) = match s.chars().last() {
            Some(c) => match AngleUnit::from_suffix(c) {
                Some(unit) => (&s[..s.len() - c.len_utf8()], unit),
                None => (s, AngleUnit::Radians),
            },
            None => return Err(Error::Configuration("empty angle".into())),
        };
        let value: f64 = number
            .parse()
            .map_err(|e| Error::Configuration(format!("invalid angle '{}': {}", s, e)))?;
        Ok(Angle::from_unit(value, unit))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AngleUnit {
    Radians,
    Degrees,
    Arcminutes,
    #[default]
    Arcseconds,
}

impl AngleUnit {
    pub fn suffix(self) -> &'static str {
        match self {
            AngleUnit::Radians => "",
            AngleUnit::Degrees => "d",
            AngleUnit::Arcminutes => "'",
            AngleUnit::Arcseconds => "\"",
        }
    }

    fn from_suffix(c: char) -> Option<Self> {
        match c {
            'd' | '°' => Some(AngleUnit::Degrees),
            '\'' | 'm' => Some(AngleUnit::Arcminutes),
            '"' | 's' => Some(AngleUnit::Arcseconds),
            _ => None,
        }
    }
}

#[inline]
pub fn wrap_0_2pi(x: f64) -> f64 {
    let w = libm::fmod(x, TAU);
    if w < 0.0 {
        w + TAU
    } else {
        w
    }
}

/// Wraps to (−π, π]; +π stays +π.
#[inline]
pub fn wrap_signed(x: f64) -> f64 {
    let w = libm::fmod(x, TAU);
    if w > PI {
        w - TAU
    } else if w <= -PI {
        w + TAU
    } else {
        w
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_conversions() {
        assert!((Angle::from_degrees(180.0).radians() - PI).abs() < 1e-15);
        assert!((Angle::from_arcseconds(3600.0).degrees() - 1.0).abs() < 1e-12);
        assert!((Angle::from_arcminutes(60.0).degrees() - 1.0).abs() < 1e-12);
        assert!((Angle::from_hours(12.0).radians() - PI).abs() < 1e-15);
    }

    #[test]
    fn parse_suffixes() {
        let d: Angle = "1.5d".parse().unwrap();
        assert!((d.degrees() - 1.5).abs() < 1e-12);
        let m: Angle = "30'".parse().unwrap();
        assert!((m.degrees() - 0.5).abs() < 1e-12);
        let m2: Angle = "30m".parse().unwrap();
        assert_eq!(m, m2);
        let s: Angle = "-36\"".parse().unwrap();
        assert!((s.degrees() + 0.01).abs() < 1e-12);
        let s2: Angle = "-36s".parse().unwrap();
        assert_eq!(s, s2);
        let deg: Angle = "1.5°".parse().unwrap();
        assert_eq!(deg, d);
        let r: Angle = "0.25".parse().unwrap();
        assert_eq!(r.radians(), 0.25);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<Angle>().is_err());
        assert!("abc".parse::<Angle>().is_err());
        assert!("d".parse::<Angle>().is_err());
    }

    #[test]
    fn display_in_round_trips() {
        let a = Angle::from_radians(1.234e-4);
        for unit in [
            AngleUnit::Radians,
            AngleUnit::Degrees,
            AngleUnit::Arcminutes,
            AngleUnit::Arcseconds,
        ] {
            let back: Angle = a.display_in(unit).parse().unwrap();
            assert!((back.radians() - a.radians()).abs() < 1e-18, "{:?}", unit);
        }
    }

    #[test]
    fn wrap_signed_range() {
        assert_eq!(wrap_signed(1.0), 1.0);
        assert!((wrap_signed(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-15);
        assert!((wrap_signed(-3.0 * PI / 2.0) - PI / 2.0).abs() < 1e-15);
        assert_eq!(wrap_signed(PI), PI);
        assert_eq!(wrap_signed(-PI), PI);
    }

    #[test]
    fn wrap_0_2pi_range() {
        assert!((wrap_0_2pi(-PI / 2.0) - 3.0 * PI / 2.0).abs() < 1e-15);
        assert!(wrap_0_2pi(TAU).abs() < 1e-15);
    }

    #[test]
    fn arithmetic() {
        let a = Angle::from_radians(1.0);
        let b = Angle::from_radians(0.5);
        assert_eq!((a + b).radians(), 1.5);
        assert_eq!((a - b).radians(), 0.5);
        assert_eq!((a * 2.0).radians(), 2.0);
        assert_eq!((a / 2.0).radians(), 0.5);
        assert_eq!((-a).radians(), -1.0);
    }
}
