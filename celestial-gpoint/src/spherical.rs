//! Equatorial/horizontal conversion and great-circle separation.
//!
//! All functions take and return radians, except the `_degrees` helpers.
//! Azimuth is counted from south through west, the convention of the RTS2
//! pointing files: a star on the meridian south of the zenith has azimuth 0,
//! one setting in the west has azimuth near π/2.

use std::f64::consts::FRAC_PI_2;

use crate::angle::{wrap_0_2pi, wrap_signed};

/// Hour angle and declination to (azimuth, elevation).
pub fn equatorial_to_horizontal(ha: f64, dec: f64, lat: f64) -> (f64, f64) {
    let (sin_ha, cos_ha) = libm::sincos(ha);
    let (sin_dec, cos_dec) = libm::sincos(dec);
    let (sin_lat, cos_lat) = libm::sincos(lat);

    let x = cos_dec * sin_ha;
    let y = sin_lat * cos_dec * cos_ha - cos_lat * sin_dec;
    let z = sin_lat * sin_dec + cos_lat * cos_dec * cos_ha;

    let az = wrap_0_2pi(libm::atan2(x, y));
    let el = libm::atan2(z, libm::sqrt(x * x + y * y));
    (az, el)
}

/// Azimuth and elevation to (hour angle, declination); inverse of
/// [`equatorial_to_horizontal`].
pub fn horizontal_to_equatorial(az: f64, el: f64, lat: f64) -> (f64, f64) {
    let (sin_az, cos_az) = libm::sincos(az);
    let (sin_el, cos_el) = libm::sincos(el);
    let (sin_lat, cos_lat) = libm::sincos(lat);

    let x = cos_el * sin_az;
    let y = sin_lat * cos_el * cos_az + cos_lat * sin_el;
    let z = sin_lat * sin_el - cos_lat * cos_el * cos_az;

    let ha = wrap_signed(libm::atan2(x, y));
    let dec = libm::atan2(z, libm::sqrt(x * x + y * y));
    (ha, dec)
}

/// Great-circle distance between two points, in [0, π].
///
/// Stays well conditioned for tiny separations, near the poles and for
/// longitude differences close to π.
#[inline]
pub fn angular_separation(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (sin_lat1, cos_lat1) = libm::sincos(lat1);
    let (sin_lat2, cos_lat2) = libm::sincos(lat2);
    let (sin_dlon, cos_dlon) = libm::sincos(lon2 - lon1);

    let x = cos_lat1 * sin_lat2 - sin_lat1 * cos_lat2 * cos_dlon;
    let y = cos_lat2 * sin_dlon;
    let z = sin_lat1 * sin_lat2 + cos_lat1 * cos_lat2 * cos_dlon;

    libm::atan2(libm::sqrt(x * x + y * y), z)
}

/// Folds a degree difference into (−180, 180].
pub fn normalize_signed_degrees(x: f64) -> f64 {
    let w = libm::fmod(x, 360.0);
    if w > 180.0 {
        w - 360.0
    } else if w <= -180.0 {
        w + 360.0
    } else {
        w
    }
}

/// Radian twin of [`normalize_signed_degrees`].
#[inline]
pub fn normalize_signed(x: f64) -> f64 {
    wrap_signed(x)
}

/// Declination read past the pole, in degrees: `sign(dec)·180 − dec`.
pub fn flipped_declination(dec: f64) -> f64 {
    dec.signum() * 180.0 - dec
}

/// Folds a (longitude, declination) pair in degrees whose declination lies
/// beyond ±90° back onto the sphere: declination through
/// [`flipped_declination`], longitude shifted by 180° into [0, 360).
///
/// Returns the folded pair and whether a fold happened.
pub fn fold_flipped(lon: f64, dec: f64) -> (f64, f64, bool) {
    if dec.abs() > 90.0 {
        let lon = (lon + 180.0).rem_euclid(360.0);
        (lon, flipped_declination(dec), true)
    } else {
        (lon, dec, false)
    }
}

/// Zenith distance for an elevation.
#[inline]
pub fn zenith_distance(el: f64) -> f64 {
    FRAC_PI_2 - el
}
