//! Base terms of the 9-parameter German equatorial model.
//!
//! Every jacobian returns `(∂Δha/∂p, ∂Δdec/∂p)`, evaluated at the target
//! hour angle `h` and declination `δ`; `φ` is the site latitude.

use super::Term;
use crate::observation::DerivedAxes;

pub struct ID;
pub struct ME;
pub struct MA;
pub struct TF;
pub struct IH;
pub struct CH;
pub struct NP;
pub struct DAF;
pub struct FO;

/// The GEM terms in model-file order.
pub fn base_terms() -> Vec<Box<dyn Term>> {
    vec![
        Box::new(ID),
        Box::new(ME),
        Box::new(MA),
        Box::new(TF),
        Box::new(IH),
        Box::new(CH),
        Box::new(NP),
        Box::new(DAF),
        Box::new(FO),
    ]
}

impl Term for ID {
    fn name(&self) -> &str { "id" }
    fn description(&self) -> &str { "Declination zero point" }
    fn jacobian(&self, _axes: &DerivedAxes, _lat: f64) -> (f64, f64) {
        (0.0, -1.0)
    }
}

impl Term for ME {
    fn name(&self) -> &str { "me" }
    fn description(&self) -> &str { "Polar axis elevation error" }
    fn jacobian(&self, axes: &DerivedAxes, _lat: f64) -> (f64, f64) {
        (-axes.ha.sin() * axes.dec.tan(), -axes.ha.cos())
    }
}

impl Term for MA {
    fn name(&self) -> &str { "ma" }
    fn description(&self) -> &str { "Polar axis azimuth error" }
    fn jacobian(&self, axes: &DerivedAxes, _lat: f64) -> (f64, f64) {
        (axes.ha.cos() * axes.dec.tan(), -axes.ha.sin())
    }
}

impl Term for TF {
    fn name(&self) -> &str { "tf" }
    fn description(&self) -> &str { "Tube flexure" }
    fn jacobian(&self, axes: &DerivedAxes, lat: f64) -> (f64, f64) {
        let (sin_h, cos_h) = axes.ha.sin_cos();
        let (sin_d, cos_d) = axes.dec.sin_cos();
        let (sin_p, cos_p) = lat.sin_cos();
        (
            -cos_p * sin_h / cos_d,
            -(cos_p * sin_d * cos_h - sin_p * cos_d),
        )
    }
}

impl Term for IH {
    fn name(&self) -> &str { "ih" }
    fn description(&self) -> &str { "Hour angle zero point" }
    fn jacobian(&self, _axes: &DerivedAxes, _lat: f64) -> (f64, f64) {
        (-1.0, 0.0)
    }
}

impl Term for CH {
    fn name(&self) -> &str { "ch" }
    fn description(&self) -> &str { "Collimation error" }
    fn jacobian(&self, axes: &DerivedAxes, _lat: f64) -> (f64, f64) {
        (-1.0 / axes.dec.cos(), 0.0)
    }
}

impl Term for NP {
    fn name(&self) -> &str { "np" }
    fn description(&self) -> &str { "HA/Dec non-perpendicularity" }
    fn jacobian(&self, axes: &DerivedAxes, _lat: f64) -> (f64, f64) {
        (-axes.dec.tan(), 0.0)
    }
}

impl Term for DAF {
    fn name(&self) -> &str { "daf" }
    fn description(&self) -> &str { "Declination axis flexure" }
    fn jacobian(&self, axes: &DerivedAxes, lat: f64) -> (f64, f64) {
        (-(lat.sin() * axes.dec.tan() + lat.cos() * axes.ha.cos()), 0.0)
    }
}

impl Term for FO {
    fn name(&self) -> &str { "fo" }
    fn description(&self) -> &str { "Fork flexure" }
    fn jacobian(&self, axes: &DerivedAxes, _lat: f64) -> (f64, f64) {
        (0.0, -axes.ha.cos())
    }
}
