//! Condon (1992) alt-azimuth terms.
//!
//! Jacobians are `(∂Δaz/∂p, ∂Δel/∂p)` at target azimuth `A` (from south,
//! through west) and elevation `E`.

use super::Term;
use crate::observation::DerivedAxes;

pub struct IA;
pub struct TN;
pub struct TE;
pub struct NPAE;
pub struct NPOA;
pub struct IE;
pub struct TF;

/// The ALTAZ terms in model-file order.
pub fn base_terms() -> Vec<Box<dyn Term>> {
    vec![
        Box::new(IA),
        Box::new(TN),
        Box::new(TE),
        Box::new(NPAE),
        Box::new(NPOA),
        Box::new(IE),
        Box::new(TF),
    ]
}

impl Term for IA {
    fn name(&self) -> &str { "ia" }
    fn description(&self) -> &str { "Azimuth zero point" }
    fn jacobian(&self, _axes: &DerivedAxes, _lat: f64) -> (f64, f64) {
        (-1.0, 0.0)
    }
}

impl Term for TN {
    fn name(&self) -> &str { "tn" }
    fn description(&self) -> &str { "Azimuth axis tilt to north" }
    fn jacobian(&self, axes: &DerivedAxes, _lat: f64) -> (f64, f64) {
        let (sin_a, cos_a) = axes.az.sin_cos();
        (sin_a * axes.el.tan(), cos_a)
    }
}

impl Term for TE {
    fn name(&self) -> &str { "te" }
    fn description(&self) -> &str { "Azimuth axis tilt to east" }
    fn jacobian(&self, axes: &DerivedAxes, _lat: f64) -> (f64, f64) {
        let (sin_a, cos_a) = axes.az.sin_cos();
        (-cos_a * axes.el.tan(), sin_a)
    }
}

impl Term for NPAE {
    fn name(&self) -> &str { "npae" }
    fn description(&self) -> &str { "Az/El non-perpendicularity" }
    fn jacobian(&self, axes: &DerivedAxes, _lat: f64) -> (f64, f64) {
        (-axes.el.tan(), 0.0)
    }
}

impl Term for NPOA {
    fn name(&self) -> &str { "npoa" }
    fn description(&self) -> &str { "Optical axis non-perpendicularity" }
    fn jacobian(&self, axes: &DerivedAxes, _lat: f64) -> (f64, f64) {
        (1.0 / axes.el.cos(), 0.0)
    }
}

impl Term for IE {
    fn name(&self) -> &str { "ie" }
    fn description(&self) -> &str { "Elevation zero point" }
    fn jacobian(&self, _axes: &DerivedAxes, _lat: f64) -> (f64, f64) {
        (0.0, -1.0)
    }
}

impl Term for TF {
    fn name(&self) -> &str { "tf" }
    fn description(&self) -> &str { "Tube flexure" }
    fn jacobian(&self, axes: &DerivedAxes, _lat: f64) -> (f64, f64) {
        (0.0, axes.el.cos())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(az_deg: f64, el_deg: f64) -> DerivedAxes {
        DerivedAxes {
            ha: 0.0,
            dec: 0.0,
            az: az_deg.to_radians(),
            el: el_deg.to_radians(),
        }
    }

    #[test]
    fn order_matches_model_file() {
        let names: Vec<String> = base_terms().iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names, ["ia", "tn", "te", "npae", "npoa", "ie", "tf"]);
    }

    #[test]
    fn tilt_north_looking_south() {
        let (da, de) = TN.jacobian(&at(0.0, 45.0), 0.0);
        assert!(da.abs() < 1e-15);
        assert!((de - 1.0).abs() < 1e-15);
    }

    #[test]
    fn tilt_east_looking_west() {
        let (da, de) = TE.jacobian(&at(90.0, 45.0), 0.0);
        assert!(da.abs() < 1e-15);
        assert!((de - 1.0).abs() < 1e-15);
    }

    #[test]
    fn non_perpendicularity_at_45() {
        let axes = at(10.0, 45.0);
        let (da, _) = NPAE.jacobian(&axes, 0.0);
        assert!((da + 1.0).abs() < 1e-12);
        let (da, _) = NPOA.jacobian(&axes, 0.0);
        assert!((da - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn flexure_largest_at_horizon() {
        assert_eq!(TF.jacobian(&at(0.0, 0.0), 0.0), (0.0, 1.0));
        let (_, de) = TF.jacobian(&at(0.0, 90.0), 0.0);
        assert!(de.abs() < 1e-15);
    }
}
