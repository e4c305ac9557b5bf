use crate::angle::{wrap_0_2pi, wrap_signed, Angle};
use crate::error::{Error, Result};
use crate::spherical::{angular_separation, equatorial_to_horizontal, horizontal_to_equatorial};

/// Which pair of axes a position is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Convention {
    /// Hour angle and declination.
    Equatorial,
    /// Azimuth (from south, through west) and elevation.
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    convention: Convention,
    first: Angle,
    second: Angle,
}

impl Position {
    pub fn equatorial(ha: Angle, dec: Angle) -> Self {
        Self {
            convention: Convention::Equatorial,
            first: ha,
            second: dec,
        }
    }

    pub fn horizontal(az: Angle, el: Angle) -> Self {
        Self {
            convention: Convention::Horizontal,
            first: az,
            second: el,
        }
    }

    pub fn convention(&self) -> Convention {
        self.convention
    }

    /// Hour angle or azimuth.
    pub fn first(&self) -> Angle {
        self.first
    }

    /// Declination or elevation.
    pub fn second(&self) -> Angle {
        self.second
    }

    /// Shifts both axes, keeping the longitude-like one in its usual range.
    pub fn offset_by(&self, d1: f64, d2: f64) -> Self {
        let first = self.first.radians() + d1;
        let first = match self.convention {
            Convention::Equatorial => wrap_signed(first),
            Convention::Horizontal => wrap_0_2pi(first),
        };
        Self {
            convention: self.convention,
            first: Angle::from_radians(first),
            second: Angle::from_radians(self.second.radians() + d2),
        }
    }
}

/// A position in both conventions, radians.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DerivedAxes {
    pub ha: f64,
    pub dec: f64,
    pub az: f64,
    pub el: f64,
}

impl DerivedAxes {
    pub fn from_position(position: &Position, lat: f64) -> Self {
        let a = position.first.radians();
        let b = position.second.radians();
        match position.convention {
            Convention::Equatorial => {
                let (az, el) = equatorial_to_horizontal(a, b, lat);
                Self { ha: a, dec: b, az, el }
            }
            Convention::Horizontal => {
                let (ha, dec) = horizontal_to_equatorial(a, b, lat);
                Self { ha, dec, az: a, el: b }
            }
        }
    }

    /// The (longitude, latitude) pair of one convention.
    pub fn native(&self, convention: Convention) -> (f64, f64) {
        match convention {
            Convention::Equatorial => (self.ha, self.dec),
            Convention::Horizontal => (self.az, self.el),
        }
    }
}

/// Per-axis difference `from − to` in both conventions, radians.
///
/// Longitude differences are folded into (−π, π]; the `_corrected`
/// variants are scaled by the cosine of the latitude-like axis so they
/// measure distance on the sky.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AxisResidual {
    pub ha: f64,
    pub ha_corrected: f64,
    pub dec: f64,
    pub az: f64,
    pub az_corrected: f64,
    pub el: f64,
}

impl AxisResidual {
    pub fn between(from: &DerivedAxes, to: &DerivedAxes) -> Self {
        let ha = wrap_signed(from.ha - to.ha);
        let az = wrap_signed(from.az - to.az);
        Self {
            ha,
            ha_corrected: ha * from.dec.cos(),
            dec: from.dec - to.dec,
            az,
            az_corrected: az * from.el.cos(),
            el: from.el - to.el,
        }
    }
}

/// Observing site. Only the latitude enters any computation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Site {
    pub latitude: Angle,
    pub longitude: Option<Angle>,
    pub altitude: Option<f64>,
}

impl Site {
    pub fn with_latitude(latitude: Angle) -> Self {
        Self {
            latitude,
            longitude: None,
            altitude: None,
        }
    }
}

/// One pointing observation: where the telescope should have been and
/// where the mount said it was.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sample {
    target: Position,
    measured: Position,
    target_axes: DerivedAxes,
    measured_axes: DerivedAxes,
    pub mjd: Option<f64>,
    pub id: Option<String>,
    pub source_line: Option<usize>,
    /// The mount reading was taken past the pole and folded back.
    pub flipped: bool,
}

impl Sample {
    pub fn new(target: Position, measured: Position, lat: f64) -> Result<Self> {
        if target.convention != measured.convention {
            return Err(Error::Configuration(format!(
                "target is {:?} but measured is {:?}",
                target.convention, measured.convention
            )));
        }
        Ok(Self {
            target_axes: DerivedAxes::from_position(&target, lat),
            measured_axes: DerivedAxes::from_position(&measured, lat),
            target,
            measured,
            mjd: None,
            id: None,
            source_line: None,
            flipped: false,
        })
    }

    pub fn target(&self) -> &Position {
        &self.target
    }

    pub fn measured(&self) -> &Position {
        &self.measured
    }

    pub fn convention(&self) -> Convention {
        self.target.convention
    }

    pub fn target_axes(&self) -> &DerivedAxes {
        &self.target_axes
    }

    pub fn measured_axes(&self) -> &DerivedAxes {
        &self.measured_axes
    }

    /// Target minus measured, before any model is applied.
    pub fn raw_residual(&self) -> AxisResidual {
        AxisResidual::between(&self.target_axes, &self.measured_axes)
    }

    /// Great-circle distance between target and measured, in the sample's
    /// own convention.
    pub fn raw_separation(&self) -> f64 {
        let (t1, t2) = self.target_axes.native(self.convention());
        let (m1, m2) = self.measured_axes.native(self.convention());
        angular_separation(t1, t2, m1, m2)
    }
}

/// Which mount side to keep, by the `flipped` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PierFilter {
    #[default]
    Both,
    Flipped,
    Normal,
}

#[derive(Debug, Clone)]
pub struct ObservationSet {
    samples: Vec<Sample>,
    site: Site,
    convention: Convention,
}

impl ObservationSet {
    pub fn new(site: Site, convention: Convention) -> Self {
        Self {
            samples: Vec::new(),
            site,
            convention,
        }
    }

    pub fn push(&mut self, sample: Sample) -> Result<()> {
        if sample.convention() != self.convention {
            return Err(Error::Configuration(format!(
                "cannot add {:?} sample to {:?} set",
                sample.convention(),
                self.convention
            )));
        }
        self.samples.push(sample);
        Ok(())
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    /// Site latitude in radians.
    pub fn latitude(&self) -> f64 {
        self.site.latitude.radians()
    }

    pub fn convention(&self) -> Convention {
        self.convention
    }

    /// Cached (target, measured) axes of one sample.
    pub fn derived_axes(&self, index: usize) -> Result<(DerivedAxes, DerivedAxes)> {
        self.samples
            .get(index)
            .map(|s| (s.target_axes, s.measured_axes))
            .ok_or_else(|| out_of_range(index, self.samples.len()))
    }

    /// Removes a sample, shifting the ones after it.
    pub fn remove(&mut self, index: usize) -> Result<Sample> {
        if index >= self.samples.len() {
            return Err(out_of_range(index, self.samples.len()));
        }
        Ok(self.samples.remove(index))
    }

    /// Puts a sample back at `index`, shifting the ones after it.
    pub fn insert(&mut self, index: usize, sample: Sample) -> Result<()> {
        if index > self.samples.len() {
            return Err(out_of_range(index, self.samples.len()));
        }
        if sample.convention() != self.convention {
            return Err(Error::Configuration(format!(
                "cannot add {:?} sample to {:?} set",
                sample.convention(),
                self.convention
            )));
        }
        self.samples.insert(index, sample);
        Ok(())
    }

    /// Drops samples from the unwanted side, returning how many went.
    pub fn retain_side(&mut self, side: PierFilter) -> usize {
        let before = self.samples.len();
        match side {
            PierFilter::Both => {}
            PierFilter::Flipped => self.samples.retain(|s| s.flipped),
            PierFilter::Normal => self.samples.retain(|s| !s.flipped),
        }
        before - self.samples.len()
    }
}

fn out_of_range(index: usize, len: usize) -> Error {
    Error::Configuration(format!("sample index {} out of range ({} samples)", index, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eq(ha_deg: f64, dec_deg: f64) -> Position {
        Position::equatorial(Angle::from_degrees(ha_deg), Angle::from_degrees(dec_deg))
    }

    fn set_of(n: usize) -> ObservationSet {
        let lat = 0.5;
        let mut set = ObservationSet::new(Site::with_latitude(Angle::from_radians(lat)), Convention::Equatorial);
        for i in 0..n {
            let mut s = Sample::new(eq(i as f64, 10.0), eq(i as f64, 10.1), lat).unwrap();
            s.id = Some(format!("obs{}", i));
            s.flipped = i % 2 == 1;
            set.push(s).unwrap();
        }
        set
    }

    #[test]
    fn mixed_conventions_rejected() {
        let h = Position::horizontal(Angle::ZERO, Angle::from_degrees(30.0));
        assert!(matches!(
            Sample::new(eq(0.0, 0.0), h, 0.5),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn push_checks_set_convention() {
        let mut set = set_of(0);
        let h = Position::horizontal(Angle::ZERO, Angle::from_degrees(30.0));
        let s = Sample::new(h, h, 0.5).unwrap();
        assert!(set.push(s).is_err());
    }

    #[test]
    fn derived_axes_cover_both_conventions() {
        let lat = 40f64.to_radians();
        let s = Sample::new(eq(0.0, 10.0), eq(0.0, 10.0), lat).unwrap();
        let axes = s.target_axes();
        assert!((axes.el - 60f64.to_radians()).abs() < 1e-12);
        assert!(axes.az.abs() < 1e-12 || (axes.az - std::f64::consts::TAU).abs() < 1e-12);
        assert_eq!(axes.dec, 10f64.to_radians());
    }

    #[test]
    fn horizontal_sample_derives_hour_angle() {
        let lat = 40f64.to_radians();
        let p = Position::horizontal(Angle::ZERO, Angle::from_degrees(60.0));
        let s = Sample::new(p, p, lat).unwrap();
        assert!(s.target_axes().ha.abs() < 1e-12);
        assert!((s.target_axes().dec - 10f64.to_radians()).abs() < 1e-12);
    }

    #[test]
    fn raw_residual_wraps_longitude() {
        let lat = 0.3;
        let s = Sample::new(eq(179.0, 0.0), eq(-179.0, 0.0), lat).unwrap();
        let r = s.raw_residual();
        assert!((r.ha - (-2f64).to_radians()).abs() < 1e-12);
        assert!((r.ha_corrected - r.ha).abs() < 1e-15);
        assert!((s.raw_separation() - 2f64.to_radians()).abs() < 1e-12);
    }

    #[test]
    fn offset_by_wraps_first_axis() {
        let p = eq(179.0, 0.0).offset_by(2f64.to_radians(), 0.1);
        assert!((p.first().degrees() + 179.0).abs() < 1e-9);
        assert!((p.second().radians() - 0.1).abs() < 1e-15);
        let h = Position::horizontal(Angle::from_degrees(359.0), Angle::ZERO).offset_by(2f64.to_radians(), 0.0);
        assert!((h.first().degrees() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn remove_shifts_and_returns() {
        let mut set = set_of(4);
        let removed = set.remove(1).unwrap();
        assert_eq!(removed.id.as_deref(), Some("obs1"));
        assert_eq!(set.len(), 3);
        assert_eq!(set.samples()[1].id.as_deref(), Some("obs2"));
    }

    #[test]
    fn insert_undoes_remove() {
        let mut set = set_of(4);
        let removed = set.remove(2).unwrap();
        set.insert(2, removed).unwrap();
        let ids: Vec<&str> = set.samples().iter().filter_map(|s| s.id.as_deref()).collect();
        assert_eq!(ids, ["obs0", "obs1", "obs2", "obs3"]);
        let extra = set.remove(0).unwrap();
        assert!(matches!(set.insert(5, extra), Err(Error::Configuration(_))));
    }

    #[test]
    fn remove_out_of_range() {
        let mut set = set_of(2);
        assert!(matches!(set.remove(2), Err(Error::Configuration(_))));
        assert!(set.derived_axes(5).is_err());
        assert!(set.derived_axes(1).is_ok());
    }

    #[test]
    fn pier_side_filter() {
        let mut set = set_of(5);
        assert_eq!(set.retain_side(PierFilter::Both), 0);
        assert_eq!(set.retain_side(PierFilter::Normal), 2);
        assert!(set.samples().iter().all(|s| !s.flipped));
        assert_eq!(set.retain_side(PierFilter::Flipped), 3);
        assert!(set.is_empty());
    }
}
