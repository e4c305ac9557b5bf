//! Summary statistics of residual columns, printed in arcseconds.

use core::fmt;

use crate::angle::Angle;
use crate::observation::{AxisResidual, ObservationSet};
use crate::solver::FitResult;
use crate::spherical::angular_separation;

/// Statistics of one column, radians. `stdev` is the population deviation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColumnStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub rms: f64,
    pub stdev: f64,
}

impl ColumnStats {
    /// `None` for an empty column.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / n;
        let rms = (values.iter().map(|v| v * v).sum::<f64>() / n).sqrt();
        let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        Some(Self {
            min,
            max,
            mean,
            rms,
            stdev: var.sqrt(),
        })
    }
}

impl fmt::Display for ColumnStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = |v: f64| Angle::from_radians(v).arcseconds();
        write!(
            f,
            "{:>9.3}\" {:>9.3}\" {:>9.3}\" {:>9.3}\" {:>9.3}\"",
            a(self.min),
            a(self.max),
            a(self.mean),
            a(self.rms),
            a(self.stdev)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportSection {
    pub title: &'static str,
    pub rows: Vec<(&'static str, ColumnStats)>,
}

/// Residual statistics of an observation set, optionally with the columns
/// of a fit against it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualReport {
    pub observations: usize,
    pub sections: Vec<ReportSection>,
}

impl ResidualReport {
    /// Target minus measured, no model.
    pub fn from_observations(set: &ObservationSet) -> Self {
        let raw: Vec<AxisResidual> = set.samples().iter().map(|s| s.raw_residual()).collect();
        let hadec: Vec<f64> = set
            .samples()
            .iter()
            .map(|s| {
                let (t, m) = (s.target_axes(), s.measured_axes());
                angular_separation(t.ha, t.dec, m.ha, m.dec)
            })
            .collect();
        let altaz: Vec<f64> = set
            .samples()
            .iter()
            .map(|s| {
                let (t, m) = (s.target_axes(), s.measured_axes());
                angular_separation(t.az, t.el, m.az, m.el)
            })
            .collect();

        let mut rows = axis_rows(&raw);
        push_row(&mut rows, "ANGULAR HADEC SEP", &hadec);
        push_row(&mut rows, "ANGULAR ALTAZ SEP", &altaz);
        Self {
            observations: set.len(),
            sections: vec![ReportSection {
                title: "OBSERVATION DATA",
                rows,
            }],
        }
    }

    /// Adds the model residual columns of `fit`.
    pub fn with_fit(set: &ObservationSet, fit: &FitResult) -> Self {
        let mut report = Self::from_observations(set);
        let mut rows = axis_rows(&fit.residuals_per_sample);
        push_row(&mut rows, "ANGULAR SEP", &fit.angular_residuals_per_sample);
        report.sections.push(ReportSection { title: "MODEL", rows });
        report
    }
}

fn axis_rows(residuals: &[AxisResidual]) -> Vec<(&'static str, ColumnStats)> {
    let column = |f: fn(&AxisResidual) -> f64| residuals.iter().map(f).collect::<Vec<f64>>();
    let mut rows = Vec::new();
    push_row(&mut rows, "HA", &column(|r| r.ha));
    push_row(&mut rows, "HA CORRECTED", &column(|r| r.ha_corrected));
    push_row(&mut rows, "DEC", &column(|r| r.dec));
    push_row(&mut rows, "AZ", &column(|r| r.az));
    push_row(&mut rows, "AZ CORRECTED", &column(|r| r.az_corrected));
    push_row(&mut rows, "ALT", &column(|r| r.el));
    rows
}

fn push_row(rows: &mut Vec<(&'static str, ColumnStats)>, label: &'static str, values: &[f64]) {
    if let Some(stats) = ColumnStats::from_values(values) {
        rows.push((label, stats));
    }
}

impl fmt::Display for ResidualReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "OBSERVATIONS {:.>14} {}", "", self.observations)?;
        for section in &self.sections {
            writeln!(f)?;
            writeln!(f, "=========== {} ===========", section.title)?;
            writeln!(
                f,
                "{:27}{:>9}  {:>9}  {:>9}  {:>9}  {:>9}",
                "", "MIN", "MAX", "MEAN", "RMS", "STDEV"
            )?;
            for (label, stats) in &section.rows {
                writeln!(f, "{:.<26} {}", format!("{} ", label), stats)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{Convention, Position, Sample, Site};

    #[test]
    fn known_vector() {
        let s = ColumnStats::from_values(&[1.0, -1.0, 3.0, 1.0]).unwrap();
        assert_eq!(s.min, -1.0);
        assert_eq!(s.max, 3.0);
        assert_eq!(s.mean, 1.0);
        assert!((s.rms - 3f64.sqrt()).abs() < 1e-15);
        assert!((s.stdev - 2f64.sqrt()).abs() < 1e-15);
    }

    #[test]
    fn empty_column() {
        assert!(ColumnStats::from_values(&[]).is_none());
    }

    #[test]
    fn report_of_offset_data() {
        let lat = 0.5;
        let mut set = ObservationSet::new(Site::with_latitude(Angle::from_radians(lat)), Convention::Equatorial);
        for i in 0..4 {
            let t = Position::equatorial(Angle::from_radians(i as f64 * 0.2), Angle::ZERO);
            let m = t.offset_by(0.0, -Angle::from_arcseconds(10.0).radians());
            set.push(Sample::new(t, m, lat).unwrap()).unwrap();
        }
        let report = ResidualReport::from_observations(&set);
        assert_eq!(report.observations, 4);
        let rows = &report.sections[0].rows;
        let dec = rows.iter().find(|(l, _)| *l == "DEC").unwrap().1;
        assert!((Angle::from_radians(dec.mean).arcseconds() - 10.0).abs() < 1e-9);
        assert!(dec.stdev < 1e-15);
        let sep = rows.iter().find(|(l, _)| *l == "ANGULAR HADEC SEP").unwrap().1;
        assert!((Angle::from_radians(sep.max).arcseconds() - 10.0).abs() < 1e-6);

        let text = report.to_string();
        assert!(text.contains("OBSERVATION DATA"));
        assert!(text.contains("10.000\""));
    }
}
