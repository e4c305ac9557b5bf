//! Iterative removal of the worst-fitting observation.

use core::fmt;
use core::str::FromStr;

use tracing::{info, warn};

use crate::angle::Angle;
use crate::error::{Error, Result};
use crate::model::PointingModel;
use crate::observation::{ObservationSet, Sample};
use crate::solver::{fit, FitConfig, FitResult};

/// Target minus measured column, before any model is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RawColumn {
    Ha,
    HaCorrected,
    Dec,
    Az,
    AzCorrected,
    El,
    Angular,
}

/// Which residuals the filter ranks samples by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AxisSelector {
    /// Model residual in azimuth (scaled by cos el), then elevation.
    Horizontal,
    /// Model residual in hour angle (scaled by cos dec), then declination.
    Equatorial,
    /// Model angular residual.
    Angular,
    Raw(RawColumn),
}

impl AxisSelector {
    /// Residual columns, in tie-break order.
    fn columns(&self, set: &ObservationSet, result: &FitResult) -> Vec<Vec<f64>> {
        let model = &result.residuals_per_sample;
        match self {
            AxisSelector::Horizontal => vec![
                model.iter().map(|r| r.az_corrected).collect(),
                model.iter().map(|r| r.el).collect(),
            ],
            AxisSelector::Equatorial => vec![
                model.iter().map(|r| r.ha_corrected).collect(),
                model.iter().map(|r| r.dec).collect(),
            ],
            AxisSelector::Angular => vec![result.angular_residuals_per_sample.clone()],
            AxisSelector::Raw(column) => {
                vec![set.samples().iter().map(|s| raw_value(s, *column)).collect()]
            }
        }
    }
}

fn raw_value(sample: &Sample, column: RawColumn) -> f64 {
    let r = sample.raw_residual();
    match column {
        RawColumn::Ha => r.ha,
        RawColumn::HaCorrected => r.ha_corrected,
        RawColumn::Dec => r.dec,
        RawColumn::Az => r.az,
        RawColumn::AzCorrected => r.az_corrected,
        RawColumn::El => r.el,
        RawColumn::Angular => sample.raw_separation(),
    }
}

impl FromStr for AxisSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "m-azel" | "m-altaz" => AxisSelector::Horizontal,
            "m-hadec" => AxisSelector::Equatorial,
            "model-err" => AxisSelector::Angular,
            "ha-err" => AxisSelector::Raw(RawColumn::Ha),
            "ha-corr-err" => AxisSelector::Raw(RawColumn::HaCorrected),
            "dec-err" => AxisSelector::Raw(RawColumn::Dec),
            "az-err" => AxisSelector::Raw(RawColumn::Az),
            "az-corr-err" => AxisSelector::Raw(RawColumn::AzCorrected),
            "alt-err" => AxisSelector::Raw(RawColumn::El),
            "real-err" => AxisSelector::Raw(RawColumn::Angular),
            _ => return Err(Error::Configuration(format!("unknown axis selector: {}", s))),
        })
    }
}

impl fmt::Display for AxisSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AxisSelector::Horizontal => "m-azel",
            AxisSelector::Equatorial => "m-hadec",
            AxisSelector::Angular => "model-err",
            AxisSelector::Raw(RawColumn::Ha) => "ha-err",
            AxisSelector::Raw(RawColumn::HaCorrected) => "ha-corr-err",
            AxisSelector::Raw(RawColumn::Dec) => "dec-err",
            AxisSelector::Raw(RawColumn::Az) => "az-err",
            AxisSelector::Raw(RawColumn::AzCorrected) => "az-corr-err",
            AxisSelector::Raw(RawColumn::El) => "alt-err",
            AxisSelector::Raw(RawColumn::Angular) => "real-err",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FilterConfig {
    pub selector: AxisSelector,
    /// Samples whose worst residual is at or above this are removed.
    pub threshold: Angle,
    pub max_removals: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            selector: AxisSelector::Angular,
            threshold: Angle::from_arcseconds(60.0),
            max_removals: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterOutcome {
    /// Removed samples, in removal order.
    pub removed: Vec<Sample>,
    /// Fit of the remaining observations.
    pub fit: FitResult,
}

/// Fits, drops the sample with the largest selected residual, and refits,
/// until the largest residual is below the threshold or `max_removals`
/// samples are gone.
///
/// A removal that leaves a set the model cannot be fit to is undone and
/// ends the loop; the outcome then describes the last successful fit.
pub fn filter(
    model: &mut PointingModel,
    observations: &mut ObservationSet,
    config: &FilterConfig,
    fit_config: &FitConfig,
) -> Result<FilterOutcome> {
    let threshold = config.threshold.radians();
    let mut removed = Vec::new();
    let mut result = fit(model, observations, fit_config)?;

    while removed.len() < config.max_removals {
        let columns = config.selector.columns(observations, &result);
        let Some((index, magnitude)) = worst(&columns) else {
            break;
        };
        if magnitude < threshold {
            break;
        }
        let sample = observations.remove(index)?;
        match fit(model, observations, fit_config) {
            Ok(refit) => {
                info!(
                    id = sample.id.as_deref().unwrap_or("?"),
                    line = ?sample.source_line,
                    selector = %config.selector,
                    error_arcsec = Angle::from_radians(magnitude).arcseconds(),
                    "removed sample"
                );
                removed.push(sample);
                result = refit;
            }
            Err(err) => {
                warn!(
                    id = sample.id.as_deref().unwrap_or("?"),
                    remaining = observations.len(),
                    %err,
                    "cannot refit without sample, keeping it"
                );
                observations.insert(index, sample)?;
                break;
            }
        }
    }

    Ok(FilterOutcome { removed, fit: result })
}

/// Index and magnitude of the largest absolute value; ties go to the
/// earlier column, then the lower index.
fn worst(columns: &[Vec<f64>]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for column in columns {
        for (i, v) in column.iter().enumerate() {
            let m = v.abs();
            if best.map_or(true, |(_, b)| m > b) {
                best = Some((i, m));
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelFamily;
    use crate::observation::{Convention, Position, Site};

    fn arcsec(v: f64) -> f64 {
        Angle::from_arcseconds(v).radians()
    }

    /// Zero-error GEM data with a few samples pushed off by `bumps`.
    fn dataset(bumps: &[(usize, f64)]) -> ObservationSet {
        let lat = 0.6;
        let mut set = ObservationSet::new(Site::with_latitude(Angle::from_radians(lat)), Convention::Equatorial);
        for i in 0..30 {
            let ha = -2.0 + (i % 10) as f64 * 0.45;
            let dec = -0.5 + (i / 10) as f64 * 0.5;
            let target = Position::equatorial(Angle::from_radians(ha), Angle::from_radians(dec));
            let bump = bumps.iter().find(|(j, _)| *j == i).map_or(0.0, |b| b.1);
            let measured = target.offset_by(0.0, bump);
            let mut s = Sample::new(target, measured, lat).unwrap();
            s.id = Some(format!("s{}", i));
            set.push(s).unwrap();
        }
        set
    }

    #[test]
    fn selector_strings() {
        assert_eq!("m-altaz".parse::<AxisSelector>().unwrap(), AxisSelector::Horizontal);
        assert_eq!("m-azel".parse::<AxisSelector>().unwrap(), AxisSelector::Horizontal);
        assert_eq!("m-hadec".parse::<AxisSelector>().unwrap(), AxisSelector::Equatorial);
        assert_eq!("real-err".parse::<AxisSelector>().unwrap(), AxisSelector::Raw(RawColumn::Angular));
        assert!("temperature".parse::<AxisSelector>().is_err());
        for s in ["m-azel", "m-hadec", "model-err", "ha-err", "ha-corr-err", "dec-err", "az-err", "az-corr-err", "alt-err", "real-err"] {
            assert_eq!(s.parse::<AxisSelector>().unwrap().to_string(), s);
        }
    }

    #[test]
    fn worst_tie_break() {
        let cols = vec![vec![1.0, -3.0, 3.0], vec![0.0, 3.0, 0.5]];
        assert_eq!(worst(&cols), Some((1, 3.0)));
        assert_eq!(worst(&[vec![]]), None);
    }

    #[test]
    fn raw_filter_removes_bumped_samples() {
        let mut set = dataset(&[(4, arcsec(600.0)), (17, arcsec(-900.0))]);
        let mut model = PointingModel::new(ModelFamily::Gem);
        let config = FilterConfig {
            selector: AxisSelector::Raw(RawColumn::Dec),
            threshold: Angle::from_arcseconds(100.0),
            max_removals: 5,
        };
        let outcome = filter(&mut model, &mut set, &config, &FitConfig::default()).unwrap();
        let ids: Vec<&str> = outcome.removed.iter().filter_map(|s| s.id.as_deref()).collect();
        assert_eq!(ids, ["s17", "s4"]);
        assert_eq!(set.len(), 28);
        assert!(outcome.fit.rms < 1e-9);
    }

    #[test]
    fn respects_max_removals() {
        let mut set = dataset(&[(1, arcsec(600.0)), (2, arcsec(700.0)), (3, arcsec(800.0))]);
        let mut model = PointingModel::new(ModelFamily::Gem);
        let config = FilterConfig {
            selector: AxisSelector::Raw(RawColumn::Dec),
            threshold: Angle::from_arcseconds(100.0),
            max_removals: 2,
        };
        let outcome = filter(&mut model, &mut set, &config, &FitConfig::default()).unwrap();
        assert_eq!(outcome.removed.len(), 2);
        assert_eq!(set.len(), 28);
    }

    #[test]
    fn nothing_below_threshold_is_removed() {
        let mut set = dataset(&[(5, arcsec(20.0))]);
        let mut model = PointingModel::new(ModelFamily::Gem);
        let config = FilterConfig {
            selector: AxisSelector::Raw(RawColumn::Angular),
            threshold: Angle::from_arcseconds(30.0),
            max_removals: 10,
        };
        let outcome = filter(&mut model, &mut set, &config, &FitConfig::default()).unwrap();
        assert!(outcome.removed.is_empty());
        assert_eq!(set.len(), 30);
    }

    #[test]
    fn stops_before_data_runs_out() {
        let lat = 0.6;
        let mut set = ObservationSet::new(Site::with_latitude(Angle::from_radians(lat)), Convention::Equatorial);
        for i in 0..5 {
            let target = Position::equatorial(
                Angle::from_radians(-1.5 + i as f64 * 0.7),
                Angle::from_radians(-0.4 + i as f64 * 0.25),
            );
            let bump = if i == 2 { arcsec(500.0) } else { 0.0 };
            let mut s = Sample::new(target, target.offset_by(0.0, bump), lat).unwrap();
            s.id = Some(format!("s{}", i));
            set.push(s).unwrap();
        }
        let before: Vec<Option<String>> = set.samples().iter().map(|s| s.id.clone()).collect();
        let mut model = PointingModel::new(ModelFamily::Gem);
        let config = FilterConfig {
            selector: AxisSelector::Angular,
            threshold: Angle::from_arcseconds(1.0),
            max_removals: 3,
        };
        let outcome = filter(&mut model, &mut set, &config, &FitConfig::default()).unwrap();
        assert!(outcome.removed.is_empty());
        assert_eq!(set.len(), 5);
        let after: Vec<Option<String>> = set.samples().iter().map(|s| s.id.clone()).collect();
        assert_eq!(after, before);
        assert_eq!(outcome.fit.angular_residuals_per_sample.len(), 5);
        assert!(model.is_fit());
    }

    #[test]
    fn model_selector_finds_outlier() {
        let mut set = dataset(&[(12, arcsec(1800.0))]);
        let mut model = PointingModel::new(ModelFamily::Gem);
        let config = FilterConfig {
            selector: AxisSelector::Equatorial,
            threshold: Angle::from_arcseconds(1.0),
            max_removals: 3,
        };
        let outcome = filter(&mut model, &mut set, &config, &FitConfig::default()).unwrap();
        assert_eq!(outcome.removed.len(), 1);
        assert_eq!(outcome.removed[0].id.as_deref(), Some("s12"));
        assert!(outcome.fit.rms < arcsec(0.01));

        let again = filter(&mut model, &mut set, &config, &FitConfig::default()).unwrap();
        assert!(again.removed.is_empty());
    }
}
