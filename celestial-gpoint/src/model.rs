use core::fmt;

use crate::angle::Angle;
use crate::error::{Error, Result};
use crate::observation::{Convention, DerivedAxes, Position, Sample};
use crate::spherical::angular_separation;
use crate::terms::{altaz, equatorial, BasisTerm, Term};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModelFamily {
    /// German equatorial mount, 9 base terms.
    Gem,
    /// Alt-azimuth mount, 7 base terms.
    Altaz,
}

impl ModelFamily {
    pub fn for_convention(convention: Convention) -> Self {
        match convention {
            Convention::Equatorial => ModelFamily::Gem,
            Convention::Horizontal => ModelFamily::Altaz,
        }
    }

    pub fn convention(self) -> Convention {
        match self {
            ModelFamily::Gem => Convention::Equatorial,
            ModelFamily::Altaz => Convention::Horizontal,
        }
    }

    /// Base terms in model-file order.
    pub fn base_terms(self) -> Vec<Box<dyn Term>> {
        match self {
            ModelFamily::Gem => equatorial::base_terms(),
            ModelFamily::Altaz => altaz::base_terms(),
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            ModelFamily::Gem => "RTS2_GEM",
            ModelFamily::Altaz => "RTS2_ALTAZ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModelState {
    #[default]
    Unfit,
    Fit,
}

/// Named coefficient values, radians, in model order: base terms first,
/// then extra terms in insertion order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterVector {
    names: Vec<String>,
    values: Vec<f64>,
}

impl ParameterVector {
    pub(crate) fn new(names: Vec<String>, values: Vec<f64>) -> Self {
        Self { names, values }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
            .map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names.iter().map(String::as_str).zip(self.values.iter().copied())
    }
}

impl fmt::Display for ParameterVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            writeln!(f, "{:>24} {:>12.2}\"", name, Angle::from_radians(value).arcseconds())?;
        }
        Ok(())
    }
}

/// A pointing model definition together with its working coefficients.
///
/// Coefficients are kept for every parameter at all times (new ones start
/// at 0), but are only exposed as a [`ParameterVector`] once a fit has
/// produced them.
pub struct PointingModel {
    family: ModelFamily,
    base: Vec<Box<dyn Term>>,
    extra: Vec<BasisTerm>,
    values: Vec<f64>,
    fixed: Vec<bool>,
    state: ModelState,
}

impl PointingModel {
    pub fn new(family: ModelFamily) -> Self {
        let base = family.base_terms();
        let n = base.len();
        Self {
            family,
            base,
            extra: Vec::new(),
            values: vec![0.0; n],
            fixed: vec![false; n],
            state: ModelState::Unfit,
        }
    }

    /// Model with known coefficients, e.g. read back from a model file.
    pub fn with_coefficients(
        family: ModelFamily,
        base_values: &[f64],
        extra: Vec<(BasisTerm, f64)>,
    ) -> Result<Self> {
        let mut model = Self::new(family);
        if base_values.len() != model.base.len() {
            return Err(Error::Configuration(format!(
                "{} needs {} base parameters, got {}",
                family.type_name(),
                model.base.len(),
                base_values.len()
            )));
        }
        model.values.copy_from_slice(base_values);
        for (term, value) in extra {
            model.add_extra_term(term)?;
            if let Some(v) = model.values.last_mut() {
                *v = value;
            }
        }
        model.state = ModelState::Fit;
        Ok(model)
    }

    pub fn family(&self) -> ModelFamily {
        self.family
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    pub fn is_fit(&self) -> bool {
        self.state == ModelState::Fit
    }

    pub fn base_terms(&self) -> &[Box<dyn Term>] {
        &self.base
    }

    pub fn extra_terms(&self) -> &[BasisTerm] {
        &self.extra
    }

    pub fn parameter_count(&self) -> usize {
        self.values.len()
    }

    pub fn parameter_names(&self) -> Vec<String> {
        self.terms().iter().map(|t| t.name().to_string()).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.terms().iter().position(|t| t.name().eq_ignore_ascii_case(name))
    }

    /// Working coefficients, whatever the state.
    pub fn coefficients(&self) -> &[f64] {
        &self.values
    }

    pub fn is_fixed(&self, idx: usize) -> bool {
        self.fixed.get(idx).copied().unwrap_or(false)
    }

    /// Indices of the parameters a fit may adjust.
    pub fn free_indices(&self) -> Vec<usize> {
        (0..self.values.len()).filter(|&i| !self.fixed[i]).collect()
    }

    /// Fitted coefficients; `None` until the model has been fit.
    pub fn parameters(&self) -> Option<ParameterVector> {
        match self.state {
            ModelState::Fit => Some(ParameterVector::new(self.parameter_names(), self.values.clone())),
            ModelState::Unfit => None,
        }
    }

    /// Makes exactly the named parameters variable; every other one is
    /// fixed.
    pub fn set_variable(&mut self, names: &[&str]) -> Result<()> {
        let indices = self.indices_of(names)?;
        for (idx, fixed) in self.fixed.iter_mut().enumerate() {
            *fixed = !indices.contains(&idx);
        }
        Ok(())
    }

    /// Fixes the named parameters, leaving the others as they are.
    pub fn set_fixed(&mut self, names: &[&str]) -> Result<()> {
        for idx in self.indices_of(names)? {
            self.fixed[idx] = true;
        }
        Ok(())
    }

    /// Seeds a coefficient. Combined with [`set_fixed`](Self::set_fixed) this
    /// pins a parameter to a known value for subsequent fits.
    pub fn set_value(&mut self, name: &str, value: f64) -> Result<()> {
        let idx = self
            .index_of(name)
            .ok_or_else(|| Error::UnknownTerm(name.to_string()))?;
        self.values[idx] = value;
        Ok(())
    }

    fn indices_of(&self, names: &[&str]) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|n| self.index_of(n).ok_or_else(|| Error::UnknownTerm(n.to_string())))
            .collect()
    }

    pub fn add_extra_term(&mut self, term: BasisTerm) -> Result<()> {
        if term.axis().convention() != self.family.convention() {
            return Err(Error::Configuration(format!(
                "axis {} does not belong to a {} model",
                term.axis(),
                self.family.type_name()
            )));
        }
        if self.extra.contains(&term) {
            return Err(Error::DuplicatedTerm(term.name().to_string()));
        }
        self.extra.push(term);
        self.values.push(0.0);
        self.fixed.push(false);
        self.state = ModelState::Unfit;
        Ok(())
    }

    pub fn remove_extra_term(&mut self, name: &str) -> Result<BasisTerm> {
        let pos = self
            .extra
            .iter()
            .position(|t| t.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::UnknownTerm(name.to_string()))?;
        let idx = self.base.len() + pos;
        self.values.remove(idx);
        self.fixed.remove(idx);
        self.state = ModelState::Unfit;
        Ok(self.extra.remove(pos))
    }

    /// Correction `(Δ1, Δ2)` at a position given by its derived axes.
    ///
    /// `params` follows [`parameter_names`](Self::parameter_names); missing
    /// trailing values count as zero.
    pub fn correction(&self, params: &[f64], axes: &DerivedAxes, lat: f64) -> (f64, f64) {
        self.terms()
            .into_iter()
            .zip(params)
            .fold((0.0, 0.0), |(d1, d2), (term, &p)| {
                let (j1, j2) = term.jacobian(axes, lat);
                (d1 + p * j1, d2 + p * j2)
            })
    }

    pub fn correction_ha(&self, params: &[f64], ha: f64, dec: f64, lat: f64) -> Result<f64> {
        self.equatorial_correction(params, ha, dec, lat).map(|c| c.0)
    }

    pub fn correction_dec(&self, params: &[f64], ha: f64, dec: f64, lat: f64) -> Result<f64> {
        self.equatorial_correction(params, ha, dec, lat).map(|c| c.1)
    }

    pub fn correction_az(&self, params: &[f64], az: f64, el: f64, lat: f64) -> Result<f64> {
        self.horizontal_correction(params, az, el, lat).map(|c| c.0)
    }

    pub fn correction_el(&self, params: &[f64], az: f64, el: f64, lat: f64) -> Result<f64> {
        self.horizontal_correction(params, az, el, lat).map(|c| c.1)
    }

    fn equatorial_correction(&self, params: &[f64], ha: f64, dec: f64, lat: f64) -> Result<(f64, f64)> {
        let position = Position::equatorial(Angle::from_radians(ha), Angle::from_radians(dec));
        self.check_convention(&position)?;
        Ok(self.correction(params, &DerivedAxes::from_position(&position, lat), lat))
    }

    fn horizontal_correction(&self, params: &[f64], az: f64, el: f64, lat: f64) -> Result<(f64, f64)> {
        let position = Position::horizontal(Angle::from_radians(az), Angle::from_radians(el));
        self.check_convention(&position)?;
        Ok(self.correction(params, &DerivedAxes::from_position(&position, lat), lat))
    }

    /// Target moved by the model correction.
    pub fn corrected_target(&self, params: &[f64], sample: &Sample, lat: f64) -> Position {
        let (d1, d2) = self.correction(params, sample.target_axes(), lat);
        sample.target().offset_by(d1, d2)
    }

    /// Angular distance between the corrected target and the measured
    /// position.
    pub fn residual(&self, params: &[f64], sample: &Sample, lat: f64) -> f64 {
        let (d1, d2) = self.correction(params, sample.target_axes(), lat);
        let (t1, t2) = sample.target_axes().native(self.family.convention());
        let (m1, m2) = sample.measured_axes().native(self.family.convention());
        angular_separation(t1 + d1, t2 + d2, m1, m2)
    }

    /// Correction at `position` with the fitted coefficients.
    pub fn evaluate(&self, position: &Position, lat: f64) -> Result<(Angle, Angle)> {
        self.check_convention(position)?;
        if !self.is_fit() {
            return Err(Error::Configuration("model has not been fitted".into()));
        }
        let axes = DerivedAxes::from_position(position, lat);
        let (d1, d2) = self.correction(&self.values, &axes, lat);
        Ok((Angle::from_radians(d1), Angle::from_radians(d2)))
    }

    /// Where to point the mount so that it lands on `position`.
    pub fn apply(&self, position: &Position, lat: f64) -> Result<Position> {
        let (d1, d2) = self.evaluate(position, lat)?;
        Ok(position.offset_by(d1.radians(), d2.radians()))
    }

    /// Adds another model's coefficients to this one.
    ///
    /// Base coefficients are summed; an extra term present in both has its
    /// coefficients summed, one present only in `other` is appended. The
    /// result counts as fitted only when both inputs were.
    pub fn combine(&mut self, other: &PointingModel) -> Result<()> {
        if self.family != other.family {
            return Err(Error::Configuration(format!(
                "cannot combine {} with {}",
                self.family.type_name(),
                other.family.type_name()
            )));
        }
        let nbase = self.base.len();
        for i in 0..nbase {
            self.values[i] += other.values[i];
        }
        for (pos, term) in other.extra.iter().enumerate() {
            let value = other.values[nbase + pos];
            match self.extra.iter().position(|t| t == term) {
                Some(mine) => self.values[nbase + mine] += value,
                None => {
                    self.extra.push(term.clone());
                    self.values.push(value);
                    self.fixed.push(false);
                }
            }
        }
        if !other.is_fit() {
            self.state = ModelState::Unfit;
        }
        Ok(())
    }

    pub(crate) fn terms(&self) -> Vec<&dyn Term> {
        let mut terms: Vec<&dyn Term> = Vec::with_capacity(self.values.len());
        for t in &self.base {
            terms.push(t.as_ref());
        }
        for t in &self.extra {
            terms.push(t);
        }
        terms
    }

    /// Partial derivatives of the correction for every parameter.
    pub(crate) fn partials(&self, axes: &DerivedAxes, lat: f64) -> Vec<(f64, f64)> {
        self.terms().iter().map(|t| t.jacobian(axes, lat)).collect()
    }

    pub(crate) fn store_fit(&mut self, values: &[f64]) {
        self.values.copy_from_slice(values);
        self.state = ModelState::Fit;
    }

    fn check_convention(&self, position: &Position) -> Result<()> {
        if position.convention() != self.family.convention() {
            return Err(Error::Configuration(format!(
                "{:?} position given to {} model",
                position.convention(),
                self.family.type_name()
            )));
        }
        Ok(())
    }
}

impl Clone for PointingModel {
    fn clone(&self) -> Self {
        Self {
            family: self.family,
            base: self.family.base_terms(),
            extra: self.extra.clone(),
            values: self.values.clone(),
            fixed: self.fixed.clone(),
            state: self.state,
        }
    }
}

impl fmt::Debug for PointingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointingModel")
            .field("family", &self.family)
            .field("parameters", &self.parameter_names())
            .field("values", &self.values)
            .field("fixed", &self.fixed)
            .field("state", &self.state)
            .finish()
    }
}
