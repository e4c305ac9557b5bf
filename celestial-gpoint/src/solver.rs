//! Levenberg-Marquardt fit of a [`PointingModel`] to an [`ObservationSet`].

use nalgebra::{DMatrix, DVector};
use tracing::{debug, info, warn};

use crate::angle::{wrap_signed, Angle};
use crate::error::{Error, Result};
use crate::model::{ParameterVector, PointingModel};
use crate::observation::{AxisResidual, DerivedAxes, ObservationSet, Sample};

const INITIAL_LAMBDA: f64 = 1e-3;
const LAMBDA_UP: f64 = 10.0;
const LAMBDA_DOWN: f64 = 0.1;
const MAX_LAMBDA: f64 = 1e20;
const SVD_EPS: f64 = 1e-14;

/// What the optimizer minimizes per sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResidualMode {
    /// Two residuals per sample: the longitude-like difference scaled by the
    /// cosine of the latitude-like axis, and the latitude-like difference.
    #[default]
    Decomposed,
    /// One residual per sample, the great-circle separation.
    Angular,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FitConfig {
    /// Relative reduction of the sum of squares below which the fit stops.
    pub ftol: f64,
    /// Relative parameter step below which the fit stops.
    pub xtol: f64,
    /// Largest gradient component below which the fit stops.
    pub gtol: f64,
    pub max_iterations: usize,
    pub residual_mode: ResidualMode,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
            gtol: 0.0,
            max_iterations: 1000,
            residual_mode: ResidualMode::Decomposed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FitResult {
    pub parameters: ParameterVector,
    /// 1-σ uncertainty per parameter; 0 for fixed ones.
    pub sigma: Vec<f64>,
    /// Corrected target minus measured, per sample.
    pub residuals_per_sample: Vec<AxisResidual>,
    /// Great-circle distance between corrected target and measured.
    pub angular_residuals_per_sample: Vec<f64>,
    pub converged: bool,
    pub iterations: usize,
    /// RMS of the angular residuals, radians.
    pub rms: f64,
}

/// Fits the model's free parameters, starting from its current
/// coefficients.
///
/// On success the fitted values are written back and the model is marked
/// fit. On error neither the model nor the observations change. Hitting
/// `max_iterations` is not an error: the result has `converged == false`.
pub fn fit(model: &mut PointingModel, observations: &ObservationSet, config: &FitConfig) -> Result<FitResult> {
    if model.family().convention() != observations.convention() {
        return Err(Error::Configuration(format!(
            "{} model cannot fit {:?} observations",
            model.family().type_name(),
            observations.convention()
        )));
    }
    let free = model.free_indices();
    let samples = observations.samples();
    let equations = match config.residual_mode {
        ResidualMode::Decomposed => 2 * samples.len(),
        ResidualMode::Angular => samples.len(),
    };
    if samples.is_empty() || equations < free.len() {
        return Err(Error::InsufficientData {
            samples: samples.len(),
            free: free.len(),
        });
    }

    let problem = Problem {
        model: &*model,
        samples,
        lat: observations.latitude(),
        mode: config.residual_mode,
        free: &free,
    };
    let mut params = model.coefficients().to_vec();
    let (converged, iterations) = if free.is_empty() {
        (true, 0)
    } else {
        problem.minimize(&mut params, config)
    };

    let sigma = problem.sigma(&params);
    let residuals_per_sample = problem.axis_residuals(&params);
    let angular_residuals_per_sample: Vec<f64> = samples
        .iter()
        .map(|s| model.residual(&params, s, problem.lat))
        .collect();
    let rms = rms(&angular_residuals_per_sample);

    if converged {
        info!(
            iterations,
            samples = samples.len(),
            rms_arcsec = Angle::from_radians(rms).arcseconds(),
            "fit converged"
        );
    } else {
        warn!(
            iterations,
            samples = samples.len(),
            rms_arcsec = Angle::from_radians(rms).arcseconds(),
            "fit stopped without converging"
        );
    }

    model.store_fit(&params);
    Ok(FitResult {
        parameters: ParameterVector::new(model.parameter_names(), params),
        sigma,
        residuals_per_sample,
        angular_residuals_per_sample,
        converged,
        iterations,
        rms,
    })
}

struct Problem<'a> {
    model: &'a PointingModel,
    samples: &'a [Sample],
    lat: f64,
    mode: ResidualMode,
    free: &'a [usize],
}

impl Problem<'_> {
    /// Runs the damped Gauss-Newton loop; returns (converged, iterations).
    fn minimize(&self, params: &mut [f64], config: &FitConfig) -> (bool, usize) {
        let mut r = self.residuals(params);
        let mut cost = r.norm_squared();
        let mut lambda = INITIAL_LAMBDA;

        for iter in 0..config.max_iterations {
            if cost == 0.0 {
                return (true, iter);
            }
            let j = self.jacobian(params, &r);
            let g = j.transpose() * &r;
            if g.amax() <= config.gtol {
                debug!(iteration = iter, "gradient below gtol");
                return (true, iter);
            }
            let jtj = j.transpose() * &j;
            let xnorm = self.free.iter().map(|&i| params[i] * params[i]).sum::<f64>().sqrt();

            loop {
                let step = solve_damped(&jtj, &g, lambda);
                let Some(step) = step else {
                    lambda *= LAMBDA_UP;
                    if lambda > MAX_LAMBDA {
                        return (false, iter + 1);
                    }
                    continue;
                };
                let step_norm = step.norm();

                let mut trial = params.to_vec();
                for (k, &i) in self.free.iter().enumerate() {
                    trial[i] -= step[k];
                }
                let r_trial = self.residuals(&trial);
                let cost_trial = r_trial.norm_squared();

                if cost_trial < cost {
                    let reduction = (cost - cost_trial) / cost;
                    params.copy_from_slice(&trial);
                    r = r_trial;
                    cost = cost_trial;
                    lambda = (lambda * LAMBDA_DOWN).max(f64::MIN_POSITIVE);
                    debug!(iteration = iter, cost, lambda, step = step_norm, "step accepted");
                    if cost == 0.0
                        || reduction <= config.ftol
                        || step_norm <= config.xtol * (xnorm + config.xtol)
                    {
                        return (true, iter + 1);
                    }
                    break;
                }

                if step_norm <= config.xtol * (xnorm + config.xtol) {
                    return (true, iter + 1);
                }
                lambda *= LAMBDA_UP;
                if lambda > MAX_LAMBDA {
                    return (false, iter + 1);
                }
            }
        }
        (false, config.max_iterations)
    }

    fn residuals(&self, params: &[f64]) -> DVector<f64> {
        match self.mode {
            ResidualMode::Decomposed => {
                let mut r = DVector::zeros(2 * self.samples.len());
                for (i, s) in self.samples.iter().enumerate() {
                    let (r1, r2) = self.decomposed(params, s);
                    r[2 * i] = r1;
                    r[2 * i + 1] = r2;
                }
                r
            }
            ResidualMode::Angular => DVector::from_iterator(
                self.samples.len(),
                self.samples.iter().map(|s| self.model.residual(params, s, self.lat)),
            ),
        }
    }

    fn decomposed(&self, params: &[f64], sample: &Sample) -> (f64, f64) {
        let convention = self.model.family().convention();
        let (d1, d2) = self.model.correction(params, sample.target_axes(), self.lat);
        let (t1, t2) = sample.target_axes().native(convention);
        let (m1, m2) = sample.measured_axes().native(convention);
        (wrap_signed(t1 + d1 - m1) * t2.cos(), t2 + d2 - m2)
    }

    /// Jacobian over the free parameters: analytic for decomposed
    /// residuals, forward differences for angular ones.
    fn jacobian(&self, params: &[f64], r: &DVector<f64>) -> DMatrix<f64> {
        match self.mode {
            ResidualMode::Decomposed => {
                let convention = self.model.family().convention();
                let mut j = DMatrix::zeros(2 * self.samples.len(), self.free.len());
                for (i, s) in self.samples.iter().enumerate() {
                    let axes: &DerivedAxes = s.target_axes();
                    let (_, t2) = axes.native(convention);
                    let cos_t2 = t2.cos();
                    let partials = self.model.partials(axes, self.lat);
                    for (k, &p) in self.free.iter().enumerate() {
                        let (j1, j2) = partials[p];
                        j[(2 * i, k)] = j1 * cos_t2;
                        j[(2 * i + 1, k)] = j2;
                    }
                }
                j
            }
            ResidualMode::Angular => {
                let mut j = DMatrix::zeros(self.samples.len(), self.free.len());
                let mut shifted = params.to_vec();
                for (k, &p) in self.free.iter().enumerate() {
                    let h = f64::EPSILON.sqrt() * params[p].abs().max(1e-3);
                    shifted[p] = params[p] + h;
                    let r_h = self.residuals(&shifted);
                    for i in 0..self.samples.len() {
                        j[(i, k)] = (r_h[i] - r[i]) / h;
                    }
                    shifted[p] = params[p];
                }
                j
            }
        }
    }

    /// `sqrt(s² · diag((JᵀJ)⁻¹))` for free parameters, 0 for fixed ones.
    fn sigma(&self, params: &[f64]) -> Vec<f64> {
        let mut sigma = vec![0.0; params.len()];
        if self.free.is_empty() {
            return sigma;
        }
        let r = self.residuals(params);
        let j = self.jacobian(params, &r);
        let dof = j.nrows().saturating_sub(j.ncols()).max(1);
        let s2 = r.norm_squared() / dof as f64;
        let jtj = j.transpose() * &j;
        match jtj.try_inverse() {
            Some(inv) => {
                for (k, &p) in self.free.iter().enumerate() {
                    sigma[p] = (s2 * inv[(k, k)]).abs().sqrt();
                }
            }
            None => {
                for &p in self.free {
                    sigma[p] = f64::NAN;
                }
            }
        }
        sigma
    }

    fn axis_residuals(&self, params: &[f64]) -> Vec<AxisResidual> {
        self.samples
            .iter()
            .map(|s| {
                let corrected = self.model.corrected_target(params, s, self.lat);
                let axes = DerivedAxes::from_position(&corrected, self.lat);
                AxisResidual::between(&axes, s.measured_axes())
            })
            .collect()
    }
}

/// Solves `(JᵀJ + λ·diag(JᵀJ)) δ = g` by Cholesky, falling back to SVD.
fn solve_damped(jtj: &DMatrix<f64>, g: &DVector<f64>, lambda: f64) -> Option<DVector<f64>> {
    let mut damped = jtj.clone();
    for i in 0..damped.nrows() {
        let d = jtj[(i, i)];
        damped[(i, i)] = d + lambda * if d > 0.0 { d } else { 1.0 };
    }
    if let Some(chol) = damped.clone().cholesky() {
        return Some(chol.solve(g));
    }
    let step = damped.svd(true, true).solve(g, SVD_EPS).ok()?;
    step.iter().all(|v| v.is_finite()).then_some(step)
}

fn rms(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
}
