//! Telescope pointing models: RTS2 GEM and Alt-Az parameter sets, their
//! least-squares fit against observation logs, outlier rejection and the
//! model file format.

pub mod angle;
pub mod error;
pub mod model;
pub mod observation;
pub mod outlier;
pub mod parser;
pub mod solver;
pub mod spherical;
pub mod stats;
pub mod store;
pub mod terms;

pub use angle::{Angle, AngleUnit};
pub use error::{Error, Result};
pub use model::{ModelFamily, ModelState, ParameterVector, PointingModel};
pub use observation::{Convention, ObservationSet, PierFilter, Position, Sample, Site};
pub use outlier::{filter, AxisSelector, FilterConfig, FilterOutcome};
pub use parser::InputReader;
pub use solver::{fit, FitConfig, FitResult, ResidualMode};
pub use stats::ResidualReport;
pub use terms::{Axis, BasisFunction, BasisTerm, Term, Variable};
