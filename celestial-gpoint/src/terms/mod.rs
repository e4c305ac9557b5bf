pub mod altaz;
pub mod equatorial;

use core::fmt;
use core::str::FromStr;

use crate::error::{Error, Result};
use crate::observation::{Convention, DerivedAxes};
use crate::spherical::zenith_distance;

/// One linear parameter of a pointing model.
///
/// The correction an axis receives is `Σ coefficient · jacobian`, so a term
/// only has to say how strongly it moves each axis at a given position.
pub trait Term: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    /// Partial derivatives of the (first axis, second axis) correction with
    /// respect to this term's coefficient: (HA, Dec) for equatorial models,
    /// (Az, El) for horizontal ones.
    fn jacobian(&self, axes: &DerivedAxes, lat: f64) -> (f64, f64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Axis {
    Ha,
    Dec,
    Az,
    El,
}

impl Axis {
    /// 0 for the longitude-like axis, 1 for the latitude-like one.
    pub fn component(self) -> usize {
        match self {
            Axis::Ha | Axis::Az => 0,
            Axis::Dec | Axis::El => 1,
        }
    }

    pub fn convention(self) -> Convention {
        match self {
            Axis::Ha | Axis::Dec => Convention::Equatorial,
            Axis::Az | Axis::El => Convention::Horizontal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Axis::Ha => "ha",
            Axis::Dec => "dec",
            Axis::Az => "az",
            Axis::El => "el",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Axis {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ha" => Ok(Axis::Ha),
            "dec" => Ok(Axis::Dec),
            "az" => Ok(Axis::Az),
            "el" | "alt" => Ok(Axis::El),
            _ => Err(Error::Configuration(format!("invalid axis name: {}", s))),
        }
    }
}

/// Position reading a basis function can take as input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Variable {
    Ha,
    Dec,
    Az,
    El,
    Zd,
}

impl Variable {
    pub fn value(self, axes: &DerivedAxes) -> f64 {
        match self {
            Variable::Ha => axes.ha,
            Variable::Dec => axes.dec,
            Variable::Az => axes.az,
            Variable::El => axes.el,
            Variable::Zd => zenith_distance(axes.el),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Variable::Ha => "ha",
            Variable::Dec => "dec",
            Variable::Az => "az",
            Variable::El => "el",
            Variable::Zd => "zd",
        }
    }

    fn is_axis(self, axis: Axis) -> bool {
        matches!(
            (self, axis),
            (Variable::Ha, Axis::Ha)
                | (Variable::Dec, Axis::Dec)
                | (Variable::Az, Axis::Az)
                | (Variable::El, Axis::El)
        )
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variable {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ha" => Ok(Variable::Ha),
            "dec" => Ok(Variable::Dec),
            "az" => Ok(Variable::Az),
            "el" | "alt" => Ok(Variable::El),
            "zd" => Ok(Variable::Zd),
            _ => Err(Error::Configuration(format!("unknown parameter {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BasisFunction {
    Offset,
    Sin,
    Cos,
    Tan,
    AbsSin,
    AbsCos,
    Csc,
    Sec,
    Cot,
    SinCos,
    SinSin,
    CosCos,
}

impl BasisFunction {
    /// Number of input variables the function consumes.
    pub fn arity(self) -> usize {
        match self {
            BasisFunction::SinCos | BasisFunction::SinSin | BasisFunction::CosCos => 2,
            _ => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BasisFunction::Offset => "offset",
            BasisFunction::Sin => "sin",
            BasisFunction::Cos => "cos",
            BasisFunction::Tan => "tan",
            BasisFunction::AbsSin => "abssin",
            BasisFunction::AbsCos => "abscos",
            BasisFunction::Csc => "csc",
            BasisFunction::Sec => "sec",
            BasisFunction::Cot => "cot",
            BasisFunction::SinCos => "sincos",
            BasisFunction::SinSin => "sinsin",
            BasisFunction::CosCos => "coscos",
        }
    }
}

impl fmt::Display for BasisFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BasisFunction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "offset" => Ok(BasisFunction::Offset),
            "sin" => Ok(BasisFunction::Sin),
            "cos" => Ok(BasisFunction::Cos),
            "tan" => Ok(BasisFunction::Tan),
            "abssin" => Ok(BasisFunction::AbsSin),
            "abscos" => Ok(BasisFunction::AbsCos),
            "csc" => Ok(BasisFunction::Csc),
            "sec" => Ok(BasisFunction::Sec),
            "cot" => Ok(BasisFunction::Cot),
            "sincos" => Ok(BasisFunction::SinCos),
            "sinsin" => Ok(BasisFunction::SinSin),
            "coscos" => Ok(BasisFunction::CosCos),
            _ => Err(Error::Configuration(format!("unknown function {}", s))),
        }
    }
}

/// User-declared trigonometric correction on one axis.
///
/// Equality is structural over axis, function, inputs and constants; the
/// parameter name is derived from the same four fields.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BasisTerm {
    axis: Axis,
    function: BasisFunction,
    inputs: Vec<Variable>,
    constants: Vec<f64>,
    name: String,
}

impl BasisTerm {
    /// Missing constants default to 1.
    pub fn new(
        axis: Axis,
        function: BasisFunction,
        inputs: Vec<Variable>,
        mut constants: Vec<f64>,
    ) -> Result<Self> {
        if inputs.len() != function.arity() {
            return Err(Error::Configuration(format!(
                "function {} takes {} parameter(s), got {}",
                function,
                function.arity(),
                inputs.len()
            )));
        }
        if constants.len() > inputs.len() {
            return Err(Error::Configuration(format!(
                "function {} takes {} constant(s), got {}",
                function,
                inputs.len(),
                constants.len()
            )));
        }
        constants.resize(inputs.len(), 1.0);
        let name = term_name(axis, function, &inputs, &constants);
        Ok(Self {
            axis,
            function,
            inputs,
            constants,
            name,
        })
    }

    /// Builds a term from its textual fields: `inputs` and `constants` are
    /// `;`-separated lists, as in model files.
    pub fn parse(axis: &str, function: &str, inputs: &str, constants: Option<&str>) -> Result<Self> {
        let axis: Axis = axis.parse()?;
        let function: BasisFunction = function.parse()?;
        let inputs = inputs
            .split(';')
            .map(str::parse)
            .collect::<Result<Vec<Variable>>>()?;
        let constants = match constants {
            Some(c) => c
                .split(';')
                .map(|v| {
                    v.parse::<f64>()
                        .map_err(|e| Error::Configuration(format!("invalid constant '{}': {}", v, e)))
                })
                .collect::<Result<Vec<f64>>>()?,
            None => Vec::new(),
        };
        Self::new(axis, function, inputs, constants)
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn function(&self) -> BasisFunction {
        self.function
    }

    pub fn inputs(&self) -> &[Variable] {
        &self.inputs
    }

    pub fn constants(&self) -> &[f64] {
        &self.constants
    }

    pub fn evaluate(&self, axes: &DerivedAxes) -> f64 {
        evaluate(self, axes)
    }

    /// `function inputs constants` as written after the coefficient in a
    /// model file.
    pub fn spec_string(&self) -> String {
        let inputs: Vec<&str> = self.inputs.iter().map(|v| v.as_str()).collect();
        let consts: Vec<String> = self.constants.iter().map(|c| c.to_string()).collect();
        format!("{}\t{}\t{}", self.function, inputs.join(";"), consts.join(";"))
    }
}

impl Term for BasisTerm {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Extra basis term"
    }

    fn jacobian(&self, axes: &DerivedAxes, _lat: f64) -> (f64, f64) {
        let value = evaluate(self, axes);
        match self.axis.component() {
            0 => (value, 0.0),
            _ => (0.0, value),
        }
    }
}

fn term_name(axis: Axis, function: BasisFunction, inputs: &[Variable], constants: &[f64]) -> String {
    let inputs: Vec<&str> = inputs.iter().map(|v| v.as_str()).collect();
    let consts: Vec<String> = constants
        .iter()
        .map(|c| format!("{:?}", c).replace('.', "_"))
        .collect();
    format!("{}_{}_{}_{}", axis, function, inputs.join("_"), consts.join("_"))
}

/// Value of the basis function (without coefficient) at a position.
pub fn evaluate(term: &BasisTerm, axes: &DerivedAxes) -> f64 {
    let arg = |i: usize| term.constants[i] * term.inputs[i].value(axes);
    match term.function {
        BasisFunction::Offset => {
            if term.inputs[0].is_axis(term.axis) {
                1.0
            } else {
                0.0
            }
        }
        BasisFunction::Sin => libm::sin(arg(0)),
        BasisFunction::Cos => libm::cos(arg(0)),
        BasisFunction::Tan => libm::tan(arg(0)),
        BasisFunction::AbsSin => libm::sin(arg(0)).abs(),
        BasisFunction::AbsCos => libm::cos(arg(0)).abs(),
        BasisFunction::Csc => 1.0 / libm::sin(arg(0)),
        BasisFunction::Sec => 1.0 / libm::cos(arg(0)),
        BasisFunction::Cot => 1.0 / libm::tan(arg(0)),
        BasisFunction::SinCos => libm::sin(arg(0)) * libm::cos(arg(1)),
        BasisFunction::SinSin => libm::sin(arg(0)) * libm::sin(arg(1)),
        BasisFunction::CosCos => libm::cos(arg(0)) * libm::cos(arg(1)),
    }
}
