//! RTS2 model files.
//!
//! ```text
//! RTS2_ALTAZ 12.1" -3.4" 0.8" 5.5" -1.2" 30.2" 4.4"
//! AZ	2.5"	sin	az	1
//! EL	-1.1"	sincos	az;el	1;2
//! ```
//!
//! The first line names the family and lists the base parameters in
//! family order; every further line is an extra term:
//! `<AXIS> <coefficient> <function> <inputs> [<constants>]`.
//! `RTS2_MODEL` is read as `RTS2_GEM`.

use core::fmt;
use core::str::FromStr;
use std::path::Path;

use tracing::debug;

use crate::angle::{Angle, AngleUnit};
use crate::error::{Error, Result};
use crate::model::{ModelFamily, PointingModel};
use crate::terms::{BasisTerm, Term};

/// Serializes the model's coefficients with the given unit suffix.
pub fn write(model: &PointingModel, unit: AngleUnit) -> String {
    let nbase = model.base_terms().len();
    let values = model.coefficients();
    let mut out = String::from(model.family().type_name());
    for &v in &values[..nbase] {
        out.push(' ');
        out.push_str(&Angle::from_radians(v).display_in(unit));
    }
    for (term, &v) in model.extra_terms().iter().zip(&values[nbase..]) {
        out.push('\n');
        out.push_str(&format!(
            "{}\t{}\t{}",
            term.axis().as_str().to_ascii_uppercase(),
            Angle::from_radians(v).display_in(unit),
            term.spec_string()
        ));
    }
    out.push('\n');
    out
}

/// Parses a model file. The result is in the fitted state.
pub fn read(content: &str) -> Result<PointingModel> {
    let mut family: Option<ModelFamily> = None;
    let mut base = Vec::new();
    let mut extra: Vec<(BasisTerm, f64)> = Vec::new();
    let mut last_line = 0;

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        last_line = line_no;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let declared = match fields[0] {
            "RTS2_GEM" | "RTS2_MODEL" => Some(ModelFamily::Gem),
            "RTS2_ALTAZ" => Some(ModelFamily::Altaz),
            _ => None,
        };

        if let Some(declared) = declared {
            if family.is_some() {
                return Err(Error::parse(line_no, "model type specified twice"));
            }
            let expected = declared.base_terms().len();
            if fields.len() - 1 != expected {
                return Err(Error::parse(
                    line_no,
                    format!(
                        "{} expects {} parameters, found {}",
                        declared.type_name(),
                        expected,
                        fields.len() - 1
                    ),
                ));
            }
            base = fields[1..]
                .iter()
                .map(|f| parse_angle(f, line_no))
                .collect::<Result<Vec<f64>>>()?;
            family = Some(declared);
            continue;
        }

        let Some(family) = family else {
            return Err(Error::parse(line_no, "extra term before model type line"));
        };
        let (term, value) = parse_extra(&fields, line_no)?;
        if term.axis().convention() != family.convention() {
            return Err(Error::parse(
                line_no,
                format!("axis {} in {} model", term.axis(), family.type_name()),
            ));
        }
        if extra.iter().any(|(t, _)| *t == term) {
            return Err(Error::parse(line_no, format!("duplicated term {}", term.name())));
        }
        extra.push((term, value));
    }

    let family = family.ok_or_else(|| Error::parse(last_line.max(1), "missing model type line"))?;
    debug!(model = family.type_name(), extra_terms = extra.len(), "model read");
    PointingModel::with_coefficients(family, &base, extra)
}

pub fn save(model: &PointingModel, path: impl AsRef<Path>, unit: AngleUnit) -> Result<()> {
    std::fs::write(path, write(model, unit))?;
    Ok(())
}

pub fn load(path: impl AsRef<Path>) -> Result<PointingModel> {
    let content = std::fs::read_to_string(path)?;
    read(&content)
}

fn parse_extra(fields: &[&str], line: usize) -> Result<(BasisTerm, f64)> {
    if !(4..=5).contains(&fields.len()) {
        return Err(Error::parse(
            line,
            format!("extra term needs 4 or 5 fields, found {}", fields.len()),
        ));
    }
    let value = parse_angle(fields[1], line)?;
    let term = BasisTerm::parse(fields[0], fields[2], fields[3], fields.get(4).copied())
        .map_err(|e| Error::parse(line, e.to_string()))?;
    Ok((term, value))
}

fn parse_angle(s: &str, line: usize) -> Result<f64> {
    Angle::from_str(s)
        .map(Angle::radians)
        .map_err(|e| Error::parse(line, e.to_string()))
}

/// Arcsecond model file text.
impl fmt::Display for PointingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&write(self, AngleUnit::Arcseconds))
    }
}

impl FromStr for PointingModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        read(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arcsec(v: f64) -> f64 {
        Angle::from_arcseconds(v).radians()
    }

    #[test]
    fn writes_gem_line() {
        let mut base = [0.0; 9];
        base[4] = arcsec(12.5);
        let model = PointingModel::with_coefficients(ModelFamily::Gem, &base, Vec::new()).unwrap();
        let text = write(&model, AngleUnit::Arcseconds);
        let first = text.lines().next().unwrap();
        let fields: Vec<&str> = first.split_whitespace().collect();
        assert_eq!(fields[0], "RTS2_GEM");
        assert_eq!(fields.len(), 10);
        assert!(fields[5].ends_with('"'));
        let ih: Angle = fields[5].parse().unwrap();
        assert!((ih.arcseconds() - 12.5).abs() < 1e-9);
    }

    #[test]
    fn extra_terms_in_insertion_order() {
        let terms = vec![
            (BasisTerm::parse("el", "cos", "az", None).unwrap(), arcsec(3.0)),
            (BasisTerm::parse("az", "sincos", "az;el", Some("1;2")).unwrap(), arcsec(-4.0)),
        ];
        let model = PointingModel::with_coefficients(ModelFamily::Altaz, &[0.0; 7], terms).unwrap();
        let text = model.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("EL\t"));
        assert!(lines[2].starts_with("AZ\t"));
        assert!(lines[2].ends_with("sincos\taz;el\t1;2"));
    }

    #[test]
    fn reads_units_and_alias() {
        let text = "# comment\n\nRTS2_MODEL 1d 30' 36\" 0.001 60m 3600s 0 0 0\n";
        let model = read(text).unwrap();
        assert_eq!(model.family(), ModelFamily::Gem);
        let p = model.parameters().unwrap();
        assert!((p.get("id").unwrap() - 1f64.to_radians()).abs() < 1e-15);
        assert!((p.get("me").unwrap() - 0.5f64.to_radians()).abs() < 1e-15);
        assert!((p.get("ma").unwrap() - 0.01f64.to_radians()).abs() < 1e-15);
        assert_eq!(p.get("tf"), Some(0.001));
        assert!((p.get("ih").unwrap() - 1f64.to_radians()).abs() < 1e-15);
        assert!((p.get("ch").unwrap() - 1f64.to_radians()).abs() < 1e-15);
    }

    #[test]
    fn constants_default_to_one() {
        let model = read("RTS2_ALTAZ 0 0 0 0 0 0 0\nAZ 2\" sin el\n").unwrap();
        assert_eq!(model.extra_terms()[0].constants(), &[1.0]);
    }

    fn parse_error_line(text: &str) -> usize {
        match read(text) {
            Err(Error::Parse { line, .. }) => line,
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn rejects_malformed_files() {
        assert_eq!(parse_error_line("RTS2_GEM 0 0 0\n"), 1);
        assert_eq!(parse_error_line("RTS2_ALTAZ 0 0 0 0 0 0 0\n#\nRTS2_ALTAZ 0 0 0 0 0 0 0\n"), 3);
        assert_eq!(parse_error_line("AZ 1\" sin az 1\nRTS2_ALTAZ 0 0 0 0 0 0 0\n"), 1);
        assert_eq!(parse_error_line("RTS2_ALTAZ 0 0 0 0 0 0 0\nAZ 1\" sinh az 1\n"), 2);
        assert_eq!(parse_error_line("RTS2_ALTAZ 0 0 0 0 0 0 0\nAZ 1\" sin\n"), 2);
        assert_eq!(parse_error_line("RTS2_ALTAZ 0 0 0 0 0 0 0\nHA 1\" sin ha 1\n"), 2);
        assert_eq!(parse_error_line("RTS2_GEM 0 0 0 0 0 0 0 0 x\n"), 1);
        assert_eq!(
            parse_error_line("RTS2_ALTAZ 0 0 0 0 0 0 0\nAZ 1\" sin az 1\nAZ 2\" sin az\n"),
            3
        );
        assert_eq!(parse_error_line("# only a comment\n"), 1);
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.txt");
        let model = PointingModel::with_coefficients(
            ModelFamily::Gem,
            &[1e-5, -2e-5, 3e-5, 0.0, 4e-4, -5e-5, 6e-6, 0.0, 7e-5],
            vec![(BasisTerm::parse("ha", "cos", "dec", None).unwrap(), 2e-5)],
        )
        .unwrap();
        save(&model, &path, AngleUnit::Degrees).unwrap();
        let back = load(&path).unwrap();
        for (a, b) in back.coefficients().iter().zip(model.coefficients()) {
            assert!((a - b).abs() < 1e-15);
        }
        assert_eq!(back.extra_terms(), model.extra_terms());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load(dir.path().join("nope")), Err(Error::Io(_))));
    }
}
