//! Reader for pointing observation files.
//!
//! ```text
//! # gem 16.5 -24.6 2635
//! #  Observation   MJD        LST      RA-TRUE  DEC-TRUE  AXRA      AXDEC     RA-MNT    DEC-MNT
//! 02a57222e0002o  57222.2600 233.8937 275.7921  77.0452 -55497734 -46831997 276.0206  77.0643
//! ```
//!
//! The header selects the convention (`observatory`/`gem` equatorial,
//! `altaz` horizontal, `altaz-manual` horizontal with manual-offset rows)
//! and the site. All angles in rows are degrees.

use std::path::Path;

use tracing::debug;

use crate::angle::{wrap_0_2pi, wrap_signed, Angle};
use crate::error::{Error, Result};
use crate::observation::{Convention, ObservationSet, Position, Sample, Site};
use crate::spherical::fold_flipped;

const SITE_TOLERANCE_DEG: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowFormat {
    /// `id mjd lst t1 t2 enc1 enc2 m1 m2`
    Standard,
    /// `id mjd ra dec e_alt e_az alt az`
    Manual,
}

#[derive(Debug, Clone)]
struct PendingRow {
    line: usize,
    id: String,
    mjd: f64,
    target: Position,
    measured: Position,
    flipped: bool,
}

/// Accumulates rows from one or more input files sharing a site.
#[derive(Debug, Clone)]
pub struct InputReader {
    convention: Convention,
    format: RowFormat,
    latitude_override: Option<Angle>,
    site: Option<Site>,
    rows: Vec<PendingRow>,
}

impl InputReader {
    /// `convention` applies until a site header says otherwise.
    pub fn new(convention: Convention) -> Self {
        Self {
            convention,
            format: RowFormat::Standard,
            latitude_override: None,
            site: None,
            rows: Vec::new(),
        }
    }

    /// Fixes the latitude; header latitudes are then ignored.
    pub fn with_latitude(mut self, latitude: Angle) -> Self {
        self.latitude_override = Some(latitude);
        self
    }

    pub fn read_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let content = std::fs::read_to_string(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "reading observations");
        self.read_str(&content)
    }

    /// Reads one file's worth of text. Line numbers restart at 1.
    pub fn read_str(&mut self, content: &str) -> Result<()> {
        let mut first_row = true;
        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(comment) = line.strip_prefix('#') {
                self.read_comment(comment, line_no)?;
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if first_row {
                first_row = false;
                if is_title_row(&fields) {
                    debug!(line = line_no, "skipping column titles");
                    continue;
                }
            }
            let row = self.parse_row(&fields, line_no)?;
            self.rows.push(row);
        }
        Ok(())
    }

    pub fn finish(self) -> Result<ObservationSet> {
        let site = match (self.latitude_override, self.site) {
            (Some(lat), Some(site)) => Site {
                latitude: lat,
                ..site
            },
            (Some(lat), None) => Site::with_latitude(lat),
            (None, Some(site)) => site,
            (None, None) => {
                return Err(Error::Configuration(
                    "latitude unknown: no site header and no latitude given".into(),
                ))
            }
        };
        let lat = site.latitude.radians();
        let mut set = ObservationSet::new(site, self.convention);
        for row in self.rows {
            let mut sample = Sample::new(row.target, row.measured, lat)?;
            sample.mjd = Some(row.mjd);
            sample.id = Some(row.id);
            sample.source_line = Some(row.line);
            sample.flipped = row.flipped;
            set.push(sample)?;
        }
        debug!(samples = set.len(), "observations loaded");
        Ok(set)
    }

    fn read_comment(&mut self, comment: &str, line: usize) -> Result<()> {
        let fields: Vec<&str> = comment.split_whitespace().collect();
        let (convention, format) = match fields.first().copied() {
            Some("observatory") | Some("gem") => (Convention::Equatorial, RowFormat::Standard),
            Some("altaz") => (Convention::Horizontal, RowFormat::Standard),
            Some("altaz-manual") => (Convention::Horizontal, RowFormat::Manual),
            _ => return Ok(()),
        };
        if fields.len() < 4 {
            return Err(Error::parse(line, "site header needs longitude, latitude and altitude"));
        }
        let longitude = parse_field(fields[1], "longitude", line)?;
        let latitude = parse_field(fields[2], "latitude", line)?;
        let altitude = parse_field(fields[3], "altitude", line)?;

        if !self.rows.is_empty() && convention != self.convention {
            return Err(Error::parse(
                line,
                format!("{:?} header after {:?} rows", convention, self.convention),
            ));
        }
        self.convention = convention;
        self.format = format;

        match self.site {
            Some(site) => {
                let established = site.latitude.degrees();
                if self.latitude_override.is_none()
                    && (established - latitude).abs() > SITE_TOLERANCE_DEG
                {
                    return Err(Error::SiteMismatch {
                        expected: established,
                        found: latitude,
                    });
                }
            }
            None => {
                self.site = Some(Site {
                    latitude: Angle::from_degrees(latitude),
                    longitude: Some(Angle::from_degrees(longitude)),
                    altitude: Some(altitude),
                });
            }
        }
        debug!(line, ?convention, longitude, latitude, altitude, "site header");
        Ok(())
    }

    fn parse_row(&self, fields: &[&str], line: usize) -> Result<PendingRow> {
        let needed = match self.format {
            RowFormat::Standard => 9,
            RowFormat::Manual => 8,
        };
        if fields.len() < needed {
            return Err(Error::parse(
                line,
                format!("expected {} fields, found {}", needed, fields.len()),
            ));
        }
        let id = fields[0].to_string();
        let mjd = parse_field(fields[1], "MJD", line)?;
        let mut values = [0.0; 7];
        for (v, s) in values.iter_mut().zip(&fields[2..needed]) {
            *v = parse_field(s, "value", line)?;
        }

        let (target, measured, flipped) = match (self.format, self.convention) {
            (RowFormat::Manual, _) => {
                let [_ra, _dec, e_alt, e_az, alt, az, _] = values;
                (horizontal(az, alt), horizontal(az + e_az, alt + e_alt), false)
            }
            (RowFormat::Standard, Convention::Equatorial) => {
                let [lst, t_ra, t_dec, _enc1, _enc2, m_ra, m_dec] = values;
                let (t_ra, t_dec, t_flip) = fold_flipped(t_ra, t_dec);
                let (m_ra, m_dec, m_flip) = fold_flipped(m_ra, m_dec);
                (
                    equatorial(lst - t_ra, t_dec),
                    equatorial(lst - m_ra, m_dec),
                    t_flip || m_flip,
                )
            }
            (RowFormat::Standard, Convention::Horizontal) => {
                let [_lst, t_az, t_alt, _enc1, _enc2, m_az, m_alt] = values;
                (horizontal(t_az, t_alt), horizontal(m_az, m_alt), false)
            }
        };
        Ok(PendingRow {
            line,
            id,
            mjd,
            target,
            measured,
            flipped,
        })
    }
}

impl ObservationSet {
    /// Parses a single input text; `convention` is used when it carries no
    /// site header.
    pub fn load(content: &str, convention: Convention) -> Result<Self> {
        let mut reader = InputReader::new(convention);
        reader.read_str(content)?;
        reader.finish()
    }
}

fn equatorial(ha_deg: f64, dec_deg: f64) -> Position {
    Position::equatorial(
        Angle::from_radians(wrap_signed(ha_deg.to_radians())),
        Angle::from_degrees(dec_deg),
    )
}

fn horizontal(az_deg: f64, el_deg: f64) -> Position {
    Position::horizontal(
        Angle::from_radians(wrap_0_2pi(az_deg.to_radians())),
        Angle::from_degrees(el_deg),
    )
}

fn is_title_row(fields: &[&str]) -> bool {
    fields.get(1).is_some_and(|f| f.parse::<f64>().is_err())
}

fn parse_field(s: &str, field: &str, line: usize) -> Result<f64> {
    s.parse::<f64>()
        .map_err(|e| Error::parse(line, format!("{} '{}': {}", field, s, e)))
}
