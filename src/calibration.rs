//! Pixel-index → wavelength calibration.
//!
//! The wavelength of pixel `i` is `(a/4)·i² + (b/2)·i + c`, where `a`, `b`
//! and `c` are per-device constants supplied with the spectrometer.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::Deref;
use std::path::Path;

use crate::protocol::SENSOR_PIXEL_COUNT;
use crate::EstrellaError;

/// Environment variable overriding the calibration file location.
pub const ENV_CALIBRATION: &str = "ESTRELLA_CALIBRATION";
/// Calibration file looked up in the working directory by default.
pub const DEFAULT_CALIBRATION_FILE: &str = "calibration_parameters.txt";

/// Free-form lines preceding the column header.
const HEADER_LINES: usize = 3;
const PARAMETER_COLUMN: &str = "Parameters";

/// The three calibration constants of a device/grating combination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationCoefficients {
    /// `a`, the quadratic term.
    pub quadratic: f64,
    /// `b`, the linear term.
    pub linear: f64,
    /// `c`, the wavelength of pixel 0.
    pub constant: f64,
}

impl CalibrationCoefficients {
    pub fn new(quadratic: f64, linear: f64, constant: f64) -> Self {
        Self {
            quadratic,
            linear,
            constant,
        }
    }

    /// Read coefficients from a calibration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EstrellaError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            EstrellaError::Calibration(format!("Failed to open {}: {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse the calibration text format.
    ///
    /// Three header lines are skipped, the fourth names the columns, and
    /// the `Parameters` column of the next three rows holds the linear,
    /// quadratic and constant terms, in that order. Rows with more fields
    /// than the header carry leading index columns.
    pub fn from_reader(reader: impl BufRead) -> Result<Self, EstrellaError> {
        let mut lines = reader.lines().skip(HEADER_LINES);

        let header = lines
            .next()
            .ok_or_else(|| EstrellaError::Calibration("Missing column header".into()))?
            .map_err(|e| EstrellaError::Calibration(format!("Read failed: {e}")))?;
        let columns: Vec<&str> = header.split_whitespace().collect();
        let column = columns
            .iter()
            .position(|&c| c == PARAMETER_COLUMN)
            .ok_or_else(|| {
                EstrellaError::Calibration(format!("No '{PARAMETER_COLUMN}' column in '{header}'"))
            })?;

        let mut values = Vec::with_capacity(3);
        for line in lines {
            let line = line.map_err(|e| EstrellaError::Calibration(format!("Read failed: {e}")))?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            let offset = fields.len().saturating_sub(columns.len());
            let field = fields.get(column + offset).ok_or_else(|| {
                EstrellaError::Calibration(format!("Row '{line}' has no parameter field"))
            })?;
            let value: f64 = field.parse().map_err(|_| {
                EstrellaError::Calibration(format!("Invalid coefficient '{field}'"))
            })?;
            values.push(value);
            if values.len() == 3 {
                break;
            }
        }

        match values[..] {
            [linear, quadratic, constant] => Ok(Self::new(quadratic, linear, constant)),
            _ => Err(EstrellaError::Calibration(format!(
                "Expected 3 coefficients, found {}",
                values.len()
            ))),
        }
    }

    /// Wavelength of a single pixel.
    pub fn wavelength(&self, pixel: usize) -> f64 {
        let i = pixel as f64;
        (self.quadratic / 4.0) * (i * i) + (self.linear / 2.0) * i + self.constant
    }

    /// Wavelength of every detector pixel.
    pub fn wavelength_axis(&self) -> WavelengthAxis {
        let mut axis = Box::new([0.0; SENSOR_PIXEL_COUNT]);
        for (i, x) in axis.iter_mut().enumerate() {
            *x = self.wavelength(i);
        }
        WavelengthAxis(axis)
    }
}

/// Wavelength per pixel, always [`SENSOR_PIXEL_COUNT`] long.
#[derive(Debug, Clone, PartialEq)]
pub struct WavelengthAxis(Box<[f64; SENSOR_PIXEL_COUNT]>);

impl WavelengthAxis {
    pub fn as_array(&self) -> &[f64; SENSOR_PIXEL_COUNT] {
        &self.0
    }

    /// `(first, last)` wavelength, the plotting range.
    pub fn range(&self) -> (f64, f64) {
        (self.0[0], self.0[SENSOR_PIXEL_COUNT - 1])
    }
}

impl Deref for WavelengthAxis {
    type Target = [f64];
    fn deref(&self) -> &[f64] {
        &self.0[..]
    }
}
