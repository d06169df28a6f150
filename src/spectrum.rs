//! A calibrated spectrum: wavelength axis paired with one scan.

use std::io::{self, Write};

use crate::calibration::WavelengthAxis;
use crate::protocol::ScanBuffer;

/// Wavelength axis and detector counts of one acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub axis: WavelengthAxis,
    pub counts: ScanBuffer,
}

impl Spectrum {
    pub fn new(axis: WavelengthAxis, counts: ScanBuffer) -> Self {
        Self { axis, counts }
    }

    /// `(wavelength, counts)` per pixel.
    pub fn points(&self) -> impl Iterator<Item = (f64, f32)> + '_ {
        self.axis.iter().copied().zip(self.counts.iter().copied())
    }

    /// The brightest pixel as `(wavelength, counts)`. NaN samples are skipped.
    pub fn peak(&self) -> Option<(f64, f32)> {
        self.points()
            .filter(|(_, c)| !c.is_nan())
            .fold(None, |best, p| match best {
                Some((_, c)) if c >= p.1 => best,
                _ => Some(p),
            })
    }

    /// Write two-column `wavelength counts` text, one pixel per line.
    ///
    /// The format is what gnuplot's `plot '-'` reads.
    pub fn write_xy<W: Write>(&self, mut out: W) -> io::Result<()> {
        for (x, y) in self.points() {
            writeln!(out, "{x:.6} {y:.6}")?;
        }
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationCoefficients;
    use crate::protocol::SENSOR_PIXEL_COUNT;

    fn spectrum_with(counts: impl Fn(usize) -> f32) -> Spectrum {
        let axis = CalibrationCoefficients::new(0.0, 2.0, 400.0).wavelength_axis();
        let mut buf = ScanBuffer::new();
        for (i, c) in buf.iter_mut().enumerate() {
            *c = counts(i);
        }
        Spectrum::new(axis, buf)
    }

    #[test]
    fn points_pair_axis_and_counts() {
        let s = spectrum_with(|i| i as f32);
        let pts: Vec<_> = s.points().collect();
        assert_eq!(pts.len(), SENSOR_PIXEL_COUNT);
        assert_eq!(pts[0], (400.0, 0.0));
        assert_eq!(pts[3], (403.0, 3.0));
    }

    #[test]
    fn peak_finds_brightest_pixel() {
        let s = spectrum_with(|i| if i == 700 { 2500.0 } else { 10.0 });
        assert_eq!(s.peak(), Some((1100.0, 2500.0)));
    }

    #[test]
    fn peak_ignores_nan() {
        let s = spectrum_with(|i| if i == 0 { f32::NAN } else if i == 5 { 3.0 } else { 1.0 });
        assert_eq!(s.peak(), Some((405.0, 3.0)));
    }

    #[test]
    fn write_xy_one_line_per_pixel() {
        let s = spectrum_with(|i| (i % 3) as f32);
        let mut out = Vec::new();
        s.write_xy(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), SENSOR_PIXEL_COUNT);
        assert_eq!(lines[0], "400.000000 0.000000");
        assert_eq!(lines[2], "402.000000 2.000000");
    }
}
