use std::error::Error;
use std::io;
use std::path::PathBuf;

use estrella::calibration::{DEFAULT_CALIBRATION_FILE, ENV_CALIBRATION};
use estrella::{AcquisitionConfig, CalibrationCoefficients, LibraryPaths, Spectrum};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    // Wavelength axis from the device's calibration file
    let calibration = std::env::var_os(ENV_CALIBRATION)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CALIBRATION_FILE));
    let axis = CalibrationCoefficients::load(&calibration)?.wavelength_axis();
    let (from, to) = axis.range();
    eprintln!("Axis: {from:.2} nm .. {to:.2} nm");

    // Open the first device
    let session = match estrella::open_native(&LibraryPaths::from_env()) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    eprintln!("Device: {}", session.device());

    let mut spectrometer = session.configure(&AcquisitionConfig::default())?;

    // Blocking scan
    let counts = spectrometer.scan_sync()?;

    // Asynchronous scan
    spectrometer.scan_async_start()?;
    let async_counts = spectrometer.scan_async_result()?;
    eprintln!("Async scan: {} samples", async_counts.len());

    spectrometer.close();

    let spectrum = Spectrum::new(axis, counts);
    if let Some((wavelength, peak)) = spectrum.peak() {
        eprintln!("Peak: {peak:.0} counts at {wavelength:.2} nm");
    }

    // Two-column data on stdout, e.g. `cargo run --example scan | gnuplot -p -e "plot '-' with lines"`
    spectrum.write_xy(io::stdout().lock())?;

    eprintln!("All done without errors.");
    Ok(())
}
