//! # estrella
//!
//! Rust driver for Stellarnet EPP2000 ("Estrella") spectrometers.
//!
//! Binds the native enumeration library (`libdll`) and the spectrometer
//! protocol library (`libestrella`) at runtime, walks the discovery →
//! session → configure → scan → close sequence, and hands back 2051-pixel
//! intensity buffers ready to be paired with a calibrated wavelength axis.
//!
//! ## Quick Start
//!
//! ```no_run
//! use estrella::{AcquisitionConfig, CalibrationCoefficients, LibraryPaths, Spectrum};
//!
//! let axis = CalibrationCoefficients::load("calibration_parameters.txt")?.wavelength_axis();
//!
//! let session = estrella::open_native(&LibraryPaths::from_env())?;
//! let mut spectrometer = session.configure(&AcquisitionConfig::default())?;
//!
//! let counts = spectrometer.scan_sync()?;
//! spectrometer.close();
//!
//! let spectrum = Spectrum::new(axis, counts);
//! println!("peak: {:?}", spectrum.peak());
//! # Ok::<(), estrella::EstrellaError>(())
//! ```
//!
//! Every failure tears the session down (session close, then device-list
//! clear) before the error is returned. A failed session is never reused;
//! open a new one with another discovery cycle.

pub mod calibration;
pub mod discovery;
pub mod native;
pub mod protocol;
pub mod provider;
pub mod session;
pub mod spectrum;
pub mod types;

pub use calibration::{CalibrationCoefficients, WavelengthAxis};
pub use discovery::{discover_and_open, first_device_info, open_native};
pub use native::{LibraryPaths, NativeProvider};
pub use protocol::{NativeStatus, ScanBuffer, StatusCode, SENSOR_PIXEL_COUNT};
pub use provider::SpectrometerProvider;
pub use session::{DeviceSession, Spectrometer};
pub use spectrum::Spectrum;
pub use types::*;

/// Errors returned by the estrella driver.
///
/// All session-level variants are terminal: by the time one reaches the
/// caller the session and its device list have already been released.
#[derive(Debug, thiserror::Error)]
pub enum EstrellaError {
    /// Native device discovery failed (commonly: missing USB permissions).
    #[error("Device discovery failed ({0}); are you root?")]
    DiscoveryFailed(NativeStatus),

    /// Discovery succeeded but no spectrometer is attached.
    #[error("No Estrella device found")]
    NoDeviceFound,

    /// The first discovered device could not be retrieved from the list.
    #[error("Cannot access device 0 ({0})")]
    DeviceAccessFailed(NativeStatus),

    /// The native library refused to bind a session to the device.
    #[error("Session init failed ({0})")]
    SessionInitFailed(NativeStatus),

    /// One of the three configuration calls was rejected.
    #[error("Configuration failed at {stage} stage ({status})")]
    ConfigFailed {
        stage: ConfigStage,
        status: NativeStatus,
    },

    /// A blocking scan failed or timed out.
    #[error("Scan failed ({0})")]
    ScanFailed(NativeStatus),

    /// The device refused to arm an asynchronous scan.
    #[error("Async scan start failed ({0})")]
    AsyncScanStartFailed(NativeStatus),

    /// Fetching an asynchronous scan result failed or it was not ready.
    #[error("Async scan result failed ({0})")]
    AsyncResultFailed(NativeStatus),

    /// The session was already torn down.
    #[error("Session is closed")]
    SessionClosed,

    /// A native library or one of its symbols could not be loaded.
    #[error("Library error: {0}")]
    Library(String),

    /// Calibration parameters could not be read or parsed.
    #[error("Calibration error: {0}")]
    Calibration(String),
}
