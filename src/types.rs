use std::fmt;

/// Trigger mode: start immediately or wait for an external TTL edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum TriggerMode {
    /// Scan starts immediately; the native scan times out after rate + 100 ms.
    #[default]
    Normal = 0,
    /// Scan waits for the rising edge on the trigger input, without timeout.
    Trigger = 1,
}

impl TryFrom<i32> for TriggerMode {
    type Error = i32;
    fn try_from(v: i32) -> Result<Self, i32> {
        match v {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Trigger),
            _ => Err(v),
        }
    }
}

/// X-timing resolution. `High` is slowest but resolves best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum Resolution {
    Low = 0,
    Medium = 1,
    #[default]
    High = 2,
}

impl TryFrom<i32> for Resolution {
    type Error = i32;
    fn try_from(v: i32) -> Result<Self, i32> {
        match v {
            0 => Ok(Self::Low),
            1 => Ok(Self::Medium),
            2 => Ok(Self::High),
            _ => Err(v),
        }
    }
}

/// Device-side pixel smoothing width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum Smoothing {
    #[default]
    None = 0,
    Px5 = 1,
    Px9 = 2,
    Px17 = 3,
    Px33 = 4,
}

impl Smoothing {
    /// Neighbourhood width in pixels (1 when smoothing is off).
    pub fn width(self) -> u32 {
        match self {
            Self::None => 1,
            Self::Px5 => 5,
            Self::Px9 => 9,
            Self::Px17 => 17,
            Self::Px33 => 33,
        }
    }
}

impl TryFrom<i32> for Smoothing {
    type Error = i32;
    fn try_from(v: i32) -> Result<Self, i32> {
        match v {
            0 => Ok(Self::None),
            1 => Ok(Self::Px5),
            2 => Ok(Self::Px9),
            3 => Ok(Self::Px17),
            4 => Ok(Self::Px33),
            _ => Err(v),
        }
    }
}

/// Device-side temperature drift compensation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum TempCompensation {
    #[default]
    Off = 0,
    On = 1,
}

impl TryFrom<i32> for TempCompensation {
    type Error = i32;
    fn try_from(v: i32) -> Result<Self, i32> {
        match v {
            0 => Ok(Self::Off),
            1 => Ok(Self::On),
            _ => Err(v),
        }
    }
}

/// The three configuration calls, in the order they are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigStage {
    /// Averaging, smoothing and temperature compensation.
    Processing,
    /// Integration rate and x-timing resolution.
    Rate,
    /// Trigger mode.
    Mode,
}

impl fmt::Display for ConfigStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Processing => "processing",
            Self::Rate => "rate",
            Self::Mode => "mode",
        })
    }
}

/// Lifecycle state of a session object.
///
/// There is no `Unopened` value: before `discover_and_open` succeeds no
/// session object exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Opened,
    Configured,
    Closed,
}

/// Acquisition parameters pushed to the device by `configure`.
///
/// `Default` matches the settings of the reference controller: one scan,
/// no smoothing, no temperature compensation, 50 ms at high resolution,
/// normal trigger mode.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionConfig {
    /// Scans to perform and average per `scan_sync` (device accepts 1-99).
    pub scans_to_average: i32,
    pub smoothing: Smoothing,
    pub temperature_compensation: TempCompensation,
    /// Detector integration time in ms (device accepts 2-65500).
    pub rate_ms: i32,
    pub resolution: Resolution,
    pub trigger_mode: TriggerMode,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            scans_to_average: 1,
            smoothing: Smoothing::None,
            temperature_compensation: TempCompensation::Off,
            rate_ms: 50,
            resolution: Resolution::High,
            trigger_mode: TriggerMode::Normal,
        }
    }
}

impl AcquisitionConfig {
    pub fn with_scans_to_average(mut self, scans: i32) -> Self {
        self.scans_to_average = scans;
        self
    }

    pub fn with_smoothing(mut self, smoothing: Smoothing) -> Self {
        self.smoothing = smoothing;
        self
    }

    pub fn with_temperature_compensation(mut self, tempcomp: TempCompensation) -> Self {
        self.temperature_compensation = tempcomp;
        self
    }

    pub fn with_rate(mut self, rate_ms: i32, resolution: Resolution) -> Self {
        self.rate_ms = rate_ms;
        self.resolution = resolution;
        self
    }

    pub fn with_trigger_mode(mut self, mode: TriggerMode) -> Self {
        self.trigger_mode = mode;
        self
    }
}

/// Identification of a USB-attached spectrometer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UsbDevice {
    /// Bus directory name as reported by libusb (e.g. `"001"`).
    pub bus: String,
    pub device_number: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: String,
    pub product: String,
    /// Usually `"?"`; the EPP2000 rarely reports a serial number.
    pub serial_number: String,
}

/// Device record read from the native device list, keyed by link type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceDescriptor {
    Usb(UsbDevice),
    /// Parallel-port device. The native library carries no LPT fields.
    Lpt,
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usb(usb) => write!(
                f,
                "{} {} [{:04x}:{:04x}] on bus {} dev {}",
                usb.manufacturer,
                usb.product,
                usb.vendor_id,
                usb.product_id,
                usb.bus,
                usb.device_number
            ),
            Self::Lpt => f.write_str("LPT device"),
        }
    }
}
