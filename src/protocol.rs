//! Native status codes, constants and the fixed-size scan buffer.
//!
//! Pure definitions with no I/O, shared by every provider implementation.

use std::fmt;
use std::ops::{Deref, DerefMut};

/// Pixel count of the EPP2000 detector as exposed by the native library.
///
/// Only 2047 pixels carry data; the library zeroes indices 2047..2051.
pub const SENSOR_PIXEL_COUNT: usize = 2051;

// --- libestrella status codes ---
pub const ESTROK: i32 = 0;
pub const ESTRERR: i32 = 1;
pub const ESTRINV: i32 = 2;
pub const ESTRNOMEM: i32 = 3;
pub const ESTRTIMEOUT: i32 = 4;
pub const ESTRNOTIMPL: i32 = 5;
pub const ESTRALREADY: i32 = 6;

// --- libdll status codes ---
pub const EDLLOK: i32 = 1;

// --- USB identities ---
/// Cypress FX2 before the EPP2000 firmware has been uploaded.
pub const USB_ID_PREUPLOAD: (u16, u16) = (0x04b4, 0x8613);
/// EPP2000 after firmware upload and re-enumeration.
pub const USB_ID_EPP2000: (u16, u16) = (0x0bd7, 0xa012);

/// Symbolic libestrella result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum StatusCode {
    Ok = ESTROK,
    Failed = ESTRERR,
    Invalid = ESTRINV,
    NoMemory = ESTRNOMEM,
    Timeout = ESTRTIMEOUT,
    NotImplemented = ESTRNOTIMPL,
    Already = ESTRALREADY,
}

impl TryFrom<i32> for StatusCode {
    type Error = i32;
    fn try_from(v: i32) -> Result<Self, i32> {
        match v {
            ESTROK => Ok(Self::Ok),
            ESTRERR => Ok(Self::Failed),
            ESTRINV => Ok(Self::Invalid),
            ESTRNOMEM => Ok(Self::NoMemory),
            ESTRTIMEOUT => Ok(Self::Timeout),
            ESTRNOTIMPL => Ok(Self::NotImplemented),
            ESTRALREADY => Ok(Self::Already),
            _ => Err(v),
        }
    }
}

/// Raw return code of a failed native call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeStatus(pub i32);

impl NativeStatus {
    pub fn code(self) -> i32 {
        self.0
    }

    /// Symbolic code, if the value is one libestrella defines.
    pub fn kind(self) -> Option<StatusCode> {
        StatusCode::try_from(self.0).ok()
    }

    pub fn is_timeout(self) -> bool {
        self.kind() == Some(StatusCode::Timeout)
    }
}

impl fmt::Display for NativeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "status {} ({kind:?})", self.0),
            None => write!(f, "status {}", self.0),
        }
    }
}

/// Map a libestrella return code: 0 is success, anything else a failure.
pub fn check_estr(rc: i32) -> Result<(), NativeStatus> {
    if rc == ESTROK {
        Ok(())
    } else {
        Err(NativeStatus(rc))
    }
}

/// Map a libdll return code: `EDLLOK` is success.
pub fn check_dll(rc: i32) -> Result<(), NativeStatus> {
    if rc == EDLLOK {
        Ok(())
    } else {
        Err(NativeStatus(rc))
    }
}

/// One scan worth of detector counts, always [`SENSOR_PIXEL_COUNT`] long.
#[derive(Clone, PartialEq)]
pub struct ScanBuffer(Box<[f32; SENSOR_PIXEL_COUNT]>);

impl ScanBuffer {
    /// Zero-filled buffer.
    pub fn new() -> Self {
        Self(Box::new([0.0; SENSOR_PIXEL_COUNT]))
    }

    pub fn as_array(&self) -> &[f32; SENSOR_PIXEL_COUNT] {
        &self.0
    }

    pub fn as_mut_array(&mut self) -> &mut [f32; SENSOR_PIXEL_COUNT] {
        &mut self.0
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.0.to_vec()
    }
}

impl Default for ScanBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ScanBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanBuffer")
            .field("len", &SENSOR_PIXEL_COUNT)
            .field("head", &&self.0[..4])
            .finish()
    }
}

impl Deref for ScanBuffer {
    type Target = [f32];
    fn deref(&self) -> &[f32] {
        &self.0[..]
    }
}

impl DerefMut for ScanBuffer {
    fn deref_mut(&mut self) -> &mut [f32] {
        &mut self.0[..]
    }
}

impl From<[f32; SENSOR_PIXEL_COUNT]> for ScanBuffer {
    fn from(data: [f32; SENSOR_PIXEL_COUNT]) -> Self {
        Self(Box::new(data))
    }
}

impl TryFrom<Vec<f32>> for ScanBuffer {
    type Error = Vec<f32>;
    fn try_from(v: Vec<f32>) -> Result<Self, Vec<f32>> {
        let boxed: Box<[f32]> = v.into_boxed_slice();
        match boxed.try_into() {
            Ok(arr) => Ok(Self(arr)),
            Err(b) => Err(Vec::from(b)),
        }
    }
}
