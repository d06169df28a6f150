//! Capability interface over the native enumeration and spectrometer libraries.
//!
//! The session manager only ever talks to a device through this trait. The
//! handle types are opaque: the manager creates them through the provider,
//! passes them back, and never looks inside.

use crate::protocol::{NativeStatus, ScanBuffer};
use crate::types::{DeviceDescriptor, Resolution, Smoothing, TempCompensation, TriggerMode};

/// Device enumeration, session lifecycle and scan primitives.
///
/// Every fallible call maps directly onto one native call and reports that
/// call's non-success code as a [`NativeStatus`]. Implementations do not
/// clean up on failure; teardown ordering is owned by the caller.
pub trait SpectrometerProvider {
    /// Native container of discovered devices.
    type DeviceList;
    /// Borrowed reference to one element of a `DeviceList`.
    type Device: Copy;
    /// Native session record.
    type Session;

    /// Allocate an empty device list.
    fn list_init(&mut self) -> Result<Self::DeviceList, NativeStatus>;

    /// Release every element of the list. Always invoked once per lifecycle.
    fn list_clear(&mut self, list: &mut Self::DeviceList) -> Result<(), NativeStatus>;

    /// Populate `list` with attached spectrometers.
    fn discover_devices(&mut self, list: &mut Self::DeviceList) -> Result<(), NativeStatus>;

    fn list_count(&mut self, list: &Self::DeviceList) -> Result<u32, NativeStatus>;

    fn list_get(&mut self, list: &Self::DeviceList, index: u32)
        -> Result<Self::Device, NativeStatus>;

    /// Read the identification record behind a device handle.
    fn describe(&mut self, device: Self::Device) -> DeviceDescriptor;

    /// Allocate a blank session record, not yet bound to a device.
    fn session_new(&mut self) -> Self::Session;

    fn session_init(
        &mut self,
        session: &mut Self::Session,
        device: Self::Device,
    ) -> Result<(), NativeStatus>;

    fn session_update(
        &mut self,
        session: &mut Self::Session,
        scans_to_average: i32,
        smoothing: Smoothing,
        tempcomp: TempCompensation,
    ) -> Result<(), NativeStatus>;

    fn session_rate(
        &mut self,
        session: &mut Self::Session,
        rate_ms: i32,
        resolution: Resolution,
    ) -> Result<(), NativeStatus>;

    fn session_mode(
        &mut self,
        session: &mut Self::Session,
        mode: TriggerMode,
    ) -> Result<(), NativeStatus>;

    /// Blocking scan into `buffer`.
    fn session_scan(
        &mut self,
        session: &mut Self::Session,
        buffer: &mut ScanBuffer,
    ) -> Result<(), NativeStatus>;

    /// Arm a scan and return without waiting for data.
    fn session_async_scan(&mut self, session: &mut Self::Session) -> Result<(), NativeStatus>;

    /// Fetch the data of a previously armed scan into `buffer`.
    fn session_async_result(
        &mut self,
        session: &mut Self::Session,
        buffer: &mut ScanBuffer,
    ) -> Result<(), NativeStatus>;

    /// Release the device bound to `session`. Not idempotent.
    fn session_close(&mut self, session: &mut Self::Session) -> Result<(), NativeStatus>;
}
