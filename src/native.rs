//! Runtime binding to the native `libdll` and `libestrella` shared libraries.
//!
//! Both libraries are loaded with `libloading`; their record layouts are
//! mirrored with `#[repr(C)]` structs that nothing outside this module sees.

use std::ffi::{c_char, c_int, c_uchar, c_uint, c_ushort, c_void};
use std::path::{Path, PathBuf};
use std::ptr;

use libloading::Library;
use log::debug;

use crate::protocol::{check_dll, check_estr, NativeStatus, ScanBuffer, ESTRINV};
use crate::provider::SpectrometerProvider;
use crate::types::*;
use crate::EstrellaError;

const ESTRELLA_PATH_MAX: usize = 256;
const DEV_USB: c_int = 0;
const DEV_LPT: c_int = 1;

/// Environment variable overriding the `libdll` location.
pub const ENV_DLL_LIB: &str = "ESTRELLA_DLL_LIB";
/// Environment variable overriding the `libestrella` location.
pub const ENV_ESTRELLA_LIB: &str = "ESTRELLA_LIB";

/// Locations of the two native libraries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryPaths {
    /// Doubly-linked list library used for device enumeration.
    pub enumeration: PathBuf,
    /// Spectrometer protocol library.
    pub spectrometer: PathBuf,
}

impl Default for LibraryPaths {
    fn default() -> Self {
        let ext = if cfg!(target_os = "macos") { "dylib" } else { "so" };
        Self {
            enumeration: PathBuf::from(format!("/opt/libdll/lib/libdll.{ext}")),
            spectrometer: PathBuf::from(format!("/opt/estrella/lib/libestrella.{ext}")),
        }
    }
}

impl LibraryPaths {
    pub fn new(enumeration: impl Into<PathBuf>, spectrometer: impl Into<PathBuf>) -> Self {
        Self {
            enumeration: enumeration.into(),
            spectrometer: spectrometer.into(),
        }
    }

    /// Defaults, overridden by `ESTRELLA_DLL_LIB` / `ESTRELLA_LIB` when set.
    pub fn from_env() -> Self {
        let mut paths = Self::default();
        if let Some(p) = std::env::var_os(ENV_DLL_LIB) {
            paths.enumeration = PathBuf::from(p);
        }
        if let Some(p) = std::env::var_os(ENV_ESTRELLA_LIB) {
            paths.spectrometer = PathBuf::from(p);
        }
        paths
    }
}

// --- Native record layouts ---

/// `dll_list_t`
#[repr(C)]
#[allow(dead_code)]
pub struct RawDeviceList {
    count: c_uint,
    first: *mut c_void,
    last: *mut c_void,
}

/// `estrella_usbdev_t`
#[repr(C)]
#[derive(Clone, Copy)]
struct RawUsbDev {
    bus: [c_char; ESTRELLA_PATH_MAX],
    devnum: c_uchar,
    vendorid: c_ushort,
    productid: c_ushort,
    manufacturer: [c_char; 128],
    product: [c_char; 128],
    serialnumber: [c_char; 32],
}

/// `estrella_dev_t`. The union has a single USB member.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawDevice {
    devicetype: c_int,
    usb: RawUsbDev,
}

/// `estrella_session_t`. Only the native library reads or writes it.
#[repr(C)]
#[allow(dead_code)]
pub struct RawSession {
    rate: c_int,
    scanstoavg: c_int,
    xtmode: c_int,
    xtrate: c_int,
    xsmooth: c_int,
    tempcomp: c_int,
    dev: RawDevice,
    usb_dev_handle: *mut c_void,
    lock: c_int,
}

impl RawSession {
    fn zeroed() -> Box<Self> {
        // SAFETY: every field is an integer, an integer array or a raw
        // pointer, all of which are valid when zero.
        Box::new(unsafe { std::mem::zeroed() })
    }
}

type DllListFn = unsafe extern "C" fn(*mut RawDeviceList) -> c_int;
type DllCountFn = unsafe extern "C" fn(*mut RawDeviceList, *mut c_uint) -> c_int;
type DllGetFn =
    unsafe extern "C" fn(*mut RawDeviceList, *mut *mut c_void, *mut c_void, c_int) -> c_int;
type SessionFn = unsafe extern "C" fn(*mut RawSession) -> c_int;
type InitFn = unsafe extern "C" fn(*mut RawSession, *mut RawDevice) -> c_int;
type UpdateFn = unsafe extern "C" fn(*mut RawSession, c_int, c_int, c_int) -> c_int;
type RateFn = unsafe extern "C" fn(*mut RawSession, c_int, c_int) -> c_int;
type ModeFn = unsafe extern "C" fn(*mut RawSession, c_int) -> c_int;
type ScanFn = unsafe extern "C" fn(*mut RawSession, *mut f32) -> c_int;

/// Provider backed by the real shared libraries.
pub struct NativeProvider {
    dll_init: DllListFn,
    dll_clear: DllListFn,
    dll_count: DllCountFn,
    dll_get: DllGetFn,
    find_devices: DllListFn,
    init: InitFn,
    close: SessionFn,
    update: UpdateFn,
    rate: RateFn,
    mode: ModeFn,
    scan: ScanFn,
    async_scan: SessionFn,
    async_result: ScanFn,
    // Keep the libraries mapped for as long as the function pointers live.
    _dll: Library,
    _estrella: Library,
}

fn open_library(path: &Path) -> Result<Library, EstrellaError> {
    // SAFETY: loading runs the library's initialisers; libdll and
    // libestrella have none with side effects beyond their own globals.
    unsafe { Library::new(path) }
        .map_err(|e| EstrellaError::Library(format!("Failed to load {}: {e}", path.display())))
}

fn symbol<T: Copy>(lib: &Library, name: &str) -> Result<T, EstrellaError> {
    // SAFETY: `T` is the C signature declared in the library's public header.
    unsafe { lib.get::<T>(name.as_bytes()) }
        .map(|sym| *sym)
        .map_err(|e| EstrellaError::Library(format!("Missing symbol {name}: {e}")))
}

impl NativeProvider {
    /// Load both libraries and resolve every symbol the driver uses.
    pub fn load(paths: &LibraryPaths) -> Result<Self, EstrellaError> {
        debug!(
            "loading {} and {}",
            paths.enumeration.display(),
            paths.spectrometer.display()
        );
        let dll = open_library(&paths.enumeration)?;
        let estrella = open_library(&paths.spectrometer)?;

        Ok(Self {
            dll_init: symbol(&dll, "dll_init")?,
            dll_clear: symbol(&dll, "dll_clear")?,
            dll_count: symbol(&dll, "dll_count")?,
            dll_get: symbol(&dll, "dll_get")?,
            find_devices: symbol(&estrella, "estrella_find_devices")?,
            init: symbol(&estrella, "estrella_init")?,
            close: symbol(&estrella, "estrella_close")?,
            update: symbol(&estrella, "estrella_update")?,
            rate: symbol(&estrella, "estrella_rate")?,
            mode: symbol(&estrella, "estrella_mode")?,
            scan: symbol(&estrella, "estrella_scan")?,
            async_scan: symbol(&estrella, "estrella_async_scan")?,
            async_result: symbol(&estrella, "estrella_async_result")?,
            _dll: dll,
            _estrella: estrella,
        })
    }
}

/// NUL-terminated fixed-size C string field to an owned `String`.
fn c_field(raw: &[c_char]) -> String {
    let bytes: Vec<u8> = raw.iter().map(|&c| c as u8).collect();
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

impl SpectrometerProvider for NativeProvider {
    type DeviceList = Box<RawDeviceList>;
    type Device = *mut RawDevice;
    type Session = Box<RawSession>;

    fn list_init(&mut self) -> Result<Self::DeviceList, NativeStatus> {
        let mut list = Box::new(RawDeviceList {
            count: 0,
            first: ptr::null_mut(),
            last: ptr::null_mut(),
        });
        // The init return value differs between libdll releases; the list is
        // usable once the call returns.
        unsafe { (self.dll_init)(&mut *list) };
        Ok(list)
    }

    fn list_clear(&mut self, list: &mut Self::DeviceList) -> Result<(), NativeStatus> {
        check_dll(unsafe { (self.dll_clear)(&mut **list) })
    }

    fn discover_devices(&mut self, list: &mut Self::DeviceList) -> Result<(), NativeStatus> {
        check_estr(unsafe { (self.find_devices)(&mut **list) })
    }

    fn list_count(&mut self, list: &Self::DeviceList) -> Result<u32, NativeStatus> {
        let mut count: c_uint = 0;
        let list_ptr = &**list as *const RawDeviceList as *mut RawDeviceList;
        check_dll(unsafe { (self.dll_count)(list_ptr, &mut count) })?;
        Ok(count)
    }

    fn list_get(
        &mut self,
        list: &Self::DeviceList,
        index: u32,
    ) -> Result<Self::Device, NativeStatus> {
        let index = c_int::try_from(index).map_err(|_| NativeStatus(ESTRINV))?;
        let mut data: *mut c_void = ptr::null_mut();
        let list_ptr = &**list as *const RawDeviceList as *mut RawDeviceList;
        check_dll(unsafe { (self.dll_get)(list_ptr, &mut data, ptr::null_mut(), index) })?;
        if data.is_null() {
            return Err(NativeStatus(ESTRINV));
        }
        Ok(data.cast())
    }

    fn describe(&mut self, device: Self::Device) -> DeviceDescriptor {
        // SAFETY: `device` came from `list_get` and the list is still alive.
        let raw = unsafe { *device };
        match raw.devicetype {
            DEV_USB => DeviceDescriptor::Usb(UsbDevice {
                bus: c_field(&raw.usb.bus),
                device_number: raw.usb.devnum,
                vendor_id: raw.usb.vendorid,
                product_id: raw.usb.productid,
                manufacturer: c_field(&raw.usb.manufacturer),
                product: c_field(&raw.usb.product),
                serial_number: c_field(&raw.usb.serialnumber),
            }),
            DEV_LPT => DeviceDescriptor::Lpt,
            other => {
                debug!("unknown device type {other}, treating as LPT");
                DeviceDescriptor::Lpt
            }
        }
    }

    fn session_new(&mut self) -> Self::Session {
        RawSession::zeroed()
    }

    fn session_init(
        &mut self,
        session: &mut Self::Session,
        device: Self::Device,
    ) -> Result<(), NativeStatus> {
        check_estr(unsafe { (self.init)(&mut **session, device) })
    }

    fn session_update(
        &mut self,
        session: &mut Self::Session,
        scans_to_average: i32,
        smoothing: Smoothing,
        tempcomp: TempCompensation,
    ) -> Result<(), NativeStatus> {
        check_estr(unsafe {
            (self.update)(
                &mut **session,
                scans_to_average,
                smoothing as c_int,
                tempcomp as c_int,
            )
        })
    }

    fn session_rate(
        &mut self,
        session: &mut Self::Session,
        rate_ms: i32,
        resolution: Resolution,
    ) -> Result<(), NativeStatus> {
        check_estr(unsafe { (self.rate)(&mut **session, rate_ms, resolution as c_int) })
    }

    fn session_mode(
        &mut self,
        session: &mut Self::Session,
        mode: TriggerMode,
    ) -> Result<(), NativeStatus> {
        check_estr(unsafe { (self.mode)(&mut **session, mode as c_int) })
    }

    fn session_scan(
        &mut self,
        session: &mut Self::Session,
        buffer: &mut ScanBuffer,
    ) -> Result<(), NativeStatus> {
        let out = buffer.as_mut_array().as_mut_ptr();
        check_estr(unsafe { (self.scan)(&mut **session, out) })
    }

    fn session_async_scan(&mut self, session: &mut Self::Session) -> Result<(), NativeStatus> {
        check_estr(unsafe { (self.async_scan)(&mut **session) })
    }

    fn session_async_result(
        &mut self,
        session: &mut Self::Session,
        buffer: &mut ScanBuffer,
    ) -> Result<(), NativeStatus> {
        let out = buffer.as_mut_array().as_mut_ptr();
        check_estr(unsafe { (self.async_result)(&mut **session, out) })
    }

    fn session_close(&mut self, session: &mut Self::Session) -> Result<(), NativeStatus> {
        check_estr(unsafe { (self.close)(&mut **session) })
    }
}
