//! Device discovery: find the first attached spectrometer and open a session on it.

use log::{debug, info};

use crate::native::{LibraryPaths, NativeProvider};
use crate::provider::SpectrometerProvider;
use crate::session::{DeviceSession, Link};
use crate::types::DeviceDescriptor;
use crate::EstrellaError;

/// Discover attached devices and open a session on device 0.
///
/// Runs list init → discovery → count → select → session init. On any
/// failure the partially opened session is closed and the device list
/// cleared before the error is returned. There is no selection policy:
/// with several devices attached, the first one the native library lists
/// is used.
pub fn discover_and_open<P: SpectrometerProvider>(
    mut provider: P,
) -> Result<DeviceSession<P>, EstrellaError> {
    debug!("discovery: init device list");
    let list = provider
        .list_init()
        .map_err(EstrellaError::DiscoveryFailed)?;
    let mut link = Link::new(provider, list);

    debug!("discovery: find devices");
    let (provider, list) = link.list();
    let result = provider.discover_devices(list);
    link.check(result, EstrellaError::DiscoveryFailed)?;

    let (provider, list) = link.list();
    let result = provider.list_count(list);
    let count = link.check(result, |_| EstrellaError::NoDeviceFound)?;
    debug!("discovery: {count} device(s)");
    if count == 0 {
        return Err(link.abort(EstrellaError::NoDeviceFound));
    }

    let (provider, list) = link.list();
    let result = provider.list_get(list, 0);
    let device = link.check(result, EstrellaError::DeviceAccessFailed)?;
    let descriptor = link.provider().describe(device);

    debug!("session: init on {descriptor}");
    let (provider, session) = link.new_session();
    let result = provider.session_init(session, device);
    link.check(result, EstrellaError::SessionInitFailed)?;

    info!("session opened on {descriptor}");
    Ok(DeviceSession::new(link, descriptor))
}

/// Load the native libraries from `paths` and open the first device.
pub fn open_native(paths: &LibraryPaths) -> Result<DeviceSession<NativeProvider>, EstrellaError> {
    let provider = NativeProvider::load(paths)?;
    discover_and_open(provider)
}

/// Identify the first attached device without keeping a session.
///
/// Opens a session, reads its descriptor and closes it again.
pub fn first_device_info<P: SpectrometerProvider>(
    provider: P,
) -> Result<DeviceDescriptor, EstrellaError> {
    let session = discover_and_open(provider)?;
    let device = session.device().clone();
    session.close();
    Ok(device)
}
