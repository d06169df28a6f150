//! Device session manager and acquisition engine.
//!
//! A session moves through `Opened → Configured → Closed`. The first two
//! states are separate types, so scanning an unconfigured session does not
//! compile; `Closed` is reached by `close`, by drop, or by any failed native
//! call, after which every operation returns [`EstrellaError::SessionClosed`].

use log::{debug, info, warn};

use crate::protocol::{NativeStatus, ScanBuffer};
use crate::provider::SpectrometerProvider;
use crate::types::*;
use crate::EstrellaError;

/// The provider together with the native resources of one discovery cycle.
///
/// Owns the device list and, once created, the session bound to one of its
/// elements. [`Link::teardown`] releases both in order (session first, the
/// list it borrows from second) and runs at most once.
pub(crate) struct Link<P: SpectrometerProvider> {
    provider: P,
    list: P::DeviceList,
    session: Option<P::Session>,
    live: bool,
}

impl<P: SpectrometerProvider> Link<P> {
    pub(crate) fn new(provider: P, list: P::DeviceList) -> Self {
        Self {
            provider,
            list,
            session: None,
            live: true,
        }
    }

    pub(crate) fn provider(&mut self) -> &mut P {
        &mut self.provider
    }

    pub(crate) fn list(&mut self) -> (&mut P, &mut P::DeviceList) {
        (&mut self.provider, &mut self.list)
    }

    /// Allocate the session record so a failed init can still be closed.
    pub(crate) fn new_session(&mut self) -> (&mut P, &mut P::Session) {
        let session = self.provider.session_new();
        let session = self.session.insert(session);
        (&mut self.provider, session)
    }

    /// Provider and live session, or `SessionClosed`.
    pub(crate) fn session(&mut self) -> Result<(&mut P, &mut P::Session), EstrellaError> {
        match (self.live, self.session.as_mut()) {
            (true, Some(session)) => Ok((&mut self.provider, session)),
            _ => Err(EstrellaError::SessionClosed),
        }
    }

    pub(crate) fn is_live(&self) -> bool {
        self.live
    }

    /// Pass a native result through; on failure tear down and map the status.
    pub(crate) fn check<T>(
        &mut self,
        result: Result<T, NativeStatus>,
        fail: impl FnOnce(NativeStatus) -> EstrellaError,
    ) -> Result<T, EstrellaError> {
        result.map_err(|status| self.abort(fail(status)))
    }

    /// Tear down and hand back `err` for the caller to return.
    pub(crate) fn abort(&mut self, err: EstrellaError) -> EstrellaError {
        warn!("{err}; tearing down session");
        self.teardown();
        err
    }

    pub(crate) fn teardown(&mut self) {
        if !self.live {
            return;
        }
        self.live = false;

        if let Some(session) = self.session.as_mut() {
            if let Err(status) = self.provider.session_close(session) {
                warn!("session close reported {status}");
            }
        }
        if let Err(status) = self.provider.list_clear(&mut self.list) {
            warn!("device list clear reported {status}");
        }
        debug!("session and device list released");
    }
}

impl<P: SpectrometerProvider> Drop for Link<P> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// An opened, not yet configured session on the first discovered device.
///
/// Created by [`discover_and_open`](crate::discover_and_open). Scanning
/// requires [`configure`](Self::configure) first:
///
/// ```compile_fail
/// fn scan<P: estrella::SpectrometerProvider>(s: &mut estrella::DeviceSession<P>) {
///     let _ = s.scan_sync();
/// }
/// ```
pub struct DeviceSession<P: SpectrometerProvider> {
    link: Link<P>,
    device: DeviceDescriptor,
}

impl<P: SpectrometerProvider> DeviceSession<P> {
    pub(crate) fn new(link: Link<P>, device: DeviceDescriptor) -> Self {
        Self { link, device }
    }

    /// Identification of the device this session is bound to.
    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    pub fn state(&self) -> SessionState {
        if self.link.is_live() {
            SessionState::Opened
        } else {
            SessionState::Closed
        }
    }

    /// Push the acquisition parameters to the device.
    ///
    /// Issues processing (averaging, smoothing, temperature compensation),
    /// then rate/resolution, then trigger mode. The first rejected call
    /// closes the session and fails with `ConfigFailed` naming that stage.
    pub fn configure(self, config: &AcquisitionConfig) -> Result<Spectrometer<P>, EstrellaError> {
        let Self { mut link, device } = self;

        debug!(
            "configure: avg={} smoothing={:?} tempcomp={:?}",
            config.scans_to_average, config.smoothing, config.temperature_compensation
        );
        let (provider, session) = link.session()?;
        let result = provider.session_update(
            session,
            config.scans_to_average,
            config.smoothing,
            config.temperature_compensation,
        );
        link.check(result, |status| EstrellaError::ConfigFailed {
            stage: ConfigStage::Processing,
            status,
        })?;

        debug!("configure: rate={}ms resolution={:?}", config.rate_ms, config.resolution);
        let (provider, session) = link.session()?;
        let result = provider.session_rate(session, config.rate_ms, config.resolution);
        link.check(result, |status| EstrellaError::ConfigFailed {
            stage: ConfigStage::Rate,
            status,
        })?;

        debug!("configure: mode={:?}", config.trigger_mode);
        let (provider, session) = link.session()?;
        let result = provider.session_mode(session, config.trigger_mode);
        link.check(result, |status| EstrellaError::ConfigFailed {
            stage: ConfigStage::Mode,
            status,
        })?;

        Ok(Spectrometer {
            link,
            device,
            config: config.clone(),
        })
    }

    /// Close the session and release the device list.
    pub fn close(self) {
        drop(self);
    }
}

/// A configured session, ready to scan.
///
/// ```no_run
/// use estrella::{AcquisitionConfig, LibraryPaths};
///
/// let mut spec = estrella::open_native(&LibraryPaths::from_env())?
///     .configure(&AcquisitionConfig::default())?;
/// let counts = spec.scan_sync()?;
/// assert_eq!(counts.len(), estrella::SENSOR_PIXEL_COUNT);
/// spec.close();
/// # Ok::<(), estrella::EstrellaError>(())
/// ```
pub struct Spectrometer<P: SpectrometerProvider> {
    link: Link<P>,
    device: DeviceDescriptor,
    config: AcquisitionConfig,
}

impl<P: SpectrometerProvider> Spectrometer<P> {
    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    /// Parameters applied by `configure`.
    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        if self.link.is_live() {
            SessionState::Configured
        } else {
            SessionState::Closed
        }
    }

    /// Trigger a scan and block until its data is read out.
    ///
    /// Blocks for at least one integration period per averaged scan; in
    /// trigger mode, until the external trigger fires.
    pub fn scan_sync(&mut self) -> Result<ScanBuffer, EstrellaError> {
        let mut buffer = ScanBuffer::new();
        let (provider, session) = self.link.session()?;
        debug!("scan: blocking");
        let result = provider.session_scan(session, &mut buffer);
        self.link.check(result, EstrellaError::ScanFailed)?;
        debug!("scan: complete");
        Ok(buffer)
    }

    /// Arm a scan without waiting for it. Fetch the data with
    /// [`scan_async_result`](Self::scan_async_result).
    ///
    /// No averaging is done on the asynchronous path.
    pub fn scan_async_start(&mut self) -> Result<(), EstrellaError> {
        let (provider, session) = self.link.session()?;
        debug!("scan: async start");
        let result = provider.session_async_scan(session);
        self.link.check(result, EstrellaError::AsyncScanStartFailed)
    }

    /// Fetch the data of the scan armed by `scan_async_start`.
    ///
    /// Any non-zero native status, including a timeout while the scan is
    /// still running, is terminal. Only call this after a successful
    /// `scan_async_start`; the session does not track scans in flight.
    pub fn scan_async_result(&mut self) -> Result<ScanBuffer, EstrellaError> {
        let mut buffer = ScanBuffer::new();
        let (provider, session) = self.link.session()?;
        debug!("scan: async result");
        let result = provider.session_async_result(session, &mut buffer);
        self.link.check(result, EstrellaError::AsyncResultFailed)?;
        Ok(buffer)
    }

    /// Close the session and release the device list.
    pub fn close(self) {
        if self.link.is_live() {
            info!("closing session on {}", self.device);
        }
        drop(self);
    }
}
