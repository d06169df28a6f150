//! Session lifecycle tests against a scripted in-memory provider.
//!
//! Every native call is journaled so the tests can check call order and
//! that teardown releases the session and device list exactly once.

use std::cell::RefCell;
use std::rc::Rc;

use estrella::*;

#[derive(Default)]
struct Journal {
    calls: Vec<&'static str>,
    fail: Option<(&'static str, i32)>,
    device_count: u32,
    sample: f32,
    update_args: Option<(i32, Smoothing, TempCompensation)>,
    rate_args: Option<(i32, Resolution)>,
    mode_arg: Option<TriggerMode>,
}

impl Journal {
    fn count(&self, call: &str) -> usize {
        self.calls.iter().filter(|&&c| c == call).count()
    }
}

struct MockProvider {
    journal: Rc<RefCell<Journal>>,
}

impl MockProvider {
    fn step(&self, call: &'static str) -> Result<(), NativeStatus> {
        let mut j = self.journal.borrow_mut();
        j.calls.push(call);
        match j.fail {
            Some((at, code)) if at == call => Err(NativeStatus(code)),
            _ => Ok(()),
        }
    }

    fn fill(&self, buffer: &mut ScanBuffer) {
        let v = self.journal.borrow().sample;
        buffer.iter_mut().for_each(|s| *s = v);
    }
}

impl SpectrometerProvider for MockProvider {
    type DeviceList = Vec<usize>;
    type Device = usize;
    type Session = Option<usize>;

    fn list_init(&mut self) -> Result<Vec<usize>, NativeStatus> {
        self.step("list_init")?;
        Ok(Vec::new())
    }

    fn list_clear(&mut self, list: &mut Vec<usize>) -> Result<(), NativeStatus> {
        list.clear();
        self.step("list_clear")
    }

    fn discover_devices(&mut self, list: &mut Vec<usize>) -> Result<(), NativeStatus> {
        self.step("discover_devices")?;
        let n = self.journal.borrow().device_count as usize;
        list.extend(0..n);
        Ok(())
    }

    fn list_count(&mut self, list: &Vec<usize>) -> Result<u32, NativeStatus> {
        self.step("list_count")?;
        Ok(list.len() as u32)
    }

    fn list_get(&mut self, list: &Vec<usize>, index: u32) -> Result<usize, NativeStatus> {
        self.step("list_get")?;
        list.get(index as usize).copied().ok_or(NativeStatus(2))
    }

    fn describe(&mut self, device: usize) -> DeviceDescriptor {
        DeviceDescriptor::Usb(UsbDevice {
            bus: "001".into(),
            device_number: device as u8 + 4,
            vendor_id: 0x0bd7,
            product_id: 0xa012,
            manufacturer: "StellarNet".into(),
            product: "EPP2000".into(),
            serial_number: "?".into(),
        })
    }

    fn session_new(&mut self) -> Option<usize> {
        None
    }

    fn session_init(&mut self, session: &mut Option<usize>, device: usize) -> Result<(), NativeStatus> {
        self.step("session_init")?;
        *session = Some(device);
        Ok(())
    }

    fn session_update(
        &mut self,
        _session: &mut Option<usize>,
        scans_to_average: i32,
        smoothing: Smoothing,
        tempcomp: TempCompensation,
    ) -> Result<(), NativeStatus> {
        self.journal.borrow_mut().update_args = Some((scans_to_average, smoothing, tempcomp));
        self.step("session_update")
    }

    fn session_rate(
        &mut self,
        _session: &mut Option<usize>,
        rate_ms: i32,
        resolution: Resolution,
    ) -> Result<(), NativeStatus> {
        self.journal.borrow_mut().rate_args = Some((rate_ms, resolution));
        self.step("session_rate")
    }

    fn session_mode(&mut self, _session: &mut Option<usize>, mode: TriggerMode) -> Result<(), NativeStatus> {
        self.journal.borrow_mut().mode_arg = Some(mode);
        self.step("session_mode")
    }

    fn session_scan(&mut self, _session: &mut Option<usize>, buffer: &mut ScanBuffer) -> Result<(), NativeStatus> {
        self.step("session_scan")?;
        self.fill(buffer);
        Ok(())
    }

    fn session_async_scan(&mut self, _session: &mut Option<usize>) -> Result<(), NativeStatus> {
        self.step("session_async_scan")
    }

    fn session_async_result(
        &mut self,
        _session: &mut Option<usize>,
        buffer: &mut ScanBuffer,
    ) -> Result<(), NativeStatus> {
        self.step("session_async_result")?;
        self.fill(buffer);
        Ok(())
    }

    fn session_close(&mut self, session: &mut Option<usize>) -> Result<(), NativeStatus> {
        *session = None;
        self.step("session_close")
    }
}

fn mock(device_count: u32, fail: Option<(&'static str, i32)>) -> (MockProvider, Rc<RefCell<Journal>>) {
    let journal = Rc::new(RefCell::new(Journal {
        device_count,
        fail,
        sample: 1234.0,
        ..Default::default()
    }));
    (MockProvider { journal: journal.clone() }, journal)
}

fn assert_torn_down(journal: &Rc<RefCell<Journal>>, session_closed: bool) {
    let j = journal.borrow();
    assert_eq!(j.count("list_clear"), 1, "device list cleared exactly once: {:?}", j.calls);
    assert_eq!(j.count("session_close"), session_closed as usize, "calls: {:?}", j.calls);
    assert_eq!(j.calls.last(), Some(&"list_clear"), "list clear is the last call");
}

// -- Discovery --

#[test]
fn discovery_failure_clears_list() {
    let (provider, journal) = mock(1, Some(("discover_devices", 1)));
    let err = discover_and_open(provider).err().expect("should fail");
    assert!(matches!(err, EstrellaError::DiscoveryFailed(NativeStatus(1))));
    assert_eq!(journal.borrow().calls, ["list_init", "discover_devices", "list_clear"]);
    assert_torn_down(&journal, false);
}

#[test]
fn list_init_failure_is_discovery_failure() {
    let (provider, journal) = mock(1, Some(("list_init", 3)));
    let err = discover_and_open(provider).err().expect("should fail");
    assert!(matches!(err, EstrellaError::DiscoveryFailed(NativeStatus(3))));
    assert_eq!(journal.borrow().calls, ["list_init"]);
}

#[test]
fn zero_devices_is_no_device_found() {
    let (provider, journal) = mock(0, None);
    let err = discover_and_open(provider).err().expect("should fail");
    assert!(matches!(err, EstrellaError::NoDeviceFound));
    assert_torn_down(&journal, false);
    assert_eq!(journal.borrow().count("list_get"), 0);
}

#[test]
fn count_failure_is_no_device_found() {
    let (provider, journal) = mock(2, Some(("list_count", 0)));
    let err = discover_and_open(provider).err().expect("should fail");
    assert!(matches!(err, EstrellaError::NoDeviceFound));
    assert_torn_down(&journal, false);
}

#[test]
fn select_failure_is_device_access_failed() {
    let (provider, journal) = mock(1, Some(("list_get", 0)));
    let err = discover_and_open(provider).err().expect("should fail");
    assert!(matches!(err, EstrellaError::DeviceAccessFailed(NativeStatus(0))));
    assert_torn_down(&journal, false);
    assert_eq!(journal.borrow().count("session_init"), 0);
}

#[test]
fn session_init_failure_closes_partial_session() {
    let (provider, journal) = mock(1, Some(("session_init", 1)));
    let err = discover_and_open(provider).err().expect("should fail");
    assert!(matches!(err, EstrellaError::SessionInitFailed(NativeStatus(1))));
    assert_eq!(
        journal.borrow().calls,
        [
            "list_init",
            "discover_devices",
            "list_count",
            "list_get",
            "session_init",
            "session_close",
            "list_clear"
        ]
    );
    assert_torn_down(&journal, true);
}

#[test]
fn opened_session_reports_first_device() {
    let (provider, journal) = mock(3, None);
    let session = discover_and_open(provider).expect("open");
    assert_eq!(session.state(), SessionState::Opened);
    match session.device() {
        DeviceDescriptor::Usb(usb) => {
            assert_eq!(usb.device_number, 4);
            assert_eq!((usb.vendor_id, usb.product_id), (0x0bd7, 0xa012));
        }
        other => panic!("unexpected descriptor {other:?}"),
    }
    assert_eq!(journal.borrow().count("list_clear"), 0);
    session.close();
    assert_torn_down(&journal, true);
}

#[test]
fn first_device_info_releases_session() {
    let (provider, journal) = mock(1, None);
    let info = first_device_info(provider).expect("info");
    assert!(matches!(info, DeviceDescriptor::Usb(_)));
    assert_torn_down(&journal, true);
}

// -- Configuration --

#[test]
fn configure_pushes_parameters_in_order() {
    let (provider, journal) = mock(1, None);
    let config = AcquisitionConfig::default()
        .with_scans_to_average(3)
        .with_smoothing(Smoothing::Px17)
        .with_temperature_compensation(TempCompensation::On)
        .with_rate(15, Resolution::Low)
        .with_trigger_mode(TriggerMode::Trigger);
    let spec = discover_and_open(provider)
        .and_then(|s| s.configure(&config))
        .expect("configure");
    assert_eq!(spec.state(), SessionState::Configured);
    assert_eq!(spec.config(), &config);

    {
        let j = journal.borrow();
        let tail: Vec<_> = j.calls.iter().skip(5).copied().collect();
        assert_eq!(tail, ["session_update", "session_rate", "session_mode"]);
        assert_eq!(j.update_args, Some((3, Smoothing::Px17, TempCompensation::On)));
        assert_eq!(j.rate_args, Some((15, Resolution::Low)));
        assert_eq!(j.mode_arg, Some(TriggerMode::Trigger));
    }
    spec.close();
    assert_torn_down(&journal, true);
}

#[test]
fn each_config_stage_failure_tears_down() {
    let cases = [
        ("session_update", ConfigStage::Processing),
        ("session_rate", ConfigStage::Rate),
        ("session_mode", ConfigStage::Mode),
    ];
    for (call, expected) in cases {
        let (provider, journal) = mock(1, Some((call, 2)));
        let session = discover_and_open(provider).expect("open");
        let err = session
            .configure(&AcquisitionConfig::default())
            .err()
            .expect("configure should fail");
        match err {
            EstrellaError::ConfigFailed { stage, status } => {
                assert_eq!(stage, expected);
                assert_eq!(status, NativeStatus(2));
            }
            other => panic!("{call}: unexpected error {other}"),
        }
        assert_torn_down(&journal, true);
    }
}

#[test]
fn rate_failure_skips_mode_stage() {
    let (provider, journal) = mock(1, Some(("session_rate", 2)));
    let err = discover_and_open(provider)
        .and_then(|s| s.configure(&AcquisitionConfig::default()))
        .err()
        .expect("should fail");
    assert_eq!(
        err.to_string(),
        "Configuration failed at rate stage (status 2 (Invalid))"
    );
    assert_eq!(journal.borrow().count("session_mode"), 0);
    assert_torn_down(&journal, true);
}

// -- Acquisition --

#[test]
fn happy_path_returns_axis_and_samples() {
    let axis = CalibrationCoefficients::new(2.0, 4.0, 1.0).wavelength_axis();
    assert_eq!(&axis[..3], &[1.0, 3.5, 7.0]);

    let (provider, journal) = mock(1, None);
    let mut spec = discover_and_open(provider)
        .and_then(|s| s.configure(&AcquisitionConfig::default()))
        .expect("open");
    let counts = spec.scan_sync().expect("scan");
    assert_eq!(counts.len(), SENSOR_PIXEL_COUNT);
    assert!(counts.iter().all(|&c| c == 1234.0));
    spec.close();

    let spectrum = Spectrum::new(axis, counts);
    assert_eq!(spectrum.points().count(), SENSOR_PIXEL_COUNT);
    assert_eq!(spectrum.points().next(), Some((1.0, 1234.0)));
    assert_torn_down(&journal, true);
}

#[test]
fn repeated_scans_reuse_session() {
    let (provider, journal) = mock(1, None);
    let mut spec = discover_and_open(provider)
        .and_then(|s| s.configure(&AcquisitionConfig::default()))
        .expect("open");
    for _ in 0..3 {
        assert_eq!(spec.scan_sync().expect("scan").len(), SENSOR_PIXEL_COUNT);
    }
    assert_eq!(journal.borrow().count("session_scan"), 3);
    assert_eq!(journal.borrow().count("session_close"), 0);
}

#[test]
fn scan_failure_tears_down_and_closes_session() {
    let (provider, journal) = mock(1, Some(("session_scan", 4)));
    let mut spec = discover_and_open(provider)
        .and_then(|s| s.configure(&AcquisitionConfig::default()))
        .expect("open");
    let err = spec.scan_sync().unwrap_err();
    assert!(matches!(err, EstrellaError::ScanFailed(s) if s.is_timeout()));
    assert_eq!(spec.state(), SessionState::Closed);
    assert_torn_down(&journal, true);

    assert!(matches!(spec.scan_sync(), Err(EstrellaError::SessionClosed)));
    assert!(matches!(spec.scan_async_start(), Err(EstrellaError::SessionClosed)));
    spec.close();
    assert_torn_down(&journal, true);
    assert_eq!(journal.borrow().count("session_scan"), 1);
}

#[test]
fn async_scan_round_trip() {
    let (provider, journal) = mock(1, None);
    let mut spec = discover_and_open(provider)
        .and_then(|s| s.configure(&AcquisitionConfig::default()))
        .expect("open");
    spec.scan_async_start().expect("start");
    let counts = spec.scan_async_result().expect("result");
    assert_eq!(counts.len(), SENSOR_PIXEL_COUNT);
    assert_eq!(spec.state(), SessionState::Configured);
    drop(spec);
    assert_torn_down(&journal, true);
}

#[test]
fn async_start_failure_tears_down() {
    let (provider, journal) = mock(1, Some(("session_async_scan", 6)));
    let mut spec = discover_and_open(provider)
        .and_then(|s| s.configure(&AcquisitionConfig::default()))
        .expect("open");
    let err = spec.scan_async_start().unwrap_err();
    assert!(matches!(err, EstrellaError::AsyncScanStartFailed(NativeStatus(6))));
    assert_torn_down(&journal, true);
}

#[test]
fn async_result_failure_tears_down() {
    let (provider, journal) = mock(1, Some(("session_async_result", 4)));
    let mut spec = discover_and_open(provider)
        .and_then(|s| s.configure(&AcquisitionConfig::default()))
        .expect("open");
    spec.scan_async_start().expect("start");
    let err = spec.scan_async_result().unwrap_err();
    assert!(matches!(err, EstrellaError::AsyncResultFailed(NativeStatus(4))));
    assert_eq!(spec.state(), SessionState::Closed);
    assert_torn_down(&journal, true);
}

// -- Teardown --

#[test]
fn drop_without_close_tears_down_once() {
    let (provider, journal) = mock(1, None);
    {
        let _spec = discover_and_open(provider)
            .and_then(|s| s.configure(&AcquisitionConfig::default()))
            .expect("open");
    }
    assert_torn_down(&journal, true);
}

#[test]
fn close_errors_are_not_escalated() {
    let (provider, journal) = mock(1, Some(("session_close", 1)));
    let spec = discover_and_open(provider)
        .and_then(|s| s.configure(&AcquisitionConfig::default()))
        .expect("open");
    spec.close();
    assert_torn_down(&journal, true);
}
