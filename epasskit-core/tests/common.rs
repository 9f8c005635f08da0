//! Common test utilities shared across integration tests.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use epasskit_core::platform::{
    CapabilityResult, DataGroupParser, DocumentReader, ImageCodec, NotificationSink,
    SessionObserver,
};
use epasskit_core::{
    CapabilityError, MrzCredentials, NfcResult, NotificationThrottle, ScanEventBus, ScanOptions,
    ScanSession, ScanSignal, SessionConfig, SessionState, ToastDuration, ToastPosition,
};
use tokio::sync::Notify;

pub const DG1: &str = "surname=DOE\ngiven_names=JANE\ndocument_number=NL1234567";
pub const DG2: &[u8] = b"jp2-codestream";

pub fn credentials() -> MrzCredentials {
    MrzCredentials {
        document_number: "NL1234567".to_string(),
        birth_date: "900101".to_string(),
        expiry_date: "300101".to_string(),
    }
}

#[allow(dead_code, reason = "not every test uses every variant")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitBehavior {
    Accept,
    Reject,
    Fail,
}

#[allow(dead_code, reason = "not every test uses every variant")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NfcBehavior {
    /// Reports all seven steps, then returns DG1 and DG2.
    Succeed,
    /// Reports the first step, then fails.
    Fail,
    /// Reports a PACE rejection of the access key, then fails.
    RejectCredentials,
    /// Reports a dropped link, then recovers and succeeds.
    LoseConnectionThenSucceed,
    /// Reports two steps and the iOS MRZ-invalid signal, waits for the stop request, then
    /// fails.
    MrzInvalid,
    /// Waits until released by the test or a stop request, then fails.
    Hang,
}

/// Scripted document reader delivering its signals through the bus like a platform bridge.
pub struct FakeReader {
    bus: Arc<ScanEventBus>,
    pub init: Mutex<InitBehavior>,
    pub mrz_fails: Mutex<bool>,
    pub nfc: Mutex<NfcBehavior>,
    pub calls: Mutex<Vec<&'static str>>,
    pub listeners_at_read: Mutex<Vec<u32>>,
    pub listeners_at_stop: Mutex<Vec<u32>>,
    pub late_signal_accepted: Mutex<Option<bool>>,
    pub started: Notify,
    pub release: Notify,
    stopped: Notify,
}

impl FakeReader {
    pub fn new(bus: Arc<ScanEventBus>) -> Self {
        Self {
            bus,
            init: Mutex::new(InitBehavior::Accept),
            mrz_fails: Mutex::new(false),
            nfc: Mutex::new(NfcBehavior::Succeed),
            calls: Mutex::new(Vec::new()),
            listeners_at_read: Mutex::new(Vec::new()),
            listeners_at_stop: Mutex::new(Vec::new()),
            late_signal_accepted: Mutex::new(None),
            started: Notify::new(),
            release: Notify::new(),
            stopped: Notify::new(),
        }
    }

    pub fn set_nfc(&self, behavior: NfcBehavior) {
        *self.nfc.lock().unwrap() = behavior;
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    async fn steps(&self, steps: std::ops::RangeInclusive<u32>) {
        for step in steps {
            self.bus.on_signal(ScanSignal::Progress { step });
            tokio::task::yield_now().await;
        }
    }

    fn chip_data() -> NfcResult {
        NfcResult {
            success: true,
            data_groups: HashMap::from([
                ("DG1".to_string(), DG1.as_bytes().to_vec()),
                ("DG2".to_string(), DG2.to_vec()),
            ]),
        }
    }

    fn failed(reason: &str) -> CapabilityError {
        CapabilityError::Failed(reason.to_string())
    }
}

#[async_trait::async_trait]
impl DocumentReader for FakeReader {
    async fn initialize(&self, _credential_token: String) -> CapabilityResult<bool> {
        self.record("initialize");
        let behavior = *self.init.lock().unwrap();
        match behavior {
            InitBehavior::Accept => Ok(true),
            InitBehavior::Reject => Ok(false),
            InitBehavior::Fail => Err(Self::failed("license expired")),
        }
    }

    async fn scan_mrz(&self) -> CapabilityResult<MrzCredentials> {
        self.record("scan_mrz");
        if *self.mrz_fails.lock().unwrap() {
            return Err(Self::failed("camera permission denied"));
        }
        Ok(credentials())
    }

    async fn scan_nfc(&self, options: ScanOptions) -> CapabilityResult<NfcResult> {
        self.record("scan_nfc");
        assert_eq!(options.document_number, credentials().document_number);
        self.listeners_at_read
            .lock()
            .unwrap()
            .push(self.bus.listener_count());

        let behavior = *self.nfc.lock().unwrap();
        match behavior {
            NfcBehavior::Succeed => {
                self.steps(1..=7).await;
                Ok(Self::chip_data())
            }
            NfcBehavior::Fail => {
                self.steps(1..=1).await;
                Err(Self::failed("tag response error"))
            }
            NfcBehavior::RejectCredentials => {
                self.bus.on_signal(ScanSignal::ReadError {
                    kind: Some("Error".to_string()),
                    exception: Some("onPACEException".to_string()),
                    message: Some("SW = 0x6300: Unknown".to_string()),
                });
                tokio::task::yield_now().await;
                Err(Self::failed("PACE failed"))
            }
            NfcBehavior::LoseConnectionThenSucceed => {
                self.steps(1..=3).await;
                self.bus.on_signal(ScanSignal::ReadError {
                    kind: Some("ConnectionLost".to_string()),
                    exception: None,
                    message: Some("Tag was lost".to_string()),
                });
                self.steps(4..=7).await;
                Ok(Self::chip_data())
            }
            NfcBehavior::MrzInvalid => {
                self.steps(1..=2).await;
                self.bus.on_signal(ScanSignal::MrzInvalid);
                self.stopped.notified().await;
                let accepted = self.bus.on_signal(ScanSignal::Progress { step: 5 });
                *self.late_signal_accepted.lock().unwrap() = Some(accepted);
                Err(Self::failed("NFC session invalidated"))
            }
            NfcBehavior::Hang => {
                self.started.notify_one();
                self.release.notified().await;
                Err(Self::failed("reader session closed"))
            }
        }
    }

    async fn stop_nfc(&self) -> CapabilityResult<()> {
        self.record("stop_nfc");
        self.listeners_at_stop
            .lock()
            .unwrap()
            .push(self.bus.listener_count());
        self.stopped.notify_one();
        self.release.notify_one();
        Ok(())
    }
}

/// Parser treating DG1 as `key=value` lines and DG2 as the encoded image.
pub struct PlainParser;

impl DataGroupParser for PlainParser {
    fn extract_fields(&self, dg1: Vec<u8>) -> CapabilityResult<HashMap<String, String>> {
        let text = String::from_utf8(dg1).map_err(|e| CapabilityError::Failed(e.to_string()))?;
        Ok(text
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect())
    }

    fn extract_image(&self, dg2: Vec<u8>) -> CapabilityResult<Vec<u8>> {
        Ok(dg2)
    }
}

/// Codec that converts to a fake JPEG, or fails when `fail` is set.
pub struct FakeCodec {
    pub fail: bool,
}

#[async_trait::async_trait]
impl ImageCodec for FakeCodec {
    async fn decode_image(&self, image: Vec<u8>) -> CapabilityResult<Vec<u8>> {
        if self.fail {
            return Err(CapabilityError::Failed("unsupported jp2 codestream".to_string()));
        }
        let mut jpeg = vec![0xff, 0xd8];
        jpeg.extend(image);
        Ok(jpeg)
    }
}

/// Codec that parks in `decode_image` until released.
#[derive(Default)]
pub struct GatedCodec {
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait::async_trait]
impl ImageCodec for GatedCodec {
    async fn decode_image(&self, image: Vec<u8>) -> CapabilityResult<Vec<u8>> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(image)
    }
}

#[derive(Default)]
pub struct RecordingSink {
    shown: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl NotificationSink for RecordingSink {
    async fn display(&self, text: String, _duration: ToastDuration, _position: ToastPosition) {
        self.shown.lock().unwrap().push(text);
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    pub states: Mutex<Vec<SessionState>>,
    pub progress: Mutex<Vec<u8>>,
}

impl RecordingObserver {
    pub fn states(&self) -> Vec<SessionState> {
        self.states.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<u8> {
        self.progress.lock().unwrap().clone()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_state_changed(&self, state: SessionState) {
        self.states.lock().unwrap().push(state);
    }

    fn on_progress(&self, percent: u8) {
        self.progress.lock().unwrap().push(percent);
    }
}

/// A session wired to fakes.
pub struct Harness {
    pub session: Arc<ScanSession>,
    pub reader: Arc<FakeReader>,
    pub bus: Arc<ScanEventBus>,
    pub sink: Arc<RecordingSink>,
    pub observer: Arc<RecordingObserver>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::build(Arc::new(FakeCodec { fail: false }))
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failing_codec() -> Self {
        Self::build(Arc::new(FakeCodec { fail: true }))
    }

    pub fn with_codec(codec: Arc<dyn ImageCodec>) -> Self {
        Self::build(codec)
    }

    fn build(codec: Arc<dyn ImageCodec>) -> Self {
        let bus = Arc::new(ScanEventBus::new());
        let reader = Arc::new(FakeReader::new(bus.clone()));
        let sink = Arc::new(RecordingSink::default());
        let observer = Arc::new(RecordingObserver::default());
        let notifier = Arc::new(NotificationThrottle::new(
            sink.clone(),
            SessionConfig::default(),
        ));
        let session = Arc::new(ScanSession::new(
            reader.clone(),
            Arc::new(PlainParser),
            codec,
            notifier,
            bus.clone(),
            SessionConfig::default(),
        ));
        session.set_observer(observer.clone());

        Self {
            session,
            reader,
            bus,
            sink,
            observer,
        }
    }

    /// Initializes the session and captures the MRZ.
    pub async fn ready_for_nfc(&self) {
        self.session.initialize("license".to_string()).await.unwrap();
        self.session.capture_mrz().await.unwrap();
        assert_eq!(self.session.state(), SessionState::MrzCaptured);
    }
}
