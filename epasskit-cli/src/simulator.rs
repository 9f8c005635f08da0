//! In-process stand-ins for the platform capabilities.
//!
//! The simulated reader reports progress through the [`ScanEventBus`] as raw platform events,
//! the way the mobile bridges do.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::ValueEnum;
use epasskit_core::platform::{
    CapabilityResult, DataGroupParser, DocumentReader, ImageCodec, NotificationSink,
    SessionObserver,
};
use epasskit_core::{
    CapabilityError, DataGroup, MrzCredentials, NfcResult, ScanEventBus, ScanOptions,
    SessionState, SignalKind, ToastDuration, ToastPosition,
};
use serde_json::json;
use tokio::sync::Notify;

/// How the simulated document behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// The chip is read and the portrait decodes.
    Success,
    /// The read fails halfway with a tag error.
    ChipFailure,
    /// The chip rejects the access key derived from the MRZ.
    WrongMrz,
    /// The NFC link drops once and recovers.
    ConnectionLost,
    /// The reader reports the MRZ invalid and waits to be stopped.
    MrzInvalid,
    /// The chip is read but the portrait cannot be decoded.
    ImageFailure,
}

const DG1_TEXT: &str = "document_type=P\nissuing_state=UTO\nsurname=ERIKSSON\n\
                        given_names=ANNA MARIA\ndocument_number=L898902C3\nnationality=UTO\n\
                        birth_date=740812\nsex=F\nexpiry_date=120415";

/// Document reader that plays a [`Scenario`], publishing its signals on the bus the way a
/// platform bridge would.
pub struct SimulatedReader {
    bus: Arc<ScanEventBus>,
    scenario: Scenario,
    step_delay: Duration,
    total_steps: u32,
    stopped: Notify,
}

impl SimulatedReader {
    /// Creates a reader pausing `step_delay` between each of the `total_steps` progress steps.
    pub fn new(
        bus: Arc<ScanEventBus>,
        scenario: Scenario,
        step_delay: Duration,
        total_steps: u32,
    ) -> Self {
        Self {
            bus,
            scenario,
            step_delay,
            total_steps,
            stopped: Notify::new(),
        }
    }

    fn emit(&self, kind: SignalKind, payload: Option<serde_json::Value>) {
        let payload = payload.map(|p| p.to_string());
        match self.bus.on_platform_event(kind.to_string(), payload) {
            Ok(true) => {}
            Ok(false) => tracing::debug!("{kind} event had no listener"),
            Err(e) => tracing::warn!("malformed {kind} event: {e}"),
        }
    }

    fn read_error(&self, error: &str, exception: Option<&str>, message: &str) {
        self.emit(
            SignalKind::ReadError,
            Some(json!({ "error": error, "exception": exception, "message": message })),
        );
    }
}

#[async_trait::async_trait]
impl DocumentReader for SimulatedReader {
    async fn initialize(&self, credential_token: String) -> CapabilityResult<bool> {
        Ok(!credential_token.is_empty())
    }

    async fn scan_mrz(&self) -> CapabilityResult<MrzCredentials> {
        tokio::time::sleep(self.step_delay).await;
        Ok(MrzCredentials {
            document_number: "L898902C3".to_string(),
            birth_date: "740812".to_string(),
            expiry_date: "120415".to_string(),
        })
    }

    async fn scan_nfc(&self, _options: ScanOptions) -> CapabilityResult<NfcResult> {
        if self.scenario == Scenario::WrongMrz {
            self.read_error("Error", Some("onPACEException"), "SW = 0x6300: Unknown");
            tokio::time::sleep(self.step_delay).await;
            return Err(CapabilityError::Failed("PACE authentication failed".to_string()));
        }

        for step in 1..=self.total_steps {
            match (self.scenario, step) {
                (Scenario::ChipFailure, 4) => {
                    return Err(CapabilityError::Failed("tag response error".to_string()));
                }
                (Scenario::ConnectionLost, 3) => {
                    self.read_error("ConnectionLost", None, "Tag was lost");
                    tokio::time::sleep(self.step_delay * 2).await;
                }
                (Scenario::MrzInvalid, 3) => {
                    self.emit(SignalKind::MrzInvalid, None);
                    self.stopped.notified().await;
                    return Err(CapabilityError::Failed("NFC session invalidated".to_string()));
                }
                _ => {}
            }
            self.emit(SignalKind::Progress, Some(json!({ "step": step })));
            tokio::time::sleep(self.step_delay).await;
        }

        Ok(NfcResult {
            success: true,
            data_groups: HashMap::from([
                (DataGroup::Dg1.to_string(), DG1_TEXT.as_bytes().to_vec()),
                (DataGroup::Dg2.to_string(), b"\x00\x00\x00\x0cjP  ".to_vec()),
            ]),
        })
    }

    async fn stop_nfc(&self) -> CapabilityResult<()> {
        self.stopped.notify_one();
        Ok(())
    }
}

/// Reads `key=value` lines from DG1 and passes DG2 through as the encoded image.
pub struct LineParser;

impl DataGroupParser for LineParser {
    fn extract_fields(&self, dg1: Vec<u8>) -> CapabilityResult<HashMap<String, String>> {
        let text = String::from_utf8(dg1).map_err(|e| CapabilityError::Failed(e.to_string()))?;
        Ok(text
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect())
    }

    fn extract_image(&self, dg2: Vec<u8>) -> CapabilityResult<Vec<u8>> {
        Ok(dg2)
    }
}

/// Wraps the encoded portrait in JPEG markers.
pub struct SimulatedCodec {
    /// Fail every decode instead.
    pub fail: bool,
}

#[async_trait::async_trait]
impl ImageCodec for SimulatedCodec {
    async fn decode_image(&self, image: Vec<u8>) -> CapabilityResult<Vec<u8>> {
        if self.fail {
            return Err(CapabilityError::Failed("jp2 codestream truncated".to_string()));
        }
        let mut jpeg = vec![0xff, 0xd8, 0xff, 0xe0];
        jpeg.extend(image);
        jpeg.extend([0xff, 0xd9]);
        Ok(jpeg)
    }
}

/// Prints toasts and keeps them for the final report.
#[derive(Default)]
pub struct ConsoleToaster {
    shown: Mutex<Vec<String>>,
}

impl ConsoleToaster {
    /// Texts displayed so far, oldest first.
    pub fn shown(&self) -> Vec<String> {
        self.shown
            .lock()
            .map(|shown| shown.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl NotificationSink for ConsoleToaster {
    async fn display(&self, text: String, duration: ToastDuration, position: ToastPosition) {
        eprintln!("[toast {duration:?}/{position:?}] {text}");
        if let Ok(mut shown) = self.shown.lock() {
            shown.push(text);
        }
    }
}

/// Logs state changes and progress.
pub struct ConsoleObserver;

impl SessionObserver for ConsoleObserver {
    fn on_state_changed(&self, state: SessionState) {
        tracing::info!("state: {state}");
    }

    fn on_progress(&self, percent: u8) {
        eprintln!("chip read {percent:>3}%");
    }
}
