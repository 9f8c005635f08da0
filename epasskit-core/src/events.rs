//! Routing of out-of-band chip reader signals into the scan session.
//!
//! The platform reader reports progress and read errors through callbacks that fire on
//! whatever thread the platform chooses. The bus never touches session state directly: while a
//! chip read is running it forwards each signal over a channel to the task driving that read,
//! which applies it. Signals delivered while nothing is subscribed are dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Deserialize;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::SignalError;

/// Exception marker the reader attaches when PACE/BAC authentication fails.
const AUTHENTICATION_EXCEPTION_MARKER: &str = "onPACEException";

/// Chip status word returned when the chip rejects the MRZ-derived access key.
const SW_SECURITY_STATUS_NOT_SATISFIED: u16 = 0x6300;

/// Read-error kind reported when the NFC link drops.
const CONNECTION_LOST: &str = "ConnectionLost";

/// A signal emitted by the chip reader while a read is running.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Enum)]
pub enum ScanSignal {
    /// The reader completed step `step` of the read.
    Progress {
        /// Index of the completed step.
        step: u32,
    },
    /// The reader hit an error. The read may still recover or fail later.
    ReadError {
        /// Error kind, e.g. `ConnectionLost`.
        kind: Option<String>,
        /// Name of the exception raised inside the reader.
        exception: Option<String>,
        /// Reader message, may carry the chip status word (`SW = 0x6300`).
        message: Option<String>,
    },
    /// The MRZ was rejected by the chip. Only raised by the iOS reader.
    MrzInvalid,
}

impl ScanSignal {
    /// The kind of this signal.
    #[must_use]
    pub const fn kind(&self) -> SignalKind {
        match self {
            Self::Progress { .. } => SignalKind::Progress,
            Self::ReadError { .. } => SignalKind::ReadError,
            Self::MrzInvalid => SignalKind::MrzInvalid,
        }
    }
}

/// Signal kinds, named after the platform events that carry them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum SignalKind {
    /// Step progress.
    #[strum(serialize = "onPassportNfcProgress")]
    Progress,
    /// Read error.
    #[strum(serialize = "onPassportReadError")]
    ReadError,
    /// iOS-only MRZ rejection.
    #[strum(serialize = "iosMrzInvalid")]
    MrzInvalid,
}

#[derive(Deserialize)]
struct ProgressPayload {
    step: u32,
}

#[derive(Deserialize)]
struct ReadErrorPayload {
    #[serde(alias = "kind")]
    error: Option<String>,
    exception: Option<String>,
    message: Option<String>,
}

impl ScanSignal {
    /// Builds a signal from a raw platform event name and its JSON payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the event name is unknown or the payload does not match it.
    pub fn from_platform_event(name: &str, payload: Option<&str>) -> Result<Self, SignalError> {
        let kind: SignalKind = name
            .parse()
            .map_err(|_| SignalError::UnknownEvent(name.to_string()))?;

        let parse_err = |e: serde_json::Error| SignalError::InvalidPayload(format!("{name}: {e}"));
        match kind {
            SignalKind::Progress => {
                let payload = payload
                    .ok_or_else(|| SignalError::InvalidPayload(format!("{name}: missing")))?;
                let ProgressPayload { step } = serde_json::from_str(payload).map_err(parse_err)?;
                Ok(Self::Progress { step })
            }
            SignalKind::ReadError => {
                let ReadErrorPayload {
                    error,
                    exception,
                    message,
                } = serde_json::from_str(payload.unwrap_or("{}")).map_err(parse_err)?;
                Ok(Self::ReadError {
                    kind: error,
                    exception,
                    message,
                })
            }
            SignalKind::MrzInvalid => Ok(Self::MrzInvalid),
        }
    }
}

/// What a read error means for the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadErrorClass {
    /// The NFC link dropped. The reader retries or eventually fails the read.
    ConnectionLost,
    /// The chip rejected the access key derived from the MRZ.
    CredentialMismatch,
    /// Any other read error.
    Other,
}

/// Classifies a read error from its structured fields.
#[must_use]
pub fn classify_read_error(
    kind: Option<&str>,
    exception: Option<&str>,
    message: Option<&str>,
) -> ReadErrorClass {
    if kind == Some(CONNECTION_LOST) {
        return ReadErrorClass::ConnectionLost;
    }
    let authentication_failed =
        exception.is_some_and(|e| e.contains(AUTHENTICATION_EXCEPTION_MARKER));
    if authentication_failed
        && message.and_then(status_word) == Some(SW_SECURITY_STATUS_NOT_SATISFIED)
    {
        return ReadErrorClass::CredentialMismatch;
    }
    ReadErrorClass::Other
}

/// Extracts the chip status word from a reader message such as `"SW = 0x6300: Unknown"`.
///
/// Every `SW` in the message is tried, so words like `SWAP` before the status word and the
/// `SW1SW2` spelling are skipped over.
fn status_word(message: &str) -> Option<u16> {
    message
        .match_indices("SW")
        .find_map(|(start, _)| parse_status_word(&message[start + 2..]))
}

fn parse_status_word(rest: &str) -> Option<u16> {
    let rest = rest.strip_prefix("1SW2").unwrap_or(rest);
    let rest = rest.trim_start_matches([' ', '=', ':']);
    let hex = rest
        .strip_prefix("0x")
        .or_else(|| rest.strip_prefix("0X"))?;
    let digits: String = hex.chars().take_while(char::is_ascii_hexdigit).collect();
    if digits.len() != 4 {
        return None;
    }
    u16::from_str_radix(&digits, 16).ok()
}

/// A message applied by the task driving a chip read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SessionEvent {
    Signal(ScanSignal),
    Abort,
}

struct Routes {
    subscription_id: u64,
    senders: HashMap<SignalKind, UnboundedSender<SessionEvent>>,
}

/// Registry of signal routes for the running chip read.
///
/// One route per [`SignalKind`] is registered by [`ScanEventBus::subscribe`] and all of them
/// are removed together. Platform adapters deliver signals with [`ScanEventBus::on_signal`] or
/// [`ScanEventBus::on_platform_event`] from any thread.
#[derive(Default, uniffi::Object)]
pub struct ScanEventBus {
    routes: Mutex<Option<Routes>>,
    next_subscription_id: AtomicU64,
}

impl ScanEventBus {
    fn routes(&self) -> MutexGuard<'_, Option<Routes>> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a route for every signal kind, forwarding into `sender`.
    ///
    /// The routes are removed when the returned [`Subscription`] is released or dropped.
    pub(crate) fn subscribe(
        self: &Arc<Self>,
        sender: &UnboundedSender<SessionEvent>,
    ) -> Subscription {
        let subscription_id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        let senders = SignalKind::iter()
            .map(|kind| (kind, sender.clone()))
            .collect();

        let previous = self.routes().replace(Routes {
            subscription_id,
            senders,
        });
        if previous.is_some() {
            log::warn!("scan event bus re-subscribed without unsubscribing first");
        }

        Subscription {
            bus: Arc::clone(self),
            subscription_id,
            released: false,
        }
    }

    fn unsubscribe_id(&self, subscription_id: u64) {
        let mut routes = self.routes();
        if routes
            .as_ref()
            .is_some_and(|r| r.subscription_id == subscription_id)
        {
            *routes = None;
        }
    }

    fn route(&self, signal: ScanSignal) -> bool {
        let sender = self
            .routes()
            .as_ref()
            .and_then(|r| r.senders.get(&signal.kind()).cloned());

        match sender {
            Some(sender) => sender.send(SessionEvent::Signal(signal)).is_ok(),
            None => {
                log::debug!("dropping {} signal, no listener registered", signal.kind());
                false
            }
        }
    }
}

#[uniffi::export]
impl ScanEventBus {
    /// Creates a bus with no listeners.
    #[uniffi::constructor]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers a signal from the platform reader.
    ///
    /// Returns whether a listener accepted it.
    #[allow(clippy::needless_pass_by_value)]
    pub fn on_signal(&self, signal: ScanSignal) -> bool {
        self.route(signal)
    }

    /// Delivers a raw platform event (`onPassportNfcProgress`, `onPassportReadError`,
    /// `iosMrzInvalid`) with its optional JSON payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be decoded.
    pub fn on_platform_event(
        &self,
        name: String,
        payload_json: Option<String>,
    ) -> Result<bool, SignalError> {
        let signal = ScanSignal::from_platform_event(&name, payload_json.as_deref())?;
        Ok(self.route(signal))
    }

    /// Removes every registered route. No-op when nothing is registered.
    pub fn unsubscribe(&self) {
        *self.routes() = None;
    }

    /// Number of registered routes: zero, or one per signal kind.
    #[must_use]
    pub fn listener_count(&self) -> u32 {
        self.routes()
            .as_ref()
            .map_or(0, |r| u32::try_from(r.senders.len()).unwrap_or(u32::MAX))
    }
}

/// Scoped registration of the bus routes for one chip read.
///
/// Releasing twice is a no-op, and a stale subscription never removes a newer one.
pub(crate) struct Subscription {
    bus: Arc<ScanEventBus>,
    subscription_id: u64,
    released: bool,
}

impl Subscription {
    pub(crate) fn release(&mut self) {
        if !self.released {
            self.bus.unsubscribe_id(self.subscription_id);
            self.released = true;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
