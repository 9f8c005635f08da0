//! The scan session: initialize, capture the MRZ, read the chip, assemble the result.
//!
//! ```rust,ignore
//! let bus = Arc::new(ScanEventBus::new());
//! let notifier = Arc::new(NotificationThrottle::new(toaster, SessionConfig::default()));
//! let session = ScanSession::new(reader, parser, codec, notifier, bus.clone(), SessionConfig::default());
//!
//! session.initialize(license_token).await?;
//! session.capture_mrz().await?;
//! // the platform bridge forwards reader callbacks into `bus` meanwhile
//! let result = session.capture_nfc().await?;
//! ```
//!
//! Operations are serialized: while one is in flight, others fail with [`ScanError::Busy`].
//! Signals from the [`ScanEventBus`] are applied by the task running
//! [`ScanSession::capture_nfc`], never from the delivering thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::assembler::{Assembly, ResultAssembler};
use crate::config::SessionConfig;
use crate::error::{CapabilityError, ScanError};
use crate::events::{
    classify_read_error, ReadErrorClass, ScanEventBus, ScanSignal, SessionEvent, Subscription,
};
use crate::notice::Notice;
use crate::notification::NotificationThrottle;
use crate::platform::{DataGroupParser, DocumentReader, ImageCodec, SessionObserver};
use crate::progress::ProgressTracker;
use crate::types::{
    MrzCredentials, NfcPayload, NfcResult, ScanOptions, SessionSnapshot, SessionState,
    VerificationResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Uninitialized,
    Initialized,
    MrzCaptured,
    NfcInProgress,
}

#[derive(Debug, Default)]
struct SessionData {
    phase: Phase,
    credentials: Option<MrzCredentials>,
    result: Option<VerificationResult>,
}

impl SessionData {
    fn state(&self) -> SessionState {
        match self.phase {
            Phase::Uninitialized => SessionState::Uninitialized,
            Phase::Initialized => SessionState::Initialized,
            Phase::NfcInProgress => SessionState::NfcInProgress,
            Phase::MrzCaptured if self.result.as_ref().is_some_and(|r| r.verified) => {
                SessionState::Verified
            }
            Phase::MrzCaptured => SessionState::MrzCaptured,
        }
    }
}

/// Drives one document verification from initialization to the assembled result.
#[derive(uniffi::Object)]
pub struct ScanSession {
    reader: Arc<dyn DocumentReader>,
    assembler: ResultAssembler,
    notifier: Arc<NotificationThrottle>,
    bus: Arc<ScanEventBus>,
    progress: ProgressTracker,
    observer: Mutex<Option<Arc<dyn SessionObserver>>>,
    data: Mutex<SessionData>,
    control: Mutex<Option<UnboundedSender<SessionEvent>>>,
    in_flight: AtomicBool,
}

#[uniffi::export(async_runtime = "tokio")]
impl ScanSession {
    /// Creates an uninitialized session over the platform capabilities.
    ///
    /// `notifier` and `bus` are usually shared by every session of the process.
    #[uniffi::constructor]
    #[must_use]
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(
        reader: Arc<dyn DocumentReader>,
        parser: Arc<dyn DataGroupParser>,
        codec: Arc<dyn ImageCodec>,
        notifier: Arc<NotificationThrottle>,
        bus: Arc<ScanEventBus>,
        config: SessionConfig,
    ) -> Self {
        Self {
            reader,
            assembler: ResultAssembler::new(parser, codec),
            notifier,
            bus,
            progress: ProgressTracker::new(config.total_nfc_steps),
            observer: Mutex::new(None),
            data: Mutex::new(SessionData::default()),
            control: Mutex::new(None),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Runs the one-time initialization handshake with `credential_token`.
    ///
    /// Calling this on an initialized session shows a notice and does nothing else.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Initialization`] if the reader rejects the token or fails.
    pub async fn initialize(&self, credential_token: String) -> Result<(), ScanError> {
        let Some(_in_flight) = self.begin() else {
            return Err(self.reject(ScanError::Busy).await);
        };

        if self.phase() != Phase::Uninitialized {
            self.notify(Notice::AlreadyInitialized).await;
            return Ok(());
        }

        match self.reader.initialize(credential_token).await {
            Ok(true) => {
                log::info!("document reader initialized");
                self.update(|data| data.phase = Phase::Initialized);
                Ok(())
            }
            Ok(false) => {
                log::error!("document reader rejected the license token");
                Err(self
                    .reject(ScanError::Initialization("license token rejected".to_string()))
                    .await)
            }
            Err(e) => {
                log::error!("document reader initialization failed: {e}");
                Err(self.reject(ScanError::Initialization(e.to_string())).await)
            }
        }
    }

    /// Captures the MRZ, replacing any credentials and result from a previous attempt.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::NotInitialized`] before initialization and
    /// [`ScanError::MrzCapture`] if the capture fails.
    pub async fn capture_mrz(&self) -> Result<MrzCredentials, ScanError> {
        let Some(_in_flight) = self.begin() else {
            return Err(self.reject(ScanError::Busy).await);
        };

        if self.phase() == Phase::Uninitialized {
            return Err(self.reject(ScanError::NotInitialized).await);
        }

        self.update(|data| {
            data.credentials = None;
            data.result = None;
            data.phase = Phase::Initialized;
        });

        match self.reader.scan_mrz().await {
            Ok(credentials) => {
                log::info!("MRZ captured: {credentials:?}");
                self.update(|data| {
                    data.credentials = Some(credentials.clone());
                    data.phase = Phase::MrzCaptured;
                });
                Ok(credentials)
            }
            Err(e) => {
                log::error!("MRZ capture failed: {e}");
                Err(self.reject(ScanError::MrzCapture(e.to_string())).await)
            }
        }
    }

    /// Reads DG1 and DG2 from the chip using the captured MRZ and assembles the result.
    ///
    /// The session is back in `MrzCaptured` (or `Verified`) when this returns, whatever the
    /// outcome, so a failed read can be retried without scanning the MRZ again. A portrait
    /// that cannot be decoded leaves the result verified with an empty portrait.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::NotInitialized`] or [`ScanError::MrzRequired`] when the
    /// preconditions are not met, [`ScanError::Aborted`] if the read was aborted, and
    /// [`ScanError::ChipRead`], [`ScanError::CredentialMismatch`] or
    /// [`ScanError::Assembly`] when the read or extraction fails.
    pub async fn capture_nfc(&self) -> Result<VerificationResult, ScanError> {
        let Some(_in_flight) = self.begin() else {
            return Err(self.reject(ScanError::Busy).await);
        };

        let (phase, credentials) = {
            let data = self.data();
            (data.phase, data.credentials.clone())
        };
        if phase == Phase::Uninitialized {
            return Err(self.reject(ScanError::NotInitialized).await);
        }
        let Some(credentials) = credentials else {
            return Err(self.reject(ScanError::MrzRequired).await);
        };

        self.progress.reset();
        self.publish_progress(0);
        self.update(|data| {
            data.result = None;
            data.phase = Phase::NfcInProgress;
        });

        let (sender, receiver) = mpsc::unbounded_channel();
        let mut attempt = NfcAttempt {
            session: self,
            id: Uuid::new_v4(),
            subscription: self.bus.subscribe(&sender),
            aborted: false,
            credential_mismatch: false,
        };
        *self.control() = Some(sender);
        log::info!("[{}] chip read started", attempt.id);

        let outcome = attempt.run(ScanOptions::from(&credentials), receiver).await;

        match outcome {
            Ok(Assembly {
                result,
                image_error,
            }) => {
                self.data().result = Some(result.clone());
                attempt.finish();
                log::info!("[{}] document verified", attempt.id);
                if image_error.is_some() {
                    self.notify(Notice::ImageDecodeFailed).await;
                }
                Ok(result)
            }
            Err(e) => {
                attempt.finish();
                log::error!("[{}] chip read failed: {e}", attempt.id);
                Err(self.reject(e).await)
            }
        }
    }

    /// Aborts the running chip read, e.g. when the platform reports the MRZ invalid.
    ///
    /// The session returns to `MrzCaptured`, stops listening for signals and asks the reader
    /// to stop. The pending [`ScanSession::capture_nfc`] then fails with
    /// [`ScanError::Aborted`]. No notice is shown for the abort itself.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::NotInProgress`] if no chip read is running.
    pub fn external_abort(&self) -> Result<(), ScanError> {
        // sent under the lock so an accepted abort is queued before the slot can be emptied
        let sent = self
            .control()
            .as_ref()
            .is_some_and(|sender| sender.send(SessionEvent::Abort).is_ok());
        if sent {
            Ok(())
        } else {
            Err(ScanError::NotInProgress)
        }
    }

    /// Tears the session down: aborts a running read, drops every listener and asks the
    /// reader to stop.
    pub async fn shutdown(&self) {
        if self.external_abort().is_ok() {
            log::info!("aborting chip read on shutdown");
        }
        self.bus.unsubscribe();
        if let Err(e) = self.reader.stop_nfc().await {
            log::warn!("stop request on shutdown failed: {e}");
        }
    }

    /// Registers an observer for state and progress changes, replacing any previous one.
    pub fn set_observer(&self, observer: Arc<dyn SessionObserver>) {
        *self.observer() = Some(observer);
    }

    /// Removes the registered observer.
    pub fn clear_observer(&self) {
        *self.observer() = None;
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.data().state()
    }

    /// Whether the initialization handshake has succeeded.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.phase() != Phase::Uninitialized
    }

    /// Progress of the current or last chip read, 0-100.
    #[must_use]
    pub fn progress(&self) -> u8 {
        self.progress.get()
    }

    /// The captured MRZ credentials, if any.
    #[must_use]
    pub fn mrz_credentials(&self) -> Option<MrzCredentials> {
        self.data().credentials.clone()
    }

    /// The result of the last successful chip read, if any.
    #[must_use]
    pub fn verification_result(&self) -> Option<VerificationResult> {
        self.data().result.clone()
    }

    /// A point-in-time view of the session for UI bindings.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let data = self.data();
        let result = data.result.as_ref();
        SessionSnapshot {
            state: data.state(),
            progress: self.progress.get(),
            nfc_in_progress: data.phase == Phase::NfcInProgress,
            verified: result.is_some_and(|r| r.verified),
            has_portrait: result.is_some_and(|r| r.portrait.is_some()),
        }
    }
}

impl ScanSession {
    fn data(&self) -> MutexGuard<'_, SessionData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn control(&self) -> MutexGuard<'_, Option<UnboundedSender<SessionEvent>>> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn observer(&self) -> MutexGuard<'_, Option<Arc<dyn SessionObserver>>> {
        self.observer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn phase(&self) -> Phase {
        self.data().phase
    }

    fn begin(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(&self.in_flight))
    }

    /// Applies `f` to the session data and publishes the resulting state if it changed.
    fn update(&self, f: impl FnOnce(&mut SessionData)) {
        let (before, after) = {
            let mut data = self.data();
            let before = data.state();
            f(&mut data);
            (before, data.state())
        };
        if before != after {
            log::debug!("session state {before} -> {after}");
            let observer = self.observer().clone();
            if let Some(observer) = observer {
                observer.on_state_changed(after);
            }
        }
    }

    fn publish_progress(&self, percent: u8) {
        let observer = self.observer().clone();
        if let Some(observer) = observer {
            observer.on_progress(percent);
        }
    }

    /// Leaves `NfcInProgress` for `MrzCaptured`. No-op in any other phase.
    fn leave_nfc(&self) {
        self.update(|data| {
            if data.phase == Phase::NfcInProgress {
                data.phase = Phase::MrzCaptured;
            }
        });
    }

    async fn notify(&self, notice: Notice) {
        self.notifier.notify(notice.to_string()).await;
    }

    /// Shows the notice for `err`, if it has one, and hands the error back.
    async fn reject(&self, err: ScanError) -> ScanError {
        if let Some(notice) = err.notice() {
            self.notify(notice).await;
        }
        err
    }
}

/// Marks an operation as in flight until dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One chip read. Dropping it releases the bus routes and leaves `NfcInProgress`, so every
/// exit path of [`ScanSession::capture_nfc`] (including a dropped future) cleans up.
struct NfcAttempt<'a> {
    session: &'a ScanSession,
    id: Uuid,
    subscription: Subscription,
    aborted: bool,
    credential_mismatch: bool,
}

impl NfcAttempt<'_> {
    async fn run(
        &mut self,
        options: ScanOptions,
        mut events: UnboundedReceiver<SessionEvent>,
    ) -> Result<Assembly, ScanError> {
        let outcome = self.read_and_assemble(options, &mut events).await;

        // nothing is accepted once routes and slot are gone; what was accepted is queued
        self.subscription.release();
        self.session.control().take();
        self.drain(&mut events).await;

        if self.aborted {
            if outcome.is_ok() {
                log::info!("[{}] discarding result assembled after abort", self.id);
            }
            return Err(ScanError::Aborted);
        }
        outcome
    }

    async fn read_and_assemble(
        &mut self,
        options: ScanOptions,
        events: &mut UnboundedReceiver<SessionEvent>,
    ) -> Result<Assembly, ScanError> {
        let session = self.session;
        let mut read = session.reader.scan_nfc(options);

        let outcome = loop {
            tokio::select! {
                biased;
                Some(event) = events.recv(), if !self.aborted => self.apply(event).await,
                outcome = &mut read => break outcome,
            }
        };
        // signals queued before the read settled still count
        self.drain(events).await;

        let payload = self.settle(outcome)?;
        let assembly = session.assembler.assemble(payload);
        tokio::pin!(assembly);

        loop {
            tokio::select! {
                biased;
                Some(event) = events.recv() => {
                    self.apply(event).await;
                    if self.aborted {
                        log::info!("[{}] abandoning assembly after abort", self.id);
                        return Err(ScanError::Aborted);
                    }
                }
                assembled = &mut assembly => return assembled,
            }
        }
    }

    async fn drain(&mut self, events: &mut UnboundedReceiver<SessionEvent>) {
        while !self.aborted {
            match events.try_recv() {
                Ok(event) => self.apply(event).await,
                Err(_) => break,
            }
        }
    }

    fn settle(
        &self,
        outcome: Result<NfcResult, CapabilityError>,
    ) -> Result<NfcPayload, ScanError> {
        if self.aborted {
            match &outcome {
                Ok(_) => log::info!("[{}] discarding chip read that completed after abort", self.id),
                Err(e) => log::info!("[{}] aborted chip read settled: {e}", self.id),
            }
            return Err(ScanError::Aborted);
        }

        let raw = match outcome {
            Ok(raw) => raw,
            Err(e) if self.credential_mismatch => {
                return Err(ScanError::CredentialMismatch(e.to_string()))
            }
            Err(e) => return Err(ScanError::ChipRead(e.to_string())),
        };
        if !raw.success {
            log::debug!("[{}] reader returned data with transport flag unset", self.id);
        }

        NfcPayload::try_from(raw)
    }

    async fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Signal(ScanSignal::Progress { step }) => {
                let percent = self.session.progress.update(step);
                log::debug!("[{}] chip read step {step} ({percent}%)", self.id);
                self.session.publish_progress(percent);
            }
            SessionEvent::Signal(ScanSignal::ReadError {
                kind,
                exception,
                message,
            }) => {
                match classify_read_error(kind.as_deref(), exception.as_deref(), message.as_deref())
                {
                    ReadErrorClass::ConnectionLost => {
                        log::warn!("[{}] NFC connection lost, waiting for the reader", self.id);
                    }
                    ReadErrorClass::CredentialMismatch => {
                        log::error!("[{}] incorrect MRZ credentials for NFC chip", self.id);
                        self.credential_mismatch = true;
                    }
                    ReadErrorClass::Other => log::error!(
                        "[{}] chip read error: kind={kind:?} exception={exception:?} message={message:?}",
                        self.id
                    ),
                }
            }
            SessionEvent::Signal(ScanSignal::MrzInvalid) | SessionEvent::Abort => {
                log::warn!("[{}] chip read aborted", self.id);
                self.aborted = true;
                self.finish();
                if let Err(e) = self.session.reader.stop_nfc().await {
                    log::warn!("[{}] stop request failed: {e}", self.id);
                }
            }
        }
    }

    /// Releases the bus routes and the abort channel and leaves `NfcInProgress`. Idempotent.
    fn finish(&mut self) {
        self.subscription.release();
        self.session.control().take();
        self.session.leave_nfc();
    }
}

impl Drop for NfcAttempt<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}
