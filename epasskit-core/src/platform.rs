//! Platform interfaces consumed by the scan session.
//!
//! The document reader, image codec, data-group parser and notification sink are supplied by
//! the host app (Swift/Kotlin through `UniFFI`, or Rust for tests and the CLI).

use std::collections::HashMap;

use crate::error::CapabilityError;
use crate::types::{
    MrzCredentials, NfcResult, ScanOptions, SessionState, ToastDuration, ToastPosition,
};

/// Result type for platform capability calls.
pub type CapabilityResult<T> = Result<T, CapabilityError>;

/// MRZ scanner and NFC chip reader.
#[uniffi::export(with_foreign)]
#[async_trait::async_trait]
pub trait DocumentReader: Send + Sync {
    /// Validates the license token and prepares the reader.
    ///
    /// Returns `false` when the reader rejected the token without raising.
    ///
    /// # Errors
    ///
    /// Returns an error if the handshake fails.
    async fn initialize(&self, credential_token: String) -> CapabilityResult<bool>;

    /// Runs the optical MRZ capture and returns the access credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the capture fails or is cancelled by the user.
    async fn scan_mrz(&self) -> CapabilityResult<MrzCredentials>;

    /// Authenticates against the chip and reads the requested data groups.
    ///
    /// Progress and read errors are reported out of band through the
    /// [`ScanEventBus`](crate::ScanEventBus) while this call is pending.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication or the read fails.
    async fn scan_nfc(&self, options: ScanOptions) -> CapabilityResult<NfcResult>;

    /// Requests that any in-flight chip communication stop. Best effort.
    ///
    /// # Errors
    ///
    /// Returns an error if the request could not be delivered.
    async fn stop_nfc(&self) -> CapabilityResult<()>;
}

/// Converts the chip's JPEG2000 portrait into a displayable JPEG.
#[uniffi::export(with_foreign)]
#[async_trait::async_trait]
pub trait ImageCodec: Send + Sync {
    /// Decodes `image` into displayable bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be decoded.
    async fn decode_image(&self, image: Vec<u8>) -> CapabilityResult<Vec<u8>>;
}

/// Decodes raw data-group payloads.
#[uniffi::export(with_foreign)]
pub trait DataGroupParser: Send + Sync {
    /// Decodes the MRZ fields held in DG1.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is malformed.
    fn extract_fields(&self, dg1: Vec<u8>) -> CapabilityResult<HashMap<String, String>>;

    /// Extracts the encoded facial image held in DG2.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is malformed.
    fn extract_image(&self, dg2: Vec<u8>) -> CapabilityResult<Vec<u8>>;
}

/// Shows a transient message to the user (toast).
#[uniffi::export(with_foreign)]
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    /// Displays `text`, completing once the platform accepted it.
    async fn display(&self, text: String, duration: ToastDuration, position: ToastPosition);
}

/// Receives session updates for UI bindings.
///
/// Callbacks run on the task driving the session and must not block.
#[uniffi::export(with_foreign)]
pub trait SessionObserver: Send + Sync {
    /// The session moved to `state`.
    fn on_state_changed(&self, state: SessionState);

    /// Chip read progress changed to `percent`.
    fn on_progress(&self, percent: u8);
}
