use thiserror::Error;

use crate::notice::Notice;

/// Errors raised by the platform capabilities (reader, codec, parser).
///
/// Foreign implementations return these from their trait methods; the session never shows
/// their contents to the user verbatim.
#[derive(Debug, Error, uniffi::Error)]
pub enum CapabilityError {
    /// The capability reported a failure with details.
    #[error("capability failed: {0}")]
    Failed(String),

    /// The capability is not available on this device (e.g. no NFC hardware).
    #[error("capability unavailable: {0}")]
    Unavailable(String),

    /// Unexpected `UniFFI` callback error.
    #[error("unexpected uniffi callback error: {0}")]
    UnexpectedUniFFICallbackError(String),
}

impl From<uniffi::UnexpectedUniFFICallbackError> for CapabilityError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::UnexpectedUniFFICallbackError(error.reason)
    }
}

/// Error outputs from a [`ScanSession`](crate::ScanSession) operation.
#[derive(Debug, Error, uniffi::Error)]
pub enum ScanError {
    /// The SDK has not been initialized.
    #[error("sdk_not_initialized")]
    NotInitialized,
    /// NFC capture was requested without MRZ credentials.
    #[error("mrz_required")]
    MrzRequired,
    /// Another session operation is still in flight.
    #[error("operation_in_flight")]
    Busy,
    /// An abort was requested while no NFC read was running.
    #[error("nfc_not_in_progress")]
    NotInProgress,
    /// The initialization handshake failed or was rejected.
    #[error("initialization_failed: {0}")]
    Initialization(String),
    /// The MRZ capture failed.
    #[error("mrz_capture_failed: {0}")]
    MrzCapture(String),
    /// The chip read failed.
    #[error("chip_read_failed: {0}")]
    ChipRead(String),
    /// The chip rejected the MRZ-derived access key.
    #[error("credential_mismatch: {0}")]
    CredentialMismatch(String),
    /// The NFC read was aborted before it settled.
    #[error("nfc_aborted")]
    Aborted,
    /// Field or image extraction from the data groups failed.
    #[error("assembly_failed: {0}")]
    Assembly(String),
    /// The presented input is not valid for the requested operation.
    #[error("invalid_input: {attribute}: {reason}")]
    InvalidInput {
        /// The attribute that was rejected.
        attribute: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ScanError {
    /// The user-facing notice for this error, if one should be shown.
    #[must_use]
    pub const fn notice(&self) -> Option<Notice> {
        match self {
            Self::NotInitialized => Some(Notice::SdkNotInitialized),
            Self::MrzRequired => Some(Notice::ScanMrzFirst),
            Self::Busy => Some(Notice::ScanInProgress),
            Self::Initialization(_) => Some(Notice::InitializeFailed),
            Self::MrzCapture(_) => Some(Notice::MrzScanFailed),
            Self::ChipRead(_)
            | Self::CredentialMismatch(_)
            | Self::Aborted
            | Self::Assembly(_) => Some(Notice::NfcScanFailed),
            Self::NotInProgress | Self::InvalidInput { .. } => None,
        }
    }
}

/// Errors raised while ingesting raw platform events.
#[derive(Debug, Error, uniffi::Error)]
pub enum SignalError {
    /// The event name is not one the bus understands.
    #[error("unknown_event: {0}")]
    UnknownEvent(String),
    /// The event payload was missing or malformed.
    #[error("invalid_payload: {0}")]
    InvalidPayload(String),
}
