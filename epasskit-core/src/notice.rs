use strum::{Display, EnumString};

/// User-facing status messages emitted by a scan session.
///
/// The `Display` text is what the notification sink receives. Platforms that localize can
/// match on the variant instead via [`Notice::from_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, uniffi::Enum)]
pub enum Notice {
    /// `initialize` was called on an initialized session.
    #[strum(serialize = "SDK already initialized")]
    AlreadyInitialized,
    /// The initialization handshake failed.
    #[strum(serialize = "Failed to initialize SDK")]
    InitializeFailed,
    /// A scan was requested before initialization.
    #[strum(serialize = "SDK not initialized")]
    SdkNotInitialized,
    /// NFC capture was requested without MRZ credentials.
    #[strum(serialize = "Scan MRZ first")]
    ScanMrzFirst,
    /// The MRZ capture failed.
    #[strum(serialize = "Failed to scan MRZ")]
    MrzScanFailed,
    /// The chip read or data-group assembly failed.
    #[strum(serialize = "Failed to scan NFC")]
    NfcScanFailed,
    /// The chip was read but the portrait could not be decoded.
    #[strum(serialize = "Could not parse jp2 image")]
    ImageDecodeFailed,
    /// A second operation was started while one is in flight.
    #[strum(serialize = "Scan already in progress")]
    ScanInProgress,
}

impl Notice {
    /// Maps displayed text back to the notice that produced it.
    #[must_use]
    pub fn from_text(text: &str) -> Option<Self> {
        text.parse().ok()
    }
}
