//! Value types exchanged between the session and the platform.

use std::collections::HashMap;
use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ScanError;

/// A data group on the document chip (ICAO-9303).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
    uniffi::Enum,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum DataGroup {
    /// Biographic data, a copy of the MRZ.
    Dg1,
    /// Encoded facial image.
    Dg2,
}

/// The fixed set of data groups requested on every chip read.
pub const REQUESTED_DATA_GROUPS: [DataGroup; 2] = [DataGroup::Dg1, DataGroup::Dg2];

/// Access credentials read from the machine-readable zone.
///
/// Dates use the MRZ `YYMMDD` form as produced by the scanner.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
#[serde(rename_all = "camelCase")]
pub struct MrzCredentials {
    /// Document number.
    pub document_number: String,
    /// Holder's date of birth.
    pub birth_date: String,
    /// Document expiry date.
    pub expiry_date: String,
}

impl fmt::Debug for MrzCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MrzCredentials")
            .field("document_number", &redact(&self.document_number))
            .field("birth_date", &"<redacted>")
            .field("expiry_date", &self.expiry_date)
            .finish()
    }
}

fn redact(value: &str) -> String {
    let visible = value.chars().count().saturating_sub(3);
    value
        .chars()
        .enumerate()
        .map(|(i, c)| if i < visible { '*' } else { c })
        .collect()
}

/// Parameters for one chip read.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct ScanOptions {
    /// Document number from the MRZ.
    pub document_number: String,
    /// Date of birth from the MRZ.
    pub birth_date: String,
    /// Expiry date from the MRZ.
    pub expiry_date: String,
    /// Data groups to read from the chip.
    pub data_groups: Vec<DataGroup>,
}

impl From<&MrzCredentials> for ScanOptions {
    fn from(credentials: &MrzCredentials) -> Self {
        Self {
            document_number: credentials.document_number.clone(),
            birth_date: credentials.birth_date.clone(),
            expiry_date: credentials.expiry_date.clone(),
            data_groups: REQUESTED_DATA_GROUPS.to_vec(),
        }
    }
}

/// Raw chip read result as returned by the platform reader.
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct NfcResult {
    /// Transport completion flag. Carries no business meaning.
    pub success: bool,
    /// Data group payloads keyed by name (`"DG1"`, `"DG2"`).
    pub data_groups: HashMap<String, Vec<u8>>,
}

/// The two data-group payloads of a completed chip read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NfcPayload {
    /// Biographic data group.
    pub dg1: Vec<u8>,
    /// Facial image data group.
    pub dg2: Vec<u8>,
}

impl TryFrom<NfcResult> for NfcPayload {
    type Error = ScanError;

    fn try_from(result: NfcResult) -> Result<Self, Self::Error> {
        let mut groups: HashMap<DataGroup, Vec<u8>> = HashMap::new();
        for (name, bytes) in result.data_groups {
            match name.parse::<DataGroup>() {
                Ok(group) => {
                    groups.insert(group, bytes);
                }
                Err(_) => log::debug!("ignoring unrequested data group {name}"),
            }
        }

        let mut take = |group: DataGroup| {
            groups
                .remove(&group)
                .ok_or_else(|| ScanError::ChipRead(format!("{group} missing from chip read")))
        };

        Ok(Self {
            dg1: take(DataGroup::Dg1)?,
            dg2: take(DataGroup::Dg2)?,
        })
    }
}

/// Outcome of a successful verification attempt.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct VerificationResult {
    /// MRZ fields decoded from DG1.
    pub fields: HashMap<String, String>,
    /// Decoded portrait, `None` when the image could not be decoded.
    pub portrait: Option<Vec<u8>>,
    /// Whether the chip read and field extraction succeeded.
    pub verified: bool,
}

impl VerificationResult {
    /// Renders the portrait as a JPEG data URI for display.
    #[must_use]
    pub fn portrait_data_uri(&self) -> Option<String> {
        self.portrait
            .as_deref()
            .map(|bytes| format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes)))
    }
}

/// Renders the portrait of `result` as a JPEG data URI for display.
#[uniffi::export]
#[must_use]
#[allow(clippy::needless_pass_by_value)]
pub fn portrait_data_uri(result: VerificationResult) -> Option<String> {
    result.portrait_data_uri()
}

/// Observable state of a scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, uniffi::Enum)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// The initialization handshake has not succeeded yet.
    Uninitialized,
    /// Ready to capture the MRZ.
    Initialized,
    /// MRZ credentials are held; a chip read may start.
    MrzCaptured,
    /// A chip read is running.
    NfcInProgress,
    /// The last chip read produced a verified result.
    Verified,
}

/// How long the platform keeps a notification on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, uniffi::Enum)]
#[serde(rename_all = "snake_case")]
pub enum ToastDuration {
    /// Platform short duration.
    Short,
    /// Platform long duration.
    #[default]
    Long,
}

/// Where the platform places a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, uniffi::Enum)]
#[serde(rename_all = "snake_case")]
pub enum ToastPosition {
    /// Top of the screen.
    Top,
    /// Center of the screen.
    #[default]
    Center,
    /// Bottom of the screen.
    Bottom,
}

/// Point-in-time view of a session for UI bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, uniffi::Record)]
pub struct SessionSnapshot {
    /// Current state.
    pub state: SessionState,
    /// Chip read progress, 0-100.
    pub progress: u8,
    /// Whether a chip read is running.
    pub nfc_in_progress: bool,
    /// Whether the last chip read verified the document.
    pub verified: bool,
    /// Whether a decoded portrait is available.
    pub has_portrait: bool,
}
