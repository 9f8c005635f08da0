//! Turns chip data groups into a verification result.

use std::sync::Arc;

use crate::error::ScanError;
use crate::platform::{DataGroupParser, ImageCodec};
use crate::types::{NfcPayload, VerificationResult};

/// A verification result plus the reason the portrait is missing, if it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
    /// The assembled result. Always verified.
    pub result: VerificationResult,
    /// Set when the portrait could not be decoded.
    pub image_error: Option<String>,
}

/// Extracts fields from DG1 and the portrait from DG2.
pub struct ResultAssembler {
    parser: Arc<dyn DataGroupParser>,
    codec: Arc<dyn ImageCodec>,
}

impl ResultAssembler {
    /// Creates an assembler over the given parser and codec.
    #[must_use]
    pub fn new(parser: Arc<dyn DataGroupParser>, codec: Arc<dyn ImageCodec>) -> Self {
        Self { parser, codec }
    }

    /// Assembles a result from a completed chip read.
    ///
    /// Field or image extraction failures fail the whole assembly. A decode failure of the
    /// extracted image only leaves the portrait empty and is reported in
    /// [`Assembly::image_error`].
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Assembly`] if either data group cannot be parsed.
    pub async fn assemble(&self, payload: NfcPayload) -> Result<Assembly, ScanError> {
        let NfcPayload { dg1, dg2 } = payload;

        let fields = self
            .parser
            .extract_fields(dg1)
            .map_err(|e| ScanError::Assembly(format!("DG1 field extraction failed: {e}")))?;
        let encoded = self
            .parser
            .extract_image(dg2)
            .map_err(|e| ScanError::Assembly(format!("DG2 image extraction failed: {e}")))?;

        let (portrait, image_error) = match self.codec.decode_image(encoded).await {
            Ok(image) => (Some(image), None),
            Err(e) => {
                log::warn!("portrait decode failed: {e}");
                (None, Some(e.to_string()))
            }
        };

        log::debug!(
            "assembled {} MRZ fields, portrait {}",
            fields.len(),
            if portrait.is_some() { "decoded" } else { "missing" }
        );

        Ok(Assembly {
            result: VerificationResult {
                fields,
                portrait,
                verified: true,
            },
            image_error,
        })
    }
}
