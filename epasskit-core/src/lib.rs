#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! Scan-session state machine for electronic travel document verification.
//!
//! A [`ScanSession`] sequences the MRZ capture, the NFC chip read keyed by the MRZ, and the
//! extraction of the biographic fields and portrait. The actual scanning, chip
//! communication, image decoding and toast presentation are platform capabilities, see
//! [`platform`].

pub mod logger;
pub mod platform;

mod assembler;
pub use assembler::{Assembly, ResultAssembler};

mod config;
pub use config::*;

mod error;
pub use error::*;

mod events;
pub use events::{classify_read_error, ReadErrorClass, ScanEventBus, ScanSignal, SignalKind};

mod notice;
pub use notice::Notice;

mod notification;
pub use notification::NotificationThrottle;

mod progress;
pub use progress::*;

mod session;
pub use session::ScanSession;

mod types;
pub use types::*;

uniffi::setup_scaffolding!("epasskit_core");
