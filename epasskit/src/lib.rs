//! Single library exposing the scan session to Swift and Kotlin.
//!
//! Everything lives in [`epasskit_core`]; this crate only re-exports its scaffolding so the
//! generated bindings load one binary.

pub use epasskit_core::*;

epasskit_core::uniffi_reexport_scaffolding!();
