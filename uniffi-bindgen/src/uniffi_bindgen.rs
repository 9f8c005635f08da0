//! Generates the Swift and Kotlin bindings for the `epasskit` library.

fn main() {
    uniffi::uniffi_bindgen_main();
}
