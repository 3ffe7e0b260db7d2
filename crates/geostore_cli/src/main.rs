//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `geostore_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

fn main() {
    println!("geostore_core ping={}", geostore_core::ping());
    println!("geostore_core version={}", geostore_core::core_version());
}
