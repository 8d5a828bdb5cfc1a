//! Thin re-export surface over the engine and data crates, used by the
//! `streamta-demo` binary and available to downstream consumers who only
//! want to depend on `streamta` rather than the individual crates.

pub use streamta_core as core;
pub use streamta_data as data;
