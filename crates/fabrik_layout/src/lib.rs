//! Layout exchange for the Fabrik toolkit.
//!
//! Provides the versioned JSON layout format used by import/export and the
//! persisted elite archive, plus layout fingerprints and the diversity
//! distance the archive uses to stay varied.

#![warn(missing_docs)]

pub mod fingerprint;
pub mod format;

pub use fingerprint::{diversity_distance, fingerprint};
pub use format::{ConnectionEntry, LayoutError, LayoutFile, MachineEntry, FORMAT_VERSION};
