//! Module registry, manifest resolver, and asset aggregation.
//!
//! Modules are declared by `module.json` manifests, one per directory under
//! a modules root. The registry scans that root once per process lifetime;
//! filesystem resynchronization is a maintenance operation, never part of
//! the render path.
//!
//! - [`manifest`]: `module.json` parsing and directory scanning
//! - [`registry`]: alias to slug resolution, definition lookup, validation
//! - [`assets`]: transitive CSS/JS aggregation from a visited-module list

pub mod assets;
pub mod manifest;
pub mod registry;

pub use assets::AssetAggregator;
pub use manifest::{ManifestScanError, ScanResult, MANIFEST_FILENAME};
pub use registry::{ModuleRegistry, ValidationIssue};
