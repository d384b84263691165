//! Shared types for the Mosaic page composition system.
//!
//! Holds the data model (pages, module definitions, module instances,
//! child specs), branded identifiers, and the pure configuration merger.
//! No I/O lives here; persistence and rendering build on top of this crate.

pub mod ids;
pub mod merge;
pub mod model;

pub use ids::{InstanceId, PageId};
pub use merge::merge_config;
pub use model::{
    AssetBundle, ChildSpec, ModuleAssets, ModuleDefinition, ModuleInstance, Page, PageStatus,
    RenderedPage, VendorAsset, CHILDREN_KEY, DEFAULT_SLOT,
};
