use mosaic_store::StoreError;
use thiserror::Error;

/// Failures surfaced while composing or rendering a page. Any failure
/// aborts the whole page; there is no partial document output.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("page not found: {0}")]
    PageNotFound(String),

    #[error("module not found: {0}")]
    ModuleNotFound(String),

    #[error("module is inactive: {0}")]
    ModuleInactive(String),

    #[error("no component registered for '{0}' and no fallback available")]
    ComponentMissing(String),

    #[error("module cycle detected: {0}")]
    CycleDetected(String),

    #[error("render depth exceeded {0} levels")]
    DepthExceeded(usize),

    #[error("component '{module}' failed: {detail}")]
    Component { module: String, detail: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}
