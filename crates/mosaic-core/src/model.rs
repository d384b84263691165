//! Data model for pages, modules and their placements.
//!
//! All configuration documents are opaque `serde_json::Value` objects.
//! Nested children live inside a parent instance's config under the
//! `children` key, addressed by slot name; they are never separate rows.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{InstanceId, PageId};

/// Config key under which nested children are stored.
pub const CHILDREN_KEY: &str = "children";

/// Slot name that also accepts a bare array at `config.children`
/// (legacy flat-list shorthand).
pub const DEFAULT_SLOT: &str = "default";

/// Publication state of a page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Draft,
    Published,
}

impl std::fmt::Display for PageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Published => write!(f, "published"),
        }
    }
}

impl std::str::FromStr for PageStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            other => Err(format!("unknown page status: {other}")),
        }
    }
}

/// A page row. `css_variables` and `layout_config` are opaque JSON objects
/// attached to the rendered payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub slug: String,
    pub title: Option<String>,
    pub status: PageStatus,
    pub css_variables: Value,
    pub layout_config: Value,
    pub created_at: String,
    pub updated_at: String,
}

/// Stylesheets and scripts a module contributes indirectly to dependents.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VendorAsset {
    #[serde(default)]
    pub css: Vec<String>,
    #[serde(default)]
    pub js: Vec<String>,
}

/// Asset declarations from a module manifest.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModuleAssets {
    #[serde(default)]
    pub css: Vec<String>,
    #[serde(default)]
    pub js: Vec<String>,
    #[serde(default)]
    pub vendors: Vec<VendorAsset>,
}

/// A module definition, as resolved from its manifest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModuleDefinition {
    /// Canonical slug (the manifest's directory name).
    pub slug: String,
    /// Alternative names that resolve to this slug.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Key into the component registry that renders this module.
    pub component: String,
    /// Default configuration, merged under each instance's own config.
    pub default_config: Value,
    #[serde(default)]
    pub assets: ModuleAssets,
    /// Slugs of modules this one depends on (vendor asset sources).
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub active: bool,
}

/// One placement of a module on a page.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModuleInstance {
    pub id: InstanceId,
    pub page_id: PageId,
    /// Module slug or alias; resolved against the registry at render time.
    pub module: String,
    /// Unique among top-level instances of the page.
    pub instance_name: String,
    pub config: Value,
    pub order_index: i64,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// A nested child placement inside a parent's config. Never persisted as
/// its own row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChildSpec {
    /// Module slug or alias. A child without one is skipped at render time.
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,
    #[serde(default = "empty_object")]
    pub config: Value,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl ChildSpec {
    pub fn new(module: impl Into<String>, config: Value) -> Self {
        Self {
            module: Some(module.into()),
            instance_name: None,
            config,
        }
    }
}

/// De-duplicated asset lists, ordered by first discovery during a render.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBundle {
    pub css: Vec<String>,
    pub js: Vec<String>,
}

/// Final payload of one page render.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenderedPage {
    /// Top-level fragments concatenated in `order_index` order.
    pub document: String,
    pub css_variables: Value,
    pub assets: AssetBundle,
}
