//! Filesystem manifest scanner.
//!
//! Each subdirectory of the modules root containing a `module.json` file is
//! one module; the directory name is its canonical slug. A malformed
//! manifest makes that module absent but never aborts the scan.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use mosaic_core::{ModuleAssets, ModuleDefinition};

pub const MANIFEST_FILENAME: &str = "module.json";

/// Error encountered while loading one manifest. Recoverable: the scan
/// records it and continues.
#[derive(Debug, Clone)]
pub struct ManifestScanError {
    pub path: String,
    pub message: String,
}

/// Result of scanning a modules root.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub modules: Vec<ModuleDefinition>,
    pub errors: Vec<ManifestScanError>,
}

/// On-disk manifest shape. The slug is not part of the file; it comes from
/// the directory name.
#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    aliases: Vec<String>,
    /// Component registry key; defaults to the slug.
    #[serde(default)]
    component: Option<String>,
    #[serde(default = "empty_object")]
    default_config: Value,
    #[serde(default)]
    assets: ModuleAssets,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default = "default_true")]
    active: bool,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

fn default_true() -> bool {
    true
}

/// Scan a modules root for manifests.
///
/// A nonexistent root yields an empty result, not an error. Modules are
/// returned sorted by slug so downstream alias-map construction is
/// deterministic.
pub fn scan_modules(root: &Path) -> ScanResult {
    let mut result = ScanResult::default();

    if !root.is_dir() {
        debug!(root = %root.display(), "modules root does not exist");
        return result;
    }

    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(root = %root.display(), error = %e, "failed to read modules root");
            return result;
        }
    };

    for entry in entries.flatten() {
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }

        let manifest_path = dir.join(MANIFEST_FILENAME);
        if !manifest_path.exists() {
            continue;
        }

        let Some(slug) = dir.file_name().and_then(|n| n.to_str()).map(String::from) else {
            continue;
        };

        match load_manifest(&manifest_path, &slug) {
            Ok(definition) => {
                debug!(slug = %slug, "loaded module manifest");
                result.modules.push(definition);
            }
            Err(error) => {
                warn!(path = %error.path, message = %error.message, "skipping malformed manifest");
                result.errors.push(error);
            }
        }
    }

    result.modules.sort_by(|a, b| a.slug.cmp(&b.slug));
    result
}

fn load_manifest(path: &Path, slug: &str) -> Result<ModuleDefinition, ManifestScanError> {
    let path_str = path.to_string_lossy().into_owned();

    let content = std::fs::read_to_string(path).map_err(|e| ManifestScanError {
        path: path_str.clone(),
        message: format!("failed to read manifest: {e}"),
    })?;

    let raw: RawManifest = serde_json::from_str(&content).map_err(|e| ManifestScanError {
        path: path_str.clone(),
        message: format!("invalid manifest JSON: {e}"),
    })?;

    if !raw.default_config.is_object() {
        return Err(ManifestScanError {
            path: path_str,
            message: "default_config must be a JSON object".to_string(),
        });
    }

    Ok(ModuleDefinition {
        slug: slug.to_string(),
        aliases: raw.aliases,
        component: raw.component.unwrap_or_else(|| slug.to_string()),
        default_config: raw.default_config,
        assets: raw.assets,
        dependencies: raw.dependencies,
        active: raw.active,
    })
}
