//! In-memory module registry.
//!
//! Loaded once per process from a modules root and read-only afterwards.
//! Name resolution keeps the tolerant contract (unknown names pass through
//! unchanged, which keeps `resolve` idempotent); the [`ModuleRegistry::validate`]
//! pass makes the hazards of that tolerance visible on demand instead of
//! letting them ship silently.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use mosaic_core::ModuleDefinition;

use crate::assets::rewrite_scss_path;
use crate::manifest::{scan_modules, ManifestScanError};

/// A finding from the registry validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Slug of the module the issue belongs to.
    pub module: String,
    pub message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.module, self.message)
    }
}

/// Registry of module definitions keyed by canonical slug.
pub struct ModuleRegistry {
    modules: HashMap<String, ModuleDefinition>,
    aliases: HashMap<String, String>,
    modules_root: PathBuf,
    scan_errors: Vec<ManifestScanError>,
}

impl ModuleRegistry {
    /// Scan the modules root and build the registry.
    ///
    /// Manifests are processed in slug order, so alias-map construction is
    /// deterministic: the first module to claim an alias keeps it.
    pub fn load(modules_root: &Path) -> Self {
        let scan = scan_modules(modules_root);

        let mut modules = HashMap::new();
        let mut aliases: HashMap<String, String> = HashMap::new();

        for def in scan.modules {
            for alias in &def.aliases {
                if let Some(existing) = aliases.get(alias) {
                    warn!(alias = %alias, kept = %existing, ignored = %def.slug, "duplicate alias");
                    continue;
                }
                aliases.insert(alias.clone(), def.slug.clone());
            }
            modules.insert(def.slug.clone(), def);
        }

        debug!(count = modules.len(), root = %modules_root.display(), "module registry loaded");

        Self {
            modules,
            aliases,
            modules_root: modules_root.to_owned(),
            scan_errors: scan.errors,
        }
    }

    /// Resolve a module name or alias to a canonical slug.
    ///
    /// Aliases map to their slug; known slugs map to themselves; anything
    /// else is returned unchanged. Callers that need the name to actually
    /// exist must follow up with [`ModuleRegistry::get`].
    pub fn resolve<'a>(&'a self, name_or_alias: &'a str) -> &'a str {
        if let Some(slug) = self.aliases.get(name_or_alias) {
            return slug;
        }
        name_or_alias
    }

    /// Get a definition by canonical slug.
    pub fn get(&self, slug: &str) -> Option<&ModuleDefinition> {
        self.modules.get(slug)
    }

    /// Get a definition by canonical slug, only if it is active.
    pub fn get_active(&self, slug: &str) -> Option<&ModuleDefinition> {
        self.modules.get(slug).filter(|d| d.active)
    }

    /// Whether a canonical slug is known.
    pub fn contains(&self, slug: &str) -> bool {
        self.modules.contains_key(slug)
    }

    /// All definitions sorted by slug.
    pub fn list(&self) -> Vec<&ModuleDefinition> {
        let mut defs: Vec<&ModuleDefinition> = self.modules.values().collect();
        defs.sort_by(|a, b| a.slug.cmp(&b.slug));
        defs
    }

    pub fn count(&self) -> usize {
        self.modules.len()
    }

    /// Recoverable errors recorded during the manifest scan.
    pub fn scan_errors(&self) -> &[ManifestScanError] {
        &self.scan_errors
    }

    pub fn modules_root(&self) -> &Path {
        &self.modules_root
    }

    /// Validate the registry against itself and the filesystem.
    ///
    /// Reports aliases that shadow canonical slugs, dependencies naming
    /// unknown modules, and declared assets whose target files are missing
    /// under `asset_root` (after the scss→css rewrite). Findings are sorted
    /// by module slug for stable output.
    pub fn validate(&self, asset_root: &Path) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        for def in self.list() {
            for alias in &def.aliases {
                if self.modules.contains_key(alias) && alias != &def.slug {
                    issues.push(ValidationIssue {
                        module: def.slug.clone(),
                        message: format!("alias '{alias}' shadows a canonical slug"),
                    });
                }
            }

            for dep in &def.dependencies {
                let resolved = self.resolve(dep);
                if !self.modules.contains_key(resolved) {
                    issues.push(ValidationIssue {
                        module: def.slug.clone(),
                        message: format!("dependency '{dep}' does not resolve to a known module"),
                    });
                }
            }

            for path in def.assets.css.iter().chain(def.assets.js.iter()) {
                let rewritten = rewrite_scss_path(path);
                if !asset_root.join(&rewritten).exists() {
                    issues.push(ValidationIssue {
                        module: def.slug.clone(),
                        message: format!("declared asset '{rewritten}' is missing on disk"),
                    });
                }
            }
        }

        issues
    }
}
