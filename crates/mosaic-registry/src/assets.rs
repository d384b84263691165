//! Transitive asset aggregation.
//!
//! Consumes the visited-module list of one completed render and produces
//! de-duplicated CSS/JS path lists, ordered by first discovery. For each
//! visited module:
//!
//! 1. Manifest-declared `assets.css`/`assets.js` entries win, but only
//!    those whose target file exists under the asset root; a declared but
//!    missing asset is silently dropped.
//! 2. Without a declaration, conventional paths are probed; first existing
//!    match wins, at most one CSS and one JS from this tier.
//! 3. `dependencies` are walked transitively (with a visited-set guard
//!    against cycles) collecting each dependency's vendor assets.
//!
//! Manifest paths authored as `.scss` are rewritten to their compiled CSS
//! sibling by a pure pattern transform; no compiler is invoked.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::debug;

use mosaic_core::{AssetBundle, ModuleDefinition};

use crate::registry::ModuleRegistry;

/// Rewrite an scss-authored path to its compiled CSS sibling.
///
/// `scss/` path segments become `css/` and the `.scss` extension becomes
/// `.css`. Non-scss paths pass through unchanged.
pub fn rewrite_scss_path(path: &str) -> String {
    if !path.ends_with(".scss") {
        return path.to_string();
    }
    let mut out = path.replace("/scss/", "/css/");
    if let Some(stripped) = out.strip_prefix("scss/") {
        out = format!("css/{stripped}");
    }
    let trimmed = out.strip_suffix(".scss").unwrap_or(&out);
    format!("{trimmed}.css")
}

/// Aggregates assets for the modules visited by a render.
pub struct AssetAggregator<'a> {
    registry: &'a ModuleRegistry,
    asset_root: PathBuf,
}

/// Insertion-ordered set of asset paths.
#[derive(Default)]
struct OrderedPaths {
    paths: Vec<String>,
    seen: HashSet<String>,
}

impl OrderedPaths {
    fn push(&mut self, path: String) {
        if self.seen.insert(path.clone()) {
            self.paths.push(path);
        }
    }
}

impl<'a> AssetAggregator<'a> {
    /// `asset_root` is the directory all manifest and conventional paths
    /// are relative to (typically the web root containing `modules/`).
    pub fn new(registry: &'a ModuleRegistry, asset_root: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            asset_root: asset_root.into(),
        }
    }

    /// Aggregate assets for the given visited-module slugs, in order.
    ///
    /// Unknown slugs are skipped; the renderer has already decided whether
    /// that is an error. Output is deterministic for a given instance tree.
    pub fn aggregate(&self, visited: &[String]) -> AssetBundle {
        let mut css = OrderedPaths::default();
        let mut js = OrderedPaths::default();

        for slug in visited {
            let Some(def) = self.registry.get(slug) else {
                continue;
            };
            self.collect_own(def, &mut css, &mut js);

            let mut walked: HashSet<String> = HashSet::new();
            walked.insert(def.slug.clone());
            self.collect_vendors(def, &mut walked, &mut css, &mut js);
        }

        AssetBundle {
            css: css.paths,
            js: js.paths,
        }
    }

    fn collect_own(&self, def: &ModuleDefinition, css: &mut OrderedPaths, js: &mut OrderedPaths) {
        if def.assets.css.is_empty() {
            if let Some(found) = self.first_existing(&conventional_paths(&def.slug, "css", "style")) {
                css.push(found);
            }
        } else {
            for path in &def.assets.css {
                self.push_existing(path, &def.slug, css);
            }
        }

        if def.assets.js.is_empty() {
            if let Some(found) = self.first_existing(&conventional_paths(&def.slug, "js", "script")) {
                js.push(found);
            }
        } else {
            for path in &def.assets.js {
                self.push_existing(path, &def.slug, js);
            }
        }
    }

    /// Walk `dependencies` transitively collecting vendor assets. The
    /// `walked` set guards against dependency cycles.
    fn collect_vendors(
        &self,
        def: &ModuleDefinition,
        walked: &mut HashSet<String>,
        css: &mut OrderedPaths,
        js: &mut OrderedPaths,
    ) {
        for dep in &def.dependencies {
            let slug = self.registry.resolve(dep).to_string();
            if !walked.insert(slug.clone()) {
                continue;
            }
            let Some(dep_def) = self.registry.get(&slug) else {
                continue;
            };
            for vendor in &dep_def.assets.vendors {
                for path in &vendor.css {
                    css.push(rewrite_scss_path(path));
                }
                for path in &vendor.js {
                    js.push(path.clone());
                }
            }
            self.collect_vendors(dep_def, walked, css, js);
        }
    }

    fn push_existing(&self, declared: &str, slug: &str, out: &mut OrderedPaths) {
        let path = rewrite_scss_path(declared);
        if self.exists(&path) {
            out.push(path);
        } else {
            debug!(module = %slug, asset = %path, "dropping declared asset with missing file");
        }
    }

    fn first_existing(&self, candidates: &[String]) -> Option<String> {
        candidates.iter().find(|p| self.exists(p)).cloned()
    }

    fn exists(&self, relative: &str) -> bool {
        self.asset_root.join(relative).exists()
    }
}

fn conventional_paths(slug: &str, ext: &str, generic: &str) -> [String; 2] {
    [
        format!("modules/{slug}/{slug}.{ext}"),
        format!("modules/{slug}/{generic}.{ext}"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::MANIFEST_FILENAME;
    use std::path::{Path, PathBuf};

    fn temp_root() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mosaic-assets-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_manifest(root: &Path, slug: &str, json: &str) {
        let dir = root.join("modules").join(slug);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(MANIFEST_FILENAME), json).unwrap();
    }

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "/* asset */").unwrap();
    }

    fn visited(slugs: &[&str]) -> Vec<String> {
        slugs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rewrite_scss_extension() {
        assert_eq!(rewrite_scss_path("modules/hero/hero.scss"), "modules/hero/hero.css");
        assert_eq!(rewrite_scss_path("modules/hero/scss/main.scss"), "modules/hero/css/main.css");
        assert_eq!(rewrite_scss_path("scss/site.scss"), "css/site.css");
        assert_eq!(rewrite_scss_path("modules/hero/hero.css"), "modules/hero/hero.css");
        assert_eq!(rewrite_scss_path("modules/hero/hero.js"), "modules/hero/hero.js");
    }

    #[test]
    fn declared_assets_require_existing_file() {
        let root = temp_root();
        write_manifest(
            &root,
            "hero",
            r#"{"default_config": {}, "assets": {"css": ["modules/hero/a.css", "modules/hero/b.css"]}}"#,
        );
        touch(&root, "modules/hero/a.css");
        // b.css deliberately missing

        let registry = ModuleRegistry::load(&root.join("modules"));
        let bundle = AssetAggregator::new(&registry, &root).aggregate(&visited(&["hero"]));
        assert_eq!(bundle.css, vec!["modules/hero/a.css"]);
        assert!(bundle.js.is_empty());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn conventional_fallback_first_match_wins() {
        let root = temp_root();
        write_manifest(&root, "footer", r#"{"default_config": {}}"#);
        touch(&root, "modules/footer/footer.css");
        touch(&root, "modules/footer/style.css");
        touch(&root, "modules/footer/script.js");

        let registry = ModuleRegistry::load(&root.join("modules"));
        let bundle = AssetAggregator::new(&registry, &root).aggregate(&visited(&["footer"]));
        // slug-named file shadows style.css; at most one per kind
        assert_eq!(bundle.css, vec!["modules/footer/footer.css"]);
        assert_eq!(bundle.js, vec!["modules/footer/script.js"]);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn scss_declaration_resolves_to_compiled_file() {
        let root = temp_root();
        write_manifest(
            &root,
            "hero",
            r#"{"default_config": {}, "assets": {"css": ["modules/hero/scss/hero.scss"]}}"#,
        );
        touch(&root, "modules/hero/css/hero.css");

        let registry = ModuleRegistry::load(&root.join("modules"));
        let bundle = AssetAggregator::new(&registry, &root).aggregate(&visited(&["hero"]));
        assert_eq!(bundle.css, vec!["modules/hero/css/hero.css"]);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn vendor_assets_from_dependencies() {
        let root = temp_root();
        write_manifest(
            &root,
            "hero",
            r#"{"default_config": {}, "dependencies": ["button"]}"#,
        );
        write_manifest(
            &root,
            "button",
            r#"{"default_config": {}, "assets": {"vendors": [{"css": ["vendor/ripple.css"], "js": ["vendor/ripple.js"]}]}}"#,
        );
        touch(&root, "modules/hero/hero.css");

        let registry = ModuleRegistry::load(&root.join("modules"));
        let bundle = AssetAggregator::new(&registry, &root).aggregate(&visited(&["hero"]));
        assert_eq!(bundle.css, vec!["modules/hero/hero.css", "vendor/ripple.css"]);
        assert_eq!(bundle.js, vec!["vendor/ripple.js"]);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn dependency_cycle_terminates() {
        let root = temp_root();
        write_manifest(
            &root,
            "a",
            r#"{"default_config": {}, "dependencies": ["b"], "assets": {"vendors": [{"css": ["vendor/a.css"]}]}}"#,
        );
        write_manifest(
            &root,
            "b",
            r#"{"default_config": {}, "dependencies": ["a"], "assets": {"vendors": [{"css": ["vendor/b.css"]}]}}"#,
        );

        let registry = ModuleRegistry::load(&root.join("modules"));
        let bundle = AssetAggregator::new(&registry, &root).aggregate(&visited(&["a"]));
        assert_eq!(bundle.css, vec!["vendor/b.css"]);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn duplicates_collapse_to_first_discovery() {
        let root = temp_root();
        write_manifest(
            &root,
            "hero",
            r#"{"default_config": {}, "dependencies": ["button"]}"#,
        );
        write_manifest(
            &root,
            "button",
            r#"{"default_config": {}, "assets": {"js": ["modules/button/button.js"], "vendors": [{"js": ["vendor/ripple.js"]}]}}"#,
        );
        touch(&root, "modules/button/button.js");

        let registry = ModuleRegistry::load(&root.join("modules"));
        let aggregator = AssetAggregator::new(&registry, &root);
        // button used both top-level and as a dependency of hero
        let bundle = aggregator.aggregate(&visited(&["hero", "button"]));
        assert_eq!(bundle.js, vec!["vendor/ripple.js", "modules/button/button.js"]);

        // Re-aggregation of the same tree is identical.
        assert_eq!(aggregator.aggregate(&visited(&["hero", "button"])), bundle);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn unknown_visited_slug_skipped() {
        let root = temp_root();
        write_manifest(&root, "hero", r#"{"default_config": {}}"#);
        let registry = ModuleRegistry::load(&root.join("modules"));
        let bundle = AssetAggregator::new(&registry, &root).aggregate(&visited(&["ghost"]));
        assert!(bundle.css.is_empty());
        assert!(bundle.js.is_empty());
        let _ = std::fs::remove_dir_all(&root);
    }
}
