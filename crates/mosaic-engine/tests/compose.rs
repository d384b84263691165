//! End-to-end composition: build a small site on disk, place instances
//! through the composer, render through the renderer, and check the
//! document and asset bundle together.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};

use mosaic_core::{ChildSpec, PageStatus};
use mosaic_engine::{ComponentRegistry, Composer, PageRef, RenderError, Renderer};
use mosaic_registry::ModuleRegistry;
use mosaic_store::{Database, PageRepo};

fn temp_site() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mosaic-compose-{}", uuid::Uuid::now_v7()));
    fs::create_dir_all(dir.join("modules")).unwrap();
    dir
}

fn write_manifest(site: &Path, slug: &str, manifest: Value) {
    let dir = site.join("modules").join(slug);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("module.json"), manifest.to_string()).unwrap();
}

fn touch(site: &Path, relative: &str) {
    let path = site.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "/* asset */").unwrap();
}

/// A hero with a nested button, plus a footer, over real asset files.
fn build_site(site: &Path) {
    write_manifest(
        site,
        "hero",
        json!({
            "aliases": ["banner"],
            "default_config": {"text": "Welcome"},
            "dependencies": ["button"]
        }),
    );
    write_manifest(
        site,
        "button",
        json!({
            "default_config": {"text": "Click me"},
            "assets": {"vendors": [{"js": ["vendor/ripple.js"]}]}
        }),
    );
    write_manifest(site, "footer", json!({"default_config": {"text": "Bye"}}));
    touch(site, "modules/hero/hero.css");
    touch(site, "modules/button/button.css");
    touch(site, "modules/button/button.js");
    touch(site, "modules/footer/style.css");
}

fn setup(site: &Path) -> (Composer, Renderer, mosaic_core::PageId) {
    let registry = Arc::new(ModuleRegistry::load(&site.join("modules")));
    let components = Arc::new(ComponentRegistry::with_generic_fallback());
    let db = Database::in_memory().unwrap();

    let pages = PageRepo::new(db.clone());
    let page = pages.create("home", Some("Home")).unwrap();
    pages.update_status(&page.id, PageStatus::Published).unwrap();

    let composer = Composer::new(db.clone(), Arc::clone(&registry));
    let renderer = Renderer::new(db, registry, components, site);
    (composer, renderer, page.id)
}

#[test]
fn compose_and_render_a_page() {
    let site = temp_site();
    build_site(&site);
    let (composer, renderer, page_id) = setup(&site);

    let hero = composer
        .create_instance(&page_id, "banner", "hero-main", json!({"text": "Hello"}), None)
        .unwrap();
    composer
        .append_child(&hero.id, "default", ChildSpec::new("button", json!({})))
        .unwrap();
    composer
        .create_instance(&page_id, "footer", "footer-main", json!({}), None)
        .unwrap();

    let rendered = renderer.render_page(PageRef::Slug("home")).unwrap();

    // instance override, nested child default, and footer default, in order
    let hello = rendered.document.find("Hello").unwrap();
    let click = rendered.document.find("Click me").unwrap();
    let bye = rendered.document.find("Bye").unwrap();
    assert!(hello < click && click < bye);

    // one entry per visited module, hero's vendor dependency included once
    assert_eq!(
        rendered.assets.css,
        vec![
            "modules/hero/hero.css",
            "modules/button/button.css",
            "modules/footer/style.css",
        ]
    );
    assert_eq!(rendered.assets.js, vec!["vendor/ripple.js", "modules/button/button.js"]);

    let _ = fs::remove_dir_all(&site);
}

#[test]
fn assets_stay_deduplicated_when_a_module_repeats() {
    let site = temp_site();
    build_site(&site);
    let (composer, renderer, page_id) = setup(&site);

    // button appears nested under hero and as its own top-level instance
    let hero = composer
        .create_instance(&page_id, "hero", "hero-main", json!({}), None)
        .unwrap();
    composer
        .append_child(&hero.id, "default", ChildSpec::new("button", json!({})))
        .unwrap();
    composer
        .create_instance(&page_id, "button", "cta", json!({}), None)
        .unwrap();

    let rendered = renderer.render_page(PageRef::Slug("home")).unwrap();
    let count = rendered
        .assets
        .css
        .iter()
        .filter(|p| p.as_str() == "modules/button/button.css")
        .count();
    assert_eq!(count, 1);

    let _ = fs::remove_dir_all(&site);
}

#[test]
fn mutual_recursion_across_modules_is_reported() {
    let site = temp_site();
    write_manifest(
        &site,
        "ping",
        json!({"default_config": {"children": [{"module": "pong"}]}}),
    );
    write_manifest(
        &site,
        "pong",
        json!({"default_config": {"children": [{"module": "ping"}]}}),
    );
    let (composer, renderer, page_id) = setup(&site);

    composer
        .create_instance(&page_id, "ping", "ping-1", json!({}), None)
        .unwrap();

    match renderer.render_page(PageRef::Slug("home")).unwrap_err() {
        RenderError::CycleDetected(path) => assert_eq!(path, "ping -> pong -> ping"),
        other => panic!("expected cycle, got {other:?}"),
    }

    let _ = fs::remove_dir_all(&site);
}
