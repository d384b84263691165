//! Recursive page renderer.
//!
//! A page render walks the page's active top-level instances in
//! `order_index` order, merges each instance's config over its module's
//! defaults, and hands the effective config to the module's component.
//! Components render nested placements back through [`ComponentScope`],
//! which threads the shared [`RenderPass`] so cycle detection and the
//! visited set span the whole tree.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument};

use mosaic_core::{merge_config, Page, PageId, PageStatus, RenderedPage};
use mosaic_registry::{AssetAggregator, ModuleRegistry};
use mosaic_store::{Database, InstanceRepo, PageRepo, StoreError};

use crate::children::children_of;
use crate::component::ComponentRegistry;
use crate::error::RenderError;

/// Hard ceiling on nesting depth, a backstop for dependency chains the
/// cycle check cannot catch because no slug repeats.
pub const MAX_RENDER_DEPTH: usize = 32;

/// How to address the page being rendered. Slug lookup serves published
/// pages only; ID lookup is for previews and ignores status.
pub enum PageRef<'a> {
    Slug(&'a str),
    Id(&'a PageId),
}

/// Per-render bookkeeping shared across the whole instance tree.
#[derive(Default)]
pub struct RenderPass {
    visited: Vec<String>,
    visited_set: HashSet<String>,
    stack: Vec<String>,
}

impl RenderPass {
    /// Module slugs in first-encounter order. Drives asset aggregation.
    pub fn visited(&self) -> &[String] {
        &self.visited
    }

    fn record(&mut self, slug: &str) {
        if self.visited_set.insert(slug.to_string()) {
            self.visited.push(slug.to_string());
        }
    }

    fn enter(&mut self, slug: &str) -> Result<(), RenderError> {
        if self.stack.iter().any(|s| s == slug) {
            let mut path = self.stack.join(" -> ");
            path.push_str(" -> ");
            path.push_str(slug);
            return Err(RenderError::CycleDetected(path));
        }
        if self.stack.len() >= MAX_RENDER_DEPTH {
            return Err(RenderError::DepthExceeded(MAX_RENDER_DEPTH));
        }
        self.stack.push(slug.to_string());
        Ok(())
    }

    fn exit(&mut self) {
        self.stack.pop();
    }
}

pub struct Renderer {
    pages: PageRepo,
    instances: InstanceRepo,
    registry: Arc<ModuleRegistry>,
    components: Arc<ComponentRegistry>,
    asset_root: PathBuf,
}

impl Renderer {
    pub fn new(
        db: Database,
        registry: Arc<ModuleRegistry>,
        components: Arc<ComponentRegistry>,
        asset_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            pages: PageRepo::new(db.clone()),
            instances: InstanceRepo::new(db),
            registry,
            components,
            asset_root: asset_root.into(),
        }
    }

    /// Render a full page: document fragments, page CSS variables and
    /// the deduplicated asset bundle for every module the tree touched.
    ///
    /// Any failing instance aborts the whole page.
    #[instrument(skip(self, page_ref))]
    pub fn render_page(&self, page_ref: PageRef<'_>) -> Result<RenderedPage, RenderError> {
        let page = self.lookup_page(page_ref)?;
        let instances = self.instances.list_active(&page.id)?;

        let mut pass = RenderPass::default();
        let mut fragments = Vec::with_capacity(instances.len());
        for instance in &instances {
            let html = self.render_module_tree(
                &mut pass,
                &instance.module,
                Some(&instance.instance_name),
                &instance.config,
            )?;
            fragments.push(html);
        }

        let assets =
            AssetAggregator::new(&self.registry, &self.asset_root).aggregate(pass.visited());
        debug!(
            page = %page.slug,
            modules = pass.visited().len(),
            css = assets.css.len(),
            js = assets.js.len(),
            "page rendered"
        );

        Ok(RenderedPage {
            document: fragments.join("\n"),
            css_variables: page.css_variables,
            assets,
        })
    }

    fn lookup_page(&self, page_ref: PageRef<'_>) -> Result<Page, RenderError> {
        match page_ref {
            PageRef::Slug(slug) => {
                let page = self.pages.get_by_slug(slug).map_err(not_found_page(slug))?;
                // Drafts are invisible through slug lookup.
                if page.status != PageStatus::Published {
                    return Err(RenderError::PageNotFound(slug.to_string()));
                }
                Ok(page)
            }
            PageRef::Id(id) => self.pages.get(id).map_err(not_found_page(id.as_str())),
        }
    }

    /// Render one module subtree. `name` may be an alias; unknown or
    /// inactive modules are hard errors here, leniency for children is
    /// the scope's business.
    fn render_module_tree(
        &self,
        pass: &mut RenderPass,
        name: &str,
        instance_name: Option<&str>,
        overrides: &Value,
    ) -> Result<String, RenderError> {
        let slug = self.registry.resolve(name);
        let definition = self
            .registry
            .get(slug)
            .ok_or_else(|| RenderError::ModuleNotFound(name.to_string()))?;
        if !definition.active {
            return Err(RenderError::ModuleInactive(slug.to_string()));
        }

        let effective = merge_config(&definition.default_config, overrides);
        let component = self.components.get(&definition.component)?;

        pass.enter(slug)?;
        pass.record(slug);
        let mut scope = ComponentScope {
            renderer: self,
            pass: &mut *pass,
            slug,
            instance_name,
            config: &effective,
        };
        let result = component.render(&effective, &mut scope);
        pass.exit();
        result
    }
}

fn not_found_page(label: &str) -> impl Fn(StoreError) -> RenderError + '_ {
    move |e| match e {
        StoreError::NotFound(_) => RenderError::PageNotFound(label.to_string()),
        other => RenderError::Store(other),
    }
}

/// Handed to a component so it can render its nested placements without
/// seeing the renderer's internals.
pub struct ComponentScope<'a> {
    renderer: &'a Renderer,
    pass: &'a mut RenderPass,
    slug: &'a str,
    instance_name: Option<&'a str>,
    config: &'a Value,
}

impl ComponentScope<'_> {
    /// Canonical slug of the module being rendered.
    pub fn slug(&self) -> &str {
        self.slug
    }

    pub fn instance_name(&self) -> Option<&str> {
        self.instance_name
    }

    /// Render every child in a slot, in document order.
    ///
    /// A child naming no module, or one that does not resolve to an
    /// active module, is skipped so one stale placement cannot take the
    /// page down. Cycles and component failures still propagate.
    pub fn render_children(&mut self, slot: &str) -> Result<String, RenderError> {
        let mut fragments = Vec::new();
        for child in children_of(self.config, slot) {
            let Some(name) = child.module.as_deref() else {
                debug!(parent = self.slug, slot, "child without module, skipping");
                continue;
            };
            match self.renderer.render_module_tree(
                self.pass,
                name,
                child.instance_name.as_deref(),
                &child.config,
            ) {
                Ok(html) => fragments.push(html),
                Err(RenderError::ModuleNotFound(n) | RenderError::ModuleInactive(n)) => {
                    debug!(parent = self.slug, slot, module = %n, "unresolvable child, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(fragments.join("\n"))
    }

    /// Render an arbitrary module inline, strictly. Unknown or inactive
    /// modules fail the render.
    pub fn render_module(&mut self, name: &str, config: &Value) -> Result<String, RenderError> {
        self.renderer.render_module_tree(self.pass, name, None, config)
    }
}
