//! Component abstraction: a component turns one instance's effective
//! config into an HTML fragment. A module's manifest names the component
//! implementation via its `component` field; unmatched names fall back
//! to [`GenericComponent`].

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use serde_json::Value;

use crate::children::slots_of;
use crate::error::RenderError;
use crate::renderer::ComponentScope;

pub trait Component: Send + Sync {
    /// Render one instance. `config` is the effective (default-merged)
    /// config; nested placements are rendered through `scope`.
    fn render(
        &self,
        config: &Value,
        scope: &mut ComponentScope<'_>,
    ) -> Result<String, RenderError>;
}

/// Maps manifest `component` names to implementations.
pub struct ComponentRegistry {
    components: HashMap<String, Arc<dyn Component>>,
    fallback: Option<Arc<dyn Component>>,
}

impl ComponentRegistry {
    /// An empty registry with [`GenericComponent`] as the fallback.
    pub fn with_generic_fallback() -> Self {
        Self {
            components: HashMap::new(),
            fallback: Some(Arc::new(GenericComponent)),
        }
    }

    /// An empty registry with no fallback. Unmatched component names
    /// fail the render with `ComponentMissing`.
    pub fn strict() -> Self {
        Self { components: HashMap::new(), fallback: None }
    }

    pub fn register(&mut self, name: impl Into<String>, component: Arc<dyn Component>) {
        self.components.insert(name.into(), component);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Component>, RenderError> {
        if let Some(component) = self.components.get(name) {
            return Ok(Arc::clone(component));
        }
        self.fallback
            .clone()
            .ok_or_else(|| RenderError::ComponentMissing(name.to_string()))
    }
}

/// Fallback renderer: a classed wrapper div carrying the escaped `text`
/// field (when present) and every child slot in document order.
pub struct GenericComponent;

impl Component for GenericComponent {
    fn render(
        &self,
        config: &Value,
        scope: &mut ComponentScope<'_>,
    ) -> Result<String, RenderError> {
        let mut out = String::new();
        let _ = write!(out, r#"<div class="module module-{}""#, scope.slug());
        if let Some(name) = scope.instance_name() {
            let _ = write!(out, r#" data-instance="{}""#, escape_html(name));
        }
        out.push('>');

        if let Some(text) = config.get("text").and_then(Value::as_str) {
            let _ = write!(out, "<p>{}</p>", escape_html(text));
        }

        for slot in slots_of(config) {
            let rendered = scope.render_children(&slot)?;
            let _ = write!(out, r#"<div class="slot slot-{}">{}</div>"#, slot, rendered);
        }

        out.push_str("</div>");
        Ok(out)
    }
}

/// Minimal HTML entity escaping for text interpolated into fragments.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
