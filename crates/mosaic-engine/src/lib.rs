//! Page composition and rendering.
//!
//! [`Composer`] edits what a page contains; [`Renderer`] turns it into a
//! document plus its asset bundle. Components plug in through
//! [`Component`] and render nested placements via [`ComponentScope`].

pub mod children;
pub mod component;
pub mod composer;
pub mod error;
pub mod renderer;

pub use component::{Component, ComponentRegistry, GenericComponent};
pub use composer::Composer;
pub use error::RenderError;
pub use renderer::{ComponentScope, PageRef, RenderPass, Renderer, MAX_RENDER_DEPTH};
