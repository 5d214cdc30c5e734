//! Data and wire models for the page builder.
//!
//! # Core Concepts
//!
//! ## Catalog Entities
//!
//! - [`ManifestEntry`]: One component type the canvas can place, with its typed
//!   parameters and named slots. Loaded once at startup, never mutated.
//! - [`ParameterSpec`]: A named, typed property of a component. Parameters with
//!   `options` are enumerated; the rest are free text.
//! - [`SlotSpec`]: A named attachment point. Content slots accept a nested
//!   component subtree, structural slots never do.
//!
//! ## Wire Entities
//!
//! These travel between the canvas and the server on every interaction:
//!
//! - [`SerializedNode`]: Transport form of one tree node and its subtree.
//! - [`RenderRequest`]: Body of a render round-trip, always addressing the
//!   fixed top-level `main` slot.
//! - [`HtmlResponse`]: Markup returned by the render and settings endpoints.

mod manifest;
mod node;

pub use manifest::*;
pub use node::*;
