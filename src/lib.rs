//! Visual page-builder core: component manifest, tree model, server-side
//! renderer and the canvas client that keeps the two in sync.

pub mod api;
pub mod canvas;
pub mod catalog;
pub mod client;
pub mod coerce;
pub mod config;
pub mod models;
pub mod render;
pub mod settings;
pub mod tree;
