// src/action/mod.rs

//! Action model: kinds, references, template scanning, dependency
//! classification and versions.

pub mod dependency;
pub mod graph;
pub mod kind;
pub mod template;
pub mod version;

pub use dependency::{DependencyCost, DependencyEdge, classify};
pub use graph::{ActionGraph, ActionNode};
pub use kind::{ActionKind, ActionRef};
pub use template::{TemplateField, TemplateRef};
