// src/action/dependency.rs

//! Per-edge dependency classification between actions.

use std::collections::BTreeMap;

use crate::action::kind::ActionRef;
use crate::action::template::TemplateRef;

/// What an action needs from one of its dependencies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DependencyEdge {
    /// Listed under `dependencies` in the config.
    pub explicit: bool,
    /// A template reads a static field (version, name, kind).
    pub needs_static_outputs: bool,
    /// A template reads `outputs.<key>`.
    pub needs_executed_outputs: bool,
}

impl DependencyEdge {
    pub fn explicit() -> Self {
        Self {
            explicit: true,
            ..Self::default()
        }
    }

    pub fn merge(&mut self, other: DependencyEdge) {
        self.explicit |= other.explicit;
        self.needs_static_outputs |= other.needs_static_outputs;
        self.needs_executed_outputs |= other.needs_executed_outputs;
    }
}

/// How much of a dependency has to be settled before the dependant can be
/// resolved. Ordered: `None < Resolved < Executed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DependencyCost {
    /// Ordering only (or nothing at all) at resolve time.
    None,
    /// The dependency's resolve task.
    Resolved,
    /// The dependency's execute task.
    Executed,
}

pub fn classify(edge: &DependencyEdge) -> DependencyCost {
    if edge.needs_executed_outputs {
        DependencyCost::Executed
    } else if edge.needs_static_outputs {
        DependencyCost::Resolved
    } else {
        DependencyCost::None
    }
}

/// Merge explicit dependencies and template references into one edge per
/// target. References to `owner` itself are not edges.
pub fn collect_edges<'a>(
    owner: &ActionRef,
    explicit: impl IntoIterator<Item = &'a ActionRef>,
    templates: impl IntoIterator<Item = &'a TemplateRef>,
) -> BTreeMap<ActionRef, DependencyEdge> {
    let mut edges: BTreeMap<ActionRef, DependencyEdge> = BTreeMap::new();

    for dep in explicit {
        if dep != owner {
            edges
                .entry(dep.clone())
                .or_default()
                .merge(DependencyEdge::explicit());
        }
    }

    for template in templates {
        if &template.action == owner {
            continue;
        }
        let edge = DependencyEdge {
            explicit: false,
            needs_static_outputs: template.field.is_static(),
            needs_executed_outputs: !template.field.is_static(),
        };
        edges.entry(template.action.clone()).or_default().merge(edge);
    }

    edges
}
