//! Dispatch slot accounting: one global limit plus optional per-kind limits.

use std::collections::HashMap;

use crate::dag::node::{NodeId, NodeRole};

type Class = (&'static str, NodeRole);

#[derive(Debug)]
pub(crate) struct ConcurrencyLimiter {
    global: usize,
    running: HashMap<NodeId, Class>,
    per_class: HashMap<Class, usize>,
}

impl ConcurrencyLimiter {
    /// A limit of zero is treated as one.
    pub fn new(global: usize) -> Self {
        Self {
            global: global.max(1),
            running: HashMap::new(),
            per_class: HashMap::new(),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.running.len()
    }

    pub fn has_capacity(&self) -> bool {
        self.running.len() < self.global
    }

    /// Claim a slot for `id` if both the global and the class limit allow it.
    pub fn try_acquire(
        &mut self,
        id: NodeId,
        kind: &'static str,
        role: NodeRole,
        class_limit: Option<usize>,
    ) -> bool {
        if !self.has_capacity() {
            return false;
        }

        let class = (kind, role);
        let current = self.per_class.get(&class).copied().unwrap_or(0);
        if let Some(limit) = class_limit {
            if current >= limit.max(1) {
                return false;
            }
        }

        self.per_class.insert(class, current + 1);
        self.running.insert(id, class);
        true
    }

    pub fn release(&mut self, id: NodeId) {
        let Some(class) = self.running.remove(&id) else {
            return;
        };
        if let Some(count) = self.per_class.get_mut(&class) {
            *count = count.saturating_sub(1);
        }
    }
}
