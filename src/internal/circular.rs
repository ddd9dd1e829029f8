//! Circular dependency detection infrastructure.

use std::collections::HashSet;

use crate::descriptors::{ServiceDescriptor, ServiceId};
use crate::error::{DiError, DiResult};

/// Active resolution path.
///
/// Mirrors the resolver's frame stack so membership checks stay O(1).
pub(crate) struct Trace {
    stack: Vec<ServiceId>,
    active: HashSet<ServiceId>,
    max_depth: Option<usize>,
}

impl Trace {
    pub(crate) fn new(max_depth: Option<usize>) -> Self {
        Self {
            stack: Vec::new(),
            active: HashSet::new(),
            max_depth,
        }
    }

    /// Pushes `id`, failing if it is already on the path.
    ///
    /// The circular path runs from the first occurrence of `id` back to `id`,
    /// e.g. `[A, B, A]`.
    pub(crate) fn enter(&mut self, id: ServiceId, arena: &[ServiceDescriptor]) -> DiResult<()> {
        if self.active.contains(&id) {
            let start = self.stack.iter().position(|s| *s == id).unwrap_or(0);
            let path = self.stack[start..]
                .iter()
                .chain(std::iter::once(&id))
                .map(|s| arena[s.0].label())
                .collect();
            return Err(DiError::Circular(path));
        }

        if let Some(max) = self.max_depth {
            if self.stack.len() >= max {
                return Err(DiError::DepthExceeded(self.stack.len()));
            }
        }

        self.stack.push(id);
        self.active.insert(id);
        Ok(())
    }

    pub(crate) fn leave(&mut self) -> Option<ServiceId> {
        let id = self.stack.pop()?;
        self.active.remove(&id);
        Some(id)
    }

    pub(crate) fn depth(&self) -> usize {
        self.stack.len()
    }
}
