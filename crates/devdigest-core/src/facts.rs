//! Run-scoped scratchpad shared between modules.
//!
//! A module appends what it discovered; a module registered later reads it.
//! Entries can only be appended, never removed or rewritten, and the whole
//! value is dropped when the run ends.

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Facts {
    feature_ids: Vec<u64>,
}

impl Facts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Work item ids discovered so far, in discovery order.
    pub fn feature_ids(&self) -> &[u64] {
        &self.feature_ids
    }

    pub fn append_feature_ids<I: IntoIterator<Item = u64>>(&mut self, ids: I) {
        self.feature_ids.extend(ids);
    }

    pub fn is_empty(&self) -> bool {
        self.feature_ids.is_empty()
    }
}
