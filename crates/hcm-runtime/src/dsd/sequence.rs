//! [`ActiveLeaf`] – cursor state of the leaf currently on the active path.
//!
//! Only one leaf is ever live, so the engine keeps exactly one of these.  It
//! is created fresh (cursor at 0) whenever a leaf enters the active path and
//! dropped when the leaf leaves it, which is what makes a preempted and
//! re-selected sequence restart from its first step.

use crate::dsd::node::Leaf;

#[derive(Debug, Clone, Copy)]
pub struct ActiveLeaf<A: 'static> {
    leaf: Leaf<A>,
    cursor: usize,
    entered: bool,
}

impl<A: Copy + 'static> ActiveLeaf<A> {
    pub fn new(leaf: Leaf<A>) -> Self {
        Self {
            leaf,
            cursor: 0,
            entered: false,
        }
    }

    pub fn leaf(&self) -> Leaf<A> {
        self.leaf
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The step the cursor points at.  `None` only for an empty sequence.
    pub fn current(&self) -> Option<A> {
        self.leaf.steps().get(self.cursor).copied()
    }

    /// Whether the current step has had its enter hook run.
    pub fn entered(&self) -> bool {
        self.entered
    }

    pub fn mark_entered(&mut self) {
        self.entered = true;
    }

    /// The current step reported done.
    ///
    /// Moves the cursor to the next step; the new step runs on the next
    /// tick.  The last step never advances: it is re-armed so that its enter
    /// hook runs again on the next tick.
    pub fn complete(&mut self) {
        if self.cursor + 1 < self.leaf.steps().len() {
            self.cursor += 1;
        }
        self.entered = false;
    }
}
