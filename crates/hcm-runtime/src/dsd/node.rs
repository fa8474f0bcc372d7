//! Node vocabulary shared by the engine and every domain.

use std::fmt;

/// What an action reports after one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    /// The action needs further ticks.
    Running,
    /// The action finished its unit of work.
    Done,
}

/// A leaf of the decision tree: a single action, or a fixed sequence of
/// actions executed one after another.
///
/// Sequences are `'static` slices so that leaves are `Copy` and can be
/// compared cheaply when paths are diffed.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Leaf<A: 'static> {
    Action(A),
    Sequence(&'static [A]),
}

impl<A: 'static> Leaf<A> {
    /// The ordered steps of this leaf.  A single action is a one-step leaf.
    pub fn steps(&self) -> &[A] {
        match self {
            Leaf::Action(action) => std::slice::from_ref(action),
            Leaf::Sequence(steps) => steps,
        }
    }
}

impl<A: fmt::Debug + 'static> fmt::Debug for Leaf<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leaf::Action(action) => action.fmt(f),
            Leaf::Sequence(steps) => f.debug_list().entries(steps.iter()).finish(),
        }
    }
}

/// The outcome of evaluating a decision: descend into another decision, or
/// stop at a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch<D, A: 'static> {
    Decision(D),
    Leaf(Leaf<A>),
}

impl<D, A: 'static> Branch<D, A> {
    pub fn action(action: A) -> Self {
        Branch::Leaf(Leaf::Action(action))
    }

    pub fn sequence(steps: &'static [A]) -> Self {
        Branch::Leaf(Leaf::Sequence(steps))
    }
}

/// One element of an active path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathNode<D, A: 'static> {
    Decision(D),
    Leaf(Leaf<A>),
}

/// Per-evaluation information handed to a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visit {
    /// The decision sat at the same depth on the previous tick's path, with
    /// the same ancestors.  `false` on first entry.
    pub reevaluate: bool,
}
