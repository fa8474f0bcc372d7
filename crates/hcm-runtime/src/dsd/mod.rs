//! Dynamic stack decider.
//!
//! A generic decision engine: a tree of decisions whose leaves are actions or
//! fixed action sequences.  Every tick the tree is evaluated from the root, the
//! resulting root-to-leaf path is diffed against the previous one, abandoned
//! nodes are torn down, and exactly one action executes.
//!
//! A [`Domain`] supplies the tree and the hooks; [`Engine`] owns the path
//! bookkeeping.

pub mod engine;
pub mod node;
pub mod sequence;

use std::fmt::Debug;
use std::hash::Hash;

pub use engine::{DsdError, Engine, TickReport};
pub use node::{ActionStatus, Branch, Leaf, PathNode, Visit};
pub use sequence::ActiveLeaf;

/// A concrete decision tree plus the behaviour of its actions.
///
/// `Context` is whatever the domain reads and writes during a tick; the
/// engine only threads it through.
pub trait Domain {
    type Decision: Copy + Eq + Hash + Debug;
    type Action: Copy + Eq + Debug + 'static;
    type Context;

    fn root(&self) -> Self::Decision;

    /// Every branch `decision` can ever return.  Used for static validation.
    fn successors(&self, decision: Self::Decision) -> Vec<Branch<Self::Decision, Self::Action>>;

    /// Evaluate `decision` against the context.
    fn decide(
        &mut self,
        decision: Self::Decision,
        visit: Visit,
        ctx: &mut Self::Context,
    ) -> Branch<Self::Decision, Self::Action>;

    /// Called once before the first execution of a step.
    fn enter(&mut self, _action: Self::Action, _ctx: &mut Self::Context) {}

    fn execute(&mut self, action: Self::Action, ctx: &mut Self::Context) -> ActionStatus;

    /// Called when a step that was entered leaves the active path before
    /// completing.
    fn exit(&mut self, _action: Self::Action, _ctx: &mut Self::Context) {}
}
