//! [`Engine`] – walks the decision tree once per tick.
//!
//! Each call to [`Engine::tick`]:
//!
//! 1. Evaluates decisions from the root, appending every visited node to a
//!    fresh candidate path, until a decision returns a leaf.
//! 2. Diffs the candidate path against the previous tick's path by longest
//!    common prefix.
//! 3. Tears down every old node beyond the prefix that is not on the new
//!    path, deepest first.  If the old leaf is among them, its current step
//!    gets the domain's exit hook.  All of this happens before anything new
//!    runs, so two actions are never live at once.
//! 4. Initialises every new node beyond the prefix that was not on the old
//!    path: a leaf entering the path starts with its cursor at step 0.
//! 5. Executes the current step of the leaf, running the step's enter hook
//!    first if it has not run yet.  A step reporting
//!    [`ActionStatus::Done`] moves the cursor forward; the next step executes
//!    on the following tick.
//! 6. Stores the candidate path as the previous path.
//!
//! A tree that does not reach a leaf within `max_hops` decisions is
//! malformed.  [`Engine::new`] checks this statically over the successors
//! every decision declares, and every tick re-checks it on the path
//! actually taken.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, trace};

use crate::dsd::Domain;
use crate::dsd::node::{ActionStatus, Branch, Leaf, PathNode, Visit};
use crate::dsd::sequence::ActiveLeaf;

type NodeOf<T> = PathNode<<T as Domain>::Decision, <T as Domain>::Action>;

/// A decision tree that cannot be evaluated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DsdError {
    #[error("no leaf reached within {max_hops} decisions: {path}")]
    HopLimit { max_hops: usize, path: String },

    #[error("decision cycle: {path}")]
    Cycle { path: String },

    #[error("decision {decision} declares no successors")]
    DeadEnd { decision: String },

    #[error("decision {decision} leads to an empty sequence")]
    EmptySequence { decision: String },
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport<D, A: 'static> {
    /// 1-based tick counter.
    pub tick: u64,
    /// Root-to-leaf path selected this tick.
    pub path: Vec<PathNode<D, A>>,
    /// The step that executed.
    pub action: A,
    /// Cursor of the executed step within its leaf.
    pub step: usize,
    pub status: ActionStatus,
    /// Old nodes torn down this tick, deepest first.
    pub torn_down: Vec<PathNode<D, A>>,
    /// New nodes initialised this tick, root side first.
    pub initialized: Vec<PathNode<D, A>>,
}

impl<D: Copy, A: Copy + 'static> TickReport<D, A> {
    /// The leaf at the end of the path.
    pub fn leaf(&self) -> Option<Leaf<A>> {
        match self.path.last() {
            Some(PathNode::Leaf(leaf)) => Some(*leaf),
            _ => None,
        }
    }

    /// The active path differs from the previous tick's.
    pub fn path_changed(&self) -> bool {
        !self.torn_down.is_empty() || !self.initialized.is_empty()
    }
}

/// Drives a [`Domain`] one tick at a time.
pub struct Engine<T: Domain> {
    domain: T,
    max_hops: usize,
    previous: Vec<NodeOf<T>>,
    active: Option<ActiveLeaf<T::Action>>,
    ticks: u64,
}

impl<T: Domain> Engine<T> {
    /// Validate the domain's tree and build an engine for it.
    ///
    /// # Errors
    ///
    /// Returns a [`DsdError`] when a decision cycle, a dead-end decision, an
    /// empty sequence, or a root-to-leaf chain longer than `max_hops` can be
    /// reached from the root.
    pub fn new(domain: T, max_hops: usize) -> Result<Self, DsdError> {
        validate(&domain, max_hops)?;
        Ok(Self {
            domain,
            max_hops,
            previous: Vec::new(),
            active: None,
            ticks: 0,
        })
    }

    pub fn domain(&self) -> &T {
        &self.domain
    }

    pub fn domain_mut(&mut self) -> &mut T {
        &mut self.domain
    }

    /// Number of completed ticks.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// The path selected by the most recent tick.
    pub fn active_path(&self) -> &[NodeOf<T>] {
        &self.previous
    }

    /// Cursor of the live leaf, if any.
    pub fn cursor(&self) -> Option<usize> {
        self.active.as_ref().map(ActiveLeaf::cursor)
    }

    /// Run one arbitration cycle against `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`DsdError::HopLimit`] when evaluation does not reach a leaf
    /// within `max_hops` decisions, and [`DsdError::EmptySequence`] when the
    /// selected leaf has no steps.  Both mean the tree is malformed; the
    /// previous path and live leaf are left untouched.
    pub fn tick(
        &mut self,
        ctx: &mut T::Context,
    ) -> Result<TickReport<T::Decision, T::Action>, DsdError> {
        let (path, leaf) = self.walk(ctx)?;
        if leaf.steps().is_empty() {
            return Err(DsdError::EmptySequence {
                decision: format!("{:?}", path.iter().rev().nth(1)),
            });
        }

        let common = self
            .previous
            .iter()
            .zip(path.iter())
            .take_while(|(old, new)| old == new)
            .count();

        let torn_down: Vec<NodeOf<T>> = self.previous[common..]
            .iter()
            .rev()
            .filter(|node| !path.contains(node))
            .copied()
            .collect();
        for node in &torn_down {
            trace!(?node, "teardown");
            if let PathNode::Leaf(_) = node
                && let Some(active) = self.active.take()
                && active.entered()
                && let Some(step) = active.current()
            {
                self.domain.exit(step, ctx);
            }
        }

        let initialized: Vec<NodeOf<T>> = path[common..]
            .iter()
            .filter(|node| !self.previous.contains(node))
            .copied()
            .collect();
        for node in &initialized {
            trace!(?node, "init");
        }

        // A leaf new to the path finds `active` empty after teardown and
        // starts at step 0 here.
        let active = self.active.get_or_insert_with(|| ActiveLeaf::new(leaf));
        let step = active.cursor();
        let Some(action) = active.current() else {
            return Err(DsdError::EmptySequence {
                decision: format!("{leaf:?}"),
            });
        };
        if !active.entered() {
            self.domain.enter(action, ctx);
            active.mark_entered();
        }
        let status = self.domain.execute(action, ctx);
        if status == ActionStatus::Done {
            active.complete();
        }

        self.ticks += 1;
        if !torn_down.is_empty() || !initialized.is_empty() {
            debug!(
                tick = self.ticks,
                leaf = ?leaf,
                common,
                torn_down = torn_down.len(),
                initialized = initialized.len(),
                "active path changed"
            );
        }
        trace!(tick = self.ticks, ?action, step, ?status, "executed");

        self.previous = path.clone();
        Ok(TickReport {
            tick: self.ticks,
            path,
            action,
            step,
            status,
            torn_down,
            initialized,
        })
    }

    /// Evaluate decisions from the root until one returns a leaf.
    fn walk(
        &mut self,
        ctx: &mut T::Context,
    ) -> Result<(Vec<NodeOf<T>>, Leaf<T::Action>), DsdError> {
        let mut path: Vec<NodeOf<T>> = Vec::with_capacity(self.previous.len().max(1));
        let mut decision = self.domain.root();
        let mut on_previous = true;
        loop {
            if path.len() >= self.max_hops {
                return Err(DsdError::HopLimit {
                    max_hops: self.max_hops,
                    path: format!("{path:?}"),
                });
            }
            let node = PathNode::Decision(decision);
            on_previous = on_previous && self.previous.get(path.len()) == Some(&node);
            path.push(node);
            let visit = Visit {
                reevaluate: on_previous,
            };
            match self.domain.decide(decision, visit, ctx) {
                Branch::Decision(next) => decision = next,
                Branch::Leaf(leaf) => {
                    path.push(PathNode::Leaf(leaf));
                    return Ok((path, leaf));
                }
            }
        }
    }
}

/// Depth-first check that every chain from the root ends in a non-empty
/// leaf within `max_hops` decisions.
fn validate<T: Domain>(domain: &T, max_hops: usize) -> Result<(), DsdError> {
    let mut stack = Vec::new();
    let mut checked = HashSet::new();
    visit_decision(domain, domain.root(), max_hops, &mut stack, &mut checked)
}

fn visit_decision<T: Domain>(
    domain: &T,
    decision: T::Decision,
    max_hops: usize,
    stack: &mut Vec<T::Decision>,
    checked: &mut HashSet<(T::Decision, usize)>,
) -> Result<(), DsdError> {
    if stack.contains(&decision) {
        stack.push(decision);
        return Err(DsdError::Cycle {
            path: format!("{stack:?}"),
        });
    }
    if stack.len() >= max_hops {
        stack.push(decision);
        return Err(DsdError::HopLimit {
            max_hops,
            path: format!("{stack:?}"),
        });
    }
    if !checked.insert((decision, stack.len())) {
        return Ok(());
    }

    let successors = domain.successors(decision);
    if successors.is_empty() {
        return Err(DsdError::DeadEnd {
            decision: format!("{decision:?}"),
        });
    }

    stack.push(decision);
    for branch in successors {
        match branch {
            Branch::Decision(next) => visit_decision(domain, next, max_hops, stack, checked)?,
            Branch::Leaf(leaf) if leaf.steps().is_empty() => {
                return Err(DsdError::EmptySequence {
                    decision: format!("{decision:?}"),
                });
            }
            Branch::Leaf(_) => {}
        }
    }
    stack.pop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    // A small priority chain:
    //
    //   Root ─ alarm? ─> [Brace, Hold]
    //        └─> Busy ─ busy? ─> Work
    //                 └─> Idle
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Dec {
        Root,
        Busy,
        Loop,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Act {
        Brace,
        Hold,
        Work,
        Idle,
    }

    static ALARM: [Act; 2] = [Act::Brace, Act::Hold];

    #[derive(Default)]
    struct World {
        alarm: bool,
        busy: bool,
        /// Ticks `Brace` needs before it reports done.
        brace_ticks: u32,
        log: Vec<String>,
        reevaluated: Vec<(Dec, bool)>,
    }

    #[derive(Default)]
    struct Chain {
        cyclic: bool,
        braced_for: u32,
        exits: HashMap<Act, u32>,
    }

    impl Domain for Chain {
        type Decision = Dec;
        type Action = Act;
        type Context = World;

        fn root(&self) -> Dec {
            if self.cyclic { Dec::Loop } else { Dec::Root }
        }

        fn successors(&self, decision: Dec) -> Vec<Branch<Dec, Act>> {
            match decision {
                Dec::Root => vec![Branch::sequence(&ALARM), Branch::Decision(Dec::Busy)],
                Dec::Busy => vec![Branch::action(Act::Work), Branch::action(Act::Idle)],
                Dec::Loop => vec![Branch::Decision(Dec::Loop)],
            }
        }

        fn decide(&mut self, decision: Dec, visit: Visit, world: &mut World) -> Branch<Dec, Act> {
            world.reevaluated.push((decision, visit.reevaluate));
            match decision {
                Dec::Root if world.alarm => Branch::sequence(&ALARM),
                Dec::Root => Branch::Decision(Dec::Busy),
                Dec::Busy if world.busy => Branch::action(Act::Work),
                Dec::Busy => Branch::action(Act::Idle),
                Dec::Loop => Branch::Decision(Dec::Loop),
            }
        }

        fn enter(&mut self, action: Act, world: &mut World) {
            world.log.push(format!("enter {action:?}"));
            if action == Act::Brace {
                self.braced_for = 0;
            }
        }

        fn execute(&mut self, action: Act, world: &mut World) -> ActionStatus {
            world.log.push(format!("exec {action:?}"));
            match action {
                Act::Brace => {
                    self.braced_for += 1;
                    if self.braced_for > world.brace_ticks {
                        ActionStatus::Done
                    } else {
                        ActionStatus::Running
                    }
                }
                Act::Hold | Act::Work | Act::Idle => ActionStatus::Running,
            }
        }

        fn exit(&mut self, action: Act, world: &mut World) {
            world.log.push(format!("exit {action:?}"));
            *self.exits.entry(action).or_default() += 1;
        }
    }

    fn engine() -> Engine<Chain> {
        Engine::new(Chain::default(), 8).expect("valid chain")
    }

    #[test]
    fn first_tick_initialises_whole_path() {
        let mut engine = engine();
        let mut world = World::default();
        let report = engine.tick(&mut world).unwrap();

        assert_eq!(report.tick, 1);
        assert_eq!(report.action, Act::Idle);
        assert_eq!(
            report.path,
            vec![
                PathNode::Decision(Dec::Root),
                PathNode::Decision(Dec::Busy),
                PathNode::Leaf(Leaf::Action(Act::Idle)),
            ]
        );
        assert_eq!(report.initialized, report.path);
        assert!(report.torn_down.is_empty());
        assert_eq!(world.log, vec!["enter Idle", "exec Idle"]);
    }

    #[test]
    fn unchanged_context_is_idempotent() {
        let mut engine = engine();
        let mut world = World::default();
        let first = engine.tick(&mut world).unwrap();
        for _ in 0..5 {
            let report = engine.tick(&mut world).unwrap();
            assert_eq!(report.path, first.path);
            assert_eq!(report.action, first.action);
            assert!(!report.path_changed());
        }
        // Enter ran only once; the running leaf was just continued.
        assert_eq!(world.log.iter().filter(|l| *l == "enter Idle").count(), 1);
    }

    #[test]
    fn reevaluate_flag_is_false_only_on_first_entry() {
        let mut engine = engine();
        let mut world = World::default();
        engine.tick(&mut world).unwrap();
        engine.tick(&mut world).unwrap();
        assert_eq!(
            world.reevaluated,
            vec![
                (Dec::Root, false),
                (Dec::Busy, false),
                (Dec::Root, true),
                (Dec::Busy, true),
            ]
        );
    }

    #[test]
    fn preemption_tears_down_abandoned_subtree_once() {
        let mut engine = engine();
        let mut world = World {
            busy: true,
            ..World::default()
        };
        engine.tick(&mut world).unwrap();

        world.alarm = true;
        world.brace_ticks = 5;
        let report = engine.tick(&mut world).unwrap();

        assert_eq!(report.action, Act::Brace);
        assert_eq!(
            report.torn_down,
            vec![
                PathNode::Leaf(Leaf::Action(Act::Work)),
                PathNode::Decision(Dec::Busy),
            ]
        );
        assert_eq!(
            report.initialized,
            vec![PathNode::Leaf(Leaf::Sequence(&ALARM))]
        );
        // Teardown of the old step precedes the new step's enter hook.
        assert_eq!(
            &world.log[2..],
            &["exit Work", "enter Brace", "exec Brace"]
        );

        engine.tick(&mut world).unwrap();
        assert_eq!(engine.domain().exits.get(&Act::Work), Some(&1));
    }

    #[test]
    fn sequence_advances_on_the_tick_after_done() {
        let mut engine = engine();
        let mut world = World {
            alarm: true,
            brace_ticks: 1,
            ..World::default()
        };

        let r1 = engine.tick(&mut world).unwrap();
        assert_eq!((r1.action, r1.step, r1.status), (Act::Brace, 0, ActionStatus::Running));
        let r2 = engine.tick(&mut world).unwrap();
        assert_eq!((r2.action, r2.step, r2.status), (Act::Brace, 0, ActionStatus::Done));
        let r3 = engine.tick(&mut world).unwrap();
        assert_eq!((r3.action, r3.step), (Act::Hold, 1));
        let r4 = engine.tick(&mut world).unwrap();
        assert_eq!((r4.action, r4.step), (Act::Hold, 1));
        assert_eq!(engine.cursor(), Some(1));
    }

    #[test]
    fn reselected_sequence_restarts_at_first_step() {
        let mut engine = engine();
        let mut world = World {
            alarm: true,
            brace_ticks: 0,
            ..World::default()
        };
        engine.tick(&mut world).unwrap();
        assert_eq!(engine.tick(&mut world).unwrap().action, Act::Hold);

        world.alarm = false;
        let report = engine.tick(&mut world).unwrap();
        assert_eq!(report.action, Act::Idle);
        assert_eq!(engine.domain().exits.get(&Act::Hold), Some(&1));

        world.alarm = true;
        let report = engine.tick(&mut world).unwrap();
        assert_eq!((report.action, report.step), (Act::Brace, 0));
    }

    #[test]
    fn leaf_switch_under_same_decision_keeps_decision() {
        let mut engine = engine();
        let mut world = World::default();
        engine.tick(&mut world).unwrap();
        world.busy = true;
        let report = engine.tick(&mut world).unwrap();
        assert_eq!(
            report.torn_down,
            vec![PathNode::Leaf(Leaf::Action(Act::Idle))]
        );
        assert_eq!(
            report.initialized,
            vec![PathNode::Leaf(Leaf::Action(Act::Work))]
        );
    }

    #[test]
    fn cyclic_tree_is_rejected_at_construction() {
        let result = Engine::new(
            Chain {
                cyclic: true,
                ..Chain::default()
            },
            8,
        );
        assert!(matches!(result, Err(DsdError::Cycle { .. })));
    }

    #[test]
    fn too_deep_tree_is_rejected_at_construction() {
        let result = Engine::new(Chain::default(), 1);
        assert!(matches!(result, Err(DsdError::HopLimit { max_hops: 1, .. })));
    }
}
