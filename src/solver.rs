use std::collections::BTreeSet;
use std::fmt::Debug;
use std::mem;

use im_rc::OrdSet;

use crate::graph::{DenseGraph, DepGraph, Density, SparseGraph};
use crate::lattice::{BoundedSemilattice, Greatest};
use crate::problem::{DataFlowProblem, NodeId, Point, TransferCtx};

/// Client-supplied widening: given the argument tuple and the current value of a point that
/// has exhausted its iteration budget, produce the value to install instead of running the
/// transfer function.
///
/// The result must be at least as large as anything the transfer function could produce at
/// the point, and re-applying the widening must be a no-op under the point's change
/// detector; the solver does not detect violations of either obligation.
pub type WideningFn<V, A> = Box<dyn Fn(&A, V) -> V>;

pub enum IterationBound<V, A> {
    /// Rely on the ascending-chain condition of the value type for termination.
    NeverAbort,

    /// Once a point has been updated this many times, replace its next evaluation by the
    /// widening function.
    AbortAfter(u32, WideningFn<V, A>),
}

impl<V, A> IterationBound<V, A> {
    /// The stock widening: jump straight to the greatest element.
    pub fn abort_with_top(max_updates: u32) -> Self
    where
        V: Greatest,
    {
        IterationBound::AbortAfter(max_updates, Box::new(|_args, _value| V::greatest()))
    }
}

/// Observation hook for the solve schedule: `Hidden` ignores everything, `RecordTrace`
/// keeps the exact order in which points were re-evaluated.
pub trait SolveTracer<A> {
    fn recomputing(&mut self, point: &Point<A>);
}

#[derive(Clone, Copy, Debug)]
pub struct Hidden;

impl<A> SolveTracer<A> for Hidden {
    fn recomputing(&mut self, _point: &Point<A>) {}
}

#[derive(Clone, Debug)]
pub struct RecordTrace<A>(pub Vec<Point<A>>);

impl<A> RecordTrace<A> {
    pub fn new() -> Self {
        RecordTrace(Vec::new())
    }
}

impl<A> Default for RecordTrace<A> {
    fn default() -> Self {
        RecordTrace::new()
    }
}

impl<A: Clone> SolveTracer<A> for RecordTrace<A> {
    fn recomputing(&mut self, point: &Point<A>) {
        self.0.push(point.clone());
    }
}

/// The execution environment of one solve: the problem and iteration bound (constant for
/// the solve), the dependency graph, the stack of points currently being evaluated, the
/// reference accumulator of the innermost evaluation frame, and the worklist. Created
/// fresh per solve; nothing here outlives the call.
struct Solver<'a, V, A, G> {
    problem: &'a DataFlowProblem<V, A>,
    bound: IterationBound<V, A>,
    graph: G,
    call_stack: BTreeSet<Point<A>>,
    current_refs: OrdSet<Point<A>>,
    unstable: BTreeSet<Point<A>>,
    tracer: &'a mut dyn SolveTracer<A>,
}

impl<'a, V, A, G> Solver<'a, V, A, G>
where
    V: Clone + BoundedSemilattice,
    A: Ord + Clone + Debug,
    G: DepGraph<V, A>,
{
    /// Re-evaluate `point`, install the result, and propagate to its referrers if the
    /// point's change detector says the value moved.
    fn recompute(&mut self, point: &Point<A>) -> V {
        self.tracer.recomputing(point);

        // Open a fresh reference-tracking frame.
        let fresh = self.call_stack.insert(point.clone());
        if !fresh {
            panic!(
                "recompute re-entered for {:?} while its evaluation was already in progress",
                point
            );
        }
        let outer_refs = mem::take(&mut self.current_refs);

        let new_value = match self.widened_value(point) {
            Some(widened) => widened,
            None => {
                let problem = self.problem;
                (problem.def(point.node).transfer)(self, &point.args)
            }
        };

        let frame_refs = self.current_refs.clone();
        let old = self
            .graph
            .update_point(point, new_value.clone(), frame_refs.clone());
        self.unstable.remove(point);

        let changed = match &old.value {
            Some(old_value) => (self.problem.def(point.node).change_detector)(
                &point.args,
                old_value,
                &new_value,
            ),
            None => true,
        };
        if changed {
            for referrer in old.referrers.iter() {
                if referrer != point {
                    self.unstable.insert(referrer.clone());
                }
            }
            // Self-loops re-enqueue through the fresh reference set instead: the overwritten
            // referrer set does not yet list a first-time self-loop, and a widened point
            // (whose frame is empty) must not resurrect itself through a stale one.
            if frame_refs.contains(point) {
                self.unstable.insert(point.clone());
            }
        }

        // Close the frame.
        self.current_refs = outer_refs;
        self.call_stack.remove(point);

        new_value
    }

    /// The widened replacement value for `point`, if the iteration bound says its next
    /// evaluation must not run the transfer function.
    fn widened_value(&self, point: &Point<A>) -> Option<V> {
        match &self.bound {
            IterationBound::NeverAbort => None,
            IterationBound::AbortAfter(max_updates, widen) => {
                let info = self.graph.lookup(point)?;
                let prior = info.value.as_ref()?;
                if info.iterations >= *max_updates {
                    Some(widen(&point.args, prior.clone()))
                } else {
                    None
                }
            }
        }
    }

    /// The cycle-breaking bound for `point`: the join of the values of all already-known
    /// points of the same node at strictly smaller argument tuples. Degrades to `least`
    /// when no smaller point is known.
    fn optimistic_approximation(&self, point: &Point<A>) -> V {
        let mut approx = V::least();
        if let Some(smaller) = self.graph.lookup_lt(point.node, &point.args) {
            for (_args, info) in smaller {
                if let Some(value) = &info.value {
                    approx.join_mut(value);
                }
            }
        }
        approx
    }

    /// Drain the worklist, highest node id first.
    fn work(&mut self) {
        while let Some(point) = self.unstable.iter().next_back().cloned() {
            self.recompute(&point);
        }
    }
}

impl<'a, V, A, G> TransferCtx<V, A> for Solver<'a, V, A, G>
where
    V: Clone + BoundedSemilattice,
    A: Ord + Clone + Debug,
    G: DepGraph<V, A>,
{
    fn depend_on(&mut self, node: NodeId, args: A) -> V {
        let point = Point::new(node, args);
        self.current_refs.insert(point.clone());

        let on_stack = self.call_stack.contains(&point);
        match self.graph.lookup(&point).and_then(|info| info.value.clone()) {
            // We are inside the evaluation of this very point; break the cycle with an
            // optimistic bound instead of recursing forever.
            None if on_stack => self.optimistic_approximation(&point),
            // Undiscovered: descend eagerly and evaluate it now.
            None => self.recompute(&point),
            // The point has an approximation. Hand it back even when the point still sits
            // in the worklist: if the value later changes, the referrer edge installed by
            // `update_point` re-enqueues the evaluation now in progress.
            Some(value) => value,
        }
    }
}

/// Solve `problem` from `root` and return the root's value at the fixed point.
///
/// Panics when the fixed point is reached without the root ever receiving a value, which
/// can only happen if the root's transfer function is missing from the problem.
pub fn solve_problem<V, A>(
    problem: &DataFlowProblem<V, A>,
    density: Density,
    bound: IterationBound<V, A>,
    root: Point<A>,
) -> V
where
    V: Clone + BoundedSemilattice,
    A: Ord + Clone + Debug,
{
    solve_problem_traced(problem, density, bound, root, &mut Hidden)
}

/// Like [`solve_problem`], reporting every `recompute` invocation to `tracer` in order.
pub fn solve_problem_traced<V, A>(
    problem: &DataFlowProblem<V, A>,
    density: Density,
    bound: IterationBound<V, A>,
    root: Point<A>,
    tracer: &mut dyn SolveTracer<A>,
) -> V
where
    V: Clone + BoundedSemilattice,
    A: Ord + Clone + Debug,
{
    match density {
        Density::Sparse => run(problem, bound, SparseGraph::new(), root, tracer).0,
        Density::Dense(max_node) => {
            run(problem, bound, DenseGraph::new(max_node), root, tracer).0
        }
    }
}

/// Run a solve to completion on a concrete graph backend, handing back the final graph
/// along with the root value.
fn run<'a, V, A, G>(
    problem: &'a DataFlowProblem<V, A>,
    bound: IterationBound<V, A>,
    graph: G,
    root: Point<A>,
    tracer: &'a mut dyn SolveTracer<A>,
) -> (V, G)
where
    V: Clone + BoundedSemilattice,
    A: Ord + Clone + Debug,
    G: DepGraph<V, A>,
{
    let mut solver = Solver {
        problem,
        bound,
        graph,
        call_stack: BTreeSet::new(),
        current_refs: OrdSet::new(),
        unstable: BTreeSet::new(),
        tracer,
    };
    solver.unstable.insert(root.clone());
    solver.work();

    debug_assert!(solver.call_stack.is_empty());
    debug_assert!(solver.current_refs.is_empty());

    let value = solver
        .graph
        .lookup(&root)
        .and_then(|info| info.value.clone())
        .unwrap_or_else(|| {
            panic!(
                "solve finished without ever computing a value for the root {:?}",
                root
            )
        });
    (value, solver.graph)
}
