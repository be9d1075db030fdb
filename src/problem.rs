use id_collections::{id_type, Count, IdVec};

#[id_type]
pub struct NodeId(pub usize);

/// A point is the unit of iteration: a node together with the argument tuple selecting one
/// entry of the node's (possibly function-valued) domain. Zero-argument domains use `()`.
///
/// The derived order is node-major, so the natural order over points doubles as the
/// worklist priority: the maximum of a set of points is one at the highest node id.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Point<A> {
    pub node: NodeId,
    pub args: A,
}

impl<A> Point<A> {
    pub fn new(node: NodeId, args: A) -> Self {
        Point { node, args }
    }
}

/// The ambient state a transfer function runs in.
///
/// Every value a transfer function consults must be read through `depend_on`; this is what
/// lets the solver record the reference set of the evaluation in progress and re-schedule
/// it when a referent changes later. Reading the graph behind the context's back breaks
/// change propagation.
pub trait TransferCtx<V, A> {
    fn depend_on(&mut self, node: NodeId, args: A) -> V;
}

pub type TransferFn<V, A> = Box<dyn Fn(&mut dyn TransferCtx<V, A>, &A) -> V>;

/// Per-node predicate deciding whether an old/new value pair differs enough that referrers
/// of the updated point must be re-evaluated. Receives the argument tuple of the point.
pub type ChangeDetector<V, A> = Box<dyn Fn(&A, &V, &V) -> bool>;

/// The permissive default detector: propagate whenever the new value differs from the old.
pub fn neq_detector<V: PartialEq, A>() -> ChangeDetector<V, A> {
    Box::new(|_args, old, new| old != new)
}

/// Propagate on every update, whether or not anything changed.
pub fn always_detector<V, A>() -> ChangeDetector<V, A> {
    Box::new(|_args, _old, _new| true)
}

pub struct NodeDef<V, A> {
    pub transfer: TransferFn<V, A>,
    pub change_detector: ChangeDetector<V, A>,
}

/// A data-flow problem: one transfer function and one change detector per node. Constant
/// for the lifetime of a solve.
pub struct DataFlowProblem<V, A> {
    nodes: IdVec<NodeId, NodeDef<V, A>>,
}

impl<V, A> DataFlowProblem<V, A> {
    pub fn new() -> Self {
        DataFlowProblem { nodes: IdVec::new() }
    }

    pub fn node_count(&self) -> Count<NodeId> {
        self.nodes.count()
    }

    /// Register a node whose transfer function does not need to know its own id.
    pub fn add_node(
        &mut self,
        transfer: TransferFn<V, A>,
        change_detector: ChangeDetector<V, A>,
    ) -> NodeId {
        self.nodes.push(NodeDef {
            transfer,
            change_detector,
        })
    }

    /// Allocate a fresh node id and hand it to `build` before the transfer function is
    /// registered, so that recursive transfer functions can tie the knot and depend on
    /// themselves.
    pub fn allocate_node(
        &mut self,
        build: impl FnOnce(NodeId) -> TransferFn<V, A>,
        change_detector: ChangeDetector<V, A>,
    ) -> NodeId {
        let mut count = self.nodes.count();
        let id = count.inc();
        let transfer = build(id);
        let pushed = self.nodes.push(NodeDef {
            transfer,
            change_detector,
        });
        debug_assert_eq!(pushed, id);
        id
    }

    pub(crate) fn def(&self, node: NodeId) -> &NodeDef<V, A> {
        self.nodes
            .get(node)
            .unwrap_or_else(|| panic!("no transfer function registered for {:?}", node))
    }
}

impl<V, A> Default for DataFlowProblem<V, A> {
    fn default() -> Self {
        DataFlowProblem::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn node_ids_are_sequential() {
        let mut problem: DataFlowProblem<u32, ()> = DataFlowProblem::new();
        let first = problem.add_node(Box::new(|_ctx, &()| 0), neq_detector());
        let second = problem.add_node(Box::new(|_ctx, &()| 1), neq_detector());
        assert_eq!(first, NodeId(0));
        assert_eq!(second, NodeId(1));
        assert_eq!(problem.node_count().to_value(), 2);
    }

    #[test]
    fn allocate_node_ties_the_knot() {
        let mut problem: DataFlowProblem<u32, ()> = DataFlowProblem::new();
        let _ = problem.add_node(Box::new(|_ctx, &()| 0), neq_detector());

        let allocated = problem.allocate_node(
            |this| {
                assert_eq!(this, NodeId(1));
                Box::new(move |ctx, &()| ctx.depend_on(this, ()))
            },
            neq_detector(),
        );
        assert_eq!(allocated, NodeId(1));
    }

    #[test]
    #[should_panic(expected = "no transfer function")]
    fn unregistered_node_is_fatal() {
        let problem: DataFlowProblem<u32, ()> = DataFlowProblem::new();
        let _ = problem.def(NodeId(3));
    }

    #[test]
    fn stock_detectors() {
        let neq = neq_detector::<u32, ()>();
        assert!(neq(&(), &1, &2));
        assert!(!neq(&(), &2, &2));

        let always = always_detector::<u32, ()>();
        assert!(always(&(), &2, &2));
    }
}
