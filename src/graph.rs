use std::collections::{btree_map, BTreeMap};
use std::ops::Bound;

use id_collections::IdVec;
use im_rc::OrdSet;

use crate::problem::{NodeId, Point};

/// Everything the solver knows about one point.
#[derive(Clone, Debug)]
pub struct PointInfo<V, A: Ord> {
    /// The current approximation. `None` only for points that have been referenced or
    /// enqueued but whose first evaluation has not completed yet, which is the state a
    /// point passes through while a cycle through it is being resolved.
    pub value: Option<V>,

    /// Points whose value was consulted during the last completed evaluation of this point.
    pub references: OrdSet<Point<A>>,

    /// Points that consulted this point during their last completed evaluation.
    pub referrers: OrdSet<Point<A>>,

    /// How many times `value` has been assigned.
    pub iterations: u32,
}

impl<V, A: Ord + Clone> PointInfo<V, A> {
    pub fn empty() -> Self {
        PointInfo {
            value: None,
            references: OrdSet::new(),
            referrers: OrdSet::new(),
            iterations: 0,
        }
    }
}

/// Which graph-store backend a solve uses.
#[derive(Clone, Copy, Debug)]
pub enum Density {
    Sparse,

    /// Array-indexed storage for problems that can declare an inclusive upper bound on the
    /// node ids they touch. Touching a point above the bound is a usage error and panics.
    Dense(NodeId),
}

pub type ArgRange<'a, V, A> = btree_map::Range<'a, A, PointInfo<V, A>>;

/// The store of per-point records.
///
/// The two backends differ only in how the per-node argument maps are indexed; everything
/// semantic lives in the provided `update_point`.
pub trait DepGraph<V: Clone, A: Ord + Clone> {
    fn lookup(&self, point: &Point<A>) -> Option<&PointInfo<V, A>>;

    /// The record for `point`, created empty on first touch.
    fn entry_mut(&mut self, point: &Point<A>) -> &mut PointInfo<V, A>;

    /// All known points at `node` with argument tuples strictly below `args`, in ascending
    /// argument order. `None` when the node has no known points at all.
    fn lookup_lt(&self, node: NodeId, args: &A) -> Option<ArgRange<'_, V, A>>;

    /// Every point ever touched, in ascending `(node, args)` order.
    fn known_points(&self) -> Vec<Point<A>>;

    /// Install a freshly computed value and the reference set of the evaluation that
    /// produced it, and return the record this overwrites (an empty one for a first
    /// evaluation).
    ///
    /// This is the one place where the reference/referrer symmetry is restored: the
    /// referrer sets of every referent gained or lost by the new reference set are
    /// rewritten here, and nowhere else.
    fn update_point(
        &mut self,
        point: &Point<A>,
        value: V,
        references: OrdSet<Point<A>>,
    ) -> PointInfo<V, A> {
        let info = self.entry_mut(point);
        let old = info.clone();
        info.value = Some(value);
        info.references = references.clone();
        info.iterations += 1;

        for gained in references.iter() {
            if !old.references.contains(gained) {
                self.entry_mut(gained).referrers.insert(point.clone());
            }
        }
        for lost in old.references.iter() {
            if !references.contains(lost) {
                self.entry_mut(lost).referrers.remove(point);
            }
        }

        old
    }
}

#[derive(Clone, Debug)]
pub struct DenseGraph<V, A: Ord> {
    nodes: IdVec<NodeId, BTreeMap<A, PointInfo<V, A>>>,
}

impl<V, A: Ord> DenseGraph<V, A> {
    pub fn new(max_node: NodeId) -> Self {
        DenseGraph {
            nodes: IdVec::from_vec((0..=max_node.0).map(|_| BTreeMap::new()).collect()),
        }
    }
}

impl<V: Clone, A: Ord + Clone> DepGraph<V, A> for DenseGraph<V, A> {
    fn lookup(&self, point: &Point<A>) -> Option<&PointInfo<V, A>> {
        self.nodes.get(point.node)?.get(&point.args)
    }

    fn entry_mut(&mut self, point: &Point<A>) -> &mut PointInfo<V, A> {
        let args_map = self
            .nodes
            .get_mut(point.node)
            .unwrap_or_else(|| panic!("{:?} exceeds the declared dense node bound", point.node));
        args_map
            .entry(point.args.clone())
            .or_insert_with(PointInfo::empty)
    }

    fn lookup_lt(&self, node: NodeId, args: &A) -> Option<ArgRange<'_, V, A>> {
        let args_map = self.nodes.get(node)?;
        Some(args_map.range((Bound::Unbounded, Bound::Excluded(args))))
    }

    fn known_points(&self) -> Vec<Point<A>> {
        let mut points = Vec::new();
        for (node, args_map) in &self.nodes {
            for args in args_map.keys() {
                points.push(Point::new(node, args.clone()));
            }
        }
        points
    }
}

#[derive(Clone, Debug)]
pub struct SparseGraph<V, A: Ord> {
    nodes: BTreeMap<NodeId, BTreeMap<A, PointInfo<V, A>>>,
}

impl<V, A: Ord> SparseGraph<V, A> {
    pub fn new() -> Self {
        SparseGraph {
            nodes: BTreeMap::new(),
        }
    }
}

impl<V, A: Ord> Default for SparseGraph<V, A> {
    fn default() -> Self {
        SparseGraph::new()
    }
}

impl<V: Clone, A: Ord + Clone> DepGraph<V, A> for SparseGraph<V, A> {
    fn lookup(&self, point: &Point<A>) -> Option<&PointInfo<V, A>> {
        self.nodes.get(&point.node)?.get(&point.args)
    }

    fn entry_mut(&mut self, point: &Point<A>) -> &mut PointInfo<V, A> {
        self.nodes
            .entry(point.node)
            .or_default()
            .entry(point.args.clone())
            .or_insert_with(PointInfo::empty)
    }

    fn lookup_lt(&self, node: NodeId, args: &A) -> Option<ArgRange<'_, V, A>> {
        let args_map = self.nodes.get(&node)?;
        Some(args_map.range((Bound::Unbounded, Bound::Excluded(args))))
    }

    fn known_points(&self) -> Vec<Point<A>> {
        let mut points = Vec::new();
        for (&node, args_map) in &self.nodes {
            for args in args_map.keys() {
                points.push(Point::new(node, args.clone()));
            }
        }
        points
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn point(node: usize, args: u32) -> Point<u32> {
        Point::new(NodeId(node), args)
    }

    fn refs(points: &[Point<u32>]) -> OrdSet<Point<u32>> {
        points.iter().cloned().collect()
    }

    fn check_symmetry(graph: &impl DepGraph<u32, u32>) {
        for p in graph.known_points() {
            let info = graph.lookup(&p).unwrap();
            for q in info.references.iter() {
                assert!(
                    graph.lookup(q).unwrap().referrers.contains(&p),
                    "{:?} references {:?} but is not listed as a referrer",
                    p,
                    q,
                );
            }
            for q in info.referrers.iter() {
                assert!(
                    graph.lookup(q).unwrap().references.contains(&p),
                    "{:?} is a referrer of {:?} without referencing it",
                    q,
                    p,
                );
            }
        }
    }

    fn exercise_updates(graph: &mut impl DepGraph<u32, u32>) {
        let a = point(0, 0);
        let b = point(1, 0);
        let c = point(2, 0);

        let old = graph.update_point(&a, 10, refs(&[b.clone(), c.clone()]));
        assert_eq!(old.value, None);
        assert_eq!(old.iterations, 0);
        check_symmetry(graph);

        // `b` and `c` exist as value-less stubs now.
        assert_eq!(graph.lookup(&b).unwrap().value, None);
        assert!(graph.lookup(&b).unwrap().referrers.contains(&a));

        // Dropping the reference to `c` must unlink `a` from `c`'s referrers.
        let old = graph.update_point(&a, 11, refs(&[b.clone()]));
        assert_eq!(old.value, Some(10));
        assert_eq!(old.iterations, 1);
        assert!(!graph.lookup(&c).unwrap().referrers.contains(&a));
        assert_eq!(graph.lookup(&a).unwrap().iterations, 2);
        check_symmetry(graph);

        // A self-loop lists the point in its own referrers, but the record returned by the
        // installing update still shows the state from before the loop existed.
        let old = graph.update_point(&b, 5, refs(&[b.clone()]));
        assert!(!old.referrers.contains(&b));
        assert!(graph.lookup(&b).unwrap().referrers.contains(&b));
        check_symmetry(graph);
    }

    #[test]
    fn sparse_update_maintains_symmetry() {
        exercise_updates(&mut SparseGraph::new());
    }

    #[test]
    fn dense_update_maintains_symmetry() {
        exercise_updates(&mut DenseGraph::new(NodeId(2)));
    }

    #[test]
    fn lookup_lt_is_strict_and_ordered() {
        let mut graph: SparseGraph<u32, u32> = SparseGraph::new();
        for args in [4, 0, 2, 6] {
            graph.update_point(&point(0, args), args * 10, OrdSet::new());
        }

        let below: Vec<u32> = graph
            .lookup_lt(NodeId(0), &5)
            .unwrap()
            .map(|(&args, _info)| args)
            .collect();
        assert_eq!(below, vec![0, 2, 4]);

        let below_zero: Vec<u32> = graph
            .lookup_lt(NodeId(0), &0)
            .unwrap()
            .map(|(&args, _info)| args)
            .collect();
        assert!(below_zero.is_empty());

        assert!(graph.lookup_lt(NodeId(1), &5).is_none());
    }

    #[test]
    fn backends_agree_on_a_scripted_history() {
        let mut sparse: SparseGraph<u32, u32> = SparseGraph::new();
        let mut dense: DenseGraph<u32, u32> = DenseGraph::new(NodeId(3));

        let script = vec![
            (point(3, 0), 1, vec![point(1, 0), point(2, 0)]),
            (point(1, 0), 2, vec![point(1, 0)]),
            (point(3, 0), 3, vec![point(2, 0)]),
            (point(2, 1), 4, vec![point(3, 0)]),
        ];

        for (p, value, references) in &script {
            let old_sparse = sparse.update_point(p, *value, refs(references));
            let old_dense = dense.update_point(p, *value, refs(references));
            assert_eq!(old_sparse.value, old_dense.value);
            assert_eq!(old_sparse.iterations, old_dense.iterations);
        }

        assert_eq!(sparse.known_points(), dense.known_points());
        for p in sparse.known_points() {
            let s = sparse.lookup(&p).unwrap();
            let d = dense.lookup(&p).unwrap();
            assert_eq!(s.value, d.value);
            assert_eq!(s.references, d.references);
            assert_eq!(s.referrers, d.referrers);
            assert_eq!(s.iterations, d.iterations);
        }
    }

    #[test]
    #[should_panic(expected = "dense node bound")]
    fn dense_bound_is_enforced() {
        let mut graph: DenseGraph<u32, u32> = DenseGraph::new(NodeId(1));
        graph.update_point(&point(2, 0), 1, OrdSet::new());
    }
}
