//! A worklist fixed-point solver for monotone data-flow problems over user-defined lattices.
//!
//! Clients register one transfer function per node in a [`problem::DataFlowProblem`]; the
//! solver iterates them to a mutual fixed point, discovering dependencies on the fly as the
//! transfer functions call [`problem::TransferCtx::depend_on`]. Scheduling is priority
//! driven (highest node id first), cycles are broken with an optimistic bound, and problems
//! whose value type lacks the ascending-chain condition can be forced to terminate with a
//! per-point iteration budget and a client-supplied widening.

pub mod graph;
pub mod lattice;
pub mod problem;
pub mod solver;

pub use graph::{DenseGraph, DepGraph, Density, PointInfo, SparseGraph};
pub use lattice::{BoundedSemilattice, Dual, Greatest};
pub use problem::{
    always_detector, neq_detector, ChangeDetector, DataFlowProblem, NodeId, Point, TransferCtx,
    TransferFn,
};
pub use solver::{
    solve_problem, solve_problem_traced, Hidden, IterationBound, RecordTrace, SolveTracer,
    WideningFn,
};
