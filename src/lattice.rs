use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Types for which you can take the join (i.e. least upper bound) of two elements, and which
/// have a least element.
///
/// `join_mut` must be commutative, associative and idempotent, with `least` as its identity.
/// The solver seeds undiscovered cycles with `least` and relies on these laws for the fixed
/// point it finds to be meaningful; it cannot check them.
pub trait BoundedSemilattice {
    /// Replace `self` with the join of `self` and `other`.
    fn join_mut(&mut self, other: &Self);

    /// The least element of the semilattice.
    fn least() -> Self;
}

/// Types with a greatest element, the target of [`crate::solver::IterationBound::abort_with_top`].
pub trait Greatest {
    fn greatest() -> Self;
}

macro_rules! impl_int_semilattice {
    ($($t:ty),*) => {$(
        impl BoundedSemilattice for $t {
            fn join_mut(&mut self, other: &Self) {
                *self = (*self).max(*other);
            }

            fn least() -> Self {
                <$t>::MIN
            }
        }

        impl Greatest for $t {
            fn greatest() -> Self {
                <$t>::MAX
            }
        }
    )*};
}

impl_int_semilattice!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

impl BoundedSemilattice for bool {
    fn join_mut(&mut self, other: &Self) {
        *self |= *other;
    }

    fn least() -> Self {
        false
    }
}

impl Greatest for bool {
    fn greatest() -> Self {
        true
    }
}

impl BoundedSemilattice for () {
    fn join_mut(&mut self, _other: &Self) {}

    fn least() -> Self {}
}

impl Greatest for () {
    fn greatest() -> Self {}
}

impl<T: Ord + Clone> BoundedSemilattice for BTreeSet<T> {
    fn join_mut(&mut self, other: &Self) {
        self.extend(other.iter().cloned());
    }

    fn least() -> Self {
        BTreeSet::new()
    }
}

/// Wrapper reversing the order of `T`.
///
/// Some domains carry more information in *smaller* values under the natural order of `T`
/// (an arity domain, say, where learning about more arguments shrinks the value). Rather
/// than writing a conflicting order for `T` itself, wrap the values: the join of `Dual`
/// values is the meet of the underlying ones, and the least `Dual` is `T`'s greatest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Dual<T>(pub T);

impl<T: Ord> PartialOrd for Dual<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Ord> Ord for Dual<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp(&self.0)
    }
}

impl<T: Ord + Clone + Greatest> BoundedSemilattice for Dual<T> {
    fn join_mut(&mut self, other: &Self) {
        if other.0 < self.0 {
            self.0 = other.0.clone();
        }
    }

    fn least() -> Self {
        Dual(T::greatest())
    }
}

impl<T: BoundedSemilattice> Greatest for Dual<T> {
    fn greatest() -> Self {
        Dual(T::least())
    }
}
