//! Stock filter predicates over selected columns.
//!
//! `gt`/`lt`/`eq` compare the predicate's view column-by-column against a
//! reference row and require every column to satisfy the comparison. A
//! bare scalar compares a single-column view; a tuple compares
//! position-wise.

/// Always true; handy for turning a unit into a plain forwarder or sink.
pub fn tautology<T>() -> impl Fn(&T) -> bool + Clone {
    |_| true
}

/// Column-wise comparison against a reference row.
pub trait RowCmp<R> {
    fn all_gt(&self, rhs: &R) -> bool;
    fn all_lt(&self, rhs: &R) -> bool;
    fn all_eq(&self, rhs: &R) -> bool;
}

macro_rules! impl_row_cmp_scalar {
    ($($t:ty),+ $(,)?) => {
        $(
            impl RowCmp<$t> for $t {
                fn all_gt(&self, rhs: &$t) -> bool {
                    self > rhs
                }
                fn all_lt(&self, rhs: &$t) -> bool {
                    self < rhs
                }
                fn all_eq(&self, rhs: &$t) -> bool {
                    self == rhs
                }
            }
        )+
    };
}

impl_row_cmp_scalar!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char, String,
    &'static str,
);

macro_rules! impl_row_cmp_tuple {
    ($( ($($S:ident, $R:ident, $i:tt);+) )+) => {
        $(
            impl<$($S: RowCmp<$R>, $R),+> RowCmp<($($R,)+)> for ($($S,)+) {
                fn all_gt(&self, rhs: &($($R,)+)) -> bool {
                    $(self.$i.all_gt(&rhs.$i))&&+
                }
                fn all_lt(&self, rhs: &($($R,)+)) -> bool {
                    $(self.$i.all_lt(&rhs.$i))&&+
                }
                fn all_eq(&self, rhs: &($($R,)+)) -> bool {
                    $(self.$i.all_eq(&rhs.$i))&&+
                }
            }
        )+
    };
}

impl_row_cmp_tuple! {
    (A, U, 0)
    (A, U, 0; B, V, 1)
    (A, U, 0; B, V, 1; C, W, 2)
    (A, U, 0; B, V, 1; C, W, 2; D, X, 3)
}

/// Every viewed column strictly greater than the reference.
pub fn gt<S, R>(rhs: R) -> impl Fn(&S) -> bool + Clone
where
    S: RowCmp<R>,
    R: Clone,
{
    move |s| s.all_gt(&rhs)
}

/// Every viewed column strictly less than the reference.
pub fn lt<S, R>(rhs: R) -> impl Fn(&S) -> bool + Clone
where
    S: RowCmp<R>,
    R: Clone,
{
    move |s| s.all_lt(&rhs)
}

/// Every viewed column equal to the reference.
pub fn eq<S, R>(rhs: R) -> impl Fn(&S) -> bool + Clone
where
    S: RowCmp<R>,
    R: Clone,
{
    move |s| s.all_eq(&rhs)
}

/// Both predicates hold.
pub fn p_and<T, A, B>(a: A, b: B) -> impl Fn(&T) -> bool + Clone
where
    A: Fn(&T) -> bool + Clone,
    B: Fn(&T) -> bool + Clone,
{
    move |t| a(t) && b(t)
}

/// Either predicate holds.
pub fn p_or<T, A, B>(a: A, b: B) -> impl Fn(&T) -> bool + Clone
where
    A: Fn(&T) -> bool + Clone,
    B: Fn(&T) -> bool + Clone,
{
    move |t| a(t) || b(t)
}

/// The predicate does not hold.
pub fn p_not<T, A>(a: A) -> impl Fn(&T) -> bool + Clone
where
    A: Fn(&T) -> bool + Clone,
{
    move |t| !a(t)
}
