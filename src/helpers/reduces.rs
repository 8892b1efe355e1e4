//! Stock reduce kernels and kernel combinators.
//!
//! All of these produce plain closures matching the reduce contract
//! `Fn(&mut A, &Key, &Val)`, so they compose with user-written kernels.

/// Count rows per key. Pair with an `0i64` initial accumulator.
pub fn count<K, V>() -> impl Fn(&mut i64, &K, &V) + Clone {
    |acc, _k, _v| *acc += 1
}

/// Column-wise `+=` over a value row; what [`sum`] folds with.
pub trait RowAdd {
    fn add_row(&mut self, v: &Self);
}

macro_rules! impl_row_add_scalar {
    ($($t:ty),+ $(,)?) => {
        $(
            impl RowAdd for $t {
                fn add_row(&mut self, v: &Self) {
                    *self += *v;
                }
            }
        )+
    };
}

impl_row_add_scalar!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

macro_rules! impl_row_add_tuple {
    ($( ($($T:ident . $i:tt),+) )+) => {
        $(
            impl<$($T: RowAdd),+> RowAdd for ($($T,)+) {
                fn add_row(&mut self, v: &Self) {
                    $(self.$i.add_row(&v.$i);)+
                }
            }
        )+
    };
}

impl_row_add_tuple! {
    (A.0)
    (A.0, B.1)
    (A.0, B.1, C.2)
    (A.0, B.1, C.2, D.3)
}

/// Sum the value columns per key. The initial accumulator supplies the
/// zeros, e.g. `(0i32, 0.0f32)` for a two-column value row.
pub fn sum<K, V: RowAdd>() -> impl Fn(&mut V, &K, &V) + Clone {
    |acc, _k, v| acc.add_row(v)
}

/// Wrap a binary function into a reduce kernel: `acc = f(acc, v)`.
pub fn bi_fold<T, K, F>(f: F) -> impl Fn(&mut T, &K, &T) + Clone
where
    T: Clone,
    F: Fn(T, T) -> T + Clone,
{
    move |acc, _k, v| *acc = f(acc.clone(), v.clone())
}

/// Wrap a binary predicate into a keep-the-winner kernel: the value
/// replaces the accumulator whenever `p(value, acc)` holds. `p_gt`-style
/// predicates yield a running max, `lt` a running min.
pub fn pred_fold<T, K, P>(p: P) -> impl Fn(&mut T, &K, &T) + Clone
where
    T: Clone,
    P: Fn(&T, &T) -> bool + Clone,
{
    move |acc, _k, v| {
        if p(v, acc) {
            *acc = v.clone();
        }
    }
}

/// Apply one kernel per value column of a two-column value row.
pub fn per_col2<K, A1, A2, V1, V2, F1, F2>(
    f1: F1,
    f2: F2,
) -> impl Fn(&mut (A1, A2), &K, &(V1, V2)) + Clone
where
    F1: Fn(&mut A1, &K, &V1) + Clone,
    F2: Fn(&mut A2, &K, &V2) + Clone,
{
    move |acc, k, v| {
        f1(&mut acc.0, k, &v.0);
        f2(&mut acc.1, k, &v.1);
    }
}

/// Apply one kernel per value column of a three-column value row.
pub fn per_col3<K, A1, A2, A3, V1, V2, V3, F1, F2, F3>(
    f1: F1,
    f2: F2,
    f3: F3,
) -> impl Fn(&mut (A1, A2, A3), &K, &(V1, V2, V3)) + Clone
where
    F1: Fn(&mut A1, &K, &V1) + Clone,
    F2: Fn(&mut A2, &K, &V2) + Clone,
    F3: Fn(&mut A3, &K, &V3) + Clone,
{
    move |acc, k, v| {
        f1(&mut acc.0, k, &v.0);
        f2(&mut acc.1, k, &v.1);
        f3(&mut acc.2, k, &v.2);
    }
}

/// Apply the same kernel to every column of a homogeneous two-column row.
pub fn every_col2<K, A, V, F>(f: F) -> impl Fn(&mut (A, A), &K, &(V, V)) + Clone
where
    F: Fn(&mut A, &K, &V) + Clone,
{
    move |acc, k, v| {
        f(&mut acc.0, k, &v.0);
        f(&mut acc.1, k, &v.1);
    }
}

/// Apply the same kernel to every column of a homogeneous three-column row.
pub fn every_col3<K, A, V, F>(f: F) -> impl Fn(&mut (A, A, A), &K, &(V, V, V)) + Clone
where
    F: Fn(&mut A, &K, &V) + Clone,
{
    move |acc, k, v| {
        f(&mut acc.0, k, &v.0);
        f(&mut acc.1, k, &v.1);
        f(&mut acc.2, k, &v.2);
    }
}
