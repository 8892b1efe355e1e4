//! Column selection and removal by static 1-based index.

/// A 1-based column index, usable alone (`Ix<2>`) or inside an index-list
/// tuple (`(Ix<2>, Ix<1>)`).
///
/// A bare index selects the column *value*; an index-list tuple selects a
/// *row* of the picked columns in list order.
pub struct Ix<const N: usize>;

/// Pick columns out of a row by index.
///
/// `Select<Ix<2>>` on `(char, i32, f32)` yields `i32`;
/// `Select<(Ix<3>, Ix<1>)>` yields `(f32, char)`. Selecting `()` yields the
/// empty row, which reduces use as the "single global group" key.
pub trait Select<L> {
    /// The picked column (bare index) or row of picked columns (list).
    type Out;
    fn select(&self) -> Self::Out;
}

/// Remove columns from a row by index, preserving the relative order of
/// the remaining columns.
pub trait Without<L> {
    type Out;
    fn without(&self) -> Self::Out;
}

macro_rules! impl_select_one {
    (($($T:ident),+) ; $n:literal -> $O:ident . $i:tt) => {
        impl<$($T: Clone),+> Select<Ix<$n>> for ($($T,)+) {
            type Out = $O;
            fn select(&self) -> $O {
                self.$i.clone()
            }
        }
    };
}

macro_rules! impl_select_group {
    ($Ts:tt ; $n:literal -> $O:ident . $i:tt $(, $n2:literal -> $O2:ident . $i2:tt)*) => {
        impl_select_one!($Ts ; $n -> $O . $i);
        impl_select_group!($Ts ; $($n2 -> $O2 . $i2),*);
    };
    ($Ts:tt ; ) => {};
}

macro_rules! impl_select {
    ($( ($($T:ident),+): $($n:literal -> $O:ident . $i:tt),+ ; )+) => {
        $(
            impl_select_group!(($($T),+) ; $($n -> $O . $i),+);
        )+
    };
}

impl_select! {
    (A): 1 -> A.0 ;
    (A, B): 1 -> A.0, 2 -> B.1 ;
    (A, B, C): 1 -> A.0, 2 -> B.1, 3 -> C.2 ;
    (A, B, C, D): 1 -> A.0, 2 -> B.1, 3 -> C.2, 4 -> D.3 ;
    (A, B, C, D, E): 1 -> A.0, 2 -> B.1, 3 -> C.2, 4 -> D.3, 5 -> E.4 ;
    (A, B, C, D, E, F): 1 -> A.0, 2 -> B.1, 3 -> C.2, 4 -> D.3, 5 -> E.4, 6 -> F.5 ;
    (A, B, C, D, E, F, G): 1 -> A.0, 2 -> B.1, 3 -> C.2, 4 -> D.3, 5 -> E.4, 6 -> F.5, 7 -> G.6 ;
    (A, B, C, D, E, F, G, H): 1 -> A.0, 2 -> B.1, 3 -> C.2, 4 -> D.3, 5 -> E.4, 6 -> F.5, 7 -> G.6, 8 -> H.7 ;
}

// Empty selection: no key, one global group.
impl<T> Select<()> for T {
    type Out = ();
    fn select(&self) -> () {}
}

// Index lists compose out of single-index selections, so any order and
// any repetition a caller writes is honored.
impl<T, I1> Select<(I1,)> for T
where
    T: Select<I1>,
{
    type Out = (<T as Select<I1>>::Out,);
    fn select(&self) -> Self::Out {
        (Select::<I1>::select(self),)
    }
}

impl<T, I1, I2> Select<(I1, I2)> for T
where
    T: Select<I1> + Select<I2>,
{
    type Out = (<T as Select<I1>>::Out, <T as Select<I2>>::Out);
    fn select(&self) -> Self::Out {
        (Select::<I1>::select(self), Select::<I2>::select(self))
    }
}

impl<T, I1, I2, I3> Select<(I1, I2, I3)> for T
where
    T: Select<I1> + Select<I2> + Select<I3>,
{
    type Out = (
        <T as Select<I1>>::Out,
        <T as Select<I2>>::Out,
        <T as Select<I3>>::Out,
    );
    fn select(&self) -> Self::Out {
        (
            Select::<I1>::select(self),
            Select::<I2>::select(self),
            Select::<I3>::select(self),
        )
    }
}

impl<T, I1, I2, I3, I4> Select<(I1, I2, I3, I4)> for T
where
    T: Select<I1> + Select<I2> + Select<I3> + Select<I4>,
{
    type Out = (
        <T as Select<I1>>::Out,
        <T as Select<I2>>::Out,
        <T as Select<I3>>::Out,
        <T as Select<I4>>::Out,
    );
    fn select(&self) -> Self::Out {
        (
            Select::<I1>::select(self),
            Select::<I2>::select(self),
            Select::<I3>::select(self),
            Select::<I4>::select(self),
        )
    }
}

macro_rules! impl_without {
    ($( ($($T:ident),+) - $L:ty => ($($O:ident . $i:tt),*) ; )+) => {
        $(
            impl<$($T: Clone),+> Without<$L> for ($($T,)+) {
                type Out = ($($O,)*);
                #[allow(clippy::unused_unit)]
                fn without(&self) -> Self::Out {
                    ($(self.$i.clone(),)*)
                }
            }
        )+
    };
}

impl_without! {
    (A) - Ix<1> => () ;

    (A, B) - Ix<1> => (B.1) ;
    (A, B) - Ix<2> => (A.0) ;
    (A, B) - (Ix<1>, Ix<2>) => () ;

    (A, B, C) - Ix<1> => (B.1, C.2) ;
    (A, B, C) - Ix<2> => (A.0, C.2) ;
    (A, B, C) - Ix<3> => (A.0, B.1) ;
    (A, B, C) - (Ix<1>, Ix<2>) => (C.2) ;
    (A, B, C) - (Ix<1>, Ix<3>) => (B.1) ;
    (A, B, C) - (Ix<2>, Ix<3>) => (A.0) ;
    (A, B, C) - (Ix<1>, Ix<2>, Ix<3>) => () ;

    (A, B, C, D) - Ix<1> => (B.1, C.2, D.3) ;
    (A, B, C, D) - Ix<2> => (A.0, C.2, D.3) ;
    (A, B, C, D) - Ix<3> => (A.0, B.1, D.3) ;
    (A, B, C, D) - Ix<4> => (A.0, B.1, C.2) ;
    (A, B, C, D) - (Ix<1>, Ix<2>) => (C.2, D.3) ;
    (A, B, C, D) - (Ix<1>, Ix<3>) => (B.1, D.3) ;
    (A, B, C, D) - (Ix<1>, Ix<4>) => (B.1, C.2) ;
    (A, B, C, D) - (Ix<2>, Ix<3>) => (A.0, D.3) ;
    (A, B, C, D) - (Ix<2>, Ix<4>) => (A.0, C.2) ;
    (A, B, C, D) - (Ix<3>, Ix<4>) => (A.0, B.1) ;
    (A, B, C, D) - (Ix<1>, Ix<2>, Ix<3>) => (D.3) ;
    (A, B, C, D) - (Ix<1>, Ix<2>, Ix<4>) => (C.2) ;
    (A, B, C, D) - (Ix<1>, Ix<3>, Ix<4>) => (B.1) ;
    (A, B, C, D) - (Ix<2>, Ix<3>, Ix<4>) => (A.0) ;
    (A, B, C, D) - (Ix<1>, Ix<2>, Ix<3>, Ix<4>) => () ;

    (A, B, C, D, E) - Ix<1> => (B.1, C.2, D.3, E.4) ;
    (A, B, C, D, E) - Ix<2> => (A.0, C.2, D.3, E.4) ;
    (A, B, C, D, E) - Ix<3> => (A.0, B.1, D.3, E.4) ;
    (A, B, C, D, E) - Ix<4> => (A.0, B.1, C.2, E.4) ;
    (A, B, C, D, E) - Ix<5> => (A.0, B.1, C.2, D.3) ;
    (A, B, C, D, E) - (Ix<1>, Ix<2>) => (C.2, D.3, E.4) ;
    (A, B, C, D, E) - (Ix<1>, Ix<3>) => (B.1, D.3, E.4) ;
    (A, B, C, D, E) - (Ix<1>, Ix<4>) => (B.1, C.2, E.4) ;
    (A, B, C, D, E) - (Ix<1>, Ix<5>) => (B.1, C.2, D.3) ;
    (A, B, C, D, E) - (Ix<2>, Ix<3>) => (A.0, D.3, E.4) ;
    (A, B, C, D, E) - (Ix<2>, Ix<4>) => (A.0, C.2, E.4) ;
    (A, B, C, D, E) - (Ix<2>, Ix<5>) => (A.0, C.2, D.3) ;
    (A, B, C, D, E) - (Ix<3>, Ix<4>) => (A.0, B.1, E.4) ;
    (A, B, C, D, E) - (Ix<3>, Ix<5>) => (A.0, B.1, D.3) ;
    (A, B, C, D, E) - (Ix<4>, Ix<5>) => (A.0, B.1, C.2) ;

    (A, B, C, D, E, F) - Ix<1> => (B.1, C.2, D.3, E.4, F.5) ;
    (A, B, C, D, E, F) - Ix<2> => (A.0, C.2, D.3, E.4, F.5) ;
    (A, B, C, D, E, F) - Ix<3> => (A.0, B.1, D.3, E.4, F.5) ;
    (A, B, C, D, E, F) - Ix<4> => (A.0, B.1, C.2, E.4, F.5) ;
    (A, B, C, D, E, F) - Ix<5> => (A.0, B.1, C.2, D.3, F.5) ;
    (A, B, C, D, E, F) - Ix<6> => (A.0, B.1, C.2, D.3, E.4) ;
}

// A one-element drop list behaves like the bare index.
impl<T, I> Without<(I,)> for T
where
    T: Without<I>,
{
    type Out = <T as Without<I>>::Out;
    fn without(&self) -> Self::Out {
        Without::<I>::without(self)
    }
}
