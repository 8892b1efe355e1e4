use anyhow::Result;
use rowflow::helpers::{explode_ar, merge_ar};
use rowflow::row::{Concat, Emit, Ix, Select, Without};
use rowflow::testing::*;
use rowflow::*;

fn emitted<K: Emit>(k: K) -> Vec<K::Row> {
    let mut rows = Vec::new();
    k.emit(&mut |r| rows.push(r));
    rows
}

#[test]
fn select_picks_and_reorders() {
    let row = (1i32, 'c', 2.5f64);
    let x: i32 = Select::<Ix<1>>::select(&row);
    assert_eq!(x, 1);
    let picked: (f64, i32) = Select::<(Ix<3>, Ix<1>)>::select(&row);
    assert_eq!(picked, (2.5, 1));
    let dup: (char, char) = Select::<(Ix<2>, Ix<2>)>::select(&row);
    assert_eq!(dup, ('c', 'c'));
}

#[test]
fn without_drops_and_preserves_order() {
    let row = (1i32, 'c', 2.5f64, "s");
    let rest: (i32, f64, &str) = Without::<Ix<2>>::without(&row);
    assert_eq!(rest, (1, 2.5, "s"));
    let rest: (char, &str) = Without::<(Ix<1>, Ix<3>)>::without(&row);
    assert_eq!(rest, ('c', "s"));
}

#[test]
fn concat_appends_columns() {
    assert_eq!((1, 'a').concat((2.5,)), (1, 'a', 2.5));
    assert_eq!(().concat((1, 2)), (1, 2));
    assert_eq!((1,).concat(()), (1,));
}

#[test]
fn kernel_return_convention() {
    assert_eq!(emitted(7i32), vec![(7,)]);
    assert_eq!(emitted((7, 'x')), vec![(7, 'x')]);
    assert_eq!(emitted(vec![1, 2]), vec![(1,), (2,)]);
    assert_eq!(emitted(vec![(1, 'a'), (2, 'b')]), vec![(1, 'a'), (2, 'b')]);
    // A tuple-wrapped vector is one row with a vector column.
    assert_eq!(emitted((vec![1, 2],)), vec![(vec![1, 2],)]);
    assert_eq!(emitted(Some(3)), vec![(3,)]);
    assert_eq!(emitted(Option::<i32>::None), vec![]);
    assert!(emitted(()).is_empty());
}

#[test]
fn array_column_duals() {
    assert_eq!(merge_ar((1, 2, 3)), [1, 2, 3]);
    assert_eq!(merge_ar(([1, 2], 3)), [1, 2, 3]);
    assert_eq!(explode_ar([1, 2]), (1, 2));
    assert_eq!(explode_ar(merge_ar((5, 6))), (5, 6));
}

#[test]
fn explode_serial_number_and_merge_in_a_flow() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let out = rise(&p, from_mem(vec![[1, 2], [3, 4]]))
        .transform::<Ix<1>, _, _>(explode_ar)
        .serial_number(1)
        .transform::<(Ix<1>, Ix<2>), _, _>(merge_ar)
        .get(&env)?;
    assert_collections_equal(&out, &[(1i64, [1, 2]), (2, [3, 4])]);
    Ok(())
}

#[test]
fn predicate_combinators() {
    use rowflow::helpers::{eq, gt, lt, p_and, p_not, p_or};
    let in_range = p_and(gt(2), lt(8));
    assert!(in_range(&5));
    assert!(!in_range(&9));
    let edge = p_or(eq(2), p_not(lt(8)));
    assert!(edge(&2));
    assert!(edge(&8));
    assert!(!edge(&5));
    assert!(eq(('a', 1)).clone()(&('a', 1)));
    assert!(!eq(('a', 1))(&('a', 2)));
}
