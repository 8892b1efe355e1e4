use anyhow::Result;
use ordered_float::NotNan;
use rowflow::helpers::{bi_fold, count, per_col2, pred_fold, sum};
use rowflow::testing::*;
use rowflow::*;

#[test]
fn batched_reduce_emits_one_row_per_key() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let input = vec![(2, 'c', 1.0f32), (2, 'a', 2.0), (4, 'a', 3.0), (4, 'c', 4.0)];
    let out = rise(&p, from_mem(input))
        .reduce::<Ix<1>, _, _>(count(), 0i64)
        .get(&env)?;
    assert_collections_unordered_equal(&out, &[(2, 2i64), (4, 2i64)]);
    Ok(())
}

#[test]
fn ordered_reduce_flushes_on_key_change() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let input = vec![("k1", 1), ("k1", 2), ("k2", 3), ("k1", 4)];
    let out = rise(&p, from_mem(input))
        .reduce::<Ix<1>, _, _>(sum(), (0i32,))
        .ordered()
        .get(&env)?;
    // The second k1 group starts from a fresh accumulator.
    assert_collections_equal(&out, &[("k1", 3), ("k2", 3), ("k1", 4)]);
    Ok(())
}

#[test]
fn scan_emits_one_row_per_input() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let out = rise(&p, from_mem(vec![1, 2, 3]))
        .reduce_cols::<(), Ix<1>, _, _>(bi_fold(|a: i32, b: i32| a + b), 0i32)
        .scan()
        .get(&env)?;
    assert_collections_equal(&out, &[(1,), (3,), (6,)]);
    Ok(())
}

#[test]
fn reduce_with_explicit_value_columns() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let input = vec![(2, 'c', 1.0f32), (2, 'a', 2.0), (4, 'a', 3.0)];
    let out = rise(&p, from_mem(input))
        .reduce_cols::<Ix<2>, (Ix<3>, Ix<3>), _, _>(
            |acc: &mut Vec<f32>, _k: &char, v: &(f32, f32)| {
                acc.push(v.0);
                acc.push(v.1);
            },
            Vec::new(),
        )
        .get(&env)?;
    assert_collections_unordered_equal(
        &out,
        &[('c', vec![1.0f32, 1.0]), ('a', vec![2.0, 2.0, 3.0, 3.0])],
    );
    Ok(())
}

#[test]
fn reduce_all_collects_values_per_key() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let input = vec![(2, 'c', 1.0f64), (2, 'a', 2.0), (4, 'a', 3.0), (4, 'c', 4.0)];
    let out = rise(&p, from_mem(input))
        .reduce_all_cols::<Ix<1>, Ix<3>, _, _>(|_k: &i32, vs: &[f64]| (vs.to_vec(),))
        .get(&env)?;
    assert_collections_unordered_equal(&out, &[(2, vec![1.0, 2.0]), (4, vec![3.0, 4.0])]);
    Ok(())
}

#[test]
fn ordered_reduce_all_flushes_per_group() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let input = vec![('a', 1), ('a', 2), ('b', 3), ('a', 4)];
    let out = rise(&p, from_mem(input))
        .reduce_all::<Ix<1>, _, _>(|_k: &char, vs: &[(i32,)]| (vs.len() as i64,))
        .ordered()
        .get(&env)?;
    assert_collections_equal(&out, &[('a', 2i64), ('b', 1), ('a', 1)]);
    Ok(())
}

#[test]
fn kernel_wrappers_compose() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let input = vec![('a', 3, 10.0f64), ('a', 7, 2.5), ('b', 5, 1.0)];
    let out = rise(&p, from_mem(input))
        .reduce::<Ix<1>, _, _>(
            per_col2(pred_fold(|v: &i32, acc: &i32| v > acc), sum()),
            (i32::MIN, 0.0f64),
        )
        .get(&env)?;
    assert_collections_unordered_equal(&out, &[('a', 7, 12.5), ('b', 5, 1.0)]);
    Ok(())
}

#[test]
fn float_keys_reduce_via_not_nan() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let k = |v: f64| NotNan::new(v).expect("finite key");
    let input = vec![(k(1.5), 1), (k(1.5), 2), (k(2.5), 3)];
    let out = rise(&p, from_mem(input))
        .reduce::<(Ix<1>,), _, _>(sum(), (0i32,))
        .get(&env)?;
    assert_collections_unordered_equal(&out, &[(k(1.5), 3), (k(2.5), 3)]);
    Ok(())
}

#[test]
fn chained_reduces_settle() -> Result<()> {
    // A reduce feeding a reduce: the second must see the first's flush.
    let env = Env::local();
    let p = Pipeline::default();
    let input = vec![(1, 'x'), (1, 'y'), (2, 'z')];
    let out = rise(&p, from_mem(input))
        .reduce::<Ix<1>, _, _>(count(), 0i64)
        .reduce_cols::<(), Ix<2>, _, _>(bi_fold(|a: i64, b: i64| a + b), 0i64)
        .get(&env)?;
    assert_collections_equal(&out, &[(3,)]);
    Ok(())
}

#[test]
fn scan_with_ordered_is_rejected_at_run() {
    let env = Env::local();
    let p = Pipeline::default();
    let s = rise(&p, from_mem(vec![(1, 2)]))
        .reduce::<Ix<1>, _, _>(count(), 0i64)
        .ordered()
        .scan();
    let err = s.run(&env).unwrap_err();
    assert!(err.to_string().contains("scan"));
}

#[test]
fn out_of_range_placement_is_rejected_at_run() {
    let env = Env::local();
    let p = Pipeline::default();
    let s = rise(&p, from_mem(vec![1])).filter(|_: &(i32,)| true).on_ranks(&[3]);
    assert!(s.run(&env).is_err());
}
