use anyhow::Result;
use rowflow::helpers::{gt, lt};
use rowflow::testing::*;
use rowflow::*;

#[test]
fn cyclic_square_until_large() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();

    // A reusable squaring flow for the second column.
    let sqr = flow::<(char, i64)>(&p)
        .stream()
        .transform::<Ix<2>, _, _>(|x: i64| x * x)
        .build();

    // Running a flow with no rise upstream is a legal no-op.
    sqr.run(&env)?;

    // Returning the vector column flattens it into one row per element,
    // while the non-selected key column rides along.
    let input = vec![('a', vec![2i64]), ('b', vec![3, 4, 5])];
    let fed = rise(&p, from_mem(input))
        .transform::<Ix<2>, _, _>(|v: Vec<i64>| v)
        .pipe(&sqr);

    let big = fed.filter_cols::<Ix<2>, _>(gt(100i64));
    // Small values feed back into the squaring flow until they grow out.
    fed.filter_cols::<Ix<2>, _>(lt(100i64)).pipe(&sqr);

    let out = big.get(&env)?;
    assert_collections_unordered_equal(&out, &[('a', 256), ('b', 6561), ('b', 256), ('b', 625)]);
    Ok(())
}

#[test]
fn one_up_rewinds_the_cursor() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let chained = rise(&p, from_mem(vec![1]))
        .map(|&(x,): &(i32,)| x + 1)
        .filter(|_: &(i32, i32)| true);
    let out = chained
        .one_up::<(i32, i32)>()
        .map_to(|&(a, b): &(i32, i32)| a + b)
        .get(&env)?;
    assert_collections_equal(&out, &[(3,)]);
    Ok(())
}

#[test]
#[should_panic(expected = "one_up type mismatch")]
fn one_up_checks_the_row_type() {
    let p = Pipeline::default();
    let chained = rise(&p, from_mem(vec![1]))
        .map(|&(x,): &(i32,)| x + 1)
        .filter(|_: &(i32, i32)| true);
    let _ = chained.one_up::<(char,)>();
}

#[test]
fn tee_branches_and_continues() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let branch = flow::<(i32,)>(&p)
        .stream()
        .filter(|_: &(i32,)| true)
        .build();
    let main = rise(&p, from_mem(vec![1, 2]))
        .tee(&branch)
        .map_to(|&(x,): &(i32,)| x * 10);
    assert_collections_unordered_equal(&main.get(&env)?, &[(10,), (20,)]);
    assert_collections_unordered_equal(&branch.get(&env)?, &[(1,), (2,)]);
    Ok(())
}
