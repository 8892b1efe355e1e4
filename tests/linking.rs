use anyhow::Result;
use rowflow::helpers::tautology;
use rowflow::testing::*;
use rowflow::*;

#[test]
fn double_link_is_idempotent() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let src = rise(&p, from_mem(vec![1, 2])).build();
    let sink = flow::<(i32,)>(&p).stream().filter(tautology()).build();
    let _ = &sink << &src;
    let _ = &sink << &src;
    let out = sink.get(&env)?;
    assert_collections_unordered_equal(&out, &[(1,), (2,)]);
    Ok(())
}

#[test]
fn shl_and_shr_link_the_same_edge() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let src = rise(&p, from_mem(vec![7])).build();
    let sink = flow::<(i32,)>(&p).stream().filter(tautology()).build();
    let _ = &src >> &sink;
    let _ = &sink << &src;
    let out = sink.get(&env)?;
    assert_collections_equal(&out, &[(7,)]);
    Ok(())
}

#[test]
fn unlink_isolates_the_flow() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let src = rise(&p, from_mem(vec![1, 2])).build();
    let sink = flow::<(i32,)>(&p).stream().filter(tautology()).build();
    let _ = &sink << &src;
    assert_eq!(sink.get(&env)?.len(), 2);

    src.unlink();
    assert!(sink.get(&env)?.is_empty());

    // Relinking brings the stream back.
    let _ = &sink << &src;
    assert_eq!(sink.get(&env)?.len(), 2);
    Ok(())
}

#[test]
fn plus_composes_shared_endpoint_flows() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let nums = rise(&p, from_mem(vec![4, 2])).build();
    let half = flow::<(i32,)>(&p)
        .stream()
        .map_to(|&(x,): &(i32,)| x / 2)
        .build();
    let twice = flow::<(i32,)>(&p)
        .stream()
        .map_to(|&(x,): &(i32,)| x * 2)
        .build();

    let left = &nums >> &half;
    let right = &twice << &nums;
    let joined = &left + &right;

    let out = joined.get(&env)?;
    assert_collections_unordered_equal(&out, &[(2,), (1,), (8,), (4,)]);
    Ok(())
}

#[test]
fn union_flow_relays_both_ends() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let inc = flow::<(i32,)>(&p)
        .stream()
        .map_to(|&(x,): &(i32,)| x + 1)
        .build();
    let dec = flow::<(i32,)>(&p)
        .stream()
        .map_to(|&(x,): &(i32,)| x - 1)
        .build();
    let both = &inc + &dec;

    let src = rise(&p, from_mem(vec![10])).build();
    let _ = &both << &src;
    let out = both.get(&env)?;
    assert_collections_unordered_equal(&out, &[(11,), (9,)]);
    Ok(())
}
