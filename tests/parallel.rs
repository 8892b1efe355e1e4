use anyhow::Result;
use rowflow::helpers::{count, sum, tautology};
use rowflow::testing::*;
use rowflow::*;

#[test]
fn inprocess_count_then_global_sum_on_every_rank() -> Result<()> {
    let env = Env::threaded(2)?;
    let p = Pipeline::default();
    let input = vec![(2, 'c', 1.0f32), (2, 'a', 2.0), (4, 'a', 3.0), (4, 'c', 4.0)];
    let counts = rise(&p, from_mem(input).split())
        .reduce::<Ix<1>, _, _>(count(), 0i64)
        .inprocess()
        .reduce::<Ix<1>, _, _>(sum(), (0i64,))
        .on_fraction(1.0)
        .routing(Routing::DUPE | Routing::TASK);

    let per_rank = counts.get_per_rank(&env)?;
    assert_eq!(per_rank.len(), 2);
    for rows in &per_rank {
        assert_collections_unordered_equal(rows, &[(2, 2i64), (4, 2i64)]);
        let total: i64 = rows.iter().map(|r| r.1).sum();
        assert_eq!(total, 4);
    }
    Ok(())
}

#[test]
fn split_rise_shards_the_sequence() -> Result<()> {
    let env = Env::threaded(2)?;
    let p = Pipeline::default();
    let per_rank = rise(&p, from_mem(vec![1, 2, 3, 4]).split())
        .filter(tautology())
        .get_per_rank(&env)?;
    // Contiguous shards, nothing lost, nothing duplicated.
    assert_eq!(per_rank.len(), 2);
    let mut all: Vec<(i32,)> = per_rank.concat();
    all.sort();
    assert_collections_equal(&all, &[(1,), (2,), (3,), (4,)]);
    Ok(())
}

#[test]
fn unsplit_rise_replays_on_every_rank() -> Result<()> {
    let env = Env::threaded(2)?;
    let p = Pipeline::default();
    let per_rank = rise(&p, from_mem(vec![1, 2]))
        .filter(tautology())
        .get_per_rank(&env)?;
    for rows in &per_rank {
        assert_collections_unordered_equal(rows, &[(1,), (2,)]);
    }
    Ok(())
}

#[test]
fn dupe_broadcasts_to_all_ranks() -> Result<()> {
    let env = Env::threaded(3)?;
    let p = Pipeline::default();
    let per_rank = rise(&p, from_mem(vec![1, 2, 3]).split())
        .filter(tautology())
        .routing(Routing::DUPE)
        .get_per_rank(&env)?;
    assert_eq!(per_rank.len(), 3);
    for rows in &per_rank {
        assert_collections_unordered_equal(rows, &[(1,), (2,), (3,)]);
    }
    Ok(())
}

#[test]
fn restricted_placement_pulls_rows_across_ranks() -> Result<()> {
    let env = Env::threaded(2)?;
    let p = Pipeline::default();
    let per_rank = rise(&p, from_mem(vec![10, 20]))
        .filter(tautology())
        .on_ranks(&[1])
        .get_per_rank(&env)?;
    assert!(per_rank[0].is_empty());
    // Both ranks replay the unsplit source; every row funnels to rank 1.
    assert_collections_unordered_equal(&per_rank[1], &[(10,), (20,), (10,), (20,)]);
    Ok(())
}

#[test]
fn keyed_shuffle_groups_across_ranks() -> Result<()> {
    let env = Env::threaded(2)?;
    let p = Pipeline::default();
    let input: Vec<(i32, i32)> = (0..20).map(|i| (i % 4, 1)).collect();
    let rows = rise(&p, from_mem(input).split())
        .reduce::<Ix<1>, _, _>(sum(), (0i32,))
        .get_per_rank(&env)?
        .concat();
    // One row per key overall: the shuffle brought each key to one rank.
    assert_collections_unordered_equal(&rows, &[(0, 5), (1, 5), (2, 5), (3, 5)]);
    Ok(())
}

#[test]
fn threaded_rerun_resets_state() -> Result<()> {
    let env = Env::threaded(2)?;
    let p = Pipeline::default();
    let s = rise(&p, from_mem(vec![(1, 1), (1, 1), (2, 1)]).split())
        .reduce::<Ix<1>, _, _>(sum(), (0i32,));
    let first: Vec<(i32, i32)> = s.get_per_rank(&env)?.concat();
    let second: Vec<(i32, i32)> = s.get_per_rank(&env)?.concat();
    assert_collections_unordered_equal(&first, &second);
    assert_collections_unordered_equal(&first, &[(1, 2), (2, 1)]);
    Ok(())
}

#[test]
fn threaded_kernel_panic_aborts_the_group() {
    let env = Env::threaded(2).expect("env");
    let p = Pipeline::default();
    let s = rise(&p, from_mem(vec![1, 2]).split()).map_to(|&(x,): &(i32,)| {
        if x == 2 {
            panic!("poisoned row");
        }
        x
    });
    let err = s.run(&env).unwrap_err();
    assert!(err.to_string().contains("kernel failed"));
}
