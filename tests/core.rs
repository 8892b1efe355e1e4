use anyhow::Result;
use rowflow::helpers::{gt, tautology};
use rowflow::testing::*;
use rowflow::*;

#[test]
fn pipe_map_filter_collects() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let out = rise(&p, from_mem(vec![1, 2, 3, 4, 5]))
        .map_to(|&(x,): &(i32,)| x * 2)
        .filter_cols::<Ix<1>, _>(gt(4))
        .get(&env)?;
    assert_collections_equal(&out, &[(6,), (8,), (10,)]);
    Ok(())
}

#[test]
fn diamond_zip_pairs_positionally() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let nums = rise(&p, from_mem(vec![4, 2, 1, 3, 5]));
    let half = nums.map_to(|&(x,): &(i32,)| x as f64 / 2.0);
    let twice = nums.map_to(|&(x,): &(i32,)| x as f64 * 2.0);
    let out = half.zip(&twice).get(&env)?;
    assert_collections_equal(
        &out,
        &[(2.0, 8.0), (1.0, 4.0), (0.5, 2.0), (1.5, 6.0), (2.5, 10.0)],
    );
    Ok(())
}

#[test]
fn zip_drops_the_longer_side_leftovers() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let a = rise(&p, from_mem(vec![1, 2, 3]));
    let b = rise(&p, from_mem(vec![10, 20]));
    let out = a.zip(&b).get(&env)?;
    assert_collections_equal(&out, &[(1, 10), (2, 20)]);
    Ok(())
}

#[test]
fn two_sources_into_one_sink() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let evens = rise(&p, from_mem(vec![10, 20])).build();
    let odds = rise(&p, from_mem(vec![30, 40])).build();
    let all = flow::<(i32,)>(&p).stream().filter(tautology()).build();
    let _ = &all << &evens;
    let _ = &all << &odds;
    let out = all.get(&env)?;
    assert_collections_unordered_equal(&out, &[(10,), (20,), (30,), (40,)]);
    Ok(())
}

#[test]
fn fifo_per_stream_is_preserved() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let input: Vec<i64> = (0..200).collect();
    let out = rise(&p, from_mem(input.clone()))
        .map_to(|&(x,): &(i64,)| x + 1)
        .get(&env)?;
    let expected: Vec<(i64,)> = input.iter().map(|&x| (x + 1,)).collect();
    assert_collections_equal(&out, &expected);
    Ok(())
}

#[test]
fn map_appends_result_columns() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let out = rise(&p, from_mem(vec![(2, 'c', 1.0f32)]))
        .map_cols::<(Ix<1>, Ix<2>), _, _>(|(n, c): (i32, char)| format!("{c}{n}"))
        .get(&env)?;
    assert_collections_equal(&out, &[(2, 'c', 1.0f32, "c2".to_string())]);
    Ok(())
}

#[test]
fn cols_reorders_and_drop_cols_removes() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let src = rise(&p, from_mem(vec![(1, 'a', 2.5f64)]));
    let picked = src.cols::<(Ix<3>, Ix<1>)>().get(&env)?;
    assert_collections_equal(&picked, &[(2.5, 1)]);
    let dropped = src.drop_cols::<Ix<2>>().get(&env)?;
    assert_collections_equal(&dropped, &[(1, 2.5)]);
    Ok(())
}

#[test]
fn vector_return_emits_multiple_rows() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let out = rise(&p, from_mem(vec![5]))
        .map_to(|&(x,): &(i32,)| vec![1, x])
        .get(&env)?;
    assert_collections_equal(&out, &[(1,), (5,)]);
    Ok(())
}

#[test]
fn wrapped_vector_return_is_one_row() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let out = rise(&p, from_mem(vec![5]))
        .map_to(|&(x,): &(i32,)| (vec![1, x],))
        .get(&env)?;
    assert_collections_equal(&out, &[(vec![1, 5],)]);
    Ok(())
}

#[test]
fn option_return_drops_rows() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let out = rise(&p, from_mem(vec![1, 2, 3, 4]))
        .map_to(|&(x,): &(i32,)| if x % 2 == 0 { Some(x) } else { None })
        .get(&env)?;
    assert_collections_equal(&out, &[(2,), (4,)]);
    Ok(())
}

#[test]
fn run_without_rise_is_a_noop() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let pivot = flow::<(char, i32)>(&p);
    pivot.run(&env)?;
    assert!(pivot.get(&env)?.is_empty());
    Ok(())
}

#[test]
fn rerun_replays_the_source() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let s = rise(&p, from_mem(vec![1, 2, 3])).map_to(|&(x,): &(i32,)| x * 10);
    let first = s.get(&env)?;
    let second = s.get(&env)?;
    assert_collections_equal(&first, &second);
    assert_collections_equal(&first, &[(10,), (20,), (30,)]);
    Ok(())
}

#[test]
fn buffered_source_feeds_the_next_run() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let src = from_mem(vec![1, 2]);
    let s = rise(&p, src.clone());
    assert_collections_equal(&s.get(&env)?, &[(1,), (2,)]);
    src.buffer(vec![3]);
    assert_collections_equal(&s.get(&env)?, &[(1,), (2,), (3,)]);
    Ok(())
}

#[test]
fn dump_writes_header_and_rows_to_a_file() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    let prefix = std::env::temp_dir()
        .join("rowflow-core-dump-")
        .to_string_lossy()
        .to_string();
    rise(&p, from_mem(vec![1, 2]))
        .dump(&prefix, "nums")
        .run(&env)?;
    let path = format!("{prefix}0.txt");
    let content = std::fs::read_to_string(&path)?;
    std::fs::remove_file(&path).ok();
    assert!(content.starts_with("nums\n"));
    assert!(content.contains("(1,)"));
    assert!(content.contains("(2,)"));
    Ok(())
}

#[test]
fn kernel_panic_aborts_the_run() {
    let env = Env::local();
    let p = Pipeline::default();
    let s = rise(&p, from_mem(vec![1])).map_to(|&(x,): &(i32,)| {
        if x == 1 {
            panic!("bad row");
        }
        x
    });
    let err = s.run(&env).unwrap_err();
    assert!(err.to_string().contains("kernel failed"));
}
