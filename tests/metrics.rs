#![cfg(feature = "metrics")]

use anyhow::Result;
use rowflow::metrics::MetricsCollector;
use rowflow::*;

#[test]
fn collector_counts_rows_and_time() -> Result<()> {
    let env = Env::local();
    let p = Pipeline::default();
    p.set_metrics(MetricsCollector::new());

    let s = rise(&p, from_mem(vec![1, 2, 3])).map_to(|&(x,): &(i32,)| x * 2);
    s.run(&env)?;

    let m = p.take_metrics().expect("collector attached");
    assert!(m.elapsed().is_some());
    let json = m.to_json();
    assert!(json["rows_per_unit"].as_object().is_some());
    Ok(())
}
