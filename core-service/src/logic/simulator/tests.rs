use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::logic::storage::{MemoryStore, RecordStore};

fn config(sources: u32, interval: u64, duration: u64) -> SimulatorConfig {
    SimulatorConfig {
        sources,
        interval: Duration::from_secs(interval),
        duration: Some(Duration::from_secs(duration)),
        reset: false,
        image_dir: None,
    }
}

#[tokio::test(start_paused = true)]
async fn test_two_producers_tick_independently() {
    let store = Arc::new(MemoryStore::new());
    let generator = SourceGenerator::new(store.clone(), Arc::new(SyntheticImages::new(16)), config(2, 2, 10));

    let report = generator.run().await;

    for source_id in [0, 1] {
        let unit = report.unit(source_id).unwrap();
        assert!((4..=6).contains(&unit.inserted), "unit {} inserted {}", source_id, unit.inserted);
        assert_eq!(unit.failed, 0);
        assert_eq!(store.len(source_id), unit.inserted as usize);
    }
    assert!(report.elapsed >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_slow_unit_does_not_hold_back_others() {
    let store = Arc::new(MemoryStore::new());
    store.delay_inserts(1, Duration::from_millis(1500));

    let report = SourceGenerator::new(store.clone(), Arc::new(SyntheticImages::new(16)), config(2, 2, 10))
        .run()
        .await;

    let fast = report.unit(0).unwrap();
    assert!((4..=6).contains(&fast.inserted), "unit 0 inserted {}", fast.inserted);

    // Starts at 0s, 3.5s and 7s; by 10.5s the deadline has passed
    let slow = report.unit(1).unwrap();
    assert_eq!(slow.inserted, 3);
    assert_eq!(report.total_failed(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reset_truncates_before_first_insert() {
    let store = Arc::new(MemoryStore::new());
    for _ in 0..4 {
        store.insert(Record::new(0, vec![0xFF, 0xD8, 0xFF])).await.unwrap();
    }

    let mut cfg = config(1, 5, 10);
    cfg.reset = true;
    let report = SourceGenerator::new(store.clone(), Arc::new(SyntheticImages::default()), cfg)
        .run()
        .await;

    assert_eq!(report.total_inserted(), 2);
    assert_eq!(store.len(0), 2);
}

#[tokio::test(start_paused = true)]
async fn test_insert_failures_are_counted() {
    let store = Arc::new(MemoryStore::new());
    store.fail_source(1);

    let report = SourceGenerator::new(store.clone(), Arc::new(SyntheticImages::new(8)), config(2, 1, 3))
        .run()
        .await;

    assert_eq!(report.unit(0).map(|u| (u.inserted, u.failed)), Some((3, 0)));
    assert_eq!(report.unit(1).map(|u| (u.inserted, u.failed)), Some((0, 3)));
    assert_eq!(report.total_failed(), 3);
}
