use lfq_core::{BackoffConfig, BenchConfig, EngineKind, ReportFormat, StorageKind};

#[test]
fn test_shipped_sample_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/bench.toml");
    let config = BenchConfig::load(path).unwrap();

    assert_eq!(config.operations, 5_000_000);
    assert_eq!(config.capacity, 1024);
    assert_eq!(
        config.engines,
        vec![EngineKind::Counted, EngineKind::CountedTwoPhase, EngineKind::Cursor]
    );
    assert_eq!(config.storage, StorageKind::HugeMmap);
    assert_eq!(config.report, ReportFormat::Json);
    assert_eq!(
        config.backoff,
        BackoffConfig::SpinYield { spin_limit: 64, yield_limit: 16, max_sleep_us: 1000 }
    );
    config.validate().unwrap();
}
