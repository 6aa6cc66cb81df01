//! Benchmark for config parsing

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::path::Path;

fn bench_config_load_from_file(c: &mut Criterion) {
    let config_path = Path::new("fleetsync.example.toml");

    c.bench_function("config_parse_from_file", |b| {
        b.iter(|| {
            let config = fleetsync::config::FleetSyncConfig::load(Some(black_box(config_path)));
            black_box(config)
        });
    });
}

fn bench_config_load_defaults(c: &mut Criterion) {
    c.bench_function("config_parse_defaults_only", |b| {
        b.iter(|| {
            let config = fleetsync::config::FleetSyncConfig::load(None);
            black_box(config)
        });
    });
}

fn bench_config_toml_parsing(c: &mut Criterion) {
    let toml_content = r#"
[api]
base_url = "http://10.0.0.2:9000/api"
timeout_seconds = 15

[polling]
retry = "exponential"
max_backoff_ms = 30000

[[polling.widgets]]
name = "dashboard"
path = "/dashboard"
interval_ms = 30000

[[polling.widgets]]
name = "traffic_stats"
path = "/traffic-stats"
interval_ms = 60000
query = { days = "7" }

[[polling.widgets]]
name = "network_speed"
path = "/network-speed"
interval_ms = 2000

[history]
capacity = 120

[paging]
page_size = 50

[logging]
level = "debug"
format = "json"

[logging.component_levels]
polling = "trace"
push = "debug"
"#;

    c.bench_function("config_parse_complex_toml", |b| {
        b.iter(|| {
            let config: fleetsync::config::FleetSyncConfig =
                toml::from_str(black_box(toml_content)).unwrap();
            black_box(config)
        });
    });
}

criterion_group!(
    benches,
    bench_config_load_from_file,
    bench_config_load_defaults,
    bench_config_toml_parsing
);
criterion_main!(benches);
