// The shipped example configuration must parse and agree with the scenario
// registry, so a fresh checkout runs every benchmark out of the box.
use nats_jetstream_bench::config::Config;
use nats_jetstream_bench::runner::REGISTRY;

const EXAMPLE: &str = include_str!("../conf.d/config.yml");

#[test]
fn example_config_parses() {
    let config = Config::from_yaml(EXAMPLE).expect("parse example config");
    assert_eq!(config.jetstream.servers, ["nats://127.0.0.1:4222"]);
    assert_eq!(config.core.servers, ["nats://127.0.0.1:4222"]);
    assert!(config.testers.jetstream_publish_tester.is_some());
    assert!(config.testers.nats_latency_tester.is_some());
}

#[test]
fn example_enabled_keys_all_resolve_in_the_registry() {
    let config = Config::from_yaml(EXAMPLE).expect("parse example config");
    for key in &config.enabled_testers {
        assert!(
            REGISTRY.iter().any(|spec| spec.key == key),
            "enabled key {key} is not a registered scenario"
        );
    }
}

#[test]
fn every_registered_scenario_is_enabled_in_the_example() {
    let config = Config::from_yaml(EXAMPLE).expect("parse example config");
    for spec in REGISTRY {
        assert!(
            config.enabled_testers.iter().any(|key| key == spec.key),
            "registered scenario {} missing from the example enable list",
            spec.key
        );
    }
}

#[test]
fn config_loads_from_a_disk_path() {
    let path = std::env::temp_dir().join(format!("nats-bench-config-{}.yml", std::process::id()));
    std::fs::write(&path, EXAMPLE).expect("write temp config");
    let config = Config::from_path(&path).expect("load config from disk");
    std::fs::remove_file(&path).ok();
    assert_eq!(config.enabled_testers.len(), REGISTRY.len());
}

#[test]
fn missing_config_file_error_names_the_path() {
    let path = std::path::Path::new("/nonexistent/nats-bench/config.yml");
    let err = Config::from_path(path).expect_err("no such file");
    assert!(format!("{err:#}").contains("/nonexistent/nats-bench/config.yml"));
}
