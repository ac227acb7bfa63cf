// Ordered scenario registry and the fail-fast run loop.
use crate::config::Config;
use crate::scenario::{self, BenchmarkSpec, ScenarioKind, SubscribeStyle};
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

// Registry order is the catalogue order; the enabled_testers list decides
// what actually runs, and in what order.
pub const REGISTRY: &[BenchmarkSpec] = &[
    BenchmarkSpec {
        key: "jetstream_publish_tester",
        name: "JetStream publish",
        kind: ScenarioKind::JetStreamPublish,
    },
    BenchmarkSpec {
        key: "jetstream_async_publish_tester",
        name: "JetStream publish (async)",
        kind: ScenarioKind::JetStreamAsyncPublish,
    },
    BenchmarkSpec {
        key: "jetstream_subscribe_tester",
        name: "JetStream subscribe (push)",
        kind: ScenarioKind::JetStreamSubscribe(SubscribeStyle::Callback),
    },
    BenchmarkSpec {
        key: "jetstream_chan_subscribe_tester",
        name: "JetStream subscribe (channel)",
        kind: ScenarioKind::JetStreamSubscribe(SubscribeStyle::Channel),
    },
    BenchmarkSpec {
        key: "jetstream_pull_subscribe_tester",
        name: "JetStream subscribe (pull)",
        kind: ScenarioKind::JetStreamPullSubscribe,
    },
    BenchmarkSpec {
        key: "jetstream_latency_tester",
        name: "JetStream latency",
        kind: ScenarioKind::JetStreamLatency,
    },
    BenchmarkSpec {
        key: "jetstream_purge_stream_tester",
        name: "JetStream purge stream",
        kind: ScenarioKind::JetStreamPurge,
    },
    BenchmarkSpec {
        key: "jetstream_memory_storage_tester",
        name: "JetStream storage comparison",
        kind: ScenarioKind::JetStreamStorageComparison,
    },
    BenchmarkSpec {
        key: "nats_publish_tester",
        name: "core NATS publish",
        kind: ScenarioKind::CorePublish,
    },
    BenchmarkSpec {
        key: "nats_subscribe_tester",
        name: "core NATS subscribe",
        kind: ScenarioKind::CoreSubscribe,
    },
    BenchmarkSpec {
        key: "nats_latency_tester",
        name: "core NATS latency",
        kind: ScenarioKind::CoreLatency,
    },
];

/// Run every enabled scenario in the configured order, stopping at the first
/// failure.
pub async fn run_testers(config: &Config) -> Result<()> {
    let selected = select(REGISTRY, &config.enabled_testers);
    if selected.is_empty() {
        tracing::warn!("no testers enabled, nothing to run");
        return Ok(());
    }
    let mut runner = LiveRunner {
        config,
        rng: StdRng::from_entropy(),
    };
    run_sequence(&selected, &mut runner).await
}

/// Resolve enabled keys against the registry, preserving list order and
/// duplicates. Keys matching no registered scenario are skipped with a
/// diagnostic rather than silently ignored.
pub fn select<'a>(registry: &'a [BenchmarkSpec], enabled: &[String]) -> Vec<&'a BenchmarkSpec> {
    let mut selected = Vec::with_capacity(enabled.len());
    for key in enabled {
        match registry.iter().find(|spec| spec.key == key) {
            Some(spec) => selected.push(spec),
            None => {
                tracing::warn!(key = %key, "enabled tester matches no registered scenario, skipping")
            }
        }
    }
    selected
}

pub(crate) trait ScenarioRunner {
    async fn run(&mut self, spec: &BenchmarkSpec) -> Result<()>;
}

struct LiveRunner<'a> {
    config: &'a Config,
    rng: StdRng,
}

impl ScenarioRunner for LiveRunner<'_> {
    async fn run(&mut self, spec: &BenchmarkSpec) -> Result<()> {
        scenario::run(self.config, spec, &mut self.rng).await
    }
}

pub(crate) async fn run_sequence<R: ScenarioRunner>(
    specs: &[&BenchmarkSpec],
    runner: &mut R,
) -> Result<()> {
    for spec in specs {
        println!("======== start: {} ========\n", spec.name);
        runner
            .run(spec)
            .await
            .with_context(|| format!("tester {} ({}) failed", spec.key, spec.name))?;
        println!("\n======== end: {} ========\n", spec.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{run_sequence, select, ScenarioRunner, REGISTRY};
    use crate::scenario::{BenchmarkSpec, ScenarioKind};
    use anyhow::{anyhow, Result};
    use std::collections::HashSet;

    const FAKE: &[BenchmarkSpec] = &[
        BenchmarkSpec {
            key: "a",
            name: "scenario a",
            kind: ScenarioKind::CorePublish,
        },
        BenchmarkSpec {
            key: "b",
            name: "scenario b",
            kind: ScenarioKind::CoreSubscribe,
        },
    ];

    struct RecordingRunner {
        ran: Vec<&'static str>,
        fail_on: Option<&'static str>,
    }

    impl ScenarioRunner for RecordingRunner {
        async fn run(&mut self, spec: &BenchmarkSpec) -> Result<()> {
            self.ran.push(spec.key);
            if self.fail_on == Some(spec.key) {
                return Err(anyhow!("boom"));
            }
            Ok(())
        }
    }

    #[test]
    fn select_preserves_enabled_order_and_duplicates() {
        let enabled = vec!["b".to_string(), "a".to_string(), "b".to_string()];
        let keys: Vec<_> = select(FAKE, &enabled).iter().map(|spec| spec.key).collect();
        assert_eq!(keys, ["b", "a", "b"]);
    }

    #[test]
    fn select_skips_unknown_keys() {
        let enabled = vec!["missing".to_string(), "a".to_string()];
        let keys: Vec<_> = select(FAKE, &enabled).iter().map(|spec| spec.key).collect();
        assert_eq!(keys, ["a"]);
    }

    #[tokio::test]
    async fn run_sequence_visits_every_scenario_in_order() {
        let enabled = vec!["b".to_string(), "a".to_string(), "b".to_string()];
        let selected = select(FAKE, &enabled);
        let mut runner = RecordingRunner {
            ran: Vec::new(),
            fail_on: None,
        };
        run_sequence(&selected, &mut runner).await.expect("all pass");
        assert_eq!(runner.ran, ["b", "a", "b"]);
    }

    #[tokio::test]
    async fn run_sequence_fails_fast_and_names_the_scenario() {
        let enabled = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        let selected = select(FAKE, &enabled);
        let mut runner = RecordingRunner {
            ran: Vec::new(),
            fail_on: Some("b"),
        };
        let err = run_sequence(&selected, &mut runner)
            .await
            .expect_err("second scenario fails");
        let trace = format!("{err:#}");
        assert!(trace.contains("scenario b"), "trace was: {trace}");
        assert!(trace.contains("tester b"), "trace was: {trace}");
        // The third entry never starts.
        assert_eq!(runner.ran, ["a", "b"]);
    }

    #[test]
    fn registry_keys_are_unique() {
        let mut seen = HashSet::new();
        for spec in REGISTRY {
            assert!(seen.insert(spec.key), "duplicate key {}", spec.key);
        }
    }
}
