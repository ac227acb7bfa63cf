// Benchmark scenarios as data: a descriptor per scenario plus one generic
// runner per measurement style, instead of a hand-written type per scenario.
use crate::config::Config;
use anyhow::{Context, Result};
use rand::rngs::StdRng;

pub mod core;
pub mod jetstream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchmarkSpec {
    // Stable identifier used in the enabled_testers list.
    pub key: &'static str,
    // Human label used in banners and error traces.
    pub name: &'static str,
    pub kind: ScenarioKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioKind {
    JetStreamPublish,
    JetStreamAsyncPublish,
    JetStreamSubscribe(SubscribeStyle),
    JetStreamPullSubscribe,
    JetStreamLatency,
    JetStreamPurge,
    JetStreamStorageComparison,
    CorePublish,
    CoreSubscribe,
    CoreLatency,
}

// How received messages are taken off the client during a timed drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeStyle {
    // Spawned handler task signalling a countdown latch per message.
    Callback,
    // Deliveries forwarded into a bounded channel the measurement drains.
    Channel,
}

/// Resolve the scenario's typed configuration block and run it.
pub async fn run(config: &Config, spec: &BenchmarkSpec, rng: &mut StdRng) -> Result<()> {
    let testers = &config.testers;
    match spec.kind {
        ScenarioKind::JetStreamPublish => {
            let conf = required(&testers.jetstream_publish_tester, spec.key)?;
            jetstream::publish(&config.jetstream, spec, conf, rng).await
        }
        ScenarioKind::JetStreamAsyncPublish => {
            let conf = required(&testers.jetstream_async_publish_tester, spec.key)?;
            jetstream::async_publish(&config.jetstream, spec, conf, rng).await
        }
        ScenarioKind::JetStreamSubscribe(style) => {
            let block = match style {
                SubscribeStyle::Callback => &testers.jetstream_subscribe_tester,
                SubscribeStyle::Channel => &testers.jetstream_chan_subscribe_tester,
            };
            let conf = required(block, spec.key)?;
            jetstream::subscribe(&config.jetstream, spec, conf, style, rng).await
        }
        ScenarioKind::JetStreamPullSubscribe => {
            let conf = required(&testers.jetstream_pull_subscribe_tester, spec.key)?;
            jetstream::pull_subscribe(&config.jetstream, spec, conf, rng).await
        }
        ScenarioKind::JetStreamLatency => {
            let conf = required(&testers.jetstream_latency_tester, spec.key)?;
            jetstream::latency(&config.jetstream, spec, conf).await
        }
        ScenarioKind::JetStreamPurge => {
            let conf = required(&testers.jetstream_purge_stream_tester, spec.key)?;
            jetstream::purge_stream(&config.jetstream, spec, conf, rng).await
        }
        ScenarioKind::JetStreamStorageComparison => {
            let conf = required(&testers.jetstream_memory_storage_tester, spec.key)?;
            jetstream::storage_comparison(&config.jetstream, spec, conf, rng).await
        }
        ScenarioKind::CorePublish => {
            let conf = required(&testers.nats_publish_tester, spec.key)?;
            self::core::publish(&config.core, spec, conf, rng).await
        }
        ScenarioKind::CoreSubscribe => {
            let conf = required(&testers.nats_subscribe_tester, spec.key)?;
            self::core::subscribe(&config.core, spec, conf, rng).await
        }
        ScenarioKind::CoreLatency => {
            let conf = required(&testers.nats_latency_tester, spec.key)?;
            self::core::latency(&config.core, spec, conf, rng).await
        }
    }
}

fn required<'a, T>(block: &'a Option<T>, key: &str) -> Result<&'a T> {
    block
        .as_ref()
        .with_context(|| format!("tester {key} is enabled but has no configuration block"))
}
