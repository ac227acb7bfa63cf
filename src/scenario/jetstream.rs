// Log-based delivery model scenarios: durable streams with explicit
// create/delete/purge management and acknowledged publishes.
use crate::config::{BrokerConnection, PullWorkload, PurgeWorkload, StreamLatencyWorkload, StreamWorkload};
use crate::connect::{self, recreate_stream};
use crate::latch::CountdownLatch;
use crate::measure::{filler_payload, report_latency, report_rate, timestamp_payload, LatencyRecorder};
use crate::scenario::{BenchmarkSpec, SubscribeStyle};
use anyhow::{anyhow, bail, Context, Result};
use async_nats::jetstream::consumer::{pull, push, PullConsumer};
use async_nats::jetstream::{self, stream};
use bytes::Bytes;
use futures::StreamExt;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

// Buffer depth for the channel-style drain; deliveries beyond this back-pressure
// the forwarding task, not the broker.
const CHAN_SUBSCRIBE_DEPTH: usize = 10_000;

pub async fn publish(
    conn: &BrokerConnection,
    spec: &BenchmarkSpec,
    conf: &StreamWorkload,
    rng: &mut StdRng,
) -> Result<()> {
    let (_client, js) = connect::jetstream(conn, spec.key).await?;
    println!(
        "stream: {}, subject: {}, times: {}, message sizes: {:?}",
        conf.stream, conf.subject, conf.times, conf.message_sizes
    );
    for &size in &conf.message_sizes {
        recreate_stream(&js, bench_stream_config(&conf.stream, &conf.subject)).await?;
        measure_publish(&js, &conf.subject, conf.times, size, rng).await?;
    }
    Ok(())
}

pub async fn async_publish(
    conn: &BrokerConnection,
    spec: &BenchmarkSpec,
    conf: &StreamWorkload,
    rng: &mut StdRng,
) -> Result<()> {
    let (_client, js) = connect::jetstream(conn, spec.key).await?;
    println!(
        "stream: {}, subject: {}, times: {}, message sizes: {:?}",
        conf.stream, conf.subject, conf.times, conf.message_sizes
    );
    for &size in &conf.message_sizes {
        recreate_stream(&js, bench_stream_config(&conf.stream, &conf.subject)).await?;
        println!("\nmeasuring publish (async): {} messages, {size} byte payload", conf.times);
        let payload = filler_payload(rng, size);
        let started = Instant::now();
        let mut acks = Vec::with_capacity(conf.times);
        for _ in 0..conf.times {
            acks.push(
                js.publish(conf.subject.clone(), payload.clone())
                    .await
                    .with_context(|| format!("publish to {}", conf.subject))?,
            );
        }
        // Every in-flight publish must be acknowledged before the clock stops.
        for ack in acks {
            ack.await
                .with_context(|| format!("publish ack on {}", conf.subject))?;
        }
        report_rate("publish (async)", conf.times, size, started.elapsed());
    }
    Ok(())
}

pub async fn subscribe(
    conn: &BrokerConnection,
    spec: &BenchmarkSpec,
    conf: &StreamWorkload,
    style: SubscribeStyle,
    rng: &mut StdRng,
) -> Result<()> {
    let (client, js) = connect::jetstream(conn, spec.key).await?;
    println!(
        "stream: {}, subject: {}, times: {}, message sizes: {:?}",
        conf.stream, conf.subject, conf.times, conf.message_sizes
    );
    for &size in &conf.message_sizes {
        let stream = recreate_stream(&js, bench_stream_config(&conf.stream, &conf.subject)).await?;
        let payload = filler_payload(rng, size);
        publish_batch(&js, &conf.subject, conf.times, &payload).await?;
        match style {
            SubscribeStyle::Callback => {
                measure_push_subscribe(&client, &stream, conf.times, size).await?
            }
            SubscribeStyle::Channel => {
                measure_chan_subscribe(&client, &stream, conf.times, size).await?
            }
        }
    }
    Ok(())
}

pub async fn pull_subscribe(
    conn: &BrokerConnection,
    spec: &BenchmarkSpec,
    conf: &PullWorkload,
    rng: &mut StdRng,
) -> Result<()> {
    let (_client, js) = connect::jetstream(conn, spec.key).await?;
    println!(
        "stream: {}, subject: {}, times: {}, message sizes: {:?}, fetch counts: {:?}",
        conf.stream, conf.subject, conf.times, conf.message_sizes, conf.fetch_counts
    );
    for &size in &conf.message_sizes {
        for &fetch_count in &conf.fetch_counts {
            let stream =
                recreate_stream(&js, bench_stream_config(&conf.stream, &conf.subject)).await?;
            let payload = filler_payload(rng, size);
            publish_batch(&js, &conf.subject, conf.times, &payload).await?;
            measure_pull_subscribe(&stream, conf.times, size, fetch_count).await?;
        }
    }
    Ok(())
}

pub async fn latency(
    conn: &BrokerConnection,
    spec: &BenchmarkSpec,
    conf: &StreamLatencyWorkload,
) -> Result<()> {
    let (client, js) = connect::jetstream(conn, spec.key).await?;
    println!(
        "stream: {}, subject: {}, times: {}",
        conf.stream, conf.subject, conf.times
    );
    let stream = recreate_stream(&js, bench_stream_config(&conf.stream, &conf.subject)).await?;

    println!("\nmeasuring round-trip latency: {} messages", conf.times);
    let times = conf.times;
    let recorder = LatencyRecorder::new(times);
    let mut messages = push_message_stream(&client, &stream).await?;
    let drain = tokio::spawn({
        let recorder = Arc::clone(&recorder);
        async move {
            let mut seen = 0usize;
            while seen < times {
                match messages.next().await {
                    Some(Ok(message)) => {
                        recorder.record(&message.payload).await;
                        seen += 1;
                    }
                    Some(Err(err)) => tracing::warn!(error = %err, "push consumer delivery error"),
                    None => break,
                }
            }
        }
    });

    for _ in 0..times {
        js.publish(conf.subject.clone(), timestamp_payload())
            .await
            .with_context(|| format!("publish to {}", conf.subject))?
            .await
            .with_context(|| format!("publish ack on {}", conf.subject))?;
    }

    let samples = recorder.wait().await;
    let _ = drain.await;
    report_latency(times, &samples);
    Ok(())
}

pub async fn purge_stream(
    conn: &BrokerConnection,
    spec: &BenchmarkSpec,
    conf: &PurgeWorkload,
    rng: &mut StdRng,
) -> Result<()> {
    let (_client, js) = connect::jetstream(conn, spec.key).await?;
    println!(
        "stream: {}, subject: {}, counts: {:?}, message sizes: {:?}",
        conf.stream, conf.subject, conf.counts, conf.message_sizes
    );
    for &size in &conf.message_sizes {
        for &count in &conf.counts {
            println!("\nmeasuring purge: {count} messages, {size} byte payload");
            let stream =
                recreate_stream(&js, bench_stream_config(&conf.stream, &conf.subject)).await?;
            let payload = filler_payload(rng, size);
            publish_batch(&js, &conf.subject, count, &payload).await?;

            // Only the purge call itself is timed; filling the stream is setup.
            let started = Instant::now();
            let response = stream
                .purge()
                .await
                .with_context(|| format!("purge stream {}", conf.stream))?;
            report_rate("purge", count, size, started.elapsed());
            println!("broker reported {} messages purged", response.purged);
        }
    }
    Ok(())
}

pub async fn storage_comparison(
    conn: &BrokerConnection,
    spec: &BenchmarkSpec,
    conf: &StreamWorkload,
    rng: &mut StdRng,
) -> Result<()> {
    let (client, js) = connect::jetstream(conn, spec.key).await?;
    println!(
        "stream: {}, subject: {}, times: {}, message sizes: {:?}",
        conf.stream, conf.subject, conf.times, conf.message_sizes
    );
    for &size in &conf.message_sizes {
        for (label, storage) in [
            ("memory storage", stream::StorageType::Memory),
            ("file storage", stream::StorageType::File),
        ] {
            println!("\n-------- {label} --------");
            let stream_config = stream::Config {
                storage,
                ..bench_stream_config(&conf.stream, &conf.subject)
            };
            let stream = recreate_stream(&js, stream_config).await?;
            // The publish measurement fills the stream; the subscribe
            // measurement reads those same messages back.
            measure_publish(&js, &conf.subject, conf.times, size, rng).await?;
            measure_push_subscribe(&client, &stream, conf.times, size).await?;
        }
    }
    Ok(())
}

fn bench_stream_config(name: &str, subject: &str) -> stream::Config {
    stream::Config {
        name: name.to_string(),
        subjects: vec![subject.to_string().into()],
        ..Default::default()
    }
}

pub(crate) async fn publish_batch(
    js: &jetstream::Context,
    subject: &str,
    count: usize,
    payload: &Bytes,
) -> Result<()> {
    for _ in 0..count {
        js.publish(subject.to_string(), payload.clone())
            .await
            .with_context(|| format!("publish to {subject}"))?
            .await
            .with_context(|| format!("publish ack on {subject}"))?;
    }
    Ok(())
}

async fn measure_publish(
    js: &jetstream::Context,
    subject: &str,
    count: usize,
    size: usize,
    rng: &mut StdRng,
) -> Result<()> {
    println!("\nmeasuring publish: {count} messages, {size} byte payload");
    let payload = filler_payload(rng, size);
    let started = Instant::now();
    publish_batch(js, subject, count, &payload).await?;
    report_rate("publish", count, size, started.elapsed());
    Ok(())
}

// The clock starts before the consumer exists: consumer setup is part of the
// receive cost, mirroring how the publish measurements include setup.
async fn measure_push_subscribe(
    client: &async_nats::Client,
    stream: &stream::Stream,
    count: usize,
    size: usize,
) -> Result<()> {
    println!("\nmeasuring subscribe (push): {count} messages, {size} byte payload");
    let latch = Arc::new(CountdownLatch::new(count));
    let started = Instant::now();
    let mut messages = push_message_stream(client, stream).await?;
    let drain = tokio::spawn({
        let latch = Arc::clone(&latch);
        async move {
            let mut received = 0usize;
            while received < count {
                match messages.next().await {
                    Some(Ok(_)) => {
                        received += 1;
                        latch.count_down();
                    }
                    Some(Err(err)) => tracing::warn!(error = %err, "push consumer delivery error"),
                    None => break,
                }
            }
        }
    });
    latch.wait().await;
    report_rate("subscribe (push)", count, size, started.elapsed());
    let _ = drain.await;
    Ok(())
}

async fn measure_chan_subscribe(
    client: &async_nats::Client,
    stream: &stream::Stream,
    count: usize,
    size: usize,
) -> Result<()> {
    println!("\nmeasuring subscribe (channel): {count} messages, {size} byte payload");
    let started = Instant::now();
    let mut messages = push_message_stream(client, stream).await?;
    let (sender, mut receiver) = mpsc::channel::<Bytes>(CHAN_SUBSCRIBE_DEPTH);
    tokio::spawn(async move {
        while let Some(message) = messages.next().await {
            match message {
                Ok(message) => {
                    if sender.send(message.payload.clone()).await.is_err() {
                        break;
                    }
                }
                Err(err) => tracing::warn!(error = %err, "push consumer delivery error"),
            }
        }
    });
    let mut received = 0usize;
    while received < count {
        match receiver.recv().await {
            Some(_) => received += 1,
            None => bail!("message channel closed after {received} of {count} messages"),
        }
    }
    report_rate("subscribe (channel)", count, size, started.elapsed());
    Ok(())
}

async fn measure_pull_subscribe(
    stream: &stream::Stream,
    count: usize,
    size: usize,
    fetch_count: usize,
) -> Result<()> {
    println!(
        "\nmeasuring subscribe (pull): {count} messages, {size} byte payload, {fetch_count} per fetch"
    );
    let durable = format!("bench-pull-{fetch_count}");
    let started = Instant::now();
    let consumer: PullConsumer = stream
        .create_consumer(pull::Config {
            durable_name: Some(durable.clone()),
            ..Default::default()
        })
        .await
        .with_context(|| format!("create pull consumer {durable}"))?;
    let mut received = 0usize;
    while received < count {
        let mut batch = consumer
            .fetch()
            .max_messages(fetch_count)
            .messages()
            .await
            .with_context(|| format!("fetch batch from {durable}"))?;
        while let Some(message) = batch.next().await {
            let message = message.map_err(|err| anyhow!("pulled message error: {err}"))?;
            message
                .ack()
                .await
                .map_err(|err| anyhow!("ack pulled message: {err}"))?;
            received += 1;
            if received == count {
                break;
            }
        }
    }
    report_rate(
        &format!("subscribe (pull, {fetch_count} per fetch)"),
        count,
        size,
        started.elapsed(),
    );
    Ok(())
}

// Ordered push consumer delivering the stream from the start into an inbox.
async fn push_message_stream(
    client: &async_nats::Client,
    stream: &stream::Stream,
) -> Result<push::Ordered> {
    let consumer = stream
        .create_consumer(push::OrderedConfig {
            deliver_subject: client.new_inbox(),
            ..Default::default()
        })
        .await
        .context("create push consumer")?;
    consumer.messages().await.context("open push message stream")
}
