// Simple pub/sub delivery model scenarios: fire-and-forget subjects, no
// durable state to manage. Subscriptions are set up before publishing since
// nothing is retained for late subscribers.
use crate::config::{BrokerConnection, SubjectLatencyWorkload, SubjectWorkload};
use crate::connect;
use crate::measure::{filler_payload, report_latency, report_rate, timestamp_payload, LatencyRecorder};
use crate::scenario::BenchmarkSpec;
use anyhow::{bail, Context, Result};
use futures::StreamExt;
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::Arc;
use std::time::Instant;

pub async fn publish(
    conn: &BrokerConnection,
    spec: &BenchmarkSpec,
    conf: &SubjectWorkload,
    rng: &mut StdRng,
) -> Result<()> {
    let client = connect::client(conn, spec.key).await?;
    println!(
        "subject: {}, times: {}, message sizes: {:?}",
        conf.subject, conf.times, conf.message_sizes
    );
    for &size in &conf.message_sizes {
        println!("\nmeasuring publish: {} messages, {size} byte payload", conf.times);
        let payload = filler_payload(rng, size);
        let started = Instant::now();
        for _ in 0..conf.times {
            client
                .publish(conf.subject.clone(), payload.clone())
                .await
                .with_context(|| format!("publish to {}", conf.subject))?;
        }
        // Publishes buffer client-side; the clock must not stop before flush.
        client.flush().await.context("flush published messages")?;
        report_rate("publish", conf.times, size, started.elapsed());
    }
    Ok(())
}

pub async fn subscribe(
    conn: &BrokerConnection,
    spec: &BenchmarkSpec,
    conf: &SubjectWorkload,
    rng: &mut StdRng,
) -> Result<()> {
    let client = connect::client(conn, spec.key).await?;
    println!(
        "subject: {}, times: {}, message sizes: {:?}",
        conf.subject, conf.times, conf.message_sizes
    );
    for &size in &conf.message_sizes {
        // Fresh suffix per run so earlier traffic cannot leak into the count.
        let subject = format!("{}.{}", conf.subject, rng.gen::<u32>());
        let mut subscriber = client
            .subscribe(subject.clone())
            .await
            .with_context(|| format!("subscribe to {subject}"))?;
        let payload = filler_payload(rng, size);
        for _ in 0..conf.times {
            client
                .publish(subject.clone(), payload.clone())
                .await
                .with_context(|| format!("publish to {subject}"))?;
        }
        client.flush().await.context("flush published messages")?;

        println!(
            "\nmeasuring subscribe (blocking): {} messages, {size} byte payload",
            conf.times
        );
        let started = Instant::now();
        let mut received = 0usize;
        while received < conf.times {
            match subscriber.next().await {
                Some(_) => received += 1,
                None => bail!(
                    "subscription to {subject} closed after {received} of {} messages",
                    conf.times
                ),
            }
        }
        report_rate("subscribe (blocking)", conf.times, size, started.elapsed());
        subscriber
            .unsubscribe()
            .await
            .with_context(|| format!("unsubscribe from {subject}"))?;
    }
    Ok(())
}

pub async fn latency(
    conn: &BrokerConnection,
    spec: &BenchmarkSpec,
    conf: &SubjectLatencyWorkload,
    rng: &mut StdRng,
) -> Result<()> {
    let client = connect::client(conn, spec.key).await?;
    println!("subject: {}, times: {}", conf.subject, conf.times);
    let subject = format!("{}.{}", conf.subject, rng.gen::<u32>());
    let times = conf.times;
    let recorder = LatencyRecorder::new(times);
    let mut subscriber = client
        .subscribe(subject.clone())
        .await
        .with_context(|| format!("subscribe to {subject}"))?;
    let drain = tokio::spawn({
        let recorder = Arc::clone(&recorder);
        async move {
            let mut seen = 0usize;
            while seen < times {
                match subscriber.next().await {
                    Some(message) => {
                        recorder.record(&message.payload).await;
                        seen += 1;
                    }
                    None => break,
                }
            }
        }
    });

    println!("\nmeasuring round-trip latency: {times} messages");
    for _ in 0..times {
        client
            .publish(subject.clone(), timestamp_payload())
            .await
            .with_context(|| format!("publish to {subject}"))?;
    }
    client.flush().await.context("flush published messages")?;

    let samples = recorder.wait().await;
    let _ = drain.await;
    report_latency(times, &samples);
    Ok(())
}
