// Shared measurement helpers: filler payloads, throughput reporting, and
// round-trip latency aggregation.
use crate::latch::CountdownLatch;
use anyhow::{Context, Result};
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use rand::RngCore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Exactly `size` random bytes. Content is freshly drawn per call so transfer
/// cost reflects real payloads rather than something trivially compressible.
pub fn filler_payload(rng: &mut impl RngCore, size: usize) -> Bytes {
    let mut buf = vec![0u8; size];
    rng.fill_bytes(&mut buf);
    Bytes::from(buf)
}

/// Print the total and per-message elapsed time for a bulk operation.
pub fn report_rate(operation: &str, count: usize, message_size: usize, elapsed: Duration) {
    let average = if count == 0 {
        Duration::ZERO
    } else {
        elapsed / count as u32
    };
    println!(
        "{operation}: {count} messages in {elapsed:?} ({message_size} byte payloads, {average:?}/message)"
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyStats {
    pub average: Duration,
    pub max: Duration,
    pub min: Duration,
}

impl LatencyStats {
    /// Single pass over the samples. `min` is seeded from the first sample
    /// rather than zero, so a zero sentinel can never masquerade as the
    /// observed minimum.
    pub fn aggregate(samples: &[Duration]) -> Option<Self> {
        let (&first, rest) = samples.split_first()?;
        let mut total = first;
        let mut max = first;
        let mut min = first;
        for &sample in rest {
            total += sample;
            if sample > max {
                max = sample;
            }
            if sample < min {
                min = sample;
            }
        }
        Some(Self {
            average: total / samples.len() as u32,
            max,
            min,
        })
    }
}

pub fn report_latency(expected: usize, samples: &[Duration]) {
    if samples.len() != expected {
        tracing::warn!(
            expected,
            recorded = samples.len(),
            "some latency samples were dropped; statistics cover the recorded ones"
        );
    }
    match LatencyStats::aggregate(samples) {
        Some(stats) => println!(
            "average latency over {} messages: {:?} (max: {:?}, min: {:?})",
            samples.len(),
            stats.average,
            stats.max,
            stats.min
        ),
        None => println!("no latency samples recorded"),
    }
}

/// Wall-clock send time encoded as the message payload.
pub fn timestamp_payload() -> Bytes {
    Bytes::from(
        Utc::now()
            .to_rfc3339_opts(SecondsFormat::Nanos, true)
            .into_bytes(),
    )
}

/// Round-trip time for a message carrying a [`timestamp_payload`]. Clock skew
/// that would produce a negative duration clamps to zero.
pub fn elapsed_since_timestamp(payload: &[u8]) -> Result<Duration> {
    let text = std::str::from_utf8(payload).context("timestamp payload is not utf-8")?;
    let sent = DateTime::parse_from_rfc3339(text)
        .with_context(|| format!("parse timestamp payload {text:?}"))?;
    let elapsed = Utc::now().signed_duration_since(sent.with_timezone(&Utc));
    Ok(elapsed.to_std().unwrap_or(Duration::ZERO))
}

/// Collects one round-trip sample per delivered message and releases the
/// waiter once every expected message has been seen. A message whose payload
/// fails to parse still counts toward completion (the run must never hang) but
/// contributes no sample.
pub struct LatencyRecorder {
    samples: Mutex<Vec<Duration>>,
    latch: CountdownLatch,
}

impl LatencyRecorder {
    pub fn new(expected: usize) -> Arc<Self> {
        Arc::new(Self {
            samples: Mutex::new(Vec::with_capacity(expected)),
            latch: CountdownLatch::new(expected),
        })
    }

    pub async fn record(&self, payload: &[u8]) {
        match elapsed_since_timestamp(payload) {
            Ok(sample) => self.samples.lock().await.push(sample),
            Err(err) => tracing::warn!(error = %err, "dropping unparseable latency sample"),
        }
        self.latch.count_down();
    }

    /// Block until all expected messages were seen, then hand back the samples.
    pub async fn wait(&self) -> Vec<Duration> {
        self.latch.wait().await;
        self.samples.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        elapsed_since_timestamp, filler_payload, timestamp_payload, LatencyRecorder, LatencyStats,
    };
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;
    use tokio::time::timeout;

    fn secs(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|&v| Duration::from_secs(v)).collect()
    }

    #[test]
    fn aggregate_matches_hand_computed_values() {
        let stats = LatencyStats::aggregate(&secs(&[5, 1, 9, 3])).expect("non-empty");
        assert_eq!(stats.average, Duration::from_millis(4500));
        assert_eq!(stats.max, Duration::from_secs(9));
        assert_eq!(stats.min, Duration::from_secs(1));
    }

    #[test]
    fn aggregate_single_sample_is_its_own_extremes() {
        let stats = LatencyStats::aggregate(&secs(&[7])).expect("non-empty");
        assert_eq!(stats.average, Duration::from_secs(7));
        assert_eq!(stats.max, Duration::from_secs(7));
        assert_eq!(stats.min, Duration::from_secs(7));
    }

    #[test]
    fn aggregate_empty_is_none() {
        assert!(LatencyStats::aggregate(&[]).is_none());
    }

    #[test]
    fn filler_payload_has_exact_size() {
        let mut rng = StdRng::seed_from_u64(1);
        for size in [0usize, 1, 64, 4096] {
            assert_eq!(filler_payload(&mut rng, size).len(), size);
        }
    }

    #[test]
    fn filler_payload_draws_differ_between_calls() {
        let mut rng = StdRng::seed_from_u64(2);
        let first = filler_payload(&mut rng, 64);
        let second = filler_payload(&mut rng, 64);
        assert_ne!(first, second);
    }

    #[test]
    fn filler_payload_is_reproducible_with_a_fixed_seed() {
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        assert_eq!(filler_payload(&mut a, 128), filler_payload(&mut b, 128));
    }

    #[test]
    fn timestamp_round_trip_is_short() {
        let elapsed = elapsed_since_timestamp(&timestamp_payload()).expect("parse");
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn garbage_timestamp_is_an_error() {
        assert!(elapsed_since_timestamp(b"not a timestamp").is_err());
        assert!(elapsed_since_timestamp(&[0xff, 0xfe]).is_err());
    }

    #[tokio::test]
    async fn recorder_excludes_unparseable_samples_without_hanging() {
        let recorder = LatencyRecorder::new(3);
        recorder.record(&timestamp_payload()).await;
        recorder.record(b"garbage").await;
        recorder.record(&timestamp_payload()).await;
        let samples = timeout(Duration::from_secs(1), recorder.wait())
            .await
            .expect("all expected messages seen");
        assert_eq!(samples.len(), 2);
    }
}
