// src/ingest/scheduler.rs
use anyhow::Result;
use async_trait::async_trait;
use metrics::{counter, gauge, histogram};
use std::future::Future;
use std::time::Duration;

use crate::config::SchedulerConfig;

/// One full unit of work driven by a scheduler.
#[async_trait]
pub trait Cycle: Send + Sync {
    type Summary: std::fmt::Debug + Send;

    async fn run_cycle(&self) -> Result<Self::Summary>;

    /// Release anything a cancelled cycle may still hold.
    async fn shutdown(&self) {}
}

#[derive(Clone, Copy, Debug)]
pub struct IntervalSchedulerCfg {
    pub interval: Duration,
    pub error_backoff: Duration,
}

impl From<SchedulerConfig> for IntervalSchedulerCfg {
    fn from(cfg: SchedulerConfig) -> Self {
        Self {
            interval: cfg.interval(),
            error_backoff: cfg.error_backoff(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub cycles_ok: u64,
    pub cycles_failed: u64,
}

/// Runs a cycle to completion, sleeps a fixed interval (longer backoff after
/// a failed cycle) and repeats until `shutdown` resolves.
pub struct IntervalScheduler {
    cfg: IntervalSchedulerCfg,
}

impl IntervalScheduler {
    pub fn new(cfg: IntervalSchedulerCfg) -> Self {
        Self { cfg }
    }

    pub async fn run_until<C, S>(&self, cycle: &C, shutdown: S) -> RunStats
    where
        C: Cycle,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut stats = RunStats::default();

        loop {
            let t0 = std::time::Instant::now();
            let outcome = tokio::select! {
                res = cycle.run_cycle() => Some(res),
                _ = &mut shutdown => None,
            };

            let pause = match outcome {
                None => {
                    tracing::info!("shutdown requested during cycle");
                    break;
                }
                Some(Ok(summary)) => {
                    stats.cycles_ok += 1;
                    tracing::info!(?summary, next_in_secs = self.cfg.interval.as_secs(), "cycle finished");
                    self.cfg.interval
                }
                Some(Err(e)) => {
                    stats.cycles_failed += 1;
                    counter!("cycle_errors_total").increment(1);
                    tracing::error!(error = ?e, backoff_secs = self.cfg.error_backoff.as_secs(), "cycle failed");
                    self.cfg.error_backoff
                }
            };
            histogram!("cycle_duration_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
            gauge!("pipeline_last_cycle_ts").set(chrono::Utc::now().timestamp() as f64);

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested while idle");
                    break;
                }
            }
        }

        cycle.shutdown().await;
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct Flaky {
        calls: AtomicU32,
        shut: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Cycle for Flaky {
        type Summary = u32;

        async fn run_cycle(&self) -> Result<u32> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n % 2 == 1 {
                anyhow::bail!("boom {n}");
            }
            Ok(n)
        }

        async fn shutdown(&self) {
            self.shut.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn alternates_interval_and_backoff_then_stops() {
        let shut = Arc::new(AtomicU32::new(0));
        let cycle = Flaky {
            calls: AtomicU32::new(0),
            shut: shut.clone(),
        };
        let sched = IntervalScheduler::new(IntervalSchedulerCfg {
            interval: Duration::from_secs(60),
            error_backoff: Duration::from_secs(30),
        });

        // t=0 ok, sleep 60; t=60 err, sleep 30; t=90 ok, sleep 60; shutdown at t=100
        let stats = sched
            .run_until(&cycle, tokio::time::sleep(Duration::from_secs(100)))
            .await;

        assert_eq!(stats, RunStats { cycles_ok: 2, cycles_failed: 1 });
        assert_eq!(shut.load(Ordering::SeqCst), 1);
    }
}
