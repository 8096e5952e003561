use orai_alert::{AlertEvaluator, DigestProcessor};
use std::sync::Arc;
use tokio::time::{interval, Duration};

/// Drives the two background workers. Each loop owns its own timer; the
/// first evaluation fires immediately on startup. A failed pass is logged
/// and the loop keeps ticking.
pub struct AlertScheduler {
    evaluator: Arc<AlertEvaluator>,
    digest: Arc<DigestProcessor>,
    eval_interval_secs: u64,
    digest_tick_secs: u64,
}

impl AlertScheduler {
    pub fn new(
        evaluator: Arc<AlertEvaluator>,
        digest: Arc<DigestProcessor>,
        eval_interval_secs: u64,
        digest_tick_secs: u64,
    ) -> Self {
        Self {
            evaluator,
            digest,
            eval_interval_secs,
            digest_tick_secs,
        }
    }

    pub async fn run_evaluator(&self) {
        tracing::info!(
            interval_secs = self.eval_interval_secs,
            "Alert evaluation loop started"
        );

        let mut tick = interval(Duration::from_secs(self.eval_interval_secs));
        loop {
            tick.tick().await;
            if let Err(e) = self.evaluator.evaluate_active_rules().await {
                tracing::error!(error = %e, "Alert evaluation pass failed");
            }
        }
    }

    pub async fn run_digest(&self) {
        tracing::info!(
            tick_secs = self.digest_tick_secs,
            "Digest processing loop started"
        );

        let mut tick = interval(Duration::from_secs(self.digest_tick_secs));
        loop {
            tick.tick().await;
            match self.digest.process_digests(false).await {
                Ok(sent) if sent > 0 => tracing::info!(sent, "Digest pass completed"),
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Digest pass failed"),
            }
        }
    }
}
