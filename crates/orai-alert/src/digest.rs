use anyhow::Result;
use chrono::{DateTime, Days, NaiveDate, Utc};
use orai_common::localtime;
use orai_common::types::{DeliveryPayload, DeliveryStatus};
use orai_notify::{template, Mailer, SendThrottle};
use orai_storage::{AlertStore, DigestCandidate, NewDelivery};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Digest emails go out at this local hour when the rule does not set one.
const DEFAULT_SEND_HOUR: u8 = 7;

/// Payload recorded on the marker row a forced digest run appends, so
/// manual sends show up in delivery history.
#[derive(Debug, Serialize)]
struct DigestSummaryPayload {
    kind: &'static str,
    version: u32,
    batch_date: NaiveDate,
    entry_count: usize,
    sent_at: DateTime<Utc>,
}

pub(crate) fn is_summary_marker(payload: Option<&str>) -> bool {
    payload
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
        .is_some_and(|v| v.get("kind").and_then(serde_json::Value::as_str) == Some("digest_summary"))
}

/// Batches one day's digest-enabled deliveries into a single summary email
/// per user.
///
/// Safe under overlapping invocations: rows are resolved with a conditional
/// "still pending" update, so two concurrent runs cannot double-send or
/// downgrade an already-resolved delivery.
pub struct DigestProcessor {
    store: Arc<AlertStore>,
    mailer: Arc<dyn Mailer>,
    throttle: Arc<SendThrottle>,
}

impl DigestProcessor {
    pub fn new(store: Arc<AlertStore>, mailer: Arc<dyn Mailer>, throttle: Arc<SendThrottle>) -> Self {
        Self {
            store,
            mailer,
            throttle,
        }
    }

    /// Run one digest pass; returns how many digest emails were sent.
    ///
    /// `force_run` ignores per-user send hours and re-includes already
    /// resolved deliveries from the window (manual "send digest now").
    pub async fn process_digests(&self, force_run: bool) -> Result<u64> {
        self.run_pass(force_run, Utc::now()).await
    }

    pub(crate) async fn run_pass(&self, force_run: bool, now: DateTime<Utc>) -> Result<u64> {
        if !self.mailer.is_configured() {
            tracing::debug!("SMTP not configured, skipping digest pass");
            return Ok(0);
        }

        let today = localtime::local_date(now);
        let from = today - Days::new(1);

        // Pending rows older than the rolling window can never be picked up
        // again; resolve them instead of letting them linger forever.
        let expired = self.store.expire_stale_pending(from).await?;
        if expired > 0 {
            tracing::warn!(expired, "Expired stale pending digest deliveries");
        }

        let candidates = self.store.list_digest_candidates(from, today).await?;
        // Marker rows from earlier forced runs share the window; they are
        // history, not digest entries.
        let work: Vec<&DigestCandidate> = candidates
            .iter()
            .filter(|c| !is_summary_marker(c.delivery.payload.as_deref()))
            .filter(|c| force_run || c.delivery.status == DeliveryStatus::Pending)
            .collect();

        let mut groups: BTreeMap<String, Vec<&DigestCandidate>> = BTreeMap::new();
        for candidate in work {
            groups
                .entry(candidate.rule.user_id.clone())
                .or_default()
                .push(candidate);
        }

        let local_hour = localtime::local_hour(now);
        let mut sent_count = 0u64;

        for (user_id, group) in groups {
            let send_hour = group[0]
                .rule
                .digest_send_hour_local
                .unwrap_or(DEFAULT_SEND_HOUR);
            if !force_run && local_hour < send_hour {
                continue;
            }

            let Some(user) = self.store.get_user_by_id(&user_id).await? else {
                for candidate in &group {
                    self.store
                        .mark_delivery_if_pending(
                            &candidate.delivery.id,
                            DeliveryStatus::Failed,
                            Some("User not found"),
                        )
                        .await?;
                }
                continue;
            };

            let mut items = Vec::with_capacity(group.len());
            for candidate in &group {
                match candidate.delivery.payload.as_deref() {
                    Some(raw) => match DeliveryPayload::from_json(raw) {
                        Ok(payload) => items.push(payload),
                        Err(e) => tracing::warn!(
                            delivery_id = %candidate.delivery.id,
                            error = %e,
                            "Skipping digest entry with malformed payload"
                        ),
                    },
                    None => tracing::warn!(
                        delivery_id = %candidate.delivery.id,
                        "Skipping digest entry without payload"
                    ),
                }
            }
            if items.is_empty() {
                continue;
            }

            let subject = template::digest_subject(today);
            let body = template::digest_body(&items, today);

            self.throttle.acquire().await;
            let send_result = self.mailer.send(&user.email, &subject, &body).await;
            let (status, error) = match &send_result {
                Ok(()) => (DeliveryStatus::Sent, None),
                Err(e) => {
                    tracing::warn!(user_id = %user_id, to = %user.email, error = %e, "Digest email failed");
                    (DeliveryStatus::Failed, Some(e.to_string()))
                }
            };

            for candidate in &group {
                self.store
                    .mark_delivery_if_pending(&candidate.delivery.id, status, error.as_deref())
                    .await?;
            }

            if force_run {
                let summary = DigestSummaryPayload {
                    kind: "digest_summary",
                    version: 1,
                    batch_date: today,
                    entry_count: items.len(),
                    sent_at: now,
                };
                let marker = NewDelivery {
                    rule_id: group[0].rule.id.clone(),
                    status,
                    attempted_at: now,
                    error_message: error.clone(),
                    payload: serde_json::to_string(&summary).ok(),
                    digest_batch_date: Some(today),
                };
                self.store.insert_delivery(&marker).await?;
            }

            if send_result.is_ok() {
                tracing::info!(user_id = %user_id, entries = items.len(), "Digest sent");
                sent_count += 1;
            }
        }

        Ok(sent_count)
    }
}
