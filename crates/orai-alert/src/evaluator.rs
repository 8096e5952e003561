use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use orai_common::localtime;
use orai_common::types::{DeliveryPayload, DeliveryStatus};
use orai_notify::{template, Mailer, SendThrottle};
use orai_storage::{AlertRuleRow, AlertStore, NewDelivery};
use orai_weather::WeatherLookup;
use std::collections::HashMap;
use std::sync::Arc;

/// A rule re-arms only after this much time since its last trigger.
const COOLDOWN_MINUTES: i64 = 60;

/// One-pass evaluator over all active alert rules.
///
/// Rules are independent of each other; the only shared resource is the
/// email throttle. A failure evaluating one rule is logged and does not
/// abort the pass.
pub struct AlertEvaluator {
    store: Arc<AlertStore>,
    weather: Arc<dyn WeatherLookup>,
    mailer: Arc<dyn Mailer>,
    throttle: Arc<SendThrottle>,
}

impl AlertEvaluator {
    pub fn new(
        store: Arc<AlertStore>,
        weather: Arc<dyn WeatherLookup>,
        mailer: Arc<dyn Mailer>,
        throttle: Arc<SendThrottle>,
    ) -> Self {
        Self {
            store,
            weather,
            mailer,
            throttle,
        }
    }

    pub async fn evaluate_active_rules(&self) -> Result<()> {
        self.run_pass(Utc::now()).await
    }

    pub(crate) async fn run_pass(&self, now: DateTime<Utc>) -> Result<()> {
        let rules = self.store.list_active_rules().await?;
        if rules.is_empty() {
            return Ok(());
        }

        // One weather lookup per distinct place, cached for the pass
        let mut temps: HashMap<String, Option<f64>> = HashMap::new();
        for rule in &rules {
            if !temps.contains_key(&rule.place_code) {
                let temp = self.weather.current_temperature(&rule.place_code).await;
                temps.insert(rule.place_code.clone(), temp);
            }
        }

        for rule in &rules {
            if let Err(e) = self.evaluate_rule(rule, &temps, now).await {
                tracing::error!(rule_id = %rule.id, error = %e, "Rule evaluation failed");
            }
        }

        Ok(())
    }

    async fn evaluate_rule(
        &self,
        rule: &AlertRuleRow,
        temps: &HashMap<String, Option<f64>>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let Some(temp) = temps.get(&rule.place_code).copied().flatten() else {
            tracing::warn!(
                rule_id = %rule.id,
                place_code = %rule.place_code,
                "Temperature unavailable, skipping rule"
            );
            return Ok(());
        };

        // Quiet hours drop the trigger opportunity entirely, no deferral
        if localtime::is_in_quiet_hours(now, rule.quiet_hours_start, rule.quiet_hours_end) {
            return Ok(());
        }

        if !rule.condition.is_met(temp, rule.threshold_c) {
            return Ok(());
        }

        if let Some(last) = rule.last_triggered_at {
            if now - last < Duration::minutes(COOLDOWN_MINUTES) {
                return Ok(());
            }
        }

        tracing::info!(
            rule_id = %rule.id,
            city = %rule.city,
            temperature = temp,
            threshold = rule.threshold_c,
            condition = %rule.condition,
            "Alert triggered"
        );

        let payload = DeliveryPayload::new(
            &rule.city,
            &rule.place_code,
            temp,
            rule.condition,
            rule.threshold_c,
            now,
        );
        let payload_json = payload.to_json();

        let mut immediate = NewDelivery {
            rule_id: rule.id.clone(),
            status: DeliveryStatus::Pending,
            attempted_at: now,
            error_message: None,
            payload: Some(payload_json.clone()),
            digest_batch_date: None,
        };
        let mut digest = rule.digest_enabled.then(|| NewDelivery {
            rule_id: rule.id.clone(),
            status: DeliveryStatus::Pending,
            attempted_at: now,
            error_message: None,
            payload: Some(payload_json),
            digest_batch_date: Some(localtime::local_date(now)),
        });

        let Some(user) = self.store.get_user_by_id(&rule.user_id).await? else {
            // An orphaned rule fails both rows so no digest row lingers
            // pending for a user that no longer exists.
            immediate.status = DeliveryStatus::Failed;
            immediate.error_message = Some("User not found".to_owned());
            if let Some(d) = digest.as_mut() {
                d.status = DeliveryStatus::Failed;
                d.error_message = Some("User not found".to_owned());
            }
            return self.record(rule, now, immediate, digest).await;
        };

        if !self.mailer.is_configured() {
            immediate.status = DeliveryStatus::Failed;
            immediate.error_message = Some("SMTP not configured".to_owned());
            return self.record(rule, now, immediate, digest).await;
        }

        let subject = template::alert_subject(&rule.city);
        let body = template::alert_body(&payload);

        self.throttle.acquire().await;
        match self.mailer.send(&user.email, &subject, &body).await {
            Ok(()) => {
                immediate.status = DeliveryStatus::Sent;
            }
            Err(e) => {
                tracing::warn!(rule_id = %rule.id, to = %user.email, error = %e, "Alert email failed");
                immediate.status = DeliveryStatus::Failed;
                immediate.error_message = Some(e.to_string());
            }
        }

        self.record(rule, now, immediate, digest).await
    }

    /// The trigger is consumed once attempted: delivery rows and the rule's
    /// `last_triggered_at` commit in one transaction, whatever the outcome.
    async fn record(
        &self,
        rule: &AlertRuleRow,
        now: DateTime<Utc>,
        immediate: NewDelivery,
        digest: Option<NewDelivery>,
    ) -> Result<()> {
        let mut deliveries = vec![immediate];
        deliveries.extend(digest);
        self.store.record_trigger(&rule.id, now, &deliveries).await?;
        Ok(())
    }
}
