use crate::{AlertEvaluator, DigestProcessor};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use orai_common::types::{AlertCondition, DeliveryPayload, DeliveryStatus};
use orai_notify::{Mailer, NotifyError, SendThrottle};
use orai_storage::{AlertStore, NewAlertRule};
use orai_weather::WeatherLookup;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

struct MockWeather(HashMap<String, f64>);

impl MockWeather {
    fn with(place_code: &str, temp: f64) -> Arc<Self> {
        let mut temps = HashMap::new();
        temps.insert(place_code.to_string(), temp);
        Arc::new(Self(temps))
    }
}

#[async_trait]
impl WeatherLookup for MockWeather {
    async fn current_temperature(&self, place_code: &str) -> Option<f64> {
        self.0.get(place_code).copied()
    }
}

struct MockMailer {
    configured: bool,
    fail_with: Option<String>,
    sent: Mutex<Vec<(String, String)>>, // (to, subject)
}

impl MockMailer {
    fn configured() -> Arc<Self> {
        Arc::new(Self {
            configured: true,
            fail_with: None,
            sent: Mutex::new(Vec::new()),
        })
    }

    fn unconfigured() -> Arc<Self> {
        Arc::new(Self {
            configured: false,
            fail_with: None,
            sent: Mutex::new(Vec::new()),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            configured: true,
            fail_with: Some(message.to_string()),
            sent: Mutex::new(Vec::new()),
        })
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn send(&self, to: &str, subject: &str, _html_body: &str) -> orai_notify::Result<()> {
        if let Some(message) = &self.fail_with {
            return Err(NotifyError::SmtpError(message.clone()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string()));
        Ok(())
    }
}

async fn store_with_user() -> (Arc<AlertStore>, String) {
    let store = Arc::new(AlertStore::new("sqlite::memory:").await.unwrap());
    let user_id = store
        .create_user("jonas", "jonas@example.com", "hash")
        .await
        .unwrap();
    (store, user_id)
}

fn rule(condition: AlertCondition, threshold_c: f64) -> NewAlertRule {
    NewAlertRule {
        city: "Vilnius".to_string(),
        place_code: "vilnius".to_string(),
        condition,
        threshold_c,
        active: true,
        digest_enabled: false,
        digest_send_hour_local: None,
        quiet_hours_start: None,
        quiet_hours_end: None,
    }
}

fn evaluator(
    store: &Arc<AlertStore>,
    weather: Arc<MockWeather>,
    mailer: Arc<MockMailer>,
) -> AlertEvaluator {
    AlertEvaluator::new(
        store.clone(),
        weather,
        mailer,
        Arc::new(SendThrottle::new(StdDuration::ZERO)),
    )
}

fn processor(store: &Arc<AlertStore>, mailer: Arc<MockMailer>) -> DigestProcessor {
    DigestProcessor::new(
        store.clone(),
        mailer,
        Arc::new(SendThrottle::new(StdDuration::ZERO)),
    )
}

// Winter instant: Vilnius is UTC+2, so local hour = UTC hour + 2.
fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, hour, minute, 0).unwrap()
}

#[tokio::test]
async fn inactive_rules_are_never_evaluated() {
    let (store, user_id) = store_with_user().await;
    let mut req = rule(AlertCondition::Below, 0.0);
    req.active = false;
    let created = store.create_rule(&user_id, &req).await.unwrap();

    let mailer = MockMailer::configured();
    evaluator(&store, MockWeather::with("vilnius", -3.0), mailer.clone())
        .run_pass(at(8, 0))
        .await
        .unwrap();

    assert!(store
        .list_deliveries_for_rule(&created.id)
        .await
        .unwrap()
        .is_empty());
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn trigger_sends_email_and_consumes_the_trigger() {
    let (store, user_id) = store_with_user().await;
    let created = store
        .create_rule(&user_id, &rule(AlertCondition::Below, 0.0))
        .await
        .unwrap();

    let mailer = MockMailer::configured();
    let now = at(8, 0);
    evaluator(&store, MockWeather::with("vilnius", -3.0), mailer.clone())
        .run_pass(now)
        .await
        .unwrap();

    let deliveries = store.list_deliveries_for_rule(&created.id).await.unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].status, DeliveryStatus::Sent);
    assert_eq!(deliveries[0].digest_batch_date, None);

    let payload = DeliveryPayload::from_json(deliveries[0].payload.as_deref().unwrap()).unwrap();
    assert_eq!(payload.city, "Vilnius");
    assert_eq!(payload.temperature_c, -3.0);
    assert_eq!(payload.triggered_at, now);

    let rules = store.list_rules_for_user(&user_id).await.unwrap();
    assert_eq!(rules[0].last_triggered_at, Some(now));

    assert_eq!(
        mailer.sent(),
        vec![(
            "jonas@example.com".to_string(),
            "Weather alert for Vilnius".to_string()
        )]
    );
}

#[tokio::test]
async fn predicate_is_strict_in_both_directions() {
    let (store, user_id) = store_with_user().await;
    let below = store
        .create_rule(&user_id, &rule(AlertCondition::Below, 0.0))
        .await
        .unwrap();
    let above = store
        .create_rule(&user_id, &rule(AlertCondition::Above, 0.0))
        .await
        .unwrap();

    // temp exactly at the threshold triggers neither direction
    evaluator(
        &store,
        MockWeather::with("vilnius", 0.0),
        MockMailer::configured(),
    )
    .run_pass(at(8, 0))
    .await
    .unwrap();

    assert!(store
        .list_deliveries_for_rule(&below.id)
        .await
        .unwrap()
        .is_empty());
    assert!(store
        .list_deliveries_for_rule(&above.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn cooldown_suppresses_retrigger_for_an_hour() {
    let (store, user_id) = store_with_user().await;
    let created = store
        .create_rule(&user_id, &rule(AlertCondition::Below, 0.0))
        .await
        .unwrap();

    let weather = MockWeather::with("vilnius", -3.0);
    let ev = evaluator(&store, weather, MockMailer::configured());

    ev.run_pass(at(8, 0)).await.unwrap();
    ev.run_pass(at(8, 10)).await.unwrap();
    assert_eq!(
        store
            .list_deliveries_for_rule(&created.id)
            .await
            .unwrap()
            .len(),
        1
    );

    // re-arms once a full hour has elapsed
    ev.run_pass(at(9, 1)).await.unwrap();
    assert_eq!(
        store
            .list_deliveries_for_rule(&created.id)
            .await
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn quiet_hours_drop_the_trigger_entirely() {
    let (store, user_id) = store_with_user().await;
    let mut req = rule(AlertCondition::Below, 0.0);
    req.quiet_hours_start = Some(22);
    req.quiet_hours_end = Some(6);
    let created = store.create_rule(&user_id, &req).await.unwrap();

    let weather = MockWeather::with("vilnius", -3.0);
    let ev = evaluator(&store, weather, MockMailer::configured());

    // 21:00 UTC = 23:00 local, inside the window
    ev.run_pass(at(21, 0)).await.unwrap();
    assert!(store
        .list_deliveries_for_rule(&created.id)
        .await
        .unwrap()
        .is_empty());
    let rules = store.list_rules_for_user(&user_id).await.unwrap();
    assert_eq!(rules[0].last_triggered_at, None);

    // 08:00 UTC = 10:00 local, outside the window
    ev.run_pass(at(8, 0)).await.unwrap();
    assert_eq!(
        store
            .list_deliveries_for_rule(&created.id)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn digest_rule_creates_immediate_and_batched_rows() {
    let (store, user_id) = store_with_user().await;
    let mut req = rule(AlertCondition::Below, 0.0);
    req.digest_enabled = true;
    let created = store.create_rule(&user_id, &req).await.unwrap();

    evaluator(
        &store,
        MockWeather::with("vilnius", -3.0),
        MockMailer::configured(),
    )
    .run_pass(at(8, 0))
    .await
    .unwrap();

    let deliveries = store.list_deliveries_for_rule(&created.id).await.unwrap();
    assert_eq!(deliveries.len(), 2);

    let immediate = deliveries
        .iter()
        .find(|d| d.digest_batch_date.is_none())
        .unwrap();
    let batched = deliveries
        .iter()
        .find(|d| d.digest_batch_date.is_some())
        .unwrap();

    assert_eq!(immediate.status, DeliveryStatus::Sent);
    assert_eq!(batched.status, DeliveryStatus::Pending);
    assert_eq!(
        batched.digest_batch_date,
        NaiveDate::from_ymd_opt(2026, 1, 15)
    );
    assert_eq!(immediate.payload, batched.payload);
}

#[tokio::test]
async fn missing_user_fails_both_rows() {
    let store = Arc::new(AlertStore::new("sqlite::memory:").await.unwrap());
    let mut req = rule(AlertCondition::Below, 0.0);
    req.digest_enabled = true;
    let created = store.create_rule("ghost", &req).await.unwrap();

    let mailer = MockMailer::configured();
    evaluator(&store, MockWeather::with("vilnius", -3.0), mailer.clone())
        .run_pass(at(8, 0))
        .await
        .unwrap();

    let deliveries = store.list_deliveries_for_rule(&created.id).await.unwrap();
    assert_eq!(deliveries.len(), 2);
    for delivery in &deliveries {
        assert_eq!(delivery.status, DeliveryStatus::Failed);
        assert_eq!(delivery.error_message.as_deref(), Some("User not found"));
    }
    assert!(mailer.sent().is_empty());

    // cooldown still advances so the orphaned rule is not re-tried each pass
    let rules = store.list_rules_for_user("ghost").await.unwrap();
    assert_eq!(rules[0].last_triggered_at, Some(at(8, 0)));
}

#[tokio::test]
async fn unconfigured_smtp_fails_immediate_and_keeps_digest_pending() {
    let (store, user_id) = store_with_user().await;
    let mut req = rule(AlertCondition::Below, 0.0);
    req.digest_enabled = true;
    let created = store.create_rule(&user_id, &req).await.unwrap();

    let mailer = MockMailer::unconfigured();
    evaluator(&store, MockWeather::with("vilnius", -3.0), mailer.clone())
        .run_pass(at(8, 0))
        .await
        .unwrap();

    let deliveries = store.list_deliveries_for_rule(&created.id).await.unwrap();
    let immediate = deliveries
        .iter()
        .find(|d| d.digest_batch_date.is_none())
        .unwrap();
    let batched = deliveries
        .iter()
        .find(|d| d.digest_batch_date.is_some())
        .unwrap();

    assert_eq!(immediate.status, DeliveryStatus::Failed);
    assert_eq!(
        immediate.error_message.as_deref(),
        Some("SMTP not configured")
    );
    assert_eq!(batched.status, DeliveryStatus::Pending);
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn send_failure_is_recorded_and_cooldown_still_advances() {
    let (store, user_id) = store_with_user().await;
    let created = store
        .create_rule(&user_id, &rule(AlertCondition::Below, 0.0))
        .await
        .unwrap();

    evaluator(
        &store,
        MockWeather::with("vilnius", -3.0),
        MockMailer::failing("relay refused"),
    )
    .run_pass(at(8, 0))
    .await
    .unwrap();

    let deliveries = store.list_deliveries_for_rule(&created.id).await.unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].status, DeliveryStatus::Failed);
    assert!(deliveries[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("relay refused"));

    let rules = store.list_rules_for_user(&user_id).await.unwrap();
    assert_eq!(rules[0].last_triggered_at, Some(at(8, 0)));
}

#[tokio::test]
async fn unavailable_temperature_skips_without_a_delivery() {
    let (store, user_id) = store_with_user().await;
    let created = store
        .create_rule(&user_id, &rule(AlertCondition::Below, 0.0))
        .await
        .unwrap();

    // weather knows nothing about "vilnius"
    evaluator(
        &store,
        MockWeather::with("kaunas", -3.0),
        MockMailer::configured(),
    )
    .run_pass(at(8, 0))
    .await
    .unwrap();

    assert!(store
        .list_deliveries_for_rule(&created.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn digest_waits_for_send_hour_then_sends_once() {
    let (store, user_id) = store_with_user().await;
    let mut req = rule(AlertCondition::Below, 0.0);
    req.digest_enabled = true;
    req.digest_send_hour_local = Some(7);
    let created = store.create_rule(&user_id, &req).await.unwrap();

    let mailer = MockMailer::configured();
    // trigger at 03:00 local (01:00 UTC)
    evaluator(&store, MockWeather::with("vilnius", -3.0), mailer.clone())
        .run_pass(at(1, 0))
        .await
        .unwrap();

    let digest = processor(&store, mailer.clone());

    // 05:00 local: before the send hour
    assert_eq!(digest.run_pass(false, at(3, 0)).await.unwrap(), 0);

    // 08:00 local: sends one digest
    assert_eq!(digest.run_pass(false, at(6, 0)).await.unwrap(), 1);
    let batched = store
        .list_deliveries_for_rule(&created.id)
        .await
        .unwrap()
        .into_iter()
        .find(|d| d.digest_batch_date.is_some())
        .unwrap();
    assert_eq!(batched.status, DeliveryStatus::Sent);

    // nothing left pending: a second run sends nothing
    assert_eq!(digest.run_pass(false, at(6, 30)).await.unwrap(), 0);
    // one immediate alert + one digest
    assert_eq!(mailer.sent().len(), 2);
}

#[tokio::test]
async fn forced_run_ignores_send_hour_and_appends_marker() {
    let (store, user_id) = store_with_user().await;
    let mut req = rule(AlertCondition::Below, 0.0);
    req.digest_enabled = true;
    let created = store.create_rule(&user_id, &req).await.unwrap();

    let mailer = MockMailer::configured();
    evaluator(&store, MockWeather::with("vilnius", -3.0), mailer.clone())
        .run_pass(at(1, 0))
        .await
        .unwrap();

    // 05:00 local, well before the default 07:00 send hour
    let sent = processor(&store, mailer.clone())
        .run_pass(true, at(3, 0))
        .await
        .unwrap();
    assert_eq!(sent, 1);

    let deliveries = store.list_deliveries_for_rule(&created.id).await.unwrap();
    // immediate + digest + forced-run marker
    assert_eq!(deliveries.len(), 3);
    let marker = deliveries
        .iter()
        .find(|d| {
            d.payload
                .as_deref()
                .is_some_and(|p| p.contains("digest_summary"))
        })
        .unwrap();
    assert_eq!(marker.status, DeliveryStatus::Sent);
    assert_eq!(
        marker.digest_batch_date,
        NaiveDate::from_ymd_opt(2026, 1, 15)
    );
}

#[test]
fn summary_markers_are_told_apart_from_alert_payloads() {
    let marker = r#"{"kind":"digest_summary","version":1,"entry_count":2}"#;
    assert!(crate::digest::is_summary_marker(Some(marker)));

    let alert = DeliveryPayload::new("Vilnius", "vilnius", -3.0, AlertCondition::Below, 0.0, at(8, 0))
        .to_json();
    assert!(!crate::digest::is_summary_marker(Some(&alert)));
    assert!(!crate::digest::is_summary_marker(Some("not json")));
    assert!(!crate::digest::is_summary_marker(None));
}

#[tokio::test]
async fn repeated_forced_runs_skip_prior_markers() {
    let (store, user_id) = store_with_user().await;
    let mut req = rule(AlertCondition::Below, 0.0);
    req.digest_enabled = true;
    let created = store.create_rule(&user_id, &req).await.unwrap();

    let mailer = MockMailer::configured();
    evaluator(&store, MockWeather::with("vilnius", -3.0), mailer.clone())
        .run_pass(at(1, 0))
        .await
        .unwrap();

    let digest = processor(&store, mailer.clone());
    assert_eq!(digest.run_pass(true, at(3, 0)).await.unwrap(), 1);
    // the marker left by the first run is not a digest entry for the second
    assert_eq!(digest.run_pass(true, at(3, 30)).await.unwrap(), 1);

    let deliveries = store.list_deliveries_for_rule(&created.id).await.unwrap();
    // immediate + digest row + one marker per forced run
    assert_eq!(deliveries.len(), 4);
    let markers: Vec<_> = deliveries
        .iter()
        .filter(|d| crate::digest::is_summary_marker(d.payload.as_deref()))
        .collect();
    assert_eq!(markers.len(), 2);
    for marker in markers {
        assert_eq!(marker.status, DeliveryStatus::Sent);
        assert!(marker
            .payload
            .as_deref()
            .unwrap()
            .contains("\"entry_count\":1"));
    }
}

#[tokio::test]
async fn digest_batches_all_of_a_users_rules_into_one_email() {
    let (store, user_id) = store_with_user().await;
    let mut first = rule(AlertCondition::Below, 0.0);
    first.digest_enabled = true;
    let mut second = rule(AlertCondition::Below, 5.0);
    second.city = "Kaunas".to_string();
    second.place_code = "kaunas".to_string();
    second.digest_enabled = true;
    let first = store.create_rule(&user_id, &first).await.unwrap();
    let second = store.create_rule(&user_id, &second).await.unwrap();

    let mut temps = HashMap::new();
    temps.insert("vilnius".to_string(), -3.0);
    temps.insert("kaunas".to_string(), 2.0);
    let weather = Arc::new(MockWeather(temps));

    let mailer = MockMailer::configured();
    AlertEvaluator::new(
        store.clone(),
        weather,
        mailer.clone(),
        Arc::new(SendThrottle::new(StdDuration::ZERO)),
    )
    .run_pass(at(1, 0))
    .await
    .unwrap();

    let sent = processor(&store, mailer.clone())
        .run_pass(false, at(6, 0))
        .await
        .unwrap();
    assert_eq!(sent, 1);

    for rule_id in [&first.id, &second.id] {
        let batched = store
            .list_deliveries_for_rule(rule_id)
            .await
            .unwrap()
            .into_iter()
            .find(|d| d.digest_batch_date.is_some())
            .unwrap();
        assert_eq!(batched.status, DeliveryStatus::Sent);
    }

    // two immediate alerts + one combined digest
    assert_eq!(mailer.sent().len(), 3);
}

#[tokio::test]
async fn digest_is_a_noop_without_smtp() {
    let (store, user_id) = store_with_user().await;
    let mut req = rule(AlertCondition::Below, 0.0);
    req.digest_enabled = true;
    let created = store.create_rule(&user_id, &req).await.unwrap();

    let mailer = MockMailer::unconfigured();
    evaluator(&store, MockWeather::with("vilnius", -3.0), mailer.clone())
        .run_pass(at(1, 0))
        .await
        .unwrap();

    let sent = processor(&store, mailer)
        .run_pass(true, at(6, 0))
        .await
        .unwrap();
    assert_eq!(sent, 0);

    let batched = store
        .list_deliveries_for_rule(&created.id)
        .await
        .unwrap()
        .into_iter()
        .find(|d| d.digest_batch_date.is_some())
        .unwrap();
    assert_eq!(batched.status, DeliveryStatus::Pending);
}
