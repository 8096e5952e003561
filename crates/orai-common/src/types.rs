use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trigger direction of an alert rule, relative to its threshold.
///
/// # Examples
///
/// ```
/// use orai_common::types::AlertCondition;
///
/// let cond: AlertCondition = "below".parse().unwrap();
/// assert_eq!(cond, AlertCondition::Below);
/// assert_eq!(cond.to_string(), "below");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCondition {
    Below,
    Above,
}

impl AlertCondition {
    /// Whether `temperature_c` satisfies this condition against `threshold_c`.
    pub fn is_met(&self, temperature_c: f64, threshold_c: f64) -> bool {
        match self {
            AlertCondition::Below => temperature_c < threshold_c,
            AlertCondition::Above => temperature_c > threshold_c,
        }
    }
}

impl std::fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertCondition::Below => write!(f, "below"),
            AlertCondition::Above => write!(f, "above"),
        }
    }
}

impl std::str::FromStr for AlertCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "below" => Ok(AlertCondition::Below),
            "above" => Ok(AlertCondition::Above),
            _ => Err(format!("unknown alert condition: {s}")),
        }
    }
}

/// Outcome of one notification attempt.
///
/// `Pending` is transient: an immediate delivery is resolved within the
/// evaluation pass that created it, a digest-batched delivery stays pending
/// until a digest run picks it up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(f, "pending"),
            DeliveryStatus::Sent => write!(f, "sent"),
            DeliveryStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(DeliveryStatus::Pending),
            "sent" => Ok(DeliveryStatus::Sent),
            "failed" => Ok(DeliveryStatus::Failed),
            _ => Err(format!("unknown delivery status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn payload_version() -> u32 {
    1
}

/// Snapshot of the rule state at trigger time, serialized onto the delivery
/// row. Digest batching reads it back later, decoupled from the live rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPayload {
    #[serde(default = "payload_version")]
    pub version: u32,
    pub city: String,
    pub place_code: String,
    pub temperature_c: f64,
    pub condition: AlertCondition,
    pub threshold_c: f64,
    pub triggered_at: DateTime<Utc>,
}

impl DeliveryPayload {
    pub fn new(
        city: &str,
        place_code: &str,
        temperature_c: f64,
        condition: AlertCondition,
        threshold_c: f64,
        triggered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            version: payload_version(),
            city: city.to_string(),
            place_code: place_code.to_string(),
            temperature_c,
            condition,
            threshold_c,
            triggered_at,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
