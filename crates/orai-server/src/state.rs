use chrono::{DateTime, Utc};
use orai_alert::DigestProcessor;
use orai_storage::AlertStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<AlertStore>,
    pub digest: Arc<DigestProcessor>,
    pub start_time: DateTime<Utc>,
}
