//! Persistence layer for alert rules, delivery audit records and users.
//!
//! All access goes through [`AlertStore`], a SeaORM-backed unified store.
//! Rule CRUD is owned by the REST layer; the scheduler reads active rules,
//! appends delivery rows and advances rule trigger state through the same
//! store.

pub mod entities;
pub mod store;


pub use store::delivery::{AlertDeliveryRow, DeliveryHistoryEntry, DigestCandidate, NewDelivery};
pub use store::rule::{AlertRuleRow, NewAlertRule, RuleStats};
pub use store::AlertStore;
