use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use orai_common::types::DeliveryStatus;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entities::alert_delivery::{self, Column, Entity};
use crate::entities::alert_rule;
use crate::store::rule::{self, AlertRuleRow};
use crate::store::AlertStore;

/// Delivery audit row (from the alert_deliveries table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertDeliveryRow {
    pub id: String,
    pub rule_id: String,
    pub status: DeliveryStatus,
    pub attempted_at: DateTime<Utc>,
    pub error_message: Option<String>,
    pub payload: Option<String>,
    pub digest_batch_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Delivery row to insert; the id is generated at insert time.
#[derive(Debug, Clone)]
pub struct NewDelivery {
    pub rule_id: String,
    pub status: DeliveryStatus,
    pub attempted_at: DateTime<Utc>,
    pub error_message: Option<String>,
    pub payload: Option<String>,
    pub digest_batch_date: Option<NaiveDate>,
}

/// A digest-window delivery joined with its (digest-enabled) rule.
#[derive(Debug, Clone)]
pub struct DigestCandidate {
    pub delivery: AlertDeliveryRow,
    pub rule: AlertRuleRow,
}

/// Delivery history entry for the per-user read API.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryHistoryEntry {
    #[serde(flatten)]
    pub delivery: AlertDeliveryRow,
    pub city: String,
    pub place_code: String,
}

fn to_row(m: alert_delivery::Model) -> Result<AlertDeliveryRow> {
    Ok(AlertDeliveryRow {
        id: m.id,
        rule_id: m.rule_id,
        status: m.status.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        attempted_at: m.attempted_at.with_timezone(&Utc),
        error_message: m.error_message,
        payload: m.payload,
        digest_batch_date: m.digest_batch_date,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    })
}

fn to_active(d: &NewDelivery, now: DateTime<Utc>) -> alert_delivery::ActiveModel {
    alert_delivery::ActiveModel {
        id: Set(orai_common::id::next_id()),
        rule_id: Set(d.rule_id.clone()),
        status: Set(d.status.to_string()),
        attempted_at: Set(d.attempted_at.fixed_offset()),
        error_message: Set(d.error_message.clone()),
        payload: Set(d.payload.clone()),
        digest_batch_date: Set(d.digest_batch_date),
        created_at: Set(now.fixed_offset()),
        updated_at: Set(now.fixed_offset()),
    }
}

impl AlertStore {
    /// Persist the outcome of one triggering evaluation atomically: the
    /// delivery row(s) and the rule's `last_triggered_at` commit together,
    /// so a rule is never marked triggered without its audit record.
    pub async fn record_trigger(
        &self,
        rule_id: &str,
        triggered_at: DateTime<Utc>,
        deliveries: &[NewDelivery],
    ) -> Result<Vec<String>> {
        let now = Utc::now();
        let txn = self.db().begin().await?;

        let mut ids = Vec::with_capacity(deliveries.len());
        for delivery in deliveries {
            let am = to_active(delivery, now);
            let model = am.insert(&txn).await?;
            ids.push(model.id);
        }

        alert_rule::Entity::update_many()
            .col_expr(
                alert_rule::Column::LastTriggeredAt,
                Expr::value(Some(triggered_at.fixed_offset())),
            )
            .col_expr(
                alert_rule::Column::UpdatedAt,
                Expr::value(now.fixed_offset()),
            )
            .filter(alert_rule::Column::Id.eq(rule_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(ids)
    }

    /// Insert a standalone delivery row (e.g. the manual digest marker).
    pub async fn insert_delivery(&self, delivery: &NewDelivery) -> Result<AlertDeliveryRow> {
        let model = to_active(delivery, Utc::now()).insert(self.db()).await?;
        to_row(model)
    }

    /// Resolve a delivery that is still `pending`, leaving already-resolved
    /// rows untouched. Returns whether the row transitioned; overlapping
    /// digest runs rely on this to never double-send or downgrade.
    pub async fn mark_delivery_if_pending(
        &self,
        delivery_id: &str,
        status: DeliveryStatus,
        error_message: Option<&str>,
    ) -> Result<bool> {
        let res = Entity::update_many()
            .col_expr(Column::Status, Expr::value(status.to_string()))
            .col_expr(
                Column::ErrorMessage,
                Expr::value(error_message.map(str::to_owned)),
            )
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(Column::Id.eq(delivery_id))
            .filter(Column::Status.eq(DeliveryStatus::Pending.to_string()))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected > 0)
    }

    /// All deliveries whose `digest_batch_date` falls in `[from, to]` and
    /// whose rule has digest enabled, regardless of status. The digest
    /// processor narrows this superset itself (force-run semantics).
    pub async fn list_digest_candidates(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DigestCandidate>> {
        let deliveries = Entity::find()
            .filter(Column::DigestBatchDate.gte(from))
            .filter(Column::DigestBatchDate.lte(to))
            .order_by(Column::AttemptedAt, Order::Asc)
            .all(self.db())
            .await?;

        if deliveries.is_empty() {
            return Ok(Vec::new());
        }

        let rule_ids: Vec<String> = deliveries.iter().map(|d| d.rule_id.clone()).collect();
        let rules = alert_rule::Entity::find()
            .filter(alert_rule::Column::Id.is_in(rule_ids))
            .filter(alert_rule::Column::DigestEnabled.eq(true))
            .all(self.db())
            .await?;

        let mut by_id: HashMap<String, AlertRuleRow> = HashMap::new();
        for model in rules {
            let row = rule::to_row(model)?;
            by_id.insert(row.id.clone(), row);
        }

        let mut candidates = Vec::new();
        for model in deliveries {
            if let Some(rule) = by_id.get(&model.rule_id) {
                candidates.push(DigestCandidate {
                    delivery: to_row(model)?,
                    rule: rule.clone(),
                });
            }
        }
        Ok(candidates)
    }

    /// Fail digest rows still pending from before the rolling window, so an
    /// orphaned row cannot linger forever outside any future digest pass.
    pub async fn expire_stale_pending(&self, before: NaiveDate) -> Result<u64> {
        let res = Entity::update_many()
            .col_expr(
                Column::Status,
                Expr::value(DeliveryStatus::Failed.to_string()),
            )
            .col_expr(
                Column::ErrorMessage,
                Expr::value(Some("Digest window elapsed".to_owned())),
            )
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(Column::Status.eq(DeliveryStatus::Pending.to_string()))
            .filter(Column::DigestBatchDate.is_not_null())
            .filter(Column::DigestBatchDate.lt(before))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }

    pub async fn get_delivery(&self, delivery_id: &str) -> Result<Option<AlertDeliveryRow>> {
        let model = Entity::find_by_id(delivery_id).one(self.db()).await?;
        model.map(to_row).transpose()
    }

    pub async fn list_deliveries_for_rule(&self, rule_id: &str) -> Result<Vec<AlertDeliveryRow>> {
        let rows = Entity::find()
            .filter(Column::RuleId.eq(rule_id))
            .order_by(Column::AttemptedAt, Order::Asc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_row).collect()
    }

    /// Most recent deliveries across all of a user's rules, newest first,
    /// with the owning rule's city/place attached for display.
    pub async fn list_recent_deliveries_for_user(
        &self,
        user_id: &str,
        take: u64,
    ) -> Result<Vec<DeliveryHistoryEntry>> {
        let rules = alert_rule::Entity::find()
            .filter(alert_rule::Column::UserId.eq(user_id))
            .all(self.db())
            .await?;
        if rules.is_empty() {
            return Ok(Vec::new());
        }

        let mut places: HashMap<String, (String, String)> = HashMap::new();
        for r in &rules {
            places.insert(r.id.clone(), (r.city.clone(), r.place_code.clone()));
        }

        let rule_ids: Vec<String> = rules.into_iter().map(|r| r.id).collect();
        let deliveries = Entity::find()
            .filter(Column::RuleId.is_in(rule_ids))
            .order_by(Column::AttemptedAt, Order::Desc)
            .limit(take)
            .all(self.db())
            .await?;

        let mut entries = Vec::with_capacity(deliveries.len());
        for model in deliveries {
            let (city, place_code) = places
                .get(&model.rule_id)
                .cloned()
                .unwrap_or_default();
            entries.push(DeliveryHistoryEntry {
                delivery: to_row(model)?,
                city,
                place_code,
            });
        }
        Ok(entries)
    }
}
