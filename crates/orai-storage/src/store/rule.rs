use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use orai_common::types::AlertCondition;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::entities::alert_delivery;
use crate::entities::alert_rule::{self, Column, Entity};
use crate::store::AlertStore;

/// Alert rule data row (from the alert_rules table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRuleRow {
    pub id: String,
    pub user_id: String,
    pub city: String,
    pub place_code: String,
    pub condition: AlertCondition,
    pub threshold_c: f64,
    pub active: bool,
    pub digest_enabled: bool,
    pub digest_send_hour_local: Option<u8>,
    pub quiet_hours_start: Option<u8>,
    pub quiet_hours_end: Option<u8>,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Rule create/update request, validated before hitting the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAlertRule {
    pub city: String,
    pub place_code: String,
    pub condition: AlertCondition,
    pub threshold_c: f64,
    pub active: bool,
    pub digest_enabled: bool,
    pub digest_send_hour_local: Option<u8>,
    pub quiet_hours_start: Option<u8>,
    pub quiet_hours_end: Option<u8>,
}

/// Per-user rule/delivery counters for the stats view.
#[derive(Debug, Clone, Serialize)]
pub struct RuleStats {
    pub total_rules: u64,
    pub active_rules: u64,
    pub sent_count: u64,
    pub failed_count: u64,
}

pub(crate) fn to_row(m: alert_rule::Model) -> Result<AlertRuleRow> {
    Ok(AlertRuleRow {
        id: m.id,
        user_id: m.user_id,
        city: m.city,
        place_code: m.place_code,
        condition: m.condition.parse().map_err(|e: String| anyhow!(e))?,
        threshold_c: m.threshold_c,
        active: m.active,
        digest_enabled: m.digest_enabled,
        digest_send_hour_local: m.digest_send_hour_local.map(|h| h as u8),
        quiet_hours_start: m.quiet_hours_start.map(|h| h as u8),
        quiet_hours_end: m.quiet_hours_end.map(|h| h as u8),
        last_triggered_at: m.last_triggered_at.map(|t| t.with_timezone(&Utc)),
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    })
}

fn validate(req: &NewAlertRule) -> Result<()> {
    if req.city.trim().is_empty() || req.place_code.trim().is_empty() {
        bail!("City and place code are required");
    }
    for hour in [
        req.digest_send_hour_local,
        req.quiet_hours_start,
        req.quiet_hours_end,
    ]
    .into_iter()
    .flatten()
    {
        if hour > 23 {
            bail!("Hour values must be between 0 and 23");
        }
    }
    Ok(())
}

impl AlertStore {
    pub async fn create_rule(&self, user_id: &str, req: &NewAlertRule) -> Result<AlertRuleRow> {
        validate(req)?;
        let now = Utc::now().fixed_offset();
        let am = alert_rule::ActiveModel {
            id: Set(orai_common::id::next_id()),
            user_id: Set(user_id.to_owned()),
            city: Set(req.city.trim().to_owned()),
            place_code: Set(req.place_code.trim().to_owned()),
            condition: Set(req.condition.to_string()),
            threshold_c: Set(req.threshold_c),
            active: Set(req.active),
            digest_enabled: Set(req.digest_enabled),
            digest_send_hour_local: Set(req.digest_send_hour_local.map(i32::from)),
            quiet_hours_start: Set(req.quiet_hours_start.map(i32::from)),
            quiet_hours_end: Set(req.quiet_hours_end.map(i32::from)),
            last_triggered_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        to_row(model)
    }

    pub async fn list_rules_for_user(&self, user_id: &str) -> Result<Vec<AlertRuleRow>> {
        let rows = Entity::find()
            .filter(Column::UserId.eq(user_id))
            .order_by(Column::CreatedAt, Order::Desc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_row).collect()
    }

    /// Active rules only, in creation order: the evaluation pass input set.
    pub async fn list_active_rules(&self) -> Result<Vec<AlertRuleRow>> {
        let rows = Entity::find()
            .filter(Column::Active.eq(true))
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_row).collect()
    }

    pub async fn update_rule(
        &self,
        user_id: &str,
        rule_id: &str,
        req: &NewAlertRule,
    ) -> Result<Option<AlertRuleRow>> {
        validate(req)?;
        let model = Entity::find_by_id(rule_id)
            .filter(Column::UserId.eq(user_id))
            .one(self.db())
            .await?;
        let Some(m) = model else {
            return Ok(None);
        };
        let mut am: alert_rule::ActiveModel = m.into();
        am.city = Set(req.city.trim().to_owned());
        am.place_code = Set(req.place_code.trim().to_owned());
        am.condition = Set(req.condition.to_string());
        am.threshold_c = Set(req.threshold_c);
        am.active = Set(req.active);
        am.digest_enabled = Set(req.digest_enabled);
        am.digest_send_hour_local = Set(req.digest_send_hour_local.map(i32::from));
        am.quiet_hours_start = Set(req.quiet_hours_start.map(i32::from));
        am.quiet_hours_end = Set(req.quiet_hours_end.map(i32::from));
        am.updated_at = Set(Utc::now().fixed_offset());
        let updated = am.update(self.db()).await?;
        Ok(Some(to_row(updated)?))
    }

    /// Delete a rule and its delivery history (cascade) in one transaction.
    pub async fn delete_rule(&self, user_id: &str, rule_id: &str) -> Result<bool> {
        let model = Entity::find_by_id(rule_id)
            .filter(Column::UserId.eq(user_id))
            .one(self.db())
            .await?;
        let Some(m) = model else {
            return Ok(false);
        };

        let txn = self.db().begin().await?;
        alert_delivery::Entity::delete_many()
            .filter(alert_delivery::Column::RuleId.eq(m.id.clone()))
            .exec(&txn)
            .await?;
        Entity::delete_by_id(m.id).exec(&txn).await?;
        txn.commit().await?;
        Ok(true)
    }

    pub async fn rule_stats_for_user(&self, user_id: &str) -> Result<RuleStats> {
        let rule_ids: Vec<String> = Entity::find()
            .filter(Column::UserId.eq(user_id))
            .all(self.db())
            .await?
            .into_iter()
            .map(|m| m.id)
            .collect();

        let total_rules = rule_ids.len() as u64;
        let active_rules = Entity::find()
            .filter(Column::UserId.eq(user_id))
            .filter(Column::Active.eq(true))
            .count(self.db())
            .await?;

        if rule_ids.is_empty() {
            return Ok(RuleStats {
                total_rules,
                active_rules,
                sent_count: 0,
                failed_count: 0,
            });
        }

        let sent_count = alert_delivery::Entity::find()
            .filter(alert_delivery::Column::RuleId.is_in(rule_ids.clone()))
            .filter(alert_delivery::Column::Status.eq("sent"))
            .count(self.db())
            .await?;
        let failed_count = alert_delivery::Entity::find()
            .filter(alert_delivery::Column::RuleId.is_in(rule_ids))
            .filter(alert_delivery::Column::Status.eq("failed"))
            .count(self.db())
            .await?;

        Ok(RuleStats {
            total_rules,
            active_rules,
            sent_count,
            failed_count,
        })
    }
}
