//! HTML email bodies. The product ships to Lithuanian users, so the copy
//! is Lithuanian while field names and logs stay English.

use chrono::NaiveDate;
use orai_common::localtime;
use orai_common::types::{AlertCondition, DeliveryPayload};

pub fn alert_subject(city: &str) -> String {
    format!("Weather alert for {city}")
}

pub fn digest_subject(local_date: NaiveDate) -> String {
    format!("Dienos orų įspėjimų santrauka {local_date}")
}

fn condition_lt(condition: AlertCondition) -> &'static str {
    match condition {
        AlertCondition::Below => "žemiau",
        AlertCondition::Above => "aukščiau",
    }
}

/// Body for a single triggered rule, sent immediately after evaluation.
pub fn alert_body(payload: &DeliveryPayload) -> String {
    let condition = condition_lt(payload.condition);
    let local_time = localtime::format_local(payload.triggered_at);

    format!(
        r#"<html>
  <body style="font-family: Arial, sans-serif; background: #f7fafc; padding: 24px;">
    <div style="max-width: 560px; margin: 0 auto; background: #ffffff; border-radius: 12px; box-shadow: 0 10px 30px rgba(0,0,0,0.08); overflow: hidden;">
      <div style="background: linear-gradient(120deg, #2563eb, #38bdf8); padding: 18px 24px; color: #fff;">
        <h2 style="margin:0; font-size: 20px;">Weather Alert</h2>
        <p style="margin:6px 0 0 0; font-size: 14px;">{city}</p>
      </div>
      <div style="padding: 20px 24px; color: #1f2937;">
        <p style="margin-top:0;">Buvo suaktyvintas orų perspėjimas.</p>
        <table style="width:100%; border-collapse: collapse; margin: 12px 0;">
          <tr>
            <td style="padding:8px; font-weight:600; color:#4b5563;">Dabartinė temperatūra</td>
            <td style="padding:8px; text-align:right; color:#111827;">{temp:.1}°C</td>
          </tr>
          <tr>
            <td style="padding:8px; font-weight:600; color:#4b5563;">Sąlyga</td>
            <td style="padding:8px; text-align:right; color:#111827;">{condition} {threshold:.1}°C</td>
          </tr>
          <tr>
            <td style="padding:8px; font-weight:600; color:#4b5563;">Laikas</td>
            <td style="padding:8px; text-align:right; color:#111827;">{local_time} (Europe/Vilnius)</td>
          </tr>
        </table>
        <p style="margin:12px 0 0 0; font-size: 14px; color:#4b5563;">
          Galite koreguoti arba išjungti taisyklę prisijungę prie savo paskyros.
        </p>
      </div>
      <div style="background:#f3f4f6; padding:12px 24px; font-size:12px; color:#6b7280;">
        Weather Alerts · Automatizuotas pranešimas
      </div>
    </div>
  </body>
</html>"#,
        city = payload.city,
        temp = payload.temperature_c,
        condition = condition,
        threshold = payload.threshold_c,
        local_time = local_time,
    )
}

/// Body for the once-a-day digest: one table row per triggered rule.
pub fn digest_body(items: &[DeliveryPayload], local_date: NaiveDate) -> String {
    let mut rows = String::new();
    for item in items {
        rows.push_str(&format!(
            r#"            <tr>
              <td style="padding:8px; border-bottom:1px solid #e5e7eb;">{city}</td>
              <td style="padding:8px; border-bottom:1px solid #e5e7eb;">{condition}</td>
              <td style="padding:8px; border-bottom:1px solid #e5e7eb;">{threshold:.1}°C</td>
              <td style="padding:8px; border-bottom:1px solid #e5e7eb;">{temp:.1}°C</td>
              <td style="padding:8px; border-bottom:1px solid #e5e7eb;">{local_time}</td>
            </tr>
"#,
            city = item.city,
            condition = condition_lt(item.condition),
            threshold = item.threshold_c,
            temp = item.temperature_c,
            local_time = localtime::format_local(item.triggered_at),
        ));
    }

    format!(
        r#"<html>
  <body style="font-family: Arial, sans-serif; background: #f7fafc; padding: 24px;">
    <div style="max-width: 600px; margin: 0 auto; background: #ffffff; border-radius: 12px; box-shadow: 0 10px 30px rgba(0,0,0,0.08); overflow: hidden;">
      <div style="background: linear-gradient(120deg, #2563eb, #38bdf8); padding: 18px 24px; color: #fff;">
        <h2 style="margin:0; font-size: 20px;">Dienos orų įspėjimų santrauka</h2>
        <p style="margin:6px 0 0 0; font-size: 14px;">{local_date} (Europe/Vilnius)</p>
      </div>
      <div style="padding: 20px 24px; color: #1f2937;">
        <p style="margin-top:0;">Šiandien suveikė šios taisyklės:</p>
        <table style="width:100%; border-collapse: collapse; font-size: 14px;">
          <thead>
            <tr>
              <th style="text-align:left; padding:8px; border-bottom:1px solid #e5e7eb;">Miestas</th>
              <th style="text-align:left; padding:8px; border-bottom:1px solid #e5e7eb;">Sąlyga</th>
              <th style="text-align:left; padding:8px; border-bottom:1px solid #e5e7eb;">Slenkstis</th>
              <th style="text-align:left; padding:8px; border-bottom:1px solid #e5e7eb;">Temp</th>
              <th style="text-align:left; padding:8px; border-bottom:1px solid #e5e7eb;">Laikas</th>
            </tr>
          </thead>
          <tbody>
{rows}          </tbody>
        </table>
      </div>
      <div style="background:#f3f4f6; padding:12px 24px; font-size:12px; color:#6b7280;">
        Weather Alerts · Automatizuotas pranešimas
      </div>
    </div>
  </body>
</html>"#,
        local_date = local_date,
        rows = rows,
    )
}
