//! Typed, lenient view over the support desk document.
//!
//! The snapshot payload is owned by the server; every field here defaults
//! when missing so new or removed fields never break the panel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SupportDesk {
  pub metrics: DeskMetrics,
  pub support_cases: Vec<SupportCase>,
  pub disputes: Vec<Dispute>,
  pub playbooks: Vec<Playbook>,
  pub knowledge_base: Vec<KnowledgeArticle>,
  pub refreshed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeskMetrics {
  pub open_cases: u64,
  pub breached_sla: u64,
  pub open_disputes: u64,
  pub avg_first_response_minutes: Option<f64>,
  pub csat: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SupportCase {
  #[serde(deserialize_with = "id_string")]
  pub id: String,
  pub subject: String,
  pub status: String,
  pub priority: Option<String>,
  #[serde(alias = "client")]
  pub client_name: Option<String>,
  pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Dispute {
  #[serde(deserialize_with = "id_string")]
  pub id: String,
  pub transaction_id: Option<i64>,
  pub status: String,
  pub amount: Option<f64>,
  pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Playbook {
  #[serde(deserialize_with = "id_string")]
  pub id: String,
  pub title: String,
  pub steps: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KnowledgeArticle {
  #[serde(deserialize_with = "id_string")]
  pub id: String,
  pub title: String,
  pub url: Option<String>,
}

/// Ids arrive as numbers or strings depending on the backing table.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(match Value::deserialize(deserializer)? {
    Value::String(s) => s,
    Value::Null => String::new(),
    other => other.to_string(),
  })
}

const CLOSED_STATUSES: &[&str] = &["resolved", "closed", "cancelled"];

impl SupportDesk {
  pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
    Self::deserialize(value)
  }

  /// Cases still needing attention, as listed by the server.
  pub fn open_cases(&self) -> Vec<&SupportCase> {
    self
      .support_cases
      .iter()
      .filter(|c| !CLOSED_STATUSES.contains(&c.status.to_lowercase().as_str()))
      .collect()
  }

  pub fn open_disputes(&self) -> Vec<&Dispute> {
    self
      .disputes
      .iter()
      .filter(|d| !CLOSED_STATUSES.contains(&d.status.to_lowercase().as_str()))
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_parses_observed_document() {
    let value = json!({
      "metrics": {"openCases": 2, "breachedSla": 1, "csat": 4.6},
      "supportCases": [
        {"id": 11, "subject": "Payout missing", "status": "open", "client": "Acme"},
        {"id": "c-12", "subject": "Invoice copy", "status": "Resolved"}
      ],
      "disputes": [{"id": 5, "transactionId": 900, "status": "open", "amount": 120.5}],
      "playbooks": [{"id": 1, "title": "Chargeback", "steps": ["Collect evidence"]}],
      "knowledgeBase": [{"id": 3, "title": "Escrow basics"}],
      "refreshedAt": "2026-10-01T10:00:00Z"
    });

    let desk = SupportDesk::from_value(&value).unwrap();
    assert_eq!(desk.metrics.open_cases, 2);
    assert_eq!(desk.support_cases[0].id, "11");
    assert_eq!(desk.support_cases[0].client_name.as_deref(), Some("Acme"));
    assert_eq!(desk.support_cases[1].id, "c-12");
    assert_eq!(desk.open_cases().len(), 1);
    assert_eq!(desk.open_disputes()[0].transaction_id, Some(900));
    assert_eq!(desk.playbooks[0].steps.len(), 1);
    assert!(desk.refreshed_at.is_some());
  }

  #[test]
  fn test_missing_sections_default() {
    let desk = SupportDesk::from_value(&json!({})).unwrap();
    assert!(desk.support_cases.is_empty());
    assert_eq!(desk.metrics.open_cases, 0);
    assert!(desk.refreshed_at.is_none());
  }
}
