//! Form drafts and their coercion into request bodies.
//!
//! Drafts hold raw text the way a form does; nothing typed is trusted until
//! `to_payload` coerces it. Metadata is free text: valid JSON is sent as-is,
//! anything else is wrapped as `{"note": text}`.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde_json::{json, Map, Value};

use super::error::EscrowError;
use super::types::{strip_nulls, Account, EscrowSettings, Transaction};

const LOCAL_DATETIME_FORMATS: &[&str] = &[
  "%Y-%m-%dT%H:%M",
  "%Y-%m-%dT%H:%M:%S",
  "%Y-%m-%d %H:%M",
  "%Y-%m-%d %H:%M:%S",
];

#[derive(Debug, Clone, PartialEq)]
pub struct AccountDraft {
  pub id: Option<i64>,
  pub name: String,
  pub client_name: String,
  pub status: String,
  pub currency: String,
  pub metadata: String,
}

impl Default for AccountDraft {
  fn default() -> Self {
    Self {
      id: None,
      name: String::new(),
      client_name: String::new(),
      status: "active".to_string(),
      currency: "USD".to_string(),
      metadata: String::new(),
    }
  }
}

impl AccountDraft {
  /// Seed a draft from defaults, overlaid with the account being edited.
  pub fn seed(account: Option<&Account>) -> Self {
    let defaults = Self::default();
    let Some(account) = account else {
      return defaults;
    };
    Self {
      id: Some(account.id),
      name: account.name.clone(),
      client_name: account.client_name.clone().unwrap_or_default(),
      status: non_empty_or(&account.status, defaults.status),
      currency: account.currency.clone().unwrap_or(defaults.currency),
      metadata: metadata_text(&account.metadata),
    }
  }

  pub fn to_payload(&self) -> Result<Value, EscrowError> {
    let name = self.name.trim();
    if name.is_empty() {
      return Err(EscrowError::Validation(
        "Account name is required".to_string(),
      ));
    }

    let mut body = Map::new();
    body.insert("name".into(), json!(name));
    body.insert("clientName".into(), optional_text(&self.client_name));
    body.insert("status".into(), json!(self.status.trim()));
    body.insert("currency".into(), json!(self.currency.trim().to_uppercase()));
    body.insert("metadata".into(), parse_metadata(&self.metadata));
    Ok(Value::Object(body))
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
  pub id: Option<i64>,
  pub account_id: String,
  pub kind: String,
  pub status: String,
  pub amount: String,
  pub fee_amount: String,
  pub currency: String,
  pub description: String,
  pub reference: String,
  /// Local wall-clock time, e.g. `2026-10-15T14:30`
  pub occurred_at: String,
  pub metadata: String,
}

impl Default for TransactionDraft {
  fn default() -> Self {
    Self {
      id: None,
      account_id: String::new(),
      kind: "deposit".to_string(),
      status: "pending".to_string(),
      amount: String::new(),
      fee_amount: "0".to_string(),
      currency: "USD".to_string(),
      description: String::new(),
      reference: String::new(),
      occurred_at: String::new(),
      metadata: String::new(),
    }
  }
}

impl TransactionDraft {
  pub fn seed(transaction: Option<&Transaction>) -> Self {
    let defaults = Self::default();
    let Some(tx) = transaction else {
      return defaults;
    };
    Self {
      id: Some(tx.id),
      account_id: tx.account_id.to_string(),
      kind: non_empty_or(&tx.kind, defaults.kind),
      status: non_empty_or(&tx.status, defaults.status),
      amount: format_number(tx.amount),
      fee_amount: format_number(tx.fee_amount),
      currency: tx.currency.clone().unwrap_or(defaults.currency),
      description: tx.description.clone().unwrap_or_default(),
      reference: tx.reference.clone().unwrap_or_default(),
      occurred_at: tx
        .occurred_at
        .map(|at| at.with_timezone(&Local).format("%Y-%m-%dT%H:%M").to_string())
        .unwrap_or_default(),
      metadata: metadata_text(&tx.metadata),
    }
  }

  /// Coerce the draft into a request body.
  ///
  /// Fails before anything is sent when no account is selected or the amount
  /// is not a number.
  pub fn to_payload(&self) -> Result<Value, EscrowError> {
    let account_id = parse_account_id(&self.account_id)?;

    let amount = Some(self.amount.trim())
      .filter(|raw| !raw.is_empty())
      .and_then(coerce_number)
      .ok_or_else(|| EscrowError::Validation("Amount must be a number".to_string()))?;
    let fee_amount = coerce_number(&self.fee_amount)
      .ok_or_else(|| EscrowError::Validation("Fee must be a number".to_string()))?;
    let occurred_at = parse_local_datetime(&self.occurred_at)?;

    let mut body = Map::new();
    body.insert("accountId".into(), json!(account_id));
    body.insert("type".into(), json!(self.kind.trim()));
    body.insert("status".into(), json!(self.status.trim()));
    body.insert("amount".into(), json_number(amount));
    body.insert("feeAmount".into(), json_number(fee_amount));
    body.insert("currency".into(), json!(self.currency.trim().to_uppercase()));
    body.insert("description".into(), optional_text(&self.description));
    body.insert("reference".into(), optional_text(&self.reference));
    body.insert(
      "occurredAt".into(),
      occurred_at.map_or(Value::Null, |at| json!(at.to_rfc3339())),
    );
    body.insert("metadata".into(), parse_metadata(&self.metadata));
    Ok(strip_nulls(body))
  }
}

/// Settings form. Every field is text or a toggle label and is coerced on save.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsDraft {
  pub auto_release_days: String,
  pub hold_period_hours: String,
  pub fee_percent: String,
  pub require_dual_approval: String,
  pub notify_on_release: String,
}

impl SettingsDraft {
  pub fn seed(settings: Option<&EscrowSettings>) -> Self {
    let defaults = EscrowSettings::default();
    let settings = settings.unwrap_or(&defaults);
    Self {
      auto_release_days: settings.auto_release_days.to_string(),
      hold_period_hours: settings.hold_period_hours.to_string(),
      fee_percent: format_number(settings.fee_percent),
      require_dual_approval: settings.require_dual_approval.to_string(),
      notify_on_release: settings.notify_on_release.to_string(),
    }
  }

  pub fn to_settings(&self) -> Result<EscrowSettings, EscrowError> {
    Ok(EscrowSettings {
      auto_release_days: coerce_count(&self.auto_release_days, "Auto-release days")?,
      hold_period_hours: coerce_count(&self.hold_period_hours, "Hold period")?,
      fee_percent: coerce_number(&self.fee_percent)
        .filter(|pct| (0.0..=100.0).contains(pct))
        .ok_or_else(|| {
          EscrowError::Validation("Fee percent must be between 0 and 100".to_string())
        })?,
      require_dual_approval: coerce_bool(&self.require_dual_approval),
      notify_on_release: coerce_bool(&self.notify_on_release),
    })
  }

  pub fn to_payload(&self) -> Result<Value, EscrowError> {
    let settings = self.to_settings()?;
    serde_json::to_value(settings)
      .map_err(|e| EscrowError::Validation(format!("Could not encode settings: {}", e)))
  }
}

/// Parse free-text metadata: JSON when it parses, otherwise a note.
fn parse_metadata(text: &str) -> Value {
  let trimmed = text.trim();
  if trimmed.is_empty() {
    return json!({});
  }
  serde_json::from_str(trimmed).unwrap_or_else(|_| json!({ "note": text }))
}

/// Render metadata for a form field.
fn metadata_text(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::Object(object) if object.is_empty() => String::new(),
    other => serde_json::to_string_pretty(other).unwrap_or_default(),
  }
}

/// Account ids are exact integers; float syntax would silently round them.
fn parse_account_id(raw: &str) -> Result<i64, EscrowError> {
  let trimmed = raw.trim();
  if trimmed.is_empty() || trimmed.parse::<i64>() == Ok(0) {
    return Err(EscrowError::Validation("Select an escrow account".to_string()));
  }
  trimmed
    .parse::<i64>()
    .ok()
    .filter(|id| *id > 0)
    .ok_or_else(|| EscrowError::Validation(format!("Invalid escrow account id {}", trimmed)))
}

/// Numeric coercion for form text. Blank counts as zero; anything that is
/// not a finite number is rejected.
fn coerce_number(raw: &str) -> Option<f64> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Some(0.0);
  }
  trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn coerce_count(raw: &str, label: &str) -> Result<u32, EscrowError> {
  coerce_number(raw)
    .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= f64::from(u32::MAX))
    .map(|n| n as u32)
    .ok_or_else(|| EscrowError::Validation(format!("{} must be a whole number", label)))
}

fn coerce_bool(raw: &str) -> bool {
  matches!(
    raw.trim().to_lowercase().as_str(),
    "true" | "1" | "yes" | "on" | "y"
  )
}

/// Whole numbers go out as JSON integers, everything else as floats.
fn json_number(n: f64) -> Value {
  if n.fract() == 0.0 && n.abs() < 9.0e15 {
    json!(n as i64)
  } else {
    json!(n)
  }
}

fn format_number(n: f64) -> String {
  if n.fract() == 0.0 && n.abs() < 9.0e15 {
    (n as i64).to_string()
  } else {
    n.to_string()
  }
}

fn optional_text(raw: &str) -> Value {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    Value::Null
  } else {
    json!(trimmed)
  }
}

fn non_empty_or(value: &str, fallback: String) -> String {
  if value.trim().is_empty() {
    fallback
  } else {
    value.to_string()
  }
}

/// Convert a local wall-clock datetime to an absolute instant.
///
/// RFC 3339 input is accepted as-is. Ambiguous local times (DST fall-back)
/// resolve to the earlier instant.
fn parse_local_datetime(raw: &str) -> Result<Option<DateTime<Utc>>, EscrowError> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Ok(None);
  }
  if let Ok(at) = DateTime::parse_from_rfc3339(trimmed) {
    return Ok(Some(at.with_timezone(&Utc)));
  }

  let naive = LOCAL_DATETIME_FORMATS
    .iter()
    .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
    .ok_or_else(|| EscrowError::Validation(format!("Invalid date and time: {}", trimmed)))?;
  let local = Local
    .from_local_datetime(&naive)
    .earliest()
    .ok_or_else(|| {
      EscrowError::Validation(format!("{} does not exist in the local time zone", trimmed))
    })?;
  Ok(Some(local.with_timezone(&Utc)))
}
