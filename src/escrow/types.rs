use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Workspace the escrow ledger is scoped to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceScope {
  pub workspace_id: Option<i64>,
  pub workspace_slug: Option<String>,
}

impl WorkspaceScope {
  pub fn query_params(&self) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    if let Some(id) = self.workspace_id {
      params.insert("workspaceId".to_string(), id.to_string());
    }
    if let Some(slug) = &self.workspace_slug {
      params.insert("workspaceSlug".to_string(), slug.clone());
    }
    params
  }

  /// Merge the scope into a JSON request body. Non-object bodies are left alone.
  pub fn merge_into(&self, body: &mut Value) {
    let Some(object) = body.as_object_mut() else {
      return;
    };
    if let Some(id) = self.workspace_id {
      object.insert("workspaceId".to_string(), Value::from(id));
    }
    if let Some(slug) = &self.workspace_slug {
      object.insert("workspaceSlug".to_string(), Value::from(slug.clone()));
    }
  }

  /// Parse a user-supplied workspace: digits are an id, anything else a slug.
  pub fn from_arg(arg: &str) -> Self {
    let arg = arg.trim();
    match arg.parse::<i64>() {
      Ok(id) => Self {
        workspace_id: Some(id),
        workspace_slug: None,
      },
      Err(_) if arg.is_empty() => Self::default(),
      Err(_) => Self {
        workspace_id: None,
        workspace_slug: Some(arg.to_string()),
      },
    }
  }

  pub fn label(&self) -> String {
    match (&self.workspace_slug, self.workspace_id) {
      (Some(slug), _) => slug.clone(),
      (None, Some(id)) => format!("workspace {}", id),
      (None, None) => "all workspaces".to_string(),
    }
  }
}

/// The acting user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
  pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
  pub id: i64,
  #[serde(default, deserialize_with = "text")]
  pub name: String,
  #[serde(default)]
  pub client_name: Option<String>,
  #[serde(default, deserialize_with = "text")]
  pub status: String,
  #[serde(default)]
  pub currency: Option<String>,
  #[serde(default, deserialize_with = "amount")]
  pub balance: f64,
  #[serde(default, deserialize_with = "amount")]
  pub held_amount: f64,
  #[serde(default)]
  pub last_reconciled_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
  pub id: i64,
  #[serde(default, deserialize_with = "account_ref")]
  pub account_id: i64,
  #[serde(rename = "type", default, deserialize_with = "text")]
  pub kind: String,
  #[serde(default, deserialize_with = "text")]
  pub status: String,
  #[serde(default, deserialize_with = "amount")]
  pub amount: f64,
  #[serde(default, deserialize_with = "amount")]
  pub fee_amount: f64,
  #[serde(default)]
  pub currency: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub reference: Option<String>,
  #[serde(default)]
  pub occurred_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub metadata: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverviewTotals {
  #[serde(deserialize_with = "amount")]
  pub held: f64,
  #[serde(deserialize_with = "amount")]
  pub released: f64,
  #[serde(deserialize_with = "amount")]
  pub refunded: f64,
  #[serde(deserialize_with = "amount")]
  pub fees: f64,
  pub pending_count: u64,
  pub account_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EscrowSettings {
  pub auto_release_days: u32,
  pub hold_period_hours: u32,
  pub fee_percent: f64,
  pub require_dual_approval: bool,
  pub notify_on_release: bool,
}

impl Default for EscrowSettings {
  fn default() -> Self {
    Self {
      auto_release_days: 14,
      hold_period_hours: 0,
      fee_percent: 0.0,
      require_dual_approval: false,
      notify_on_release: true,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Overview {
  pub currency: Option<String>,
  pub totals: OverviewTotals,
  pub settings: EscrowSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountFilters {
  pub status: Option<String>,
  pub search: String,
}

impl AccountFilters {
  pub fn query_params(&self) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    insert_filter(&mut params, "status", self.status.as_deref());
    insert_filter(&mut params, "search", Some(&self.search));
    params
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilters {
  pub status: Option<String>,
  pub kind: Option<String>,
  pub search: String,
}

impl TransactionFilters {
  pub fn query_params(&self) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    insert_filter(&mut params, "status", self.status.as_deref());
    insert_filter(&mut params, "type", self.kind.as_deref());
    insert_filter(&mut params, "search", Some(&self.search));
    params
  }
}

fn insert_filter(params: &mut BTreeMap<String, String>, key: &str, value: Option<&str>) {
  if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty() && *v != "all") {
    params.insert(key.to_string(), value.to_string());
  }
}

/// Offset pagination. Offsets are unsigned so they can never go negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
  pub limit: u32,
  pub offset: u32,
  pub total: u64,
}

impl Pagination {
  pub fn new(limit: u32) -> Self {
    Self {
      limit: limit.max(1),
      offset: 0,
      total: 0,
    }
  }

  pub fn query_params(&self) -> BTreeMap<String, String> {
    BTreeMap::from([
      ("limit".to_string(), self.limit.to_string()),
      ("offset".to_string(), self.offset.to_string()),
    ])
  }

  /// 1-based page number.
  pub fn page(&self) -> u32 {
    self.offset / self.limit.max(1) + 1
  }

  pub fn page_count(&self) -> u32 {
    let limit = u64::from(self.limit.max(1));
    (self.total.div_ceil(limit)).max(1).min(u64::from(u32::MAX)) as u32
  }

  pub fn has_next(&self) -> bool {
    u64::from(self.offset) + u64::from(self.limit) < self.total
  }

  pub fn next(&self) -> PaginationChange {
    PaginationChange::offset(self.offset.saturating_add(self.limit))
  }

  pub fn previous(&self) -> PaginationChange {
    PaginationChange::offset(self.offset.saturating_sub(self.limit))
  }
}

/// Partial pagination update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginationChange {
  pub limit: Option<u32>,
  pub offset: Option<u32>,
}

impl PaginationChange {
  pub fn offset(offset: u32) -> Self {
    Self {
      limit: None,
      offset: Some(offset),
    }
  }
}

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub total: u64,
}

// Rows come straight from SQL: columns may be null and DECIMALs arrive as
// strings. Both decode to the field's empty value instead of failing the page.

fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
  Ok(match Value::deserialize(deserializer)? {
    Value::Null => String::new(),
    Value::String(s) => s,
    other => other.to_string(),
  })
}

fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
  match Value::deserialize(deserializer)? {
    Value::Null => Ok(0.0),
    Value::Number(n) => n
      .as_f64()
      .ok_or_else(|| de::Error::custom(format!("amount out of range: {}", n))),
    Value::String(s) if s.trim().is_empty() => Ok(0.0),
    Value::String(s) => s
      .trim()
      .parse::<f64>()
      .ok()
      .filter(|n| n.is_finite())
      .ok_or_else(|| de::Error::custom(format!("invalid amount {:?}", s))),
    other => Err(de::Error::custom(format!("invalid amount {}", other))),
  }
}

fn account_ref<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
  match Value::deserialize(deserializer)? {
    Value::Null => Ok(0),
    Value::Number(n) => n
      .as_i64()
      .ok_or_else(|| de::Error::custom(format!("invalid account id {}", n))),
    Value::String(s) => s
      .trim()
      .parse::<i64>()
      .map_err(|_| de::Error::custom(format!("invalid account id {:?}", s))),
    other => Err(de::Error::custom(format!("invalid account id {}", other))),
  }
}

/// Remove keys whose value is null so partial updates don't clear fields.
pub(crate) fn strip_nulls(mut object: Map<String, Value>) -> Value {
  object.retain(|_, v| !v.is_null());
  Value::Object(object)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_scope_from_arg() {
    assert_eq!(WorkspaceScope::from_arg("12").workspace_id, Some(12));
    assert_eq!(
      WorkspaceScope::from_arg(" acme ").workspace_slug.as_deref(),
      Some("acme")
    );
    assert_eq!(WorkspaceScope::from_arg(""), WorkspaceScope::default());
  }

  #[test]
  fn test_scope_params_and_body() {
    let scope = WorkspaceScope {
      workspace_id: Some(7),
      workspace_slug: Some("acme".into()),
    };
    let params = scope.query_params();
    assert_eq!(params.get("workspaceId").map(String::as_str), Some("7"));
    assert_eq!(params.get("workspaceSlug").map(String::as_str), Some("acme"));

    let mut body = json!({"amount": 5});
    scope.merge_into(&mut body);
    assert_eq!(body, json!({"amount": 5, "workspaceId": 7, "workspaceSlug": "acme"}));
  }

  #[test]
  fn test_empty_scope_adds_nothing() {
    let mut body = json!({"a": 1});
    WorkspaceScope::default().merge_into(&mut body);
    assert_eq!(body, json!({"a": 1}));
    assert!(WorkspaceScope::default().query_params().is_empty());
  }

  #[test]
  fn test_filters_skip_blank_and_all() {
    let filters = TransactionFilters {
      status: Some("all".into()),
      kind: Some("release".into()),
      search: "  ".into(),
    };
    let params = filters.query_params();
    assert_eq!(params.len(), 1);
    assert_eq!(params.get("type").map(String::as_str), Some("release"));
  }

  #[test]
  fn test_pagination_navigation() {
    let mut page = Pagination::new(25);
    page.total = 60;
    assert_eq!(page.page(), 1);
    assert_eq!(page.page_count(), 3);
    assert!(page.has_next());
    assert_eq!(page.next(), PaginationChange::offset(25));
    assert_eq!(page.previous(), PaginationChange::offset(0));

    page.offset = 50;
    assert_eq!(page.page(), 3);
    assert!(!page.has_next());
  }

  #[test]
  fn test_rows_with_nulls_and_decimal_strings() {
    let account: Account = serde_json::from_value(json!({
      "id": 1, "name": null, "status": null, "balance": "1200.50", "heldAmount": null
    }))
    .unwrap();
    assert_eq!(account.status, "");
    assert_eq!(account.name, "");
    assert_eq!(account.balance, 1200.5);
    assert_eq!(account.held_amount, 0.0);

    let tx: Transaction = serde_json::from_value(json!({
      "id": 1, "accountId": "2", "type": null, "amount": "500.00", "feeAmount": " 1.25 "
    }))
    .unwrap();
    assert_eq!(tx.account_id, 2);
    assert_eq!(tx.kind, "");
    assert_eq!(tx.amount, 500.0);
    assert_eq!(tx.fee_amount, 1.25);

    let orphan: Transaction =
      serde_json::from_value(json!({"id": 3, "accountId": null})).unwrap();
    assert_eq!(orphan.account_id, 0);
  }

  #[test]
  fn test_garbage_amount_is_still_an_error() {
    let result = serde_json::from_value::<Transaction>(json!({
      "id": 1, "accountId": 2, "amount": "five"
    }));
    assert!(result.is_err());
  }

  #[test]
  fn test_transaction_type_field() {
    let tx: Transaction = serde_json::from_value(json!({
      "id": 1, "accountId": 2, "type": "deposit", "amount": 500, "feeAmount": 12
    }))
    .unwrap();
    assert_eq!(tx.kind, "deposit");
    assert_eq!(tx.fee_amount, 12.0);
    assert!(tx.metadata.is_null());
  }
}
