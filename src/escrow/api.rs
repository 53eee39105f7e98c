//! Escrow endpoints over an [`HttpTransport`].

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::types::{
  Account, AccountFilters, Overview, Page, Pagination, Transaction, TransactionFilters,
  WorkspaceScope,
};
use crate::http::{join_path, AbortSignal, ApiError, HttpTransport, RequestOptions};

/// Escrow API client bound to one workspace scope.
#[derive(Clone)]
pub struct EscrowApi {
  transport: Arc<dyn HttpTransport>,
  scope: WorkspaceScope,
}

impl EscrowApi {
  pub fn new(transport: Arc<dyn HttpTransport>, scope: WorkspaceScope) -> Self {
    Self { transport, scope }
  }

  pub fn scope(&self) -> &WorkspaceScope {
    &self.scope
  }

  pub fn set_scope(&mut self, scope: WorkspaceScope) {
    self.scope = scope;
  }

  pub async fn overview(&self, signal: Option<AbortSignal>) -> Result<Overview, ApiError> {
    let value = self
      .transport
      .get("/escrow/overview", self.read_options(BTreeMap::new(), signal))
      .await?;
    decode(unwrap_entity(value, "overview"))
  }

  pub async fn list_accounts(
    &self,
    filters: &AccountFilters,
    pagination: &Pagination,
    signal: Option<AbortSignal>,
  ) -> Result<Page<Account>, ApiError> {
    let mut params = filters.query_params();
    params.extend(pagination.query_params());
    let value = self
      .transport
      .get("/escrow/accounts", self.read_options(params, signal))
      .await?;
    parse_page(value, "accounts")
  }

  pub async fn create_account(&self, body: Value) -> Result<Value, ApiError> {
    self
      .transport
      .post("/escrow/accounts", self.scoped(body), RequestOptions::default())
      .await
  }

  pub async fn update_account(&self, id: i64, body: Value) -> Result<Value, ApiError> {
    let path = join_path(&["escrow", "accounts", &id.to_string()]);
    self
      .transport
      .patch(&path, self.scoped(body), RequestOptions::default())
      .await
  }

  /// Stamp the account as reconciled now.
  pub async fn reconcile_account(&self, id: i64) -> Result<Value, ApiError> {
    let body = json!({ "lastReconciledAt": Utc::now().to_rfc3339() });
    self.update_account(id, body).await
  }

  pub async fn list_transactions(
    &self,
    filters: &TransactionFilters,
    pagination: &Pagination,
    signal: Option<AbortSignal>,
  ) -> Result<Page<Transaction>, ApiError> {
    let mut params = filters.query_params();
    params.extend(pagination.query_params());
    let value = self
      .transport
      .get("/escrow/transactions", self.read_options(params, signal))
      .await?;
    parse_page(value, "transactions")
  }

  pub async fn create_transaction(&self, body: Value) -> Result<Value, ApiError> {
    self
      .transport
      .post("/escrow/transactions", self.scoped(body), RequestOptions::default())
      .await
  }

  pub async fn update_transaction(&self, id: i64, body: Value) -> Result<Value, ApiError> {
    let path = join_path(&["escrow", "transactions", &id.to_string()]);
    self
      .transport
      .patch(&path, self.scoped(body), RequestOptions::default())
      .await
  }

  pub async fn release_transaction(&self, id: i64, actor_id: &str) -> Result<Value, ApiError> {
    self.transition(id, "release", actor_id).await
  }

  pub async fn refund_transaction(&self, id: i64, actor_id: &str) -> Result<Value, ApiError> {
    self.transition(id, "refund", actor_id).await
  }

  pub async fn update_settings(&self, body: Value) -> Result<Value, ApiError> {
    self
      .transport
      .patch("/escrow/settings", self.scoped(body), RequestOptions::default())
      .await
  }

  async fn transition(&self, id: i64, action: &str, actor_id: &str) -> Result<Value, ApiError> {
    let path = join_path(&["escrow", "transactions", &id.to_string(), action]);
    let body = self.scoped(json!({ "actorId": actor_id }));
    self
      .transport
      .post(&path, body, RequestOptions::default())
      .await
  }

  fn read_options(
    &self,
    mut params: BTreeMap<String, String>,
    signal: Option<AbortSignal>,
  ) -> RequestOptions {
    params.extend(self.scope.query_params());
    RequestOptions {
      signal,
      params,
      ..RequestOptions::default()
    }
  }

  fn scoped(&self, mut body: Value) -> Value {
    self.scope.merge_into(&mut body);
    body
  }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
  Ok(serde_json::from_value(value)?)
}

/// Unwrap `{ "<key>": {...} }` or `{ "data": {...} }` envelopes.
fn unwrap_entity(value: Value, key: &str) -> Value {
  match value {
    Value::Object(mut object) => {
      for envelope in [key, "data"] {
        if object.get(envelope).is_some_and(Value::is_object) {
          return object.remove(envelope).unwrap_or(Value::Null);
        }
      }
      Value::Object(object)
    }
    other => other,
  }
}

/// Parse a list response.
///
/// Accepts a bare array, or an object carrying the rows under `<key>`,
/// `items` or `data`, with the total either at the top level or inside a
/// `pagination` object. Without a total, the row count is used.
fn parse_page<T: DeserializeOwned>(value: Value, key: &str) -> Result<Page<T>, ApiError> {
  let (rows, total) = match value {
    Value::Array(rows) => (rows, None),
    Value::Object(mut object) => {
      let rows = [key, "items", "data"]
        .iter()
        .find_map(|k| match object.remove(*k) {
          Some(Value::Array(rows)) => Some(rows),
          _ => None,
        })
        .ok_or_else(|| ApiError::Decode(format!("response has no {} list", key)))?;
      let total = object
        .get("total")
        .or_else(|| object.get("pagination").and_then(|p| p.get("total")))
        .and_then(Value::as_u64);
      (rows, total)
    }
    other => {
      return Err(ApiError::Decode(format!(
        "expected a {} list, got {}",
        key, other
      )))
    }
  };

  let count = rows.len() as u64;
  let items = rows
    .into_iter()
    .map(serde_json::from_value)
    .collect::<Result<Vec<T>, _>>()?;
  Ok(Page {
    items,
    total: total.unwrap_or(count),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::http::testing::FakeTransport;

  fn api(fake: &Arc<FakeTransport>) -> EscrowApi {
    EscrowApi::new(
      fake.clone(),
      WorkspaceScope {
        workspace_id: Some(7),
        workspace_slug: None,
      },
    )
  }

  #[tokio::test]
  async fn test_list_accounts_sends_filters_page_and_scope() {
    let fake = FakeTransport::new();
    fake.respond(
      "GET",
      "/escrow/accounts",
      Ok(json!({"accounts": [{"id": 1, "name": "Acme"}], "total": 40})),
    );

    let filters = AccountFilters {
      status: Some("active".into()),
      search: "acme".into(),
    };
    let mut pagination = Pagination::new(20);
    pagination.offset = 20;
    let page = api(&fake)
      .list_accounts(&filters, &pagination, None)
      .await
      .unwrap();

    assert_eq!(page.total, 40);
    assert_eq!(page.items[0].name, "Acme");

    let call = fake.last_call("GET", "/escrow/accounts").unwrap();
    let params: Vec<(&str, &str)> = call
      .params
      .iter()
      .map(|(k, v)| (k.as_str(), v.as_str()))
      .collect();
    assert_eq!(
      params,
      vec![
        ("limit", "20"),
        ("offset", "20"),
        ("search", "acme"),
        ("status", "active"),
        ("workspaceId", "7"),
      ]
    );
  }

  #[tokio::test]
  async fn test_writes_merge_scope_into_body() {
    let fake = FakeTransport::new();
    fake.respond("POST", "/escrow/transactions/9/release", Ok(json!({"ok": true})));

    api(&fake).release_transaction(9, "u-1").await.unwrap();

    let call = fake.last_call("POST", "/escrow/transactions/9/release").unwrap();
    assert_eq!(call.body, Some(json!({"actorId": "u-1", "workspaceId": 7})));
  }

  #[tokio::test]
  async fn test_overview_unwraps_envelope() {
    let fake = FakeTransport::new();
    fake.respond(
      "GET",
      "/escrow/overview",
      Ok(json!({"overview": {"totals": {"held": 1200.5}, "settings": {"autoReleaseDays": 7}}})),
    );

    let overview = api(&fake).overview(None).await.unwrap();
    assert_eq!(overview.totals.held, 1200.5);
    assert_eq!(overview.settings.auto_release_days, 7);
  }

  #[test]
  fn test_parse_page_shapes() {
    let bare: Page<Transaction> =
      parse_page(json!([{"id": 1, "accountId": 2}]), "transactions").unwrap();
    assert_eq!(bare.total, 1);

    let nested: Page<Transaction> = parse_page(
      json!({"items": [], "pagination": {"total": 17, "limit": 25, "offset": 0}}),
      "transactions",
    )
    .unwrap();
    assert_eq!(nested.total, 17);

    let err = parse_page::<Transaction>(json!({"rows": []}), "transactions").unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
  }

  #[test]
  fn test_parse_page_tolerates_sql_rows() {
    let accounts: Page<Account> = parse_page(
      json!({"accounts": [{"id": 1, "name": "Acme", "status": null}], "total": 1}),
      "accounts",
    )
    .unwrap();
    assert_eq!(accounts.items[0].name, "Acme");

    let transactions: Page<Transaction> = parse_page(
      json!({"transactions": [{"id": 1, "accountId": 2, "amount": "500.00"}]}),
      "transactions",
    )
    .unwrap();
    assert_eq!(transactions.items[0].amount, 500.0);
  }
}
