//! Escrow dashboard controller.
//!
//! Owns the [`EscrowState`] for one workspace and the single authoritative
//! fetch per slice (overview, accounts, transactions). Views read state,
//! call the mutators, and drive `poll()` from their tick.

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use super::api::EscrowApi;
use super::drafts::{AccountDraft, SettingsDraft, TransactionDraft};
use super::error::EscrowError;
use super::state::{Action, EscrowState, Toast, ToastTone};
use super::types::{
  Account, AccountFilters, Overview, Page, PaginationChange, Session, Transaction,
  TransactionFilters, WorkspaceScope,
};
use crate::http::ApiError;
use crate::query::LatestRequest;

pub struct EscrowContainer {
  api: EscrowApi,
  session: Session,
  state: EscrowState,
  overview_request: LatestRequest<Overview, ApiError>,
  accounts_request: LatestRequest<Page<Account>, ApiError>,
  transactions_request: LatestRequest<Page<Transaction>, ApiError>,
}

impl EscrowContainer {
  /// Create the container and fetch every slice. Needs a tokio runtime.
  pub fn mount(api: EscrowApi, session: Session, page_size: u32) -> Self {
    let mut container = Self {
      api,
      session,
      state: EscrowState::new(page_size),
      overview_request: LatestRequest::new(),
      accounts_request: LatestRequest::new(),
      transactions_request: LatestRequest::new(),
    };
    container.refresh();
    container
  }

  pub fn state(&self) -> &EscrowState {
    &self.state
  }

  pub fn scope(&self) -> &WorkspaceScope {
    self.api.scope()
  }

  fn dispatch(&mut self, action: Action) {
    self.state.reduce(action);
  }

  // --------------------------------------------------------------------------
  // Fetch orchestration
  // --------------------------------------------------------------------------

  /// Switch workspace and reload everything.
  pub fn set_workspace(&mut self, scope: WorkspaceScope) {
    if self.api.scope() == &scope {
      return;
    }
    self.api.set_scope(scope);
    self.refresh();
  }

  /// Re-issue every slice's fetch with its current parameters.
  pub fn refresh(&mut self) {
    self.refresh_overview();
    self.refresh_accounts();
    self.refresh_transactions();
  }

  pub fn refresh_overview(&mut self) {
    let api = self.api.clone();
    self.dispatch(Action::OverviewRequest);
    self
      .overview_request
      .start(move |signal| async move { api.overview(Some(signal)).await });
  }

  pub fn refresh_accounts(&mut self) {
    let api = self.api.clone();
    let filters = self.state.accounts.filters.clone();
    let pagination = self.state.accounts.pagination;
    self.dispatch(Action::AccountsRequest);
    self.accounts_request.start(move |signal| async move {
      api.list_accounts(&filters, &pagination, Some(signal)).await
    });
  }

  pub fn refresh_transactions(&mut self) {
    let api = self.api.clone();
    let filters = self.state.transactions.filters.clone();
    let pagination = self.state.transactions.pagination;
    self.dispatch(Action::TransactionsRequest);
    self.transactions_request.start(move |signal| async move {
      api.list_transactions(&filters, &pagination, Some(signal)).await
    });
  }

  pub fn set_account_filters(&mut self, filters: AccountFilters) {
    self.dispatch(Action::AccountFilters(filters));
    self.refresh_accounts();
  }

  pub fn set_account_pagination(&mut self, change: PaginationChange) {
    self.dispatch(Action::AccountPagination(change));
    self.refresh_accounts();
  }

  pub fn set_transaction_filters(&mut self, filters: TransactionFilters) {
    self.dispatch(Action::TransactionFilters(filters));
    self.refresh_transactions();
  }

  pub fn set_transaction_pagination(&mut self, change: PaginationChange) {
    self.dispatch(Action::TransactionPagination(change));
    self.refresh_transactions();
  }

  /// Apply any finished fetches. Returns true when state changed.
  pub fn poll(&mut self) -> bool {
    let mut changed = false;
    if let Some(result) = self.overview_request.poll() {
      self.apply_overview(result);
      changed = true;
    }
    if let Some(result) = self.accounts_request.poll() {
      self.apply_accounts(result);
      changed = true;
    }
    if let Some(result) = self.transactions_request.poll() {
      self.apply_transactions(result);
      changed = true;
    }
    changed
  }

  /// Wait for every pending fetch and apply the results.
  pub async fn settle(&mut self) {
    if let Some(result) = self.overview_request.settle().await {
      self.apply_overview(result);
    }
    if let Some(result) = self.accounts_request.settle().await {
      self.apply_accounts(result);
    }
    if let Some(result) = self.transactions_request.settle().await {
      self.apply_transactions(result);
    }
  }

  fn apply_overview(&mut self, result: Result<Overview, ApiError>) {
    match result {
      Ok(overview) => self.dispatch(Action::OverviewSuccess(overview)),
      Err(e) => {
        warn!(error = %e, "failed to load escrow overview");
        self.dispatch(Action::OverviewFailure(e.to_string()));
        self.trigger_toast(Some(&format!("Failed to load escrow overview: {}", e)), ToastTone::Error);
      }
    }
  }

  fn apply_accounts(&mut self, result: Result<Page<Account>, ApiError>) {
    match result {
      Ok(page) => self.dispatch(Action::AccountsSuccess(page)),
      Err(e) => {
        warn!(error = %e, "failed to load escrow accounts");
        self.dispatch(Action::AccountsFailure(e.to_string()));
        self.trigger_toast(Some(&format!("Failed to load escrow accounts: {}", e)), ToastTone::Error);
      }
    }
  }

  fn apply_transactions(&mut self, result: Result<Page<Transaction>, ApiError>) {
    match result {
      Ok(page) => self.dispatch(Action::TransactionsSuccess(page)),
      Err(e) => {
        warn!(error = %e, "failed to load escrow transactions");
        self.dispatch(Action::TransactionsFailure(e.to_string()));
        self.trigger_toast(
          Some(&format!("Failed to load escrow transactions: {}", e)),
          ToastTone::Error,
        );
      }
    }
  }

  // --------------------------------------------------------------------------
  // Mutations
  // --------------------------------------------------------------------------

  /// Create or update an account depending on whether the draft has an id.
  pub async fn save_account(&mut self, draft: &AccountDraft) -> Result<Value, EscrowError> {
    let body = draft.to_payload()?;
    let result = match draft.id {
      Some(id) => self.api.update_account(id, body).await,
      None => self.api.create_account(body).await,
    };
    let message = if draft.id.is_some() {
      "Escrow account updated"
    } else {
      "Escrow account created"
    };

    let saved = self.finish_write(result, message, "save escrow account")?;
    self.dispatch(Action::CloseAccountDrawer);
    self.refresh_accounts();
    Ok(saved)
  }

  /// Stamp the account as reconciled now.
  pub async fn reconcile_account(&mut self, id: i64) -> Result<Value, EscrowError> {
    let result = self.api.reconcile_account(id).await;
    let saved = self.finish_write(result, "Account reconciled", "reconcile account")?;
    self.refresh_accounts();
    Ok(saved)
  }

  /// Record or update a transaction.
  ///
  /// Validation errors are returned before any request is made.
  pub async fn save_transaction(&mut self, draft: &TransactionDraft) -> Result<Value, EscrowError> {
    let body = draft.to_payload()?;
    let result = match draft.id {
      Some(id) => self.api.update_transaction(id, body).await,
      None => self.api.create_transaction(body).await,
    };
    let message = if draft.id.is_some() {
      "Transaction updated"
    } else {
      "Transaction recorded"
    };

    let saved = self.finish_write(result, message, "save transaction")?;
    self.dispatch(Action::CloseTransactionDrawer);
    self.refresh_transactions();
    self.refresh_overview();
    Ok(saved)
  }

  pub async fn release_transaction(&mut self, id: i64) -> Result<Value, EscrowError> {
    let result = self.api.release_transaction(id, &self.session.user_id).await;
    let saved = self.finish_write(result, "Funds released", "release transaction")?;
    self.refresh_transactions();
    self.refresh_overview();
    Ok(saved)
  }

  pub async fn refund_transaction(&mut self, id: i64) -> Result<Value, EscrowError> {
    let result = self.api.refund_transaction(id, &self.session.user_id).await;
    let saved = self.finish_write(result, "Transaction refunded", "refund transaction")?;
    self.refresh_transactions();
    self.refresh_overview();
    Ok(saved)
  }

  pub async fn save_settings(&mut self, draft: &SettingsDraft) -> Result<Value, EscrowError> {
    let body = draft.to_payload()?;
    let result = self.api.update_settings(body).await;
    let saved = self.finish_write(result, "Escrow settings saved", "save escrow settings")?;
    self.dispatch(Action::SettingsDraft(None));
    self.refresh_overview();
    Ok(saved)
  }

  /// Toast the outcome of a write. On failure the drafts are left untouched.
  fn finish_write(
    &mut self,
    result: Result<Value, ApiError>,
    success: &str,
    what: &str,
  ) -> Result<Value, EscrowError> {
    match result {
      Ok(value) => {
        info!(action = what, "escrow write succeeded");
        self.trigger_toast(Some(success), ToastTone::Success);
        Ok(value)
      }
      Err(e) => {
        warn!(action = what, error = %e, "escrow write failed");
        self.trigger_toast(Some(&format!("Could not {}: {}", what, e)), ToastTone::Error);
        Err(e.into())
      }
    }
  }

  // --------------------------------------------------------------------------
  // Drawers and toast
  // --------------------------------------------------------------------------

  pub fn open_account_drawer(&mut self, account: Option<&Account>) {
    self.dispatch(Action::OpenAccountDrawer(AccountDraft::seed(account)));
  }

  pub fn close_account_drawer(&mut self) {
    self.dispatch(Action::CloseAccountDrawer);
  }

  pub fn account_draft_mut(&mut self) -> Option<&mut AccountDraft> {
    self.state.account_drawer.draft.as_mut()
  }

  pub fn open_transaction_drawer(&mut self, transaction: Option<&Transaction>) {
    self.dispatch(Action::OpenTransactionDrawer(TransactionDraft::seed(
      transaction,
    )));
  }

  pub fn close_transaction_drawer(&mut self) {
    self.dispatch(Action::CloseTransactionDrawer);
  }

  pub fn transaction_draft_mut(&mut self) -> Option<&mut TransactionDraft> {
    self.state.transaction_drawer.draft.as_mut()
  }

  /// Seed the settings form from the loaded overview.
  pub fn open_settings(&mut self) {
    let settings = self.state.overview.data.as_ref().map(|o| &o.settings);
    let draft = SettingsDraft::seed(settings);
    self.dispatch(Action::SettingsDraft(Some(draft)));
  }

  pub fn close_settings(&mut self) {
    self.dispatch(Action::SettingsDraft(None));
  }

  pub fn settings_draft_mut(&mut self) -> Option<&mut SettingsDraft> {
    self.state.settings_draft.as_mut()
  }

  pub fn dismiss_toast(&mut self) {
    self.dispatch(Action::Toast(None));
  }

  /// Replace the toast. `None` or an empty message clears it.
  pub fn trigger_toast(&mut self, message: Option<&str>, tone: ToastTone) {
    let toast = message.filter(|m| !m.is_empty()).map(|m| Toast {
      message: m.to_string(),
      tone,
      at: Utc::now(),
    });
    self.dispatch(Action::Toast(toast));
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use crate::http::testing::FakeTransport;
  use std::sync::Arc;

  const ACCOUNTS: &str = "/escrow/accounts";
  const TRANSACTIONS: &str = "/escrow/transactions";
  const OVERVIEW: &str = "/escrow/overview";

  fn session() -> Session {
    Session {
      user_id: "u-42".to_string(),
    }
  }

  fn accounts(names: &[&str]) -> Value {
    let rows: Vec<Value> = names
      .iter()
      .enumerate()
      .map(|(i, name)| json!({"id": i as i64 + 1, "name": name, "status": "active"}))
      .collect();
    json!({"accounts": rows, "total": 60})
  }

  fn scripted() -> Arc<FakeTransport> {
    let fake = FakeTransport::new();
    fake.respond("GET", OVERVIEW, Ok(json!({"totals": {"held": 100}})));
    fake.respond("GET", ACCOUNTS, Ok(accounts(&["Acme", "Globex"])));
    fake.respond(
      "GET",
      TRANSACTIONS,
      Ok(json!({"transactions": [{"id": 9, "accountId": 1, "amount": 50}], "total": 1})),
    );
    fake
  }

  async fn mounted(fake: &Arc<FakeTransport>) -> EscrowContainer {
    let api = EscrowApi::new(
      fake.clone(),
      WorkspaceScope {
        workspace_id: None,
        workspace_slug: Some("acme".into()),
      },
    );
    let mut container = EscrowContainer::mount(api, session(), 25);
    container.settle().await;
    container
  }

  #[tokio::test]
  async fn test_mount_fetches_three_slices() {
    let fake = scripted();
    let container = mounted(&fake).await;

    assert_eq!(fake.calls().len(), 3);
    let state = container.state();
    assert_eq!(state.overview.data.as_ref().map(|o| o.totals.held), Some(100.0));
    assert_eq!(state.accounts.list.len(), 2);
    assert_eq!(state.accounts.pagination.total, 60);
    assert_eq!(state.transactions.list[0].id, 9);
    assert!(!state.accounts.loading);

    let call = fake.last_call("GET", ACCOUNTS).unwrap();
    assert_eq!(call.params.get("workspaceSlug").map(String::as_str), Some("acme"));
  }

  #[tokio::test]
  async fn test_search_resets_offset_and_discards_superseded_fetch() {
    let fake = scripted();
    let mut container = mounted(&fake).await;
    container.set_account_pagination(PaginationChange::offset(25));
    container.settle().await;

    // A slow page fetch that ignores the abort and still answers
    let slow = fake.enqueue_gated_ignoring_abort("GET", ACCOUNTS, Ok(accounts(&["Stale"])));
    container.refresh_accounts();
    while fake.calls_to("GET", ACCOUNTS).len() < 3 {
      tokio::task::yield_now().await;
    }

    fake.enqueue("GET", ACCOUNTS, Ok(accounts(&["Acme"])));
    container.set_account_filters(AccountFilters {
      status: None,
      search: "acme".into(),
    });
    assert_eq!(container.state().accounts.pagination.offset, 0);
    assert!(container.state().accounts.loading);
    assert_eq!(container.state().accounts.list.len(), 2);

    slow.notify_one();
    container.settle().await;
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    container.poll();

    let names: Vec<&str> = container
      .state()
      .accounts
      .list
      .iter()
      .map(|a| a.name.as_str())
      .collect();
    assert_eq!(names, vec!["Acme"]);

    let last = fake.last_call("GET", ACCOUNTS).unwrap();
    assert_eq!(last.params.get("search").map(String::as_str), Some("acme"));
    assert_eq!(last.params.get("offset").map(String::as_str), Some("0"));
  }

  #[tokio::test]
  async fn test_fetch_failure_sets_error_and_toast_keeps_list() {
    let fake = scripted();
    let mut container = mounted(&fake).await;

    fake.enqueue(
      "GET",
      TRANSACTIONS,
      Err(ApiError::Status {
        status: 500,
        message: "db down".into(),
      }),
    );
    container.refresh_transactions();
    container.settle().await;

    let state = container.state();
    assert!(state.transactions.error.is_some());
    assert_eq!(state.transactions.list.len(), 1);
    assert_eq!(state.toast.as_ref().map(|t| t.tone), Some(ToastTone::Error));
  }

  #[tokio::test]
  async fn test_cancelled_fetch_is_silent() {
    let fake = scripted();
    let mut container = mounted(&fake).await;

    fake.enqueue("GET", OVERVIEW, Err(ApiError::Cancelled));
    container.refresh_overview();
    container.settle().await;

    let state = container.state();
    assert!(state.overview.error.is_none());
    assert!(state.toast.is_none());
  }

  #[tokio::test]
  async fn test_save_transaction_coerces_and_refreshes() {
    let fake = scripted();
    fake.respond("POST", TRANSACTIONS, Ok(json!({"id": 10})));
    let mut container = mounted(&fake).await;
    container.open_transaction_drawer(None);

    let draft = TransactionDraft {
      account_id: "1".into(),
      amount: "500".into(),
      fee_amount: "12".into(),
      metadata: r#"{"projectId":1}"#.into(),
      ..TransactionDraft::default()
    };
    container.save_transaction(&draft).await.unwrap();

    let body = fake.last_call("POST", TRANSACTIONS).unwrap().body.unwrap();
    assert_eq!(body["accountId"], json!(1));
    assert_eq!(body["amount"], json!(500));
    assert_eq!(body["feeAmount"], json!(12));
    assert_eq!(body["metadata"], json!({"projectId": 1}));
    assert_eq!(body["workspaceSlug"], json!("acme"));

    assert!(!container.state().transaction_drawer.is_open());
    assert_eq!(
      container.state().toast.as_ref().map(|t| t.message.as_str()),
      Some("Transaction recorded")
    );

    container.settle().await;
    assert_eq!(fake.calls_to("GET", TRANSACTIONS).len(), 2);
    assert_eq!(fake.calls_to("GET", OVERVIEW).len(), 2);
    assert_eq!(fake.calls_to("GET", ACCOUNTS).len(), 1);
  }

  #[tokio::test]
  async fn test_save_transaction_rejects_before_network() {
    let fake = scripted();
    let mut container = mounted(&fake).await;
    let before = fake.calls().len();

    let draft = TransactionDraft {
      account_id: "".into(),
      amount: "500".into(),
      ..TransactionDraft::default()
    };
    let err = container.save_transaction(&draft).await.unwrap_err();

    assert!(matches!(err, EscrowError::Validation(_)));
    assert_eq!(fake.calls().len(), before);
  }

  #[tokio::test]
  async fn test_write_failure_keeps_drawer_open() {
    let fake = scripted();
    fake.respond(
      "PATCH",
      "/escrow/accounts/1",
      Err(ApiError::Status {
        status: 422,
        message: "name taken".into(),
      }),
    );
    let mut container = mounted(&fake).await;
    let account = container.state().accounts.list[0].clone();
    container.open_account_drawer(Some(&account));
    if let Some(draft) = container.account_draft_mut() {
      draft.name = "Globex".into();
    }

    let draft = container.state().account_drawer.draft.clone().unwrap();
    let err = container.save_account(&draft).await.unwrap_err();

    assert!(matches!(err, EscrowError::Api(ApiError::Status { status: 422, .. })));
    assert_eq!(
      container.state().account_drawer.draft.as_ref().map(|d| d.name.as_str()),
      Some("Globex")
    );
    assert_eq!(container.state().toast.as_ref().map(|t| t.tone), Some(ToastTone::Error));
  }

  #[tokio::test]
  async fn test_save_account_routes_by_id() {
    let fake = scripted();
    fake.respond("POST", ACCOUNTS, Ok(json!({"id": 3})));
    fake.respond("PATCH", "/escrow/accounts/1", Ok(json!({"id": 1})));
    let mut container = mounted(&fake).await;

    let create = AccountDraft {
      name: "Initech".into(),
      metadata: "retainer".into(),
      ..AccountDraft::default()
    };
    container.save_account(&create).await.unwrap();
    let body = fake.last_call("POST", ACCOUNTS).unwrap().body.unwrap();
    assert_eq!(body["metadata"], json!({"note": "retainer"}));

    let update = AccountDraft {
      id: Some(1),
      ..create
    };
    container.save_account(&update).await.unwrap();
    assert_eq!(fake.calls_to("PATCH", "/escrow/accounts/1").len(), 1);
  }

  #[tokio::test]
  async fn test_reconcile_stamps_timestamp() {
    let fake = scripted();
    fake.respond("PATCH", "/escrow/accounts/2", Ok(json!({"id": 2})));
    let mut container = mounted(&fake).await;

    container.reconcile_account(2).await.unwrap();
    let body = fake.last_call("PATCH", "/escrow/accounts/2").unwrap().body.unwrap();
    let stamped = body["lastReconciledAt"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(stamped).is_ok());

    container.settle().await;
    assert_eq!(fake.calls_to("GET", ACCOUNTS).len(), 2);
  }

  #[tokio::test]
  async fn test_release_and_refund_send_actor() {
    let fake = scripted();
    fake.respond("POST", "/escrow/transactions/9/release", Ok(json!({"status": "released"})));
    fake.respond("POST", "/escrow/transactions/9/refund", Ok(json!({"status": "refunded"})));
    let mut container = mounted(&fake).await;

    container.release_transaction(9).await.unwrap();
    container.refund_transaction(9).await.unwrap();

    for path in ["/escrow/transactions/9/release", "/escrow/transactions/9/refund"] {
      let body = fake.last_call("POST", path).unwrap().body.unwrap();
      assert_eq!(body["actorId"], json!("u-42"));
    }
    container.settle().await;
    assert_eq!(fake.calls_to("GET", OVERVIEW).len(), 3);
  }

  #[tokio::test]
  async fn test_settings_seed_and_save() {
    let fake = scripted();
    fake.respond("PATCH", "/escrow/settings", Ok(json!({"ok": true})));
    let mut container = mounted(&fake).await;

    container.open_settings();
    if let Some(draft) = container.settings_draft_mut() {
      draft.auto_release_days = "10".into();
      draft.require_dual_approval = "on".into();
    }
    let draft = container.state().settings_draft.clone().unwrap();
    container.save_settings(&draft).await.unwrap();

    let body = fake.last_call("PATCH", "/escrow/settings").unwrap().body.unwrap();
    assert_eq!(body["autoReleaseDays"], json!(10));
    assert_eq!(body["requireDualApproval"], json!(true));
    assert!(container.state().settings_draft.is_none());
  }

  #[tokio::test]
  async fn test_workspace_change_refetches_all() {
    let fake = scripted();
    let mut container = mounted(&fake).await;

    container.set_workspace(WorkspaceScope {
      workspace_id: Some(3),
      workspace_slug: None,
    });
    container.settle().await;
    assert_eq!(fake.calls().len(), 6);
    let call = fake.last_call("GET", TRANSACTIONS).unwrap();
    assert_eq!(call.params.get("workspaceId").map(String::as_str), Some("3"));

    container.set_workspace(container.scope().clone());
    assert_eq!(fake.calls().len(), 6);
  }

  #[tokio::test]
  async fn test_toast_replace_and_clear() {
    let fake = scripted();
    let mut container = mounted(&fake).await;

    container.trigger_toast(Some("first"), ToastTone::Info);
    container.trigger_toast(Some("second"), ToastTone::Success);
    assert_eq!(
      container.state().toast.as_ref().map(|t| t.message.as_str()),
      Some("second")
    );

    container.trigger_toast(Some(""), ToastTone::Success);
    assert!(container.state().toast.is_none());
    container.trigger_toast(Some("again"), ToastTone::Success);
    container.trigger_toast(None, ToastTone::Success);
    assert!(container.state().toast.is_none());
  }
}
