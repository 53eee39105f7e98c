use clap::{Args, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::Display;
use tracing::info;

use crate::escrow::{AccountFilters, Pagination, SettingsDraft, TransactionDraft, TransactionFilters};
use crate::services::Services;
use crate::support_desk::SnapshotOptions;

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Print the support desk snapshot and where it came from
  Snapshot {
    /// Skip the cache and the server-side cache hint
    #[arg(long)]
    force: bool,
    /// Fail instead of falling back to cached data
    #[arg(long)]
    no_stale: bool,
  },
  /// List escrow accounts
  Accounts {
    #[command(flatten)]
    page: PageArgs,
  },
  /// List escrow transactions
  Transactions {
    #[command(flatten)]
    page: PageArgs,
    /// Transaction type, e.g. deposit, release, refund
    #[arg(long = "type")]
    kind: Option<String>,
  },
  /// Record a new escrow transaction
  RecordTransaction(RecordArgs),
  /// Release a held transaction
  Release { id: i64 },
  /// Refund a transaction
  Refund { id: i64 },
  /// Mark an account as reconciled now
  Reconcile { id: i64 },
  /// Update escrow settings; omitted values keep their current setting
  Settings(SettingsArgs),
}

#[derive(Args, Debug)]
pub struct PageArgs {
  #[arg(long)]
  status: Option<String>,
  #[arg(long, default_value = "")]
  search: String,
  #[arg(long)]
  limit: Option<u32>,
  #[arg(long, default_value_t = 0)]
  offset: u32,
}

impl PageArgs {
  fn pagination(&self, default_limit: u32) -> Pagination {
    let mut pagination = Pagination::new(self.limit.unwrap_or(default_limit));
    pagination.offset = self.offset;
    pagination
  }
}

#[derive(Args, Debug)]
pub struct RecordArgs {
  #[arg(long)]
  account_id: String,
  #[arg(long)]
  amount: String,
  #[arg(long)]
  fee: Option<String>,
  #[arg(long = "type")]
  kind: Option<String>,
  #[arg(long)]
  status: Option<String>,
  #[arg(long)]
  currency: Option<String>,
  /// Local time such as 2026-10-15T14:30, or RFC 3339
  #[arg(long)]
  occurred_at: Option<String>,
  /// JSON object, or free text stored as a note
  #[arg(long)]
  metadata: Option<String>,
  #[arg(long)]
  description: Option<String>,
  #[arg(long)]
  reference: Option<String>,
}

impl RecordArgs {
  fn into_draft(self) -> TransactionDraft {
    let defaults = TransactionDraft::default();
    TransactionDraft {
      account_id: self.account_id,
      amount: self.amount,
      fee_amount: self.fee.unwrap_or(defaults.fee_amount),
      kind: self.kind.unwrap_or(defaults.kind),
      status: self.status.unwrap_or(defaults.status),
      currency: self.currency.unwrap_or(defaults.currency),
      occurred_at: self.occurred_at.unwrap_or_default(),
      metadata: self.metadata.unwrap_or_default(),
      description: self.description.unwrap_or_default(),
      reference: self.reference.unwrap_or_default(),
      ..defaults
    }
  }
}

#[derive(Args, Debug)]
pub struct SettingsArgs {
  #[arg(long)]
  auto_release_days: Option<String>,
  #[arg(long)]
  hold_period_hours: Option<String>,
  #[arg(long)]
  fee_percent: Option<String>,
  #[arg(long)]
  require_dual_approval: Option<String>,
  #[arg(long)]
  notify_on_release: Option<String>,
}

impl SettingsArgs {
  fn apply(self, draft: &mut SettingsDraft) {
    let overrides = [
      (self.auto_release_days, &mut draft.auto_release_days),
      (self.hold_period_hours, &mut draft.hold_period_hours),
      (self.fee_percent, &mut draft.fee_percent),
      (self.require_dual_approval, &mut draft.require_dual_approval),
      (self.notify_on_release, &mut draft.notify_on_release),
    ];
    for (value, field) in overrides {
      if let Some(value) = value {
        *field = value;
      }
    }
  }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  let text = serde_json::to_string_pretty(value)
    .map_err(|e| eyre!("Failed to encode output: {}", e))?;
  println!("{}", text);
  Ok(())
}

fn write_result<E: Display>(result: std::result::Result<Value, E>, action: &str) -> Result<()> {
  match result {
    Ok(value) => {
      info!(action, "escrow write succeeded");
      print_json(&value)
    }
    Err(e) => Err(eyre!("Failed to {}: {}", action, e)),
  }
}

pub async fn run(command: Command, services: Services) -> Result<()> {
  match command {
    Command::Snapshot { force, no_stale } => {
      let options = SnapshotOptions {
        force_refresh: force,
        allow_stale_on_error: !no_stale,
        ..SnapshotOptions::default()
      };
      let snapshot = services
        .snapshots
        .get_snapshot(&services.session.user_id, options)
        .await
        .map_err(|e| eyre!("Failed to load support desk snapshot: {}", e))?;
      if snapshot.stale {
        eprintln!("warning: serving cached data, the support desk API is unavailable");
      }
      print_json(&json!({
        "cachedAt": snapshot.cached_at.to_rfc3339(),
        "fromCache": snapshot.from_cache,
        "stale": snapshot.stale,
        "data": snapshot.data,
      }))
    }
    Command::Accounts { page } => {
      let filters = AccountFilters {
        status: page.status.clone(),
        search: page.search.clone(),
      };
      let result = services
        .escrow_api()
        .list_accounts(&filters, &page.pagination(services.page_size), None)
        .await
        .map_err(|e| eyre!("Failed to list escrow accounts: {}", e))?;
      print_json(&json!({ "total": result.total, "accounts": result.items }))
    }
    Command::Transactions { page, kind } => {
      let filters = TransactionFilters {
        status: page.status.clone(),
        kind,
        search: page.search.clone(),
      };
      let result = services
        .escrow_api()
        .list_transactions(&filters, &page.pagination(services.page_size), None)
        .await
        .map_err(|e| eyre!("Failed to list escrow transactions: {}", e))?;
      print_json(&json!({ "total": result.total, "transactions": result.items }))
    }
    Command::RecordTransaction(args) => {
      let body = match args.into_draft().to_payload() {
        Ok(body) => body,
        Err(e) => return write_result(Err(e), "record transaction"),
      };
      let result = services.escrow_api().create_transaction(body).await;
      write_result(result, "record transaction")
    }
    Command::Release { id } => {
      let result = services
        .escrow_api()
        .release_transaction(id, &services.session.user_id)
        .await;
      write_result(result, "release transaction")
    }
    Command::Refund { id } => {
      let result = services
        .escrow_api()
        .refund_transaction(id, &services.session.user_id)
        .await;
      write_result(result, "refund transaction")
    }
    Command::Reconcile { id } => {
      write_result(services.escrow_api().reconcile_account(id).await, "reconcile account")
    }
    Command::Settings(args) => {
      let api = services.escrow_api();
      let overview = api
        .overview(None)
        .await
        .map_err(|e| eyre!("Failed to load current escrow settings: {}", e))?;
      let mut draft = SettingsDraft::seed(Some(&overview.settings));
      args.apply(&mut draft);
      let body = match draft.to_payload() {
        Ok(body) => body,
        Err(e) => return write_result(Err(e), "save escrow settings"),
      };
      write_result(api.update_settings(body).await, "save escrow settings")
    }
  }
}
