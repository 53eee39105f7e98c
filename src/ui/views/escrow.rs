use crate::escrow::{
  Account, AccountDraft, AccountFilters, EscrowContainer, EscrowError, SettingsDraft, Toast,
  ToastTone, Transaction, TransactionDraft, TransactionFilters, WorkspaceScope,
};
use crate::config::duration_secs;
use crate::ui::components::{Form, FormEvent, KeyResult, SearchEvent, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{format_money, status_color, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use async_trait::async_trait;
use chrono::{Duration, Local, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs};
use serde_json::Value;

const ACCOUNT_STATUSES: &[&str] = &["active", "frozen", "closed"];
const TRANSACTION_STATUSES: &[&str] = &["pending", "held", "released", "refunded"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
  Accounts,
  Transactions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormKind {
  Account,
  Transaction,
  Settings,
}

/// Escrow dashboard: overview, accounts and transactions for one workspace
///
/// Reads run in the background through the container's request slots. Writes
/// (form submit, `c`, `R`, `F`) are awaited inside `handle_key`, so ticks and
/// redraws pause until the write returns or `api.timeout_secs` elapses.
pub struct EscrowView {
  container: EscrowContainer,
  tab: Tab,
  accounts_state: ListState,
  transactions_state: ListState,
  search: SearchInput,
  form: Option<(FormKind, Form)>,
  toast_ttl: Duration,
}

impl EscrowView {
  pub fn new(container: EscrowContainer, toast_secs: u64) -> Self {
    Self {
      container,
      tab: Tab::Accounts,
      accounts_state: ListState::default(),
      transactions_state: ListState::default(),
      search: SearchInput::new(),
      form: None,
      toast_ttl: duration_secs(toast_secs),
    }
  }

  fn selected_account(&self) -> Option<&Account> {
    let idx = self.accounts_state.selected()?;
    self.container.state().accounts.list.get(idx)
  }

  fn selected_transaction(&self) -> Option<&Transaction> {
    let idx = self.transactions_state.selected()?;
    self.container.state().transactions.list.get(idx)
  }

  fn current_search(&self) -> String {
    let state = self.container.state();
    match self.tab {
      Tab::Accounts => state.accounts.filters.search.clone(),
      Tab::Transactions => state.transactions.filters.search.clone(),
    }
  }

  fn apply_search(&mut self, query: String) {
    let state = self.container.state();
    match self.tab {
      Tab::Accounts => {
        let filters = AccountFilters {
          search: query,
          ..state.accounts.filters.clone()
        };
        self.container.set_account_filters(filters);
      }
      Tab::Transactions => {
        let filters = TransactionFilters {
          search: query,
          ..state.transactions.filters.clone()
        };
        self.container.set_transaction_filters(filters);
      }
    }
  }

  /// Step the status filter: all, then each known status in turn
  fn cycle_status(&mut self) {
    let state = self.container.state();
    match self.tab {
      Tab::Accounts => {
        let filters = AccountFilters {
          status: next_status(state.accounts.filters.status.as_deref(), ACCOUNT_STATUSES),
          ..state.accounts.filters.clone()
        };
        self.container.set_account_filters(filters);
      }
      Tab::Transactions => {
        let filters = TransactionFilters {
          status: next_status(
            state.transactions.filters.status.as_deref(),
            TRANSACTION_STATUSES,
          ),
          ..state.transactions.filters.clone()
        };
        self.container.set_transaction_filters(filters);
      }
    }
  }

  fn page(&mut self, forward: bool) {
    let state = self.container.state();
    let pagination = match self.tab {
      Tab::Accounts => state.accounts.pagination,
      Tab::Transactions => state.transactions.pagination,
    };
    let change = if forward && pagination.has_next() {
      pagination.next()
    } else if !forward && pagination.offset > 0 {
      pagination.previous()
    } else {
      return;
    };
    match self.tab {
      Tab::Accounts => self.container.set_account_pagination(change),
      Tab::Transactions => self.container.set_transaction_pagination(change),
    }
  }

  // --------------------------------------------------------------------------
  // Forms
  // --------------------------------------------------------------------------

  fn open_account_form(&mut self, edit: bool) {
    let account = if edit { self.selected_account().cloned() } else { None };
    self.container.open_account_drawer(account.as_ref());
    if let Some(draft) = &self.container.state().account_drawer.draft {
      self.form = Some((FormKind::Account, account_form(draft)));
    }
  }

  fn open_transaction_form(&mut self, edit: bool) {
    let transaction = if edit {
      self.selected_transaction().cloned()
    } else {
      None
    };
    self.container.open_transaction_drawer(transaction.as_ref());
    if transaction.is_none() {
      // Preselect the highlighted account for new transactions
      let account_id = self.selected_account().map(|a| a.id);
      if let (Some(draft), Some(id)) = (self.container.transaction_draft_mut(), account_id) {
        draft.account_id = id.to_string();
      }
    }
    if let Some(draft) = &self.container.state().transaction_drawer.draft {
      self.form = Some((FormKind::Transaction, transaction_form(draft)));
    }
  }

  fn open_settings_form(&mut self) {
    self.container.open_settings();
    if let Some(draft) = &self.container.state().settings_draft {
      self.form = Some((FormKind::Settings, settings_form(draft)));
    }
  }

  fn close_form(&mut self, kind: FormKind) {
    match kind {
      FormKind::Account => self.container.close_account_drawer(),
      FormKind::Transaction => self.container.close_transaction_drawer(),
      FormKind::Settings => self.container.close_settings(),
    }
    self.form = None;
  }

  /// Copy the form into its draft and save. The form stays open on error.
  async fn submit_form(&mut self, kind: FormKind) {
    let Some((_, form)) = &self.form else {
      return;
    };

    let result: Result<Value, EscrowError> = match kind {
      FormKind::Account => {
        let Some(draft) = self.container.account_draft_mut() else {
          return;
        };
        apply_account_form(form, draft);
        let draft = draft.clone();
        self.container.save_account(&draft).await
      }
      FormKind::Transaction => {
        let Some(draft) = self.container.transaction_draft_mut() else {
          return;
        };
        apply_transaction_form(form, draft);
        let draft = draft.clone();
        self.container.save_transaction(&draft).await
      }
      FormKind::Settings => {
        let Some(draft) = self.container.settings_draft_mut() else {
          return;
        };
        apply_settings_form(form, draft);
        let draft = draft.clone();
        self.container.save_settings(&draft).await
      }
    };

    match result {
      Ok(_) => self.form = None,
      Err(e) => {
        if let Some((_, form)) = &mut self.form {
          form.set_error(Some(e.to_string()));
        }
      }
    }
  }

  // --------------------------------------------------------------------------
  // Rendering
  // --------------------------------------------------------------------------

  fn render_overview(&self, frame: &mut Frame, area: Rect) {
    let overview = &self.container.state().overview;
    let mut lines = Vec::new();

    match &overview.data {
      Some(data) => {
        let currency = data.currency.as_deref();
        let totals = &data.totals;
        lines.push(Line::from(vec![
          Span::styled(" Held ", Style::default().fg(Color::Gray)),
          Span::styled(format_money(totals.held, currency), Style::default().fg(Color::Yellow).bold()),
          Span::styled("   Released ", Style::default().fg(Color::Gray)),
          Span::styled(format_money(totals.released, currency), Style::default().fg(Color::Green)),
          Span::styled("   Refunded ", Style::default().fg(Color::Gray)),
          Span::styled(format_money(totals.refunded, currency), Style::default().fg(Color::Red)),
          Span::styled("   Fees ", Style::default().fg(Color::Gray)),
          Span::raw(format_money(totals.fees, currency)),
        ]));
        let settings = &data.settings;
        lines.push(Line::styled(
          format!(
            " {} pending · {} accounts · auto-release {}d · hold {}h · fee {}%{}",
            totals.pending_count,
            totals.account_count,
            settings.auto_release_days,
            settings.hold_period_hours,
            settings.fee_percent,
            if settings.require_dual_approval { " · dual approval" } else { "" }
          ),
          Style::default().fg(Color::DarkGray),
        ));
      }
      None if overview.loading => lines.push(Line::raw(" Loading overview...")),
      None => lines.push(Line::raw(" No overview yet. Press r to retry.")),
    }
    if let Some(error) = &overview.error {
      lines.push(Line::styled(format!(" {}", error), Style::default().fg(Color::Red)));
    }

    let title = format!(" Escrow [{}] ", self.container.scope().label());
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    frame.render_widget(Paragraph::new(lines).block(block), area);
  }

  fn render_tabs(&self, frame: &mut Frame, area: Rect) {
    let state = self.container.state();
    let (pagination, status, search) = match self.tab {
      Tab::Accounts => (
        state.accounts.pagination,
        state.accounts.filters.status.as_deref(),
        state.accounts.filters.search.as_str(),
      ),
      Tab::Transactions => (
        state.transactions.pagination,
        state.transactions.filters.status.as_deref(),
        state.transactions.filters.search.as_str(),
      ),
    };

    let chunks = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Length(30), Constraint::Min(0)])
      .split(area);

    let selected = match self.tab {
      Tab::Accounts => 0,
      Tab::Transactions => 1,
    };
    let tabs = Tabs::new(vec!["Accounts", "Transactions"])
      .select(selected)
      .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan))
      .divider("│");
    frame.render_widget(tabs, chunks[0]);

    let mut spans = vec![Span::styled(
      format!("status: {}", status.unwrap_or("all")),
      Style::default().fg(Color::Gray),
    )];
    if !search.is_empty() {
      spans.push(Span::styled(
        format!("   search: {}", truncate(search, 30)),
        Style::default().fg(Color::Yellow),
      ));
    }
    spans.push(Span::styled(
      format!(
        "   page {}/{} ({} total)",
        pagination.page(),
        pagination.page_count(),
        pagination.total
      ),
      Style::default().fg(Color::DarkGray),
    ));
    frame.render_widget(
      Paragraph::new(Line::from(spans)).alignment(Alignment::Right),
      chunks[1],
    );
  }

  fn list_title(label: &str, count: usize, loading: bool, error: Option<&str>) -> String {
    match (loading, error) {
      (true, _) => format!(" {} (loading...) ", label),
      (false, Some(e)) => format!(" {} (error: {}) ", label, truncate(e, 60)),
      _ => format!(" {} ({}) ", label, count),
    }
  }

  fn render_accounts(&mut self, frame: &mut Frame, area: Rect) {
    let slice = &self.container.state().accounts;
    let items: Vec<ListItem> = slice
      .list
      .iter()
      .map(|account| {
        let currency = account.currency.as_deref();
        let reconciled = account
          .last_reconciled_at
          .map(|at| at.with_timezone(&Local).format("%Y-%m-%d").to_string())
          .unwrap_or_else(|| "never".to_string());
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<6}", account.id), Style::default().fg(Color::Cyan)),
          Span::raw(format!("{:<28}", truncate(&account.name, 26))),
          Span::styled(
            format!("{:<22}", truncate(account.client_name.as_deref().unwrap_or("-"), 20)),
            Style::default().fg(Color::Gray),
          ),
          Span::styled(
            format!("{:<9}", account.status),
            Style::default().fg(status_color(&account.status)),
          ),
          Span::raw(format!("{:>18}", format_money(account.balance, currency))),
          Span::styled(
            format!("{:>18}", format_money(account.held_amount, currency)),
            Style::default().fg(Color::Yellow),
          ),
          Span::styled(format!("  {}", reconciled), Style::default().fg(Color::DarkGray)),
        ]))
      })
      .collect();

    let title = Self::list_title(
      "Accounts",
      slice.list.len(),
      slice.loading,
      slice.error.as_deref(),
    );
    let count = items.len();
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if count == 0 {
      let message = if slice.loading { "" } else { "No escrow accounts match." };
      let paragraph = Paragraph::new(message)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let list = List::new(items)
      .block(block)
      .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
      .highlight_symbol("> ");
    ensure_valid_selection(&mut self.accounts_state, count);
    frame.render_stateful_widget(list, area, &mut self.accounts_state);
  }

  fn render_transactions(&mut self, frame: &mut Frame, area: Rect) {
    let slice = &self.container.state().transactions;
    let items: Vec<ListItem> = slice
      .list
      .iter()
      .map(|tx| {
        let currency = tx.currency.as_deref();
        let occurred = tx
          .occurred_at
          .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
          .unwrap_or_default();
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<6}", tx.id), Style::default().fg(Color::Cyan)),
          Span::raw(format!("{:<11}", truncate(&tx.kind, 10))),
          Span::styled(
            format!("{:<10}", tx.status),
            Style::default().fg(status_color(&tx.status)),
          ),
          Span::raw(format!("{:>18}", format_money(tx.amount, currency))),
          Span::styled(
            format!("{:>12}", format_money(tx.fee_amount, None)),
            Style::default().fg(Color::Gray),
          ),
          Span::styled(format!("  acct {:<5}", tx.account_id), Style::default().fg(Color::Gray)),
          Span::styled(format!("{:<17}", occurred), Style::default().fg(Color::DarkGray)),
          Span::raw(truncate(tx.description.as_deref().unwrap_or(""), 40)),
        ]))
      })
      .collect();

    let title = Self::list_title(
      "Transactions",
      slice.list.len(),
      slice.loading,
      slice.error.as_deref(),
    );
    let count = items.len();
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if count == 0 {
      let message = if slice.loading { "" } else { "No transactions match." };
      let paragraph = Paragraph::new(message)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let list = List::new(items)
      .block(block)
      .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
      .highlight_symbol("> ");
    ensure_valid_selection(&mut self.transactions_state, count);
    frame.render_stateful_widget(list, area, &mut self.transactions_state);
  }
}

#[async_trait(?Send)]
impl View for EscrowView {
  async fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some((kind, form)) = &mut self.form {
      let kind = *kind;
      match form.handle_key(key) {
        KeyResult::Event(FormEvent::Submitted) => self.submit_form(kind).await,
        KeyResult::Event(FormEvent::Cancelled) => self.close_form(kind),
        KeyResult::Handled | KeyResult::NotHandled => {}
      }
      return ViewAction::None;
    }

    let current = self.current_search();
    match self.search.handle_key(key, &current) {
      KeyResult::Event(SearchEvent::Submitted(query)) => {
        self.apply_search(query);
        return ViewAction::None;
      }
      KeyResult::Event(SearchEvent::Cancelled) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match (self.tab, key.code) {
      (_, KeyCode::Tab) => {
        self.tab = match self.tab {
          Tab::Accounts => Tab::Transactions,
          Tab::Transactions => Tab::Accounts,
        };
      }
      (Tab::Accounts, KeyCode::Char('j') | KeyCode::Down) => self.accounts_state.select_next(),
      (Tab::Accounts, KeyCode::Char('k') | KeyCode::Up) => self.accounts_state.select_previous(),
      (Tab::Transactions, KeyCode::Char('j') | KeyCode::Down) => {
        self.transactions_state.select_next()
      }
      (Tab::Transactions, KeyCode::Char('k') | KeyCode::Up) => {
        self.transactions_state.select_previous()
      }
      (_, KeyCode::Char(']')) => self.page(true),
      (_, KeyCode::Char('[')) => self.page(false),
      (_, KeyCode::Char('s')) => self.cycle_status(),
      (_, KeyCode::Char('r')) => self.container.refresh(),
      (_, KeyCode::Char('S')) => self.open_settings_form(),
      (Tab::Accounts, KeyCode::Char('n')) => self.open_account_form(false),
      (Tab::Accounts, KeyCode::Char('e') | KeyCode::Enter) => self.open_account_form(true),
      (Tab::Transactions, KeyCode::Char('n')) => self.open_transaction_form(false),
      (Tab::Transactions, KeyCode::Char('e') | KeyCode::Enter) => {
        self.open_transaction_form(true)
      }
      (Tab::Accounts, KeyCode::Char('c')) => {
        if let Some(id) = self.selected_account().map(|a| a.id) {
          // Failures are toasted by the container
          let _ = self.container.reconcile_account(id).await;
        }
      }
      (Tab::Transactions, KeyCode::Char('R')) => {
        if let Some(id) = self.selected_transaction().map(|t| t.id) {
          let _ = self.container.release_transaction(id).await;
        }
      }
      (Tab::Transactions, KeyCode::Char('F')) => {
        if let Some(id) = self.selected_transaction().map(|t| t.id) {
          let _ = self.container.refund_transaction(id).await;
        }
      }
      (_, KeyCode::Char('q') | KeyCode::Esc) => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(5),
        Constraint::Length(1),
        Constraint::Min(3),
      ])
      .split(area);

    self.render_overview(frame, chunks[0]);
    self.render_tabs(frame, chunks[1]);
    match self.tab {
      Tab::Accounts => self.render_accounts(frame, chunks[2]),
      Tab::Transactions => self.render_transactions(frame, chunks[2]),
    }

    self.search.render_overlay(frame, chunks[2]);
    if let Some((_, form)) = &self.form {
      form.render_overlay(frame, area);
    }
  }

  fn breadcrumb_label(&self) -> String {
    format!("Escrow [{}]", self.container.scope().label())
  }

  fn captures_input(&self) -> bool {
    self.form.is_some() || self.search.is_active()
  }

  fn tick(&mut self) {
    self.container.poll();
    let expired = self
      .container
      .state()
      .toast
      .as_ref()
      .is_some_and(|toast| Utc::now() - toast.at >= self.toast_ttl);
    if expired {
      self.container.dismiss_toast();
    }
  }

  fn toast(&self) -> Option<&Toast> {
    self.container.state().toast.as_ref()
  }

  fn set_workspace(&mut self, scope: WorkspaceScope) -> bool {
    if self.container.scope() == &scope {
      return true;
    }
    let message = format!("Switched to {}", scope.label());
    self.container.set_workspace(scope);
    self.container.trigger_toast(Some(&message), ToastTone::Info);
    true
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    let mut shortcuts = vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "search").with_priority(20),
      ShortcutInfo::new("s", "status").with_priority(25),
      ShortcutInfo::new("[ ]", "page").with_priority(30),
      ShortcutInfo::new("n", "new").with_priority(40),
      ShortcutInfo::new("r", "refresh").with_priority(60),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ];
    match self.tab {
      Tab::Accounts => shortcuts.push(ShortcutInfo::new("c", "reconcile").with_priority(50)),
      Tab::Transactions => {
        shortcuts.push(ShortcutInfo::new("R", "release").with_priority(50));
        shortcuts.push(ShortcutInfo::new("F", "refund").with_priority(51));
      }
    }
    shortcuts
  }
}

fn next_status(current: Option<&str>, statuses: &[&str]) -> Option<String> {
  let next = match current {
    None => statuses.first(),
    Some(status) => statuses
      .iter()
      .position(|s| *s == status)
      .and_then(|i| statuses.get(i + 1)),
  };
  next.map(|s| s.to_string())
}

fn account_form(draft: &AccountDraft) -> Form {
  let title = if draft.id.is_some() { "Edit account" } else { "New account" };
  Form::new(title)
    .field("name", "Name", &draft.name)
    .field("clientName", "Client", &draft.client_name)
    .field("status", "Status", &draft.status)
    .field("currency", "Currency", &draft.currency)
    .field("metadata", "Metadata", &compact(&draft.metadata))
}

fn apply_account_form(form: &Form, draft: &mut AccountDraft) {
  draft.name = form.value("name");
  draft.client_name = form.value("clientName");
  draft.status = form.value("status");
  draft.currency = form.value("currency");
  draft.metadata = form.value("metadata");
}

fn transaction_form(draft: &TransactionDraft) -> Form {
  let title = match draft.id {
    Some(id) => format!("Edit transaction #{}", id),
    None => "Record transaction".to_string(),
  };
  Form::new(title)
    .field("accountId", "Account id", &draft.account_id)
    .field("type", "Type", &draft.kind)
    .field("status", "Status", &draft.status)
    .field("amount", "Amount", &draft.amount)
    .field("feeAmount", "Fee", &draft.fee_amount)
    .field("currency", "Currency", &draft.currency)
    .field("description", "Description", &draft.description)
    .field("reference", "Reference", &draft.reference)
    .field("occurredAt", "Occurred at", &draft.occurred_at)
    .field("metadata", "Metadata", &compact(&draft.metadata))
}

fn apply_transaction_form(form: &Form, draft: &mut TransactionDraft) {
  draft.account_id = form.value("accountId");
  draft.kind = form.value("type");
  draft.status = form.value("status");
  draft.amount = form.value("amount");
  draft.fee_amount = form.value("feeAmount");
  draft.currency = form.value("currency");
  draft.description = form.value("description");
  draft.reference = form.value("reference");
  draft.occurred_at = form.value("occurredAt");
  draft.metadata = form.value("metadata");
}

fn settings_form(draft: &SettingsDraft) -> Form {
  Form::new("Escrow settings")
    .field("autoReleaseDays", "Auto-release days", &draft.auto_release_days)
    .field("holdPeriodHours", "Hold period hours", &draft.hold_period_hours)
    .field("feePercent", "Fee percent", &draft.fee_percent)
    .field("requireDualApproval", "Dual approval", &draft.require_dual_approval)
    .field("notifyOnRelease", "Notify on release", &draft.notify_on_release)
}

fn apply_settings_form(form: &Form, draft: &mut SettingsDraft) {
  draft.auto_release_days = form.value("autoReleaseDays");
  draft.hold_period_hours = form.value("holdPeriodHours");
  draft.fee_percent = form.value("feePercent");
  draft.require_dual_approval = form.value("requireDualApproval");
  draft.notify_on_release = form.value("notifyOnRelease");
}

/// Metadata drafts are pretty-printed; a single-line field needs them compact
fn compact(metadata: &str) -> String {
  serde_json::from_str::<Value>(metadata)
    .map(|value| value.to_string())
    .unwrap_or_else(|_| metadata.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::escrow::{EscrowApi, Session};
  use crate::http::testing::FakeTransport;
  use crossterm::event::KeyModifiers;
  use serde_json::json;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  async fn view(fake: &std::sync::Arc<FakeTransport>) -> EscrowView {
    fake.respond("GET", "/escrow/overview", Ok(json!({})));
    fake.respond(
      "GET",
      "/escrow/accounts",
      Ok(json!({"accounts": [{"id": 4, "name": "Acme"}], "total": 1})),
    );
    fake.respond(
      "GET",
      "/escrow/transactions",
      Ok(json!({"transactions": [{"id": 9, "accountId": 4, "amount": 50}], "total": 1})),
    );
    let api = EscrowApi::new(fake.clone(), WorkspaceScope::default());
    let session = Session {
      user_id: "u-1".into(),
    };
    let mut container = EscrowContainer::mount(api, session, 25);
    container.settle().await;
    let mut view = EscrowView::new(container, 4);
    view.accounts_state.select(Some(0));
    view.transactions_state.select(Some(0));
    view
  }

  #[tokio::test]
  async fn test_new_transaction_form_saves_through_container() {
    let fake = FakeTransport::new();
    fake.respond("POST", "/escrow/transactions", Ok(json!({"id": 10})));
    let mut view = view(&fake).await;

    view.handle_key(key(KeyCode::Tab)).await;
    view.handle_key(key(KeyCode::Char('n'))).await;
    assert!(view.captures_input());
    // Account id is preselected from the accounts tab; jump to amount
    for _ in 0..3 {
      view.handle_key(key(KeyCode::Tab)).await;
    }
    for c in "250".chars() {
      view.handle_key(key(KeyCode::Char(c))).await;
    }
    view.handle_key(key(KeyCode::Enter)).await;

    assert!(view.form.is_none());
    let body = fake.last_call("POST", "/escrow/transactions").unwrap().body.unwrap();
    assert_eq!(body["accountId"], json!(4));
    assert_eq!(body["amount"], json!(250));
  }

  #[tokio::test]
  async fn test_invalid_form_stays_open_with_error() {
    let fake = FakeTransport::new();
    let mut view = view(&fake).await;

    view.handle_key(key(KeyCode::Char('n'))).await;
    view.handle_key(key(KeyCode::Enter)).await;

    let (kind, form) = view.form.as_ref().unwrap();
    assert_eq!(*kind, FormKind::Account);
    assert_eq!(form.error(), Some("Account name is required"));
    assert!(fake.calls_to("POST", "/escrow/accounts").is_empty());

    view.handle_key(key(KeyCode::Esc)).await;
    assert!(view.form.is_none());
    assert!(!view.container.state().account_drawer.is_open());
  }

  #[tokio::test]
  async fn test_search_applies_on_submit() {
    let fake = FakeTransport::new();
    let mut view = view(&fake).await;

    view.handle_key(key(KeyCode::Char('/'))).await;
    for c in "acme".chars() {
      view.handle_key(key(KeyCode::Char(c))).await;
    }
    assert_eq!(fake.calls_to("GET", "/escrow/accounts").len(), 1);
    view.handle_key(key(KeyCode::Enter)).await;

    view.container.settle().await;
    let call = fake.last_call("GET", "/escrow/accounts").unwrap();
    assert_eq!(call.params.get("search").map(String::as_str), Some("acme"));
  }

  #[tokio::test]
  async fn test_release_uses_selected_transaction() {
    let fake = FakeTransport::new();
    fake.respond("POST", "/escrow/transactions/9/release", Ok(json!({})));
    let mut view = view(&fake).await;

    view.handle_key(key(KeyCode::Tab)).await;
    view.handle_key(key(KeyCode::Char('R'))).await;
    assert_eq!(fake.calls_to("POST", "/escrow/transactions/9/release").len(), 1);
  }

  #[tokio::test]
  async fn test_workspace_switch_refetches_and_toasts() {
    let fake = FakeTransport::new();
    let mut view = view(&fake).await;

    assert!(view.set_workspace(WorkspaceScope::from_arg("acme")));
    view.container.settle().await;

    let call = fake.last_call("GET", "/escrow/accounts").unwrap();
    assert_eq!(call.params.get("workspaceSlug").map(String::as_str), Some("acme"));
    let toast = view.toast().unwrap();
    assert_eq!(toast.message, "Switched to acme");
    assert_eq!(toast.tone, ToastTone::Info);
    assert_eq!(view.breadcrumb_label(), "Escrow [acme]");
  }

  #[test]
  fn test_next_status_cycles_through_all() {
    assert_eq!(next_status(None, ACCOUNT_STATUSES).as_deref(), Some("active"));
    assert_eq!(next_status(Some("frozen"), ACCOUNT_STATUSES).as_deref(), Some("closed"));
    assert_eq!(next_status(Some("closed"), ACCOUNT_STATUSES), None);
  }
}
