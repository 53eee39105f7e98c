//! Escrow dashboard state and its reducer.

use chrono::{DateTime, Utc};

use super::drafts::{AccountDraft, SettingsDraft, TransactionDraft};
use super::types::{
  Account, AccountFilters, Overview, Page, Pagination, PaginationChange, Transaction,
  TransactionFilters,
};

/// A paginated, filterable collection.
///
/// `list` survives `loading` and `error`; only a successful fetch replaces it.
#[derive(Debug, Clone, PartialEq)]
pub struct ListSlice<T, F> {
  pub list: Vec<T>,
  pub loading: bool,
  pub error: Option<String>,
  pub filters: F,
  pub pagination: Pagination,
}

impl<T, F: Default> ListSlice<T, F> {
  fn new(page_size: u32) -> Self {
    Self {
      list: Vec::new(),
      loading: false,
      error: None,
      filters: F::default(),
      pagination: Pagination::new(page_size),
    }
  }

  fn request(&mut self) {
    self.loading = true;
  }

  fn succeed(&mut self, page: Page<T>) {
    self.list = page.items;
    self.pagination.total = page.total;
    self.loading = false;
    self.error = None;
  }

  fn fail(&mut self, message: String) {
    self.loading = false;
    self.error = Some(message);
  }

  fn set_filters(&mut self, filters: F) {
    self.filters = filters;
    self.pagination.offset = 0;
  }

  fn paginate(&mut self, change: PaginationChange) {
    if let Some(limit) = change.limit {
      self.pagination.limit = limit.max(1);
    }
    if let Some(offset) = change.offset {
      self.pagination.offset = offset;
    }
  }
}

/// A single document such as the overview.
#[derive(Debug, Clone, PartialEq)]
pub struct DocSlice<T> {
  pub data: Option<T>,
  pub loading: bool,
  pub error: Option<String>,
}

impl<T> Default for DocSlice<T> {
  fn default() -> Self {
    Self {
      data: None,
      loading: false,
      error: None,
    }
  }
}

/// An edit drawer. `draft` is `Some` exactly while the drawer is open.
#[derive(Debug, Clone, PartialEq)]
pub struct Drawer<D> {
  pub draft: Option<D>,
}

impl<D> Default for Drawer<D> {
  fn default() -> Self {
    Self { draft: None }
  }
}

impl<D> Drawer<D> {
  pub fn is_open(&self) -> bool {
    self.draft.is_some()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastTone {
  Success,
  Error,
  Info,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
  pub message: String,
  pub tone: ToastTone,
  pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EscrowState {
  pub overview: DocSlice<Overview>,
  pub accounts: ListSlice<Account, AccountFilters>,
  pub transactions: ListSlice<Transaction, TransactionFilters>,
  pub account_drawer: Drawer<AccountDraft>,
  pub transaction_drawer: Drawer<TransactionDraft>,
  pub settings_draft: Option<SettingsDraft>,
  pub toast: Option<Toast>,
}

/// Every state transition of the escrow dashboard.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
  OverviewRequest,
  OverviewSuccess(Overview),
  OverviewFailure(String),
  AccountsRequest,
  AccountsSuccess(Page<Account>),
  AccountsFailure(String),
  TransactionsRequest,
  TransactionsSuccess(Page<Transaction>),
  TransactionsFailure(String),
  AccountFilters(AccountFilters),
  AccountPagination(PaginationChange),
  TransactionFilters(TransactionFilters),
  TransactionPagination(PaginationChange),
  OpenAccountDrawer(AccountDraft),
  CloseAccountDrawer,
  OpenTransactionDrawer(TransactionDraft),
  CloseTransactionDrawer,
  SettingsDraft(Option<SettingsDraft>),
  Toast(Option<Toast>),
}

impl EscrowState {
  pub fn new(page_size: u32) -> Self {
    Self {
      overview: DocSlice::default(),
      accounts: ListSlice::new(page_size),
      transactions: ListSlice::new(page_size),
      account_drawer: Drawer::default(),
      transaction_drawer: Drawer::default(),
      settings_draft: None,
      toast: None,
    }
  }

  /// Apply one action.
  pub fn reduce(&mut self, action: Action) {
    match action {
      Action::OverviewRequest => self.overview.loading = true,
      Action::OverviewSuccess(overview) => {
        self.overview.data = Some(overview);
        self.overview.loading = false;
        self.overview.error = None;
      }
      Action::OverviewFailure(message) => {
        self.overview.loading = false;
        self.overview.error = Some(message);
      }
      Action::AccountsRequest => self.accounts.request(),
      Action::AccountsSuccess(page) => self.accounts.succeed(page),
      Action::AccountsFailure(message) => self.accounts.fail(message),
      Action::TransactionsRequest => self.transactions.request(),
      Action::TransactionsSuccess(page) => self.transactions.succeed(page),
      Action::TransactionsFailure(message) => self.transactions.fail(message),
      Action::AccountFilters(filters) => self.accounts.set_filters(filters),
      Action::AccountPagination(change) => self.accounts.paginate(change),
      Action::TransactionFilters(filters) => self.transactions.set_filters(filters),
      Action::TransactionPagination(change) => self.transactions.paginate(change),
      Action::OpenAccountDrawer(draft) => self.account_drawer.draft = Some(draft),
      Action::CloseAccountDrawer => self.account_drawer.draft = None,
      Action::OpenTransactionDrawer(draft) => self.transaction_drawer.draft = Some(draft),
      Action::CloseTransactionDrawer => self.transaction_drawer.draft = None,
      Action::SettingsDraft(draft) => self.settings_draft = draft,
      Action::Toast(toast) => self.toast = toast,
    }
  }
}
