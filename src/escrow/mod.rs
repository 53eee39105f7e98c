//! Escrow dashboard: accounts, transactions, overview totals and settings
//! for one workspace.

mod api;
mod container;
mod drafts;
mod error;
mod state;
mod types;

pub use api::EscrowApi;
pub use container::EscrowContainer;
pub use drafts::{AccountDraft, SettingsDraft, TransactionDraft};
pub use error::EscrowError;
pub use state::{Toast, ToastTone};
pub use types::{
  Account, AccountFilters, Pagination, Session, Transaction, TransactionFilters, WorkspaceScope,
};
