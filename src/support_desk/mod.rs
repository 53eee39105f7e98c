//! Support desk snapshot: cached per-user aggregate of cases, disputes,
//! metrics, playbooks and knowledge base articles.

mod panel;
mod service;
mod types;

pub use panel::SupportDeskPanel;
pub use service::{SnapshotOptions, SnapshotPolicy, SnapshotService};
