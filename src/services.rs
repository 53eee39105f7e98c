use color_eyre::Result;
use std::sync::Arc;

use crate::cache::MemoryStore;
use crate::config::Config;
use crate::escrow::{EscrowApi, EscrowContainer, Session, WorkspaceScope};
use crate::http::{HttpTransport, RestClient};
use crate::support_desk::{SnapshotPolicy, SnapshotService};

/// Shared clients built once from config, used by the TUI and subcommands
#[derive(Clone)]
pub struct Services {
  pub transport: Arc<dyn HttpTransport>,
  pub snapshots: Arc<SnapshotService>,
  pub session: Session,
  pub scope: WorkspaceScope,
  pub page_size: u32,
}

impl Services {
  pub fn from_config(config: &Config) -> Result<Self> {
    let transport: Arc<dyn HttpTransport> = Arc::new(RestClient::new(config)?);
    let snapshots = Arc::new(SnapshotService::new(
      Arc::clone(&transport),
      Arc::new(MemoryStore::new()),
      SnapshotPolicy::from(&config.support_desk),
    ));

    Ok(Self {
      transport,
      snapshots,
      session: Session {
        user_id: config.session.user_id.clone(),
      },
      scope: WorkspaceScope {
        workspace_id: config.workspace.id,
        workspace_slug: config.workspace.slug.clone(),
      },
      page_size: config.escrow.page_size,
    })
  }

  pub fn escrow_api(&self) -> EscrowApi {
    EscrowApi::new(Arc::clone(&self.transport), self.scope.clone())
  }

  /// Mount an escrow container; its fetches start immediately.
  pub fn mount_escrow(&self) -> EscrowContainer {
    EscrowContainer::mount(self.escrow_api(), self.session.clone(), self.page_size)
  }
}
