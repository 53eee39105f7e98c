use crate::escrow::{Toast, WorkspaceScope};
use async_trait::async_trait;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;

/// A keyboard shortcut hint for the header
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// Actions that a view can request in response to user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
  None,
  /// Leave this view; quits when it is the root
  Pop,
}

/// Trait for view behavior
///
/// Views own their input modes (search, forms) and return actions for the
/// App to execute. Key handling is async because write actions await the
/// API; fetches run in the background and are applied from `tick`.
#[async_trait(?Send)]
pub trait View {
  async fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  fn render(&mut self, frame: &mut Frame, area: Rect);

  fn breadcrumb_label(&self) -> String;

  /// True while a prompt or form owns the keyboard, so `:` and `q` go to it
  fn captures_input(&self) -> bool {
    false
  }

  /// Called on each tick to apply finished fetches and expire toasts
  fn tick(&mut self) {}

  fn toast(&self) -> Option<&Toast> {
    None
  }

  /// Rescope the view to another workspace. False when the view is not scoped.
  fn set_workspace(&mut self, _scope: WorkspaceScope) -> bool {
    false
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}
