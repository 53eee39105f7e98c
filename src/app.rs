use crate::commands::Invocation;
use crate::config::Config;
use crate::escrow::WorkspaceScope;
use crate::event::{Event, EventHandler};
use crate::services::Services;
use crate::support_desk::SupportDeskPanel;
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::view::{View, ViewAction};
use crate::ui::views::{EscrowView, SupportDeskView};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tracing::{info, warn};

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// `:` palette, shared by every view
  command_input: CommandInput,

  config: Config,

  services: Services,

  should_quit: bool,
}

impl App {
  pub fn new(config: Config, services: Services) -> Self {
    let mut app = Self {
      view_stack: Vec::new(),
      command_input: CommandInput::new(),
      config,
      services,
      should_quit: false,
    };
    app.replace_root(app.escrow_view());
    app
  }

  pub async fn run(&mut self) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let result = self.event_loop().await;

    // Restore the terminal even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    result
  }

  async fn event_loop(&mut self) -> Result<()> {
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    let mut events = EventHandler::new(Duration::from_millis(250));

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(Event::Key(key)) => self.handle_key(key).await,
        Some(Event::Tick) => {
          if let Some(view) = self.view_stack.last_mut() {
            view.tick();
          }
        }
        Some(Event::Resize) => {}
        None => break,
      }
    }
    Ok(())
  }

  async fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let view_captures = self
      .view_stack
      .last()
      .is_some_and(|view| view.captures_input());
    if self.command_input.is_active() || !view_captures {
      match self.command_input.handle_key(key) {
        KeyResult::Event(CommandEvent::Submitted(invocation)) => {
          self.execute_command(invocation);
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    let Some(view) = self.view_stack.last_mut() else {
      return;
    };
    match view.handle_key(key).await {
      ViewAction::None => {}
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
    }
  }

  fn execute_command(&mut self, invocation: Invocation) {
    info!(command = %invocation.name, "running palette command");
    match invocation.name.as_str() {
      "escrow" => {
        let view = self.escrow_view();
        self.replace_root(view);
      }
      "support" => {
        let view = self.support_view();
        self.replace_root(view);
      }
      "workspace" => {
        let scope = WorkspaceScope::from_arg(invocation.arg.as_deref().unwrap_or(""));
        self.services.scope = scope.clone();
        for view in &mut self.view_stack {
          view.set_workspace(scope.clone());
        }
      }
      "quit" => self.should_quit = true,
      other => warn!(command = other, "unknown command"),
    }
  }

  fn replace_root(&mut self, view: Box<dyn View>) {
    self.view_stack.clear();
    self.view_stack.push(view);
  }

  fn escrow_view(&self) -> Box<dyn View> {
    Box::new(EscrowView::new(
      self.services.mount_escrow(),
      self.config.ui.toast_secs,
    ))
  }

  fn support_view(&self) -> Box<dyn View> {
    let panel = SupportDeskPanel::mount(
      self.services.snapshots.clone(),
      self.services.session.user_id.clone(),
    );
    Box::new(SupportDeskView::new(panel))
  }

  // Accessors for UI rendering
  pub fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|v| v.as_ref())
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn command_input(&self) -> &CommandInput {
    &self.command_input
  }

  pub fn base_url(&self) -> &str {
    &self.config.api.base_url
  }

  /// Workspace and user shown in the header
  pub fn context_label(&self) -> String {
    format!("{} · {}", self.services.scope.label(), self.services.session.user_id)
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }
}
