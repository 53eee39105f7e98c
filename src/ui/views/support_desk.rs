use crate::support_desk::SupportDeskPanel;
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{format_money, status_color, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use async_trait::async_trait;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
  Cases,
  Disputes,
}

/// Support desk snapshot: metrics, open cases and open disputes
pub struct SupportDeskView {
  panel: SupportDeskPanel,
  pane: Pane,
  cases_state: ListState,
  disputes_state: ListState,
}

impl SupportDeskView {
  pub fn new(panel: SupportDeskPanel) -> Self {
    Self {
      panel,
      pane: Pane::Cases,
      cases_state: ListState::default(),
      disputes_state: ListState::default(),
    }
  }

  fn active_state(&mut self) -> &mut ListState {
    match self.pane {
      Pane::Cases => &mut self.cases_state,
      Pane::Disputes => &mut self.disputes_state,
    }
  }

  fn render_metrics(&self, frame: &mut Frame, area: Rect) {
    let metrics = &self.panel.desk().metrics;
    let mut spans = vec![
      Span::styled(" Open cases ", Style::default().fg(Color::Gray)),
      Span::styled(metrics.open_cases.to_string(), Style::default().fg(Color::White).bold()),
      Span::styled("   SLA breached ", Style::default().fg(Color::Gray)),
      Span::styled(
        metrics.breached_sla.to_string(),
        Style::default()
          .fg(if metrics.breached_sla > 0 { Color::Red } else { Color::Green })
          .bold(),
      ),
      Span::styled("   Open disputes ", Style::default().fg(Color::Gray)),
      Span::styled(metrics.open_disputes.to_string(), Style::default().fg(Color::White).bold()),
    ];
    if let Some(minutes) = metrics.avg_first_response_minutes {
      spans.push(Span::styled("   First response ", Style::default().fg(Color::Gray)));
      spans.push(Span::raw(format!("{:.0}m", minutes)));
    }
    if let Some(csat) = metrics.csat {
      spans.push(Span::styled("   CSAT ", Style::default().fg(Color::Gray)));
      spans.push(Span::raw(format!("{:.1}", csat)));
    }

    let mut lines = vec![Line::from(spans)];
    if let Some(note) = self.panel.status_note() {
      lines.push(Line::styled(format!(" {}", note), Style::default().fg(Color::Yellow)));
    } else if let Some(error) = self.panel.error() {
      lines.push(Line::styled(format!(" {}", error), Style::default().fg(Color::Red)));
    } else if let Some(snapshot) = self.panel.snapshot() {
      let source = if snapshot.from_cache { "cache" } else { "live" };
      lines.push(Line::styled(
        format!(
          " Updated {} ({})",
          snapshot.cached_at.with_timezone(&chrono::Local).format("%H:%M:%S"),
          source
        ),
        Style::default().fg(Color::DarkGray),
      ));
    }

    let title = if self.panel.is_loading() {
      format!(" Support desk [{}] (loading...) ", self.panel.user_id())
    } else {
      format!(" Support desk [{}] ", self.panel.user_id())
    };
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    frame.render_widget(Paragraph::new(lines).block(block), area);
  }

  fn pane_block(&self, pane: Pane, title: String) -> Block<'static> {
    let color = if self.pane == pane { Color::Cyan } else { Color::DarkGray };
    Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(color))
  }

  fn render_cases(&mut self, frame: &mut Frame, area: Rect) {
    let desk = self.panel.desk();
    let cases = desk.open_cases();
    let items: Vec<ListItem> = cases
      .iter()
      .map(|case| {
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<10}", truncate(&case.id, 10)), Style::default().fg(Color::Cyan)),
          Span::styled(
            format!("{:<10}", truncate(&case.status, 10)),
            Style::default().fg(status_color(&case.status)),
          ),
          Span::styled(
            format!("{:<8}", case.priority.as_deref().unwrap_or("-")),
            Style::default().fg(Color::Gray),
          ),
          Span::raw(truncate(&case.subject, 50)),
          Span::styled(
            case
              .client_name
              .as_deref()
              .map(|c| format!("  {}", c))
              .unwrap_or_default(),
            Style::default().fg(Color::DarkGray),
          ),
        ]))
      })
      .collect();
    let count = items.len();
    let block = self.pane_block(Pane::Cases, format!(" Open cases ({}) ", count));

    ensure_valid_selection(&mut self.cases_state, count);
    let list = List::new(items)
      .block(block)
      .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.cases_state);
  }

  fn render_disputes(&mut self, frame: &mut Frame, area: Rect) {
    let desk = self.panel.desk();
    let disputes = desk.open_disputes();
    let items: Vec<ListItem> = disputes
      .iter()
      .map(|dispute| {
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<10}", truncate(&dispute.id, 10)),
            Style::default().fg(Color::Cyan),
          ),
          Span::styled(
            format!("{:<10}", truncate(&dispute.status, 10)),
            Style::default().fg(status_color(&dispute.status)),
          ),
          Span::raw(format!(
            "{:>14}  ",
            dispute.amount.map(|a| format_money(a, None)).unwrap_or_default()
          )),
          Span::styled(
            dispute
              .transaction_id
              .map(|id| format!("txn #{}  ", id))
              .unwrap_or_default(),
            Style::default().fg(Color::Gray),
          ),
          Span::raw(truncate(dispute.reason.as_deref().unwrap_or(""), 50)),
        ]))
      })
      .collect();
    let count = items.len();
    let block = self.pane_block(Pane::Disputes, format!(" Open disputes ({}) ", count));

    ensure_valid_selection(&mut self.disputes_state, count);
    let list = List::new(items)
      .block(block)
      .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.disputes_state);
  }
}

#[async_trait(?Send)]
impl View for SupportDeskView {
  async fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.active_state().select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.active_state().select_previous(),
      KeyCode::Tab => {
        self.pane = match self.pane {
          Pane::Cases => Pane::Disputes,
          Pane::Disputes => Pane::Cases,
        };
      }
      KeyCode::Char('r') => self.panel.load(true),
      KeyCode::Char('x') => self.panel.clear_cache(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(4),
        Constraint::Percentage(60),
        Constraint::Min(3),
      ])
      .split(area);

    self.render_metrics(frame, chunks[0]);
    self.render_cases(frame, chunks[1]);
    self.render_disputes(frame, chunks[2]);
  }

  fn breadcrumb_label(&self) -> String {
    "Support".to_string()
  }

  fn tick(&mut self) {
    self.panel.tick();
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("Tab", "pane").with_priority(20),
      ShortcutInfo::new("r", "refresh").with_priority(30),
      ShortcutInfo::new("x", "clear cache").with_priority(40),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}
