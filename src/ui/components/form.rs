use super::input::{InputResult, TextInput};
use super::KeyResult;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

/// Events emitted by a form overlay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
  Submitted,
  Cancelled,
}

#[derive(Debug, Clone)]
struct Field {
  key: &'static str,
  label: &'static str,
  input: TextInput,
}

/// Modal form of labelled text fields.
///
/// Tab/Shift-Tab (or Up/Down) move between fields, Enter submits, Esc cancels.
/// The owner reads values back by key and can pin an error under the fields.
#[derive(Debug, Clone)]
pub struct Form {
  title: String,
  fields: Vec<Field>,
  focus: usize,
  error: Option<String>,
}

impl Form {
  pub fn new(title: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      fields: Vec::new(),
      focus: 0,
      error: None,
    }
  }

  pub fn field(mut self, key: &'static str, label: &'static str, value: &str) -> Self {
    self.fields.push(Field {
      key,
      label,
      input: TextInput::with_value(value),
    });
    self
  }

  /// Current text of the field named `key`, empty when absent
  pub fn value(&self, key: &str) -> String {
    self
      .fields
      .iter()
      .find(|f| f.key == key)
      .map(|f| f.input.value().to_string())
      .unwrap_or_default()
  }

  pub fn set_error(&mut self, error: Option<String>) {
    self.error = error;
  }

  #[cfg(test)]
  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  fn move_focus(&mut self, forward: bool) {
    let count = self.fields.len();
    if count == 0 {
      return;
    }
    self.focus = if forward {
      (self.focus + 1) % count
    } else {
      (self.focus + count - 1) % count
    };
  }

  pub fn handle_key(&mut self, key: crossterm::event::KeyEvent) -> KeyResult<FormEvent> {
    use crossterm::event::KeyCode;

    match key.code {
      KeyCode::Tab | KeyCode::Down => {
        self.move_focus(true);
        return KeyResult::Handled;
      }
      KeyCode::BackTab | KeyCode::Up => {
        self.move_focus(false);
        return KeyResult::Handled;
      }
      _ => {}
    }

    let Some(field) = self.fields.get_mut(self.focus) else {
      return KeyResult::NotHandled;
    };
    match field.input.handle_key(key) {
      InputResult::Submitted(_) => KeyResult::Event(FormEvent::Submitted),
      InputResult::Cancelled => KeyResult::Event(FormEvent::Cancelled),
      InputResult::Consumed => {
        self.error = None;
        KeyResult::Handled
      }
      InputResult::NotHandled => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    let label_width = self.fields.iter().map(|f| f.label.len()).max().unwrap_or(0) + 2;
    let height = (self.fields.len() as u16 + 4).min(area.height);
    let width = (area.width * 70 / 100).clamp(40.min(area.width), 90.min(area.width));
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    let overlay_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, overlay_area);
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(format!(" {} ", self.title))
      .title_bottom(Line::from(" Tab:next  Enter:save  Esc:cancel ").alignment(Alignment::Right));
    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    let mut lines: Vec<Line> = self
      .fields
      .iter()
      .enumerate()
      .map(|(i, field)| {
        let focused = i == self.focus;
        let label_style = if focused {
          Style::default().fg(Color::Yellow).bold()
        } else {
          Style::default().fg(Color::Gray)
        };
        let mut spans = vec![
          Span::styled(format!("{:<label_width$}", field.label), label_style),
          Span::raw(field.input.value().to_string()),
        ];
        if focused {
          spans.push(Span::styled("_", Style::default().fg(Color::Yellow)));
        }
        Line::from(spans)
      })
      .collect();

    lines.push(Line::raw(""));
    if let Some(error) = &self.error {
      lines.push(Line::styled(error.clone(), Style::default().fg(Color::Red)));
    }

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
  }
}
