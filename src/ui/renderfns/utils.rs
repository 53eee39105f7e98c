use ratatui::prelude::{Color, Rect};

/// Truncate to `max_chars` characters, adding "..." if truncated
pub fn truncate(s: &str, max_chars: usize) -> String {
  if s.chars().count() <= max_chars {
    return s.to_string();
  }
  let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
  format!("{}...", kept)
}

/// Display color for an escrow account, transaction or case status
pub fn status_color(status: &str) -> Color {
  match status.to_lowercase().as_str() {
    "active" | "released" | "completed" | "resolved" | "closed" => Color::Green,
    "pending" | "held" | "open" | "in_review" => Color::Yellow,
    "refunded" | "frozen" | "disputed" | "failed" | "breached" => Color::Red,
    _ => Color::White,
  }
}

/// Format an amount with thousands separators and two decimals
pub fn format_money(amount: f64, currency: Option<&str>) -> String {
  let negative = amount < 0.0;
  let cents = (amount.abs() * 100.0).round() as u64;
  let whole = (cents / 100).to_string();

  let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
  for (i, digit) in whole.chars().enumerate() {
    if i > 0 && (whole.len() - i) % 3 == 0 {
      grouped.push(',');
    }
    grouped.push(digit);
  }

  let sign = if negative { "-" } else { "" };
  match currency {
    Some(code) if !code.is_empty() => format!("{}{}.{:02} {}", sign, grouped, cents % 100, code),
    _ => format!("{}{}.{:02}", sign, grouped, cents % 100),
  }
}

/// Area for a top-left anchored popup of the given height
pub fn popup_area(area: Rect, height: u16) -> Rect {
  let width = (area.width * 60 / 100).clamp(30.min(area.width), 60.min(area.width));
  let x = area.x + 1.min(area.width.saturating_sub(width));
  let y = area.y + 1.min(area.height.saturating_sub(height));
  Rect::new(x, y, width, height.min(area.height))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate() {
    assert_eq!(truncate("hello", 5), "hello");
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte() {
    assert_eq!(truncate("Überweisung für März", 10), "Überwei...");
  }

  #[test]
  fn test_status_color() {
    assert_eq!(status_color("Released"), Color::Green);
    assert_eq!(status_color("pending"), Color::Yellow);
    assert_eq!(status_color("refunded"), Color::Red);
    assert_eq!(status_color("draft"), Color::White);
  }

  #[test]
  fn test_format_money() {
    assert_eq!(format_money(1234567.5, Some("USD")), "1,234,567.50 USD");
    assert_eq!(format_money(-12.346, None), "-12.35");
    assert_eq!(format_money(999.0, Some("")), "999.00");
  }

  #[test]
  fn test_popup_area_fits_small_terminals() {
    let area = Rect::new(0, 0, 20, 2);
    let popup = popup_area(area, 5);
    assert!(popup.width <= 20);
    assert!(popup.height <= 2);
  }
}
