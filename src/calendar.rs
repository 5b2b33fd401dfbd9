use crate::types::Game;
use chrono::{DateTime, Days, Utc};

const PRODID: &str = "-//Release Radar//Upcoming Games//EN";
const GOOGLE_CALENDAR_URL: &str = "https://calendar.google.com/calendar/render";
const MAX_LINE_OCTETS: usize = 75;

pub fn escape_text(raw: &str) -> String {
  let mut out = String::with_capacity(raw.len());
  for ch in raw.chars() {
    match ch {
      '\\' => out.push_str("\\\\"),
      ';' => out.push_str("\\;"),
      ',' => out.push_str("\\,"),
      '\n' => out.push_str("\\n"),
      '\r' => {}
      _ => out.push(ch),
    }
  }
  out
}

/// Splits a content line into 75-octet pieces joined by CRLF + space,
/// never cutting through a UTF-8 sequence.
pub fn fold_line(line: &str) -> String {
  if line.len() <= MAX_LINE_OCTETS {
    return line.to_string();
  }
  let mut out = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
  let mut width = 0;
  let mut limit = MAX_LINE_OCTETS;
  for ch in line.chars() {
    let len = ch.len_utf8();
    if width + len > limit {
      out.push_str("\r\n ");
      width = 0;
      // Continuation lines spend one octet on the leading space.
      limit = MAX_LINE_OCTETS - 1;
    }
    out.push(ch);
    width += len;
  }
  out
}

fn push_line(out: &mut String, line: &str) {
  out.push_str(&fold_line(line));
  out.push_str("\r\n");
}

fn description(game: &Game) -> String {
  format!("Platforms: {}", game.platform_label())
}

/// One all-day event per game with a known release date.
pub fn ics_for_games(games: &[&Game], now: DateTime<Utc>) -> String {
  let stamp = now.format("%Y%m%dT%H%M%SZ").to_string();
  let mut out = String::new();
  push_line(&mut out, "BEGIN:VCALENDAR");
  push_line(&mut out, "VERSION:2.0");
  push_line(&mut out, &format!("PRODID:{PRODID}"));
  push_line(&mut out, "CALSCALE:GREGORIAN");
  push_line(&mut out, "METHOD:PUBLISH");

  for game in games {
    let Some(day) = game.release_day() else {
      continue;
    };
    let end = day.checked_add_days(Days::new(1)).unwrap_or(day);
    push_line(&mut out, "BEGIN:VEVENT");
    push_line(&mut out, &format!("UID:{}@release-radar", game.id));
    push_line(&mut out, &format!("DTSTAMP:{stamp}"));
    push_line(&mut out, &format!("DTSTART;VALUE=DATE:{}", day.format("%Y%m%d")));
    push_line(&mut out, &format!("DTEND;VALUE=DATE:{}", end.format("%Y%m%d")));
    push_line(&mut out, &format!("SUMMARY:{}", escape_text(&format!("{} release", game.title))));
    push_line(&mut out, &format!("DESCRIPTION:{}", escape_text(&description(game))));
    push_line(&mut out, "TRANSP:TRANSPARENT");
    push_line(&mut out, "END:VEVENT");
  }

  push_line(&mut out, "END:VCALENDAR");
  out
}

pub fn google_calendar_link(game: &Game) -> Option<String> {
  let day = game.release_day()?;
  let end = day.checked_add_days(Days::new(1))?;
  let dates = format!("{}/{}", day.format("%Y%m%d"), end.format("%Y%m%d"));
  let url = reqwest::Url::parse_with_params(
    GOOGLE_CALENDAR_URL,
    &[
      ("action", "TEMPLATE".to_string()),
      ("text", format!("{} release", game.title)),
      ("dates", dates),
      ("details", description(game)),
    ],
  )
  .ok()?;
  Some(url.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn game(id: &str, title: &str, date: &str) -> Game {
    Game {
      id: id.to_string(),
      title: title.to_string(),
      slug: id.to_string(),
      release_date: date.to_string(),
      platforms: vec!["PC".to_string(), "PlayStation 5".to_string()],
      genres: Vec::new(),
      hype: 80,
      image: None,
      summary: None,
      screenshots: Vec::new(),
      videos: Vec::new(),
      similar_games: Vec::new(),
      source: None,
    }
  }

  #[test]
  fn ics_has_one_all_day_event_per_dated_game() {
    let dated = game("g1", "Star Voyager; Deluxe", "2026-12-31");
    let tba = game("g2", "Hollow Star", "");
    let now = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
    let ics = ics_for_games(&[&dated, &tba], now);

    assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));
    assert!(ics.ends_with("END:VCALENDAR\r\n"));
    assert_eq!(ics.matches("BEGIN:VEVENT").count(), 1);
    assert!(ics.contains("UID:g1@release-radar\r\n"));
    assert!(ics.contains("DTSTAMP:20260102T030405Z\r\n"));
    assert!(ics.contains("DTSTART;VALUE=DATE:20261231\r\n"));
    assert!(ics.contains("DTEND;VALUE=DATE:20270101\r\n"));
    assert!(ics.contains("SUMMARY:Star Voyager\\; Deluxe release\r\n"));
    assert!(ics.contains("DESCRIPTION:Platforms: PC\\, PlayStation 5\r\n"));
    assert!(!ics.replace("\r\n", "").contains('\n'));
  }

  #[test]
  fn long_lines_are_folded() {
    let line = format!("SUMMARY:{}", "é".repeat(60));
    let folded = fold_line(&line);
    for (i, piece) in folded.split("\r\n").enumerate() {
      assert!(piece.len() <= MAX_LINE_OCTETS, "piece {i} is {} octets", piece.len());
      if i > 0 {
        assert!(piece.starts_with(' '));
      }
    }
    assert_eq!(folded.replace("\r\n ", ""), line);
  }

  #[test]
  fn google_link_encodes_fields() {
    let link = google_calendar_link(&game("g1", "Star & Voyager", "2026-03-14")).unwrap();
    assert!(link.starts_with("https://calendar.google.com/calendar/render?action=TEMPLATE"));
    assert!(link.contains("text=Star+%26+Voyager+release"));
    assert!(link.contains("dates=20260314%2F20260315"));
    assert!(google_calendar_link(&game("g2", "TBA Game", "soon")).is_none());
  }
}
