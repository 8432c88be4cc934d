//! Departure pipeline for the target line.
//!
//! Pure functions that take the raw API snapshot and shape it for display:
//! line filtering, optional direction narrowing, countdown computation, and
//! time ordering. Everything here is parameterized by a caller-supplied clock
//! value so the logic stays deterministic under test.

use crate::service::{Departure, NewsItem, UBAHN};

/// Passenger-facing label of the target line.
pub const LINE_LABEL: &str = "U6";
/// Fragment of the upstream line identifier that marks the target line.
pub const LINE_ID_FRAGMENT: &str = "010U6";

/// Line identifier marker for trains heading to Garching-Forschungszentrum.
const GARCHING_MARKER: &str = "G:R";
/// Line identifier marker for trains heading to Klinikum Großhadern.
const KLINIKUM_MARKER: &str = "G:H";

/// Hint substrings recognized as the Garching terminus.
const GARCHING_HINTS: [&str; 4] = ["ga", "fo", "gf", "gfz"];
/// Hint substrings recognized as the Klinikum terminus.
const KLINIKUM_HINTS: [&str; 1] = ["kl"];

/// One of the two terminus directions of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Northbound, towards Garching-Forschungszentrum.
    Garching,
    /// Southbound, towards Klinikum Großhadern.
    Klinikum,
}

impl Direction {
    /// Classifies a free-text direction hint against the two terminus name
    /// patterns, case-insensitively.
    ///
    /// The Klinikum patterns win when a hint matches both sets. A hint that
    /// matches neither returns `None`; callers treat that as "no direction
    /// filter" rather than an error.
    pub fn classify(hint: &str) -> Option<Direction> {
        let hint = hint.to_lowercase();
        if KLINIKUM_HINTS.iter().any(|p| hint.contains(p)) {
            Some(Direction::Klinikum)
        } else if GARCHING_HINTS.iter().any(|p| hint.contains(p)) {
            Some(Direction::Garching)
        } else {
            None
        }
    }

    /// The directional marker embedded in the upstream line identifier.
    fn marker(self) -> &'static str {
        match self {
            Direction::Garching => GARCHING_MARKER,
            Direction::Klinikum => KLINIKUM_MARKER,
        }
    }

    /// Full terminus name for display.
    pub fn terminus(self) -> &'static str {
        match self {
            Direction::Garching => "Garching-Forschungszentrum",
            Direction::Klinikum => "Klinikum Großhadern",
        }
    }
}

/// A departure augmented with the derived minutes-until-departure field.
///
/// The derived field is the only mutable part of the display model. It is
/// refreshed in place on every clock tick, independent of network polls.
#[derive(Debug, Clone)]
pub struct DepartureDisplay {
    pub departure: Departure,
    pub minutes_until_departure: i64,
}

impl DepartureDisplay {
    fn new(departure: Departure, now_ms: i64) -> Self {
        let minutes_until_departure = minutes_until(departure.realtime_departure_time, now_ms);
        Self {
            departure,
            minutes_until_departure,
        }
    }

    /// Recomputes the countdown from the stored realtime timestamp.
    pub fn refresh(&mut self, now_ms: i64) {
        self.minutes_until_departure =
            minutes_until(self.departure.realtime_departure_time, now_ms);
    }
}

/// Minutes remaining until the given departure time, clamped to zero once the
/// time has passed.
pub fn minutes_until(departure_ms: i64, now_ms: i64) -> i64 {
    (departure_ms - now_ms).max(0) / 60_000
}

/// Whether a raw departure belongs to the target line.
fn on_target_line(departure: &Departure) -> bool {
    departure.transport_type == UBAHN
        && departure
            .line_id
            .as_deref()
            .is_some_and(|id| id.contains(LINE_ID_FRAGMENT))
}

/// Restricts a raw departure list to the target line.
pub fn filter_line(departures: Vec<Departure>) -> Vec<Departure> {
    departures.into_iter().filter(on_target_line).collect()
}

/// Narrows a line-filtered list to one travel direction.
///
/// `None` leaves the list untouched, which is also the fallback for hints
/// [`Direction::classify`] did not recognize.
pub fn filter_direction(departures: Vec<Departure>, direction: Option<Direction>) -> Vec<Departure> {
    match direction {
        Some(direction) => departures
            .into_iter()
            .filter(|d| {
                d.line_id
                    .as_deref()
                    .is_some_and(|id| id.contains(direction.marker()))
            })
            .collect(),
        None => departures,
    }
}

/// Runs the full pipeline over one raw poll result.
///
/// Filters to the target line, applies the direction hint, attaches the
/// countdown, and sorts ascending by realtime departure time.
pub fn build_board(
    raw: Vec<Departure>,
    direction_hint: Option<&str>,
    now_ms: i64,
) -> Vec<DepartureDisplay> {
    let direction = direction_hint.and_then(Direction::classify);
    let filtered = filter_direction(filter_line(raw), direction);

    let mut board: Vec<DepartureDisplay> = filtered
        .into_iter()
        .map(|d| DepartureDisplay::new(d, now_ms))
        .collect();
    board.sort_by_key(|d| d.departure.realtime_departure_time);
    board
}

/// Keeps only news items that affect the target line.
pub fn line_news(items: Vec<NewsItem>) -> Vec<NewsItem> {
    items
        .into_iter()
        .filter(|item| item.lines.iter().any(|line| line.label == LINE_LABEL))
        .collect()
}

/// Strips HTML tags and non-breaking-space entities from a news description.
pub fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    text.replace("&nbsp;", " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{AffectedLine, Occupancy};

    const NOW_MS: i64 = 1_754_400_000_000;

    fn departure(label: &str, line_id: Option<&str>, departs_in_mins: i64) -> Departure {
        let time = NOW_MS + departs_in_mins * 60_000;
        Departure {
            planned_departure_time: time,
            realtime: true,
            delay_in_minutes: 0,
            realtime_departure_time: time,
            transport_type: UBAHN.to_string(),
            label: label.to_string(),
            destination: "Garching-Forschungszentrum".to_string(),
            cancelled: false,
            platform: Some(1),
            platform_changed: None,
            occupancy: Occupancy::Low,
            line_id: line_id.map(str::to_string),
        }
    }

    fn news_item(labels: &[&str]) -> NewsItem {
        NewsItem {
            title: "Test".to_string(),
            description: String::new(),
            publication: NOW_MS,
            publication_duration: None,
            incident_durations: Vec::new(),
            valid_from: NOW_MS,
            valid_to: NOW_MS,
            kind: Default::default(),
            provider: "MVG".to_string(),
            lines: labels
                .iter()
                .map(|label| AffectedLine {
                    label: label.to_string(),
                    transport_type: UBAHN.to_string(),
                    network: "swm".to_string(),
                    diva_id: String::new(),
                    sev: false,
                })
                .collect(),
        }
    }

    #[test]
    fn line_filter_keeps_only_u6() {
        let raw = vec![
            departure("U6", Some("swm:010U6:G:R:013"), 3),
            departure("U3", Some("swm:010U3:G:H:013"), 5),
        ];

        let board = build_board(raw, None, NOW_MS);

        assert_eq!(board.len(), 1);
        assert_eq!(board[0].departure.label, "U6");
        assert_eq!(board[0].minutes_until_departure, 3);
    }

    #[test]
    fn line_filter_drops_missing_line_id() {
        let raw = vec![departure("U6", None, 4)];
        assert!(build_board(raw, None, NOW_MS).is_empty());
    }

    #[test]
    fn board_is_sorted_by_realtime_time() {
        let raw = vec![
            departure("U6", Some("swm:010U6:G:R:013"), 12),
            departure("U6", Some("swm:010U6:G:H:013"), 2),
            departure("U6", Some("swm:010U6:G:R:013"), 7),
        ];

        let board = build_board(raw, None, NOW_MS);

        let times: Vec<i64> = board
            .iter()
            .map(|d| d.departure.realtime_departure_time)
            .collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
        assert_eq!(board.len(), 3);
    }

    #[test]
    fn minutes_never_negative() {
        assert_eq!(minutes_until(NOW_MS - 90_000, NOW_MS), 0);
        assert_eq!(minutes_until(NOW_MS, NOW_MS), 0);
    }

    #[test]
    fn minutes_floor_division() {
        assert_eq!(minutes_until(NOW_MS + 59_999, NOW_MS), 0);
        assert_eq!(minutes_until(NOW_MS + 60_000, NOW_MS), 1);
        assert_eq!(minutes_until(NOW_MS + 179_999, NOW_MS), 2);
    }

    #[test]
    fn classify_garching_hints() {
        assert_eq!(
            Direction::classify("Garching-Forschungszentrum"),
            Some(Direction::Garching)
        );
        assert_eq!(Direction::classify("garching"), Some(Direction::Garching));
        assert_eq!(
            Direction::classify("Forschungszentrum"),
            Some(Direction::Garching)
        );
        assert_eq!(Direction::classify("GFZ"), Some(Direction::Garching));
    }

    #[test]
    fn classify_klinikum_hints() {
        assert_eq!(
            Direction::classify("Klinikum Großhadern"),
            Some(Direction::Klinikum)
        );
        assert_eq!(Direction::classify("kl"), Some(Direction::Klinikum));
    }

    #[test]
    fn classify_prefers_klinikum_when_ambiguous() {
        // Contains both "kl" and "ga".
        assert_eq!(
            Direction::classify("Klinikum via Garching"),
            Some(Direction::Klinikum)
        );
    }

    #[test]
    fn classify_unknown_hint() {
        assert_eq!(Direction::classify("Odeonsplatz"), None);
        assert_eq!(Direction::classify(""), None);
    }

    #[test]
    fn direction_filter_selects_marker() {
        let raw = vec![
            departure("U6", Some("swm:010U6:G:R:013"), 3),
            departure("U6", Some("swm:010U6:G:H:013"), 5),
        ];

        let north = build_board(raw.clone(), Some("Garching"), NOW_MS);
        assert_eq!(north.len(), 1);
        assert_eq!(
            north[0].departure.line_id.as_deref(),
            Some("swm:010U6:G:R:013")
        );

        let south = build_board(raw, Some("Klinikum Großhadern"), NOW_MS);
        assert_eq!(south.len(), 1);
        assert_eq!(
            south[0].departure.line_id.as_deref(),
            Some("swm:010U6:G:H:013")
        );
    }

    #[test]
    fn direction_filter_is_idempotent() {
        let filtered = filter_direction(
            filter_line(vec![
                departure("U6", Some("swm:010U6:G:R:013"), 3),
                departure("U6", Some("swm:010U6:G:H:013"), 5),
            ]),
            Some(Direction::Garching),
        );

        let again = filter_direction(filtered.clone(), Some(Direction::Garching));
        assert_eq!(again.len(), filtered.len());
        assert_eq!(
            again[0].realtime_departure_time,
            filtered[0].realtime_departure_time
        );
    }

    #[test]
    fn unknown_hint_is_a_no_op() {
        let raw = vec![
            departure("U6", Some("swm:010U6:G:R:013"), 3),
            departure("U6", Some("swm:010U6:G:H:013"), 5),
        ];

        let unfiltered = build_board(raw.clone(), None, NOW_MS);
        let unknown = build_board(raw, Some("Odeonsplatz"), NOW_MS);

        assert_eq!(unknown.len(), unfiltered.len());
    }

    #[test]
    fn refresh_recomputes_countdown() {
        let raw = vec![departure("U6", Some("swm:010U6:G:R:013"), 5)];
        let mut board = build_board(raw, None, NOW_MS);
        assert_eq!(board[0].minutes_until_departure, 5);

        board[0].refresh(NOW_MS + 3 * 60_000);
        assert_eq!(board[0].minutes_until_departure, 2);

        // Once the train is gone the countdown parks at zero until the next
        // poll drops the entry.
        board[0].refresh(NOW_MS + 10 * 60_000);
        assert_eq!(board[0].minutes_until_departure, 0);
    }

    #[test]
    fn news_filter_keeps_only_u6_items() {
        let items = vec![
            news_item(&["U3", "U2"]),
            news_item(&["U6"]),
            news_item(&["S1"]),
        ];

        let filtered = line_news(items);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].lines[0].label, "U6");
    }

    #[test]
    fn news_filter_handles_empty_lines() {
        assert!(line_news(vec![news_item(&[])]).is_empty());
    }

    #[test]
    fn strip_html_removes_tags_and_nbsp() {
        let html = "<p>Wegen Bauarbeiten&nbsp;kein Halt <b>am Sonntag</b>.</p>";
        assert_eq!(strip_html(html), "Wegen Bauarbeiten kein Halt am Sonntag.");
    }

    #[test]
    fn strip_html_passes_plain_text_through() {
        assert_eq!(strip_html("Alles fährt."), "Alles fährt.");
    }
}
