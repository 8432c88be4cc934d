//! Interactive station and direction picker.
//!
//! Raw-mode terminal UI behind the `search` subcommand. Keystrokes edit the
//! query and restart a 300 ms debounce deadline; when it expires the search
//! endpoint is queried and candidates are listed. Picking a candidate opens a
//! small direction menu, and the final choice becomes the board selection.

use std::io;
use std::time::Duration;

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use futures::StreamExt;
use tokio::time::{Instant, sleep_until};

use crate::app::Selection;
use crate::board::Direction;
use crate::error::AppError;
use crate::service::{MvgClient, StationLocation};

/// Delay between the last keystroke and the search request.
const DEBOUNCE_MS: u64 = 300;

/// Restores the terminal even on early returns.
struct RawMode;

impl RawMode {
    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        execute!(io::stdout(), Hide)?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), Show);
        let _ = terminal::disable_raw_mode();
    }
}

enum Phase {
    Search,
    Direction,
}

/// Runs the picker until the user chooses a station (and direction) or
/// cancels with Esc.
pub async fn pick(
    client: &MvgClient,
    initial_query: Option<String>,
) -> Result<Option<Selection>, AppError> {
    let _raw = RawMode::enter()?;

    let mut query = initial_query.unwrap_or_default();
    let mut results: Vec<StationLocation> = Vec::new();
    let mut cursor = 0usize;
    let mut dir_cursor = 0usize;
    let mut search_error: Option<String> = None;
    let mut phase = Phase::Search;

    // A preseeded query searches right away, without waiting for a keystroke.
    let mut deadline = if query.trim().is_empty() {
        None
    } else {
        Some(Instant::now())
    };

    let mut events = EventStream::new();
    draw(&search_frame(&query, &results, cursor, false, &search_error))?;

    loop {
        tokio::select! {
            _ = async {
                match deadline {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                deadline = None;
                draw(&search_frame(&query, &results, cursor, true, &search_error))?;
                match client.search_stations(query.trim()).await {
                    Ok(stations) => {
                        results = stations;
                        cursor = 0;
                        search_error = None;
                    }
                    Err(err) => {
                        results.clear();
                        cursor = 0;
                        search_error = Some(err.to_string());
                    }
                }
                draw(&search_frame(&query, &results, cursor, false, &search_error))?;
            }

            maybe_event = events.next() => {
                let Some(event) = maybe_event else {
                    return Ok(None);
                };
                let Event::Key(key) = event? else {
                    continue;
                };
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                let ctrl_c = key.code == KeyCode::Char('c')
                    && key.modifiers.contains(KeyModifiers::CONTROL);
                if ctrl_c {
                    return Ok(None);
                }

                match phase {
                    Phase::Search => match key.code {
                        KeyCode::Esc => return Ok(None),
                        KeyCode::Char(c) => {
                            query.push(c);
                            deadline = Some(Instant::now() + Duration::from_millis(DEBOUNCE_MS));
                            draw(&search_frame(&query, &results, cursor, false, &search_error))?;
                        }
                        KeyCode::Backspace => {
                            query.pop();
                            deadline = Some(Instant::now() + Duration::from_millis(DEBOUNCE_MS));
                            draw(&search_frame(&query, &results, cursor, false, &search_error))?;
                        }
                        KeyCode::Up => {
                            cursor = cursor.saturating_sub(1);
                            draw(&search_frame(&query, &results, cursor, false, &search_error))?;
                        }
                        KeyCode::Down => {
                            if cursor + 1 < results.len() {
                                cursor += 1;
                            }
                            draw(&search_frame(&query, &results, cursor, false, &search_error))?;
                        }
                        KeyCode::Enter if !results.is_empty() => {
                            phase = Phase::Direction;
                            dir_cursor = 0;
                            draw(&direction_frame(&results[cursor], dir_cursor))?;
                        }
                        _ => {}
                    },
                    Phase::Direction => match key.code {
                        KeyCode::Esc => {
                            phase = Phase::Search;
                            draw(&search_frame(&query, &results, cursor, false, &search_error))?;
                        }
                        KeyCode::Up => {
                            dir_cursor = dir_cursor.saturating_sub(1);
                            draw(&direction_frame(&results[cursor], dir_cursor))?;
                        }
                        KeyCode::Down => {
                            if dir_cursor + 1 < 3 {
                                dir_cursor += 1;
                            }
                            draw(&direction_frame(&results[cursor], dir_cursor))?;
                        }
                        KeyCode::Enter => {
                            let station = &results[cursor];
                            let direction = match dir_cursor {
                                1 => Some(Direction::Garching.terminus().to_string()),
                                2 => Some(Direction::Klinikum.terminus().to_string()),
                                _ => None,
                            };
                            return Ok(Some(Selection {
                                station: Some(station.name.clone()),
                                direction,
                            }));
                        }
                        _ => {}
                    },
                }
            }
        }
    }
}

/// Repaints the whole frame. Raw mode needs explicit carriage returns.
fn draw(text: &str) -> io::Result<()> {
    let mut stdout = io::stdout();
    execute!(
        stdout,
        Clear(ClearType::All),
        MoveTo(0, 0),
        Print(text.replace('\n', "\r\n"))
    )
}

fn search_frame(
    query: &str,
    results: &[StationLocation],
    cursor: usize,
    searching: bool,
    error: &Option<String>,
) -> String {
    let mut frame = String::new();
    frame.push_str("Select a U-Bahn station\n\n");
    frame.push_str(&format!("Search: {query}_\n\n"));

    if searching {
        frame.push_str("Searching...\n");
    } else if let Some(error) = error {
        frame.push_str(&format!("Search failed: {error}\n"));
    } else if results.is_empty() {
        if query.trim().is_empty() {
            frame.push_str("Type to search, e.g. \"Marienplatz\" or \"Garching\".\n");
        } else {
            frame.push_str(&format!("No U-Bahn stations found for \"{}\".\n", query.trim()));
        }
    } else {
        for (index, station) in results.iter().enumerate() {
            let marker = if index == cursor { ">" } else { " " };
            frame.push_str(&format!(
                "{marker} {} ({}) [{}]\n",
                station.name,
                station.place,
                station.transport_types.join(", ")
            ));
        }
    }

    frame.push_str("\nUp/Down move, Enter choose, Esc cancel\n");
    frame
}

fn direction_frame(station: &StationLocation, cursor: usize) -> String {
    let options = [
        "All directions".to_string(),
        format!("Richtung {}", Direction::Garching.terminus()),
        format!("Richtung {}", Direction::Klinikum.terminus()),
    ];

    let mut frame = String::new();
    frame.push_str(&format!("Select direction for {}\n\n", station.name));
    for (index, option) in options.iter().enumerate() {
        let marker = if index == cursor { ">" } else { " " };
        frame.push_str(&format!("{marker} {option}\n"));
    }
    frame.push_str("\nUp/Down move, Enter choose, Esc back\n");
    frame
}
