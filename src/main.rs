//! # U6 Board
//!
//! A command-line interface (CLI) application for displaying real-time U6
//! subway departures at a Munich station, together with service-disruption
//! news for the line.
//!
//! This application uses the public MVG API to get live data. It presents the
//! departures in a clean, tabular format, refreshes them every minute, and
//! keeps the minute countdowns ticking in between.

use chrono::{Local, LocalResult, TimeZone, Utc};
use clap::Parser;
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table,
    modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS},
    presets::UTF8_FULL,
};
use dotenvy::dotenv;
use std::time::Duration;
use tokio::{signal, sync::mpsc, time};

mod app;
mod board;
mod config;
mod error;
mod picker;
mod service;

use app::{Selection, ViewState};
use board::DepartureDisplay;
use config::Config;
use error::AppError;
use service::{Departure, MvgClient, NewsKind, Occupancy};

/// The interval in seconds at which both data sources are re-fetched.
const POLL_INTERVAL_SECS: u64 = 60;
/// The interval in seconds at which the countdown column is recomputed
/// locally, without touching the network.
const TICK_INTERVAL_SECS: u64 = 1;
/// Default number of departure rows to display.
const DEFAULT_ROWS: usize = 3;

/// Defines the command-line arguments for the U6 Board application.
///
/// This struct uses `clap` to parse and validate command-line arguments. It
/// defines the main command structure, including subcommands for `board`
/// and `search`, and an optional argument for the number of rows to display.
#[derive(Parser, Debug)]
#[command(
    name = "u6_board",
    version,
    about = "A CLI dashboard for live U6 departures and line news.",
    long_about = None
)]
struct Cli {
    /// The specific command to execute (e.g., board or search).
    #[command(subcommand)]
    command: Commands,

    /// Optional: The number of departures to display.
    #[arg(short, long, help = "Number of departures to display.")]
    num_rows: Option<usize>,
}

/// Enumerates the available subcommands for the CLI.
#[derive(Parser, Debug)]
enum Commands {
    /// Shows the live departure board for a station.
    #[command(name = "board", visible_aliases = ["b", "dep"])]
    Board {
        /// Station name to display, e.g. "Universität".
        #[arg(help = "The station to show U6 departures for.")]
        station: Option<String>,

        /// Optional terminus direction, e.g. "Garching" or "Klinikum".
        #[arg(short, long, help = "Filter to one travel direction.")]
        direction: Option<String>,
    },
    /// Interactively searches for a station, then shows its board.
    #[command(name = "search", visible_aliases = ["s", "find"])]
    Search {
        /// Optional initial search query.
        #[arg(help = "Pre-filled search query.")]
        query: Option<String>,
    },
}

/// Creates and configures a new `comfy_table::Table` with default styling.
///
/// This function initializes a new table with UTF-8 presets for borders and
/// corners, and styles the headers to be bold and center-aligned.
fn create_table(headers: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.into_iter().map(|h| {
            Cell::new(h)
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Center)
        }));
    table
}

/// Formats an epoch-millisecond timestamp as a local wall-clock time.
fn format_clock(timestamp_ms: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms) {
        LocalResult::Single(time) => time.format("%H:%M").to_string(),
        _ => "--:--".to_string(),
    }
}

/// Formats an epoch-millisecond timestamp as a local date and time, the way
/// news publication dates are shown.
fn format_news_date(timestamp_ms: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms) {
        LocalResult::Single(time) => time.format("%d.%m.%Y %H:%M").to_string(),
        _ => "--".to_string(),
    }
}

/// Builds the countdown cell ("3m") for a departure.
fn minutes_cell(minutes: i64) -> Cell {
    Cell::new(format!("{minutes}m"))
        .add_attribute(Attribute::Bold)
        .set_alignment(CellAlignment::Center)
        .fg(Color::Cyan)
}

/// Builds the delay cell: a bold red "+Xm" for late trains, a dash otherwise.
fn delay_cell(delay_in_minutes: i64) -> Cell {
    if delay_in_minutes > 0 {
        Cell::new(format!("+{delay_in_minutes}m"))
            .add_attribute(Attribute::Bold)
            .set_alignment(CellAlignment::Center)
            .fg(Color::Red)
    } else {
        Cell::new("--").set_alignment(CellAlignment::Center)
    }
}

/// Builds the occupancy cell with the usual traffic-light coloring.
fn occupancy_cell(occupancy: Occupancy) -> Cell {
    let (text, color) = match occupancy {
        Occupancy::Low => ("Low", Color::Green),
        Occupancy::Medium => ("Medium", Color::Yellow),
        Occupancy::High => ("High", Color::Red),
        Occupancy::Unknown => ("Unknown", Color::Grey),
    };
    Cell::new(text).set_alignment(CellAlignment::Center).fg(color)
}

/// Builds the destination cell, marking cancelled departures in red.
fn destination_cell(departure: &Departure) -> Cell {
    if departure.cancelled {
        Cell::new(format!("{} (cancelled)", departure.destination))
            .add_attribute(Attribute::Bold)
            .fg(Color::Red)
    } else {
        Cell::new(&departure.destination)
    }
}

/// Formats the platform column, flagging changed platforms with an asterisk.
fn platform_text(departure: &Departure) -> String {
    match departure.platform {
        Some(platform) if departure.platform_changed == Some(true) => format!("{platform}*"),
        Some(platform) => platform.to_string(),
        None => "--".to_string(),
    }
}

/// Display label for a news type tag.
fn kind_label(kind: NewsKind) -> &'static str {
    match kind {
        NewsKind::Incident => "Incident",
        NewsKind::ScheduleChange => "Schedule Change",
        NewsKind::Other => "Notice",
    }
}

/// Prints the departure table, capped at `rows` entries.
fn print_departures(departures: &[DepartureDisplay], rows: usize) {
    let mut table = create_table(vec![
        "Line",
        "Destination",
        "Platform",
        "Departure",
        "In",
        "Delay",
        "Occupancy",
    ]);

    for display in departures.iter().take(rows) {
        let departure = &display.departure;
        table.add_row(vec![
            Cell::new(&departure.label)
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Center),
            destination_cell(departure),
            Cell::new(platform_text(departure)).set_alignment(CellAlignment::Center),
            Cell::new(format_clock(departure.realtime_departure_time))
                .set_alignment(CellAlignment::Center),
            minutes_cell(display.minutes_until_departure),
            delay_cell(departure.delay_in_minutes),
            occupancy_cell(departure.occupancy),
        ]);
    }

    println!("{table}");

    if departures.len() > rows {
        println!("(+{} more, raise --num-rows to see them)", departures.len() - rows);
    }
}

/// Prints the news section below the departure table.
fn print_news(state: &ViewState) {
    println!("U6 Line News & Updates");
    println!();

    if let Some(error) = &state.news_error {
        println!("Error loading news: {error}");
        println!();
    }

    if state.news_loading && state.news.is_empty() {
        println!("Loading news...");
        return;
    }
    if state.news.is_empty() {
        println!("No current news for U6 line.");
        return;
    }

    let now_ms = Utc::now().timestamp_millis();
    for item in &state.news {
        println!(
            "[{}] {}",
            kind_label(item.kind),
            format_news_date(item.publication)
        );
        println!("{}", item.title);

        let description = board::strip_html(&item.description);
        let description = description.trim();
        if !description.is_empty() {
            println!("{description}");
        }

        if item.valid_to > now_ms {
            println!(
                "Provider: {} | Valid until: {}",
                item.provider,
                format_news_date(item.valid_to)
            );
        } else {
            println!("Provider: {}", item.provider);
        }
        println!();
    }
}

/// Clears the screen and repaints the whole dashboard from the view state.
///
/// # Errors
///
/// Returns an error if clearing the screen fails.
fn render(state: &ViewState, rows: usize) -> Result<(), AppError> {
    clearscreen::clear()?;

    // Prefer the resolved station name; fall back to what the user typed
    // while resolution is still in flight.
    let station_name = state
        .station
        .as_ref()
        .map(|s| s.name.clone())
        .or_else(|| state.selection.station.clone());

    match (&station_name, &state.selection.direction) {
        (Some(name), Some(direction)) => println!("U6 Departures: {name} – Richtung {direction}"),
        (Some(name), None) => println!("U6 Departures: {name}"),
        (None, _) => println!("U6 Departures"),
    }
    if let Some(updated) = state.last_updated {
        println!("Last updated: {}", updated.format("%H:%M:%S"));
    }
    if state.direction_unrecognized() {
        let hint = state.selection.direction.as_deref().unwrap_or_default();
        println!("Direction \"{hint}\" not recognized; showing both directions.");
    }
    println!();

    if let Some(error) = &state.departures_error {
        println!("Error: {error}");
        println!();
    }

    if state.selection.station.is_none() {
        println!("No station selected.");
        println!("Pick one with the search subcommand, e.g.: u6_board search Marienplatz");
    } else if state.departures_loading && state.departures.is_empty() {
        println!(
            "Loading departures for {}...",
            station_name.as_deref().unwrap_or("the selected station")
        );
    } else if state.departures.is_empty() {
        println!(
            "No U6 departures available for {}.",
            station_name.as_deref().unwrap_or("the selected station")
        );
    } else {
        print_departures(&state.departures, rows);
    }

    println!();
    print_news(state);
    println!("Auto-refreshing every {POLL_INTERVAL_SECS}s. Press Ctrl+C to exit.");

    Ok(())
}

/// Runs the live board until the user exits.
///
/// The loop multiplexes four event sources: the Ctrl+C signal, the 60-second
/// poll interval (whose first tick fires immediately and acts as the initial
/// fetch), the 1-second countdown tick, and the channel on which spawned poll
/// tasks deliver their outcomes. Polling continues unconditionally regardless
/// of previous failures.
async fn run_board(client: MvgClient, selection: Selection, rows: usize) -> Result<(), AppError> {
    let mut state = ViewState::new(selection);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut poll = time::interval(Duration::from_secs(POLL_INTERVAL_SECS));
    let mut clock = time::interval(Duration::from_secs(TICK_INTERVAL_SECS));

    loop {
        tokio::select! {
            // Listen for the Ctrl+C signal.
            _ = signal::ctrl_c() => {
                break;
            }
            // Re-fetch both data sources.
            _ = poll.tick() => {
                app::spawn_poll(&client, &state, &tx);
            }
            // Keep the countdown column moving between polls.
            _ = clock.tick() => {
                state.tick(Utc::now().timestamp_millis());
                render(&state, rows)?;
            }
            // Apply a finished poll.
            Some(outcome) = rx.recv() => {
                state.apply(outcome);
                render(&state, rows)?;
            }
        }
    }

    println!("\nExiting...");

    Ok(())
}

/// The main entry point for the application.
///
/// This function initializes the application by performing the following steps:
/// 1. Loads environment variables from a `.env` file.
/// 2. Builds the API configuration and client, exiting early if an endpoint
///    override is invalid.
/// 3. Parses command-line arguments to determine the subcommand.
/// 4. Either runs the interactive station picker or goes straight to the
///    live board loop.
#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load environment variables from a .env file, if it exists.
    let _ = dotenv();

    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };
    let client = MvgClient::new(&config)?;
    let rows = cli.num_rows.unwrap_or(DEFAULT_ROWS);

    match cli.command {
        Commands::Board { station, direction } => {
            run_board(client, Selection { station, direction }, rows).await
        }
        Commands::Search { query } => match picker::pick(&client, query).await? {
            Some(selection) => run_board(client, selection, rows).await,
            None => {
                println!("No station selected.");
                Ok(())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn departure(cancelled: bool, platform: Option<u32>, changed: Option<bool>) -> Departure {
        Departure {
            planned_departure_time: 0,
            realtime: true,
            delay_in_minutes: 0,
            realtime_departure_time: 0,
            transport_type: service::UBAHN.to_string(),
            label: "U6".to_string(),
            destination: "Garching-Forschungszentrum".to_string(),
            cancelled,
            platform,
            platform_changed: changed,
            occupancy: Occupancy::Unknown,
            line_id: Some("swm:010U6:G:R:013".to_string()),
        }
    }

    #[test]
    fn test_platform_text_plain() {
        assert_eq!(platform_text(&departure(false, Some(2), Some(false))), "2");
    }

    #[test]
    fn test_platform_text_changed() {
        assert_eq!(platform_text(&departure(false, Some(2), Some(true))), "2*");
    }

    #[test]
    fn test_platform_text_missing() {
        assert_eq!(platform_text(&departure(false, None, None)), "--");
    }

    #[test]
    fn test_destination_cell_cancelled() {
        let actual_cell = destination_cell(&departure(true, None, None));
        let expected_cell = Cell::new("Garching-Forschungszentrum (cancelled)")
            .add_attribute(Attribute::Bold)
            .fg(Color::Red);
        assert_eq!(actual_cell, expected_cell);
    }

    #[test]
    fn test_destination_cell_plain() {
        let actual_cell = destination_cell(&departure(false, None, None));
        let expected_cell = Cell::new("Garching-Forschungszentrum");
        assert_eq!(actual_cell, expected_cell);
    }

    #[test]
    fn test_delay_cell_on_time() {
        let expected_cell = Cell::new("--").set_alignment(CellAlignment::Center);
        assert_eq!(delay_cell(0), expected_cell);
    }

    #[test]
    fn test_delay_cell_late() {
        let expected_cell = Cell::new("+4m")
            .add_attribute(Attribute::Bold)
            .set_alignment(CellAlignment::Center)
            .fg(Color::Red);
        assert_eq!(delay_cell(4), expected_cell);
    }

    #[test]
    fn test_occupancy_cell_colors() {
        let low = Cell::new("Low")
            .set_alignment(CellAlignment::Center)
            .fg(Color::Green);
        assert_eq!(occupancy_cell(Occupancy::Low), low);

        let high = Cell::new("High")
            .set_alignment(CellAlignment::Center)
            .fg(Color::Red);
        assert_eq!(occupancy_cell(Occupancy::High), high);

        let unknown = Cell::new("Unknown")
            .set_alignment(CellAlignment::Center)
            .fg(Color::Grey);
        assert_eq!(occupancy_cell(Occupancy::Unknown), unknown);
    }

    #[test]
    fn test_minutes_cell() {
        let expected_cell = Cell::new("3m")
            .add_attribute(Attribute::Bold)
            .set_alignment(CellAlignment::Center)
            .fg(Color::Cyan);
        assert_eq!(minutes_cell(3), expected_cell);
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(kind_label(NewsKind::Incident), "Incident");
        assert_eq!(kind_label(NewsKind::ScheduleChange), "Schedule Change");
        assert_eq!(kind_label(NewsKind::Other), "Notice");
    }

    #[test]
    fn test_format_clock_out_of_range() {
        assert_eq!(format_clock(i64::MAX), "--:--");
    }
}
