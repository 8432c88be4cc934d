//! Polling view-state controller.
//!
//! Owns what the board loop displays: the current selection, the resolved
//! station, both resource slots (departures and news) with their independent
//! loading and error flags, and the last-updated clock. Poll results come back
//! tagged with the selection generation at spawn time; results from a
//! superseded selection are discarded instead of overwriting newer state.
//! Within one selection, overlapping polls resolve last-write-wins.

use chrono::{DateTime, Local, Utc};
use tokio::sync::mpsc::UnboundedSender;

use crate::board::{self, DepartureDisplay, Direction};
use crate::service::{MvgClient, NewsItem, ServiceError, StationLocation};

/// What to display, sourced from the command line (or the picker).
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Free-text station name; `None` renders the explicit empty state.
    pub station: Option<String>,
    /// Raw direction hint as entered by the user.
    pub direction: Option<String>,
}

/// One successfully fetched departures snapshot.
#[derive(Debug)]
pub struct DepartureBatch {
    pub station: StationLocation,
    pub departures: Vec<DepartureDisplay>,
}

/// Result of one spawned poll task, tagged with the generation it was
/// issued under.
#[derive(Debug)]
pub enum PollOutcome {
    Departures {
        tag: u64,
        result: Result<Option<DepartureBatch>, ServiceError>,
    },
    News {
        tag: u64,
        result: Result<Vec<NewsItem>, ServiceError>,
    },
}

/// Mutable view state behind the rendered board.
#[derive(Debug, Default)]
pub struct ViewState {
    pub selection: Selection,
    /// Bumped on every selection change; stale poll results are dropped.
    generation: u64,
    /// Station resolved for the current selection, reused by later polls so a
    /// name change costs exactly one resolver call.
    pub station: Option<StationLocation>,
    pub departures: Vec<DepartureDisplay>,
    pub departures_loading: bool,
    pub departures_error: Option<String>,
    pub news: Vec<NewsItem>,
    pub news_loading: bool,
    pub news_error: Option<String>,
    pub last_updated: Option<DateTime<Local>>,
}

impl ViewState {
    pub fn new(selection: Selection) -> Self {
        let mut state = Self::default();
        state.select(selection);
        state
    }

    /// Current generation, used to tag spawned polls.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Parsed direction of the current hint, if recognized.
    pub fn direction(&self) -> Option<Direction> {
        self.selection
            .direction
            .as_deref()
            .and_then(Direction::classify)
    }

    /// Whether a direction hint is present but matched neither terminus.
    /// The pipeline then falls back to showing both directions; the header
    /// points that out instead of failing.
    pub fn direction_unrecognized(&self) -> bool {
        self.selection.direction.is_some() && self.direction().is_none()
    }

    /// Replaces the selection and resets both resources to loading.
    ///
    /// The resolved station is dropped so the next poll re-resolves the name.
    /// Bumping the generation invalidates every in-flight poll.
    pub fn select(&mut self, selection: Selection) {
        self.selection = selection;
        self.generation += 1;
        self.station = None;
        self.departures_loading = true;
        self.departures_error = None;
        self.news_loading = true;
        self.news_error = None;
    }

    /// Applies one poll outcome.
    ///
    /// Outcomes tagged with an older generation are ignored. A failed poll
    /// records the error but keeps the previously displayed list until the
    /// next successful poll replaces it.
    pub fn apply(&mut self, outcome: PollOutcome) {
        match outcome {
            PollOutcome::Departures { tag, result } => {
                if tag != self.generation {
                    return;
                }
                self.departures_loading = false;
                match result {
                    Ok(Some(batch)) => {
                        self.station = Some(batch.station);
                        self.departures = batch.departures;
                        self.departures_error = None;
                        self.last_updated = Some(Local::now());
                    }
                    Ok(None) => {
                        self.station = None;
                        self.departures.clear();
                        self.departures_error = None;
                        self.last_updated = Some(Local::now());
                    }
                    Err(err) => {
                        self.departures_error = Some(err.to_string());
                    }
                }
            }
            PollOutcome::News { tag, result } => {
                if tag != self.generation {
                    return;
                }
                self.news_loading = false;
                match result {
                    Ok(items) => {
                        self.news = items;
                        self.news_error = None;
                    }
                    Err(err) => {
                        self.news_error = Some(err.to_string());
                    }
                }
            }
        }
    }

    /// Recomputes the countdown column in place. No network involved.
    pub fn tick(&mut self, now_ms: i64) {
        for departure in &mut self.departures {
            departure.refresh(now_ms);
        }
    }
}

/// Resolves the station (unless already cached) and runs the departure
/// pipeline for it.
///
/// # Errors
///
/// Surfaces [`ServiceError::StationNotFound`] when the resolver comes up
/// empty, otherwise whatever the client reported. Partial results are never
/// returned.
pub async fn load_departures(
    client: &MvgClient,
    station_name: &str,
    direction_hint: Option<&str>,
    cached: Option<StationLocation>,
    now_ms: i64,
) -> Result<DepartureBatch, ServiceError> {
    let station = match cached {
        Some(station) => station,
        None => client.station_by_name(station_name).await?.ok_or_else(|| {
            ServiceError::StationNotFound {
                name: station_name.to_string(),
            }
        })?,
    };

    let raw = client.departures(&station.global_id).await?;
    let departures = board::build_board(raw, direction_hint, now_ms);

    Ok(DepartureBatch {
        station,
        departures,
    })
}

/// Fetches all line messages and keeps the ones affecting the target line.
pub async fn load_news(client: &MvgClient) -> Result<Vec<NewsItem>, ServiceError> {
    Ok(board::line_news(client.messages().await?))
}

/// Spawns the two independent poll tasks for the current selection.
///
/// Each task reports back over the channel with the generation captured here.
/// In-flight tasks are never cancelled; a task outliving its selection is
/// neutralized by the tag check in [`ViewState::apply`].
pub fn spawn_poll(client: &MvgClient, state: &ViewState, tx: &UnboundedSender<PollOutcome>) {
    let tag = state.generation();

    {
        let client = client.clone();
        let tx = tx.clone();
        let station_name = state.selection.station.clone();
        let direction = state.selection.direction.clone();
        let cached = state.station.clone();
        tokio::spawn(async move {
            let result = match station_name {
                Some(name) => {
                    let now_ms = Utc::now().timestamp_millis();
                    load_departures(&client, &name, direction.as_deref(), cached, now_ms)
                        .await
                        .map(Some)
                }
                None => Ok(None),
            };
            let _ = tx.send(PollOutcome::Departures { tag, result });
        });
    }

    {
        let client = client.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let result = load_news(&client).await;
            let _ = tx.send(PollOutcome::News { tag, result });
        });
    }
}
