//! Primary-series schedule: the oracle seam, its HTTP implementation and
//! the week-based queries the rest of the bot asks of it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use log::{debug, warn};
use quick_cache::sync::Cache;
use raweceek_parser::week::sunday_of_week;
use serde::Deserialize;

use crate::{Error, Result};

const SEASON_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Qualifying,
    SprintQualifying,
    Sprint,
    Race,
}

impl SessionKind {
    pub fn title(self) -> &'static str {
        match self {
            SessionKind::Qualifying => "Qualifying",
            SessionKind::SprintQualifying => "Sprint Qualifying",
            SessionKind::Sprint => "Sprint",
            SessionKind::Race => "Race",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub kind: SessionKind,
    pub starts_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub round: u32,
    pub name: String,
    pub start: NaiveDate,
    /// Race day.
    pub end: NaiveDate,
    pub sessions: Vec<Session>,
}

impl Event {
    /// The week this event belongs to. Saturday races map to the same week.
    pub fn sunday(&self) -> NaiveDate {
        sunday_of_week(self.end)
    }

    pub fn session(&self, kind: SessionKind) -> Option<&Session> {
        self.sessions.iter().find(|session| session.kind == kind)
    }

    pub fn is_sprint_weekend(&self) -> bool {
        self.session(SessionKind::Sprint).is_some()
    }
}

#[async_trait]
pub trait ScheduleOracle: Send + Sync {
    /// Every event of the season, ordered by round.
    async fn season(&self, year: i32) -> Result<Arc<Vec<Event>>>;
}

#[derive(Deserialize)]
struct ScheduleResponse {
    #[serde(rename = "MRData")]
    data: ScheduleData,
}

#[derive(Deserialize)]
struct ScheduleData {
    #[serde(rename = "RaceTable")]
    race_table: RaceTable,
}

#[derive(Deserialize)]
struct RaceTable {
    #[serde(rename = "Races", default)]
    races: Vec<Race>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Race {
    #[serde(rename = "round")]
    round: String,
    #[serde(rename = "raceName")]
    race_name: String,
    #[serde(rename = "date")]
    date: NaiveDate,
    #[serde(rename = "time")]
    time: Option<String>,
    first_practice: Option<Slot>,
    qualifying: Option<Slot>,
    #[serde(alias = "SprintShootout")]
    sprint_qualifying: Option<Slot>,
    sprint: Option<Slot>,
}

#[derive(Deserialize)]
struct Slot {
    date: NaiveDate,
    time: Option<String>,
}

fn starts_at(date: NaiveDate, time: Option<&str>) -> Option<DateTime<Utc>> {
    let time = NaiveTime::parse_from_str(time?.trim_end_matches('Z'), "%H:%M:%S").ok()?;
    Some(date.and_time(time).and_utc())
}

impl ScheduleResponse {
    /// Races with a malformed round number are left out.
    fn into_events(self) -> Vec<Event> {
        self.data
            .race_table
            .races
            .into_iter()
            .filter_map(|race| match race.round.parse() {
                Ok(round) => Some(Event::from_race(round, race)),
                Err(err) => {
                    warn!(
                        "skipping {}: malformed round `{}`: {err}",
                        race.race_name, race.round
                    );
                    None
                }
            })
            .collect()
    }
}

impl Event {
    fn from_race(round: u32, race: Race) -> Self {
        let mut sessions = Vec::new();
        let slots = [
            (SessionKind::SprintQualifying, race.sprint_qualifying.as_ref()),
            (SessionKind::Qualifying, race.qualifying.as_ref()),
            (SessionKind::Sprint, race.sprint.as_ref()),
        ];

        for (kind, slot) in slots {
            if let Some(starts_at) = slot.and_then(|slot| starts_at(slot.date, slot.time.as_deref())) {
                sessions.push(Session { kind, starts_at });
            }
        }

        if let Some(starts_at) = starts_at(race.date, race.time.as_deref()) {
            sessions.push(Session {
                kind: SessionKind::Race,
                starts_at,
            });
        }

        sessions.sort_by_key(|session| session.starts_at);

        let start = race
            .first_practice
            .map(|slot| slot.date)
            .or_else(|| race.date.checked_sub_days(Days::new(2)))
            .unwrap_or(race.date);

        Event {
            round,
            name: race.race_name,
            start,
            end: race.date,
            sessions,
        }
    }
}

/// Ergast-compatible season schedule API.
pub struct HttpOracle {
    client: reqwest::Client,
    base_url: String,
    seasons: Cache<i32, (Instant, Arc<Vec<Event>>)>,
}

impl HttpOracle {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            seasons: Cache::new(4),
        }
    }

    async fn fetch(&self, year: i32) -> Result<Vec<Event>> {
        let url = format!("{}/{year}.json?limit=100", self.base_url.trim_end_matches('/'));
        debug!("fetching season schedule from {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(Error::Schedule)?;

        let schedule = response
            .json::<ScheduleResponse>()
            .await
            .map_err(Error::Schedule)?;

        Ok(schedule.into_events())
    }
}

#[async_trait]
impl ScheduleOracle for HttpOracle {
    async fn season(&self, year: i32) -> Result<Arc<Vec<Event>>> {
        if let Some((fetched, events)) = self.seasons.get(&year) {
            if fetched.elapsed() < SEASON_TTL {
                return Ok(events);
            }
        }

        let events = Arc::new(self.fetch(year).await?);
        self.seasons.insert(year, (Instant::now(), Arc::clone(&events)));
        Ok(events)
    }
}

/// Week-based questions about the primary series.
#[derive(Clone)]
pub struct Schedule {
    oracle: Arc<dyn ScheduleOracle>,
}

impl Schedule {
    pub fn new(oracle: Arc<dyn ScheduleOracle>) -> Self {
        Self { oracle }
    }

    /// The event whose race day falls in the same week as `date`.
    pub async fn event_for_week(&self, date: NaiveDate) -> Result<Option<Event>> {
        let sunday = sunday_of_week(date);
        let season = self.oracle.season(date.year()).await?;
        Ok(season.iter().find(|event| event.sunday() == sunday).cloned())
    }

    /// Sundays of every event not yet run, as seen from `date`.
    pub async fn remaining_event_dates(&self, date: NaiveDate) -> Result<Vec<NaiveDate>> {
        // keep the current weekend while it is under way
        let anchor = match date.weekday() {
            Weekday::Sat | Weekday::Sun => date - Days::new(2),
            _ => date,
        };

        let season = self.oracle.season(date.year()).await?;
        let mut dates = season
            .iter()
            .filter(|event| event.end >= anchor)
            .map(Event::sunday)
            .collect::<Vec<_>>();
        dates.sort_unstable();
        dates.dedup();
        Ok(dates)
    }

    pub async fn remaining_event_count(&self, date: NaiveDate) -> Result<usize> {
        Ok(self.remaining_event_dates(date).await?.len())
    }

    pub async fn is_race_week(&self, date: NaiveDate) -> Result<bool> {
        let dates = self.remaining_event_dates(date).await?;
        Ok(dates.contains(&sunday_of_week(date)))
    }

    pub async fn next_event(&self, date: NaiveDate) -> Result<Event> {
        let dates = self.remaining_event_dates(date).await?;
        let sunday = *dates.first().ok_or(Error::SeasonExhausted(date.year()))?;
        self.event_for_week(sunday)
            .await?
            .ok_or(Error::NoEventThisWeek(sunday))
    }

    pub async fn weeks_until_next_race_week(&self, date: NaiveDate) -> Result<u32> {
        let dates = self.remaining_event_dates(date).await?;
        let last = *dates.last().ok_or(Error::SeasonExhausted(date.year()))?;

        let mut sunday = sunday_of_week(date);
        let mut weeks = 0;
        while !dates.contains(&sunday) {
            if sunday > last {
                return Err(Error::SeasonExhausted(date.year()));
            }
            sunday = sunday + Days::new(7);
            weeks += 1;
        }
        Ok(weeks)
    }
}

/// Groups the timed sessions of `event` by their weekday in `timezone`.
pub fn sessions_by_day(event: &Event, timezone: Tz) -> HashMap<Weekday, Vec<Session>> {
    let mut days: HashMap<Weekday, Vec<Session>> = HashMap::new();
    for session in &event.sessions {
        let day = session.starts_at.with_timezone(&timezone).weekday();
        days.entry(day).or_default().push(session.clone());
    }

    let expected = if event.is_sprint_weekend() {
        Weekday::Fri
    } else {
        Weekday::Sat
    };
    if let Some(qualifying) = event.session(SessionKind::Qualifying) {
        let day = qualifying.starts_at.with_timezone(&timezone).weekday();
        if day != expected {
            warn!(
                "{}: qualifying on {day}, expected {expected} for this weekend format",
                event.name
            );
        }
    }

    days
}
