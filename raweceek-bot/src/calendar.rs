//! Support-series calendar: scraping, the on-disk cache and its merge rules.
//!
//! The upstream pages drop session times once a weekend is under way, so
//! the cache file is the source of truth for anything already seen. New
//! scrapes only ever add to it.

use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate, Weekday};
use chrono_tz::Tz;
use log::{debug, info, warn};
use raweceek_parser::{parse_race_weekend, RaceWeekend, SessionTime};

use crate::persist;
use crate::{Error, Result};

/// Weekends keyed by the `DD Month` of their Sunday.
pub type Calendar = BTreeMap<String, RaceWeekend>;

pub struct Scraper {
    client: reqwest::Client,
    base_url: String,
    race_ids: RangeInclusive<u32>,
    timezone: Tz,
}

impl Scraper {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        race_ids: RangeInclusive<u32>,
        timezone: Tz,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            race_ids,
            timezone,
        }
    }

    async fn fetch(&self, race_id: u32) -> Result<Option<String>> {
        let url = format!("{}?raceid={race_id}", self.base_url);
        debug!("fetching {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| Error::Scrape {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("skipping race {race_id}: got response status {status}");
            return Ok(None);
        }

        let html = response
            .text()
            .await
            .map_err(|source| Error::Scrape { url, source })?;
        Ok(Some(html))
    }

    /// Scrapes every configured race id into a calendar fragment.
    ///
    /// Ids answering with a non-success status or a page missing the
    /// expected blocks are skipped. An unsupported country aborts the scrape.
    pub async fn scrape(&self) -> Result<Calendar> {
        let mut fragment = Calendar::new();

        for race_id in self.race_ids.clone() {
            let Some(html) = self.fetch(race_id).await? else {
                continue;
            };

            let Some(weekend) = parse_race_weekend(&html) else {
                warn!("skipping race {race_id}: unexpected page layout");
                continue;
            };

            let weekend = weekend.into_timezone(self.timezone)?;
            if let Some(key) = weekend.key() {
                fragment.entry(key).or_insert(weekend);
            }
        }

        info!("scraped {} support-series weekends", fragment.len());
        Ok(fragment)
    }
}

fn merge_weekend(existing: &mut RaceWeekend, scraped: RaceWeekend) {
    for session in scraped.sessions {
        let known = existing
            .sessions
            .iter_mut()
            .find(|s| s.name == session.name && s.day == session.day);

        match known {
            Some(known) if known.time.is_placeholder() && !session.time.is_placeholder() => {
                known.time = session.time;
            }
            Some(_) => {}
            None => existing.sessions.push(session),
        }
    }
}

/// Folds `fragment` into `cache` without losing anything already known.
///
/// New weekends are inserted as scraped. For a weekend already cached, new
/// sessions are appended and placeholder times are upgraded, but a known
/// time is never replaced.
pub fn merge_into(cache: &mut Calendar, fragment: Calendar) {
    for (key, weekend) in fragment {
        match cache.get_mut(&key) {
            Some(existing) => merge_weekend(existing, weekend),
            None => {
                cache.insert(key, weekend);
            }
        }
    }
}

/// Sessions of the support-series weekend keyed `key`, grouped by day in
/// discovery order. Empty when that week has no such weekend.
pub fn sessions_for_event(
    key: &str,
    calendar: &Calendar,
) -> HashMap<Weekday, Vec<(String, SessionTime)>> {
    let mut days: HashMap<Weekday, Vec<(String, SessionTime)>> = HashMap::new();
    if let Some(weekend) = calendar.get(key) {
        for session in &weekend.sessions {
            days.entry(session.day)
                .or_default()
                .push((session.name.clone(), session.time.clone()));
        }
    }
    days
}

/// The JSON file holding the [`Calendar`].
pub struct CalendarFile {
    path: PathBuf,
}

impl CalendarFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the cache, creating an empty one on first use.
    ///
    /// A file that no longer parses is moved to `<name>.corrupt` and the
    /// cache starts over empty.
    pub async fn load(&self) -> Result<Calendar> {
        match persist::read_json(&self.path).await {
            Ok(Some(calendar)) => Ok(calendar),
            Ok(None) => {
                info!("creating empty calendar at {}", self.path.display());
                self.reset().await
            }
            Err(Error::Json { source, .. }) => {
                let aside = persist::set_aside(&self.path).await?;
                warn!(
                    "calendar cache is unreadable ({source}), moved to {} and starting empty",
                    aside.display()
                );
                self.reset().await
            }
            Err(err) => Err(err),
        }
    }

    async fn reset(&self) -> Result<Calendar> {
        let calendar = Calendar::new();
        self.save(&calendar).await?;
        Ok(calendar)
    }

    pub async fn save(&self, calendar: &Calendar) -> Result<()> {
        persist::write_json(&self.path, calendar).await
    }

    /// `archived_<basename>_<year>.json` next to the live file.
    pub fn archive_path(&self, year: i32) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("calendar");
        self.path.with_file_name(format!("archived_{stem}_{year}.json"))
    }

    /// On January 1st, moves every weekend that ended in an earlier year into
    /// the archive for that year. Weekends of the new year stay live, so a
    /// second run on the same day has nothing left to move. Returns whether
    /// anything was archived.
    pub async fn archive_at_year_boundary(&self, today: NaiveDate) -> Result<bool> {
        if today.month() != 1 || today.day() != 1 {
            return Ok(false);
        }

        let mut live = Calendar::new();
        let mut by_year: BTreeMap<i32, Calendar> = BTreeMap::new();
        for (key, weekend) in self.load().await? {
            match weekend.end_date().map(|end| end.year()) {
                Some(year) if year < today.year() => {
                    by_year.entry(year).or_default().insert(key, weekend);
                }
                _ => {
                    live.insert(key, weekend);
                }
            }
        }

        if by_year.is_empty() {
            debug!("nothing to archive on {today}");
            return Ok(false);
        }

        for (year, old) in by_year {
            let archive_path = self.archive_path(year);
            let mut archive: Calendar =
                persist::read_json(&archive_path).await?.unwrap_or_default();
            merge_into(&mut archive, old);
            persist::write_json(&archive_path, &archive).await?;
            info!("archived {year} weekends to {}", archive_path.display());
        }

        self.save(&live).await?;
        Ok(true)
    }

    /// Archives if due, merges `fragment` into the cache and persists it.
    pub async fn update(&self, fragment: Calendar, today: NaiveDate) -> Result<Calendar> {
        self.archive_at_year_boundary(today).await?;

        let mut calendar = self.load().await?;
        merge_into(&mut calendar, fragment);
        self.save(&calendar).await?;
        Ok(calendar)
    }
}
