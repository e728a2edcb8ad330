//! Rendering of the weekly announcement.
//!
//! Everything here is pure: the same event and sessions always produce the
//! same bytes, which is what lets an edit of this week's message be a plain
//! overwrite.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate, Timelike, Weekday};
use chrono_tz::Tz;
use log::warn;
use raweceek_parser::week::{sunday_of_week, week_key};
use raweceek_parser::SessionTime;

use crate::calendar::{sessions_for_event, Calendar};
use crate::locale::Language;
use crate::schedule::{sessions_by_day, Event, Schedule, Session, SessionKind};
use crate::{Error, Result};

const ANNOUNCED_DAYS: [Weekday; 4] = [Weekday::Thu, Weekday::Fri, Weekday::Sat, Weekday::Sun];

pub type SecondaryDays = HashMap<Weekday, Vec<(String, SessionTime)>>;

/// Days with sessions that have no block in the announcement, Monday first.
fn unannounced_days<'a>(days: impl IntoIterator<Item = &'a Weekday>) -> Vec<Weekday> {
    let mut days: Vec<Weekday> = days
        .into_iter()
        .copied()
        .filter(|day| !ANNOUNCED_DAYS.contains(day))
        .collect();
    days.sort_by_key(Weekday::num_days_from_monday);
    days.dedup();
    days
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnouncementKind {
    RaceWeek,
    NoRaceWeek,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub kind: AnnouncementKind,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy)]
pub struct Composer {
    language: Language,
    timezone: Tz,
}

fn secondary_title(name: &str) -> String {
    match name {
        "Feature Race" => "**F2 Feature Race**".into(),
        "Qualifying Session" => "F2 Qualifying".into(),
        _ => format!("F2 {name}"),
    }
}

fn primary_title(kind: SessionKind) -> String {
    match kind {
        SessionKind::Race => "**F1 Feature Race**".into(),
        _ => format!("F1 {}", kind.title()),
    }
}

/// Puts `line` at `hour`, or the first free hour after it.
fn place(slots: &mut BTreeMap<u32, String>, hour: u32, line: String) {
    let mut hour = hour;
    while slots.contains_key(&hour) {
        hour += 1;
    }
    slots.insert(hour, line);
}

/// Fills in placeholder sessions for a weekend that is cached but has lost
/// its Saturday and Sunday timings.
pub fn fill_missing_days(days: SecondaryDays) -> SecondaryDays {
    if days.is_empty() || days.contains_key(&Weekday::Sat) || days.contains_key(&Weekday::Sun) {
        return days;
    }

    let missing = || SessionTime::Placeholder("N/A".into());
    HashMap::from([
        (Weekday::Fri, vec![("Qualifying Session".into(), missing())]),
        (Weekday::Sat, vec![("Sprint Race".into(), missing())]),
        (Weekday::Sun, vec![("Feature Race".into(), missing())]),
    ])
}

impl Composer {
    pub fn new(language: Language, timezone: Tz) -> Self {
        Self { language, timezone }
    }

    /// Upper-cased name and date span, e.g. `MONACO GRAND PRIX 26 - 28 MAI`.
    pub fn event_title(&self, event: &Event) -> String {
        let end_month = self.language.month_name(event.end).to_uppercase();
        let span = if event.start.month() == event.end.month() {
            format!("{} - {} {end_month}", event.start.day(), event.end.day())
        } else {
            let start_month = self.language.month_name(event.start).to_uppercase();
            format!(
                "{} {start_month} - {} {end_month}",
                event.start.day(),
                event.end.day()
            )
        };
        format!("{} {span}", event.name.to_uppercase())
    }

    fn render_day(
        &self,
        day: Weekday,
        primary: &[Session],
        secondary: &[(String, SessionTime)],
    ) -> Option<String> {
        if primary.is_empty() && secondary.is_empty() {
            return None;
        }

        let mut pending = Vec::new();
        let mut slots = BTreeMap::new();

        for (name, time) in secondary {
            let line = format!("{}: {time}", secondary_title(name));
            match time {
                SessionTime::Known(range) => place(&mut slots, range.start.hour(), line),
                SessionTime::Placeholder(_) => pending.push(line),
            }
        }

        for session in primary {
            let local = session.starts_at.with_timezone(&self.timezone);
            let line = format!(
                "{}: {}",
                primary_title(session.kind),
                local.format("%H:%M")
            );
            place(&mut slots, local.hour(), line);
        }

        let mut block = format!("__{}__\n", self.language.day_name(day));
        for line in pending.iter().chain(slots.values()) {
            block.push_str(line);
            block.push('\n');
        }
        block.push('\n');
        Some(block)
    }

    /// Title and per-day session listing for a race week.
    pub fn race_week(
        &self,
        event: &Event,
        secondary: &SecondaryDays,
        remaining: usize,
    ) -> Announcement {
        let primary = sessions_by_day(event, self.timezone);
        for day in unannounced_days(primary.keys().chain(secondary.keys())) {
            warn!(
                "{}: sessions on {day} fall outside the announced days and are left out",
                event.name
            );
        }

        let mut body = String::new();
        for day in ANNOUNCED_DAYS {
            let primary = primary.get(&day).map(Vec::as_slice).unwrap_or_default();
            let secondary = secondary.get(&day).map(Vec::as_slice).unwrap_or_default();
            if let Some(block) = self.render_day(day, primary, secondary) {
                body.push_str(&block);
            }
        }
        body.push_str(&self.language.remaining_events(remaining));

        Announcement {
            kind: AnnouncementKind::RaceWeek,
            title: self.event_title(event),
            body,
        }
    }

    pub fn no_race_week(&self, weeks: u32, next: &Event) -> Announcement {
        Announcement {
            kind: AnnouncementKind::NoRaceWeek,
            title: self.language.weeks_until(weeks),
            body: self.language.next_date(next.end),
        }
    }
}

pub async fn race_week_announcement(
    composer: &Composer,
    schedule: &Schedule,
    calendar: &Calendar,
    date: NaiveDate,
) -> Result<Announcement> {
    let event = schedule
        .event_for_week(date)
        .await?
        .ok_or_else(|| Error::NoEventThisWeek(sunday_of_week(date)))?;
    let secondary = fill_missing_days(sessions_for_event(&week_key(event.end), calendar));
    let remaining = schedule.remaining_event_count(date).await?;
    Ok(composer.race_week(&event, &secondary, remaining))
}

pub async fn no_race_week_announcement(
    composer: &Composer,
    schedule: &Schedule,
    date: NaiveDate,
) -> Result<Announcement> {
    let next = schedule.next_event(date).await?;
    let weeks = schedule.weeks_until_next_race_week(date).await?;
    Ok(composer.no_race_week(weeks, &next))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn session(kind: SessionKind, y: i32, m: u32, d: u32, h: u32, min: u32) -> Session {
        Session {
            kind,
            starts_at: Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap(),
        }
    }

    fn monaco() -> Event {
        Event {
            round: 8,
            name: "Monaco Grand Prix".into(),
            start: date(2023, 5, 26),
            end: date(2023, 5, 28),
            sessions: vec![
                session(SessionKind::Qualifying, 2023, 5, 27, 14, 0),
                session(SessionKind::Race, 2023, 5, 28, 13, 0),
            ],
        }
    }

    fn secondary() -> SecondaryDays {
        HashMap::from([
            (
                Weekday::Fri,
                vec![("Qualifying Session".to_string(), SessionTime::from("14:55-15:25"))],
            ),
            (
                Weekday::Sat,
                vec![
                    ("Sprint Race".to_string(), SessionTime::from("TBC")),
                    ("Super Sprint".to_string(), SessionTime::from("16:10-16:50")),
                ],
            ),
            (
                Weekday::Sun,
                vec![("Feature Race".to_string(), SessionTime::from("15:05-16:05"))],
            ),
        ])
    }

    fn composer() -> Composer {
        Composer::new(Language::Norwegian, Tz::Europe__Oslo)
    }

    #[test]
    fn renders_race_week() {
        let announcement = composer().race_week(&monaco(), &secondary(), 15);

        assert_eq!(announcement.kind, AnnouncementKind::RaceWeek);
        assert_eq!(announcement.title, "MONACO GRAND PRIX 26 - 28 MAI");
        assert_eq!(
            announcement.body,
            "__Fredag__\n\
             F2 Qualifying: 14:55-15:25\n\
             \n\
             __Lørdag__\n\
             F2 Sprint Race: TBC\n\
             F2 Super Sprint: 16:10-16:50\n\
             F1 Qualifying: 16:00\n\
             \n\
             __Søndag__\n\
             **F2 Feature Race**: 15:05-16:05\n\
             **F1 Feature Race**: 15:00\n\
             \n\
             -Løp igjen: 15"
        );
    }

    #[test]
    fn rendering_is_deterministic() {
        let composer = composer();
        let first = composer.race_week(&monaco(), &secondary(), 3);
        let second = composer.race_week(&monaco(), &secondary(), 3);
        assert_eq!(first, second);
    }

    #[test]
    fn title_spans_month_boundary() {
        let mut event = monaco();
        event.name = "Austrian Grand Prix".into();
        event.start = date(2023, 6, 30);
        event.end = date(2023, 7, 2);
        assert_eq!(
            composer().event_title(&event),
            "AUSTRIAN GRAND PRIX 30 JUNI - 2 JULI"
        );
    }

    #[test]
    fn empty_days_are_omitted() {
        let announcement = composer().race_week(&monaco(), &SecondaryDays::new(), 1);
        assert!(!announcement.body.contains("Torsdag"));
        assert!(!announcement.body.contains("Fredag"));
        assert!(announcement.body.starts_with("__Lørdag__\nF1 Qualifying: 16:00\n"));
    }

    #[test]
    fn same_hour_collision_moves_to_next_slot() {
        let mut slots = BTreeMap::new();
        place(&mut slots, 15, "a".into());
        place(&mut slots, 15, "b".into());
        place(&mut slots, 15, "c".into());
        assert_eq!(slots.into_iter().collect::<Vec<_>>(), vec![
            (15, "a".to_string()),
            (16, "b".to_string()),
            (17, "c".to_string()),
        ]);
    }

    #[test]
    fn fills_weekend_that_lost_its_timings() {
        let days = HashMap::from([(
            Weekday::Fri,
            vec![("Qualifying Session".to_string(), SessionTime::from("14:55-15:25"))],
        )]);
        let filled = fill_missing_days(days);
        assert_eq!(filled[&Weekday::Sun][0].1, SessionTime::Placeholder("N/A".into()));
        assert_eq!(filled[&Weekday::Fri][0].1.to_string(), "N/A");

        assert!(fill_missing_days(SecondaryDays::new()).is_empty());
        assert_eq!(fill_missing_days(secondary()), secondary());
    }

    #[test]
    fn sessions_moved_to_monday_are_reported() {
        // a late Sunday start in the Americas lands after midnight in Oslo
        let mut event = monaco();
        event.sessions[1] = session(SessionKind::Race, 2023, 5, 28, 23, 30);
        let primary = sessions_by_day(&event, Tz::Europe__Oslo);

        let mut secondary = secondary();
        secondary.insert(
            Weekday::Mon,
            vec![("Feature Race".to_string(), SessionTime::from("00:05-01:05"))],
        );

        assert_eq!(
            unannounced_days(primary.keys().chain(secondary.keys())),
            vec![Weekday::Mon]
        );

        let announcement = composer().race_week(&event, &secondary, 15);
        assert!(!announcement.body.contains("Mandag"));
        assert!(!announcement.body.contains("F1 Feature Race"));
    }

    #[test]
    fn announced_days_are_not_reported() {
        let primary = sessions_by_day(&monaco(), Tz::Europe__Oslo);
        assert!(unannounced_days(primary.keys().chain(secondary().keys())).is_empty());
    }

    #[test]
    fn renders_no_race_week() {
        let announcement = composer().no_race_week(2, &monaco());
        assert_eq!(announcement.kind, AnnouncementKind::NoRaceWeek);
        assert_eq!(announcement.title, "2 uker til neste rawe ceek...");
        assert_eq!(announcement.body, "Neste dato er 28 Mai");
    }
}
