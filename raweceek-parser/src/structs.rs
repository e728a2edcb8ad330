use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime, Timelike, Weekday};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::week::{sunday_of_week, week_key, weekday_name};

/// A session window, always rendered as `HH:MM-HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}-{:02}:{:02}",
            self.start.hour(),
            self.start.minute(),
            self.end.hour(),
            self.end.minute()
        )
    }
}

fn parse_clock(s: &str) -> Option<NaiveTime> {
    let (hour, minute) = s.trim().split_once(':')?;
    NaiveTime::from_hms_opt(hour.trim().parse().ok()?, minute.trim().parse().ok()?, 0)
}

impl FromStr for TimeRange {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s.split_once('-').ok_or(())?;
        Ok(TimeRange {
            start: parse_clock(start).ok_or(())?,
            end: parse_clock(end).ok_or(())?,
        })
    }
}

/// Either a known window or a marker such as `TBC` or `N/A`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionTime {
    Known(TimeRange),
    Placeholder(String),
}

impl SessionTime {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, SessionTime::Placeholder(_))
    }
}

impl fmt::Display for SessionTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionTime::Known(range) => range.fmt(f),
            SessionTime::Placeholder(marker) => f.write_str(marker),
        }
    }
}

impl From<&str> for SessionTime {
    fn from(s: &str) -> Self {
        match s.parse::<TimeRange>() {
            Ok(range) => SessionTime::Known(range),
            Err(()) => SessionTime::Placeholder(s.trim().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub name: String,
    pub day: Weekday,
    pub time: SessionTime,
}

/// One support-series weekend as published on its results page.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(into = "WeekendRecord", try_from = "WeekendRecord")
)]
pub struct RaceWeekend {
    pub round: String,
    pub country: String,
    pub circuit: String,
    /// Raw schedule text, e.g. `19-21 May 2023`.
    pub date_range: String,
    pub sessions: Vec<Session>,
}

impl RaceWeekend {
    /// Last day of the weekend, read from the end of `date_range`.
    pub fn end_date(&self) -> Option<NaiveDate> {
        let end = self.date_range.rsplit('-').next()?.trim();
        ["%d %B %Y", "%d %b %Y"]
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(end, format).ok())
    }

    pub fn sunday(&self) -> Option<NaiveDate> {
        self.end_date().map(sunday_of_week)
    }

    pub fn key(&self) -> Option<String> {
        self.end_date().map(week_key)
    }
}

#[cfg(feature = "serde")]
type SessionRecord = (String, String, String);

/// On-disk shape: `[round, country, circuit, date_range, [[name, day, time], ..]]`.
#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct WeekendRecord(String, String, String, String, Vec<SessionRecord>);

#[cfg(feature = "serde")]
impl From<RaceWeekend> for WeekendRecord {
    fn from(weekend: RaceWeekend) -> Self {
        let sessions = weekend
            .sessions
            .into_iter()
            .map(|session| {
                (
                    session.name,
                    weekday_name(session.day).to_string(),
                    session.time.to_string(),
                )
            })
            .collect();

        WeekendRecord(
            weekend.round,
            weekend.country,
            weekend.circuit,
            weekend.date_range,
            sessions,
        )
    }
}

#[cfg(feature = "serde")]
impl TryFrom<WeekendRecord> for RaceWeekend {
    type Error = String;

    fn try_from(record: WeekendRecord) -> Result<Self, Self::Error> {
        let WeekendRecord(round, country, circuit, date_range, records) = record;

        let mut sessions = Vec::with_capacity(records.len());
        for (name, day, time) in records {
            let day = day
                .trim()
                .parse::<Weekday>()
                .map_err(|_| format!("unknown day name `{day}`"))?;
            sessions.push(Session {
                name,
                day,
                time: SessionTime::from(time.as_str()),
            });
        }

        Ok(RaceWeekend {
            round,
            country,
            circuit,
            date_range,
            sessions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_range_is_zero_padded() {
        let range = "9:5-10:00".parse::<TimeRange>().unwrap();
        assert_eq!(range.to_string(), "09:05-10:00");
    }

    #[test]
    fn unparsable_times_are_placeholders() {
        assert_eq!(
            SessionTime::from(" TBC "),
            SessionTime::Placeholder("TBC".into())
        );
        assert!(SessionTime::from("N/A").is_placeholder());
        assert!(!SessionTime::from("14:55-15:25").is_placeholder());
    }

    #[test]
    fn end_date_handles_month_spanning_weekends() {
        let weekend = RaceWeekend {
            round: "Round 7".into(),
            country: "Spain".into(),
            circuit: "Circuit de Barcelona-Catalunya".into(),
            date_range: "30 June-02 July 2023".into(),
            sessions: Vec::new(),
        };

        assert_eq!(weekend.end_date(), NaiveDate::from_ymd_opt(2023, 7, 2));
        assert_eq!(weekend.key().as_deref(), Some("02 July"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serializes_as_positional_record() {
        let weekend = RaceWeekend {
            round: "Round 5".into(),
            country: "Monaco".into(),
            circuit: "Circuit de Monaco".into(),
            date_range: "26-28 May 2023".into(),
            sessions: vec![Session {
                name: "Feature Race".into(),
                day: Weekday::Sun,
                time: SessionTime::Placeholder("TBC".into()),
            }],
        };

        let json = serde_json::to_value(&weekend).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                "Round 5",
                "Monaco",
                "Circuit de Monaco",
                "26-28 May 2023",
                [["Feature Race", "Sunday", "TBC"]]
            ])
        );

        let back: RaceWeekend = serde_json::from_value(json).unwrap();
        assert_eq!(back, weekend);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn cached_day_names_ignore_case() {
        let json = serde_json::json!([
            "Round 5",
            "Monaco",
            "Circuit de Monaco",
            "26-28 May 2023",
            [["Sprint Race", "saturday", "TBC"], ["Feature Race", " SUNDAY ", "TBC"]]
        ]);

        let weekend: RaceWeekend = serde_json::from_value(json).unwrap();
        let days: Vec<Weekday> = weekend.sessions.iter().map(|s| s.day).collect();
        assert_eq!(days, vec![Weekday::Sat, Weekday::Sun]);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn unknown_cached_day_name_is_rejected() {
        let json = serde_json::json!([
            "Round 5",
            "Monaco",
            "Circuit de Monaco",
            "26-28 May 2023",
            [["Feature Race", "Sundag", "TBC"]]
        ]);

        let err = serde_json::from_value::<RaceWeekend>(json).unwrap_err();
        assert!(err.to_string().contains("unknown day name `Sundag`"));
    }
}
