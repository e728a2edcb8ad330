use chrono::Weekday;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use crate::{RaceWeekend, Session, SessionTime};

macro_rules! selector {
    ($query:expr) => {{
        static SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse($query).unwrap());
        &SELECTOR
    }};
}

fn text(element: ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses a support-series results page.
///
/// Returns `None` when any of the country, circuit or schedule blocks is
/// missing or the schedule does not end in a full date. Session times are
/// left in circuit-local time, see [`RaceWeekend::into_timezone`].
pub fn parse_race_weekend<S: AsRef<str>>(s: S) -> Option<RaceWeekend> {
    let html = Html::parse_document(s.as_ref());

    let country = text(html.select(selector!("div.country-circuit-name")).next()?);
    let circuit = text(html.select(selector!("div.country-circuit")).next()?);
    let schedule = text(html.select(selector!("div.schedule")).next()?);

    let (round, date_range) = schedule.split_once('|')?;

    let sessions = html
        .select(selector!("div.pin"))
        .filter_map(parse_session)
        .collect();

    let weekend = RaceWeekend {
        round: round.trim().to_string(),
        country,
        circuit,
        date_range: date_range.trim().to_string(),
        sessions,
    };

    weekend.end_date()?;

    Some(weekend)
}

fn parse_session(element: ElementRef) -> Option<Session> {
    let fields = element
        .children()
        .filter_map(ElementRef::wrap)
        .map(text)
        .filter(|field| !field.is_empty() && !field.contains("displayed"))
        .collect::<Vec<_>>();

    let name = fields.first()?;
    if name.contains("Practice") {
        return None;
    }

    let day = fields.get(1)?.parse::<Weekday>().ok()?;
    let time = match fields.get(2) {
        Some(raw) => SessionTime::from(raw.as_str()),
        None => SessionTime::Placeholder("TBC".into()),
    };

    Some(Session {
        name: name.clone(),
        day,
        time,
    })
}
