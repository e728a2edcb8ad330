use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;

use crate::week::day_in_week;
use crate::{RaceWeekend, Session, SessionTime, TimeRange};

#[derive(Debug, thiserror::Error)]
pub enum TimezoneError {
    #[error("no timezone known for country `{0}`")]
    UnsupportedCountry(String),
    #[error("{time} does not exist in {zone}")]
    NonexistentLocalTime { time: NaiveDateTime, zone: Tz },
}

/// ISO 3166 code for the countries the support series races in.
pub fn country_code(country: &str) -> Option<&'static str> {
    let code = match country.trim() {
        "Argentina" => "AR",
        "Austria" => "AT",
        "Australia" => "AU",
        "Azerbaijan" => "AZ",
        "Belgium" => "BE",
        "Brazil" => "BR",
        "Bahrain" => "BH",
        "Canada" => "CA",
        "Switzerland" => "CH",
        "China" => "CN",
        "Germany" => "DE",
        "Denmark" => "DK",
        "Algeria" => "DZ",
        "Spain" => "ES",
        "France" => "FR",
        "Great Britain" | "United Kingdom" => "GB",
        "Hungary" => "HU",
        "Indonesia" => "ID",
        "Ireland" => "IE",
        "Israel" => "IL",
        "India" => "IN",
        "Italy" => "IT",
        "Japan" => "JP",
        "South Korea" => "KR",
        "Kuwait" => "KW",
        "Luxembourg" => "LU",
        "Morocco" => "MA",
        "Monaco" => "MC",
        "Mexico" => "MX",
        "Malaysia" => "MY",
        "Netherlands" => "NL",
        "Portugal" => "PT",
        "Qatar" => "QA",
        "Russia" => "RU",
        "Saudi Arabia" => "SA",
        "Sweden" => "SE",
        "Singapore" => "SG",
        "Thailand" => "TH",
        "Turkey" => "TR",
        "Ukraine" => "UA",
        "United Arab Emirates" | "Abu Dhabi" => "AE",
        "United States" => "US",
        "Vietnam" => "VN",
        "South Africa" => "ZA",
        _ => return None,
    };
    Some(code)
}

fn zone_for_code(code: &str) -> Option<Tz> {
    let zone = match code {
        "AR" => Tz::America__Argentina__Buenos_Aires,
        "AT" => Tz::Europe__Vienna,
        "AU" => Tz::Australia__Melbourne,
        "AZ" => Tz::Asia__Baku,
        "BE" => Tz::Europe__Brussels,
        "BR" => Tz::America__Sao_Paulo,
        "BH" => Tz::Asia__Bahrain,
        "CA" => Tz::America__Toronto,
        "CH" => Tz::Europe__Zurich,
        "CN" => Tz::Asia__Shanghai,
        "DE" => Tz::Europe__Berlin,
        "DK" => Tz::Europe__Copenhagen,
        "DZ" => Tz::Africa__Algiers,
        "ES" => Tz::Europe__Madrid,
        "FR" => Tz::Europe__Paris,
        "GB" => Tz::Europe__London,
        "HU" => Tz::Europe__Budapest,
        "ID" => Tz::Asia__Jakarta,
        "IE" => Tz::Europe__Dublin,
        "IL" => Tz::Asia__Jerusalem,
        "IN" => Tz::Asia__Kolkata,
        "IT" => Tz::Europe__Rome,
        "JP" => Tz::Asia__Tokyo,
        "KR" => Tz::Asia__Seoul,
        "KW" => Tz::Asia__Kuwait,
        "LU" => Tz::Europe__Luxembourg,
        "MA" => Tz::Africa__Casablanca,
        "MC" => Tz::Europe__Monaco,
        "MX" => Tz::America__Mexico_City,
        "MY" => Tz::Asia__Kuala_Lumpur,
        "NL" => Tz::Europe__Amsterdam,
        "PT" => Tz::Europe__Lisbon,
        "QA" => Tz::Asia__Qatar,
        "RU" => Tz::Europe__Moscow,
        "SA" => Tz::Asia__Riyadh,
        "SE" => Tz::Europe__Stockholm,
        "SG" => Tz::Asia__Singapore,
        "TH" => Tz::Asia__Bangkok,
        "TR" => Tz::Europe__Istanbul,
        "UA" => Tz::Europe__Kiev,
        "AE" => Tz::Asia__Dubai,
        "US" => Tz::America__New_York,
        "VN" => Tz::Asia__Ho_Chi_Minh,
        "ZA" => Tz::Africa__Johannesburg,
        _ => return None,
    };
    Some(zone)
}

pub fn country_timezone(country: &str) -> Result<Tz, TimezoneError> {
    country_code(country)
        .and_then(zone_for_code)
        .ok_or_else(|| TimezoneError::UnsupportedCountry(country.to_string()))
}

fn convert(
    date: NaiveDate,
    time: NaiveTime,
    from: Tz,
    to: Tz,
) -> Result<NaiveDateTime, TimezoneError> {
    let local = date.and_time(time);
    let converted = from
        .from_local_datetime(&local)
        .earliest()
        .ok_or(TimezoneError::NonexistentLocalTime { time: local, zone: from })?;
    Ok(converted.with_timezone(&to).naive_local())
}

impl RaceWeekend {
    /// Converts every known session window from circuit-local time to `to`.
    ///
    /// A session whose start moves across midnight is moved to the new day.
    pub fn into_timezone(self, to: Tz) -> Result<RaceWeekend, TimezoneError> {
        let from = country_timezone(&self.country)?;
        let Some(sunday) = self.sunday() else {
            return Ok(self);
        };

        let mut sessions = Vec::with_capacity(self.sessions.len());
        for session in self.sessions {
            let SessionTime::Known(range) = session.time else {
                sessions.push(session);
                continue;
            };

            let date = day_in_week(sunday, session.day);
            let start = convert(date, range.start, from, to)?;
            let end = convert(date, range.end, from, to)?;

            sessions.push(Session {
                name: session.name,
                day: start.weekday(),
                time: SessionTime::Known(TimeRange {
                    start: start.time(),
                    end: end.time(),
                }),
            });
        }

        Ok(RaceWeekend { sessions, ..self })
    }
}
