use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

const ENGLISH_DAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

const NORWEGIAN_DAYS: [&str; 7] = [
    "Mandag", "Tirsdag", "Onsdag", "Torsdag", "Fredag", "Lørdag", "Søndag",
];

const ENGLISH_MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const NORWEGIAN_MONTHS: [&str; 12] = [
    "Januar",
    "Februar",
    "Mars",
    "April",
    "Mai",
    "Juni",
    "Juli",
    "August",
    "September",
    "Oktober",
    "November",
    "Desember",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    #[default]
    Norwegian,
}

impl Language {
    fn days(self) -> &'static [&'static str; 7] {
        match self {
            Language::English => &ENGLISH_DAYS,
            Language::Norwegian => &NORWEGIAN_DAYS,
        }
    }

    fn months(self) -> &'static [&'static str; 12] {
        match self {
            Language::English => &ENGLISH_MONTHS,
            Language::Norwegian => &NORWEGIAN_MONTHS,
        }
    }

    pub fn day_name(self, day: Weekday) -> &'static str {
        self.days()[day.num_days_from_monday() as usize]
    }

    pub fn month_name(self, date: NaiveDate) -> &'static str {
        self.months()[date.month0() as usize]
    }

    pub fn weeks_until(self, weeks: u32) -> String {
        match (self, weeks) {
            (Language::English, 1) => "1 week until the next race week...".into(),
            (Language::English, n) => format!("{n} weeks until the next race week..."),
            (Language::Norwegian, 1) => "1 uke til neste rawe ceek...".into(),
            (Language::Norwegian, n) => format!("{n} uker til neste rawe ceek..."),
        }
    }

    pub fn next_date(self, date: NaiveDate) -> String {
        let prefix = match self {
            Language::English => "Next date is",
            Language::Norwegian => "Neste dato er",
        };
        format!("{prefix} {} {}", date.day(), self.month_name(date))
    }

    pub fn remaining_events(self, count: usize) -> String {
        match self {
            Language::English => format!("-Races left: {count}"),
            Language::Norwegian => format!("-Løp igjen: {count}"),
        }
    }
}
