use chrono::{Datelike, Days, NaiveDate, Weekday};

/// Returns the Sunday closing the Monday-start week that contains `date`.
pub fn sunday_of_week(date: NaiveDate) -> NaiveDate {
    let days_until_sunday = 6 - date.weekday().num_days_from_monday();
    date + Days::new(u64::from(days_until_sunday))
}

/// Cache key of the week containing `date`, formatted like `07 May`.
pub fn week_key(date: NaiveDate) -> String {
    sunday_of_week(date).format("%d %B").to_string()
}

/// Date of `day` inside the week closed by `sunday`.
pub fn day_in_week(sunday: NaiveDate, day: Weekday) -> NaiveDate {
    let days_before_sunday = 6 - day.num_days_from_monday();
    sunday - Days::new(u64::from(days_before_sunday))
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
