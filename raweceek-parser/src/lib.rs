mod parser;
mod structs;
mod timezone;
pub mod week;

pub use parser::parse_race_weekend;
pub use structs::{RaceWeekend, Session, SessionTime, TimeRange};
pub use timezone::{country_code, country_timezone, TimezoneError};
