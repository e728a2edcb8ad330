use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use raweceek_parser::TimezoneError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no events left in the {0} season")]
    SeasonExhausted(i32),

    #[error("no event in the week ending {0}")]
    NoEventThisWeek(NaiveDate),

    #[error("schedule request failed: {0}")]
    Schedule(#[source] reqwest::Error),

    #[error("scrape of {url} failed: {source}")]
    Scrape {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: malformed json: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("config: {0}")]
    Config(String),

    #[error(transparent)]
    Timezone(#[from] TimezoneError),

    #[error("gave up after {0:?}")]
    Timeout(Duration),

    #[error("message channel: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
