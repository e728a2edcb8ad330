use std::fs;
use std::io::{self, BufRead, ErrorKind, IsTerminal, Write};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;
use log::info;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::locale::Language;
use crate::{Error, Result};

pub const REQUIRED_KEYS: [&str; 9] = [
    "bot_token",
    "channel_id",
    "bot_id",
    "race_week_image",
    "no_race_week_image",
    "race_week_emoji",
    "no_race_week_emoji",
    "first_raceid",
    "last_raceid",
];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bot_token: String,
    pub channel_id: u64,
    pub bot_id: u64,
    pub race_week_image: PathBuf,
    pub no_race_week_image: PathBuf,
    pub race_week_emoji: String,
    pub no_race_week_emoji: String,
    pub first_raceid: u32,
    pub last_raceid: u32,

    #[serde(default)]
    pub command_channel_id: Option<u64>,
    #[serde(default = "defaults::scrape_url")]
    pub scrape_url: String,
    #[serde(default = "defaults::schedule_url")]
    pub schedule_url: String,
    #[serde(default = "defaults::cache_file")]
    pub cache_file: PathBuf,
    #[serde(default = "defaults::state_file")]
    pub state_file: PathBuf,
    #[serde(default = "defaults::post_time", deserialize_with = "hour_minute")]
    pub post_time: NaiveTime,
    #[serde(default = "defaults::timezone")]
    pub timezone: Tz,
    #[serde(default)]
    pub language: Language,
    #[serde(default = "defaults::command_prefix")]
    pub command_prefix: String,
    #[serde(default = "defaults::retries")]
    pub retries: u32,
    #[serde(default = "defaults::retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "defaults::http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default = "defaults::run_timeout_secs")]
    pub run_timeout_secs: u64,
}

mod defaults {
    use std::path::PathBuf;

    use chrono::NaiveTime;
    use chrono_tz::Tz;

    pub fn scrape_url() -> String {
        "https://www.fiaformula2.com/Results".into()
    }

    pub fn schedule_url() -> String {
        "https://api.jolpi.ca/ergast/f1".into()
    }

    pub fn cache_file() -> PathBuf {
        "f2_calendar.json".into()
    }

    pub fn state_file() -> PathBuf {
        "announcement_state.json".into()
    }

    pub fn post_time() -> NaiveTime {
        NaiveTime::from_hms_opt(10, 0, 0).unwrap_or(NaiveTime::MIN)
    }

    pub fn timezone() -> Tz {
        Tz::Europe__Oslo
    }

    pub fn command_prefix() -> String {
        "&".into()
    }

    pub fn retries() -> u32 {
        5
    }

    pub fn retry_delay_secs() -> u64 {
        10
    }

    pub fn http_timeout_secs() -> u64 {
        30
    }

    pub fn run_timeout_secs() -> u64 {
        600
    }
}

fn hour_minute<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
    let raw = String::deserialize(deserializer)?;
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(serde::de::Error::custom)
}

impl Config {
    /// Channel accepting commands without cleanup.
    pub fn command_channel(&self) -> u64 {
        self.command_channel_id.unwrap_or(self.channel_id)
    }

    pub fn race_ids(&self) -> RangeInclusive<u32> {
        self.first_raceid..=self.last_raceid
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Upper bound for one whole attempt of a run.
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn image(&self, race_week: bool) -> &Path {
        if race_week {
            &self.race_week_image
        } else {
            &self.no_race_week_image
        }
    }

    pub fn emoji(&self, race_week: bool) -> &str {
        if race_week {
            &self.race_week_emoji
        } else {
            &self.no_race_week_emoji
        }
    }

    /// Builds a config from a parsed file, failing on the first missing key.
    pub fn from_map(map: Map<String, Value>, path: &Path) -> Result<Self> {
        if let Some(key) = missing_keys(&map).first() {
            return Err(Error::Config(format!(
                "missing required key `{key}` in {}",
                path.display()
            )));
        }

        let config: Config =
            serde_json::from_value(Value::Object(map)).map_err(|source| Error::Json {
                path: path.to_path_buf(),
                source,
            })?;

        if config.first_raceid > config.last_raceid {
            return Err(Error::Config(format!(
                "first_raceid {} is after last_raceid {}",
                config.first_raceid, config.last_raceid
            )));
        }

        Ok(config)
    }

    /// Reads the config at `path`. When stdin is a terminal, missing keys are
    /// asked for once and the completed file is written back.
    pub fn load_or_prompt(path: &Path) -> Result<Self> {
        let mut map = read_map(path)?;

        if !missing_keys(&map).is_empty() && io::stdin().is_terminal() {
            let stdin = io::stdin();
            let mut stdout = io::stdout();
            prompt_missing(&mut map, &mut stdin.lock(), &mut stdout).map_err(|source| {
                Error::File {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            write_map(path, &map)?;
            info!("wrote {}", path.display());
        }

        Self::from_map(map, path)
    }
}

pub fn missing_keys(map: &Map<String, Value>) -> Vec<&'static str> {
    REQUIRED_KEYS
        .into_iter()
        .filter(|key| map.get(*key).map_or(true, Value::is_null))
        .collect()
}

fn read_map(path: &Path) -> Result<Map<String, Value>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Map::new()),
        Err(source) => {
            return Err(Error::File {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&raw).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_map(path: &Path, map: &Map<String, Value>) -> Result<()> {
    let json = serde_json::to_string_pretty(map).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| Error::File {
        path: path.to_path_buf(),
        source,
    })
}

/// Numbers stay numbers, anything else is kept as typed.
fn prompt_value(input: &str) -> Value {
    match input.parse::<u64>() {
        Ok(number) => Value::from(number),
        Err(_) => Value::String(input.to_string()),
    }
}

/// Asks for every missing required key. Empty answers leave the key missing.
pub fn prompt_missing<R: BufRead, W: Write>(
    map: &mut Map<String, Value>,
    input: &mut R,
    output: &mut W,
) -> io::Result<()> {
    for key in missing_keys(map) {
        write!(output, "{key}: ")?;
        output.flush()?;

        let mut line = String::new();
        input.read_line(&mut line)?;
        let line = line.trim();
        if !line.is_empty() {
            map.insert(key.to_string(), prompt_value(line));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serde_json::json;

    use super::*;

    fn complete() -> Map<String, Value> {
        let Value::Object(map) = json!({
            "bot_token": "token",
            "channel_id": 1_100_000_000_000_000_001u64,
            "bot_id": 42,
            "race_week_image": "raceweek.png",
            "no_race_week_image": "noraceweek.png",
            "race_week_emoji": "🏁",
            "no_race_week_emoji": "😴",
            "first_raceid": 1060,
            "last_raceid": 1080
        }) else {
            unreachable!()
        };
        map
    }

    #[test]
    fn optional_keys_have_defaults() {
        let config = Config::from_map(complete(), Path::new("config.json")).unwrap();
        assert_eq!(config.command_channel(), 1_100_000_000_000_000_001);
        assert_eq!(config.post_time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(config.timezone, Tz::Europe__Oslo);
        assert_eq!(config.language, Language::Norwegian);
        assert_eq!(config.retries, 5);
        assert_eq!(config.race_ids(), 1060..=1080);
        assert_eq!(config.cache_file, PathBuf::from("f2_calendar.json"));
    }

    #[test]
    fn optional_keys_are_read() {
        let mut map = complete();
        map.insert("post_time".into(), json!("07:30"));
        map.insert("timezone".into(), json!("America/New_York"));
        map.insert("language".into(), json!("english"));
        map.insert("command_channel_id".into(), json!(7));

        let config = Config::from_map(map, Path::new("config.json")).unwrap();
        assert_eq!(config.post_time, NaiveTime::from_hms_opt(7, 30, 0).unwrap());
        assert_eq!(config.timezone, Tz::America__New_York);
        assert_eq!(config.language, Language::English);
        assert_eq!(config.command_channel(), 7);
    }

    #[test]
    fn missing_key_is_reported() {
        let mut map = complete();
        map.remove("bot_id");
        map.insert("race_week_emoji".into(), Value::Null);

        assert_eq!(missing_keys(&map), vec!["bot_id", "race_week_emoji"]);
        let err = Config::from_map(map, Path::new("config.json")).unwrap_err();
        assert_eq!(err.to_string(), "config: missing required key `bot_id` in config.json");
    }

    #[test]
    fn bad_post_time_is_rejected() {
        let mut map = complete();
        map.insert("post_time".into(), json!("10 o'clock"));
        assert!(matches!(
            Config::from_map(map, Path::new("config.json")),
            Err(Error::Json { .. })
        ));
    }

    #[test]
    fn prompts_only_for_missing_keys() {
        let mut map = complete();
        map.remove("channel_id");
        map.remove("race_week_emoji");

        let mut input = Cursor::new("123\n🏁\n");
        let mut output = Vec::new();
        prompt_missing(&mut map, &mut input, &mut output).unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "channel_id: race_week_emoji: ");
        assert_eq!(map["channel_id"], json!(123));
        assert_eq!(map["race_week_emoji"], json!("🏁"));
        assert!(missing_keys(&map).is_empty());
    }

    #[test]
    fn unanswered_prompt_leaves_key_missing() {
        let mut map = complete();
        map.remove("bot_token");
        prompt_missing(&mut map, &mut Cursor::new("\n"), &mut Vec::new()).unwrap();
        assert_eq!(missing_keys(&map), vec!["bot_token"]);
    }
}
