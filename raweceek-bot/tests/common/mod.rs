#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use raweceek_bot::announce::{Announcement, AnnouncementKind};
use raweceek_bot::config::Config;
use raweceek_bot::engine::App;
use raweceek_bot::schedule::{Event, ScheduleOracle, Session, SessionKind};
use raweceek_bot::store::{
    EditOutcome, LastPost, MessageId, MessageMeta, MessageStore, StateFile,
};
use raweceek_bot::{Error, Result};
use serde_json::json;
use tokio::sync::{Notify, Semaphore};

pub const BOT_ID: u64 = 42;

/// Nothing listens here, so every request fails at the transport.
pub const DEAD_URL: &str = "http://127.0.0.1:9/Results";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn event(round: u32, name: &str, race_day: NaiveDate) -> Event {
    let race = race_day.and_hms_opt(13, 0, 0).unwrap().and_utc();
    Event {
        round,
        name: name.into(),
        start: race_day - Days::new(2),
        end: race_day,
        sessions: vec![
            Session {
                kind: SessionKind::Qualifying,
                starts_at: race - chrono::Duration::days(1) + chrono::Duration::hours(1),
            },
            Session {
                kind: SessionKind::Race,
                starts_at: race,
            },
        ],
    }
}

pub struct Season(Arc<Vec<Event>>);

#[async_trait]
impl ScheduleOracle for Season {
    async fn season(&self, _year: i32) -> Result<Arc<Vec<Event>>> {
        Ok(Arc::clone(&self.0))
    }
}

pub fn season() -> Arc<Season> {
    Arc::new(Season(Arc::new(vec![
        event(1, "Bahrain Grand Prix", date(2024, 3, 2)),
        event(2, "Saudi Arabian Grand Prix", date(2024, 3, 9)),
        event(3, "Australian Grand Prix", date(2024, 3, 24)),
    ])))
}

#[derive(Default)]
pub struct Channel {
    pub history: Vec<MessageMeta>,
    pub deleted: HashSet<MessageId>,
    pub sent: Vec<(Announcement, Option<PathBuf>)>,
    pub edited: Vec<(MessageId, Announcement)>,
    pub reactions: Vec<(MessageId, String)>,
    pub presence: Vec<AnnouncementKind>,
    /// Reactions refused before they start going through.
    pub refused_reactions: u32,
    /// Presence updates refused once something has been sent.
    pub refused_presence_after_send: u32,
}

/// Holds every `send` until the test lets it through.
pub struct Gate {
    pub entered: Notify,
    pub release: Semaphore,
}

#[derive(Default)]
pub struct FakeStore {
    channel: Mutex<Channel>,
    pub gate: Option<Gate>,
}

fn refused(what: &str) -> Error {
    Error::Store(format!("{what} refused").into())
}

impl FakeStore {
    pub fn with_history(history: Vec<MessageMeta>) -> Self {
        Self::with_channel(Channel {
            history,
            ..Default::default()
        })
    }

    pub fn with_channel(channel: Channel) -> Self {
        Self {
            channel: Mutex::new(channel),
            gate: None,
        }
    }

    pub fn gated() -> Self {
        Self {
            channel: Mutex::default(),
            gate: Some(Gate {
                entered: Notify::new(),
                release: Semaphore::new(0),
            }),
        }
    }

    pub fn channel(&self) -> MutexGuard<'_, Channel> {
        self.channel.lock().unwrap()
    }
}

#[async_trait]
impl MessageStore for FakeStore {
    async fn history(&self, limit: u8) -> Result<Vec<MessageMeta>> {
        let channel = self.channel();
        Ok(channel.history.iter().take(limit.into()).cloned().collect())
    }

    async fn send(&self, announcement: &Announcement, image: Option<&Path>) -> Result<MessageId> {
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.acquire().await.unwrap().forget();
        }

        let mut channel = self.channel();
        channel
            .sent
            .push((announcement.clone(), image.map(Path::to_path_buf)));
        Ok(MessageId(1000 + channel.sent.len() as u64))
    }

    async fn edit(&self, id: MessageId, announcement: &Announcement) -> Result<EditOutcome> {
        let mut channel = self.channel();
        if channel.deleted.contains(&id) {
            return Ok(EditOutcome::Missing);
        }
        channel.edited.push((id, announcement.clone()));
        Ok(EditOutcome::Edited)
    }

    async fn react(&self, id: MessageId, emoji: &str) -> Result<()> {
        let mut channel = self.channel();
        if channel.refused_reactions > 0 {
            channel.refused_reactions -= 1;
            return Err(refused("reaction"));
        }
        channel.reactions.push((id, emoji.to_string()));
        Ok(())
    }

    async fn set_presence(&self, kind: AnnouncementKind) -> Result<()> {
        let mut channel = self.channel();
        if !channel.sent.is_empty() && channel.refused_presence_after_send > 0 {
            channel.refused_presence_after_send -= 1;
            return Err(refused("presence"));
        }
        channel.presence.push(kind);
        Ok(())
    }
}

pub fn config(dir: &Path, scrape_url: &str) -> Config {
    let map = json!({
        "bot_token": "token",
        "channel_id": 1,
        "bot_id": BOT_ID,
        "race_week_image": "raceweek.png",
        "no_race_week_image": "noraceweek.png",
        "race_week_emoji": "🏁",
        "no_race_week_emoji": "😴",
        "first_raceid": 1,
        "last_raceid": 1,
        "scrape_url": scrape_url,
        "cache_file": dir.join("f2_calendar.json"),
        "state_file": dir.join("announcement_state.json"),
        "retries": 2,
        "retry_delay_secs": 0,
    });
    Config::from_map(map.as_object().unwrap().clone(), Path::new("config.json")).unwrap()
}

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub state: StateFile,
    pub store: Arc<FakeStore>,
    pub app: App,
}

pub fn harness(store: FakeStore, scrape_url: &str) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), scrape_url);
    let state = StateFile::new(&config.state_file);
    let store = Arc::new(store);
    let app = App::new(config, reqwest::Client::new(), season(), store.clone());
    Harness {
        dir,
        state,
        store,
        app,
    }
}

pub async fn with_last_post(week: NaiveDate) -> Harness {
    let harness = harness(FakeStore::default(), DEAD_URL);
    harness
        .state
        .save(&LastPost {
            week,
            message: MessageId(7),
        })
        .await
        .unwrap();
    harness
}
