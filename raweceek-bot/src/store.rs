//! The chat channel as the engine sees it, and the record of what was last
//! posted there.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::announce::{Announcement, AnnouncementKind};
use crate::persist;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageMeta {
    pub id: MessageId,
    pub author: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Edited,
    /// The message is gone, most likely deleted by hand.
    Missing,
}

/// Everything the engine needs from the announcement channel.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// The most recent `limit` messages, newest first.
    async fn history(&self, limit: u8) -> Result<Vec<MessageMeta>>;

    async fn send(&self, announcement: &Announcement, image: Option<&Path>) -> Result<MessageId>;

    async fn edit(&self, id: MessageId, announcement: &Announcement) -> Result<EditOutcome>;

    async fn react(&self, id: MessageId, emoji: &str) -> Result<()>;

    async fn set_presence(&self, kind: AnnouncementKind) -> Result<()>;
}

/// The week (by its Sunday) and message of the latest announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastPost {
    pub week: NaiveDate,
    pub message: MessageId,
}

pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `None` until the first announcement is recorded.
    pub async fn load(&self) -> Result<Option<LastPost>> {
        let post: Option<LastPost> = persist::read_json(&self.path).await?;
        if post.is_none() {
            debug!("no announcement state at {}", self.path.display());
        }
        Ok(post)
    }

    pub async fn save(&self, post: &LastPost) -> Result<()> {
        persist::write_json(&self.path, post).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[tokio::test]
    async fn state_survives_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateFile::new(dir.path().join("state.json"));
        assert_eq!(state.load().await.unwrap(), None);

        let post = LastPost {
            week: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            message: MessageId(1_215_000_000_000_000_001),
        };
        state.save(&post).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("state.json")).unwrap();
        assert!(raw.contains("\"2024-03-10\""));
        assert_eq!(StateFile::new(dir.path().join("state.json")).load().await.unwrap(), Some(post));
    }

    #[tokio::test]
    async fn corrupt_state_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(StateFile::new(path).load().await, Err(Error::Json { .. })));
    }
}
