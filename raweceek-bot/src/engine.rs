//! Reconciliation: deciding whether this week's announcement is a new
//! message or an edit, and the daily loop driving it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use log::{debug, error, info, warn};
use raweceek_parser::week::sunday_of_week;
use tokio::sync::Mutex;
use tokio::time;

use crate::announce::{
    no_race_week_announcement, race_week_announcement, AnnouncementKind, Composer,
};
use crate::calendar::{Calendar, CalendarFile, Scraper};
use crate::config::Config;
use crate::schedule::{HttpOracle, Schedule, ScheduleOracle};
use crate::store::{EditOutcome, LastPost, MessageId, MessageStore, StateFile};
use crate::Error;

/// How far back the channel is searched when no state file exists.
pub const HISTORY_WINDOW: u8 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Edit(MessageId),
    Send,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Edited(MessageId),
    Sent(MessageId),
}

/// Edit when the last announcement went out this week, send otherwise.
pub fn decide(today: NaiveDate, last: Option<&LastPost>) -> Action {
    match last {
        Some(post) if post.week == sunday_of_week(today) => Action::Edit(post.message),
        _ => Action::Send,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retries: config.retries,
            delay: config.retry_delay(),
            attempt_timeout: config.run_timeout(),
        }
    }
}

/// Runs `op` until it succeeds or `policy.retries` retries have failed.
/// Each attempt is bounded by `policy.attempt_timeout`.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = match time::timeout(policy.attempt_timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(policy.attempt_timeout).into()),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(err) if attempt <= policy.retries => {
                warn!("attempt {attempt} failed, retrying in {:?}: {err:#}", policy.delay);
                time::sleep(policy.delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Next instant at `at` wall-clock time, today if still ahead.
pub fn next_fire(now: DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let zone = now.timezone();
    let today = now.date_naive();

    (0..3)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .filter_map(|date| zone.from_local_datetime(&date.and_time(at)).earliest())
        .find(|candidate| *candidate > now)
        .unwrap_or_else(|| now + chrono::Duration::days(1))
}

pub fn http_client(config: &Config) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .timeout(config.http_timeout())
        .build()
}

/// Everything a run needs, built once at startup.
pub struct App {
    config: Config,
    schedule: Schedule,
    scraper: Scraper,
    calendar: CalendarFile,
    state: StateFile,
    composer: Composer,
    store: Arc<dyn MessageStore>,
    run_lock: Mutex<()>,
}

impl App {
    pub fn new(
        config: Config,
        client: reqwest::Client,
        oracle: Arc<dyn ScheduleOracle>,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            schedule: Schedule::new(oracle),
            scraper: Scraper::new(
                client,
                config.scrape_url.clone(),
                config.race_ids(),
                config.timezone,
            ),
            calendar: CalendarFile::new(&config.cache_file),
            state: StateFile::new(&config.state_file),
            composer: Composer::new(config.language, config.timezone),
            store,
            run_lock: Mutex::new(()),
            config,
        }
    }

    pub fn from_config(config: Config, store: Arc<dyn MessageStore>) -> anyhow::Result<Self> {
        let client = http_client(&config).context("failed to build http client")?;
        let oracle = Arc::new(HttpOracle::new(client.clone(), config.schedule_url.clone()));
        Ok(Self::new(config, client, oracle, store))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.config.timezone).date_naive()
    }

    /// The persisted record, or the newest own message in recent history.
    /// An unreadable state file counts as missing.
    async fn last_post(&self) -> crate::Result<Option<LastPost>> {
        match self.state.load().await {
            Ok(Some(post)) => return Ok(Some(post)),
            Ok(None) => {}
            Err(Error::Json { path, source }) => {
                warn!(
                    "ignoring unreadable state at {} ({source}), searching history",
                    path.display()
                );
            }
            Err(err) => return Err(err),
        }

        let history = self.store.history(HISTORY_WINDOW).await?;
        let found = history
            .into_iter()
            .find(|message| message.author == self.config.bot_id)
            .map(|message| LastPost {
                week: sunday_of_week(
                    message
                        .created_at
                        .with_timezone(&self.config.timezone)
                        .date_naive(),
                ),
                message: message.id,
            });

        if found.is_none() {
            debug!("no own message in the last {HISTORY_WINDOW}");
        }
        Ok(found)
    }

    pub async fn update_presence(&self, today: NaiveDate) -> anyhow::Result<()> {
        let kind = if self.schedule.is_race_week(today).await? {
            AnnouncementKind::RaceWeek
        } else {
            AnnouncementKind::NoRaceWeek
        };
        self.store
            .set_presence(kind)
            .await
            .context("failed to update presence")
    }

    /// Scrapes the support series and folds it into the cache file.
    pub async fn refresh_calendar(&self, today: NaiveDate) -> anyhow::Result<Calendar> {
        let fragment = self.scraper.scrape().await?;
        let calendar = self
            .calendar
            .update(fragment, today)
            .await
            .context("failed to update calendar cache")?;
        Ok(calendar)
    }

    /// Posts or edits this week's announcement.
    pub async fn reconcile(&self, today: NaiveDate, calendar: &Calendar) -> anyhow::Result<Outcome> {
        let race_week = self.schedule.is_race_week(today).await?;
        let announcement = if race_week {
            race_week_announcement(&self.composer, &self.schedule, calendar, today).await?
        } else {
            no_race_week_announcement(&self.composer, &self.schedule, today).await?
        };

        let last = self.last_post().await?;
        if let Action::Edit(id) = decide(today, last.as_ref()) {
            match self.store.edit(id, &announcement).await? {
                EditOutcome::Edited => {
                    info!("edited announcement {}", id.0);
                    self.state
                        .save(&LastPost {
                            week: sunday_of_week(today),
                            message: id,
                        })
                        .await?;
                    return Ok(Outcome::Edited(id));
                }
                EditOutcome::Missing => {
                    warn!("announcement {} is gone, sending a new one", id.0);
                }
            }
        }

        let id = self
            .store
            .send(&announcement, Some(self.config.image(race_week)))
            .await?;
        info!("sent announcement {}", id.0);

        // Recorded before anything else can fail, so a retry edits instead
        // of posting twice.
        self.state
            .save(&LastPost {
                week: sunday_of_week(today),
                message: id,
            })
            .await?;

        if let Err(err) = self.store.react(id, self.config.emoji(race_week)).await {
            warn!("failed to react to announcement {}: {err}", id.0);
        }

        Ok(Outcome::Sent(id))
    }

    /// One full pass. Callers hold the run lock.
    async fn run_body(&self, today: NaiveDate) -> anyhow::Result<Outcome> {
        self.update_presence(today).await?;
        let calendar = self.refresh_calendar(today).await?;
        let outcome = self.reconcile(today, &calendar).await?;
        self.update_presence(today).await?;
        Ok(outcome)
    }

    /// A single pass for the manual command. No retries.
    pub async fn run_manual(&self) -> anyhow::Result<Outcome> {
        self.run_manual_on(self.today()).await
    }

    pub async fn run_manual_on(&self, today: NaiveDate) -> anyhow::Result<Outcome> {
        let _guard = self.run_lock.lock().await;
        self.run_body(today).await
    }

    /// A retried pass. Failures end up in the log and nowhere else.
    pub async fn run_scheduled(&self) -> Option<Outcome> {
        self.run_scheduled_on(self.today()).await
    }

    pub async fn run_scheduled_on(&self, today: NaiveDate) -> Option<Outcome> {
        let _guard = self.run_lock.lock().await;
        let policy = RetryPolicy::from_config(&self.config);

        match retry(&policy, || self.run_body(today)).await {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                error!(
                    "scheduled run abandoned after {} retries: {err:?}",
                    policy.retries
                );
                None
            }
        }
    }
}

/// Runs once now, then daily at the configured post time.
pub async fn run_forever(app: Arc<App>) {
    let zone = app.config.timezone;
    let at = app.config.post_time;

    loop {
        app.run_scheduled().await;

        let now = Utc::now().with_timezone(&zone);
        let next = next_fire(now, at);
        info!("next run at {next}");

        let wait = (next - now).to_std().unwrap_or_default();
        time::sleep(wait).await;
    }
}
