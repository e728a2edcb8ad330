//! Discord side: the announcement channel as a [`MessageStore`], the prefix
//! commands and client startup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use chrono::DateTime;
use log::{error, info};
use serenity::builder::{CreateAttachment, CreateEmbed, CreateMessage, EditMessage, GetMessages};
use serenity::client::Context as SerenityContext;
use serenity::gateway::ActivityData;
use serenity::http::HttpError;
use serenity::model::channel::ReactionType;
use serenity::model::gateway::GatewayIntents;
use serenity::model::id::{ChannelId, MessageId as DiscordMessageId};

use crate::announce::{Announcement, AnnouncementKind};
use crate::config::Config;
use crate::engine::{run_forever, App};
use crate::store::{EditOutcome, MessageId, MessageMeta, MessageStore};
use crate::{Error, Result};

pub type Context<'a> = poise::Context<'a, Data, anyhow::Error>;

pub struct Data {
    pub app: Arc<App>,
}

fn store_error(err: impl std::error::Error + Send + Sync + 'static) -> Error {
    Error::Store(Box::new(err))
}

fn attachment_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("announcement.png")
        .to_string()
}

pub struct DiscordStore {
    ctx: SerenityContext,
    channel: ChannelId,
    race_week_image: PathBuf,
    no_race_week_image: PathBuf,
}

impl DiscordStore {
    pub fn new(ctx: SerenityContext, config: &Config) -> Self {
        Self {
            ctx,
            channel: ChannelId::new(config.channel_id),
            race_week_image: config.race_week_image.clone(),
            no_race_week_image: config.no_race_week_image.clone(),
        }
    }

    fn embed(&self, announcement: &Announcement) -> CreateEmbed {
        let image = match announcement.kind {
            AnnouncementKind::RaceWeek => &self.race_week_image,
            AnnouncementKind::NoRaceWeek => &self.no_race_week_image,
        };

        CreateEmbed::new()
            .title(&announcement.title)
            .description(&announcement.body)
            .image(format!("attachment://{}", attachment_name(image)))
    }
}

#[async_trait]
impl MessageStore for DiscordStore {
    async fn history(&self, limit: u8) -> Result<Vec<MessageMeta>> {
        let messages = self
            .channel
            .messages(&self.ctx, GetMessages::new().limit(limit))
            .await
            .map_err(store_error)?;

        Ok(messages
            .into_iter()
            .map(|message| MessageMeta {
                id: MessageId(message.id.get()),
                author: message.author.id.get(),
                created_at: DateTime::from_timestamp(message.timestamp.unix_timestamp(), 0)
                    .unwrap_or_default(),
            })
            .collect())
    }

    async fn send(&self, announcement: &Announcement, image: Option<&Path>) -> Result<MessageId> {
        let mut message = CreateMessage::new().embed(self.embed(announcement));
        if let Some(path) = image {
            let attachment = CreateAttachment::path(path).await.map_err(store_error)?;
            message = message.add_file(attachment);
        }

        let sent = self
            .channel
            .send_message(&self.ctx, message)
            .await
            .map_err(store_error)?;
        Ok(MessageId(sent.id.get()))
    }

    async fn edit(&self, id: MessageId, announcement: &Announcement) -> Result<EditOutcome> {
        let builder = EditMessage::new().embed(self.embed(announcement));
        match self
            .channel
            .edit_message(&self.ctx, DiscordMessageId::new(id.0), builder)
            .await
        {
            Ok(_) => Ok(EditOutcome::Edited),
            Err(serenity::Error::Http(HttpError::UnsuccessfulRequest(response)))
                if response.status_code.as_u16() == 404 =>
            {
                Ok(EditOutcome::Missing)
            }
            Err(err) => Err(store_error(err)),
        }
    }

    async fn react(&self, id: MessageId, emoji: &str) -> Result<()> {
        let reaction = ReactionType::try_from(emoji).map_err(store_error)?;
        self.channel
            .create_reaction(&self.ctx, DiscordMessageId::new(id.0), reaction)
            .await
            .map_err(store_error)
    }

    async fn set_presence(&self, kind: AnnouncementKind) -> Result<()> {
        let watching = match kind {
            AnnouncementKind::RaceWeek => "the RAWE CEEK!",
            AnnouncementKind::NoRaceWeek => "nothing... :(",
        };
        self.ctx.set_activity(Some(ActivityData::watching(watching)));
        Ok(())
    }
}

/// Posts or edits this week's announcement right away.
#[poise::command(prefix_command, aliases("upd"))]
async fn update(ctx: Context<'_>) -> anyhow::Result<()> {
    let app = &ctx.data().app;
    let outcome = app.run_manual().await?;
    info!("update command done: {outcome:?}");

    let reply = ctx.channel_id().say(ctx, "Update done.").await?;

    if ctx.channel_id().get() != app.config().command_channel() {
        tokio::time::sleep(Duration::from_secs(2)).await;
        reply.delete(ctx).await?;
        if let poise::Context::Prefix(prefix) = ctx {
            prefix.msg.delete(ctx).await?;
        }
    }

    Ok(())
}

#[poise::command(prefix_command)]
async fn ping(ctx: Context<'_>) -> anyhow::Result<()> {
    ctx.say("Pong!").await?;
    Ok(())
}

async fn on_error(error: poise::FrameworkError<'_, Data, anyhow::Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("command `{}` failed: {error:?}", ctx.command().name);
            if let Err(err) = ctx.say("Something went wrong, check the logs.").await {
                error!("failed to report command failure: {err}");
            }
        }
        other => {
            if let Err(err) = poise::builtins::on_error(other).await {
                error!("failed to handle framework error: {err}");
            }
        }
    }
}

/// Connects to Discord and runs until the gateway connection ends or the
/// process is interrupted.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let token = config.bot_token.clone();
    let prefix = config.command_prefix.clone();
    let intents = GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![update(), ping()],
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(prefix),
                case_insensitive_commands: true,
                ..Default::default()
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, _framework| {
            Box::pin(async move {
                info!("connected as {}", ready.user.name);

                let store = Arc::new(DiscordStore::new(ctx.clone(), &config));
                let app = Arc::new(App::from_config(config, store)?);
                tokio::spawn(run_forever(Arc::clone(&app)));

                Ok(Data { app })
            })
        })
        .build();

    let mut client = serenity::Client::builder(&token, intents)
        .framework(framework)
        .await
        .context("failed to create discord client")?;

    let shard_manager = Arc::clone(&client.shard_manager);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutting down");
            shard_manager.shutdown_all().await;
        }
    });

    client.start().await.context("discord client stopped")
}
