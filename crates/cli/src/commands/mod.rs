// CLI subcommand dispatch and the plumbing every command shares.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Subcommand};
use tracing::debug;
use tripline_common::types::{ItineraryId, Room, RoomId, UserId};
use tripline_sync::{ClientConfig, EngineSettings, HttpApi, RoomSession, SyncEngine, WsPushTransport};

use crate::output::OutputFormat;

pub mod config;
pub mod post;
pub mod rm;
pub mod watch;

#[derive(Subcommand)]
pub enum Command {
    /// Stream a day's comments until interrupted
    Watch(watch::WatchArgs),
    /// Add a comment to a day
    Post(post::PostArgs),
    /// Delete a comment from a day
    Rm(rm::RmArgs),
    /// Show or initialize the client config
    Config(config::ConfigArgs),
}

/// Flags accepted by every subcommand.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Bearer token for the itinerary backend.
    #[arg(long, global = true, env = "TRIPLINE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
    /// Your user id.
    #[arg(long, global = true, env = "TRIPLINE_USER")]
    pub user: Option<String>,
    /// Config file to use instead of ~/.tripline/config.toml.
    #[arg(long, global = true, env = "TRIPLINE_CONFIG")]
    pub config: Option<PathBuf>,
    /// Force JSON output.
    #[arg(long, global = true)]
    pub json: bool,
}

/// The day a command operates on.
#[derive(Debug, Args)]
pub struct RoomArgs {
    /// Day id.
    pub day: String,
    /// Itinerary the day belongs to. Looked up when omitted.
    #[arg(long)]
    pub itinerary: Option<String>,
}

impl RoomArgs {
    pub fn room(&self) -> anyhow::Result<Room> {
        let room = Room::new(RoomId::parse(self.day.as_str())?);
        Ok(match &self.itinerary {
            Some(itinerary) => room.with_parent(ItineraryId::parse(itinerary.as_str())?),
            None => room,
        })
    }
}

pub type Engine = SyncEngine<HttpApi, HttpApi, WsPushTransport>;
pub type Session = RoomSession<HttpApi>;

impl GlobalArgs {
    pub fn format(&self) -> OutputFormat {
        OutputFormat::detect(self.json)
    }

    pub fn load_config(&self) -> anyhow::Result<ClientConfig> {
        let config = match &self.config {
            Some(path) => ClientConfig::load_from(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => ClientConfig::load(),
        };
        config.validate()?;
        Ok(config)
    }

    fn token(&self) -> anyhow::Result<&str> {
        self.token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .context("missing auth token: pass --token or set TRIPLINE_TOKEN")
    }

    fn user_id(&self) -> anyhow::Result<UserId> {
        let user = self.user.as_deref().context("missing user id: pass --user or set TRIPLINE_USER")?;
        Ok(UserId::parse(user)?)
    }

    /// Build an engine wired to the configured backend.
    pub fn engine(&self) -> anyhow::Result<Engine> {
        let config = self.load_config()?;
        let token = self.token()?;
        let api = Arc::new(HttpApi::new(&config.api_url, token, config.timings.request_timeout())?);
        let settings = EngineSettings::new(config.push_url.as_str(), token)
            .with_retry(config.timings.retry_policy())
            .with_reconnect(config.timings.reconnect_policy());
        Ok(SyncEngine::new(Arc::clone(&api), api, Arc::new(WsPushTransport), settings))
    }

    /// Resolve access and open a live session on `room`.
    pub async fn open(&self, room: &RoomArgs) -> anyhow::Result<Session> {
        let engine = self.engine()?;
        let user = self.user_id()?;
        debug!(day = %room.day, %user, "opening day");
        engine.start(room.room()?, user).await.with_context(|| format!("failed to open day {}", room.day))
    }
}

/// Drive `future` on a fresh current-thread runtime.
pub fn block_on<F: Future>(future: F) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    Ok(runtime.block_on(future))
}

pub fn run(global: GlobalArgs, cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Watch(args) => watch::run(&global, args),
        Command::Post(args) => post::run(&global, args),
        Command::Rm(args) => rm::run(&global, args),
        Command::Config(args) => config::run(&global, args),
    }
}
