use anyhow::{anyhow, Context, Result};
use clap::Parser;
use match3_core::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(name = "match3-sim")]
#[command(about = "Headless match-3 session simulator")]
#[command(long_about = "Plays match-3 sessions against the engine without a screen.

Each move is a random drag gesture turned into pointer events, one event per
frame. The engine is advanced by a fixed frame time so cascades animate
through every phase exactly as they would under a renderer.")]
pub struct Config {
    /// Seed for boards, refills and the drag policy
    #[arg(long, env = "MATCH3_SEED", default_value = "1")]
    pub seed: u64,

    /// Sessions to play (-1 for unlimited)
    #[arg(long, env = "MATCH3_SESSIONS", default_value = "1")]
    pub sessions: i32,

    /// Drag gestures per session
    #[arg(long, env = "MATCH3_MOVES", default_value = "20")]
    pub moves_per_session: u32,

    /// Longest drag, in swaps
    #[arg(long, env = "MATCH3_MAX_DRAG", default_value = "4")]
    pub max_drag_len: usize,

    /// Frame time in milliseconds
    #[arg(long, env = "MATCH3_FRAME_MS", default_value = "16")]
    pub frame_ms: u64,

    /// Pace frames on the wall clock instead of running flat out
    #[arg(long, env = "MATCH3_REALTIME", default_value_t = false)]
    pub realtime: bool,

    /// Frames a session may take before it is abandoned
    #[arg(long, env = "MATCH3_MAX_FRAMES", default_value = "100000")]
    pub max_frames_per_session: u64,

    /// TOML file with engine settings (board size, colors, phase timings)
    #[arg(long, env = "MATCH3_ENGINE_CONFIG")]
    pub engine_config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "MATCH3_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.sessions == 0 || self.sessions < -1 {
            return Err(anyhow!("sessions must be positive or -1"));
        }

        if self.moves_per_session == 0 {
            return Err(anyhow!("moves_per_session must be greater than 0"));
        }

        if self.max_drag_len == 0 {
            return Err(anyhow!("max_drag_len must be greater than 0"));
        }

        if self.frame_ms == 0 {
            return Err(anyhow!("frame_ms must be greater than 0"));
        }

        if self.max_frames_per_session == 0 {
            return Err(anyhow!("max_frames_per_session must be greater than 0"));
        }

        self.log_level()?;

        Ok(())
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_millis(self.frame_ms)
    }

    pub fn log_level(&self) -> Result<tracing::Level> {
        self.log_level
            .parse()
            .map_err(|_| anyhow!("invalid log level: {}", self.log_level))
    }

    /// Engine settings from `--engine-config`, or the defaults
    pub fn load_engine_config(&self) -> Result<EngineConfig> {
        match &self.engine_config {
            Some(path) => load_engine_config(path),
            None => Ok(EngineConfig::default()),
        }
    }
}

pub fn load_engine_config(path: &Path) -> Result<EngineConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read engine config {}", path.display()))?;
    parse_engine_config(&text)
        .with_context(|| format!("Invalid engine config {}", path.display()))
}

pub fn parse_engine_config(text: &str) -> Result<EngineConfig> {
    let config: EngineConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}
