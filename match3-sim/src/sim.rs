use anyhow::{anyhow, bail, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use match3_core::{EngineConfig, Match3Engine, PhaseEvent, PointerEvent};

use crate::config::Config;
use crate::policy::{Policy, RandomPolicy};

/// Per-session counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub session: u32,
    pub moves: u32,
    pub resolves: u32,
    pub total_combo: u32,
    pub best_combo: u32,
    pub capped: u32,
    pub frames: u64,
}

impl SessionStats {
    fn record(&mut self, event: &PhaseEvent) {
        match event {
            PhaseEvent::Matching { combo, cells } => {
                trace!(session = self.session, combo, cleared = cells.len(), "match");
            }
            PhaseEvent::Idle { combo, capped } => {
                self.resolves += 1;
                self.total_combo += combo;
                self.best_combo = self.best_combo.max(*combo);
                if *capped {
                    self.capped += 1;
                }
            }
            _ => {}
        }
    }
}

pub struct Simulator {
    config: Config,
    engine_config: EngineConfig,
    policy: Mutex<Box<dyn Policy>>,
    session_count: Mutex<u32>,
    shutdown_signal: Arc<Mutex<bool>>,
}

impl Simulator {
    pub fn new(config: Config) -> Result<Self> {
        let engine_config = config.load_engine_config()?;
        let policy = RandomPolicy::new(config.seed, config.max_drag_len)
            .map_err(|e| anyhow!("Failed to create policy: {}", e))?;

        info!(
            "Simulator initialized: {}x{} board, {} colors, seed {}",
            engine_config.rows, engine_config.cols, engine_config.colors, config.seed
        );

        Ok(Self::with_policy(config, engine_config, Box::new(policy)))
    }

    pub fn with_policy(config: Config, engine_config: EngineConfig, policy: Box<dyn Policy>) -> Self {
        Self {
            config,
            engine_config,
            policy: Mutex::new(policy),
            session_count: Mutex::new(0),
            shutdown_signal: Arc::new(Mutex::new(false)),
        }
    }

    pub async fn run(&self) -> Result<Vec<SessionStats>> {
        info!(
            "Simulator starting: {} moves per session, frame {}ms, realtime={}",
            self.config.moves_per_session, self.config.frame_ms, self.config.realtime
        );

        let mut results = Vec::new();

        loop {
            if self.is_shutdown() {
                info!("Shutdown signal received, stopping simulator");
                break;
            }

            let session = self.sessions_played()?;
            if self.config.sessions > 0 && session >= self.config.sessions as u32 {
                info!("Reached maximum sessions ({}), stopping", self.config.sessions);
                break;
            }

            match self.run_session(session).await {
                Ok(stats) => {
                    info!(
                        "Session {} finished: {} moves, {} resolves, best combo {}, {} frames",
                        stats.session, stats.moves, stats.resolves, stats.best_combo, stats.frames
                    );
                    results.push(stats);
                }
                Err(e) => {
                    error!("Session {} failed: {}", session, e);
                    // Continue with next session rather than stopping
                }
            }

            *self
                .session_count
                .lock()
                .map_err(|_| anyhow!("session counter lock poisoned"))? += 1;
        }

        let moves: u32 = results.iter().map(|s| s.moves).sum();
        let combos: u32 = results.iter().map(|s| s.total_combo).sum();
        let best = results.iter().map(|s| s.best_combo).max().unwrap_or(0);
        let capped: u32 = results.iter().map(|s| s.capped).sum();
        info!(
            "Simulator stopped: {} sessions, {} moves, {} combo rounds, best combo {}, {} capped",
            results.len(),
            moves,
            combos,
            best,
            capped
        );

        Ok(results)
    }

    pub async fn shutdown(&self) {
        if let Ok(mut flag) = self.shutdown_signal.lock() {
            *flag = true;
        }
        info!("Shutdown signal set");
    }

    pub fn sessions_played(&self) -> Result<u32> {
        self.session_count
            .lock()
            .map(|count| *count)
            .map_err(|_| anyhow!("session counter lock poisoned"))
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown_signal.lock().map(|flag| *flag).unwrap_or(true)
    }

    async fn run_session(&self, session: u32) -> Result<SessionStats> {
        let seed = self.config.seed.wrapping_add(session as u64);
        let mut engine = Match3Engine::new(self.engine_config.clone(), seed)
            .map_err(|e| anyhow!("Failed to build engine: {}", e))?;
        debug!("Session {} started with board seed {}", session, seed);

        let frame = self.config.frame_duration();
        let mut ticker = if self.config.realtime {
            let mut ticker = interval(frame);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            Some(ticker)
        } else {
            None
        };

        let mut pending: VecDeque<PointerEvent> = VecDeque::new();
        let mut stats = SessionStats { session, ..Default::default() };

        loop {
            if self.is_shutdown() {
                warn!("Session {} interrupted after {} moves", session, stats.moves);
                break;
            }

            let settled = !engine.is_busy() && pending.is_empty();
            if settled && stats.moves >= self.config.moves_per_session {
                break;
            }

            if stats.frames >= self.config.max_frames_per_session {
                bail!(
                    "Session {} did not settle within {} frames",
                    session,
                    self.config.max_frames_per_session
                );
            }

            if let Some(ticker) = ticker.as_mut() {
                ticker.tick().await;
            }

            if settled {
                let gesture = {
                    let mut policy = self
                        .policy
                        .lock()
                        .map_err(|_| anyhow!("policy lock poisoned"))?;
                    policy.select_gesture(engine.grid())?
                };
                trace!(session, swaps = gesture.swaps(), "gesture selected");
                pending.extend(gesture.to_events(engine.geometry()));
                stats.moves += 1;
            }

            // One pointer event per frame
            if let Some(event) = pending.pop_front() {
                let outcome = engine.handle_pointer(event);
                trace!(?outcome, "pointer event");
            }

            engine.advance(frame);
            for event in engine.drain_events() {
                stats.record(&event);
            }
            stats.frames += 1;
        }

        Ok(stats)
    }
}
