//! Headless siege: a handful of bots play a Holdfast match in-process.
//!
//! ```text
//! cargo run -p siege-sim -- [config.json] [rounds]
//! ```

use std::collections::BTreeSet;
use std::time::Duration;

use holdfast::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

const BOTS: u64 = 3;
const ACTION_PERIOD: Duration = Duration::from_millis(400);
/// Chance per action period that an enemy reaches the bot.
const CONTACT_CHANCE: f64 = 0.2;

// ---------------------------------------------------------------------------
// Bot
// ---------------------------------------------------------------------------

struct Bot {
    id: PlayerId,
    handle: MatchHandle,
    rx: mpsc::UnboundedReceiver<MatchOutbound>,
    rng: StdRng,
    enemies: BTreeSet<ActorId>,
    downed: BTreeSet<PlayerId>,
    reviving: Option<PlayerId>,
    rounds_left: u32,
}

impl Bot {
    async fn join(id: PlayerId, handle: MatchHandle, rounds: u32) -> Result<Self, HoldfastError> {
        let (tx, rx) = mpsc::unbounded_channel();
        handle.join(id, tx).await?;
        Ok(Self {
            id,
            handle,
            rx,
            rng: StdRng::seed_from_u64(id.0),
            enemies: BTreeSet::new(),
            downed: BTreeSet::new(),
            reviving: None,
            rounds_left: rounds,
        })
    }

    /// Plays until `rounds` matches have been decided.
    async fn run(mut self) -> Result<(), HoldfastError> {
        let mut actions = tokio::time::interval(ACTION_PERIOD);
        loop {
            tokio::select! {
                outbound = self.rx.recv() => {
                    let Some(outbound) = outbound else { break };
                    if !self.observe(outbound).await? {
                        break;
                    }
                }
                _ = actions.tick() => self.act().await?,
            }
        }
        info!(bot = %self.id, "bot done");
        Ok(())
    }

    /// Returns `false` once the bot has played its last round.
    async fn observe(&mut self, outbound: MatchOutbound) -> Result<bool, HoldfastError> {
        let event = match outbound {
            MatchOutbound::Snapshot(snapshot) => {
                debug!(bot = %self.id, phase = %snapshot.phase, "joined");
                return Ok(true);
            }
            MatchOutbound::Event(event) => event,
        };

        match event {
            ServerEvent::ActorSpawned { actor, prefab, .. } if prefab.as_str() == "enemy" => {
                self.enemies.insert(actor);
            }
            ServerEvent::ActorDespawned { actor } => {
                self.enemies.remove(&actor);
            }
            ServerEvent::PlayerDowned { player } => {
                self.downed.insert(player);
            }
            ServerEvent::PlayerRevived { player } => {
                self.downed.remove(&player);
                if self.reviving == Some(player) {
                    self.reviving = None;
                }
            }
            ServerEvent::ReviveInterrupted { target } if self.reviving == Some(target) => {
                self.reviving = None;
            }
            ServerEvent::StatusMessage { text } if self.id == PlayerId(1) => {
                info!("{text}");
            }
            ServerEvent::RestartPopup {
                is_victory,
                difficulty,
            } => {
                self.rounds_left = self.rounds_left.saturating_sub(1);
                info!(
                    bot = %self.id,
                    is_victory,
                    difficulty,
                    rounds_left = self.rounds_left,
                    "match decided"
                );
                if self.rounds_left == 0 {
                    return Ok(false);
                }
                let restart = self
                    .handle
                    .send_intent(self.id, ClientIntent::RequestRestart)
                    .await;
                if let Err(error) = restart {
                    // Another bot got there first.
                    debug!(bot = %self.id, %error, "restart request rejected");
                }
            }
            ServerEvent::HideRestartPopup => {
                self.downed.clear();
                self.reviving = None;
            }
            _ => {}
        }
        Ok(true)
    }

    async fn act(&mut self) -> Result<(), HoldfastError> {
        if self.downed.contains(&self.id) || self.reviving.is_some() {
            return Ok(());
        }

        if let Some(enemy) = self.pick_enemy() {
            if self.rng.random_bool(CONTACT_CHANCE) {
                self.handle.enemy_contact(enemy, self.id).await?;
            }
        }

        let intent = if let Some(target) = self.downed.iter().copied().find(|p| *p != self.id) {
            self.reviving = Some(target);
            ClientIntent::Interact { target }
        } else if let Some(target) = self.pick_enemy() {
            ClientIntent::Attack { target }
        } else {
            return Ok(());
        };

        match self.handle.send_intent(self.id, intent).await {
            Ok(()) => {}
            Err(MatchError::Intent(reason)) => {
                debug!(bot = %self.id, %reason, "intent rejected");
                self.reviving = None;
            }
            Err(error) => return Err(error.into()),
        }
        Ok(())
    }

    fn pick_enemy(&mut self) -> Option<ActorId> {
        if self.enemies.is_empty() {
            return None;
        }
        let index = self.rng.random_range(0..self.enemies.len());
        self.enemies.iter().nth(index).copied()
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

fn load_config(path: Option<&str>) -> Result<MatchConfig, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(MatchConfig {
            required_players: BOTS as usize,
            start_countdown_secs: 3,
            wave_countdown_secs: 2,
            ..MatchConfig::default()
        });
    };
    let json = std::fs::read_to_string(path)?;
    Ok(MatchConfig::from_json(&json).map_err(HoldfastError::from)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    holdfast::init_tracing("info,holdfast_match=info");

    let args: Vec<String> = std::env::args().collect();
    let config = load_config(args.get(1).map(String::as_str))?;
    let rounds = match args.get(2) {
        Some(rounds) => rounds.parse()?,
        None => 2,
    };

    let handle = spawn_match(next_match_id(), config, DEFAULT_CHANNEL_SIZE);
    info!(match_id = %handle.match_id(), bots = BOTS, rounds, "siege starting");

    let mut bots = JoinSet::new();
    for n in 1..=BOTS {
        let bot = Bot::join(PlayerId(n), handle.clone(), rounds).await?;
        bots.spawn(bot.run());
    }

    while let Some(result) = bots.join_next().await {
        if let Err(error) = result? {
            warn!(%error, "bot failed");
        }
    }

    let summary = handle.snapshot().await?;
    for player in &summary.players {
        info!(player = %player.player, score = player.score, "final score");
    }
    handle.shutdown().await?;
    Ok(())
}
