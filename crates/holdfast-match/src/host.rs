//! Match host: runs one [`Match`] inside its own Tokio task.
//!
//! The task is the match's only writer. Everything else talks to it through
//! a [`MatchHandle`] (commands over an mpsc mailbox) and hears back through
//! per-participant outbound channels. The mailbox and the tick scheduler
//! share one `tokio::select!` loop, so commands and ticks never interleave
//! inside a mutation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use holdfast_protocol::{ActorId, ClientIntent, MatchId, MatchSnapshot, PlayerId, ServerEvent};
use holdfast_tick::{TickConfig, TickScheduler};
use tokio::sync::{mpsc, oneshot};

use crate::{Match, MatchConfig, MatchError};

/// Counter for generating unique match IDs.
static NEXT_MATCH_ID: AtomicU64 = AtomicU64::new(1);

/// Default command channel size for match hosts.
pub const DEFAULT_CHANNEL_SIZE: usize = 64;

pub fn next_match_id() -> MatchId {
    MatchId(NEXT_MATCH_ID.fetch_add(1, Ordering::Relaxed))
}

/// Something the host delivers to one participant.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutbound {
    /// Full match state, sent once on join.
    Snapshot(MatchSnapshot),
    Event(ServerEvent),
}

pub type ParticipantSender = mpsc::UnboundedSender<MatchOutbound>;

pub(crate) enum MatchCommand {
    Join {
        player: PlayerId,
        sender: ParticipantSender,
        reply: oneshot::Sender<Result<(), MatchError>>,
    },
    Leave {
        player: PlayerId,
        reply: oneshot::Sender<Result<(), MatchError>>,
    },
    Intent {
        sender: PlayerId,
        intent: ClientIntent,
        reply: oneshot::Sender<Result<(), MatchError>>,
    },
    /// Ready handshake from an enemy's owning process.
    EnemyReady {
        actor: ActorId,
    },
    /// Physics reported an enemy touching a player.
    EnemyContact {
        actor: ActorId,
        player: PlayerId,
    },
    Snapshot {
        reply: oneshot::Sender<MatchSnapshot>,
    },
    Shutdown,
}

/// Handle to a running match host. Cheap to clone.
#[derive(Clone)]
pub struct MatchHandle {
    match_id: MatchId,
    sender: mpsc::Sender<MatchCommand>,
}

impl MatchHandle {
    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// Joins `player`; `sender` receives a snapshot, then every event.
    pub async fn join(&self, player: PlayerId, sender: ParticipantSender) -> Result<(), MatchError> {
        let (reply, rx) = oneshot::channel();
        self.send(MatchCommand::Join {
            player,
            sender,
            reply,
        })
        .await?;
        rx.await.map_err(|_| MatchError::Unavailable(self.match_id))?
    }

    pub async fn leave(&self, player: PlayerId) -> Result<(), MatchError> {
        let (reply, rx) = oneshot::channel();
        self.send(MatchCommand::Leave { player, reply }).await?;
        rx.await.map_err(|_| MatchError::Unavailable(self.match_id))?
    }

    /// Submits an intent and waits for the match's verdict.
    pub async fn send_intent(&self, sender: PlayerId, intent: ClientIntent) -> Result<(), MatchError> {
        let (reply, rx) = oneshot::channel();
        self.send(MatchCommand::Intent {
            sender,
            intent,
            reply,
        })
        .await?;
        rx.await.map_err(|_| MatchError::Unavailable(self.match_id))?
    }

    pub async fn enemy_ready(&self, actor: ActorId) -> Result<(), MatchError> {
        self.send(MatchCommand::EnemyReady { actor }).await
    }

    pub async fn enemy_contact(&self, actor: ActorId, player: PlayerId) -> Result<(), MatchError> {
        self.send(MatchCommand::EnemyContact { actor, player }).await
    }

    pub async fn snapshot(&self) -> Result<MatchSnapshot, MatchError> {
        let (reply, rx) = oneshot::channel();
        self.send(MatchCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| MatchError::Unavailable(self.match_id))
    }

    pub async fn shutdown(&self) -> Result<(), MatchError> {
        self.send(MatchCommand::Shutdown).await
    }

    async fn send(&self, command: MatchCommand) -> Result<(), MatchError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| MatchError::Unavailable(self.match_id))
    }
}

struct MatchActor {
    game: Match,
    scheduler: TickScheduler,
    senders: HashMap<PlayerId, ParticipantSender>,
    events: mpsc::UnboundedReceiver<ServerEvent>,
    receiver: mpsc::Receiver<MatchCommand>,
}

impl MatchActor {
    async fn run(mut self) {
        let match_id = self.game.id();
        tracing::info!(%match_id, "match host started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle(cmd) {
                        break;
                    }
                }
                tick = self.scheduler.wait_for_tick() => {
                    self.game.tick(tick.dt);
                    self.scheduler.record_tick_end();
                }
            }
            self.forward_events();
        }

        tracing::info!(%match_id, "match host stopped");
    }

    /// Applies one command. Returns `false` on shutdown.
    fn handle(&mut self, cmd: MatchCommand) -> bool {
        match cmd {
            MatchCommand::Join {
                player,
                sender,
                reply,
            } => {
                let result = self.game.add_participant(player);
                if result.is_ok() {
                    let _ = sender.send(MatchOutbound::Snapshot(self.game.snapshot()));
                    self.senders.insert(player, sender);
                }
                let _ = reply.send(result);
            }
            MatchCommand::Leave { player, reply } => {
                self.senders.remove(&player);
                let _ = reply.send(self.game.remove_participant(player));
            }
            MatchCommand::Intent {
                sender,
                intent,
                reply,
            } => {
                let result = self.game.handle_intent(sender, intent).map_err(MatchError::from);
                let _ = reply.send(result);
            }
            MatchCommand::EnemyReady { actor } => {
                self.game.on_enemy_ready(actor);
            }
            MatchCommand::EnemyContact { actor, player } => {
                self.game.enemy_contact(actor, player);
            }
            MatchCommand::Snapshot { reply } => {
                let _ = reply.send(self.game.snapshot());
            }
            MatchCommand::Shutdown => {
                tracing::info!(match_id = %self.game.id(), "match shutting down");
                return false;
            }
        }
        true
    }

    /// Sends every event published since the last call to all participants.
    /// Participants whose receiver is gone are skipped.
    fn forward_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            let outbound = MatchOutbound::Event(event);
            for sender in self.senders.values() {
                let _ = sender.send(outbound.clone());
            }
        }
    }
}

/// Spawns a host task for a new match and opens its lobby.
///
/// `channel_size` bounds the command mailbox; senders wait when it is full.
pub fn spawn_match(match_id: MatchId, config: MatchConfig, channel_size: usize) -> MatchHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let mut game = Match::new(match_id, config);
    let scheduler = TickScheduler::new(TickConfig::with_rate(game.config().tick_rate_hz));
    game.bus_mut().subscribe(move |event: &ServerEvent| {
        let _ = events_tx.send(event.clone());
    });
    game.start();

    let actor = MatchActor {
        game,
        scheduler,
        senders: HashMap::new(),
        events: events_rx,
        receiver: rx,
    };
    tokio::spawn(actor.run());

    MatchHandle {
        match_id,
        sender: tx,
    }
}
