//! Validation and application of participant intents.

use holdfast_protocol::{ClientIntent, PlayerId, ServerEvent};
use tracing::{debug, trace};

use crate::{IntentError, Match};

impl Match {
    /// Validates `intent` from `sender` and applies it. An observer drops
    /// every intent unread.
    ///
    /// # Errors
    /// The rejection reason. A rejected intent changes nothing.
    pub fn handle_intent(&mut self, sender: PlayerId, intent: ClientIntent) -> Result<(), IntentError> {
        if !self.is_authority() {
            trace!(match_id = %self.id, %sender, "observer ignored intent");
            return Ok(());
        }
        let result = self.apply_intent(sender, intent);
        if let Err(reason) = &result {
            debug!(match_id = %self.id, %sender, %reason, "intent rejected");
        }
        result
    }

    fn apply_intent(&mut self, sender: PlayerId, intent: ClientIntent) -> Result<(), IntentError> {
        let Some(avatar) = self.players.get_mut(&sender) else {
            return Err(IntentError::NotParticipant(sender));
        };
        let sender_alive = avatar.vitality.is_alive();
        let origin = avatar.position;

        match intent {
            ClientIntent::Move { position } => {
                if !sender_alive {
                    return Err(IntentError::SenderDowned(sender));
                }
                avatar.position = position;
                Ok(())
            }
            ClientIntent::Attack { target } => {
                if !sender_alive {
                    return Err(IntentError::SenderDowned(sender));
                }
                // Aim at the target; the shot hits whatever it meets first.
                let aim = self
                    .enemies
                    .get(target)
                    .map(|enemy| enemy.position())
                    .ok_or(IntentError::UnknownTarget(target))?;
                self.fire_projectile(sender, origin, aim).map(|_| ())
            }
            ClientIntent::Interact { target } => self.begin_revive(sender, target),
            ClientIntent::CancelInteract => {
                self.cancel_revives_by(sender);
                Ok(())
            }
            ClientIntent::RequestRestart => self.request_restart(),
        }
    }

    fn begin_revive(&mut self, reviver: PlayerId, target: PlayerId) -> Result<(), IntentError> {
        if !self.config.revive.enabled {
            return Err(IntentError::ReviveDisabled);
        }
        if reviver == target {
            return Err(IntentError::SelfRevive);
        }
        let reviver_position = match self.players.get(&reviver) {
            Some(avatar) if avatar.vitality.is_alive() => avatar.position,
            _ => return Err(IntentError::SenderDowned(reviver)),
        };
        let radius = self.config.revive.radius;

        let Some(downed) = self.players.get_mut(&target) else {
            return Err(IntentError::NotParticipant(target));
        };
        if !downed.vitality.is_downed() {
            return Err(IntentError::TargetNotDowned(target));
        }
        if downed.position.distance(reviver_position) > radius {
            return Err(IntentError::OutOfRange(reviver));
        }
        if !downed.vitality.begin_revive(reviver) {
            return Err(IntentError::ReviveInProgress(target));
        }

        debug!(match_id = %self.id, %target, %reviver, "revive started");
        self.emit(ServerEvent::ReviveStarted { target, reviver });
        Ok(())
    }
}
