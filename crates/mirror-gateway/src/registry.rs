//! Participant registry and initiator election.
//!
//! The registry is the only membership authority. Every mutation also
//! notifies the affected participants, so callers hold the registry lock for
//! the whole event and no participant can observe a count without the
//! matching `initiatorId`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mirror_common::{ParticipantId, Role, ServerMessage};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Outbound queue of one connected participant.
pub type Outbox = mpsc::Sender<ServerMessage>;

pub type SharedRegistry = Arc<RwLock<Registry>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    pub joined_at: DateTime<Utc>,
    pub presence: bool,
    pub role: Role,
}

#[derive(Debug)]
struct Member {
    participant: Participant,
    outbox: Outbox,
}

impl Member {
    fn deliver(&self, message: ServerMessage) -> bool {
        let id = self.participant.id;
        match self.outbox.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                warn!(
                    participant = %id,
                    kind = message.kind(),
                    "outbox full, dropping message"
                );
                false
            }
            Err(TrySendError::Closed(message)) => {
                debug!(
                    participant = %id,
                    kind = message.kind(),
                    "outbox closed, dropping message"
                );
                false
            }
        }
    }
}

/// Connected participants in join order.
#[derive(Debug, Default)]
pub struct Registry {
    members: Vec<Member>,
    initiator: Option<ParticipantId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }

    /// Register a new participant and announce the new membership.
    pub fn join(&mut self, outbox: Outbox) -> ParticipantId {
        let id = ParticipantId::new();
        self.members.push(Member {
            participant: Participant {
                id,
                joined_at: Utc::now(),
                presence: false,
                role: Role::Unassigned,
            },
            outbox,
        });
        info!(participant = %id, count = self.count(), "participant joined");

        self.send_to(id, ServerMessage::Welcome(id));
        self.broadcast_except(id, ServerMessage::PeerConnected(id));
        self.membership_changed();
        id
    }

    /// Remove a participant. Returns `None` if the id was not registered.
    pub fn leave(&mut self, id: ParticipantId) -> Option<Participant> {
        let index = self
            .members
            .iter()
            .position(|member| member.participant.id == id)?;
        let member = self.members.remove(index);
        info!(participant = %id, count = self.count(), "participant left");

        // Peers must tear down before a re-pairing can reach them.
        self.broadcast(ServerMessage::PeerDisconnected(id));
        self.membership_changed();
        Some(member.participant)
    }

    pub fn count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn initiator(&self) -> Option<ParticipantId> {
        self.initiator
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.members
            .iter()
            .map(|member| &member.participant)
            .find(|participant| participant.id == id)
    }

    /// Participants in join order.
    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.members.iter().map(|member| &member.participant)
    }

    /// Record the latest presence edge of a participant.
    pub fn set_presence(&mut self, id: ParticipantId, presence: bool) -> bool {
        match self
            .members
            .iter_mut()
            .find(|member| member.participant.id == id)
        {
            Some(member) => {
                member.participant.presence = presence;
                true
            }
            None => false,
        }
    }

    /// Assign roles for the current pairing.
    ///
    /// With exactly two participants the earlier one becomes the initiator.
    /// Any other count clears every role and the initiator.
    pub fn elect_initiator(&mut self) -> Option<ParticipantId> {
        if self.members.len() != 2 {
            self.clear_roles();
            return None;
        }

        for (index, member) in self.members.iter_mut().enumerate() {
            member.participant.role = if index == 0 {
                Role::Initiator
            } else {
                Role::Responder
            };
        }
        let initiator = self.members[0].participant.id;
        self.initiator = Some(initiator);
        info!(initiator = %initiator, "initiator elected");
        Some(initiator)
    }

    pub fn send_to(&self, id: ParticipantId, message: ServerMessage) -> bool {
        self.members
            .iter()
            .find(|member| member.participant.id == id)
            .map(|member| member.deliver(message))
            .unwrap_or(false)
    }

    /// Send to every participant. Returns the number of queued deliveries.
    pub fn broadcast(&self, message: ServerMessage) -> usize {
        self.members
            .iter()
            .filter(|member| member.deliver(message.clone()))
            .count()
    }

    /// Send to every participant except `excluded`.
    pub fn broadcast_except(&self, excluded: ParticipantId, message: ServerMessage) -> usize {
        self.members
            .iter()
            .filter(|member| member.participant.id != excluded)
            .filter(|member| member.deliver(message.clone()))
            .count()
    }

    fn membership_changed(&mut self) {
        self.broadcast(ServerMessage::ClientCount(self.count()));
        if self.count() == 2 {
            if let Some(initiator) = self.elect_initiator() {
                self.broadcast(ServerMessage::InitiatorId(initiator));
            }
        } else {
            self.clear_roles();
        }
    }

    fn clear_roles(&mut self) {
        if let Some(previous) = self.initiator.take() {
            debug!(initiator = %previous, "pairing dissolved, roles cleared");
        }
        for member in &mut self.members {
            member.participant.role = Role::Unassigned;
        }
    }
}
