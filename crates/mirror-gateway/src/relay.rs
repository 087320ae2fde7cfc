//! Verbatim fan-out of client messages to the other participants.
//!
//! Negotiation bodies are never inspected: any connected sender can inject
//! arbitrary SDP or candidate data and the receiving client is the one that
//! rejects it. Nothing is buffered or retried, and a participant that joins
//! later gets no snapshot of earlier presence edges.

use mirror_common::{ClientMessage, ParticipantId};
use tracing::{debug, info, warn};

use crate::registry::{Registry, SharedRegistry};

/// Forward `message` from `sender` to every other participant.
///
/// Presence edges are also recorded on the sender's registry entry. Returns
/// the number of participants the message was queued for.
pub fn relay(registry: &mut Registry, sender: ParticipantId, message: ClientMessage) -> usize {
    if registry.participant(sender).is_none() {
        warn!(
            sender = %sender,
            kind = message.kind(),
            "dropping message from unregistered sender"
        );
        return 0;
    }

    if let ClientMessage::PresenceChanged(is_detected) = message {
        registry.set_presence(sender, is_detected);
        info!(participant = %sender, is_detected, "presence changed");
    }

    let kind = message.kind();
    let delivered = registry.broadcast_except(sender, message.relayed_from(sender));
    debug!(sender = %sender, kind, delivered, "relayed message");
    delivered
}

/// [`relay`] under the shared registry lock.
pub async fn relay_shared(
    registry: &SharedRegistry,
    sender: ParticipantId,
    message: ClientMessage,
) -> usize {
    let mut guard = registry.write().await;
    relay(&mut guard, sender, message)
}
