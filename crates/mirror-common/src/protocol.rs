use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Server-assigned identity of a connected participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(Uuid);

impl ParticipantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ParticipantId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| Error::protocol(format!("invalid participant id {s:?}: {e}")))
    }
}

/// Negotiation role of a participant within a pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Creates the offer.
    Initiator,
    /// Replies with an answer.
    Responder,
    #[default]
    Unassigned,
}

/// Messages a client sends to the gateway.
///
/// Wire form is `{"type": ..., "payload": ...}`. Negotiation bodies are kept
/// as raw JSON so the gateway can forward them without looking inside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    #[serde(rename = "presenceChanged")]
    PresenceChanged(bool),
    #[serde(rename = "offer")]
    Offer(Value),
    #[serde(rename = "answer")]
    Answer(Value),
    #[serde(rename = "ice-candidate")]
    IceCandidate(Value),
}

impl ClientMessage {
    /// Wire name of the message, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PresenceChanged(_) => "presenceChanged",
            Self::Offer(_) => "offer",
            Self::Answer(_) => "answer",
            Self::IceCandidate(_) => "ice-candidate",
        }
    }

    /// The message other participants receive when `sender` sends `self`.
    pub fn relayed_from(self, sender: ParticipantId) -> ServerMessage {
        match self {
            Self::PresenceChanged(is_detected) => ServerMessage::PeerPresenceChanged {
                peer_id: sender,
                is_detected,
            },
            Self::Offer(payload) => ServerMessage::Offer(payload),
            Self::Answer(payload) => ServerMessage::Answer(payload),
            Self::IceCandidate(payload) => ServerMessage::IceCandidate(payload),
        }
    }
}

/// Messages the gateway sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Identity assigned to the receiving connection.
    #[serde(rename = "welcome")]
    Welcome(ParticipantId),
    #[serde(rename = "clientCount")]
    ClientCount(usize),
    /// Sent only while exactly two participants are connected.
    #[serde(rename = "initiatorId")]
    InitiatorId(ParticipantId),
    #[serde(rename = "peerPresenceChanged", rename_all = "camelCase")]
    PeerPresenceChanged {
        peer_id: ParticipantId,
        is_detected: bool,
    },
    #[serde(rename = "offer")]
    Offer(Value),
    #[serde(rename = "answer")]
    Answer(Value),
    #[serde(rename = "ice-candidate")]
    IceCandidate(Value),
    #[serde(rename = "peerConnected")]
    PeerConnected(ParticipantId),
    #[serde(rename = "peerDisconnected")]
    PeerDisconnected(ParticipantId),
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Wire name of the message, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Welcome(_) => "welcome",
            Self::ClientCount(_) => "clientCount",
            Self::InitiatorId(_) => "initiatorId",
            Self::PeerPresenceChanged { .. } => "peerPresenceChanged",
            Self::Offer(_) => "offer",
            Self::Answer(_) => "answer",
            Self::IceCandidate(_) => "ice-candidate",
            Self::PeerConnected(_) => "peerConnected",
            Self::PeerDisconnected(_) => "peerDisconnected",
            Self::Error { .. } => "error",
        }
    }
}

/// SDP type, spelled the way browsers serialize `RTCSessionDescription`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Pranswer,
    Answer,
    Rollback,
}

impl fmt::Display for SdpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Offer => "offer",
            Self::Pranswer => "pranswer",
            Self::Answer => "answer",
            Self::Rollback => "rollback",
        };
        f.write_str(name)
    }
}

/// Session description body of an `offer` or `answer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Trickled ICE candidate, in browser `RTCIceCandidateInit` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default)]
    pub sdp_mline_index: Option<u16>,
    #[serde(default)]
    pub username_fragment: Option<String>,
}

/// Typed view of the three negotiation messages a client exchanges.
#[derive(Debug, Clone, PartialEq)]
pub enum NegotiationMessage {
    Offer(SessionDescription),
    Answer(SessionDescription),
    IceCandidate(IceCandidate),
}

impl NegotiationMessage {
    /// Decode a relayed message. Returns `Ok(None)` for non-negotiation
    /// messages and an error when the opaque body does not have the expected
    /// shape.
    pub fn from_server(message: &ServerMessage) -> Result<Option<Self>> {
        let decoded = match message {
            ServerMessage::Offer(body) => {
                Self::Offer(decode_description(body.clone(), SdpKind::Offer)?)
            }
            ServerMessage::Answer(body) => {
                Self::Answer(decode_description(body.clone(), SdpKind::Answer)?)
            }
            ServerMessage::IceCandidate(body) => {
                Self::IceCandidate(serde_json::from_value(body.clone())?)
            }
            _ => return Ok(None),
        };
        Ok(Some(decoded))
    }

    pub fn into_client_message(self) -> Result<ClientMessage> {
        Ok(match self {
            Self::Offer(description) => ClientMessage::Offer(serde_json::to_value(description)?),
            Self::Answer(description) => ClientMessage::Answer(serde_json::to_value(description)?),
            Self::IceCandidate(candidate) => {
                ClientMessage::IceCandidate(serde_json::to_value(candidate)?)
            }
        })
    }
}

/// Decode an opaque description body and check its SDP type.
pub fn decode_description(body: Value, expected: SdpKind) -> Result<SessionDescription> {
    let description: SessionDescription = serde_json::from_value(body)?;
    if description.kind != expected {
        return Err(Error::protocol(format!(
            "expected {expected} description, got {}",
            description.kind
        )));
    }
    Ok(description)
}
