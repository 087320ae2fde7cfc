//! Abstraction over the peer-to-peer media link.
//!
//! The orchestrator only sees [`PeerLink`] and [`LinkFactory`]; the real
//! implementation lives in [`crate::webrtc_link`] and tests substitute a
//! scripted fake. Asynchronous notifications from a link (gathered
//! candidates, remote tracks, connectivity changes) arrive as [`LinkEvent`]s
//! tagged with the generation of the link that produced them, so events from
//! a link that has since been torn down can be recognised and dropped.

use async_trait::async_trait;
use mirror_common::{Error, IceCandidate, SessionDescription};
use thiserror::Error;
use tokio::sync::mpsc;

/// Failures reported by the negotiation primitives of a link.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to open peer link: {0}")]
    Create(String),

    #[error("failed to attach local media: {0}")]
    Media(String),

    #[error("session description rejected: {0}")]
    Description(String),

    #[error("ice candidate rejected: {0}")]
    Candidate(String),

    #[error("peer link already closed")]
    Closed,
}

impl From<LinkError> for Error {
    fn from(err: LinkError) -> Self {
        Error::negotiation(err)
    }
}

/// Connectivity as reported by the link itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    New,
    Checking,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkEventKind {
    /// A locally gathered candidate that must be trickled to the peer.
    LocalCandidate(IceCandidate),
    /// The peer's media arrived.
    RemoteTrack,
    Connectivity(Connectivity),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkEvent {
    pub generation: u64,
    pub kind: LinkEventKind,
}

impl LinkEvent {
    pub fn new(generation: u64, kind: LinkEventKind) -> Self {
        Self { generation, kind }
    }
}

pub type LinkEvents = mpsc::UnboundedSender<LinkEvent>;

/// One negotiated media link to the remote participant.
#[async_trait]
pub trait PeerLink: Send {
    /// Create an offer and apply it as the local description.
    async fn create_local_offer(&mut self) -> Result<SessionDescription, LinkError>;

    /// Create an answer and apply it as the local description. The remote
    /// offer must already be applied.
    async fn create_local_answer(&mut self) -> Result<SessionDescription, LinkError>;

    async fn set_remote_description(
        &mut self,
        description: SessionDescription,
    ) -> Result<(), LinkError>;

    async fn add_ice_candidate(&mut self, candidate: IceCandidate) -> Result<(), LinkError>;

    async fn close(&mut self) -> Result<(), LinkError>;
}

/// Opens links with local media already attached.
#[async_trait]
pub trait LinkFactory: Send + Sync {
    type Link: PeerLink;
    type Media: Clone + Send + Sync;

    async fn open(
        &self,
        media: &Self::Media,
        generation: u64,
        events: LinkEvents,
    ) -> Result<Self::Link, LinkError>;
}
