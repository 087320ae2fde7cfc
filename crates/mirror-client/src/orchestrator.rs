//! Peer connection state machine.
//!
//! Drives one [`PeerLink`] through offer/answer on behalf of the local
//! participant:
//!
//! ```text
//! Idle --(assigned initiator)--> Negotiating(Offering) --+
//! Idle --(offer received)-----> Negotiating(Answering) --+--> Connected
//!                                                        |
//!            description or link failure --> Failed <----+
//! any --(reset)--> Idle
//! ```
//!
//! `Connected` requires both descriptions applied and the link's first
//! successful connectivity check. Remote candidates that arrive before the
//! remote description are queued and flushed, in arrival order, right after
//! it is applied.

use std::collections::VecDeque;
use std::fmt;

use mirror_common::{
    decode_description, ClientMessage, Error, IceCandidate, NegotiationMessage, ParticipantId,
    Result, Role, SdpKind, SessionDescription,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::link::{Connectivity, LinkEvent, LinkEventKind, LinkEvents, LinkFactory, PeerLink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationPhase {
    Offering,
    Answering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Negotiating(NegotiationPhase),
    Connected,
    Failed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Negotiating(NegotiationPhase::Offering) => f.write_str("negotiating(offering)"),
            Self::Negotiating(NegotiationPhase::Answering) => {
                f.write_str("negotiating(answering)")
            }
            Self::Connected => f.write_str("connected"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Notifications for the visibility arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorEvent {
    LinkState(ConnectionState),
    RemoteStreamAvailable(bool),
}

pub struct Orchestrator<F: LinkFactory> {
    factory: F,
    media: F::Media,
    outbound: mpsc::UnboundedSender<ClientMessage>,
    link_events: LinkEvents,

    local_id: Option<ParticipantId>,
    role: Role,
    state: ConnectionState,

    link: Option<F::Link>,
    generation: u64,
    local_description_applied: bool,
    remote_description_applied: bool,
    link_connected: bool,
    pending_candidates: VecDeque<IceCandidate>,
    remote_stream: bool,

    events: Vec<OrchestratorEvent>,
}

impl<F: LinkFactory> Orchestrator<F> {
    /// Fails with `CapabilityUnavailable` when there is no local media to
    /// attach.
    pub fn new(
        factory: F,
        media: Option<F::Media>,
        outbound: mpsc::UnboundedSender<ClientMessage>,
        link_events: LinkEvents,
    ) -> Result<Self> {
        let media = media.ok_or_else(|| Error::capability_unavailable("no local media source"))?;
        Ok(Self {
            factory,
            media,
            outbound,
            link_events,
            local_id: None,
            role: Role::Unassigned,
            state: ConnectionState::Idle,
            link: None,
            generation: 0,
            local_description_applied: false,
            remote_description_applied: false,
            link_connected: false,
            pending_candidates: VecDeque::new(),
            remote_stream: false,
            events: Vec::new(),
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn local_id(&self) -> Option<ParticipantId> {
        self.local_id
    }

    pub fn remote_stream_available(&self) -> bool {
        self.remote_stream
    }

    /// Generation of the current (or next) link.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    pub fn set_local_id(&mut self, id: ParticipantId) {
        self.local_id = Some(id);
    }

    /// Drain the notifications produced since the last call.
    pub fn take_events(&mut self) -> Vec<OrchestratorEvent> {
        std::mem::take(&mut self.events)
    }

    /// Apply an `initiatorId` announcement. The initiator starts offering
    /// immediately when idle.
    pub async fn assign_initiator(&mut self, initiator: ParticipantId) -> Result<()> {
        let local = self
            .local_id
            .ok_or_else(|| Error::protocol("initiator announced before welcome"))?;
        self.role = if initiator == local {
            Role::Initiator
        } else {
            Role::Responder
        };
        info!("assigned role {:?}", self.role);

        if self.role == Role::Initiator {
            if self.state != ConnectionState::Idle {
                debug!("already {}, not starting a new offer", self.state);
                return Ok(());
            }
            self.start_offer().await?;
        }
        Ok(())
    }

    pub async fn handle_offer(&mut self, body: Value) -> Result<()> {
        if self.role == Role::Initiator {
            warn!("ignoring offer received while initiator");
            return Ok(());
        }
        match self.state {
            ConnectionState::Idle => {}
            ConnectionState::Failed => {
                info!("fresh offer after failure, resetting");
                self.reset().await;
            }
            state => {
                warn!("ignoring offer while {}", state);
                return Ok(());
            }
        }

        self.transition(ConnectionState::Negotiating(NegotiationPhase::Answering));
        let result = self.answer_steps(body).await;
        self.settle(result)
    }

    pub async fn handle_answer(&mut self, body: Value) -> Result<()> {
        if self.state != ConnectionState::Negotiating(NegotiationPhase::Offering)
            || self.remote_description_applied
        {
            warn!("ignoring unexpected answer while {}", self.state);
            return Ok(());
        }
        let result = self.accept_answer(body).await;
        self.settle(result)
    }

    /// Apply or queue a remote candidate. Candidates that cannot be decoded
    /// or that the link rejects are dropped without failing negotiation.
    pub async fn handle_ice_candidate(&mut self, body: Value) -> Result<()> {
        let candidate: IceCandidate = match serde_json::from_value(body) {
            Ok(candidate) => candidate,
            Err(err) => {
                warn!("dropping malformed ice candidate: {}", err);
                return Ok(());
            }
        };

        if !self.remote_description_applied {
            debug!(
                "queueing ice candidate until remote description ({} pending)",
                self.pending_candidates.len() + 1
            );
            self.pending_candidates.push_back(candidate);
            return Ok(());
        }

        let Some(link) = self.link.as_mut() else {
            self.pending_candidates.push_back(candidate);
            return Ok(());
        };
        if let Err(err) = link.add_ice_candidate(candidate).await {
            warn!("remote ice candidate rejected: {}", err);
        }
        Ok(())
    }

    /// React to a notification from the link. Events from a link that has
    /// been replaced are ignored.
    pub fn handle_link_event(&mut self, event: LinkEvent) {
        if event.generation != self.generation || self.link.is_none() {
            debug!(
                "ignoring stale link event from generation {}",
                event.generation
            );
            return;
        }

        match event.kind {
            LinkEventKind::LocalCandidate(candidate) => {
                if let Err(err) = self.send(NegotiationMessage::IceCandidate(candidate)) {
                    debug!("local candidate not sent: {}", err);
                }
            }
            LinkEventKind::RemoteTrack => {
                if !self.remote_stream {
                    self.remote_stream = true;
                    self.events
                        .push(OrchestratorEvent::RemoteStreamAvailable(true));
                }
            }
            LinkEventKind::Connectivity(Connectivity::Connected) => {
                self.link_connected = true;
                self.check_connected();
            }
            LinkEventKind::Connectivity(
                Connectivity::Failed | Connectivity::Disconnected | Connectivity::Closed,
            ) => {
                self.link_connected = false;
                if matches!(
                    self.state,
                    ConnectionState::Negotiating(_) | ConnectionState::Connected
                ) {
                    warn!("link lost connectivity while {}", self.state);
                    self.transition(ConnectionState::Failed);
                }
            }
            LinkEventKind::Connectivity(other) => {
                debug!("link connectivity {:?}", other);
            }
        }
    }

    /// Tear down the link and return to `Idle`. The role is kept.
    pub async fn reset(&mut self) {
        if let Some(mut link) = self.link.take() {
            if let Err(err) = link.close().await {
                debug!("error closing link: {}", err);
            }
        }
        self.generation += 1;
        self.local_description_applied = false;
        self.remote_description_applied = false;
        self.link_connected = false;
        self.pending_candidates.clear();
        if self.remote_stream {
            self.remote_stream = false;
            self.events
                .push(OrchestratorEvent::RemoteStreamAvailable(false));
        }
        self.transition(ConnectionState::Idle);
    }

    /// The remote participant went away: reset and forget the pairing.
    pub async fn peer_left(&mut self) {
        self.reset().await;
        self.role = Role::Unassigned;
    }

    /// Re-run negotiation after a failure. Only the initiator offers again.
    pub async fn retry(&mut self) -> Result<()> {
        if self.role != Role::Initiator || self.state != ConnectionState::Failed {
            debug!("retry skipped: role {:?}, state {}", self.role, self.state);
            return Ok(());
        }
        info!("retrying negotiation");
        self.reset().await;
        self.start_offer().await
    }

    async fn start_offer(&mut self) -> Result<()> {
        self.transition(ConnectionState::Negotiating(NegotiationPhase::Offering));
        let result = self.offer_steps().await;
        self.settle(result)
    }

    async fn offer_steps(&mut self) -> Result<()> {
        let link = self.open_link().await?;
        let offer = link.create_local_offer().await?;
        self.local_description_applied = true;
        self.send(NegotiationMessage::Offer(offer))?;
        info!("offer sent");
        Ok(())
    }

    async fn answer_steps(&mut self, body: Value) -> Result<()> {
        self.open_link().await?;
        let offer = decode_remote(body, SdpKind::Offer)?;
        self.apply_remote_description(offer).await?;

        let link = self.link.as_mut().ok_or_else(|| Error::internal("link missing"))?;
        let answer = link.create_local_answer().await?;
        self.local_description_applied = true;
        self.send(NegotiationMessage::Answer(answer))?;
        info!("answer sent");
        self.check_connected();
        Ok(())
    }

    async fn accept_answer(&mut self, body: Value) -> Result<()> {
        let answer = decode_remote(body, SdpKind::Answer)?;
        self.apply_remote_description(answer).await?;
        info!("answer applied");
        self.check_connected();
        Ok(())
    }

    async fn open_link(&mut self) -> Result<&mut F::Link> {
        if let Some(mut stale) = self.link.take() {
            if let Err(err) = stale.close().await {
                debug!("error closing previous link: {}", err);
            }
        }
        let link = self
            .factory
            .open(&self.media, self.generation, self.link_events.clone())
            .await?;
        debug!("opened link generation {}", self.generation);
        Ok(self.link.insert(link))
    }

    /// Apply the remote description, then flush queued candidates once.
    async fn apply_remote_description(&mut self, description: SessionDescription) -> Result<()> {
        let link = self.link.as_mut().ok_or_else(|| Error::internal("link missing"))?;
        link.set_remote_description(description).await?;
        self.remote_description_applied = true;

        let pending = std::mem::take(&mut self.pending_candidates);
        if !pending.is_empty() {
            debug!("flushing {} queued ice candidates", pending.len());
        }
        for candidate in pending {
            if let Err(err) = link.add_ice_candidate(candidate).await {
                warn!("queued ice candidate rejected: {}", err);
            }
        }
        Ok(())
    }

    fn check_connected(&mut self) {
        if matches!(self.state, ConnectionState::Negotiating(_))
            && self.local_description_applied
            && self.remote_description_applied
            && self.link_connected
        {
            self.transition(ConnectionState::Connected);
        }
    }

    fn settle(&mut self, result: Result<()>) -> Result<()> {
        if let Err(err) = &result {
            warn!("negotiation failed: {}", err);
            self.transition(ConnectionState::Failed);
        }
        result
    }

    fn send(&self, message: NegotiationMessage) -> Result<()> {
        let message = message.into_client_message()?;
        self.outbound
            .send(message)
            .map_err(|_| Error::transport("signaling channel closed"))
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        info!("connection {} -> {}", self.state, next);
        self.state = next;
        self.events.push(OrchestratorEvent::LinkState(next));
    }
}

fn decode_remote(body: Value, kind: SdpKind) -> Result<SessionDescription> {
    decode_description(body, kind)
        .map_err(|err| Error::negotiation(format!("malformed remote {kind}: {err}")))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::link::LinkError;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Open(u64),
        CreateOffer,
        CreateAnswer,
        SetRemote(SdpKind),
        AddCandidate(String),
        Close,
    }

    #[derive(Clone, Default)]
    struct Script {
        calls: Arc<Mutex<Vec<Call>>>,
        fail_remote: bool,
    }

    impl Script {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    struct FakeLink(Script);

    #[async_trait]
    impl PeerLink for FakeLink {
        async fn create_local_offer(&mut self) -> std::result::Result<SessionDescription, LinkError> {
            self.0.record(Call::CreateOffer);
            Ok(SessionDescription::offer("v=0 offer"))
        }

        async fn create_local_answer(
            &mut self,
        ) -> std::result::Result<SessionDescription, LinkError> {
            self.0.record(Call::CreateAnswer);
            Ok(SessionDescription::answer("v=0 answer"))
        }

        async fn set_remote_description(
            &mut self,
            description: SessionDescription,
        ) -> std::result::Result<(), LinkError> {
            self.0.record(Call::SetRemote(description.kind));
            if self.0.fail_remote {
                return Err(LinkError::Description("bad sdp".into()));
            }
            Ok(())
        }

        async fn add_ice_candidate(
            &mut self,
            candidate: IceCandidate,
        ) -> std::result::Result<(), LinkError> {
            self.0.record(Call::AddCandidate(candidate.candidate));
            Ok(())
        }

        async fn close(&mut self) -> std::result::Result<(), LinkError> {
            self.0.record(Call::Close);
            Ok(())
        }
    }

    struct FakeFactory(Script);

    #[async_trait]
    impl LinkFactory for FakeFactory {
        type Link = FakeLink;
        type Media = ();

        async fn open(
            &self,
            _media: &(),
            generation: u64,
            _events: LinkEvents,
        ) -> std::result::Result<FakeLink, LinkError> {
            self.0.record(Call::Open(generation));
            Ok(FakeLink(self.0.clone()))
        }
    }

    struct Harness {
        orchestrator: Orchestrator<FakeFactory>,
        script: Script,
        outbound: mpsc::UnboundedReceiver<ClientMessage>,
        _link_rx: mpsc::UnboundedReceiver<LinkEvent>,
    }

    fn harness(script: Script) -> Harness {
        let (out_tx, outbound) = mpsc::unbounded_channel();
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let orchestrator =
            Orchestrator::new(FakeFactory(script.clone()), Some(()), out_tx, link_tx).unwrap();
        Harness {
            orchestrator,
            script,
            outbound,
            _link_rx: link_rx,
        }
    }

    fn candidate(n: u32) -> Value {
        json!({"candidate": format!("candidate:{n} 1 udp 1 10.0.0.{n} 5000 typ host"), "sdpMid": "0", "sdpMLineIndex": 0})
    }

    fn candidate_name(n: u32) -> String {
        format!("candidate:{n} 1 udp 1 10.0.0.{n} 5000 typ host")
    }

    fn connected(generation: u64) -> LinkEvent {
        LinkEvent::new(
            generation,
            LinkEventKind::Connectivity(Connectivity::Connected),
        )
    }

    async fn responder(h: &mut Harness) {
        let me = ParticipantId::new();
        h.orchestrator.set_local_id(me);
        h.orchestrator
            .assign_initiator(ParticipantId::new())
            .await
            .unwrap();
    }

    #[test]
    fn test_missing_media_is_capability_error() {
        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let (link_tx, _link_rx) = mpsc::unbounded_channel();
        let result = Orchestrator::new(FakeFactory(Script::default()), None, out_tx, link_tx);
        assert!(matches!(result, Err(Error::CapabilityUnavailable(_))));
    }

    #[tokio::test]
    async fn test_initiator_offers_immediately() {
        let mut h = harness(Script::default());
        let me = ParticipantId::new();
        h.orchestrator.set_local_id(me);
        h.orchestrator.assign_initiator(me).await.unwrap();

        assert_eq!(h.orchestrator.role(), Role::Initiator);
        assert_eq!(
            h.orchestrator.state(),
            ConnectionState::Negotiating(NegotiationPhase::Offering)
        );
        assert_eq!(h.script.calls(), vec![Call::Open(0), Call::CreateOffer]);
        match h.outbound.try_recv().unwrap() {
            ClientMessage::Offer(body) => {
                assert_eq!(body, json!({"type": "offer", "sdp": "v=0 offer"}))
            }
            other => panic!("expected offer, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_early_candidates_flushed_after_remote_description() {
        let mut h = harness(Script::default());
        responder(&mut h).await;

        h.orchestrator.handle_ice_candidate(candidate(1)).await.unwrap();
        h.orchestrator.handle_ice_candidate(candidate(2)).await.unwrap();
        assert_eq!(h.orchestrator.pending_candidates(), 2);

        h.orchestrator
            .handle_offer(json!({"type": "offer", "sdp": "v=0 remote"}))
            .await
            .unwrap();

        assert_eq!(
            h.script.calls(),
            vec![
                Call::Open(0),
                Call::SetRemote(SdpKind::Offer),
                Call::AddCandidate(candidate_name(1)),
                Call::AddCandidate(candidate_name(2)),
                Call::CreateAnswer,
            ]
        );
        assert_eq!(h.orchestrator.pending_candidates(), 0);

        // Later candidates go straight to the link.
        h.orchestrator.handle_ice_candidate(candidate(3)).await.unwrap();
        let calls = h.script.calls();
        assert_eq!(calls.last(), Some(&Call::AddCandidate(candidate_name(3))));
        assert_eq!(
            calls
                .iter()
                .filter(|c| **c == Call::AddCandidate(candidate_name(1)))
                .count(),
            1
        );
        assert!(matches!(
            h.outbound.try_recv().unwrap(),
            ClientMessage::Answer(_)
        ));
    }

    #[tokio::test]
    async fn test_connected_requires_descriptions_and_connectivity() {
        let mut h = harness(Script::default());
        let me = ParticipantId::new();
        h.orchestrator.set_local_id(me);
        h.orchestrator.assign_initiator(me).await.unwrap();

        // Connectivity before the answer is not enough.
        h.orchestrator.handle_link_event(connected(0));
        assert_eq!(
            h.orchestrator.state(),
            ConnectionState::Negotiating(NegotiationPhase::Offering)
        );

        h.orchestrator
            .handle_answer(json!({"type": "answer", "sdp": "v=0 remote"}))
            .await
            .unwrap();
        assert_eq!(h.orchestrator.state(), ConnectionState::Connected);

        let events = h.orchestrator.take_events();
        assert_eq!(
            events.last(),
            Some(&OrchestratorEvent::LinkState(ConnectionState::Connected))
        );
    }

    #[tokio::test]
    async fn test_malformed_offer_fails_negotiation() {
        let mut h = harness(Script::default());
        responder(&mut h).await;

        let result = h.orchestrator.handle_offer(json!({"sdp": 42})).await;
        assert!(matches!(result, Err(Error::Negotiation(_))));
        assert_eq!(h.orchestrator.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_rejected_remote_description_fails() {
        let mut h = harness(Script {
            fail_remote: true,
            ..Script::default()
        });
        responder(&mut h).await;

        let result = h
            .orchestrator
            .handle_offer(json!({"type": "offer", "sdp": "v=0"}))
            .await;
        assert!(result.is_err());
        assert_eq!(h.orchestrator.state(), ConnectionState::Failed);
        assert!(!h.script.calls().contains(&Call::CreateAnswer));
    }

    #[tokio::test]
    async fn test_malformed_candidate_dropped() {
        let mut h = harness(Script::default());
        responder(&mut h).await;
        h.orchestrator
            .handle_ice_candidate(json!({"sdpMid": 7}))
            .await
            .unwrap();
        assert_eq!(h.orchestrator.pending_candidates(), 0);
        assert_eq!(h.orchestrator.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_stale_link_events_ignored() {
        let mut h = harness(Script::default());
        let me = ParticipantId::new();
        h.orchestrator.set_local_id(me);
        h.orchestrator.assign_initiator(me).await.unwrap();
        h.orchestrator
            .handle_link_event(LinkEvent::new(0, LinkEventKind::RemoteTrack));
        assert!(h.orchestrator.remote_stream_available());

        h.orchestrator.reset().await;
        assert_eq!(h.orchestrator.generation(), 1);
        assert!(!h.orchestrator.remote_stream_available());

        h.orchestrator
            .handle_link_event(LinkEvent::new(0, LinkEventKind::RemoteTrack));
        assert!(!h.orchestrator.remote_stream_available());
    }

    #[tokio::test]
    async fn test_peer_left_resets_and_clears_role() {
        let mut h = harness(Script::default());
        responder(&mut h).await;
        h.orchestrator
            .handle_offer(json!({"type": "offer", "sdp": "v=0"}))
            .await
            .unwrap();
        h.orchestrator
            .handle_link_event(LinkEvent::new(0, LinkEventKind::RemoteTrack));
        h.orchestrator.handle_link_event(connected(0));
        assert_eq!(h.orchestrator.state(), ConnectionState::Connected);
        h.orchestrator.take_events();

        h.orchestrator.peer_left().await;

        assert_eq!(h.orchestrator.state(), ConnectionState::Idle);
        assert_eq!(h.orchestrator.role(), Role::Unassigned);
        assert!(h.script.calls().contains(&Call::Close));
        assert_eq!(
            h.orchestrator.take_events(),
            vec![
                OrchestratorEvent::RemoteStreamAvailable(false),
                OrchestratorEvent::LinkState(ConnectionState::Idle),
            ]
        );
    }

    #[tokio::test]
    async fn test_link_failure_then_retry_offers_again() {
        let mut h = harness(Script::default());
        let me = ParticipantId::new();
        h.orchestrator.set_local_id(me);
        h.orchestrator.assign_initiator(me).await.unwrap();
        h.orchestrator.handle_link_event(LinkEvent::new(
            0,
            LinkEventKind::Connectivity(Connectivity::Failed),
        ));
        assert_eq!(h.orchestrator.state(), ConnectionState::Failed);

        h.orchestrator.retry().await.unwrap();
        assert_eq!(
            h.orchestrator.state(),
            ConnectionState::Negotiating(NegotiationPhase::Offering)
        );
        assert_eq!(
            h.script.calls(),
            vec![
                Call::Open(0),
                Call::CreateOffer,
                Call::Close,
                Call::Open(1),
                Call::CreateOffer,
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_responder_accepts_fresh_offer() {
        let mut h = harness(Script::default());
        responder(&mut h).await;
        h.orchestrator
            .handle_offer(json!({"type": "offer", "sdp": "v=0"}))
            .await
            .unwrap();
        h.orchestrator.handle_link_event(LinkEvent::new(
            0,
            LinkEventKind::Connectivity(Connectivity::Failed),
        ));
        assert_eq!(h.orchestrator.state(), ConnectionState::Failed);

        h.orchestrator
            .handle_offer(json!({"type": "offer", "sdp": "v=0 again"}))
            .await
            .unwrap();
        assert_eq!(
            h.orchestrator.state(),
            ConnectionState::Negotiating(NegotiationPhase::Answering)
        );
        assert!(h.script.calls().contains(&Call::Open(1)));
    }

    #[tokio::test]
    async fn test_closed_outbound_is_transport_error() {
        let mut h = harness(Script::default());
        h.outbound.close();
        let me = ParticipantId::new();
        h.orchestrator.set_local_id(me);
        let err = h.orchestrator.assign_initiator(me).await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(h.orchestrator.state(), ConnectionState::Failed);
    }
}
