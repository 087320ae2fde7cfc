//! Scripted link and an in-process gateway harness for call tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mirror_client::{
    CallSession, LinkError, LinkEvent, LinkEventKind, LinkEvents, LinkFactory, Orchestrator,
    PeerLink, RetryPolicy,
};
use mirror_common::{
    ClientMessage, IceCandidate, ParticipantId, SdpKind, ServerMessage, SessionDescription,
};
use mirror_gateway::{relay, Registry};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum LinkCall {
    Open(u64),
    CreateOffer,
    CreateAnswer,
    SetRemote(SdpKind),
    AddCandidate(String),
    Close,
}

#[derive(Clone, Default)]
pub struct LinkLog(Arc<Mutex<Vec<LinkCall>>>);

impl LinkLog {
    pub fn calls(&self) -> Vec<LinkCall> {
        self.0.lock().unwrap().clone()
    }

    fn record(&self, call: LinkCall) {
        self.0.lock().unwrap().push(call);
    }
}

pub struct ScriptedLink {
    log: LinkLog,
    generation: u64,
}

#[async_trait]
impl PeerLink for ScriptedLink {
    async fn create_local_offer(&mut self) -> Result<SessionDescription, LinkError> {
        self.log.record(LinkCall::CreateOffer);
        Ok(SessionDescription::offer(format!("offer-{}", self.generation)))
    }

    async fn create_local_answer(&mut self) -> Result<SessionDescription, LinkError> {
        self.log.record(LinkCall::CreateAnswer);
        Ok(SessionDescription::answer(format!("answer-{}", self.generation)))
    }

    async fn set_remote_description(
        &mut self,
        description: SessionDescription,
    ) -> Result<(), LinkError> {
        self.log.record(LinkCall::SetRemote(description.kind));
        Ok(())
    }

    async fn add_ice_candidate(&mut self, candidate: IceCandidate) -> Result<(), LinkError> {
        self.log.record(LinkCall::AddCandidate(candidate.candidate));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), LinkError> {
        self.log.record(LinkCall::Close);
        Ok(())
    }
}

pub struct ScriptedFactory {
    pub log: LinkLog,
}

#[async_trait]
impl LinkFactory for ScriptedFactory {
    type Link = ScriptedLink;
    type Media = ();

    async fn open(
        &self,
        _media: &(),
        generation: u64,
        _events: LinkEvents,
    ) -> Result<ScriptedLink, LinkError> {
        self.log.record(LinkCall::Open(generation));
        Ok(ScriptedLink {
            log: self.log.clone(),
            generation,
        })
    }
}

/// One client wired to an in-process registry.
pub struct Peer {
    pub id: ParticipantId,
    pub session: CallSession<ScriptedFactory>,
    pub log: LinkLog,
    inbox: mpsc::Receiver<ServerMessage>,
    outbound: mpsc::UnboundedReceiver<ClientMessage>,
    visibility: mpsc::UnboundedReceiver<bool>,
    _link_events: mpsc::UnboundedReceiver<LinkEvent>,
}

impl Peer {
    pub fn join(registry: &mut Registry, retry: RetryPolicy) -> Self {
        let (inbox_tx, inbox) = mpsc::channel(64);
        let (out_tx, outbound) = mpsc::unbounded_channel();
        let (visibility_tx, visibility) = mpsc::unbounded_channel();
        let (link_tx, link_events) = mpsc::unbounded_channel();

        let log = LinkLog::default();
        let orchestrator = Orchestrator::new(
            ScriptedFactory { log: log.clone() },
            Some(()),
            out_tx.clone(),
            link_tx,
        )
        .unwrap();
        let session = CallSession::new(orchestrator, out_tx, visibility_tx, retry);
        let id = registry.join(inbox_tx);

        Self {
            id,
            session,
            log,
            inbox,
            outbound,
            visibility,
            _link_events: link_events,
        }
    }

    /// Deliver a notification as if it came from the current link.
    pub fn link_event(&mut self, kind: LinkEventKind) {
        let generation = self.session.orchestrator().generation();
        self.session
            .handle_link_event(LinkEvent::new(generation, kind));
    }

    pub fn visibility_changes(&mut self) -> Vec<bool> {
        let mut changes = Vec::new();
        while let Ok(visible) = self.visibility.try_recv() {
            changes.push(visible);
        }
        changes
    }

    /// Apply queued server messages. Returns how many were handled.
    async fn deliver_inbox(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.inbox.try_recv() {
            self.session.handle_server_message(message).await.unwrap();
            handled += 1;
        }
        handled
    }

    /// Relay queued client messages. Returns how many were sent.
    fn flush_outbound(&mut self, registry: &mut Registry) -> usize {
        let mut sent = 0;
        while let Ok(message) = self.outbound.try_recv() {
            relay(registry, self.id, message);
            sent += 1;
        }
        sent
    }

    pub fn drain_outbound(&mut self) -> Vec<ClientMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.outbound.try_recv() {
            messages.push(message);
        }
        messages
    }
}

/// Move messages between the peers and the registry until nothing is left.
pub async fn pump(registry: &mut Registry, peers: &mut [&mut Peer]) {
    loop {
        let mut moved = 0;
        for peer in peers.iter_mut() {
            moved += peer.flush_outbound(registry);
        }
        for peer in peers.iter_mut() {
            moved += peer.deliver_inbox().await;
        }
        if moved == 0 {
            break;
        }
    }
}
