//! One participant's call: routes gateway messages, link notifications and
//! presence changes into the orchestrator and the visibility arbiter.

use mirror_common::{ClientMessage, Error, ParticipantId, Result, Role, ServerMessage};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::arbiter::{VisibilityArbiter, VisibilityInputs};
use crate::backoff::{Backoff, RetryPolicy};
use crate::link::{LinkEvent, LinkFactory};
use crate::orchestrator::{ConnectionState, Orchestrator, OrchestratorEvent};
use crate::signaling::SignalingClient;

pub struct CallSession<F: LinkFactory> {
    orchestrator: Orchestrator<F>,
    arbiter: VisibilityArbiter,
    outbound: mpsc::UnboundedSender<ClientMessage>,
    visibility: mpsc::UnboundedSender<bool>,
    backoff: Backoff,
    retry_at: Option<Instant>,
    peer: Option<ParticipantId>,
    client_count: usize,
}

impl<F: LinkFactory> CallSession<F> {
    pub fn new(
        orchestrator: Orchestrator<F>,
        outbound: mpsc::UnboundedSender<ClientMessage>,
        visibility: mpsc::UnboundedSender<bool>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            orchestrator,
            arbiter: VisibilityArbiter::new(),
            outbound,
            visibility,
            backoff: Backoff::new(retry),
            retry_at: None,
            peer: None,
            client_count: 0,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator<F> {
        &self.orchestrator
    }

    pub fn state(&self) -> ConnectionState {
        self.orchestrator.state()
    }

    pub fn role(&self) -> Role {
        self.orchestrator.role()
    }

    pub fn visible(&self) -> bool {
        self.arbiter.visible()
    }

    pub fn inputs(&self) -> VisibilityInputs {
        self.arbiter.inputs()
    }

    pub fn peer(&self) -> Option<ParticipantId> {
        self.peer
    }

    pub fn client_count(&self) -> usize {
        self.client_count
    }

    /// When the next negotiation retry is due, if one is scheduled.
    pub fn retry_deadline(&self) -> Option<Instant> {
        self.retry_at
    }

    pub async fn handle_server_message(&mut self, message: ServerMessage) -> Result<()> {
        match message {
            ServerMessage::Welcome(id) => {
                info!("joined as {}", id);
                self.orchestrator.set_local_id(id);
            }
            ServerMessage::ClientCount(count) => {
                info!("participants connected: {}", count);
                self.client_count = count;
            }
            ServerMessage::InitiatorId(initiator) => {
                self.backoff.reset();
                self.retry_at = None;
                let result = self.orchestrator.assign_initiator(initiator).await;
                self.absorb(result)?;
            }
            ServerMessage::PeerPresenceChanged {
                peer_id,
                is_detected,
            } => {
                debug!("peer {} presence {}", peer_id, is_detected);
                let changed = self.arbiter.set_remote_presence(is_detected);
                self.emit(changed);
            }
            ServerMessage::Offer(body) => {
                let result = self.orchestrator.handle_offer(body).await;
                self.absorb(result)?;
            }
            ServerMessage::Answer(body) => {
                let result = self.orchestrator.handle_answer(body).await;
                self.absorb(result)?;
            }
            ServerMessage::IceCandidate(body) => {
                let result = self.orchestrator.handle_ice_candidate(body).await;
                self.absorb(result)?;
            }
            ServerMessage::PeerConnected(id) => {
                info!("peer connected: {}", id);
                self.peer = Some(id);
            }
            ServerMessage::PeerDisconnected(id) => {
                info!("peer disconnected: {}", id);
                self.peer = None;
                self.drop_pairing().await;
            }
            ServerMessage::Error { message } => {
                warn!("gateway reported error: {}", message);
            }
        }
        self.sync();
        Ok(())
    }

    pub fn handle_link_event(&mut self, event: LinkEvent) {
        self.orchestrator.handle_link_event(event);
        self.sync();
    }

    /// Record local presence and announce it. Only changes are sent.
    pub fn set_local_presence(&mut self, present: bool) -> Result<()> {
        if self.arbiter.inputs().local_presence == present {
            return Ok(());
        }
        self.outbound
            .send(ClientMessage::PresenceChanged(present))
            .map_err(|_| Error::transport("signaling channel closed"))?;
        let changed = self.arbiter.set_local_presence(present);
        self.emit(changed);
        Ok(())
    }

    /// Run the scheduled retry.
    pub async fn retry_due(&mut self) -> Result<()> {
        self.retry_at = None;
        let result = self.orchestrator.retry().await;
        self.absorb(result)?;
        self.sync();
        Ok(())
    }

    /// The signaling socket is gone: reset everything to `Idle`.
    pub async fn transport_lost(&mut self) {
        warn!("signaling transport lost, resetting call");
        self.peer = None;
        self.client_count = 0;
        self.drop_pairing().await;
        self.sync();
    }

    /// Leave the call locally.
    pub async fn disconnect(&mut self) {
        info!("disconnecting");
        self.peer = None;
        self.drop_pairing().await;
        self.sync();
    }

    /// Drive the session until the signaling connection ends.
    pub async fn run(
        mut self,
        signaling: &mut SignalingClient,
        mut link_events: mpsc::UnboundedReceiver<LinkEvent>,
        mut presence: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut presence_open = true;
        let initial = *presence.borrow_and_update();
        self.set_local_presence(initial)?;

        loop {
            let retry_pending = self.retry_at.is_some();
            let deadline = self.retry_at.unwrap_or_else(Instant::now);

            tokio::select! {
                message = signaling.recv() => match message {
                    Ok(message) => self.handle_server_message(message).await?,
                    Err(err) => {
                        if err.is_transport() {
                            self.transport_lost().await;
                        }
                        return Err(err);
                    }
                },
                Some(event) = link_events.recv() => self.handle_link_event(event),
                changed = presence.changed(), if presence_open => match changed {
                    Ok(()) => {
                        let present = *presence.borrow_and_update();
                        self.set_local_presence(present)?;
                    }
                    Err(_) => {
                        debug!("presence source closed");
                        presence_open = false;
                    }
                },
                _ = tokio::time::sleep_until(deadline), if retry_pending => {
                    self.retry_due().await?;
                }
            }
        }
    }

    async fn drop_pairing(&mut self) {
        self.retry_at = None;
        self.backoff.reset();
        self.orchestrator.peer_left().await;
        let changed = self.arbiter.set_remote_presence(false);
        self.emit(changed);
    }

    /// Negotiation failures are already reflected in the connection state;
    /// only transport errors end the session.
    fn absorb(&self, result: Result<()>) -> Result<()> {
        match result {
            Err(err) if err.is_transport() => Err(err),
            Err(err) => {
                debug!("negotiation step failed: {}", err);
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    fn sync(&mut self) {
        for event in self.orchestrator.take_events() {
            let changed = self.arbiter.apply(&event);
            self.emit(changed);
            match event {
                OrchestratorEvent::LinkState(ConnectionState::Connected) => self.backoff.reset(),
                OrchestratorEvent::LinkState(ConnectionState::Failed) => self.schedule_retry(),
                _ => {}
            }
        }
    }

    fn schedule_retry(&mut self) {
        if self.orchestrator.role() != Role::Initiator || self.retry_at.is_some() {
            return;
        }
        match self.backoff.next_delay() {
            Some(delay) => {
                info!(
                    "retrying negotiation in {:?} (attempt {})",
                    delay,
                    self.backoff.attempts()
                );
                self.retry_at = Some(Instant::now() + delay);
            }
            None => warn!(
                "negotiation failed, giving up after {} retries",
                self.backoff.attempts()
            ),
        }
    }

    fn emit(&self, changed: Option<bool>) {
        if let Some(visible) = changed {
            info!("visibility changed: {}", visible);
            let _ = self.visibility.send(visible);
        }
    }
}
