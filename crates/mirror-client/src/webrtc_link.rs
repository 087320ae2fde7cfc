//! [`PeerLink`] backed by webrtc-rs.

use std::sync::Arc;

use async_trait::async_trait;
use mirror_common::{IceCandidate, SdpKind, SessionDescription};
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_H264};
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use crate::config::IceServerConfig;
use crate::link::{
    Connectivity, LinkError, LinkEvent, LinkEventKind, LinkEvents, LinkFactory, PeerLink,
};

pub type LocalTrack = Arc<TrackLocalStaticSample>;

/// Outgoing H264 camera track. Frames are written to it by the capture
/// pipeline; the link only needs it attached.
pub fn local_video_track() -> LocalTrack {
    Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_H264.to_string(),
            ..Default::default()
        },
        "video".to_string(),
        "mirror".to_string(),
    ))
}

fn rtc_ice_servers(servers: &[IceServerConfig]) -> Vec<RTCIceServer> {
    servers
        .iter()
        .map(|server| RTCIceServer {
            urls: server.urls.clone(),
            username: server.username.clone().unwrap_or_default(),
            credential: server.credential.clone().unwrap_or_default(),
            ..Default::default()
        })
        .collect()
}

fn connectivity(state: RTCPeerConnectionState) -> Connectivity {
    match state {
        RTCPeerConnectionState::Connecting => Connectivity::Checking,
        RTCPeerConnectionState::Connected => Connectivity::Connected,
        RTCPeerConnectionState::Disconnected => Connectivity::Disconnected,
        RTCPeerConnectionState::Failed => Connectivity::Failed,
        RTCPeerConnectionState::Closed => Connectivity::Closed,
        _ => Connectivity::New,
    }
}

fn to_rtc_description(description: SessionDescription) -> Result<RTCSessionDescription, LinkError> {
    let SessionDescription { kind, sdp } = description;
    let converted = match kind {
        SdpKind::Offer => RTCSessionDescription::offer(sdp),
        SdpKind::Answer => RTCSessionDescription::answer(sdp),
        SdpKind::Pranswer => RTCSessionDescription::pranswer(sdp),
        SdpKind::Rollback => {
            return Err(LinkError::Description(
                "rollback descriptions are not supported".to_string(),
            ))
        }
    };
    converted.map_err(|e| LinkError::Description(e.to_string()))
}

fn from_rtc_candidate(init: RTCIceCandidateInit) -> IceCandidate {
    IceCandidate {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_mline_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    }
}

pub struct WebRtcLinkFactory {
    api: Arc<API>,
    config: RTCConfiguration,
}

impl WebRtcLinkFactory {
    pub fn new(ice_servers: &[IceServerConfig]) -> Result<Self, LinkError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| LinkError::Create(format!("failed to register codecs: {e}")))?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(|e| LinkError::Create(format!("failed to register interceptors: {e}")))?;
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self {
            api: Arc::new(api),
            config: RTCConfiguration {
                ice_servers: rtc_ice_servers(ice_servers),
                ..Default::default()
            },
        })
    }
}

#[async_trait]
impl LinkFactory for WebRtcLinkFactory {
    type Link = WebRtcLink;
    type Media = LocalTrack;

    async fn open(
        &self,
        media: &LocalTrack,
        generation: u64,
        events: LinkEvents,
    ) -> Result<WebRtcLink, LinkError> {
        let pc = Arc::new(
            self.api
                .new_peer_connection(self.config.clone())
                .await
                .map_err(|e| LinkError::Create(e.to_string()))?,
        );

        let tx = events.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let tx = tx.clone();
            Box::pin(async move {
                // None marks the end of gathering.
                let Some(candidate) = candidate else {
                    return;
                };
                match candidate.to_json() {
                    Ok(init) => {
                        let kind = LinkEventKind::LocalCandidate(from_rtc_candidate(init));
                        let _ = tx.send(LinkEvent::new(generation, kind));
                    }
                    Err(e) => warn!("failed to serialize local candidate: {}", e),
                }
            })
        }));

        let tx = events.clone();
        pc.on_track(Box::new(
            move |track: Arc<TrackRemote>, _: Arc<RTCRtpReceiver>, _: Arc<RTCRtpTransceiver>| {
                let tx = tx.clone();
                Box::pin(async move {
                    info!("remote track arrived: kind={} id={}", track.kind(), track.id());
                    let _ = tx.send(LinkEvent::new(generation, LinkEventKind::RemoteTrack));
                })
            },
        ));

        let tx = events;
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let tx = tx.clone();
            Box::pin(async move {
                debug!("peer connection state: {}", state);
                let kind = LinkEventKind::Connectivity(connectivity(state));
                let _ = tx.send(LinkEvent::new(generation, kind));
            })
        }));

        let sender = pc
            .add_track(Arc::clone(media) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| LinkError::Media(e.to_string()))?;

        // RTCP has to be drained for the interceptors to run.
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while sender.read(&mut buf).await.is_ok() {}
        });

        Ok(WebRtcLink { pc })
    }
}

pub struct WebRtcLink {
    pc: Arc<RTCPeerConnection>,
}

#[async_trait]
impl PeerLink for WebRtcLink {
    async fn create_local_offer(&mut self) -> Result<SessionDescription, LinkError> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| LinkError::Description(format!("failed to create offer: {e}")))?;
        let sdp = offer.sdp.clone();
        self.pc
            .set_local_description(offer)
            .await
            .map_err(|e| LinkError::Description(format!("failed to set local offer: {e}")))?;
        Ok(SessionDescription::offer(sdp))
    }

    async fn create_local_answer(&mut self) -> Result<SessionDescription, LinkError> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| LinkError::Description(format!("failed to create answer: {e}")))?;
        let sdp = answer.sdp.clone();
        self.pc
            .set_local_description(answer)
            .await
            .map_err(|e| LinkError::Description(format!("failed to set local answer: {e}")))?;
        Ok(SessionDescription::answer(sdp))
    }

    async fn set_remote_description(
        &mut self,
        description: SessionDescription,
    ) -> Result<(), LinkError> {
        let description = to_rtc_description(description)?;
        self.pc
            .set_remote_description(description)
            .await
            .map_err(|e| LinkError::Description(e.to_string()))
    }

    async fn add_ice_candidate(&mut self, candidate: IceCandidate) -> Result<(), LinkError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: candidate.username_fragment,
        };
        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| LinkError::Candidate(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), LinkError> {
        self.pc
            .close()
            .await
            .map_err(|e| LinkError::Create(format!("failed to close link: {e}")))
    }
}
