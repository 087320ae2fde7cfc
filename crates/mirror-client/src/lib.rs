//! Mirror call client.
//!
//! A participant connects to the gateway, negotiates one peer link with the
//! other participant and shows the remote video only while both people are
//! present and the link is up.

#![forbid(unsafe_code)]

pub mod arbiter;
pub mod backoff;
pub mod config;
pub mod link;
pub mod orchestrator;
pub mod presence;
pub mod session;
pub mod signaling;
pub mod webrtc_link;

pub use arbiter::{decide, VisibilityArbiter, VisibilityInputs};
pub use backoff::{Backoff, RetryPolicy};
pub use config::{ClientArgs, ClientConfig, IceServerConfig};
pub use link::{Connectivity, LinkError, LinkEvent, LinkEventKind, LinkEvents, LinkFactory, PeerLink};
pub use orchestrator::{ConnectionState, NegotiationPhase, Orchestrator, OrchestratorEvent};
pub use session::CallSession;
pub use signaling::SignalingClient;
pub use webrtc_link::{local_video_track, WebRtcLink, WebRtcLinkFactory};
