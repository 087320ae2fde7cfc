use std::net::SocketAddr;

use clap::Parser;
use mirror_common::{Error, Result};

use crate::signal::{
    SocketLimits, DEFAULT_MAX_MESSAGES_PER_MINUTE, DEFAULT_MAX_MESSAGE_BYTES,
    DEFAULT_OUTBOX_CAPACITY,
};

#[derive(Parser, Debug, Clone)]
#[command(name = "mirror-gateway")]
#[command(about = "Mirror signaling gateway - pairs two participants and relays negotiation")]
pub struct GatewayConfig {
    /// HTTP/WebSocket listen address
    #[arg(long, env = "MIRROR_GATEWAY_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Queued outbound messages per participant before drops
    #[arg(long, env = "MIRROR_WS_OUTBOX_CAPACITY", default_value_t = DEFAULT_OUTBOX_CAPACITY)]
    pub outbox_capacity: usize,

    /// Largest accepted text frame in bytes
    #[arg(long, env = "MIRROR_WS_MAX_MESSAGE_BYTES", default_value_t = DEFAULT_MAX_MESSAGE_BYTES)]
    pub max_message_bytes: usize,

    /// Messages a participant may send per minute
    #[arg(long, env = "MIRROR_WS_MAX_MESSAGES_PER_MINUTE", default_value_t = DEFAULT_MAX_MESSAGES_PER_MINUTE)]
    pub max_messages_per_minute: u32,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "mirror_gateway=info,tower_http=info")]
    pub log_level: String,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.outbox_capacity == 0 {
            return Err(Error::config("outbox capacity must be at least 1"));
        }
        if self.max_message_bytes < 1024 {
            return Err(Error::config("max message size must be at least 1024 bytes"));
        }
        if self.max_messages_per_minute == 0 {
            return Err(Error::config("message rate limit must be at least 1"));
        }
        Ok(())
    }

    pub fn limits(&self) -> SocketLimits {
        SocketLimits {
            outbox_capacity: self.outbox_capacity,
            max_message_bytes: self.max_message_bytes,
            max_messages_per_minute: self.max_messages_per_minute,
        }
    }
}
