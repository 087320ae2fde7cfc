use std::time::Duration;

use clap::Parser;
use mirror_common::{Error, Result};

use crate::backoff::RetryPolicy;

/// One STUN or TURN entry handed to the media link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    pub fn turn(
        url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            urls: vec![url.into()],
            username: Some(username.into()),
            credential: Some(credential.into()),
        }
    }

    fn is_turn(&self) -> bool {
        self.urls
            .iter()
            .any(|url| url.starts_with("turn:") || url.starts_with("turns:"))
    }
}

/// Public STUN servers used when none are configured.
pub fn default_ice_servers() -> Vec<IceServerConfig> {
    [
        "stun:stun.l.google.com:19302",
        "stun:stun1.l.google.com:19302",
        "stun:stun2.l.google.com:19302",
        "stun:stun3.l.google.com:19302",
        "stun:stun4.l.google.com:19302",
    ]
    .into_iter()
    .map(IceServerConfig::stun)
    .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub server_url: String,
    pub ice_servers: Vec<IceServerConfig>,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.server_url.starts_with("ws://") || self.server_url.starts_with("wss://")) {
            return Err(Error::config(format!(
                "signaling url must use ws:// or wss://, got {}",
                self.server_url
            )));
        }
        if self.ice_servers.is_empty() {
            return Err(Error::config("at least one ICE server is required"));
        }
        for server in &self.ice_servers {
            if server.urls.is_empty() {
                return Err(Error::config("ICE server entry without urls"));
            }
            if server.is_turn() && (server.username.is_none() || server.credential.is_none()) {
                return Err(Error::config(format!(
                    "TURN server {} needs a username and credential",
                    server.urls.join(",")
                )));
            }
        }
        self.retry.validate()
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "mirror-client")]
#[command(about = "Mirror call client - joins the gateway and shows the peer only while both are present")]
pub struct ClientArgs {
    /// Signaling WebSocket URL
    #[arg(long, env = "MIRROR_SERVER_URL", default_value = "ws://127.0.0.1:8080/ws")]
    pub server: String,

    /// STUN server URI (repeatable). Defaults to the public Google servers.
    #[arg(long = "ice-server")]
    pub ice_servers: Vec<String>,

    /// TURN server URI
    #[arg(long, env = "MIRROR_TURN_URL")]
    pub turn_url: Option<String>,

    #[arg(long, env = "MIRROR_TURN_USERNAME")]
    pub turn_username: Option<String>,

    #[arg(long, env = "MIRROR_TURN_CREDENTIAL", hide_env_values = true)]
    pub turn_credential: Option<String>,

    /// Reconnection attempts after a failed link (0 disables)
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// First retry delay in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub retry_initial_ms: u64,

    /// Upper bound on the retry delay in milliseconds
    #[arg(long, default_value_t = 10_000)]
    pub retry_max_ms: u64,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "mirror_client=info")]
    pub log_level: String,
}

impl ClientArgs {
    pub fn into_config(self) -> ClientConfig {
        let mut ice_servers: Vec<IceServerConfig> = if self.ice_servers.is_empty() {
            default_ice_servers()
        } else {
            self.ice_servers
                .into_iter()
                .map(IceServerConfig::stun)
                .collect()
        };
        if let Some(url) = self.turn_url {
            ice_servers.push(IceServerConfig {
                urls: vec![url],
                username: self.turn_username,
                credential: self.turn_credential,
            });
        }

        ClientConfig {
            server_url: self.server,
            ice_servers,
            retry: RetryPolicy {
                max_attempts: self.max_retries,
                initial_delay: Duration::from_millis(self.retry_initial_ms),
                max_delay: Duration::from_millis(self.retry_max_ms),
                ..RetryPolicy::default()
            },
        }
    }
}
