//! WebSocket connection to the gateway.

use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use mirror_common::{ClientMessage, Error, Result, ServerMessage};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct SignalingClient {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    read: SplitStream<Socket>,
    writer: JoinHandle<()>,
}

impl SignalingClient {
    pub async fn connect(url: &str) -> Result<Self> {
        let (socket, _) = connect_async(url)
            .await
            .map_err(|e| Error::transport(format!("failed to connect to {url}: {e}")))?;
        info!("connected to signaling gateway: {}", url);

        let (mut write, read) = socket.split();
        let (outbound, mut rx) = mpsc::unbounded_channel::<ClientMessage>();

        let writer = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        error!("failed to encode {}: {}", message.kind(), e);
                        continue;
                    }
                };
                debug!("-> {}", message.kind());
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    error!("failed to send signaling message: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
        });

        Ok(Self {
            outbound,
            read,
            writer,
        })
    }

    /// Handle for queueing outbound messages.
    pub fn sender(&self) -> mpsc::UnboundedSender<ClientMessage> {
        self.outbound.clone()
    }

    /// Next message from the gateway. Unparseable frames are skipped; a
    /// closed or broken socket is a transport error.
    pub async fn recv(&mut self) -> Result<ServerMessage> {
        while let Some(frame) = self.read.next().await {
            match frame {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(text.as_str()) {
                    Ok(message) => {
                        debug!("<- {}", message.kind());
                        return Ok(message);
                    }
                    Err(e) => warn!("failed to parse signaling message: {}", e),
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => return Err(Error::transport(format!("signaling socket error: {e}"))),
            }
        }
        Err(Error::transport("signaling connection closed"))
    }

    /// Stop the writer task. Queued messages not yet written are dropped.
    pub fn close(self) {
        self.writer.abort();
    }
}
