/*
[INPUT]:  WebSocket URL
[OUTPUT]: Text-frame transport link (outbound sender + inbound receiver)
[POS]:    WebSocket layer - transport seam between channel logic and the socket
[UPDATE]: When changing socket IO or adding transport implementations
*/

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::debug;

use crate::http::{Result, SyncError};

const LINK_BUFFER: usize = 100;

/// One established transport.
///
/// Dropping `outbound` closes the socket. `inbound` yielding `None` means
/// the peer went away.
#[derive(Debug)]
pub struct TransportLink {
    pub outbound: mpsc::Sender<String>,
    pub inbound: mpsc::Receiver<String>,
}

/// Opens transports for channel connections
#[async_trait]
pub trait Connector: std::fmt::Debug + Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<TransportLink>;
}

/// Connector backed by tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<TransportLink> {
        let (ws_stream, _response) = connect_async(url)
            .await
            .map_err(|err| SyncError::WebSocket(err.to_string()))?;
        let (mut write, mut read) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(LINK_BUFFER);
        let (inbound_tx, inbound_rx) = mpsc::channel::<String>(LINK_BUFFER);
        let url = url.to_string();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outbound = outbound_rx.recv() => {
                        match outbound {
                            Some(text) => {
                                if write.send(WsMessage::Text(text.into())).await.is_err() {
                                    break;
                                }
                            }
                            None => {
                                let _ = write.send(WsMessage::Close(None)).await;
                                break;
                            }
                        }
                    }
                    incoming = read.next() => {
                        match incoming {
                            Some(Ok(WsMessage::Close(_))) => {
                                let _ = write.send(WsMessage::Close(None)).await;
                                break;
                            }
                            Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => {}
                            Some(Ok(message)) => {
                                let Some(text) = message_text(message) else {
                                    continue;
                                };
                                if inbound_tx.send(text).await.is_err() {
                                    let _ = write.send(WsMessage::Close(None)).await;
                                    break;
                                }
                            }
                            Some(Err(err)) => {
                                debug!(%url, error = %err, "ws read failed");
                                break;
                            }
                            None => break,
                        }
                    }
                }
            }
            debug!(%url, "ws io task finished");
        });

        Ok(TransportLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

fn message_text(message: WsMessage) -> Option<String> {
    match message {
        WsMessage::Text(text) => Some(text.to_string()),
        WsMessage::Binary(bytes) => String::from_utf8(bytes.to_vec()).ok(),
        _ => None,
    }
}
