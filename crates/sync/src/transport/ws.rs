// WebSocket push transport (tokio-tungstenite).
//
// Each link is pumped by one spawned task: outbound frames from the
// `PushLink::outbound` channel are encoded and written, inbound text frames
// are decoded and forwarded. The task ends by reporting exactly one
// `LinkEvent::Closed`.
//
// The handshake offers the protocol version as `Sec-WebSocket-Protocol`; a
// server that selects a version this client does not speak is refused.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{AUTHORIZATION, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use tripline_common::protocol::push::{
    decode_message, encode_message, is_supported_protocol_version, PushMessage,
    CURRENT_PROTOCOL_VERSION,
};

use super::{DisconnectReason, LinkEvent, PushLink, PushTransport};
use crate::error::TransportError;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, Default)]
pub struct WsPushTransport;

impl PushTransport for WsPushTransport {
    async fn connect(&self, endpoint: &str, auth_token: &str) -> Result<PushLink, TransportError> {
        let mut request = endpoint
            .into_client_request()
            .map_err(|error| TransportError::InvalidEndpoint(error.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {auth_token}"))
            .map_err(|error| TransportError::Connect(format!("invalid auth token: {error}")))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);
        request
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(CURRENT_PROTOCOL_VERSION));

        let (socket, response) = connect_async(request)
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        if let Some(selected) = response.headers().get(SEC_WEBSOCKET_PROTOCOL) {
            let selected = selected.to_str().unwrap_or_default();
            if !is_supported_protocol_version(selected) {
                return Err(TransportError::Connect(format!(
                    "server selected unsupported push protocol {selected:?}"
                )));
            }
            debug!(protocol = selected, "push protocol negotiated");
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        tokio::spawn(pump(socket, outbound_rx, inbound_tx));

        Ok(PushLink { outbound: outbound_tx, inbound: inbound_rx })
    }
}

async fn pump(
    socket: Socket,
    mut outbound: mpsc::UnboundedReceiver<PushMessage>,
    inbound: mpsc::UnboundedSender<LinkEvent>,
) {
    let (mut sink, mut stream) = socket.split();

    let reason = loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(message) => {
                    let encoded = match encode_message(&message) {
                        Ok(encoded) => encoded,
                        Err(error) => {
                            warn!(%error, event = message.event_name(), "dropping unencodable push frame");
                            continue;
                        }
                    };
                    if let Err(error) = sink.send(Message::Text(encoded.into())).await {
                        break DisconnectReason::server(format!("send failed: {error}"));
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break DisconnectReason::client("link released");
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => match decode_message(text.as_str()) {
                    Ok(message) => {
                        if inbound.send(LinkEvent::Message(message)).is_err() {
                            break DisconnectReason::client("link receiver dropped");
                        }
                    }
                    Err(error) => debug!(%error, "ignoring undecodable push frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    let detail = frame
                        .map(|frame| frame.reason.as_str().to_string())
                        .filter(|reason| !reason.is_empty())
                        .unwrap_or_else(|| "closed by server".to_string());
                    break DisconnectReason::server(detail);
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => break DisconnectReason::server(format!("transport error: {error}")),
                None => break DisconnectReason::server("stream ended"),
            },
        }
    };

    debug!(%reason, "push link closed");
    let _ = inbound.send(LinkEvent::Closed(reason));
}
