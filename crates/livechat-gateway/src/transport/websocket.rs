//! WebSocket connector
//!
//! Each dial runs as its own task: a writer fed by a bounded channel and a
//! reader posting every inbound frame to the mutator queue.

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::{Connector, EventSink, TransportEvent, TransportHandle};
use crate::connection::ConnectionId;
use crate::error::{GatewayError, GatewayResult};

/// Channel buffer size for outgoing frames
const MESSAGE_BUFFER_SIZE: usize = 100;

/// Outbound instruction for the writer task
#[derive(Debug)]
enum Outgoing {
    Text(String),
    Close,
}

/// [`Connector`] dialing a WebSocket endpoint with `tokio-tungstenite`
#[derive(Debug)]
pub struct WsConnector {
    url: String,
    sink: EventSink,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, sink: EventSink) -> Self {
        Self {
            url: url.into(),
            sink,
        }
    }
}

impl Connector for WsConnector {
    fn connect(
        &mut self,
        connection: ConnectionId,
        epoch: u64,
        delay: Duration,
    ) -> Box<dyn TransportHandle> {
        let (tx, rx) = mpsc::channel(MESSAGE_BUFFER_SIZE);
        let task = tokio::spawn(run_connection(
            self.url.clone(),
            connection,
            epoch,
            delay,
            rx,
            self.sink.clone(),
        ));

        Box::new(WsHandle {
            connection,
            tx,
            task: task.abort_handle(),
        })
    }
}

struct WsHandle {
    connection: ConnectionId,
    tx: mpsc::Sender<Outgoing>,
    task: AbortHandle,
}

impl TransportHandle for WsHandle {
    fn send(&self, text: String) -> bool {
        match self.tx.try_send(Outgoing::Text(text)) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    connection = %self.connection,
                    error = %e,
                    "Failed to queue outgoing frame"
                );
                false
            }
        }
    }

    fn close(&self) {
        // Let the writer send a close frame; abort if it cannot be reached
        if self.tx.try_send(Outgoing::Close).is_err() {
            self.task.abort();
        }
    }
}

/// Dial, then pump frames until either side ends the connection
async fn run_connection(
    url: String,
    connection: ConnectionId,
    epoch: u64,
    delay: Duration,
    mut rx: mpsc::Receiver<Outgoing>,
    sink: EventSink,
) {
    let connect = async {
        if !delay.is_zero() {
            tracing::debug!(connection = %connection, delay_ms = delay.as_millis(), "Waiting before dial");
            tokio::time::sleep(delay).await;
        }
        dial(&url).await
    };

    let stream = tokio::select! {
        result = connect => match result {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(connection = %connection, error = %e, "WebSocket dial failed");
                sink.deliver(TransportEvent::closed(connection, epoch, Some(e.to_string())))
                    .await;
                return;
            }
        },
        () = close_requested(&mut rx) => {
            tracing::debug!(connection = %connection, epoch, "Closed before connecting");
            return;
        }
    };

    tracing::debug!(connection = %connection, epoch, "WebSocket connected");
    if !sink.deliver(TransportEvent::opened(connection, epoch)).await {
        return;
    }

    let (mut ws_sink, mut ws_stream) = stream.split();

    // Reader: forwards frames until the stream ends, yielding the close reason
    let sink_recv = sink.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_stream.next().await {
            let text = match msg {
                Ok(Message::Text(text)) => text.to_string(),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => text,
                    Err(_) => {
                        tracing::debug!(connection = %connection, "Dropping non UTF-8 binary frame");
                        continue;
                    }
                },
                Ok(Message::Close(frame)) => {
                    tracing::info!(connection = %connection, "Server closed connection");
                    return frame.map(|f| f.reason.to_string());
                }
                // Ping/pong are answered by tungstenite
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(connection = %connection, error = %e, "WebSocket error");
                    return Some(e.to_string());
                }
            };

            if !sink_recv
                .deliver(TransportEvent::frame(connection, epoch, text))
                .await
            {
                return None;
            }
        }
        None
    });

    // Writer: returns true when the gateway asked for the close
    let mut send_task = tokio::spawn(async move {
        while let Some(outgoing) = rx.recv().await {
            match outgoing {
                Outgoing::Text(text) => {
                    if let Err(e) = ws_sink.send(Message::Text(text.into())).await {
                        tracing::warn!(connection = %connection, error = %e, "Failed to send frame");
                        return false;
                    }
                }
                Outgoing::Close => break,
            }
        }

        let _ = ws_sink.close().await;
        true
    });

    tokio::select! {
        result = &mut recv_task => {
            send_task.abort();
            let reason = result.ok().flatten();
            sink.deliver(TransportEvent::closed(connection, epoch, reason)).await;
        }
        result = &mut send_task => {
            recv_task.abort();
            if !matches!(result, Ok(true)) {
                sink.deliver(TransportEvent::closed(
                    connection,
                    epoch,
                    Some("write failed".to_string()),
                ))
                .await;
            }
        }
    }
}

/// Resolves once the handle asks for a close or is dropped
async fn close_requested(rx: &mut mpsc::Receiver<Outgoing>) {
    loop {
        match rx.recv().await {
            Some(Outgoing::Close) | None => return,
            // Nothing is written before the connection reports open
            Some(Outgoing::Text(_)) => {}
        }
    }
}

async fn dial(
    url: &str,
) -> GatewayResult<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
> {
    let (stream, _response) = connect_async(url).await.map_err(GatewayError::from)?;
    Ok(stream)
}
