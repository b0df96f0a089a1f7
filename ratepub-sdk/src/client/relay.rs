use super::ClientError;
use crate::objects::{ClientMessage, RelayMessage, SignedEvent};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a publish may wait for the connection and the relay's `OK`
/// unless [`RelayClient::with_response_timeout`] says otherwise.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// A single relay connection shared by every feed.
///
/// The socket is opened lazily on the first publish and reopened after any
/// transport failure, including a relay that stays silent past the response
/// timeout. [`close`](RelayClient::close) is idempotent; once it has been
/// called every further publish fails with [`ClientError::Closed`].
#[derive(Debug)]
pub struct RelayClient {
    url: Url,
    stream: Mutex<Option<WsStream>>,
    closed: AtomicBool,
    response_timeout: Duration,
}

impl RelayClient {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            stream: Mutex::new(None),
            closed: AtomicBool::new(false),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    /// Bound on connecting and on waiting for the `OK` of one event.
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Send `["EVENT", event]` and wait for the relay's `OK` for this id.
    ///
    /// The socket lock is held for at most the response timeout per step,
    /// so a relay that never answers cannot stall later publishes.
    pub async fn publish(&self, event: &SignedEvent) -> Result<(), ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }

        let mut guard = self.stream.lock().await;
        if guard.is_none() {
            let connect = tokio::time::timeout(self.response_timeout, connect_async(self.url.as_str()));
            let (ws, _response) = connect
                .await
                .map_err(|_| ClientError::Timeout(self.response_timeout))?
                .map_err(ClientError::Connect)?;
            *guard = Some(ws);
        }
        let Some(ws) = guard.as_mut() else {
            return Err(ClientError::ConnectionClosed);
        };

        let result = tokio::time::timeout(self.response_timeout, send_and_await_ok(ws, event))
            .await
            .unwrap_or(Err(ClientError::Timeout(self.response_timeout)));

        // Drop broken or silent sockets so the next publish reconnects, and
        // honour a close() that raced with this publish.
        if result.is_err() || self.is_closed() {
            if let Some(mut ws) = guard.take() {
                let _ = tokio::time::timeout(self.response_timeout, ws.close(None)).await;
            }
        }
        result
    }

    /// Close the connection. Returns `true` only for the call that actually
    /// transitioned the client to closed.
    ///
    /// A publish still holding the socket closes it itself when it
    /// finishes.
    pub async fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Ok(mut guard) = self.stream.try_lock() {
            if let Some(mut ws) = guard.take() {
                let _ = ws.close(None).await;
            }
        }
        true
    }
}

async fn send_and_await_ok(ws: &mut WsStream, event: &SignedEvent) -> Result<(), ClientError> {
    let frame = ClientMessage::Event(event).to_json()?;
    ws.send(Message::Text(frame))
        .await
        .map_err(ClientError::WebSocket)?;

    while let Some(message) = ws.next().await {
        match message.map_err(ClientError::WebSocket)? {
            Message::Text(text) => match RelayMessage::parse(&text)? {
                RelayMessage::Ok {
                    event_id,
                    accepted,
                    message,
                } if event_id == event.id => {
                    return if accepted {
                        Ok(())
                    } else {
                        Err(ClientError::Rejected(message))
                    };
                }
                // OKs for other events, NOTICEs and subscription traffic are
                // not ours to act on.
                _ => {}
            },
            Message::Ping(payload) => {
                ws.send(Message::Pong(payload))
                    .await
                    .map_err(ClientError::WebSocket)?;
            }
            Message::Close(_) => return Err(ClientError::ConnectionClosed),
            _ => {}
        }
    }

    Err(ClientError::ConnectionClosed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::future::Future;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_tungstenite::accept_async;

    type ServerStream = WebSocketStream<TcpStream>;

    fn event(id: &str) -> SignedEvent {
        SignedEvent {
            id: id.into(),
            pubkey: "00".into(),
            created_at: 0,
            kind: 30078,
            tags: vec![],
            content: String::new(),
            sig: "00".into(),
        }
    }

    /// Serve each accepted connection with `handler`, which also gets the
    /// connection's sequence number.
    async fn spawn_relay<F, Fut>(handler: F) -> Url
    where
        F: Fn(usize, ServerStream) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handler = Arc::new(handler);
        tokio::spawn(async move {
            let mut connection = 0;
            while let Ok((tcp, _)) = listener.accept().await {
                let handler = Arc::clone(&handler);
                let n = connection;
                connection += 1;
                tokio::spawn(async move {
                    if let Ok(ws) = accept_async(tcp).await {
                        handler(n, ws).await;
                    }
                });
            }
        });
        Url::parse(&format!("ws://{addr}")).unwrap()
    }

    /// Id of the next `["EVENT", ev]` the client sends.
    async fn next_event_id(ws: &mut ServerStream) -> Option<String> {
        while let Some(Ok(message)) = ws.next().await {
            if let Message::Text(text) = message {
                let frame: Value = serde_json::from_str(&text).ok()?;
                return frame[1]["id"].as_str().map(str::to_owned);
            }
        }
        None
    }

    async fn send_json(ws: &mut ServerStream, value: Value) {
        ws.send(Message::Text(value.to_string())).await.unwrap();
    }

    /// Acks every event except those with id `ignored`.
    async fn ack_all_but(ignored: &'static str, mut ws: ServerStream) {
        while let Some(id) = next_event_id(&mut ws).await {
            if id != ignored {
                send_json(&mut ws, json!(["OK", id, true, ""])).await;
            }
        }
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let client = RelayClient::new(Url::parse("ws://127.0.0.1:1").unwrap());
        assert!(!client.is_closed());
        assert!(client.close().await);
        assert!(!client.close().await);
        assert!(client.is_closed());
    }

    #[tokio::test]
    async fn test_publish_after_close_fails_without_connecting() {
        let client = RelayClient::new(Url::parse("ws://127.0.0.1:1").unwrap());
        client.close().await;
        assert!(matches!(
            client.publish(&event("00")).await,
            Err(ClientError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_acknowledged_publish() {
        let url = spawn_relay(|_, ws| ack_all_but("", ws)).await;
        let client = RelayClient::new(url);
        client.publish(&event("aa")).await.unwrap();
        client.publish(&event("bb")).await.unwrap();
    }

    #[tokio::test]
    async fn test_waits_for_ok_of_own_event() {
        let url = spawn_relay(|_, mut ws| async move {
            let id = next_event_id(&mut ws).await.unwrap();
            send_json(&mut ws, json!(["OK", "someone-else", false, "nope"])).await;
            send_json(&mut ws, json!(["NOTICE", "busy"])).await;
            send_json(&mut ws, json!(["OK", id, false, "blocked: rate limited"])).await;
            let _ = ws.next().await;
        })
        .await;
        let client = RelayClient::new(url);

        let err = client.publish(&event("aa")).await.unwrap_err();

        assert!(matches!(err, ClientError::Rejected(ref m) if m == "blocked: rate limited"));
    }

    #[tokio::test]
    async fn test_close_frame_before_ok_is_connection_closed() {
        let url = spawn_relay(|_, mut ws| async move {
            next_event_id(&mut ws).await;
            let _ = ws.close(None).await;
        })
        .await;
        let client = RelayClient::new(url);

        let err = client.publish(&event("aa")).await.unwrap_err();

        assert!(matches!(err, ClientError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_reconnects_after_transport_failure() {
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&connections);
        let url = spawn_relay(move |n, mut ws| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    next_event_id(&mut ws).await;
                    let _ = ws.close(None).await;
                } else {
                    ack_all_but("", ws).await;
                }
            }
        })
        .await;
        let client = RelayClient::new(url);

        assert!(client.publish(&event("aa")).await.is_err());
        client.publish(&event("bb")).await.unwrap();

        assert_eq!(connections.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_answers_ping_while_waiting() {
        let (pong_tx, pong_rx) = oneshot::channel();
        let pong_tx = std::sync::Mutex::new(Some(pong_tx));
        let url = spawn_relay(move |_, mut ws| {
            let pong_tx = pong_tx.lock().unwrap().take();
            async move {
                let id = next_event_id(&mut ws).await.unwrap();
                ws.send(Message::Ping(b"still there?".to_vec())).await.unwrap();
                while let Some(Ok(message)) = ws.next().await {
                    if let Message::Pong(payload) = message {
                        if let Some(tx) = pong_tx {
                            let _ = tx.send(payload);
                        }
                        break;
                    }
                }
                send_json(&mut ws, json!(["OK", id, true, ""])).await;
                let _ = ws.next().await;
            }
        })
        .await;
        let client = RelayClient::new(url);

        client.publish(&event("aa")).await.unwrap();

        assert_eq!(pong_rx.await.unwrap(), b"still there?".to_vec());
    }

    #[tokio::test]
    async fn test_silent_relay_does_not_block_later_publishes() {
        let url = spawn_relay(|_, ws| ack_all_but("silent", ws)).await;
        let client = Arc::new(RelayClient::new(url).with_response_timeout(Duration::from_millis(300)));

        // Left running the way a publisher leaves a send it gave up on.
        let first = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.publish(&event("silent")).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        for id in ["aa", "bb", "cc"] {
            let later = tokio::time::timeout(Duration::from_secs(2), client.publish(&event(id)))
                .await
                .expect("publish stuck behind unanswered event");
            later.unwrap();
        }
        assert!(matches!(
            first.await.unwrap(),
            Err(ClientError::Timeout(d)) if d == Duration::from_millis(300)
        ));
    }

    #[tokio::test]
    async fn test_close_after_silent_publish_times_out() {
        let url = spawn_relay(|_, ws| ack_all_but("silent", ws)).await;
        let client = RelayClient::new(url).with_response_timeout(Duration::from_millis(100));

        assert!(matches!(
            client.publish(&event("silent")).await,
            Err(ClientError::Timeout(_))
        ));
        assert!(client.close().await);
        assert!(client.stream.lock().await.is_none());
    }
}
