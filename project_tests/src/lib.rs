//! # Integration Test Fixtures
//!
//! Shared pieces for the tests under `tests/`: StackExchange response
//! bodies and a local websocket server standing in for the question socket.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;

/// A question record as the API returns it.
pub fn question_json(id: i64, title: &str, created: i64, tags: &[&str]) -> Value {
    json!({
        "question_id": id,
        "title": title,
        "link": format!("https://stackoverflow.com/q/{}", id),
        "score": 1,
        "answer_count": 0,
        "comment_count": 0,
        "view_count": 10,
        "creation_date": created,
        "tags": tags,
    })
}

/// Response envelope with a healthy quota.
pub fn envelope(items: Vec<Value>, has_more: bool) -> Value {
    json!({
        "items": items,
        "quota_max": 10000,
        "quota_remaining": 9990,
        "has_more": has_more,
    })
}

/// Socket frame announcing a new question, with the id as a string the way
/// the service sends it.
pub fn announcement_frame(site_id: u32, tag: &str, id: i64, tags: &[&str]) -> String {
    let data = json!({ "id": id.to_string(), "tags": tags }).to_string();
    json!({ "action": format!("{}-questions-newest-tag-{}", site_id, tag), "data": data }).to_string()
}

/// What the fake socket sends next.
#[derive(Debug, Clone)]
pub enum ServerFrame {
    Text(String),
    Close,
}

/// A one-connection websocket server on localhost.
pub struct FakeSocket {
    /// `ws://` URL to connect to.
    pub url: String,
    /// Text frames received from the client, in order.
    pub received: mpsc::UnboundedReceiver<String>,
    /// Frames to send to the client.
    pub frames: mpsc::UnboundedSender<ServerFrame>,
}

pub async fn start_socket_server() -> std::io::Result<FakeSocket> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (received_tx, received_rx) = mpsc::unbounded_channel();
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel::<ServerFrame>();

    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
            return;
        };
        let (mut write, mut read) = ws.split();
        loop {
            tokio::select! {
                frame = frames_rx.recv() => match frame {
                    Some(ServerFrame::Text(text)) => {
                        if write.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(ServerFrame::Close) | None => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                },
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        let _ = received_tx.send(text.as_str().to_string());
                    }
                    Some(Ok(_)) => {}
                    _ => break,
                },
            }
        }
    });

    Ok(FakeSocket {
        url: format!("ws://{}", addr),
        received: received_rx,
        frames: frames_tx,
    })
}
