//! Live trade stream against a loopback websocket server.
//!
//! The server plays the IEX feed: it expects the subscribe request, pushes a
//! scripted mix of frames, then reports everything the client sent after.

use futures_util::{SinkExt, StreamExt};
use moment_core::data::TiingoStream;
use moment_core::domain::Symbol;
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::{accept_async, tungstenite::Message};

const HEARTBEAT: &str = r#"{"messageType":"H","response":{"code":200,"message":"HeartBeat"}}"#;
const SUBSCRIBED: &str = r#"{"messageType":"I","data":{"subscriptionId":61},"response":{"code":200,"message":"Success"}}"#;
const QUOTE_SPY: &str = r#"{"messageType":"A","service":"iex","data":["Q","2024-06-07T13:33:45.383129126-04:00",1717781625383129126,"spy",100,534.1,534.11,534.12,100,null,null,0,0,null,null,null]}"#;
const TRADE_MSFT: &str = r#"{"messageType":"A","service":"iex","data":["T","2024-06-07T13:33:45.594808294-04:00",1717781625594808294,"msft",null,null,null,null,null,423.85,100,null,0,0,0,0]}"#;
const TRADE_SPY: &str = r#"{"messageType":"A","service":"iex","data":["T","2024-06-07T13:33:46.000000000-04:00",1717781626000000000,"spy",null,null,null,null,null,534.12,200,null,0,0,0,0]}"#;
const BROKEN: &str = r#"{"messageType":"A","service":"iex","data":["T","yesterday",0,"spy",null,null,null,null,null,1.0]}"#;

/// Start a one-connection feed. Resolves to every text message the client
/// sent, once the client closes.
async fn start_feed(frames: Vec<&'static str>) -> (String, oneshot::Receiver<Vec<Value>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (done_tx, done_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(tcp).await.unwrap();
        let mut received = Vec::new();

        // The client speaks first.
        if let Some(Ok(Message::Text(text))) = ws.next().await {
            received.push(serde_json::from_str::<Value>(&text).unwrap());
        }

        // Heartbeat pings are answered by the client and never surface as prices.
        ws.send(Message::Ping(Vec::new().into())).await.unwrap();
        for frame in frames {
            ws.send(Message::Text(frame.into())).await.unwrap();
        }

        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Text(text)) => received.push(serde_json::from_str(&text).unwrap()),
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
        let _ = done_tx.send(received);
    });

    (format!("ws://{addr}"), done_rx)
}

fn sym(s: &str) -> Symbol {
    Symbol::parse(s).unwrap()
}

#[tokio::test]
async fn only_watched_trades_are_forwarded() {
    let (url, done) = start_feed(vec![SUBSCRIBED, HEARTBEAT, QUOTE_SPY, TRADE_MSFT, BROKEN, TRADE_SPY]).await;
    let stream = TiingoStream::with_url(url, "test-key");

    let (watcher, mut prices) = stream.subscribe(&[sym("SPY")]).await.unwrap();

    let price = tokio::time::timeout(Duration::from_secs(5), prices.recv())
        .await
        .expect("no price within 5s")
        .expect("stream ended early");
    assert_eq!(price.symbol.as_str(), "SPY");
    assert_eq!(price.price, Some(534.12));
    assert_eq!(price.previous_close, None);
    assert_eq!(
        price.last_trade.unwrap().to_rfc3339(),
        "2024-06-07T13:33:46-04:00"
    );

    watcher.unsubscribe().await;

    // Nothing else was queued: the quote, the other symbol and the bad frame
    // were all dropped, and the channel closes with the task.
    assert!(prices.recv().await.is_none());

    let sent = tokio::time::timeout(Duration::from_secs(5), done).await.unwrap().unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0]["eventName"], "subscribe");
    assert_eq!(sent[0]["authorization"], "test-key");
    assert_eq!(sent[0]["eventData"]["thresholdLevel"], "5");
    assert_eq!(sent[1]["eventName"], "unsubscribe");
}

#[tokio::test]
async fn dropping_the_watcher_unsubscribes() {
    let (url, done) = start_feed(vec![SUBSCRIBED]).await;
    let stream = TiingoStream::with_url(url, "k");

    let (watcher, _prices) = stream.subscribe(&[sym("AAPL")]).await.unwrap();
    drop(watcher);

    let sent = tokio::time::timeout(Duration::from_secs(5), done).await.unwrap().unwrap();
    assert_eq!(sent.last().unwrap()["eventName"], "unsubscribe");
}

#[tokio::test]
async fn connect_failure_is_a_stream_error() {
    // Bind then drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let stream = TiingoStream::with_url(format!("ws://{addr}"), "k");
    let err = stream.subscribe(&[sym("AAPL")]).await.unwrap_err();
    assert!(matches!(err, moment_core::FinanceError::Stream(_)));
}
