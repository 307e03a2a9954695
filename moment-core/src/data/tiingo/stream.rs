//! Live trade stream over the Tiingo IEX websocket.
//!
//! [`TiingoStream::subscribe`] connects, sends the subscribe request and
//! spawns a reader task that forwards trades for the watched symbols as
//! [`Price`] updates. The returned [`Watcher`] owns the task: unsubscribing
//! (or dropping it) sends the unsubscribe request and closes the socket.

use super::socket::{decode_frame, subscribe_message, unsubscribe_message, IexKind};
use crate::config::TiingoConfig;
use crate::data::FinanceError;
use crate::domain::{Price, Symbol};
use futures_util::{Sink, SinkExt, StreamExt};
use std::collections::HashSet;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite, tungstenite::Message};

const CHANNEL_CAPACITY: usize = 1024;

pub struct TiingoStream {
    url: String,
    api_key: String,
}

impl TiingoStream {
    pub fn new(config: &TiingoConfig) -> Result<Self, FinanceError> {
        let api_key = config.require_api_key()?.to_string();
        Ok(Self::with_url(config.ws_url.clone(), api_key))
    }

    pub fn with_url(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
        }
    }

    /// Start watching `symbols`.
    ///
    /// Connection and subscribe failures are returned here; later socket
    /// errors end the stream, which the receiver observes as a closed channel.
    pub async fn subscribe(
        &self,
        symbols: &[Symbol],
    ) -> Result<(Watcher, mpsc::Receiver<Price>), FinanceError> {
        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| FinanceError::Stream(format!("connect {}: {e}", self.url)))?;
        let (mut write, mut read) = ws_stream.split();

        write
            .send(Message::Text(subscribe_message(&self.api_key).into()))
            .await
            .map_err(|e| FinanceError::Stream(format!("subscribe: {e}")))?;
        tracing::info!(url = %self.url, symbols = symbols.len(), "subscribed to live trades");

        let watched: HashSet<Symbol> = symbols.iter().cloned().collect();
        let (price_tx, price_rx) = mpsc::channel::<Price>(CHANNEL_CAPACITY);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let api_key = self.api_key.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    // Fires on an explicit unsubscribe and when the Watcher is dropped.
                    _ = &mut shutdown_rx => {
                        tracing::debug!("watcher closed, unsubscribing");
                        close(&mut write, &api_key).await;
                        break;
                    }
                    msg = read.next() => match msg {
                        Some(Ok(Message::Text(text))) => match decode_frame(&text) {
                            Ok(Some(event)) if event.kind == IexKind::Trade && watched.contains(&event.symbol) => {
                                if price_tx.send(event.into_price()).await.is_err() {
                                    tracing::debug!("price receiver dropped, unsubscribing");
                                    close(&mut write, &api_key).await;
                                    break;
                                }
                            }
                            Ok(_) => {}
                            Err(e) => tracing::warn!(error = %e, "skipping malformed iex frame"),
                        },
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(?frame, "server closed the stream");
                            break;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            tracing::trace!(len = data.len(), "ping");
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "stream read failed");
                            break;
                        }
                        None => break,
                    },
                }
            }
        });

        Ok((
            Watcher {
                shutdown: Some(shutdown_tx),
                task: Some(task),
            },
            price_rx,
        ))
    }
}

async fn close<S>(write: &mut S, api_key: &str)
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    if let Err(e) = write
        .send(Message::Text(unsubscribe_message(api_key).into()))
        .await
    {
        tracing::debug!(error = %e, "unsubscribe not delivered");
    }
    let _ = write.close().await;
}

/// Handle to a running subscription.
#[derive(Debug)]
pub struct Watcher {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Watcher {
    /// Unsubscribe, close the socket and wait for the reader task to end.
    pub async fn unsubscribe(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "stream task ended abnormally");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        // The task sees the signal (or the dropped sender) and shuts down on its own.
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
