use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::JsonLinesCodec;
use crate::error::ReceiverError;
use crate::sink::EventSink;

/// Accepts TCP connections carrying newline-delimited JSON events.
///
/// Each connection is read by its own task. A malformed line or a reset
/// closes that connection only; the listener keeps accepting.
pub struct SocketReceiver {
    local_addr: SocketAddr,

    /// Cancels the accept loop and every connection task
    cancel: CancellationToken,

    accept_task: Option<JoinHandle<()>>,

    /// Connections currently being read
    active: Arc<AtomicUsize>,
}

impl SocketReceiver {
    /// Bind `addr` and start accepting connections
    pub async fn bind(addr: &str, sink: EventSink) -> Result<Self, ReceiverError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ReceiverError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "Socket receiver listening");

        let cancel = CancellationToken::new();
        let active = Arc::new(AtomicUsize::new(0));
        let accept_task = tokio::spawn(accept_loop(
            listener,
            sink,
            cancel.clone(),
            Arc::clone(&active),
        ));

        Ok(Self {
            local_addr,
            cancel,
            accept_task: Some(accept_task),
            active,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of connections currently open
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.accept_task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop accepting and close every connection
    pub fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.accept_task.take() {
            task.abort();
            info!(local_addr = %self.local_addr, "Socket receiver stopped");
        }
    }

    /// Stop and wait for the accept loop to wind down its connections
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.accept_task.take() {
            let _ = task.await;
            info!(local_addr = %self.local_addr, "Socket receiver stopped");
        }
    }
}

impl Drop for SocketReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn accept_loop(
    listener: TcpListener,
    sink: EventSink,
    cancel: CancellationToken,
    active: Arc<AtomicUsize>,
) {
    // Dropping the set on exit aborts any connection still being read
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            Some(_) = connections.join_next(), if !connections.is_empty() => {}

            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        active.fetch_add(1, Ordering::Relaxed);
                        let sink = sink.clone();
                        let cancel = cancel.child_token();
                        let active = Arc::clone(&active);
                        connections.spawn(async move {
                            read_connection(stream, peer, sink, cancel).await;
                            active.fetch_sub(1, Ordering::Relaxed);
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to accept connection");
                    }
                }
            }
        }
    }

    while connections.join_next().await.is_some() {}
}

async fn read_connection(
    stream: TcpStream,
    peer: SocketAddr,
    sink: EventSink,
    cancel: CancellationToken,
) {
    info!(%peer, "Connection accepted");
    let mut frames = FramedRead::new(stream, JsonLinesCodec::new());
    let mut received: u64 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            frame = frames.next() => {
                match frame {
                    Some(Ok(event)) => {
                        sink.publish(event);
                        received += 1;
                    }
                    Some(Err(e)) => {
                        warn!(%peer, error = %e, "Closing connection after read error");
                        break;
                    }
                    None => {
                        debug!(%peer, "Connection reached end of stream");
                        break;
                    }
                }
            }
        }
    }

    info!(%peer, received, "Connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::SinkExt;
    use logsaw_logs::EventContainer;
    use logsaw_types::{Level, LogEvent};
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio_util::codec::FramedWrite;

    async fn wait_for_rows(container: &EventContainer, rows: usize) {
        for _ in 0..200 {
            if container.row_count() >= rows {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn receiver() -> (SocketReceiver, EventContainer) {
        let container = EventContainer::new(false, 100).unwrap();
        let receiver = SocketReceiver::bind("127.0.0.1:0", EventSink::new(container.clone()))
            .await
            .unwrap();
        (receiver, container)
    }

    #[tokio::test]
    async fn test_receives_events_from_connection() {
        let (receiver, container) = receiver().await;

        let stream = TcpStream::connect(receiver.local_addr()).await.unwrap();
        let mut frames = FramedWrite::new(stream, JsonLinesCodec::new());
        for i in 0..3 {
            let event = LogEvent::new("remote", Level::Info, format!("event {}", i));
            frames.send(&event).await.unwrap();
        }

        wait_for_rows(&container, 3).await;
        let messages: Vec<String> = container
            .all_events()
            .iter()
            .map(|e| e.message.clone())
            .collect();
        assert_eq!(messages, vec!["event 0", "event 1", "event 2"]);

        receiver.shutdown().await;
    }

    #[tokio::test]
    async fn test_malformed_line_closes_only_that_connection() {
        let (receiver, container) = receiver().await;

        let mut bad = TcpStream::connect(receiver.local_addr()).await.unwrap();
        bad.write_all(b"{\"msg\":\"before\"}\nthis is not json\n{\"msg\":\"after\"}\n")
            .await
            .unwrap();
        wait_for_rows(&container, 1).await;

        let mut good = TcpStream::connect(receiver.local_addr()).await.unwrap();
        good.write_all(b"{\"msg\":\"second connection\"}\n")
            .await
            .unwrap();
        wait_for_rows(&container, 2).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let messages: Vec<String> = container
            .all_events()
            .iter()
            .map(|e| e.message.clone())
            .collect();
        assert_eq!(messages, vec!["before", "second connection"]);
        assert!(receiver.is_running());
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let (receiver, _container) = receiver().await;
        let addr = receiver.local_addr().to_string();

        let container = EventContainer::new(false, 10).unwrap();
        let result = SocketReceiver::bind(&addr, EventSink::new(container)).await;
        assert!(matches!(result, Err(ReceiverError::Bind { .. })));
    }
}
