//! In-process [`Transport`] driven by a responder function.
//!
//! Stands in for a station in tests of code built on [`StationSession`].
//!
//! [`StationSession`]: crate::StationSession

use crate::error::{BleError, Result};
use crate::transport::{NotificationStream, Transport};
use async_trait::async_trait;
use futures::stream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;

type Responder = Box<dyn Fn(&[u8]) -> Vec<Vec<u8>> + Send + Sync>;

/// Answers each written frame with the notification chunks the responder
/// returns for it.
pub struct MemoryTransport {
    connected: AtomicBool,
    tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
    written: Mutex<Vec<Vec<u8>>>,
    responder: Responder,
}

impl MemoryTransport {
    pub fn new(responder: impl Fn(&[u8]) -> Vec<Vec<u8>> + Send + Sync + 'static) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            connected: AtomicBool::new(true),
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(Some(rx)),
            written: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        }
    }

    /// A station that never answers
    pub fn silent() -> Self {
        Self::new(|_| Vec::new())
    }

    /// Every frame written so far
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Push an unsolicited notification
    pub fn notify(&self, chunk: Vec<u8>) {
        if let Some(tx) = self.tx.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            let _ = tx.send(chunk);
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn write(&self, frame: &[u8]) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BleError::NotConnected);
        }
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(frame.to_vec());
        for chunk in (self.responder)(frame) {
            self.notify(chunk);
        }
        Ok(())
    }

    async fn notifications(&self) -> Result<NotificationStream> {
        let rx = self
            .rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(BleError::StreamClosed)?;
        let notifications = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (chunk, rx))
        });
        Ok(Box::pin(notifications))
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_echo_responder() {
        let transport = MemoryTransport::new(|frame| vec![frame.to_vec()]);
        let mut notifications = transport.notifications().await.unwrap();

        transport.write(&[0x87, 0]).await.unwrap();
        assert_eq!(notifications.next().await, Some(vec![0x87, 0]));
        assert_eq!(transport.written(), vec![vec![0x87, 0]]);
    }

    #[tokio::test]
    async fn test_disconnect_ends_stream_and_rejects_writes() {
        let transport = MemoryTransport::silent();
        let mut notifications = transport.notifications().await.unwrap();

        transport.disconnect().await.unwrap();
        assert!(!transport.is_connected().await);
        assert_eq!(notifications.next().await, None);
        assert!(matches!(
            transport.write(&[0x87, 0]).await,
            Err(BleError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_notifications_taken_once() {
        let transport = MemoryTransport::silent();
        assert!(transport.notifications().await.is_ok());
        assert!(matches!(
            transport.notifications().await,
            Err(BleError::StreamClosed)
        ));
    }
}
