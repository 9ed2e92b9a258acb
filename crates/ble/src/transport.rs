use crate::error::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

/// Raw notification payloads from the station, in arrival order.
pub type NotificationStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// A link that carries frames to the station and notifications back.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write one complete frame to the command characteristic
    async fn write(&self, frame: &[u8]) -> Result<()>;

    /// Stream of notification payloads. Called once per session.
    async fn notifications(&self) -> Result<NotificationStream>;

    async fn disconnect(&self) -> Result<()>;

    async fn is_connected(&self) -> bool;
}

/// Lets a caller keep a handle on the link while a session owns it.
#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn write(&self, frame: &[u8]) -> Result<()> {
        (**self).write(frame).await
    }

    async fn notifications(&self) -> Result<NotificationStream> {
        (**self).notifications().await
    }

    async fn disconnect(&self) -> Result<()> {
        (**self).disconnect().await
    }

    async fn is_connected(&self) -> bool {
        (**self).is_connected().await
    }
}
