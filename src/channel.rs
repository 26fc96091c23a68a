use std::future::Future;
use std::time::Duration;

use crate::error::SendError;
use crate::models::Channel;
use crate::template::RenderedMessage;

/// Outbound email/SMS transport. Implementations only report whether the
/// provider accepted the message.
pub trait SendChannel: Send + Sync {
    fn send(
        &self,
        channel: Channel,
        destination: &str,
        message: &RenderedMessage,
    ) -> impl Future<Output = Result<(), SendError>> + Send;
}

/// Stand-in transport that waits a fixed latency and accepts any
/// well-formed destination.
#[derive(Debug, Clone)]
pub struct SimulatedChannel {
    latency: Duration,
}

impl SimulatedChannel {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl SendChannel for SimulatedChannel {
    async fn send(
        &self,
        channel: Channel,
        destination: &str,
        message: &RenderedMessage,
    ) -> Result<(), SendError> {
        tokio::time::sleep(self.latency).await;

        if destination.is_empty() {
            return Err(SendError::MissingDestination(channel));
        }
        if channel == Channel::Email && !destination.contains('@') {
            return Err(SendError::Rejected(format!("invalid email address {destination}")));
        }

        tracing::info!(
            channel = %channel,
            to = destination,
            subject = message.subject.as_deref().unwrap_or(""),
            chars = message.body.chars().count(),
            "message handed to provider"
        );
        Ok(())
    }
}
