use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{InvokeError, Payload, Publisher};

/// An event delivered by [`ChannelPublisher`].
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
  pub topic: String,
  pub payload: Payload,
}

/// Publishes events into an in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
  sender: mpsc::UnboundedSender<Message>,
}

impl ChannelPublisher {
  pub fn new() -> (Self, mpsc::UnboundedReceiver<Message>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self { sender }, receiver)
  }

  pub fn from_sender(sender: mpsc::UnboundedSender<Message>) -> Self {
    Self { sender }
  }
}

#[async_trait]
impl Publisher for ChannelPublisher {
  async fn publish(&self, topic: &str, payload: &Payload) -> Result<(), InvokeError> {
    self
      .sender
      .send(Message {
        topic: topic.to_string(),
        payload: payload.clone(),
      })
      .map_err(|_| InvokeError::Closed)
  }
}
