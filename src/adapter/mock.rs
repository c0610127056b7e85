//! An in-process `Adapter` for tests and local development, recording
//! everything sent to it instead of talking to a real chat provider.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::adapter::{Adapter, ChannelInfo, ProviderEvent, UserInfo};
use crate::error::Result;
use crate::template::OutputElements;

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Structured { channel_id: String, elements: OutputElements },
    Text { channel_id: String, message: String },
    Error { channel_id: String, title: String, err: String },
}

pub struct MockAdapter {
    name: String,
    events: Mutex<Vec<ProviderEvent>>,
    sent: Mutex<Vec<Sent>>,
}

impl MockAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn push_event(&self, event: ProviderEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn listen(&self) -> Result<mpsc::Receiver<ProviderEvent>> {
        let (tx, rx) = mpsc::channel(self.events.lock().unwrap().len().max(1));
        for event in self.events.lock().unwrap().drain(..) {
            tx.send(event).await.ok();
        }
        Ok(rx)
    }

    async fn send(&self, channel_id: &str, elements: &OutputElements) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Structured {
            channel_id: channel_id.to_owned(),
            elements: elements.clone(),
        });
        Ok(())
    }

    async fn send_text(&self, channel_id: &str, message: &str) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Text {
            channel_id: channel_id.to_owned(),
            message: message.to_owned(),
        });
        Ok(())
    }

    async fn send_error(&self, channel_id: &str, title: &str, err: &str) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Error {
            channel_id: channel_id.to_owned(),
            title: title.to_owned(),
            err: err.to_owned(),
        });
        Ok(())
    }

    async fn react(&self, _message_ref: &str, _emoji: &str) -> Result<()> {
        Ok(())
    }

    async fn reply(&self, message_ref: &str, content: &str) -> Result<()> {
        self.send_text(message_ref, content).await
    }

    async fn get_channel_info(&self, channel_id: &str) -> Result<ChannelInfo> {
        Ok(ChannelInfo {
            id: channel_id.to_owned(),
            name: channel_id.to_owned(),
            topic: None,
        })
    }

    async fn get_present_channels(&self) -> Result<Vec<ChannelInfo>> {
        Ok(Vec::new())
    }

    async fn get_user_info(&self, user_id: &str) -> Result<UserInfo> {
        Ok(UserInfo {
            id: user_id.to_owned(),
            name: user_id.to_owned(),
            email: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_sent_text() {
        let adapter = MockAdapter::new("mock");
        adapter.send_text("general", "hello").await.unwrap();
        assert_eq!(
            adapter.sent(),
            vec![Sent::Text {
                channel_id: "general".to_owned(),
                message: "hello".to_owned()
            }]
        );
    }

    #[tokio::test]
    async fn replays_pushed_events() {
        let adapter = MockAdapter::new("mock");
        adapter.push_event(ProviderEvent::Connected);
        let mut rx = adapter.listen().await.unwrap();
        assert!(matches!(rx.recv().await, Some(ProviderEvent::Connected)));
    }
}
