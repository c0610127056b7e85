//! The adapter port: chat-provider drivers, and the manager that fans events
//! in from all of them. The registry is a `DashMap` keyed by adapter name:
//! insert-only at startup, read-only thereafter.

pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::template::OutputElements;

/// One event surfaced by an adapter's `Listen` loop.
#[derive(Clone, Debug)]
pub enum ProviderEvent {
    Connected,
    Disconnected,
    ConnectionError(String),
    AuthenticationError(String),
    ChannelMessage {
        channel_id: String,
        text: String,
        user_id: String,
        message_ref: String,
    },
    DirectMessage {
        channel_id: String,
        text: String,
        user_id: String,
        message_ref: String,
    },
    Error {
        code: i32,
        message: String,
    },
}

#[derive(Clone, Debug, Default)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    pub topic: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

/// `Adapter` port. One implementation per chat provider; the manager holds a
/// registry keyed by adapter name.
#[async_trait]
pub trait Adapter: Send + Sync {
    fn name(&self) -> &str;

    async fn listen(&self) -> Result<mpsc::Receiver<ProviderEvent>>;
    async fn send(&self, channel_id: &str, elements: &OutputElements) -> Result<()>;
    async fn send_text(&self, channel_id: &str, message: &str) -> Result<()>;
    async fn send_error(&self, channel_id: &str, title: &str, err: &str) -> Result<()>;
    async fn react(&self, message_ref: &str, emoji: &str) -> Result<()>;
    async fn reply(&self, message_ref: &str, content: &str) -> Result<()>;
    async fn get_channel_info(&self, channel_id: &str) -> Result<ChannelInfo>;
    async fn get_present_channels(&self) -> Result<Vec<ChannelInfo>>;
    async fn get_user_info(&self, user_id: &str) -> Result<UserInfo>;
}

/// Registry of installed adapters: insert-only during startup, read-only
/// thereafter.
#[derive(Clone, Default)]
pub struct AdapterManager {
    adapters: Arc<DashMap<String, Arc<dyn Adapter>>>,
}

impl AdapterManager {
    pub fn new() -> Self {
        Self {
            adapters: Arc::new(DashMap::new()),
        }
    }

    pub fn install(&self, adapter: Arc<dyn Adapter>) {
        self.adapters.insert(adapter.name().to_owned(), adapter);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(name).map(|entry| entry.clone())
    }

    pub fn names(&self) -> Vec<String> {
        self.adapters.iter().map(|entry| entry.key().clone()).collect()
    }
}
