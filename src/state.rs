use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::models::{Channel, Message};
use crate::services::messaging::MessagingProvider;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub sms: Box<dyn MessagingProvider>,
    pub whatsapp: Box<dyn MessagingProvider>,
    pub message_tx: broadcast::Sender<Message>,
}

impl AppState {
    /// Locks the shared connection. A poisoned lock still holds a usable
    /// connection since every write is a single statement or transaction.
    pub fn db(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn provider(&self, channel: Channel) -> &dyn MessagingProvider {
        match channel {
            Channel::Sms => self.sms.as_ref(),
            Channel::Whatsapp => self.whatsapp.as_ref(),
        }
    }
}
