//! Application state shared across peers

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::Config;
use crate::game::peer::PeerSettings;
use crate::game::{EntityDirectory, Peer};
use crate::net::transport::bus;
use crate::net::ChannelTransport;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub directory: Arc<EntityDirectory>,
    pub bus: broadcast::Sender<Bytes>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            directory: Arc::new(EntityDirectory::new()),
            bus: bus(),
        }
    }

    /// Create a peer connected to the session bus and directory
    pub fn connect_peer(&self) -> Peer {
        Peer::new(
            Uuid::new_v4(),
            PeerSettings::from_config(&self.config),
            self.directory.clone(),
            Box::new(ChannelTransport::connect(&self.bus)),
        )
    }
}
