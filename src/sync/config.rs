use crate::client::DEFAULT_USER_AGENT;
use std::time::Duration;

/// Settings for a [`SyncListener`](super::SyncListener).
///
/// The defaults target the production messenger edge.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Chat endpoint, `ws` or `wss`. `region` and `sid` are appended.
    pub endpoint: String,
    /// GraphQL batch endpoint used to resolve the sync cursor.
    pub bootstrap_url: String,
    pub bootstrap_doc_id: String,
    pub origin: String,
    pub referer: String,
    pub user_agent: String,
    pub app_id: String,
    pub client_id: String,
    pub keep_alive: Duration,
    /// Origins whose cookies go into the handshake, in priority order.
    pub cookie_origins: Vec<String>,
    pub sync_api_version: u32,
    pub max_deltas_able_to_process: u32,
    pub delta_batch_size: u32,
    pub encoding: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            endpoint: "wss://edge-chat.messenger.com/chat".to_string(),
            bootstrap_url: "https://www.facebook.com/api/graphqlbatch/".to_string(),
            bootstrap_doc_id: "3336396659757871".to_string(),
            origin: "https://www.messenger.com".to_string(),
            referer: "https://www.messenger.com/".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            app_id: "219994525426954".to_string(),
            client_id: "mqttwsclient".to_string(),
            keep_alive: Duration::from_secs(10),
            cookie_origins: vec![
                "https://www.messenger.com/".to_string(),
                "https://www.facebook.com/".to_string(),
            ],
            sync_api_version: 10,
            max_deltas_able_to_process: 1000,
            delta_batch_size: 500,
            encoding: "JSON".to_string(),
        }
    }
}

impl ListenerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn bootstrap_url(mut self, url: impl Into<String>) -> Self {
        self.bootstrap_url = url.into();
        self
    }

    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
