use sdp_types::MediaType;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct SdpAgentConfig {
    pub username: String,
    pub session_name: String,
    /// Maximum number of handlers that may be created through
    /// [`AgentCallbacks::on_handler_required`](crate::AgentCallbacks::on_handler_required)
    /// per media type. Media types without an entry are unbounded.
    pub handler_limits: HashMap<MediaType, usize>,
}

impl Default for SdpAgentConfig {
    fn default() -> Self {
        Self {
            username: "-".into(),
            session_name: "-".into(),
            handler_limits: HashMap::new(),
        }
    }
}

impl SdpAgentConfig {
    pub fn with_handler_limit(mut self, media_type: MediaType, limit: usize) -> Self {
        self.handler_limits.insert(media_type, limit);
        self
    }

    pub(crate) fn handler_limit(&self, media_type: &MediaType) -> usize {
        self.handler_limits
            .get(media_type)
            .copied()
            .unwrap_or(usize::MAX)
    }
}
