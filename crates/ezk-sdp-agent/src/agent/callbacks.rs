use crate::{HandlerId, MediaHandler};
use sdp_types::MediaDescription;

/// Hooks into the negotiation, implemented by the embedding endpoint
///
/// All methods have a no-op default.
pub trait AgentCallbacks: Send {
    /// Called for offered media no local handler exists for
    ///
    /// Returning a handler adds it to the agent. The number of handlers created this way is
    /// bounded per media type by [`SdpAgentConfig::handler_limits`](crate::SdpAgentConfig::handler_limits).
    fn on_handler_required(&mut self, media: &MediaDescription) -> Option<Box<dyn MediaHandler>> {
        let _ = media;
        None
    }

    /// A media description of a local offer was created, it may still be modified
    fn on_media_offer(&mut self, handler: HandlerId, media: &mut MediaDescription) {
        let _ = (handler, media);
    }

    /// A media description of a local answer was created, it may still be modified
    fn on_media_answer(&mut self, handler: HandlerId, media: &mut MediaDescription) {
        let _ = (handler, media);
    }

    /// Negotiation of a media completed, `media` is the media description of the answer
    fn on_media_answered(&mut self, handler: HandlerId, media: &MediaDescription, local_offerer: bool) {
        let _ = (handler, media, local_offerer);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoCallbacks;

impl AgentCallbacks for NoCallbacks {}
