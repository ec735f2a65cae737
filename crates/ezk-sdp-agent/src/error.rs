use crate::NegotiationState;
use sdp_types::{MediaType, ParseSessionDescriptionError, TransportProtocol};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseSessionDescriptionError),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("media type {0} is not supported")]
    InvalidMedia(MediaType),
    #[error("protocol {0} is not managed")]
    InvalidProtocol(TransportProtocol),
    #[error("{operation} is not allowed in state {state}")]
    InvalidTransition {
        operation: &'static str,
        state: NegotiationState,
    },
    #[error("negotiation already completed")]
    AlreadyNegotiated,
    #[error("dynamic payload types exhausted")]
    Exhausted,
    #[error("unexpected: {0}")]
    Unexpected(&'static str),
}

impl Error {
    pub(crate) fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}
