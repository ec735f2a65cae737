use std::fmt;

/// State of the offer/answer negotiation
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    #[default]
    Unnegotiated,
    /// A local offer was created but not yet set as local description
    LocalOffer,
    /// A remote offer was received and must be answered
    RemoteOffer,
    /// The local offer was committed, waiting for the remote answer
    WaitNego,
    Negotiated,
}

impl NegotiationState {
    /// A negotiation is in progress, handlers and groups must not be modified
    pub fn is_outstanding(self) -> bool {
        matches!(self, Self::LocalOffer | Self::RemoteOffer | Self::WaitNego)
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unnegotiated => "unnegotiated",
            Self::LocalOffer => "local-offer",
            Self::RemoteOffer => "remote-offer",
            Self::WaitNego => "wait-nego",
            Self::Negotiated => "negotiated",
        })
    }
}
