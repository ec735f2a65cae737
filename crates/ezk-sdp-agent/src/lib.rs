//! # SDP offer/answer negotiation
//!
//! [`SdpAgent`] drives RFC 3264 negotiations. It owns a set of [`MediaHandler`]s, one per
//! media stream, and keeps every handler at the same `m=` line position for the lifetime
//! of the session. Handlers build and interpret the individual media descriptions:
//!
//! - [`RtpMediaHandler`] for the RTP profiles `RTP/AVP`, `RTP/SAVP`, `RTP/AVPF` and `UDP/TLS/RTP/SAVPF`
//! - [`SctpMediaHandler`] for SCTP data channels
//!
//! Dynamic RTP payload types are allocated by a [`PayloadManager`] which can be shared
//! between handlers of the same session.
//!
//! ```
//! use ezk_sdp_agent::{codecs, PayloadManager, RtpMediaHandler, SdpAgent, SdpAgentConfig};
//! use ezk_sdp_agent::sdp_types::MediaType;
//! use std::net::Ipv4Addr;
//!
//! let mut agent = SdpAgent::new(Ipv4Addr::LOCALHOST.into(), SdpAgentConfig::default());
//!
//! let mut audio = RtpMediaHandler::avp().with_payload_manager(PayloadManager::shared());
//! audio.add_audio_codec(codecs::OPUS)?;
//! audio.add_audio_codec(codecs::PCMU)?;
//!
//! agent.add_proto_handler(MediaType::Audio, Box::new(audio))?;
//!
//! let offer = agent.create_offer()?;
//! agent.set_local_description(&offer)?;
//! # Ok::<(), ezk_sdp_agent::Error>(())
//! ```

pub use sdp_types;

mod agent;
pub mod codecs;
mod config;
mod error;
mod group;
mod handler;
mod payload;
pub mod sdp;

pub use agent::{AgentCallbacks, GroupId, HandlerId, NegotiationState, NoCallbacks, SdpAgent};
pub use config::SdpAgentConfig;
pub use error::{Error, Result};
pub use group::{Group, GroupSemantics};
pub use handler::{
    can_insert_attribute, handler_for_protocol, init_answer_media, init_offer_media,
    MediaHandler, RtpMediaHandler, RtpProfile, SctpMediaHandler,
};
pub use payload::{PayloadManager, SharedPayloadManager, DYNAMIC_PAYLOAD_TYPES};
