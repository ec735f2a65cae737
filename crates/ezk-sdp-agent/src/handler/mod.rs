//! Media handlers build and interpret single media descriptions

use crate::sdp::{media_description, MediaDescriptionExt};
use crate::{Error, Result};
use downcast_rs::{impl_downcast, Downcast};
use sdp_types::{MediaDescription, MediaType, TransportProtocol, UnknownAttribute};

mod rtp;
mod sctp;

pub use rtp::{RtpMediaHandler, RtpProfile};
pub use sctp::SctpMediaHandler;

/// Attributes describing transport or identity of the offerer which must never be copied into an answer
const NOT_COPIED: &[&str] = &[
    "mid",
    "setup",
    "extmap",
    "rtcp-fb",
    "rtcp-mux",
    "ice-options",
    "fingerprint",
    "ssrc",
    "ssrc-group",
    "msid",
];

/// Builds and interprets the `m=` lines of a single media stream
///
/// The provided methods drive the offer/answer construction, implementations customize the
/// individual steps. Handlers are stored type-erased inside the [`SdpAgent`](crate::SdpAgent)
/// and can be accessed again by downcasting.
pub trait MediaHandler: Downcast + Send {
    /// Protocol used in fresh offers
    fn protocol(&self) -> TransportProtocol;

    fn supports_media(&self, media_type: &MediaType) -> bool;

    fn manage_protocol(&self, proto: &TransportProtocol) -> bool;

    /// Create the `m=` line of an offer
    ///
    /// `previous` is the last media description emitted for this handler, port, protocol and
    /// number of ports are taken from it unchanged.
    fn init_offer(
        &mut self,
        media_type: &MediaType,
        previous: Option<&MediaDescription>,
    ) -> Result<MediaDescription> {
        if !self.supports_media(media_type) {
            return Err(Error::InvalidMedia(*media_type));
        }

        init_offer_media(self.protocol(), media_type, previous)
    }

    fn add_offer_attributes(
        &mut self,
        media: &mut MediaDescription,
        previous: Option<&MediaDescription>,
    ) -> Result<()>;

    /// Create the `m=` line of an answer, the port is decided by [`MediaHandler::add_answer_attributes`]
    fn init_answer(&mut self, offer: &MediaDescription) -> Result<MediaDescription> {
        if !self.supports_media(&offer.media.media_type) {
            return Err(Error::InvalidMedia(offer.media.media_type));
        }

        if !self.manage_protocol(&offer.media.proto) {
            return Err(Error::InvalidProtocol(offer.media.proto.clone()));
        }

        Ok(init_answer_media(offer))
    }

    /// Intersect the offered formats with the local ones
    ///
    /// An empty intersection must set the answer's port to zero.
    fn add_answer_attributes(
        &mut self,
        offer: &MediaDescription,
        answer: &mut MediaDescription,
    ) -> Result<()>;

    /// Filter for offered attributes which are copied verbatim into the answer
    fn can_insert_attribute(
        &self,
        _offer: &MediaDescription,
        attribute: &UnknownAttribute,
        answer: &MediaDescription,
    ) -> bool {
        can_insert_attribute(attribute, answer)
    }

    fn create_offer(
        &mut self,
        media_type: &MediaType,
        previous: Option<&MediaDescription>,
    ) -> Result<MediaDescription> {
        let mut media = self.init_offer(media_type, previous)?;
        self.add_offer_attributes(&mut media, previous)?;
        Ok(media)
    }

    fn create_answer(&mut self, offer: &MediaDescription) -> Result<MediaDescription> {
        let mut answer = self.init_answer(offer)?;
        self.add_answer_attributes(offer, &mut answer)?;

        if !answer.is_rejected() {
            self.intersect_sdp_medias(offer, &mut answer);
        }

        Ok(answer)
    }

    fn intersect_sdp_medias(&self, offer: &MediaDescription, answer: &mut MediaDescription) {
        let accepted: Vec<UnknownAttribute> = offer
            .attributes
            .iter()
            .filter(|attribute| self.can_insert_attribute(offer, attribute, answer))
            .cloned()
            .collect();

        answer.attributes.extend(accepted);
    }
}

impl_downcast!(MediaHandler);

/// Common part of [`MediaHandler::init_offer`]
pub fn init_offer_media(
    protocol: TransportProtocol,
    media_type: &MediaType,
    previous: Option<&MediaDescription>,
) -> Result<MediaDescription> {
    let Some(previous) = previous else {
        return Ok(media_description(*media_type, 1, protocol));
    };

    if previous.media.media_type != *media_type {
        return Err(Error::InvalidMedia(previous.media.media_type));
    }

    let mut media = media_description(*media_type, previous.media.port, previous.media.proto.clone());
    media.media.ports_num = previous.media.ports_num;

    Ok(media)
}

pub fn init_answer_media(offer: &MediaDescription) -> MediaDescription {
    media_description(offer.media.media_type, 0, offer.media.proto.clone())
}

/// Default filter of [`MediaHandler::can_insert_attribute`]
///
/// Rejects identity and transport attributes, attributes synthesized from the negotiated
/// formats and everything already present in the answer.
pub fn can_insert_attribute(attribute: &UnknownAttribute, answer: &MediaDescription) -> bool {
    !NOT_COPIED.contains(&attribute.name.as_str()) && !answer.has_attribute(&attribute.name)
}

/// Create a handler for an offered protocol, testing the most specific protocol first
pub fn handler_for_protocol(proto: &TransportProtocol) -> Option<Box<dyn MediaHandler>> {
    let candidates: [Box<dyn MediaHandler>; 5] = [
        Box::new(RtpMediaHandler::savpf()),
        Box::new(RtpMediaHandler::avpf()),
        Box::new(RtpMediaHandler::savp()),
        Box::new(RtpMediaHandler::avp()),
        Box::new(SctpMediaHandler::new()),
    ];

    candidates
        .into_iter()
        .find(|handler| handler.manage_protocol(proto))
}
