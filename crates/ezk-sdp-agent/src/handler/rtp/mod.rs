use self::formats::{needs_rtpmap, Formats, RtpFormat};
use super::{init_offer_media, MediaHandler};
use crate::codecs::{find_static_pt, static_encoding, FIRST_VIDEO_STATIC_PT};
use crate::payload::{SharedPayloadManager, DYNAMIC_PAYLOAD_TYPES};
use crate::sdp::{
    encoding_name, intersect_direction, property_attribute, protocol, protocol_name,
    rtpmap_from_encoding_name, typed, AttributeValue, ExtMap, MediaDescriptionExt, RtcpFeedback,
    Setup,
};
use crate::{Error, Result};
use sdp_types::{Bandwidth, Direction, Fmtp, MediaDescription, MediaType, TransportProtocol};

mod formats;

const DEFAULT_VIDEO_FEEDBACK: [&str; 4] = ["nack", "nack pli", "ccm fir", "goog-remb"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RtpProfile {
    Avp,
    Savp,
    Avpf,
    Savpf,
}

impl RtpProfile {
    /// Protocol used in fresh offers
    pub fn offer_protocol(self) -> TransportProtocol {
        match self {
            Self::Avp => TransportProtocol::RtpAvp,
            Self::Savp => TransportProtocol::RtpSavp,
            Self::Avpf => protocol("RTP/AVPF"),
            Self::Savpf => protocol("UDP/TLS/RTP/SAVPF"),
        }
    }

    fn base_protocol(self) -> &'static str {
        match self {
            Self::Avp => "RTP/AVP",
            Self::Savp => "RTP/SAVP",
            Self::Avpf => "RTP/AVPF",
            Self::Savpf => "RTP/SAVPF",
        }
    }

    /// Secure profiles accept an optional `UDP/TLS/` prefix, plain profiles only the exact token
    pub fn manages(self, proto: &TransportProtocol) -> bool {
        let proto = protocol_name(proto);

        match self {
            Self::Avp | Self::Avpf => proto == self.base_protocol(),
            Self::Savp | Self::Savpf => {
                proto.strip_prefix("UDP/TLS/").unwrap_or(proto) == self.base_protocol()
            }
        }
    }

    pub fn has_feedback(self) -> bool {
        matches!(self, Self::Avpf | Self::Savpf)
    }
}

/// Media handler for RTP audio & video
///
/// Codecs are registered per media type. Codecs found in the RFC 3551 table use their static
/// payload type, all others are assigned a dynamic one by the configured payload manager.
#[derive(Debug)]
pub struct RtpMediaHandler {
    profile: RtpProfile,
    formats: Formats,
    extmaps: Vec<ExtMap>,
    payloads: Option<SharedPayloadManager>,
    rtcp_mux: bool,
    direction: Direction,
    bandwidth: Vec<Bandwidth>,
    feedback: Vec<String>,
}

impl RtpMediaHandler {
    pub fn new(profile: RtpProfile) -> Self {
        let feedback = if profile.has_feedback() {
            DEFAULT_VIDEO_FEEDBACK.into_iter().map(String::from).collect()
        } else {
            vec![]
        };

        Self {
            profile,
            formats: Formats::default(),
            extmaps: vec![],
            payloads: None,
            rtcp_mux: true,
            direction: Direction::SendRecv,
            bandwidth: vec![],
            feedback,
        }
    }

    pub fn avp() -> Self {
        Self::new(RtpProfile::Avp)
    }

    pub fn savp() -> Self {
        Self::new(RtpProfile::Savp)
    }

    pub fn avpf() -> Self {
        Self::new(RtpProfile::Avpf)
    }

    pub fn savpf() -> Self {
        Self::new(RtpProfile::Savpf)
    }

    pub fn profile(&self) -> RtpProfile {
        self.profile
    }

    pub fn use_payload_manager(&mut self, payloads: SharedPayloadManager) {
        self.payloads = Some(payloads);
    }

    pub fn with_payload_manager(mut self, payloads: SharedPayloadManager) -> Self {
        self.use_payload_manager(payloads);
        self
    }

    /// Register an audio codec by its `name/clock_rate[/channels]`, returns the payload type
    pub fn add_audio_codec(&mut self, encoding_name: &str) -> Result<u8> {
        self.add_format(MediaType::Audio, encoding_name, false)
    }

    pub fn add_video_codec(&mut self, encoding_name: &str) -> Result<u8> {
        self.add_format(MediaType::Video, encoding_name, false)
    }

    /// Register an audio payload format without codec validation (e.g. `red/48000/2`)
    pub fn add_generic_audio_payload(&mut self, format: &str) -> Result<u8> {
        self.add_format(MediaType::Audio, format, true)
    }

    pub fn add_generic_video_payload(&mut self, format: &str) -> Result<u8> {
        self.add_format(MediaType::Video, format, true)
    }

    fn add_format(&mut self, media_type: MediaType, encoding_name: &str, generic: bool) -> Result<u8> {
        if rtpmap_from_encoding_name(0, encoding_name).is_none() {
            return Err(Error::invalid_parameter(format!(
                "malformed encoding name {encoding_name:?}"
            )));
        }

        if self.formats.position(&media_type, encoding_name).is_some() {
            return Err(Error::invalid_parameter(format!(
                "{encoding_name} is already registered for {media_type}"
            )));
        }

        let (pt, dynamic) = match find_static_pt(encoding_name) {
            Some(pt) => {
                let audio_pt = pt < FIRST_VIDEO_STATIC_PT;

                if !generic && audio_pt != (media_type == MediaType::Audio) {
                    return Err(Error::invalid_parameter(format!(
                        "static payload type {pt} of {encoding_name} cannot be used for {media_type}"
                    )));
                }

                if self.formats.by_pt(pt).is_some() {
                    return Err(Error::invalid_parameter(format!(
                        "static payload type {pt} is already in use"
                    )));
                }

                (pt, false)
            }
            None => {
                let payloads = self.payloads.as_ref().ok_or_else(|| {
                    Error::invalid_parameter(format!(
                        "no payload manager to assign a payload type to {encoding_name}"
                    ))
                })?;

                (payloads.lock().get_dynamic_pt(encoding_name)?, true)
            }
        };

        let rtpmap = rtpmap_from_encoding_name(pt, encoding_name)
            .ok_or(Error::Unexpected("encoding name was validated"))?;

        self.formats.push(RtpFormat {
            rtpmap,
            media_type,
            dynamic,
            generic,
            fmtp: None,
        });

        Ok(pt)
    }

    pub fn payload_type(&self, media_type: &MediaType, encoding_name: &str) -> Option<u8> {
        let index = self.formats.position(media_type, encoding_name)?;
        self.formats.get(index).map(RtpFormat::pt)
    }

    pub fn add_extmap(&mut self, id: u16, uri: impl Into<String>) -> Result<()> {
        if !(1..=255).contains(&id) {
            return Err(Error::invalid_parameter(format!("invalid extmap id {id}")));
        }

        if self.extmaps.iter().any(|extmap| extmap.id == id) {
            return Err(Error::invalid_parameter(format!(
                "extmap id {id} is already registered"
            )));
        }

        self.extmaps.push(ExtMap {
            id,
            direction: None,
            uri: uri.into(),
            attributes: None,
        });

        Ok(())
    }

    pub fn add_fmtp(&mut self, pt: u8, params: impl Into<String>) -> Result<()> {
        let format = self
            .formats
            .by_pt_mut(pt)
            .ok_or_else(|| Error::invalid_parameter(format!("unknown payload type {pt}")))?;

        format.fmtp = Some(params.into());

        Ok(())
    }

    pub fn set_rtcp_mux(&mut self, rtcp_mux: bool) {
        self.rtcp_mux = rtcp_mux;
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    /// Add a `b=` line to offers and accepted answers
    pub fn add_bandwidth(&mut self, type_: &str, bandwidth: u32) {
        self.bandwidth.push(Bandwidth {
            type_: type_.into(),
            bandwidth,
        });
    }

    /// Replace the RTCP feedback offered for video payloads and accepted in answers
    pub fn set_rtcp_feedback<I, S>(&mut self, feedback: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feedback = feedback.into_iter().map(Into::into).collect();
    }

    fn supports_feedback(&self, value: &str) -> bool {
        self.profile.has_feedback() && self.feedback.iter().any(|fb| fb == value)
    }

    /// Formats of the previous media description which are still supported
    ///
    /// Formats are matched by encoding and keep the payload type of the previous media
    /// description, which may differ from the local one if the peer chose it.
    fn remaining_formats(&self, media_type: &MediaType, previous: &MediaDescription) -> Vec<(u8, usize)> {
        previous
            .media
            .fmts
            .iter()
            .filter_map(|&pt| {
                let encoding = offered_encoding(previous, pt)?;
                let index = self.formats.position(media_type, &encoding)?;

                Some((pt, index))
            })
            .collect()
    }

    fn push_format_attributes(&self, media: &mut MediaDescription, pt: u8, format: &RtpFormat) {
        if needs_rtpmap(pt, &format.encoding_name()) {
            media.rtpmaps.push(format.rtpmap_with_pt(pt));
        }

        if let Some(params) = &format.fmtp {
            media.fmtps.push(Fmtp {
                format: pt,
                params: params.as_str().into(),
            });
        }

        if self.profile.has_feedback() && format.media_type == MediaType::Video && !format.generic {
            for value in &self.feedback {
                let feedback = RtcpFeedback {
                    payload: Some(pt),
                    value: value.clone(),
                };

                media.attributes.push(feedback.to_attribute());
            }
        }
    }

    /// Remember the peer's payload type of a dynamic codec and adopt it if possible
    fn bind_offered_pt(&mut self, index: usize, offered_pt: u8) -> Result<()> {
        let Some(format) = self.formats.get(index) else {
            return Ok(());
        };

        if !format.dynamic {
            return Ok(());
        }

        let encoding_name = format.encoding_name();
        let local_pt = format.pt();

        if !DYNAMIC_PAYLOAD_TYPES.contains(&offered_pt) {
            log::debug!("peer uses payload type {offered_pt} for {encoding_name}, outside the dynamic range");
            return Ok(());
        }

        if let Some(payloads) = &self.payloads {
            payloads.lock().register_dynamic_pt(offered_pt, &encoding_name)?;
        }

        if local_pt == offered_pt {
            return Ok(());
        }

        if self.formats.by_pt(offered_pt).is_some() {
            log::debug!("payload type {offered_pt} is taken locally, {encoding_name} keeps {local_pt}");
            return Ok(());
        }

        log::debug!("rebinding {encoding_name} from payload type {local_pt} to {offered_pt}");

        if let Some(format) = self.formats.get_mut(index) {
            format.rtpmap.payload = offered_pt;
        }

        Ok(())
    }
}

impl MediaHandler for RtpMediaHandler {
    fn protocol(&self) -> TransportProtocol {
        self.profile.offer_protocol()
    }

    fn supports_media(&self, media_type: &MediaType) -> bool {
        matches!(media_type, MediaType::Audio | MediaType::Video)
    }

    fn manage_protocol(&self, proto: &TransportProtocol) -> bool {
        self.profile.manages(proto)
    }

    fn init_offer(
        &mut self,
        media_type: &MediaType,
        previous: Option<&MediaDescription>,
    ) -> Result<MediaDescription> {
        if !self.supports_media(media_type) {
            return Err(Error::InvalidMedia(*media_type));
        }

        let mut media = init_offer_media(self.protocol(), media_type, previous)?;

        let setup = previous
            .and_then(|previous| typed::<Setup>(&previous.attributes).next())
            .unwrap_or(Setup::ActPass);

        media.attributes.push(setup.to_attribute());

        Ok(media)
    }

    fn add_offer_attributes(
        &mut self,
        media: &mut MediaDescription,
        previous: Option<&MediaDescription>,
    ) -> Result<()> {
        let media_type = media.media.media_type;

        let formats: Vec<(u8, usize)> = match previous {
            Some(previous) => self.remaining_formats(&media_type, previous),
            None => self
                .formats
                .indexed(&media_type)
                .map(|(index, format)| (format.pt(), index))
                .collect(),
        };

        if formats.is_empty() {
            log::debug!("no {media_type} formats left to offer, disabling media");

            media.media.port = 0;
            media.media.fmts = previous
                .map(|previous| previous.media.fmts.clone())
                .unwrap_or_default();

            return Ok(());
        }

        media.media.fmts = formats.iter().map(|(pt, _)| *pt).collect();

        for (pt, index) in formats {
            if let Some(format) = self.formats.get(index) {
                self.push_format_attributes(media, pt, format);
            }
        }

        for extmap in &self.extmaps {
            media.attributes.push(extmap.to_attribute());
        }

        if self.rtcp_mux {
            media.attributes.push(property_attribute("rtcp-mux"));
        }

        media.direction = self.direction;
        media.bandwidth.clone_from(&self.bandwidth);

        Ok(())
    }

    fn add_answer_attributes(
        &mut self,
        offer: &MediaDescription,
        answer: &mut MediaDescription,
    ) -> Result<()> {
        let media_type = &offer.media.media_type;

        // (offered payload type, index of the local format)
        let mut accepted: Vec<(u8, usize)> = vec![];

        for &pt in &offer.media.fmts {
            if accepted.iter().any(|(accepted_pt, _)| *accepted_pt == pt) {
                continue;
            }

            let Some(encoding_name) = offered_encoding(offer, pt) else {
                log::trace!("offered payload type {pt} has no known encoding");
                continue;
            };

            let Some(index) = self.formats.position(media_type, &encoding_name) else {
                continue;
            };

            if !accepted.iter().any(|(_, i)| *i == index) {
                self.bind_offered_pt(index, pt)?;
            }

            accepted.push((pt, index));
        }

        if accepted.is_empty() {
            log::debug!("no common {media_type} formats, rejecting media");

            answer.media.port = 0;
            answer.media.fmts.clone_from(&offer.media.fmts);

            return Ok(());
        }

        answer.media.port = 1;
        answer.media.fmts = accepted.iter().map(|(pt, _)| *pt).collect();

        if let Some(setup) = typed::<Setup>(&offer.attributes).next() {
            answer.attributes.push(setup.answer().to_attribute());
        }

        let offered_feedback: Vec<RtcpFeedback> = typed(&offer.attributes).collect();

        for &(pt, index) in &accepted {
            if let Some(rtpmap) = offer.rtpmap(pt) {
                if needs_rtpmap(pt, &encoding_name(rtpmap)) {
                    answer.rtpmaps.push(rtpmap.clone());
                }
            }

            let local_fmtp = self.formats.get(index).and_then(|format| format.fmtp.as_deref());

            match local_fmtp {
                Some(params) => answer.fmtps.push(Fmtp {
                    format: pt,
                    params: params.into(),
                }),
                None => answer
                    .fmtps
                    .extend(offer.fmtps.iter().filter(|fmtp| fmtp.format == pt).cloned()),
            }

            for feedback in &offered_feedback {
                if feedback.payload == Some(pt) && self.supports_feedback(&feedback.value) {
                    answer.attributes.push(feedback.to_attribute());
                }
            }
        }

        for feedback in &offered_feedback {
            if feedback.payload.is_none() && self.supports_feedback(&feedback.value) {
                answer.attributes.push(feedback.to_attribute());
            }
        }

        for extmap in typed::<ExtMap>(&offer.attributes) {
            if self.extmaps.iter().any(|local| local.uri == extmap.uri) {
                let extmap = ExtMap {
                    direction: extmap.direction.map(Direction::flipped),
                    ..extmap
                };

                answer.attributes.push(extmap.to_attribute());
            }
        }

        if self.rtcp_mux && offer.has_attribute("rtcp-mux") {
            answer.attributes.push(property_attribute("rtcp-mux"));
        }

        answer.direction = intersect_direction(self.direction, offer.direction.flipped());
        answer.bandwidth.clone_from(&self.bandwidth);

        Ok(())
    }
}

/// Encoding of a payload type, from the `a=rtpmap` or the static payload type table
fn offered_encoding(media: &MediaDescription, pt: u8) -> Option<String> {
    media
        .rtpmap(pt)
        .map(encoding_name)
        .or_else(|| static_encoding(pt).map(ToOwned::to_owned))
}
