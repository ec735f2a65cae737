//! Helpers around [`sdp_types`] for what the negotiation needs beyond the plain document model
//!
//! `sdp-types` keeps the formats of a `m=` line as RTP payload type numbers. Format tokens
//! which aren't payload types (e.g. `webrtc-datachannel` or a SCTP port) are carried inside
//! [`TransportProtocol::Other`] behind the protocol token, so they survive parsing and
//! serialization unchanged.

use bytesstr::BytesStr;
use sdp_types::{
    Direction, Media, MediaDescription, MediaType, ParseSessionDescriptionError, RtpMap,
    SessionDescription, TransportProtocol, UnknownAttribute,
};

mod attributes;

pub use attributes::{typed, AttributeValue, ExtMap, Group, RtcpFeedback, SctpMap, Setup};

/// Parse SDP text
///
/// Unlike [`SessionDescription::parse`] every protocol token is kept verbatim (`RTP/AVPF`,
/// `RTP/SAVPF`) and non RTP formats are preserved.
pub fn parse_sdp(text: &str) -> Result<SessionDescription, ParseSessionDescriptionError> {
    let mut sdp = SessionDescription::parse(&BytesStr::from(text))?;

    let media_lines = text
        .split(['\n', '\r'])
        .filter_map(|line| line.strip_prefix("m="));

    for (media, line) in sdp.media_descriptions.iter_mut().zip(media_lines) {
        let mut tokens = line.split_ascii_whitespace().skip(2);

        let Some(proto) = tokens.next() else {
            continue;
        };

        let formats: Vec<&str> = tokens.collect();

        let payload_types: Option<Vec<u8>> = formats.iter().map(|fmt| fmt.parse().ok()).collect();

        match payload_types {
            Some(fmts) => {
                media.media.proto = protocol(proto);
                media.media.fmts = fmts;
            }
            None => {
                media.media.proto = protocol_with_formats(proto, &formats.join(" "));
                media.media.fmts.clear();
            }
        }
    }

    Ok(sdp)
}

pub fn protocol(token: &str) -> TransportProtocol {
    match token {
        "udp" => TransportProtocol::Unspecified,
        "RTP/AVP" => TransportProtocol::RtpAvp,
        "RTP/SAVP" => TransportProtocol::RtpSavp,
        "RTP/SAVPF" => TransportProtocol::RtpSavpf,
        other => TransportProtocol::Other(BytesStr::from(other)),
    }
}

/// Protocol token followed by format tokens which aren't RTP payload types
pub fn protocol_with_formats(token: &str, formats: &str) -> TransportProtocol {
    TransportProtocol::Other(format!("{token} {formats}").into())
}

/// The protocol token without any trailing formats
pub fn protocol_name(proto: &TransportProtocol) -> &str {
    match proto {
        TransportProtocol::Unspecified => "udp",
        TransportProtocol::RtpAvp => "RTP/AVP",
        TransportProtocol::RtpSavp => "RTP/SAVP",
        TransportProtocol::RtpSavpf => "RTP/SAVPF",
        TransportProtocol::Other(other) => other.split_ascii_whitespace().next().unwrap_or_default(),
    }
}

/// Format tokens carried by the protocol, see [`protocol_with_formats`]
pub fn protocol_formats(proto: &TransportProtocol) -> impl Iterator<Item = &str> {
    let formats = match proto {
        TransportProtocol::Other(other) => other.as_str(),
        _ => "",
    };

    formats.split_ascii_whitespace().skip(1)
}

pub fn media_description(media_type: MediaType, port: u16, proto: TransportProtocol) -> MediaDescription {
    MediaDescription {
        media: Media {
            media_type,
            port,
            ports_num: None,
            proto,
            fmts: vec![],
        },
        direction: Direction::SendRecv,
        connection: None,
        bandwidth: vec![],
        rtcp_attr: None,
        rtpmaps: vec![],
        fmtps: vec![],
        ice_ufrag: None,
        ice_pwd: None,
        ice_candidates: vec![],
        ice_end_of_candidates: false,
        crypto: vec![],
        attributes: vec![],
    }
}

/// Attribute access and the `a=mid` of a media description
pub trait MediaDescriptionExt {
    /// A port of zero rejects or disables the media
    fn is_rejected(&self) -> bool;

    fn attribute_value(&self, name: &str) -> Option<&str>;

    fn has_attribute(&self, name: &str) -> bool;

    fn mid(&self) -> Option<&str>;

    /// Replace the `a=mid` attribute, it is always placed first
    fn set_mid(&mut self, mid: &str);

    fn rtpmap(&self, pt: u8) -> Option<&RtpMap>;
}

impl MediaDescriptionExt for MediaDescription {
    fn is_rejected(&self) -> bool {
        self.media.port == 0
    }

    fn attribute_value(&self, name: &str) -> Option<&str> {
        attribute_value(&self.attributes, name)
    }

    fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|attr| attr.name == name)
    }

    fn mid(&self) -> Option<&str> {
        self.attribute_value("mid")
    }

    fn set_mid(&mut self, mid: &str) {
        self.attributes.retain(|attr| attr.name != "mid");
        self.attributes.insert(0, value_attribute("mid", mid));
    }

    fn rtpmap(&self, pt: u8) -> Option<&RtpMap> {
        self.rtpmaps.iter().find(|rtpmap| rtpmap.payload == pt)
    }
}

pub(crate) fn attribute_value<'a>(attributes: &'a [UnknownAttribute], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|attr| attr.name == name)
        .and_then(|attr| attr.value.as_deref())
}

/// `a=<name>`
pub fn property_attribute(name: &str) -> UnknownAttribute {
    UnknownAttribute {
        name: name.into(),
        value: None,
    }
}

/// `a=<name>:<value>`
pub fn value_attribute(name: &str, value: &str) -> UnknownAttribute {
    UnknownAttribute {
        name: name.into(),
        value: Some(value.into()),
    }
}

/// The `name/clock_rate[/params]` part of a rtpmap
pub fn encoding_name(rtpmap: &RtpMap) -> String {
    match &rtpmap.params {
        Some(params) => format!("{}/{}/{}", rtpmap.encoding, rtpmap.clock_rate, params),
        None => format!("{}/{}", rtpmap.encoding, rtpmap.clock_rate),
    }
}

/// Build a rtpmap from a `name/clock_rate[/params]` string
pub fn rtpmap_from_encoding_name(payload: u8, encoding_name: &str) -> Option<RtpMap> {
    let mut parts = encoding_name.splitn(3, '/');

    let encoding = parts.next().filter(|encoding| !encoding.is_empty())?;
    let clock_rate = parts.next()?.parse().ok()?;

    Some(RtpMap {
        payload,
        encoding: encoding.into(),
        clock_rate,
        params: parts.next().map(BytesStr::from),
    })
}

fn sends(direction: Direction) -> bool {
    matches!(direction, Direction::SendRecv | Direction::SendOnly)
}

fn receives(direction: Direction) -> bool {
    matches!(direction, Direction::SendRecv | Direction::RecvOnly)
}

pub fn intersect_direction(a: Direction, b: Direction) -> Direction {
    match (sends(a) && sends(b), receives(a) && receives(b)) {
        (true, true) => Direction::SendRecv,
        (true, false) => Direction::SendOnly,
        (false, true) => Direction::RecvOnly,
        (false, false) => Direction::Inactive,
    }
}
