use super::{can_insert_attribute, init_offer_media, MediaHandler};
use crate::sdp::{
    protocol, protocol_formats, protocol_name, protocol_with_formats, typed, value_attribute,
    AttributeValue, SctpMap, Setup,
};
use crate::{Error, Result};
use sdp_types::{MediaDescription, MediaType, TransportProtocol, UnknownAttribute};

const LEGACY_PROTOCOL: &str = "DTLS/SCTP";
const PROTOCOLS: [&str; 3] = [LEGACY_PROTOCOL, "UDP/DTLS/SCTP", "TCP/DTLS/SCTP"];

/// Media handler for SCTP data channels over DTLS
///
/// Offers the legacy `DTLS/SCTP` format (`a=sctpmap`), answers both the legacy and the
/// `UDP/DTLS/SCTP` format (`a=sctp-port`).
#[derive(Debug, Clone)]
pub struct SctpMediaHandler {
    port: u16,
    app: String,
    max_streams: u32,
}

impl Default for SctpMediaHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl SctpMediaHandler {
    pub fn new() -> Self {
        Self {
            port: 5000,
            app: "webrtc-datachannel".into(),
            max_streams: 1024,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_max_streams(mut self, max_streams: u32) -> Self {
        self.max_streams = max_streams;
        self
    }

    fn reject(offer: &MediaDescription, answer: &mut MediaDescription) {
        answer.media.port = 0;
        answer.media.proto = offer.media.proto.clone();
    }
}

impl MediaHandler for SctpMediaHandler {
    fn protocol(&self) -> TransportProtocol {
        protocol(LEGACY_PROTOCOL)
    }

    fn supports_media(&self, media_type: &MediaType) -> bool {
        *media_type == MediaType::App
    }

    fn manage_protocol(&self, proto: &TransportProtocol) -> bool {
        PROTOCOLS.contains(&protocol_name(proto))
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
        _previous: Option<&MediaDescription>,
    ) -> Result<()> {
        let name = protocol_name(&media.media.proto).to_owned();

        if name == LEGACY_PROTOCOL {
            media.media.proto = protocol_with_formats(&name, &self.port.to_string());

            let sctpmap = SctpMap {
                number: self.port,
                app: self.app.clone(),
                streams: Some(self.max_streams),
            };

            media.attributes.push(sctpmap.to_attribute());
        } else {
            media.media.proto = protocol_with_formats(&name, &self.app);
            media
                .attributes
                .push(value_attribute("sctp-port", &self.port.to_string()));
        }

        media.media.fmts.clear();

        Ok(())
    }

    fn add_answer_attributes(
        &mut self,
        offer: &MediaDescription,
        answer: &mut MediaDescription,
    ) -> Result<()> {
        let name = protocol_name(&offer.media.proto);

        if name == LEGACY_PROTOCOL {
            let Some(sctpmap) = typed::<SctpMap>(&offer.attributes).find(|map| map.app == self.app)
            else {
                log::debug!("offer contains no sctpmap for {}", self.app);
                Self::reject(offer, answer);
                return Ok(());
            };

            let streams = sctpmap
                .streams
                .map_or(self.max_streams, |streams| streams.min(self.max_streams));

            answer.media.proto = protocol_with_formats(name, &sctpmap.number.to_string());

            let sctpmap = SctpMap {
                number: sctpmap.number,
                app: self.app.clone(),
                streams: Some(streams),
            };

            answer.attributes.push(sctpmap.to_attribute());
        } else {
            if !protocol_formats(&offer.media.proto).any(|format| format == self.app) {
                log::debug!("offer does not contain the {} format", self.app);
                Self::reject(offer, answer);
                return Ok(());
            }

            answer.media.proto = protocol_with_formats(name, &self.app);
            answer
                .attributes
                .push(value_attribute("sctp-port", &self.port.to_string()));
        }

        if let Some(setup) = typed::<Setup>(&offer.attributes).next() {
            answer.attributes.push(setup.answer().to_attribute());
        }

        answer.media.port = 1;

        Ok(())
    }

    fn can_insert_attribute(
        &self,
        _offer: &MediaDescription,
        attribute: &UnknownAttribute,
        answer: &MediaDescription,
    ) -> bool {
        !matches!(attribute.name.as_str(), "sctpmap" | "sctp-port")
            && can_insert_attribute(attribute, answer)
    }
}
