use crate::codecs::{same_encoding, static_encoding};
use crate::sdp::encoding_name;
use sdp_types::{MediaType, RtpMap};

/// A payload format registered with an RTP handler
#[derive(Debug, Clone)]
pub(crate) struct RtpFormat {
    pub(crate) rtpmap: RtpMap,
    pub(crate) media_type: MediaType,
    /// Payload type was taken from a payload manager
    pub(crate) dynamic: bool,
    /// Format with no media specific meaning (e.g. FEC or redundancy)
    pub(crate) generic: bool,
    pub(crate) fmtp: Option<String>,
}

impl RtpFormat {
    pub(crate) fn pt(&self) -> u8 {
        self.rtpmap.payload
    }

    pub(crate) fn encoding_name(&self) -> String {
        encoding_name(&self.rtpmap)
    }

    /// The rtpmap of this format announced under another payload type
    pub(crate) fn rtpmap_with_pt(&self, pt: u8) -> RtpMap {
        RtpMap {
            payload: pt,
            ..self.rtpmap.clone()
        }
    }
}

#[derive(Debug, Default, Clone)]
pub(crate) struct Formats {
    list: Vec<RtpFormat>,
}

impl Formats {
    pub(crate) fn push(&mut self, format: RtpFormat) {
        self.list.push(format);
    }

    pub(crate) fn indexed<'a>(
        &'a self,
        media_type: &'a MediaType,
    ) -> impl Iterator<Item = (usize, &'a RtpFormat)> + 'a {
        self.list
            .iter()
            .enumerate()
            .filter(move |(_, format)| format.media_type == *media_type)
    }

    pub(crate) fn position(&self, media_type: &MediaType, encoding_name: &str) -> Option<usize> {
        self.list.iter().position(|format| {
            format.media_type == *media_type && same_encoding(&format.encoding_name(), encoding_name)
        })
    }

    pub(crate) fn by_pt(&self, pt: u8) -> Option<&RtpFormat> {
        self.list.iter().find(|format| format.pt() == pt)
    }

    pub(crate) fn by_pt_mut(&mut self, pt: u8) -> Option<&mut RtpFormat> {
        self.list.iter_mut().find(|format| format.pt() == pt)
    }

    pub(crate) fn get(&self, index: usize) -> Option<&RtpFormat> {
        self.list.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut RtpFormat> {
        self.list.get_mut(index)
    }
}

/// Static payload types use their well known encoding and need no `a=rtpmap`
pub(crate) fn needs_rtpmap(pt: u8, encoding_name: &str) -> bool {
    static_encoding(pt).map_or(true, |static_name| !same_encoding(static_name, encoding_name))
}
