//! Well known encoding names and the RFC 3551 static payload type table

/// Static payload types 0..=34, `None` marks unassigned or reserved numbers
const STATIC_PAYLOAD_TYPES: [Option<&str>; 35] = [
    Some("PCMU/8000"),
    None,
    None,
    Some("GSM/8000"),
    Some("G723/8000"),
    Some("DVI4/8000"),
    Some("DVI4/16000"),
    Some("LPC/8000"),
    Some("PCMA/8000"),
    Some("G722/8000"),
    Some("L16/44100/2"),
    Some("L16/44100"),
    Some("QCELP/8000"),
    Some("CN/8000"),
    Some("MPA/90000"),
    Some("G728/8000"),
    Some("DVI4/11025"),
    Some("DVI4/22050"),
    Some("G729/8000"),
    None,
    None,
    None,
    None,
    None,
    None,
    Some("CelB/90000"),
    Some("JPEG/90000"),
    None,
    Some("nv/90000"),
    None,
    None,
    Some("H261/90000"),
    Some("MPV/90000"),
    Some("MP2T/90000"),
    Some("H263/90000"),
];

/// Static payload types below this value are audio, all others video
pub(crate) const FIRST_VIDEO_STATIC_PT: u8 = 24;

pub const PCMU: &str = "PCMU/8000";
pub const PCMA: &str = "PCMA/8000";
pub const G722: &str = "G722/8000";
pub const OPUS: &str = "opus/48000/2";
pub const TELEPHONE_EVENT: &str = "telephone-event/8000";

pub const H264: &str = "H264/90000";
pub const VP8: &str = "VP8/90000";
pub const VP9: &str = "VP9/90000";
pub const AV1: &str = "AV1/90000";

pub const RED: &str = "red/90000";
pub const ULPFEC: &str = "ulpfec/90000";

pub fn static_encoding(pt: u8) -> Option<&'static str> {
    STATIC_PAYLOAD_TYPES.get(usize::from(pt)).copied().flatten()
}

pub fn find_static_pt(encoding_name: &str) -> Option<u8> {
    STATIC_PAYLOAD_TYPES
        .iter()
        .position(|entry| entry.is_some_and(|entry| same_encoding(entry, encoding_name)))
        .and_then(|pt| u8::try_from(pt).ok())
}

/// Compare two `name/clock_rate[/channels]` strings
///
/// Names are case-insensitive and a channel count of 1 equals no channel count.
pub fn same_encoding(a: &str, b: &str) -> bool {
    normalize(a).eq_ignore_ascii_case(normalize(b))
}

fn normalize(encoding_name: &str) -> &str {
    if encoding_name.matches('/').count() == 2 {
        encoding_name.strip_suffix("/1").unwrap_or(encoding_name)
    } else {
        encoding_name
    }
}
