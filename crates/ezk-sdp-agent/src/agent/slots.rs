use crate::sdp::{media_description, MediaDescriptionExt};
use crate::HandlerId;
use sdp_types::{MediaDescription, MediaType, TransportProtocol};
use std::collections::HashMap;

/// Position of a `m=` line in the SDP, shared by offer and answer
#[derive(Debug, Clone)]
pub(super) struct Slot {
    pub(super) handler: Option<HandlerId>,
    /// The last committed local media description of this slot
    pub(super) media: MediaDescription,
}

/// Generates mids like `audio0`, `video3` from a counter per media type
#[derive(Debug, Clone, Default)]
pub(super) struct MidRegistry {
    counters: HashMap<MediaType, u32>,
}

impl MidRegistry {
    /// Next mid for the media type, skipping values for which `in_use` returns true
    ///
    /// Counters only move forward, a mid is never generated twice.
    pub(super) fn next(&mut self, media_type: &MediaType, in_use: impl Fn(&str) -> bool) -> String {
        let counter = self.counters.entry(*media_type).or_default();

        loop {
            let mid = format!("{media_type}{counter}");
            *counter += 1;

            if !in_use(&mid) {
                return mid;
            }
        }
    }
}

/// Assign new handlers to slots
///
/// Vacant slots are reused in ascending order (first-fit), handlers are taken in the given
/// order. Handlers left over are appended after the last slot.
pub(super) fn assign_slots(
    slot_count: usize,
    vacant: &[usize],
    new_handlers: &[HandlerId],
) -> Vec<(HandlerId, usize)> {
    let mut vacant = vacant.to_vec();
    vacant.sort_unstable();

    let appended = slot_count..;

    new_handlers
        .iter()
        .copied()
        .zip(vacant.into_iter().chain(appended))
        .collect()
}

/// Copy of a media description with port zero, keeping only its mid
pub(super) fn disabled_copy(media: &MediaDescription) -> MediaDescription {
    let mut disabled = rejected(media);

    if let Some(mid) = media.mid() {
        disabled.set_mid(mid);
    }

    disabled
}

/// Offer of a handler which failed to create its media description
pub(super) fn failed_offer(
    media_type: &MediaType,
    protocol: TransportProtocol,
    previous: Option<&MediaDescription>,
) -> MediaDescription {
    match previous {
        Some(previous) => disabled_copy(previous),
        None => media_description(*media_type, 0, protocol),
    }
}

pub(super) fn rejected_answer(offer: &MediaDescription) -> MediaDescription {
    rejected(offer)
}

fn rejected(media: &MediaDescription) -> MediaDescription {
    let mut rejected = media_description(media.media.media_type, 0, media.media.proto.clone());
    rejected.media.fmts.clone_from(&media.media.fmts);
    rejected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdp::{protocol, rtpmap_from_encoding_name};
    use sdp_types::Direction;
    use slotmap::SlotMap;

    #[test]
    fn mids_skip_used_values() {
        let mut mids = MidRegistry::default();

        assert_eq!(mids.next(&MediaType::Audio, |_| false), "audio0");
        assert_eq!(mids.next(&MediaType::Audio, |mid| mid == "audio1"), "audio2");
        assert_eq!(mids.next(&MediaType::Video, |_| false), "video0");
        assert_eq!(mids.next(&MediaType::Audio, |_| false), "audio3");
        assert_eq!(mids.next(&MediaType::Text, |_| false), "text0");
        assert_eq!(mids.next(&MediaType::App, |_| false), "application0");
    }

    #[test]
    fn first_fit() {
        let mut keys = SlotMap::<HandlerId, ()>::with_key();
        let a = keys.insert(());
        let b = keys.insert(());
        let c = keys.insert(());

        assert_eq!(assign_slots(4, &[3, 1], &[a, b, c]), [(a, 1), (b, 3), (c, 4)]);
        assert_eq!(assign_slots(2, &[], &[a, b]), [(a, 2), (b, 3)]);
        assert_eq!(assign_slots(2, &[0, 1], &[a]), [(a, 0)]);
        assert!(assign_slots(2, &[0], &[]).is_empty());
    }

    #[test]
    fn disabled_media_keeps_mid() {
        let mut media = media_description(MediaType::Video, 5000, TransportProtocol::RtpAvp);
        media.media.ports_num = Some(2);
        media.media.fmts = vec![96];
        media.set_mid("video0");
        media.direction = Direction::SendOnly;
        media.rtpmaps.push(rtpmap_from_encoding_name(96, "VP8/90000").unwrap());

        let disabled = disabled_copy(&media);
        assert_eq!(
            disabled.to_string(),
            "m=video 0 RTP/AVP 96\r\na=sendrecv\r\na=mid:video0\r\n"
        );

        let rejected = rejected_answer(&media);
        assert_eq!(rejected.to_string(), "m=video 0 RTP/AVP 96\r\na=sendrecv\r\n");

        let failed = failed_offer(&MediaType::App, protocol("UDP/DTLS/SCTP"), None);
        assert_eq!(failed.media.to_string(), "m=application 0 UDP/DTLS/SCTP");
    }
}
