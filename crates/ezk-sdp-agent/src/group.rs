use crate::sdp::{self, MediaDescriptionExt};
use crate::HandlerId;
use sdp_types::MediaDescription;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupSemantics {
    /// RFC 9143 bundled media, multiplexed over a single transport
    Bundle,
}

impl GroupSemantics {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bundle => "BUNDLE",
        }
    }

    /// A handler may be a member of at most one exclusive group
    pub fn is_exclusive(&self) -> bool {
        match self {
            Self::Bundle => true,
        }
    }
}

impl fmt::Display for GroupSemantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Group {
    semantics: GroupSemantics,
    members: Vec<HandlerId>,
}

impl Group {
    pub(crate) fn new(semantics: GroupSemantics) -> Self {
        Self {
            semantics,
            members: vec![],
        }
    }

    pub fn semantics(&self) -> GroupSemantics {
        self.semantics
    }

    pub fn members(&self) -> &[HandlerId] {
        &self.members
    }

    pub fn contains(&self, handler: HandlerId) -> bool {
        self.members.contains(&handler)
    }

    /// Returns false if the handler already is a member
    pub(crate) fn add_handler(&mut self, handler: HandlerId) -> bool {
        if self.contains(handler) {
            return false;
        }

        self.members.push(handler);
        true
    }

    pub(crate) fn remove_handler(&mut self, handler: HandlerId) -> bool {
        let len = self.members.len();
        self.members.retain(|member| *member != handler);
        self.members.len() != len
    }

    /// Build the group attribute of an offer
    ///
    /// Members are listed in slot order. Members without a slot, rejected media and media
    /// without a mid are skipped. Returns `None` if no member is left.
    pub(crate) fn offer_attribute(
        &self,
        slot_of: impl Fn(HandlerId) -> Option<usize>,
        media_descriptions: &[MediaDescription],
    ) -> Option<sdp::Group> {
        let mut slots: Vec<usize> = self
            .members
            .iter()
            .filter_map(|member| slot_of(*member))
            .collect();

        slots.sort_unstable();

        let mids: Vec<String> = slots
            .into_iter()
            .filter_map(|slot| media_descriptions.get(slot))
            .filter(|media| !media.is_rejected())
            .filter_map(|media| media.mid().map(ToOwned::to_owned))
            .collect();

        if mids.is_empty() {
            return None;
        }

        Some(sdp::Group {
            semantics: self.semantics.as_str().to_owned(),
            mids,
        })
    }

    /// Build the answer to an offered group
    ///
    /// Keeps the offered mids, in the order of the offer, which belong to an accepted member
    /// of this group. `accepted` maps handlers to the mid of their accepted media.
    pub(crate) fn answer_attribute<'a>(
        &self,
        offered: &sdp::Group,
        accepted: impl IntoIterator<Item = (HandlerId, &'a str)>,
    ) -> Option<sdp::Group> {
        if offered.semantics != self.semantics.as_str() {
            return None;
        }

        let member_mids: Vec<&str> = accepted
            .into_iter()
            .filter(|(handler, _)| self.contains(*handler))
            .map(|(_, mid)| mid)
            .collect();

        let mids: Vec<String> = offered
            .mids
            .iter()
            .filter(|mid| member_mids.contains(&mid.as_str()))
            .cloned()
            .collect();

        if mids.is_empty() {
            return None;
        }

        Some(sdp::Group {
            semantics: offered.semantics.clone(),
            mids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdp::media_description;
    use sdp_types::{MediaType, TransportProtocol};
    use slotmap::SlotMap;

    fn media(mid: &str, port: u16) -> MediaDescription {
        let mut media = media_description(MediaType::Audio, port, TransportProtocol::RtpAvp);
        media.media.fmts = vec![0];
        media.set_mid(mid);
        media
    }

    #[test]
    fn membership() {
        let mut keys = SlotMap::<HandlerId, ()>::with_key();
        let a = keys.insert(());
        let b = keys.insert(());

        let mut group = Group::new(GroupSemantics::Bundle);
        assert!(group.add_handler(a));
        assert!(!group.add_handler(a));
        assert!(group.add_handler(b));
        assert_eq!(group.members(), [a, b]);

        assert!(group.remove_handler(a));
        assert!(!group.remove_handler(a));
        assert_eq!(group.members(), [b]);
    }

    #[test]
    fn offer_attribute_uses_slot_order() {
        let mut keys = SlotMap::<HandlerId, ()>::with_key();
        let a = keys.insert(());
        let b = keys.insert(());
        let c = keys.insert(());
        let unassigned = keys.insert(());

        let mut group = Group::new(GroupSemantics::Bundle);
        for handler in [a, b, c, unassigned] {
            group.add_handler(handler);
        }

        let descriptions = [media("video0", 1), media("audio0", 1), media("audio1", 0)];

        let slot_of = |handler: HandlerId| {
            if handler == a {
                Some(1)
            } else if handler == b {
                Some(0)
            } else if handler == c {
                Some(2)
            } else {
                None
            }
        };

        let attribute = group.offer_attribute(slot_of, &descriptions).unwrap();
        assert_eq!(attribute.to_string(), "BUNDLE video0 audio0");

        let rejected = [media("video0", 0), media("audio0", 0)];
        assert!(group.offer_attribute(slot_of, &rejected).is_none());
    }

    #[test]
    fn answer_keeps_accepted_member_mids() {
        let mut keys = SlotMap::<HandlerId, ()>::with_key();
        let a = keys.insert(());
        let b = keys.insert(());
        let outsider = keys.insert(());

        let mut group = Group::new(GroupSemantics::Bundle);
        group.add_handler(a);
        group.add_handler(b);

        let offered = sdp::Group {
            semantics: "BUNDLE".into(),
            mids: vec!["0".into(), "1".into(), "2".into()],
        };

        // offer order wins over the order of acceptance
        let accepted = [(b, "2"), (outsider, "1"), (a, "0")];
        let answer = group.answer_attribute(&offered, accepted).unwrap();
        assert_eq!(answer.mids, ["0", "2"]);

        assert!(group.answer_attribute(&offered, [(outsider, "1")]).is_none());

        let lipsync = sdp::Group {
            semantics: "LS".into(),
            mids: vec!["0".into()],
        };
        assert!(group.answer_attribute(&lipsync, [(a, "0")]).is_none());
    }
}
