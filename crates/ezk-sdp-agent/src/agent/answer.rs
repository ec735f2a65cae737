use super::slots::rejected_answer;
use super::{Binding, HandlerId, NegotiationState, Pending, PendingKind, SdpAgent};
use crate::sdp::{self, typed, MediaDescriptionExt};
use crate::{Error, Result};
use sdp_types::{MediaDescription, SessionDescription};

impl SdpAgent {
    /// Create the answer to the remote offer set using [`SdpAgent::set_remote_description`]
    ///
    /// Every offered media gets a media description in the answer, media without a capable
    /// handler or without common formats is rejected (port 0). Calling this again before
    /// the answer is committed replaces the previous answer.
    pub fn create_answer(&mut self) -> Result<SessionDescription> {
        self.ensure_state("create_answer", &[NegotiationState::RemoteOffer])?;

        if let Some(previous) = self.pending.take() {
            for id in previous.created {
                self.handlers.remove(id);
            }
        }

        let offer = self
            .remote_description
            .clone()
            .ok_or(Error::Unexpected("remote offer state without remote description"))?;

        let mut slots = vec![None; offer.media_descriptions.len()];
        let mut bindings = vec![];
        let mut created = vec![];
        let mut media_descriptions = Vec::with_capacity(offer.media_descriptions.len());

        for (index, offered) in offer.media_descriptions.iter().enumerate() {
            let bound = self.slots.get(index).and_then(|slot| slot.handler);

            if offered.is_rejected() {
                slots[index] = bound;
                media_descriptions.push(rejected_answer(offered));
                continue;
            }

            let id = match bound {
                Some(id) => Some(id),
                None => match self.find_unassigned(offered, &slots) {
                    Some(id) => Some(id),
                    None => {
                        let id = self.request_handler(offered);
                        created.extend(id);
                        id
                    }
                },
            };

            let Some(id) = id else {
                log::debug!(
                    "no handler for offered {} {}, rejecting media",
                    offered.media.media_type,
                    offered.media.proto
                );

                media_descriptions.push(rejected_answer(offered));
                continue;
            };

            let answer = self.answer_media(id, offered);

            if answer.is_rejected() {
                if bound.is_some() {
                    slots[index] = bound;
                } else if created.contains(&id) {
                    created.retain(|created| *created != id);
                    self.handlers.remove(id);
                }

                media_descriptions.push(answer);
                continue;
            }

            slots[index] = Some(id);
            bindings.push(Binding {
                handler: id,
                slot: index,
                mid: offered.mid().map(ToOwned::to_owned),
            });

            media_descriptions.push(answer);
        }

        let accepted: Vec<(HandlerId, &str)> = bindings
            .iter()
            .filter_map(|binding| Some((binding.handler, binding.mid.as_deref()?)))
            .collect();

        let mut groups = vec![];

        for offered in typed::<sdp::Group>(&offer.attributes) {
            groups.extend(self.groups.values().filter_map(|group| {
                group.answer_attribute(&offered, accepted.iter().copied())
            }));
        }

        let mut sdp = self.build_description(media_descriptions, &groups);
        let version = self.stamp_version(&mut sdp);

        self.pending = Some(Pending {
            kind: PendingKind::Answer,
            slots,
            bindings,
            mids: self.mids.clone(),
            created,
            version,
        });

        log::debug!("created answer with {} media", sdp.media_descriptions.len());

        Ok(sdp)
    }

    /// First handler in insertion order without a slot which can take the offered media
    fn find_unassigned(
        &self,
        offered: &MediaDescription,
        chosen: &[Option<HandlerId>],
    ) -> Option<HandlerId> {
        let mut candidates: Vec<(u64, HandlerId)> = self
            .handlers
            .iter()
            .filter(|(id, entry)| {
                entry.slot.is_none()
                    && entry.media_type == offered.media.media_type
                    && entry.handler.manage_protocol(&offered.media.proto)
                    && !chosen.contains(&Some(*id))
            })
            .map(|(id, entry)| (entry.seq, id))
            .collect();

        candidates.sort_unstable_by_key(|(seq, _)| *seq);
        candidates.first().map(|(_, id)| *id)
    }

    /// Let the handler answer the offered media, errors reject the media
    fn answer_media(&mut self, id: HandlerId, offered: &MediaDescription) -> MediaDescription {
        let Some(entry) = self.handlers.get_mut(id) else {
            return rejected_answer(offered);
        };

        let mut answer = match entry.handler.create_answer(offered) {
            Ok(answer) if !answer.is_rejected() => answer,
            Ok(_) => {
                log::debug!("handler {id:?} has no common formats, rejecting media");
                return rejected_answer(offered);
            }
            Err(e @ (Error::InvalidMedia(_) | Error::InvalidProtocol(_))) => {
                log::debug!("handler {id:?} cannot answer media: {e}");
                return rejected_answer(offered);
            }
            Err(e) => {
                log::warn!("handler {id:?} failed to create answer, rejecting media: {e}");
                return rejected_answer(offered);
            }
        };

        if let Some(mid) = offered.mid() {
            answer.set_mid(mid);
        }

        self.callbacks.on_media_answer(id, &mut answer);

        answer
    }
}
