use super::slots::{assign_slots, disabled_copy, failed_offer};
use super::{Binding, HandlerId, NegotiationState, Pending, PendingKind, SdpAgent};
use crate::sdp::{self, MediaDescriptionExt};
use crate::{Error, Result};
use sdp_types::{MediaType, SessionDescription};

impl SdpAgent {
    /// Create an SDP offer containing all media handlers
    ///
    /// Handlers keep the slot of previous negotiations, new handlers are placed in vacated
    /// slots first and appended after that. The offer must be committed using
    /// [`SdpAgent::set_local_description`] or discarded using [`SdpAgent::cancel_offer`].
    pub fn create_offer(&mut self) -> Result<SessionDescription> {
        self.ensure_state(
            "create_offer",
            &[NegotiationState::Unnegotiated, NegotiationState::Negotiated],
        )?;

        let created = self.create_required_handlers();

        match self.build_offer(created.clone()) {
            Ok((sdp, pending)) => {
                self.pending = Some(pending);
                self.state = NegotiationState::LocalOffer;

                log::debug!("created offer with {} media", sdp.media_descriptions.len());

                Ok(sdp)
            }
            Err(e) => {
                for id in created {
                    self.handlers.remove(id);
                }

                Err(e)
            }
        }
    }

    /// Discard the offer created by [`SdpAgent::create_offer`]
    ///
    /// Handlers created for the offer are removed again, the version is left untouched.
    pub fn cancel_offer(&mut self) -> Result<()> {
        self.ensure_state("cancel_offer", &[NegotiationState::LocalOffer])?;

        let Some(Pending {
            kind: PendingKind::Offer { previous_state },
            created,
            ..
        }) = self.pending.take()
        else {
            return Err(Error::Unexpected("local offer state without pending offer"));
        };

        for id in created {
            self.handlers.remove(id);
        }

        self.state = previous_state;

        log::debug!("cancelled offer, state={}", self.state);

        Ok(())
    }

    /// Ask for handlers for media kinds of the last remote offer which have no local handler
    fn create_required_handlers(&mut self) -> Vec<HandlerId> {
        let Some(remote) = self.last_remote_offer.clone() else {
            return vec![];
        };

        let mut seen: Vec<&MediaType> = vec![];
        let mut created = vec![];

        for media in &remote.media_descriptions {
            let media_type = &media.media.media_type;

            if media.is_rejected() || seen.contains(&media_type) {
                continue;
            }

            seen.push(media_type);

            if self
                .handlers
                .values()
                .any(|entry| entry.media_type == *media_type)
            {
                continue;
            }

            if let Some(id) = self.request_handler(media) {
                log::debug!("created {media_type} handler {id:?} for offer");
                created.push(id);
            }
        }

        created
    }

    fn mid_in_use(&self, mid: &str) -> bool {
        self.handlers
            .values()
            .any(|entry| entry.mid.as_deref() == Some(mid))
            || self.slots.iter().any(|slot| slot.media.mid() == Some(mid))
    }

    fn build_offer(&mut self, created: Vec<HandlerId>) -> Result<(SessionDescription, Pending)> {
        let previous_state = self.state;

        let vacant: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.handler.is_none())
            .map(|(index, _)| index)
            .collect();

        let mut unassigned: Vec<(u64, HandlerId)> = self
            .handlers
            .iter()
            .filter(|(_, entry)| entry.slot.is_none())
            .map(|(id, entry)| (entry.seq, id))
            .collect();

        unassigned.sort_unstable_by_key(|(seq, _)| *seq);

        let unassigned: Vec<HandlerId> = unassigned.into_iter().map(|(_, id)| id).collect();

        let mut slots: Vec<Option<HandlerId>> =
            self.slots.iter().map(|slot| slot.handler).collect();

        for (id, index) in assign_slots(slots.len(), &vacant, &unassigned) {
            if index >= slots.len() {
                slots.resize(index + 1, None);
            }

            slots[index] = Some(id);
        }

        // Allocate mids in slot order before any handler is touched
        let mut mids = self.mids.clone();
        let mut new_mids: Vec<(HandlerId, String)> = vec![];

        for id in slots.iter().flatten() {
            let entry = self
                .handlers
                .get(*id)
                .ok_or(Error::Unexpected("slot refers to unknown handler"))?;

            if entry.mid.is_none() {
                let mid = mids.next(&entry.media_type, |mid| {
                    self.mid_in_use(mid) || new_mids.iter().any(|(_, new)| new == mid)
                });

                new_mids.push((*id, mid));
            }
        }

        let mut media_descriptions = Vec::with_capacity(slots.len());
        let mut bindings = vec![];

        for (index, handler) in slots.iter().enumerate() {
            let Some(id) = *handler else {
                let slot = self
                    .slots
                    .get(index)
                    .ok_or(Error::Unexpected("vacant slot out of range"))?;

                media_descriptions.push(disabled_copy(&slot.media));
                continue;
            };

            let entry = self
                .handlers
                .get_mut(id)
                .ok_or(Error::Unexpected("slot refers to unknown handler"))?;

            let previous = if entry.slot == Some(index) {
                self.slots.get(index).map(|slot| &slot.media)
            } else {
                None
            };

            let mut media = match entry.handler.create_offer(&entry.media_type, previous) {
                Ok(media) => media,
                Err(e) => {
                    log::warn!("handler {id:?} failed to create offer, disabling media: {e}");
                    failed_offer(&entry.media_type, entry.handler.protocol(), previous)
                }
            };

            let mid = match &entry.mid {
                Some(mid) => mid.clone(),
                None => new_mids
                    .iter()
                    .find(|(new_id, _)| *new_id == id)
                    .map(|(_, mid)| mid.clone())
                    .ok_or(Error::Unexpected("no mid allocated for handler"))?,
            };

            media.set_mid(&mid);

            self.callbacks.on_media_offer(id, &mut media);

            media_descriptions.push(media);
            bindings.push(Binding {
                handler: id,
                slot: index,
                mid: Some(mid),
            });
        }

        // Groups are built last, when the final slot order is known
        let slot_of = |id: HandlerId| {
            slots
                .iter()
                .position(|handler| *handler == Some(id))
        };

        let groups: Vec<sdp::Group> = self
            .groups
            .values()
            .filter_map(|group| group.offer_attribute(slot_of, &media_descriptions))
            .collect();

        let mut sdp = self.build_description(media_descriptions, &groups);
        let version = self.stamp_version(&mut sdp);

        let pending = Pending {
            kind: PendingKind::Offer { previous_state },
            slots,
            bindings,
            mids,
            created,
            version,
        };

        Ok((sdp, pending))
    }
}
