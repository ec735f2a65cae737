//! The SDP offer/answer state machine

use crate::group::{Group, GroupSemantics};
use crate::sdp::{parse_sdp, AttributeValue};
use crate::{Error, MediaHandler, Result, SdpAgentConfig};
use sdp_types::{
    Connection, Direction, IceOptions, MediaDescription, MediaType, Origin, SessionDescription,
    Time,
};
use slots::{MidRegistry, Slot};
use slotmap::SlotMap;
use std::net::IpAddr;

mod answer;
mod callbacks;
mod offer;
mod slots;
mod state;

pub use callbacks::{AgentCallbacks, NoCallbacks};
pub use state::NegotiationState;

slotmap::new_key_type! {
    /// Identifies a media handler added to an [`SdpAgent`]
    pub struct HandlerId;

    pub struct GroupId;
}

struct HandlerEntry {
    media_type: MediaType,
    handler: Box<dyn MediaHandler>,
    /// Slot index, assigned by the first committed negotiation and never changed afterwards
    slot: Option<usize>,
    mid: Option<String>,
    seq: u64,
    /// Created through [`AgentCallbacks::on_handler_required`]
    on_demand: bool,
}

/// Bindings and slot table of a created but not yet committed offer or answer
struct Pending {
    kind: PendingKind,
    slots: Vec<Option<HandlerId>>,
    bindings: Vec<Binding>,
    mids: MidRegistry,
    /// Handlers created through callbacks while building the description
    created: Vec<HandlerId>,
    version: u64,
}

#[derive(Debug, Clone, Copy)]
enum PendingKind {
    Offer { previous_state: NegotiationState },
    Answer,
}

struct Binding {
    handler: HandlerId,
    slot: usize,
    mid: Option<String>,
}

/// Negotiates media using the SDP offer/answer model
///
/// The agent owns all media handlers and the slot table which maps handlers to `m=` line
/// positions. All operations are synchronous, wrap the agent in a mutex to share it.
pub struct SdpAgent {
    config: SdpAgentConfig,
    address: IpAddr,

    session_id: u64,
    version: u64,

    state: NegotiationState,

    handlers: SlotMap<HandlerId, HandlerEntry>,
    next_seq: u64,
    groups: SlotMap<GroupId, Group>,

    slots: Vec<Slot>,
    mids: MidRegistry,

    local_description: Option<SessionDescription>,
    remote_description: Option<SessionDescription>,
    /// The remote offer of the last negotiation the agent answered
    last_remote_offer: Option<SessionDescription>,
    committed: Option<String>,

    pending: Option<Pending>,

    callbacks: Box<dyn AgentCallbacks>,
}

impl SdpAgent {
    pub fn new(address: IpAddr, config: SdpAgentConfig) -> Self {
        Self {
            config,
            address,
            session_id: u64::from(rand::random::<u16>()),
            version: u64::from(rand::random::<u16>()),
            state: NegotiationState::Unnegotiated,
            handlers: SlotMap::with_key(),
            next_seq: 0,
            groups: SlotMap::with_key(),
            slots: vec![],
            mids: MidRegistry::default(),
            local_description: None,
            remote_description: None,
            last_remote_offer: None,
            committed: None,
            pending: None,
            callbacks: Box::new(NoCallbacks),
        }
    }

    pub fn set_callbacks<C: AgentCallbacks + 'static>(&mut self, callbacks: C) {
        self.callbacks = Box::new(callbacks);
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn local_description(&self) -> Option<&SessionDescription> {
        self.local_description.as_ref()
    }

    pub fn remote_description(&self) -> Option<&SessionDescription> {
        self.remote_description.as_ref()
    }

    fn ensure_state(&self, operation: &'static str, allowed: &[NegotiationState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                operation,
                state: self.state,
            })
        }
    }

    fn ensure_not_outstanding(&self, operation: &'static str) -> Result<()> {
        if self.state.is_outstanding() {
            Err(Error::InvalidTransition {
                operation,
                state: self.state,
            })
        } else {
            Ok(())
        }
    }

    /// Add a media handler for the given media type
    ///
    /// The handler is assigned a slot by the next negotiation.
    pub fn add_proto_handler(
        &mut self,
        media_type: MediaType,
        handler: Box<dyn MediaHandler>,
    ) -> Result<HandlerId> {
        self.ensure_not_outstanding("add_proto_handler")?;

        if !handler.supports_media(&media_type) {
            return Err(Error::InvalidMedia(media_type));
        }

        Ok(self.insert_handler(media_type, handler, false))
    }

    fn insert_handler(
        &mut self,
        media_type: MediaType,
        handler: Box<dyn MediaHandler>,
        on_demand: bool,
    ) -> HandlerId {
        let seq = self.next_seq;
        self.next_seq += 1;

        let id = self.handlers.insert(HandlerEntry {
            media_type,
            handler,
            slot: None,
            mid: None,
            seq,
            on_demand,
        });

        log::debug!("added handler {id:?} protocol={}", self.handlers[id].handler.protocol());

        id
    }

    /// Remove a media handler, its slot is vacated for reuse by new handlers
    ///
    /// Returns false if the handler doesn't exist.
    pub fn remove_proto_handler(&mut self, id: HandlerId) -> Result<bool> {
        self.ensure_not_outstanding("remove_proto_handler")?;

        let Some(entry) = self.handlers.remove(id) else {
            return Ok(false);
        };

        if let Some(slot) = entry.slot.and_then(|slot| self.slots.get_mut(slot)) {
            slot.handler = None;
        }

        for group in self.groups.values_mut() {
            group.remove_handler(id);
        }

        log::debug!("removed handler {id:?} slot={:?}", entry.slot);

        Ok(true)
    }

    /// Slot index of the handler, assigned by the first committed negotiation including it
    pub fn get_handler_index(&self, id: HandlerId) -> Option<usize> {
        self.handlers.get(id)?.slot
    }

    pub fn get_handler_mid(&self, id: HandlerId) -> Option<&str> {
        self.handlers.get(id)?.mid.as_deref()
    }

    /// The exclusive group the handler is a member of, or the first other group
    pub fn get_handler_group_id(&self, id: HandlerId) -> Option<GroupId> {
        let mut groups = self.groups.iter().filter(|(_, group)| group.contains(id));

        groups
            .clone()
            .find(|(_, group)| group.semantics().is_exclusive())
            .or_else(|| groups.next())
            .map(|(gid, _)| gid)
    }

    pub fn handler<T: MediaHandler>(&self, id: HandlerId) -> Option<&T> {
        self.handlers.get(id)?.handler.downcast_ref::<T>()
    }

    /// Mutable access to a handler, not allowed while a negotiation is in progress
    pub fn handler_mut<T: MediaHandler>(&mut self, id: HandlerId) -> Result<Option<&mut T>> {
        self.ensure_not_outstanding("handler_mut")?;

        Ok(self
            .handlers
            .get_mut(id)
            .and_then(|entry| entry.handler.downcast_mut::<T>()))
    }

    pub fn handler_ids(&self) -> impl Iterator<Item = HandlerId> + '_ {
        self.handlers.keys()
    }

    pub fn create_group(&mut self, semantics: GroupSemantics) -> Result<GroupId> {
        self.ensure_not_outstanding("create_group")?;

        Ok(self.groups.insert(Group::new(semantics)))
    }

    pub fn remove_group(&mut self, gid: GroupId) -> Result<bool> {
        self.ensure_not_outstanding("remove_group")?;

        Ok(self.groups.remove(gid).is_some())
    }

    pub fn group(&self, gid: GroupId) -> Option<&Group> {
        self.groups.get(gid)
    }

    /// Add a handler to a group
    ///
    /// Returns false if the handler already is a member, or if it is a member of another
    /// exclusive group while this group is exclusive.
    pub fn group_add(&mut self, gid: GroupId, id: HandlerId) -> Result<bool> {
        self.ensure_not_outstanding("group_add")?;

        if !self.handlers.contains_key(id) {
            return Err(Error::invalid_parameter(format!("unknown handler {id:?}")));
        }

        let group = self
            .groups
            .get(gid)
            .ok_or_else(|| Error::invalid_parameter(format!("unknown group {gid:?}")))?;

        if group.semantics().is_exclusive() {
            let in_other_group = self.groups.iter().any(|(other_id, other)| {
                other_id != gid && other.semantics().is_exclusive() && other.contains(id)
            });

            if in_other_group {
                log::debug!("handler {id:?} already is a member of an exclusive group");
                return Ok(false);
            }
        }

        Ok(self
            .groups
            .get_mut(gid)
            .is_some_and(|group| group.add_handler(id)))
    }

    pub fn group_remove(&mut self, gid: GroupId, id: HandlerId) -> Result<bool> {
        self.ensure_not_outstanding("group_remove")?;

        let group = self
            .groups
            .get_mut(gid)
            .ok_or_else(|| Error::invalid_parameter(format!("unknown group {gid:?}")))?;

        Ok(group.remove_handler(id))
    }

    /// Commit the previously created offer or answer
    ///
    /// The media descriptions of `sdp` become the baseline of future offers, so transport
    /// information set by the caller (e.g. ports) is kept stable across renegotiations.
    pub fn set_local_description(&mut self, sdp: &SessionDescription) -> Result<()> {
        match self.state {
            NegotiationState::LocalOffer | NegotiationState::RemoteOffer => {}
            NegotiationState::Negotiated => return Err(Error::AlreadyNegotiated),
            state => {
                return Err(Error::InvalidTransition {
                    operation: "set_local_description",
                    state,
                })
            }
        }

        let Some(pending) = self.pending.take() else {
            return Err(Error::InvalidTransition {
                operation: "set_local_description",
                state: self.state,
            });
        };

        if sdp.media_descriptions.len() != pending.slots.len() {
            let expected = pending.slots.len();
            self.pending = Some(pending);

            return Err(Error::invalid_parameter(format!(
                "local description must contain {expected} media descriptions, got {}",
                sdp.media_descriptions.len()
            )));
        }

        let kind = pending.kind;

        self.commit(pending, sdp);

        match kind {
            PendingKind::Offer { .. } => {
                self.state = NegotiationState::WaitNego;
            }
            PendingKind::Answer => {
                for (slot, media) in self.slots.iter().zip(&sdp.media_descriptions) {
                    if let Some(handler) = slot.handler {
                        self.callbacks.on_media_answered(handler, media, false);
                    }
                }

                self.state = NegotiationState::Negotiated;
            }
        }

        log::debug!(
            "committed local description version={} state={}",
            self.version,
            self.state
        );

        Ok(())
    }

    fn commit(&mut self, pending: Pending, sdp: &SessionDescription) {
        for binding in pending.bindings {
            if let Some(entry) = self.handlers.get_mut(binding.handler) {
                entry.slot = Some(binding.slot);

                if binding.mid.is_some() {
                    entry.mid = binding.mid;
                }
            }
        }

        self.slots = pending
            .slots
            .into_iter()
            .zip(&sdp.media_descriptions)
            .map(|(handler, media)| Slot {
                handler,
                media: media.clone(),
            })
            .collect();

        self.mids = pending.mids;
        self.committed = Some(comparable_text(sdp));
        self.version = pending.version;
        self.local_description = Some(sdp.clone());
    }

    pub fn set_remote_description(&mut self, sdp: SessionDescription) -> Result<()> {
        match self.state {
            NegotiationState::Unnegotiated | NegotiationState::Negotiated => {
                if sdp.media_descriptions.len() < self.slots.len() {
                    return Err(Error::invalid_parameter(format!(
                        "remote offer must contain at least {} media descriptions, got {}",
                        self.slots.len(),
                        sdp.media_descriptions.len()
                    )));
                }

                self.last_remote_offer = Some(sdp.clone());
                self.remote_description = Some(sdp);
                self.pending = None;
                self.state = NegotiationState::RemoteOffer;
            }
            NegotiationState::WaitNego => {
                if sdp.media_descriptions.len() != self.slots.len() {
                    return Err(Error::invalid_parameter(format!(
                        "remote answer must contain {} media descriptions, got {}",
                        self.slots.len(),
                        sdp.media_descriptions.len()
                    )));
                }

                for (slot, media) in self.slots.iter().zip(&sdp.media_descriptions) {
                    if let Some(handler) = slot.handler {
                        self.callbacks.on_media_answered(handler, media, true);
                    }
                }

                self.remote_description = Some(sdp);
                self.state = NegotiationState::Negotiated;
            }
            state => {
                return Err(Error::InvalidTransition {
                    operation: "set_remote_description",
                    state,
                })
            }
        }

        log::debug!("applied remote description state={}", self.state);

        Ok(())
    }

    pub fn set_remote_sdp(&mut self, sdp: &str) -> Result<()> {
        let sdp = parse_sdp(sdp)?;
        self.set_remote_description(sdp)
    }

    fn on_demand_count(&self, media_type: &MediaType) -> usize {
        self.handlers
            .values()
            .filter(|entry| entry.on_demand && entry.media_type == *media_type)
            .count()
    }

    /// Ask the callbacks for a handler for the given media, respecting the configured limits
    fn request_handler(&mut self, media: &MediaDescription) -> Option<HandlerId> {
        let media_type = &media.media.media_type;

        if self.on_demand_count(media_type) >= self.config.handler_limit(media_type) {
            log::debug!("handler limit for {media_type} reached");
            return None;
        }

        let handler = self.callbacks.on_handler_required(media)?;

        if !handler.supports_media(media_type) {
            log::warn!("handler returned by on_handler_required does not support {media_type}");
            return None;
        }

        Some(self.insert_handler(*media_type, handler, true))
    }

    fn build_description(
        &self,
        media_descriptions: Vec<MediaDescription>,
        groups: &[crate::sdp::Group],
    ) -> SessionDescription {
        SessionDescription {
            name: self.config.session_name.as_str().into(),
            origin: Origin {
                username: self.config.username.as_str().into(),
                session_id: self.session_id.to_string().into(),
                session_version: self.version.to_string().into(),
                address: self.address.into(),
            },
            time: Time { start: 0, stop: 0 },
            direction: Direction::SendRecv,
            connection: Some(Connection {
                address: self.address.into(),
                ttl: None,
                num: None,
            }),
            bandwidth: vec![],
            ice_options: IceOptions::default(),
            ice_lite: false,
            ice_ufrag: None,
            ice_pwd: None,
            attributes: groups.iter().map(AttributeValue::to_attribute).collect(),
            media_descriptions,
        }
    }

    /// Set the version of a new local description
    ///
    /// The version increments if the description differs from the last committed one.
    fn stamp_version(&self, sdp: &mut SessionDescription) -> u64 {
        let version = if self.committed.as_deref() == Some(comparable_text(sdp).as_str()) {
            self.version
        } else {
            self.version + 1
        };

        sdp.origin.session_version = version.to_string().into();

        version
    }
}

fn comparable_text(sdp: &SessionDescription) -> String {
    let mut sdp = sdp.clone();
    sdp.origin.session_version = "0".into();
    sdp.to_string()
}
