use ezk_sdp_agent::sdp::MediaDescriptionExt;
use ezk_sdp_agent::sdp_types::{Direction, MediaDescription, MediaType, SessionDescription};
use ezk_sdp_agent::{
    codecs, AgentCallbacks, Error, MediaHandler, NegotiationState, PayloadManager,
    RtpMediaHandler, SdpAgent, SdpAgentConfig,
};
use parking_lot::Mutex;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn agent(octet: u8) -> SdpAgent {
    agent_with_config(octet, SdpAgentConfig::default())
}

fn agent_with_config(octet: u8, config: SdpAgentConfig) -> SdpAgent {
    SdpAgent::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, octet)), config)
}

fn audio_handler() -> Box<dyn MediaHandler> {
    let mut handler = RtpMediaHandler::avp().with_payload_manager(PayloadManager::shared());
    handler.add_audio_codec(codecs::PCMU).unwrap();
    Box::new(handler)
}

fn video_handler() -> Box<dyn MediaHandler> {
    let mut handler = RtpMediaHandler::avp().with_payload_manager(PayloadManager::shared());
    handler.add_video_codec(codecs::VP8).unwrap();
    Box::new(handler)
}

/// Run a complete offer/answer exchange, returns the offer and answer
fn negotiate(
    offerer: &mut SdpAgent,
    answerer: &mut SdpAgent,
) -> (SessionDescription, SessionDescription) {
    let offer = offerer.create_offer().unwrap();
    offerer.set_local_description(&offer).unwrap();

    answerer.set_remote_sdp(&offer.to_string()).unwrap();
    let answer = answerer.create_answer().unwrap();
    answerer.set_local_description(&answer).unwrap();

    offerer.set_remote_sdp(&answer.to_string()).unwrap();

    assert_eq!(offerer.state(), NegotiationState::Negotiated);
    assert_eq!(answerer.state(), NegotiationState::Negotiated);
    assert_eq!(offer.media_descriptions.len(), answer.media_descriptions.len());

    (offer, answer)
}

fn mids(sdp: &SessionDescription) -> Vec<Option<&str>> {
    sdp.media_descriptions.iter().map(|media| media.mid()).collect()
}

fn session_version(sdp: &SessionDescription) -> u64 {
    sdp.origin.session_version.parse().unwrap()
}

fn origin_session_id(sdp: &SessionDescription) -> u64 {
    sdp.origin.session_id.parse().unwrap()
}

fn rtpmaps(media: &MediaDescription) -> Vec<String> {
    media.rtpmaps.iter().map(ToString::to_string).collect()
}

#[test]
fn slot_index_survives_rejection() {
    init_logger();

    let mut offerer = agent(1);
    let audio = offerer.add_proto_handler(MediaType::Audio, audio_handler()).unwrap();
    let video = offerer.add_proto_handler(MediaType::Video, video_handler()).unwrap();

    let mut answerer = agent(2);
    answerer.add_proto_handler(MediaType::Audio, audio_handler()).unwrap();

    let (_, answer) = negotiate(&mut offerer, &mut answerer);
    assert!(answer.media_descriptions[1].is_rejected());

    assert_eq!(offerer.get_handler_index(audio), Some(0));
    assert_eq!(offerer.get_handler_index(video), Some(1));

    for _ in 0..2 {
        let (offer, answer) = negotiate(&mut offerer, &mut answerer);

        assert_eq!(offer.media_descriptions[1].media.media_type, MediaType::Video);
        assert!(answer.media_descriptions[1].is_rejected());
        assert_eq!(offerer.get_handler_index(audio), Some(0));
        assert_eq!(offerer.get_handler_index(video), Some(1));
    }
}

#[test]
fn removed_handler_slot_is_reused() {
    init_logger();

    let mut offerer = agent(1);
    let audio = offerer.add_proto_handler(MediaType::Audio, audio_handler()).unwrap();
    let video = offerer.add_proto_handler(MediaType::Video, video_handler()).unwrap();

    let mut answerer = agent(2);
    answerer.add_proto_handler(MediaType::Audio, audio_handler()).unwrap();
    answerer.add_proto_handler(MediaType::Video, video_handler()).unwrap();

    let (offer, _) = negotiate(&mut offerer, &mut answerer);
    assert_eq!(mids(&offer), [Some("audio0"), Some("video0")]);

    assert!(offerer.remove_proto_handler(audio).unwrap());
    assert_eq!(offerer.get_handler_index(audio), None);

    // Without a replacement the slot stays, disabled
    let offer = offerer.create_offer().unwrap();
    assert_eq!(offer.media_descriptions.len(), 2);
    assert!(offer.media_descriptions[0].is_rejected());
    assert_eq!(mids(&offer), [Some("audio0"), Some("video0")]);
    offerer.cancel_offer().unwrap();

    let replacement = offerer.add_proto_handler(MediaType::Audio, audio_handler()).unwrap();

    let (offer, answer) = negotiate(&mut offerer, &mut answerer);
    assert_eq!(offer.media_descriptions.len(), 2);
    assert_eq!(mids(&offer), [Some("audio1"), Some("video0")]);
    assert!(!answer.media_descriptions[0].is_rejected());
    assert_eq!(mids(&answer), [Some("audio1"), Some("video0")]);

    assert_eq!(offerer.get_handler_index(replacement), Some(0));
    assert_eq!(offerer.get_handler_mid(replacement), Some("audio1"));
    assert_eq!(offerer.get_handler_index(video), Some(1));
}

#[test]
fn vacant_slots_are_filled_in_ascending_order() {
    init_logger();

    let mut offerer = agent(1);
    let audio = offerer.add_proto_handler(MediaType::Audio, audio_handler()).unwrap();
    let video = offerer.add_proto_handler(MediaType::Video, video_handler()).unwrap();
    let kept = offerer.add_proto_handler(MediaType::Audio, audio_handler()).unwrap();

    let mut answerer = agent(2);
    negotiate(&mut offerer, &mut answerer);

    offerer.remove_proto_handler(video).unwrap();
    offerer.remove_proto_handler(audio).unwrap();

    let new_video = offerer.add_proto_handler(MediaType::Video, video_handler()).unwrap();
    let new_audio = offerer.add_proto_handler(MediaType::Audio, audio_handler()).unwrap();
    let appended = offerer.add_proto_handler(MediaType::Audio, audio_handler()).unwrap();

    let offer = offerer.create_offer().unwrap();
    offerer.set_local_description(&offer).unwrap();

    assert_eq!(offerer.get_handler_index(new_video), Some(0));
    assert_eq!(offerer.get_handler_index(new_audio), Some(1));
    assert_eq!(offerer.get_handler_index(kept), Some(2));
    assert_eq!(offerer.get_handler_index(appended), Some(3));

    assert_eq!(
        mids(&offer),
        [
            Some("video1"),
            Some("audio2"),
            Some("audio1"),
            Some("audio3")
        ]
    );
}

#[test]
fn version_increments_only_on_change() {
    init_logger();

    let mut offerer = agent(1);
    let audio = offerer.add_proto_handler(MediaType::Audio, audio_handler()).unwrap();

    let mut answerer = agent(2);
    answerer.add_proto_handler(MediaType::Audio, audio_handler()).unwrap();

    let initial = offerer.version();
    let session_id = offerer.session_id();

    let (first, _) = negotiate(&mut offerer, &mut answerer);
    assert_eq!(session_version(&first), initial + 1);
    assert_eq!(origin_session_id(&first), session_id);
    assert_eq!(offerer.version(), initial + 1);

    // Identical offer
    let (second, _) = negotiate(&mut offerer, &mut answerer);
    assert_eq!(second.to_string(), first.to_string());
    assert_eq!(offerer.version(), initial + 1);

    offerer
        .handler_mut::<RtpMediaHandler>(audio)
        .unwrap()
        .unwrap()
        .set_direction(Direction::SendOnly);

    // Cancelled offers do not count
    let cancelled = offerer.create_offer().unwrap();
    assert_eq!(session_version(&cancelled), initial + 2);
    offerer.cancel_offer().unwrap();
    assert_eq!(offerer.state(), NegotiationState::Negotiated);
    assert_eq!(offerer.version(), initial + 1);

    let (third, answer) = negotiate(&mut offerer, &mut answerer);
    assert_eq!(session_version(&third), initial + 2);
    assert_eq!(origin_session_id(&third), session_id);
    assert_eq!(offerer.version(), initial + 2);
    assert!(matches!(third.media_descriptions[0].direction, Direction::SendOnly));
    assert!(matches!(answer.media_descriptions[0].direction, Direction::RecvOnly));
}

#[test]
fn reoffer_after_answering_remapped_payload_types() {
    init_logger();

    // The offerer's VP8 ends up on 97 because red took 96
    let mut offerer_video = RtpMediaHandler::avp().with_payload_manager(PayloadManager::shared());
    offerer_video.add_generic_video_payload(codecs::RED).unwrap();
    offerer_video.add_video_codec(codecs::VP8).unwrap();

    let mut offerer = agent(1);
    offerer
        .add_proto_handler(MediaType::Video, Box::new(offerer_video))
        .unwrap();

    // Locally 97 belongs to H264, so VP8 cannot adopt the offered payload type
    let mut answerer_video = RtpMediaHandler::avp().with_payload_manager(PayloadManager::shared());
    answerer_video.add_video_codec(codecs::VP8).unwrap();
    answerer_video.add_video_codec(codecs::H264).unwrap();

    let mut answerer = agent(2);
    let video = answerer
        .add_proto_handler(MediaType::Video, Box::new(answerer_video))
        .unwrap();

    let (offer, answer) = negotiate(&mut offerer, &mut answerer);
    assert_eq!(offer.media_descriptions[0].media.fmts, [96, 97]);

    let answered = &answer.media_descriptions[0];
    assert_eq!(answered.media.fmts, [97]);
    assert_eq!(rtpmaps(answered), ["a=rtpmap:97 VP8/90000"]);

    let handler = answerer.handler::<RtpMediaHandler>(video).unwrap();
    assert_eq!(handler.payload_type(&MediaType::Video, codecs::VP8), Some(96));

    // The former answerer offers now and keeps port and payload type of the answer
    let (reoffer, reanswer) = negotiate(&mut answerer, &mut offerer);

    let reoffered = &reoffer.media_descriptions[0];
    assert_eq!(reoffered.media.port, answered.media.port);
    assert_eq!(reoffered.media.fmts, [97]);
    assert_eq!(rtpmaps(reoffered), ["a=rtpmap:97 VP8/90000"]);
    assert_eq!(reoffered.mid(), Some("video0"));

    let reanswered = &reanswer.media_descriptions[0];
    assert!(!reanswered.is_rejected());
    assert_eq!(reanswered.media.fmts, [97]);

    // And again, nothing changes for an identical offer
    let (again, _) = negotiate(&mut answerer, &mut offerer);
    assert_eq!(again.to_string(), reoffer.to_string());
}

#[test]
fn cancel_offer_restores_unnegotiated() {
    init_logger();

    let mut offerer = agent(1);
    let audio = offerer.add_proto_handler(MediaType::Audio, audio_handler()).unwrap();

    let initial = offerer.version();

    offerer.create_offer().unwrap();
    offerer.cancel_offer().unwrap();

    assert_eq!(offerer.state(), NegotiationState::Unnegotiated);
    assert_eq!(offerer.version(), initial);
    assert!(offerer.local_description().is_none());
    assert_eq!(offerer.get_handler_index(audio), None);

    // The cancelled offer reserved no mid
    let offer = offerer.create_offer().unwrap();
    assert_eq!(mids(&offer), [Some("audio0")]);
}

#[test]
fn remote_renegotiation() {
    init_logger();

    let mut first = agent(1);
    let audio = first.add_proto_handler(MediaType::Audio, audio_handler()).unwrap();
    let video = first.add_proto_handler(MediaType::Video, video_handler()).unwrap();

    let mut second = agent(2);
    second.add_proto_handler(MediaType::Audio, audio_handler()).unwrap();
    second.add_proto_handler(MediaType::Video, video_handler()).unwrap();

    negotiate(&mut first, &mut second);

    // The answerer of the first negotiation offers now
    let (offer, answer) = negotiate(&mut second, &mut first);
    assert_eq!(mids(&offer), [Some("audio0"), Some("video0")]);
    assert!(answer.media_descriptions.iter().all(|media| !media.is_rejected()));

    assert_eq!(first.get_handler_index(audio), Some(0));
    assert_eq!(first.get_handler_index(video), Some(1));

    // A remote offer must not drop media
    let mut truncated = second.create_offer().unwrap();
    second.cancel_offer().unwrap();
    truncated.media_descriptions.pop();

    assert!(matches!(
        first.set_remote_description(truncated),
        Err(Error::InvalidParameter(_))
    ));
    assert_eq!(first.state(), NegotiationState::Negotiated);
}

/// Creates handlers for the allowed media types
#[derive(Clone, Default)]
struct OnDemand {
    allowed: Arc<Mutex<Vec<MediaType>>>,
    requests: Arc<AtomicUsize>,
}

impl OnDemand {
    fn allow(&self, media_type: MediaType) {
        self.allowed.lock().push(media_type);
    }
}

impl AgentCallbacks for OnDemand {
    fn on_handler_required(&mut self, media: &MediaDescription) -> Option<Box<dyn MediaHandler>> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        if !self.allowed.lock().contains(&media.media.media_type) {
            return None;
        }

        match media.media.media_type {
            MediaType::Audio => Some(audio_handler()),
            MediaType::Video => Some(video_handler()),
            _ => None,
        }
    }
}

#[test]
fn on_demand_handlers_respect_limit() {
    init_logger();

    let mut offerer = agent(1);
    offerer.add_proto_handler(MediaType::Audio, audio_handler()).unwrap();
    offerer.add_proto_handler(MediaType::Audio, audio_handler()).unwrap();

    let callbacks = OnDemand::default();
    callbacks.allow(MediaType::Audio);

    let mut answerer = agent_with_config(
        2,
        SdpAgentConfig::default().with_handler_limit(MediaType::Audio, 1),
    );
    answerer.set_callbacks(callbacks.clone());

    let (_, answer) = negotiate(&mut offerer, &mut answerer);

    assert!(!answer.media_descriptions[0].is_rejected());
    assert!(answer.media_descriptions[1].is_rejected());
    assert_eq!(callbacks.requests.load(Ordering::SeqCst), 1);
    assert_eq!(answerer.handler_ids().count(), 1);
}

#[test]
fn handlers_for_previous_remote_offer_are_created_lazily() {
    init_logger();

    let mut first = agent(1);
    first.add_proto_handler(MediaType::Audio, audio_handler()).unwrap();
    let video = first.add_proto_handler(MediaType::Video, video_handler()).unwrap();

    let callbacks = OnDemand::default();
    callbacks.allow(MediaType::Audio);

    let mut second = agent(2);
    second.set_callbacks(callbacks.clone());

    let (_, answer) = negotiate(&mut first, &mut second);
    assert!(!answer.media_descriptions[0].is_rejected());
    assert!(answer.media_descriptions[1].is_rejected());
    assert_eq!(second.handler_ids().count(), 1);

    // Video still refused, nothing is created
    second.create_offer().unwrap();
    second.cancel_offer().unwrap();
    assert_eq!(second.handler_ids().count(), 1);

    callbacks.allow(MediaType::Video);

    // Cancelling removes the created handler again
    let offer = second.create_offer().unwrap();
    assert!(!offer.media_descriptions[1].is_rejected());
    assert_eq!(second.handler_ids().count(), 2);
    second.cancel_offer().unwrap();
    assert_eq!(second.handler_ids().count(), 1);

    let (offer, answer) = negotiate(&mut second, &mut first);
    assert_eq!(offer.media_descriptions[1].media.media_type, MediaType::Video);
    assert!(!offer.media_descriptions[1].is_rejected());
    assert!(!answer.media_descriptions[1].is_rejected());

    let mut indices: Vec<usize> = second
        .handler_ids()
        .filter_map(|id| second.get_handler_index(id))
        .collect();
    indices.sort_unstable();
    assert_eq!(indices, [0, 1]);

    assert_eq!(first.get_handler_index(video), Some(1));
}
