use crate::codecs::same_encoding;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::Arc;

pub const DYNAMIC_PAYLOAD_TYPES: RangeInclusive<u8> = 96..=127;

pub type SharedPayloadManager = Arc<Mutex<PayloadManager>>;

/// Allocates dynamic RTP payload types
///
/// Allocation is monotonic, a payload type is never handed out twice. Payload types bound by
/// the peer are remembered so the same binding is reused in later negotiations.
#[derive(Debug)]
pub struct PayloadManager {
    next: u16,
    bindings: BTreeMap<u8, String>,
}

impl Default for PayloadManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadManager {
    pub fn new() -> Self {
        Self {
            next: u16::from(*DYNAMIC_PAYLOAD_TYPES.start()),
            bindings: BTreeMap::new(),
        }
    }

    pub fn shared() -> SharedPayloadManager {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Allocate the next unused dynamic payload type for the given codec
    pub fn get_dynamic_pt(&mut self, codec_name: &str) -> Result<u8> {
        loop {
            let pt = u8::try_from(self.next)
                .ok()
                .filter(|pt| DYNAMIC_PAYLOAD_TYPES.contains(pt))
                .ok_or(Error::Exhausted)?;

            self.next += 1;

            if self.bindings.contains_key(&pt) {
                continue;
            }

            self.bindings.insert(pt, codec_name.to_owned());

            return Ok(pt);
        }
    }

    /// Remember a payload type the peer chose for a codec
    pub fn register_dynamic_pt(&mut self, pt: u8, codec_name: &str) -> Result<()> {
        if !DYNAMIC_PAYLOAD_TYPES.contains(&pt) {
            return Err(Error::invalid_parameter(format!(
                "payload type {pt} is not in the dynamic range"
            )));
        }

        if let Some(previous) = self.bindings.insert(pt, codec_name.to_owned()) {
            if !same_encoding(&previous, codec_name) {
                log::debug!("payload type {pt} rebound from {previous} to {codec_name}");
            }
        }

        self.next = self.next.max(u16::from(pt) + 1);

        Ok(())
    }

    pub fn codec_name(&self, pt: u8) -> Option<&str> {
        self.bindings.get(&pt).map(String::as_str)
    }

    pub fn find_pt(&self, codec_name: &str) -> Option<u8> {
        self.bindings
            .iter()
            .find(|(_, name)| same_encoding(name, codec_name))
            .map(|(pt, _)| *pt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_monotonic() {
        let mut manager = PayloadManager::new();

        assert_eq!(manager.get_dynamic_pt("VP8/90000").unwrap(), 96);
        assert_eq!(manager.get_dynamic_pt("VP9/90000").unwrap(), 97);
        assert_eq!(manager.codec_name(96), Some("VP8/90000"));
        assert_eq!(manager.find_pt("vp9/90000"), Some(97));
    }

    #[test]
    fn exhaustion() {
        let mut manager = PayloadManager::new();

        for expected in DYNAMIC_PAYLOAD_TYPES {
            assert_eq!(manager.get_dynamic_pt("x/1").unwrap(), expected);
        }

        assert!(matches!(manager.get_dynamic_pt("y/1"), Err(Error::Exhausted)));
        assert!(matches!(manager.get_dynamic_pt("y/1"), Err(Error::Exhausted)));
    }

    #[test]
    fn registered_payload_types_are_skipped() {
        let mut manager = PayloadManager::new();

        manager.register_dynamic_pt(100, "H264/90000").unwrap();
        assert_eq!(manager.find_pt("H264/90000"), Some(100));
        assert_eq!(manager.get_dynamic_pt("VP8/90000").unwrap(), 101);

        // registering below the counter never lowers it
        manager.register_dynamic_pt(97, "AV1/90000").unwrap();
        assert_eq!(manager.get_dynamic_pt("VP9/90000").unwrap(), 102);
    }

    #[test]
    fn register_range_check() {
        let mut manager = PayloadManager::new();

        assert!(matches!(
            manager.register_dynamic_pt(0, "PCMU/8000"),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            manager.register_dynamic_pt(128, "x/1"),
            Err(Error::InvalidParameter(_))
        ));
    }
}
