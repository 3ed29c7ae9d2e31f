//! Channel → frequency enrichment.
//!
//! acarsdec only reports the index of the channel a message was heard on.
//! The operator lists the frequency tuned on each channel in the config
//! file (`channels.1`, `channels.2`, ...), and that list fills in
//! [`AcarsMessage::frequency`] after decoding.

use crate::types::AcarsMessage;

/// Frequencies (MHz, as written in the config) indexed by channel number,
/// starting at channel 1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelPlan {
    frequencies: Vec<String>,
}

impl ChannelPlan {
    pub fn new(frequencies: Vec<String>) -> Self {
        ChannelPlan { frequencies }
    }

    /// Frequency tuned on `channel`, if configured. Channel 0 is never known.
    pub fn frequency_for(&self, channel: u8) -> Option<&str> {
        let idx = (channel as usize).checked_sub(1)?;
        self.frequencies.get(idx).map(String::as_str)
    }

    /// Set `message.frequency` from the plan; leaves it `None` if unknown.
    pub fn enrich(&self, message: &mut AcarsMessage) {
        message.frequency = self.frequency_for(message.channel).map(str::to_string);
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;

    const RECORD: &[u8] =
        b"[#1 ACAR 2 28/07/2016 14:05:00 0 180 2 .N12345 ! H1 D M01A AF0123  #DFB";

    fn plan() -> ChannelPlan {
        ChannelPlan::new(vec!["131.525".into(), "131.725".into()])
    }

    #[test]
    fn test_frequency_for_one_based() {
        let p = plan();
        assert_eq!(p.frequency_for(1), Some("131.525"));
        assert_eq!(p.frequency_for(2), Some("131.725"));
        assert_eq!(p.frequency_for(3), None);
        assert_eq!(p.frequency_for(0), None);
    }

    #[test]
    fn test_enrich_sets_frequency() {
        let mut msg = decode(RECORD).unwrap();
        plan().enrich(&mut msg);
        assert_eq!(msg.frequency.as_deref(), Some("131.725"));
    }

    #[test]
    fn test_enrich_unknown_channel() {
        let mut msg = decode(RECORD).unwrap();
        ChannelPlan::default().enrich(&mut msg);
        assert!(msg.frequency.is_none());
    }
}
