//! Retransmission identity between two decoded messages.
//!
//! Aircraft repeat a message until it is acknowledged, and several ground
//! receivers can hear the same uplink. Two records describe the same physical
//! message when their discrete header fields match and they were received
//! within an hour of each other.
//!
//! The window is measured per pair, so the relation is not transitive
//! (A~B and B~C do not imply A~C). Use [`same`] to compare pairs; never group
//! by it or use it as a hash key.

use crate::types::AcarsMessage;

/// Largest reception-time gap in milliseconds, inclusive, between two copies
/// of one message.
pub const RETRANSMISSION_WINDOW_MS: i64 = 3_600_000;

/// True if `a` and `b` are copies of the same logical message.
pub fn same(a: &AcarsMessage, b: &AcarsMessage) -> bool {
    within_window(a, b)
        && a.channel == b.channel
        && a.mode == b.mode
        && a.block_id == b.block_id
        && a.registration == b.registration
        && a.label == b.label
        && a.msg_id == b.msg_id
        && a.flight_id == b.flight_id
}

fn within_window(a: &AcarsMessage, b: &AcarsMessage) -> bool {
    (a.timestamp - b.timestamp).num_milliseconds().abs() <= RETRANSMISSION_WINDOW_MS
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone, Utc};

    fn msg() -> AcarsMessage {
        AcarsMessage {
            timestamp: Utc.with_ymd_and_hms(2016, 7, 28, 14, 5, 0).unwrap(),
            channel: 2,
            error_count: 0,
            signal_level: 180,
            mode: '2',
            registration: "N12345".into(),
            ack: '!',
            label: "H1".into(),
            block_id: 'D',
            msg_id: "M01A".into(),
            flight_id: "AF0123".into(),
            text: "POSITION REPORT".into(),
            frequency: None,
        }
    }

    fn shifted(ms: i64) -> AcarsMessage {
        let mut m = msg();
        m.timestamp += TimeDelta::milliseconds(ms);
        m
    }

    #[test]
    fn test_reflexive() {
        let a = msg();
        assert!(same(&a, &a));
    }

    #[test]
    fn test_window_boundary_inclusive() {
        let a = msg();
        assert!(same(&a, &shifted(3_600_000)));
        assert!(same(&a, &shifted(-3_600_000)));
    }

    #[test]
    fn test_window_boundary_exclusive() {
        let a = msg();
        assert!(!same(&a, &shifted(3_600_001)));
        assert!(!same(&a, &shifted(-3_600_001)));
    }

    #[test]
    fn test_order_independent() {
        let a = msg();
        let b = shifted(3_599_000);
        assert_eq!(same(&a, &b), same(&b, &a));
        let c = shifted(3_600_001);
        assert_eq!(same(&a, &c), same(&c, &a));
    }

    #[test]
    fn test_label_mismatch_never_same() {
        let a = msg();
        let mut b = msg();
        b.label = "5Z".into();
        assert!(!same(&a, &b));
        b.timestamp = a.timestamp;
        assert!(!same(&a, &b));
    }

    #[test]
    fn test_discrete_field_mismatches() {
        let a = msg();
        let tweaks: [fn(&mut AcarsMessage); 6] = [
            |m| m.channel = 1,
            |m| m.mode = 'X',
            |m| m.block_id = '5',
            |m| m.registration = "N54321".into(),
            |m| m.msg_id = "M02A".into(),
            |m| m.flight_id = "AF0124".into(),
        ];
        for tweak in tweaks {
            let mut b = msg();
            tweak(&mut b);
            assert!(!same(&a, &b));
        }
    }

    #[test]
    fn test_ignores_payload_and_signal() {
        let a = msg();
        let mut b = shifted(30_000);
        b.text = "DIFFERENT".into();
        b.error_count = 2;
        b.signal_level = -10;
        b.ack = 'A';
        b.frequency = Some("131.725".into());
        assert!(same(&a, &b));
    }

    #[test]
    fn test_not_transitive() {
        let a = msg();
        let b = shifted(3_000_000);
        let c = shifted(6_000_000);
        assert!(same(&a, &b));
        assert!(same(&b, &c));
        assert!(!same(&a, &c));
    }
}
