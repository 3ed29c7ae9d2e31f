//! Shared types, error enums, and the decoded ACARS message.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Why a datagram could not be decoded into an [`AcarsMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("truncated record: need at least {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },
    #[error("invalid date/time {0:?}")]
    InvalidDateTime(String),
    #[error("invalid {field}: {value:?} is not an integer")]
    InvalidNumber { field: &'static str, value: String },
    #[error("invalid {field}: not valid text")]
    InvalidField { field: &'static str },
}

/// All errors produced by acars-core.
#[derive(Debug, Error)]
pub enum AcarsError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AcarsError>;

/// Date/time layout used on the wire and in the human-readable rendering.
pub const DATE_TIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

// ---------------------------------------------------------------------------
// Decoded message
// ---------------------------------------------------------------------------

/// One ACARS transmission as reported by acarsdec.
///
/// Built once per datagram by [`crate::decode::decode`]. Only `frequency` is
/// filled in afterwards, by [`crate::enrich::ChannelPlan::enrich`].
///
/// There is deliberately no `PartialEq` here: retransmission identity is the
/// pairwise [`crate::identity::same`] comparator, which is not transitive.
#[derive(Debug, Clone, Serialize)]
pub struct AcarsMessage {
    /// Reception time, UTC, second precision.
    pub timestamp: DateTime<Utc>,
    /// Receiver channel index.
    pub channel: u8,
    /// Bit errors corrected while demodulating.
    pub error_count: u8,
    /// Receive power level as reported by the decoder.
    pub signal_level: i32,
    pub mode: char,
    /// Aircraft tail number with the leading '.' padding removed.
    pub registration: String,
    pub ack: char,
    /// 2-character message type code.
    pub label: String,
    pub block_id: char,
    /// 4 characters.
    pub msg_id: String,
    /// 6 characters.
    pub flight_id: String,
    /// Free-form payload, empty when the record carries none.
    pub text: String,
    /// Frequency (MHz) of the channel, when the channel plan knows it.
    pub frequency: Option<String>,
}

impl fmt::Display for AcarsMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "-------------------------------------------------------------------"
        )?;
        write!(
            f,
            "{}    channel: {}",
            self.timestamp.format(DATE_TIME_FORMAT),
            self.channel
        )?;
        if let Some(freq) = &self.frequency {
            write!(f, "   frequency: {freq} MHz")?;
        }
        writeln!(f, "   err: {}   level: {}", self.error_count, self.signal_level)?;
        writeln!(
            f,
            "Registration: {}   FlightID: {}",
            self.registration, self.flight_id
        )?;
        writeln!(
            f,
            "Mode: {}   label: {}   ack: {}   BlockID: {}   MsgID: {}",
            self.mode, self.label, self.ack, self.block_id, self.msg_id
        )?;
        writeln!(f, "Message:")?;
        write!(f, "{}", self.text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
