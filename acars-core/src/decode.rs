//! Decode acarsdec's fixed-column text records into [`AcarsMessage`]s.
//!
//! One record per UDP datagram, no delimiters, fields found by 0-indexed
//! byte offset:
//!
//! ```text
//! [9]      channel digit
//! [11..]   date/time  dd/MM/yyyy HH:mm:ss
//! [31]     error count digit
//! [33..36) signal level
//! [37]     mode
//! [39..46) registration, dot-padded on the left
//! [47]     ack
//! [49..51) label
//! [52]     block id
//! [54..58) message id
//! [59..65) flight id
//! [67..)   text
//! ```
//!
//! Decoding is a pure function of the input bytes: no shared parser state,
//! so datagrams can be decoded from any number of threads.

use std::borrow::Cow;
use std::ops::Range;
use std::str::FromStr;

use chrono::NaiveDateTime;

use crate::types::{AcarsMessage, DecodeError, DATE_TIME_FORMAT};

/// End of the last fixed field (flight id). Shorter records are truncated.
pub const MIN_RECORD_LEN: usize = 65;

/// Offset of the free-text payload.
pub const TEXT_OFFSET: usize = 67;

const CHANNEL: Range<usize> = 9..10;
const DATE_TIME_START: usize = 11;
const DATE_TIME_WIDTH: usize = 19;
const ERROR_COUNT: Range<usize> = 31..32;
const SIGNAL_LEVEL: Range<usize> = 33..36;
const MODE: usize = 37;
const REGISTRATION: Range<usize> = 39..46;
const ACK: usize = 47;
const LABEL: Range<usize> = 49..51;
const BLOCK_ID: usize = 52;
const MSG_ID: Range<usize> = 54..58;
const FLIGHT_ID: Range<usize> = 59..65;

/// Decode one datagram payload.
///
/// Either every field is extracted or a [`DecodeError`] is returned; there is
/// no partially decoded message.
pub fn decode(raw: &[u8]) -> Result<AcarsMessage, DecodeError> {
    if raw.len() < MIN_RECORD_LEN {
        return Err(DecodeError::Truncated {
            needed: MIN_RECORD_LEN,
            actual: raw.len(),
        });
    }

    let timestamp = parse_timestamp(&raw[DATE_TIME_START..MIN_RECORD_LEN])?;

    let text = if raw.len() > TEXT_OFFSET {
        String::from_utf8_lossy(&raw[TEXT_OFFSET..]).into_owned()
    } else {
        String::new()
    };

    Ok(AcarsMessage {
        timestamp,
        channel: number(raw, CHANNEL, "channel")?,
        error_count: number(raw, ERROR_COUNT, "error count")?,
        signal_level: number(raw, SIGNAL_LEVEL, "signal level")?,
        mode: single(raw, MODE, "mode")?,
        registration: strip_registration(field(raw, REGISTRATION, "registration")?).to_string(),
        ack: single(raw, ACK, "ack")?,
        label: field(raw, LABEL, "label")?.to_string(),
        block_id: single(raw, BLOCK_ID, "block id")?,
        msg_id: field(raw, MSG_ID, "message id")?.to_string(),
        flight_id: field(raw, FLIGHT_ID, "flight id")?.to_string(),
        text,
        frequency: None,
    })
}

/// Remove the '.' padding acarsdec puts in front of short registrations.
///
/// `"..N1234"` becomes `"N1234"`; an all-dot field becomes `""`.
pub fn strip_registration(reg: &str) -> &str {
    reg.trim_start_matches('.')
}

/// Parse the date/time that starts at the head of `tail`.
///
/// Anything after the seconds is left alone; the remaining fields are read
/// by fixed offset regardless of where the date ended.
fn parse_timestamp(tail: &[u8]) -> Result<chrono::DateTime<chrono::Utc>, DecodeError> {
    let tail: Cow<'_, str> = String::from_utf8_lossy(tail);
    NaiveDateTime::parse_and_remainder(&tail, DATE_TIME_FORMAT)
        .map(|(dt, _rest)| dt.and_utc())
        .map_err(|_| {
            let shown: String = tail.chars().take(DATE_TIME_WIDTH).collect();
            DecodeError::InvalidDateTime(shown)
        })
}

fn field<'a>(
    raw: &'a [u8],
    range: Range<usize>,
    name: &'static str,
) -> Result<&'a str, DecodeError> {
    std::str::from_utf8(&raw[range]).map_err(|_| DecodeError::InvalidField { field: name })
}

fn single(raw: &[u8], at: usize, name: &'static str) -> Result<char, DecodeError> {
    field(raw, at..at + 1, name)?
        .chars()
        .next()
        .ok_or(DecodeError::InvalidField { field: name })
}

fn number<T: FromStr>(
    raw: &[u8],
    range: Range<usize>,
    name: &'static str,
) -> Result<T, DecodeError> {
    let s = field(raw, range, name)?;
    s.parse().map_err(|_| DecodeError::InvalidNumber {
        field: name,
        value: s.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
