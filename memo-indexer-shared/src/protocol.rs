//! Protocol rules for memo payloads.
//!
//! Byte ceilings per action kind, the closed set of poll types and the fee
//! shape used when building protocol-compliant transactions. Everything in
//! here is a constant or a pure function.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ActionKind;

/// First byte of the protocol marker push (`0x6d KIND`).
pub const MEMO_PREFIX: u8 = 0x6d;

pub const MAX_POST_SIZE: usize = 217;
pub const MAX_REPLY_SIZE: usize = 184;
pub const MAX_TAG_MESSAGE_SIZE: usize = 217;
pub const MAX_POLL_QUESTION_SIZE: usize = 213;
pub const MAX_POLL_RESPONSE_SIZE: usize = 184;

/// Width of a transaction hash carried inside a payload.
pub const TX_HASH_SIZE: usize = 32;
/// Width of a public-key-hash carried inside a payload.
pub const PK_HASH_SIZE: usize = 20;

pub const BASE_TX_FEE: u64 = 192;
pub const MAX_TX_FEE: u64 = 425;
pub const ADDITIONAL_OUTPUT_FEE: u64 = 34;
pub const ADDITIONAL_INPUT_FEE: u64 = 181;

/// Minimum fee for a transaction with the given output and input counts.
///
/// Every output beyond the first adds [`ADDITIONAL_OUTPUT_FEE`], every input
/// beyond the first adds [`ADDITIONAL_INPUT_FEE`], and the total never exceeds
/// [`MAX_TX_FEE`].
pub fn fee(outputs: u64, inputs: u64) -> u64 {
    let fee = BASE_TX_FEE
        + outputs.saturating_sub(1) * ADDITIONAL_OUTPUT_FEE
        + inputs.saturating_sub(1) * ADDITIONAL_INPUT_FEE;
    fee.min(MAX_TX_FEE)
}

/// Maximum payload text size for an action kind, if the kind carries text.
pub fn max_payload_size(kind: ActionKind) -> Option<usize> {
    match kind {
        ActionKind::SetName => Some(MAX_TAG_MESSAGE_SIZE),
        ActionKind::Post => Some(MAX_POST_SIZE),
        ActionKind::Reply => Some(MAX_REPLY_SIZE),
        ActionKind::TagMessage => Some(MAX_TAG_MESSAGE_SIZE),
        ActionKind::PollQuestion => Some(MAX_POLL_QUESTION_SIZE),
        ActionKind::PollResponse => Some(MAX_POLL_RESPONSE_SIZE),
        ActionKind::Like | ActionKind::Follow | ActionKind::Unfollow => None,
    }
}

/// Kind of poll created by a poll question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollType {
    /// Exactly one option may be chosen.
    One,
    /// Any number of options may be chosen.
    Any,
    /// Options are ranked.
    Rank,
}

impl PollType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollType::One => "one",
            PollType::Any => "any",
            PollType::Rank => "rank",
        }
    }
}

impl fmt::Display for PollType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a poll type tag is outside the closed enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown poll type: {0:?}")]
pub struct UnknownPollType(pub String);

impl FromStr for PollType {
    type Err = UnknownPollType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one" => Ok(PollType::One),
            "any" => Ok(PollType::Any),
            "rank" => Ok(PollType::Rank),
            other => Err(UnknownPollType(other.to_string())),
        }
    }
}

const OP_RETURN: u8 = 0x6a;
const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const OP_PUSHDATA4: u8 = 0x4e;

/// Builds an `OP_RETURN` output script carrying a memo payload.
///
/// The first push is the protocol marker for `kind`, followed by one push per
/// field in `fields`.
pub fn build_memo_script(kind: ActionKind, fields: &[&[u8]]) -> Vec<u8> {
    let mut script = vec![OP_RETURN];
    push_data(&mut script, &[MEMO_PREFIX, kind.as_byte()]);
    for field in fields {
        push_data(&mut script, field);
    }
    script
}

fn push_data(script: &mut Vec<u8>, data: &[u8]) {
    match data.len() {
        len @ 0..=75 => script.push(len as u8),
        len @ 76..=0xff => {
            script.push(OP_PUSHDATA1);
            script.push(len as u8);
        }
        len @ 0x100..=0xffff => {
            script.push(OP_PUSHDATA2);
            script.extend_from_slice(&(len as u16).to_le_bytes());
        }
        len => {
            script.push(OP_PUSHDATA4);
            script.extend_from_slice(&(len as u32).to_le_bytes());
        }
    }
    script.extend_from_slice(data);
}
