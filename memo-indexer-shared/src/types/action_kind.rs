use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of a protocol action, identified on chain by the byte following the
/// protocol prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SetName,
    Post,
    Reply,
    Like,
    Follow,
    Unfollow,
    TagMessage,
    PollQuestion,
    PollResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown action kind: {0}")]
pub struct UnknownActionKind(pub String);

impl ActionKind {
    pub const ALL: [ActionKind; 9] = [
        ActionKind::SetName,
        ActionKind::Post,
        ActionKind::Reply,
        ActionKind::Like,
        ActionKind::Follow,
        ActionKind::Unfollow,
        ActionKind::TagMessage,
        ActionKind::PollQuestion,
        ActionKind::PollResponse,
    ];

    /// The kind byte carried in the protocol marker.
    pub fn as_byte(&self) -> u8 {
        match self {
            ActionKind::SetName => 0x01,
            ActionKind::Post => 0x02,
            ActionKind::Reply => 0x03,
            ActionKind::Like => 0x04,
            ActionKind::Follow => 0x06,
            ActionKind::Unfollow => 0x07,
            ActionKind::TagMessage => 0x0c,
            ActionKind::PollQuestion => 0x10,
            ActionKind::PollResponse => 0x14,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_byte() == byte)
    }

    /// Storage discriminator.
    pub fn as_i16(&self) -> i16 {
        i16::from(self.as_byte())
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        u8::try_from(value).ok().and_then(Self::from_byte)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::SetName => "set-name",
            ActionKind::Post => "post",
            ActionKind::Reply => "reply",
            ActionKind::Like => "like",
            ActionKind::Follow => "follow",
            ActionKind::Unfollow => "unfollow",
            ActionKind::TagMessage => "tag-message",
            ActionKind::PollQuestion => "poll-question",
            ActionKind::PollResponse => "poll-response",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = UnknownActionKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownActionKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_byte_mapping_is_reversible() {
        for kind in ActionKind::ALL {
            assert_eq!(ActionKind::from_byte(kind.as_byte()), Some(kind));
            assert_eq!(ActionKind::from_i16(kind.as_i16()), Some(kind));
        }
    }

    #[test]
    fn test_unassigned_bytes_are_rejected() {
        assert_eq!(ActionKind::from_byte(0x05), None);
        assert_eq!(ActionKind::from_byte(0xff), None);
        assert_eq!(ActionKind::from_i16(-1), None);
        assert_eq!(ActionKind::from_i16(300), None);
    }

    #[test]
    fn test_parse_from_cli_name() {
        assert_eq!("set-name".parse::<ActionKind>(), Ok(ActionKind::SetName));
        assert_eq!("tag-message".parse::<ActionKind>(), Ok(ActionKind::TagMessage));
        assert!("setname".parse::<ActionKind>().is_err());
    }
}
