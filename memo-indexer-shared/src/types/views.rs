//! Records of the materialized secondary views built by the aggregators.
use serde::{Deserialize, Serialize};

use crate::types::{ActionKind, Identity, TxHash};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Reply,
    Follow,
}

impl NotificationKind {
    pub fn as_i16(&self) -> i16 {
        match self {
            NotificationKind::Like => 0,
            NotificationKind::Reply => 1,
            NotificationKind::Follow => 2,
        }
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(NotificationKind::Like),
            1 => Some(NotificationKind::Reply),
            2 => Some(NotificationKind::Follow),
            _ => None,
        }
    }
}

/// Something that happened to `recipient` because of another identity's action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: Identity,
    pub kind: NotificationKind,
    pub action_id: i64,
    pub actor: Identity,
    pub tx_hash: TxHash,
}

/// An action delivered to the feed of `owner`, one of its author's followers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub owner: Identity,
    pub action_id: i64,
    pub author: Identity,
    pub kind: ActionKind,
}

/// Increment to apply to a topic's stats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicStatDelta {
    pub topic: String,
    pub messages: i64,
    pub last_action_id: i64,
}

/// Increment to apply to an identity's stats. Following may go negative on
/// unfollows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserStatDelta {
    pub posts: i64,
    pub replies: i64,
    pub likes: i64,
    pub following: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicStats {
    pub topic: String,
    pub messages: i64,
    pub last_action_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserStats {
    pub identity: Identity,
    pub posts: i64,
    pub replies: i64,
    pub likes: i64,
    pub following: i64,
}

/// Output of one aggregator batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewChangeset {
    pub notifications: Vec<Notification>,
    pub feed_items: Vec<FeedItem>,
    pub topic_stats: Vec<TopicStatDelta>,
    pub user_stats: Vec<(Identity, UserStatDelta)>,
}

impl ViewChangeset {
    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
            && self.feed_items.is_empty()
            && self.topic_stats.is_empty()
            && self.user_stats.is_empty()
    }
}
