mod action;
mod action_kind;
mod block;
mod changeset;
mod identity;
mod ledger;
mod views;

pub use action::{Action, ActionPayload, DanglingParent, StoredAction, TxHash};
pub use action_kind::{ActionKind, UnknownActionKind};
pub use block::{Block, BlockRef};
pub use changeset::Changeset;
pub use identity::{Identity, InvalidIdentity};
pub use ledger::{LedgerBlock, LedgerTransaction, LocatedTransaction, TxInput};
pub use views::{
    FeedItem, Notification, NotificationKind, TopicStatDelta, TopicStats, UserStatDelta,
    UserStats, ViewChangeset,
};
