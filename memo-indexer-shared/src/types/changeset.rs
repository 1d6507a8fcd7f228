use crate::types::{Action, Block};

/// Represents the actions observed together in one block, or in the
/// unconfirmed pool when `block` is `None`.
///
/// A `Changeset` is persisted atomically: the block row first, then every
/// action upserted against it.
pub struct Changeset<'a> {
    pub block: Option<&'a Block>,
    pub actions: &'a [Action],
}
