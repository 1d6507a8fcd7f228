//! One handler per memo action kind.
//!
//! Each handler reads its fields in order, enforces the kind's byte ceilings
//! and field widths, and ignores any trailing pushes.
use bitcoin::hashes::Hash as _;
use memo_indexer_shared::protocol::{self, PK_HASH_SIZE, PollType, TX_HASH_SIZE};
use memo_indexer_shared::types::{ActionKind, ActionPayload, Identity, TxHash};

use crate::errors::DecodeError;
use crate::processor::HandleAction;

fn field<'a>(fields: &[&'a [u8]], index: usize, name: &'static str) -> Result<&'a [u8], DecodeError> {
    fields
        .get(index)
        .copied()
        .ok_or(DecodeError::MissingField(name))
}

/// Checks the size ceiling of `kind` and decodes the bytes as UTF-8.
fn text(bytes: &[u8], kind: ActionKind, name: &'static str) -> Result<String, DecodeError> {
    if let Some(max) = protocol::max_payload_size(kind) {
        if bytes.len() > max {
            return Err(DecodeError::PayloadTooLarge {
                kind,
                size: bytes.len(),
                max,
            });
        }
    }
    String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8(name))
}

fn tx_hash(bytes: &[u8], name: &'static str) -> Result<TxHash, DecodeError> {
    if bytes.len() != TX_HASH_SIZE {
        return Err(DecodeError::InvalidHash {
            field: name,
            len: bytes.len(),
        });
    }
    TxHash::from_slice(bytes).map_err(|_| DecodeError::InvalidHash {
        field: name,
        len: bytes.len(),
    })
}

fn identity(bytes: &[u8]) -> Result<Identity, DecodeError> {
    if bytes.len() != PK_HASH_SIZE {
        return Err(DecodeError::InvalidIdentity(format!(
            "expected {PK_HASH_SIZE} bytes, got {}",
            bytes.len()
        )));
    }
    Identity::from_slice(bytes).map_err(|e| DecodeError::InvalidIdentity(e.to_string()))
}

pub struct SetNameHandler;

impl HandleAction for SetNameHandler {
    fn handle(&self, fields: &[&[u8]]) -> Result<ActionPayload, DecodeError> {
        let name = text(field(fields, 0, "name")?, ActionKind::SetName, "name")?;
        Ok(ActionPayload::SetName { name })
    }
}

pub struct PostHandler;

impl HandleAction for PostHandler {
    fn handle(&self, fields: &[&[u8]]) -> Result<ActionPayload, DecodeError> {
        let message = text(field(fields, 0, "message")?, ActionKind::Post, "message")?;
        Ok(ActionPayload::Post { message })
    }
}

pub struct ReplyHandler;

impl HandleAction for ReplyHandler {
    fn handle(&self, fields: &[&[u8]]) -> Result<ActionPayload, DecodeError> {
        let parent = tx_hash(field(fields, 0, "parent")?, "parent")?;
        let message = text(field(fields, 1, "message")?, ActionKind::Reply, "message")?;
        Ok(ActionPayload::Reply { parent, message })
    }
}

pub struct LikeHandler;

impl HandleAction for LikeHandler {
    fn handle(&self, fields: &[&[u8]]) -> Result<ActionPayload, DecodeError> {
        let target = tx_hash(field(fields, 0, "target")?, "target")?;
        Ok(ActionPayload::Like { target })
    }
}

pub struct FollowHandler;

impl HandleAction for FollowHandler {
    fn handle(&self, fields: &[&[u8]]) -> Result<ActionPayload, DecodeError> {
        let target = identity(field(fields, 0, "target")?)?;
        Ok(ActionPayload::Follow { target })
    }
}

pub struct UnfollowHandler;

impl HandleAction for UnfollowHandler {
    fn handle(&self, fields: &[&[u8]]) -> Result<ActionPayload, DecodeError> {
        let target = identity(field(fields, 0, "target")?)?;
        Ok(ActionPayload::Unfollow { target })
    }
}

pub struct TagMessageHandler;

impl HandleAction for TagMessageHandler {
    fn handle(&self, fields: &[&[u8]]) -> Result<ActionPayload, DecodeError> {
        let topic = text(field(fields, 0, "topic")?, ActionKind::TagMessage, "topic")?;
        let message = text(field(fields, 1, "message")?, ActionKind::TagMessage, "message")?;
        Ok(ActionPayload::TagMessage { topic, message })
    }
}

pub struct PollQuestionHandler;

impl HandleAction for PollQuestionHandler {
    fn handle(&self, fields: &[&[u8]]) -> Result<ActionPayload, DecodeError> {
        let tag = field(fields, 0, "poll type")?;
        let poll_type = std::str::from_utf8(tag)
            .ok()
            .and_then(|tag| tag.parse::<PollType>().ok())
            .ok_or_else(|| DecodeError::InvalidPollType(String::from_utf8_lossy(tag).into_owned()))?;
        let question = text(field(fields, 1, "question")?, ActionKind::PollQuestion, "question")?;
        Ok(ActionPayload::PollQuestion {
            poll_type,
            question,
        })
    }
}

pub struct PollResponseHandler;

impl HandleAction for PollResponseHandler {
    fn handle(&self, fields: &[&[u8]]) -> Result<ActionPayload, DecodeError> {
        let poll = tx_hash(field(fields, 0, "poll")?, "poll")?;
        let comment = text(field(fields, 1, "comment")?, ActionKind::PollResponse, "comment")?;
        Ok(ActionPayload::PollResponse { poll, comment })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================================================
    // Size ceilings
    // ============================================================================

    fn assert_ceiling(handler: &dyn HandleAction, prefix: &[&[u8]], kind: ActionKind, max: usize) {
        let fits = vec![b'a'; max];
        let mut fields = prefix.to_vec();
        fields.push(&fits);
        assert!(handler.handle(&fields).is_ok(), "{kind} at {max} bytes");

        let over = vec![b'a'; max + 1];
        let mut fields = prefix.to_vec();
        fields.push(&over);
        assert_eq!(
            handler.handle(&fields),
            Err(DecodeError::PayloadTooLarge {
                kind,
                size: max + 1,
                max
            })
        );
    }

    #[test]
    fn test_post_ceiling() {
        assert_ceiling(&PostHandler, &[], ActionKind::Post, 217);
    }

    #[test]
    fn test_reply_ceiling() {
        let parent = [7u8; 32];
        assert_ceiling(&ReplyHandler, &[&parent], ActionKind::Reply, 184);
    }

    #[test]
    fn test_tag_message_ceiling() {
        assert_ceiling(&TagMessageHandler, &[b"topic"], ActionKind::TagMessage, 217);
    }

    #[test]
    fn test_set_name_uses_tag_message_ceiling() {
        assert_ceiling(&SetNameHandler, &[], ActionKind::SetName, 217);
    }

    #[test]
    fn test_poll_question_ceiling() {
        assert_ceiling(&PollQuestionHandler, &[b"one"], ActionKind::PollQuestion, 213);
    }

    #[test]
    fn test_poll_response_ceiling() {
        let poll = [9u8; 32];
        assert_ceiling(&PollResponseHandler, &[&poll], ActionKind::PollResponse, 184);
    }

    #[test]
    fn test_ceiling_counts_bytes_not_characters() {
        // 72 three-byte characters: 216 bytes fit, one more does not.
        let fits = "€".repeat(72);
        assert!(PostHandler.handle(&[fits.as_bytes()]).is_ok());
        let over = format!("{fits}ab");
        assert!(matches!(
            PostHandler.handle(&[over.as_bytes()]),
            Err(DecodeError::PayloadTooLarge { size: 218, .. })
        ));
    }

    // ============================================================================
    // Poll types
    // ============================================================================

    #[test]
    fn test_poll_types_decode() {
        for (tag, expected) in [("one", PollType::One), ("any", PollType::Any), ("rank", PollType::Rank)] {
            let payload = PollQuestionHandler
                .handle(&[tag.as_bytes(), b"which?"])
                .unwrap();
            assert_eq!(
                payload,
                ActionPayload::PollQuestion {
                    poll_type: expected,
                    question: "which?".to_string()
                }
            );
        }
    }

    #[test]
    fn test_unknown_poll_type_fails() {
        let tags: [&[u8]; 4] = [b"all", b"ONE", b"", &[0xff, 0xfe]];
        for tag in tags {
            assert!(matches!(
                PollQuestionHandler.handle(&[tag, b"which?"]),
                Err(DecodeError::InvalidPollType(_))
            ));
        }
    }

    // ============================================================================
    // Field validation
    // ============================================================================

    #[test]
    fn test_missing_fields() {
        assert_eq!(PostHandler.handle(&[]), Err(DecodeError::MissingField("message")));
        let parent = [1u8; 32];
        assert_eq!(
            ReplyHandler.handle(&[&parent]),
            Err(DecodeError::MissingField("message"))
        );
    }

    #[test]
    fn test_hash_width_is_exact() {
        assert_eq!(
            LikeHandler.handle(&[&[0u8; 31]]),
            Err(DecodeError::InvalidHash {
                field: "target",
                len: 31
            })
        );
        assert!(LikeHandler.handle(&[&[0u8; 32]]).is_ok());
    }

    #[test]
    fn test_follow_requires_pubkey_hash_width() {
        assert!(matches!(
            FollowHandler.handle(&[&[0u8; 21]]),
            Err(DecodeError::InvalidIdentity(_))
        ));
        let payload = UnfollowHandler.handle(&[&[3u8; 20]]).unwrap();
        assert_eq!(
            payload,
            ActionPayload::Unfollow {
                target: Identity::from_byte_array([3u8; 20])
            }
        );
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        assert_eq!(
            PostHandler.handle(&[&[0xc3, 0x28]]),
            Err(DecodeError::InvalidUtf8("message"))
        );
    }

    #[test]
    fn test_trailing_fields_are_ignored() {
        let payload = PostHandler.handle(&[b"hi", b"extra"]).unwrap();
        assert_eq!(
            payload,
            ActionPayload::Post {
                message: "hi".to_string()
            }
        );
    }
}
