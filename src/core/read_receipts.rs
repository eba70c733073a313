//! Read-receipt policy.
//!
//! The store owns the actual one-way `read_at` transition; this module only
//! decides when a mark pass is worth firing. The set computed here must agree
//! exactly with the rows `ConversationStore::mark_read` affects, which is the
//! same predicate `count_unread` uses at the store boundary.

use crate::store::Message;

pub(crate) fn is_unread_inbound(message: &Message, viewer_id: &str) -> bool {
    message.sender_id != viewer_id && message.read_at.is_none()
}

/// True when the visible window contains at least one message another
/// participant sent that the viewer has not read.
pub(crate) fn has_unread(messages: &[Message], viewer_id: &str) -> bool {
    messages.iter().any(|m| is_unread_inbound(m, viewer_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str, sender: &str, read_at: Option<i64>) -> Message {
        Message {
            id: id.to_string(),
            conversation_id: "c1".to_string(),
            sender_id: sender.to_string(),
            sender_name: None,
            body: "hi".to_string(),
            image_ref: None,
            created_at: 1,
            read_at,
        }
    }

    #[test]
    fn own_and_already_read_messages_do_not_count() {
        let messages = vec![
            msg("m1", "me", None),
            msg("m2", "peer", Some(10)),
        ];
        assert!(!has_unread(&messages, "me"));
    }

    #[test]
    fn inbound_unread_message_triggers_a_mark() {
        let messages = vec![msg("m1", "peer", None)];
        assert!(has_unread(&messages, "me"));
        assert!(is_unread_inbound(&messages[0], "me"));
        // The sender's own copy is not part of the mark set.
        assert!(!is_unread_inbound(&messages[0], "peer"));
    }
}
