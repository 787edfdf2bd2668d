//! Thread actions and their label deltas
//!
//! Every action is a single Gmail call. The mailbox reloads afterwards
//! rather than patching local state.

use log::info;

use crate::error::Result;
use crate::gmail::MailApi;
use crate::models::{Label, LabelId, Thread};

/// A mutation applied to a whole thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadAction {
    MarkRead,
    MarkUnread,
    Star,
    Unstar,
    /// Remove from the inbox
    Archive,
    /// Add a user label and remove from the inbox
    MoveToLabel { id: LabelId, name: String },
    Spam,
    Trash,
}

impl ThreadAction {
    pub fn move_to(label: &Label) -> Self {
        ThreadAction::MoveToLabel {
            id: label.id.clone(),
            name: label.name.clone(),
        }
    }

    /// Read/unread flip based on the thread's current state
    pub fn toggle_read(thread: &Thread) -> Self {
        if thread.is_unread() {
            ThreadAction::MarkRead
        } else {
            ThreadAction::MarkUnread
        }
    }

    pub fn toggle_star(thread: &Thread) -> Self {
        if thread.is_starred() {
            ThreadAction::Unstar
        } else {
            ThreadAction::Star
        }
    }

    /// Labels to add and remove; `None` for trash, which has its own endpoint
    pub fn label_delta(&self) -> Option<(Vec<&str>, Vec<&str>)> {
        let delta = match self {
            ThreadAction::MarkRead => (vec![], vec![LabelId::UNREAD]),
            ThreadAction::MarkUnread => (vec![LabelId::UNREAD], vec![]),
            ThreadAction::Star => (vec![LabelId::STARRED], vec![]),
            ThreadAction::Unstar => (vec![], vec![LabelId::STARRED]),
            ThreadAction::Archive => (vec![], vec![LabelId::INBOX]),
            ThreadAction::MoveToLabel { id, .. } => (vec![id.as_str()], vec![LabelId::INBOX]),
            ThreadAction::Spam => (vec![LabelId::SPAM], vec![LabelId::INBOX]),
            ThreadAction::Trash => return None,
        };
        Some(delta)
    }

    /// Notice shown after the call succeeds
    pub fn success_message(&self) -> String {
        match self {
            ThreadAction::MarkRead => "Marked as read".to_string(),
            ThreadAction::MarkUnread => "Marked as unread".to_string(),
            ThreadAction::Star => "Conversation starred".to_string(),
            ThreadAction::Unstar => "Star removed".to_string(),
            ThreadAction::Archive => "Conversation archived".to_string(),
            ThreadAction::MoveToLabel { name, .. } => format!("Moved to {}", name),
            ThreadAction::Spam => "Marked as spam".to_string(),
            ThreadAction::Trash => "Conversation moved to trash".to_string(),
        }
    }

    /// Issue the Gmail call for this action
    pub fn apply(&self, api: &dyn MailApi, thread_id: &str) -> Result<()> {
        info!("Applying {:?} to thread {}", self, thread_id);
        match self.label_delta() {
            Some((add, remove)) => api.modify_thread(thread_id, &add, &remove),
            None => api.trash_thread(thread_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Message, MessageId, ThreadId};

    fn thread(labels: &[&str]) -> Thread {
        let msg = Message::builder(MessageId::new("m1"), ThreadId::new("t1"))
            .label_ids(labels.iter().copied())
            .build();
        Thread::from_messages(ThreadId::new("t1"), None, "", vec![msg]).unwrap()
    }

    #[test]
    fn test_label_deltas() {
        assert_eq!(
            ThreadAction::Archive.label_delta(),
            Some((vec![], vec!["INBOX"]))
        );
        assert_eq!(
            ThreadAction::Spam.label_delta(),
            Some((vec!["SPAM"], vec!["INBOX"]))
        );
        assert_eq!(
            ThreadAction::move_to(&Label::user("Label_3", "Escrow")).label_delta(),
            Some((vec!["Label_3"], vec!["INBOX"]))
        );
        assert_eq!(ThreadAction::Trash.label_delta(), None);
    }

    #[test]
    fn test_toggles_follow_thread_flags() {
        assert_eq!(ThreadAction::toggle_read(&thread(&["UNREAD"])), ThreadAction::MarkRead);
        assert_eq!(ThreadAction::toggle_read(&thread(&[])), ThreadAction::MarkUnread);
        assert_eq!(ThreadAction::toggle_star(&thread(&["STARRED"])), ThreadAction::Unstar);
        assert_eq!(ThreadAction::toggle_star(&thread(&["INBOX"])), ThreadAction::Star);
    }

    #[test]
    fn test_success_messages() {
        assert_eq!(
            ThreadAction::move_to(&Label::user("Label_3", "Escrow")).success_message(),
            "Moved to Escrow"
        );
        assert_eq!(ThreadAction::Trash.success_message(), "Conversation moved to trash");
    }
}
