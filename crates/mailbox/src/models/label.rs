//! Label model representing a Gmail label/folder

use serde::{Deserialize, Serialize};

/// Unique identifier for a label (Gmail label ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LabelId(pub String);

impl LabelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    // Well-known Gmail system labels
    pub const INBOX: &'static str = "INBOX";
    pub const SENT: &'static str = "SENT";
    pub const DRAFT: &'static str = "DRAFT";
    pub const TRASH: &'static str = "TRASH";
    pub const SPAM: &'static str = "SPAM";
    pub const STARRED: &'static str = "STARRED";
    pub const IMPORTANT: &'static str = "IMPORTANT";
    pub const UNREAD: &'static str = "UNREAD";
}

impl From<String> for LabelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for LabelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Who owns a label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelKind {
    /// Gmail-managed (INBOX, UNREAD, ...); never a move destination
    System,
    /// Created by the user; shown as a move-to destination
    User,
}

impl LabelKind {
    /// Map Gmail's `type` field; anything but "user" is treated as system
    pub fn from_api(kind: Option<&str>) -> Self {
        match kind {
            Some(k) if k.eq_ignore_ascii_case("user") => LabelKind::User,
            _ => LabelKind::System,
        }
    }
}

/// A mail label (folder)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: LabelId,
    pub name: String,
    pub kind: LabelKind,
}

impl Label {
    /// A user-created label
    pub fn user(id: impl Into<LabelId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: LabelKind::User,
        }
    }

    pub fn system(id: impl Into<LabelId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: LabelKind::System,
        }
    }

    pub fn is_user(&self) -> bool {
        self.kind == LabelKind::User
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_kind_from_api() {
        assert_eq!(LabelKind::from_api(Some("user")), LabelKind::User);
        assert_eq!(LabelKind::from_api(Some("system")), LabelKind::System);
        assert_eq!(LabelKind::from_api(None), LabelKind::System);
    }

    #[test]
    fn test_user_label() {
        let label = Label::user("Label_7", "Closings");
        assert!(label.is_user());
        assert_eq!(label.id.as_str(), "Label_7");
        assert!(!Label::system(LabelId::INBOX, "INBOX").is_user());
    }
}
