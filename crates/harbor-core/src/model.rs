use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An email as reported by the agent backend. The client never mutates
/// these; it holds whatever the last collection refresh returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Email {
    pub id: String,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub action_items: Option<Vec<ActionItem>>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl Email {
    pub fn action_item_count(&self) -> usize {
        self.action_items.as_ref().map(Vec::len).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionItem {
    pub task: String,
    #[serde(default)]
    pub deadline: Option<String>,
}

/// Badge classification for backend-assigned categories. The backend may
/// emit labels outside the known set; those render with the generic style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailCategory {
    Todo,
    Newsletter,
    Spam,
    Important,
    Other,
}

impl EmailCategory {
    pub fn from_label(label: &str) -> Self {
        match label {
            "To-Do" => Self::Todo,
            "Newsletter" => Self::Newsletter,
            "Spam" => Self::Spam,
            "Important" => Self::Important,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub id: String,
    pub name: String,
    pub template: String,
    pub description: String,
}

/// A locally editable outgoing email, optionally linked to the email it
/// replies to. New drafts receive a client-generated id; the id never
/// changes afterwards, and save paths decide create-vs-update by looking
/// the id up in the known draft collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    pub id: String,
    #[serde(default)]
    pub email_id: Option<String>,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub saved_at: DateTime<Utc>,
}

impl Draft {
    pub fn blank() -> Self {
        Self {
            id: local_draft_id(),
            email_id: None,
            to: String::new(),
            subject: String::new(),
            body: String::new(),
            saved_at: Utc::now(),
        }
    }

    pub fn reply_to(email: &Email) -> Self {
        Self {
            id: local_draft_id(),
            email_id: Some(email.id.clone()),
            to: email.sender.clone(),
            subject: format!("Re: {}", email.subject),
            body: String::new(),
            saved_at: Utc::now(),
        }
    }
}

// Millisecond timestamp rendered as a decimal string, matching the ids the
// backend already stores for client-created drafts.
fn local_draft_id() -> String {
    Utc::now().timestamp_millis().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Agent,
}

/// One turn of the assistant conversation. Held only in UI state for the
/// active conversation; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Agent,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_email() -> Email {
        Email {
            id: "1".to_string(),
            sender: "alice@acme.test".to_string(),
            subject: "Quarterly report".to_string(),
            body: "Numbers attached.".to_string(),
            timestamp: Utc::now(),
            read: false,
            category: Some("To-Do".to_string()),
            action_items: Some(vec![ActionItem {
                task: "Review numbers".to_string(),
                deadline: Some("Friday".to_string()),
            }]),
            summary: None,
        }
    }

    #[test]
    fn reply_draft_links_source_email() {
        let email = sample_email();
        let draft = Draft::reply_to(&email);

        assert_eq!(draft.email_id.as_deref(), Some("1"));
        assert_eq!(draft.to, "alice@acme.test");
        assert_eq!(draft.subject, "Re: Quarterly report");
        assert!(draft.body.is_empty());
    }

    #[test]
    fn blank_draft_has_no_email_link() {
        let draft = Draft::blank();
        assert!(draft.email_id.is_none());
        assert!(draft.to.is_empty());
    }

    #[test]
    fn client_draft_ids_are_millisecond_strings() {
        let draft = Draft::blank();
        assert!(!draft.id.is_empty());
        assert!(draft.id.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn email_tolerates_missing_optional_fields() {
        let email: Email = serde_json::from_value(serde_json::json!({
            "id": "7",
            "sender": "bob@acme.test",
            "subject": "Hello",
            "body": "Hi there",
            "timestamp": "2024-01-15T09:30:00Z"
        }))
        .expect("minimal email parses");

        assert!(!email.read);
        assert!(email.category.is_none());
        assert_eq!(email.action_item_count(), 0);
        assert!(email.summary.is_none());
    }

    #[test]
    fn action_items_parse_with_optional_deadline() {
        let email: Email = serde_json::from_value(serde_json::json!({
            "id": "8",
            "sender": "carol@acme.test",
            "subject": "Tasks",
            "body": "",
            "timestamp": "2024-01-15T09:30:00Z",
            "category": "To-Do",
            "action_items": [
                {"task": "Book room"},
                {"task": "Send agenda", "deadline": "Tuesday"}
            ]
        }))
        .expect("email with action items parses");

        assert_eq!(email.action_item_count(), 2);
        let items = email.action_items.expect("items present");
        assert!(items[0].deadline.is_none());
        assert_eq!(items[1].deadline.as_deref(), Some("Tuesday"));
    }

    #[test]
    fn category_labels_map_to_badges() {
        assert_eq!(EmailCategory::from_label("To-Do"), EmailCategory::Todo);
        assert_eq!(
            EmailCategory::from_label("Newsletter"),
            EmailCategory::Newsletter
        );
        assert_eq!(EmailCategory::from_label("Spam"), EmailCategory::Spam);
        assert_eq!(
            EmailCategory::from_label("Important"),
            EmailCategory::Important
        );
        assert_eq!(
            EmailCategory::from_label("Conference Swag"),
            EmailCategory::Other
        );
    }

    #[test]
    fn chat_roles_serialize_lowercase() {
        assert_eq!(
            serde_json::to_value(ChatRole::User).expect("role serializes"),
            serde_json::json!("user")
        );
        assert_eq!(
            serde_json::to_value(ChatRole::Agent).expect("role serializes"),
            serde_json::json!("agent")
        );
    }
}
