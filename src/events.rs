//! In-process change feed.
//!
//! Every write handler publishes a [`ChangeEvent`]; admin views subscribe
//! through the SSE endpoint and refetch on each push. Slow subscribers lose
//! events once the channel buffer wraps.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::permissions::Permission;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Applications,
    Contacts,
    Media,
    Pages,
    News,
    Users,
    Roles,
    Settings,
}

impl Collection {
    pub fn parse(value: &str) -> Option<Collection> {
        match value {
            "applications" => Some(Collection::Applications),
            "contacts" => Some(Collection::Contacts),
            "media" => Some(Collection::Media),
            "pages" => Some(Collection::Pages),
            "news" => Some(Collection::News),
            "users" => Some(Collection::Users),
            "roles" => Some(Collection::Roles),
            "settings" => Some(Collection::Settings),
            _ => None,
        }
    }

    /// Permission a subscriber needs to see changes to this collection.
    pub fn read_permission(&self) -> Permission {
        match self {
            Collection::Applications => Permission::ApplicationsRead,
            Collection::Contacts => Permission::ContactsRead,
            Collection::Media => Permission::MediaRead,
            Collection::Pages => Permission::ContentRead,
            Collection::News => Permission::NewsRead,
            Collection::Users | Collection::Roles => Permission::UsersRead,
            Collection::Settings => Permission::SettingsRead,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub collection: Collection,
    pub action: ChangeAction,
    pub id: String,
    pub at: DateTime<Utc>,
}

static CHANNEL: Lazy<broadcast::Sender<ChangeEvent>> = Lazy::new(|| {
    let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
    tx
});

pub fn publish(collection: Collection, action: ChangeAction, id: impl Into<String>) {
    let event = ChangeEvent {
        collection,
        action,
        id: id.into(),
        at: Utc::now(),
    };
    // Err only means nobody is listening.
    if CHANNEL.send(event).is_err() {
        tracing::trace!(?collection, ?action, "change event dropped, no subscribers");
    }
}

pub fn subscribe() -> broadcast::Receiver<ChangeEvent> {
    CHANNEL.subscribe()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_published_event() {
        let mut rx = subscribe();
        publish(Collection::Contacts, ChangeAction::Created, "contact-1");

        // Other tests may publish concurrently; skip until ours shows up.
        loop {
            let event = rx.recv().await.unwrap();
            if event.id == "contact-1" {
                assert_eq!(event.collection, Collection::Contacts);
                assert_eq!(event.action, ChangeAction::Created);
                break;
            }
        }
    }

    #[test]
    fn test_publish_without_subscribers_does_not_panic() {
        publish(Collection::Settings, ChangeAction::Updated, "site");
    }

    #[test]
    fn test_collection_parse_and_permissions() {
        assert_eq!(Collection::parse("news"), Some(Collection::News));
        assert_eq!(Collection::parse("logs"), None);
        assert_eq!(
            Collection::Applications.read_permission(),
            Permission::ApplicationsRead
        );
    }

    #[test]
    fn test_event_serialization() {
        let event = ChangeEvent {
            collection: Collection::Media,
            action: ChangeAction::Deleted,
            id: "m1".to_string(),
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["collection"], "media");
        assert_eq!(json["action"], "deleted");
    }
}
