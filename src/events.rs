//! Change notifications for the UI layer.
//!
//! Every committed mutation publishes a [`ChangeEvent`] on the store's bus. Views
//! subscribe once and refresh whatever the event touches. Events are only sent
//! after the owning transaction has committed, so a subscriber that re-reads the
//! store always sees the new state.

use serde::Serialize;
use tokio::sync::broadcast::{self, Receiver, Sender};

use crate::constants::CHANGE_BUS_CAPACITY;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ChangeEvent {
    VideoAdded { video_id: i64 },
    VideoUpdated { video_id: i64 },
    VideoDeleted { video_id: i64 },
    HistoryEvicted { video_ids: Vec<i64> },
    PlaylistCreated { playlist_id: i64 },
    PlaylistUpdated { playlist_id: i64 },
    PlaylistDeleted { playlist_id: i64 },
    ProfileCreated { profile_id: i64 },
    ProfileSwitched { profile_id: i64 },
    ProfileUpdated { profile_id: i64 },
    ProfileDeleted { profile_id: i64 },
    SettingsUpdated { settings_id: i64 },
    DataImported,
    DataCleared,
}

/// Publish/subscribe channel owned by one store instance.
#[derive(Clone)]
pub struct ChangeBus {
    sender: Sender<ChangeEvent>,
}

impl ChangeBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANGE_BUS_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: ChangeEvent) {
        log::trace!("change event: {:?}", event);
        // No subscribers is fine; nobody is looking at the views.
        let _ = self.sender.send(event);
    }

    pub fn publish_all(&self, events: impl IntoIterator<Item = ChangeEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let bus = ChangeBus::new();
        bus.publish(ChangeEvent::DataCleared);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_subscribers_receive_in_order() {
        let bus = ChangeBus::new();
        let mut rx = bus.subscribe();
        bus.publish_all([
            ChangeEvent::PlaylistCreated { playlist_id: 7 },
            ChangeEvent::PlaylistDeleted { playlist_id: 7 },
        ]);

        assert_eq!(rx.try_recv().unwrap(), ChangeEvent::PlaylistCreated { playlist_id: 7 });
        assert_eq!(rx.try_recv().unwrap(), ChangeEvent::PlaylistDeleted { playlist_id: 7 });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_event_serializes_with_kind_tag() {
        let json = serde_json::to_value(ChangeEvent::VideoAdded { video_id: 3 }).unwrap();
        assert_eq!(json["kind"], "videoAdded");
        assert_eq!(json["videoId"], 3);
    }
}
