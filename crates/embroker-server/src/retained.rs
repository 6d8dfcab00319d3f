//! Retained message storage.

use bytes::Bytes;
use thiserror::Error;

use embroker_core::{QoS, Topic};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    #[error("retained store is full ({capacity} topics)")]
    Full { capacity: usize },
}

/// The last retained message published to a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetainedMessage {
    pub topic: Topic,
    pub payload: Bytes,
    pub qos: QoS,
}

pub trait RetainedStore {
    /// Replace the retained message of `topic`. An empty payload deletes it.
    fn update(&mut self, topic: &Topic, payload: Bytes, qos: QoS) -> Result<(), StoreError>;

    /// Retained messages whose topic matches `filter`.
    fn find(&self, filter: &Topic) -> Vec<RetainedMessage>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounded in-memory retained store.
#[derive(Debug)]
pub struct RetainedList {
    entries: Vec<RetainedMessage>,
    capacity: usize,
}

impl RetainedList {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl RetainedStore for RetainedList {
    fn update(&mut self, topic: &Topic, payload: Bytes, qos: QoS) -> Result<(), StoreError> {
        let existing = self.entries.iter().position(|m| m.topic == *topic);

        if payload.is_empty() {
            if let Some(index) = existing {
                self.entries.swap_remove(index);
            }
            return Ok(());
        }

        match existing {
            Some(index) => {
                let entry = &mut self.entries[index];
                entry.payload = payload;
                entry.qos = qos;
            }
            None => {
                if self.entries.len() >= self.capacity {
                    return Err(StoreError::Full {
                        capacity: self.capacity,
                    });
                }
                self.entries.push(RetainedMessage {
                    topic: topic.clone(),
                    payload,
                    qos,
                });
            }
        }
        Ok(())
    }

    fn find(&self, filter: &Topic) -> Vec<RetainedMessage> {
        self.entries
            .iter()
            .filter(|m| filter.matches(&m.topic))
            .cloned()
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(name: &str) -> Topic {
        Topic::new(name).unwrap()
    }

    #[test]
    fn test_update_and_find() {
        let mut store = RetainedList::new(5);
        store
            .update(&topic("house/frontroom/tempurature"), Bytes::from_static(b"21"), QoS::AtLeastOnce)
            .unwrap();
        store
            .update(&topic("house/kitchen/tempurature"), Bytes::from_static(b"19"), QoS::AtMostOnce)
            .unwrap();

        let found = store.find(&topic("house/+/tempurature"));
        assert_eq!(found.len(), 2);
        let found = store.find(&topic("house/kitchen/tempurature"));
        assert_eq!(found[0].payload, Bytes::from_static(b"19"));
        assert!(store.find(&topic("garden/#")).is_empty());
    }

    #[test]
    fn test_update_replaces() {
        let mut store = RetainedList::new(1);
        store.update(&topic("a"), Bytes::from_static(b"1"), QoS::AtMostOnce).unwrap();
        store.update(&topic("a"), Bytes::from_static(b"2"), QoS::ExactlyOnce).unwrap();
        assert_eq!(store.len(), 1);
        let found = store.find(&topic("a"));
        assert_eq!(found[0].payload, Bytes::from_static(b"2"));
        assert_eq!(found[0].qos, QoS::ExactlyOnce);
    }

    #[test]
    fn test_empty_payload_deletes() {
        let mut store = RetainedList::new(2);
        store.update(&topic("a"), Bytes::from_static(b"1"), QoS::AtMostOnce).unwrap();
        store.update(&topic("a"), Bytes::new(), QoS::AtMostOnce).unwrap();
        assert!(store.is_empty());
        // Deleting something absent is fine
        store.update(&topic("b"), Bytes::new(), QoS::AtMostOnce).unwrap();
    }

    #[test]
    fn test_capacity_bound() {
        let mut store = RetainedList::new(1);
        store.update(&topic("a"), Bytes::from_static(b"1"), QoS::AtMostOnce).unwrap();
        assert_eq!(
            store.update(&topic("b"), Bytes::from_static(b"1"), QoS::AtMostOnce),
            Err(StoreError::Full { capacity: 1 })
        );
    }

    #[test]
    fn test_system_topics_hidden_from_bare_hash() {
        let mut store = RetainedList::new(2);
        store.update(&topic("$SYS/uptime"), Bytes::from_static(b"5"), QoS::AtMostOnce).unwrap();
        store.update(&topic("a/b"), Bytes::from_static(b"1"), QoS::AtMostOnce).unwrap();
        let found = store.find(&topic("#"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].topic.as_str(), "a/b");
    }
}
