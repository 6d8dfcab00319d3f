//! Subscription registry.

use thiserror::Error;

use embroker_core::{QoS, Topic};

use crate::slots::SessionId;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    #[error("subscription registry is full ({capacity} entries)")]
    Full { capacity: usize },
}

/// Where subscriptions live. The broker only talks to it through this trait.
pub trait SubscriptionRegistry {
    /// Subscribe `session` to `filter`; subscribing again replaces the QoS.
    fn add(&mut self, filter: &Topic, session: SessionId, qos: QoS) -> Result<(), RegistryError>;

    /// Remove one subscription; false when there was none.
    fn remove(&mut self, filter: &str, session: SessionId) -> bool;

    /// Remove every subscription of `session`, returning how many went.
    fn remove_session(&mut self, session: SessionId) -> usize;

    /// Subscribers whose filter matches `topic`, once per session with the
    /// highest QoS granted among its matching filters.
    fn matching(&self, topic: &Topic) -> Vec<(SessionId, QoS)>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Subscription {
    filter: Topic,
    session: SessionId,
    qos: QoS,
}

/// Bounded in-memory registry, scanned linearly.
#[derive(Debug)]
pub struct SubscriptionList {
    entries: Vec<Subscription>,
    capacity: usize,
}

impl SubscriptionList {
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

impl SubscriptionRegistry for SubscriptionList {
    fn add(&mut self, filter: &Topic, session: SessionId, qos: QoS) -> Result<(), RegistryError> {
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|s| s.session == session && s.filter == *filter)
        {
            existing.qos = qos;
            return Ok(());
        }
        if self.entries.len() >= self.capacity {
            return Err(RegistryError::Full {
                capacity: self.capacity,
            });
        }
        self.entries.push(Subscription {
            filter: filter.clone(),
            session,
            qos,
        });
        Ok(())
    }

    fn remove(&mut self, filter: &str, session: SessionId) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|s| !(s.session == session && s.filter.as_str() == filter));
        self.entries.len() != before
    }

    fn remove_session(&mut self, session: SessionId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|s| s.session != session);
        before - self.entries.len()
    }

    fn matching(&self, topic: &Topic) -> Vec<(SessionId, QoS)> {
        let mut subscribers: Vec<(SessionId, QoS)> = Vec::new();
        for sub in self.entries.iter().filter(|s| s.filter.matches(topic)) {
            match subscribers.iter_mut().find(|(id, _)| *id == sub.session) {
                Some((_, qos)) => *qos = (*qos).max(sub.qos),
                None => subscribers.push((sub.session, sub.qos)),
            }
        }
        subscribers
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
