//! Broker dispatcher.
//!
//! Owns the session table and the two collaborators. Transport events are
//! turned into session events, and the effects sessions return are carried
//! out here: routing, registry and retained store updates, takeover and
//! cleanup.

use std::net::SocketAddr;

use bytes::Bytes;
use log::{debug, info, warn};

use embroker_core::{QoS, Topic};

use crate::config::Config;
use crate::handlers::subscribe::{granted_code, unsubscribe_code, SubscribeRequest, SubscriptionError};
use crate::registry::{SubscriptionList, SubscriptionRegistry};
use crate::retained::{RetainedList, RetainedStore};
use crate::session::{Effect, Event, Message, Session, SessionLimits};
use crate::slots::{SessionId, SessionTable};
use crate::transport::{FrameError, Transport, TransportEvent};

/// Broker state for one event loop.
pub struct Broker<R, S> {
    sessions: SessionTable<Session>,
    registry: R,
    retained: S,
    limits: SessionLimits,
}

impl Broker<SubscriptionList, RetainedList> {
    /// Broker with the in-memory registry and retained store.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            SessionLimits::from(config),
            config.limits.max_sessions,
            SubscriptionList::new(config.limits.max_subscriptions),
            RetainedList::new(config.limits.max_retained_topics),
        )
    }
}

impl<R: SubscriptionRegistry, S: RetainedStore> Broker<R, S> {
    pub fn new(limits: SessionLimits, max_sessions: usize, registry: R, retained: S) -> Self {
        Self {
            sessions: SessionTable::with_capacity(max_sessions),
            registry,
            retained,
            limits,
        }
    }

    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn retained(&self) -> &S {
        &self.retained
    }

    /// Process one transport event.
    ///
    /// For `Connected` this returns the id of the new session, or `None`
    /// when the session table is full and the connection must be dropped.
    /// For every other event it returns the session if it is still open.
    pub fn handle_event<T: Transport>(
        &mut self,
        transport: &mut T,
        event: TransportEvent,
    ) -> Option<SessionId> {
        match event {
            TransportEvent::Connected { peer } => self.accept(peer),
            TransportEvent::Data { session, frame } => {
                let effects = self.sessions.get_mut(session)?.handle_frame(&frame);
                self.execute(transport, session, effects);
                self.sessions.contains(session).then_some(session)
            }
            TransportEvent::Malformed { session, error } => {
                let event = match error {
                    FrameError::Malformed(e) => Event::Malformed(e),
                    FrameError::TooLarge { .. } => Event::PacketTooLarge,
                };
                self.dispatch(transport, session, event);
                None
            }
            TransportEvent::Sent { session } => {
                debug!("{}: output flushed", session);
                self.sessions.contains(session).then_some(session)
            }
            TransportEvent::Closed { session } => {
                self.dispatch(transport, session, Event::TransportClosed);
                None
            }
        }
    }

    /// Advance every session's keep-alive counter by one tick.
    pub fn tick<T: Transport>(&mut self, transport: &mut T) {
        for id in self.sessions.ids() {
            let Some(session) = self.sessions.get_mut(id) else {
                continue;
            };
            let effects = session.tick();
            self.execute(transport, id, effects);
        }
    }

    fn accept(&mut self, peer: SocketAddr) -> Option<SessionId> {
        match self.sessions.insert(Session::new(peer, self.limits.clone())) {
            Ok(id) => {
                debug!("{}: accepted connection from {}", id, peer);
                Some(id)
            }
            Err(_) => {
                warn!(
                    "Refusing connection from {}: all {} sessions in use",
                    peer,
                    self.sessions.capacity()
                );
                None
            }
        }
    }

    fn dispatch<T: Transport>(&mut self, transport: &mut T, id: SessionId, event: Event) {
        let Some(session) = self.sessions.get_mut(id) else {
            return;
        };
        let effects = session.handle(event);
        self.execute(transport, id, effects);
    }

    fn execute<T: Transport>(&mut self, transport: &mut T, id: SessionId, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send(bytes) => transport.send(id, bytes),
                Effect::Route(message) => self.route(transport, message),
                Effect::Subscribe {
                    packet_id,
                    requests,
                } => self.subscribe(transport, id, packet_id, requests),
                Effect::Unsubscribe { packet_id, filters } => {
                    self.unsubscribe(transport, id, packet_id, filters)
                }
                Effect::TakeOver(client_id) => self.take_over(transport, id, &client_id),
                Effect::Close => self.release(transport, id),
            }
        }
    }

    fn route<T: Transport>(&mut self, transport: &mut T, message: Message) {
        if message.retain {
            if let Err(e) = self
                .retained
                .update(&message.topic, message.payload.clone(), message.qos)
            {
                warn!("Not retaining message on {}: {}", message.topic, e);
            }
        }

        for (subscriber, granted) in self.registry.matching(&message.topic) {
            let qos = message.qos.min(granted);
            self.deliver(transport, subscriber, &message.topic, &message.payload, qos, false);
        }
    }

    fn deliver<T: Transport>(
        &mut self,
        transport: &mut T,
        id: SessionId,
        topic: &Topic,
        payload: &Bytes,
        qos: QoS,
        retain: bool,
    ) {
        let Some(session) = self.sessions.get_mut(id) else {
            return;
        };
        if let Some(bytes) = session.deliver(topic, payload, qos, retain) {
            transport.send(id, bytes);
        }
    }

    fn subscribe<T: Transport>(
        &mut self,
        transport: &mut T,
        id: SessionId,
        packet_id: u16,
        requests: Vec<SubscribeRequest>,
    ) {
        let Some(is_v5) = self.sessions.get(id).map(|s| s.version().is_v5()) else {
            return;
        };

        let mut return_codes = Vec::with_capacity(requests.len());
        let mut granted = Vec::new();
        for request in requests {
            let result = request.filter.and_then(|filter| {
                self.registry
                    .add(&filter, id, request.qos)
                    .map(|()| filter)
                    .map_err(|e| {
                        warn!("{}: {}", id, e);
                        SubscriptionError::QuotaExceeded
                    })
            });
            match result {
                Ok(filter) => {
                    debug!("{} subscribed to {} (QoS {})", id, filter, request.qos as u8);
                    return_codes.push(granted_code(request.qos));
                    granted.push((filter, request.qos));
                }
                Err(e) => return_codes.push(e.to_return_code(is_v5)),
            }
        }

        if let Some(bytes) = self
            .sessions
            .get(id)
            .and_then(|s| s.suback(packet_id, return_codes))
        {
            transport.send(id, bytes);
        }

        // Retained messages follow the SUBACK
        for (filter, qos) in granted {
            for message in self.retained.find(&filter) {
                let qos = message.qos.min(qos);
                self.deliver(transport, id, &message.topic, &message.payload, qos, true);
            }
        }
    }

    fn unsubscribe<T: Transport>(
        &mut self,
        transport: &mut T,
        id: SessionId,
        packet_id: u16,
        filters: Vec<String>,
    ) {
        let reason_codes = filters
            .iter()
            .map(|filter| unsubscribe_code(self.registry.remove(filter, id)))
            .collect();
        if let Some(bytes) = self
            .sessions
            .get(id)
            .and_then(|s| s.unsuback(packet_id, reason_codes))
        {
            transport.send(id, bytes);
        }
    }

    /// Close every other live session that holds `client_id`.
    fn take_over<T: Transport>(&mut self, transport: &mut T, id: SessionId, client_id: &str) {
        let previous: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|(other, s)| *other != id && s.is_live() && s.client_id() == client_id)
            .map(|(other, _)| other)
            .collect();
        for other in previous {
            info!("{}: client id {:?} taken over by {}", other, client_id, id);
            self.dispatch(transport, other, Event::SessionTakenOver);
        }
    }

    fn release<T: Transport>(&mut self, transport: &mut T, id: SessionId) {
        transport.close(id);
        let removed = self.registry.remove_session(id);
        if let Some(session) = self.sessions.remove(id) {
            debug!(
                "{}: released session of {:?} ({} subscriptions dropped)",
                id,
                session.client_id(),
                removed
            );
        }
    }
}
