//! Per-connection MQTT protocol state machine.
//!
//! [`Session::handle`] consumes one [`Event`] and returns the [`Effect`]s the
//! broker must carry out. It performs no I/O and never looks at other
//! sessions, so every transition can be exercised without a transport.
//!
//! ```text
//! WaitForConnect --CONNECT ok--> Connected <--PUBREL--> WaitForPubRel
//!       |                           |  PUBLISH QoS 2 -->
//!       +------------- any fatal event ---------------> Disconnected
//! ```

use std::net::SocketAddr;

use bytes::Bytes;
use log::{debug, error, info, warn};

use embroker_core::packet::reason_code;
use embroker_core::{
    parser, BuildError, Connect, Disconnect, MessageBuilder, Packet, PacketType, ParseError,
    ProtocolVersion, Publish, QoS, Suback, Subscribe, Topic, Unsuback, Unsubscribe,
};

use crate::config::{
    Config, DEFAULT_KEEP_ALIVE, DEFAULT_MAX_CLIENT_ID_LENGTH, DEFAULT_MAX_INFLIGHT,
    DEFAULT_MAX_PACKET_SIZE,
    DEFAULT_MAX_SUBS_PER_REQ, DEFAULT_MAX_TOPICS_IN_SUBSCRIBE, DEFAULT_MAX_TOPIC_LENGTH,
};
use crate::handlers::connect::{build_connack, build_rejection_connack, validate_connect};
use crate::handlers::disconnect::{keeps_will, server_disconnect};
use crate::handlers::publish::{validate_publish, PublisherAck};
use crate::handlers::qos::Inflight;
use crate::handlers::subscribe::{subscribe_requests, SubscribeRequest};

/// Protocol state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    WaitForConnect,
    Connected,
    /// A QoS 2 PUBLISH was received and acknowledged with PUBREC.
    WaitForPubRel { packet_id: u16 },
    Disconnected,
}

/// Input to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Packet(Packet),
    Malformed(ParseError),
    /// A frame larger than the configured maximum packet size.
    PacketTooLarge,
    KeepAliveExpired,
    TransportClosed,
    /// Another connection claimed this client id.
    SessionTakenOver,
}

/// Work the broker carries out for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Write bytes to this session's transport.
    Send(Bytes),
    /// Store if retained, then deliver to matching subscribers.
    Route(Message),
    /// Register the filters and answer with SUBACK.
    Subscribe {
        packet_id: u16,
        requests: Vec<SubscribeRequest>,
    },
    /// Drop the filters and answer with UNSUBACK.
    Unsubscribe { packet_id: u16, filters: Vec<String> },
    /// Close any other live session holding this client id.
    TakeOver(String),
    /// Close the transport and release the session.
    Close,
}

/// An application message on its way to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: Topic,
    pub payload: Bytes,
    pub qos: QoS,
    pub retain: bool,
}

/// Limits a session enforces on its own traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLimits {
    pub max_topic_length: usize,
    pub max_client_id_length: usize,
    pub max_subs_per_req: usize,
    pub max_topics_in_subscribe: usize,
    pub default_keep_alive: u16,
    pub max_packet_size: u32,
    /// Unacknowledged QoS 1/2 deliveries; 0 allows every packet id.
    pub max_inflight: u16,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_topic_length: DEFAULT_MAX_TOPIC_LENGTH,
            max_client_id_length: DEFAULT_MAX_CLIENT_ID_LENGTH,
            max_subs_per_req: DEFAULT_MAX_SUBS_PER_REQ,
            max_topics_in_subscribe: DEFAULT_MAX_TOPICS_IN_SUBSCRIBE,
            default_keep_alive: DEFAULT_KEEP_ALIVE,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            max_inflight: DEFAULT_MAX_INFLIGHT,
        }
    }
}

impl From<&Config> for SessionLimits {
    fn from(config: &Config) -> Self {
        Self {
            max_topic_length: config.limits.max_topic_length,
            max_client_id_length: config.session.max_client_id_length,
            max_subs_per_req: config.limits.max_subs_per_req,
            max_topics_in_subscribe: config.limits.max_topics_in_subscribe,
            default_keep_alive: config.session.default_keep_alive,
            max_packet_size: config.limits.max_packet_size,
            max_inflight: config.limits.max_inflight,
        }
    }
}

/// One client connection.
#[derive(Debug)]
pub struct Session {
    state: State,
    peer: SocketAddr,
    limits: SessionLimits,
    version: ProtocolVersion,
    client_id: String,
    clean_session: bool,
    keep_alive: u16,
    session_expiry: u32,
    will: Option<Message>,
    idle_ticks: u32,
    inflight: Inflight,
}

impl Session {
    pub fn new(peer: SocketAddr, limits: SessionLimits) -> Self {
        Self {
            state: State::WaitForConnect,
            peer,
            version: ProtocolVersion::default(),
            client_id: String::new(),
            clean_session: true,
            keep_alive: limits.default_keep_alive,
            session_expiry: 0,
            will: None,
            idle_ticks: 0,
            inflight: Inflight::with_capacity(limits.max_inflight),
            limits,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Empty until CONNECT is accepted.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn clean_session(&self) -> bool {
        self.clean_session
    }

    pub fn keep_alive(&self) -> u16 {
        self.keep_alive
    }

    pub fn session_expiry(&self) -> u32 {
        self.session_expiry
    }

    pub fn will(&self) -> Option<&Message> {
        self.will.as_ref()
    }

    pub fn inflight(&self) -> &Inflight {
        &self.inflight
    }

    /// CONNECT accepted and not yet disconnected.
    pub fn is_live(&self) -> bool {
        matches!(self.state, State::Connected | State::WaitForPubRel { .. })
    }

    /// Ticks without inbound traffic before keep-alive expires.
    pub fn keep_alive_limit(&self) -> u32 {
        2 * u32::from(self.keep_alive) + 10
    }

    /// Decode one framed packet and feed it to the state machine.
    pub fn handle_frame(&mut self, frame: &[u8]) -> Vec<Effect> {
        match parser::decode_packet(frame, self.version) {
            Ok(packet) => self.handle(Event::Packet(packet)),
            Err(e) => self.handle(Event::Malformed(e)),
        }
    }

    /// Advance the idle counter by one tick.
    pub fn tick(&mut self) -> Vec<Effect> {
        if self.state == State::Disconnected {
            return Vec::new();
        }
        self.idle_ticks = self.idle_ticks.saturating_add(1);
        if self.idle_ticks > self.keep_alive_limit() {
            self.handle(Event::KeepAliveExpired)
        } else {
            Vec::new()
        }
    }

    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        if self.state == State::Disconnected {
            return Vec::new();
        }

        match event {
            Event::Packet(packet) => {
                self.idle_ticks = 0;
                self.on_packet(packet)
            }
            Event::Malformed(e) => {
                warn!("{} ({:?}): malformed packet: {}", self.peer, self.client_id, e);
                self.abort(reason_code::MALFORMED_PACKET)
            }
            Event::PacketTooLarge => {
                warn!(
                    "{} ({:?}): packet exceeds {} bytes",
                    self.peer, self.client_id, self.limits.max_packet_size
                );
                self.abort(reason_code::PACKET_TOO_LARGE)
            }
            Event::KeepAliveExpired => {
                info!(
                    "{} ({:?}): keep-alive expired after {} ticks",
                    self.peer, self.client_id, self.idle_ticks
                );
                self.abort(reason_code::KEEP_ALIVE_TIMEOUT)
            }
            Event::SessionTakenOver => {
                info!("{} ({:?}): session taken over", self.peer, self.client_id);
                self.abort(reason_code::SESSION_TAKEN_OVER)
            }
            Event::TransportClosed => {
                debug!("{} ({:?}): connection lost", self.peer, self.client_id);
                self.terminate(true)
            }
        }
    }

    fn on_packet(&mut self, packet: Packet) -> Vec<Effect> {
        let kind = packet.packet_type();
        match (self.state, packet) {
            (State::WaitForConnect, Packet::Connect(connect)) => self.on_connect(connect),
            (State::WaitForConnect, _) | (_, Packet::Connect(_)) => self.violation(kind),

            (State::Connected, Packet::Publish(publish)) => self.on_publish(publish),
            (State::Connected, Packet::Subscribe(subscribe)) => self.on_subscribe(subscribe),
            (State::Connected, Packet::Unsubscribe(unsubscribe)) => {
                self.on_unsubscribe(unsubscribe)
            }
            (
                State::WaitForPubRel { .. },
                Packet::Publish(_) | Packet::Subscribe(_) | Packet::Unsubscribe(_),
            ) => self.violation(kind),

            (State::WaitForPubRel { packet_id }, Packet::Pubrel { packet_id: released }) => {
                if released != packet_id {
                    return self.violation(kind);
                }
                self.state = State::Connected;
                self.send(|b| {
                    b.pubcomp(released);
                    Ok(())
                })
            }
            // Retransmitted PUBREL after the flow already completed
            (State::Connected, Packet::Pubrel { packet_id }) => self.send(|b| {
                b.pubcomp(packet_id);
                Ok(())
            }),

            (_, Packet::Puback { packet_id }) => {
                if !self.inflight.puback(packet_id) {
                    debug!("{:?}: PUBACK for unknown id {}", self.client_id, packet_id);
                }
                Vec::new()
            }
            (_, Packet::Pubrec { packet_id }) => {
                if !self.inflight.pubrec(packet_id) {
                    debug!("{:?}: PUBREC for unknown id {}", self.client_id, packet_id);
                }
                self.send(|b| {
                    b.pubrel(packet_id);
                    Ok(())
                })
            }
            (_, Packet::Pubcomp { packet_id }) => {
                if !self.inflight.pubcomp(packet_id) {
                    debug!("{:?}: PUBCOMP for unknown id {}", self.client_id, packet_id);
                }
                Vec::new()
            }

            (_, Packet::Pingreq) => self.send(|b| {
                b.pingresp();
                Ok(())
            }),
            (_, Packet::Disconnect(disconnect)) => self.on_disconnect(&disconnect),

            // CONNACK, SUBACK, UNSUBACK and PINGRESP only flow server to client
            _ => self.violation(kind),
        }
    }

    fn on_connect(&mut self, connect: Connect) -> Vec<Effect> {
        let accepted = match validate_connect(&connect, self.peer, &self.limits) {
            Ok(accepted) => accepted,
            Err(code) => {
                warn!(
                    "Refusing CONNECT from {} (client id {:?}, level {}): {:?}",
                    self.peer, connect.client_id, connect.protocol_version, code
                );
                // Unknown levels are answered in 3.1.1 form
                if let Some(version) = connect.version() {
                    self.version = version;
                }
                let mut effects = self.send(|b| b.connack(&build_rejection_connack(code)));
                effects.extend(self.terminate(false));
                return effects;
            }
        };

        self.version = accepted.version;
        let connack = build_connack(&accepted, &self.limits);

        self.client_id = accepted.client_id;
        self.clean_session = accepted.clean_session;
        self.keep_alive = accepted.keep_alive;
        self.session_expiry = accepted.session_expiry;
        self.will = accepted.will;
        self.state = State::Connected;

        info!(
            "{} connected from {} (protocol level {}, keep-alive {}s{})",
            self.client_id,
            self.peer,
            self.version as u8,
            self.keep_alive,
            if self.will.is_some() { ", with will" } else { "" }
        );

        let mut effects = Vec::new();
        if !accepted.assigned_client_id {
            effects.push(Effect::TakeOver(self.client_id.clone()));
        }
        effects.extend(self.send(|b| b.connack(&connack)));
        effects
    }

    fn on_publish(&mut self, publish: Publish) -> Vec<Effect> {
        let (message, ack) = match validate_publish(&publish, self.limits.max_topic_length) {
            Ok(validated) => validated,
            Err(e) => {
                warn!(
                    "{}: rejected PUBLISH to {:?}: {:?}",
                    self.client_id, publish.topic, e
                );
                return self.abort(e.to_reason_code_v5());
            }
        };

        debug!(
            "{} published {} bytes to {} (QoS {}{})",
            self.client_id,
            message.payload.len(),
            message.topic,
            message.qos as u8,
            if message.retain { ", retained" } else { "" }
        );

        let mut effects = vec![Effect::Route(message)];
        match ack {
            PublisherAck::None => {}
            PublisherAck::Puback(packet_id) => effects.extend(self.send(|b| {
                b.puback(packet_id);
                Ok(())
            })),
            PublisherAck::Pubrec(packet_id) => {
                effects.extend(self.send(|b| {
                    b.pubrec(packet_id);
                    Ok(())
                }));
                self.state = State::WaitForPubRel { packet_id };
            }
        }
        effects
    }

    fn on_subscribe(&mut self, subscribe: Subscribe) -> Vec<Effect> {
        vec![Effect::Subscribe {
            packet_id: subscribe.packet_id,
            requests: subscribe_requests(&subscribe, &self.limits),
        }]
    }

    fn on_unsubscribe(&mut self, unsubscribe: Unsubscribe) -> Vec<Effect> {
        vec![Effect::Unsubscribe {
            packet_id: unsubscribe.packet_id,
            filters: unsubscribe.topics,
        }]
    }

    fn on_disconnect(&mut self, disconnect: &Disconnect) -> Vec<Effect> {
        let publish_will = keeps_will(disconnect, self.version);
        info!(
            "{} disconnected (reason 0x{:02X})",
            self.client_id, disconnect.reason_code
        );
        self.terminate(publish_will)
    }

    fn violation(&mut self, kind: PacketType) -> Vec<Effect> {
        warn!(
            "{} ({:?}): protocol violation, {:?} in state {:?}",
            self.peer, self.client_id, kind, self.state
        );
        self.abort(reason_code::PROTOCOL_ERROR)
    }

    /// Server-initiated close. Live MQTT v5 clients are told why.
    fn abort(&mut self, reason: u8) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.is_live() {
            if let Some(notice) = server_disconnect(self.version, reason) {
                effects.extend(self.send(|b| b.disconnect(&notice)));
            }
        }
        effects.extend(self.terminate(true));
        effects
    }

    fn terminate(&mut self, publish_will: bool) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(will) = self.will.take() {
            if publish_will {
                info!("{}: publishing will to {}", self.client_id, will.topic);
                effects.push(Effect::Route(will));
            }
        }
        self.inflight.clear();
        self.state = State::Disconnected;
        effects.push(Effect::Close);
        effects
    }

    /// SUBACK in this session's protocol version.
    pub fn suback(&self, packet_id: u16, return_codes: Vec<u8>) -> Option<Bytes> {
        let suback = Suback {
            packet_id,
            properties: Vec::new(),
            return_codes,
        };
        self.encode(|b| b.suback(&suback))
    }

    /// UNSUBACK; the reason codes are only sent to MQTT v5 clients.
    pub fn unsuback(&self, packet_id: u16, reason_codes: Vec<u8>) -> Option<Bytes> {
        let unsuback = Unsuback {
            packet_id,
            properties: Vec::new(),
            reason_codes,
        };
        self.encode(|b| b.unsuback(&unsuback))
    }

    /// Encode a PUBLISH for this subscriber.
    ///
    /// QoS 1/2 deliveries take a fresh packet id and stay in flight until
    /// acknowledged. With the in-flight table full the message goes out at
    /// QoS 0. Sessions that are not live receive nothing.
    pub fn deliver(&mut self, topic: &Topic, payload: &Bytes, qos: QoS, retain: bool) -> Option<Bytes> {
        if !self.is_live() {
            return None;
        }
        let mut publish = Publish::new(topic.as_str(), payload.clone());
        publish.retain = retain;
        if qos != QoS::AtMostOnce {
            match self.inflight.allocate(qos) {
                Some(packet_id) => {
                    publish.qos = qos;
                    publish.packet_id = Some(packet_id);
                }
                None => warn!(
                    "{} ({:?}): {} deliveries in flight, sending {} at QoS 0",
                    self.peer,
                    self.client_id,
                    self.inflight.len(),
                    topic.as_str()
                ),
            }
        }

        let bytes = self.encode(|b| b.publish(&publish));
        if bytes.is_none() {
            if let Some(packet_id) = publish.packet_id {
                self.inflight.release(packet_id);
            }
        }
        bytes
    }

    fn send<F>(&self, build: F) -> Vec<Effect>
    where
        F: FnOnce(&mut MessageBuilder) -> Result<(), BuildError>,
    {
        self.encode(build).map(Effect::Send).into_iter().collect()
    }

    fn encode<F>(&self, build: F) -> Option<Bytes>
    where
        F: FnOnce(&mut MessageBuilder) -> Result<(), BuildError>,
    {
        let mut builder = MessageBuilder::with_limits(
            self.version,
            self.limits.max_topic_length,
            self.limits.max_topics_in_subscribe,
        );
        match build(&mut builder) {
            Ok(()) => Some(builder.take()),
            Err(e) => {
                error!("{} ({:?}): failed to encode packet: {}", self.peer, self.client_id, e);
                None
            }
        }
    }
}
