use std::net::SocketAddr;

use bytes::Bytes;

use embroker_core::parser::decode_packet;
use embroker_core::{
    reason_code, ConnackReasonCode, Connect, Disconnect, MessageBuilder, Packet,
    ProtocolVersion, Publish, QoS, Subscribe, SubscriptionOptions, Will,
};
use embroker_server::{
    Broker, Config, RetainedList, SessionId, State, SubscriptionList, SubscriptionRegistry, Transport, TransportEvent,
};

#[derive(Default)]
struct RecordingTransport {
    sent: Vec<(SessionId, Bytes)>,
    closed: Vec<SessionId>,
}

impl Transport for RecordingTransport {
    fn send(&mut self, session: SessionId, data: Bytes) {
        self.sent.push((session, data));
    }

    fn close(&mut self, session: SessionId) {
        self.closed.push(session);
    }
}

struct Harness {
    broker: Broker<SubscriptionList, RetainedList>,
    transport: RecordingTransport,
}

impl Harness {
    fn new() -> Self {
        Self {
            broker: Broker::from_config(&Config::default()),
            transport: RecordingTransport::default(),
        }
    }

    fn open(&mut self) -> SessionId {
        let peer = SocketAddr::from(([10, 0, 0, 2], 50000));
        self.broker
            .handle_event(&mut self.transport, TransportEvent::Connected { peer })
            .unwrap()
    }

    fn feed(
        &mut self,
        session: SessionId,
        version: ProtocolVersion,
        build: impl FnOnce(&mut MessageBuilder),
    ) {
        let mut builder = MessageBuilder::new(version);
        build(&mut builder);
        self.broker.handle_event(
            &mut self.transport,
            TransportEvent::Data {
                session,
                frame: builder.take(),
            },
        );
    }

    fn connect(&mut self, connect: Connect) -> SessionId {
        let version = connect.version().unwrap();
        let id = self.open();
        self.feed(id, version, |b| b.connect(&connect).unwrap());
        assert!(matches!(
            &self.received(id, version)[..],
            [Packet::Connack(c)] if c.reason_code == ConnackReasonCode::Success
        ));
        id
    }

    /// Packets sent to `session` since the last call, decoded as `version`.
    fn received(&mut self, session: SessionId, version: ProtocolVersion) -> Vec<Packet> {
        let (mine, rest): (Vec<_>, Vec<_>) = self
            .transport
            .sent
            .drain(..)
            .partition(|(id, _)| *id == session);
        self.transport.sent = rest;
        mine.iter()
            .map(|(_, bytes)| decode_packet(bytes, version).unwrap())
            .collect()
    }
}

fn subscribe(filters: &[(&str, QoS)]) -> Subscribe {
    Subscribe {
        packet_id: 10,
        properties: Vec::new(),
        topics: filters
            .iter()
            .map(|(f, qos)| (f.to_string(), SubscriptionOptions::new(*qos)))
            .collect(),
    }
}

const V3: ProtocolVersion = ProtocolVersion::V3_1_1;
const V5: ProtocolVersion = ProtocolVersion::V5;

#[test]
fn test_will_published_on_keep_alive_expiry() {
    let mut h = Harness::new();
    let watcher = h.connect(Connect::new("watcher", V3, 60));
    h.feed(watcher, V3, |b| {
        b.subscribe(&subscribe(&[("status/#", QoS::AtLeastOnce)]))
            .unwrap();
    });
    h.received(watcher, V3);

    let mut connect = Connect::new("sensor", V3, 1);
    connect.will = Some(Will {
        topic: "status/sensor".into(),
        payload: Bytes::from_static(b"offline"),
        qos: QoS::AtLeastOnce,
        retain: false,
        properties: Vec::new(),
    });
    let sensor = h.connect(connect);
    assert_eq!(h.broker.session(sensor).unwrap().keep_alive_limit(), 12);

    for _ in 0..12 {
        h.broker.tick(&mut h.transport);
    }
    assert!(h.broker.session(sensor).is_some());
    // Keep the watcher alive while the sensor times out
    h.feed(watcher, V3, |b| b.pingreq());
    assert_eq!(h.received(watcher, V3), vec![Packet::Pingresp]);

    h.broker.tick(&mut h.transport);
    assert!(h.broker.session(sensor).is_none());
    assert_eq!(h.transport.closed, vec![sensor]);
    match &h.received(watcher, V3)[..] {
        [Packet::Publish(p)] => {
            assert_eq!(p.topic, "status/sensor");
            assert_eq!(&p.payload[..], b"offline");
            assert_eq!(p.qos, QoS::AtLeastOnce);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_clean_disconnect_discards_will() {
    let mut h = Harness::new();
    let watcher = h.connect(Connect::new("watcher", V3, 60));
    h.feed(watcher, V3, |b| {
        b.subscribe(&subscribe(&[("#", QoS::AtMostOnce)])).unwrap();
    });
    h.received(watcher, V3);

    let mut connect = Connect::new("sensor", V3, 60);
    connect.will = Some(Will {
        topic: "status/sensor".into(),
        payload: Bytes::from_static(b"offline"),
        qos: QoS::AtMostOnce,
        retain: false,
        properties: Vec::new(),
    });
    let sensor = h.connect(connect);
    h.feed(sensor, V3, |b| b.disconnect(&Disconnect::default()).unwrap());

    assert_eq!(h.transport.closed, vec![sensor]);
    assert!(h.received(watcher, V3).is_empty());
}

#[test]
fn test_v5_takeover_notifies_previous_session() {
    let mut h = Harness::new();
    let first = h.connect(Connect::new("dev", V5, 60));
    let second = h.connect(Connect::new("dev", V5, 60));

    match &h.received(first, V5)[..] {
        [Packet::Disconnect(d)] => assert_eq!(d.reason_code, reason_code::SESSION_TAKEN_OVER),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(h.transport.closed, vec![first]);
    assert_eq!(h.broker.session(second).unwrap().state(), State::Connected);
}

#[test]
fn test_v5_suback_reports_invalid_filter() {
    let mut h = Harness::new();
    let id = h.connect(Connect::new("dev", V5, 60));
    h.feed(id, V5, |b| {
        b.subscribe(&subscribe(&[("a/#", QoS::AtLeastOnce), ("a/#/b", QoS::AtMostOnce)]))
            .unwrap();
    });
    match &h.received(id, V5)[..] {
        [Packet::Suback(s)] => {
            assert_eq!(s.packet_id, 10);
            assert_eq!(
                s.return_codes,
                vec![reason_code::GRANTED_QOS_1, reason_code::TOPIC_FILTER_INVALID]
            );
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(h.broker.registry().len(), 1);
}

#[test]
fn test_exactly_once_handshake() {
    let mut h = Harness::new();
    let id = h.connect(Connect::new("dev", V3, 60));

    let mut publish = Publish::new("plant/pump", Bytes::from_static(b"1"));
    publish.qos = QoS::ExactlyOnce;
    publish.packet_id = Some(5);
    h.feed(id, V3, |b| b.publish(&publish).unwrap());
    assert_eq!(h.received(id, V3), vec![Packet::Pubrec { packet_id: 5 }]);
    assert_eq!(
        h.broker.session(id).unwrap().state(),
        State::WaitForPubRel { packet_id: 5 }
    );

    h.feed(id, V3, |b| b.pubrel(5));
    assert_eq!(h.received(id, V3), vec![Packet::Pubcomp { packet_id: 5 }]);
    assert_eq!(h.broker.session(id).unwrap().state(), State::Connected);
}

#[test]
fn test_publish_while_awaiting_pubrel_closes() {
    let mut h = Harness::new();
    let id = h.connect(Connect::new("dev", V3, 60));

    let mut publish = Publish::new("plant/pump", Bytes::from_static(b"1"));
    publish.qos = QoS::ExactlyOnce;
    publish.packet_id = Some(5);
    h.feed(id, V3, |b| b.publish(&publish).unwrap());
    h.received(id, V3);

    h.feed(id, V3, |b| b.publish(&publish).unwrap());
    assert_eq!(h.transport.closed, vec![id]);
    assert!(h.broker.session(id).is_none());
}
