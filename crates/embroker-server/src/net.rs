//! TCP front end.
//!
//! A single-threaded mio loop: one listener, one non-blocking stream per
//! session. Received bytes are split into packets and handed to the broker;
//! the broker writes back through [`Connections`], which queues output and
//! waits for writability. The keep-alive clock is driven from the same loop.

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use ahash::AHashMap;
use bytes::{Buf, Bytes, BytesMut};
use log::{debug, info, warn};
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Registry, Token};

use crate::broker::Broker;
use crate::config::Config;
use crate::error::Result;
use crate::registry::SubscriptionList;
use crate::retained::RetainedList;
use crate::slots::SessionId;
use crate::transport::{FrameBuffer, FrameError, Transport, TransportEvent};

/// Token for the listener socket.
const LISTENER: Token = Token(0);

/// Bytes pulled from a socket per read call.
const READ_CHUNK: usize = 1024;

struct Connection {
    stream: TcpStream,
    token: Token,
    peer: SocketAddr,
    frames: FrameBuffer,
    out: BytesMut,
}

impl Connection {
    /// Write queued output. Returns true once everything is out.
    fn flush(&mut self) -> io::Result<bool> {
        while !self.out.is_empty() {
            match self.stream.write(&self.out) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => self.out.advance(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }
}

/// What a read pass left behind besides complete packets.
enum ReadOutcome {
    Open,
    Malformed(FrameError),
    Closed,
}

/// Open streams, keyed by session.
pub struct Connections {
    registry: Registry,
    streams: AHashMap<SessionId, Connection>,
    tokens: AHashMap<Token, SessionId>,
    next_token: usize,
    max_packet_size: u32,
}

impl Connections {
    fn new(registry: Registry, max_packet_size: u32) -> Self {
        Self {
            registry,
            streams: AHashMap::new(),
            tokens: AHashMap::new(),
            next_token: LISTENER.0 + 1,
            max_packet_size,
        }
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    fn register(&mut self, session: SessionId, mut stream: TcpStream, peer: SocketAddr) -> io::Result<()> {
        let token = Token(self.next_token);
        self.next_token = self.next_token.wrapping_add(1).max(LISTENER.0 + 1);
        self.registry
            .register(&mut stream, token, Interest::READABLE)?;
        self.tokens.insert(token, session);
        self.streams.insert(
            session,
            Connection {
                stream,
                token,
                peer,
                frames: FrameBuffer::new(self.max_packet_size),
                out: BytesMut::new(),
            },
        );
        Ok(())
    }

    fn session_of(&self, token: Token) -> Option<SessionId> {
        self.tokens.get(&token).copied()
    }

    /// Drain the socket and split what arrived into packets.
    fn receive(&mut self, session: SessionId) -> (Vec<Bytes>, ReadOutcome) {
        let mut packets = Vec::new();
        let Some(conn) = self.streams.get_mut(&session) else {
            return (packets, ReadOutcome::Closed);
        };

        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match conn.stream.read(&mut chunk) {
                Ok(0) => return (packets, ReadOutcome::Closed),
                Ok(n) => {
                    conn.frames.extend(&chunk[..n]);
                    loop {
                        match conn.frames.next_frame() {
                            Ok(Some(packet)) => packets.push(packet),
                            Ok(None) => break,
                            Err(e) => return (packets, ReadOutcome::Malformed(e)),
                        }
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return (packets, ReadOutcome::Open)
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    debug!("{}: read from {} failed: {}", session, conn.peer, e);
                    return (packets, ReadOutcome::Closed);
                }
            }
        }
    }

    /// Flush a session's output. Returns true once everything is out.
    fn flush(&mut self, session: SessionId) -> io::Result<bool> {
        let Some(conn) = self.streams.get_mut(&session) else {
            return Err(io::ErrorKind::NotConnected.into());
        };
        let done = conn.flush().inspect_err(|e| {
            debug!("{}: write to {} failed: {}", session, conn.peer, e);
        })?;
        if done {
            self.registry
                .reregister(&mut conn.stream, conn.token, Interest::READABLE)?;
        }
        Ok(done)
    }
}

impl Transport for Connections {
    fn send(&mut self, session: SessionId, data: Bytes) {
        let Some(conn) = self.streams.get_mut(&session) else {
            return;
        };
        let idle = conn.out.is_empty();
        conn.out.extend_from_slice(&data);
        if idle {
            if let Err(e) = self.registry.reregister(
                &mut conn.stream,
                conn.token,
                Interest::READABLE | Interest::WRITABLE,
            ) {
                warn!("{}: reregister failed: {}", session, e);
            }
        }
    }

    fn close(&mut self, session: SessionId) {
        let Some(mut conn) = self.streams.remove(&session) else {
            return;
        };
        self.tokens.remove(&conn.token);
        // Last chance for a final CONNACK or DISCONNECT
        if let Ok(false) = conn.flush() {
            debug!("{}: dropping {} unsent bytes", session, conn.out.len());
        }
        if let Err(e) = self.registry.deregister(&mut conn.stream) {
            debug!("{}: deregister failed: {}", session, e);
        }
        // The peer may already be gone
        if let Err(e) = conn.stream.shutdown(std::net::Shutdown::Both) {
            debug!("{}: shutdown failed: {}", session, e);
        }
        debug!("{}: closed connection to {}", session, conn.peer);
    }
}

/// The broker's network loop.
pub struct Server {
    poll: Poll,
    listener: TcpListener,
    connections: Connections,
    broker: Broker<SubscriptionList, RetainedList>,
    tick: Duration,
}

impl Server {
    /// Bind the listener from `config.server.bind`.
    pub fn new(config: &Config) -> Result<Self> {
        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(config.server.bind)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        let connections = Connections::new(
            poll.registry().try_clone()?,
            config.limits.max_packet_size,
        );

        Ok(Self {
            poll,
            listener,
            connections,
            broker: Broker::from_config(config),
            tick: Duration::from_millis(config.server.tick_ms),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn broker(&self) -> &Broker<SubscriptionList, RetainedList> {
        &self.broker
    }

    /// Serve until an unrecoverable I/O error.
    pub fn run(&mut self) -> Result<()> {
        info!("Listening on {}", self.local_addr()?);

        let mut events = Events::with_capacity(256);
        let mut next_tick = Instant::now() + self.tick;

        loop {
            let timeout = next_tick.saturating_duration_since(Instant::now());
            if let Err(e) = self.poll.poll(&mut events, Some(timeout)) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(e.into());
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept_connections()?,
                    token => {
                        if event.is_readable() || event.is_read_closed() {
                            self.handle_readable(token);
                        }
                        if event.is_writable() {
                            self.handle_writable(token);
                        }
                    }
                }
            }

            while Instant::now() >= next_tick {
                self.broker.tick(&mut self.connections);
                next_tick += self.tick;
            }
        }
    }

    fn accept_connections(&mut self) -> Result<()> {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    let Some(session) = self
                        .broker
                        .handle_event(&mut self.connections, TransportEvent::Connected { peer })
                    else {
                        // Dropping the stream closes it
                        continue;
                    };
                    if let Err(e) = self.connections.register(session, stream, peer) {
                        warn!("{}: failed to register {}: {}", session, peer, e);
                        self.broker
                            .handle_event(&mut self.connections, TransportEvent::Closed { session });
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn handle_readable(&mut self, token: Token) {
        let Some(session) = self.connections.session_of(token) else {
            return;
        };

        let (packets, outcome) = self.connections.receive(session);
        for frame in packets {
            let event = TransportEvent::Data { session, frame };
            if self
                .broker
                .handle_event(&mut self.connections, event)
                .is_none()
            {
                return;
            }
        }

        let event = match outcome {
            ReadOutcome::Open => return,
            ReadOutcome::Malformed(error) => TransportEvent::Malformed { session, error },
            ReadOutcome::Closed => TransportEvent::Closed { session },
        };
        self.broker.handle_event(&mut self.connections, event);
    }

    fn handle_writable(&mut self, token: Token) {
        let Some(session) = self.connections.session_of(token) else {
            return;
        };
        let event = match self.connections.flush(session) {
            Ok(true) => TransportEvent::Sent { session },
            Ok(false) => return,
            Err(_) => TransportEvent::Closed { session },
        };
        self.broker.handle_event(&mut self.connections, event);
    }
}
