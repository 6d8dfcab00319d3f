//! embroker - a small-footprint MQTT broker.
//!
//! Sessions are sans-I/O state machines ([`session::Session`]) driven by a
//! [`broker::Broker`] that routes messages between them. The mio front end in
//! [`net`] is one possible transport; anything implementing
//! [`transport::Transport`] can drive the broker.

pub mod broker;
pub mod config;
pub mod error;
pub mod handlers;
pub mod net;
pub mod registry;
pub mod retained;
pub mod session;
pub mod slots;
pub mod transport;

pub use broker::Broker;
pub use config::Config;
pub use error::{Error, Result};
pub use net::Server;
pub use registry::{SubscriptionList, SubscriptionRegistry};
pub use retained::{RetainedList, RetainedStore};
pub use session::{Effect, Event, Session, SessionLimits, State};
pub use slots::SessionId;
pub use transport::{Transport, TransportEvent};
