//! embroker-core - MQTT wire codec and topic engine.
//!
//! Parsers, the outbound [`MessageBuilder`], MQTT v5 properties and the topic
//! validation and matching rules shared by the broker.

pub mod builder;
pub mod decoder;
pub mod error;
pub mod packet;
pub mod parser;
pub mod property;
pub mod topic;
pub mod varint;

pub use builder::{EntryReport, MessageBuilder};
pub use error::{
    BuildError, EntryError, Error, ParseError, ParseResult, Result, TopicError, TopicViolation,
};
pub use packet::*;
pub use property::{Property, PropertyId, PropertyValue};
pub use topic::Topic;
