//! Error types for the embroker codec and topic engine.

use thiserror::Error;

/// Why a framed packet failed to parse.
///
/// A successful parse is the `Ok` side of the parser's `Result`; these are the
/// remaining outcomes of [`ParseResult`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid packet type")]
    InvalidPacketType,

    #[error("Incomplete data")]
    IncompleteData,

    #[error("Invalid remaining length")]
    InvalidRemainingLength,

    #[error("Invalid session present flag")]
    InvalidSessionPresent,

    #[error("Invalid message structure")]
    InvalidMessageStructure,

    #[error("Invalid return code")]
    InvalidReturnCode,
}

/// Flat parse outcome, for callers that log or compare a single code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseResult {
    Success,
    InvalidPacketType,
    IncompleteData,
    InvalidRemainingLength,
    InvalidSessionPresent,
    InvalidMessageStructure,
    InvalidReturnCode,
}

impl From<ParseError> for ParseResult {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::InvalidPacketType => ParseResult::InvalidPacketType,
            ParseError::IncompleteData => ParseResult::IncompleteData,
            ParseError::InvalidRemainingLength => ParseResult::InvalidRemainingLength,
            ParseError::InvalidSessionPresent => ParseResult::InvalidSessionPresent,
            ParseError::InvalidMessageStructure => ParseResult::InvalidMessageStructure,
            ParseError::InvalidReturnCode => ParseResult::InvalidReturnCode,
        }
    }
}

impl<T> From<&std::result::Result<T, ParseError>> for ParseResult {
    fn from(result: &std::result::Result<T, ParseError>) -> Self {
        match result {
            Ok(_) => ParseResult::Success,
            Err(e) => (*e).into(),
        }
    }
}

/// Errors raised while serializing a packet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("String of {len} bytes exceeds the 65535 byte limit")]
    StringTooLong { len: usize },

    #[error("Packet body of {size} bytes exceeds the maximum remaining length")]
    PacketTooLarge { size: usize },

    #[error("Variable byte integer {0} is out of range")]
    VarintOutOfRange(u32),

    #[error("No topic in the request could be encoded")]
    NoTopics,

    #[error("QoS > 0 publish has no packet identifier")]
    MissingPacketId,
}

/// Why one entry of a SUBSCRIBE or UNSUBSCRIBE request was left out.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryError {
    #[error("Topic of {len} bytes exceeds maximum of {max}")]
    TopicTooLong { len: usize, max: usize },

    #[error("Request already holds the maximum of {max} topics")]
    TooManyTopics { max: usize },
}

/// The first topic validation rule a name violates.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicViolation {
    #[error("topic is empty")]
    Empty,

    #[error("topic starts with '/'")]
    LeadingSlash,

    #[error("topic contains a space")]
    ContainsSpace,

    #[error("topic contains an empty level")]
    EmptyLevel,

    #[error("topic mixes '#' and '+'")]
    MixedWildcards,

    #[error("topic repeats a wildcard")]
    RepeatedWildcard,

    #[error("'#' is not the last level")]
    MisplacedMultiLevel,

    #[error("'+' does not occupy a whole level")]
    MisplacedSingleLevel,
}

/// Errors raised when constructing a [`Topic`](crate::topic::Topic).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicError {
    #[error("Topic of {len} bytes exceeds maximum of {max}")]
    TooLong { len: usize, max: usize },

    #[error("Invalid topic: {0}")]
    Invalid(#[from] TopicViolation),
}

/// Crate-level error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("Topic error: {0}")]
    Topic(#[from] TopicError),
}

pub type Result<T> = std::result::Result<T, Error>;
