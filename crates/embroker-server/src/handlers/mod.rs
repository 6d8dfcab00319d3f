//! MQTT packet handlers.
//!
//! Validation and acknowledgment logic for the control packets. The session
//! state machine sequences these; nothing here keeps state except the
//! outbound in-flight table.

pub mod connect;
pub mod disconnect;
pub mod publish;
pub mod qos;
pub mod subscribe;
