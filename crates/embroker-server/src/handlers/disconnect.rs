//! DISCONNECT handling, in both directions.

use embroker_core::packet::reason_code;
use embroker_core::{Disconnect, ProtocolVersion};

/// Whether a client DISCONNECT still wants its will published.
///
/// MQTT v5 reason code 0x04 means "Disconnect with Will Message". Any other
/// reason code, and every v3.1.1 DISCONNECT, discards the will.
#[inline]
pub fn keeps_will(disconnect: &Disconnect, version: ProtocolVersion) -> bool {
    version.is_v5() && disconnect.reason_code == reason_code::DISCONNECT_WITH_WILL
}

/// DISCONNECT the broker sends before closing, MQTT v5 only.
#[inline]
pub fn server_disconnect(version: ProtocolVersion, reason: u8) -> Option<Disconnect> {
    version.is_v5().then(|| Disconnect {
        reason_code: reason,
        properties: Vec::new(),
    })
}
