//! QoS acknowledgment tracking for broker-to-client deliveries.
//!
//! The broker is the sender here:
//! - QoS 1 deliveries wait for PUBACK
//! - QoS 2 deliveries wait for PUBREC, then for PUBCOMP after our PUBREL

use ahash::AHashMap;

use embroker_core::QoS;

/// What an outstanding delivery is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Awaiting {
    Puback,
    Pubrec,
    Pubcomp,
}

/// Outbound in-flight table and packet identifier allocator.
#[derive(Debug)]
pub struct Inflight {
    next_packet_id: u16,
    capacity: u16,
    pending: AHashMap<u16, Awaiting>,
}

impl Inflight {
    /// Table holding at most `capacity` unacknowledged deliveries.
    /// A capacity of 0 allows every packet id.
    pub fn with_capacity(capacity: u16) -> Self {
        let capacity = if capacity == 0 { u16::MAX } else { capacity };
        Self {
            next_packet_id: 1,
            capacity,
            pending: AHashMap::with_capacity(usize::from(capacity.min(64))),
        }
    }

    pub fn capacity(&self) -> u16 {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.pending.len() >= usize::from(self.capacity)
    }

    /// Reserve a packet id for a QoS 1/2 delivery, or `None` when the table
    /// is full.
    ///
    /// Ids run 1..=65535 and wrap to 1; ids still in flight are skipped and
    /// never reassigned.
    pub fn allocate(&mut self, qos: QoS) -> Option<u16> {
        if self.is_full() {
            return None;
        }
        let awaiting = match qos {
            QoS::ExactlyOnce => Awaiting::Pubrec,
            _ => Awaiting::Puback,
        };

        // Fewer than 65535 ids are pending, so a free one is reached
        let mut id = self.advance();
        while self.pending.contains_key(&id) {
            id = self.advance();
        }
        self.pending.insert(id, awaiting);
        Some(id)
    }

    /// Give back an id whose delivery was never sent.
    pub fn release(&mut self, packet_id: u16) {
        self.pending.remove(&packet_id);
    }

    fn advance(&mut self) -> u16 {
        let id = self.next_packet_id;
        self.next_packet_id = if id == u16::MAX { 1 } else { id + 1 };
        id
    }

    /// PUBACK completes a QoS 1 delivery.
    pub fn puback(&mut self, packet_id: u16) -> bool {
        self.complete(packet_id, Awaiting::Puback)
    }

    /// PUBREC moves a QoS 2 delivery on to waiting for PUBCOMP.
    pub fn pubrec(&mut self, packet_id: u16) -> bool {
        match self.pending.get(&packet_id) {
            Some(Awaiting::Pubrec) => {
                self.pending.insert(packet_id, Awaiting::Pubcomp);
                true
            }
            // Retransmitted PUBREC
            Some(Awaiting::Pubcomp) => true,
            _ => false,
        }
    }

    /// PUBCOMP completes a QoS 2 delivery.
    pub fn pubcomp(&mut self, packet_id: u16) -> bool {
        self.complete(packet_id, Awaiting::Pubcomp)
    }

    fn complete(&mut self, packet_id: u16, expected: Awaiting) -> bool {
        if self.pending.get(&packet_id) == Some(&expected) {
            self.pending.remove(&packet_id);
            true
        } else {
            false
        }
    }

    pub fn awaiting(&self, packet_id: u16) -> Option<Awaiting> {
        self.pending.get(&packet_id).copied()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos1_flow() {
        let mut inflight = Inflight::with_capacity(0);
        let id = inflight.allocate(QoS::AtLeastOnce).unwrap();
        assert_eq!(id, 1);
        assert_eq!(inflight.awaiting(id), Some(Awaiting::Puback));
        assert!(!inflight.pubcomp(id));
        assert!(inflight.puback(id));
        assert!(inflight.is_empty());
        assert!(!inflight.puback(id));
    }

    #[test]
    fn test_qos2_flow() {
        let mut inflight = Inflight::with_capacity(0);
        let id = inflight.allocate(QoS::ExactlyOnce).unwrap();
        assert!(!inflight.puback(id));
        assert!(inflight.pubrec(id));
        assert!(inflight.pubrec(id));
        assert_eq!(inflight.awaiting(id), Some(Awaiting::Pubcomp));
        assert!(inflight.pubcomp(id));
        assert!(inflight.is_empty());
    }

    #[test]
    fn test_packet_id_wraps_to_one() {
        let mut inflight = Inflight::with_capacity(0);
        inflight.next_packet_id = u16::MAX;
        assert_eq!(inflight.allocate(QoS::AtLeastOnce), Some(u16::MAX));
        assert_eq!(inflight.allocate(QoS::AtLeastOnce), Some(1));
    }

    #[test]
    fn test_ids_in_flight_are_skipped() {
        let mut inflight = Inflight::with_capacity(0);
        let first = inflight.allocate(QoS::AtLeastOnce).unwrap();
        inflight.next_packet_id = first;
        assert_eq!(inflight.allocate(QoS::AtLeastOnce), Some(first + 1));
        assert_eq!(inflight.len(), 2);
    }

    #[test]
    fn test_full_table_refuses_and_keeps_pending_state() {
        let mut inflight = Inflight::with_capacity(3);
        let exactly_once = inflight.allocate(QoS::ExactlyOnce).unwrap();
        assert!(inflight.pubrec(exactly_once));
        inflight.allocate(QoS::AtLeastOnce).unwrap();
        inflight.allocate(QoS::AtLeastOnce).unwrap();
        assert!(inflight.is_full());

        for _ in 0..1000 {
            assert_eq!(inflight.allocate(QoS::AtLeastOnce), None);
        }
        assert_eq!(inflight.len(), 3);
        assert_eq!(inflight.awaiting(exactly_once), Some(Awaiting::Pubcomp));

        // An ack frees a slot; the freed id is not handed out again at once
        assert!(inflight.pubcomp(exactly_once));
        let next = inflight.allocate(QoS::AtLeastOnce).unwrap();
        assert_ne!(next, exactly_once);
        assert_eq!(next, 4);
    }

    #[test]
    fn test_wrap_skips_every_pending_id() {
        let mut inflight = Inflight::with_capacity(0);
        assert_eq!(inflight.capacity(), u16::MAX);
        let first = inflight.allocate(QoS::ExactlyOnce).unwrap();
        let second = inflight.allocate(QoS::ExactlyOnce).unwrap();
        inflight.next_packet_id = u16::MAX;
        assert_eq!(inflight.allocate(QoS::AtLeastOnce), Some(u16::MAX));
        // 1 and 2 are still waiting for PUBREC
        assert_eq!(inflight.allocate(QoS::AtLeastOnce), Some(3));
        assert_eq!(inflight.awaiting(first), Some(Awaiting::Pubrec));
        assert_eq!(inflight.awaiting(second), Some(Awaiting::Pubrec));
    }

    #[test]
    fn test_release_frees_slot() {
        let mut inflight = Inflight::with_capacity(1);
        let id = inflight.allocate(QoS::AtLeastOnce).unwrap();
        assert_eq!(inflight.allocate(QoS::AtLeastOnce), None);
        inflight.release(id);
        assert!(inflight.is_empty());
        assert!(inflight.allocate(QoS::AtLeastOnce).is_some());
    }
}
