//! Wrapping sequence numbers for per-peer update ordering

/// Half of the u16 range; forward distances up to this count as newer
const HALF_RANGE: u16 = 32768;

/// Returns whether sequence `s1` is newer than `s2`, accounting for wrap-around
///
/// sequence_greater_than(2, 1) is true
/// sequence_greater_than(1, 2) is false
/// sequence_greater_than(1, 1) is false
/// sequence_greater_than(0, 65535) is true
pub fn sequence_greater_than(s1: u16, s2: u16) -> bool {
    ((s1 > s2) && (s1 - s2 <= HALF_RANGE)) || ((s1 < s2) && (s2 - s1 > HALF_RANGE))
}

/// Returns whether sequence `s1` is older than `s2`, accounting for wrap-around
pub fn sequence_less_than(s1: u16, s2: u16) -> bool {
    sequence_greater_than(s2, s1)
}

/// Generator for outbound sequence numbers
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter {
    next: u16,
}

impl SequenceCounter {
    /// Start at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Start at an arbitrary value
    pub fn starting_at(next: u16) -> Self {
        Self { next }
    }

    /// Take the next sequence number
    pub fn next_sequence(&mut self) -> u16 {
        let sequence = self.next;
        self.next = self.next.wrapping_add(1);
        sequence
    }

    /// Peek at the value the next call will return
    pub fn peek(&self) -> u16 {
        self.next
    }
}
