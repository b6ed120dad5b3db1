//! Connected X11 clients

use crate::wire::{ByteOrder, Xid};

/// Bits of a resource id owned by the client itself
pub const RESOURCE_ID_MASK: u32 = 0x001f_ffff;
/// Client index lives above the per-client id bits
const CLIENT_OFFSET: u32 = 21;

/// Per-connection state the request handlers need
#[derive(Debug, Clone)]
pub struct Client {
    pub index: u32,
    pub byte_order: ByteOrder,
    pub resource_id_base: u32,
    pub resource_id_mask: u32,
    /// Sequence number of the request being processed
    pub sequence: u16,
}

impl Client {
    /// Client 0 is the server itself; connections start at 1.
    pub fn new(index: u32, byte_order: ByteOrder) -> Self {
        Self {
            index,
            byte_order,
            resource_id_base: index << CLIENT_OFFSET,
            resource_id_mask: RESOURCE_ID_MASK,
            sequence: 0,
        }
    }

    pub fn swapped(&self) -> bool {
        self.byte_order.is_swapped()
    }

    /// Whether `id` falls inside this client's id range
    pub fn owns_id(&self, id: Xid) -> bool {
        id & !self.resource_id_mask == self.resource_id_base
    }

    pub fn next_sequence(&mut self) -> u16 {
        self.sequence = self.sequence.wrapping_add(1);
        self.sequence
    }
}

/// Index of the client that allocated `id`
pub fn client_of(id: Xid) -> u32 {
    id >> CLIENT_OFFSET
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_range() {
        let client = Client::new(1, ByteOrder::LittleEndian);
        assert_eq!(client.resource_id_base, 0x0020_0000);
        assert!(client.owns_id(0x0020_0001));
        assert!(client.owns_id(0x003f_ffff));
        assert!(!client.owns_id(0x0040_0000));
        assert!(!client.owns_id(0x0000_0001));
        assert_eq!(client_of(0x0020_0001), 1);
    }

    #[test]
    fn test_sequence_wraps() {
        let mut client = Client::new(2, ByteOrder::BigEndian);
        client.sequence = u16::MAX;
        assert_eq!(client.next_sequence(), 0);
        assert!(client.swapped());
    }
}
