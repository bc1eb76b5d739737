use std::fmt;

pub const ETHERNET_HEADER_LEN: usize = 14;

// これ以下の値は IEEE 802.3 の長さフィールドとして扱う
pub const ETHERNET_II_MIN_TYPE: u16 = 0x05DC;

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;
pub const ETHERTYPE_IPX: u16 = 0x8137;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub destination: MacAddr,
    pub source: MacAddr,
    pub ethertype: u16,
}

impl EthernetHeader {
    pub fn new(destination: [u8; 6], source: [u8; 6], ethertype: u16) -> Self {
        Self {
            destination: MacAddr(destination),
            source: MacAddr(source),
            ethertype,
        }
    }

    pub fn parse(data: &[u8]) -> Option<(Self, &[u8])> {
        if data.len() < ETHERNET_HEADER_LEN {
            return None;
        }

        let mut destination = [0u8; 6];
        let mut source = [0u8; 6];

        destination.copy_from_slice(&data[0..6]);
        source.copy_from_slice(&data[6..12]);
        let ethertype = u16::from_be_bytes([data[12], data[13]]);

        Some((
            Self::new(destination, source, ethertype),
            &data[ETHERNET_HEADER_LEN..]
        ))
    }

    /// タイプフィールドが長さとして解釈できない値なら Ethernet II フレーム
    pub fn is_ethernet_ii(&self) -> bool {
        self.ethertype > ETHERNET_II_MIN_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_addresses_in_wire_order() {
        let mut frame = vec![0xff; 6];
        frame.extend_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        frame.extend_from_slice(&[0x08, 0x06]);
        frame.extend_from_slice(&[1, 2, 3]);

        let (header, payload) = EthernetHeader::parse(&frame).unwrap();
        assert_eq!(header.destination, MacAddr([0xff; 6]));
        assert_eq!(header.source.to_string(), "00:11:22:33:44:55");
        assert_eq!(header.ethertype, ETHERTYPE_ARP);
        assert_eq!(payload, &[1, 2, 3]);
    }

    #[test]
    fn length_field_is_not_ethernet_ii() {
        let header = EthernetHeader::new([0; 6], [0; 6], 0x05DC);
        assert!(!header.is_ethernet_ii());
        let header = EthernetHeader::new([0; 6], [0; 6], 0x05DD);
        assert!(header.is_ethernet_ii());
    }

    #[test]
    fn short_frame_is_rejected() {
        assert!(EthernetHeader::parse(&[0u8; 13]).is_none());
    }
}
