use std::net::Ipv4Addr;

pub const IPV4_MIN_HEADER_LEN: usize = 20;

pub const IPPROTO_ICMP: u8 = 1;
pub const IPPROTO_TCP: u8 = 6;
pub const IPPROTO_UDP: u8 = 17;

// 0                   1                   2                   3
// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |Version|  IHL  |Type of Service|          Total Length         |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |         Identification        |Flags|      Fragment Offset    |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |  Time to Live |    Protocol   |         Header Checksum       |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                       Source Address                          |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                    Destination Address                        |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IPv4Header {
    pub version: u8,
    /// ヘッダー長 (32ビットワード単位)
    pub ihl: u8,
    pub dscp: u8,
    pub ecn: u8,
    pub total_length: u16,
    pub identification: u16,
    pub dont_fragment: bool,
    pub more_fragments: bool,
    pub fragment_offset: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
}

impl IPv4Header {
    /// 返されるペイロードは Total Length で切り詰められる (イーサネットのパディングを除く)
    pub fn parse(data: &[u8]) -> Option<(Self, &[u8])> {
        if data.len() < IPV4_MIN_HEADER_LEN {
            return None;
        }

        let version = (data[0] >> 4) & 0xf;
        let ihl = data[0] & 0xf;
        let header_len = ihl as usize * 4;
        if header_len < IPV4_MIN_HEADER_LEN || data.len() < header_len {
            return None;
        }

        let dscp = data[1] >> 2;
        let ecn = data[1] & 0x3;
        let total_length = u16::from_be_bytes([data[2], data[3]]);
        let identification = u16::from_be_bytes([data[4], data[5]]);
        let flags_fragment = u16::from_be_bytes([data[6], data[7]]);
        let dont_fragment = flags_fragment & 0x4000 != 0;
        let more_fragments = flags_fragment & 0x2000 != 0;
        let fragment_offset = flags_fragment & 0x1fff;
        let ttl = data[8];
        let protocol = data[9];
        let checksum = u16::from_be_bytes([data[10], data[11]]);
        let source = Ipv4Addr::new(data[12], data[13], data[14], data[15]);
        let destination = Ipv4Addr::new(data[16], data[17], data[18], data[19]);

        let end = match total_length as usize {
            len if len >= header_len && len <= data.len() => len,
            _ => data.len(),
        };

        Some((
            Self {
                version,
                ihl,
                dscp,
                ecn,
                total_length,
                identification,
                dont_fragment,
                more_fragments,
                fragment_offset,
                ttl,
                protocol,
                checksum,
                source,
                destination,
            },
            &data[header_len..end]
        ))
    }

    pub fn header_len(&self) -> usize {
        self.ihl as usize * 4
    }

    /// Total Length からヘッダー長を引いたもの。0 未満にはならない
    pub fn payload_size(&self) -> u16 {
        self.total_length.saturating_sub(self.ihl as u16 * 4)
    }
}
