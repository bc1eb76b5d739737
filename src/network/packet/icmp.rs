pub const ICMP_HEADER_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ICMPHeader {
    pub icmp_type: u8,
    pub icmp_code: u8,
    pub checksum: u16,
}

impl ICMPHeader {
    pub fn parse(data: &[u8]) -> Option<(Self, &[u8])> {
        if data.len() < ICMP_HEADER_LEN {
            return None;
        }

        let icmp_type = data[0];
        let icmp_code = data[1];
        let checksum = u16::from_be_bytes([data[2], data[3]]);

        Some((
            Self {
                icmp_type,
                icmp_code,
                checksum,
            },
            &data[ICMP_HEADER_LEN..]
        ))
    }
}
