//! テスト用のフレーム組み立て

use crate::network::packet::ethernet::ETHERTYPE_IPV4;
use crate::network::packet::ipv4::{IPPROTO_ICMP, IPPROTO_TCP, IPPROTO_UDP};

const SOURCE_MAC: [u8; 6] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
const DESTINATION_MAC: [u8; 6] = [0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb];

#[derive(Debug, Clone)]
pub struct FrameBuilder {
    source: [u8; 4],
    destination: [u8; 4],
    protocol: u8,
    transport_header: Vec<u8>,
    payload: Vec<u8>,
    padding: usize,
}

impl FrameBuilder {
    pub fn tcp(source: [u8; 4], source_port: u16, destination: [u8; 4], destination_port: u16) -> Self {
        let mut header = vec![0u8; 20];
        header[0..2].copy_from_slice(&source_port.to_be_bytes());
        header[2..4].copy_from_slice(&destination_port.to_be_bytes());
        header[4..8].copy_from_slice(&1000u32.to_be_bytes());
        header[8..12].copy_from_slice(&2000u32.to_be_bytes());
        header[12] = 0x50;
        header[13] = 0x18;
        header[14..16].copy_from_slice(&65535u16.to_be_bytes());
        Self::with_header(source, destination, IPPROTO_TCP, header)
    }

    pub fn udp(source: [u8; 4], source_port: u16, destination: [u8; 4], destination_port: u16) -> Self {
        let mut header = vec![0u8; 8];
        header[0..2].copy_from_slice(&source_port.to_be_bytes());
        header[2..4].copy_from_slice(&destination_port.to_be_bytes());
        Self::with_header(source, destination, IPPROTO_UDP, header)
    }

    pub fn icmp(source: [u8; 4], destination: [u8; 4], icmp_type: u8, icmp_code: u8) -> Self {
        let header = vec![icmp_type, icmp_code, 0xf7, 0xff];
        Self::with_header(source, destination, IPPROTO_ICMP, header)
    }

    /// 任意のタイプフィールドを持つイーサネットフレーム
    pub fn raw(ethertype: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(14 + payload.len());
        frame.extend_from_slice(&DESTINATION_MAC);
        frame.extend_from_slice(&SOURCE_MAC);
        frame.extend_from_slice(&ethertype.to_be_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    fn with_header(source: [u8; 4], destination: [u8; 4], protocol: u8, transport_header: Vec<u8>) -> Self {
        Self {
            source,
            destination,
            protocol,
            transport_header,
            payload: Vec::new(),
            padding: 0,
        }
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    pub fn protocol(mut self, protocol: u8) -> Self {
        self.protocol = protocol;
        self
    }

    /// IP の Total Length に含まれない末尾のバイト
    pub fn padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let segment_len = self.transport_header.len() + self.payload.len();
        let total_length = (20 + segment_len) as u16;

        let mut ip = vec![0u8; 20];
        ip[0] = 0x45;
        ip[2..4].copy_from_slice(&total_length.to_be_bytes());
        ip[4..6].copy_from_slice(&0x1234u16.to_be_bytes());
        ip[6] = 0x40;
        ip[8] = 64;
        ip[9] = self.protocol;
        ip[12..16].copy_from_slice(&self.source);
        ip[16..20].copy_from_slice(&self.destination);
        ip.extend_from_slice(&self.transport_header);

        if self.protocol == IPPROTO_UDP && self.transport_header.len() == 8 {
            let udp_length = (8 + self.payload.len()) as u16;
            ip[24..26].copy_from_slice(&udp_length.to_be_bytes());
        }

        ip.extend_from_slice(&self.payload);
        ip.extend(std::iter::repeat(0u8).take(self.padding));

        Self::raw(ETHERTYPE_IPV4, &ip)
    }
}
