pub mod ethernet;
pub mod ipv4;
pub mod tcp;
pub mod udp;
pub mod icmp;

#[cfg(test)]
pub mod builder;

use crate::network::packet::ethernet::{EthernetHeader, ETHERTYPE_ARP, ETHERTYPE_IPV4, ETHERTYPE_IPX};
use crate::network::packet::icmp::ICMPHeader;
use crate::network::packet::ipv4::{IPv4Header, IPPROTO_ICMP, IPPROTO_TCP, IPPROTO_UDP};
use crate::network::packet::tcp::{TCPHeader, TCP_MIN_HEADER_LEN};
use crate::network::packet::udp::UDPHeader;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// 1フレーム分のデコード結果。キャプチャバッファを借用するので、そのループ周回の外には持ち出せない
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedPacket<'a> {
    pub link: LinkLayer<'a>,
    pub network: NetworkLayer<'a>,
    pub transport: TransportLayer<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLayer<'a> {
    EthernetII {
        header: EthernetHeader,
        payload: &'a [u8],
    },
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkLayer<'a> {
    IP {
        header: IPv4Header,
        payload: &'a [u8],
    },
    ARP {
        payload: &'a [u8],
    },
    IPX {
        payload: &'a [u8],
    },
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportLayer<'a> {
    ICMP {
        header: ICMPHeader,
        payload: &'a [u8],
    },
    UDP {
        header: UDPHeader,
        payload: &'a [u8],
    },
    TCP {
        header: TCPHeader,
        /// TCPヘッダーから始まるセグメント
        segment: &'a [u8],
        /// IP Total Length - IPヘッダー長 (バイト)
        payload_size: u16,
    },
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkProtocol {
    IP,
    ARP,
    IPX,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportProtocol {
    ICMP,
    UDP,
    TCP,
    Unknown,
}

impl fmt::Display for NetworkProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NetworkProtocol::IP => "IP",
            NetworkProtocol::ARP => "ARP",
            NetworkProtocol::IPX => "IPX",
            NetworkProtocol::Unknown => "UNKNOWN",
        };
        f.pad(name)
    }
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportProtocol::ICMP => "ICMP",
            TransportProtocol::UDP => "UDP",
            TransportProtocol::TCP => "TCP",
            TransportProtocol::Unknown => "UNKNOWN",
        };
        f.pad(name)
    }
}

/// フレームをリンク層、ネットワーク層、トランスポート層の順にデコードする。
/// 失敗はせず、解釈できない層 (および短すぎる層) は Unknown になる
pub fn decode(frame: &[u8]) -> DecodedPacket<'_> {
    let link = decode_link(frame);
    let network = decode_network(&link);
    let transport = decode_transport(&network);

    DecodedPacket {
        link,
        network,
        transport,
    }
}

fn decode_link(frame: &[u8]) -> LinkLayer<'_> {
    match EthernetHeader::parse(frame) {
        Some((header, payload)) if header.is_ethernet_ii() => LinkLayer::EthernetII { header, payload },
        _ => LinkLayer::Unknown,
    }
}

fn decode_network<'a>(link: &LinkLayer<'a>) -> NetworkLayer<'a> {
    let (header, payload) = match *link {
        LinkLayer::EthernetII { header, payload } => (header, payload),
        LinkLayer::Unknown => return NetworkLayer::Unknown,
    };

    match header.ethertype {
        ETHERTYPE_IPV4 => match IPv4Header::parse(payload) {
            Some((header, payload)) => NetworkLayer::IP { header, payload },
            None => NetworkLayer::Unknown,
        },
        ETHERTYPE_ARP => NetworkLayer::ARP { payload },
        ETHERTYPE_IPX => NetworkLayer::IPX { payload },
        _ => NetworkLayer::Unknown,
    }
}

fn decode_transport<'a>(network: &NetworkLayer<'a>) -> TransportLayer<'a> {
    let (ip, payload) = match *network {
        NetworkLayer::IP { header, payload } => (header, payload),
        _ => return TransportLayer::Unknown,
    };

    match ip.protocol {
        IPPROTO_ICMP => match ICMPHeader::parse(payload) {
            Some((header, payload)) => TransportLayer::ICMP { header, payload },
            None => TransportLayer::Unknown,
        },
        IPPROTO_UDP => match UDPHeader::parse(payload) {
            Some((header, payload)) => TransportLayer::UDP { header, payload },
            None => TransportLayer::Unknown,
        },
        IPPROTO_TCP => match TCPHeader::parse(payload) {
            // パディング除去とは無関係に IP ヘッダーの値から求める
            Some((header, segment)) => TransportLayer::TCP {
                header,
                segment,
                payload_size: ip.payload_size(),
            },
            None => TransportLayer::Unknown,
        },
        _ => TransportLayer::Unknown,
    }
}

impl<'a> DecodedPacket<'a> {
    pub fn network_protocol(&self) -> NetworkProtocol {
        match self.network {
            NetworkLayer::IP { .. } => NetworkProtocol::IP,
            NetworkLayer::ARP { .. } => NetworkProtocol::ARP,
            NetworkLayer::IPX { .. } => NetworkProtocol::IPX,
            NetworkLayer::Unknown => NetworkProtocol::Unknown,
        }
    }

    pub fn transport_protocol(&self) -> TransportProtocol {
        match self.transport {
            TransportLayer::ICMP { .. } => TransportProtocol::ICMP,
            TransportLayer::UDP { .. } => TransportProtocol::UDP,
            TransportLayer::TCP { .. } => TransportProtocol::TCP,
            TransportLayer::Unknown => TransportProtocol::Unknown,
        }
    }

    pub fn addresses(&self) -> Option<(Ipv4Addr, Ipv4Addr)> {
        match self.network {
            NetworkLayer::IP { header, .. } => Some((header.source, header.destination)),
            _ => None,
        }
    }

    /// UDP/TCP の (送信元, 宛先) ポート。ホストバイトオーダー
    pub fn ports(&self) -> Option<(u16, u16)> {
        match self.transport {
            TransportLayer::UDP { header, .. } => Some((header.source_port, header.destination_port)),
            TransportLayer::TCP { header, .. } => Some((header.source_port, header.destination_port)),
            _ => None,
        }
    }

    /// TCP のアプリケーションデータ。data_offset*4 (最小20) から payload_size まで、キャプチャ長で打ち切る
    pub fn tcp_data(&self) -> Option<&'a [u8]> {
        match self.transport {
            TransportLayer::TCP { header, segment, payload_size } => {
                let start = header.header_len().max(TCP_MIN_HEADER_LEN).min(segment.len());
                let end = (payload_size as usize).min(segment.len()).max(start);
                Some(&segment[start..end])
            }
            _ => None,
        }
    }
}
