use crate::classifier::{self, ApplicationProtocol};
use crate::network::packet::{DecodedPacket, NetworkProtocol, TransportProtocol};
use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;

/// パケットの (アドレス, ポート) の組。ポートはホストバイトオーダー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoints {
    pub source_addr: Ipv4Addr,
    pub source_port: u16,
    pub destination_addr: Ipv4Addr,
    pub destination_port: u16,
    pub transport: TransportProtocol,
}

impl Endpoints {
    /// IP 上の UDP/TCP パケットのみ
    pub fn of(packet: &DecodedPacket<'_>) -> Option<Self> {
        let (source_addr, destination_addr) = packet.addresses()?;
        let (source_port, destination_port) = packet.ports()?;

        Some(Self {
            source_addr,
            source_port,
            destination_addr,
            destination_port,
            transport: packet.transport_protocol(),
        })
    }

    pub fn involves_port(&self, port: u16) -> bool {
        self.source_port == port || self.destination_port == port
    }
}

/// 追跡中のコネクション。アドレスとポートは最初に観測したパケットの向きのまま保存する
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Connection {
    pub source_addr: Ipv4Addr,
    pub destination_addr: Ipv4Addr,
    pub source_port: u16,
    pub destination_port: u16,
    pub network: NetworkProtocol,
    pub transport: TransportProtocol,
    /// 作成時に一度だけ決まり、以後変わらない
    pub application: ApplicationProtocol,
    pub packets: u32,
}

impl Connection {
    pub(crate) fn open(endpoints: &Endpoints, packet: &DecodedPacket<'_>) -> Self {
        Self {
            source_addr: endpoints.source_addr,
            destination_addr: endpoints.destination_addr,
            source_port: endpoints.source_port,
            destination_port: endpoints.destination_port,
            network: NetworkProtocol::IP,
            transport: endpoints.transport,
            application: classifier::classify(packet),
            packets: 1,
        }
    }

    /// MSN と判定済みのコネクションは、ポート 1863 を使うパケットを全て引き受ける。
    /// それ以外は同じ向きか、アドレスとポートの両方を入れ替えた向きで一致したときのみ
    pub(crate) fn owns(&self, endpoints: &Endpoints) -> bool {
        if self.application == ApplicationProtocol::MSN
            && endpoints.involves_port(classifier::ports::PORT_MSN)
        {
            return true;
        }

        let same_direction = self.source_addr == endpoints.source_addr
            && self.destination_addr == endpoints.destination_addr
            && self.source_port == endpoints.source_port
            && self.destination_port == endpoints.destination_port;

        let reverse_direction = self.source_addr == endpoints.destination_addr
            && self.destination_addr == endpoints.source_addr
            && self.source_port == endpoints.destination_port
            && self.destination_port == endpoints.source_port;

        same_direction || reverse_direction
    }

    pub(crate) fn record_packet(&mut self) {
        self.packets = self.packets.saturating_add(1);
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} <-> {}:{}",
            self.source_addr, self.source_port, self.destination_addr, self.destination_port
        )
    }
}
