use crate::classifier::ApplicationProtocol;
use crate::network::packet::{DecodedPacket, TransportLayer};

pub const PORT_FTP: u16 = 21;
pub const PORT_SSH: u16 = 22;
pub const PORT_HTTP: u16 = 80;
pub const PORT_MSN: u16 = 1863;

// 判定順を保つため表の順に全て評価し、最後に一致したものを採用する
const WELL_KNOWN_PORTS: [(u16, ApplicationProtocol); 4] = [
    (PORT_FTP, ApplicationProtocol::FTP),
    (PORT_SSH, ApplicationProtocol::SSH),
    (PORT_HTTP, ApplicationProtocol::HTTP),
    (PORT_MSN, ApplicationProtocol::MSN),
];

/// TCP の送信元/宛先ポートからアプリケーションプロトコルを決める。TCP 以外は常に Unknown
pub fn classify(packet: &DecodedPacket<'_>) -> ApplicationProtocol {
    let (source_port, destination_port) = match packet.transport {
        TransportLayer::TCP { header, .. } => (header.source_port, header.destination_port),
        _ => return ApplicationProtocol::Unknown,
    };

    let mut protocol = ApplicationProtocol::Unknown;
    for (port, candidate) in WELL_KNOWN_PORTS {
        if source_port == port || destination_port == port {
            protocol = candidate;
        }
    }
    protocol
}
