//! コネクション一覧と、選択中のコネクションのパケットを文字列に整形する

use crate::classifier::{ApplicationProtocol, ChatDecoder};
use crate::network::packet::tcp::TCPFlags;
use crate::network::packet::{DecodedPacket, LinkLayer, NetworkLayer, TransportLayer};
use crate::tracker::{Connection, ConnectionTable};

pub fn connection_line(connection: &Connection) -> String {
    format!(
        "{:<45} {:>7} {:>7} {:>7} {:>8}",
        connection.to_string(),
        connection.application,
        connection.transport,
        connection.network,
        connection.packets
    )
}

pub fn render_table(table: &ConnectionTable, active: usize) -> String {
    let mut lines = vec![format!("= コネクション - {:02} =", table.count())];
    for (idx, connection) in table.iter().enumerate() {
        let marker = if idx == active { '>' } else { ' ' };
        lines.push(format!("{} {}", marker, connection_line(connection)));
    }
    if let Ok(connection) = table.get(active) {
        lines.push(format!("TX: {}", connection.packets));
    }
    lines.join("\n")
}

pub fn render_table_json(table: &ConnectionTable) -> Result<String, serde_json::Error> {
    let connections: Vec<&Connection> = table.iter().collect();
    serde_json::to_string(&connections)
}

/// 各層のフィールドを一覧にする (生データ表示)
pub fn dump_packet(packet: &DecodedPacket<'_>) -> String {
    let mut lines = Vec::new();

    match packet.link {
        LinkLayer::EthernetII { header, .. } => {
            lines.push("データリンク層: Ethernet II フレーム".to_string());
            lines.push(format!("送信元MACアドレス: {}", header.source));
            lines.push(format!("宛先MACアドレス: {}", header.destination));
            lines.push(format!("フレームタイプ: 0x{:X}", header.ethertype));
        }
        LinkLayer::Unknown => lines.push("データリンク層: 不明なフレーム".to_string()),
    }

    match packet.network {
        NetworkLayer::IP { header, .. } => {
            lines.push(format!("ネットワーク層: {} パケット", packet.network_protocol()));
            lines.push(format!("送信元アドレス: {}", header.source));
            lines.push(format!("宛先アドレス: {}", header.destination));
            lines.push(format!(
                "バージョン: {}  DSCP: {}  ECN: {}  チェックサム: 0x{:04X}",
                header.version, header.dscp, header.ecn, header.checksum
            ));
            lines.push(format!("ヘッダー長: {} ({}バイト)", header.ihl, header.header_len()));
            lines.push(format!("パケット長: {}", header.total_length));
            lines.push(format!(
                "ID: {}  DF: {}  MF: {}  フラグメントオフセット: {}",
                header.identification, header.dont_fragment, header.more_fragments, header.fragment_offset
            ));
            lines.push(format!("TTL: {}  プロトコル: {}", header.ttl, header.protocol));
        }
        NetworkLayer::ARP { .. } | NetworkLayer::IPX { .. } => {
            lines.push(format!("ネットワーク層: {} パケット", packet.network_protocol()))
        }
        NetworkLayer::Unknown => lines.push("ネットワーク層: 不明なパケット".to_string()),
    }

    match packet.transport {
        TransportLayer::ICMP { header, .. } => {
            lines.push("トランスポート層: ICMP パケット".to_string());
            lines.push(format!(
                "タイプ: {}  コード: {}  チェックサム: {}",
                header.icmp_type, header.icmp_code, header.checksum
            ));
        }
        TransportLayer::UDP { header, .. } => {
            lines.push("トランスポート層: UDP パケット".to_string());
            lines.push(format!(
                "送信元ポート: {}  宛先ポート: {}",
                header.source_port, header.destination_port
            ));
            lines.push(format!("長さ: {}  チェックサム: {}", header.length, header.checksum));
        }
        TransportLayer::TCP { header, .. } => {
            let data = packet.tcp_data().unwrap_or_default();
            lines.push("トランスポート層: TCP パケット".to_string());
            lines.push(format!(
                "送信元ポート: {}  宛先ポート: {}",
                header.source_port, header.destination_port
            ));
            lines.push(format!("シーケンス番号: {}", header.sequence_number));
            lines.push(format!("ACK番号: {}", header.acknowledgment_number));
            lines.push(format!("データオフセット: {}", header.data_offset));
            lines.push(format!(
                "フラグ: {}  ウィンドウ: {}",
                tcp_flags(&header.flags),
                header.window_size
            ));
            lines.push(format!(
                "チェックサム: 0x{:04X}  緊急ポインタ: {}",
                header.checksum, header.urgent_pointer
            ));
            lines.push(format!("データサイズ: {}", data.len()));
            lines.push(String::from_utf8_lossy(data).into_owned());
        }
        TransportLayer::Unknown => lines.push("トランスポート層: 不明なパケット".to_string()),
    }

    lines.join("\n")
}

fn tcp_flags(flags: &TCPFlags) -> String {
    let names = [
        (flags.urg, "URG"),
        (flags.ack, "ACK"),
        (flags.psh, "PSH"),
        (flags.rst, "RST"),
        (flags.syn, "SYN"),
        (flags.fin, "FIN"),
    ];
    let set: Vec<&str> = names.iter().filter(|(on, _)| *on).map(|(_, name)| *name).collect();
    if set.is_empty() {
        "-".to_string()
    } else {
        set.join(",")
    }
}

/// 整形表示。MSN のコネクションはチャットイベントに、その他の TCP はペイロードをそのまま文字列にする
pub fn filter_packet(
    packet: &DecodedPacket<'_>,
    connection: &Connection,
    chat: &mut ChatDecoder,
) -> Option<String> {
    let data = packet.tcp_data()?;
    if data.is_empty() {
        return None;
    }

    if connection.application == ApplicationProtocol::MSN {
        chat.extract(data).map(str::to_owned)
    } else {
        Some(String::from_utf8_lossy(data).into_owned())
    }
}
