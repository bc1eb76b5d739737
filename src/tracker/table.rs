use crate::error::TrackerError;
use crate::network::packet::DecodedPacket;
use crate::tracker::connection::{Connection, Endpoints};
use log::{debug, info, warn};

/// 同時に追跡できるコネクション数の上限。照合は線形走査で行う
pub const MAX_CONNECTIONS: usize = 128;

/// `ConnectionTable::process` の結果。インデックスは作成順 (リセットまで安定)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// 既存のコネクションのパケット数を加算した
    Updated(usize),
    /// 新しいコネクションを作成した
    Created(usize),
    /// IP 上の UDP/TCP ではないので追跡対象外
    Ignored,
    /// 空きスロットがなく追跡できなかった
    TableFull,
}

impl ProcessOutcome {
    pub fn index(&self) -> Option<usize> {
        match *self {
            ProcessOutcome::Updated(idx) | ProcessOutcome::Created(idx) => Some(idx),
            ProcessOutcome::Ignored | ProcessOutcome::TableFull => None,
        }
    }
}

#[derive(Debug)]
pub struct ConnectionTable {
    connections: Vec<Connection>,
    full_reported: bool,
}

impl Default for ConnectionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self {
            connections: Vec::with_capacity(MAX_CONNECTIONS),
            full_reported: false,
        }
    }

    /// 全てのコネクションを破棄する
    pub fn reset(&mut self) {
        info!("コネクションテーブルをリセットしました ({}件破棄)", self.connections.len());
        self.connections.clear();
        self.full_reported = false;
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    pub fn get(&self, index: usize) -> Result<&Connection, TrackerError> {
        self.connections.get(index).ok_or(TrackerError::OutOfRange {
            index,
            count: self.connections.len(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    pub fn process(&mut self, packet: &DecodedPacket<'_>) -> ProcessOutcome {
        let endpoints = match Endpoints::of(packet) {
            Some(endpoints) => endpoints,
            None => return ProcessOutcome::Ignored,
        };

        if let Some(idx) = self.connections.iter().position(|c| c.owns(&endpoints)) {
            self.connections[idx].record_packet();
            return ProcessOutcome::Updated(idx);
        }

        if self.connections.len() >= MAX_CONNECTIONS {
            if !self.full_reported {
                warn!(
                    "コネクションテーブルが満杯です ({}件)。新しいフローは追跡されません",
                    MAX_CONNECTIONS
                );
                self.full_reported = true;
            }
            return ProcessOutcome::TableFull;
        }

        let connection = Connection::open(&endpoints, packet);
        debug!(
            "新しいコネクション: {} {} {}",
            connection, connection.transport, connection.application
        );
        self.connections.push(connection);
        ProcessOutcome::Created(self.connections.len() - 1)
    }
}
