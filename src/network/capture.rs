use crate::error::CaptureError;
use log::{info, warn};
use pcap_parser::pcapng::Block;
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{create_reader, PcapBlockOwned, PcapError};
use pnet::datalink::{self, Channel, DataLinkReceiver, NetworkInterface};
use std::collections::VecDeque;
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;
use std::thread;
use std::time::Duration;

const PCAP_BUFFER_SIZE: usize = 65536;

/// キャプチャ元から1回の読み取りで得られるもの
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    Data(&'a [u8]),
    /// 今回はフレームなし (タイムアウト、読み取り失敗、長さ0)
    Idle,
    /// 入力の終わり
    Closed,
}

pub trait FrameSource {
    fn next_frame(&mut self) -> Frame<'_>;
}

/// pnet のデータリンクチャネルからフレームを読む
pub struct PnetCapture {
    interface: String,
    rx: Box<dyn DataLinkReceiver>,
    read_timeout: Duration,
    errors: ReadErrorStreak,
}

/// 連続した読み取りエラーを1回の警告にまとめる
#[derive(Debug, Default)]
struct ReadErrorStreak {
    failures: u64,
}

impl ReadErrorStreak {
    /// 連続エラーの最初の1回だけ true
    fn record_failure(&mut self) -> bool {
        self.failures += 1;
        self.failures == 1
    }

    /// 直前まで続いていたエラーの回数を返してリセットする
    fn record_success(&mut self) -> Option<u64> {
        match std::mem::take(&mut self.failures) {
            0 => None,
            n => Some(n),
        }
    }
}

impl PnetCapture {
    pub fn open(interface: &NetworkInterface, read_timeout: Duration) -> Result<Self, CaptureError> {
        let config = datalink::Config {
            read_timeout: Some(read_timeout),
            promiscuous: true,
            ..Default::default()
        };

        let rx = match datalink::channel(interface, config) {
            Ok(Channel::Ethernet(_, rx)) => rx,
            Ok(_) => return Err(CaptureError::UnsupportedChannel),
            Err(e) => return Err(CaptureError::Io(e)),
        };

        Ok(Self {
            interface: interface.name.clone(),
            rx,
            read_timeout,
            errors: ReadErrorStreak::default(),
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl FrameSource for PnetCapture {
    fn next_frame(&mut self) -> Frame<'_> {
        match self.rx.next() {
            Ok(frame) => {
                if let Some(failures) = self.errors.record_success() {
                    info!("読み取りが回復しました ({}): 連続エラー {} 回", self.interface, failures);
                }
                if frame.is_empty() {
                    Frame::Idle
                } else {
                    Frame::Data(frame)
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                Frame::Idle
            }
            Err(e) => {
                if self.errors.record_failure() {
                    warn!("パケットの読み取り中にエラーが発生しました ({}): {}", self.interface, e);
                }
                // エラーが即座に返り続ける場合でもタイムアウトと同じ間隔で回す
                thread::sleep(self.read_timeout);
                Frame::Idle
            }
        }
    }
}

/// メモリ上のフレーム列を順に返す。空のフレームは「フレームなし」の周回になる
#[derive(Debug, Default)]
pub struct ReplaySource {
    pending: VecDeque<Vec<u8>>,
    current: Vec<u8>,
}

impl ReplaySource {
    pub fn new<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        Self {
            pending: frames.into_iter().collect(),
            current: Vec::new(),
        }
    }

    /// pcap / pcapng ファイルのフレームを全て読み込む
    pub fn from_pcap(path: &Path) -> Result<Self, CaptureError> {
        let file = File::open(path)?;
        let mut reader = create_reader(PCAP_BUFFER_SIZE, file)
            .map_err(|e| CaptureError::PcapFormat(format!("ヘッダーを解析できません: {}", e)))?;

        let mut frames = Vec::new();
        loop {
            match reader.next() {
                Ok((offset, block)) => {
                    match block {
                        PcapBlockOwned::Legacy(packet) => frames.push(packet.data.to_vec()),
                        PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => frames.push(epb.data.to_vec()),
                        PcapBlockOwned::NG(Block::SimplePacket(spb)) => frames.push(spb.data.to_vec()),
                        _ => {}
                    }
                    reader.consume(offset);
                }
                Err(PcapError::Eof) => break,
                Err(PcapError::Incomplete(_)) => {
                    reader
                        .refill()
                        .map_err(|e| CaptureError::PcapFormat(format!("読み込みに失敗しました: {}", e)))?;
                }
                Err(e) => return Err(CaptureError::PcapFormat(format!("ブロックを解析できません: {}", e))),
            }
        }

        info!("{} から {} フレームを読み込みました", path.display(), frames.len());
        Ok(Self::new(frames))
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl FrameSource for ReplaySource {
    fn next_frame(&mut self) -> Frame<'_> {
        match self.pending.pop_front() {
            Some(frame) => {
                self.current = frame;
                if self.current.is_empty() {
                    Frame::Idle
                } else {
                    Frame::Data(&self.current)
                }
            }
            None => Frame::Closed,
        }
    }
}
