use dotenv::dotenv;
use log::info;
use std::io;
use std::path::Path;
use std::sync::mpsc;
use tokio::task;

mod classifier;
mod config;
mod control;
mod display;
mod error;
mod network;
mod packet_analysis;
mod select_device;
mod setup_logger;
mod tracker;

use crate::config::AppConfig;
use crate::control::{spawn_stdin_reader, Command};
use crate::error::InitProcessError;
use crate::network::{FrameSource, PnetCapture, ReplaySource};
use crate::packet_analysis::{packet_analysis, SnifferSession, StopReason};
use crate::select_device::select_device;
use crate::setup_logger::setup_logger;

#[tokio::main]
async fn main() -> Result<(), InitProcessError> {
    // .env は任意
    if let Err(e) = dotenv() {
        if !e.not_found() {
            return Err(InitProcessError::EnvFileReadError(e.to_string()));
        }
    }

    let mut config = AppConfig::from_env()?;
    // 第1引数のインターフェース名は環境変数より優先する
    if let Some(name) = std::env::args().nth(1) {
        config.capture.interface = Some(name);
    }

    setup_logger(&config.log).map_err(|e| InitProcessError::LoggerError(e.to_string()))?;
    info!("設定: {}", serde_json::to_string(&config).unwrap_or_default());

    let mut source: Box<dyn FrameSource + Send> = match config.capture.pcap_file.as_deref() {
        Some(path) => {
            let replay = ReplaySource::from_pcap(Path::new(path))?;
            println!("pcap ファイルを再生します: {} ({} フレーム)", path, replay.remaining());
            Box::new(replay)
        }
        None => {
            // デバイスの選択
            let interface = select_device(config.capture.interface.as_deref())
                .map_err(|e| InitProcessError::DeviceSelectionError(e.to_string()))?;
            println!("デバイスの選択に成功しました: {}", interface.name);

            let capture = PnetCapture::open(&interface, config.capture.read_timeout())?;
            info!("キャプチャを開始しました: {}", capture.interface());
            Box::new(capture)
        }
    };

    // 標準入力のコマンドと Ctrl-C を1本のチャネルでループに渡す
    let (tx, commands) = mpsc::channel();
    spawn_stdin_reader(tx.clone()).map_err(|e| InitProcessError::ControlInputError(e.to_string()))?;
    println!("コマンド: r = リセット, 番号 = コネクション選択, q = 終了");
    task::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("終了要求を受け付けました");
            let _ = tx.send(Command::Quit);
        }
    });

    // キャプチャループは1本のスレッドで回し、セッションはそのスレッドだけが触る
    let display = config.display.clone();
    let summary = task::spawn_blocking(move || {
        let mut session = SnifferSession::new(&display);
        let stdout = io::stdout();
        let mut out = stdout.lock();
        packet_analysis(source.as_mut(), &mut session, display.refresh_interval(), &commands, &mut out)
    })
    .await
    .map_err(|e| InitProcessError::PacketAnalysisError(e.to_string()))?
    .map_err(|e| InitProcessError::PacketAnalysisError(e.to_string()))?;

    let reason = match summary.reason {
        StopReason::Requested => "終了要求",
        StopReason::InputClosed => "入力の終わり",
    };
    println!(
        "終了しました ({}): フレーム {} 件を処理 (未追跡 {} 件, 待機 {} 回)",
        reason, summary.frames, summary.untracked, summary.idle_ticks
    );

    Ok(())
}
