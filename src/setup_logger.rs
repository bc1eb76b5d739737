use crate::config::LogConfig;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::OpenOptions;
use std::io::Write;
use std::str::FromStr;

/// 表示は標準出力を使うので、ログはファイルにだけ書き出す
pub fn setup_logger(config: &LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    // ログファイルを追記モードで開く
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.file)?;

    let level = LevelFilter::from_str(&config.level)?;

    // ビルダーでロガーをカスタマイズ
    let mut builder = Builder::new();
    builder
        .filter_level(level)
        // タイムスタンプ付きのフォーマット
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(file)));

    // RUST_LOG があればモジュール単位のフィルタを上書きする
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    builder.try_init()?;

    Ok(())
}
