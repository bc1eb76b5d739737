use crate::error::InitProcessError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub capture: CaptureConfig,
    pub display: DisplayConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// 未指定なら起動時に対話的に選ぶ
    pub interface: Option<String>,
    /// 指定するとインターフェースの代わりに pcap ファイルを再生する
    pub pcap_file: Option<String>,
    pub read_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub view: ViewMode,
    pub active: usize,
    pub refresh_ms: u64,
    pub output: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    pub file: String,
    pub level: String,
}

/// 画面の表示モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// コネクション一覧
    Connections,
    /// 選択中のコネクションのペイロードを整形して表示
    Filter,
    /// 選択中のコネクションの各層のフィールドを表示
    Dump,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "connections" | "c" => Ok(ViewMode::Connections),
            "filter" | "f" => Ok(ViewMode::Filter),
            "dump" | "d" => Ok(ViewMode::Dump),
            other => Err(format!("無効な表示モード: {}", other)),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("無効な出力形式: {}", other)),
        }
    }
}

impl CaptureConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl DisplayConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }
}

impl AppConfig {
    /// 環境変数から読み込む。`.env` の読み込みは呼び出し側で済ませておく
    pub fn from_env() -> Result<Self, InitProcessError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, InitProcessError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            capture: CaptureConfig {
                interface: lookup("SNIFFER_INTERFACE").filter(|name| !name.trim().is_empty()),
                pcap_file: lookup("SNIFFER_PCAP_FILE").filter(|path| !path.trim().is_empty()),
                read_timeout_ms: parse_or(&lookup, "SNIFFER_READ_TIMEOUT_MS", 50)?,
            },
            display: DisplayConfig {
                view: parse_or(&lookup, "SNIFFER_VIEW", ViewMode::Connections)?,
                active: parse_or(&lookup, "SNIFFER_ACTIVE", 0)?,
                refresh_ms: parse_or(&lookup, "SNIFFER_REFRESH_MS", 1000)?,
                output: parse_or(&lookup, "SNIFFER_OUTPUT", OutputFormat::Text)?,
            },
            log: LogConfig {
                file: lookup("SNIFFER_LOG_FILE").unwrap_or_else(|| "sniffer.log".to_string()),
                level: lookup("SNIFFER_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            },
        })
    }

    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self {
            capture: CaptureConfig {
                interface: Some("lo".to_string()),
                pcap_file: None,
                read_timeout_ms: 1,
            },
            display: DisplayConfig {
                view: ViewMode::Connections,
                active: 0,
                refresh_ms: 0,
                output: OutputFormat::Text,
            },
            log: LogConfig {
                file: "test.log".to_string(),
                level: "debug".to_string(),
            },
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, InitProcessError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| InitProcessError::EnvVarParseError(format!("{}: {}", key, e))),
        None => Ok(default),
    }
}
