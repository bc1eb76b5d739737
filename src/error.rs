use thiserror::Error;

#[derive(Error, Debug)]
pub enum InitProcessError {
    #[error("ロガーのセットアップに失敗しました: {0}")]
    LoggerError(String),

    #[error("環境変数ファイルの読み込みに失敗しました: {0}")]
    EnvFileReadError(String),

    #[error("環境変数の解析に失敗しました: {0}")]
    EnvVarParseError(String),

    #[error("デバイス選択エラー: {0}")]
    DeviceSelectionError(String),

    #[error("キャプチャの開始に失敗しました: {0}")]
    CaptureOpenError(#[from] CaptureError),

    #[error("操作入力の受付を開始できません: {0}")]
    ControlInputError(String),

    #[error("パケット分析エラー: {0}")]
    PacketAnalysisError(String),
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("データリンクチャネルのエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("未対応のチャンネルタイプです")]
    UnsupportedChannel,

    #[error("pcap ファイルのエラー: {0}")]
    PcapFormat(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TrackerError {
    #[error("コネクション番号 {index} は範囲外です (登録数: {count})")]
    OutOfRange { index: usize, count: usize },
}
