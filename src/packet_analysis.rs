use crate::classifier::ChatDecoder;
use crate::config::{DisplayConfig, OutputFormat, ViewMode};
use crate::control::Command;
use crate::display;
use crate::network::packet::decode;
use crate::network::{Frame, FrameSource};
use crate::tracker::{ConnectionTable, ProcessOutcome};
use log::{debug, info, warn};
use std::io::{self, Write};
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

/// キャプチャループが所有する状態。コネクションテーブルとチャット抽出用バッファを1か所にまとめる
#[derive(Debug)]
pub struct SnifferSession {
    table: ConnectionTable,
    chat: ChatDecoder,
    view: ViewMode,
    output: OutputFormat,
    active: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 終了要求 (q / Ctrl-C)
    Requested,
    /// キャプチャ元の入力が尽きた
    InputClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisSummary {
    pub frames: u64,
    pub idle_ticks: u64,
    pub untracked: u64,
    pub reason: StopReason,
}

impl SnifferSession {
    pub fn new(config: &DisplayConfig) -> Self {
        Self {
            table: ConnectionTable::new(),
            chat: ChatDecoder::new(),
            view: config.view,
            output: config.output,
            active: config.active,
        }
    }

    pub fn table(&self) -> &ConnectionTable {
        &self.table
    }

    pub fn view(&self) -> ViewMode {
        self.view
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn select(&mut self, index: usize) {
        if index >= self.table.count() {
            warn!("コネクション {} はまだありません (登録数: {})", index, self.table.count());
        }
        self.active = index;
    }

    /// テーブルを空にし、選択を先頭に戻す
    pub fn reset(&mut self) {
        self.table.reset();
        self.active = 0;
    }

    /// 1フレームをデコードして追跡する。
    /// 選択中のコネクションのパケットで、表示モードが整形/生データなら表示用の文字列を返す
    pub fn handle_frame(&mut self, frame: &[u8]) -> (ProcessOutcome, Option<String>) {
        let packet = decode(frame);
        let outcome = self.table.process(&packet);

        let index = match outcome.index() {
            Some(index) if index == self.active => index,
            _ => return (outcome, None),
        };

        let text = match self.view {
            ViewMode::Connections => None,
            ViewMode::Filter => {
                debug_assert!(index < self.table.count(), "process が範囲外の番号を返しました");
                match self.table.get(index) {
                    Ok(connection) => display::filter_packet(&packet, connection, &mut self.chat),
                    Err(e) => {
                        warn!("{}", e);
                        None
                    }
                }
            }
            ViewMode::Dump => Some(display::dump_packet(&packet)),
        };

        (outcome, text)
    }

    pub fn render(&self) -> String {
        match self.output {
            OutputFormat::Text => display::render_table(&self.table, self.active),
            OutputFormat::Json => match display::render_table_json(&self.table) {
                Ok(json) => json,
                Err(e) => {
                    warn!("コネクション一覧のJSON変換に失敗しました: {}", e);
                    display::render_table(&self.table, self.active)
                }
            },
        }
    }
}

/// キャプチャ元をポーリングし、1周につき最大1フレームを処理する。
/// 周回の先頭で操作コマンドを全て適用する。終了要求か入力の終わりでループを抜ける
pub fn packet_analysis<S, W>(
    source: &mut S,
    session: &mut SnifferSession,
    refresh: Duration,
    commands: &Receiver<Command>,
    out: &mut W,
) -> io::Result<AnalysisSummary>
where
    S: FrameSource + ?Sized,
    W: Write,
{
    let mut frames = 0u64;
    let mut idle_ticks = 0u64;
    let mut untracked = 0u64;
    let mut last_draw: Option<Instant> = None;

    let reason = 'poll: loop {
        // 送信側が全て閉じていても、キャプチャは続ける
        while let Ok(command) = commands.try_recv() {
            match command {
                Command::Quit => break 'poll StopReason::Requested,
                Command::Reset => session.reset(),
                Command::Select(index) => session.select(index),
            }
            debug!("表示対象のコネクション: {}", session.active());
            last_draw = None;
        }

        match source.next_frame() {
            Frame::Data(frame) => {
                frames += 1;
                let (outcome, text) = session.handle_frame(frame);
                if outcome == ProcessOutcome::TableFull {
                    untracked += 1;
                }
                if let Some(text) = text {
                    writeln!(out, "{}", text)?;
                }
            }
            Frame::Idle => idle_ticks += 1,
            Frame::Closed => break StopReason::InputClosed,
        }

        if session.view() == ViewMode::Connections
            && last_draw.map_or(true, |at| at.elapsed() >= refresh)
        {
            writeln!(out, "{}", session.render())?;
            last_draw = Some(Instant::now());
        }
    };

    if session.view() == ViewMode::Connections {
        writeln!(out, "{}", session.render())?;
    }
    out.flush()?;

    debug!("アイドル周回: {}", idle_ticks);
    info!(
        "パケット解析を終了しました: {:?} (フレーム {}, 未追跡 {}, コネクション {})",
        reason,
        frames,
        untracked,
        session.table().count()
    );

    Ok(AnalysisSummary {
        frames,
        idle_ticks,
        untracked,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::msn::{DEPARTURE_PHRASE, LOGIN_REQUEST_PHRASE};
    use crate::config::AppConfig;
    use crate::network::packet::builder::FrameBuilder;
    use crate::network::ReplaySource;
    use crate::tracker::table::MAX_CONNECTIONS;
    use std::sync::mpsc::{self, Sender};

    fn session(view: ViewMode) -> SnifferSession {
        let mut config = AppConfig::for_testing().display;
        config.view = view;
        SnifferSession::new(&config)
    }

    fn run<S: FrameSource>(source: &mut S, session: &mut SnifferSession) -> (AnalysisSummary, String) {
        let (_tx, rx) = mpsc::channel();
        let mut out = Vec::new();
        let summary = packet_analysis(source, session, Duration::from_secs(3600), &rx, &mut out).unwrap();
        (summary, String::from_utf8(out).unwrap())
    }

    /// 指定した回数だけ読んだところでコマンドを送る
    struct CommandAfter {
        inner: ReplaySource,
        reads: usize,
        after: usize,
        command: Command,
        tx: Sender<Command>,
    }

    impl FrameSource for CommandAfter {
        fn next_frame(&mut self) -> Frame<'_> {
            if self.reads == self.after {
                self.tx.send(self.command).unwrap();
            }
            self.reads += 1;
            self.inner.next_frame()
        }
    }

    #[test]
    fn replay_runs_until_input_closes() {
        let mut source = ReplaySource::new(vec![
            FrameBuilder::tcp([10, 0, 0, 1], 1000, [10, 0, 0, 2], 80).build(),
            Vec::new(),
            FrameBuilder::tcp([10, 0, 0, 2], 80, [10, 0, 0, 1], 1000).build(),
            FrameBuilder::icmp([10, 0, 0, 1], [10, 0, 0, 2], 8, 0).build(),
        ]);
        let mut session = session(ViewMode::Connections);

        let (summary, output) = run(&mut source, &mut session);
        assert_eq!(summary.reason, StopReason::InputClosed);
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.idle_ticks, 1);
        assert_eq!(summary.untracked, 0);
        assert_eq!(session.table().count(), 1);
        assert_eq!(session.table().get(0).unwrap().packets, 2);
        assert!(output.lines().last().unwrap().starts_with("TX: 2"));
    }

    #[test]
    fn quit_command_ends_loop_before_reading() {
        let mut source = ReplaySource::new(vec![FrameBuilder::tcp([10, 0, 0, 1], 1, [10, 0, 0, 2], 2).build()]);
        let mut session = session(ViewMode::Dump);
        let (tx, rx) = mpsc::channel();
        tx.send(Command::Quit).unwrap();
        let mut out = Vec::new();

        let summary = packet_analysis(&mut source, &mut session, Duration::ZERO, &rx, &mut out).unwrap();
        assert_eq!(summary.reason, StopReason::Requested);
        assert_eq!(summary.frames, 0);
        assert_eq!(source.remaining(), 1);
        assert!(out.is_empty());
    }

    #[test]
    fn filter_view_prints_chat_events_of_active_connection_only() {
        let mut source = ReplaySource::new(vec![
            FrameBuilder::tcp([192, 168, 1, 10], 50000, [64, 4, 9, 1], 1863)
                .payload(b"USR 1 MD5 I alice\r\n")
                .build(),
            FrameBuilder::tcp([192, 168, 1, 10], 50100, [10, 9, 9, 9], 21)
                .payload(b"USER ftp\r\n")
                .build(),
            FrameBuilder::tcp([64, 4, 9, 1], 1863, [192, 168, 1, 10], 50000)
                .payload(b"BYE alice\r\n")
                .build(),
        ]);
        let mut session = session(ViewMode::Filter);

        let (_, output) = run(&mut source, &mut session);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            lines,
            vec![
                format!("alice{}", LOGIN_REQUEST_PHRASE),
                format!("alice{}", DEPARTURE_PHRASE),
            ]
        );
    }

    #[test]
    fn dump_view_follows_selected_connection() {
        let first = FrameBuilder::udp([10, 0, 0, 1], 5000, [10, 0, 0, 2], 6000).build();
        let second = FrameBuilder::tcp([10, 0, 0, 3], 7000, [10, 0, 0, 4], 8000).build();
        let mut session = session(ViewMode::Dump);
        session.select(1);

        let (outcome, text) = session.handle_frame(&first);
        assert_eq!(outcome, ProcessOutcome::Created(0));
        assert!(text.is_none());

        let (outcome, text) = session.handle_frame(&second);
        assert_eq!(outcome, ProcessOutcome::Created(1));
        assert!(text.unwrap().contains("送信元ポート: 7000  宛先ポート: 8000"));
    }

    #[test]
    fn reset_clears_table_and_selection() {
        let mut session = session(ViewMode::Connections);
        session.handle_frame(&FrameBuilder::tcp([10, 0, 0, 1], 1, [10, 0, 0, 2], 2).build());
        session.handle_frame(&FrameBuilder::tcp([10, 0, 0, 3], 3, [10, 0, 0, 4], 4).build());
        session.select(1);

        session.reset();
        assert_eq!(session.active(), 0);
        assert_eq!(session.table().count(), 0);

        let (outcome, _) = session.handle_frame(&FrameBuilder::tcp([10, 0, 0, 3], 3, [10, 0, 0, 4], 4).build());
        assert_eq!(outcome, ProcessOutcome::Created(0));
    }

    #[test]
    fn reset_command_clears_table_while_running() {
        let flow_a = FrameBuilder::tcp([10, 0, 0, 1], 1000, [10, 0, 0, 2], 80).build();
        let flow_b = FrameBuilder::udp([10, 0, 0, 1], 2000, [10, 0, 0, 3], 53).build();
        let flow_c = FrameBuilder::tcp([10, 0, 0, 4], 3000, [10, 0, 0, 5], 22).build();
        let (tx, rx) = mpsc::channel();
        // 3フレーム目を読むときにリセットが届き、次の周回で適用される
        let mut source = CommandAfter {
            inner: ReplaySource::new(vec![flow_a.clone(), flow_b, flow_a, flow_c]),
            reads: 0,
            after: 2,
            command: Command::Reset,
            tx,
        };
        let mut session = session(ViewMode::Connections);
        let mut out = Vec::new();

        let summary = packet_analysis(&mut source, &mut session, Duration::from_secs(3600), &rx, &mut out).unwrap();
        assert_eq!(summary.frames, 4);
        assert_eq!(summary.reason, StopReason::InputClosed);
        assert_eq!(session.table().count(), 1);
        let connection = session.table().get(0).unwrap();
        assert_eq!(connection.source_port, 3000);
        assert_eq!(connection.packets, 1);

        let output = String::from_utf8(out).unwrap();
        assert!(output.lines().last().unwrap().starts_with("TX: 1"));
    }

    #[test]
    fn select_command_switches_filtered_connection() {
        let ftp = FrameBuilder::tcp([10, 0, 0, 1], 40000, [10, 0, 0, 2], 21);
        let http = FrameBuilder::tcp([10, 0, 0, 1], 40001, [10, 0, 0, 3], 80);
        let (tx, rx) = mpsc::channel();
        let mut source = CommandAfter {
            inner: ReplaySource::new(vec![
                ftp.clone().payload(b"USER a").build(),
                http.clone().payload(b"GET /a").build(),
                ftp.payload(b"USER b").build(),
                http.payload(b"GET /b").build(),
            ]),
            reads: 0,
            after: 1,
            command: Command::Select(1),
            tx,
        };
        let mut session = session(ViewMode::Filter);

        let mut out = Vec::new();
        packet_analysis(&mut source, &mut session, Duration::from_secs(3600), &rx, &mut out).unwrap();
        // 選択は2フレーム目の次の周回から有効になる
        let output = String::from_utf8(out).unwrap();
        assert_eq!(output.lines().collect::<Vec<_>>(), vec!["USER a", "GET /b"]);
        assert_eq!(session.active(), 1);
    }

    #[test]
    fn active_index_beyond_table_prints_nothing() {
        let mut session = session(ViewMode::Filter);
        session.select(5);
        let frame = FrameBuilder::tcp([10, 0, 0, 1], 40000, [10, 0, 0, 2], 21)
            .payload(b"USER a")
            .build();
        let (outcome, text) = session.handle_frame(&frame);
        assert_eq!(outcome, ProcessOutcome::Created(0));
        assert_eq!(text, None);
    }

    #[test]
    fn untracked_flows_are_counted() {
        let mut frames: Vec<Vec<u8>> = (0..MAX_CONNECTIONS + 2)
            .map(|i| FrameBuilder::tcp([10, 0, 0, 1], 20000 + i as u16, [10, 0, 0, 2], 9000).build())
            .collect();
        frames.push(FrameBuilder::tcp([10, 0, 0, 2], 9000, [10, 0, 0, 1], 20000).build());
        let mut source = ReplaySource::new(frames);
        let mut session = session(ViewMode::Filter);

        let (summary, _) = run(&mut source, &mut session);
        assert_eq!(summary.untracked, 2);
        assert_eq!(session.table().count(), MAX_CONNECTIONS);
        assert_eq!(session.table().get(0).unwrap().packets, 2);
    }

    #[test]
    fn json_output_renders_snapshot() {
        let mut config = AppConfig::for_testing().display;
        config.output = OutputFormat::Json;
        let mut session = SnifferSession::new(&config);
        session.handle_frame(&FrameBuilder::tcp([10, 0, 0, 1], 1, [10, 0, 0, 2], 22).build());

        let json: serde_json::Value = serde_json::from_str(&session.render()).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["application"], "SSH");
    }
}
