//! 実行中のキャプチャループへの操作。標準入力の1行が1コマンド

use log::{info, warn};
use std::io::{self, BufRead};
use std::str::FromStr;
use std::sync::mpsc::Sender;
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// コネクションテーブルを空にする (r)
    Reset,
    /// 表示対象のコネクションを切り替える (番号)
    Select(usize),
    /// 終了 (q / Ctrl-C)
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "r" | "reset" => Ok(Command::Reset),
            "q" | "quit" => Ok(Command::Quit),
            other => other
                .parse::<usize>()
                .map(Command::Select)
                .map_err(|_| format!("不明なコマンド: {} (r: リセット, 番号: 選択, q: 終了)", other)),
        }
    }
}

/// 標準入力を読む専用スレッドを起動する。入力が閉じるか受信側がなくなると終了する
pub fn spawn_stdin_reader(tx: Sender<Command>) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("sniffer-stdin".into())
        .spawn(move || read_commands(io::stdin().lock(), &tx))
}

fn read_commands<R: BufRead>(input: R, tx: &Sender<Command>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("標準入力の読み取りに失敗しました: {}", e);
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<Command>() {
            Ok(command) => {
                info!("コマンドを受け付けました: {:?}", command);
                if tx.send(command).is_err() {
                    return;
                }
            }
            Err(e) => eprintln!("{}", e),
        }
    }
}
