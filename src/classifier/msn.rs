//! MSN Messenger (MSNP) のテキストコマンドから人が読めるイベントを取り出す。
//!
//! 扱うコマンドは `USR` (ログイン), `BYE` (退出), `MSG` (入力中通知/チャット本文) のみ。
//! 全ての走査はペイロード長と最初の NUL で打ち切る。

use std::borrow::Cow;

/// 結果を組み立てるスクラッチバッファの最大バイト数
pub const SCRATCH_CAPACITY: usize = 1500;

const COMMAND_LEN: usize = 3;
const ARGUMENT_OFFSET: usize = 4;

pub const LOGIN_REQUEST_PHRASE: &str = " がログインしています";
pub const CHALLENGE_PHRASE: &str = " がチャレンジ/パスワードを送信しました";
pub const ALIAS_LOGIN_PHRASE: &str = " が次の別名でログインしました: ";
pub const DEPARTURE_PHRASE: &str = " が会話から退出しました。";
pub const TYPING_PHRASE: &str = " が入力中です";
pub const MESSAGE_PHRASE: &str = " の発言: ";

const TYPING_CONTENT_TYPE: &[u8] = b"text/x-msmsgscontrol";
const PLAIN_CONTENT_TYPE: &[u8] = b"text/plain";
const TYPING_USER_FIELD: &[u8] = b"TypingUser:";

// MIME ヘッダーを何行読み飛ばすと該当部分に届くか
const TYPING_HEADER_LINES: usize = 3;
const PLAIN_HEADER_LINES: usize = 5;

/// チャットイベント抽出器。結果は内部のスクラッチバッファに書かれ、次の呼び出しで上書きされる
#[derive(Debug)]
pub struct ChatDecoder {
    scratch: String,
}

impl Default for ChatDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatDecoder {
    pub fn new() -> Self {
        Self {
            scratch: String::with_capacity(SCRATCH_CAPACITY),
        }
    }

    /// TCP ペイロードからイベント文字列を取り出す。該当しなければ None
    pub fn extract(&mut self, payload: &[u8]) -> Option<&str> {
        self.scratch.clear();

        let text = until_nul(payload);
        if text.len() < COMMAND_LEN {
            return None;
        }

        let written = match &text[..COMMAND_LEN] {
            b"USR" => self.user(text),
            b"BYE" => self.bye(text),
            b"MSG" => self.message(text),
            _ => false,
        };

        if !written {
            return None;
        }

        truncate_to_boundary(&mut self.scratch, SCRATCH_CAPACITY);
        Some(&self.scratch)
    }

    fn user(&mut self, text: &[u8]) -> bool {
        let tokens: Vec<&[u8]> = text
            .split(|b| b.is_ascii_whitespace())
            .filter(|t| !t.is_empty())
            .collect();

        match tokens.as_slice() {
            [b"USR", trid, b"MD5", b"I", user, ..] if is_transaction_id(trid) => {
                self.push_bytes(user);
                self.scratch.push_str(LOGIN_REQUEST_PHRASE);
                true
            }
            [b"USR", trid, b"MD5", b"S", user, ..] if is_transaction_id(trid) => {
                self.push_bytes(user);
                self.scratch.push_str(CHALLENGE_PHRASE);
                true
            }
            [b"USR", trid, b"OK", user, alias, ..] if is_transaction_id(trid) => {
                self.push_bytes(user);
                self.scratch.push_str(ALIAS_LOGIN_PHRASE);
                self.push_bytes(alias);
                true
            }
            _ => false,
        }
    }

    fn bye(&mut self, text: &[u8]) -> bool {
        let user = token_from(text, ARGUMENT_OFFSET, |b| b == b'\r' || b == b'\n');
        self.push_bytes(user);
        self.scratch.push_str(DEPARTURE_PHRASE);
        true
    }

    fn message(&mut self, text: &[u8]) -> bool {
        let mut written = false;

        if contains(text, TYPING_CONTENT_TYPE) {
            if let Some(user) = typing_user(text) {
                self.push_bytes(user);
                self.scratch.push_str(TYPING_PHRASE);
                written = true;
            }
        }

        if contains(text, PLAIN_CONTENT_TYPE) {
            let user = token_from(text, ARGUMENT_OFFSET, |b| b == b'\r' || b == b'\n' || b == b' ');
            let user_end = ARGUMENT_OFFSET + user.len();
            if let Some(body_start) = skip_lines(text, user_end, PLAIN_HEADER_LINES) {
                if written {
                    self.scratch.push('\n');
                }
                self.push_bytes(user);
                self.scratch.push_str(MESSAGE_PHRASE);
                let body = trim_line_end(&text[body_start..]);
                self.push_bytes(body);
                written = true;
            }
        }

        written
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        let text: Cow<'_, str> = String::from_utf8_lossy(bytes);
        self.scratch.push_str(&text);
    }
}

fn typing_user(text: &[u8]) -> Option<&[u8]> {
    let start = skip_lines(text, 0, TYPING_HEADER_LINES)?;
    let rest = text[start..].strip_prefix(TYPING_USER_FIELD)?;
    let skipped = rest.iter().take_while(|b| b.is_ascii_whitespace()).count();
    let user = token_from(rest, skipped, |b| b.is_ascii_whitespace());
    if user.is_empty() {
        None
    } else {
        Some(user)
    }
}

fn is_transaction_id(token: &[u8]) -> bool {
    std::str::from_utf8(token)
        .map(|t| t.parse::<i32>().is_ok())
        .unwrap_or(false)
}

fn until_nul(data: &[u8]) -> &[u8] {
    match data.iter().position(|&b| b == 0) {
        Some(end) => &data[..end],
        None => data,
    }
}

/// `from` から `stop` を満たすバイトの手前まで。`from` が範囲外なら空
fn token_from(data: &[u8], from: usize, stop: impl Fn(u8) -> bool) -> &[u8] {
    let rest = data.get(from..).unwrap_or(&[]);
    let len = rest.iter().position(|&b| stop(b)).unwrap_or(rest.len());
    &rest[..len]
}

/// `from` 以降で `lines` 個目の改行の直後の位置。改行が足りなければ None
fn skip_lines(data: &[u8], from: usize, lines: usize) -> Option<usize> {
    let mut remaining = lines;
    for (idx, &b) in data.iter().enumerate().skip(from) {
        if b == b'\n' {
            remaining -= 1;
            if remaining == 0 {
                return Some(idx + 1);
            }
        }
    }
    None
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn trim_line_end(data: &[u8]) -> &[u8] {
    let len = data
        .iter()
        .rposition(|&b| b != b'\r' && b != b'\n')
        .map_or(0, |idx| idx + 1);
    &data[..len]
}

fn truncate_to_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}
