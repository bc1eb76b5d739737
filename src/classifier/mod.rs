pub mod msn;
pub mod ports;

pub use msn::ChatDecoder;
pub use ports::classify;

use serde::{Deserialize, Serialize};
use std::fmt;

/// ウェルノウンポートから推定したアプリケーションプロトコル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationProtocol {
    FTP,
    SSH,
    HTTP,
    MSN,
    Unknown,
}

impl fmt::Display for ApplicationProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApplicationProtocol::FTP => "FTP",
            ApplicationProtocol::SSH => "SSH",
            ApplicationProtocol::HTTP => "HTTP",
            ApplicationProtocol::MSN => "MSN",
            ApplicationProtocol::Unknown => "UNKNOWN",
        };
        f.pad(name)
    }
}
