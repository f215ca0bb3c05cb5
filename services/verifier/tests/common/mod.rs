//! Shared helpers: a scripted line-bridge broker and sample logs

#![allow(dead_code)]

use std::io::Write;
use tempfile::NamedTempFile;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;

/// Originals for keys A, B and C, written with literal `^A` delimiters
pub const ORIGINAL_LOG: &str = "\
2025-01-01 09:00:00.001 OUT 8=FIX.4.2^A9=61^A35=D^A52=20250101-09:00:00^A55=A^A38=100^A44=12.5^A10=011^A
2025-01-01 09:00:00.002 OUT 8=FIX.4.2^A9=60^A35=D^A52=20250101-09:00:00^A55=B^A38=5^A44=1.0^A10=022^A
2025-01-01 09:00:00.003 OUT 8=FIX.4.2^A9=62^A35=D^A52=20250101-09:00:00^A55=C^A38=7^A44=3.3^A10=033^A
";

/// Replays keyed `[A, D, B, A]`: match, missing, mismatch (44), missing
pub const REPLAYS: [&str; 4] = [
    "8=FIX.4.2|9=61|35=D|52=20250102-10:00:00|55=A|38=100|44=12.5|10=199|",
    "8=FIX.4.2|9=61|35=D|52=20250102-10:00:01|55=D|38=1|44=1|10=200|",
    "8=FIX.4.2|9=60|35=D|52=20250102-10:00:02|55=B|38=5|44=1.1|10=201|",
    "8=FIX.4.2|9=61|35=D|52=20250102-10:00:03|55=A|38=100|44=12.5|10=202|",
];

pub const EXPECTED_STATUSES: [&str; 4] = ["MATCH", "MISSING_IN_ORIGINAL", "MISMATCH", "MISSING_IN_ORIGINAL"];

pub fn temp_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write temp file");
    file
}

/// One accepted broker-side connection
pub struct BrokerSession {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl BrokerSession {
    pub async fn accept(listener: &TcpListener) -> Self {
        let (stream, _) = listener.accept().await.expect("accept");
        let (read, writer) = stream.into_split();
        Self {
            lines: BufReader::new(read).lines(),
            writer,
        }
    }

    pub async fn line(&mut self) -> Option<String> {
        self.lines.next_line().await.expect("broker read")
    }

    pub async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("broker write");
    }

    /// Accept CONNECT and SUBSCRIBE; returns the two client lines
    pub async fn handshake(&mut self) -> (String, String) {
        let connect = self.line().await.expect("CONNECT line");
        self.send("OK").await;
        let subscribe = self.line().await.expect("SUBSCRIBE line");
        self.send("OK").await;
        (connect, subscribe)
    }

    pub async fn deliver(&mut self, sequence: u64, payload: &str) {
        self.send(&format!("MSG {sequence} {payload}")).await;
    }
}
