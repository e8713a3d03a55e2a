//! TCP line transport for the IRC wire.
//!
//! IRC is a CRLF-delimited text protocol; this wraps a `TcpStream` into
//! line-oriented reads and writes so the engine never touches framing.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

pub struct Connection {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Connection {
    /// Open a TCP connection to the chat server.
    pub async fn open(server: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((server, port))
            .await
            .with_context(|| format!("connect to {}:{}", server, port))?;
        let (read_half, writer) = stream.into_split();
        Ok(Self {
            lines: BufReader::new(read_half).lines(),
            writer,
        })
    }

    /// Read the next line, CRLF stripped. `None` means the server closed
    /// the connection.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        self.lines.next_line().await.context("read from server")
    }

    /// Send one command line; the CRLF terminator is appended here.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        self.writer
            .write_all(line.as_bytes())
            .await
            .context("write to server")?;
        self.writer
            .write_all(b"\r\n")
            .await
            .context("write to server")?;
        Ok(())
    }
}
