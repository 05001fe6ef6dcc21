//! `riptidekv-client`: a thin companion binary that streams command-protocol
//! lines from its standard input to a running `riptidekv-server` and prints
//! back whatever the server answers, one response per line.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;

#[derive(Debug, Parser)]
#[command(name = "riptidekv-client", about = "Command-protocol client for riptidekv-server")]
struct Args {
    /// Host the server is listening on.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port the server is listening on.
    #[arg(long, default_value_t = 9090)]
    port: u16,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);
    let stream = TcpStream::connect(&addr).with_context(|| format!("connecting to {addr}"))?;
    let mut writer = stream.try_clone().context("cloning connection handle")?;
    let mut reader = BufReader::new(stream);

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for line in stdin.lock().lines() {
        let line = line.context("reading from stdin")?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        let mut response = String::new();
        let bytes_read = reader.read_line(&mut response).context("reading server response")?;
        if bytes_read == 0 {
            break; // server closed the connection
        }
        out.write_all(response.as_bytes())?;
        out.flush()?;

        let is_quit = matches!(line.trim(), "q" | "qs" | "quit");
        if is_quit {
            break;
        }
    }

    Ok(())
}
