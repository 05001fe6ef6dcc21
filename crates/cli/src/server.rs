//! A minimal line-oriented TCP front end for the command protocol.
//!
//! One worker thread per connection, blocking I/O throughout -- the same
//! style the engine's own stdin REPL used before this crate grew a real
//! client/server split, just moved onto a socket.

use crate::protocol::{dispatch, AppState};
use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use tracing::{error, info, warn};

/// Binds `addr` and serves the command protocol until the process is
/// killed. Never returns on success; every connection failure is logged
/// and the listener keeps accepting.
pub fn serve(addr: &str, state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(addr).with_context(|| format!("binding {addr}"))?;
    info!(%addr, "riptidekv server listening");

    for incoming in listener.incoming() {
        match incoming {
            Ok(stream) => {
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    if let Err(e) = handle_connection(stream, &state) {
                        warn!(error = %e, "connection ended with an error");
                    }
                });
            }
            Err(e) => error!(error = %e, "failed to accept connection"),
        }
    }
    Ok(())
}

fn handle_connection(stream: TcpStream, state: &AppState) -> Result<()> {
    let peer = stream.peer_addr().ok();
    info!(?peer, "connection opened");

    let mut writer = stream.try_clone().context("cloning connection handle")?;
    let reader = BufReader::new(stream);

    for line in reader.lines() {
        let line = line.context("reading command line")?;
        match dispatch(state, &line) {
            Ok(Some(response)) => {
                writer.write_all(response.as_bytes())?;
                writer.write_all(b"\n")?;
                writer.flush()?;
            }
            Ok(None) => {
                writer.write_all(b"<OK>\n")?;
                writer.flush()?;
                break;
            }
            Err(e) => {
                writer.write_all(format!("ERROR: {e}\n").as_bytes())?;
                writer.flush()?;
            }
        }
    }

    info!(?peer, "connection closed");
    Ok(())
}
