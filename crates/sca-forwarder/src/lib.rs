// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! sca-forwarder
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::io;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Largest message the forwarder will hand to the datagram socket.
pub const MAX_DATAGRAM_LEN: usize = 6956;

// ---------------------------------------------------------------------------
// DumpSink
// ---------------------------------------------------------------------------

/// Classification of one send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// The message was handed to the socket.
    Success,
    /// The message exceeds the datagram size limit and was not sent.
    SizeTooLong,
    /// The socket failed (not connected, peer gone, transport error).
    SocketError,
}

/// A connectionful, write-only channel to the dump-request sink.
pub trait DumpSink {
    /// Whether a connection is currently held.
    fn is_connected(&self) -> bool;

    /// Establish a connection.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the sink is unreachable.
    fn connect(&mut self) -> io::Result<()>;

    /// Send one message, classifying the outcome.
    fn send(&mut self, msg: &str) -> SendStatus;

    /// Drop the connection so the next [`DumpSink::connect`] starts fresh.
    fn disconnect(&mut self);
}

// ---------------------------------------------------------------------------
// UnixDumpForwarder
// ---------------------------------------------------------------------------

/// [`DumpSink`] over a connected Unix datagram socket.
#[derive(Debug)]
pub struct UnixDumpForwarder {
    path: PathBuf,
    socket: Option<UnixDatagram>,
    max_len: usize,
}

impl UnixDumpForwarder {
    /// Create a forwarder for the sink socket at `path` without connecting.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            socket: None,
            max_len: MAX_DATAGRAM_LEN,
        }
    }

    /// Override the datagram size limit (tests shrink it).
    #[must_use]
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }
}

impl DumpSink for UnixDumpForwarder {
    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    fn connect(&mut self) -> io::Result<()> {
        let socket = UnixDatagram::unbound()?;
        socket.connect(&self.path)?;
        self.socket = Some(socket);
        Ok(())
    }

    fn send(&mut self, msg: &str) -> SendStatus {
        if msg.len() > self.max_len {
            return SendStatus::SizeTooLong;
        }
        match &self.socket {
            Some(socket) => match socket.send(msg.as_bytes()) {
                Ok(_) => SendStatus::Success,
                Err(_) => SendStatus::SocketError,
            },
            None => SendStatus::SocketError,
        }
    }

    fn disconnect(&mut self) {
        self.socket = None;
    }
}

// ---------------------------------------------------------------------------
// Push policy
// ---------------------------------------------------------------------------

/// Ask `agent_id` to re-send its check results for `policy_id`.
///
/// Connects on demand and never reports failure to the caller: a dump request
/// is an optimization, not a requirement, so every failure mode is logged and
/// swallowed. A [`SendStatus::SocketError`] additionally drops the connection
/// so the next call reconnects.
pub fn push_dump_request(sink: &mut dyn DumpSink, agent_id: &str, policy_id: &str, first_scan: bool) {
    if !sink.is_connected() {
        if let Err(err) = sink.connect() {
            warn!(target: "sca.forwarder", %err, agent_id, "dump sink unreachable, dropping request");
            return;
        }
    }
    let flag = if first_scan { '1' } else { '0' };
    let msg = format!("{agent_id}:sca-dump:{policy_id}:{flag}");
    match sink.send(&msg) {
        SendStatus::Success => {
            debug!(target: "sca.forwarder", agent_id, policy_id, first_scan, "dump request sent");
        }
        SendStatus::SizeTooLong => {
            warn!(target: "sca.forwarder", agent_id, policy_id, "dump request exceeds datagram limit");
        }
        SendStatus::SocketError => {
            warn!(target: "sca.forwarder", agent_id, policy_id, "dump sink send failed, reconnecting on next request");
            sink.disconnect();
        }
    }
}
