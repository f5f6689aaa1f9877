// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! sca-store
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

use tracing::warn;

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// Outcome class of one store round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyCode {
    /// The store acknowledged the request.
    Ok,
    /// The store reported an error, replied unintelligibly, or the transport
    /// failed.
    Error,
}

/// One parsed store reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreReply {
    /// Outcome class.
    pub code: ReplyCode,
    /// Payload after the status word, when any.
    pub payload: Option<String>,
}

impl StoreReply {
    /// An `ok` reply with an optional payload.
    #[must_use]
    pub fn ok(payload: Option<String>) -> Self {
        Self {
            code: ReplyCode::Ok,
            payload,
        }
    }

    /// An error reply with an optional detail payload.
    #[must_use]
    pub fn error(payload: Option<String>) -> Self {
        Self {
            code: ReplyCode::Error,
            payload,
        }
    }
}

/// Classify one raw reply line.
///
/// `ok` → [`ReplyCode::Ok`] with everything after the space as payload;
/// anything else (`err …` included) → [`ReplyCode::Error`].
#[must_use]
pub fn parse_reply(line: &str) -> StoreReply {
    if line == "ok" {
        return StoreReply::ok(None);
    }
    if let Some(payload) = line.strip_prefix("ok ") {
        return StoreReply::ok(Some(payload.to_string()));
    }
    StoreReply::error(Some(line.to_string()))
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Build a store request line: `agent {agent_id} sca {verb} {args}`.
///
/// `args` are `|`-separated positionals prepared by the caller; an empty
/// `args` produces a bare-verb request.
#[must_use]
pub fn request(agent_id: &str, verb: &str, args: &str) -> String {
    if args.is_empty() {
        format!("agent {agent_id} sca {verb}")
    } else {
        format!("agent {agent_id} sca {verb} {args}")
    }
}

// ---------------------------------------------------------------------------
// StoreQuery
// ---------------------------------------------------------------------------

/// A request/response channel to the policy-monitoring store.
///
/// Implementations own their transport; reconnection is internal and
/// transport failures surface as [`ReplyCode::Error`] replies.
pub trait StoreQuery {
    /// Execute one request and return the parsed reply.
    fn query(&mut self, request: &str) -> StoreReply;
}

// ---------------------------------------------------------------------------
// Search parsing
// ---------------------------------------------------------------------------

/// Result of a store lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchResult {
    /// The entry exists; carries the payload tail (empty when the caller did
    /// not ask for it).
    Found(String),
    /// The entry does not exist.
    NotFound,
    /// The store failed or replied unintelligibly.
    Error,
}

/// Execute a lookup and interpret the `found …` / `not found` payload.
///
/// With `parse_tail` the text after the `found ` prefix is returned; without
/// it, [`SearchResult::Found`] carries an empty string. A payload that begins
/// with `found` but is cut off before the space separator is unintelligible
/// and reported as [`SearchResult::Error`].
pub fn search_and_parse(
    store: &mut dyn StoreQuery,
    request: &str,
    parse_tail: bool,
) -> SearchResult {
    let reply = store.query(request);
    if reply.code != ReplyCode::Ok {
        return SearchResult::Error;
    }
    let payload = reply.payload.unwrap_or_default();
    if let Some(tail) = payload.strip_prefix("found ") {
        let tail = if parse_tail { tail.to_string() } else { String::new() };
        return SearchResult::Found(tail);
    }
    if payload.starts_with("not found") {
        return SearchResult::NotFound;
    }
    if payload.starts_with("found") {
        warn!(target: "sca.store", %request, "truncated 'found' payload from store");
        return SearchResult::Error;
    }
    SearchResult::Error
}

/// Execute a write request, reporting only whether the store acknowledged it.
pub fn apply(store: &mut dyn StoreQuery, request: &str) -> bool {
    store.query(request).code == ReplyCode::Ok
}

// ---------------------------------------------------------------------------
// UnixStoreClient
// ---------------------------------------------------------------------------

/// Newline-framed store client over a Unix stream socket.
///
/// The connection is opened lazily on the first query. A failed round-trip
/// drops the connection and retries once on a fresh one, so a store restart
/// costs at most one extra attempt and is invisible to callers.
#[derive(Debug)]
pub struct UnixStoreClient {
    path: PathBuf,
    conn: Option<BufReader<UnixStream>>,
}

impl UnixStoreClient {
    /// Create a client for the store socket at `path` without connecting.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            conn: None,
        }
    }

    /// Socket path this client talks to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn round_trip(&mut self, request: &str) -> io::Result<String> {
        if self.conn.is_none() {
            let stream = UnixStream::connect(&self.path)?;
            self.conn = Some(BufReader::new(stream));
        }
        let Some(reader) = self.conn.as_mut() else {
            return Err(io::Error::other("store connection missing"));
        };
        let stream = reader.get_mut();
        stream.write_all(request.as_bytes())?;
        stream.write_all(b"\n")?;
        stream.flush()?;

        let mut line = String::new();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "store closed the connection",
            ));
        }
        Ok(line.trim_end_matches('\n').to_string())
    }
}

impl StoreQuery for UnixStoreClient {
    fn query(&mut self, request: &str) -> StoreReply {
        match self.round_trip(request) {
            Ok(line) => parse_reply(&line),
            Err(first) => {
                // one retry on a fresh connection
                self.conn = None;
                match self.round_trip(request) {
                    Ok(line) => parse_reply(&line),
                    Err(second) => {
                        self.conn = None;
                        warn!(
                            target: "sca.store",
                            %first,
                            %second,
                            socket = %self.path.display(),
                            "store unreachable"
                        );
                        StoreReply::error(None)
                    }
                }
            }
        }
    }
}
