// macos/sensors/bsm/bsm_reader.rs
// OpenBSM audit record reader
// Reads one whole record from the trail and decodes its tokens into an AuditEvent

use crate::sensors::bsm::bsm_socket::bsm_pf;
use crate::sensors::bsm::bsm_tokens::{fetch_token, token_type, FetchError, IdentityFields, TermAddr, Token};
use edr_core::{
    AuditEvent, CompactStrings, EventError, ExitPair, FileAttr, Identity, ReturnPair,
    SocketEndpoint, StringVecError, Timestamp,
};
use serde::Deserialize;
use std::borrow::Cow;
use std::io::{self, Read};
use std::net::IpAddr;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Upper bound on a single record. Darwin records stay far below this;
/// anything larger means the stream is out of sync.
pub const DEFAULT_MAX_RECORD_SIZE: u32 = 4 * 1024 * 1024;

/// id byte + u32 size
const RECORD_PREFIX_LEN: usize = 5;

const DYLD_PREFIX: &str = "DYLD_";

/// Decoder settings. Deserializable so it can live in the agent config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Device id the kernel reports for "no controlling terminal".
    pub null_device: Option<u64>,
    /// XNU writes the sockinet128 port in host byte order.
    pub sockinet128_port_host_order: bool,
    pub max_record_size: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            null_device: None,
            sockinet128_port_host_order: true,
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
        }
    }
}

impl DecoderConfig {
    /// Default config with the null device taken from `/dev/null`.
    pub fn probe() -> Self {
        Self {
            null_device: null_device_id(),
            ..Self::default()
        }
    }
}

#[cfg(unix)]
fn null_device_id() -> Option<u64> {
    use std::os::unix::fs::MetadataExt;

    match std::fs::metadata("/dev/null") {
        Ok(meta) => Some(meta.rdev()),
        Err(e) => {
            warn!(error = %e, "cannot stat /dev/null, tty devices will not be normalized");
            None
        }
    }
}

#[cfg(not(unix))]
fn null_device_id() -> Option<u64> {
    None
}

/// Which parts of an exec environment to keep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EnvCapture {
    #[default]
    None,
    /// Only `DYLD_*` variables
    #[value(name = "dyld")]
    #[serde(rename = "dyld")]
    DyldOnly,
    Full,
}

/// Event-type allow-list. Empty admits every type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    types: Vec<u16>,
}

impl EventFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only(types: impl IntoIterator<Item = u16>) -> Self {
        Self {
            types: types.into_iter().collect(),
        }
    }

    pub fn allows(&self, event_type: u16) -> bool {
        self.types.is_empty() || self.types.contains(&event_type)
    }
}

/// Result of one successful `read_event` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The event holds the record's fields.
    Decoded,
    /// The record was consumed but dropped; the event is empty.
    Skipped,
}

/// Conditions that stop decoding of the stream or of the current record
/// outright. Anything returned here is a failed read.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("audit trail read failed: {0}")]
    Io(#[from] io::Error),
    #[error("end of audit trail")]
    EndOfStream,
    #[error("record starts with unexpected token {0:#04x}")]
    BadRecordType(u8),
    #[error("record size {0} is smaller than its header")]
    BadRecordSize(u32),
    #[error("record size {0} exceeds limit")]
    RecordTooLarge(u32),
    #[error("out of memory while decoding record")]
    OutOfMemory,
}

/// Why a well-framed record was dropped.
#[derive(Debug, Error)]
enum SkipReason {
    #[error("event type {0} not selected")]
    Filtered(u16),
    #[error(transparent)]
    Token(#[from] FetchError),
    #[error(transparent)]
    Event(#[from] EventError),
}

/// Sequential reader over an audit trail (`/dev/auditpipe` or a trail file).
///
/// Each call consumes exactly one record from the source.
pub struct BsmReader<R> {
    source: R,
    config: DecoderConfig,
}

impl<R: Read> BsmReader<R> {
    pub fn new(source: R, config: DecoderConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Read and decode the next record into `event`.
    ///
    /// `event` is reset first. On `Skipped` it is left empty. On
    /// `Err(OutOfMemory)` the record has still been consumed whole and the
    /// next call reads the following record; `event` holds whatever was
    /// decoded around the failed allocation and should be reset.
    pub fn read_event(
        &mut self,
        event: &mut AuditEvent,
        filter: &EventFilter,
        capture: EnvCapture,
    ) -> Result<Outcome, DecodeError> {
        event.reset();

        let mut record = Vec::new();
        self.read_record(&mut record)?;

        if let Err(reason) = decode_tokens(&record, event, filter, capture, &self.config) {
            match &reason {
                SkipReason::Filtered(_) => trace!(%reason, "record skipped"),
                SkipReason::Token(_) | SkipReason::Event(_) => warn!(
                    event_type = event.event_type,
                    len = record.len(),
                    %reason,
                    "skipping record"
                ),
            }
            event.reset();
            return Ok(Outcome::Skipped);
        }

        event.record = record;
        if event.out_of_memory {
            return Err(DecodeError::OutOfMemory);
        }
        Ok(Outcome::Decoded)
    }

    /// Read one whole record into `buf`.
    fn read_record(&mut self, buf: &mut Vec<u8>) -> Result<(), DecodeError> {
        let mut id = [0u8; 1];
        if let Err(e) = self.source.read_exact(&mut id) {
            return Err(match e.kind() {
                io::ErrorKind::UnexpectedEof => DecodeError::EndOfStream,
                _ => DecodeError::Io(e),
            });
        }

        match id[0] {
            token_type::HEADER32
            | token_type::HEADER32_EX
            | token_type::HEADER64
            | token_type::HEADER64_EX => {
                let mut size_bytes = [0u8; 4];
                self.source.read_exact(&mut size_bytes)?;
                let size = u32::from_be_bytes(size_bytes);
                if (size as usize) < RECORD_PREFIX_LEN {
                    return Err(DecodeError::BadRecordSize(size));
                }
                if size > self.config.max_record_size {
                    return Err(DecodeError::RecordTooLarge(size));
                }
                let size = size as usize;
                if buf.try_reserve_exact(size).is_err() {
                    self.discard(size - RECORD_PREFIX_LEN)?;
                    return Err(DecodeError::OutOfMemory);
                }
                buf.push(id[0]);
                buf.extend_from_slice(&size_bytes);
                buf.resize(size, 0);
                self.source.read_exact(&mut buf[RECORD_PREFIX_LEN..])?;
            }
            token_type::OTHER_FILE32 => {
                // sec, msec, name length, then the name
                let mut fixed = [0u8; 10];
                self.source.read_exact(&mut fixed)?;
                let name_len = usize::from(u16::from_be_bytes([fixed[8], fixed[9]]));
                let size = 1 + fixed.len() + name_len;
                if buf.try_reserve_exact(size).is_err() {
                    self.discard(name_len)?;
                    return Err(DecodeError::OutOfMemory);
                }
                buf.push(id[0]);
                buf.extend_from_slice(&fixed);
                buf.resize(size, 0);
                self.source.read_exact(&mut buf[1 + fixed.len()..])?;
            }
            other => return Err(DecodeError::BadRecordType(other)),
        }
        Ok(())
    }

    /// Consume the unbuffered rest of a record so the next read starts at
    /// a record boundary.
    fn discard(&mut self, len: usize) -> Result<(), DecodeError> {
        let len = len as u64;
        let dropped = io::copy(&mut (&mut self.source).take(len), &mut io::sink())?;
        if dropped < len {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        Ok(())
    }
}

fn decode_tokens(
    record: &[u8],
    event: &mut AuditEvent,
    filter: &EventFilter,
    capture: EnvCapture,
    config: &DecoderConfig,
) -> Result<(), SkipReason> {
    let mut seen_exec_args = false;
    let mut seen_exec_env = false;
    let mut pos = 0;

    while pos < record.len() {
        let (token, len) = fetch_token(&record[pos..])?;
        trace!(offset = pos, len, ?token, "token");

        match token {
            Token::Header(h) => {
                event.event_type = h.event_type;
                if !filter.allows(h.event_type) {
                    return Err(SkipReason::Filtered(h.event_type));
                }
                event.event_modifier = h.modifier;
                let nanos = if h.wide {
                    h.subsec
                } else {
                    h.subsec.saturating_mul(1_000_000)
                };
                let secs = i64::try_from(h.secs).unwrap_or(i64::MAX);
                event.timestamp = Timestamp::new(secs, nanos);
            }
            Token::Trailer | Token::SockUnix => {}
            Token::Subject(fields) => event.set_subject(identity(fields, config))?,
            Token::Process(fields) => event.set_process(identity(fields, config))?,
            Token::Arg { index, value } => event.set_arg(index, value)?,
            Token::Return { error, value } => event.set_return(ReturnPair { error, value })?,
            Token::Exit { status, ret } => event.set_exit(ExitPair { status, ret })?,
            Token::Text(text) => event.push_text(String::from_utf8_lossy(text).into_owned())?,
            Token::Path(path) => event.push_path(String::from_utf8_lossy(path).into_owned())?,
            Token::Attr(a) => event.push_attr(FileAttr {
                mode: a.mode,
                uid: a.uid,
                gid: a.gid,
                dev: a.fsid,
                ino: a.nid,
            })?,
            Token::ExecArgs(list) => {
                if seen_exec_args {
                    return Err(EventError::Duplicate("exec args").into());
                }
                seen_exec_args = true;
                let entries: Vec<Cow<'_, str>> = list.iter().map(String::from_utf8_lossy).collect();
                match CompactStrings::from_entries(&entries) {
                    Ok(argv) => event.exec_argv = Some(argv),
                    Err(e) => note_oom(event, e),
                }
            }
            Token::ExecEnv(list) => {
                if seen_exec_env {
                    return Err(EventError::Duplicate("exec env").into());
                }
                seen_exec_env = true;
                if capture == EnvCapture::None {
                    pos += len;
                    continue;
                }
                let entries: Vec<Cow<'_, str>> = list.iter().map(String::from_utf8_lossy).collect();
                let env = match capture {
                    EnvCapture::DyldOnly => {
                        CompactStrings::from_entries_with_prefix(&entries, DYLD_PREFIX)
                    }
                    _ => CompactStrings::from_entries(&entries).map(Some),
                };
                match env {
                    Ok(env) => event.exec_env = env,
                    Err(e) => note_oom(event, e),
                }
            }
            Token::SockInet32 { family, port, addr } => {
                if u32::from(family) != bsm_pf::INET {
                    debug!(family, "sockinet32 with unexpected family dropped");
                } else {
                    event.set_socket_endpoint(SocketEndpoint {
                        addr: IpAddr::V4(addr),
                        port: u16::from_be_bytes(port),
                    });
                }
            }
            Token::SockInet128 { family, port, addr } => {
                if u32::from(family) != bsm_pf::INET6 {
                    debug!(family, "sockinet128 with unexpected family dropped");
                } else {
                    let port = if config.sockinet128_port_host_order {
                        u16::from_le_bytes(port)
                    } else {
                        u16::from_be_bytes(port)
                    };
                    event.set_socket_endpoint(SocketEndpoint {
                        addr: IpAddr::V6(addr),
                        port,
                    });
                }
            }
            Token::Other(id) => event.note_unknown_token(id),
        }

        pos += len;
    }
    Ok(())
}

fn note_oom(event: &mut AuditEvent, error: StringVecError) {
    warn!(%error, "exec vector allocation failed");
    event.out_of_memory = true;
}

/// Apply the kernel's "no terminal" conventions: the null device becomes no
/// device and an all-zero IPv4 address becomes no address.
fn identity(f: IdentityFields, config: &DecoderConfig) -> Identity {
    let tty_dev = match config.null_device {
        Some(null) if null == f.tty_port => None,
        _ => Some(f.tty_port),
    };
    let tty_addr = match f.tty_addr {
        TermAddr::Bare(v4) | TermAddr::Ex(IpAddr::V4(v4)) if v4.is_unspecified() => None,
        TermAddr::Bare(v4) => Some(IpAddr::V4(v4)),
        TermAddr::Ex(addr) => Some(addr),
    };
    Identity {
        auid: f.auid,
        euid: f.euid,
        egid: f.egid,
        ruid: f.ruid,
        rgid: f.rgid,
        pid: f.pid as i32,
        sid: f.sid,
        tty_dev,
        tty_addr,
    }
}
