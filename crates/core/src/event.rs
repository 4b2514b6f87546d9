// core/event.rs
// One decoded OpenBSM audit record
//
// Fields are populated token by token by the BSM reader. Singleton sections
// go through the `set_*` methods, which refuse a second occurrence; bounded
// sections refuse overflow. Either refusal means the record must be dropped.

use crate::bounded::Bounded;
use crate::error::EventError;
use crate::string_vec::CompactStrings;
use serde::Serialize;
use std::net::IpAddr;

/// Argument slots (zero-based index supplied by the arg token).
pub const MAX_ARGS: usize = 8;
/// Text tokens per record (symlink targets).
pub const MAX_TEXTS: usize = 2;
/// Path tokens per record. macOS emits an unresolved and a resolved path
/// per path argument and some syscalls take two paths.
pub const MAX_PATHS: usize = 4;
/// Attribute tokens per record.
pub const MAX_ATTRS: usize = 2;
/// Distinct uninterpreted token ids remembered per record.
pub const MAX_UNKNOWN_TOKENS: usize = 256;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Kernel-reported completion time of the audited event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Timestamp {
    pub secs: i64,
    pub nanos: u32,
}

impl Timestamp {
    /// Build a timestamp, carrying whole seconds out of `nanos`.
    pub fn new(secs: i64, nanos: u64) -> Self {
        Self {
            secs: secs.saturating_add((nanos / NANOS_PER_SEC) as i64),
            nanos: (nanos % NANOS_PER_SEC) as u32,
        }
    }
}

/// Actor or target process identity from a subject/process token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub auid: u32,
    pub euid: u32,
    pub egid: u32,
    pub ruid: u32,
    pub rgid: u32,
    pub pid: i32,
    pub sid: u32,
    /// Controlling terminal device; `None` when the process has no tty.
    pub tty_dev: Option<u64>,
    /// Controlling terminal network address; `None` when absent.
    pub tty_addr: Option<IpAddr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReturnPair {
    pub error: u8,
    pub value: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExitPair {
    pub status: u32,
    pub ret: u32,
}

/// File attribute snapshot from an attr32/attr64 token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileAttr {
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub dev: u32,
    pub ino: u64,
}

/// Endpoint from a Darwin sockinet32/sockinet128 token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SocketEndpoint {
    pub addr: IpAddr,
    pub port: u16,
}

/// Structured form of one audit record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    pub event_type: u16,
    pub event_modifier: u16,
    pub timestamp: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<Identity>,
    pub args: [Option<u64>; MAX_ARGS],
    /// Highest populated argument index + 1.
    pub args_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_value: Option<ReturnPair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<ExitPair>,
    pub texts: Bounded<String, MAX_TEXTS>,
    pub paths: Bounded<String, MAX_PATHS>,
    pub attrs: Bounded<FileAttr, MAX_ATTRS>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec_argv: Option<CompactStrings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec_env: Option<CompactStrings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_endpoint: Option<SocketEndpoint>,
    pub unknown_token_ids: Bounded<u8, MAX_UNKNOWN_TOKENS>,
    /// Sticky: an allocation failed while this record was decoded.
    #[serde(skip)]
    pub out_of_memory: bool,
    /// Raw bytes of the record the event was decoded from.
    #[serde(skip)]
    pub record: Vec<u8>,
}

impl AuditEvent {
    /// Fresh event with every section absent and every count zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Release every owned allocation (record buffer, exec vectors) and
    /// return to the freshly created state. Must run before the event is
    /// reused for the next record.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn set_subject(&mut self, identity: Identity) -> Result<(), EventError> {
        set_once(&mut self.subject, identity, "subject")
    }

    pub fn set_process(&mut self, identity: Identity) -> Result<(), EventError> {
        set_once(&mut self.process, identity, "process")
    }

    pub fn set_return(&mut self, ret: ReturnPair) -> Result<(), EventError> {
        set_once(&mut self.return_value, ret, "return")
    }

    pub fn set_exit(&mut self, exit: ExitPair) -> Result<(), EventError> {
        set_once(&mut self.exit_status, exit, "exit")
    }

    pub fn set_socket_endpoint(&mut self, endpoint: SocketEndpoint) {
        self.socket_endpoint = Some(endpoint);
    }

    /// Store argument `index`. Each slot may be written once.
    pub fn set_arg(&mut self, index: u8, value: u64) -> Result<(), EventError> {
        let slot = self
            .args
            .get_mut(usize::from(index))
            .ok_or(EventError::ArgIndexOutOfRange {
                index,
                max: MAX_ARGS,
            })?;
        if slot.is_some() {
            return Err(EventError::ArgAlreadyPresent(index));
        }
        *slot = Some(value);
        self.args_count = self.args_count.max(usize::from(index) + 1);
        Ok(())
    }

    pub fn push_text(&mut self, text: String) -> Result<(), EventError> {
        self.texts
            .try_push(text)
            .map_err(|source| EventError::TooMany {
                section: "text",
                source,
            })
    }

    pub fn push_path(&mut self, path: String) -> Result<(), EventError> {
        self.paths
            .try_push(path)
            .map_err(|source| EventError::TooMany {
                section: "path",
                source,
            })
    }

    pub fn push_attr(&mut self, attr: FileAttr) -> Result<(), EventError> {
        self.attrs
            .try_push(attr)
            .map_err(|source| EventError::TooMany {
                section: "attr",
                source,
            })
    }

    /// Remember an uninterpreted token id. Ids beyond the capacity are
    /// silently not recorded.
    pub fn note_unknown_token(&mut self, id: u8) {
        let _ = self.unknown_token_ids.try_insert_unique(id);
    }

    /// Iterate the populated argument slots as `(index, value)`.
    pub fn present_args(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.args[..self.args_count]
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|v| (i, v)))
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T, section: &'static str) -> Result<(), EventError> {
    if slot.is_some() {
        return Err(EventError::Duplicate(section));
    }
    *slot = Some(value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_event_is_empty() {
        let ev = AuditEvent::new();
        assert!(ev.subject.is_none());
        assert!(ev.process.is_none());
        assert_eq!(ev.args_count, 0);
        assert!(ev.paths.is_empty());
        assert!(ev.unknown_token_ids.is_empty());
        assert!(!ev.out_of_memory);
    }

    #[test]
    fn test_duplicate_subject_rejected() {
        let mut ev = AuditEvent::new();
        ev.set_subject(Identity::default()).unwrap();
        assert_eq!(
            ev.set_subject(Identity::default()),
            Err(EventError::Duplicate("subject"))
        );
    }

    #[test]
    fn test_args_are_sparse_and_count_tracks_max_index() {
        let mut ev = AuditEvent::new();
        ev.set_arg(2, 0x10).unwrap();
        ev.set_arg(0, 7).unwrap();
        assert_eq!(ev.args_count, 3);
        assert_eq!(ev.present_args().collect::<Vec<_>>(), vec![(0, 7), (2, 0x10)]);
        assert_eq!(ev.set_arg(2, 1), Err(EventError::ArgAlreadyPresent(2)));
        assert!(matches!(
            ev.set_arg(8, 1),
            Err(EventError::ArgIndexOutOfRange { index: 8, .. })
        ));
    }

    #[test]
    fn test_path_overflow_rejected() {
        let mut ev = AuditEvent::new();
        for i in 0..MAX_PATHS {
            ev.push_path(format!("/p{}", i)).unwrap();
        }
        assert!(matches!(
            ev.push_path("/overflow".to_string()),
            Err(EventError::TooMany { section: "path", .. })
        ));
    }

    #[test]
    fn test_reset_releases_everything() {
        let mut ev = AuditEvent::new();
        ev.record = vec![0u8; 64];
        ev.exec_argv = Some(CompactStrings::from_entries(&["/bin/sh"]).unwrap());
        ev.set_return(ReturnPair { error: 0, value: 3 }).unwrap();
        ev.note_unknown_token(0x21);
        ev.out_of_memory = true;

        ev.reset();
        assert_eq!(ev, AuditEvent::new());
        assert_eq!(ev.record.capacity(), 0);
    }

    #[test]
    fn test_timestamp_carries_seconds() {
        let ts = Timestamp::new(10, 2_500_000_000);
        assert_eq!(ts, Timestamp { secs: 12, nanos: 500_000_000 });
    }
}
