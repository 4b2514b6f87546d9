// macos/sensors/bsm/test_support.rs
// Hand-assembled BSM records for tests

use crate::sensors::bsm::bsm_tokens::{token_type, AU_IPV4, AU_IPV6};
use std::net::IpAddr;

/// Identity fields written into subject/process tokens.
#[derive(Debug, Clone, Copy)]
pub struct Who {
    pub auid: u32,
    pub euid: u32,
    pub egid: u32,
    pub ruid: u32,
    pub rgid: u32,
    pub pid: u32,
    pub sid: u32,
}

impl Who {
    pub fn pid(pid: u32) -> Self {
        Self {
            auid: 501,
            euid: 501,
            egid: 20,
            ruid: 501,
            rgid: 20,
            pid,
            sid: 100_001,
        }
    }

    fn write(&self, buf: &mut Vec<u8>) {
        for v in [self.auid, self.euid, self.egid, self.ruid, self.rgid, self.pid, self.sid] {
            buf.extend_from_slice(&v.to_be_bytes());
        }
    }
}

/// Builds one record: header, the tokens added in order, trailer.
pub struct RecordBuilder {
    event_type: u16,
    modifier: u16,
    secs: u64,
    subsec: u64,
    wide: bool,
    body: Vec<u8>,
}

impl RecordBuilder {
    /// header32 record at 2023-11-14T22:13:20Z.
    pub fn new(event_type: u16) -> Self {
        Self {
            event_type,
            modifier: 0,
            secs: 1_700_000_000,
            subsec: 0,
            wide: false,
            body: Vec::new(),
        }
    }

    /// Switch to a header64; `subsec` is then taken as nanoseconds.
    pub fn header64(mut self) -> Self {
        self.wide = true;
        self
    }

    pub fn modifier(mut self, modifier: u16) -> Self {
        self.modifier = modifier;
        self
    }

    pub fn time(mut self, secs: u64, subsec: u64) -> Self {
        self.secs = secs;
        self.subsec = subsec;
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(bytes);
        self
    }

    pub fn subject32(self, who: Who, tty: u32, addr: [u8; 4]) -> Self {
        self.identity32(token_type::SUBJECT32, who, tty, addr)
    }

    pub fn process32(self, who: Who, tty: u32, addr: [u8; 4]) -> Self {
        self.identity32(token_type::PROCESS32, who, tty, addr)
    }

    fn identity32(mut self, id: u8, who: Who, tty: u32, addr: [u8; 4]) -> Self {
        self.body.push(id);
        who.write(&mut self.body);
        self.body.extend_from_slice(&tty.to_be_bytes());
        self.body.extend_from_slice(&addr);
        self
    }

    pub fn subject64_ex(mut self, who: Who, tty: u64, addr: IpAddr) -> Self {
        self.body.push(token_type::SUBJECT64_EX);
        who.write(&mut self.body);
        self.body.extend_from_slice(&tty.to_be_bytes());
        match addr {
            IpAddr::V4(v4) => {
                self.body.extend_from_slice(&AU_IPV4.to_be_bytes());
                self.body.extend_from_slice(&v4.octets());
            }
            IpAddr::V6(v6) => {
                self.body.extend_from_slice(&AU_IPV6.to_be_bytes());
                self.body.extend_from_slice(&v6.octets());
            }
        }
        self
    }

    pub fn arg32(mut self, index: u8, value: u32, name: &str) -> Self {
        self.body.push(token_type::ARG32);
        self.body.push(index);
        self.body.extend_from_slice(&value.to_be_bytes());
        self.counted_str(name);
        self
    }

    pub fn arg64(mut self, index: u8, value: u64, name: &str) -> Self {
        self.body.push(token_type::ARG64);
        self.body.push(index);
        self.body.extend_from_slice(&value.to_be_bytes());
        self.counted_str(name);
        self
    }

    pub fn return32(mut self, error: u8, value: u32) -> Self {
        self.body.push(token_type::RETURN32);
        self.body.push(error);
        self.body.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn exit(mut self, status: u32, ret: u32) -> Self {
        self.body.push(token_type::EXIT);
        self.body.extend_from_slice(&status.to_be_bytes());
        self.body.extend_from_slice(&ret.to_be_bytes());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.body.push(token_type::TEXT);
        self.counted_str(text);
        self
    }

    pub fn path(mut self, path: &str) -> Self {
        self.body.push(token_type::PATH);
        self.counted_str(path);
        self
    }

    pub fn attr32(mut self, mode: u32, uid: u32, gid: u32) -> Self {
        self.body.push(token_type::ATTR32);
        for v in [mode, uid, gid, 0x1000004] {
            self.body.extend_from_slice(&v.to_be_bytes());
        }
        self.body.extend_from_slice(&12345u64.to_be_bytes());
        self.body.extend_from_slice(&0u32.to_be_bytes());
        self
    }

    pub fn exec_args(self, args: &[&str]) -> Self {
        self.string_list(token_type::EXEC_ARGS, args)
    }

    pub fn exec_env(self, env: &[&str]) -> Self {
        self.string_list(token_type::EXEC_ENV, env)
    }

    fn string_list(mut self, id: u8, entries: &[&str]) -> Self {
        self.body.push(id);
        self.body.extend_from_slice(&(entries.len() as u32).to_be_bytes());
        for entry in entries {
            self.body.extend_from_slice(entry.as_bytes());
            self.body.push(0);
        }
        self
    }

    /// sockinet32; `port` is written in network order.
    pub fn sockinet32(mut self, family: u16, port: u16, addr: [u8; 4]) -> Self {
        self.body.push(token_type::SOCKINET32);
        self.body.extend_from_slice(&family.to_be_bytes());
        self.body.extend_from_slice(&port.to_be_bytes());
        self.body.extend_from_slice(&addr);
        self
    }

    /// sockinet128; `port` is written little-endian, as XNU does.
    pub fn sockinet128(mut self, family: u16, port: u16, addr: [u8; 16]) -> Self {
        self.body.push(token_type::SOCKINET128);
        self.body.extend_from_slice(&family.to_be_bytes());
        self.body.extend_from_slice(&port.to_le_bytes());
        self.body.extend_from_slice(&addr);
        self
    }

    fn counted_str(&mut self, s: &str) {
        self.body
            .extend_from_slice(&((s.len() + 1) as u16).to_be_bytes());
        self.body.extend_from_slice(s.as_bytes());
        self.body.push(0);
    }

    pub fn build(self) -> Vec<u8> {
        let header_len = if self.wide { 26 } else { 18 };
        let trailer_len = 7;
        let size = (header_len + self.body.len() + trailer_len) as u32;

        let mut out = Vec::with_capacity(size as usize);
        out.push(if self.wide {
            token_type::HEADER64
        } else {
            token_type::HEADER32
        });
        out.extend_from_slice(&size.to_be_bytes());
        out.push(11); // version
        out.extend_from_slice(&self.event_type.to_be_bytes());
        out.extend_from_slice(&self.modifier.to_be_bytes());
        if self.wide {
            out.extend_from_slice(&self.secs.to_be_bytes());
            out.extend_from_slice(&self.subsec.to_be_bytes());
        } else {
            out.extend_from_slice(&(self.secs as u32).to_be_bytes());
            out.extend_from_slice(&(self.subsec as u32).to_be_bytes());
        }
        out.extend_from_slice(&self.body);
        out.push(token_type::TRAILER);
        out.extend_from_slice(&0xb105u16.to_be_bytes());
        out.extend_from_slice(&size.to_be_bytes());
        out
    }
}
