// macos/sensors/bsm/bsm_tokens.rs
// OpenBSM token wire format: ids, layouts and the single-token fetcher
// All multi-byte integers are big-endian (BSM network byte order)

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;

/// BSM token type identifiers (AUT_*)
pub mod token_type {
    pub const OTHER_FILE32: u8 = 0x11;
    pub const TRAILER: u8 = 0x13;
    pub const HEADER32: u8 = 0x14;
    pub const HEADER32_EX: u8 = 0x15;
    pub const DATA: u8 = 0x21;
    pub const IPC: u8 = 0x22;
    pub const PATH: u8 = 0x23;
    pub const SUBJECT32: u8 = 0x24;
    pub const XATPATH: u8 = 0x25;
    pub const PROCESS32: u8 = 0x26;
    pub const RETURN32: u8 = 0x27;
    pub const TEXT: u8 = 0x28;
    pub const OPAQUE: u8 = 0x29;
    pub const IN_ADDR: u8 = 0x2a;
    pub const IP: u8 = 0x2b;
    pub const IPORT: u8 = 0x2c;
    pub const ARG32: u8 = 0x2d;
    pub const SOCKET: u8 = 0x2e;
    pub const SEQ: u8 = 0x2f;
    pub const IPC_PERM: u8 = 0x32;
    pub const PRIV: u8 = 0x38;
    pub const UPRIV: u8 = 0x39;
    pub const NEWGROUPS: u8 = 0x3b;
    pub const EXEC_ARGS: u8 = 0x3c;
    pub const EXEC_ENV: u8 = 0x3d;
    pub const ATTR32: u8 = 0x3e;
    pub const EXIT: u8 = 0x52;
    pub const ZONENAME: u8 = 0x60;
    pub const ARG64: u8 = 0x71;
    pub const RETURN64: u8 = 0x72;
    pub const ATTR64: u8 = 0x73;
    pub const HEADER64: u8 = 0x74;
    pub const SUBJECT64: u8 = 0x75;
    pub const PROCESS64: u8 = 0x77;
    pub const HEADER64_EX: u8 = 0x79;
    pub const SUBJECT32_EX: u8 = 0x7a;
    pub const PROCESS32_EX: u8 = 0x7b;
    pub const SUBJECT64_EX: u8 = 0x7c;
    pub const PROCESS64_EX: u8 = 0x7d;
    pub const IN_ADDR_EX: u8 = 0x7e;
    pub const SOCKET_EX: u8 = 0x7f;
    // Darwin
    pub const SOCKINET32: u8 = 0x80;
    pub const SOCKINET128: u8 = 0x81;
    pub const SOCKUNIX: u8 = 0x82;
    pub const IDENTITY: u8 = 0xed;
}

/// Address type discriminants used by `_ex` tokens (byte length of the address).
pub const AU_IPV4: u32 = 4;
pub const AU_IPV6: u32 = 16;

/// Max path bytes in a Darwin sockunix token (sizeof sun_path).
const SOCKUNIX_PATH_MAX: usize = 104;

/// Trailer token length: id, magic u16, record size u32.
pub const TRAILER_LEN: usize = 7;

/// OpenBSM caps the retained exec argv/env entries at this count.
pub const MAX_EXEC_STRINGS: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("token {id:#04x} truncated at offset {offset}")]
    Truncated { id: u8, offset: usize },
    #[error("unsupported token type {0:#04x} leaves no room for the trailer")]
    UnknownTokenId(u8),
    #[error("token {id:#04x} has invalid address type {ad_type}")]
    BadAddressType { id: u8, ad_type: u32 },
    #[error("token {id:#04x} has invalid data unit {unit}")]
    BadDataUnit { id: u8, unit: u8 },
    #[error("empty token buffer")]
    Empty,
}

/// Fields common to the four header shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub event_type: u16,
    pub modifier: u16,
    pub secs: u64,
    /// Milliseconds for 32-bit headers, raw sub-second field for 64-bit ones.
    pub subsec: u64,
    pub wide: bool,
}

/// Terminal address as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermAddr {
    /// Plain tokens: bare 32-bit address, implicitly IPv4.
    Bare(Ipv4Addr),
    /// Extended tokens: address with an explicit family.
    Ex(IpAddr),
}

/// Identity tuple shared by subject and process tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityFields {
    pub auid: u32,
    pub euid: u32,
    pub egid: u32,
    pub ruid: u32,
    pub rgid: u32,
    pub pid: u32,
    pub sid: u32,
    pub tty_port: u64,
    pub tty_addr: TermAddr,
}

/// Counted list of NUL-terminated strings (exec argv/env).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringList<'a> {
    pub count: u32,
    bytes: &'a [u8],
}

impl<'a> StringList<'a> {
    /// Retained entries, at most `MAX_EXEC_STRINGS`, without their NULs.
    pub fn iter(&self) -> impl Iterator<Item = &'a [u8]> + 'a {
        let retained = (self.count as usize).min(MAX_EXEC_STRINGS);
        self.bytes.split(|&b| b == 0).take(retained)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrFields {
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub fsid: u32,
    pub nid: u64,
}

/// One decoded token. Variants the decoder interprets carry their fields;
/// every other framed token is `Other(id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    Header(Header),
    Trailer,
    Subject(IdentityFields),
    Process(IdentityFields),
    Arg { index: u8, value: u64 },
    Return { error: u8, value: u64 },
    Exit { status: u32, ret: u32 },
    Text(&'a [u8]),
    Path(&'a [u8]),
    Attr(AttrFields),
    ExecArgs(StringList<'a>),
    ExecEnv(StringList<'a>),
    SockInet32 { family: u16, port: [u8; 2], addr: Ipv4Addr },
    SockInet128 { family: u16, port: [u8; 2], addr: Ipv6Addr },
    SockUnix,
    Other(u8),
}

/// Bounds-checked big-endian reader over one token.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    id: u8,
}

impl<'a> Cursor<'a> {
    fn bytes(&mut self, n: usize) -> Result<&'a [u8], FetchError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or(FetchError::Truncated {
                id: self.id,
                offset: self.pos,
            })?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], FetchError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, FetchError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, FetchError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, FetchError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, FetchError> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    /// u16 length prefix followed by that many bytes.
    fn counted(&mut self) -> Result<&'a [u8], FetchError> {
        let len = self.u16()?;
        self.bytes(usize::from(len))
    }

    /// Address whose width is given by a u32 `AU_IPv4`/`AU_IPv6` type.
    fn typed_addr(&mut self, ad_type: u32) -> Result<IpAddr, FetchError> {
        match ad_type {
            AU_IPV4 => Ok(IpAddr::V4(Ipv4Addr::from(self.array::<4>()?))),
            AU_IPV6 => Ok(IpAddr::V6(Ipv6Addr::from(self.array::<16>()?))),
            _ => Err(FetchError::BadAddressType { id: self.id, ad_type }),
        }
    }

    /// Skip `count` NUL-terminated strings.
    fn strings(&mut self, count: u32) -> Result<&'a [u8], FetchError> {
        let start = self.pos;
        for _ in 0..count {
            let rest = &self.buf[self.pos..];
            let nul = rest.iter().position(|&b| b == 0).ok_or(FetchError::Truncated {
                id: self.id,
                offset: self.pos,
            })?;
            self.pos += nul + 1;
        }
        Ok(&self.buf[start..self.pos])
    }
}

/// Decode the token at the start of `buf`.
/// Returns the token and its length in bytes (including the id byte).
pub fn fetch_token(buf: &[u8]) -> Result<(Token<'_>, usize), FetchError> {
    use token_type::*;

    let id = *buf.first().ok_or(FetchError::Empty)?;
    let mut c = Cursor { buf, pos: 1, id };

    let token = match id {
        HEADER32 | HEADER32_EX | HEADER64 | HEADER64_EX => {
            let wide = matches!(id, HEADER64 | HEADER64_EX);
            c.bytes(4 + 1)?; // record size, version
            let event_type = c.u16()?;
            let modifier = c.u16()?;
            if matches!(id, HEADER32_EX | HEADER64_EX) {
                let ad_type = c.u32()?;
                c.typed_addr(ad_type)?;
            }
            let (secs, subsec) = if wide {
                (c.u64()?, c.u64()?)
            } else {
                (u64::from(c.u32()?), u64::from(c.u32()?))
            };
            Token::Header(Header {
                event_type,
                modifier,
                secs,
                subsec,
                wide,
            })
        }
        TRAILER => {
            c.bytes(TRAILER_LEN - 1)?;
            Token::Trailer
        }
        SUBJECT32 | SUBJECT32_EX | SUBJECT64 | SUBJECT64_EX => {
            Token::Subject(identity(&mut c, id)?)
        }
        PROCESS32 | PROCESS32_EX | PROCESS64 | PROCESS64_EX => {
            Token::Process(identity(&mut c, id)?)
        }
        ARG32 | ARG64 => {
            let index = c.u8()?;
            let value = if id == ARG64 {
                c.u64()?
            } else {
                u64::from(c.u32()?)
            };
            c.counted()?;
            Token::Arg { index, value }
        }
        RETURN32 => {
            let error = c.u8()?;
            let value = u64::from(c.u32()?);
            Token::Return { error, value }
        }
        RETURN64 => {
            let error = c.u8()?;
            let value = c.u64()?;
            Token::Return { error, value }
        }
        EXIT => {
            let status = c.u32()?;
            let ret = c.u32()?;
            Token::Exit { status, ret }
        }
        TEXT => Token::Text(until_nul(c.counted()?)),
        PATH => Token::Path(until_nul(c.counted()?)),
        ATTR32 | ATTR64 => {
            let mode = c.u32()?;
            let uid = c.u32()?;
            let gid = c.u32()?;
            let fsid = c.u32()?;
            let nid = c.u64()?;
            c.bytes(if id == ATTR64 { 8 } else { 4 })?; // device
            Token::Attr(AttrFields {
                mode,
                uid,
                gid,
                fsid,
                nid,
            })
        }
        EXEC_ARGS | EXEC_ENV => {
            let count = c.u32()?;
            let bytes = c.strings(count)?;
            let list = StringList { count, bytes };
            if id == EXEC_ARGS {
                Token::ExecArgs(list)
            } else {
                Token::ExecEnv(list)
            }
        }
        SOCKINET32 => {
            let family = c.u16()?;
            let port = c.array::<2>()?;
            let addr = Ipv4Addr::from(c.array::<4>()?);
            Token::SockInet32 { family, port, addr }
        }
        SOCKINET128 => {
            let family = c.u16()?;
            let port = c.array::<2>()?;
            let addr = Ipv6Addr::from(c.array::<16>()?);
            Token::SockInet128 { family, port, addr }
        }
        SOCKUNIX => {
            c.u16()?;
            let rest = &buf[c.pos..];
            let window = &rest[..rest.len().min(SOCKUNIX_PATH_MAX)];
            let path_len = window.iter().position(|&b| b == 0).unwrap_or(window.len());
            c.bytes((path_len + 1).min(SOCKUNIX_PATH_MAX))?;
            Token::SockUnix
        }
        _ => {
            skip_uninterpreted(&mut c, id)?;
            Token::Other(id)
        }
    };

    Ok((token, c.pos))
}

fn identity(c: &mut Cursor<'_>, id: u8) -> Result<IdentityFields, FetchError> {
    use token_type::*;

    let auid = c.u32()?;
    let euid = c.u32()?;
    let egid = c.u32()?;
    let ruid = c.u32()?;
    let rgid = c.u32()?;
    let pid = c.u32()?;
    let sid = c.u32()?;
    let tty_port = match id {
        SUBJECT64 | SUBJECT64_EX | PROCESS64 | PROCESS64_EX => c.u64()?,
        _ => u64::from(c.u32()?),
    };
    let tty_addr = match id {
        SUBJECT32_EX | SUBJECT64_EX | PROCESS32_EX | PROCESS64_EX => {
            let ad_type = c.u32()?;
            TermAddr::Ex(c.typed_addr(ad_type)?)
        }
        _ => TermAddr::Bare(Ipv4Addr::from(c.array::<4>()?)),
    };
    Ok(IdentityFields {
        auid,
        euid,
        egid,
        ruid,
        rgid,
        pid,
        sid,
        tty_port,
        tty_addr,
    })
}

/// Frame tokens the decoder does not interpret so their length is known.
fn skip_uninterpreted(c: &mut Cursor<'_>, id: u8) -> Result<(), FetchError> {
    use token_type::*;

    match id {
        OTHER_FILE32 => {
            c.bytes(4 + 4)?;
            c.counted()?;
        }
        DATA => {
            c.u8()?; // how to print
            let unit = c.u8()?;
            let count = c.u8()?;
            let width = match unit {
                0 => 1,
                1 => 2,
                2 => 4,
                3 => 8,
                _ => return Err(FetchError::BadDataUnit { id, unit }),
            };
            c.bytes(width * usize::from(count))?;
        }
        IPC => {
            c.bytes(1 + 4)?;
        }
        XATPATH | OPAQUE | ZONENAME => {
            c.counted()?;
        }
        IN_ADDR | SEQ => {
            c.bytes(4)?;
        }
        IP => {
            c.bytes(20)?;
        }
        IPORT => {
            c.bytes(2)?;
        }
        SOCKET => {
            c.bytes(2 + 2 + 4 + 2 + 4)?;
        }
        IPC_PERM => {
            c.bytes(7 * 4)?;
        }
        PRIV => {
            c.counted()?;
            c.counted()?;
        }
        UPRIV => {
            c.u8()?;
            c.counted()?;
        }
        NEWGROUPS => {
            let count = c.u16()?;
            c.bytes(4 * usize::from(count))?;
        }
        IN_ADDR_EX => {
            let ad_type = c.u32()?;
            c.typed_addr(ad_type)?;
        }
        SOCKET_EX => {
            c.bytes(2 + 2)?; // domain, type
            let ad_type = u32::from(c.u16()?);
            c.u16()?;
            c.typed_addr(ad_type)?;
            c.u16()?;
            c.typed_addr(ad_type)?;
        }
        IDENTITY => {
            c.u32()?; // signer type
            c.counted()?;
            c.u8()?;
            c.counted()?;
            c.u8()?;
            c.counted()?;
        }
        _ => {
            // No known layout: the token runs up to the record trailer.
            let body = c
                .buf
                .len()
                .checked_sub(c.pos + TRAILER_LEN)
                .filter(|&n| n > 0)
                .ok_or(FetchError::UnknownTokenId(id))?;
            c.bytes(body)?;
        }
    }
    Ok(())
}

/// Strip the terminating NUL (and anything after it) from a counted string.
fn until_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(nul) => &bytes[..nul],
        None => bytes,
    }
}
