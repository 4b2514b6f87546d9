// macos/sensors/bsm/bsm_render.rs
// One-line text form of a decoded audit event

use crate::sensors::bsm::bsm_events::aue_name;
use chrono::{DateTime, Utc};
use edr_core::{AuditEvent, Identity, Timestamp};
use std::fmt;
use std::io::{self, Write};

/// Write `event` as a single newline-terminated line. Returns bytes written.
pub fn render<W: Write>(sink: &mut W, event: &AuditEvent) -> io::Result<usize> {
    let line = render_to_string(event);
    sink.write_all(line.as_bytes())?;
    Ok(line.len())
}

pub fn render_to_string(event: &AuditEvent) -> String {
    format!("{}\n", Line(event))
}

struct Line<'a>(&'a AuditEvent);

impl fmt::Display for Line<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ev = self.0;

        write_timestamp(f, ev.timestamp)?;
        write!(
            f,
            " {} [{}:{}]",
            aue_name(ev.event_type).unwrap_or("AUE_UNKNOWN"),
            ev.event_type,
            ev.event_modifier
        )?;
        if let Some(subject) = &ev.subject {
            write_identity(f, "subject", subject)?;
        }
        if let Some(process) = &ev.process {
            write_identity(f, "process", process)?;
        }
        for (i, value) in ev.present_args() {
            write!(f, " args[{}]={}", i, value)?;
        }
        if let Some(ret) = ev.return_value {
            write!(f, " return_error={} return_value={}", ret.error, ret.value)?;
        }
        if let Some(exit) = ev.exit_status {
            write!(f, " exit_status={} exit_return={}", exit.status, exit.ret)?;
        }
        for (i, text) in ev.texts.iter().enumerate() {
            write!(f, " text[{}]={}", i, text)?;
        }
        for (i, path) in ev.paths.iter().enumerate() {
            write!(f, " path[{}]='{}'", i, path)?;
        }
        for (i, attr) in ev.attrs.iter().enumerate() {
            write!(
                f,
                " attr[{}] mode={:o} uid={} gid={}",
                i, attr.mode, attr.uid, attr.gid
            )?;
        }
        if let Some(argv) = &ev.exec_argv {
            write_quoted_list(f, "execarg", argv.iter())?;
        }
        if let Some(env) = &ev.exec_env {
            write_quoted_list(f, "execenv", env.iter())?;
        }
        if let Some(sock) = ev.socket_endpoint {
            write!(f, " sockinet={}:{}", sock.addr, sock.port)?;
        }
        if !ev.unknown_token_ids.is_empty() {
            f.write_str(" unk_tokids")?;
            for (i, id) in ev.unknown_token_ids.iter().enumerate() {
                write!(f, "{}{:#04x}", if i == 0 { "=" } else { "," }, id)?;
            }
        }
        Ok(())
    }
}

fn write_timestamp(f: &mut fmt::Formatter<'_>, ts: Timestamp) -> fmt::Result {
    match DateTime::<Utc>::from_timestamp(ts.secs, ts.nanos) {
        Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.9fZ")),
        None => write!(f, "{}.{:09}", ts.secs, ts.nanos),
    }
}

fn write_identity(f: &mut fmt::Formatter<'_>, role: &str, id: &Identity) -> fmt::Result {
    write!(f, " {}_pid={} {}_sid={} {}_tid=", role, id.pid, role, id.sid, role)?;
    match id.tty_dev {
        Some(dev) => write!(f, "{},{}", dev_major(dev), dev_minor(dev))?,
        None => f.write_str("-")?,
    }
    match id.tty_addr {
        Some(addr) => write!(f, "[{}]", addr)?,
        None => f.write_str("[-]")?,
    }
    write!(
        f,
        " {r}_auid={} {r}_euid={} {r}_egid={} {r}_ruid={} {r}_rgid={}",
        id.auid,
        id.euid,
        id.egid,
        id.ruid,
        id.rgid,
        r = role
    )
}

fn write_quoted_list<'a>(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    entries: impl Iterator<Item = &'a str>,
) -> fmt::Result {
    write!(f, " {}", label)?;
    for (i, entry) in entries.enumerate() {
        write!(f, "{}'{}'", if i == 0 { "=" } else { " " }, entry)?;
    }
    Ok(())
}

// Darwin dev_t: 8-bit major, 24-bit minor
fn dev_major(dev: u64) -> u64 {
    (dev >> 24) & 0xff
}

fn dev_minor(dev: u64) -> u64 {
    dev & 0x00ff_ffff
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_event_line() {
        let ev = AuditEvent::new();
        assert_eq!(
            render_to_string(&ev),
            "1970-01-01T00:00:00.000000000Z AUE_NULL [0:0]\n"
        );
    }

    #[test]
    fn test_unknown_type_and_byte_count() {
        let mut ev = AuditEvent::new();
        ev.event_type = 65001;
        ev.timestamp = Timestamp::new(1_700_000_000, 5);
        let mut out = Vec::new();
        let n = render(&mut out, &ev).unwrap();
        let line = String::from_utf8(out).unwrap();
        assert_eq!(line, "2023-11-14T22:13:20.000000005Z AUE_UNKNOWN [65001:0]\n");
        assert_eq!(n, line.len());
    }

    #[test]
    fn test_tty_device_split() {
        assert_eq!(dev_major(0x1000003), 1);
        assert_eq!(dev_minor(0x1000003), 3);
        assert_eq!(dev_major(0x10_0000_0000), 0);
    }
}
