// macos/sensors/bsm/bsm_events.rs
// Audit event (AUE_*) codes and their names
// Covers the BSD kernel events plus the Darwin-specific ranges the agent cares about

/// Event codes from OpenBSM `audit_kevents.h` / `audit_uevents.h`
pub mod aue {
    pub const AUE_NULL: u16 = 0;
    pub const AUE_EXIT: u16 = 1;
    pub const AUE_FORK: u16 = 2;
    pub const AUE_OPEN: u16 = 3;
    pub const AUE_CREAT: u16 = 4;
    pub const AUE_LINK: u16 = 5;
    pub const AUE_UNLINK: u16 = 6;
    pub const AUE_EXEC: u16 = 7;
    pub const AUE_CHDIR: u16 = 8;
    pub const AUE_MKNOD: u16 = 9;
    pub const AUE_CHMOD: u16 = 10;
    pub const AUE_CHOWN: u16 = 11;
    pub const AUE_UMOUNT: u16 = 12;
    pub const AUE_ACCESS: u16 = 14;
    pub const AUE_KILL: u16 = 15;
    pub const AUE_STAT: u16 = 16;
    pub const AUE_LSTAT: u16 = 17;
    pub const AUE_REBOOT: u16 = 20;
    pub const AUE_SYMLINK: u16 = 21;
    pub const AUE_READLINK: u16 = 22;
    pub const AUE_EXECVE: u16 = 23;
    pub const AUE_CHROOT: u16 = 24;
    pub const AUE_VFORK: u16 = 25;
    pub const AUE_SETGROUPS: u16 = 26;
    pub const AUE_SETPGRP: u16 = 27;
    pub const AUE_FCNTL: u16 = 30;
    pub const AUE_SETPRIORITY: u16 = 31;
    pub const AUE_CONNECT: u16 = 32;
    pub const AUE_ACCEPT: u16 = 33;
    pub const AUE_BIND: u16 = 34;
    pub const AUE_SETSOCKOPT: u16 = 35;
    pub const AUE_SETTIMEOFDAY: u16 = 37;
    pub const AUE_FCHOWN: u16 = 38;
    pub const AUE_FCHMOD: u16 = 39;
    pub const AUE_SETREUID: u16 = 40;
    pub const AUE_SETREGID: u16 = 41;
    pub const AUE_RENAME: u16 = 42;
    pub const AUE_TRUNCATE: u16 = 43;
    pub const AUE_FTRUNCATE: u16 = 44;
    pub const AUE_FLOCK: u16 = 45;
    pub const AUE_SHUTDOWN: u16 = 46;
    pub const AUE_MKDIR: u16 = 47;
    pub const AUE_RMDIR: u16 = 48;
    pub const AUE_UTIMES: u16 = 49;
    pub const AUE_ADJTIME: u16 = 50;
    pub const AUE_SETRLIMIT: u16 = 51;
    pub const AUE_KILLPG: u16 = 52;
    pub const AUE_STATFS: u16 = 54;
    pub const AUE_FSTATFS: u16 = 55;
    pub const AUE_UNMOUNT: u16 = 56;
    pub const AUE_QUOTACTL: u16 = 60;
    pub const AUE_MOUNT: u16 = 62;
    pub const AUE_OPEN_R: u16 = 72;
    pub const AUE_OPEN_RC: u16 = 73;
    pub const AUE_OPEN_RT: u16 = 74;
    pub const AUE_OPEN_RTC: u16 = 75;
    pub const AUE_OPEN_W: u16 = 76;
    pub const AUE_OPEN_WC: u16 = 77;
    pub const AUE_OPEN_WT: u16 = 78;
    pub const AUE_OPEN_WTC: u16 = 79;
    pub const AUE_OPEN_RW: u16 = 80;
    pub const AUE_OPEN_RWC: u16 = 81;
    pub const AUE_OPEN_RWT: u16 = 82;
    pub const AUE_OPEN_RWTC: u16 = 83;
    pub const AUE_SOCKET: u16 = 183;
    pub const AUE_SENDTO: u16 = 184;
    pub const AUE_PIPE: u16 = 185;
    pub const AUE_SOCKETPAIR: u16 = 186;
    pub const AUE_SEND: u16 = 187;
    pub const AUE_SENDMSG: u16 = 188;
    pub const AUE_RECV: u16 = 189;
    pub const AUE_RECVMSG: u16 = 190;
    pub const AUE_RECVFROM: u16 = 191;
    pub const AUE_READ: u16 = 192;
    pub const AUE_LSEEK: u16 = 194;
    pub const AUE_WRITE: u16 = 195;
    pub const AUE_WRITEV: u16 = 196;
    pub const AUE_READV: u16 = 198;
    pub const AUE_SETUID: u16 = 200;
    // user-space events
    pub const AUE_LOGIN: u16 = 6152;
    pub const AUE_LOGOUT: u16 = 6153;
    pub const AUE_SU: u16 = 6159;
    pub const AUE_OPENSSH: u16 = 32800;
    // Darwin
    pub const AUE_MAC_EXECVE: u16 = 43189;
    pub const AUE_POSIX_SPAWN: u16 = 43190;
    pub const AUE_SESSION_START: u16 = 44901;
    pub const AUE_SESSION_UPDATE: u16 = 44902;
    pub const AUE_SESSION_END: u16 = 44903;
    pub const AUE_SESSION_CLOSE: u16 = 44904;
}

use aue::*;

/// Name/code pairs, sorted by code.
static AUE_TABLE: &[(u16, &str)] = &[
    (AUE_NULL, "AUE_NULL"),
    (AUE_EXIT, "AUE_EXIT"),
    (AUE_FORK, "AUE_FORK"),
    (AUE_OPEN, "AUE_OPEN"),
    (AUE_CREAT, "AUE_CREAT"),
    (AUE_LINK, "AUE_LINK"),
    (AUE_UNLINK, "AUE_UNLINK"),
    (AUE_EXEC, "AUE_EXEC"),
    (AUE_CHDIR, "AUE_CHDIR"),
    (AUE_MKNOD, "AUE_MKNOD"),
    (AUE_CHMOD, "AUE_CHMOD"),
    (AUE_CHOWN, "AUE_CHOWN"),
    (AUE_UMOUNT, "AUE_UMOUNT"),
    (AUE_ACCESS, "AUE_ACCESS"),
    (AUE_KILL, "AUE_KILL"),
    (AUE_STAT, "AUE_STAT"),
    (AUE_LSTAT, "AUE_LSTAT"),
    (AUE_REBOOT, "AUE_REBOOT"),
    (AUE_SYMLINK, "AUE_SYMLINK"),
    (AUE_READLINK, "AUE_READLINK"),
    (AUE_EXECVE, "AUE_EXECVE"),
    (AUE_CHROOT, "AUE_CHROOT"),
    (AUE_VFORK, "AUE_VFORK"),
    (AUE_SETGROUPS, "AUE_SETGROUPS"),
    (AUE_SETPGRP, "AUE_SETPGRP"),
    (AUE_FCNTL, "AUE_FCNTL"),
    (AUE_SETPRIORITY, "AUE_SETPRIORITY"),
    (AUE_CONNECT, "AUE_CONNECT"),
    (AUE_ACCEPT, "AUE_ACCEPT"),
    (AUE_BIND, "AUE_BIND"),
    (AUE_SETSOCKOPT, "AUE_SETSOCKOPT"),
    (AUE_SETTIMEOFDAY, "AUE_SETTIMEOFDAY"),
    (AUE_FCHOWN, "AUE_FCHOWN"),
    (AUE_FCHMOD, "AUE_FCHMOD"),
    (AUE_SETREUID, "AUE_SETREUID"),
    (AUE_SETREGID, "AUE_SETREGID"),
    (AUE_RENAME, "AUE_RENAME"),
    (AUE_TRUNCATE, "AUE_TRUNCATE"),
    (AUE_FTRUNCATE, "AUE_FTRUNCATE"),
    (AUE_FLOCK, "AUE_FLOCK"),
    (AUE_SHUTDOWN, "AUE_SHUTDOWN"),
    (AUE_MKDIR, "AUE_MKDIR"),
    (AUE_RMDIR, "AUE_RMDIR"),
    (AUE_UTIMES, "AUE_UTIMES"),
    (AUE_ADJTIME, "AUE_ADJTIME"),
    (AUE_SETRLIMIT, "AUE_SETRLIMIT"),
    (AUE_KILLPG, "AUE_KILLPG"),
    (AUE_STATFS, "AUE_STATFS"),
    (AUE_FSTATFS, "AUE_FSTATFS"),
    (AUE_UNMOUNT, "AUE_UNMOUNT"),
    (AUE_QUOTACTL, "AUE_QUOTACTL"),
    (AUE_MOUNT, "AUE_MOUNT"),
    (AUE_OPEN_R, "AUE_OPEN_R"),
    (AUE_OPEN_RC, "AUE_OPEN_RC"),
    (AUE_OPEN_RT, "AUE_OPEN_RT"),
    (AUE_OPEN_RTC, "AUE_OPEN_RTC"),
    (AUE_OPEN_W, "AUE_OPEN_W"),
    (AUE_OPEN_WC, "AUE_OPEN_WC"),
    (AUE_OPEN_WT, "AUE_OPEN_WT"),
    (AUE_OPEN_WTC, "AUE_OPEN_WTC"),
    (AUE_OPEN_RW, "AUE_OPEN_RW"),
    (AUE_OPEN_RWC, "AUE_OPEN_RWC"),
    (AUE_OPEN_RWT, "AUE_OPEN_RWT"),
    (AUE_OPEN_RWTC, "AUE_OPEN_RWTC"),
    (AUE_SOCKET, "AUE_SOCKET"),
    (AUE_SENDTO, "AUE_SENDTO"),
    (AUE_PIPE, "AUE_PIPE"),
    (AUE_SOCKETPAIR, "AUE_SOCKETPAIR"),
    (AUE_SEND, "AUE_SEND"),
    (AUE_SENDMSG, "AUE_SENDMSG"),
    (AUE_RECV, "AUE_RECV"),
    (AUE_RECVMSG, "AUE_RECVMSG"),
    (AUE_RECVFROM, "AUE_RECVFROM"),
    (AUE_READ, "AUE_READ"),
    (AUE_LSEEK, "AUE_LSEEK"),
    (AUE_WRITE, "AUE_WRITE"),
    (AUE_WRITEV, "AUE_WRITEV"),
    (AUE_READV, "AUE_READV"),
    (AUE_SETUID, "AUE_SETUID"),
    (AUE_LOGIN, "AUE_login"),
    (AUE_LOGOUT, "AUE_logout"),
    (AUE_SU, "AUE_su"),
    (AUE_OPENSSH, "AUE_openssh"),
    (AUE_MAC_EXECVE, "AUE_MAC_EXECVE"),
    (AUE_POSIX_SPAWN, "AUE_POSIX_SPAWN"),
    (AUE_SESSION_START, "AUE_SESSION_START"),
    (AUE_SESSION_UPDATE, "AUE_SESSION_UPDATE"),
    (AUE_SESSION_END, "AUE_SESSION_END"),
    (AUE_SESSION_CLOSE, "AUE_SESSION_CLOSE"),
];

/// Symbolic name of an event code, if known.
pub fn aue_name(code: u16) -> Option<&'static str> {
    AUE_TABLE
        .binary_search_by_key(&code, |&(c, _)| c)
        .ok()
        .map(|i| AUE_TABLE[i].1)
}

/// Resolve a `--type` argument: a numeric code or a name, with or without
/// the `AUE_` prefix (case-insensitive).
pub fn aue_code(name: &str) -> Option<u16> {
    if let Ok(code) = name.parse::<u16>() {
        return Some(code);
    }
    let bare = name
        .get(..4)
        .filter(|p| p.eq_ignore_ascii_case("AUE_"))
        .map_or(name, |_| &name[4..]);
    AUE_TABLE
        .iter()
        .find(|(_, n)| n[4..].eq_ignore_ascii_case(bare))
        .map(|&(c, _)| c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_sorted() {
        assert!(AUE_TABLE.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_names() {
        assert_eq!(aue_name(aue::AUE_EXECVE), Some("AUE_EXECVE"));
        assert_eq!(aue_name(aue::AUE_POSIX_SPAWN), Some("AUE_POSIX_SPAWN"));
        assert_eq!(aue_name(65000), None);
    }

    #[test]
    fn test_code_lookup() {
        assert_eq!(aue_code("23"), Some(23));
        assert_eq!(aue_code("AUE_CONNECT"), Some(aue::AUE_CONNECT));
        assert_eq!(aue_code("mac_execve"), Some(aue::AUE_MAC_EXECVE));
        assert_eq!(aue_code("aue_session_end"), Some(aue::AUE_SESSION_END));
        assert_eq!(aue_code("AUE_NOPE"), None);
    }
}
