// macos/sensors/bsm/bsm_socket.rs
// BSM socket domain/type constants back to Darwin values
//
// BSM inherited its PF_* and SOCK_* numbering from Solaris. socket(2) and
// friends report them as plain arg tokens, so consumers translate them here.

/// BSM protocol families
pub mod bsm_pf {
    pub const UNSPEC: u32 = 0;
    pub const LOCAL: u32 = 1;
    pub const INET: u32 = 2;
    pub const ROUTE: u32 = 24;
    pub const INET6: u32 = 26;
    pub const KEY: u32 = 27;
}

/// BSM socket types
pub mod bsm_sock {
    pub const DGRAM: u32 = 1;
    pub const STREAM: u32 = 2;
    pub const RAW: u32 = 4;
    pub const RDM: u32 = 5;
    pub const SEQPACKET: u32 = 6;
}

/// Darwin `PF_*` for a BSM protocol family; `None` when unsupported.
pub fn sock_domain(bsm_domain: u32) -> Option<i32> {
    match bsm_domain {
        bsm_pf::UNSPEC => Some(0),
        bsm_pf::LOCAL => Some(1),
        bsm_pf::INET => Some(2),
        bsm_pf::ROUTE => Some(17),
        bsm_pf::KEY => Some(29),
        bsm_pf::INET6 => Some(30),
        _ => None,
    }
}

/// Darwin `SOCK_*` for a BSM socket type; `None` when unsupported.
pub fn sock_type(bsm_type: u32) -> Option<i32> {
    match bsm_type {
        bsm_sock::DGRAM => Some(2),
        bsm_sock::STREAM => Some(1),
        bsm_sock::RAW => Some(3),
        bsm_sock::RDM => Some(4),
        bsm_sock::SEQPACKET => Some(5),
        _ => None,
    }
}
