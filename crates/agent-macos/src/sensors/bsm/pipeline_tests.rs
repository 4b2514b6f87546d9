// macos/sensors/bsm/pipeline_tests.rs
// Record bytes -> BsmReader -> AuditEvent -> rendered line

use crate::sensors::bsm::bsm_events::aue;
use crate::sensors::bsm::bsm_reader::{BsmReader, DecodeError, DecoderConfig, EnvCapture, EventFilter, Outcome};
use crate::sensors::bsm::bsm_render::render_to_string;
use crate::sensors::bsm::test_support::{RecordBuilder, Who};
use edr_core::AuditEvent;
use proptest::prelude::*;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

const NULL_DEV: u32 = 0x3000002;
const TTYS003: u32 = 0x1000003;

fn config() -> DecoderConfig {
    DecoderConfig {
        null_device: Some(u64::from(NULL_DEV)),
        ..DecoderConfig::default()
    }
}

fn decode_with(
    bytes: &[u8],
    config: DecoderConfig,
    filter: &EventFilter,
    capture: EnvCapture,
) -> (Outcome, AuditEvent) {
    let mut reader = BsmReader::new(bytes, config);
    let mut ev = AuditEvent::new();
    let outcome = reader.read_event(&mut ev, filter, capture).unwrap();
    (outcome, ev)
}

fn decode(bytes: &[u8]) -> (Outcome, AuditEvent) {
    decode_with(bytes, config(), &EventFilter::all(), EnvCapture::None)
}

#[test]
fn test_execve_golden_line() {
    let bytes = RecordBuilder::new(aue::AUE_EXECVE)
        .time(1_700_000_000, 250)
        .exec_args(&["/bin/ls", "-l"])
        .path("/bin/ls")
        .path("/bin/ls")
        .attr32(0o100755, 0, 0)
        .subject32(Who::pid(4242), NULL_DEV, [0, 0, 0, 0])
        .return32(0, 0)
        .build();

    let (outcome, ev) = decode(&bytes);
    assert_eq!(outcome, Outcome::Decoded);
    assert_eq!(
        render_to_string(&ev),
        "2023-11-14T22:13:20.250000000Z AUE_EXECVE [23:0] \
         subject_pid=4242 subject_sid=100001 subject_tid=-[-] \
         subject_auid=501 subject_euid=501 subject_egid=20 subject_ruid=501 subject_rgid=20 \
         return_error=0 return_value=0 \
         path[0]='/bin/ls' path[1]='/bin/ls' \
         attr[0] mode=100755 uid=0 gid=0 \
         execarg='/bin/ls' '-l'\n"
    );
}

#[test]
fn test_kill_renders_process_section_with_its_own_tty() {
    let bytes = RecordBuilder::new(aue::AUE_KILL)
        .modifier(1)
        .arg32(2, 15, "signal")
        .process32(Who::pid(77), TTYS003, [10, 0, 0, 7])
        .subject32(Who::pid(4242), NULL_DEV, [0, 0, 0, 0])
        .return32(1, 3)
        .build();

    let (_, ev) = decode(&bytes);
    let line = render_to_string(&ev);
    assert!(line.contains(" AUE_KILL [15:1] "));
    assert!(line.contains(" subject_tid=-[-] "));
    assert!(line.contains(" process_pid=77 process_sid=100001 process_tid=1,3[10.0.0.7] "));
    assert!(line.contains(" args[2]=15 return_error=1 return_value=3"));
    assert!(!line.contains("args[0]"));
}

#[test]
fn test_header64_subsecond_field_is_nanoseconds() {
    let bytes = RecordBuilder::new(aue::AUE_EXIT)
        .header64()
        .time(1_700_000_000, 123_456_789)
        .exit(0, 0)
        .build();
    let (_, ev) = decode(&bytes);
    assert_eq!(ev.timestamp.secs, 1_700_000_000);
    assert_eq!(ev.timestamp.nanos, 123_456_789);
    assert!(render_to_string(&ev).contains(" exit_status=0 exit_return=0"));
}

#[test]
fn test_filtered_type_is_skipped_and_event_left_empty() {
    let bytes = RecordBuilder::new(aue::AUE_OPEN_R)
        .path("/etc/hosts")
        .build();
    let (outcome, ev) = decode_with(
        &bytes,
        config(),
        &EventFilter::only([aue::AUE_EXECVE]),
        EnvCapture::None,
    );
    assert_eq!(outcome, Outcome::Skipped);
    assert_eq!(ev, AuditEvent::new());
}

#[test]
fn test_duplicate_subject_skips_record() {
    let bytes = RecordBuilder::new(aue::AUE_FORK)
        .subject32(Who::pid(1), NULL_DEV, [0; 4])
        .subject32(Who::pid(2), NULL_DEV, [0; 4])
        .build();
    let (outcome, ev) = decode(&bytes);
    assert_eq!(outcome, Outcome::Skipped);
    assert!(ev.subject.is_none());
}

#[test]
fn test_duplicate_return_and_exit_skip_record() {
    let ret = RecordBuilder::new(aue::AUE_FORK)
        .return32(0, 1)
        .return32(0, 2)
        .build();
    assert_eq!(decode(&ret).0, Outcome::Skipped);

    let exit = RecordBuilder::new(aue::AUE_EXIT).exit(0, 0).exit(1, 1).build();
    assert_eq!(decode(&exit).0, Outcome::Skipped);
}

#[test]
fn test_bounded_sections_overflow_skips_record() {
    let texts = RecordBuilder::new(aue::AUE_SYMLINK)
        .text("a")
        .text("b")
        .text("c")
        .build();
    assert_eq!(decode(&texts).0, Outcome::Skipped);

    let paths = (0..5)
        .fold(RecordBuilder::new(aue::AUE_RENAME), |b, i| b.path(&format!("/p{}", i)))
        .build();
    assert_eq!(decode(&paths).0, Outcome::Skipped);

    let attrs = RecordBuilder::new(aue::AUE_RENAME)
        .attr32(0o644, 0, 0)
        .attr32(0o644, 0, 0)
        .attr32(0o644, 0, 0)
        .build();
    assert_eq!(decode(&attrs).0, Outcome::Skipped);

    let full = (0..4)
        .fold(RecordBuilder::new(aue::AUE_RENAME), |b, i| b.path(&format!("/p{}", i)))
        .text("t0")
        .text("t1")
        .build();
    let (outcome, ev) = decode(&full);
    assert_eq!(outcome, Outcome::Decoded);
    assert_eq!(ev.paths.len(), 4);
    assert_eq!(ev.texts.as_slice(), &["t0".to_string(), "t1".to_string()]);
}

#[test]
fn test_arg_index_out_of_range_skips_record() {
    let bytes = RecordBuilder::new(aue::AUE_SOCKET).arg32(8, 1, "x").build();
    assert_eq!(decode(&bytes).0, Outcome::Skipped);

    let dup = RecordBuilder::new(aue::AUE_SOCKET)
        .arg32(1, 1, "x")
        .arg64(1, 2, "x")
        .build();
    assert_eq!(decode(&dup).0, Outcome::Skipped);
}

#[test]
fn test_unknown_token_id_is_listed_and_record_decodes() {
    for id in [0x31u8, 0x36, 0xfe] {
        let bytes = RecordBuilder::new(aue::AUE_CHDIR)
            .path("/tmp")
            .raw(&[id, 0, 0, 0])
            .build();
        let (outcome, ev) = decode(&bytes);
        assert_eq!(outcome, Outcome::Decoded, "token {:#04x}", id);
        assert_eq!(ev.paths.as_slice(), &["/tmp".to_string()]);
        assert_eq!(ev.unknown_token_ids.as_slice(), &[id]);
    }
}

#[test]
fn test_unknown_token_id_stream_continues() {
    let mut stream = RecordBuilder::new(aue::AUE_OPEN_R).raw(&[0xfe, 0, 0]).build();
    stream.extend(RecordBuilder::new(aue::AUE_CHDIR).path("/tmp").build());

    let mut reader = BsmReader::new(&stream[..], config());
    let mut ev = AuditEvent::new();
    let filter = EventFilter::all();
    assert_eq!(
        reader.read_event(&mut ev, &filter, EnvCapture::None).unwrap(),
        Outcome::Decoded
    );
    assert_eq!(ev.event_type, aue::AUE_OPEN_R);
    assert_eq!(ev.unknown_token_ids.as_slice(), &[0xfe]);
    assert_eq!(
        reader.read_event(&mut ev, &filter, EnvCapture::None).unwrap(),
        Outcome::Decoded
    );
    assert_eq!(ev.event_type, aue::AUE_CHDIR);
    assert_eq!(ev.paths.as_slice(), &["/tmp".to_string()]);
    assert!(ev.unknown_token_ids.is_empty());
}

#[test]
fn test_unknown_token_id_before_trailer_skips_record() {
    let bytes = RecordBuilder::new(aue::AUE_CHDIR).raw(&[0xfe]).build();
    let (outcome, ev) = decode(&bytes);
    assert_eq!(outcome, Outcome::Skipped);
    assert!(ev.unknown_token_ids.is_empty());
}

#[test]
fn test_skip_clears_previously_decoded_fields() {
    let mut stream = RecordBuilder::new(aue::AUE_EXECVE)
        .exec_args(&["/bin/sh"])
        .subject32(Who::pid(9), NULL_DEV, [0; 4])
        .build();
    stream.extend(
        RecordBuilder::new(aue::AUE_EXECVE)
            .exec_args(&["/bin/sh"])
            .text("1")
            .text("2")
            .text("3")
            .build(),
    );

    let mut reader = BsmReader::new(&stream[..], config());
    let mut ev = AuditEvent::new();
    let filter = EventFilter::all();
    reader.read_event(&mut ev, &filter, EnvCapture::None).unwrap();
    assert!(ev.exec_argv.is_some());
    assert_eq!(
        reader.read_event(&mut ev, &filter, EnvCapture::None).unwrap(),
        Outcome::Skipped
    );
    assert_eq!(ev, AuditEvent::new());
}

#[test]
fn test_uninterpreted_tokens_are_listed_once() {
    let bytes = RecordBuilder::new(aue::AUE_CONNECT)
        .raw(&[0x2f, 0, 0, 0, 1]) // seq
        .raw(&[0x2c, 0, 80]) // iport
        .raw(&[0x2f, 0, 0, 0, 2])
        .build();
    let (outcome, ev) = decode(&bytes);
    assert_eq!(outcome, Outcome::Decoded);
    assert_eq!(ev.unknown_token_ids.as_slice(), &[0x2f, 0x2c]);
    assert!(render_to_string(&ev).ends_with(" unk_tokids=0x2f,0x2c\n"));
}

#[test]
fn test_terminal_normalization() {
    let bytes = RecordBuilder::new(aue::AUE_FORK)
        .subject32(Who::pid(1), NULL_DEV, [0; 4])
        .process32(Who::pid(2), TTYS003, [192, 168, 1, 2])
        .build();
    let (_, ev) = decode(&bytes);
    let subject = ev.subject.unwrap();
    assert_eq!(subject.tty_dev, None);
    assert_eq!(subject.tty_addr, None);
    let process = ev.process.unwrap();
    assert_eq!(process.tty_dev, Some(u64::from(TTYS003)));
    assert_eq!(process.tty_addr, Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 2))));
}

#[test]
fn test_terminal_without_null_device_config_is_kept() {
    let bytes = RecordBuilder::new(aue::AUE_FORK)
        .subject32(Who::pid(1), NULL_DEV, [0; 4])
        .build();
    let (_, ev) = decode_with(&bytes, DecoderConfig::default(), &EventFilter::all(), EnvCapture::None);
    assert_eq!(ev.subject.unwrap().tty_dev, Some(u64::from(NULL_DEV)));
}

#[test]
fn test_extended_terminal_addresses() {
    let v4_zero = RecordBuilder::new(aue::AUE_FORK)
        .subject64_ex(Who::pid(1), u64::from(NULL_DEV), IpAddr::V4(Ipv4Addr::UNSPECIFIED))
        .build();
    let subject = decode(&v4_zero).1.subject.unwrap();
    assert_eq!(subject.tty_dev, None);
    assert_eq!(subject.tty_addr, None);

    let v6_zero = RecordBuilder::new(aue::AUE_FORK)
        .subject64_ex(Who::pid(1), 7, IpAddr::V6(Ipv6Addr::UNSPECIFIED))
        .build();
    let subject = decode(&v6_zero).1.subject.unwrap();
    assert_eq!(subject.tty_dev, Some(7));
    assert_eq!(subject.tty_addr, Some(IpAddr::V6(Ipv6Addr::UNSPECIFIED)));
}

fn exec_with_env(env: &[&str]) -> Vec<u8> {
    RecordBuilder::new(aue::AUE_EXECVE)
        .exec_args(&["/usr/bin/true"])
        .exec_env(env)
        .build()
}

#[test]
fn test_env_capture_modes() {
    let bytes = exec_with_env(&["PATH=/bin", "DYLD_INSERT_LIBRARIES=/tmp/x.dylib", "HOME=/"]);

    let (_, ev) = decode_with(&bytes, config(), &EventFilter::all(), EnvCapture::None);
    assert!(ev.exec_env.is_none());

    let (_, ev) = decode_with(&bytes, config(), &EventFilter::all(), EnvCapture::DyldOnly);
    let env = ev.exec_env.unwrap();
    assert_eq!(env.iter().collect::<Vec<_>>(), vec!["DYLD_INSERT_LIBRARIES=/tmp/x.dylib"]);

    let (_, ev) = decode_with(&bytes, config(), &EventFilter::all(), EnvCapture::Full);
    assert_eq!(ev.exec_env.unwrap().len(), 3);
    assert!(render_to_string(&decode_with(&bytes, config(), &EventFilter::all(), EnvCapture::Full).1)
        .contains(" execenv='PATH=/bin' 'DYLD_INSERT_LIBRARIES=/tmp/x.dylib' 'HOME=/'"));
}

#[test]
fn test_dyld_capture_without_match_has_no_env() {
    let bytes = exec_with_env(&["PATH=/bin"]);
    let (outcome, ev) = decode_with(&bytes, config(), &EventFilter::all(), EnvCapture::DyldOnly);
    assert_eq!(outcome, Outcome::Decoded);
    assert!(ev.exec_env.is_none());
    assert!(!render_to_string(&ev).contains("execenv"));
}

#[test]
fn test_duplicate_exec_tokens_skip_record() {
    let args = RecordBuilder::new(aue::AUE_EXECVE)
        .exec_args(&["a"])
        .exec_args(&["b"])
        .build();
    assert_eq!(decode(&args).0, Outcome::Skipped);

    // env capture off still refuses a second env token
    let env = RecordBuilder::new(aue::AUE_EXECVE)
        .exec_env(&["A=1"])
        .exec_env(&["B=2"])
        .build();
    assert_eq!(decode(&env).0, Outcome::Skipped);
}

#[test]
fn test_exec_args_retain_at_most_128() {
    let many: Vec<String> = (0..130).map(|i| format!("arg{}", i)).collect();
    let refs: Vec<&str> = many.iter().map(String::as_str).collect();
    let bytes = RecordBuilder::new(aue::AUE_EXECVE)
        .exec_args(&refs)
        .path("/bin/echo")
        .build();
    let (outcome, ev) = decode(&bytes);
    assert_eq!(outcome, Outcome::Decoded);
    let argv = ev.exec_argv.unwrap();
    assert_eq!(argv.len(), 128);
    assert_eq!(argv.get(127), Some("arg127"));
    assert_eq!(ev.paths.as_slice(), &["/bin/echo".to_string()]);
}

#[test]
fn test_sockinet32_endpoint() {
    let bytes = RecordBuilder::new(aue::AUE_CONNECT)
        .sockinet32(2, 443, [93, 184, 216, 34])
        .return32(0, 0)
        .build();
    let (_, ev) = decode(&bytes);
    assert!(render_to_string(&ev).contains(" sockinet=93.184.216.34:443"));
}

#[test]
fn test_sockinet128_port_byte_order() {
    let bytes = RecordBuilder::new(aue::AUE_CONNECT)
        .sockinet128(26, 8080, Ipv6Addr::LOCALHOST.octets())
        .build();

    let (_, ev) = decode(&bytes);
    let sock = ev.socket_endpoint.unwrap();
    assert_eq!(sock.addr, IpAddr::V6(Ipv6Addr::LOCALHOST));
    assert_eq!(sock.port, 8080);

    let raw = DecoderConfig {
        sockinet128_port_host_order: false,
        ..config()
    };
    let (_, ev) = decode_with(&bytes, raw, &EventFilter::all(), EnvCapture::None);
    assert_eq!(ev.socket_endpoint.unwrap().port, 8080u16.swap_bytes());
}

#[test]
fn test_sockinet_wrong_family_is_dropped() {
    let bytes = RecordBuilder::new(aue::AUE_CONNECT)
        .sockinet32(26, 443, [1, 2, 3, 4])
        .sockinet128(2, 443, [0; 16])
        .build();
    let (outcome, ev) = decode(&bytes);
    assert_eq!(outcome, Outcome::Decoded);
    assert!(ev.socket_endpoint.is_none());
}

#[test]
fn test_second_sockinet_token_wins() {
    let bytes = RecordBuilder::new(aue::AUE_ACCEPT)
        .sockinet32(2, 22, [10, 0, 0, 1])
        .sockinet32(2, 2222, [10, 0, 0, 2])
        .build();
    let (_, ev) = decode(&bytes);
    assert_eq!(ev.socket_endpoint.unwrap().port, 2222);
}

#[test]
fn test_sockunix_is_ignored() {
    let mut sockunix = vec![0x82, 0, 1];
    sockunix.extend_from_slice(b"/var/run/mDNSResponder\0");
    let bytes = RecordBuilder::new(aue::AUE_CONNECT).raw(&sockunix).build();
    let (outcome, ev) = decode(&bytes);
    assert_eq!(outcome, Outcome::Decoded);
    assert!(ev.socket_endpoint.is_none());
    assert!(ev.unknown_token_ids.is_empty());
}

proptest! {
    #[test]
    fn decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let mut reader = BsmReader::new(&bytes[..], config());
        let mut ev = AuditEvent::new();
        for _ in 0..8 {
            match reader.read_event(&mut ev, &EventFilter::all(), EnvCapture::Full) {
                Ok(_) => { let _ = render_to_string(&ev); }
                Err(DecodeError::EndOfStream) => break,
                Err(_) => break,
            }
        }
    }

    #[test]
    fn decode_is_deterministic(
        body in proptest::collection::vec(any::<u8>(), 0..256),
        event_type in any::<u16>(),
    ) {
        let bytes = RecordBuilder::new(event_type).raw(&body).build();
        let run = || {
            let mut reader = BsmReader::new(&bytes[..], config());
            let mut ev = AuditEvent::new();
            let res = reader.read_event(&mut ev, &EventFilter::all(), EnvCapture::Full);
            (format!("{:?}", res), ev)
        };
        let (a_res, a_ev) = run();
        let (b_res, b_ev) = run();
        prop_assert_eq!(a_res, b_res);
        prop_assert_eq!(a_ev, b_ev);
    }
}
