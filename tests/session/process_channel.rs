#![cfg(unix)]

use std::time::{Duration, Instant};

use stata_engine::session::{LineChannel, ProcessChannel, TransportError};

fn read_until(channel: &mut ProcessChannel, needle: &str) -> String {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut seen = String::new();
    while !seen.contains(needle) {
        assert!(Instant::now() < deadline, "`{needle}` not seen in {seen:?}");
        match channel.read(Duration::from_millis(100)) {
            Ok(Some(text)) => seen.push_str(&text),
            Ok(None) => {}
            Err(TransportError::Closed) => break,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    seen
}

#[test]
fn shell_on_pty_runs_sent_lines() {
    let mut channel = ProcessChannel::spawn("sh", &[]).expect("sh should spawn on a pty");

    channel
        .send_line("echo result-$((40 + 2))")
        .expect("line should be written");
    let seen = read_until(&mut channel, "result-42");

    assert!(seen.contains("result-42"));
    channel.close().expect("shell should be stopped");
}

#[test]
fn pty_attaches_a_terminal() {
    let mut channel = ProcessChannel::spawn("sh", &[]).expect("sh should spawn on a pty");

    channel
        .send_line("if [ -t 0 ] && [ -t 1 ]; then echo on-a-tty; fi")
        .expect("line should be written");
    let seen = read_until(&mut channel, "on-a-tty\r\n");

    assert!(seen.contains("on-a-tty\r\n"));
    channel.close().expect("shell should be stopped");
}

#[test]
fn multibyte_character_across_read_chunks_is_kept() {
    let script = "head -c 8191 /dev/zero | tr '\\0' ' '; printf '\\303\\251END\\n'; sleep 5";
    let mut channel =
        ProcessChannel::spawn("sh", &["-c", script]).expect("sh should spawn on a pty");

    let seen = read_until(&mut channel, "END");

    assert!(seen.contains("\u{e9}END"), "output: {:?}", seen.trim_start());
    assert!(!seen.contains('\u{fffd}'));
    channel.close().expect("shell should be stopped");
}
