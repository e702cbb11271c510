//! Integration tests for kiln-runtime.
//!
//! These spawn real processes. The portable tests drive `/bin/sh` as the
//! interpreter; the python test is gated behind `--ignored` since CI hosts
//! may not ship `python3`.

use kiln_runtime::frame::{self, StreamTag, HEADER_LEN};
use kiln_runtime::{ProcessRuntime, RuntimeConfig, RuntimeState};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

fn sh_config(root: &std::path::Path) -> RuntimeConfig {
    RuntimeConfig::builder()
        .interpreter("/bin/sh")
        .scratch_root(root)
        .stop_grace(Duration::from_millis(300))
        .build()
        .expect("valid test config")
}

/// Read one frame (tag + payload) from the combined channel.
async fn read_frame<R: AsyncRead + Unpin>(combined: &mut R) -> Option<(StreamTag, Vec<u8>)> {
    let mut header = [0u8; HEADER_LEN];
    combined.read_exact(&mut header).await.ok()?;
    let decoded = frame::decode_header(&header).expect("valid frame header");
    let mut payload = vec![0u8; decoded.len];
    combined.read_exact(&mut payload).await.expect("full payload");
    Some((decoded.tag, payload))
}

/// Accumulate stdout frames until `needle` has been seen.
async fn read_stdout_until<R: AsyncRead + Unpin>(combined: &mut R, needle: &str) -> String {
    let mut collected = String::new();
    while !collected.contains(needle) {
        let (tag, payload) = tokio::time::timeout(Duration::from_secs(10), read_frame(combined))
            .await
            .expect("output before timeout")
            .expect("stream ended before expected output");
        if tag == StreamTag::Stdout {
            collected.push_str(&String::from_utf8_lossy(&payload));
        }
    }
    collected
}

#[tokio::test]
async fn test_interactive_echo_lifecycle() {
    let root = tempfile::tempdir().unwrap();
    let mut runtime = ProcessRuntime::provision(
        "echo A\nread line\necho \"Hello, $line\"\n",
        sh_config(root.path()),
    )
    .await
    .unwrap();

    let mut io = runtime.start().unwrap();
    assert_eq!(runtime.state(), RuntimeState::Running);

    let first = read_stdout_until(&mut io.combined, "A").await;
    assert!(first.contains("A\n"));

    io.input.write_all(b"Bob\n").await.unwrap();
    io.input.flush().await.unwrap();

    let greeting = read_stdout_until(&mut io.combined, "Hello, Bob").await;
    assert!(greeting.contains("Hello, Bob\n"));

    // Stream ends once the script finishes.
    assert!(read_frame(&mut io.combined).await.is_none());

    runtime.stop().await.unwrap();
    assert!(!runtime.is_running());
    runtime.remove_artifact().await.unwrap();
}

#[tokio::test]
async fn test_stderr_is_framed_separately() {
    let root = tempfile::tempdir().unwrap();
    let mut runtime = ProcessRuntime::provision("echo oops 1>&2\n", sh_config(root.path()))
        .await
        .unwrap();

    let mut io = runtime.start().unwrap();

    let (tag, payload) = tokio::time::timeout(Duration::from_secs(10), read_frame(&mut io.combined))
        .await
        .expect("frame before timeout")
        .expect("one stderr frame");
    assert_eq!(tag, StreamTag::Stderr);
    assert_eq!(String::from_utf8_lossy(&payload), "oops\n");

    runtime.stop().await.unwrap();
    runtime.remove_artifact().await.unwrap();
}

#[tokio::test]
async fn test_kill_stops_runaway_process() {
    let root = tempfile::tempdir().unwrap();
    let mut runtime = ProcessRuntime::provision("sleep 600\n", sh_config(root.path()))
        .await
        .unwrap();

    let _io = runtime.start().unwrap();
    assert!(runtime.is_running());

    runtime.kill().await.unwrap();
    assert!(!runtime.is_running());
    assert_eq!(runtime.state(), RuntimeState::Stopped);

    // Idempotent.
    runtime.kill().await.unwrap();
    runtime.remove_artifact().await.unwrap();
}

#[tokio::test]
async fn test_stop_escalates_after_grace() {
    let root = tempfile::tempdir().unwrap();
    // A busy loop that ignores SIGTERM forces the escalation path; a child
    // process would die to the group signal and let the script finish.
    let mut runtime = ProcessRuntime::provision(
        "trap '' TERM\nwhile :; do :; done\n",
        sh_config(root.path()),
    )
    .await
    .unwrap();

    let mut io = runtime.start().unwrap();
    // Wait for the trap to be installed before signalling.
    tokio::time::sleep(Duration::from_millis(200)).await;

    tokio::time::timeout(Duration::from_secs(5), runtime.stop())
        .await
        .expect("stop resolves within budget")
        .unwrap();
    assert!(!runtime.is_running());

    // The combined channel reaches EOF once the process is gone.
    let mut rest = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(5), io.combined.read_to_end(&mut rest)).await;

    runtime.remove_artifact().await.unwrap();
}

#[tokio::test]
#[ignore = "requires python3 on PATH"]
async fn test_python_interactive_session() {
    let root = tempfile::tempdir().unwrap();
    let config = RuntimeConfig::builder()
        .scratch_root(root.path())
        .build()
        .unwrap();

    let mut runtime = ProcessRuntime::provision(
        "name = input('Enter your name: ')\nprint(f'Hello, {name}')\n",
        config,
    )
    .await
    .unwrap();

    let mut io = runtime.start().unwrap();

    let prompt = read_stdout_until(&mut io.combined, "Enter your name: ").await;
    assert!(prompt.ends_with("Enter your name: "));

    io.input.write_all(b"Alice\n").await.unwrap();
    io.input.flush().await.unwrap();

    let greeting = read_stdout_until(&mut io.combined, "Hello, Alice").await;
    assert!(greeting.contains("Hello, Alice"));

    runtime.stop().await.unwrap();
    runtime.remove_artifact().await.unwrap();
}
