//! Log output of memoized calls, captured through `tracing-subscriber`.

use std::io::Write;
use std::sync::{Arc, Mutex};

use memoize_core::{Args, Memoize};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct MockWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for MockWriter {
    type Writer = MockWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl MockWriter {
    fn output(&self) -> String {
        String::from_utf8(self.buf.lock().unwrap().clone()).unwrap()
    }
}

fn setup_capture(filter: &str) -> (MockWriter, tracing::subscriber::DefaultGuard) {
    let writer = MockWriter {
        buf: Arc::new(Mutex::new(Vec::new())),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_writer(writer.clone())
        .with_ansi(false)
        .with_env_filter(EnvFilter::new(filter))
        .finish();

    (writer, tracing::subscriber::set_default(subscriber))
}

fn add(args: Args) -> i64 {
    args.value::<i64>(0).unwrap() + args.value::<i64>(1).unwrap()
}

#[test]
fn test_debug_mode_logs_key_and_source_at_info() {
    let (writer, _guard) = setup_capture("memoize_core=info");

    let mut memo = Memoize::new().debug(true).wrap("add", add).unwrap();
    let key = memo.key_for(&Args::new().push(1).push(2)).unwrap();
    memo.call(Args::new().push(1).push(2)).unwrap();
    memo.call(Args::new().push(1).push(2)).unwrap();

    let output = writer.output();
    let calls: Vec<&str> = output
        .lines()
        .filter(|line| line.contains("memoized call"))
        .collect();

    assert_eq!(calls.len(), 2, "output was:\n{}", output);
    assert!(calls[0].contains("source=function"));
    assert!(calls[1].contains("source=memory"));
    assert!(calls.iter().all(|line| line.contains(&key)));
}

#[test]
fn test_calls_are_quiet_at_info_without_debug_mode() {
    let (writer, _guard) = setup_capture("memoize_core=info");

    let mut memo = Memoize::new().wrap("add", add).unwrap();
    memo.call(Args::new().push(1).push(2)).unwrap();
    memo.clear().unwrap();

    let output = writer.output();
    assert!(!output.contains("memoized call"), "output was:\n{}", output);
    assert!(output.contains("memoization cache cleared"));
    assert!(output.contains("function=add"));
}

#[test]
fn test_calls_are_visible_at_debug_level() {
    let (writer, _guard) = setup_capture("memoize_core=debug");

    let temp_dir = tempfile::tempdir().unwrap();
    let mut memo = Memoize::new()
        .persistent(true)
        .folder(temp_dir.path().join("memo"))
        .wrap("add", add)
        .unwrap();
    memo.call(Args::new().push(3).push(4)).unwrap();

    let output = writer.output();
    assert!(output.contains("memoized function created"));
    assert!(output.contains("persisted cache entry"));
    assert!(output.contains("source=function"));
}
