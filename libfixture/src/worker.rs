use crate::error::Result;
use crate::thread_id;
use crate::tls;
use crate::tls::Label;
use anyhow::Context as _;
use anyhow::anyhow;
use std::fmt::Write as _;
use std::io::Write;
use std::sync::Mutex;

/// Status reported by a worker that ran to completion.
pub const WORKER_SUCCESS: u32 = 0;

/// What a single worker observed on its own thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub thread_id: u64,
    pub observed_counter: u32,
    pub counter_after: u32,
    pub label: Label,
    pub status: u32,
}

/// Body of each worker thread. Prints the calling thread's counter and label, then increments its
/// counter.
///
/// Both lines are written under a single lock of `out` so that one worker's pair can't be split by
/// another worker's output. The relative order of different workers is unconstrained.
pub fn run_worker<W: Write>(out: &Mutex<W>) -> Result<WorkerReport> {
    let thread_id = thread_id::current();
    let snapshot = tls::snapshot();

    let lines = format_lines(thread_id, snapshot.counter, snapshot.label);
    {
        let mut out = out
            .lock()
            .map_err(|_| anyhow!("Output lock poisoned by another worker"))?;
        out.write_all(lines.as_bytes())
            .with_context(|| format!("Failed to write output of thread {thread_id}"))?;
        out.flush().context("Failed to flush worker output")?;
    }

    let counter_after = tls::increment_counter();
    tracing::trace!(thread_id, counter_after, "Worker done");

    Ok(WorkerReport {
        thread_id,
        observed_counter: snapshot.counter,
        counter_after,
        label: snapshot.label,
        status: WORKER_SUCCESS,
    })
}

fn format_lines(thread_id: u64, counter: u32, label: Label) -> String {
    let mut lines = String::new();
    // Writing to a String can't fail.
    let _ = writeln!(lines, "[{thread_id}]: int = {counter:#x}");
    let _ = writeln!(lines, "[{thread_id}]: str = {label}");
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::COUNTER_INITIAL;
    use crate::tls::LABEL_TEXT;
    use std::thread;

    #[test]
    fn line_format() {
        let label = thread::spawn(tls::label).join().unwrap();
        assert_eq!(
            format_lines(77, COUNTER_INITIAL, label),
            "[77]: int = 0x12345678\n[77]: str = TLS string\n"
        );
    }

    #[test]
    fn worker_prints_then_increments() {
        let out = Mutex::new(Vec::new());
        let report = thread::scope(|scope| scope.spawn(|| run_worker(&out)).join().unwrap())
            .unwrap();

        assert_eq!(report.observed_counter, COUNTER_INITIAL);
        assert_eq!(report.counter_after, COUNTER_INITIAL + 1);
        assert_eq!(report.label.as_str(), LABEL_TEXT);
        assert_eq!(report.status, WORKER_SUCCESS);

        let text = String::from_utf8(out.into_inner().unwrap()).unwrap();
        let id = report.thread_id;
        assert_eq!(
            text,
            format!("[{id}]: int = 0x12345678\n[{id}]: str = TLS string\n")
        );
    }

    #[test]
    fn running_twice_on_one_thread_sees_own_increment() {
        let out = Mutex::new(std::io::sink());
        let (first, second) = thread::spawn(move || {
            let first = run_worker(&out).unwrap();
            let second = run_worker(&out).unwrap();
            (first, second)
        })
        .join()
        .unwrap();
        assert_eq!(first.observed_counter, COUNTER_INITIAL);
        assert_eq!(second.observed_counter, COUNTER_INITIAL + 1);
    }
}
