use crate::error::Result;
use crate::worker;
use crate::worker::WorkerReport;
use anyhow::Context as _;
use anyhow::anyhow;
use std::io::Write;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::thread;

/// Spawns a fixed number of worker threads and waits for all of them.
#[derive(Debug, Clone, Copy)]
pub struct Launcher {
    worker_count: NonZeroUsize,
}

#[derive(Debug)]
pub struct LaunchSummary {
    /// One report per worker, in spawn order.
    pub reports: Vec<WorkerReport>,
}

impl Launcher {
    #[must_use]
    pub fn new(worker_count: NonZeroUsize) -> Self {
        Self { worker_count }
    }

    /// Runs all workers, each writing to `out`, and returns once every worker has been joined.
    ///
    /// Nothing is passed to the workers other than the output sink. Each reads its own
    /// thread-local state. If a thread can't be spawned, the workers that did start are still
    /// joined before the error is returned.
    #[tracing::instrument(skip_all, name = "Launch", fields(workers = self.worker_count.get()))]
    pub fn run<W: Write + Send>(&self, out: &Mutex<W>) -> Result<LaunchSummary> {
        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.worker_count.get());
            let mut spawn_error = None;

            for index in 0..self.worker_count.get() {
                let spawned = thread::Builder::new()
                    .name(format!("tls-worker-{index}"))
                    .spawn_scoped(scope, || worker::run_worker(out));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(error) => {
                        tracing::error!(index, %error, "Failed to spawn worker thread");
                        spawn_error = Some(anyhow::Error::new(error).context(format!(
                            "Failed to spawn worker {index} of {}",
                            self.worker_count
                        )));
                        break;
                    }
                }
            }

            // Join everything before looking at any result, so that an early return can't leave a
            // thread for the scope to join.
            let outcomes: Vec<_> = handles.into_iter().map(|handle| handle.join()).collect();

            let mut reports = Vec::with_capacity(outcomes.len());
            for (index, outcome) in outcomes.into_iter().enumerate() {
                let report = outcome
                    .map_err(|_| anyhow!("Worker {index} panicked"))?
                    .with_context(|| format!("Worker {index} failed"))?;
                reports.push(report);
            }

            if let Some(error) = spawn_error {
                return Err(error);
            }

            tracing::debug!(completed = reports.len(), "All workers joined");
            Ok(LaunchSummary { reports })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::COUNTER_INITIAL;
    use crate::tls::LABEL_TEXT;
    use itertools::Itertools;

    fn launch(count: usize) -> (LaunchSummary, String) {
        let out = Mutex::new(Vec::new());
        let summary = Launcher::new(NonZeroUsize::new(count).unwrap())
            .run(&out)
            .unwrap();
        let text = String::from_utf8(out.into_inner().unwrap()).unwrap();
        (summary, text)
    }

    #[test]
    fn every_worker_starts_from_initial_value() {
        let (summary, _) = launch(5);
        assert_eq!(summary.reports.len(), 5);
        for report in &summary.reports {
            assert_eq!(report.observed_counter, COUNTER_INITIAL);
            assert_eq!(report.counter_after, COUNTER_INITIAL + 1);
            assert!(report.label.is_pristine());
        }
        assert!(summary.reports.iter().map(|r| r.thread_id).all_unique());
    }

    #[test]
    fn launching_does_not_touch_callers_counter() {
        let before = crate::tls::counter();
        launch(3);
        assert_eq!(crate::tls::counter(), before);
    }

    #[test]
    fn output_has_one_pair_per_worker() {
        let (summary, text) = launch(8);
        let lines = text.lines().collect_vec();
        assert_eq!(lines.len(), 16);

        for report in &summary.reports {
            let id = report.thread_id;
            let int_line = format!("[{id}]: int = 0x12345678");
            let str_line = format!("[{id}]: str = {LABEL_TEXT}");
            let position = lines.iter().position(|l| *l == int_line).unwrap();
            // Each worker's pair is written in one go.
            assert_eq!(lines[position + 1], str_line);
        }
    }
}
