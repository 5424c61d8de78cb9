use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskq::{Scheduler, SchedulerConfig, Task};

/// Shared log of task labels in invocation order.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Task that appends `label` to the log when invoked.
    pub fn task(&self, label: &str) -> Task {
        let log = Arc::clone(&self.0);
        let label = label.to_string();
        Task::new(move || log.lock().unwrap().push(label))
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, label: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|l| *l == label).count()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

pub fn scheduler(levels: usize) -> Scheduler {
    init_tracing();
    Scheduler::new(SchedulerConfig::with_levels(levels)).unwrap()
}

/// Let the paused runtime advance virtual time by `ms`.
pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("taskq=debug")
        .with_test_writer()
        .try_init();
}
