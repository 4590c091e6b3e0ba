use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::time::sleep;
use tracing::{error, info};

use torii_broker::{GatewayResult, PauseSwitch};

/// The tick counter wraps back to 1 past this value. Purely bounds integer
/// growth; tasks only observe `count % interval`.
const MAX_COUNT: u64 = 3_600;

/// A periodic unit of work driven by the scheduler.
#[async_trait]
pub trait BatchTask: Send + Sync {
    /// Human-friendly identifier used in logs.
    fn name(&self) -> &str;

    /// Firing interval in seconds. 0 disables the task entirely.
    fn interval(&self) -> u64;

    /// Execute one run of the task.
    async fn run(&self) -> GatewayResult<()>;
}

/// True when a task of `interval` fires at tick `count`.
#[must_use]
pub fn is_due(count: u64, interval: u64) -> bool {
    interval != 0 && count % interval == 0
}

/// Second-granularity scheduler. Each cycle launches every due task
/// concurrently and waits for all of them plus a fixed one-second pacing
/// delay, so a slow task stretches the cycle but task sets never overlap.
pub struct BatchScheduler {
    tasks: Vec<Arc<dyn BatchTask>>,
    switch: PauseSwitch,
}

impl BatchScheduler {
    pub fn new(tasks: Vec<Arc<dyn BatchTask>>) -> Self {
        Self {
            tasks,
            switch: PauseSwitch::new("batch scheduler"),
        }
    }

    pub fn pause(&self) {
        self.switch.pause();
    }

    pub fn resume(&self) {
        self.switch.resume();
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.switch.is_paused()
    }

    /// Drive the tick loop for the process lifetime.
    pub async fn run(&self) {
        info!("the batch scheduler is started");
        let mut count: u64 = 0;
        loop {
            count += 1;
            if count > MAX_COUNT {
                count = 1;
            }

            if self.switch.is_paused() {
                sleep(Duration::from_secs(1)).await;
                continue;
            }

            let due: Vec<Arc<dyn BatchTask>> = self
                .tasks
                .iter()
                .filter(|task| is_due(count, task.interval()))
                .cloned()
                .collect();
            let work = join_all(due.into_iter().map(|task| async move {
                // A failing task must not take the scheduler down.
                if let Err(err) = task.run().await {
                    error!(task = task.name(), error = %err, "batch task failed");
                }
            }));
            tokio::join!(work, sleep(Duration::from_secs(1)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTask {
        interval: u64,
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BatchTask for CountingTask {
        fn name(&self) -> &str {
            "counting"
        }

        fn interval(&self) -> u64 {
            self.interval
        }

        async fn run(&self) -> GatewayResult<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn tasks_fire_exactly_on_interval_multiples() {
        for count in 1..=100 {
            assert!(!is_due(count, 0), "interval 0 must never fire");
            for interval in 1..=10 {
                assert_eq!(is_due(count, interval), count % interval == 0);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_runs_due_tasks_each_matching_tick() {
        let runs = Arc::new(AtomicUsize::new(0));
        let scheduler = Arc::new(BatchScheduler::new(vec![Arc::new(CountingTask {
            interval: 2,
            runs: runs.clone(),
        }) as Arc<dyn BatchTask>]));
        let handle = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.run().await }
        });

        // Ticks 1..=4 elapse; the task fires on 2 and 4.
        sleep(Duration::from_millis(4_500)).await;
        handle.abort();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn paused_scheduler_skips_task_evaluation() {
        let runs = Arc::new(AtomicUsize::new(0));
        let scheduler = Arc::new(BatchScheduler::new(vec![Arc::new(CountingTask {
            interval: 1,
            runs: runs.clone(),
        }) as Arc<dyn BatchTask>]));
        scheduler.pause();
        let handle = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.run().await }
        });

        sleep(Duration::from_millis(3_500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        scheduler.resume();
        sleep(Duration::from_millis(2_500)).await;
        handle.abort();
        assert!(runs.load(Ordering::SeqCst) >= 1);
    }
}
