//! The pool of running virtual users, resized at every scheduler checkpoint.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

use crate::config::Configuration;
use crate::metrics::Metric;
use crate::scenario::Scenario;
use crate::user::{self, UserCommand, VirtualUser};
use crate::LoadTestError;

/// Everything needed to launch another virtual user.
#[derive(Debug, Clone)]
pub(crate) struct UserTemplate {
    pub(crate) scenario: Scenario,
    pub(crate) pause: (Duration, Duration),
    pub(crate) base_url: Url,
    pub(crate) configuration: Arc<Configuration>,
    pub(crate) metrics_tx: flume::Sender<Metric>,
    pub(crate) started: Instant,
}

// A running virtual user.
#[derive(Debug)]
struct UserHandle {
    number: usize,
    sender: flume::Sender<UserCommand>,
    handle: JoinHandle<()>,
}

#[derive(Debug)]
pub(crate) struct UserPool {
    template: UserTemplate,
    active: Vec<UserHandle>,
    // Users told to exit that may still be finishing an iteration.
    retiring: Vec<JoinHandle<()>>,
    // Total users launched, used to number them.
    launched: usize,
}
impl UserPool {
    pub(crate) fn new(template: UserTemplate) -> Self {
        UserPool {
            template,
            active: Vec::new(),
            retiring: Vec::new(),
            launched: 0,
        }
    }

    /// How many users are running and not retiring.
    pub(crate) fn active(&self) -> usize {
        self.active.len()
    }

    /// Launch or retire users until exactly `target` are active.
    ///
    /// The most recently launched users are retired first. Retired users finish
    /// their current iteration before exiting.
    pub(crate) fn resize(&mut self, target: usize) -> Result<(), LoadTestError> {
        while self.active.len() < target {
            self.launch()?;
        }
        while self.active.len() > target {
            if let Some(user) = self.active.pop() {
                debug!("retiring user {}", user.number);
                // The user may already have exited, nothing to do then.
                let _ = user.sender.send(UserCommand::Exit);
                self.retiring.push(user.handle);
            }
        }
        self.retiring.retain(|handle| !handle.is_finished());
        Ok(())
    }

    fn launch(&mut self) -> Result<(), LoadTestError> {
        self.launched += 1;
        let number = self.launched;
        let user = VirtualUser::new(
            number,
            self.template.base_url.clone(),
            self.template.configuration.clone(),
            self.template.metrics_tx.clone(),
            self.template.started,
        )?;
        let (sender, receiver) = flume::unbounded();
        let handle = tokio::spawn(user::user_main(
            user,
            self.template.scenario.clone(),
            self.template.pause,
            receiver,
        ));
        debug!("launched user {}", number);
        self.active.push(UserHandle {
            number,
            sender,
            handle,
        });
        Ok(())
    }

    /// Tell every user to exit, wait up to `grace_period` for in-flight iterations
    /// to finish, then abort the rest. Returns how many users were aborted.
    pub(crate) async fn shutdown(mut self, grace_period: Duration) -> usize {
        let mut handles: Vec<JoinHandle<()>> = Vec::new();
        for user in self.active.drain(..) {
            let _ = user.sender.send(UserCommand::Exit);
            handles.push(user.handle);
        }
        handles.append(&mut self.retiring);
        info!("waiting for {} users to exit", handles.len());

        let deadline = Instant::now() + grace_period;
        let results = join_all(
            handles
                .iter_mut()
                .map(|handle| tokio::time::timeout_at(deadline, handle)),
        )
        .await;

        let mut aborted = 0;
        for (handle, result) in handles.iter().zip(results) {
            match result {
                Ok(Ok(())) => (),
                Ok(Err(e)) => warn!("user exited abnormally: {}", e),
                Err(_) => {
                    handle.abort();
                    aborted += 1;
                }
            }
        }
        aborted
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scenario::IterationResult;

    async fn quick(_user: &mut VirtualUser) -> IterationResult {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(())
    }

    async fn slow(_user: &mut VirtualUser) -> IterationResult {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }

    fn pool(scenario: Scenario) -> (UserPool, flume::Receiver<Metric>) {
        let (metrics_tx, metrics_rx) = flume::unbounded();
        let template = UserTemplate {
            scenario,
            pause: (Duration::from_millis(5), Duration::from_millis(5)),
            base_url: Url::parse("http://127.0.0.1:8081").unwrap(),
            configuration: Arc::new(Configuration::default()),
            metrics_tx,
            started: Instant::now(),
        };
        (UserPool::new(template), metrics_rx)
    }

    #[tokio::test]
    async fn resize_matches_target() {
        let (mut pool, _metrics_rx) = pool(crate::scenario!("quick", quick));
        for target in [3, 5, 5, 1, 4, 0, 2] {
            pool.resize(target).unwrap();
            assert_eq!(pool.active(), target);
        }
        assert_eq!(pool.launched, 10);
        assert_eq!(pool.shutdown(Duration::from_secs(5)).await, 0);
    }

    #[tokio::test]
    async fn users_iterate_until_retired() {
        let (mut pool, metrics_rx) = pool(crate::scenario!("quick", quick));
        pool.resize(2).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        pool.resize(0).unwrap();
        assert_eq!(pool.shutdown(Duration::from_secs(5)).await, 0);

        let iterations = metrics_rx
            .drain()
            .filter(|metric| matches!(metric, Metric::Iteration(_)))
            .count();
        assert!(iterations >= 2, "only {} iterations", iterations);
    }

    #[tokio::test]
    async fn shutdown_aborts_after_grace_period() {
        let (mut pool, metrics_rx) = pool(crate::scenario!("slow", slow));
        pool.resize(3).unwrap();
        // Retiring doesn't interrupt the running iteration.
        pool.resize(1).unwrap();
        assert_eq!(pool.active(), 1);

        let started = std::time::Instant::now();
        assert_eq!(pool.shutdown(Duration::from_millis(100)).await, 3);
        assert!(started.elapsed() < Duration::from_secs(5));
        // No iteration ever completed.
        assert!(metrics_rx.is_empty());
    }
}
