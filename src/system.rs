//! The runtime scope that owns actors, probes and test tasks.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures_core::future::BoxFuture;
use tokio::task::{AbortHandle, JoinSet};

use crate::actor::{ActorRef, ConnectionActor};
use crate::config::Config;
use crate::connection::Endpoint;
use crate::error::{Error, Result};
use crate::probe::TestProbe;

/// Setup and teardown scope for a group of tests.
///
/// Every actor created through the system runs on its own tokio task and is
/// aborted by [`TestSystem::shutdown`], or when the last clone of the system
/// is dropped.
///
/// ## Example
///
/// ```rust,ignore
/// use wsprobe::{Config, TestCase, TestSystem};
///
/// let system = TestSystem::new("echo", Config::from_env()?);
/// let report = system
///     .run_suite(vec![TestCase::new("echo", |system| async move {
///         let actor = system.connection_actor().await?;
///         let mut probe = system.probe();
///         actor.tell("Hello Server", probe.address()).await?;
///         probe.expect_msg("Hello Server").await?;
///         probe.expect_no_msg().await
///     })])
///     .await;
/// assert!(report.all_passed(), "{report}");
/// ```
#[derive(Clone)]
pub struct TestSystem {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    config: Config,
    tasks: Mutex<Vec<AbortHandle>>,
}

impl Inner {
    fn abort_all(&self) -> usize {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in &tasks {
            task.abort();
        }
        tasks.len()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.abort_all();
    }
}

impl TestSystem {
    /// Create a system whose actors and probes use `config`.
    pub fn new(name: impl Into<String>, config: Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                config,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Name used in log output.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The configuration shared by everything this system creates.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Create a probe with the configured inbox capacity and default timeouts.
    ///
    /// A zero inbox capacity is treated as one.
    #[must_use]
    pub fn probe(&self) -> TestProbe {
        let config = self.config();
        TestProbe::new(config.inbox_capacity.max(1)).with_timeouts(config.timeouts.clone())
    }

    /// Open a session to the configured URI and start an actor around it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid and
    /// `Error::Connection` if the session cannot be opened.
    pub async fn connection_actor(&self) -> Result<ActorRef> {
        self.start_actor(self.config()).await
    }

    /// Like [`TestSystem::connection_actor`], targeting `uri` instead of the
    /// configured URI.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the session cannot be opened.
    pub async fn connection_actor_for(&self, uri: &str) -> Result<ActorRef> {
        let config = Config {
            uri: uri.to_string(),
            ..self.config().clone()
        };
        self.start_actor(&config).await
    }

    async fn start_actor(&self, config: &Config) -> Result<ActorRef> {
        config.validate()?;
        let endpoint = Endpoint::open(&config.uri, config).await?;
        let (actor, task) = ConnectionActor::start(endpoint, config);
        self.register(task.abort_handle());
        tracing::debug!(system = %self.name(), actor = %actor.id(), uri = %config.uri, "actor started");
        Ok(actor)
    }

    fn register(&self, task: AbortHandle) {
        let mut tasks = self
            .inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    /// Run every case concurrently, each on its own task.
    ///
    /// An error or panic in one case is recorded in its outcome and does not
    /// affect the others. Outcomes are reported in input order.
    pub async fn run_suite(&self, cases: Vec<TestCase>) -> SuiteReport {
        tracing::info!(system = %self.name(), tests = cases.len(), "running suite");

        let mut set = JoinSet::new();
        for (index, case) in cases.into_iter().enumerate() {
            let system = self.clone();
            set.spawn(async move {
                let TestCase { name, body } = case;
                let started = Instant::now();

                let task = tokio::spawn(body(system.clone()));
                system.register(task.abort_handle());
                let result = match task.await {
                    Ok(result) => result,
                    Err(e) if e.is_panic() => Err(Error::Panicked(panic_message(e.into_panic()))),
                    Err(_) => Err(Error::Panicked("test task was cancelled".to_string())),
                };

                let outcome = TestOutcome {
                    name,
                    result,
                    elapsed: started.elapsed(),
                };
                match &outcome.result {
                    Ok(()) => tracing::info!(test = %outcome.name, elapsed = ?outcome.elapsed, "test passed"),
                    Err(e) => tracing::warn!(test = %outcome.name, error = %e, "test failed"),
                }
                (index, outcome)
            });
        }

        let mut outcomes = Vec::with_capacity(set.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(entry) => outcomes.push(entry),
                Err(e) => tracing::warn!(system = %self.name(), error = %e, "suite task lost"),
            }
        }
        outcomes.sort_by_key(|(index, _)| *index);

        let report = SuiteReport {
            outcomes: outcomes.into_iter().map(|(_, outcome)| outcome).collect(),
        };
        tracing::info!(
            system = %self.name(),
            passed = report.passed(),
            failed = report.outcomes.len() - report.passed(),
            "suite finished"
        );
        report
    }

    /// Abort every actor and test task started by this system.
    pub fn shutdown(&self) {
        let aborted = self.inner.abort_all();
        tracing::info!(system = %self.name(), tasks = aborted, "system shut down");
    }
}

impl fmt::Debug for TestSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSystem")
            .field("name", &self.inner.name)
            .field("uri", &self.inner.config.uri)
            .finish_non_exhaustive()
    }
}

type TestBody = Box<dyn FnOnce(TestSystem) -> BoxFuture<'static, Result<()>> + Send>;

/// A named test body for [`TestSystem::run_suite`].
pub struct TestCase {
    name: String,
    body: TestBody,
}

impl TestCase {
    /// Wrap an async test body. The body receives a handle to the system.
    pub fn new<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(TestSystem) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            body: Box::new(move |system| Box::pin(body(system))),
        }
    }

    /// The test name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TestCase({})", self.name)
    }
}

/// Result of one test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    /// Test name.
    pub name: String,
    /// `Ok` if the test passed.
    pub result: Result<()>,
    /// Wall time from start to completion.
    pub elapsed: Duration,
}

impl TestOutcome {
    /// Check if the test passed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of a suite, in the order the cases were given.
#[derive(Debug, Clone, Default)]
pub struct SuiteReport {
    outcomes: Vec<TestOutcome>,
}

impl SuiteReport {
    /// All outcomes.
    #[must_use]
    pub fn outcomes(&self) -> &[TestOutcome] {
        &self.outcomes
    }

    /// Look up an outcome by test name.
    #[must_use]
    pub fn outcome(&self, name: &str) -> Option<&TestOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    /// Number of passing tests.
    #[must_use]
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// The failing outcomes.
    pub fn failures(&self) -> impl Iterator<Item = &TestOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Check if every test passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(TestOutcome::is_success)
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.outcomes {
            match &outcome.result {
                Ok(()) => writeln!(f, "ok      {} ({:?})", outcome.name, outcome.elapsed)?,
                Err(e) => writeln!(f, "FAILED  {}: {e}", outcome.name)?,
            }
        }
        let passed = self.passed();
        write!(
            f,
            "{passed} passed; {} failed",
            self.outcomes.len() - passed
        )
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "non-string panic payload".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_suite_reports_in_order() {
        let system = TestSystem::new("unit", Config::default());
        let report = system
            .run_suite(vec![
                TestCase::new("slow pass", |_| async {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    Ok(())
                }),
                TestCase::new("fails", |_| async { Err(Error::Timeout(Duration::from_secs(2))) }),
                TestCase::new("fast pass", |_| async { Ok(()) }),
            ])
            .await;

        let names: Vec<_> = report.outcomes().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["slow pass", "fails", "fast pass"]);
        assert_eq!(report.passed(), 2);
        assert!(!report.all_passed());

        let failed: Vec<_> = report.failures().map(|o| o.name.as_str()).collect();
        assert_eq!(failed, ["fails"]);
    }

    async fn explode() -> Result<()> {
        panic!("kaboom")
    }

    #[tokio::test]
    async fn test_panic_is_captured() {
        let system = TestSystem::new("unit", Config::default());
        let report = system
            .run_suite(vec![
                TestCase::new("boom", |_| explode()),
                TestCase::new("fine", |_| async { Ok(()) }),
            ])
            .await;

        assert_eq!(
            report.outcome("boom").unwrap().result,
            Err(Error::Panicked("kaboom".into()))
        );
        assert!(report.outcome("fine").unwrap().is_success());
    }

    #[tokio::test]
    async fn test_probe_uses_configured_timeouts() {
        let mut config = Config::default();
        config.timeouts.no_message = Duration::from_millis(10);
        let system = TestSystem::new("unit", config);

        let mut probe = system.probe();
        probe.expect_no_msg().await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_failure_returned() {
        let system = TestSystem::new("unit", Config::default());
        let err = system.connection_actor_for("http://nowhere").await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }

    #[tokio::test]
    async fn test_zero_capacities_do_not_panic() {
        let config = Config::new("ws://127.0.0.1:1/")
            .with_mailbox_capacity(0)
            .with_inbox_capacity(0);
        let system = TestSystem::new("unit", config);

        let err = system.connection_actor().await.unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("mailbox_capacity")));

        let mut unit = system.probe();
        unit
            .expect_no_message(Duration::from_millis(10))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_aborts_test_tasks() {
        let system = TestSystem::new("unit", Config::default());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let runner = system.clone();
        let suite = tokio::spawn(async move {
            runner
                .run_suite(vec![TestCase::new("hangs", move |_| async move {
                    let _tx = tx;
                    std::future::pending::<Result<()>>().await
                })])
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        system.shutdown();

        let report = suite.await.unwrap();
        assert_eq!(
            report.outcome("hangs").unwrap().result,
            Err(Error::Panicked("test task was cancelled".into()))
        );
        assert!(rx.await.is_err());
    }

    #[test]
    fn test_report_display() {
        let report = SuiteReport {
            outcomes: vec![
                TestOutcome {
                    name: "a".into(),
                    result: Ok(()),
                    elapsed: Duration::from_millis(1),
                },
                TestOutcome {
                    name: "b".into(),
                    result: Err(Error::ExtraMessage("x".into())),
                    elapsed: Duration::from_millis(1),
                },
            ],
        };
        let text = report.to_string();
        assert!(text.contains("FAILED  b: Extra message received: \"x\""));
        assert!(text.ends_with("1 passed; 1 failed"));
    }
}
