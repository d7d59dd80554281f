//! Reactions to events.
//!
//! A [`Trigger`] receives every event a polling loop produces. The
//! provided triggers never run user code on the caller's thread. An
//! [`FnTrigger`] hands it to a [`Dispatcher`] and returns immediately, and
//! a [`BroadcastTrigger`] forwards to its sub-triggers, so a slow or
//! failing handler cannot stall the poller.

use std::fmt;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use smallvec::SmallVec;
use watchit_core::Event;

use crate::dispatch::{Dispatcher, panic_message};

/// Something that reacts to events.
///
/// Events are shared immutably: the same `Arc<Event>` may be handed to
/// many triggers concurrently. Implementations must return promptly and
/// must not panic across this boundary.
pub trait Trigger: Send + Sync + 'static {
    /// Handles one event.
    fn on_event(&self, event: Arc<Event>);
}

impl<T: Trigger + ?Sized> Trigger for Arc<T> {
    fn on_event(&self, event: Arc<Event>) {
        (**self).on_event(event);
    }
}

impl<T: Trigger + ?Sized> Trigger for Box<T> {
    fn on_event(&self, event: Arc<Event>) {
        (**self).on_event(event);
    }
}

/// Runs a callback for every event, fire-and-forget.
///
/// # Examples
///
/// ```
/// use watchit_watcher::{Dispatcher, FnTrigger};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), watchit_watcher::SchedulerError> {
/// let trigger = FnTrigger::new(Dispatcher::current(16)?, |event: &watchit_core::Event| {
///     println!("{} fields changed", event.len());
/// });
/// # let _ = trigger;
/// # Ok(())
/// # }
/// ```
pub struct FnTrigger<F> {
    dispatcher: Dispatcher,
    handler: Arc<F>,
}

impl<F> FnTrigger<F>
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    /// Wraps `handler`, running it through `dispatcher`.
    pub fn new(dispatcher: Dispatcher, handler: F) -> Self {
        Self {
            dispatcher,
            handler: Arc::new(handler),
        }
    }
}

impl<F> fmt::Debug for FnTrigger<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTrigger")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl<F> Trigger for FnTrigger<F>
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    fn on_event(&self, event: Arc<Event>) {
        let handler = Arc::clone(&self.handler);
        self.dispatcher.spawn(move || handler(&event));
    }
}

/// Fans each event out to a flat list of sub-triggers.
///
/// Every sub-trigger receives the same `Arc<Event>` through its own
/// `on_event`, so each one keeps its own dispatch policy: an [`FnTrigger`]
/// still runs its handler on its dispatcher and returns at once. The
/// broadcast takes no dispatch permit of its own. A sub-trigger that panics
/// is contained and its siblings still receive the event.
pub struct BroadcastTrigger {
    triggers: SmallVec<[Arc<dyn Trigger>; 4]>,
}

impl BroadcastTrigger {
    /// Creates a broadcast over `triggers`.
    pub fn new(triggers: impl IntoIterator<Item = Arc<dyn Trigger>>) -> Self {
        Self {
            triggers: triggers.into_iter().collect(),
        }
    }

    /// Adds a sub-trigger.
    #[must_use]
    pub fn with(mut self, trigger: impl Trigger) -> Self {
        self.triggers.push(Arc::new(trigger));
        self
    }

    /// Returns the number of sub-triggers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    /// Returns `true` if there are no sub-triggers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }
}

impl fmt::Debug for BroadcastTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastTrigger")
            .field("triggers", &self.triggers.len())
            .finish_non_exhaustive()
    }
}

impl Trigger for BroadcastTrigger {
    fn on_event(&self, event: Arc<Event>) {
        for trigger in &self.triggers {
            deliver(trigger.as_ref(), Arc::clone(&event));
        }
    }
}

/// Hands `event` to `trigger`, containing any panic.
pub(crate) fn deliver(trigger: &dyn Trigger, event: Arc<Event>) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| trigger.on_event(event))) {
        tracing::error!(panic = panic_message(payload.as_ref()), "Trigger panicked");
    }
}

/// Where a text report of an event goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportTarget {
    /// One JSON line per event on standard output.
    #[default]
    Stdout,
    /// One `info` record per event through `tracing`.
    Log,
}

impl ReportTarget {
    /// Parses a target name, `None` if unknown.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "stdout" => Some(Self::Stdout),
            "log" => Some(Self::Log),
            _ => None,
        }
    }

    /// Returns the target name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Log => "log",
        }
    }

    /// Writes a report of `event`.
    pub fn report(self, event: &Event) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(error) => {
                tracing::warn!(error = %error, "Cannot serialize event");
                return;
            }
        };
        match self {
            Self::Stdout => {
                let mut stdout = std::io::stdout().lock();
                if let Err(error) = writeln!(stdout, "{line}") {
                    tracing::warn!(error = %error, "Cannot write event to stdout");
                }
            }
            Self::Log => tracing::info!(event = %line, "Watch event"),
        }
    }

    /// Builds a trigger reporting every event to this target.
    pub fn trigger(self, dispatcher: Dispatcher) -> impl Trigger {
        FnTrigger::new(dispatcher, move |event: &Event| self.report(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;
    use watchit_core::keys;

    /// Records the events it receives.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Arc<Event>>>,
    }

    impl Trigger for Recorder {
        fn on_event(&self, event: Arc<Event>) {
            self.seen.lock().push(event);
        }
    }

    struct Exploding;

    impl Trigger for Exploding {
        fn on_event(&self, _event: Arc<Event>) {
            panic!("sub-trigger failed");
        }
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !done() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    fn sample_event() -> Arc<Event> {
        let mut event = Event::new();
        event.insert(keys::FILE_NAME, "/tmp/watched");
        Arc::new(event)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_fn_trigger_runs_handler() {
        let dispatcher = Dispatcher::current(4).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let trigger = FnTrigger::new(dispatcher, move |event: &Event| {
            sink.lock().push(event.get_str(keys::FILE_NAME).map(str::to_owned));
        });

        trigger.on_event(sample_event());

        wait_until(|| seen.lock().len() == 1).await;
        assert_eq!(seen.lock()[0].as_deref(), Some("/tmp/watched"));
    }

    #[test]
    fn test_broadcast_delivers_same_event_despite_failing_sibling() {
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());

        let broadcast = BroadcastTrigger::new([
            Arc::clone(&first) as Arc<dyn Trigger>,
            Arc::new(Exploding),
            Arc::clone(&second) as Arc<dyn Trigger>,
        ]);
        assert_eq!(broadcast.len(), 3);

        let event = sample_event();
        broadcast.on_event(Arc::clone(&event));

        assert_eq!(first.seen.lock().len(), 1);
        assert_eq!(second.seen.lock().len(), 1);
        assert!(Arc::ptr_eq(&first.seen.lock()[0], &event));
        assert!(Arc::ptr_eq(&second.seen.lock()[0], &event));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_broadcast_over_fn_triggers_with_single_permit() {
        let dispatcher = Dispatcher::current(1).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let broadcast = BroadcastTrigger::new(std::iter::empty()).with(FnTrigger::new(
            dispatcher.clone(),
            move |event: &Event| sink.lock().push(event.clone()),
        ));

        for _ in 0..5 {
            broadcast.on_event(sample_event());
            wait_until(|| dispatcher.in_flight() == 0).await;
        }

        wait_until(|| seen.lock().len() == 5).await;
        let stats = dispatcher.stats();
        assert_eq!(stats.dispatched, 5);
        assert_eq!(stats.dropped, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_broadcast_siblings_each_take_one_permit() {
        let dispatcher = Dispatcher::current(2).unwrap();
        let first = Arc::new(Mutex::new(0_usize));
        let second = Arc::new(Mutex::new(0_usize));
        let (a, b) = (Arc::clone(&first), Arc::clone(&second));
        let broadcast = BroadcastTrigger::new(std::iter::empty())
            .with(FnTrigger::new(dispatcher.clone(), move |_: &Event| *a.lock() += 1))
            .with(FnTrigger::new(dispatcher.clone(), move |_: &Event| *b.lock() += 1));

        for _ in 0..5 {
            broadcast.on_event(sample_event());
            wait_until(|| dispatcher.in_flight() == 0).await;
        }

        wait_until(|| *first.lock() == 5 && *second.lock() == 5).await;
        assert_eq!(dispatcher.stats().dropped, 0);
    }

    #[test]
    fn test_empty_broadcast_is_noop() {
        let broadcast = BroadcastTrigger::new(std::iter::empty());
        assert!(broadcast.is_empty());
        broadcast.on_event(sample_event());
    }

    #[test]
    fn test_report_target_names() {
        assert_eq!(ReportTarget::from_name("stdout"), Some(ReportTarget::Stdout));
        assert_eq!(ReportTarget::from_name("log"), Some(ReportTarget::Log));
        assert_eq!(ReportTarget::from_name("email"), None);
        assert_eq!(ReportTarget::Log.name(), "log");
    }
}
