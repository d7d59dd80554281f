//! The [`Watch`] capability.

use std::fmt;

use watchit_core::Event;

/// Something that can be observed for state changes.
///
/// Each call compares the current state of the target with the state seen
/// by the previous call. `None` means nothing changed worth reporting; it is
/// not an error. Transient failures are logged by the implementation and
/// also reported as `None`, leaving the baseline untouched.
///
/// Observing takes `&mut self`: a watch's successive observations are
/// sequential by construction, and a watch is owned by exactly one polling
/// loop.
///
/// Implementations may block (file stat, HTTP request, kernel reads).
///
/// # Examples
///
/// ```
/// use watchit_core::Event;
/// use watchit_watches::Watch;
///
/// #[derive(Debug, Default)]
/// struct Counter {
///     calls: u32,
/// }
///
/// impl Watch for Counter {
///     fn observe(&mut self) -> Option<Event> {
///         self.calls += 1;
///         (self.calls % 2 == 0).then(Event::new)
///     }
///
///     fn kind(&self) -> &'static str {
///         "counter"
///     }
/// }
///
/// let mut watch = Counter::default();
/// assert!(watch.observe().is_none());
/// assert!(watch.observe().is_some());
/// ```
pub trait Watch: fmt::Debug + Send + 'static {
    /// Observes the target, returning an event if its state changed.
    fn observe(&mut self) -> Option<Event>;

    /// Short name of the watch family, used in logs.
    fn kind(&self) -> &'static str;
}

impl<W: Watch + ?Sized> Watch for Box<W> {
    fn observe(&mut self) -> Option<Event> {
        (**self).observe()
    }

    fn kind(&self) -> &'static str {
        (**self).kind()
    }
}
