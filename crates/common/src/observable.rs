//! One-to-many notification primitive.
//!
//! An [`Observable`] keeps an ordered list of subscribers and hands every
//! payload passed to [`Observable::notify`] to each of them in subscription
//! order, synchronously, on the calling task. Duplicate subscriptions are
//! allowed and are invoked once per subscription.
//!
//! Each invocation is isolated: a subscriber that returns an error or panics
//! is recorded in the [`NotifyReport`] and the remaining subscribers still run.

use std::{
    any::Any,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, RwLock},
};

use {
    anyhow::Result,
    serde::Serialize,
    tracing::{debug, warn},
};

// ── Subscriber trait ────────────────────────────────────────────────────────

/// Receives payloads broadcast by an [`Observable`].
pub trait Subscriber<T>: Send + Sync {
    /// A human-readable name used in failure reports and logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Handle one notification.
    fn on_notify(&self, payload: &T) -> Result<()>;
}

/// Shared handle to a subscriber. Unsubscribing compares handles by pointer.
pub type SubscriberRef<T> = Arc<dyn Subscriber<T>>;

/// Build a named subscriber handle from a closure.
pub fn subscriber_fn<T, F>(name: impl Into<String>, f: F) -> SubscriberRef<T>
where
    T: 'static,
    F: Fn(&T) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(Named {
        name: name.into(),
        f,
    })
}

struct Named<F> {
    name: String,
    f: F,
}

impl<T, F> Subscriber<T> for Named<F>
where
    F: Fn(&T) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_notify(&self, payload: &T) -> Result<()> {
        (self.f)(payload)
    }
}

// ── NotifyReport ────────────────────────────────────────────────────────────

/// A subscriber that failed during a single [`Observable::notify`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotifyFailure {
    /// Position of the subscriber in the list at the time of the call.
    pub index: usize,
    pub subscriber: String,
    pub message: String,
    pub panicked: bool,
}

/// Outcome of one [`Observable::notify`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotifyReport {
    /// Number of subscribers invoked (including failed ones).
    pub invoked: usize,
    pub failures: Vec<NotifyFailure>,
}

impl NotifyReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    #[must_use]
    pub fn delivered(&self) -> usize {
        self.invoked - self.failures.len()
    }
}

// ── Observable ──────────────────────────────────────────────────────────────

/// Ordered list of subscribers with synchronous, isolated broadcast.
pub struct Observable<T> {
    subscribers: RwLock<Vec<SubscriberRef<T>>>,
}

impl<T> Observable<T> {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Append a subscriber. The same handle may be subscribed more than once.
    pub fn subscribe(&self, subscriber: SubscriberRef<T>) {
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subs.push(subscriber);
        debug!(
            subscriber = subs.last().map(|s| s.name()).unwrap_or_default(),
            count = subs.len(),
            "subscriber added"
        );
    }

    /// Wrap a closure, subscribe it, and return the handle for [`Self::unsubscribe`].
    pub fn subscribe_fn<F>(&self, name: impl Into<String>, f: F) -> SubscriberRef<T>
    where
        F: Fn(&T) -> Result<()> + Send + Sync + 'static,
        T: 'static,
    {
        let subscriber = subscriber_fn(name, f);
        self.subscribe(Arc::clone(&subscriber));
        subscriber
    }

    /// Remove every occurrence of `subscriber`. Unknown handles are ignored.
    pub fn unsubscribe(&self, subscriber: &SubscriberRef<T>) {
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        let before = subs.len();
        subs.retain(|s| !same_subscriber(s, subscriber));
        debug!(
            subscriber = subscriber.name(),
            removed = before - subs.len(),
            "subscriber removed"
        );
    }

    pub fn len(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Invoke every subscriber, in order, with `payload`.
    ///
    /// Iterates a snapshot of the list, so subscribers may subscribe or
    /// unsubscribe from inside their handler; changes apply to the next call.
    pub fn notify(&self, payload: &T) -> NotifyReport {
        let snapshot: Vec<SubscriberRef<T>> = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let mut report = NotifyReport {
            invoked: snapshot.len(),
            failures: Vec::new(),
        };

        for (index, subscriber) in snapshot.iter().enumerate() {
            let outcome = catch_unwind(AssertUnwindSafe(|| subscriber.on_notify(payload)));
            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => NotifyFailure {
                    index,
                    subscriber: subscriber.name().to_string(),
                    message: format!("{e:#}"),
                    panicked: false,
                },
                Err(panic) => NotifyFailure {
                    index,
                    subscriber: subscriber.name().to_string(),
                    message: panic_message(panic.as_ref()),
                    panicked: true,
                },
            };
            warn!(
                subscriber = %failure.subscriber,
                panicked = failure.panicked,
                error = %failure.message,
                "subscriber failed"
            );
            report.failures.push(failure);
        }

        debug!(
            invoked = report.invoked,
            failed = report.failures.len(),
            "notification delivered"
        );
        report
    }
}

impl<T> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("subscribers", &self.len())
            .finish()
    }
}

fn same_subscriber<T>(a: &SubscriberRef<T>, b: &SubscriberRef<T>) -> bool {
    // Compare data pointers only; vtable pointers for the same type may differ
    // across codegen units.
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "subscriber panicked".to_string()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn recorder(
        log: &Arc<Mutex<Vec<String>>>,
        tag: &'static str,
    ) -> impl Fn(&u32) -> Result<()> + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |x: &u32| {
            log.lock().unwrap().push(format!("{tag}:{x}"));
            Ok(())
        }
    }

    #[test]
    fn notifies_in_subscription_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let observable = Observable::<u32>::new();
        observable.subscribe_fn("a", recorder(&log, "a"));
        observable.subscribe_fn("b", recorder(&log, "b"));
        observable.subscribe_fn("c", recorder(&log, "c"));

        let report = observable.notify(&7);

        assert_eq!(*log.lock().unwrap(), vec!["a:7", "b:7", "c:7"]);
        assert_eq!(report.invoked, 3);
        assert!(report.is_clean());
    }

    #[test]
    fn unsubscribe_removes_only_matching_handle() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let observable = Observable::<u32>::new();
        let f = observable.subscribe_fn("f", recorder(&log, "f"));
        observable.subscribe_fn("g", recorder(&log, "g"));

        observable.unsubscribe(&f);
        observable.notify(&1);

        assert_eq!(*log.lock().unwrap(), vec!["g:1"]);
    }

    #[test]
    fn duplicate_subscription_invoked_twice_and_removed_together() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let observable = Observable::<u32>::new();
        let f = subscriber_fn("f", recorder(&log, "f"));
        observable.subscribe(Arc::clone(&f));
        observable.subscribe(Arc::clone(&f));

        observable.notify(&2);
        assert_eq!(*log.lock().unwrap(), vec!["f:2", "f:2"]);

        observable.unsubscribe(&f);
        assert!(observable.is_empty());
    }

    #[test]
    fn unsubscribe_unknown_is_noop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let observable = Observable::<u32>::new();
        observable.subscribe_fn("a", recorder(&log, "a"));
        let stranger = subscriber_fn("x", recorder(&log, "x"));

        observable.unsubscribe(&stranger);

        assert_eq!(observable.len(), 1);
    }

    #[test]
    fn failing_subscribers_do_not_stop_delivery() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let observable = Observable::<u32>::new();
        observable.subscribe_fn("erroring", |_: &u32| anyhow::bail!("no details"));
        observable.subscribe_fn("panicking", |_: &u32| -> Result<()> {
            panic!("widget exploded")
        });
        observable.subscribe_fn("last", recorder(&log, "last"));

        let report = observable.notify(&3);

        assert_eq!(*log.lock().unwrap(), vec!["last:3"]);
        assert_eq!(report.invoked, 3);
        assert_eq!(report.delivered(), 1);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].subscriber, "erroring");
        assert_eq!(report.failures[0].message, "no details");
        assert!(!report.failures[0].panicked);
        assert_eq!(report.failures[1].subscriber, "panicking");
        assert_eq!(report.failures[1].message, "widget exploded");
        assert!(report.failures[1].panicked);
    }

    #[test]
    fn subscribe_during_notify_applies_next_time() {
        let observable = Arc::new(Observable::<u32>::new());
        let calls = Arc::new(Mutex::new(0u32));
        let inner = Arc::clone(&observable);
        let counter = Arc::clone(&calls);
        observable.subscribe_fn("adder", move |_: &u32| {
            let counter = Arc::clone(&counter);
            inner.subscribe_fn("late", move |_: &u32| {
                *counter.lock().unwrap() += 1;
                Ok(())
            });
            Ok(())
        });

        let first = observable.notify(&0);
        assert_eq!(first.invoked, 1);
        assert_eq!(*calls.lock().unwrap(), 0);

        observable.notify(&0);
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn late_subscriber_gets_no_replay() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let observable = Observable::<u32>::new();
        observable.notify(&9);
        observable.subscribe_fn("late", recorder(&log, "late"));
        assert!(log.lock().unwrap().is_empty());
    }
}
