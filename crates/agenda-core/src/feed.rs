use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument, trace};
use uuid::Uuid;

use crate::event::CalendarEvent;

type Callback = Box<dyn FnMut(&Arc<[CalendarEvent]>)>;

/// Handle returned by [`EventFeed::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(Uuid);

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Push source of event snapshots.
///
/// The host owns one feed and passes it where it is needed. Publishing always
/// replaces the snapshot, but subscribers only hear about it while the feed is
/// open.
#[derive(Default)]
pub struct EventFeed {
    open: bool,
    snapshot: Arc<[CalendarEvent]>,
    subscribers: Vec<(Subscription, Callback)>,
}

impl fmt::Debug for EventFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventFeed")
            .field("open", &self.open)
            .field("events", &self.snapshot.len())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl EventFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self) {
        if !self.open {
            debug!("event feed opened");
        }
        self.open = true;
    }

    pub fn close(&mut self) {
        if self.open {
            debug!("event feed closed");
        }
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn subscribe<F>(&mut self, callback: F) -> Subscription
    where
        F: FnMut(&Arc<[CalendarEvent]>) + 'static,
    {
        let subscription = Subscription(Uuid::new_v4());
        self.subscribers.push((subscription, Box::new(callback)));
        debug!(%subscription, subscribers = self.subscribers.len(), "subscribed");
        subscription
    }

    /// Returns false when the subscription was already gone.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(id, _)| *id != subscription);
        let removed = self.subscribers.len() != before;
        debug!(%subscription, removed, "unsubscribed");
        removed
    }

    #[instrument(skip(self, events))]
    pub fn publish(&mut self, events: Vec<CalendarEvent>) {
        self.snapshot = Arc::from(events);

        if !self.open {
            trace!(events = self.snapshot.len(), "feed closed; snapshot stored without notify");
            return;
        }

        for (_, callback) in &mut self.subscribers {
            callback(&self.snapshot);
        }
        debug!(
            events = self.snapshot.len(),
            subscribers = self.subscribers.len(),
            "snapshot published"
        );
    }

    pub fn snapshot(&self) -> Arc<[CalendarEvent]> {
        Arc::clone(&self.snapshot)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use chrono::NaiveDateTime;

    use super::EventFeed;
    use crate::event::CalendarEvent;

    fn event(id: i64) -> CalendarEvent {
        let at = NaiveDateTime::parse_from_str("2024-06-10 09:00", "%Y-%m-%d %H:%M")
            .expect("valid datetime");
        CalendarEvent {
            id,
            title: format!("event {id}"),
            start: at,
            end: at,
            color: None,
            description: String::new(),
            location: String::new(),
            tag: None,
            participants: vec![],
            attachments: vec![],
            is_all_day: false,
            is_openable: true,
        }
    }

    #[test]
    fn subscribers_hear_publishes_only_while_open() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut feed = EventFeed::new();
        let sink = Rc::clone(&seen);
        feed.subscribe(move |events| sink.borrow_mut().push(events.len()));

        feed.publish(vec![event(1)]);
        assert!(seen.borrow().is_empty());
        assert_eq!(feed.snapshot().len(), 1);

        feed.open();
        feed.publish(vec![event(1), event(2)]);
        feed.close();
        feed.publish(vec![]);

        assert_eq!(*seen.borrow(), vec![2]);
        assert!(feed.snapshot().is_empty());
        assert!(!feed.is_open());
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let count = Rc::new(RefCell::new(0));
        let mut feed = EventFeed::new();
        feed.open();

        let sink = Rc::clone(&count);
        let sub = feed.subscribe(move |_| *sink.borrow_mut() += 1);
        feed.publish(vec![event(1)]);

        assert!(feed.unsubscribe(sub));
        assert!(!feed.unsubscribe(sub));
        feed.publish(vec![event(2)]);

        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn each_subscription_gets_a_distinct_handle() {
        let mut feed = EventFeed::new();
        let a = feed.subscribe(|_| {});
        let b = feed.subscribe(|_| {});
        assert_ne!(a, b);
    }
}
