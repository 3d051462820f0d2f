//! Change notification.
//!
//! A node owns a `Listeners` set. Every change to the node is emitted as
//! an `Event` carrying the path of the change, and forwarded to each
//! listener whose registration pattern matches it. Listeners are held
//! weakly; dead ones are dropped on the next emit.

use super::path::Path;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

#[derive(Clone, Debug, PartialEq)]
pub enum EventKind {
    ValueChanged,
    /// An element was inserted into the list at the event's path.
    ItemInserted(usize),
    ItemRemoved(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub path: Path,
}

impl Event {
    pub fn value_changed(path: Path) -> Event {
        Event { kind: EventKind::ValueChanged, path }
    }
}

pub trait Listener {
    /// Receives an event. The path is relative to the concrete part of
    /// the pattern the listener registered with.
    fn receive(&self, event: &Event);
}

struct Registration {
    listener: Weak<dyn Listener>,
    pattern: Path,
}

#[derive(Default)]
pub struct Listeners {
    registrations: RefCell<Vec<Registration>>,
}

impl Listeners {
    pub fn new() -> Listeners {
        Listeners::default()
    }

    /// Registers `listener` for events at paths matching `pattern` (or
    /// below them).
    pub fn register<L: Listener + 'static>(&self, listener: &Rc<L>, pattern: Path) {
        let listener: Rc<dyn Listener> = listener.clone();
        self.registrations.borrow_mut().push(Registration {
            listener: Rc::downgrade(&listener),
            pattern,
        });
    }

    /// Removes every registration of `listener`.
    pub fn unregister<L: Listener + 'static>(&self, listener: &Rc<L>) {
        let target = Rc::as_ptr(listener) as *const ();
        self.registrations.borrow_mut()
            .retain(|r| r.listener.as_ptr() as *const () != target);
    }

    pub fn len(&self) -> usize {
        self.registrations.borrow().len()
    }

    pub fn emit(&self, event: &Event) {
        // Deliver from a snapshot so listeners may register or
        // unregister while handling the event.
        let live: Vec<(Rc<dyn Listener>, Path)> = {
            let mut registrations = self.registrations.borrow_mut();
            registrations.retain(|r| r.listener.strong_count() > 0);
            registrations.iter()
                .filter_map(|r| Some((r.listener.upgrade()?, r.pattern.clone())))
                .collect()
        };
        trace!("event {:?} at {} to {} listeners", event.kind, event.path, live.len());
        for (listener, pattern) in live {
            if let Some(path) = pattern.relative(&event.path) {
                listener.receive(&Event { kind: event.kind.clone(), path });
            }
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// Records everything it receives.
    #[derive(Default)]
    pub struct Recorder {
        pub events: RefCell<Vec<Event>>,
    }

    impl Listener for Recorder {
        fn receive(&self, event: &Event) {
            self.events.borrow_mut().push(event.clone());
        }
    }

    #[test]
    fn wildcard_listener_sees_index() {
        let listeners = Listeners::new();
        let recorder = Rc::new(Recorder::default());
        listeners.register(&recorder, Path::root().child("materials").any());

        let at = Path::root().child("materials").index(3).child("name");
        listeners.emit(&Event::value_changed(at));
        listeners.emit(&Event::value_changed(Path::root().child("textures").index(0)));

        let events = recorder.events.borrow();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path, Path::root().index(3).child("name"));
    }

    #[test]
    fn dead_listeners_are_dropped() {
        let listeners = Listeners::new();
        let recorder = Rc::new(Recorder::default());
        listeners.register(&recorder, Path::root());
        assert_eq!(listeners.len(), 1);
        drop(recorder);
        listeners.emit(&Event::value_changed(Path::root().child("x")));
        assert_eq!(listeners.len(), 0);
    }

    #[test]
    fn unregister() {
        let listeners = Listeners::new();
        let a = Rc::new(Recorder::default());
        let b = Rc::new(Recorder::default());
        listeners.register(&a, Path::root());
        listeners.register(&b, Path::root());
        listeners.unregister(&a);
        listeners.emit(&Event { kind: EventKind::ItemRemoved(2), path: Path::root().child("textures") });
        assert!(a.events.borrow().is_empty());
        assert_eq!(b.events.borrow()[0].kind, EventKind::ItemRemoved(2));
    }
}
