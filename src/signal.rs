use log::warn;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// A listener is shared so that a dispatch can run from a snapshot of the
/// binding list while listeners add or detach bindings on the same signal.
type Listener<A> = Rc<RefCell<dyn FnMut(&A)>>;

/// Handle returned by [`Signal::add`] and [`Signal::add_once`], used to detach
/// a binding later on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId(u64);

struct Binding<A> {
    id: BindingId,
    listener: Listener<A>,
    once: bool,
}

/// Observer list broadcasting the same argument to every binding.
///
/// ELI5:
/// ┌──────────── Signal ─────────────┐
/// │ add(f)       → fires every time │
/// │ add_once(f)  → fires, detaches  │
/// │ dispatch(&a) → f(&a) for all    │
/// └─────────────────────────────────┘
///
/// Bindings fire in the order they were added. A binding added while a
/// dispatch is in progress only fires on the next dispatch.
pub struct Signal<A> {
    bindings: RefCell<Vec<Binding<A>>>,
    next_id: Cell<u64>,
}

impl<A> Signal<A> {
    pub fn new() -> Self {
        Signal {
            bindings: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    /// Adds a listener that fires on every dispatch.
    pub fn add<F>(&self, listener: F) -> BindingId
    where
        F: FnMut(&A) + 'static,
    {
        self.bind(listener, false)
    }

    /// Adds a listener that detaches itself the first time it fires.
    pub fn add_once<F>(&self, listener: F) -> BindingId
    where
        F: FnMut(&A) + 'static,
    {
        self.bind(listener, true)
    }

    fn bind<F>(&self, listener: F, once: bool) -> BindingId
    where
        F: FnMut(&A) + 'static,
    {
        let id = BindingId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let listener: Listener<A> = Rc::new(RefCell::new(listener));
        self.bindings.borrow_mut().push(Binding { id, listener, once });
        id
    }

    /// Detaches a binding. Returns false when it was already gone.
    pub fn remove(&self, id: BindingId) -> bool {
        let mut bindings = self.bindings.borrow_mut();
        match bindings.iter().position(|binding| binding.id == id) {
            Some(index) => {
                bindings.remove(index);
                true
            }
            None => false,
        }
    }

    /// Drops every binding.
    pub fn clear(&self) {
        self.bindings.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.bindings.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.borrow().is_empty()
    }

    fn contains(&self, id: BindingId) -> bool {
        self.bindings.borrow().iter().any(|binding| binding.id == id)
    }

    /// Invokes every binding with `args`.
    pub fn dispatch(&self, args: &A) {
        // snapshot first: listeners are free to add/remove bindings
        let snapshot: Vec<(BindingId, Listener<A>, bool)> = self
            .bindings
            .borrow()
            .iter()
            .map(|binding| (binding.id, binding.listener.clone(), binding.once))
            .collect();

        for (id, listener, once) in snapshot {
            // detached by an earlier listener of this same dispatch
            if !self.contains(id) {
                continue;
            }
            if once {
                self.remove(id);
            }
            match listener.try_borrow_mut() {
                Ok(mut call) => (&mut *call)(args),
                Err(_) => warn!("Signal: listener re-entered its own dispatch, skipped"),
            }
        }
    }
}

impl<A> Default for Signal<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("bindings", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<i32>>>, impl FnMut(&i32) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |value: &i32| sink.borrow_mut().push(*value))
    }

    #[test]
    fn persistent_binding_fires_on_every_dispatch() {
        let signal = Signal::new();
        let (seen, listener) = recorder();
        signal.add(listener);

        signal.dispatch(&1);
        signal.dispatch(&2);

        assert_eq!(*seen.borrow(), vec![1, 2]);
        assert_eq!(signal.len(), 1);
    }

    #[test]
    fn once_binding_detaches_after_first_fire() {
        let signal = Signal::new();
        let (seen, listener) = recorder();
        signal.add_once(listener);

        signal.dispatch(&7);
        signal.dispatch(&8);

        assert_eq!(*seen.borrow(), vec![7]);
        assert!(signal.is_empty());
    }

    #[test]
    fn bindings_fire_in_insertion_order() {
        let signal = Signal::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let order = order.clone();
            signal.add(move |_: &()| order.borrow_mut().push(tag));
        }

        signal.dispatch(&());

        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn removed_binding_no_longer_fires() {
        let signal = Signal::new();
        let (seen, listener) = recorder();
        let id = signal.add(listener);

        assert!(signal.remove(id));
        assert!(!signal.remove(id));
        signal.dispatch(&3);

        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn clear_drops_all_bindings() {
        let signal = Signal::new();
        signal.add(|_: &i32| {});
        signal.add_once(|_: &i32| {});

        signal.clear();

        assert!(signal.is_empty());
    }

    #[test]
    fn listener_added_during_dispatch_waits_for_next_dispatch() {
        let signal = Rc::new(Signal::new());
        let hits = Rc::new(Cell::new(0));

        let inner_signal = signal.clone();
        let inner_hits = hits.clone();
        signal.add_once(move |_: &()| {
            let hits = inner_hits.clone();
            inner_signal.add(move |_: &()| hits.set(hits.get() + 1));
        });

        signal.dispatch(&());
        assert_eq!(hits.get(), 0);

        signal.dispatch(&());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn binding_detached_mid_dispatch_is_skipped() {
        let signal = Rc::new(Signal::new());
        let (seen, listener) = recorder();

        let victim = Rc::new(Cell::new(None));
        let remover_signal = signal.clone();
        let remover_victim = victim.clone();
        signal.add(move |_: &i32| {
            if let Some(id) = remover_victim.get() {
                remover_signal.remove(id);
            }
        });
        victim.set(Some(signal.add(listener)));

        signal.dispatch(&5);

        assert!(seen.borrow().is_empty());
        assert_eq!(signal.len(), 1);
    }
}
