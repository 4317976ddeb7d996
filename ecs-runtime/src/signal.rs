// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Typed publish/subscribe channel
//!
//! A [`Signal`] keeps an ordered list of listeners and notifies each of them
//! on [`Signal::dispatch`]. Dispatch walks a snapshot taken at the start of
//! the call, so listeners may add or remove listeners (themselves included)
//! while being notified without disturbing the current round.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Receives objects dispatched through a [`Signal`]
pub trait Listener<T> {
    /// Called once per dispatch with the signal and the dispatched object
    fn receive(&self, signal: &Signal<T>, object: &T);
}

impl<T, F> Listener<T> for F
where
    F: Fn(&Signal<T>, &T),
{
    fn receive(&self, signal: &Signal<T>, object: &T) {
        self(signal, object)
    }
}

/// Ordered set of listeners notified on dispatch
pub struct Signal<T> {
    listeners: RefCell<Vec<Rc<dyn Listener<T>>>>,
}

impl<T> Signal<T> {
    /// Create a signal with no listeners
    pub fn new() -> Self {
        Signal {
            listeners: RefCell::new(Vec::new()),
        }
    }

    /// Append a listener. The same listener may be added more than once and
    /// is then notified once per registration.
    pub fn add(&self, listener: Rc<dyn Listener<T>>) {
        self.listeners.borrow_mut().push(listener);
    }

    /// Remove the first registration of `listener`, compared by identity.
    ///
    /// Returns `false` if the listener was not registered.
    pub fn remove<L: Listener<T> + ?Sized>(&self, listener: &Rc<L>) -> bool {
        let target = Rc::as_ptr(listener) as *const ();
        let mut listeners = self.listeners.borrow_mut();
        match listeners
            .iter()
            .position(|l| Rc::as_ptr(l) as *const () == target)
        {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove every listener
    pub fn remove_all_listeners(&self) {
        self.listeners.borrow_mut().clear();
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Notify every listener registered at the moment of the call, in
    /// registration order.
    pub fn dispatch(&self, object: &T) {
        let snapshot: Vec<Rc<dyn Listener<T>>> = self.listeners.borrow().clone();
        for listener in snapshot {
            listener.receive(self, object);
        }
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
