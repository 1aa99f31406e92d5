// Copyright 2025 eraflo
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

use log;

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Callback<T> = Box<dyn FnMut(&T) + Send>;

enum Subscriber<T> {
    Callback(Callback<T>),
    Channel(flume::Sender<T>),
}

/// An observer registry delivering each event to every subscriber.
///
/// Delivery follows registration order. Subscribers are either callbacks,
/// invoked synchronously, or flume channels, for consumers living on another
/// thread. A channel whose receiver has been dropped is pruned on the next
/// publish.
pub struct EventHub<T: Clone + Send + 'static> {
    subscribers: Vec<(SubscriptionId, Subscriber<T>)>,
    next_id: u64,
}

impl<T: Clone + Send + 'static> EventHub<T> {
    /// Creates an empty hub.
    pub fn new() -> Self {
        log::debug!("EventHub initialized.");
        Self {
            subscribers: Vec::new(),
            next_id: 0,
        }
    }

    fn allocate_id(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Registers a callback subscriber.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&T) + Send + 'static,
    {
        let id = self.allocate_id();
        self.subscribers
            .push((id, Subscriber::Callback(Box::new(callback))));
        id
    }

    /// Registers a channel subscriber and returns its receiving end.
    pub fn subscribe_channel(&mut self) -> (SubscriptionId, flume::Receiver<T>) {
        let (sender, receiver) = flume::unbounded();
        let id = self.allocate_id();
        self.subscribers.push((id, Subscriber::Channel(sender)));
        (id, receiver)
    }

    /// Removes a subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    /// Delivers `event` to every current subscriber.
    pub fn publish(&mut self, event: &T) {
        log::trace!("Publishing an event to {} subscribers.", self.subscribers.len());

        self.subscribers.retain_mut(|(id, subscriber)| match subscriber {
            Subscriber::Callback(callback) => {
                callback(event);
                true
            }
            Subscriber::Channel(sender) => {
                if sender.send(event.clone()).is_err() {
                    log::debug!("EventHub: pruning disconnected subscriber {:?}.", id);
                    false
                } else {
                    true
                }
            }
        });
    }

    /// Delivers a batch of events in order.
    pub fn publish_all<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = T>,
    {
        for event in events {
            self.publish(&event);
        }
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Returns `true` when nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl<T: Clone + Send + 'static> Default for EventHub<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> std::fmt::Debug for EventHub<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flume::TryRecvError;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum TestEvent {
        Resized { width: u32, height: u32 },
        Shutdown,
    }

    #[test]
    fn test_callbacks_run_in_registration_order() {
        let mut hub = EventHub::<TestEvent>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            hub.subscribe(move |_| log.lock().unwrap().push(tag));
        }

        hub.publish(&TestEvent::Shutdown);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_channel_receives_events_in_order() {
        let mut hub = EventHub::<TestEvent>::new();
        let (_, receiver) = hub.subscribe_channel();

        let resized = TestEvent::Resized {
            width: 1,
            height: 1,
        };
        hub.publish_all(vec![resized.clone(), TestEvent::Shutdown]);

        assert_eq!(receiver.try_recv(), Ok(resized));
        assert_eq!(receiver.try_recv(), Ok(TestEvent::Shutdown));
        assert_eq!(receiver.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn test_unsubscribe() {
        let mut hub = EventHub::<TestEvent>::new();
        let (id, receiver) = hub.subscribe_channel();
        assert_eq!(hub.len(), 1);

        assert!(hub.unsubscribe(id));
        assert!(!hub.unsubscribe(id));
        assert!(hub.is_empty());

        hub.publish(&TestEvent::Shutdown);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_disconnected_channel_is_pruned() {
        let mut hub = EventHub::<TestEvent>::new();
        let (_, receiver) = hub.subscribe_channel();
        hub.subscribe(|_| {});
        drop(receiver);

        hub.publish(&TestEvent::Shutdown);
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn test_receive_on_another_thread() {
        let mut hub = EventHub::<TestEvent>::new();
        let (_, receiver) = hub.subscribe_channel();

        let handle = thread::spawn(move || receiver.recv_timeout(Duration::from_secs(1)));
        hub.publish(&TestEvent::Shutdown);

        let received = handle.join().expect("Thread join failed");
        assert_eq!(received, Ok(TestEvent::Shutdown));
    }
}
