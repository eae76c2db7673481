use crossbeam::queue::ArrayQueue;
use tokio::sync::Notify;

/// Bounded FIFO between the acceptor and the worker.
///
/// `pushed` wakes a consumer waiting for an item, `popped` wakes a producer
/// waiting for a slot. `Notify` keeps a permit when nobody waits, so a wakeup
/// sent between a failed attempt and the following `.await` is not lost.
pub(crate) struct WorkQueue<T> {
    items: ArrayQueue<T>,
    pushed: Notify,
    popped: Notify,
}

impl<T> WorkQueue<T> {
    /// # Panics
    /// Panics when `capacity` is zero.
    #[track_caller]
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Queue capacity must be at least 1");

        Self {
            items: ArrayQueue::new(capacity),
            pushed: Notify::new(),
            popped: Notify::new(),
        }
    }

    /// Adds `item` if a slot is free, otherwise hands it back.
    #[inline]
    pub(crate) fn try_push(&self, item: T) -> Result<(), T> {
        self.items.push(item)?;
        self.pushed.notify_one();
        Ok(())
    }

    /// Adds `item`, waiting for a free slot.
    pub(crate) async fn push(&self, mut item: T) {
        loop {
            match self.try_push(item) {
                Ok(()) => return,
                Err(back) => item = back,
            }
            self.popped.notified().await;
        }
    }

    /// Takes the oldest item, waiting for one to arrive.
    pub(crate) async fn pop(&self) -> T {
        loop {
            if let Some(item) = self.items.pop() {
                self.popped.notify_one();
                return item;
            }
            self.pushed.notified().await;
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.items.capacity()
    }
}
