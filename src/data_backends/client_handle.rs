use std::sync::Arc;
use tokio::sync::watch;

/// Process-wide handle to the current backend client
///
/// One writer publishes a new value with `replace`, any number of readers take
/// an `Arc` snapshot with `snapshot` and keep using it for the whole operation,
/// even if a refresh happens in between.
#[derive(Debug)]
pub struct ClientHandle<T> {
    current: watch::Sender<Arc<T>>,
}

impl<T> ClientHandle<T> {
    pub fn new(value: Arc<T>) -> Self {
        let (current, _) = watch::channel(value);
        ClientHandle { current }
    }

    pub fn snapshot(&self) -> Arc<T> {
        self.current.borrow().clone()
    }

    /// Publishes `value` and returns the previously active one
    pub fn replace(&self, value: Arc<T>) -> Arc<T> {
        self.current.send_replace(value)
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<T>> {
        self.current.subscribe()
    }
}
