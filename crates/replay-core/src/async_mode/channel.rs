use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

// Single-threaded FIFO queue of scheduled tasks.
// Wake order is preserved, which keeps the polling order (and the whole run) deterministic.

pub(crate) struct Receiver<T> {
    queue: Rc<RefCell<VecDeque<T>>>,
}

impl<T> Receiver<T> {
    pub fn try_recv(&self) -> Option<T> {
        self.queue.borrow_mut().pop_front()
    }
}

pub(crate) struct Sender<T> {
    queue: Rc<RefCell<VecDeque<T>>>,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
        }
    }
}

impl<T> Sender<T> {
    pub fn send(&self, value: T) {
        self.queue.borrow_mut().push_back(value);
    }
}

pub(crate) fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let queue = Rc::new(RefCell::new(VecDeque::new()));
    (Sender { queue: queue.clone() }, Receiver { queue })
}
