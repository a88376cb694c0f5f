// Orbit – A bouncy ball rendering demo
// Copyright (C) 2023  Neil Roberts
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Marshals GL work onto the render thread.

use crossbeam::channel::{self, Sender, Receiver};
use crate::paint_data::PaintData;

pub type Work = Box<dyn FnOnce(&PaintData) + Send>;

/// A handle for submitting work to the render thread. Work runs in
/// submission order and always to completion. When the submitting
/// thread is itself the render thread the work runs immediately so
/// that GL code can freely call back into the queue.
#[derive(Clone)]
pub struct RenderQueue {
    sender: Sender<Work>,
}

/// The consuming end, owned by the render thread.
pub struct WorkReceiver {
    receiver: Receiver<Work>,
}

impl RenderQueue {
    pub fn new() -> (RenderQueue, WorkReceiver) {
        let (sender, receiver) = channel::unbounded();

        (RenderQueue { sender }, WorkReceiver { receiver })
    }

    pub fn run<F>(&self, work: F)
        where F: FnOnce(&PaintData) + Send + 'static
    {
        if let Some(paint_data) = PaintData::current() {
            work(&*paint_data);
            return;
        }

        if self.sender.send(Box::new(work)).is_err() {
            log::debug!("Render thread has gone away, dropping work");
        }
    }

    /// Like [`run`](RenderQueue::run) but blocks until the work has
    /// completed and returns its result. Returns `None` if the render
    /// thread went away before running it.
    pub fn run_and_wait<F, R>(&self, work: F) -> Option<R>
        where F: FnOnce(&PaintData) -> R + Send + 'static,
              R: Send + 'static
    {
        if let Some(paint_data) = PaintData::current() {
            return Some(work(&*paint_data));
        }

        let (result_sender, result_receiver) = channel::bounded(1);

        let work = move |paint_data: &PaintData| {
            let _ = result_sender.send(work(paint_data));
        };

        if self.sender.send(Box::new(work)).is_err() {
            log::debug!("Render thread has gone away, dropping work");
            return None;
        }

        result_receiver.recv().ok()
    }
}

impl WorkReceiver {
    pub fn receiver(&self) -> &Receiver<Work> {
        &self.receiver
    }

    /// Runs everything that is queued without blocking. Returns the
    /// number of items that ran.
    pub fn run_pending(&self, paint_data: &PaintData) -> usize {
        let mut n_items = 0;

        for work in self.receiver.try_iter() {
            work(paint_data);
            n_items += 1;
        }

        n_items
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use parking_lot::Mutex;
    use crate::test_gpu;

    #[test]
    fn fifo() {
        let (queue, receiver) = RenderQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let order = Arc::clone(&order);
            queue.run(move |_| order.lock().push(i));
        }

        assert!(order.lock().is_empty());

        let (paint_data, _) = test_gpu::paint_data();
        assert_eq!(receiver.run_pending(&paint_data), 5);

        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn inline_on_render_thread() {
        let (queue, receiver) = RenderQueue::new();
        let (paint_data, _) = test_gpu::paint_data();
        let _guard = paint_data.make_current();

        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);

        queue.run(move |_| ran_clone.store(true, Ordering::SeqCst));

        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(receiver.run_pending(&paint_data), 0);

        // Blocking from the render thread mustn’t deadlock
        assert_eq!(queue.run_and_wait(|_| 42), Some(42));
    }

    #[test]
    fn reentrant_submission() {
        let (queue, receiver) = RenderQueue::new();
        let (paint_data, _) = test_gpu::paint_data();
        let order = Arc::new(Mutex::new(Vec::new()));

        let inner_queue = queue.clone();
        let inner_order = Arc::clone(&order);

        queue.run(move |_| {
            inner_order.lock().push("outer");
            let inner_order = Arc::clone(&inner_order);
            inner_queue.run(move |_| inner_order.lock().push("inner"));
        });

        let _guard = paint_data.make_current();
        receiver.run_pending(&paint_data);

        assert_eq!(*order.lock(), vec!["outer", "inner"]);
    }

    #[test]
    fn wait_for_render_thread() {
        let (queue, receiver) = RenderQueue::new();

        let render_thread = std::thread::spawn(move || {
            let (paint_data, _) = test_gpu::paint_data();
            let _guard = paint_data.make_current();

            while let Ok(work) = receiver.receiver().recv() {
                work(&*paint_data);
            }
        });

        let answer = queue.run_and_wait(|paint_data| {
            PaintData::current().is_some()
                && paint_data.shaders.init_line_program()
        });

        assert_eq!(answer, Some(true));

        drop(queue);
        render_thread.join().unwrap();
    }

    #[test]
    fn render_thread_gone() {
        let (queue, receiver) = RenderQueue::new();

        drop(receiver);

        queue.run(|_| unreachable!());
        assert_eq!(queue.run_and_wait(|_| 1), None);
    }
}
