use std::{
    thread,
    thread::JoinHandle,
    sync::{Arc, atomic::{AtomicBool, Ordering}},
};
use crossbeam_deque::{Worker as LocalQueue, Injector as GlobalQueue, Stealer};

use super::Job;

pub struct Worker {
    is_idle: Arc<AtomicBool>,
    // join handle of this worker thread
    handle: Option<JoinHandle<()>>,
    stealer: Stealer<Job>,
    local_queue: Option<LocalQueue<Job>>,
    // reference to global queue which can steal jobs from.
    global_queue: Arc<GlobalQueue<Job>>,
    name: String,
}

impl Worker {
    pub fn new(global_queue: Arc<GlobalQueue<Job>>, name: String) -> Self {
        let local_queue: LocalQueue<Job> = LocalQueue::new_fifo();

        Self {
            is_idle: Arc::new(AtomicBool::new(true)),
            handle: None,
            stealer: local_queue.stealer(),
            local_queue: Some(local_queue),
            global_queue,
            name,
        }
    }

    /// Spawn thread and begin to execute jobs from queue.
    pub fn launch(&mut self, coworkers: Vec<Stealer<Job>>, stop: Arc<AtomicBool>) -> std::io::Result<()> {
        let Some(local_queue) = self.local_queue.take() else {
            glog::warn!("{} is already launched", self.name);
            return Ok(());
        };
        let global_queue = self.global_queue.clone();
        let idle = self.is_idle.clone();
        let thread_name = self.name.clone();

        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    // try pop job from the local queue first
                    let job = local_queue.pop().or_else(|| {
                        // if no jobs in the local queue, try steal jobs from global queue
                        std::iter::repeat_with(|| {
                            global_queue.steal_batch_and_pop(&local_queue)
                                // failed to steal jobs from global queue, try steal jobs from other workers
                                .or_else(|| coworkers.iter().map(|s| s.steal()).collect())
                        })
                        .find(|s| !s.is_retry())
                        .and_then(|s| s.success())
                    });

                    match job {
                        Some(mut job) => {
                            idle.store(false, Ordering::Release);
                            job.execute();
                        }
                        None => {
                            idle.store(true, Ordering::Release);
                            thread::yield_now();
                        }
                    }
                }

                // a stolen batch belongs to this worker, run it before leaving
                while let Some(mut job) = local_queue.pop() {
                    job.execute();
                }

                idle.store(true, Ordering::Release);
                glog::trace!("{} finished", thread_name);
            })?;

        self.handle = Some(handle);
        Ok(())
    }

    /// Get a stealer from current worker thread.
    pub fn stealer(&self) -> Stealer<Job> {
        self.stealer.clone()
    }

    /// Join the worker thread. The stop flag must already be raised.
    pub fn terminate(self) {
        if let Some(handle) = self.handle {
            if handle.join().is_err() {
                glog::error!("{} had been poisoned", self.name);
            }
        }
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.is_idle.load(Ordering::Acquire)
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }
}
