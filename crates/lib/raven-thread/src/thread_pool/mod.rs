mod job;
mod worker;

use std::{
    sync::atomic::AtomicBool,
    sync::{atomic::Ordering, Arc},
};

use crossbeam_deque::Injector as GlobalQueue;
use job::Job;
use worker::Worker;

pub use job::{JobHandle, JobStatus};

pub struct ThreadPool {
    /// Shared by all the worker threads.
    /// Worker thread can steal jobs from this queue.
    global_queue: Arc<GlobalQueue<Job>>,
    /// Used to control the all the worker threads.
    stop: Arc<AtomicBool>,
    /// All the worker threads.
    workers: Vec<Worker>,
    num_workers: usize,
}

impl ThreadPool {
    /// Create a new thread pool. The worker count is clamped to `[1, num_cpus]`.
    pub fn new(num_workers: usize) -> Self {
        let num_workers = num_workers.clamp(1, num_cpus::get().max(1));

        Self {
            global_queue: Arc::new(GlobalQueue::new()),
            stop: Arc::new(AtomicBool::new(false)),
            workers: Vec::with_capacity(num_workers),
            num_workers,
        }
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    pub fn is_running(&self) -> bool {
        !self.workers.is_empty()
    }

    /// Spawn the worker threads.
    /// Until you call this function, no thread will be created by the thread pool.
    /// Calling it on a running pool joins the old workers and spawns new ones.
    pub fn spawn_workers(&mut self) -> std::io::Result<()> {
        if !self.workers.is_empty() {
            self.terminate_block();
        }
        self.stop.store(false, Ordering::SeqCst);

        for i in 0..self.num_workers {
            let worker = Worker::new(self.global_queue.clone(), format!("Worker {}", i));
            self.workers.push(worker);
        }

        // setup coworkers env and launch worker threads
        for i in 0..self.workers.len() {
            let stealers: Vec<_> = self.workers.iter()
                .enumerate()
                .filter(|(idx, _)| *idx != i)
                .map(|(_, w)| w.stealer())
                .collect();

            self.workers[i].launch(stealers, self.stop.clone())?;
        }

        glog::debug!("Thread pool spawned {} workers", self.workers.len());
        Ok(())
    }

    /// Add jobs to the thread pool which will be consumed by the worker threads.
    /// Without running workers the job only runs through `help_once`.
    pub fn add_job<F>(&self, f: F) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let job = Job::new(Box::new(f));
        let job_handle = job.handle();
        self.global_queue.push(job);
        job_handle
    }

    /// Try pop one job from the thread pool and execute it in current thread.
    pub fn help_once(&self) -> bool {
        if let Some(mut job) = self.global_queue.steal().success() {
            job.execute();
            true
        } else {
            false
        }
    }

    /// Block until `handle` finishes, helping with queued jobs meanwhile.
    pub fn wait(&self, handle: &JobHandle) -> JobStatus {
        loop {
            let status = handle.status();
            if status != JobStatus::Pending {
                return status;
            }
            if !self.help_once() {
                std::thread::yield_now();
            }
        }
    }

    /// Raise the stop flag. Workers exit after their current job.
    pub fn terminate(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Raise the stop flag and join every worker thread.
    /// Workers finish the jobs they already took, jobs left in the global queue are dropped.
    pub fn terminate_block(&mut self) {
        self.stop.store(true, Ordering::SeqCst);

        for worker in self.workers.drain(..) {
            worker.terminate();
        }
    }

    /// Run the remaining queued jobs, then join every worker thread.
    pub fn terminate_until_finished(&mut self) {
        while self.help_once() {}

        while !self.global_queue.is_empty() || self.workers.iter().any(|worker| !worker.is_idle()) {
            if !self.help_once() {
                std::thread::yield_now();
            }
        }

        self.terminate_block();
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new(num_cpus::get() / 2)
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.terminate_block();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_is_clamped() {
        let pool = ThreadPool::new(0);
        assert_eq!(pool.num_workers(), 1);

        let pool = ThreadPool::new(usize::MAX);
        assert!(pool.num_workers() <= num_cpus::get().max(1));
    }

    #[test]
    fn jobs_run_without_workers_when_helped() {
        let pool = ThreadPool::new(1);
        let handle = pool.add_job(|| {});

        assert_eq!(handle.status(), JobStatus::Pending);
        assert_eq!(pool.wait(&handle), JobStatus::Complete);
    }
}
