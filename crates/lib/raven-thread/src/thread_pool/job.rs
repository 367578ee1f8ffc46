use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

pub type JobFunc = Box<dyn FnOnce() + Send + 'static>;

const PENDING: u8 = 0;
const COMPLETE: u8 = 1;
const PANICKED: u8 = 2;

/// State of a job pushed into the thread pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Complete,
    /// The job function unwound. The worker thread survives it.
    Panicked,
}

pub struct Job {
    func: Option<JobFunc>,
    status: Arc<AtomicU8>,
}

impl Job {
    pub(super) fn new(func: JobFunc) -> Self {
        Self {
            func: Some(func),
            status: Arc::new(AtomicU8::new(PENDING)),
        }
    }

    pub(super) fn execute(&mut self) {
        // function call only be executed once.
        if let Some(func) = self.func.take() {
            let status = match panic::catch_unwind(AssertUnwindSafe(func)) {
                Ok(()) => COMPLETE,
                Err(_) => {
                    glog::error!("Job panicked on thread {:?}", std::thread::current().name());
                    PANICKED
                }
            };
            self.status.store(status, Ordering::Release);
        }
    }

    pub fn handle(&self) -> JobHandle {
        JobHandle::new(self.status.clone())
    }
}

/// Job handle to check if a job is done.
#[derive(Clone)]
pub struct JobHandle {
    status: Arc<AtomicU8>,
}

impl JobHandle {
    fn new(status: Arc<AtomicU8>) -> Self {
        Self { status }
    }

    pub fn status(&self) -> JobStatus {
        match self.status.load(Ordering::Acquire) {
            PENDING => JobStatus::Pending,
            COMPLETE => JobStatus::Complete,
            _ => JobStatus::Panicked,
        }
    }

    /// If the job is finished, whether it returned or panicked.
    pub fn is_complete(&self) -> bool {
        self.status() != JobStatus::Pending
    }

    /// Wait for current job to finish.
    /// It will block current thread until the thread pool finished the job.
    pub fn wait(&self) -> JobStatus {
        // self spin to wait for job to complete
        loop {
            match self.status() {
                JobStatus::Pending => std::thread::yield_now(),
                status => return status,
            }
        }
    }
}
