//! Work-stealing thread pool used to fan out command recording.

extern crate log as glog;

mod thread_pool;

pub use thread_pool::{JobHandle, JobStatus, ThreadPool};
