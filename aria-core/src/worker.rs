// Aria
// Copyright (c) 2026 The Project Aria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `worker` module runs background jobs (library scans, playlist
//! loads) on a single thread, in FIFO order.
//!
//! Every job carries a caller-chosen positive type. `remove_jobs` drops all
//! queued jobs of a type and waits for a matching running job to finish;
//! the running job can notice the pending removal through
//! [`JobContext::cancelling`] and return early.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::debug;

/// Matches every job type in `remove_jobs`.
pub const JOB_TYPE_ANY: u32 = 0;

const IDLE_POLL: Duration = Duration::from_millis(100);
const CANCEL_POLL: Duration = Duration::from_millis(50);

type JobFn = Box<dyn FnOnce(&JobContext<'_>) + Send>;

struct Job {
    kind: u32,
    run: JobFn,
}

#[derive(Default)]
struct State {
    queue: VecDeque<Job>,
    /// Type of the currently running job, if any.
    running: Option<u32>,
    /// Type being cancelled by a `remove_jobs` in progress.
    cancel: Option<u32>,
    shutdown: bool,
}

/// Handed to a running job; lets it poll for cooperative cancellation.
pub struct JobContext<'a> {
    state: &'a Mutex<State>,
    kind: u32,
}

impl JobContext<'_> {
    /// True when a `remove_jobs` call is waiting for this job to finish.
    /// A job that observes this must be safe to re-run if queued again.
    pub fn cancelling(&self) -> bool {
        let state = self.state.lock().unwrap();
        matches!(state.cancel, Some(kind) if kind == JOB_TYPE_ANY || kind == self.kind)
    }
}

/// The background worker thread and its job queue.
pub struct Worker {
    state: Arc<Mutex<State>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Worker {
    /// Spawn the worker thread.
    pub fn start() -> Worker {
        let state = Arc::new(Mutex::new(State::default()));
        let thread_state = state.clone();
        let handle = thread::Builder::new()
            .name("worker".to_string())
            .spawn(move || worker_loop(&thread_state))
            .expect("failed to spawn worker thread");
        Worker { state, handle: Some(handle) }
    }

    /// Queue a job. `kind` must be positive; it is the cookie `remove_jobs`
    /// and `cancelling` match against.
    pub fn add_job<F>(&self, kind: u32, job: F)
    where
        F: FnOnce(&JobContext<'_>) + Send + 'static,
    {
        assert!(kind != JOB_TYPE_ANY);
        let mut state = self.state.lock().unwrap();
        state.queue.push_back(Job { kind, run: Box::new(job) });
    }

    /// Drop queued jobs of type `kind` (or all jobs for `JOB_TYPE_ANY`) and
    /// wait until no matching job is running.
    pub fn remove_jobs(&self, kind: u32) {
        let mut state = self.state.lock().unwrap();
        state.cancel = Some(kind);
        state.queue.retain(|job| kind != JOB_TYPE_ANY && job.kind != kind);
        while matches!(state.running, Some(r) if kind == JOB_TYPE_ANY || r == kind) {
            drop(state);
            thread::sleep(CANCEL_POLL);
            state = self.state.lock().unwrap();
        }
        state.cancel = None;
    }

    /// Queued jobs, not counting a running one.
    pub fn queued(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    /// True when no job is queued or running.
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.queue.is_empty() && state.running.is_none()
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.state.lock().unwrap().shutdown = true;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn worker_loop(state: &Mutex<State>) {
    loop {
        let job = {
            let mut locked = state.lock().unwrap();
            match locked.queue.pop_front() {
                Some(job) => {
                    locked.running = Some(job.kind);
                    Some(job)
                }
                None => {
                    if locked.shutdown {
                        return;
                    }
                    None
                }
            }
        };

        match job {
            Some(job) => {
                debug!("taking job of type {}", job.kind);
                let context = JobContext { state, kind: job.kind };
                (job.run)(&context);
                state.lock().unwrap().running = None;
            }
            None => thread::sleep(IDLE_POLL),
        }
    }
}
