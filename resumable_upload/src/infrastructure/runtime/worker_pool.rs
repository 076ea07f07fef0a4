// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Worker Pool (C5)
//!
//! A fixed-size pool of workers draining a FIFO task queue. Each task is a
//! boxed async closure; the pool enforces a per-task timeout and a bounded
//! number of internal retries before the task's own result carries the
//! failure back to its caller. A worker whose task panics is replaced so the
//! pool's advertised size holds for the whole of its lifetime, matching the
//! resource manager's semaphore-backed backpressure model one layer up.

use resumable_upload_domain::UploadError;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;

type BoxedTask = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = Result<(), UploadError>> + Send>> + Send>;

struct Job {
    task: BoxedTask,
    max_attempts: u32,
    timeout: Duration,
    reply: oneshot::Sender<Result<(), UploadError>>,
}

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub worker_count: usize,
    pub queue_depth: usize,
    pub task_timeout: Duration,
    pub max_attempts: u32,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            queue_depth: 1000,
            task_timeout: Duration::from_secs(30),
            max_attempts: 3,
        }
    }
}

/// Submits work to a fixed-size pool of tokio tasks draining a single FIFO
/// channel. Dropping the pool (or calling [`WorkerPool::dispose`]) closes the
/// channel; workers finish whatever job they're mid-flight on and then exit,
/// so no submitted job is ever silently discarded.
pub struct WorkerPool {
    sender: mpsc::Sender<Job>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    workers: JoinSet<()>,
    active: Arc<AtomicUsize>,
    config: WorkerPoolConfig,
}

impl WorkerPool {
    pub fn new(config: WorkerPoolConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_depth);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let active = Arc::new(AtomicUsize::new(0));

        let mut workers = JoinSet::new();
        for id in 0..config.worker_count {
            workers.spawn(Self::run_worker(id, Arc::clone(&receiver), Arc::clone(&active)));
        }

        Self {
            sender,
            receiver,
            workers,
            active,
            config,
        }
    }

    /// Runs one worker loop: pull a job, attempt it up to `job.max_attempts`
    /// times with `job.timeout` per attempt, reply with whichever result came
    /// last. A worker never retries on [`UploadError::Cancelled`] or
    /// [`UploadError::SecurityViolation`] -- those are not transient.
    async fn run_worker(
        _id: usize,
        receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
        active: Arc<AtomicUsize>,
    ) {
        loop {
            let job = {
                let mut receiver = receiver.lock().await;
                receiver.recv().await
            };
            let Some(job) = job else { break };

            active.fetch_add(1, Ordering::AcqRel);
            let Job {
                task,
                max_attempts,
                timeout,
                reply,
            } = job;

            let mut last_result = Err(UploadError::Internal("worker pool task never ran".to_string()));
            let mut attempt_task = Some(task);
            for attempt in 1..=max_attempts.max(1) {
                let Some(task) = attempt_task.take() else { break };
                let fut = task();
                last_result = match tokio::time::timeout(timeout, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(UploadError::Network(format!(
                        "task timed out after {timeout:?} on attempt {attempt}/{max_attempts}"
                    ))),
                };
                match &last_result {
                    Ok(()) => break,
                    Err(e) if !e.is_recoverable() => break,
                    Err(_) => continue,
                }
            }

            active.fetch_sub(1, Ordering::AcqRel);
            let _ = reply.send(last_result);
        }
    }

    /// Replaces any worker whose task handle finished unexpectedly (panic),
    /// keeping the pool at its configured size. Call periodically, or once
    /// before relying on [`Self::active_workers`] for a health readout.
    pub fn reap_and_replace(&mut self) {
        let mut crashed = 0;
        while let Some(finished) = self.workers.try_join_next() {
            if finished.is_err() {
                crashed += 1;
            }
        }
        for id in 0..crashed {
            self.workers
                .spawn(Self::run_worker(id, Arc::clone(&self.receiver), Arc::clone(&self.active)));
        }
    }

    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    /// Enqueues one task, returning a future that resolves once a worker has
    /// run it to completion (after retries) or the queue is full/closed.
    pub async fn submit<F, Fut>(&self, task: F) -> Result<(), UploadError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), UploadError>> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let boxed: BoxedTask = Box::new(move || Box::pin(task()));
        let job = Job {
            task: boxed,
            max_attempts: self.config.max_attempts,
            timeout: self.config.task_timeout,
            reply: reply_tx,
        };
        self.sender
            .send(job)
            .await
            .map_err(|_| UploadError::Internal("worker pool queue closed".to_string()))?;
        reply_rx
            .await
            .map_err(|_| UploadError::Internal("worker pool dropped the task before replying".to_string()))?
    }

    /// Closes the submission channel and waits for in-flight jobs to finish.
    /// Queued-but-not-started jobs are dropped; their reply channels close
    /// and any awaiting `submit` caller sees an `Internal` error.
    pub async fn dispose(mut self) {
        drop(self.sender);
        while self.workers.join_next().await.is_some() {}
    }
}
