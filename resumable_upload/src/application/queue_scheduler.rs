// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Queue Scheduler (C12)
//!
//! Orders pending uploads across files by `(priority desc, retryAttempts
//! asc, startTime asc)` and caps how many run at once, independent of the
//! C10 pipeline's own per-file `concurrentStreams` cap. The ordering lives
//! in [`QueueItem::ordering_key`]; this module owns the mutable queue and
//! the global `active_uploads` counter alongside it, so the two can never
//! drift out of sync under concurrent `get_next`/`complete` calls.
//!
//! A `parking_lot::Mutex` guards the item list -- every operation here is a
//! short, non-blocking sort-and-mutate, never an await point, so a
//! synchronous lock is the right tool rather than `tokio::sync::Mutex`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use resumable_upload_domain::value_objects::FileId;
use resumable_upload_domain::{QueueItem, QueueStatus, UploadStats};

/// Emitted after every mutation of the queue, per the spec's "emits a
/// queue-update event after every mutation" rule. Carries enough to drive a
/// transport adapter (WebSocket push, CLI `list` output) without it having
/// to re-derive queue position itself.
#[derive(Debug, Clone)]
pub struct QueueEvent {
    pub file_id: FileId,
    pub status: QueueStatus,
    pub queue_position: Option<usize>,
    pub active_uploads: usize,
}

/// Priority queue across files with a global concurrency cap. `enqueue`
/// never blocks; `get_next` returns `None` rather than blocking when the
/// cap is already saturated, leaving the caller to retry once a slot frees
/// up via [`Self::complete`] or [`Self::fail`].
pub struct QueueScheduler {
    max_concurrent: usize,
    active_uploads: AtomicUsize,
    items: Mutex<Vec<QueueItem>>,
    events: broadcast::Sender<QueueEvent>,
}

impl QueueScheduler {
    pub fn new(max_concurrent: usize) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            max_concurrent: max_concurrent.max(1),
            active_uploads: AtomicUsize::new(0),
            items: Mutex::new(Vec::new()),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    fn sort(items: &mut [QueueItem]) {
        items.sort_by_key(|i| i.ordering_key());
    }

    fn queue_position(items: &[QueueItem], file_id: FileId) -> Option<usize> {
        items
            .iter()
            .filter(|i| i.status == QueueStatus::Queued)
            .position(|i| i.file_id == file_id)
    }

    fn emit(&self, file_id: FileId, status: QueueStatus, items: &[QueueItem]) {
        let _ = self.events.send(QueueEvent {
            file_id,
            status,
            queue_position: Self::queue_position(items, file_id),
            active_uploads: self.active_uploads.load(Ordering::Acquire),
        });
    }

    /// Adds `file_id` to the queue at `priority`, or re-sorts in place if it
    /// is already present (a caller changing an already-queued item's
    /// priority).
    pub fn enqueue(&self, file_id: FileId, priority: i32, total_bytes: u64) {
        let mut items = self.items.lock();
        if let Some(existing) = items.iter_mut().find(|i| i.file_id == file_id) {
            existing.priority = priority;
        } else {
            items.push(QueueItem::new(file_id, priority, Utc::now(), UploadStats::zero(total_bytes)));
        }
        Self::sort(&mut items);
        self.emit(file_id, QueueStatus::Queued, &items);
    }

    /// Returns the next queued item eligible to run, transitioning it to
    /// `Uploading` and incrementing `active_uploads`, or `None` if the
    /// queue is empty or the concurrency cap is already reached.
    pub fn get_next(&self) -> Option<QueueItem> {
        if self.active_uploads.load(Ordering::Acquire) >= self.max_concurrent {
            return None;
        }
        let mut items = self.items.lock();
        let index = items.iter().position(|i| i.status == QueueStatus::Queued)?;
        items[index].status = QueueStatus::Uploading;
        self.active_uploads.fetch_add(1, Ordering::AcqRel);
        let item = items[index].clone();
        self.emit(item.file_id, QueueStatus::Uploading, &items);
        Some(item)
    }

    /// Marks `file_id` completed and frees its concurrency slot.
    pub fn complete(&self, file_id: FileId) {
        let mut items = self.items.lock();
        if let Some(item) = items.iter_mut().find(|i| i.file_id == file_id) {
            if item.status == QueueStatus::Uploading {
                self.active_uploads.fetch_sub(1, Ordering::AcqRel);
            }
            item.status = QueueStatus::Completed;
        }
        self.emit(file_id, QueueStatus::Completed, &items);
    }

    /// Marks `file_id` failed (terminal -- no further automatic retry) and
    /// frees its concurrency slot. Use [`Self::retry`] instead if the item
    /// should re-enter the queue.
    pub fn fail(&self, file_id: FileId) {
        let mut items = self.items.lock();
        if let Some(item) = items.iter_mut().find(|i| i.file_id == file_id) {
            if item.status == QueueStatus::Uploading {
                self.active_uploads.fetch_sub(1, Ordering::AcqRel);
            }
            item.status = QueueStatus::Error;
        }
        self.emit(file_id, QueueStatus::Error, &items);
    }

    /// Returns `file_id` to `Queued`, incrementing `retry_attempts` (which
    /// lowers its sort priority relative to items with fewer attempts) and
    /// re-sorting.
    pub fn retry(&self, file_id: FileId) {
        let mut items = self.items.lock();
        if let Some(item) = items.iter_mut().find(|i| i.file_id == file_id) {
            if item.status == QueueStatus::Uploading {
                self.active_uploads.fetch_sub(1, Ordering::AcqRel);
            }
            item.status = QueueStatus::Queued;
            item.retry_attempts += 1;
        }
        Self::sort(&mut items);
        self.emit(file_id, QueueStatus::Queued, &items);
    }

    /// Sets `file_id`'s status to `Paused` without freeing its slot back to
    /// the pool implicitly counted elsewhere -- callers pair this with the
    /// upload manager's own `pause_upload`, which owns the pipeline
    /// cancellation.
    pub fn pause(&self, file_id: FileId) {
        let mut items = self.items.lock();
        if let Some(item) = items.iter_mut().find(|i| i.file_id == file_id) {
            if item.status == QueueStatus::Uploading {
                self.active_uploads.fetch_sub(1, Ordering::AcqRel);
            }
            item.status = QueueStatus::Paused;
        }
        self.emit(file_id, QueueStatus::Paused, &items);
    }

    /// Removes `file_id` entirely, freeing its slot if it was running.
    pub fn remove(&self, file_id: FileId) {
        let mut items = self.items.lock();
        if let Some(pos) = items.iter().position(|i| i.file_id == file_id) {
            if items[pos].status == QueueStatus::Uploading {
                self.active_uploads.fetch_sub(1, Ordering::AcqRel);
            }
            items.remove(pos);
        }
        self.emit(file_id, QueueStatus::Completed, &items);
    }

    pub fn active_uploads(&self) -> usize {
        self.active_uploads.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> Vec<QueueItem> {
        self.items.lock().clone()
    }

    pub fn position_of(&self, file_id: FileId) -> Option<usize> {
        Self::queue_position(&self.items.lock(), file_id)
    }
}
