// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Resource Accountant (C9)
//!
//! Centralized tracking of every in-flight memory-backed resource the engine
//! holds: chunk buffers, compression scratch space, encryption buffers,
//! stream handles, and cache entries. Unlike a plain semaphore, each
//! registration carries its own size and metadata so the accountant can
//! answer "what is actually using memory right now", not just "how many
//! slots are taken".
//!
//! ## Why RAII instead of finalizers
//!
//! The distilled design this module implements describes resource reclaim in
//! terms of weak references and finalizer callbacks, a pattern natural to a
//! garbage-collected runtime. Rust has no finalizers to rely on, so each
//! registration instead returns a [`ResourceGuard`]: dropping it is the
//! credit-back. There is no weak-reference equivalent to reproduce, and none
//! is needed — the guard's `Drop` always runs deterministically, whether the
//! holder returns normally, short-circuits with `?`, or panics.
//!
//! ## Threshold callbacks
//!
//! Crossing the warning or critical fraction of the configured memory budget
//! fires every registered callback for that threshold, synchronously, on the
//! thread that performed the registration that tipped it over. Callbacks are
//! expected to be cheap (e.g. signal a cache to start evicting); anything
//! that needs to block should spawn its own task.
//!
//! ## Periodic sweep
//!
//! The registration-time check above only re-evaluates on the next
//! `register` call. [`ResourceAccountant::spawn_cleanup`] additionally runs
//! a fixed-interval sweep (mirroring
//! [`CachingStateStore::spawn_autosave`](crate::infrastructure::runtime::caching_state_store::CachingStateStore::spawn_autosave))
//! so usage that stays pinned above a threshold with no new registrations
//! still gets reclaimed: above critical, every critical ("before-GC")
//! callback runs, then every resource registered with a dispose capability
//! is disposed and released; above warning only, the warning callbacks run
//! and nothing is disposed.

use resumable_upload_domain::{ResourceStats, ResourceType, UploadError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Configuration for a [`ResourceAccountant`].
#[derive(Debug, Clone, Copy)]
pub struct ResourceAccountantConfig {
    /// Hard memory budget in bytes. Registrations that would exceed it are
    /// rejected with [`UploadError::ResourceExhausted`].
    pub max_memory_bytes: u64,

    /// Fraction of `max_memory_bytes` (0.0-1.0) at which warning callbacks
    /// fire.
    pub warning_threshold: f64,

    /// Fraction of `max_memory_bytes` (0.0-1.0) at which critical callbacks
    /// fire.
    pub critical_threshold: f64,
}

impl Default for ResourceAccountantConfig {
    fn default() -> Self {
        Self {
            max_memory_bytes: 256 * 1024 * 1024,
            warning_threshold: 0.75,
            critical_threshold: 0.9,
        }
    }
}

type ThresholdCallback = Arc<dyn Fn(&ResourceAccountant) + Send + Sync>;
type DisposeCallback = Arc<dyn Fn() + Send + Sync>;

/// Tracks every resource currently checked out against a shared memory
/// budget and notifies registered callbacks when usage crosses a threshold.
pub struct ResourceAccountant {
    resources: DashMap<Uuid, ResourceStats>,
    /// Resources registered through [`Self::register_with_dispose`] --
    /// the subset the periodic critical sweep is allowed to tear down on
    /// its own, as opposed to resources a caller only released through its
    /// `ResourceGuard`.
    dispose_callbacks: DashMap<Uuid, DisposeCallback>,
    total_allocated: AtomicU64,
    peak_allocated: AtomicU64,
    config: ResourceAccountantConfig,
    warning_callbacks: RwLock<Vec<ThresholdCallback>>,
    critical_callbacks: RwLock<Vec<ThresholdCallback>>,
    warning_fired: std::sync::atomic::AtomicBool,
    critical_fired: std::sync::atomic::AtomicBool,
}

impl ResourceAccountant {
    pub fn new(config: ResourceAccountantConfig) -> Arc<Self> {
        Arc::new(Self {
            resources: DashMap::new(),
            dispose_callbacks: DashMap::new(),
            total_allocated: AtomicU64::new(0),
            peak_allocated: AtomicU64::new(0),
            config,
            warning_callbacks: RwLock::new(Vec::new()),
            critical_callbacks: RwLock::new(Vec::new()),
            warning_fired: std::sync::atomic::AtomicBool::new(false),
            critical_fired: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// Register a resource of `size` bytes. Returns a guard that releases the
    /// accounting entry (but not the underlying buffer — callers still own
    /// that) when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::ResourceExhausted`] if admitting this resource
    /// would exceed `max_memory_bytes`.
    pub fn register(
        self: &Arc<Self>,
        resource_type: ResourceType,
        size: u64,
        metadata: HashMap<String, String>,
    ) -> Result<ResourceGuard, UploadError> {
        let current = self.total_allocated.load(Ordering::Acquire);
        if current.saturating_add(size) > self.config.max_memory_bytes {
            return Err(UploadError::ResourceExhausted(format!(
                "registering {size} bytes of {resource_type:?} would exceed the {} byte budget (currently {current} in use)",
                self.config.max_memory_bytes
            )));
        }

        let id = Uuid::new_v4();
        let stats = ResourceStats {
            resource_type,
            size,
            created_at: Utc::now(),
            metadata,
        };
        self.resources.insert(id, stats);

        let new_total = self.total_allocated.fetch_add(size, Ordering::AcqRel) + size;
        self.peak_allocated.fetch_max(new_total, Ordering::AcqRel);

        self.check_thresholds(new_total);

        Ok(ResourceGuard {
            id,
            size,
            accountant: Arc::clone(self),
        })
    }

    /// Like [`Self::register`], but additionally records `dispose` as this
    /// resource's dispose capability -- the callback the periodic critical
    /// sweep in [`Self::check_memory_usage`] invokes before releasing it.
    /// Resources registered through plain `register` have no dispose
    /// capability and are left untouched by the sweep; only the guard's
    /// `Drop` or an explicit [`Self::release`] reclaims them.
    pub fn register_with_dispose(
        self: &Arc<Self>,
        resource_type: ResourceType,
        size: u64,
        metadata: HashMap<String, String>,
        dispose: impl Fn() + Send + Sync + 'static,
    ) -> Result<ResourceGuard, UploadError> {
        let guard = self.register(resource_type, size, metadata)?;
        self.dispose_callbacks.insert(guard.id(), Arc::new(dispose));
        Ok(guard)
    }

    /// Explicitly release a resource, e.g. from a cleanup callback reclaiming
    /// entries it chose, rather than waiting on the guard's `Drop`.
    pub fn release(&self, id: Uuid) -> Option<ResourceStats> {
        let removed = self.resources.remove(&id).map(|(_, stats)| stats);
        self.dispose_callbacks.remove(&id);
        if let Some(stats) = &removed {
            self.total_allocated.fetch_sub(stats.size, Ordering::AcqRel);
            let ratio = self.utilization();
            if ratio < self.config.warning_threshold {
                self.warning_fired.store(false, Ordering::Release);
            }
            if ratio < self.config.critical_threshold {
                self.critical_fired.store(false, Ordering::Release);
            }
        }
        removed
    }

    /// Periodic sweep per spec §4.9: above the critical threshold, run every
    /// critical ("before-GC") callback, then dispose and release every
    /// resource that was registered with a dispose capability; above the
    /// warning threshold only, run the warning callbacks and dispose
    /// nothing. Unlike [`Self::check_thresholds`] (which only fires once per
    /// crossing, from `register`), this runs unconditionally on every call
    /// so a usage level pinned above a threshold with no new registrations
    /// still gets swept.
    pub fn check_memory_usage(&self) {
        let ratio = self.utilization();
        if ratio >= self.config.critical_threshold {
            for cb in self.critical_callbacks.read().iter() {
                cb(self);
            }
            let disposable: Vec<Uuid> = self.dispose_callbacks.iter().map(|entry| *entry.key()).collect();
            for id in disposable {
                if let Some((_, dispose)) = self.dispose_callbacks.remove(&id) {
                    dispose();
                    self.release(id);
                }
            }
        } else if ratio >= self.config.warning_threshold {
            for cb in self.warning_callbacks.read().iter() {
                cb(self);
            }
        }
    }

    /// Spawns the periodic sweep, re-running [`Self::check_memory_usage`]
    /// every `interval` for the lifetime of the returned task. Mirrors
    /// `CachingStateStore::spawn_autosave`'s fixed-interval `tokio::spawn`
    /// loop.
    pub fn spawn_cleanup(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let accountant = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                accountant.check_memory_usage();
            }
        })
    }

    /// Register a callback invoked the first time usage crosses the warning
    /// threshold after having been below it.
    pub fn on_warning(&self, callback: impl Fn(&ResourceAccountant) + Send + Sync + 'static) {
        self.warning_callbacks.write().push(Arc::new(callback));
    }

    /// Register a callback invoked the first time usage crosses the critical
    /// threshold after having been below it.
    pub fn on_critical(&self, callback: impl Fn(&ResourceAccountant) + Send + Sync + 'static) {
        self.critical_callbacks.write().push(Arc::new(callback));
    }

    fn check_thresholds(&self, new_total: u64) {
        let ratio = new_total as f64 / self.config.max_memory_bytes.max(1) as f64;

        if ratio >= self.config.critical_threshold {
            if !self.critical_fired.swap(true, Ordering::AcqRel) {
                for cb in self.critical_callbacks.read().iter() {
                    cb(self);
                }
            }
        } else if ratio >= self.config.warning_threshold && !self.warning_fired.swap(true, Ordering::AcqRel) {
            for cb in self.warning_callbacks.read().iter() {
                cb(self);
            }
        }
    }

    pub fn total_allocated(&self) -> u64 {
        self.total_allocated.load(Ordering::Acquire)
    }

    pub fn peak_allocated(&self) -> u64 {
        self.peak_allocated.load(Ordering::Acquire)
    }

    pub fn max_memory_bytes(&self) -> u64 {
        self.config.max_memory_bytes
    }

    pub fn utilization(&self) -> f64 {
        self.total_allocated() as f64 / self.config.max_memory_bytes.max(1) as f64
    }

    pub fn active_count(&self) -> usize {
        self.resources.len()
    }

    pub fn stats_for(&self, id: Uuid) -> Option<ResourceStats> {
        self.resources.get(&id).map(|entry| entry.value().clone())
    }
}

/// RAII handle returned by [`ResourceAccountant::register`]. Dropping it
/// credits the resource's size back to the accountant.
pub struct ResourceGuard {
    id: Uuid,
    size: u64,
    accountant: Arc<ResourceAccountant>,
}

impl ResourceGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        self.accountant.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn registering_within_budget_succeeds() {
        let accountant = ResourceAccountant::new(ResourceAccountantConfig {
            max_memory_bytes: 1024,
            ..Default::default()
        });

        let guard = accountant
            .register(ResourceType::Buffer, 100, HashMap::new())
            .unwrap();
        assert_eq!(accountant.total_allocated(), 100);
        assert_eq!(guard.size(), 100);
    }

    #[test]
    fn registering_past_budget_is_rejected() {
        let accountant = ResourceAccountant::new(ResourceAccountantConfig {
            max_memory_bytes: 100,
            ..Default::default()
        });

        assert!(accountant.register(ResourceType::Chunk, 50, HashMap::new()).is_ok());
        assert!(matches!(
            accountant.register(ResourceType::Chunk, 51, HashMap::new()),
            Err(UploadError::ResourceExhausted(_))
        ));
    }

    #[test]
    fn dropping_guard_releases_accounting() {
        let accountant = ResourceAccountant::new(ResourceAccountantConfig {
            max_memory_bytes: 1024,
            ..Default::default()
        });

        {
            let _guard = accountant.register(ResourceType::Stream, 200, HashMap::new()).unwrap();
            assert_eq!(accountant.total_allocated(), 200);
        }
        assert_eq!(accountant.total_allocated(), 0);
    }

    #[test]
    fn peak_allocated_tracks_the_high_water_mark() {
        let accountant = ResourceAccountant::new(ResourceAccountantConfig {
            max_memory_bytes: 1024,
            ..Default::default()
        });

        let guard1 = accountant.register(ResourceType::Buffer, 300, HashMap::new()).unwrap();
        let guard2 = accountant.register(ResourceType::Buffer, 300, HashMap::new()).unwrap();
        drop(guard1);
        drop(guard2);

        assert_eq!(accountant.peak_allocated(), 600);
        assert_eq!(accountant.total_allocated(), 0);
    }

    #[test]
    fn warning_callback_fires_once_when_crossing_threshold() {
        let accountant = ResourceAccountant::new(ResourceAccountantConfig {
            max_memory_bytes: 100,
            warning_threshold: 0.5,
            critical_threshold: 0.9,
        });

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        accountant.on_warning(move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        let _g1 = accountant.register(ResourceType::Buffer, 30, HashMap::new()).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        let _g2 = accountant.register(ResourceType::Buffer, 30, HashMap::new()).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Additional registrations above the threshold don't re-fire.
        let _g3 = accountant.register(ResourceType::Buffer, 5, HashMap::new()).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn critical_callback_fires_independently_of_warning() {
        let accountant = ResourceAccountant::new(ResourceAccountantConfig {
            max_memory_bytes: 100,
            warning_threshold: 0.5,
            critical_threshold: 0.9,
        });

        let critical_fired = Arc::new(AtomicUsize::new(0));
        let clone = critical_fired.clone();
        accountant.on_critical(move |_| {
            clone.fetch_add(1, Ordering::SeqCst);
        });

        let _guard = accountant.register(ResourceType::Buffer, 95, HashMap::new()).unwrap();
        assert_eq!(critical_fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn release_resets_threshold_state_once_below_it_again() {
        let accountant = ResourceAccountant::new(ResourceAccountantConfig {
            max_memory_bytes: 100,
            warning_threshold: 0.5,
            critical_threshold: 0.9,
        });

        let fired = Arc::new(AtomicUsize::new(0));
        let clone = fired.clone();
        accountant.on_warning(move |_| {
            clone.fetch_add(1, Ordering::SeqCst);
        });

        let guard = accountant.register(ResourceType::Buffer, 60, HashMap::new()).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        drop(guard);
        assert_eq!(accountant.total_allocated(), 0);

        let _guard2 = accountant.register(ResourceType::Buffer, 60, HashMap::new()).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn periodic_sweep_disposes_resources_above_critical() {
        let accountant = ResourceAccountant::new(ResourceAccountantConfig {
            max_memory_bytes: 100,
            warning_threshold: 0.5,
            critical_threshold: 0.9,
        });

        let disposed = Arc::new(AtomicUsize::new(0));
        let disposed_clone = disposed.clone();
        let guard = accountant
            .register_with_dispose(ResourceType::Cache, 95, HashMap::new(), move || {
                disposed_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        accountant.check_memory_usage();

        assert_eq!(disposed.load(Ordering::SeqCst), 1);
        assert_eq!(accountant.total_allocated(), 0);
        assert!(accountant.stats_for(guard.id()).is_none());
    }

    #[test]
    fn periodic_sweep_only_runs_callbacks_at_warning_without_disposing() {
        let accountant = ResourceAccountant::new(ResourceAccountantConfig {
            max_memory_bytes: 100,
            warning_threshold: 0.5,
            critical_threshold: 0.9,
        });

        let warned = Arc::new(AtomicUsize::new(0));
        let warned_clone = warned.clone();
        accountant.on_warning(move |_| {
            warned_clone.fetch_add(1, Ordering::SeqCst);
        });

        let disposed = Arc::new(AtomicUsize::new(0));
        let disposed_clone = disposed.clone();
        let _guard = accountant
            .register_with_dispose(ResourceType::Cache, 60, HashMap::new(), move || {
                disposed_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        // `register` already fired the one-shot warning callback once; the
        // sweep should fire it again, unconditionally, without disposing.
        accountant.check_memory_usage();

        assert_eq!(warned.load(Ordering::SeqCst), 2);
        assert_eq!(disposed.load(Ordering::SeqCst), 0);
        assert_eq!(accountant.total_allocated(), 60);
    }
}
