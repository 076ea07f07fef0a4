// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Composition Root
//!
//! Wires the bootstrap layer's validated CLI (`resumable_upload_bootstrap`)
//! onto the engine's concrete adapters and drives exactly one command to
//! completion: `upload`, `resume`, `pause`, `cancel`, `status`, `list`, or
//! `validate`. Everything below this function is library code; this is the
//! only place the crate calls `std::process::exit` (via the returned
//! `ExitCode`) or writes to stdout/stderr outside of the CLI's own
//! `println!`s.
//!
//! A SIGINT/SIGTERM/SIGHUP arriving mid-command only initiates the shared
//! [`ShutdownCoordinator`]; it does not reach into the running
//! [`UploadManager`](resumable_upload::UploadManager) to flip a specific
//! upload to `paused`. That per-file distinction between a requested pause
//! and an external cancellation is `UploadManager::pause_upload`'s job (see
//! `DESIGN.md`), and the in-progress chunk attempts the pipeline already has
//! in flight are left to finish or fail on their own -- the coordinator's
//! grace period exists so the process does not hang waiting for them
//! indefinitely.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use resumable_upload::application::{QueueScheduler, UploadManager};
use resumable_upload::infrastructure::adapters::rate_limiter_dashmap::RateLimiterConfig;
use resumable_upload::infrastructure::adapters::state_store_memory::MemoryStateStore;
use resumable_upload::infrastructure::adapters::state_store_sqlite::SqliteStateStore;
use resumable_upload::infrastructure::config::EngineConfig;
use resumable_upload::infrastructure::logging;
use resumable_upload::infrastructure::runtime::caching_state_store::CachingStateStore;
use resumable_upload::infrastructure::runtime::resource_accountant::{ResourceAccountant, ResourceAccountantConfig};
use resumable_upload::infrastructure::runtime::worker_pool::{WorkerPool, WorkerPoolConfig};
use resumable_upload::infrastructure::security_gate::{SecurityGate, SecurityGateConfig};
use resumable_upload::presentation::cli as dispatcher;
use resumable_upload_bootstrap::config::LogLevel;
use resumable_upload_bootstrap::shutdown::ShutdownCoordinator;
use resumable_upload_bootstrap::signals::create_signal_handler;
use resumable_upload_bootstrap::{bootstrap_cli, map_error_to_exit_code, ExitCode, ValidatedCli};
use resumable_upload_domain::services::StateStore;
use resumable_upload_domain::UploadError;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let validated = match bootstrap_cli() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("argument error: {e}");
            return to_std_exit_code(ExitCode::UsageError);
        }
    };

    logging::init(tracing_level_name(validated.app_config.log_level()));

    let shutdown = ShutdownCoordinator::new(Duration::from_secs(5));
    spawn_signal_watcher(shutdown.clone());

    let exit_code = tokio::select! {
        result = run(validated) => {
            match result {
                Ok(()) => ExitCode::Success,
                Err(e) => {
                    tracing::error!(error = %e, "command failed");
                    map_error_to_exit_code(&e)
                }
            }
        }
        _ = shutdown.token().cancelled() => {
            tracing::warn!("shutdown requested before command finished; exiting without waiting for in-flight chunks");
            ExitCode::Interrupted
        }
    };
    shutdown.complete_shutdown();

    to_std_exit_code(exit_code)
}

fn spawn_signal_watcher(shutdown: ShutdownCoordinator) {
    tokio::spawn(async move {
        let handler = create_signal_handler();
        handler
            .wait_for_signal(Box::new(move || {
                shutdown.initiate_shutdown();
            }))
            .await;
    });
}

fn tracing_level_name(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

fn to_std_exit_code(code: ExitCode) -> std::process::ExitCode {
    std::process::ExitCode::from(code.as_i32() as u8)
}

async fn run(validated: ValidatedCli) -> Result<(), UploadError> {
    let config_path = validated.app_config.config_path().and_then(|p| p.to_str());
    let mut config =
        EngineConfig::load(config_path).map_err(|e| UploadError::InvalidConfiguration(format!("failed to load configuration: {e}")))?;

    if let Some(streams) = validated.concurrent_streams {
        config.concurrency.concurrent_streams = streams;
    }
    if let Some(mb) = validated.max_memory_mb {
        config.resources.max_memory_bytes = mb as u64 * 1024 * 1024;
    }

    let auto_save_interval = Duration::from_millis(config.resumable.auto_save_interval_ms);
    let state_store: Arc<dyn StateStore> = if config.resumable.storage_adapter == "sqlite" {
        let cache = CachingStateStore::new(Arc::new(SqliteStateStore::connect("sqlite://resumable_upload.db?mode=rwc").await?));
        cache.spawn_autosave(auto_save_interval);
        cache
    } else {
        let cache = CachingStateStore::new(Arc::new(MemoryStateStore::new()));
        cache.spawn_autosave(auto_save_interval);
        cache
    };

    let security_gate = SecurityGate::new(
        SecurityGateConfig::from_parts(&config.security, &config.access_control),
        config.security.allowed_mime_types.clone(),
        config.security.allowed_extensions.clone(),
        RateLimiterConfig {
            window_ms: config.security.rate_limit_window_ms,
            max_requests_per_minute: config.security.rate_limit_max_requests,
            max_concurrent_uploads: config.concurrency.max_concurrent_uploads as u32,
        },
    );

    let resource_accountant = ResourceAccountant::new(ResourceAccountantConfig {
        max_memory_bytes: config.resources.max_memory_bytes,
        warning_threshold: config.resources.warning_threshold,
        critical_threshold: config.resources.critical_threshold,
    });
    if config.resources.enable_auto_cleanup {
        resource_accountant.spawn_cleanup(Duration::from_secs(config.resources.cleanup_interval_secs));
    }

    let worker_pool = Arc::new(WorkerPool::new(WorkerPoolConfig {
        worker_count: config.concurrency.worker_pool_size,
        queue_depth: config.concurrency.max_queue_depth,
        ..WorkerPoolConfig::default()
    }));

    let http_client = Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| UploadError::InvalidConfiguration(format!("failed to build http client: {e}")))?;

    let max_concurrent_uploads = config.concurrency.max_concurrent_uploads;
    let default_endpoint = config.endpoint.base_url.clone();

    let manager = UploadManager::new(config, state_store, security_gate, resource_accountant, worker_pool, http_client);
    let scheduler = QueueScheduler::new(max_concurrent_uploads);

    dispatcher::dispatch(
        validated.command,
        manager,
        scheduler,
        &default_endpoint,
        config_path,
    )
    .await
}
