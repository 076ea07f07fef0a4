// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command Dispatch
//!
//! Maps a [`ValidatedCommand`] onto the running [`UploadManager`] and
//! [`QueueScheduler`], and prints a human-readable result to stdout.
//!
//! `resume`/`pause`/`cancel`/`status` only carry a `file_id` on the command
//! line -- the spec's `resumeUpload(fileId)` otherwise expects the same
//! `path`/`endpoint`/`user_id` arguments `startUpload` was given. Rather than
//! widen the persisted [`UploadState`] with data that is explicitly never
//! sent to the server, this module remembers those three fields itself in a
//! small per-file sidecar under the system temp directory, written at
//! `upload` time and read back by `resume`. See `DESIGN.md` for the record
//! of this decision.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use resumable_upload_bootstrap::cli::ValidatedCommand;
use serde::{Deserialize, Serialize};

use resumable_upload_domain::value_objects::FileId;
use resumable_upload_domain::UploadError;

use crate::application::{QueueScheduler, UploadManager, UploadRequest};

use super::progress;

/// The subset of an `upload` invocation a later `resume` needs to rebuild
/// an [`UploadRequest`]. Persisted independently of [`UploadState`], which
/// never carries the local path or caller identity.
#[derive(Debug, Serialize, Deserialize)]
struct LocalUploadHandle {
    path: PathBuf,
    endpoint: String,
    user_id: String,
    priority: i32,
    encrypt: bool,
}

fn handle_path(file_id: FileId) -> PathBuf {
    std::env::temp_dir().join("resumable-upload").join(format!("{file_id}.json"))
}

async fn remember_handle(file_id: FileId, handle: &LocalUploadHandle) -> Result<(), UploadError> {
    let path = handle_path(file_id);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec(handle)?;
    tokio::fs::write(&path, json).await?;
    Ok(())
}

async fn recall_handle(file_id: FileId) -> Result<LocalUploadHandle, UploadError> {
    let path = handle_path(file_id);
    let bytes = tokio::fs::read(&path).await.map_err(|_| {
        UploadError::validation(format!(
            "no remembered input path for {file_id}; this process never started it, or its local handle expired -- start it fresh with `upload` instead"
        ))
    })?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn local_user_id() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "local".to_string())
}

fn parse_file_id(raw: &str) -> Result<FileId, UploadError> {
    FileId::from_str(raw).map_err(|e| UploadError::validation(format!("invalid file id {raw:?}: {e}")))
}

/// Runs `command` to completion, printing its outcome. Returns the error a
/// failed upload, resume, or validation ended with, for the caller to map to
/// a process exit code.
pub async fn dispatch(
    command: ValidatedCommand,
    manager: Arc<UploadManager>,
    scheduler: Arc<QueueScheduler>,
    default_endpoint: &str,
    default_config_path: Option<&str>,
) -> Result<(), UploadError> {
    match command {
        ValidatedCommand::Upload {
            input,
            endpoint,
            priority,
            encrypt,
            chunk_size_mb: _,
        } => {
            let endpoint = endpoint.unwrap_or_else(|| default_endpoint.to_string());
            upload(manager, scheduler, input, endpoint, priority, encrypt).await
        }
        ValidatedCommand::Resume { file_id } => resume(manager, scheduler, parse_file_id(&file_id)?).await,
        ValidatedCommand::Pause { file_id } => pause(manager, parse_file_id(&file_id)?).await,
        ValidatedCommand::Cancel { file_id, force } => cancel(manager, scheduler, parse_file_id(&file_id)?, force).await,
        ValidatedCommand::Status { file_id } => status(manager, parse_file_id(&file_id)?).await,
        ValidatedCommand::List => list(scheduler).await,
        ValidatedCommand::Validate { config } => validate(&config, default_config_path).await,
    }
}

async fn upload(
    manager: Arc<UploadManager>,
    scheduler: Arc<QueueScheduler>,
    input: PathBuf,
    endpoint: String,
    priority: i32,
    encrypt: bool,
) -> Result<(), UploadError> {
    let file_id = FileId::new();
    let user_id = local_user_id();
    let size = tokio::fs::metadata(&input).await.map(|m| m.len()).unwrap_or(0);

    remember_handle(
        file_id,
        &LocalUploadHandle {
            path: input.clone(),
            endpoint: endpoint.clone(),
            user_id: user_id.clone(),
            priority,
            encrypt,
        },
    )
    .await?;

    scheduler.enqueue(file_id, priority, size);
    scheduler.get_next();

    println!("uploading {} as {file_id}", input.display());
    let request = UploadRequest {
        path: input,
        endpoint,
        user_id,
        priority,
        encrypt,
    };
    run_and_report(manager, scheduler, file_id, request).await
}

async fn resume(manager: Arc<UploadManager>, scheduler: Arc<QueueScheduler>, file_id: FileId) -> Result<(), UploadError> {
    let handle = recall_handle(file_id).await?;
    let state = manager
        .upload_state(file_id)
        .await?
        .ok_or_else(|| UploadError::validation(format!("no upload state for file {file_id}")))?;
    scheduler.enqueue(file_id, handle.priority, state.file_size);
    scheduler.get_next();

    println!("resuming {file_id} from {} bytes uploaded", state.bytes_uploaded);
    let request = UploadRequest {
        path: handle.path,
        endpoint: handle.endpoint,
        user_id: handle.user_id,
        priority: handle.priority,
        encrypt: handle.encrypt,
    };
    let manager_for_resume = Arc::clone(&manager);
    let result = manager_for_resume
        .resume_upload(file_id, request, progress::console_reporter())
        .await;
    finish(&scheduler, file_id, result)
}

async fn run_and_report(
    manager: Arc<UploadManager>,
    scheduler: Arc<QueueScheduler>,
    file_id: FileId,
    request: UploadRequest,
) -> Result<(), UploadError> {
    let result = manager.start_upload(file_id, request, progress::console_reporter()).await;
    finish(&scheduler, file_id, result)
}

fn finish(
    scheduler: &Arc<QueueScheduler>,
    file_id: FileId,
    result: Result<resumable_upload_domain::UploadState, UploadError>,
) -> Result<(), UploadError> {
    match result {
        Ok(state) => {
            scheduler.complete(file_id);
            println!("upload {file_id} completed: {} bytes", state.bytes_uploaded);
            Ok(())
        }
        Err(UploadError::Cancelled(reason)) => {
            scheduler.pause(file_id);
            println!("upload {file_id} paused ({reason}); resume later with `resume {file_id}`");
            Err(UploadError::Cancelled(reason))
        }
        Err(e) => {
            scheduler.fail(file_id);
            eprintln!("upload {file_id} failed: {e}");
            Err(e)
        }
    }
}

async fn pause(manager: Arc<UploadManager>, file_id: FileId) -> Result<(), UploadError> {
    manager.pause_upload(file_id).await?;
    println!("pause requested for {file_id}");
    Ok(())
}

async fn cancel(manager: Arc<UploadManager>, scheduler: Arc<QueueScheduler>, file_id: FileId, force: bool) -> Result<(), UploadError> {
    if !force {
        print!("cancel {file_id} and discard its resume state? [y/N] ");
        use std::io::Write as _;
        let _ = std::io::stdout().flush();
        let mut answer = String::new();
        std::io::stdin()
            .read_line(&mut answer)
            .map_err(|e| UploadError::Internal(format!("failed to read confirmation: {e}")))?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            println!("cancelled nothing");
            return Ok(());
        }
    }
    manager.cancel_upload(file_id).await?;
    scheduler.remove(file_id);
    let _ = tokio::fs::remove_file(handle_path(file_id)).await;
    println!("{file_id} cancelled");
    Ok(())
}

async fn status(manager: Arc<UploadManager>, file_id: FileId) -> Result<(), UploadError> {
    match manager.upload_state(file_id).await? {
        Some(state) => {
            println!(
                "{file_id}  {:?}  {}/{} bytes  {} of {} chunks",
                state.status,
                state.bytes_uploaded,
                state.file_size,
                state.uploaded_chunks().len(),
                state.total_chunks
            );
            if let Some(error) = &state.error {
                println!("last error: {error}");
            }
            Ok(())
        }
        None => Err(UploadError::validation(format!("no upload state for file {file_id}"))),
    }
}

async fn list(scheduler: Arc<QueueScheduler>) -> Result<(), UploadError> {
    let items = scheduler.snapshot();
    if items.is_empty() {
        println!("queue is empty");
        return Ok(());
    }
    for item in items {
        println!(
            "{}  {:?}  priority={}  retries={}  uploaded={}/{}",
            item.file_id, item.status, item.priority, item.retry_attempts, item.stats.bytes_uploaded, item.stats.total_bytes
        );
    }
    Ok(())
}

async fn validate(config: &Path, default_config_path: Option<&str>) -> Result<(), UploadError> {
    let path = config.to_str().or(default_config_path);
    match crate::infrastructure::config::EngineConfig::load(path) {
        Ok(loaded) => {
            println!("{} is valid", config.display());
            println!(
                "chunk size: {} bytes, concurrent streams: {}, endpoint: {}",
                loaded.chunk.default_size_bytes, loaded.concurrency.concurrent_streams, loaded.endpoint.base_url
            );
            Ok(())
        }
        Err(e) => Err(UploadError::InvalidConfiguration(format!("{}: {e}", config.display()))),
    }
}
