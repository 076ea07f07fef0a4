// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The wire shape a transport adapter (e.g. a WebSocket push layer, kept
//! outside this crate) serializes to notify a remote client of upload
//! progress. Nothing in this crate opens a socket; [`ProgressEvent`] is only
//! ever constructed and handed to a caller-supplied sink.

use crate::entities::UploadStatus;
use crate::value_objects::FileId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    Progress {
        file_id: FileId,
        bytes_uploaded: u64,
        total_bytes: u64,
        status: UploadStatus,
        upload_speed: Option<f64>,
        estimated_time_remaining: Option<f64>,
    },
    Complete {
        file_id: FileId,
        bytes_uploaded: u64,
        total_bytes: u64,
    },
    Error {
        file_id: FileId,
        status: UploadStatus,
        error: String,
    },
    Queued {
        file_id: FileId,
        queue_position: usize,
    },
}

impl ProgressEvent {
    pub fn file_id(&self) -> FileId {
        match self {
            ProgressEvent::Progress { file_id, .. }
            | ProgressEvent::Complete { file_id, .. }
            | ProgressEvent::Error { file_id, .. }
            | ProgressEvent::Queued { file_id, .. } => *file_id,
        }
    }
}
