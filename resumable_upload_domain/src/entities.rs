// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Entities: domain objects with identity and a persisted, mutable
//! lifecycle, as opposed to the immutable value objects in
//! [`crate::value_objects`].

mod chunk_state;
mod progress_event;
mod queue_item;
mod resource_stats;
mod upload_stats;
mod upload_state;

pub use chunk_state::ChunkState;
pub use progress_event::ProgressEvent;
pub use queue_item::{QueueItem, QueueStatus};
pub use resource_stats::{ResourceStats, ResourceType};
pub use upload_stats::UploadStats;
pub use upload_state::{UploadState, UploadStatus};
