// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Application services: the orchestration layer sitting between the
//! presentation surface (CLI) and the infrastructure adapters. Neither
//! module here talks to a file, a socket, or a database directly -- they
//! drive the C10 pipeline and the C6/C8/C9 infrastructure ports to implement
//! the upload state machine (C11) and the cross-file scheduler (C12).

pub mod queue_scheduler;
pub mod upload_manager;

pub use queue_scheduler::{QueueEvent, QueueScheduler};
pub use upload_manager::{ProgressCallback, ProgressSnapshot, UploadManager, UploadRequest};
