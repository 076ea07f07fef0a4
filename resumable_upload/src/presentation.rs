// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Presentation layer: translates a validated CLI command into calls
//! against [`crate::application`] and renders the result. Nothing here owns
//! upload state -- it only drives the [`UploadManager`](crate::UploadManager)
//! and [`QueueScheduler`](crate::QueueScheduler) the composition root built.

pub mod cli;
pub mod progress;

pub use cli::dispatch;
