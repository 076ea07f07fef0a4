// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Runtime primitives shared across uploads: resource accounting, the bounded
//! worker pool, the per-file chunk pipeline, and a write-through decorator
//! over any [`StateStore`](resumable_upload_domain::services::StateStore).

pub mod caching_state_store;
pub mod pipeline;
pub mod resource_accountant;
pub mod worker_pool;
