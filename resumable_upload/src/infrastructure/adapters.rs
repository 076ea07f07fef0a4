// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Concrete implementations of the domain's service ports.

pub mod chunk_cache_lru;
pub mod chunker_size;
pub mod chunker_tabular;
pub mod compression_deflate;
pub mod encryption_aes_gcm;
pub mod rate_limiter_dashmap;
pub mod state_store_memory;
pub mod state_store_sqlite;
pub mod upload_sink_reqwest;
