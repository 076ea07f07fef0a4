// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Immutable, self-validating value objects shared across the upload engine.

mod access_token;
mod chunk_key;
mod chunk_size;
mod file_chunk;
mod file_id;
mod mime_type;
mod resume_token;

pub use access_token::AccessToken;
pub use chunk_key::{ChunkKey, FileKey};
pub use chunk_size::ChunkSize;
pub use file_chunk::{ChunkPayload, ChunkTotal, FileChunk, Row};
pub use file_id::FileId;
pub use mime_type::MimeType;
pub use resume_token::ResumeToken;
