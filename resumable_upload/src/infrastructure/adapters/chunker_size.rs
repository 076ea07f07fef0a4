// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Size-Mode Chunker (C1, default path)
//!
//! Splits an arbitrary file into fixed-size byte windows using
//! [`size_mode_chunk_range`]. Reads are seeked and bounded -- the whole
//! file is never loaded into memory regardless of its size.

use async_trait::async_trait;
use resumable_upload_domain::services::{size_mode_chunk_range, ChunkerService, FileTypeConfig};
use resumable_upload_domain::value_objects::{ChunkSize, ChunkTotal, FileChunk};
use resumable_upload_domain::UploadError;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

pub struct SizeModeChunker {
    file: File,
    file_size: u64,
    chunk_size: ChunkSize,
    next_index: u64,
    total_chunks: u64,
}

impl SizeModeChunker {
    pub async fn open(path: &str, chunk_size: ChunkSize) -> Result<Self, UploadError> {
        let file = File::open(path).await?;
        let file_size = file.metadata().await?.len();
        let total_chunks = chunk_size.chunks_needed_for_file(file_size);
        Ok(Self {
            file,
            file_size,
            chunk_size,
            next_index: 0,
            total_chunks,
        })
    }
}

#[async_trait]
impl ChunkerService for SizeModeChunker {
    fn total_chunks(&self, file_size: u64, config: &FileTypeConfig) -> Option<u64> {
        Some(ChunkSize::new(config.value as usize).ok()?.chunks_needed_for_file(file_size))
    }

    async fn next_chunk(&mut self) -> Result<Option<FileChunk>, UploadError> {
        let Some((start, end)) = size_mode_chunk_range(self.next_index, &self.chunk_size, self.file_size) else {
            return Ok(None);
        };
        self.file.seek(std::io::SeekFrom::Start(start)).await?;
        let mut buf = vec![0u8; (end - start) as usize];
        self.file.read_exact(&mut buf).await?;
        let chunk = FileChunk::new_binary(self.next_index, start, buf, ChunkTotal::Known(self.total_chunks))?;
        self.next_index += 1;
        Ok(Some(chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[tokio::test]
    async fn chunks_cover_the_whole_file_in_order() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&vec![7u8; 2500]).unwrap();
        let chunk_size = ChunkSize::from_kb(1).unwrap();
        let mut chunker = SizeModeChunker::open(tmp.path().to_str().unwrap(), chunk_size).await.unwrap();

        let mut total_bytes = 0usize;
        let mut count = 0u64;
        while let Some(chunk) = chunker.next_chunk().await.unwrap() {
            total_bytes += chunk.payload().len();
            count += 1;
        }
        assert_eq!(total_bytes, 2500);
        assert_eq!(count, 3);
    }
}
