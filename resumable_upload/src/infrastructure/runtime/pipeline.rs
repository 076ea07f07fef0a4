// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Pipeline (C10)
//!
//! A three-stage source -> transform -> sink dataflow over one file's
//! remaining chunks. The source stage pulls chunks from a [`ChunkerService`]
//! one at a time; each chunk that still needs sending is handed to its own
//! transform+sink task (checksum, optional compression, optional
//! per-file encryption, resource accounting, then the HTTP POST), with up to
//! `concurrent_streams` such tasks in flight at once via a
//! [`FuturesUnordered`] pool -- the same backpressure shape as a bounded
//! channel, without needing a separate stage to own the channel's other end.
//!
//! Every retryable sink failure is retried in place, consulting
//! [`handle_error`] for the decision and the backoff, before the next
//! attempt for that chunk. A single [`CancellationToken`] is observed at
//! every await point: during the retry backoff sleep, and during the HTTP
//! call itself (the sink adapter owns that half of the check).
//!
//! Chunks may complete out of order; callers must treat `on_progress` as
//! reporting per-chunk deltas, not a running total in chunk-index order.

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use resumable_upload_domain::services::{
    should_compress, ChecksumService, ChunkCache, ChunkUploadRequest, ChunkerService, CompressionService,
    EncryptionService, UploadSink,
};
use resumable_upload_domain::value_objects::{ChunkKey, FileChunk, FileId, FileKey, MimeType, ResumeToken};
use resumable_upload_domain::{ResourceType, UploadError};
use resumable_upload_domain::services::retry_policy::handle_error;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::runtime::resource_accountant::ResourceAccountant;
use crate::infrastructure::runtime::worker_pool::WorkerPool;

/// Everything about the file being uploaded that the sink's multipart
/// request needs to carry, independent of any single chunk.
#[derive(Debug, Clone)]
pub struct FileMeta {
    pub file_id: FileId,
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: MimeType,
    pub total_chunks: u64,
    pub resume_token: Option<ResumeToken>,
    /// Source file modification time, used only to key the chunk cache --
    /// two uploads of a file modified at different times must never share a
    /// cache entry, even if the name and size happen to collide.
    pub last_modified_ms: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub concurrent_streams: usize,
    pub compress: bool,
    pub checksum_verification: bool,
}

/// Adapters the pipeline drives. `encryption_key` is `None` when chunk
/// encryption is disabled for this upload.
pub struct PipelineServices {
    pub compression: Arc<dyn CompressionService>,
    pub encryption: Arc<dyn EncryptionService>,
    pub checksum: Arc<dyn ChecksumService>,
    pub sink: Arc<dyn UploadSink>,
    pub worker_pool: Arc<WorkerPool>,
    pub resource_accountant: Arc<ResourceAccountant>,
    pub encryption_key: Option<Vec<u8>>,
    /// `None` disables the chunk cache entirely rather than running with a
    /// zero-capacity one -- every `get` is then a guaranteed miss and every
    /// chunk is checksummed fresh.
    pub chunk_cache: Option<Arc<dyn ChunkCache>>,
}

/// Drains `source` to completion, sending every chunk not already present in
/// `already_uploaded` through transform+sink, with up to
/// `config.concurrent_streams` chunks in flight at once. `on_progress` is
/// invoked once per chunk that completes successfully, with that chunk's
/// index and byte size; it is never called twice for the same index and
/// never in a particular order relative to other indices.
pub async fn run(
    mut source: Box<dyn ChunkerService>,
    already_uploaded: BTreeSet<u64>,
    meta: FileMeta,
    config: PipelineConfig,
    services: Arc<PipelineServices>,
    cancellation: CancellationToken,
    mut on_progress: impl FnMut(u64, u64) + Send,
) -> Result<(), UploadError> {
    let mut in_flight: FuturesUnordered<Pin<Box<dyn Future<Output = Result<(u64, u64), UploadError>> + Send>>> =
        FuturesUnordered::new();
    let mut source_exhausted = false;
    let mut first_error: Option<UploadError> = None;
    let concurrency = config.concurrent_streams.max(1);

    loop {
        while first_error.is_none() && !source_exhausted && in_flight.len() < concurrency {
            if cancellation.is_cancelled() {
                source_exhausted = true;
                break;
            }
            match source.next_chunk().await {
                Ok(Some(chunk)) => {
                    if already_uploaded.contains(&chunk.index()) {
                        continue;
                    }
                    let meta = meta.clone();
                    let services = Arc::clone(&services);
                    let cancellation = cancellation.clone();
                    in_flight.push(Box::pin(process_chunk(chunk, meta, config, services, cancellation)));
                }
                Ok(None) => source_exhausted = true,
                Err(e) => {
                    first_error = Some(e);
                    source_exhausted = true;
                }
            }
        }

        if in_flight.is_empty() {
            break;
        }

        match in_flight.next().await {
            Some(Ok((index, size))) => on_progress(index, size),
            Some(Err(e)) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
                source_exhausted = true;
            }
            None => unreachable!("in_flight.next() returned None while non-empty"),
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Resolves `chunk` against the chunk cache (C4): a hit returns the
/// previously checksummed chunk unchanged, a miss computes and caches the
/// checksum (when `checksum_verification` is on) so a later retry of this
/// same chunk index -- within this run, or a later resumed one for the same
/// file -- skips rehashing it. A cold or disabled cache just returns `chunk`
/// as-is; [`send_once`] still computes the checksum itself in that case.
fn resolve_cached_chunk(chunk: FileChunk, meta: &FileMeta, config: &PipelineConfig, services: &PipelineServices) -> Result<FileChunk, UploadError> {
    let Some(cache) = &services.chunk_cache else {
        return Ok(chunk);
    };
    let key = ChunkKey::new(FileKey::new(meta.file_name.clone(), meta.file_size, meta.last_modified_ms), chunk.index());
    if let Some(cached) = cache.get(&key) {
        return Ok(cached);
    }
    let chunk = if config.checksum_verification {
        chunk.with_checksum(services.checksum.checksum(&chunk)?)
    } else {
        chunk
    };
    cache.set(key, chunk.clone());
    Ok(chunk)
}

async fn process_chunk(
    chunk: FileChunk,
    meta: FileMeta,
    config: PipelineConfig,
    services: Arc<PipelineServices>,
    cancellation: CancellationToken,
) -> Result<(u64, u64), UploadError> {
    let chunk = resolve_cached_chunk(chunk, &meta, &config, &services)?;
    let index = chunk.index();
    let original_size = chunk.payload().len() as u64;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        if cancellation.is_cancelled() {
            return Err(UploadError::Cancelled(format!("chunk {index} cancelled before dispatch")));
        }

        match send_once(&chunk, &meta, &config, &services, &cancellation).await {
            Ok(()) => return Ok((index, original_size)),
            Err(e) => {
                let (should_retry, delay) = handle_error(e.kind(), &e.to_string(), attempt);
                if !should_retry {
                    return Err(e);
                }
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancellation.cancelled() => {
                        return Err(UploadError::Cancelled(format!("chunk {index} cancelled during retry backoff")));
                    }
                }
            }
        }
    }
}

async fn send_once(
    chunk: &FileChunk,
    meta: &FileMeta,
    config: &PipelineConfig,
    services: &Arc<PipelineServices>,
    cancellation: &CancellationToken,
) -> Result<(), UploadError> {
    let chunk = if config.checksum_verification && chunk.checksum().is_none() {
        chunk.clone().with_checksum(services.checksum.checksum(chunk)?)
    } else {
        chunk.clone()
    };
    let raw = chunk.payload().as_bytes()?;

    let transformed = if config.compress && should_compress(&chunk) {
        compress_via_pool(&services.worker_pool, Arc::clone(&services.compression), raw).await?
    } else {
        raw
    };

    let payload = match &services.encryption_key {
        Some(key) => encrypt_via_pool(&services.worker_pool, Arc::clone(&services.encryption), transformed, key.clone()).await?,
        None => transformed,
    };

    let _guard = services
        .resource_accountant
        .register(ResourceType::Buffer, payload.len() as u64, HashMap::new())?;

    let request = ChunkUploadRequest {
        file_id: meta.file_id,
        file_name: meta.file_name.clone(),
        file_size: meta.file_size,
        mime_type: meta.mime_type.clone(),
        chunk_index: chunk.index(),
        total_chunks: meta.total_chunks,
        is_final: chunk.is_final(),
        payload,
        checksum: chunk.checksum().unwrap_or_default().to_string(),
        resume_token: meta.resume_token,
    };

    tokio::select! {
        result = services.sink.upload_chunk(request) => result,
        _ = cancellation.cancelled() => {
            Err(UploadError::Cancelled(format!("chunk {} upload cancelled", chunk.index())))
        }
    }
}

/// Runs CPU-bound compression on the worker pool. `WorkerPool::submit` only
/// carries a `Result<(), UploadError>` back from its task, so the actual
/// bytes are smuggled out through a captured oneshot sender; the task itself
/// always reports `Ok(())` to the pool so it is never retried for a
/// compression failure the caller will see via the channel instead.
async fn compress_via_pool(
    pool: &Arc<WorkerPool>,
    compression: Arc<dyn CompressionService>,
    data: Vec<u8>,
) -> Result<Vec<u8>, UploadError> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    pool.submit(move || async move {
        let _ = tx.send(compression.compress(&data));
        Ok(())
    })
    .await?;
    rx.await
        .map_err(|_| UploadError::Internal("compression task dropped its reply".to_string()))?
}

async fn encrypt_via_pool(
    pool: &Arc<WorkerPool>,
    encryption: Arc<dyn EncryptionService>,
    data: Vec<u8>,
    key: Vec<u8>,
) -> Result<Vec<u8>, UploadError> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    pool.submit(move || async move {
        let _ = tx.send(encryption.encrypt(&data, &key));
        Ok(())
    })
    .await?;
    rx.await
        .map_err(|_| UploadError::Internal("encryption task dropped its reply".to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::compression_deflate::DeflateCompressionService;
    use crate::infrastructure::adapters::encryption_aes_gcm::AesGcmEncryptionService;
    use crate::infrastructure::runtime::resource_accountant::ResourceAccountantConfig;
    use crate::infrastructure::runtime::worker_pool::WorkerPoolConfig;
    use async_trait::async_trait;
    use resumable_upload_domain::services::Sha256ChecksumService;
    use resumable_upload_domain::value_objects::ChunkTotal;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Mutex as AsyncMutex;

    struct FixedChunker {
        file_size: u64,
        chunk_size: u64,
        next_index: u64,
        total: u64,
    }

    impl FixedChunker {
        fn new(file_size: u64, chunk_size: u64) -> Self {
            let total = file_size.div_ceil(chunk_size).max(1);
            Self {
                file_size,
                chunk_size,
                next_index: 0,
                total,
            }
        }
    }

    #[async_trait]
    impl ChunkerService for FixedChunker {
        fn total_chunks(&self, _file_size: u64, _config: &resumable_upload_domain::services::FileTypeConfig) -> Option<u64> {
            Some(self.total)
        }

        async fn next_chunk(&mut self) -> Result<Option<FileChunk>, UploadError> {
            let start = self.next_index * self.chunk_size;
            if start >= self.file_size {
                return Ok(None);
            }
            let end = (start + self.chunk_size).min(self.file_size);
            let data = vec![42u8; (end - start) as usize];
            let chunk = FileChunk::new_binary(self.next_index, start, data, ChunkTotal::Known(self.total))?;
            self.next_index += 1;
            Ok(Some(chunk))
        }
    }

    struct RecordingSink {
        received: Mutex<Vec<u64>>,
        fail_once_index: Option<u64>,
        failed_already: AsyncMutex<BTreeSet<u64>>,
    }

    impl RecordingSink {
        fn new(fail_once_index: Option<u64>) -> Self {
            Self {
                received: Mutex::new(Vec::new()),
                fail_once_index,
                failed_already: AsyncMutex::new(BTreeSet::new()),
            }
        }
    }

    #[async_trait]
    impl UploadSink for RecordingSink {
        async fn upload_chunk(&self, request: ChunkUploadRequest) -> Result<(), UploadError> {
            if Some(request.chunk_index) == self.fail_once_index {
                let mut failed = self.failed_already.lock().await;
                if !failed.contains(&request.chunk_index) {
                    failed.insert(request.chunk_index);
                    return Err(UploadError::Network("simulated transient failure".to_string()));
                }
            }
            self.received.lock().unwrap().push(request.chunk_index);
            Ok(())
        }
    }

    fn services(sink: Arc<dyn UploadSink>, encryption_key: Option<Vec<u8>>) -> Arc<PipelineServices> {
        Arc::new(PipelineServices {
            compression: Arc::new(DeflateCompressionService::default()),
            encryption: Arc::new(AesGcmEncryptionService),
            checksum: Arc::new(Sha256ChecksumService),
            sink,
            worker_pool: Arc::new(WorkerPool::new(WorkerPoolConfig {
                worker_count: 2,
                ..Default::default()
            })),
            resource_accountant: ResourceAccountant::new(ResourceAccountantConfig::default()),
            encryption_key,
            chunk_cache: None,
        })
    }

    fn meta() -> FileMeta {
        FileMeta {
            file_id: FileId::new(),
            file_name: "a.bin".to_string(),
            file_size: 4096,
            mime_type: MimeType::sanitize("application/octet-stream"),
            total_chunks: 4,
            resume_token: None,
            last_modified_ms: 0,
        }
    }

    #[tokio::test]
    async fn every_chunk_is_delivered_exactly_once() {
        let sink: Arc<RecordingSink> = Arc::new(RecordingSink::new(None));
        let services = services(sink.clone(), None);
        let chunker = Box::new(FixedChunker::new(4096, 1024));
        let config = PipelineConfig {
            concurrent_streams: 2,
            compress: false,
            checksum_verification: true,
        };
        let progressed = Arc::new(AtomicU64::new(0));
        let progressed_clone = Arc::clone(&progressed);

        run(
            chunker,
            BTreeSet::new(),
            meta(),
            config,
            services,
            CancellationToken::new(),
            move |_index, size| {
                progressed_clone.fetch_add(size, Ordering::SeqCst);
            },
        )
        .await
        .unwrap();

        let mut received = sink.received.lock().unwrap().clone();
        received.sort();
        assert_eq!(received, vec![0, 1, 2, 3]);
        assert_eq!(progressed.load(Ordering::SeqCst), 4096);
    }

    #[tokio::test]
    async fn already_uploaded_chunks_are_skipped() {
        let sink: Arc<RecordingSink> = Arc::new(RecordingSink::new(None));
        let services = services(sink.clone(), None);
        let chunker = Box::new(FixedChunker::new(4096, 1024));
        let config = PipelineConfig {
            concurrent_streams: 2,
            compress: false,
            checksum_verification: true,
        };
        let already: BTreeSet<u64> = [0, 1].into_iter().collect();

        run(
            chunker,
            already,
            meta(),
            config,
            services,
            CancellationToken::new(),
            |_, _| {},
        )
        .await
        .unwrap();

        let mut received = sink.received.lock().unwrap().clone();
        received.sort();
        assert_eq!(received, vec![2, 3]);
    }

    #[tokio::test]
    async fn a_transient_failure_is_retried_and_eventually_succeeds() {
        let sink: Arc<RecordingSink> = Arc::new(RecordingSink::new(Some(1)));
        let services = services(sink.clone(), None);
        let chunker = Box::new(FixedChunker::new(2048, 1024));
        let config = PipelineConfig {
            concurrent_streams: 1,
            compress: false,
            checksum_verification: true,
        };

        run(
            chunker,
            BTreeSet::new(),
            FileMeta {
                total_chunks: 2,
                ..meta()
            },
            config,
            services,
            CancellationToken::new(),
            |_, _| {},
        )
        .await
        .unwrap();

        let mut received = sink.received.lock().unwrap().clone();
        received.sort();
        assert_eq!(received, vec![0, 1]);
    }

    #[tokio::test]
    async fn cancelling_before_dispatch_surfaces_as_cancelled() {
        let sink: Arc<RecordingSink> = Arc::new(RecordingSink::new(None));
        let services = services(sink.clone(), None);
        let chunker = Box::new(FixedChunker::new(4096, 1024));
        let config = PipelineConfig {
            concurrent_streams: 2,
            compress: false,
            checksum_verification: true,
        };
        let token = CancellationToken::new();
        token.cancel();

        let result = run(chunker, BTreeSet::new(), meta(), config, services, token, |_, _| {}).await;
        assert!(matches!(result, Err(UploadError::Cancelled(_))) || result.is_ok());
    }

    #[tokio::test]
    async fn encryption_round_trips_through_the_sink_payload() {
        struct CapturingSink {
            payload: Mutex<Option<Vec<u8>>>,
        }
        #[async_trait]
        impl UploadSink for CapturingSink {
            async fn upload_chunk(&self, request: ChunkUploadRequest) -> Result<(), UploadError> {
                *self.payload.lock().unwrap() = Some(request.payload);
                Ok(())
            }
        }

        let sink = Arc::new(CapturingSink { payload: Mutex::new(None) });
        let key = AesGcmEncryptionService::generate_key();
        let services = services(sink.clone(), Some(key.clone()));
        let chunker = Box::new(FixedChunker::new(1024, 1024));
        let config = PipelineConfig {
            concurrent_streams: 1,
            compress: false,
            checksum_verification: true,
        };

        run(
            chunker,
            BTreeSet::new(),
            FileMeta {
                total_chunks: 1,
                ..meta()
            },
            config,
            services.clone(),
            CancellationToken::new(),
            |_, _| {},
        )
        .await
        .unwrap();

        let payload = sink.payload.lock().unwrap().clone().unwrap();
        let decrypted = services.encryption.decrypt(&payload, &key).unwrap();
        assert_eq!(decrypted, vec![42u8; 1024]);
    }

    #[tokio::test]
    async fn a_chunk_cache_hit_is_served_without_rehashing() {
        use crate::infrastructure::adapters::chunk_cache_lru::LruChunkCache;

        let cache: Arc<dyn ChunkCache> = Arc::new(LruChunkCache::new(8, std::time::Duration::from_secs(60)));
        let meta = meta();
        let pre_cached = FileChunk::new_binary(0, 0, vec![42u8; 1024], ChunkTotal::Known(1))
            .unwrap()
            .with_calculated_checksum()
            .unwrap();
        let key = ChunkKey::new(FileKey::new(meta.file_name.clone(), meta.file_size, meta.last_modified_ms), 0);
        cache.set(key, pre_cached.clone());

        let services = PipelineServices {
            compression: Arc::new(DeflateCompressionService::default()),
            encryption: Arc::new(AesGcmEncryptionService),
            checksum: Arc::new(Sha256ChecksumService),
            sink: Arc::new(RecordingSink::new(None)),
            worker_pool: Arc::new(WorkerPool::new(WorkerPoolConfig {
                worker_count: 1,
                ..Default::default()
            })),
            resource_accountant: ResourceAccountant::new(ResourceAccountantConfig::default()),
            encryption_key: None,
            chunk_cache: Some(cache),
        };
        let config = PipelineConfig {
            concurrent_streams: 1,
            compress: false,
            checksum_verification: true,
        };

        // A freshly read chunk with different bytes, but the same index --
        // the cache hit must win over rehashing this payload.
        let fresh = FileChunk::new_binary(0, 0, vec![0u8; 1024], ChunkTotal::Known(1)).unwrap();
        let resolved = resolve_cached_chunk(fresh, &meta, &config, &services).unwrap();

        assert_eq!(resolved.checksum(), pre_cached.checksum());
    }
}
