use karst_chunk::ChunkPos;

/// The network collaborator: the window batches one request per frame for
/// every position it materialized without data. Populated grids come back
/// asynchronously through [`crate::Runtime::submit_payload`].
pub trait ChunkSource: Send + Sync {
    fn request_chunks(&self, positions: &[ChunkPos]);
}

/// Source that never answers; headless passes and tests.
pub struct NullChunkSource;

impl ChunkSource for NullChunkSource {
    fn request_chunks(&self, _positions: &[ChunkPos]) {}
}
