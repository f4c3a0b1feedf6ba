use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use karst_chunk::{Chunk, ChunkPos};
use karst_mesh::regenerate_main_mesh;

use super::window::LodWindow;

/// A populated grid delivered by the chunk source: packed block words plus
/// the optional per-voxel light volume.
pub struct ChunkPayload {
    pub pos: ChunkPos,
    pub blocks: Vec<u32>,
    pub light: Option<Vec<u8>>,
}

/// Worker pool turning chunk payloads into meshed chunks. Payloads are
/// dispatched round-robin to per-worker channels; each worker installs the
/// grid under the mesh lock, enumerates faces, and hands the node back to the
/// window's updatable list for the render thread to finalize.
pub struct Runtime {
    job_tx: mpsc::Sender<ChunkPayload>,
    // Held so the worker channels outlive the dispatcher.
    _worker_txs: Vec<mpsc::Sender<ChunkPayload>>,
    queued: Arc<AtomicUsize>,
    inflight: Arc<AtomicUsize>,
    pub workers: usize,
}

impl Runtime {
    pub fn new(window: Arc<LodWindow>) -> Self {
        let (job_tx, job_rx) = mpsc::channel::<ChunkPayload>();
        let worker_count = thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1).max(1))
            .unwrap_or(4);
        let queued = Arc::new(AtomicUsize::new(0));
        let inflight = Arc::new(AtomicUsize::new(0));

        let mut worker_txs: Vec<mpsc::Sender<ChunkPayload>> = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let (wtx, wrx) = mpsc::channel::<ChunkPayload>();
            worker_txs.push(wtx);
            let w = window.clone();
            let inflight_c = inflight.clone();
            thread::spawn(move || {
                while let Ok(payload) = wrx.recv() {
                    run_mesh_job(&w, payload);
                    inflight_c.fetch_sub(1, Ordering::Relaxed);
                }
            });
        }

        // Round-robin dispatcher with a cancellation check at pop time.
        {
            let worker_txs = worker_txs.clone();
            let w = window;
            let queued_c = queued.clone();
            let inflight_c = inflight.clone();
            thread::spawn(move || {
                let mut i = 0usize;
                while let Ok(payload) = job_rx.recv() {
                    queued_c.fetch_sub(1, Ordering::Relaxed);
                    if !w.is_still_needed(payload.pos) {
                        continue;
                    }
                    if !worker_txs.is_empty() {
                        inflight_c.fetch_add(1, Ordering::Relaxed);
                        let _ = worker_txs[i % worker_txs.len()].send(payload);
                        i = i.wrapping_add(1);
                    }
                }
            });
        }

        Self {
            job_tx,
            _worker_txs: worker_txs,
            queued,
            inflight,
            workers: worker_count,
        }
    }

    /// Hands a populated grid from the chunk source to the worker pool.
    pub fn submit_payload(&self, payload: ChunkPayload) {
        self.queued.fetch_add(1, Ordering::Relaxed);
        let _ = self.job_tx.send(payload);
    }

    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Relaxed)
    }
}

fn run_mesh_job(window: &LodWindow, payload: ChunkPayload) {
    // The node may have been swept while this job sat in a queue; detecting
    // the absence here just drops the payload.
    let Some(node) = window.node_at(payload.pos) else {
        return;
    };
    let reg = window.registry();
    let mut chunk = Chunk::from_payload(payload.pos, &payload.blocks, reg);
    if let Some(light) = payload.light {
        chunk.set_light(light);
    }
    {
        let mut state = node.mesh.lock();
        state.chunk = chunk;
        regenerate_main_mesh(&mut state, reg);
    }
    node.mesh.mark_generated();
    node.mesh.bump_revision();
    window.push_updatable(node, false);
}
