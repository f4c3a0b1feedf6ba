use std::sync::{Arc, Mutex};
use std::time::Instant;

use karst_blocks::{Block, BlockRegistry};
use karst_chunk::{ChunkPos, CHUNK_SIZE};
use karst_geom::{Aabb, Vec3};
use karst_gpu::GpuDevice;
use karst_mesh::{
    finish, regenerate_main_mesh, update_block, upload_data_and_finish_neighbors, ChunkMesh,
    MeshBuffers, MeshLookup, StitchError, FACES,
};

use super::node::ChunkMeshNode;
use super::source::ChunkSource;

/// Visibility volume the render crate hands in each frame.
pub trait Culling {
    fn test_aabb(&self, aabb: Aabb) -> bool;
}

/// Accept-everything volume for headless passes and tests.
pub struct NoCull;

impl Culling for NoCull {
    fn test_aabb(&self, _aabb: Aabb) -> bool {
        true
    }
}

/// One pending world edit, applied at the start of the next frame.
#[derive(Clone, Copy, Debug)]
pub struct QueuedBlockUpdate {
    pub wx: i32,
    pub wy: i32,
    pub wz: i32,
    pub block: Block,
}

struct UpdateEntry {
    node: Arc<ChunkMeshNode>,
    remesh: bool,
}

/// Rolling storage for one LOD: a dense box of node slots addressed by chunk
/// cell relative to `origin` (in chunk extents of this level).
struct LodLevel {
    origin: [i32; 3],
    dims: [i32; 3],
    nodes: Vec<Option<Arc<ChunkMeshNode>>>,
}

impl LodLevel {
    fn empty() -> Self {
        Self {
            origin: [0; 3],
            dims: [0; 3],
            nodes: Vec::new(),
        }
    }

    fn index(&self, cell: [i32; 3]) -> Option<usize> {
        let mut idx = 0usize;
        for a in 0..3 {
            let off = cell[a] - self.origin[a];
            if off < 0 || off >= self.dims[a] {
                return None;
            }
            idx = idx * self.dims[a] as usize + off as usize;
        }
        Some(idx)
    }

    fn get(&self, cell: [i32; 3]) -> Option<Arc<ChunkMeshNode>> {
        self.index(cell).and_then(|i| self.nodes[i].clone())
    }
}

struct ViewState {
    player: Vec3,
    render_distance: i32,
    lod_factor: f32,
}

/// The per-LOD ring of chunk nodes around the player. Each level's storage
/// sits behind its own mutex so the render thread can swap a whole array
/// while worker lookups run concurrently.
pub struct LodWindow {
    levels: Vec<Mutex<LodLevel>>,
    clear_list: Mutex<Vec<Arc<ChunkMeshNode>>>,
    updatable: Mutex<Vec<UpdateEntry>>,
    block_updates: Mutex<Vec<QueuedBlockUpdate>>,
    view: Mutex<ViewState>,
    source: Arc<dyn ChunkSource>,
    reg: Arc<BlockRegistry>,
    highest_lod: u8,
}

impl MeshLookup for LodWindow {
    fn mesh_at(&self, pos: ChunkPos) -> Option<Arc<ChunkMesh>> {
        self.node_at(pos).map(|n| n.mesh.clone())
    }
}

impl LodWindow {
    pub fn new(reg: Arc<BlockRegistry>, source: Arc<dyn ChunkSource>, highest_lod: u8) -> Self {
        let highest_lod = highest_lod.min(5);
        let levels = (0..=highest_lod).map(|_| Mutex::new(LodLevel::empty())).collect();
        Self {
            levels,
            clear_list: Mutex::new(Vec::new()),
            updatable: Mutex::new(Vec::new()),
            block_updates: Mutex::new(Vec::new()),
            view: Mutex::new(ViewState {
                player: Vec3::ZERO,
                render_distance: 0,
                lod_factor: 1.0,
            }),
            source,
            reg,
            highest_lod,
        }
    }

    #[inline]
    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.reg
    }

    #[inline]
    pub fn highest_lod(&self) -> u8 {
        self.highest_lod
    }

    fn level_of(&self, voxel_size: i32) -> Option<usize> {
        if voxel_size <= 0 {
            return None;
        }
        let k = voxel_size.trailing_zeros() as usize;
        (k < self.levels.len() && voxel_size == 1 << k).then_some(k)
    }

    pub fn node_at(&self, pos: ChunkPos) -> Option<Arc<ChunkMeshNode>> {
        let k = self.level_of(pos.voxel_size)?;
        let e = pos.extent();
        let cell = [
            pos.wx.div_euclid(e),
            pos.wy.div_euclid(e),
            pos.wz.div_euclid(e),
        ];
        let level = self.levels[k].lock().unwrap_or_else(|p| p.into_inner());
        level.get(cell)
    }

    /// O(1) same-LOD neighbor lookup.
    pub fn get_neighbor(&self, pos: ChunkPos, dir: karst_mesh::Face) -> Option<Arc<ChunkMeshNode>> {
        self.node_at(pos.neighbor(dir.index() as u8))
    }

    /// Block lookup at full detail; `None` while the chunk is absent or its
    /// mesh is busy on a worker.
    pub fn get_block(&self, wx: i32, wy: i32, wz: i32) -> Option<Block> {
        let e = CHUNK_SIZE;
        let pos = ChunkPos::new(
            wx.div_euclid(e) * e,
            wy.div_euclid(e) * e,
            wz.div_euclid(e) * e,
            1,
        );
        let node = self.node_at(pos)?;
        let state = node.mesh.try_lock()?;
        let (x, y, z) = state.chunk.cell_of(wx, wy, wz);
        Some(state.chunk.get(x, y, z))
    }

    pub fn queue_block_update(&self, update: QueuedBlockUpdate) {
        self.block_updates
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(update);
    }

    /// Schedules a mesh for finalize-and-stitch (and optionally a full
    /// re-enumeration first). Duplicate entries collapse.
    pub fn push_updatable(&self, node: Arc<ChunkMeshNode>, remesh: bool) {
        let mut list = self.updatable.lock().unwrap_or_else(|p| p.into_inner());
        for e in list.iter_mut() {
            if Arc::ptr_eq(&e.node, &node) {
                e.remesh |= remesh;
                return;
            }
        }
        list.push(UpdateEntry { node, remesh });
    }

    /// Whether a mesh task is still worth running: its position must lie
    /// within its level's current render sphere.
    pub fn is_still_needed(&self, pos: ChunkPos) -> bool {
        let Some(k) = self.level_of(pos.voxel_size) else {
            return false;
        };
        let view = self.view.lock().unwrap_or_else(|p| p.into_inner());
        let r = level_radius(view.render_distance, view.lod_factor, k as u8);
        pos.min_distance_sq(view.player) <= r * r
    }

    /// The per-frame window pass: materialize the sphere of chunks every LOD
    /// level owes the player, collect visible drawable meshes, keep octant
    /// masks coherent, sweep leavers, and batch one chunk request for
    /// everything missing. Coarser levels run first so children always find
    /// their parent node in fresh storage.
    pub fn update_and_get_render_chunks(
        &self,
        player: Vec3,
        render_distance: i32,
        lod_factor: f32,
        cull: &dyn Culling,
        bufs: &mut MeshBuffers,
        out: &mut Vec<Arc<ChunkMeshNode>>,
    ) {
        {
            let mut view = self.view.lock().unwrap_or_else(|p| p.into_inner());
            view.player = player;
            view.render_distance = render_distance;
            view.lod_factor = lod_factor;
        }
        self.retry_clear_list(bufs);

        let mut requests: Vec<ChunkPos> = Vec::new();
        for k in (0..=self.highest_lod).rev() {
            self.update_level(
                k,
                player,
                level_radius(render_distance, lod_factor, k),
                cull,
                bufs,
                out,
                &mut requests,
            );
        }
        if !requests.is_empty() {
            self.source.request_chunks(&requests);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn update_level(
        &self,
        k: u8,
        player: Vec3,
        radius: f32,
        cull: &dyn Culling,
        bufs: &mut MeshBuffers,
        out: &mut Vec<Arc<ChunkMeshNode>>,
        requests: &mut Vec<ChunkPos>,
    ) {
        let vs = 1i32 << k;
        let extent = CHUNK_SIZE * vs;
        let ef = extent as f32;
        let lo = [
            ((player.x - radius) / ef).floor() as i32,
            ((player.y - radius) / ef).floor() as i32,
            ((player.z - radius) / ef).floor() as i32,
        ];
        let hi = [
            ((player.x + radius) / ef).floor() as i32,
            ((player.y + radius) / ef).floor() as i32,
            ((player.z + radius) / ef).floor() as i32,
        ];
        let mut fresh = LodLevel {
            origin: lo,
            dims: [hi[0] - lo[0] + 1, hi[1] - lo[1] + 1, hi[2] - lo[2] + 1],
            nodes: Vec::new(),
        };
        fresh
            .nodes
            .resize((fresh.dims[0] * fresh.dims[1] * fresh.dims[2]) as usize, None);

        let mut level = self.levels[k as usize]
            .lock()
            .unwrap_or_else(|p| p.into_inner());
        for node in level.nodes.iter().flatten() {
            node.set_should_be_removed(true);
        }

        let r_sq = radius * radius;
        let axis_gap = |cell: i32, p: f32| -> f32 {
            let lo = (cell * extent) as f32;
            (lo - p).max(0.0).max(p - (lo + ef))
        };
        for cx in lo[0]..=hi[0] {
            let dx = axis_gap(cx, player.x);
            if dx * dx > r_sq {
                continue;
            }
            for cy in lo[1]..=hi[1] {
                let dy = axis_gap(cy, player.y);
                if dx * dx + dy * dy > r_sq {
                    continue;
                }
                for cz in lo[2]..=hi[2] {
                    let dz = axis_gap(cz, player.z);
                    if dx * dx + dy * dy + dz * dz > r_sq {
                        continue;
                    }
                    let cell = [cx, cy, cz];
                    let pos = ChunkPos::new(cx * extent, cy * extent, cz * extent, vs);
                    let node = match level.get(cell) {
                        Some(existing) => {
                            existing.set_should_be_removed(false);
                            existing
                        }
                        None => {
                            let created = ChunkMeshNode::new(pos);
                            requests.push(pos);
                            created
                        }
                    };
                    let slot = fresh.index(cell).expect("cell inside fresh bounds");
                    fresh.nodes[slot] = Some(node.clone());
                    node.reset_drawable_children();

                    let drawable = node.mesh.is_drawable();
                    if drawable && cull.test_aabb(pos.aabb()) {
                        out.push(node.clone());
                    }
                    if k < self.highest_lod {
                        if let Some(parent) = self.node_at(pos.parent()) {
                            if drawable {
                                parent.add_drawable_child();
                            }
                            if node.mesh.is_generated() {
                                parent.mesh.clear_octant(pos.octant_in_parent());
                            }
                        }
                    }
                }
            }
        }

        let previous = std::mem::replace(&mut *level, fresh);
        drop(level);

        for node in previous.nodes.into_iter().flatten() {
            if node.should_be_removed() {
                self.evict(node, bufs);
            }
        }
    }

    fn evict(&self, node: Arc<ChunkMeshNode>, bufs: &mut MeshBuffers) {
        let pos = node.pos();
        // The parent re-appears where the child used to be.
        if let Some(parent) = self.node_at(pos.parent()) {
            parent.mesh.set_octant(pos.octant_in_parent());
        }
        // Seams facing the hole get rebuilt.
        for dir in FACES {
            if let Some(neighbor) = self.node_at(pos.neighbor(dir.index() as u8)) {
                self.push_updatable(neighbor, false);
            }
        }
        self.destroy_or_defer(node, bufs);
    }

    fn destroy_or_defer(&self, node: Arc<ChunkMeshNode>, bufs: &mut MeshBuffers) {
        let mut needs_defer = false;
        match node.mesh.try_lock() {
            Some(mut state) => bufs.release(&mut state),
            None => needs_defer = true,
        }
        if needs_defer {
            // A worker still holds the mesh; retried next frame.
            self.clear_list
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .push(node);
        }
    }

    fn retry_clear_list(&self, bufs: &mut MeshBuffers) {
        let pending: Vec<_> = {
            let mut list = self.clear_list.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::take(&mut *list)
        };
        for node in pending {
            self.destroy_or_defer(node, bufs);
        }
    }

    /// Applies queued block updates, then finalizes pending meshes in
    /// priority order until the deadline. Transient failures re-queue.
    pub fn update_meshes(
        &self,
        deadline: Instant,
        player: Vec3,
        bufs: &mut MeshBuffers,
        device: &mut dyn GpuDevice,
    ) {
        self.apply_block_updates(bufs, device);

        let mut deferred: Vec<UpdateEntry> = Vec::new();
        while Instant::now() < deadline {
            let Some(entry) = self.pop_priority_entry(player) else {
                break;
            };
            let node = entry.node;
            // Evicted while queued: the entry (and any payload behind it)
            // dies here. The removal flag alone is not authoritative between
            // sweeps, so check storage identity.
            let still_resident = self
                .node_at(node.pos())
                .is_some_and(|n| Arc::ptr_eq(&n, &node));
            if !still_resident {
                continue;
            }
            if entry.remesh {
                let mut needs_defer = false;
                match node.mesh.try_lock() {
                    Some(mut state) => {
                        regenerate_main_mesh(&mut state, &self.reg);
                        drop(state);
                        node.mesh.bump_revision();
                    }
                    None => needs_defer = true,
                }
                if needs_defer {
                    deferred.push(UpdateEntry { node, remesh: true });
                    continue;
                }
            }
            match upload_data_and_finish_neighbors(&node.mesh, self, &self.reg, bufs, device) {
                Ok(unfinished) => {
                    for mesh in unfinished {
                        if let Some(n) = self.node_at(mesh.pos()) {
                            deferred.push(UpdateEntry {
                                node: n,
                                remesh: false,
                            });
                        }
                    }
                }
                Err(StitchError::Busy) | Err(StitchError::LodMissing) => {
                    deferred.push(UpdateEntry {
                        node,
                        remesh: false,
                    });
                }
            }
        }
        if !deferred.is_empty() {
            let mut list = self.updatable.lock().unwrap_or_else(|p| p.into_inner());
            for e in deferred {
                if !list.iter().any(|x| Arc::ptr_eq(&x.node, &e.node)) {
                    list.push(e);
                }
            }
        }
    }

    fn pop_priority_entry(&self, player: Vec3) -> Option<UpdateEntry> {
        let mut list = self.updatable.lock().unwrap_or_else(|p| p.into_inner());
        if list.is_empty() {
            return None;
        }
        let mut best = 0;
        let mut best_p = f32::NEG_INFINITY;
        for (i, e) in list.iter().enumerate() {
            let p = e.node.pos().priority(player);
            if p > best_p {
                best_p = p;
                best = i;
            }
        }
        Some(list.swap_remove(best))
    }

    fn apply_block_updates(&self, bufs: &mut MeshBuffers, device: &mut dyn GpuDevice) {
        let updates: Vec<QueuedBlockUpdate> = {
            let mut list = self.block_updates.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::take(&mut *list)
        };
        for u in updates {
            match self.apply_one_block_update(u, bufs, device) {
                Ok(()) => {}
                Err(StitchError::Busy) => self.queue_block_update(u),
                Err(StitchError::LodMissing) => {
                    // The chunk left the window before the edit landed.
                    log::debug!(
                        "dropping block update at ({},{},{}): chunk no longer resident",
                        u.wx,
                        u.wy,
                        u.wz
                    );
                }
            }
        }
    }

    fn apply_one_block_update(
        &self,
        u: QueuedBlockUpdate,
        bufs: &mut MeshBuffers,
        device: &mut dyn GpuDevice,
    ) -> Result<(), StitchError> {
        let e = CHUNK_SIZE;
        let pos = ChunkPos::new(
            u.wx.div_euclid(e) * e,
            u.wy.div_euclid(e) * e,
            u.wz.div_euclid(e) * e,
            1,
        );
        let node = self.node_at(pos).ok_or(StitchError::LodMissing)?;
        let mesh = node.mesh.clone();
        let mut state = mesh.try_lock().ok_or(StitchError::Busy)?;
        let edited = update_block(&mesh, &mut state, &self.reg, self, u.wx, u.wy, u.wz, u.block)?;
        finish(&mesh, &mut state, bufs, device, self);
        drop(state);
        for other in edited {
            match other.try_lock() {
                Some(mut ostate) => finish(&other, &mut ostate, bufs, device, self),
                None => {
                    if let Some(n) = self.node_at(other.pos()) {
                        self.push_updatable(n, false);
                    }
                }
            }
        }
        self.refresh_parents(u);
        Ok(())
    }

    /// Folds the edit into every coarser level covering it: the parent chunk
    /// absorbs the child octant and re-enumerates under the frame deadline.
    fn refresh_parents(&self, u: QueuedBlockUpdate) {
        let e = CHUNK_SIZE;
        let mut child_pos = ChunkPos::new(
            u.wx.div_euclid(e) * e,
            u.wy.div_euclid(e) * e,
            u.wz.div_euclid(e) * e,
            1,
        );
        for _ in 1..=self.highest_lod {
            let parent_pos = child_pos.parent();
            let (Some(child), Some(parent)) = (self.node_at(child_pos), self.node_at(parent_pos))
            else {
                break;
            };
            let (Some(cstate), Some(mut pstate)) = (child.mesh.try_lock(), parent.mesh.try_lock())
            else {
                // Best effort: the next full remesh of the parent catches up.
                break;
            };
            pstate
                .chunk
                .update_from_lower_resolution(&cstate.chunk, &self.reg);
            drop(cstate);
            drop(pstate);
            self.push_updatable(parent, true);
            child_pos = parent_pos;
        }
    }
}

fn level_radius(render_distance: i32, lod_factor: f32, k: u8) -> f32 {
    let base = (render_distance * CHUNK_SIZE * (1 << k)) as f32;
    if k > 0 { base * lod_factor } else { base }
}
