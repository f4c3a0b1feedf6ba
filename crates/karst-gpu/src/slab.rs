use std::marker::PhantomData;
use std::mem::size_of;

use bytemuck::Pod;

use super::device::{BufferHandle, GpuDevice};

/// A `(start, len)` run inside a slab buffer, in elements. `len == 0` means
/// "never allocated"; `start` is undefined then.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SlabAllocation {
    pub start: u32,
    pub len: u32,
}

impl SlabAllocation {
    pub const NONE: SlabAllocation = SlabAllocation { start: 0, len: 0 };

    #[inline]
    pub fn is_allocated(self) -> bool {
        self.len != 0
    }
}

/// Typed bindable buffer with slot-based sub-allocation. Allocations are
/// contiguous element runs handed out from a coalescing free list; running
/// out of room doubles the capacity up to a hard ceiling.
pub struct SlabBuffer<T: Pod> {
    label: &'static str,
    handle: BufferHandle,
    capacity: u32,
    max_capacity: u32,
    // Sorted, non-adjacent free runs.
    free: Vec<(u32, u32)>,
    in_frame: bool,
    _marker: PhantomData<T>,
}

impl<T: Pod> SlabBuffer<T> {
    pub fn new(
        device: &mut dyn GpuDevice,
        label: &'static str,
        binding: u32,
        capacity: u32,
        max_capacity: u32,
    ) -> Self {
        let handle = device.create_buffer(binding, capacity as usize * size_of::<T>());
        Self {
            label,
            handle,
            capacity,
            max_capacity,
            free: vec![(0, capacity)],
            in_frame: false,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Elements currently handed out.
    pub fn used(&self) -> u32 {
        self.capacity - self.free.iter().map(|(_, len)| len).sum::<u32>()
    }

    /// Writes `records` into the run described by `alloc`, reallocating when
    /// the run is missing or of the wrong size. On allocator exhaustion the
    /// existing run (and whatever the GPU holds there) stays untouched and
    /// `false` comes back.
    pub fn upload(
        &mut self,
        device: &mut dyn GpuDevice,
        records: &[T],
        alloc: &mut SlabAllocation,
    ) -> bool {
        let len = records.len() as u32;
        if len == 0 {
            self.free(alloc);
            return true;
        }
        if alloc.len != len {
            let Some(start) = self.allocate(device, len) else {
                log::warn!(
                    "{} slab exhausted ({} elements used of {} max); upload skipped",
                    self.label,
                    self.used(),
                    self.max_capacity
                );
                return false;
            };
            // New run secured; only now surrender the old one.
            self.free(alloc);
            *alloc = SlabAllocation { start, len };
        }
        device.upload_bytes(
            self.handle,
            alloc.start as usize * size_of::<T>(),
            bytemuck::cast_slice(records),
        );
        true
    }

    /// Rewrites the leading `records.len()` elements of an existing run in
    /// place, leaving the rest of the run's bytes untouched.
    pub fn write_prefix(
        &mut self,
        device: &mut dyn GpuDevice,
        alloc: SlabAllocation,
        records: &[T],
    ) {
        debug_assert!(alloc.is_allocated());
        debug_assert!(records.len() as u32 <= alloc.len);
        device.upload_bytes(
            self.handle,
            alloc.start as usize * size_of::<T>(),
            bytemuck::cast_slice(records),
        );
    }

    /// Returns a run to the free list. Idempotent on unallocated handles.
    pub fn free(&mut self, alloc: &mut SlabAllocation) {
        if !alloc.is_allocated() {
            return;
        }
        self.release(alloc.start, alloc.len);
        *alloc = SlabAllocation::NONE;
    }

    /// Brackets per-frame use: rebinds so that any reallocation done since
    /// the last frame is visible to the shaders.
    pub fn begin_render(&mut self, device: &mut dyn GpuDevice) {
        debug_assert!(!self.in_frame);
        self.in_frame = true;
        device.bind(self.handle);
    }

    pub fn end_render(&mut self) {
        debug_assert!(self.in_frame);
        self.in_frame = false;
    }

    fn allocate(&mut self, device: &mut dyn GpuDevice, len: u32) -> Option<u32> {
        loop {
            // First fit keeps churned slots hot near the front of the buffer.
            for i in 0..self.free.len() {
                let (start, run) = self.free[i];
                if run >= len {
                    if run == len {
                        self.free.remove(i);
                    } else {
                        self.free[i] = (start + len, run - len);
                    }
                    return Some(start);
                }
            }
            if !self.grow(device, len) {
                return None;
            }
        }
    }

    fn grow(&mut self, device: &mut dyn GpuDevice, need: u32) -> bool {
        let mut new_cap = self.capacity.max(1);
        while new_cap - self.capacity < need {
            new_cap = match new_cap.checked_mul(2) {
                Some(c) => c.min(self.max_capacity),
                None => self.max_capacity,
            };
            if new_cap == self.capacity {
                return false;
            }
        }
        if new_cap > self.max_capacity {
            return false;
        }
        if !device.resize_buffer(self.handle, new_cap as usize * size_of::<T>()) {
            return false;
        }
        let added = new_cap - self.capacity;
        let old_cap = self.capacity;
        self.capacity = new_cap;
        self.release(old_cap, added);
        true
    }

    fn release(&mut self, start: u32, len: u32) {
        debug_assert!(start + len <= self.capacity);
        let at = self.free.partition_point(|(s, _)| *s < start);
        debug_assert!(
            at == 0 || {
                let (ps, pl) = self.free[at - 1];
                ps + pl <= start
            },
            "double free in {} slab",
            self.label
        );
        debug_assert!(
            at == self.free.len() || start + len <= self.free[at].0,
            "double free in {} slab",
            self.label
        );
        self.free.insert(at, (start, len));
        // Coalesce with both sides so long runs stay allocatable.
        if at + 1 < self.free.len() {
            let (ns, nl) = self.free[at + 1];
            if start + len == ns {
                self.free[at].1 += nl;
                self.free.remove(at + 1);
            }
        }
        if at > 0 {
            let (ps, pl) = self.free[at - 1];
            if ps + pl == start {
                self.free[at - 1].1 += self.free[at].1;
                self.free.remove(at);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HeadlessDevice;

    #[test]
    fn upload_allocates_and_round_trips() {
        let mut dev = HeadlessDevice::new();
        let mut slab: SlabBuffer<u32> = SlabBuffer::new(&mut dev, "test", 3, 8, 64);
        let mut a = SlabAllocation::NONE;
        assert!(slab.upload(&mut dev, &[1, 2, 3], &mut a));
        assert_eq!(a.len, 3);
        let bytes = dev.bytes(slab.handle());
        assert_eq!(&bytes[a.start as usize * 4..(a.start + 3) as usize * 4],
                   bytemuck::cast_slice::<u32, u8>(&[1, 2, 3]));
    }

    #[test]
    fn regrowth_doubles_capacity() {
        let mut dev = HeadlessDevice::new();
        let mut slab: SlabBuffer<u32> = SlabBuffer::new(&mut dev, "test", 3, 2, 64);
        let mut a = SlabAllocation::NONE;
        assert!(slab.upload(&mut dev, &[0; 7], &mut a));
        assert!(slab.capacity() >= 7);
        assert_eq!(slab.capacity() % 2, 0);
    }

    #[test]
    fn exhaustion_keeps_old_allocation() {
        let mut dev = HeadlessDevice::new();
        let mut slab: SlabBuffer<u32> = SlabBuffer::new(&mut dev, "test", 3, 4, 4);
        let mut a = SlabAllocation::NONE;
        assert!(slab.upload(&mut dev, &[9, 9], &mut a));
        let kept = a;
        assert!(!slab.upload(&mut dev, &[0; 16], &mut a));
        assert_eq!(a, kept);
    }

    #[test]
    fn free_coalesces_neighbors() {
        let mut dev = HeadlessDevice::new();
        let mut slab: SlabBuffer<u32> = SlabBuffer::new(&mut dev, "test", 3, 8, 8);
        let mut a = SlabAllocation::NONE;
        let mut b = SlabAllocation::NONE;
        let mut c = SlabAllocation::NONE;
        assert!(slab.upload(&mut dev, &[1; 3], &mut a));
        assert!(slab.upload(&mut dev, &[2; 3], &mut b));
        assert!(slab.upload(&mut dev, &[3; 2], &mut c));
        assert_eq!(slab.used(), 8);
        slab.free(&mut a);
        slab.free(&mut c);
        slab.free(&mut b);
        assert_eq!(slab.used(), 0);
        // The whole buffer is one run again.
        let mut d = SlabAllocation::NONE;
        assert!(slab.upload(&mut dev, &[7; 8], &mut d));
        assert_eq!(d.start, 0);
    }

    #[test]
    fn zero_length_upload_frees() {
        let mut dev = HeadlessDevice::new();
        let mut slab: SlabBuffer<u32> = SlabBuffer::new(&mut dev, "test", 3, 8, 8);
        let mut a = SlabAllocation::NONE;
        assert!(slab.upload(&mut dev, &[1, 2], &mut a));
        assert!(slab.upload(&mut dev, &[], &mut a));
        assert!(!a.is_allocated());
        assert_eq!(slab.used(), 0);
    }
}
