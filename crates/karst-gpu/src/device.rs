/// Opaque buffer identity issued by a [`GpuDevice`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

/// The driver-facing surface the engine needs from a GPU: create, grow,
/// write, and bind large storage buffers. A real backend wraps the driver's
/// shader-storage objects; all calls must come from the render thread.
pub trait GpuDevice {
    /// Creates a zero-filled buffer bound at a fixed binding index.
    fn create_buffer(&mut self, binding: u32, byte_len: usize) -> BufferHandle;

    /// Grows a buffer, preserving its current contents. Returns `false` when
    /// the driver cannot satisfy the new size; the buffer keeps its old
    /// length in that case.
    fn resize_buffer(&mut self, handle: BufferHandle, byte_len: usize) -> bool;

    /// Writes `bytes` at `byte_offset`.
    fn upload_bytes(&mut self, handle: BufferHandle, byte_offset: usize, bytes: &[u8]);

    /// (Re)binds the buffer at its binding index.
    fn bind(&mut self, handle: BufferHandle);
}

/// In-memory device: backs buffers with plain byte vectors. Serves headless
/// runs and the test suites; byte-for-byte what a real driver would hold.
#[derive(Default)]
pub struct HeadlessDevice {
    buffers: Vec<Vec<u8>>,
    bindings: Vec<u32>,
    bind_calls: usize,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self, handle: BufferHandle) -> &[u8] {
        &self.buffers[handle.0 as usize]
    }

    pub fn binding_of(&self, handle: BufferHandle) -> u32 {
        self.bindings[handle.0 as usize]
    }

    pub fn bind_calls(&self) -> usize {
        self.bind_calls
    }
}

impl GpuDevice for HeadlessDevice {
    fn create_buffer(&mut self, binding: u32, byte_len: usize) -> BufferHandle {
        let handle = BufferHandle(self.buffers.len() as u32);
        self.buffers.push(vec![0; byte_len]);
        self.bindings.push(binding);
        handle
    }

    fn resize_buffer(&mut self, handle: BufferHandle, byte_len: usize) -> bool {
        let buf = &mut self.buffers[handle.0 as usize];
        buf.resize(byte_len, 0);
        true
    }

    fn upload_bytes(&mut self, handle: BufferHandle, byte_offset: usize, bytes: &[u8]) {
        let buf = &mut self.buffers[handle.0 as usize];
        debug_assert!(byte_offset + bytes.len() <= buf.len());
        buf[byte_offset..byte_offset + bytes.len()].copy_from_slice(bytes);
    }

    fn bind(&mut self, _handle: BufferHandle) {
        self.bind_calls += 1;
    }
}
