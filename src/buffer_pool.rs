//! Growable, typed GPU scratch buffers with exponential reallocation.
//!
//! Mirrors the lifetime story of the teacher crate's `SortBuffers` (one set of buffers
//! retained and reused across `sort()` calls) but generalizes it: buffers are keyed by a
//! caller-chosen `role` string rather than being hand-enumerated fields on one struct, so
//! every stage (`KeyBuilder`, `HistogramStage`, `ScatterStage`, `BitonicFallback`, ...) can
//! own its own scratch without `BufferPool` knowing about sort-specific layout.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SortError;

struct PooledBuffer {
    buffer: Arc<wgpu::Buffer>,
    stride: u64,
    capacity: u64,
    usage: wgpu::BufferUsages,
}

/// Owns and grows a set of device-private scratch buffers, one per `role`.
pub struct BufferPool {
    device: wgpu::Device,
    entries: HashMap<&'static str, PooledBuffer>,
    live_bytes: u64,
    peak_bytes: u64,
}

impl BufferPool {
    pub fn new(device: wgpu::Device) -> Self {
        Self {
            device,
            entries: HashMap::new(),
            live_bytes: 0,
            peak_bytes: 0,
        }
    }

    /// Returns a buffer of stride `size_of::<T>()` with capacity for at least `min_count`
    /// elements of `T`, tagged `role`. Reallocates (dropping any previous contents) only
    /// when the existing buffer is smaller than requested; otherwise returns the buffer
    /// already cached for `role`.
    ///
    /// Returns an `Arc<wgpu::Buffer>` rather than a borrow: `wgpu::Buffer` itself is not
    /// cheaply shareable (it has no internal reference count), so callers that need to
    /// hold on to several acquired buffers at once — as `RadixSortDriver::sort` does —
    /// clone the `Arc`, not the buffer, to end the borrow on `self` between calls.
    pub fn acquire<T: bytemuck::Pod>(
        &mut self,
        role: &'static str,
        min_count: u64,
        usage: wgpu::BufferUsages,
    ) -> Result<Arc<wgpu::Buffer>, SortError> {
        let stride = std::mem::size_of::<T>() as u64;
        let needs_alloc = match self.entries.get(role) {
            Some(existing) => existing.capacity < min_count || existing.stride != stride,
            None => true,
        };

        if needs_alloc {
            let old_capacity = self.entries.get(role).map(|e| e.capacity).unwrap_or(0);
            let new_capacity = min_count.max(old_capacity.saturating_mul(2)).max(1);
            let size_bytes = new_capacity.saturating_mul(stride);

            let limits = self.device.limits();
            let max_size = limits
                .max_buffer_size
                .min(limits.max_storage_buffer_binding_size as u64);
            if size_bytes > max_size {
                log::error!(
                    "buffer pool: role `{role}` requested {size_bytes} bytes, device max is {max_size}"
                );
                return Err(SortError::CapacityExceeded {
                    requested: size_bytes,
                    max: max_size,
                });
            }

            log::warn!(
                "buffer pool: growing `{role}` from {old_capacity} to {new_capacity} elements ({size_bytes} bytes)"
            );

            let buffer = Arc::new(self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(role),
                size: size_bytes,
                usage,
                mapped_at_creation: false,
            }));

            if let Some(old) = self.entries.insert(
                role,
                PooledBuffer {
                    buffer,
                    stride,
                    capacity: new_capacity,
                    usage,
                },
            ) {
                self.live_bytes -= old.capacity * old.stride;
            }
            self.live_bytes += size_bytes;
            self.peak_bytes = self.peak_bytes.max(self.live_bytes);
        }

        Ok(self.entries.get(role).expect("just inserted").buffer.clone())
    }

    /// Drops all cached buffers. Only safe to call when no in-flight GPU work references
    /// scratch owned by this pool.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.live_bytes = 0;
    }

    /// `(live_bytes, peak_bytes)` across every role currently tracked by this pool.
    pub fn stats(&self) -> (u64, u64) {
        (self.live_bytes, self.peak_bytes)
    }
}
