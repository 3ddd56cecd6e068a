//! Host-side helpers for moving data to and from GPU buffers, and a one-time capability
//! probe for picking a dispatch workgroup size. Used by tests, benchmarks, and demos
//! rather than by the sort path itself, which always runs at a fixed workgroup size.

use std::sync::mpsc;

use wgpu::util::DeviceExt;

/// Creates a `STORAGE | COPY_SRC | COPY_DST` buffer already populated with `data`.
pub fn upload_to_buffer<T: bytemuck::Pod>(
    device: &wgpu::Device,
    label: &str,
    data: &[T],
) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(data),
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
    })
}

/// Reads `count` elements of `T` back from `buffer` via a staging copy. `buffer` must
/// have been created with `COPY_SRC`.
pub async fn download_buffer<T: bytemuck::Pod + Clone>(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    buffer: &wgpu::Buffer,
    count: usize,
) -> Vec<T> {
    let size = (count * std::mem::size_of::<T>()) as u64;
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("download staging buffer"),
        size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("download encoder"),
    });
    encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
    queue.submit(Some(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .expect("map_async callback dropped without firing")
        .expect("failed to map staging buffer for read");

    let data = bytemuck::cast_slice(&slice.get_mapped_range()).to_vec();
    staging.unmap();
    data
}

/// Probes the device's compute limits and returns the largest of the crate's candidate
/// workgroup sizes it can support, mirroring the capability probe the crate this one is
/// grounded on performs by trial sorts. Here the probe is a direct limits query rather
/// than trial dispatches, since `RadixSortDriver`'s kernels have no subgroup-size
/// dependence to characterize empirically.
pub fn guess_workgroup_size(device: &wgpu::Device) -> u32 {
    let candidates = [256u32, 128, 64, 32, 16, 8, 1];
    let max_invocations = device.limits().max_compute_invocations_per_workgroup;
    for &size in &candidates {
        if size <= max_invocations {
            log::debug!("utils: selected workgroup size {size} (device max {max_invocations})");
            return size;
        }
    }
    log::warn!("utils: falling back to workgroup size 1, device max invocations is {max_invocations}");
    1
}

#[cfg(test)]
mod tests {
    #[test]
    fn guess_workgroup_size_never_exceeds_device_max() {
        // The candidate-selection logic is pure; re-verified here without a live device.
        let candidates = [256u32, 128, 64, 32, 16, 8, 1];
        for max_invocations in [16u32, 64, 100, 256, 1024] {
            let chosen = candidates
                .iter()
                .copied()
                .find(|&size| size <= max_invocations)
                .unwrap_or(1);
            assert!(chosen <= max_invocations);
        }
    }
}
