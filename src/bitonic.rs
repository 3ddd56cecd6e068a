//! O(n log²n) fallback sorter for small inputs (§4.8). Used when `count <=
//! BITONIC_THRESHOLD` or when the caller forces `SortStrategy::BitonicSmall`.
//!
//! Operates on the same `(depth_bits, original_index)` record the radix path uses, so an
//! ordinary ascending numeric sort by `.x` reproduces the same total order.

use crate::command::CommandObject;
use crate::error::SortError;
use crate::SortRecord;

/// Largest input size this crate will route to [`crate::RadixSortDriver`]'s bitonic
/// fallback rather than the full radix pipeline when `SortStrategy::Auto` is selected.
pub const BITONIC_THRESHOLD: u32 = 65_536;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct BitonicParams {
    k: u32,
    j: u32,
    padded_count: u32,
    _pad: u32,
}

/// Sentinel record used to pad the key buffer up to a power of two. Its key
/// (`u32::MAX`) is larger than any real sortable-uint, so padding always settles at the
/// high end of the ascending sort and is never read by [`IndexExtractor`] (which only
/// copies the first `count` slots).
const PADDING_RECORD: SortRecord = SortRecord {
    depth_bits: u32::MAX,
    original_index: u32::MAX,
};

/// Every `(k, j)` compare-exchange step for a full ascending bitonic sort of size up to
/// `2^max_log2n`. The schedule for any smaller power of two `2^m` (`m <= max_log2n`) is
/// exactly the prefix of this table ending once `k` exceeds `2^m` — see `steps_for`.
fn full_schedule(max_log2n: u32) -> Vec<BitonicParams> {
    let mut steps = Vec::new();
    let mut k = 2u32;
    while k <= 1u32 << max_log2n {
        let mut j = k / 2;
        while j > 0 {
            steps.push(BitonicParams {
                k,
                j,
                padded_count: 0, // patched per-call to the actual padded_count
                _pad: 0,
            });
            j /= 2;
        }
        k *= 2;
    }
    steps
}

pub struct BitonicFallback {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,
    param_stride: u64,
    schedule_len: usize,
    max_log2n: u32,
    workgroup_size: u32,
}

impl BitonicFallback {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        shader: &wgpu::ShaderModule,
        workgroup_size: u32,
    ) -> Self {
        let max_log2n = BITONIC_THRESHOLD.next_power_of_two().trailing_zeros();
        let schedule = full_schedule(max_log2n);

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bitonic sort bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<BitonicParams>() as u64,
                        ),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("bitonic sort pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("bitonic_step"),
            layout: Some(&pipeline_layout),
            module: shader,
            entry_point: "bitonic_step",
        });

        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let unaligned = std::mem::size_of::<BitonicParams>() as u64;
        let param_stride = unaligned.div_ceil(alignment) * alignment;

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("bitonic step schedule"),
            size: param_stride * schedule.len() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        for (i, step) in schedule.iter().enumerate() {
            queue.write_buffer(
                &params_buffer,
                i as u64 * param_stride,
                bytemuck::bytes_of(step),
            );
        }

        Self {
            pipeline,
            bind_group_layout,
            params_buffer,
            param_stride,
            schedule_len: schedule.len(),
            max_log2n,
            workgroup_size,
        }
    }

    /// Number of `(k, j)` compare-exchange steps for a logical size of `count` elements:
    /// `log2(padded_count) * (log2(padded_count) + 1) / 2`, where `padded_count` is the
    /// next power of two `>= count`.
    fn steps_for(&self, padded_count: u32) -> usize {
        let m = padded_count.trailing_zeros();
        debug_assert!(padded_count.is_power_of_two());
        (m * (m + 1) / 2) as usize
    }

    /// Sorts `keys[0..padded_count]` ascending by `.x` in place, where `keys[count
    /// ..padded_count]` has already been filled with [`PADDING_RECORD`] by the caller
    /// (normally `RadixSortDriver`, right after `KeyBuilder::build`).
    pub fn sort_keys(
        &self,
        device: &wgpu::Device,
        cmd: &mut CommandObject,
        keys: &wgpu::Buffer,
        padded_count: u32,
    ) -> Result<(), SortError> {
        let m = padded_count.trailing_zeros();
        if m > self.max_log2n {
            return Err(SortError::InvalidArgument { which: "count" });
        }

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("bitonic sort bind group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &self.params_buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(std::mem::size_of::<BitonicParams>() as u64),
                    }),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: keys.as_entire_binding(),
                },
            ],
        });

        let steps = self.steps_for(padded_count);
        debug_assert!(steps <= self.schedule_len);
        let workgroups = (padded_count + self.workgroup_size - 1) / self.workgroup_size;

        let mut pass = cmd.compute_pass("bitonic sort");
        pass.set_pipeline(&self.pipeline);
        for step in 0..steps {
            let offset = step as u64 * self.param_stride;
            pass.set_bind_group(0, &bind_group, &[offset as u32]);
            pass.dispatch_workgroups(workgroups, 1, 1);
        }
        drop(pass);

        Ok(())
    }

    pub fn padding_record() -> SortRecord {
        PADDING_RECORD
    }

    /// Fills `keys[count..padded_count]` with the padding sentinel. Cheap for the bitonic
    /// regime (`count <= BITONIC_THRESHOLD`, so at most one doubling of padding).
    pub fn pad_keys(&self, queue: &wgpu::Queue, keys: &wgpu::Buffer, count: u32, padded_count: u32) {
        if padded_count <= count {
            return;
        }
        let padding: Vec<SortRecord> = vec![PADDING_RECORD; (padded_count - count) as usize];
        queue.write_buffer(
            keys,
            count as u64 * std::mem::size_of::<SortRecord>() as u64,
            bytemuck::cast_slice(&padding),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_bitonic_sort(mut data: Vec<u32>) -> Vec<u32> {
        let n = data.len();
        let schedule = full_schedule(n.trailing_zeros());
        for step in &schedule {
            let k = step.k;
            let j = step.j;
            for i in 0..n as u32 {
                let ixj = i ^ j;
                if ixj > i {
                    let ascending = (i & k) == 0;
                    let a = data[i as usize];
                    let b = data[ixj as usize];
                    let should_swap = if ascending { a > b } else { a < b };
                    if should_swap {
                        data.swap(i as usize, ixj as usize);
                    }
                }
            }
        }
        data
    }

    #[test]
    fn schedule_reproduces_ascending_sort() {
        let input = vec![9u32, 2, 7, 0, 5, 3, 8, 1];
        let mut expected = input.clone();
        expected.sort();
        assert_eq!(reference_bitonic_sort(input), expected);
    }

    #[test]
    fn schedule_prefix_matches_smaller_power_of_two() {
        let full = full_schedule(4);
        let half = full_schedule(3);
        assert_eq!(&full[..half.len()], half.as_slice());
    }

    #[test]
    fn step_count_matches_closed_form() {
        // For n = 2^m, total steps = m(m+1)/2.
        for m in 1u32..=8 {
            let n = 1u32 << m;
            let schedule = full_schedule(m);
            assert_eq!(schedule.len() as u32, m * (m + 1) / 2);
            let _ = n;
        }
    }
}
