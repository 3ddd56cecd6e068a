//! GPU-resident stable depth sort for real-time Gaussian Splat rendering: builds a
//! sortable key per splat from a camera position/forward vector, radix-sorts the keys on
//! the GPU (falling back to a bitonic network for small inputs), and writes out the
//! permutation of original indices in back-to-front order.
//!
//! The entry point is [`RadixSortDriver`]. [`CommandRecorder`] bounds how many sorts may
//! be outstanding on the GPU at once; [`BufferPool`] owns the scratch buffers a driver
//! reuses across calls.

pub mod bitonic;
pub mod buffer_pool;
pub mod command;
pub mod error;
pub mod extract;
mod histogram;
pub mod key_builder;
mod pass;
mod prefix_sum;
mod scatter;
pub mod utils;

use bitonic::BitonicFallback;
use buffer_pool::BufferPool;
use command::CommandObject;
use error::SortError;
use extract::IndexExtractor;
use histogram::HistogramStage;
use key_builder::KeyBuilder;
use pass::PassParams;
use prefix_sum::PrefixSumStage;
use scatter::ScatterStage;

pub use bitonic::BITONIC_THRESHOLD;
pub use command::CommandRecorder;
pub use key_builder::sortable_uint_desc;

/// A `(depth_bits, original_index)` pair: the unit this crate sorts. `depth_bits` is an
/// ascending sortable-uint ([`key_builder::sortable_uint_desc`]) such that ascending
/// numeric order over it equals descending depth order — i.e. back-to-front. Matches the
/// WGSL `vec2<u32>` record shared by every shader in `shaders/`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SortRecord {
    pub depth_bits: u32,
    pub original_index: u32,
}

/// Largest `count` this crate accepts: fits in a positive `i32` (several `wgpu` dispatch
/// and binding-size limits are expressed as signed values) with room to spare for the
/// per-threadgroup scratch buffers, which are sized in proportion to `count`.
pub const MAX_SPLATS: u32 = (1u32 << 31) - 1;

/// Selects which sorting algorithm [`RadixSortDriver::sort`] uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortStrategy {
    /// Radix sort below [`BITONIC_THRESHOLD`], the bitonic network at or above it.
    #[default]
    Auto,
    /// Always use the four-pass LSD radix pipeline.
    RadixFull,
    /// Always use the bitonic network. Returns `InvalidArgument` if `count >
    /// BITONIC_THRESHOLD`.
    BitonicSmall,
}

/// Checks that `source` defines every name in `entry_points` as a WGSL function before a
/// shader module is built from it, so a required kernel missing from `shaders/*.wgsl`
/// (e.g. a typo surviving a rename) fails construction with a named error instead of
/// surfacing as an opaque pipeline-creation failure far from its cause.
fn require_entry_points(source: &str, entry_points: &[&'static str]) -> Result<(), SortError> {
    for &name in entry_points {
        let needle = format!("fn {name}(");
        if !source.contains(&needle) {
            return Err(SortError::ShaderFunctionMissing { name });
        }
    }
    Ok(())
}

fn build_shader(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    workgroup_size: u32,
) -> wgpu::ShaderModule {
    let code = source.replace("{histogram_wg_size}", &workgroup_size.to_string());
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(code.into()),
    })
}

#[allow(clippy::too_many_arguments)]
fn pass_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    pass_params_buffer: &wgpu::Buffer,
    histogram: &wgpu::Buffer,
    keys_in: &wgpu::Buffer,
    keys_out: &wgpu::Buffer,
    per_tg_counts: &wgpu::Buffer,
    per_tg_offsets: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("radix pass bind group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: pass_params_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<PassParams>() as u64),
                }),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: histogram.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: keys_in.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: keys_out.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: per_tg_counts.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 5,
                resource: per_tg_offsets.as_entire_binding(),
            },
        ],
    })
}

fn scratch_usage() -> wgpu::BufferUsages {
    wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST
}

/// Orchestrates key build, radix sort (or the bitonic fallback), and index extraction.
///
/// Owns its pipelines and a [`BufferPool`] of scratch buffers that grow (and never
/// shrink) across calls to [`RadixSortDriver::sort`]. Does not own a [`CommandRecorder`]
/// or [`wgpu::Queue`] submission — callers record into a [`CommandObject`] they obtained
/// from their own `CommandRecorder` and submit it themselves, so a sort can share a
/// command stream with unrelated work (e.g. rendering passes recorded before or after
/// it). `sort` itself should be called at most once per `CommandObject` before it is
/// submitted: its internal per-call uniforms (the camera, the radix byte/threadgroup
/// counts) are written once and read back across several passes within that one
/// recording, so a second `sort` call sharing the same unsubmitted object would
/// overwrite them before the first call's passes execute.
pub struct RadixSortDriver {
    device: wgpu::Device,
    pass_bind_group_layout: wgpu::BindGroupLayout,
    pass_params_buffer: wgpu::Buffer,
    pass_params_stride: u64,
    key_builder: KeyBuilder,
    histogram_stage: HistogramStage,
    prefix_sum_stage: PrefixSumStage,
    scatter_stage: ScatterStage,
    extractor: IndexExtractor,
    bitonic: BitonicFallback,
    buffer_pool: BufferPool,
}

impl RadixSortDriver {
    pub fn new(device: wgpu::Device, queue: &wgpu::Queue) -> Result<Self, SortError> {
        let workgroup_size = utils::guess_workgroup_size(&device).min(256);

        let radix_source = include_str!("shaders/radix_sort.wgsl");
        require_entry_points(
            radix_source,
            &[
                "zero_histogram",
                "histogram_accumulate",
                "prefix_sum",
                "scatter_count",
                "scatter_offsets",
                "scatter_write",
            ],
        )?;
        let key_build_source = include_str!("shaders/key_build.wgsl");
        require_entry_points(key_build_source, &["key_build"])?;
        let extract_source = include_str!("shaders/extract_indices.wgsl");
        require_entry_points(extract_source, &["extract_indices"])?;
        let bitonic_source = include_str!("shaders/bitonic_sort.wgsl");
        require_entry_points(bitonic_source, &["bitonic_step"])?;

        let radix_shader = build_shader(&device, "radix sort", radix_source, workgroup_size);
        let key_build_shader = build_shader(&device, "key build", key_build_source, workgroup_size);
        let extract_shader = build_shader(&device, "extract indices", extract_source, workgroup_size);
        let bitonic_shader = build_shader(&device, "bitonic sort", bitonic_source, workgroup_size);

        let pass_bind_group_layout = pass::pass_bind_group_layout(&device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("radix pass pipeline layout"),
            bind_group_layouts: &[&pass_bind_group_layout],
            push_constant_ranges: &[],
        });

        let pass_params_stride = pass::pass_params_stride(&device);
        let pass_params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("radix pass params (one slot per byte_index)"),
            size: pass_params_stride * 4,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let key_builder = KeyBuilder::new(&device, &key_build_shader, workgroup_size)?;
        let histogram_stage =
            HistogramStage::new(&device, &radix_shader, &pipeline_layout, workgroup_size);
        let prefix_sum_stage = PrefixSumStage::new(&device, &radix_shader, &pipeline_layout);
        let scatter_stage = ScatterStage::new(&device, &radix_shader, &pipeline_layout);
        let extractor = IndexExtractor::new(&device, &extract_shader, workgroup_size);
        let bitonic = BitonicFallback::new(&device, queue, &bitonic_shader, workgroup_size);
        let buffer_pool = BufferPool::new(device.clone());

        Ok(Self {
            device,
            pass_bind_group_layout,
            pass_params_buffer,
            pass_params_stride,
            key_builder,
            histogram_stage,
            prefix_sum_stage,
            scatter_stage,
            extractor,
            bitonic,
            buffer_pool,
        })
    }

    /// `(live_bytes, peak_bytes)` of GPU scratch this driver currently retains.
    pub fn scratch_stats(&self) -> (u64, u64) {
        self.buffer_pool.stats()
    }

    /// Sorts `count` splats back-to-front by depth and writes the resulting permutation
    /// of original indices into `out_indices`.
    ///
    /// `splats` holds `count` records of `stride` bytes each (`stride` a multiple of 4,
    /// at least 12, with the position as the first three `f32`s of each record).
    /// `cam_pos`/`cam_fwd` are world-space; `by_distance` selects squared Euclidean
    /// distance from `cam_pos` as the depth metric instead of signed projection onto
    /// `cam_fwd`. `out_indices` must hold at least `count` `u32`s.
    #[allow(clippy::too_many_arguments)]
    pub fn sort(
        &mut self,
        queue: &wgpu::Queue,
        cmd: &mut CommandObject,
        splats: &wgpu::Buffer,
        stride: u32,
        count: u32,
        cam_pos: glam::Vec3,
        cam_fwd: glam::Vec3,
        by_distance: bool,
        out_indices: &wgpu::Buffer,
        strategy: SortStrategy,
    ) -> Result<(), SortError> {
        if count == 0 || count > MAX_SPLATS {
            return Err(SortError::InvalidArgument { which: "count" });
        }

        let use_bitonic = match strategy {
            SortStrategy::BitonicSmall => true,
            SortStrategy::RadixFull => false,
            SortStrategy::Auto => count <= BITONIC_THRESHOLD,
        };
        if use_bitonic && count > BITONIC_THRESHOLD {
            return Err(SortError::InvalidArgument { which: "strategy" });
        }

        let padded_count = if use_bitonic { count.next_power_of_two() } else { count };
        let keys_a = self
            .buffer_pool
            .acquire::<SortRecord>("radix_keys_a", padded_count as u64, scratch_usage())?;

        self.key_builder.build(
            &self.device,
            queue,
            cmd,
            splats,
            stride,
            count,
            cam_pos,
            cam_fwd,
            by_distance,
            &keys_a,
        )?;

        if use_bitonic {
            self.bitonic.pad_keys(queue, &keys_a, count, padded_count);
            self.bitonic.sort_keys(&self.device, cmd, &keys_a, padded_count)?;
            self.extractor
                .record(&self.device, queue, cmd, &keys_a, count, out_indices)?;
            return Ok(());
        }

        let num_threadgroups = count.div_ceil(256);
        let keys_b = self
            .buffer_pool
            .acquire::<SortRecord>("radix_keys_b", count as u64, scratch_usage())?;
        let histogram = self
            .buffer_pool
            .acquire::<u32>("radix_histogram", 256, scratch_usage())?;
        let per_tg_counts = self.buffer_pool.acquire::<u32>(
            "radix_per_tg_counts",
            (num_threadgroups as u64) * 256,
            scratch_usage(),
        )?;
        let per_tg_offsets = self.buffer_pool.acquire::<u32>(
            "radix_per_tg_offsets",
            (num_threadgroups as u64) * 256,
            scratch_usage(),
        )?;

        for byte_index in 0..4u32 {
            queue.write_buffer(
                &self.pass_params_buffer,
                byte_index as u64 * self.pass_params_stride,
                bytemuck::bytes_of(&PassParams {
                    num_keys: count,
                    num_threadgroups,
                    byte_index,
                    _pad: 0,
                }),
            );
        }

        let bind_group_even = pass_bind_group(
            &self.device,
            &self.pass_bind_group_layout,
            &self.pass_params_buffer,
            &histogram,
            &keys_a,
            &keys_b,
            &per_tg_counts,
            &per_tg_offsets,
        );
        let bind_group_odd = pass_bind_group(
            &self.device,
            &self.pass_bind_group_layout,
            &self.pass_params_buffer,
            &histogram,
            &keys_b,
            &keys_a,
            &per_tg_counts,
            &per_tg_offsets,
        );

        for byte_index in 0..4u32 {
            let bind_group = if byte_index % 2 == 0 { &bind_group_even } else { &bind_group_odd };
            let offset = (byte_index as u64 * self.pass_params_stride) as u32;
            self.histogram_stage.record(cmd, bind_group, offset, count);
            self.prefix_sum_stage.record(cmd, bind_group, offset);
            self.scatter_stage.record(cmd, bind_group, offset, num_threadgroups);
        }

        // Four passes (even) means the fully sorted keys end up back in keys_a.
        self.extractor
            .record(&self.device, queue, cmd, &keys_a, count, out_indices)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitonic_threshold_is_a_power_of_two() {
        assert!(BITONIC_THRESHOLD.is_power_of_two());
    }

    #[test]
    fn max_splats_fits_positive_i32_and_scratch_width_fits_u32() {
        assert!(MAX_SPLATS <= i32::MAX as u32);
        let threadgroups = MAX_SPLATS.div_ceil(256);
        assert!(threadgroups.checked_mul(256).is_some());
    }

    #[test]
    fn default_strategy_is_auto() {
        assert_eq!(SortStrategy::default(), SortStrategy::Auto);
    }
}
