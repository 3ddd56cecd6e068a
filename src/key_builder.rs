//! Converts splat world positions and a camera basis into sortable `(depth_bits,
//! original_index)` records (§3/§4.3 of the design: the sortable-uint transform).

use wgpu::util::DeviceExt;

use crate::command::CommandObject;
use crate::error::SortError;
use crate::SortRecord;

/// Reversible bijection from `f32` to `u32` under which unsigned-ascending order agrees
/// with floating-point-descending order. This is the host-side twin of the identical
/// function in `shaders/key_build.wgsl`; keep the two in lock-step.
///
/// NaN is mapped as though it were `+infinity` *before* the descending complement, so it
/// sorts to the position a maximal depth would occupy (first in back-to-front order).
pub fn sortable_uint_desc(d: f32) -> u32 {
    let ascending = if d.is_nan() {
        sortable_uint_ascending(f32::INFINITY.to_bits())
    } else {
        sortable_uint_ascending(d.to_bits())
    };
    !ascending
}

fn sortable_uint_ascending(bits: u32) -> u32 {
    if bits & 0x8000_0000 != 0 {
        !bits
    } else {
        bits ^ 0x8000_0000
    }
}

/// Inverse of the ascending half of the transform; used only to prove the round-trip
/// property in tests (the descending complement is self-inverse so `sortable_uint_desc`
/// itself has no single clean inverse once NaN collapses onto `u32::MAX`).
pub fn inverse_sortable_uint_ascending(u: u32) -> f32 {
    let bits = if u & 0x8000_0000 != 0 {
        u ^ 0x8000_0000
    } else {
        !u
    };
    f32::from_bits(bits)
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct CameraUniform {
    cam_pos: [f32; 3],
    by_distance: u32,
    cam_fwd: [f32; 3],
    count: u32,
    stride_words: u32,
    _pad: [u32; 3],
}

/// Builds the `key_build` compute pipeline and records dispatches of it.
pub struct KeyBuilder {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    workgroup_size: u32,
}

impl KeyBuilder {
    pub fn new(
        device: &wgpu::Device,
        shader: &wgpu::ShaderModule,
        workgroup_size: u32,
    ) -> Result<Self, SortError> {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("key builder bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
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
            label: Some("key builder pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("key_build"),
            layout: Some(&pipeline_layout),
            module: shader,
            entry_point: "key_build",
        });

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("key builder camera uniform"),
            contents: bytemuck::bytes_of(&CameraUniform {
                cam_pos: [0.0; 3],
                by_distance: 0,
                cam_fwd: [0.0; 3],
                count: 0,
                stride_words: 3,
                _pad: [0; 3],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        Ok(Self {
            pipeline,
            bind_group_layout,
            uniform_buffer,
            workgroup_size,
        })
    }

    /// Records a `key_build` dispatch covering `count` splats. `stride` is in bytes and
    /// must be a multiple of 4 (GPU storage-buffer element alignment) and at least 12
    /// (one `vec3<f32>` position).
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        cmd: &mut CommandObject,
        splats: &wgpu::Buffer,
        stride: u32,
        count: u32,
        cam_pos: glam::Vec3,
        cam_fwd: glam::Vec3,
        by_distance: bool,
        out_keys: &wgpu::Buffer,
    ) -> Result<(), SortError> {
        if stride % 4 != 0 || stride < 12 {
            return Err(SortError::InvalidArgument { which: "splat_stride" });
        }
        if count == 0 {
            return Err(SortError::InvalidArgument { which: "count" });
        }
        if splats.size() < (count as u64) * (stride as u64) {
            return Err(SortError::InvalidArgument { which: "splats" });
        }
        if out_keys.size() < (count as u64) * (std::mem::size_of::<SortRecord>() as u64) {
            return Err(SortError::InvalidArgument { which: "out_keys" });
        }
        if !by_distance && cam_fwd.length_squared() < 0.999 * 0.999 {
            log::warn!("key builder: cam_fwd is not unit length ({cam_fwd:?}) while by_distance=false");
        }

        queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&CameraUniform {
                cam_pos: cam_pos.into(),
                by_distance: by_distance as u32,
                cam_fwd: cam_fwd.into(),
                count,
                stride_words: stride / 4,
                _pad: [0; 3],
            }),
        );

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("key builder bind group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: splats.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: out_keys.as_entire_binding(),
                },
            ],
        });

        let workgroups = (count + self.workgroup_size - 1) / self.workgroup_size;
        let mut pass = cmd.compute_pass("key build");
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(workgroups, 1, 1);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_finite_non_nan_floats() {
        for bits in [0.0f32, -0.0, 1.0, -1.0, 42.5, -42.5, f32::MIN, f32::MAX, 1e-30, -1e-30] {
            let ascending = sortable_uint_ascending(bits.to_bits());
            let back = inverse_sortable_uint_ascending(ascending);
            assert_eq!(back.to_bits(), bits.to_bits(), "round trip failed for {bits}");
        }
    }

    #[test]
    fn descending_transform_orders_correctly() {
        let samples = [-1000.0f32, -1.0, -0.0, 0.0, 1.0, 2.5, 1000.0];
        for pair in samples.windows(2) {
            let (d1, d2) = (pair[0], pair[1]);
            assert!(d1 < d2);
            assert!(
                sortable_uint_desc(d1) > sortable_uint_desc(d2),
                "expected desc({d1}) > desc({d2})"
            );
        }
    }

    #[test]
    fn nan_sorts_as_if_positive_infinity() {
        let nan_key = sortable_uint_desc(f32::NAN);
        let inf_key = sortable_uint_desc(f32::INFINITY);
        assert_eq!(nan_key, inf_key);
        assert!(nan_key < sortable_uint_desc(0.0));
    }
}
