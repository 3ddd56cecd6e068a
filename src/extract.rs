//! Copies `original_index` out of sorted records into the caller's output buffer.
//! Shared by [`crate::RadixSortDriver`] and [`crate::BitonicFallback`] (§4.7 / §4.8).

use wgpu::util::DeviceExt;

use crate::command::CommandObject;
use crate::error::SortError;
use crate::SortRecord;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ExtractParams {
    count: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
}

pub struct IndexExtractor {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,
    workgroup_size: u32,
}

impl IndexExtractor {
    pub fn new(
        device: &wgpu::Device,
        shader: &wgpu::ShaderModule,
        workgroup_size: u32,
    ) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("index extractor bind group layout"),
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
            label: Some("index extractor pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("extract_indices"),
            layout: Some(&pipeline_layout),
            module: shader,
            entry_point: "extract_indices",
        });

        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("index extractor params"),
            contents: bytemuck::bytes_of(&ExtractParams {
                count: 0,
                _pad0: 0,
                _pad1: 0,
                _pad2: 0,
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            pipeline,
            bind_group_layout,
            params_buffer,
            workgroup_size,
        }
    }

    pub fn record(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        cmd: &mut CommandObject,
        sorted_keys: &wgpu::Buffer,
        count: u32,
        out_indices: &wgpu::Buffer,
    ) -> Result<(), SortError> {
        if out_indices.size() < (count as u64) * 4 {
            return Err(SortError::InvalidArgument { which: "out_indices" });
        }
        if sorted_keys.size() < (count as u64) * (std::mem::size_of::<SortRecord>() as u64) {
            return Err(SortError::InvalidArgument { which: "sorted_keys" });
        }

        queue.write_buffer(
            &self.params_buffer,
            0,
            bytemuck::bytes_of(&ExtractParams {
                count,
                _pad0: 0,
                _pad1: 0,
                _pad2: 0,
            }),
        );

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("index extractor bind group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: sorted_keys.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: out_indices.as_entire_binding(),
                },
            ],
        });

        let workgroups = (count + self.workgroup_size - 1) / self.workgroup_size;
        let mut pass = cmd.compute_pass("extract indices");
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(workgroups, 1, 1);

        Ok(())
    }
}
