//! Three-phase deterministic stable scatter (§4.6 — the crux of the algorithm).
//!
//! A naive atomic-fetch-add scatter is unstable because claim order across threadgroups
//! is nondeterministic, which silently corrupts later radix passes. Do not "simplify"
//! this into a single atomic-add kernel; see the design notes in SPEC_FULL.md §9.

use crate::command::CommandObject;

pub struct ScatterStage {
    count_pipeline: wgpu::ComputePipeline,
    offsets_pipeline: wgpu::ComputePipeline,
    write_pipeline: wgpu::ComputePipeline,
}

impl ScatterStage {
    pub fn new(
        device: &wgpu::Device,
        shader: &wgpu::ShaderModule,
        pipeline_layout: &wgpu::PipelineLayout,
    ) -> Self {
        let count_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("scatter_count"),
            layout: Some(pipeline_layout),
            module: shader,
            entry_point: "scatter_count",
        });
        let offsets_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("scatter_offsets"),
            layout: Some(pipeline_layout),
            module: shader,
            entry_point: "scatter_offsets",
        });
        let write_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("scatter_write"),
            layout: Some(pipeline_layout),
            module: shader,
            entry_point: "scatter_write",
        });
        Self {
            count_pipeline,
            offsets_pipeline,
            write_pipeline,
        }
    }

    /// Records all three scatter phases for one radix pass. `num_threadgroups` is
    /// `ceil(count / 256)`; `pass_params_offset` selects this pass's `byte_index` within
    /// the shared, dynamically-offset `PassParams` buffer bound at binding 0 of
    /// `bind_group`.
    pub fn record(
        &self,
        cmd: &mut CommandObject,
        bind_group: &wgpu::BindGroup,
        pass_params_offset: u32,
        num_threadgroups: u32,
    ) {
        {
            let mut pass = cmd.compute_pass("scatter: count per threadgroup");
            pass.set_pipeline(&self.count_pipeline);
            pass.set_bind_group(0, bind_group, &[pass_params_offset]);
            pass.dispatch_workgroups(num_threadgroups, 1, 1);
        }
        {
            // Phase 2 runs in a single workgroup: thread b walks every threadgroup for
            // bucket b sequentially, which is what makes cross-threadgroup ordering
            // deterministic rather than scheduler-dependent.
            let mut pass = cmd.compute_pass("scatter: deterministic offsets");
            pass.set_pipeline(&self.offsets_pipeline);
            pass.set_bind_group(0, bind_group, &[pass_params_offset]);
            pass.dispatch_workgroups(1, 1, 1);
        }
        {
            let mut pass = cmd.compute_pass("scatter: stable write");
            pass.set_pipeline(&self.write_pipeline);
            pass.set_bind_group(0, bind_group, &[pass_params_offset]);
            pass.dispatch_workgroups(num_threadgroups, 1, 1);
        }
    }
}
