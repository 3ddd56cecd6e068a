//! Zeroes and accumulates the 256-bucket histogram for one 8-bit radix digit (§4.4).

use crate::command::CommandObject;

pub struct HistogramStage {
    zero_pipeline: wgpu::ComputePipeline,
    accumulate_pipeline: wgpu::ComputePipeline,
    workgroup_size: u32,
}

impl HistogramStage {
    pub fn new(
        device: &wgpu::Device,
        shader: &wgpu::ShaderModule,
        pipeline_layout: &wgpu::PipelineLayout,
        workgroup_size: u32,
    ) -> Self {
        let zero_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("zero_histogram"),
            layout: Some(pipeline_layout),
            module: shader,
            entry_point: "zero_histogram",
        });
        let accumulate_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("histogram_accumulate"),
            layout: Some(pipeline_layout),
            module: shader,
            entry_point: "histogram_accumulate",
        });
        Self {
            zero_pipeline,
            accumulate_pipeline,
            workgroup_size,
        }
    }

    /// Zeroes the 256-bucket histogram, then accumulates per-digit counts over all `count`
    /// keys. `pass_params_offset` selects this pass's `byte_index` within the shared,
    /// dynamically-offset `PassParams` buffer bound at binding 0 of `bind_group`.
    pub fn record(
        &self,
        cmd: &mut CommandObject,
        bind_group: &wgpu::BindGroup,
        pass_params_offset: u32,
        count: u32,
    ) {
        {
            let mut pass = cmd.compute_pass("zero histogram");
            pass.set_pipeline(&self.zero_pipeline);
            pass.set_bind_group(0, bind_group, &[pass_params_offset]);
            pass.dispatch_workgroups(1, 1, 1);
        }
        {
            let workgroups = (count + self.workgroup_size - 1) / self.workgroup_size;
            let mut pass = cmd.compute_pass("calculate histogram");
            pass.set_pipeline(&self.accumulate_pipeline);
            pass.set_bind_group(0, bind_group, &[pass_params_offset]);
            pass.dispatch_workgroups(workgroups, 1, 1);
        }
    }
}
