//! Single-threadgroup exclusive Blelloch scan over the 256-entry histogram (§4.5).

use crate::command::CommandObject;

pub struct PrefixSumStage {
    pipeline: wgpu::ComputePipeline,
}

impl PrefixSumStage {
    pub fn new(
        device: &wgpu::Device,
        shader: &wgpu::ShaderModule,
        pipeline_layout: &wgpu::PipelineLayout,
    ) -> Self {
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("prefix_sum"),
            layout: Some(pipeline_layout),
            module: shader,
            entry_point: "prefix_sum",
        });
        Self { pipeline }
    }

    /// After this call, `histogram[b]` holds the total count of digits strictly less than
    /// `b` across the whole input (an exclusive scan), computed by a single 256-thread
    /// workgroup regardless of input size.
    pub fn record(&self, cmd: &mut CommandObject, bind_group: &wgpu::BindGroup, pass_params_offset: u32) {
        let mut pass = cmd.compute_pass("prefix sum");
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[pass_params_offset]);
        pass.dispatch_workgroups(1, 1, 1);
    }
}
