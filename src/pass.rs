//! Resources shared by every stage of one radix pass (HistogramStage, PrefixSumStage,
//! ScatterStage): the bind group layout those three stages' pipelines are built against,
//! and the small uniform they all read to know `num_keys` / `num_threadgroups` /
//! `byte_index` for the current pass.

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct PassParams {
    pub num_keys: u32,
    pub num_threadgroups: u32,
    pub byte_index: u32,
    pub _pad: u32,
}

/// Bindings shared by `zero_histogram`, `histogram_accumulate`, `prefix_sum`,
/// `scatter_count`, `scatter_offsets`, and `scatter_write` (see `shaders/radix_sort.wgsl`).
///
/// Binding 0 carries `has_dynamic_offset: true`: all four passes of one `sort()` call
/// share a single `PassParams` buffer, one aligned slot per `byte_index`, selected at
/// dispatch time via the offset passed to `set_bind_group` rather than by rewriting the
/// buffer between passes (which would race the not-yet-submitted command stream).
pub(crate) fn pass_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let storage_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("radix pass bind group layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<PassParams>() as u64),
                },
                count: None,
            },
            storage_entry(1),
            storage_entry(2),
            storage_entry(3),
            storage_entry(4),
            storage_entry(5),
        ],
    })
}

/// Rounds `size_of::<PassParams>()` up to `device`'s uniform offset alignment, giving the
/// stride between consecutive `byte_index` slots in the shared pass-params buffer.
pub(crate) fn pass_params_stride(device: &wgpu::Device) -> u64 {
    let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
    let unaligned = std::mem::size_of::<PassParams>() as u64;
    unaligned.div_ceil(alignment) * alignment
}
