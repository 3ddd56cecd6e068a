// Builds 10 splats on a line, sorts them back-to-front from a camera looking down +z, and
// prints the resulting draw order.
use splat_radix_sort::{utils::upload_to_buffer, CommandRecorder, RadixSortDriver, SortStrategy};

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Splat {
    position: [f32; 3],
}

#[pollster::main]
async fn main() {
    env_logger::init();

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let adapter = wgpu::util::initialize_adapter_from_env_or_default(&instance, None)
        .await
        .unwrap();
    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                label: None,
            },
            None,
        )
        .await
        .unwrap();

    let splats: Vec<Splat> = (0..10)
        .map(|i| Splat {
            position: [0.0, 0.0, i as f32],
        })
        .collect();
    println!("splats by original index: {:?}", splats.iter().map(|s| s.position[2]).collect::<Vec<_>>());

    let splats_buffer = upload_to_buffer(&device, "demo splats", &splats);
    let out_indices_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("demo out indices"),
        size: (splats.len() * 4) as u64,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    });

    let mut driver = RadixSortDriver::new(device.clone(), &queue).expect("failed to build sort pipelines");
    let recorder = CommandRecorder::new(device.clone(), 4);
    let mut cmd = recorder.make_command_object().expect("no command objects available");

    driver
        .sort(
            &queue,
            &mut cmd,
            &splats_buffer,
            std::mem::size_of::<Splat>() as u32,
            splats.len() as u32,
            glam::Vec3::ZERO,
            glam::Vec3::Z,
            false,
            &out_indices_buffer,
            SortStrategy::Auto,
        )
        .expect("sort failed");

    let idx = cmd.submit(&queue, || {});
    device.poll(wgpu::Maintain::WaitForSubmissionIndex(idx));

    let order: Vec<u32> = splat_radix_sort::utils::download_buffer(&device, &queue, &out_indices_buffer, splats.len()).await;
    println!("draw order (far to near): {order:?}");
}
