// Sorts the same random splat cloud with both SortStrategy::RadixFull and
// SortStrategy::BitonicSmall and checks the two produce the same draw order, since they
// must agree on any size the bitonic network can also handle.
use rand::{rngs::StdRng, Rng, SeedableRng};
use splat_radix_sort::{utils::upload_to_buffer, CommandRecorder, RadixSortDriver, SortStrategy};

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Splat {
    position: [f32; 3],
}

async fn run_sort(
    driver: &mut RadixSortDriver,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    splats_buffer: &wgpu::Buffer,
    count: u32,
    strategy: SortStrategy,
) -> Vec<u32> {
    let out_indices_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("compare demo out indices"),
        size: (count * 4) as u64,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    });

    let recorder = CommandRecorder::new(device.clone(), 4);
    let mut cmd = recorder.make_command_object().expect("no command objects available");
    driver
        .sort(
            queue,
            &mut cmd,
            splats_buffer,
            std::mem::size_of::<Splat>() as u32,
            count,
            glam::Vec3::new(0.0, 0.0, -5.0),
            glam::Vec3::Z,
            false,
            &out_indices_buffer,
            strategy,
        )
        .expect("sort failed");
    let idx = cmd.submit(queue, || {});
    device.poll(wgpu::Maintain::WaitForSubmissionIndex(idx));

    splat_radix_sort::utils::download_buffer(device, queue, &out_indices_buffer, count as usize).await
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

    let count = 4000u32;
    let mut rng = StdRng::seed_from_u64(42);
    let splats: Vec<Splat> = (0..count)
        .map(|_| Splat {
            position: [rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0), rng.gen_range(-100.0..100.0)],
        })
        .collect();
    let splats_buffer = upload_to_buffer(&device, "compare demo splats", &splats);

    let mut driver = RadixSortDriver::new(device.clone(), &queue).expect("failed to build sort pipelines");

    let radix_order = run_sort(&mut driver, &device, &queue, &splats_buffer, count, SortStrategy::RadixFull).await;
    let bitonic_order = run_sort(&mut driver, &device, &queue, &splats_buffer, count, SortStrategy::BitonicSmall).await;

    let agree = radix_order == bitonic_order;
    println!("radix and bitonic agree on draw order: {agree}");
    assert!(agree, "radix and bitonic sort paths disagree on the same input");
}
