use std::time::Duration;

use rand::{rngs::StdRng, Rng, SeedableRng};
use splat_radix_sort::{
    utils::{download_buffer, upload_to_buffer},
    CommandRecorder, RadixSortDriver, SortStrategy,
};

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Splat {
    position: [f32; 3],
}

struct SortStuff {
    device: wgpu::Device,
    queue: wgpu::Queue,
    query_set: wgpu::QuerySet,
    query_buffer: wgpu::Buffer,
}

async fn setup() -> SortStuff {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());

    let adapter = wgpu::util::initialize_adapter_from_env_or_default(&instance, None)
        .await
        .unwrap();

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                required_features: wgpu::Features::TIMESTAMP_QUERY,
                required_limits: wgpu::Limits {
                    max_buffer_size: 1 << 30,
                    max_storage_buffer_binding_size: 1 << 30,
                    ..Default::default()
                },
                label: None,
            },
            None,
        )
        .await
        .unwrap();

    let capacity = 2;
    let query_set = device.create_query_set(&wgpu::QuerySetDescriptor {
        label: Some("time stamp query set"),
        ty: wgpu::QueryType::Timestamp,
        count: capacity,
    });

    let query_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("query set buffer"),
        size: capacity as u64 * std::mem::size_of::<u64>() as u64,
        usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    });

    SortStuff { device, queue, query_set, query_buffer }
}

#[allow(clippy::too_many_arguments)]
async fn timed_sort(
    context: &SortStuff,
    driver: &mut RadixSortDriver,
    splats_buffer: &wgpu::Buffer,
    out_indices_buffer: &wgpu::Buffer,
    n: u32,
    strategy: SortStrategy,
    iters: u32,
) -> Duration {
    let recorder = CommandRecorder::new(context.device.clone(), iters as usize + 1);

    let mut cmd = recorder.make_command_object().expect("command object");
    cmd.encoder_mut().write_timestamp(&context.query_set, 0);
    for _ in 0..iters {
        driver
            .sort(
                &context.queue,
                &mut cmd,
                splats_buffer,
                std::mem::size_of::<Splat>() as u32,
                n,
                glam::Vec3::ZERO,
                glam::Vec3::Z,
                false,
                out_indices_buffer,
                strategy,
            )
            .expect("sort failed");
    }
    cmd.encoder_mut().write_timestamp(&context.query_set, 1);
    cmd.encoder_mut()
        .resolve_query_set(&context.query_set, 0..2, &context.query_buffer, 0);

    let idx = cmd.submit(&context.queue, || {});
    context.device.poll(wgpu::Maintain::WaitForSubmissionIndex(idx));

    let timestamps: Vec<u64> =
        download_buffer(&context.device, &context.queue, &context.query_buffer, 2).await;
    let diff_ticks = timestamps[1] - timestamps[0];
    let period = context.queue.get_timestamp_period();
    Duration::from_nanos((diff_ticks as f32 * period / iters as f32) as u64)
}

#[pollster::main]
async fn main() {
    let context = setup().await;
    let mut driver = RadixSortDriver::new(context.device.clone(), &context.queue)
        .expect("failed to build sort pipelines");

    let mut rng = StdRng::seed_from_u64(0);

    println!("-- radix path --");
    for n in [10_000u32, 100_000, 1_000_000, 8_000_000, 20_000_000] {
        let splats: Vec<Splat> = (0..n)
            .map(|_| Splat {
                position: [rng.gen_range(-100.0..100.0), rng.gen_range(-100.0..100.0), rng.gen_range(-100.0..100.0)],
            })
            .collect();
        let splats_buffer = upload_to_buffer(&context.device, "bench splats", &splats);
        let out_indices_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("bench out indices"),
            size: (n * 4) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let d = timed_sort(
            &context, &mut driver, &splats_buffer, &out_indices_buffer, n, SortStrategy::RadixFull, 100,
        )
        .await;
        println!("{n}: {d:?}");
    }

    println!("-- bitonic path --");
    for n in [1_000u32, 8_000, 32_000, 65_536] {
        let splats: Vec<Splat> = (0..n)
            .map(|_| Splat {
                position: [rng.gen_range(-100.0..100.0), rng.gen_range(-100.0..100.0), rng.gen_range(-100.0..100.0)],
            })
            .collect();
        let splats_buffer = upload_to_buffer(&context.device, "bench splats", &splats);
        let out_indices_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("bench out indices"),
            size: (n * 4) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let d = timed_sort(
            &context, &mut driver, &splats_buffer, &out_indices_buffer, n, SortStrategy::BitonicSmall, 100,
        )
        .await;
        println!("{n}: {d:?}");
    }
}
