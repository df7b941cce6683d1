//! Consumer side: drain the visual queue once per display frame and present
//! the snapshot, either to an encoded video or to a statistics sink.

pub mod encoder;
pub mod frame;
pub mod gpu;
pub mod pipeline;

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::config::RenderConfig;
use crate::visual::event::VisualEvent;
use crate::visual::queue::SharedState;
use encoder::VideoEncoder;
use frame::{FrameRenderer, TEXTURE_FORMAT};
use gpu::GpuContext;
use pipeline::{pack_circles, CirclePipeline, CircleUniforms, GpuCircle};

pub trait FrameConsumer {
    /// Render one frame from a drained snapshot. `now` is the consumer clock.
    fn present(&mut self, now: f64, events: &[VisualEvent]) -> Result<()>;

    fn finish(self: Box<Self>) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct ConsumerOptions {
    pub fps: u32,
    pub lifetime: f64,
    /// Hard stop on the consumer clock; `None` runs until the producer is
    /// done and every event has faded.
    pub duration: Option<Duration>,
}

/// Drive `consumer` at `fps` until the stop condition holds, then clear the
/// running flag. Returns the number of frames presented.
pub fn run_consumer<F>(
    shared: &SharedState,
    consumer: &mut dyn FrameConsumer,
    options: &ConsumerOptions,
    producer_done: F,
) -> Result<u64>
where
    F: Fn() -> bool,
{
    let frame_interval = Duration::from_secs_f64(1.0 / options.fps.max(1) as f64);
    let start = Instant::now();
    let mut frames = 0u64;

    let result = loop {
        // Sampled before draining so a final push is never missed.
        let done = producer_done();
        let now = start.elapsed().as_secs_f64();
        let snapshot = shared.queue.drain_non_expired(now, options.lifetime);
        if let Err(err) = consumer.present(now, &snapshot) {
            break Err(err);
        }
        frames += 1;

        if options.duration.is_some_and(|limit| start.elapsed() >= limit) {
            log::info!("Render duration reached after {} frames", frames);
            break Ok(());
        }
        if snapshot.is_empty() && done {
            break Ok(());
        }

        let next = start + frame_interval.mul_f64(frames as f64);
        if let Some(wait) = next.checked_duration_since(Instant::now()) {
            std::thread::sleep(wait);
        }
    };

    if shared.running.stop() {
        log::debug!("Consumer cleared the running flag");
    }
    if !shared.queue.is_empty() {
        log::debug!("{} events still queued at shutdown", shared.queue.len());
    }
    result.map(|()| frames)
}

/// Drains without drawing and reports what it saw.
#[derive(Debug, Default)]
pub struct StatsConsumer {
    frames: u64,
    drawn: u64,
    peak: usize,
}

impl StatsConsumer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameConsumer for StatsConsumer {
    fn present(&mut self, _now: f64, events: &[VisualEvent]) -> Result<()> {
        self.frames += 1;
        self.drawn += events.len() as u64;
        self.peak = self.peak.max(events.len());
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        let mean = if self.frames > 0 {
            self.drawn as f64 / self.frames as f64
        } else {
            0.0
        };
        log::info!(
            "Presented {} frames, {:.1} events per frame on average, {} at most",
            self.frames, mean, self.peak
        );
        Ok(())
    }
}

/// Offscreen GPU renderer piping frames to ffmpeg.
pub struct VideoRenderer {
    gpu: GpuContext,
    frame_renderer: FrameRenderer,
    circles: CirclePipeline,
    uniform_buffer: wgpu::Buffer,
    circle_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    encoder: VideoEncoder,
    resolution: [f32; 2],
    capacity: usize,
    lifetime: f32,
    frames: u64,
}

impl VideoRenderer {
    pub fn new(
        render: &RenderConfig,
        capacity: usize,
        lifetime: f64,
        output: &Path,
        audio: Option<&Path>,
    ) -> Result<Self> {
        log::info!("Initializing GPU...");
        let gpu = GpuContext::new()?;
        let frame_renderer = FrameRenderer::new(&gpu, render.width, render.height);
        let circles = CirclePipeline::new(&gpu.device, TEXTURE_FORMAT);

        let uniform_buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("uniform_buffer"),
            size: std::mem::size_of::<CircleUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let circle_buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("circle_buffer"),
            size: (capacity.max(1) * std::mem::size_of::<GpuCircle>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("circle_bind_group"),
            layout: &circles.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: circle_buffer.as_entire_binding(),
                },
            ],
        });

        let encoder = VideoEncoder::new(output, audio, render).context("Failed to start video encoder")?;

        Ok(Self {
            gpu,
            frame_renderer,
            circles,
            uniform_buffer,
            circle_buffer,
            bind_group,
            encoder,
            resolution: [render.width as f32, render.height as f32],
            capacity: capacity.max(1),
            lifetime: lifetime as f32,
            frames: 0,
        })
    }
}

impl FrameConsumer for VideoRenderer {
    fn present(&mut self, now: f64, events: &[VisualEvent]) -> Result<()> {
        let packed = pack_circles(events, now, self.capacity);
        let uniforms = CircleUniforms {
            resolution: self.resolution,
            count: packed.len() as u32,
            life: self.lifetime,
        };
        let queue = &self.gpu.queue;
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
        if !packed.is_empty() {
            queue.write_buffer(&self.circle_buffer, 0, bytemuck::cast_slice(&packed));
        }

        let pixels = self
            .frame_renderer
            .render_and_readback(&self.gpu, &self.circles.pipeline, &self.bind_group)?;
        self.encoder.write_frame(&pixels)?;
        self.frames += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        log::info!("Finishing encoding after {} frames...", self.frames);
        self.encoder.finish()
    }
}
