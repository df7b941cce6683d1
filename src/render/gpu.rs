use anyhow::{Context, Result};

/// Device and queue for offscreen rendering; nothing is ever presented.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    pub fn new() -> Result<Self> {
        pollster::block_on(Self::init_async())
    }

    async fn init_async() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY | wgpu::Backends::GL,
            ..Default::default()
        });

        // Headless hosts often expose only a software rasterizer.
        let adapter = match Self::adapter(&instance, false).await {
            Some(adapter) => adapter,
            None => {
                log::warn!("No hardware GPU adapter, trying a software fallback");
                Self::adapter(&instance, true)
                    .await
                    .context("Failed to find any GPU adapter, hardware or software")?
            }
        };

        let info = adapter.get_info();
        log::info!("Rendering on {} ({:?}, {:?})", info.name, info.backend, info.device_type);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("auralis_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                    ..Default::default()
                },
                None,
            )
            .await
            .context("Failed to create GPU device")?;

        Ok(Self { device, queue })
    }

    async fn adapter(instance: &wgpu::Instance, fallback: bool) -> Option<wgpu::Adapter> {
        instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: fallback,
            })
            .await
    }
}
