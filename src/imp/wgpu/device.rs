// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use super::Error;
use super::pixel_format::{EncodingFormat, REQUIRED_USAGES};
use super::program::QUAD_VERTICES;
use crate::codec::Encoding;
use crate::config::{ContextOptions, EncodingPreference, PowerPreference};
use wgpu::util::DeviceExt;
use wgpu::{ErrorFilter, Limits, PollType, Trace};

/// Instance, adapter, device and queue, plus the resources every dispatch shares.
#[derive(Debug)]
pub(crate) struct Device {
    //the instance must outlive the adapter on some backends
    _instance: wgpu::Instance,
    _adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    quad: wgpu::Buffer,
    encoding: Encoding,
    adapter_name: String,
}

impl Device {
    pub async fn new(options: &ContextOptions) -> Result<Device, Error> {
        if options.disable_gpu {
            return Err(Error::Disabled);
        }
        let descriptor = wgpu::InstanceDescriptor::from_env_or_default();
        let instance = wgpu::Instance::new(&descriptor);
        let adapter_options = wgpu::RequestAdapterOptions {
            power_preference: match options.power_preference {
                PowerPreference::Default => Default::default(),
                PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
                PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
            },
            force_fallback_adapter: options.force_fallback_adapter,
            compatible_surface: None,
        };
        let adapter = instance.request_adapter(&adapter_options).await?;
        let info = adapter.get_info();
        let encoding = select_encoding(&adapter, options.encoding)?;

        //start from conservative limits, but take the adapter's texture sizes
        let limits = Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits());
        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("shader_matrix device"),
            required_features: Default::default(),
            required_limits: limits,
            memory_hints: Default::default(),
            trace: Trace::Off,
        };
        let (device, queue) = adapter.request_device(&device_descriptor).await?;
        device.on_uncaptured_error(Box::new(|error: wgpu::Error| {
            logwise::error_sync!(
                "Uncaptured device error: {error}",
                error = logwise::privacy::LogIt(&error)
            );
        }));

        let quad_bytes: Vec<u8> = QUAD_VERTICES
            .iter()
            .flatten()
            .flat_map(|f| f.to_le_bytes())
            .collect();
        let quad = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("full-screen quad"),
            contents: &quad_bytes,
            usage: wgpu::BufferUsages::VERTEX,
        });

        logwise::info_sync!(
            "Created GPU context on {adapter} ({backend}) with {encoding} encoding, max texture {max}",
            adapter = logwise::privacy::LogIt(&info.name),
            backend = logwise::privacy::LogIt(&info.backend),
            encoding = logwise::privacy::LogIt(&encoding),
            max = device.limits().max_texture_dimension_2d
        );
        Ok(Device {
            _instance: instance,
            _adapter: adapter,
            device,
            queue,
            quad,
            encoding,
            adapter_name: info.name,
        })
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    pub(super) fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub(super) fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub(super) fn quad(&self) -> &wgpu::Buffer {
        &self.quad
    }

    /// Runs `f` inside validation and out-of-memory error scopes and returns the first error raised.
    pub(super) fn scoped<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> (T, Option<wgpu::Error>) {
        self.device.push_error_scope(ErrorFilter::OutOfMemory);
        self.device.push_error_scope(ErrorFilter::Validation);
        let value = f(&self.device);
        let validation = test_executors::sleep_on(self.device.pop_error_scope());
        let out_of_memory = test_executors::sleep_on(self.device.pop_error_scope());
        (value, validation.or(out_of_memory))
    }

    /// Blocks until all submitted work and pending map callbacks have finished.
    pub(super) fn wait(&self) -> Result<(), String> {
        self.device
            .poll(PollType::Wait)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

fn format_supported(adapter: &wgpu::Adapter, encoding: Encoding) -> bool {
    adapter
        .get_texture_format_features(encoding.wgpu_format())
        .allowed_usages
        .contains(REQUIRED_USAGES)
}

fn select_encoding(
    adapter: &wgpu::Adapter,
    preference: EncodingPreference,
) -> Result<Encoding, Error> {
    let native = format_supported(adapter, Encoding::NativeFloat);
    let packed = format_supported(adapter, Encoding::PackedBytes);
    match (preference, native, packed) {
        (EncodingPreference::Auto | EncodingPreference::Native, true, _) => {
            Ok(Encoding::NativeFloat)
        }
        (EncodingPreference::Packed, _, true) => Ok(Encoding::PackedBytes),
        (EncodingPreference::Native, false, true) => {
            logwise::warn_sync!("R32Float render targets unsupported; using packed-byte encoding");
            Ok(Encoding::PackedBytes)
        }
        (EncodingPreference::Auto, false, true) => {
            logwise::info_sync!("R32Float render targets unsupported; using packed-byte encoding");
            Ok(Encoding::PackedBytes)
        }
        (EncodingPreference::Packed, true, false) => {
            logwise::warn_sync!("Rgba8Uint render targets unsupported; using native-float encoding");
            Ok(Encoding::NativeFloat)
        }
        (_, false, false) => Err(Error::NoRenderableFormat),
    }
}
