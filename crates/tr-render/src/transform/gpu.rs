//! Compute-shader transform on a wgpu device

use std::sync::mpsc;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use parking_lot::Mutex;
use tr_core::{AxisMapping, ExecutionPath, PreparedMapping};
use tr_data::ScratchPools;
use tracing::{debug, error, info};

use super::host::HostTransform;
use super::{check_output, DomainTransform};
use crate::error::RenderError;

const WORKGROUP_SIZE: usize = 256;
const MAX_WORKGROUPS_PER_DIMENSION: usize = 65_535;

const FLAG_LOG: u32 = 1;
const FLAG_INVERT: u32 = 2;

/// Uniform block of `normalize.wgsl`
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct NormalizeParams {
    lo: f32,
    hi: f32,
    floor: f32,
    flags: u32,
    len: u32,
    _pad: [u32; 3],
}

/// Device buffers sized for `capacity` values
struct DeviceBuffers {
    capacity: usize,
    input: wgpu::Buffer,
    output: wgpu::Buffer,
    staging: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// Normalization on a GPU compute device.
///
/// Device buffers are created lazily, grown to the next power of two and
/// reused across calls. Inputs longer than the device's storage binding
/// limit are processed in chunks.
pub struct GpuTransform {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    params: wgpu::Buffer,
    buffers: Mutex<Option<DeviceBuffers>>,
    adapter_name: String,
    max_elements: usize,
    pools: Arc<ScratchPools>,
}

impl GpuTransform {
    /// Open the default high-performance adapter and build the pipeline
    pub fn new(pools: Arc<ScratchPools>) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: None,
        }))
        .ok_or_else(|| RenderError::GpuUnavailable("no compatible adapter".to_string()))?;

        let info = adapter.get_info();
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("telerender device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
            },
            None,
        ))
        .map_err(|e| RenderError::GpuUnavailable(e.to_string()))?;

        device.on_uncaptured_error(Box::new(|e| {
            error!("Uncaptured GPU error: {}", e);
        }));

        let limits = device.limits();
        let max_bytes = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
        let max_elements = (max_bytes / std::mem::size_of::<f32>() as u64) as usize;
        if max_elements == 0 {
            return Err(RenderError::GpuUnavailable("device has no storage buffer space".to_string()));
        }

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("normalize"),
            source: wgpu::ShaderSource::Wgsl(include_str!("normalize.wgsl").into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("normalize layout"),
            entries: &[
                layout_entry(0, wgpu::BufferBindingType::Uniform),
                layout_entry(1, wgpu::BufferBindingType::Storage { read_only: true }),
                layout_entry(2, wgpu::BufferBindingType::Storage { read_only: false }),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("normalize pipeline layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("normalize pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "main",
        });

        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("normalize params"),
            size: std::mem::size_of::<NormalizeParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        info!("GPU transform ready on {} ({:?})", info.name, info.backend);

        Ok(Self {
            device,
            queue,
            pipeline,
            layout,
            params,
            buffers: Mutex::new(None),
            adapter_name: info.name,
            max_elements,
            pools,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Largest number of values one dispatch can process
    pub fn max_elements(&self) -> usize {
        self.max_elements
    }

    fn create_buffers(&self, len: usize) -> DeviceBuffers {
        let capacity = len.next_power_of_two().min(self.max_elements);
        let size = (capacity * std::mem::size_of::<f32>()) as u64;
        debug!("Allocating GPU transform buffers for {} values", capacity);

        let input = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("normalize input"),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let output = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("normalize output"),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("normalize staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("normalize bind group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: self.params.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: input.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: output.as_entire_binding() },
            ],
        });

        DeviceBuffers {
            capacity,
            input,
            output,
            staging,
            bind_group,
        }
    }

    /// Run one dispatch over `values`, at most `max_elements` long
    fn dispatch(&self, values: &[f32], params: NormalizeParams, out: &mut [f32]) -> Result<(), RenderError> {
        let len = values.len();
        if len == 0 {
            return Ok(());
        }

        let mut guard = self.buffers.lock();
        if guard.as_ref().map_or(true, |b| b.capacity < len) {
            *guard = None;
        }
        let buffers = guard.get_or_insert_with(|| self.create_buffers(len));

        let bytes = (len * std::mem::size_of::<f32>()) as u64;
        self.queue.write_buffer(&buffers.input, 0, bytemuck::cast_slice(values));
        self.queue.write_buffer(&self.params, 0, bytemuck::bytes_of(&params));

        let groups = (len + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE;
        let groups_x = groups.min(MAX_WORKGROUPS_PER_DIMENSION);
        let groups_y = (groups + groups_x - 1) / groups_x;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("normalize encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("normalize pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &buffers.bind_group, &[]);
            pass.dispatch_workgroups(groups_x as u32, groups_y as u32, 1);
        }
        encoder.copy_buffer_to_buffer(&buffers.output, 0, &buffers.staging, 0, bytes);
        self.queue.submit(Some(encoder.finish()));

        if let Some(e) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RenderError::Gpu(e.to_string()));
        }

        let slice = buffers.staging.slice(..bytes);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| RenderError::Gpu(e.to_string()))?
            .map_err(|e| RenderError::Gpu(e.to_string()))?;

        {
            let mapped = slice.get_mapped_range();
            out[..len].copy_from_slice(bytemuck::cast_slice(&mapped));
        }
        buffers.staging.unmap();
        Ok(())
    }

    /// Upload `values` in chunks, replacing non-finite entries on the way
    fn run(&self, values: &[f32], params: NormalizeParams, out: &mut [f32]) -> Result<(), RenderError> {
        for (chunk, out_chunk) in values.chunks(self.max_elements).zip(out.chunks_mut(self.max_elements)) {
            let mut staged = self.pools.floats.checkout(chunk.len());
            for (s, &v) in staged.iter_mut().zip(chunk) {
                *s = sanitize(v);
            }
            let params = NormalizeParams {
                len: chunk.len() as u32,
                ..params
            };
            self.dispatch(&staged, params, out_chunk)?;
        }
        Ok(())
    }
}

impl DomainTransform for GpuTransform {
    fn path(&self) -> ExecutionPath {
        ExecutionPath::Gpu
    }

    fn normalize(&self, input: &[f32], mapping: &AxisMapping, out: &mut [f32]) -> Result<(), RenderError> {
        check_output(input.len(), out.len())?;
        let prepared = mapping.prepare();
        let Some(params) = shader_params(&prepared) else {
            debug!("Range not representable in f32, normalizing on the host");
            return HostTransform.normalize(input, mapping, out);
        };
        self.run(input, params, out)
    }

    fn normalize_ticks(&self, ticks: &[i64], start: i64, end: i64, out: &mut [f32]) -> Result<(), RenderError> {
        check_output(ticks.len(), out.len())?;
        let span = end as i128 - start as i128;
        if span <= 0 {
            return HostTransform.normalize_ticks(ticks, start, end, out);
        }

        // WGSL has no 64-bit integers; offsets from `start` are narrowed here
        let mut offsets = self.pools.floats.checkout(ticks.len());
        for (o, &t) in offsets.iter_mut().zip(ticks) {
            *o = (t as i128 - start as i128) as f32;
        }
        let params = NormalizeParams {
            lo: 0.0,
            hi: span as f32,
            floor: 0.0,
            flags: 0,
            len: 0,
            _pad: [0; 3],
        };
        self.run(&offsets, params, out)
    }
}

fn layout_entry(binding: u32, ty: wgpu::BufferBindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Shader uniforms for `prepared`, `None` when the range collapses in f32
fn shader_params(prepared: &PreparedMapping) -> Option<NormalizeParams> {
    let (lo, hi) = (prepared.lo as f32, prepared.hi as f32);
    if !(lo.is_finite() && hi.is_finite() && hi > lo) {
        return None;
    }
    let mut flags = 0;
    if prepared.invert {
        flags |= FLAG_INVERT;
    }
    let floor = match prepared.log_floor {
        Some(floor) => {
            flags |= FLAG_LOG;
            floor as f32
        }
        None => 0.0,
    };
    Some(NormalizeParams {
        lo,
        hi,
        floor,
        flags,
        len: 0,
        _pad: [0; 3],
    })
}

/// `NaN` and `-inf` become the lowest finite value, `+inf` the highest
fn sanitize(v: f32) -> f32 {
    if v.is_nan() || v == f32::NEG_INFINITY {
        f32::MIN
    } else if v == f32::INFINITY {
        f32::MAX
    } else {
        v
    }
}
