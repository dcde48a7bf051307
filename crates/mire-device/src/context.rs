//! The shared device context: one owner, many borrowers.

use indexmap::IndexMap;

use crate::error::DeviceError;
use crate::probe::{caps_from_features, select_adapter, DeviceCaps};

/// Identifies a shared buffer in the context's buffer table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// One f64 per node (matter field).
    NodeScalar,
    /// One f64 per edge (weights).
    EdgeScalar,
    /// Two f64 per edge (complex amplitude, interleaved re/im).
    EdgeAmplitude,
}

impl BufferKind {
    const ALL: [BufferKind; 3] = [
        BufferKind::NodeScalar,
        BufferKind::EdgeScalar,
        BufferKind::EdgeAmplitude,
    ];

    /// Element count for this buffer given node and edge counts.
    fn element_count(self, node_count: usize, edge_count: usize) -> usize {
        match self {
            BufferKind::NodeScalar => node_count,
            BufferKind::EdgeScalar => edge_count,
            BufferKind::EdgeAmplitude => edge_count * 2,
        }
    }
}

/// Configuration for device creation.
#[derive(Clone, Debug, Default)]
pub struct DeviceConfig {
    /// Require `SHADER_F64`; if the selected adapter lacks it, device
    /// creation fails and the caller should use a disabled context.
    pub require_f64: bool,
}

struct GpuHandle {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

struct SharedBuffer {
    buffer: wgpu::Buffer,
    /// Allocated capacity in f64 elements.
    elements: usize,
}

/// The shared handle to GPU execution resources and buffers.
///
/// Created once by the pipeline host; modules borrow it immutably.
/// Buffer reallocation requires `&mut self`, so the type system
/// enforces the ownership discipline: modules can upload, dispatch,
/// and read back, but never create, destroy, or resize a shared
/// buffer.
pub struct DeviceContext {
    gpu: Option<GpuHandle>,
    caps: DeviceCaps,
    buffers: IndexMap<BufferKind, SharedBuffer>,
    /// `(node_count, edge_count)` the buffer table was last sized for.
    sized_for: Option<(usize, usize)>,
}

impl DeviceContext {
    /// Probe for an adapter and create a device.
    ///
    /// Runs the full (expensive) capability probe exactly once; the
    /// result is cached in [`DeviceCaps`] for the context's lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::NoAdapter`] when no usable adapter
    /// exists and [`DeviceError::DeviceCreation`] when the adapter
    /// refuses the requested features. Callers treat either as a soft
    /// failure and continue with [`DeviceContext::disabled()`].
    pub fn initialize(config: DeviceConfig) -> Result<Self, DeviceError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = select_adapter(&instance)?;
        let info = adapter.get_info();
        let adapter_features = adapter.features();

        let mut required_features = wgpu::Features::empty();
        if adapter_features.contains(wgpu::Features::SHADER_F64) {
            required_features |= wgpu::Features::SHADER_F64;
        } else if config.require_f64 {
            return Err(DeviceError::DeviceCreation(format!(
                "adapter '{}' lacks SHADER_F64",
                info.name
            )));
        }
        if adapter_features.contains(wgpu::Features::TIMESTAMP_QUERY) {
            required_features |= wgpu::Features::TIMESTAMP_QUERY;
        }

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("mire device"),
                required_features,
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        ))
        .map_err(|e| DeviceError::DeviceCreation(e.to_string()))?;

        log::debug!("device context created on adapter '{}'", info.name);

        Ok(Self {
            gpu: Some(GpuHandle { device, queue }),
            caps: caps_from_features(info.name, required_features),
            buffers: IndexMap::new(),
            sized_for: None,
        })
    }

    /// An inert context for hosts without a usable GPU.
    ///
    /// Every dispatch-path method fails with [`DeviceError::Disabled`];
    /// modules consult [`DeviceContext::is_initialized()`] once at
    /// their own initialization and select their CPU path.
    pub fn disabled() -> Self {
        Self {
            gpu: None,
            caps: DeviceCaps::none(),
            buffers: IndexMap::new(),
            sized_for: None,
        }
    }

    /// Whether a live device backs this context.
    pub fn is_initialized(&self) -> bool {
        self.gpu.is_some()
    }

    /// The cached capability probe result.
    pub fn caps(&self) -> &DeviceCaps {
        &self.caps
    }

    // ── Owner-only buffer management ───────────────────────────

    /// Size (or resize) the shared buffer table for a topology.
    ///
    /// Owner-only: requires `&mut self`. Stale buffers are destroyed
    /// before their replacements are allocated so peak memory stays
    /// bounded. A no-op when the table already matches the requested
    /// sizes or the context is disabled.
    pub fn ensure_capacity(&mut self, node_count: usize, edge_count: usize) {
        let Some(gpu) = &self.gpu else {
            return;
        };
        if self.sized_for == Some((node_count, edge_count)) {
            return;
        }

        for kind in BufferKind::ALL {
            if let Some(stale) = self.buffers.swap_remove(&kind) {
                stale.buffer.destroy();
            }
            let elements = kind.element_count(node_count, edge_count).max(1);
            let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("mire shared {kind:?}")),
                size: (elements * 8) as u64,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.buffers.insert(kind, SharedBuffer { buffer, elements });
        }
        self.sized_for = Some((node_count, edge_count));
    }

    /// Release the buffer table (owner-only). Used at cleanup.
    pub fn release_buffers(&mut self) {
        for (_, shared) in self.buffers.drain(..) {
            shared.buffer.destroy();
        }
        self.sized_for = None;
    }

    // ── Borrower operations ────────────────────────────────────

    /// A shared buffer, for binding into a dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::MissingBuffer`] before the owner has
    /// sized the table.
    pub fn buffer(&self, kind: BufferKind) -> Result<&wgpu::Buffer, DeviceError> {
        self.buffers
            .get(&kind)
            .map(|s| &s.buffer)
            .ok_or(DeviceError::MissingBuffer { kind })
    }

    /// Upload f64 data into a shared buffer (little-endian bytes).
    ///
    /// # Errors
    ///
    /// Fails when the context is disabled, the buffer is missing, or
    /// `data` exceeds the buffer's allocated element count.
    pub fn upload_f64(&self, kind: BufferKind, data: &[f64]) -> Result<(), DeviceError> {
        let gpu = self.gpu.as_ref().ok_or(DeviceError::Disabled)?;
        let shared = self
            .buffers
            .get(&kind)
            .ok_or(DeviceError::MissingBuffer { kind })?;
        if data.len() > shared.elements {
            return Err(DeviceError::Capacity {
                kind,
                requested: data.len(),
                allocated: shared.elements,
            });
        }
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        gpu.queue.write_buffer(&shared.buffer, 0, &bytes);
        Ok(())
    }

    /// Read back `count` f64 elements from a shared buffer.
    ///
    /// Copies through a transient staging buffer and blocks until the
    /// map completes — callers run this at most once per tick, after
    /// their dispatch, so the synchronous wait is the simple and
    /// correct choice.
    ///
    /// # Errors
    ///
    /// Fails when the context is disabled, the buffer is missing, the
    /// request exceeds capacity, or mapping fails.
    pub fn read_back_f64(&self, kind: BufferKind, count: usize) -> Result<Vec<f64>, DeviceError> {
        let gpu = self.gpu.as_ref().ok_or(DeviceError::Disabled)?;
        let shared = self
            .buffers
            .get(&kind)
            .ok_or(DeviceError::MissingBuffer { kind })?;
        if count > shared.elements {
            return Err(DeviceError::Capacity {
                kind,
                requested: count,
                allocated: shared.elements,
            });
        }

        let byte_len = (count * 8) as u64;
        let staging = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("mire readback staging"),
            size: byte_len,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("mire readback"),
            });
        encoder.copy_buffer_to_buffer(&shared.buffer, 0, &staging, 0, byte_len);
        gpu.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        gpu.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| DeviceError::Readback("map callback channel closed".to_string()))?
            .map_err(|e| DeviceError::Readback(e.to_string()))?;

        let data = slice.get_mapped_range();
        let result = mapped_bytes_to_f64(&data);
        drop(data);
        staging.unmap();
        Ok(result)
    }

    /// Compile a WGSL compute shader into a pipeline (entry point `main`).
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Disabled`] when no device is live.
    pub fn create_pipeline(
        &self,
        wgsl: &str,
        label: &str,
    ) -> Result<wgpu::ComputePipeline, DeviceError> {
        let gpu = self.gpu.as_ref().ok_or(DeviceError::Disabled)?;
        let module = gpu
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(wgsl.into()),
            });
        Ok(gpu
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: None,
                module: &module,
                entry_point: "main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            }))
    }

    /// Dispatch a compute pipeline over `workgroups` workgroups with
    /// the given buffers bound, in order, to bind group 0.
    ///
    /// Blocks until the submitted work completes, so shared buffers
    /// are never left mid-write when the next module runs.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Disabled`] when no device is live.
    pub fn dispatch(
        &self,
        pipeline: &wgpu::ComputePipeline,
        bindings: &[&wgpu::Buffer],
        workgroups: u32,
    ) -> Result<(), DeviceError> {
        let gpu = self.gpu.as_ref().ok_or(DeviceError::Disabled)?;

        let entries: Vec<wgpu::BindGroupEntry<'_>> = bindings
            .iter()
            .enumerate()
            .map(|(i, buffer)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("mire dispatch"),
            layout: &pipeline.get_bind_group_layout(0),
            entries: &entries,
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("mire dispatch"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("mire dispatch"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(workgroups, 1, 1);
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
        gpu.device.poll(wgpu::Maintain::Wait);
        Ok(())
    }

    /// Create a small module-owned parameter buffer from f64 values.
    ///
    /// Bound as a read-only storage buffer (f64 uniforms have awkward
    /// alignment rules, and kernels here treat parameters as a plain
    /// f64 array). Shared buffers are owner-managed, but per-dispatch
    /// parameter blocks are transient and module-local, so this does
    /// not touch the shared table.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Disabled`] when no device is live.
    pub fn create_params_f64(&self, values: &[f64]) -> Result<wgpu::Buffer, DeviceError> {
        let gpu = self.gpu.as_ref().ok_or(DeviceError::Disabled)?;
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        use wgpu::util::DeviceExt;
        Ok(gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mire params"),
                contents: &bytes,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            }))
    }
}

/// Convert mapped buffer bytes to f64 values.
///
/// Mapped ranges are typically 8-byte aligned so the cast succeeds;
/// the chunked fallback covers exotic alignments.
fn mapped_bytes_to_f64(data: &[u8]) -> Vec<f64> {
    bytemuck::try_cast_slice(data).map_or_else(
        |_| {
            data.chunks_exact(8)
                .map(|chunk| {
                    let mut b = [0u8; 8];
                    b.copy_from_slice(chunk);
                    f64::from_le_bytes(b)
                })
                .collect()
        },
        <[f64]>::to_vec,
    )
}
