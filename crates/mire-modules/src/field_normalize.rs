//! Matter-field renormalization with a GPU fast path.
//!
//! Captures the total matter at initialization and rescales the node
//! field each tick so the total is preserved against numerical drift
//! from upstream modules. One module type, one backend decision: the
//! CPU/GPU choice is made once when the device context is bound, from
//! its cached capability probe, never re-probed per tick.

use mire_core::ModuleError;
use mire_device::{BufferKind, DeviceContext};
use mire_graph::GraphState;
use mire_module::{Backend, Module, ModuleDescriptor, Stage, StepContext};

/// Scale kernel: `field[i] *= params[0]`. Requires `SHADER_F64`.
const SCALE_WGSL: &str = r"
@group(0) @binding(0) var<storage, read_write> field: array<f64>;
@group(0) @binding(1) var<storage, read> params: array<f64>;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    if (i < arrayLength(&field)) {
        field[i] = field[i] * params[0];
    }
}
";

const WORKGROUP_SIZE: u32 = 64;

/// Relative scale deviation below which rescaling is skipped.
const SCALE_EPSILON: f64 = 1e-12;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExecPath {
    Undecided,
    Cpu,
    Gpu,
}

/// A matter renormalization module (PostProcess stage, GPU preferred).
pub struct FieldNormalize {
    descriptor: ModuleDescriptor,
    target_sum: Option<f64>,
    path: ExecPath,
    pipeline: Option<wgpu::ComputePipeline>,
}

impl FieldNormalize {
    /// Build a field normalization module.
    pub fn new() -> Self {
        Self {
            descriptor: ModuleDescriptor::new("field_normalize", Stage::PostProcess)
                .with_backend(Backend::Gpu)
                .with_category("bookkeeping"),
            target_sum: None,
            path: ExecPath::Undecided,
            pipeline: None,
        }
    }

    /// Which backend the module committed to (`true` = GPU).
    pub fn uses_gpu(&self) -> bool {
        self.path == ExecPath::Gpu
    }

    fn scale_cpu(state: &mut GraphState, scale: f64) {
        for v in state.matter_slice_mut() {
            *v *= scale;
        }
    }

    fn scale_gpu(
        &self,
        device: &DeviceContext,
        state: &mut GraphState,
        scale: f64,
    ) -> Result<(), mire_device::DeviceError> {
        let count = state.matter_slice().len();
        device.upload_f64(BufferKind::NodeScalar, state.matter_slice())?;
        let params = device.create_params_f64(&[scale])?;
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or(mire_device::DeviceError::Disabled)?;
        let workgroups = (count as u32).div_ceil(WORKGROUP_SIZE);
        device.dispatch(
            pipeline,
            &[device.buffer(BufferKind::NodeScalar)?, &params],
            workgroups.max(1),
        )?;
        let result = device.read_back_f64(BufferKind::NodeScalar, count)?;
        state.matter_slice_mut().copy_from_slice(&result);
        Ok(())
    }
}

impl Default for FieldNormalize {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for FieldNormalize {
    fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    fn bind_device(&mut self, device: Option<&DeviceContext>) {
        // Backend decision, made exactly once from the cached probe.
        self.path = ExecPath::Cpu;
        let Some(device) = device else { return };
        if !device.is_initialized() || !device.caps().f64_shaders {
            return;
        }
        match device.create_pipeline(SCALE_WGSL, "field_normalize scale") {
            Ok(pipeline) => {
                self.pipeline = Some(pipeline);
                self.path = ExecPath::Gpu;
            }
            Err(e) => {
                log::warn!("field_normalize: GPU pipeline unavailable, using CPU path: {e}");
            }
        }
    }

    fn initialize(&mut self, state: &mut GraphState) -> Result<(), ModuleError> {
        let sum = state.total_matter();
        if !sum.is_finite() {
            return Err(ModuleError::NonFinite {
                quantity: "node matter".to_string(),
                index: None,
            });
        }
        self.target_sum = (sum != 0.0).then_some(sum);
        if self.path == ExecPath::Undecided {
            // bind_device was skipped (host without device support).
            self.path = ExecPath::Cpu;
        }
        Ok(())
    }

    fn execute_step(
        &mut self,
        state: &mut GraphState,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), ModuleError> {
        let Some(target) = self.target_sum else {
            return Ok(());
        };

        let sum = state.total_matter();
        if !sum.is_finite() {
            return Err(ModuleError::NonFinite {
                quantity: "node matter".to_string(),
                index: None,
            });
        }
        if sum == 0.0 {
            return Ok(());
        }
        let scale = target / sum;
        if (scale - 1.0).abs() < SCALE_EPSILON {
            return Ok(());
        }

        if self.path == ExecPath::Gpu {
            if let Some(device) = ctx.device() {
                match self.scale_gpu(device, state, scale) {
                    Ok(()) => return Ok(()),
                    Err(e) => {
                        // Soft capability: finish the tick on the CPU.
                        log::warn!("field_normalize: GPU dispatch failed, CPU fallback: {e}");
                    }
                }
            }
        }
        Self::scale_cpu(state, scale);
        Ok(())
    }

    fn cleanup(&mut self) -> Result<(), ModuleError> {
        // The shared buffers belong to the context owner; only the
        // module-held pipeline is released here.
        self.pipeline = None;
        Ok(())
    }
}
