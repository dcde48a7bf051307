//! Jacobi-style relaxation of edge weights toward their
//! neighbourhood mean.
//!
//! Each tick computes, from a frozen copy of the weights:
//!
//! ```text
//! w'[e] = (1 - alpha·dt) · w[e] + alpha·dt · mean(w[adjacent edges])
//! ```
//!
//! Edges with no adjacent edges keep their weight. Constructed via the
//! builder pattern: [`WeightDiffusion::builder`].

use mire_core::ModuleError;
use mire_graph::{EdgeKey, GraphState};
use mire_module::{Module, ModuleDescriptor, Stage, StepContext};

/// A weight-relaxation module (Forces stage, CPU).
#[derive(Debug)]
pub struct WeightDiffusion {
    descriptor: ModuleDescriptor,
    rate: f64,
}

/// Builder for [`WeightDiffusion`].
pub struct WeightDiffusionBuilder {
    name: String,
    priority: i32,
    rate: f64,
}

impl WeightDiffusion {
    /// Create a new builder with default rate 0.1.
    pub fn builder() -> WeightDiffusionBuilder {
        WeightDiffusionBuilder {
            name: "weight_diffusion".to_string(),
            priority: 0,
            rate: 0.1,
        }
    }
}

impl WeightDiffusionBuilder {
    /// Override the module name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the in-stage priority.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the relaxation rate `alpha`. Must be finite and >= 0;
    /// `alpha·dt` above 1 overshoots, so keep it below `1/dt`.
    pub fn rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    /// Build the module, validating all configuration.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `rate` is negative or not finite.
    pub fn build(self) -> Result<WeightDiffusion, String> {
        if !self.rate.is_finite() || self.rate < 0.0 {
            return Err(format!("rate must be finite and >= 0, got {}", self.rate));
        }
        Ok(WeightDiffusion {
            descriptor: ModuleDescriptor::new(self.name, Stage::Forces)
                .with_priority(self.priority)
                .with_category("dynamics"),
            rate: self.rate,
        })
    }
}

impl Module for WeightDiffusion {
    fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    fn execute_step(
        &mut self,
        state: &mut GraphState,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), ModuleError> {
        let alpha = (self.rate * ctx.dt()).min(1.0);
        if alpha == 0.0 || state.edge_count() == 0 {
            return Ok(());
        }

        // Frozen snapshot of weights keyed by edge, Jacobi-style.
        let snapshot: Vec<(EdgeKey, f64)> =
            state.edges().map(|(k, e)| (k, e.weight)).collect();

        let mut updates = Vec::with_capacity(snapshot.len());
        for (key, weight) in &snapshot {
            // Adjacent edges share an endpoint with this one.
            let mut sum = 0.0;
            let mut count = 0u32;
            for (other_key, other_weight) in &snapshot {
                if other_key == key {
                    continue;
                }
                let touches = other_key.other(key.lo()).is_some()
                    || other_key.other(key.hi()).is_some();
                if touches {
                    sum += other_weight;
                    count += 1;
                }
            }
            if count == 0 {
                continue;
            }
            let mean = sum / f64::from(count);
            updates.push((*key, (1.0 - alpha) * weight + alpha * mean));
        }

        for (key, new_weight) in updates {
            state
                .set_weight(key, new_weight)
                .map_err(|e| ModuleError::ExecutionFailed {
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }
}
