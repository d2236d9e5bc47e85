use wgpu::{Adapter, Device, Instance, Queue, RequestAdapterOptions};

/// Engine initialization failures. These are terminal: the embedding shell
/// surfaces them once at startup. The runtime tick path produces no errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),
    #[error("kernel pipeline compilation failed: {0}")]
    PipelineCompile(String),
    #[error("buffer allocation failed at every capability tier")]
    AllocationFailed,
}

/// Grid capability tiers, highest first. Selection starts from the queried
/// adapter class and memory budget; an allocation failure steps down one
/// tier and retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityTier {
    /// 256^3 logical grid, 8^3 bricks, bucket-table indirection
    Sparse,
    /// 128^3 dense
    DenseHigh,
    /// 96^3 dense
    DenseMid,
    /// 64^3 dense
    DenseLow,
}

const DISCRETE_BUDGET: u64 = 256 << 20;

impl CapabilityTier {
    pub fn grid_size(self) -> u32 {
        match self {
            Self::Sparse => 256,
            Self::DenseHigh => 128,
            Self::DenseMid => 96,
            Self::DenseLow => 64,
        }
    }

    pub fn is_sparse(self) -> bool {
        self == Self::Sparse
    }

    pub fn next_lower(self) -> Option<Self> {
        match self {
            Self::Sparse => Some(Self::DenseHigh),
            Self::DenseHigh => Some(Self::DenseMid),
            Self::DenseMid => Some(Self::DenseLow),
            Self::DenseLow => None,
        }
    }

    /// Pick the starting tier. The sparse tier is entered only for an
    /// explicit 256 request; an unconstrained start lands on the best dense
    /// tier the device class supports.
    pub fn select(
        device_type: wgpu::DeviceType,
        limits: &wgpu::Limits,
        requested_grid: Option<u32>,
    ) -> Self {
        let discrete = device_type == wgpu::DeviceType::DiscreteGpu;
        let budget = limits.max_storage_buffer_binding_size as u64;
        let best = if discrete && budget >= DISCRETE_BUDGET {
            Self::Sparse
        } else if discrete {
            Self::DenseMid
        } else {
            Self::DenseLow
        };
        let wanted = match requested_grid {
            Some(g) if g >= 256 => Self::Sparse,
            Some(g) if g >= 128 => Self::DenseHigh,
            Some(g) if g >= 96 => Self::DenseMid,
            Some(_) => Self::DenseLow,
            // sparse stays opt-in; default to the dense flagship
            None if best == Self::Sparse => Self::DenseHigh,
            None => best,
        };
        // never start above what the device class allows
        let mut tier = best;
        while tier.grid_size() > wanted.grid_size().min(best.grid_size()) {
            match tier.next_lower() {
                Some(lower) => tier = lower,
                None => break,
            }
        }
        if wanted == Self::Sparse && best == Self::Sparse {
            return Self::Sparse;
        }
        tier
    }
}

/// GPU device manager. Owns the instance, adapter, and queue the engine
/// submits to; rendering consumers share the same device.
pub struct GpuContext {
    pub instance: Instance,
    pub adapter: Adapter,
    pub device: Device,
    pub queue: Queue,
}

impl GpuContext {
    pub async fn new() -> Result<Self, EngineError> {
        let instance = Instance::default();

        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| {
                EngineError::UnsupportedPlatform("no compatible GPU adapter found".into())
            })?;

        let adapter_limits = adapter.limits();
        let mut limits = wgpu::Limits::default();
        limits.max_storage_buffer_binding_size = adapter_limits.max_storage_buffer_binding_size;
        limits.max_buffer_size = adapter_limits.max_buffer_size;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: limits,
                    label: Some("microcosm_device"),
                },
                None,
            )
            .await
            .map_err(|e| EngineError::UnsupportedPlatform(format!("device request failed: {e}")))?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }

    /// Get device info for logging
    pub fn info(&self) -> String {
        let info = self.adapter.get_info();
        format!(
            "GPU: {} ({:?}), storage binding budget: {} MiB",
            info.name,
            info.backend,
            self.adapter.limits().max_storage_buffer_binding_size >> 20,
        )
    }

    /// Wait for all submitted GPU work to complete.
    pub fn wait(&self) {
        self.device.poll(wgpu::Maintain::Wait);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrated_adapters_land_on_the_low_tier() {
        let limits = wgpu::Limits::default();
        let tier = CapabilityTier::select(wgpu::DeviceType::IntegratedGpu, &limits, None);
        assert_eq!(tier, CapabilityTier::DenseLow);
    }

    #[test]
    fn discrete_with_budget_defaults_dense_high() {
        let mut limits = wgpu::Limits::default();
        limits.max_storage_buffer_binding_size = 1 << 30;
        let tier = CapabilityTier::select(wgpu::DeviceType::DiscreteGpu, &limits, None);
        assert_eq!(tier, CapabilityTier::DenseHigh);
    }

    #[test]
    fn sparse_requires_explicit_request() {
        let mut limits = wgpu::Limits::default();
        limits.max_storage_buffer_binding_size = 1 << 30;
        let tier = CapabilityTier::select(wgpu::DeviceType::DiscreteGpu, &limits, Some(256));
        assert_eq!(tier, CapabilityTier::Sparse);
    }

    #[test]
    fn requests_clamp_to_device_class() {
        let limits = wgpu::Limits::default();
        let tier = CapabilityTier::select(wgpu::DeviceType::IntegratedGpu, &limits, Some(256));
        assert_eq!(tier, CapabilityTier::DenseLow);
    }
}
