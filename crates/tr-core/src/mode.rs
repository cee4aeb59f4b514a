//! CPU/GPU execution path selection
//!
//! The policy is a pure function of its inputs so it can be queried freely
//! for diagnostics without touching any renderer state.

use serde::{Deserialize, Serialize};

/// Execution path a caller asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderMode {
    Cpu,
    Gpu,
    /// Let [`RenderModeSelector`] decide per call
    Adaptive,
}

impl Default for RenderMode {
    fn default() -> Self {
        RenderMode::Adaptive
    }
}

/// Execution path actually taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionPath {
    Cpu,
    Gpu,
}

impl std::fmt::Display for ExecutionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionPath::Cpu => write!(f, "CPU"),
            ExecutionPath::Gpu => write!(f, "GPU"),
        }
    }
}

/// Workload thresholds for adaptive selection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeThresholds {
    /// At or above this many points the GPU is always preferred
    pub gpu_min_points: usize,
    /// Point count from which a high update rate tips the choice to GPU
    pub frequent_min_points: usize,
    /// Update rate (Hz) counted as high
    pub frequent_min_hz: f32,
}

impl Default for ModeThresholds {
    fn default() -> Self {
        Self {
            gpu_min_points: 5000,
            frequent_min_points: 1000,
            frequent_min_hz: 30.0,
        }
    }
}

/// Deterministic CPU/GPU policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderModeSelector {
    pub thresholds: ModeThresholds,
}

/// Which rule produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    GpuFallback,
    Explicit,
    NoGpu,
    LargeDataset,
    FrequentUpdates,
    SmallWorkload,
}

impl RenderModeSelector {
    pub fn new(thresholds: ModeThresholds) -> Self {
        Self { thresholds }
    }

    /// Choose CPU or GPU for a render call
    pub fn select(
        &self,
        point_count: usize,
        update_frequency_hz: f32,
        requested: RenderMode,
        gpu_available: bool,
    ) -> ExecutionPath {
        self.decide(point_count, update_frequency_hz, requested, gpu_available).0
    }

    /// Human-readable justification for [`RenderModeSelector::select`]
    pub fn reason(
        &self,
        point_count: usize,
        update_frequency_hz: f32,
        requested: RenderMode,
        gpu_available: bool,
    ) -> String {
        let t = &self.thresholds;
        let (path, rule) = self.decide(point_count, update_frequency_hz, requested, gpu_available);
        match rule {
            Rule::GpuFallback => "GPU requested but not available; falling back to CPU".to_string(),
            Rule::Explicit => format!("{} explicitly requested", path),
            Rule::NoGpu => "Adaptive: no GPU available, using CPU".to_string(),
            Rule::LargeDataset => format!(
                "Adaptive: {} points >= {} threshold, using GPU",
                point_count, t.gpu_min_points
            ),
            Rule::FrequentUpdates => format!(
                "Adaptive: {} points >= {} at {:.1} Hz >= {:.1} Hz, using GPU",
                point_count, t.frequent_min_points, update_frequency_hz, t.frequent_min_hz
            ),
            Rule::SmallWorkload => format!(
                "Adaptive: {} points at {:.1} Hz below GPU thresholds, using CPU",
                point_count, update_frequency_hz
            ),
        }
    }

    fn decide(
        &self,
        point_count: usize,
        update_frequency_hz: f32,
        requested: RenderMode,
        gpu_available: bool,
    ) -> (ExecutionPath, Rule) {
        let t = &self.thresholds;
        match requested {
            RenderMode::Gpu if !gpu_available => (ExecutionPath::Cpu, Rule::GpuFallback),
            RenderMode::Gpu => (ExecutionPath::Gpu, Rule::Explicit),
            RenderMode::Cpu => (ExecutionPath::Cpu, Rule::Explicit),
            RenderMode::Adaptive => {
                if !gpu_available {
                    (ExecutionPath::Cpu, Rule::NoGpu)
                } else if point_count >= t.gpu_min_points {
                    (ExecutionPath::Gpu, Rule::LargeDataset)
                } else if point_count >= t.frequent_min_points
                    && update_frequency_hz >= t.frequent_min_hz
                {
                    (ExecutionPath::Gpu, Rule::FrequentUpdates)
                } else {
                    (ExecutionPath::Cpu, Rule::SmallWorkload)
                }
            }
        }
    }
}

/// [`RenderModeSelector::select`] with the default thresholds
pub fn select_render_mode(
    point_count: usize,
    update_frequency_hz: f32,
    requested: RenderMode,
    gpu_available: bool,
) -> ExecutionPath {
    RenderModeSelector::default().select(point_count, update_frequency_hz, requested, gpu_available)
}

/// [`RenderModeSelector::reason`] with the default thresholds
pub fn render_mode_reason(
    point_count: usize,
    update_frequency_hz: f32,
    requested: RenderMode,
    gpu_available: bool,
) -> String {
    RenderModeSelector::default().reason(point_count, update_frequency_hz, requested, gpu_available)
}
