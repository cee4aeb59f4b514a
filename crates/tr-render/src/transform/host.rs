use rayon::prelude::*;
use tr_core::mapping::map_time;
use tr_core::{AxisMapping, ExecutionPath};

use super::{check_output, DomainTransform};
use crate::error::RenderError;

/// Below this many values a transform stays on the calling thread
const PARALLEL_MIN_LEN: usize = 4096;

/// Data-parallel transform on the rayon thread pool
#[derive(Debug, Default, Clone, Copy)]
pub struct HostTransform;

impl DomainTransform for HostTransform {
    fn path(&self) -> ExecutionPath {
        ExecutionPath::Cpu
    }

    fn normalize(&self, input: &[f32], mapping: &AxisMapping, out: &mut [f32]) -> Result<(), RenderError> {
        check_output(input.len(), out.len())?;
        let prepared = mapping.prepare();
        out[..input.len()]
            .par_iter_mut()
            .with_min_len(PARALLEL_MIN_LEN)
            .zip(input.par_iter())
            .for_each(|(o, &v)| *o = prepared.apply(v));
        Ok(())
    }

    fn normalize_ticks(&self, ticks: &[i64], start: i64, end: i64, out: &mut [f32]) -> Result<(), RenderError> {
        check_output(ticks.len(), out.len())?;
        out[..ticks.len()]
            .par_iter_mut()
            .with_min_len(PARALLEL_MIN_LEN)
            .zip(ticks.par_iter())
            .for_each(|(o, &t)| *o = map_time(t, start, end));
        Ok(())
    }
}
