use core::marker::PhantomData;
use std::time::Duration;
use tilescan_runtime::{CoreGrid, CorePhase, Seat, TotalsBoard, config::GlobalConfig};

use crate::{
    CoreReport, NetworkSelector, ScanError, ScanPlan, ScanPrecision, ScanReport, SharedOutput,
    TensorView, ThresholdSelector, TileStreamer, TilingConfig, apply_correction, scan_partition,
    upstream_correction,
};

/// A prefix-sum engine bound to one validated tiling.
///
/// Every run launches one thread per partition. Each core scans its partition locally, publishes
/// its trailing totals, waits for the other cores and finally adds the totals of its upstream
/// cores to its elements.
pub struct ScanEngine<P: ScanPrecision, S: NetworkSelector = ThresholdSelector> {
    plan: ScanPlan,
    selector: S,
    barrier_timeout: Option<Duration>,
    summary: Option<log::Level>,
    _precision: PhantomData<P>,
}

impl<P: ScanPrecision> ScanEngine<P> {
    /// Validate `config` and build an engine using the global configuration for everything the
    /// tiling does not decide.
    pub fn configure(config: TilingConfig) -> Result<Self, ScanError> {
        let global = GlobalConfig::get();
        let plan = ScanPlan::new::<P>(config)?;

        log::debug!(
            "Scan of {:?} with {:?}: {} cores in {} groups",
            plan.shape(),
            plan.attributes(),
            plan.cores(),
            plan.groups()
        );
        for partition in plan.partitions() {
            log::debug!(
                "Core {}: rows {:?} of {:?} x {:?}, tiles of {} rows, {} segments, {:?}, upstream {:?}",
                partition.core,
                partition.r,
                partition.m,
                partition.n,
                partition.tile_rows,
                partition.segments,
                partition.carry,
                partition.upstream
            );
        }

        Ok(Self {
            plan,
            selector: ThresholdSelector::for_accumulator::<P::EA>(global.engine.vector_bytes),
            barrier_timeout: global.engine.barrier_timeout(),
            summary: global.logger.level(),
            _precision: PhantomData,
        })
    }
}

impl<P: ScanPrecision, S: NetworkSelector> ScanEngine<P, S> {
    /// Use `selector` to pick the network of each tile.
    pub fn with_selector<S2: NetworkSelector>(self, selector: S2) -> ScanEngine<P, S2> {
        ScanEngine {
            plan: self.plan,
            selector,
            barrier_timeout: self.barrier_timeout,
            summary: self.summary,
            _precision: PhantomData,
        }
    }

    /// Abort a run when a core waits longer than `timeout` at a barrier. `None` waits forever.
    pub fn with_barrier_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.barrier_timeout = timeout;
        self
    }

    pub fn plan(&self) -> &ScanPlan {
        &self.plan
    }

    pub fn selector(&self) -> &S {
        &self.selector
    }

    /// Scan `input` into `output`, both contiguous tensors of the planned shape.
    pub fn run(&self, input: &[P::EI], output: &mut [P::EI]) -> Result<ScanReport, ScanError> {
        let shape = self.plan.shape();
        for (name, actual) in [("input", input.len()), ("output", output.len())] {
            if actual != shape.len() {
                return Err(ScanError::ShapeMismatch {
                    name,
                    expected: shape.len(),
                    actual,
                });
            }
        }

        let input = TensorView::new(input, shape);
        let output = SharedOutput::new(output, shape);
        let board = TotalsBoard::<P::EA>::new(self.plan.cores());

        let cores = CoreGrid::new(self.plan.cores())
            .with_barrier_timeout(self.barrier_timeout)
            .launch(|seat| self.run_core(seat, &input, &output, &board))?;

        let report = ScanReport::new(cores);
        if let Some(level) = self.summary {
            log::log!(level, "Scanned {shape:?}: {report}");
        }

        Ok(report)
    }

    /// Same as [run](Self::run) on raw bytes, which must be aligned for the element type.
    pub fn run_bytes(&self, input: &[u8], output: &mut [u8]) -> Result<ScanReport, ScanError> {
        let input = bytemuck::try_cast_slice(input).map_err(|err| ScanError::ByteCast {
            name: "input",
            reason: err.to_string(),
        })?;
        let output = bytemuck::try_cast_slice_mut(output).map_err(|err| ScanError::ByteCast {
            name: "output",
            reason: err.to_string(),
        })?;

        self.run(input, output)
    }

    fn run_core(
        &self,
        mut seat: Seat<'_>,
        input: &TensorView<'_, P::EI>,
        output: &SharedOutput<'_, P::EI>,
        board: &TotalsBoard<P::EA>,
    ) -> Result<CoreReport, ScanError> {
        let partition = &self.plan.partitions()[seat.core()];
        let mut streamer = TileStreamer::<P, S>::new(
            partition,
            self.plan.attributes(),
            self.plan.shape().r,
            &self.selector,
        );

        let totals = scan_partition(&mut streamer, input, output);

        let view = board.publish(&mut seat, totals)?;
        let correction = upstream_correction(partition, &view)?;

        seat.arrive(CorePhase::ApplyCorrection)?;
        if let Some(correction) = correction {
            log::trace!(
                "Core {} applies the totals of cores {:?}",
                partition.core,
                partition.upstream
            );
            apply_correction(&mut streamer, output, &correction);
        }

        seat.finish()?;
        Ok(streamer.into_report())
    }
}
