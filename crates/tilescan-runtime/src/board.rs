use crate::{BarrierError, CorePhase, Seat};

/// Per-core write-once storage for the trailing totals of a run.
///
/// Each core writes its own slot exactly once while publishing, and the only way to read any
/// slot is the [BoardView] returned once every core crossed the first barrier.
#[derive(Debug)]
pub struct TotalsBoard<T> {
    slots: Vec<spin::Once<Vec<T>>>,
}

impl<T: Send + Sync> TotalsBoard<T> {
    /// Create a board with one empty slot per core.
    pub fn new(cores: usize) -> Self {
        Self {
            slots: (0..cores).map(|_| spin::Once::new()).collect(),
        }
    }

    /// Number of slots.
    pub fn cores(&self) -> usize {
        self.slots.len()
    }

    /// Write the totals of the seat's core, then wait until every core did the same.
    ///
    /// On success the seat is in [CorePhase::ExchangeTotals].
    pub fn publish(
        &self,
        seat: &mut Seat<'_>,
        totals: Vec<T>,
    ) -> Result<BoardView<'_, T>, BarrierError> {
        let core = seat.core();

        if seat.phase() != CorePhase::LocalScan {
            return Err(BarrierError::PhaseOrder {
                core,
                current: seat.phase(),
                requested: CorePhase::ExchangeTotals,
            });
        }

        let slot = self
            .slots
            .get(core)
            .ok_or(BarrierError::MissingTotals { core })?;
        if slot.is_completed() {
            return Err(BarrierError::AlreadyPublished { core });
        }
        slot.call_once(|| totals);

        seat.arrive(CorePhase::ExchangeTotals)?;

        Ok(BoardView { slots: &self.slots })
    }
}

/// Read access to every published total.
#[derive(Debug)]
pub struct BoardView<'a, T> {
    slots: &'a [spin::Once<Vec<T>>],
}

impl<'a, T> BoardView<'a, T> {
    /// The totals published by `core`.
    pub fn totals(&self, core: usize) -> Result<&'a [T], BarrierError> {
        self.slots
            .get(core)
            .and_then(|slot| slot.get())
            .map(Vec::as_slice)
            .ok_or(BarrierError::MissingTotals { core })
    }
}
