use crate::BarrierError;
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// The phases every core walks through during a run.
///
/// Each transition except the last one is a barrier: no core enters a phase before every core
/// finished the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CorePhase {
    /// The core scans its own partition, ignoring every other core.
    LocalScan,
    /// The core reads the totals published by the cores preceding it.
    ExchangeTotals,
    /// The core adds its correction to its own output range.
    ApplyCorrection,
    /// The core left the protocol cleanly.
    Done,
}

impl CorePhase {
    /// The phase following this one, if any.
    pub fn next(self) -> Option<CorePhase> {
        match self {
            CorePhase::LocalScan => Some(CorePhase::ExchangeTotals),
            CorePhase::ExchangeTotals => Some(CorePhase::ApplyCorrection),
            CorePhase::ApplyCorrection => Some(CorePhase::Done),
            CorePhase::Done => None,
        }
    }
}

/// A reusable barrier shared by a fixed number of cores.
///
/// A core that leaves without finishing poisons it: every core waiting on it, or arriving later,
/// fails with [BarrierError::Poisoned] instead of blocking forever.
#[derive(Debug)]
pub struct Rendezvous {
    parties: usize,
    timeout: Option<Duration>,
    state: Mutex<RendezvousState>,
    condvar: Condvar,
}

#[derive(Debug, Default)]
struct RendezvousState {
    arrived: usize,
    generation: u64,
    poisoned_by: Option<usize>,
}

impl Rendezvous {
    /// Create a rendezvous for `parties` cores.
    pub fn new(parties: usize, timeout: Option<Duration>) -> Self {
        Self {
            parties,
            timeout,
            state: Mutex::new(RendezvousState::default()),
            condvar: Condvar::new(),
        }
    }

    /// The number of cores taking part.
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// The core that poisoned the rendezvous, if any.
    pub fn poisoned_by(&self) -> Option<usize> {
        self.state.lock().poisoned_by
    }

    /// Take the seat of `core`, starting in [CorePhase::LocalScan].
    pub fn seat(&self, core: usize) -> Seat<'_> {
        Seat {
            rendezvous: self,
            core,
            phase: CorePhase::LocalScan,
        }
    }

    /// Mark the rendezvous as abandoned by `core` and wake up every waiting core.
    pub fn poison(&self, core: usize) {
        let mut state = self.state.lock();
        if state.poisoned_by.is_none() {
            log::debug!("Core {core} poisoned the rendezvous");
            state.poisoned_by = Some(core);
        }
        self.condvar.notify_all();
    }

    fn wait(&self, core: usize, phase: CorePhase) -> Result<(), BarrierError> {
        let mut state = self.state.lock();

        if let Some(culprit) = state.poisoned_by {
            return Err(BarrierError::Poisoned {
                core,
                culprit,
                phase,
            });
        }

        let generation = state.generation;
        state.arrived += 1;

        if state.arrived == self.parties {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.condvar.notify_all();
            return Ok(());
        }

        let started = Instant::now();
        let deadline = self.timeout.map(|timeout| started + timeout);

        loop {
            match deadline {
                Some(deadline) => {
                    let _ = self.condvar.wait_until(&mut state, deadline);
                }
                None => self.condvar.wait(&mut state),
            }

            if state.generation != generation {
                return Ok(());
            }

            if let Some(culprit) = state.poisoned_by {
                return Err(BarrierError::Poisoned {
                    core,
                    culprit,
                    phase,
                });
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                state.poisoned_by = Some(core);
                self.condvar.notify_all();
                return Err(BarrierError::Timeout {
                    core,
                    phase,
                    waited: started.elapsed(),
                });
            }
        }
    }
}

/// The place of one core at a [Rendezvous].
///
/// Dropping a seat before [Seat::finish] poisons the rendezvous.
#[derive(Debug)]
pub struct Seat<'a> {
    rendezvous: &'a Rendezvous,
    core: usize,
    phase: CorePhase,
}

impl Seat<'_> {
    /// The core owning this seat.
    pub fn core(&self) -> usize {
        self.core
    }

    /// The phase the core is currently in.
    pub fn phase(&self) -> CorePhase {
        self.phase
    }

    /// Wait for every core, then enter `next`.
    ///
    /// `next` must be the phase directly following the current one and cannot be
    /// [CorePhase::Done]; use [Seat::finish] to leave.
    pub fn arrive(&mut self, next: CorePhase) -> Result<(), BarrierError> {
        if next == CorePhase::Done || self.phase.next() != Some(next) {
            return Err(self.phase_order(next));
        }

        self.rendezvous.wait(self.core, next)?;
        log::trace!("Core {} entered {next:?}", self.core);
        self.phase = next;

        Ok(())
    }

    /// Leave the protocol after the last phase.
    pub fn finish(mut self) -> Result<(), BarrierError> {
        if self.phase.next() != Some(CorePhase::Done) {
            return Err(self.phase_order(CorePhase::Done));
        }

        self.phase = CorePhase::Done;
        log::trace!("Core {} done", self.core);

        Ok(())
    }

    fn phase_order(&self, requested: CorePhase) -> BarrierError {
        BarrierError::PhaseOrder {
            core: self.core,
            current: self.phase,
            requested,
        }
    }
}

impl Drop for Seat<'_> {
    fn drop(&mut self) {
        if self.phase != CorePhase::Done {
            self.rendezvous.poison(self.core);
        }
    }
}
