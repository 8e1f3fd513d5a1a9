use crate::{CoreError, LaunchError, Rendezvous, Seat};
use std::any::Any;
use std::time::Duration;

/// A fixed set of cores, each executed on its own thread for the duration of one launch.
#[derive(Debug, Clone)]
pub struct CoreGrid {
    cores: usize,
    barrier_timeout: Option<Duration>,
}

impl CoreGrid {
    /// Create a grid of `cores` cores without barrier timeout.
    pub fn new(cores: usize) -> Self {
        Self {
            cores,
            barrier_timeout: None,
        }
    }

    /// Abort the launch when a core waits longer than `timeout` at a barrier.
    pub fn with_barrier_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.barrier_timeout = timeout;
        self
    }

    /// Number of cores.
    pub fn cores(&self) -> usize {
        self.cores
    }

    /// Run `task` once per core and wait for all of them.
    ///
    /// Every core receives its [Seat] at a rendezvous shared by the whole grid. The outputs are
    /// returned in core order. When cores fail, the first error that is not
    /// [secondary](CoreError::is_secondary) is returned.
    pub fn launch<R, E, F>(&self, task: F) -> Result<Vec<R>, E>
    where
        R: Send,
        E: CoreError,
        F: Fn(Seat<'_>) -> Result<R, E> + Sync,
    {
        if self.cores == 0 {
            return Err(LaunchError::EmptyGrid.into());
        }

        let rendezvous = Rendezvous::new(self.cores, self.barrier_timeout);

        let results: Vec<Result<R, E>> = std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.cores);

            for core in 0..self.cores {
                let task = &task;
                let rendezvous = &rendezvous;
                let spawned = std::thread::Builder::new()
                    .name(format!("tilescan-core-{core}"))
                    .spawn_scoped(scope, move || {
                        log::trace!("Core {core} started");
                        let result = task(rendezvous.seat(core));
                        log::trace!("Core {core} stopped");
                        result
                    });

                match spawned {
                    Ok(handle) => handles.push(Ok(handle)),
                    Err(err) => {
                        rendezvous.poison(core);
                        handles.push(Err(LaunchError::ThreadSpawn {
                            core,
                            reason: err.to_string(),
                        }));
                    }
                }
            }

            handles
                .into_iter()
                .enumerate()
                .map(|(core, handle)| match handle {
                    Ok(handle) => handle.join().unwrap_or_else(|payload| {
                        Err(LaunchError::CorePanicked {
                            core,
                            reason: panic_reason(payload.as_ref()),
                        }
                        .into())
                    }),
                    Err(err) => Err(err.into()),
                })
                .collect()
        });

        let mut outputs = Vec::with_capacity(self.cores);
        let mut secondary = None;

        for result in results {
            match result {
                Ok(output) => outputs.push(output),
                Err(err) if err.is_secondary() => {
                    secondary.get_or_insert(err);
                }
                Err(err) => return Err(err),
            }
        }

        match secondary {
            Some(err) => Err(err),
            None => Ok(outputs),
        }
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(reason) = payload.downcast_ref::<&str>() {
        reason.to_string()
    } else if let Some(reason) = payload.downcast_ref::<String>() {
        reason.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
