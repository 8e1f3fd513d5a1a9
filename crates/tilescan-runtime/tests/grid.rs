use pretty_assertions::assert_eq;
use std::time::Duration;
use tilescan_runtime::*;

#[derive(Debug)]
enum TaskError {
    Launch(LaunchError),
    Barrier(BarrierError),
    Failed(usize),
}

impl From<LaunchError> for TaskError {
    fn from(value: LaunchError) -> Self {
        Self::Launch(value)
    }
}

impl From<BarrierError> for TaskError {
    fn from(value: BarrierError) -> Self {
        Self::Barrier(value)
    }
}

impl CoreError for TaskError {
    fn is_secondary(&self) -> bool {
        matches!(self, TaskError::Barrier(err) if err.is_secondary())
    }
}

fn full_protocol(mut seat: Seat<'_>) -> Result<usize, TaskError> {
    let core = seat.core();
    seat.arrive(CorePhase::ExchangeTotals)?;
    seat.arrive(CorePhase::ApplyCorrection)?;
    seat.finish()?;
    Ok(core)
}

#[test]
fn outputs_are_returned_in_core_order() {
    let outputs = CoreGrid::new(5).launch(full_protocol).unwrap();

    assert_eq!(outputs, vec![0, 1, 2, 3, 4]);
}

#[test]
fn empty_grid_is_rejected() {
    let err = CoreGrid::new(0).launch(full_protocol).unwrap_err();

    assert!(matches!(err, TaskError::Launch(LaunchError::EmptyGrid)));
}

#[test]
fn failing_core_is_reported_instead_of_its_siblings() {
    let err = CoreGrid::new(4)
        .launch(|mut seat| {
            if seat.core() == 3 {
                return Err(TaskError::Failed(3));
            }
            seat.arrive(CorePhase::ExchangeTotals)?;
            seat.arrive(CorePhase::ApplyCorrection)?;
            seat.finish()?;
            Ok(())
        })
        .unwrap_err();

    assert!(matches!(err, TaskError::Failed(3)));
}

#[test]
fn panicking_core_aborts_the_launch() {
    let err = CoreGrid::new(3)
        .launch(|mut seat| {
            if seat.core() == 1 {
                panic!("scratch area exhausted");
            }
            seat.arrive(CorePhase::ExchangeTotals)?;
            seat.arrive(CorePhase::ApplyCorrection)?;
            seat.finish()?;
            Ok(())
        })
        .unwrap_err();

    match err {
        TaskError::Launch(LaunchError::CorePanicked { core, reason }) => {
            assert_eq!(core, 1);
            assert_eq!(reason, "scratch area exhausted");
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn stalled_core_trips_the_timeout() {
    let err = CoreGrid::new(2)
        .with_barrier_timeout(Some(Duration::from_millis(50)))
        .launch(|mut seat| {
            if seat.core() == 0 {
                std::thread::sleep(Duration::from_millis(300));
            }
            seat.arrive(CorePhase::ExchangeTotals)?;
            seat.arrive(CorePhase::ApplyCorrection)?;
            seat.finish()?;
            Ok(())
        })
        .unwrap_err();

    assert!(matches!(
        err,
        TaskError::Barrier(BarrierError::Timeout { core: 1, .. })
    ));
}
