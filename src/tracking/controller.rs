use chrono::NaiveDateTime;

use crate::{
    observer::*,
    rotor::{Rotor, RotorError},
    transform::*,
};
use super::error::*;

/// Rotor is treated as stopped when both rates are below this value
pub const RATE_THRESHOLD: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingState {
    #[default]
    Idle,
    Slewing,
    Tracking,
}

#[derive(Debug, Clone, Copy)]
pub struct Observation {
    pub horiz: HorizCoord,
    pub time:  NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct TrackingSession {
    pub target:        EqCoord,
    pub target_horiz:  HorizCoord,
    pub last_observed: Option<Observation>,
    pub state:         TrackingState,
}

/// Azimuth rate is in degrees per second. Elevation "rate" is plain
/// difference between two observations, not divided by elapsed time.
/// Returns `None` if time didn't advance
fn calc_rates(prev: &Observation, cur: &HorizCoord, now: &NaiveDateTime) -> Option<(f64, f64)> {
    let elapsed = (*now - prev.time).num_microseconds()? as f64 / 1_000_000.0;
    if elapsed <= 0.0 {
        return None;
    }
    let az_rate = (prev.horiz.az - cur.az) / elapsed;
    let el_rate = prev.horiz.el - cur.el;
    Some((az_rate, el_rate))
}

/// Turns "goto RA/DEC" requests into rotor commands and decides on every
/// `poll` whether motion has finished or must be restarted.
///
/// Not synchronized. If host calls it from several threads it must hold
/// the whole controller (with its rotor) under one lock
pub struct TrackingController<R: Rotor> {
    rotor:    R,
    observer: ObserverContext,
    session:  Option<TrackingSession>,
    reported: EqCoord,
}

impl<R: Rotor> TrackingController<R> {
    pub fn new(rotor: R, observer: ObserverPosition) -> Self {
        Self {
            rotor,
            observer: ObserverContext::new(observer),
            session:  None,
            reported: EqCoord::new(0.0, 90.0),
        }
    }

    pub fn state(&self) -> TrackingState {
        self.session
            .as_ref()
            .map(|session| session.state)
            .unwrap_or_default()
    }

    pub fn session(&self) -> Option<&TrackingSession> {
        self.session.as_ref()
    }

    pub fn target(&self) -> Option<EqCoord> {
        self.session.as_ref().map(|session| session.target)
    }

    /// Last RA/DEC computed from rotor position
    pub fn reported(&self) -> EqCoord {
        self.reported
    }

    pub fn observer(&self) -> &ObserverPosition {
        self.observer.position()
    }

    pub fn set_observer_location(&mut self, latitude: f64, longitude: f64) {
        self.observer.set_location(latitude, longitude);
    }

    pub fn rotor(&self) -> &R {
        &self.rotor
    }

    pub fn rotor_mut(&mut self) -> &mut R {
        &mut self.rotor
    }

    pub fn into_rotor(self) -> R {
        self.rotor
    }

    /// Starts new session for target. Previous motion and observations are
    /// dropped. State becomes `Slewing` even if command is not sent
    pub fn goto(&mut self, ra: f64, dec: f64, now: &NaiveDateTime) -> Result<(), RotorError> {
        let target = EqCoord::new(ra, dec);
        let target_horiz = to_horizontal(self.observer.position(), &target, now);
        log::info!("Goto {:?} => {:?}", target, target_horiz);

        self.session = Some(TrackingSession {
            target,
            target_horiz,
            last_observed: None,
            state: TrackingState::Slewing,
        });

        self.rotor.set_position(target_horiz.az, target_horiz.el)
            .inspect_err(|err| log::error!("Goto command failed: {}", err))
    }

    pub fn goto_now(&mut self, ra: f64, dec: f64) -> Result<(), RotorError> {
        self.goto(ra, dec, &chrono::Utc::now().naive_utc())
    }

    /// Stops rotor. State becomes `Idle` even if command is not sent
    pub fn abort(&mut self) -> Result<(), RotorError> {
        log::info!("Abort motion");
        if let Some(session) = &mut self.session {
            session.state = TrackingState::Idle;
        }
        self.rotor.stop()
            .inspect_err(|err| log::error!("Stop command failed: {}", err))
    }

    /// Reads rotor position, advances state and returns current RA/DEC
    pub fn poll(&mut self, now: &NaiveDateTime) -> Result<EqCoord, PollError> {
        let current = match self.rotor.get_position() {
            Ok(current) => current,
            Err(err) => {
                log::error!("Reading rotor position failed: {}", err);
                return Err(PollError::Position(err));
            }
        };

        let current_eq = to_equatorial(self.observer.position(), &current, now);
        self.reported = current_eq;

        let Some(session) = &mut self.session else {
            return Ok(current_eq);
        };

        let mut result = Ok(current_eq);

        match session.state {
            TrackingState::Slewing => {
                // Rates are zero when rotctld has reached what it can reach
                let rates = session.last_observed
                    .as_ref()
                    .and_then(|prev| calc_rates(prev, &current, now));
                if let Some((az_rate, el_rate)) = rates {
                    log::debug!("Rotor rates: az={:.6}°/s, el={:.6}°", az_rate, el_rate);
                    if f64::abs(az_rate) < RATE_THRESHOLD && f64::abs(el_rate) < RATE_THRESHOLD {
                        log::info!("Rotor stopped at {:?}, tracking {:?}", current, session.target);
                        session.state = TrackingState::Tracking;
                    }
                }
            }

            TrackingState::Tracking => {
                // Any difference restarts motion. Position never matches
                // exactly, so in practice rotor is re-commanded every poll
                if f64::abs(session.target.dec - current_eq.dec) > 0.0
                || f64::abs(session.target.ra - current_eq.ra) > 0.0 {
                    let target_horiz = to_horizontal(self.observer.position(), &session.target, now);
                    log::debug!(
                        "Current {:?} differs from target {:?}, moving to {:?}",
                        current_eq, session.target, target_horiz
                    );
                    match self.rotor.set_position(target_horiz.az, target_horiz.el) {
                        Ok(()) => {
                            session.target_horiz = target_horiz;
                            session.state = TrackingState::Slewing;
                        }
                        Err(err) => {
                            log::error!("Restarting rotor motion failed: {}", err);
                            result = Err(PollError::Reslew(err));
                        }
                    }
                }
            }

            TrackingState::Idle => {}
        }

        session.last_observed = Some(Observation {
            horiz: current,
            time:  *now,
        });

        result
    }

    pub fn poll_now(&mut self) -> Result<EqCoord, PollError> {
        self.poll(&chrono::Utc::now().naive_utc())
    }
}

#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq)]
enum RotorCommand {
    SetPosition(f64, f64),
    Stop,
}

/// Rotor which returns prepared positions (`None` means garbage response)
#[cfg(test)]
#[derive(Default)]
struct ScriptedRotor {
    positions: std::collections::VecDeque<Option<HorizCoord>>,
    commands:  Vec<RotorCommand>,
    fail_set:  bool,
}

#[cfg(test)]
impl ScriptedRotor {
    fn push(&mut self, pos: Option<HorizCoord>) {
        self.positions.push_back(pos);
    }

    fn stop_count(&self) -> usize {
        self.commands.iter().filter(|cmd| **cmd == RotorCommand::Stop).count()
    }
}

#[cfg(test)]
impl Rotor for ScriptedRotor {
    fn set_position(&mut self, az: f64, el: f64) -> Result<(), RotorError> {
        if self.fail_set {
            return Err(RotorError::Link(std::io::ErrorKind::BrokenPipe.into()));
        }
        self.commands.push(RotorCommand::SetPosition(az, el));
        Ok(())
    }

    fn get_position(&mut self) -> Result<HorizCoord, RotorError> {
        match self.positions.pop_front() {
            Some(Some(pos)) => Ok(pos),
            Some(None) =>
                Err(crate::rotor::ProtocolError::Malformed("oops".to_string()).into()),
            None =>
                Err(crate::rotor::ProtocolError::Truncated(0).into()),
        }
    }

    fn stop(&mut self) -> Result<(), RotorError> {
        self.commands.push(RotorCommand::Stop);
        Ok(())
    }

    fn disconnect(&mut self) {}

    fn is_connected(&self) -> bool {
        true
    }
}

#[cfg(test)]
fn test_time(seconds: i64) -> NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2025, 7, 4).unwrap().and_hms_opt(1, 30, 0).unwrap()
        + chrono::Duration::seconds(seconds)
}

#[cfg(test)]
fn test_observer() -> ObserverPosition {
    ObserverPosition::new(59.33, 18.07)
}

/// Controller moved into `Tracking` state by goto and two equal positions
#[cfg(test)]
fn tracking_controller() -> (TrackingController<ScriptedRotor>, HorizCoord) {
    let mut ctrl = TrackingController::new(ScriptedRotor::default(), test_observer());
    ctrl.goto(10.0, 45.0, &test_time(0)).unwrap();
    let pos = ctrl.session().unwrap().target_horiz;
    ctrl.rotor_mut().push(Some(pos));
    ctrl.rotor_mut().push(Some(pos));
    ctrl.poll(&test_time(1)).unwrap();
    ctrl.poll(&test_time(2)).unwrap();
    assert_eq!(ctrl.state(), TrackingState::Tracking);
    (ctrl, pos)
}

#[test]
fn test_goto_slew_track_reslew() {
    let observer = test_observer();
    let mut ctrl = TrackingController::new(ScriptedRotor::default(), observer);
    assert_eq!(ctrl.state(), TrackingState::Idle);

    ctrl.goto(10.0, 45.0, &test_time(0)).unwrap();
    assert_eq!(ctrl.state(), TrackingState::Slewing);
    assert_eq!(ctrl.target(), Some(EqCoord::new(10.0, 45.0)));
    let expected = to_horizontal(&observer, &EqCoord::new(10.0, 45.0), &test_time(0));
    assert_eq!(ctrl.rotor().commands, vec![RotorCommand::SetPosition(expected.az, expected.el)]);

    // First poll after goto only remembers position
    ctrl.rotor_mut().push(Some(expected));
    ctrl.poll(&test_time(1)).unwrap();
    assert_eq!(ctrl.state(), TrackingState::Slewing);

    // Zero rate
    ctrl.rotor_mut().push(Some(expected));
    let radec = ctrl.poll(&test_time(2)).unwrap();
    assert_eq!(ctrl.state(), TrackingState::Tracking);
    assert_eq!(radec, to_equatorial(&observer, &expected, &test_time(2)));
    assert_eq!(ctrl.rotor().commands.len(), 1);

    // Rotor is somewhere else
    let other = HorizCoord::new(expected.az + 10.0, expected.el - 5.0);
    ctrl.rotor_mut().push(Some(other));
    let radec = ctrl.poll(&test_time(3)).unwrap();
    assert_ne!(radec, EqCoord::new(10.0, 45.0));
    assert_eq!(ctrl.state(), TrackingState::Slewing);
    let reslew = to_horizontal(&observer, &EqCoord::new(10.0, 45.0), &test_time(3));
    assert_eq!(
        ctrl.rotor().commands,
        vec![
            RotorCommand::SetPosition(expected.az, expected.el),
            RotorCommand::SetPosition(reslew.az, reslew.el),
        ]
    );
    assert_eq!(ctrl.reported(), radec);
}

#[test]
fn test_moving_rotor_stays_slewing() {
    let mut ctrl = TrackingController::new(ScriptedRotor::default(), test_observer());
    ctrl.goto(3.0, -10.0, &test_time(0)).unwrap();
    ctrl.rotor_mut().push(Some(HorizCoord::new(100.0, 10.0)));
    ctrl.rotor_mut().push(Some(HorizCoord::new(100.0, 12.0)));
    ctrl.rotor_mut().push(Some(HorizCoord::new(105.0, 12.0)));
    ctrl.rotor_mut().push(Some(HorizCoord::new(105.0, 12.0)));
    ctrl.poll(&test_time(1)).unwrap();
    ctrl.poll(&test_time(2)).unwrap();
    assert_eq!(ctrl.state(), TrackingState::Slewing);
    ctrl.poll(&test_time(3)).unwrap();
    assert_eq!(ctrl.state(), TrackingState::Slewing);
    ctrl.poll(&test_time(4)).unwrap();
    assert_eq!(ctrl.state(), TrackingState::Tracking);
}

#[test]
fn test_elevation_rate_is_not_divided_by_time() {
    let mut ctrl = TrackingController::new(ScriptedRotor::default(), test_observer());
    ctrl.goto(3.0, -10.0, &test_time(0)).unwrap();
    // 0.01° in 100 s: tiny rate per second but delta is above threshold
    ctrl.rotor_mut().push(Some(HorizCoord::new(100.0, 10.0)));
    ctrl.rotor_mut().push(Some(HorizCoord::new(100.0, 10.01)));
    ctrl.poll(&test_time(0)).unwrap();
    ctrl.poll(&test_time(100)).unwrap();
    assert_eq!(ctrl.state(), TrackingState::Slewing);

    // Same azimuth delta is divided by time and gives rate below threshold
    ctrl.rotor_mut().push(Some(HorizCoord::new(100.01, 10.01)));
    ctrl.poll(&test_time(200)).unwrap();
    assert_eq!(ctrl.state(), TrackingState::Tracking);
}

#[test]
fn test_same_time_polls_dont_change_state() {
    let mut ctrl = TrackingController::new(ScriptedRotor::default(), test_observer());
    ctrl.goto(3.0, -10.0, &test_time(0)).unwrap();
    ctrl.rotor_mut().push(Some(HorizCoord::new(100.0, 10.0)));
    ctrl.rotor_mut().push(Some(HorizCoord::new(100.0, 10.0)));
    ctrl.poll(&test_time(5)).unwrap();
    ctrl.poll(&test_time(5)).unwrap();
    assert_eq!(ctrl.state(), TrackingState::Slewing);
}

#[test]
fn test_abort() {
    // From slewing
    let mut ctrl = TrackingController::new(ScriptedRotor::default(), test_observer());
    ctrl.goto(1.0, 2.0, &test_time(0)).unwrap();
    ctrl.abort().unwrap();
    assert_eq!(ctrl.state(), TrackingState::Idle);
    assert_eq!(ctrl.rotor().stop_count(), 1);

    // From tracking
    let (mut ctrl, pos) = tracking_controller();
    ctrl.abort().unwrap();
    assert_eq!(ctrl.state(), TrackingState::Idle);
    assert_eq!(ctrl.rotor().stop_count(), 1);

    // Idle doesn't react to positions
    ctrl.rotor_mut().push(Some(HorizCoord::new(pos.az + 30.0, pos.el)));
    ctrl.poll(&test_time(3)).unwrap();
    assert_eq!(ctrl.state(), TrackingState::Idle);
    assert_eq!(ctrl.rotor().commands.len(), 2);
}

#[test]
fn test_poll_failure_keeps_state() {
    let (mut ctrl, pos) = tracking_controller();
    let reported = ctrl.reported();
    let last_time = ctrl.session().unwrap().last_observed.unwrap().time;

    ctrl.rotor_mut().push(None);
    let result = ctrl.poll(&test_time(3));
    assert!(matches!(
        result,
        Err(PollError::Position(RotorError::Protocol(crate::rotor::ProtocolError::Malformed(_))))
    ));
    assert_eq!(ctrl.state(), TrackingState::Tracking);
    assert_eq!(ctrl.reported(), reported);
    assert_eq!(ctrl.session().unwrap().last_observed.unwrap().time, last_time);

    // Truncated response
    let result = ctrl.poll(&test_time(4));
    assert!(matches!(result, Err(PollError::Position(_))));
    assert_eq!(ctrl.state(), TrackingState::Tracking);

    // Next good poll works as usual
    ctrl.rotor_mut().push(Some(pos));
    ctrl.poll(&test_time(5)).unwrap();
    assert_eq!(ctrl.state(), TrackingState::Slewing);
}

#[test]
fn test_reslew_failure() {
    let (mut ctrl, pos) = tracking_controller();
    ctrl.rotor_mut().fail_set = true;
    ctrl.rotor_mut().push(Some(HorizCoord::new(pos.az + 1.0, pos.el)));
    let result = ctrl.poll(&test_time(3));
    assert!(matches!(result, Err(PollError::Reslew(RotorError::Link(_)))));
    assert_eq!(ctrl.state(), TrackingState::Tracking);
    assert_eq!(ctrl.session().unwrap().last_observed.unwrap().time, test_time(3));

    ctrl.rotor_mut().fail_set = false;
    ctrl.rotor_mut().push(Some(pos));
    ctrl.poll(&test_time(4)).unwrap();
    assert_eq!(ctrl.state(), TrackingState::Slewing);
}

#[test]
fn test_goto_failure_still_slewing() {
    let mut ctrl = TrackingController::new(ScriptedRotor::default(), test_observer());
    ctrl.rotor_mut().fail_set = true;
    assert!(ctrl.goto(1.0, 2.0, &test_time(0)).is_err());
    assert_eq!(ctrl.state(), TrackingState::Slewing);
}

#[test]
fn test_poll_without_goto() {
    let observer = test_observer();
    let mut ctrl = TrackingController::new(ScriptedRotor::default(), observer);
    assert_eq!(ctrl.reported(), EqCoord::new(0.0, 90.0));
    let pos = HorizCoord::new(200.0, 30.0);
    ctrl.rotor_mut().push(Some(pos));
    let radec = ctrl.poll(&test_time(0)).unwrap();
    assert_eq!(radec, to_equatorial(&observer, &pos, &test_time(0)));
    assert_eq!(ctrl.state(), TrackingState::Idle);
    assert!(ctrl.rotor().commands.is_empty());
}

#[test]
fn test_new_goto_replaces_session() {
    let (mut ctrl, _) = tracking_controller();
    ctrl.goto(20.0, -30.0, &test_time(3)).unwrap();
    let session = ctrl.session().unwrap();
    assert_eq!(session.state, TrackingState::Slewing);
    assert_eq!(session.target, EqCoord::new(20.0, -30.0));
    assert!(session.last_observed.is_none());
}

#[test]
fn test_observer_location_is_used() {
    let mut ctrl = TrackingController::new(ScriptedRotor::default(), test_observer());
    ctrl.set_observer_location(-33.87, 151.21);
    assert_eq!(*ctrl.observer(), ObserverPosition::new(-33.87, 151.21));
    ctrl.goto(10.0, 45.0, &test_time(0)).unwrap();
    let expected = to_horizontal(
        &ObserverPosition::new(-33.87, 151.21),
        &EqCoord::new(10.0, 45.0),
        &test_time(0)
    );
    assert_eq!(ctrl.session().unwrap().target_horiz, expected);
}

#[test]
fn test_tracking_with_simulated_rotor() {
    use crate::rotor::SimulatedRotor;

    let rotor = SimulatedRotor::new(HorizCoord::new(0.0, 0.0), 3.0);
    let mut ctrl = TrackingController::new(rotor, test_observer());
    ctrl.goto(10.0, 45.0, &test_time(0)).unwrap();
    let mut time = 1;
    while ctrl.state() == TrackingState::Slewing {
        ctrl.poll(&test_time(time)).unwrap();
        time += 1;
        assert!(time < 1000);
    }
    assert_eq!(ctrl.state(), TrackingState::Tracking);
    assert!(!ctrl.rotor().is_moving());

    // Sky has moved since goto
    ctrl.poll(&test_time(time)).unwrap();
    assert_eq!(ctrl.state(), TrackingState::Slewing);
    assert!(ctrl.rotor().is_moving());
}
