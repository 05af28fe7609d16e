//! Pursuit state machine
//!
//! [`next_state`] is a pure function of the current state, the pending
//! confirmation timer and what the adversary senses this tick. The tick loop
//! owns the side effects (terminal flag, logging, dispatch).

use glam::Vec3;

use super::state::{GameEvent, PursuitState};
use crate::tuning::Tuning;

/// What the adversary knows about the player this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Senses {
    /// Latest detection signal (may be up to one detection interval old)
    pub visible: bool,
    /// Distance to the player
    pub distance: f32,
    pub player_position: Vec3,
}

/// Result of one transition
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub state: PursuitState,
    pub confirmation: Option<f32>,
    pub events: Vec<GameEvent>,
}

impl Step {
    fn stay(state: PursuitState, confirmation: Option<f32>) -> Self {
        Self {
            state,
            confirmation,
            events: Vec::new(),
        }
    }
}

/// Outcome of feeding one tick of the visibility signal to a confirmation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Confirmation {
    /// No sighting in progress
    Idle,
    /// Sighting in progress with this much accumulated time
    Pending { elapsed: f32, started: bool },
    /// The sighting was lost before it was confirmed
    Cancelled,
    /// Accumulated time reached the delay
    Confirmed,
}

/// Advance a sighting confirmation by one tick
///
/// The first visible tick only opens the confirmation at zero. Later visible
/// ticks add `dt`; reaching `delay` confirms. Any non-visible tick cancels.
pub fn confirm(pending: Option<f32>, visible: bool, delay: f32, dt: f32) -> Confirmation {
    match (pending, visible) {
        (None, false) => Confirmation::Idle,
        (Some(_), false) => Confirmation::Cancelled,
        (None, true) => Confirmation::Pending {
            elapsed: 0.0,
            started: true,
        },
        (Some(t), true) => {
            let elapsed = t + dt;
            if elapsed >= delay {
                Confirmation::Confirmed
            } else {
                Confirmation::Pending {
                    elapsed,
                    started: false,
                }
            }
        }
    }
}

/// One transition of the pursuit state machine
///
/// Attacking and Ended are left untouched; escape is handled by the caller.
pub fn next_state(
    state: PursuitState,
    confirmation: Option<f32>,
    senses: &Senses,
    tuning: &Tuning,
    dt: f32,
) -> Step {
    match state {
        PursuitState::Patrolling => {
            let mut step = Step::stay(PursuitState::Patrolling, confirmation);
            apply_confirmation(&mut step, senses, tuning, dt);
            step
        }

        PursuitState::Chasing { last_known } => {
            if senses.distance <= tuning.capture_distance {
                return Step {
                    state: PursuitState::Attacking,
                    confirmation: None,
                    events: vec![GameEvent::Captured],
                };
            }
            if !senses.visible && senses.distance > tuning.lose_target_range {
                return Step {
                    state: PursuitState::Searching {
                        last_known,
                        elapsed: 0.0,
                    },
                    confirmation: None,
                    events: vec![GameEvent::TargetLost { last_known }],
                };
            }
            Step::stay(
                PursuitState::Chasing {
                    last_known: senses.player_position,
                },
                None,
            )
        }

        PursuitState::Searching {
            last_known,
            elapsed,
        } => {
            let mut step = Step::stay(
                PursuitState::Searching {
                    last_known,
                    elapsed: elapsed + dt,
                },
                confirmation,
            );
            apply_confirmation(&mut step, senses, tuning, dt);

            match step.state {
                PursuitState::Searching { elapsed, .. } if elapsed >= tuning.search_duration => {
                    // A pending confirmation carries over into the patrol
                    step.state = PursuitState::Patrolling;
                    step.events.push(GameEvent::SearchAbandoned);
                }
                _ => {}
            }
            step
        }

        PursuitState::Attacking | PursuitState::Ended(_) => Step::stay(state, confirmation),
    }
}

fn apply_confirmation(step: &mut Step, senses: &Senses, tuning: &Tuning, dt: f32) {
    match confirm(step.confirmation, senses.visible, tuning.detection_delay, dt) {
        Confirmation::Idle => {}
        Confirmation::Pending { elapsed, started } => {
            step.confirmation = Some(elapsed);
            if started {
                step.events.push(GameEvent::SightingStarted {
                    at: senses.player_position,
                });
            }
        }
        Confirmation::Cancelled => {
            step.confirmation = None;
            step.events.push(GameEvent::SightingCancelled);
        }
        Confirmation::Confirmed => {
            step.confirmation = None;
            step.state = PursuitState::Chasing {
                last_known: senses.player_position,
            };
            step.events.push(GameEvent::ChaseStarted {
                last_known: senses.player_position,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::Outcome;
    use proptest::prelude::*;

    const DT: f32 = 0.1;

    fn tuning() -> Tuning {
        Tuning {
            detection_delay: 0.3,
            capture_distance: 1.0,
            detection_range: 10.0,
            lose_target_range: 12.0,
            search_duration: 1.0,
            ..Default::default()
        }
    }

    fn senses(visible: bool, distance: f32) -> Senses {
        Senses {
            visible,
            distance,
            player_position: Vec3::new(0.0, 0.0, distance),
        }
    }

    #[test]
    fn test_first_sighting_only_opens_confirmation() {
        let step = next_state(PursuitState::Patrolling, None, &senses(true, 5.0), &tuning(), DT);
        assert_eq!(step.state, PursuitState::Patrolling);
        assert_eq!(step.confirmation, Some(0.0));
        assert!(matches!(step.events[..], [GameEvent::SightingStarted { .. }]));
    }

    #[test]
    fn test_first_sighting_with_zero_delay_waits_one_tick() {
        let tuning = Tuning {
            detection_delay: 0.0,
            ..tuning()
        };
        let s = senses(true, 5.0);
        let step = next_state(PursuitState::Patrolling, None, &s, &tuning, DT);
        assert_eq!(step.state, PursuitState::Patrolling);
        let step = next_state(step.state, step.confirmation, &s, &tuning, DT);
        assert!(matches!(step.state, PursuitState::Chasing { .. }));
    }

    #[test]
    fn test_confirmed_sighting_starts_chase() {
        let tuning = tuning();
        let s = senses(true, 5.0);
        let mut state = PursuitState::Patrolling;
        let mut confirmation = None;
        let mut ticks = 0;
        while !matches!(state, PursuitState::Chasing { .. }) {
            let step = next_state(state, confirmation, &s, &tuning, DT);
            state = step.state;
            confirmation = step.confirmation;
            ticks += 1;
            assert!(ticks < 10);
        }
        // Open, then three increments of 0.1 (give or take rounding)
        assert!((4..=5).contains(&ticks), "ticks = {ticks}");
        assert_eq!(state.last_known(), Some(s.player_position));
        assert_eq!(confirmation, None);
    }

    #[test]
    fn test_sighting_cancelled_when_view_breaks() {
        let step = next_state(PursuitState::Patrolling, Some(0.2), &senses(false, 5.0), &tuning(), DT);
        assert_eq!(step.state, PursuitState::Patrolling);
        assert_eq!(step.confirmation, None);
        assert_eq!(step.events, vec![GameEvent::SightingCancelled]);
    }

    #[test]
    fn test_chase_tracks_player() {
        let state = PursuitState::Chasing {
            last_known: Vec3::ZERO,
        };
        let step = next_state(state, None, &senses(true, 6.0), &tuning(), DT);
        assert_eq!(step.state.last_known(), Some(Vec3::new(0.0, 0.0, 6.0)));
        assert!(step.events.is_empty());
    }

    #[test]
    fn test_capture_checked_first() {
        let state = PursuitState::Chasing {
            last_known: Vec3::ZERO,
        };
        // Even an invisible player at capture range is captured
        let step = next_state(state, None, &senses(false, 1.0), &tuning(), DT);
        assert_eq!(step.state, PursuitState::Attacking);
        assert_eq!(step.events, vec![GameEvent::Captured]);
    }

    #[test]
    fn test_lose_target_keeps_previous_last_known() {
        let previous = Vec3::new(1.0, 0.0, 11.0);
        let state = PursuitState::Chasing {
            last_known: previous,
        };
        let step = next_state(state, None, &senses(false, 12.5), &tuning(), DT);
        assert_eq!(
            step.state,
            PursuitState::Searching {
                last_known: previous,
                elapsed: 0.0
            }
        );
        assert_eq!(step.events, vec![GameEvent::TargetLost { last_known: previous }]);
    }

    #[test]
    fn test_visible_beyond_lose_range_keeps_chasing() {
        let state = PursuitState::Chasing {
            last_known: Vec3::ZERO,
        };
        let step = next_state(state, None, &senses(true, 20.0), &tuning(), DT);
        assert!(matches!(step.state, PursuitState::Chasing { .. }));
    }

    #[test]
    fn test_search_abandoned_after_duration() {
        let tuning = tuning();
        let mut state = PursuitState::Searching {
            last_known: Vec3::X,
            elapsed: 0.0,
        };
        let mut events = Vec::new();
        for _ in 0..11 {
            let step = next_state(state, None, &senses(false, 20.0), &tuning, DT);
            state = step.state;
            events.extend(step.events);
        }
        assert_eq!(state, PursuitState::Patrolling);
        assert_eq!(state.last_known(), None);
        assert_eq!(events, vec![GameEvent::SearchAbandoned]);
    }

    #[test]
    fn test_search_redetection_uses_confirmation() {
        let tuning = tuning();
        let state = PursuitState::Searching {
            last_known: Vec3::X,
            elapsed: 0.2,
        };
        let step = next_state(state, None, &senses(true, 8.0), &tuning, DT);
        // Still searching, timer running, sighting pending
        assert!(matches!(step.state, PursuitState::Searching { .. }));
        assert_eq!(step.confirmation, Some(0.0));
        assert!(step.state.last_known().is_some());
        if let PursuitState::Searching { elapsed, .. } = step.state {
            assert!((elapsed - 0.3).abs() < 1e-6);
        }
    }

    #[test]
    fn test_pending_confirmation_survives_abandonment() {
        let tuning = tuning();
        let state = PursuitState::Searching {
            last_known: Vec3::X,
            elapsed: 0.95,
        };
        let step = next_state(state, Some(0.1), &senses(true, 8.0), &tuning, DT);
        assert_eq!(step.state, PursuitState::Patrolling);
        assert!(step.confirmation.is_some());
    }

    #[test]
    fn test_terminal_states_are_frozen() {
        for state in [PursuitState::Attacking, PursuitState::Ended(Outcome::Escaped)] {
            let step = next_state(state, None, &senses(true, 0.0), &tuning(), DT);
            assert_eq!(step.state, state);
            assert!(step.events.is_empty());
        }
    }

    fn arb_state() -> impl Strategy<Value = PursuitState> {
        prop_oneof![
            Just(PursuitState::Patrolling),
            Just(PursuitState::Chasing { last_known: Vec3::ZERO }),
            (0.0f32..2.0).prop_map(|elapsed| PursuitState::Searching {
                last_known: Vec3::X,
                elapsed
            }),
            Just(PursuitState::Attacking),
            Just(PursuitState::Ended(Outcome::Captured)),
        ]
    }

    proptest! {
        #[test]
        fn prop_chase_only_after_full_delay(
            visible in prop::collection::vec(any::<bool>(), 1..80),
            delay in 0.0f32..1.0,
        ) {
            let tuning = Tuning { detection_delay: delay, ..tuning() };
            let mut state = PursuitState::Patrolling;
            let mut confirmation = None;
            // Visible time accumulated after the opening tick of the current run
            let mut run: Option<f32> = None;
            for v in visible {
                let step = next_state(state, confirmation, &senses(v, 5.0), &tuning, DT);
                run = match (run, v) {
                    (_, false) => None,
                    (None, true) => Some(0.0),
                    (Some(t), true) => Some(t + DT),
                };
                if matches!(step.state, PursuitState::Chasing { .. }) {
                    let t = run.unwrap_or(0.0);
                    prop_assert!(v);
                    prop_assert!(t + 1e-5 >= delay, "chased after {} < {}", t, delay);
                    prop_assert!(t > 0.0);
                    break;
                }
                state = step.state;
                confirmation = step.confirmation;
            }
        }

        #[test]
        fn prop_no_lose_inside_hysteresis_band(
            visible in any::<bool>(),
            distance in 1.01f32..12.0,
        ) {
            let state = PursuitState::Chasing { last_known: Vec3::ZERO };
            let step = next_state(state, None, &senses(visible, distance), &tuning(), DT);
            let still_chasing = matches!(step.state, PursuitState::Chasing { .. });
            prop_assert!(still_chasing);
        }

        #[test]
        fn prop_state_stays_in_the_five(
            state in arb_state(),
            visible in any::<bool>(),
            distance in 0.0f32..30.0,
            pending in prop::option::of(0.0f32..1.0),
        ) {
            let step = next_state(state, pending, &senses(visible, distance), &tuning(), DT);
            let ok = matches!(
                step.state,
                PursuitState::Patrolling
                    | PursuitState::Chasing { .. }
                    | PursuitState::Searching { .. }
                    | PursuitState::Attacking
                    | PursuitState::Ended(_)
            );
            prop_assert!(ok);
            if state.is_terminal() {
                prop_assert_eq!(step.state, state);
            }
        }
    }
}
