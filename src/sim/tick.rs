//! Fixed timestep simulation tick
//!
//! Advances a round by one step: detection, state transition, movement,
//! escape check, then outcome dispatch.

use super::collaborators::OutcomeSink;
use super::detection;
use super::geometry::GeometryQuery;
use super::movement;
use super::pursuit::{self, Senses, Step};
use super::state::{GameEvent, Outcome, PendingOutcome, PursuitState, Round};

/// Advance the round by one fixed timestep
///
/// Never fails. Once the outcome has been dispatched this is a no-op.
pub fn tick(round: &mut Round, geometry: &dyn GeometryQuery, sink: &mut dyn OutcomeSink, dt: f32) {
    if round.is_over() {
        return;
    }

    round.elapsed += dt;
    round.time_ticks += 1;

    let Some(player) = round.player.clone() else {
        if !round.missing_player_warned {
            log::warn!("No player in the round; adversary stays inert");
            round.missing_player_warned = true;
        }
        round.detection.clear();
        return;
    };
    let player_pos = player.position();

    if round.is_active() {
        if !round.activated {
            round.activated = true;
            log::info!("Adversary activated after {:.2}s", round.elapsed);
            round.push_event(GameEvent::Activated);
        }

        if !round.adversary.state.is_terminal() {
            // Detection (throttled)
            if round.detection.poll(dt) {
                let result =
                    detection::evaluate(&round.adversary, Some(player.as_ref()), geometry, &round.tuning);
                round.detection.record(result);
            }

            // Transition
            let senses = Senses {
                visible: round.detection.last().visible(),
                distance: round.adversary.position.distance(player_pos),
                player_position: player_pos,
            };
            let step = pursuit::next_state(
                round.adversary.state,
                round.adversary.confirmation,
                &senses,
                &round.tuning,
                dt,
            );
            apply_step(round, step);

            // Movement
            if let Some(event) = movement::step(
                &mut round.adversary,
                Some(player_pos),
                geometry,
                &round.tuning,
                &mut round.rng,
                dt,
            ) {
                round.push_event(event);
            }
        }
    }

    // Escape
    if !round.adversary.terminal_fired {
        let distance = round.adversary.position.distance(player_pos);
        let in_zone = round.player_in_safe_zone();
        if let Some(route) = round.escape.update(distance, in_zone, &round.tuning, dt) {
            log::info!("Player escaped ({route:?}) at {:.2}s", round.elapsed);
            round.adversary.terminal_fired = true;
            round.adversary.confirmation = None;
            let now = round.elapsed;
            round
                .adversary
                .set_state(PursuitState::Ended(Outcome::Escaped), now);
            round.pending_outcome = Some(PendingOutcome {
                outcome: Outcome::Escaped,
                elapsed: 0.0,
            });
            round.push_event(GameEvent::Escaped { route });
        }
    }

    dispatch(round, sink, dt);
}

fn apply_step(round: &mut Round, step: Step) {
    let now = round.elapsed;
    let previous = round.adversary.state;

    if step.state.label() != previous.label() {
        log::info!("Adversary {} -> {}", previous.label(), step.state.label());
    }

    if step.state == PursuitState::Attacking && !round.adversary.terminal_fired {
        round.adversary.terminal_fired = true;
        round.pending_outcome = Some(PendingOutcome {
            outcome: Outcome::Captured,
            elapsed: 0.0,
        });
        log::info!("Player captured at {now:.2}s");
    }

    round.adversary.set_state(step.state, now);
    round.adversary.confirmation = step.confirmation;

    for event in step.events {
        match event {
            GameEvent::SightingStarted { at } => log::debug!("Sighting started at {at}"),
            GameEvent::SightingCancelled => log::debug!("Sighting cancelled"),
            _ => {}
        }
        round.push_event(event);
    }
}

/// Hand the pending outcome to the sink once its delay has elapsed
fn dispatch(round: &mut Round, sink: &mut dyn OutcomeSink, dt: f32) {
    let Some(pending) = round.pending_outcome.as_mut() else {
        return;
    };
    pending.elapsed += dt;
    if pending.elapsed < round.tuning.outcome_delay {
        return;
    }

    let outcome = pending.outcome;
    round.pending_outcome = None;
    round.dispatched = Some(outcome);
    let now = round.elapsed;
    round.adversary.set_state(PursuitState::Ended(outcome), now);

    match outcome {
        Outcome::Captured => sink.on_capture(),
        Outcome::Escaped => sink.on_victory(),
    }
    log::info!("Outcome {outcome:?} dispatched");
    round.push_event(GameEvent::OutcomeDispatched { outcome });
}
