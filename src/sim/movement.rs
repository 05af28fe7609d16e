//! Steering and local obstacle avoidance
//!
//! Each tick the adversary picks a target for its state, probes ahead for
//! obstacles, moves along the ground and turns smoothly toward where it
//! wants to go. Navigation is purely reactive: no path planning.

use glam::Vec3;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::geometry::{GeometryQuery, LayerMask};
use super::state::{Adversary, GameEvent, PursuitState};
use crate::consts::{PROBE_HEIGHT, SEARCH_SPIN_RATE, WANDER_MIN_RADIUS, WHISKER_OFFSET};
use crate::tuning::Tuning;
use crate::{flat_distance, forward_to_yaw, normalize_angle};

/// Layers the side probes react to
const PROBE_MASK: LayerMask = LayerMask::ALL.without(LayerMask(
    LayerMask::PLAYER.0 | LayerMask::GROUND.0,
));

/// Where the adversary walks when nothing is going on
///
/// Fixed for the adversary's lifetime; only its cursor and dwell timer move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PatrolPlan {
    /// Visit points in order, cycling, pausing at each
    Waypoints {
        points: Vec<Vec3>,
        index: usize,
        dwell: f32,
    },
    /// Wander to random points around `origin`, pausing at each
    Wander {
        origin: Vec3,
        range: f32,
        target: Vec3,
        dwell: f32,
    },
}

impl PatrolPlan {
    pub fn waypoints(points: Vec<Vec3>) -> Self {
        PatrolPlan::Waypoints {
            points,
            index: 0,
            dwell: 0.0,
        }
    }

    /// Wander plan with its first target already picked
    pub fn wander(origin: Vec3, tuning: &Tuning, rng: &mut Pcg32) -> Self {
        let origin = Vec3::new(origin.x, tuning.ground_height, origin.z);
        let range = tuning.random_patrol_range;
        PatrolPlan::Wander {
            origin,
            range,
            target: random_wander_target(origin, range, rng),
            dwell: 0.0,
        }
    }

    /// Current patrol target
    pub fn target(&self) -> Option<Vec3> {
        match self {
            PatrolPlan::Waypoints { points, index, .. } => points.get(*index).copied(),
            PatrolPlan::Wander { target, .. } => Some(*target),
        }
    }

    /// Wait at the current target; move on once the dwell time is served
    ///
    /// Returns the index of a waypoint that was just left behind.
    fn dwell(&mut self, dt: f32, wait: f32, rng: &mut Pcg32) -> Option<usize> {
        match self {
            PatrolPlan::Waypoints {
                points,
                index,
                dwell,
            } => {
                *dwell += dt;
                if *dwell >= wait && !points.is_empty() {
                    let reached = *index;
                    *index = (*index + 1) % points.len();
                    *dwell = 0.0;
                    return Some(reached);
                }
                None
            }
            PatrolPlan::Wander {
                origin,
                range,
                target,
                dwell,
            } => {
                *dwell += dt;
                if *dwell >= wait {
                    *target = random_wander_target(*origin, *range, rng);
                    *dwell = 0.0;
                }
                None
            }
        }
    }
}

/// Random point on the ground between [`WANDER_MIN_RADIUS`] and `range` from `origin`
pub fn random_wander_target(origin: Vec3, range: f32, rng: &mut Pcg32) -> Vec3 {
    let dir = Vec3::new(rng.random_range(-1.0..=1.0), 0.0, rng.random_range(-1.0..=1.0));
    let dir = match dir.try_normalize() {
        Some(dir) => dir,
        None => Vec3::X,
    };
    let min = WANDER_MIN_RADIUS.min(range);
    let dist = if range > min {
        rng.random_range(min..=range)
    } else {
        range
    };
    origin + dir * dist
}

/// Run the movement routine for the adversary's current state
///
/// Does nothing outside Patrolling, Chasing and Searching.
pub fn step(
    adversary: &mut Adversary,
    player: Option<Vec3>,
    geometry: &dyn GeometryQuery,
    tuning: &Tuning,
    rng: &mut Pcg32,
    dt: f32,
) -> Option<GameEvent> {
    match adversary.state {
        PursuitState::Patrolling => patrol(adversary, geometry, tuning, rng, dt),
        PursuitState::Chasing { .. } => {
            if let Some(player) = player {
                head_toward(adversary, player, tuning.chase_speed, geometry, tuning, dt);
            }
            None
        }
        PursuitState::Searching { last_known, .. } => {
            if flat_distance(adversary.position, last_known) > tuning.arrival_threshold {
                head_toward(adversary, last_known, tuning.patrol_speed, geometry, tuning, dt);
            } else {
                // Look around the spot where the player vanished
                adversary.yaw = normalize_angle(adversary.yaw + SEARCH_SPIN_RATE * dt);
            }
            None
        }
        PursuitState::Attacking | PursuitState::Ended(_) => None,
    }
}

fn patrol(
    adversary: &mut Adversary,
    geometry: &dyn GeometryQuery,
    tuning: &Tuning,
    rng: &mut Pcg32,
    dt: f32,
) -> Option<GameEvent> {
    let target = adversary.patrol.target()?;

    if flat_distance(adversary.position, target) > tuning.arrival_threshold {
        head_toward(adversary, target, tuning.patrol_speed, geometry, tuning, dt);
        return None;
    }

    let index = adversary.patrol.dwell(dt, tuning.patrol_wait_time, rng)?;
    log::debug!("Patrol waypoint {index} served, moving on");
    Some(GameEvent::WaypointReached { index })
}

/// Walk toward `target` on the ground plane and turn to face it
fn head_toward(
    adversary: &mut Adversary,
    target: Vec3,
    speed: f32,
    geometry: &dyn GeometryQuery,
    tuning: &Tuning,
    dt: f32,
) {
    let to_target = target - adversary.position;
    let dir = Vec3::new(to_target.x, 0.0, to_target.z).normalize_or_zero();
    if dir == Vec3::ZERO {
        return;
    }
    move_in_direction(adversary, dir, speed, geometry, tuning, dt);
    rotate_toward(&mut adversary.yaw, dir, tuning.rotation_speed, dt);
}

/// Apply one tick of motion along `dir`, after obstacle avoidance
pub fn move_in_direction(
    adversary: &mut Adversary,
    dir: Vec3,
    speed: f32,
    geometry: &dyn GeometryQuery,
    tuning: &Tuning,
    dt: f32,
) {
    let final_dir = if tuning.enable_collision_avoidance {
        avoidance_direction(adversary.position, dir, geometry, tuning)
    } else {
        dir
    };

    let mut next = adversary.position + final_dir * speed * dt;
    next.y = tuning.ground_height;

    if tuning.enable_collision_avoidance && tuning.body_radius > 0.0 {
        let body = Vec3::Y * tuning.body_radius;
        let blocked_next = geometry.overlap_sphere(next + body, tuning.body_radius, tuning.avoid_mask);
        let blocked_now =
            geometry.overlap_sphere(adversary.position + body, tuning.body_radius, tuning.avoid_mask);
        // Never step into an obstacle; stepping out of one is fine
        if blocked_next && !blocked_now {
            return;
        }
    }

    adversary.position = next;
}

/// Steer around what the probes see ahead
///
/// An avoid-class obstacle ahead sends the adversary along the first clear
/// perpendicular, or straight back if both sides are closed. Anything else
/// only nudges the direction away from a blocked side whisker.
pub fn avoidance_direction(
    position: Vec3,
    dir: Vec3,
    geometry: &dyn GeometryQuery,
    tuning: &Tuning,
) -> Vec3 {
    let origin = position + Vec3::Y * PROBE_HEIGHT;
    let reach = tuning.probe_distance;
    let side = dir.cross(Vec3::Y).normalize_or_zero();

    if geometry
        .raycast(origin, dir, reach, tuning.avoid_mask)
        .is_some()
    {
        for candidate in [side, -side] {
            if candidate != Vec3::ZERO
                && geometry.raycast(origin, candidate, reach, PROBE_MASK).is_none()
            {
                return candidate;
            }
        }
        return -dir;
    }

    let whisker = side * WHISKER_OFFSET;
    let side_blocked = geometry
        .raycast(origin + whisker, dir, reach, PROBE_MASK)
        .is_some();
    let other_blocked = geometry
        .raycast(origin - whisker, dir, reach, PROBE_MASK)
        .is_some();

    let nudged = match (side_blocked, other_blocked) {
        (true, false) => dir - whisker * 0.5,
        (false, true) => dir + whisker * 0.5,
        _ => dir,
    };
    match nudged.try_normalize() {
        Some(nudged) => nudged,
        None => dir,
    }
}

/// Turn `yaw` toward `dir` by the fraction `rotation_speed * dt` of the gap
///
/// Returns false (and leaves `yaw` alone) for a direction with no
/// horizontal component.
pub fn rotate_toward(yaw: &mut f32, dir: Vec3, rotation_speed: f32, dt: f32) -> bool {
    let Some(target) = forward_to_yaw(dir) else {
        return false;
    };
    let delta = normalize_angle(target - *yaw);
    let t = (rotation_speed * dt).clamp(0.0, 1.0);
    *yaw = normalize_angle(*yaw + delta * t);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::geometry::StaticScene;
    use rand::SeedableRng;
    use std::f32::consts::FRAC_PI_2;

    const DT: f32 = 1.0 / 60.0;

    fn tuning() -> Tuning {
        Tuning {
            ground_height: 0.0,
            patrol_speed: 1.0,
            chase_speed: 2.0,
            patrol_wait_time: 0.5,
            ..Default::default()
        }
    }

    fn rng() -> Pcg32 {
        Pcg32::seed_from_u64(5)
    }

    fn adversary_with(plan: PatrolPlan) -> Adversary {
        Adversary::spawn(Vec3::ZERO, 0.0, plan, 0.0)
    }

    #[test]
    fn test_waypoints_cycle_with_dwell() {
        let tuning = tuning();
        let mut rng = rng();
        let scene = StaticScene::new();
        let points = vec![Vec3::new(0.0, 0.0, 2.0), Vec3::new(2.0, 0.0, 2.0)];
        let mut adversary = adversary_with(PatrolPlan::waypoints(points));

        let mut reached = Vec::new();
        for _ in 0..(60 * 12) {
            if let Some(GameEvent::WaypointReached { index }) =
                step(&mut adversary, None, &scene, &tuning, &mut rng, DT)
            {
                reached.push(index);
            }
        }

        assert!(reached.len() >= 3, "reached: {reached:?}");
        assert_eq!(&reached[..3], &[0, 1, 0]);
    }

    #[test]
    fn test_dwell_before_advancing() {
        let tuning = tuning();
        let mut rng = rng();
        let scene = StaticScene::new();
        // Already standing on the first waypoint
        let mut adversary = adversary_with(PatrolPlan::waypoints(vec![Vec3::ZERO, Vec3::X * 5.0]));

        // A third of a second is not long enough
        for _ in 0..20 {
            assert!(step(&mut adversary, None, &scene, &tuning, &mut rng, DT).is_none());
        }
        // Position untouched while dwelling
        assert_eq!(adversary.position, Vec3::ZERO);
        let mut advanced = false;
        for _ in 0..20 {
            advanced |= step(&mut adversary, None, &scene, &tuning, &mut rng, DT).is_some();
        }
        assert!(advanced);
        assert_eq!(adversary.patrol.target(), Some(Vec3::X * 5.0));
    }

    #[test]
    fn test_wander_targets_stay_in_range() {
        let tuning = Tuning {
            random_patrol_range: 5.0,
            ..tuning()
        };
        let mut rng = rng();
        let origin = Vec3::new(3.0, 0.0, -2.0);
        for _ in 0..200 {
            let target = random_wander_target(origin, tuning.random_patrol_range, &mut rng);
            let d = flat_distance(origin, target);
            assert!((WANDER_MIN_RADIUS - 1e-4..=5.0 + 1e-4).contains(&d), "d = {d}");
            assert_eq!(target.y, origin.y);
        }
    }

    #[test]
    fn test_wander_regenerates_after_dwell() {
        let tuning = tuning();
        let mut rng = rng();
        let mut plan = PatrolPlan::wander(Vec3::ZERO, &tuning, &mut rng);
        let first = plan.target();
        plan.dwell(tuning.patrol_wait_time, tuning.patrol_wait_time, &mut rng);
        assert_ne!(plan.target(), first);
    }

    #[test]
    fn test_tiny_wander_range_does_not_panic() {
        let mut rng = rng();
        let target = random_wander_target(Vec3::ZERO, 0.5, &mut rng);
        assert!((flat_distance(Vec3::ZERO, target) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_chase_moves_at_chase_speed() {
        let tuning = tuning();
        let mut rng = rng();
        let scene = StaticScene::new();
        let mut adversary = adversary_with(PatrolPlan::waypoints(vec![]));
        adversary.state = PursuitState::Chasing {
            last_known: Vec3::ZERO,
        };
        let player = Vec3::new(0.0, 0.0, 10.0);

        step(&mut adversary, Some(player), &scene, &tuning, &mut rng, DT);
        let moved = adversary.position.length();
        assert!((moved - tuning.chase_speed * DT).abs() < 1e-5);
        assert!(adversary.position.z > 0.0);
        assert_eq!(adversary.position.y, tuning.ground_height);
    }

    #[test]
    fn test_search_spins_on_arrival() {
        let tuning = tuning();
        let mut rng = rng();
        let scene = StaticScene::new();
        let mut adversary = adversary_with(PatrolPlan::waypoints(vec![]));
        adversary.state = PursuitState::Searching {
            last_known: Vec3::new(0.3, 0.0, 0.0),
            elapsed: 0.0,
        };
        let yaw = adversary.yaw;
        step(&mut adversary, None, &scene, &tuning, &mut rng, DT);
        assert_eq!(adversary.position, Vec3::ZERO);
        assert!((adversary.yaw - (yaw + SEARCH_SPIN_RATE * DT)).abs() < 1e-6);
    }

    #[test]
    fn test_search_walks_to_last_known() {
        let tuning = tuning();
        let mut rng = rng();
        let scene = StaticScene::new();
        let mut adversary = adversary_with(PatrolPlan::waypoints(vec![]));
        adversary.state = PursuitState::Searching {
            last_known: Vec3::new(-4.0, 0.0, 0.0),
            elapsed: 0.0,
        };
        step(&mut adversary, None, &scene, &tuning, &mut rng, DT);
        assert!(adversary.position.x < 0.0);
        assert!((adversary.position.length() - tuning.patrol_speed * DT).abs() < 1e-5);
    }

    #[test]
    fn test_terminal_states_do_not_move() {
        let tuning = tuning();
        let mut rng = rng();
        let scene = StaticScene::new();
        let mut adversary = adversary_with(PatrolPlan::waypoints(vec![Vec3::X * 5.0]));
        adversary.state = PursuitState::Attacking;
        step(&mut adversary, Some(Vec3::Z), &scene, &tuning, &mut rng, DT);
        assert_eq!(adversary.position, Vec3::ZERO);
    }

    #[test]
    fn test_wall_ahead_deflects_sideways() {
        let tuning = tuning();
        let mut scene = StaticScene::new();
        scene.add_box(Vec3::new(-3.0, -1.0, 1.0), Vec3::new(3.0, 2.0, 1.5), LayerMask::WALL);

        let dir = avoidance_direction(Vec3::ZERO, Vec3::Z, &scene, &tuning);
        assert!(dir.dot(Vec3::Z).abs() < 1e-5, "expected a perpendicular, got {dir}");
        let origin = Vec3::Y * PROBE_HEIGHT;
        assert!(scene
            .raycast(origin, dir, tuning.probe_distance, LayerMask::ALL)
            .is_none());
    }

    #[test]
    fn test_boxed_in_reverses() {
        let tuning = tuning();
        let mut scene = StaticScene::new();
        scene.add_box(Vec3::new(-3.0, -1.0, 1.0), Vec3::new(3.0, 2.0, 1.5), LayerMask::WALL);
        scene.add_box(Vec3::new(1.0, -1.0, -3.0), Vec3::new(1.5, 2.0, 1.0), LayerMask::MACHINE);
        scene.add_box(Vec3::new(-1.5, -1.0, -3.0), Vec3::new(-1.0, 2.0, 1.0), LayerMask::MACHINE);

        let dir = avoidance_direction(Vec3::ZERO, Vec3::Z, &scene, &tuning);
        assert!((dir + Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_prop_on_one_side_nudges() {
        let tuning = tuning();
        let mut scene = StaticScene::new();
        // Thin post in front of one whisker only, not on the centre line
        scene.add_box(Vec3::new(0.35, -1.0, 1.0), Vec3::new(0.7, 2.0, 1.2), LayerMask::PROP);

        let dir = avoidance_direction(Vec3::ZERO, Vec3::Z, &scene, &tuning);
        assert!(dir.z > 0.9, "still mostly forward: {dir}");
        assert!(dir.x < 0.0, "nudged away from the post: {dir}");
        assert!((dir.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_avoidance_can_be_disabled() {
        let tuning = Tuning {
            enable_collision_avoidance: false,
            ..tuning()
        };
        let mut scene = StaticScene::new();
        scene.add_box(Vec3::new(-3.0, -1.0, 0.5), Vec3::new(3.0, 2.0, 1.5), LayerMask::WALL);
        let mut adversary = adversary_with(PatrolPlan::waypoints(vec![]));
        move_in_direction(&mut adversary, Vec3::Z, 1.0, &scene, &tuning, 1.0);
        assert!((adversary.position.z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_never_steps_into_wall() {
        let tuning = Tuning {
            probe_distance: 0.1,
            ..tuning()
        };
        let mut scene = StaticScene::new();
        scene.add_box(Vec3::new(-3.0, -1.0, 1.0), Vec3::new(3.0, 2.0, 1.5), LayerMask::WALL);
        let mut adversary = adversary_with(PatrolPlan::waypoints(vec![]));
        for _ in 0..600 {
            move_in_direction(&mut adversary, Vec3::Z, 2.0, &scene, &tuning, DT);
        }
        let body = adversary.position + Vec3::Y * tuning.body_radius;
        assert!(!scene.overlap_sphere(body, tuning.body_radius, LayerMask::WALL));
    }

    #[test]
    fn test_rotation_is_smoothed() {
        let mut yaw = 0.0;
        assert!(rotate_toward(&mut yaw, Vec3::X, 2.0, 0.1));
        // 20% of a quarter turn
        assert!((yaw - FRAC_PI_2 * 0.2).abs() < 1e-5);

        // Large steps never overshoot
        let mut yaw = 0.0;
        rotate_toward(&mut yaw, Vec3::X, 100.0, 1.0);
        assert!((yaw - FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_degenerate_direction_skips_rotation() {
        let mut yaw = 0.3;
        assert!(!rotate_toward(&mut yaw, Vec3::ZERO, 2.0, 0.1));
        assert!(!rotate_toward(&mut yaw, Vec3::Y, 2.0, 0.1));
        assert_eq!(yaw, 0.3);
    }
}
