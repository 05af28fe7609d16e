//! Pursuit Arena headless driver
//!
//! Runs rounds in a walled arena with a scripted runner as the player and
//! prints the final round reports as JSON.

use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser;
use glam::Vec3;

use pursuit_arena::consts::{GROUND_HEIGHT, MAX_SUBSTEPS, SIM_DT};
use pursuit_arena::sim::{
    ConcealmentOracle, EntityId, GameEvent, LayerMask, Outcome, OutcomeSink, PlayerHandle, Round,
    RoundReport, RoundSetup, StaticScene, tick,
};
use pursuit_arena::{ConfigError, Tuning, logging};

/// Headless hide-and-seek round against the pursuit adversary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Tuning file (JSON); missing fields keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Round seed
    #[arg(short, long, default_value_t = 1)]
    seed: u64,

    /// Rounds to play; round N uses seed + N - 1
    #[arg(short, long, default_value_t = 1)]
    rounds: u32,

    /// Stop each round after this many simulated seconds
    #[arg(long, default_value_t = 120.0)]
    max_seconds: f32,

    /// Simulated frame time fed to the fixed-step accumulator
    #[arg(long, default_value_t = 1.0 / 30.0)]
    frame_time: f32,

    /// Print the effective tuning as JSON and exit
    #[arg(long)]
    dump_config: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Session manager stand-in: logs and remembers the outcome
#[derive(Debug, Default)]
struct SessionLog {
    outcome: Option<Outcome>,
}

impl OutcomeSink for SessionLog {
    fn on_capture(&mut self) {
        log::info!("Game over: the runner was caught");
        self.outcome = Some(Outcome::Captured);
    }

    fn on_victory(&mut self) {
        log::info!("Victory: the runner got away");
        self.outcome = Some(Outcome::Escaped);
    }
}

/// Scripted player: waits, then runs for the safe zone, ducking out of
/// sight every few seconds
struct Runner {
    handle: Rc<PlayerHandle>,
    collider: EntityId,
    speed: f32,
    goal: Option<Vec3>,
}

impl Runner {
    const START_DELAY: f32 = 2.0;
    const HIDE_PERIOD: f32 = 6.0;
    const HIDE_DURATION: f32 = 1.5;

    fn update(&self, scene: &mut StaticScene, elapsed: f32, dt: f32) {
        let hiding = elapsed % Self::HIDE_PERIOD < Self::HIDE_DURATION;
        self.handle.set_concealed(hiding);

        if elapsed < Self::START_DELAY || hiding {
            return;
        }
        let Some(goal) = self.goal else {
            return;
        };
        let pos = self.handle.position();
        let to_goal = Vec3::new(goal.x - pos.x, 0.0, goal.z - pos.z);
        let step = self.speed * dt;
        let next = if to_goal.length() <= step {
            Vec3::new(goal.x, pos.y, goal.z)
        } else {
            pos + to_goal.normalize_or_zero() * step
        };
        self.handle.set_position(next);
        scene.set_sphere_center(self.collider, next);
    }
}

fn build_arena() -> StaticScene {
    let mut scene = StaticScene::new();
    scene.add_arena_walls(18.0, 3.0, 0.5);

    // Rows of arcade machines
    for i in 0..4 {
        let x = -9.0 + i as f32 * 6.0;
        scene.add_box(Vec3::new(x, -1.0, -2.0), Vec3::new(x + 1.2, 1.8, -1.2), LayerMask::MACHINE);
        scene.add_box(Vec3::new(x, -1.0, 4.0), Vec3::new(x + 1.2, 1.8, 4.8), LayerMask::MACHINE);
    }
    // Stools and bins
    scene.add_sphere(Vec3::new(-4.0, -0.3, 1.0), 0.3, LayerMask::PROP);
    scene.add_sphere(Vec3::new(5.0, -0.3, -6.0), 0.3, LayerMask::PROP);
    scene
}

fn run(args: &Args) -> Result<Vec<RoundReport>, ConfigError> {
    let tuning = match &args.config {
        Some(path) => Tuning::load(path)?,
        None => Tuning::default(),
    };

    let mut scene = build_arena();
    let start = Vec3::new(-12.0, GROUND_HEIGHT, -12.0);
    let collider = scene.add_sphere(start, 0.4, LayerMask::PLAYER);
    let handle = Rc::new(PlayerHandle::new(start).with_entity(collider));

    let setup = RoundSetup {
        adversary_start: Vec3::new(0.0, 0.0, 8.0),
        adversary_yaw: std::f32::consts::PI,
        waypoints: vec![
            Vec3::new(-10.0, 0.0, 8.0),
            Vec3::new(10.0, 0.0, 8.0),
            Vec3::new(10.0, 0.0, -8.0),
            Vec3::new(-10.0, 0.0, -8.0),
        ],
        ..Default::default()
    };
    let oracle: Rc<dyn ConcealmentOracle> = handle.clone();
    let mut round = Round::new(tuning, setup, args.seed, Some(oracle));
    let mut runner = Runner {
        handle,
        collider,
        speed: 1.6,
        goal: None,
    };

    let mut reports = Vec::new();
    for i in 0..args.rounds.max(1) {
        if i > 0 {
            // Player back to the start before the new zone is placed
            runner.handle.set_position(start);
            runner.handle.set_concealed(false);
            scene.set_sphere_center(collider, start);
            round.restart_with_seed(args.seed.wrapping_add(i as u64));
        }
        runner.goal = round.safe_zone.map(|z| z.center);
        if let Some(zone) = round.safe_zone {
            log::info!("Round {} safe zone at {} (radius {:.1})", i + 1, zone.center, zone.radius);
        }
        reports.push(play_round(&mut round, &runner, &mut scene, args));
    }
    Ok(reports)
}

fn play_round(round: &mut Round, runner: &Runner, scene: &mut StaticScene, args: &Args) -> RoundReport {
    let mut sink = SessionLog::default();
    let mut accumulator = 0.0;
    let mut simulated = 0.0;
    let frame_time = args.frame_time.clamp(0.001, 0.1);

    while !round.is_over() && simulated < args.max_seconds {
        accumulator += frame_time;
        simulated += frame_time;

        let mut substeps = 0;
        while accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            runner.update(scene, round.elapsed, SIM_DT);
            tick(round, scene, &mut sink, SIM_DT);
            accumulator -= SIM_DT;
            substeps += 1;
        }

        for event in round.drain_events() {
            match event {
                GameEvent::WaypointReached { .. } | GameEvent::SightingCancelled => {
                    log::debug!("{event:?}")
                }
                _ => log::info!("{event:?}"),
            }
        }
    }

    if sink.outcome.is_none() {
        log::info!("Time limit reached after {simulated:.1}s with no outcome");
    }
    round.report()
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose);

    if args.dump_config {
        let dumped = match &args.config {
            Some(path) => Tuning::load(path),
            None => Ok(Tuning::default()),
        }
        .and_then(|t| t.sanitized().to_json_pretty());
        return match dumped {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                log::error!("{e}");
                ExitCode::FAILURE
            }
        };
    }

    log::info!("Pursuit Arena (headless) starting, seed {}", args.seed);
    let reports = match run(&args) {
        Ok(reports) => reports,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&reports) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Failed to serialize report: {e}");
            ExitCode::FAILURE
        }
    }
}
