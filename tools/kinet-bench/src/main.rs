use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use kinet_core::{encode, vec3, AllocCounters, BodyHandle, Transform, Vec3, WorldHandle};
use kinet_world::{Physics, RigidBodyInfo, WorldConfig};

#[derive(Parser, Debug)]
#[command(name = "kinet-bench", version, about = "Run a reference scenario and print positions, counters and the state digest")]
struct Opts {
    #[command(subcommand)]
    scenario: Scenario,

    /// World config JSON (defaults otherwise; KINET_* env vars still apply)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Number of step calls
    #[arg(long, global = true, default_value_t = 60)]
    steps: u32,

    /// Seconds per step call
    #[arg(long, global = true, default_value_t = 1.0 / 60.0)]
    dt: f32,

    /// Print every n-th step (0 prints only the summary)
    #[arg(long, global = true, default_value_t = 1)]
    every: u32,

    /// Print the effective config before running
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    dump_config: bool,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Scenario {
    /// Unit sphere dropped from the origin
    Drop,
    /// Dynamic box hanging from a static anchor through a fully locked 6-DOF joint
    Lock,
    /// Column of spheres settling on a static ground box
    Stack {
        #[arg(long, default_value_t = 4)]
        count: u32,
    },
}

struct Scene {
    world: WorldHandle,
    tracked: Vec<BodyHandle>,
    teardown: Box<dyn FnOnce(&mut Physics) -> kinet_core::Result<()>>,
}

fn at(x: f32, y: f32, z: f32) -> Transform { Transform::from_translation(vec3(x, y, z)) }

fn build_drop(p: &mut Physics, w: WorldHandle) -> Result<Scene> {
    let s = p.create_sphere(0.5)?;
    let b = p.create_body(&RigidBodyInfo::new(s, 1.0))?;
    p.add_rigid_body(w, b, 1, -1)?;
    Ok(Scene {
        world: w,
        tracked: vec![b],
        teardown: Box::new(move |p| {
            p.remove_rigid_body(w, b)?;
            p.destroy_body(b)?;
            p.destroy_shape(s)
        }),
    })
}

fn build_lock(p: &mut Physics, w: WorldHandle) -> Result<Scene> {
    let s = p.create_box(0.25, 0.25, 0.25)?;
    let anchor = p.create_body(&RigidBodyInfo::new(s, 0.0))?;
    let bob = p.create_body(&RigidBodyInfo::new(s, 1.0).with_transform(at(0.0, -1.5, 0.0)))?;
    let c = p.create_6dof_spring(anchor, bob, &encode(&at(0.0, -0.75, 0.0)), &encode(&at(0.0, 0.75, 0.0)), true)?;
    p.set_linear_lower_limit(c, Vec3::ZERO)?;
    p.set_linear_upper_limit(c, Vec3::ZERO)?;
    p.set_angular_lower_limit(c, Vec3::ZERO)?;
    p.set_angular_upper_limit(c, Vec3::ZERO)?;
    p.add_rigid_body(w, anchor, 1, -1)?;
    p.add_rigid_body(w, bob, 1, -1)?;
    p.add_constraint(w, c, true)?;
    Ok(Scene {
        world: w,
        tracked: vec![bob],
        teardown: Box::new(move |p| {
            p.remove_constraint(w, c)?;
            p.destroy_constraint(c)?;
            for b in [bob, anchor] {
                p.remove_rigid_body(w, b)?;
                p.destroy_body(b)?;
            }
            p.destroy_shape(s)
        }),
    })
}

fn build_stack(p: &mut Physics, w: WorldHandle, count: u32) -> Result<Scene> {
    let ground_shape = p.create_box(5.0, 0.5, 5.0)?;
    let ball = p.create_sphere(0.5)?;
    let ground = p.create_body(&RigidBodyInfo::new(ground_shape, 0.0).with_transform(at(0.0, -0.5, 0.0)))?;
    p.add_rigid_body(w, ground, 1, -1)?;
    let mut tracked = Vec::with_capacity(count as usize);
    for i in 0..count {
        let b = p.create_body(&RigidBodyInfo::new(ball, 1.0).with_transform(at(0.0, 0.5 + 1.05 * i as f32, 0.0)))?;
        p.add_rigid_body(w, b, 1, -1)?;
        tracked.push(b);
    }
    let bodies = tracked.clone();
    Ok(Scene {
        world: w,
        tracked,
        teardown: Box::new(move |p| {
            for b in bodies.into_iter().chain([ground]) {
                p.remove_rigid_body(w, b)?;
                p.destroy_body(b)?;
            }
            p.destroy_shape(ball)?;
            p.destroy_shape(ground_shape)
        }),
    })
}

fn hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes { let _ = write!(s, "{:02x}", b); }
    s
}

fn load_config(path: Option<&PathBuf>) -> Result<WorldConfig> {
    let cfg = match path {
        Some(p) => WorldConfig::from_json_file(p).with_context(|| format!("load config {}", p.display()))?,
        None => WorldConfig::default(),
    };
    let cfg = cfg.with_env_overrides();
    cfg.validate().context("config after env overrides")?;
    Ok(cfg)
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    if !(opts.dt.is_finite() && opts.dt >= 0.0) {
        bail!("--dt must be a finite, non-negative number of seconds");
    }
    let cfg = load_config(opts.config.as_ref())?;
    if opts.dump_config { println!("{}", cfg.to_json_string().context("dump config")?); }

    let mut p = Physics::with_counters(AllocCounters::new());
    let w = p.create_world_with_config(cfg)?;
    let scene = match opts.scenario {
        Scenario::Drop => build_drop(&mut p, w),
        Scenario::Lock => build_lock(&mut p, w),
        Scenario::Stack { count } => build_stack(&mut p, w, count),
    }
    .with_context(|| format!("build {:?}", opts.scenario))?;

    let mut contacts = 0u64;
    let mut dropped = 0u64;
    for step in 1..=opts.steps {
        let stats = p.step_default(scene.world, opts.dt)?;
        contacts += stats.contacts as u64;
        dropped += stats.dropped_substeps as u64;
        if opts.every == 0 || step % opts.every != 0 { continue; }
        let mut line = format!("{step:5}");
        for b in &scene.tracked {
            let pos = p.get_position(*b)?;
            let _ = write!(line, "  ({:+.4} {:+.4} {:+.4}) s{}", pos.x, pos.y, pos.z, p.activation_state(*b)?.as_raw());
        }
        let _ = write!(line, "  islands={} sleeping={}", stats.islands, stats.sleeping);
        println!("{line}");
    }

    let digest = p.world_state_hash(scene.world)?;
    println!("Contacts: {contacts}");
    println!("Dropped:  {dropped} substep(s)");
    println!("Digest:   {}", hex(&digest));

    let live = p.alloc_stats();
    println!("Live:     {live:?}");
    (scene.teardown)(&mut p).context("teardown")?;
    p.destroy_world(scene.world)?;
    let after = p.alloc_stats();
    if !after.is_clean() {
        bail!("leaked objects after teardown: {after:?}");
    }
    println!("Clean:    {after:?}");
    Ok(())
}
