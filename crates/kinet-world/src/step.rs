use std::collections::{BTreeMap, BTreeSet};

use kinet_articulation::{apply_springs, build_rows, JointFrames};
use kinet_collision::{collide, pairs_sap, CollisionFilter};
use kinet_core::{Arena, BodyHandle, ConstraintHandle, Vec3, Velocity};
use kinet_dynamics::{solve_rows, warm_start, ActivationState, SolverBody, SolverRow};
use kinet_geom::{aabb_of, Aabb};
use log::{trace, warn};

use crate::contact::{harvest, is_finite_point, push_point_rows, ContactTuning, PairMaterial, PointRows, WarmImp};
use crate::islands::Islands;
use crate::physics::{BodyEntry, ConstraintEntry};
use crate::world::World;

/// What one `step` call did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StepStats {
    pub substeps: u32,
    /// Whole substeps the accumulator owed but the budget did not allow.
    pub dropped_substeps: u32,
    pub pairs_tested: u32,
    pub contacts: u32,
    pub islands: u32,
    /// Registered bodies in ISLAND_SLEEPING after the last substep.
    pub sleeping: u32,
}

impl StepStats {
    fn absorb(&mut self, s: &StepStats) {
        self.substeps += s.substeps;
        self.pairs_tested += s.pairs_tested;
        self.contacts += s.contacts;
        self.islands = s.islands;
        self.sleeping = s.sleeping;
    }
}

/// Runs the substeps the accumulator grants, then clears accumulated forces
/// of the registered bodies. Forces are cleared even when no substep ran.
pub(crate) fn step_world(
    world: &mut World,
    bodies: &mut Arena<BodyEntry, BodyHandle>,
    constraints: &Arena<ConstraintEntry, ConstraintHandle>,
    dt: f32,
    max_substeps: u32,
    fixed_dt: f32,
) -> StepStats {
    let plan = world.plan_substeps(dt, max_substeps, fixed_dt);
    let mut stats = StepStats { dropped_substeps: plan.dropped, ..Default::default() };
    if plan.dropped > 0 {
        warn!("step: dropped {} substep(s) of {:.4}s beyond the budget of {}", plan.dropped, plan.dt, max_substeps);
    }
    for _ in 0..plan.count {
        let s = substep(world, bodies, constraints, plan.dt);
        stats.absorb(&s);
        world.advance_tick();
    }
    for (h, _) in world.bodies() {
        if let Some(e) = bodies.get_mut(h) { e.body.clear_forces(); }
    }
    if plan.count > 0 {
        trace!("step tick={} {:?}", world.tick_index(), stats);
    }
    stats
}

/// Constraint resolved against this substep's solver bodies.
struct ActiveJoint<'a> {
    entry: &'a ConstraintEntry,
    ia: usize,
    ib: usize,
    frames: JointFrames,
}

fn substep(
    world: &mut World,
    arena: &mut Arena<BodyEntry, BodyHandle>,
    constraints: &Arena<ConstraintEntry, ConstraintHandle>,
    dt: f32,
) -> StepStats {
    let cfg = world.config().clone();
    let gravity = world.gravity();

    // ---- gather registered bodies in handle order
    let mut handles: Vec<BodyHandle> = Vec::with_capacity(world.num_bodies());
    let mut filters: Vec<CollisionFilter> = Vec::with_capacity(world.num_bodies());
    for (h, reg) in world.bodies() {
        if arena.contains(h) {
            handles.push(h);
            filters.push(reg.filter);
        }
    }
    let slot_of: BTreeMap<BodyHandle, usize> = handles.iter().enumerate().map(|(i, h)| (*h, i)).collect();

    // ---- forces, gravity and damping into velocity
    for h in &handles {
        if let Some(e) = arena.get_mut(*h) { e.body.integrate_velocities(gravity, dt); }
    }

    let mut solver: Vec<SolverBody> = handles.iter()
        .map(|h| match arena.get(*h) {
            Some(e) => SolverBody::from_body(&e.body),
            None => SolverBody::fixed(Vec3::ZERO, Vec3::ZERO, Vec3::ZERO),
        })
        .collect();

    // ---- constraints; partners outside this world act as fixed anchors
    let mut joints: Vec<ActiveJoint> = Vec::new();
    let mut no_collide: BTreeSet<(usize, usize)> = BTreeSet::new();
    for (ch, reg) in world.constraints() {
        let Some(entry) = constraints.get(ch) else { continue };
        let (ha, hb) = (entry.joint.body_a(), entry.joint.body_b());
        let (Some(ea), Some(eb)) = (arena.get(ha), arena.get(hb)) else { continue };
        let mut slot = |h: BodyHandle, e: &BodyEntry| -> usize {
            match slot_of.get(&h) {
                Some(&i) => i,
                None => {
                    let b = &e.body;
                    solver.push(SolverBody::fixed(b.position(), b.linear_velocity(), b.angular_velocity()));
                    solver.len() - 1
                }
            }
        };
        let ia = slot(ha, ea);
        let ib = slot(hb, eb);
        if reg.disable_collision && ia < handles.len() && ib < handles.len() {
            no_collide.insert((ia.min(ib), ia.max(ib)));
        }
        let frames = entry.joint.calculate_frames(&ea.body.transform(), &eb.body.transform());
        joints.push(ActiveJoint { entry, ia, ib, frames });
    }

    for j in &joints {
        apply_springs(&j.entry.joint, &j.frames, j.ia, j.ib, &mut solver, dt);
    }

    // ---- broadphase
    let mut aabbs: Vec<Aabb> = Vec::with_capacity(handles.len());
    let mut margins: Vec<f32> = Vec::with_capacity(handles.len());
    for (i, h) in handles.iter().enumerate() {
        let margin = (solver[i].lin.length() * dt).min(cfg.speculative_margin);
        let bb = match arena.get(*h) {
            Some(e) => {
                let bb = aabb_of(e.body.shape(), &e.body.transform());
                if margin > 0.0 { bb.grown(margin) } else { bb }
            }
            None => Aabb::UNBOUNDED,
        };
        aabbs.push(bb);
        margins.push(margin);
    }
    let pairs = pairs_sap(&aabbs, |i, j| {
        filters[i].collides(&filters[j])
            && (solver[i].is_movable() || solver[j].is_movable())
            && !no_collide.contains(&(i, j))
    });

    // ---- narrowphase, contact rows and islands
    let tuning = ContactTuning { slop: cfg.contact_slop, beta: cfg.contact_beta };
    let mut islands = Islands::new(handles.len());
    let mut rows: Vec<SolverRow> = Vec::new();
    let mut point_rows: Vec<((BodyHandle, BodyHandle), Vec<PointRows>)> = Vec::new();
    let mut contacts = 0u32;
    for &(i, j) in &pairs {
        let (Some(ea), Some(eb)) = (arena.get(handles[i]), arena.get(handles[j])) else { continue };
        let (ba, bb) = (&ea.body, &eb.body);
        let margin = margins[i] + margins[j];
        let manifold: Vec<_> = collide(ba.shape(), &ba.transform(), bb.shape(), &bb.transform(), margin)
            .into_iter()
            .filter(is_finite_point)
            .collect();
        let touching = manifold.iter().filter(|c| c.depth >= 0.0).count();
        if manifold.is_empty() { continue; }
        contacts += touching as u32;
        if !(ba.has_contact_response() && bb.has_contact_response()) { continue; }
        if touching > 0 && ba.merges_islands() && bb.merges_islands() { islands.union(i, j); }

        let mat = PairMaterial::combine(ba.friction(), ba.restitution(), bb.friction(), bb.restitution());
        let mut prs = Vec::with_capacity(manifold.len());
        for (k, cp) in manifold.iter().enumerate() {
            let warm = world.warm.get(handles[i], handles[j], k);
            let pr = push_point_rows(i, j, cp, mat, warm, tuning, &solver, dt, &mut rows);
            prs.push(pr.unwrap_or(PointRows { normal: usize::MAX, t1: usize::MAX, t2: usize::MAX }));
        }
        point_rows.push(((handles[i], handles[j]), prs));
    }

    for j in &joints {
        build_rows(&j.entry.joint, &j.frames, j.ia, j.ib, &solver, dt, &mut rows);
        let n = handles.len();
        if j.ia >= n || j.ib >= n { continue; }
        if let (Some(ea), Some(eb)) = (arena.get(handles[j.ia]), arena.get(handles[j.ib])) {
            if ea.body.merges_islands() && eb.body.merges_islands() { islands.union(j.ia, j.ib); }
        }
    }

    // ---- solve
    warm_start(&rows, &mut solver);
    solve_rows(&mut rows, &mut solver, cfg.solver_iterations);

    let mut next = BTreeMap::new();
    for (key, prs) in &point_rows {
        let imps: Vec<WarmImp> = prs.iter()
            .map(|p| if p.normal == usize::MAX { WarmImp::default() } else { harvest(&rows, p) })
            .collect();
        next.insert(*key, imps);
    }
    world.warm.replace(next);

    // ---- write back and integrate positions
    for (i, h) in handles.iter().enumerate() {
        let Some(e) = arena.get_mut(*h) else { continue };
        let sb = &solver[i];
        if sb.is_movable() {
            e.body.set_velocity(Velocity { lin: sb.lin, ang: sb.ang });
        }
        e.body.integrate_transform(dt, &sb.push);
    }

    // ---- activation
    for h in &handles {
        if let Some(e) = arena.get_mut(*h) {
            e.body.update_activation(dt, cfg.linear_sleep_threshold, cfg.angular_sleep_threshold,
                                     cfg.deactivation_time, cfg.sleeping_enabled);
        }
    }
    let groups = islands.groups(|i| arena.get(handles[i]).is_some_and(|e| {
        e.body.merges_islands() && e.body.activation_state() != ActivationState::DisableSimulation
    }));
    for group in &groups {
        let all_want = cfg.sleeping_enabled && group.iter().all(|&i| {
            arena.get(handles[i]).is_some_and(|e| e.body.wants_sleeping(cfg.deactivation_time))
        });
        for &i in group {
            let Some(e) = arena.get_mut(handles[i]) else { continue };
            if all_want { e.body.put_to_sleep(); } else { e.body.wake_from_island(); }
        }
    }
    let mut sleeping = 0u32;
    for h in &handles {
        if arena.get(*h).is_some_and(|e| e.body.activation_state() == ActivationState::IslandSleeping) {
            sleeping += 1;
        }
    }

    StepStats {
        substeps: 1,
        dropped_substeps: 0,
        pairs_tested: pairs.len() as u32,
        contacts,
        islands: groups.len() as u32,
        sleeping,
    }
}
