//! Authoritative match world: arena geometry, tank spawning, the interlaced
//! input/physics loop and hit resolution.

use std::collections::HashMap;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rapier3d::prelude::*;
use tracing::debug;
use uuid::Uuid;

use super::input::{InputCommand, InputManager};
use super::physics::{BodyOwner, PhysicsWorld, VehiclePart};
use super::shell::Shell;
use super::tank::{self, Tank};
use crate::util::time::tick_delta_ms;
use crate::ws::protocol::{LastProcessedInput, PlayerSnapshot, WireQuat, WireVec3};

/// Arena is a square, `ARENA_SIZE` on a side, walled on all four edges
pub const ARENA_SIZE: f32 = 500.0;
const BARRIER_POS: f32 = 249.0;
const BARRIER_CENTER_Y: f32 = 9.0;
const BARRIER_HALF_HEIGHT: f32 = 10.0;
const SPAWN_EDGE: f32 = 245.0;
const SPAWN_HEIGHT: f32 = 14.0;

/// Upper bound on interlace rounds per scheduled tick. A client bursting
/// buffered commands can queue far more than one tick's worth; anything past
/// the cap stays queued for the next tick so the match clock cannot be
/// fast-forwarded.
pub const MAX_CATCHUP_STEPS: usize = 4;

/// Things that happened inside one world update, for the room to act on
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WorldEvent {
    /// A fresh shell finished loading for this player
    ShellLoaded { session_id: Uuid },
    /// This player fired
    ShellFired { session_id: Uuid },
    /// A live shell struck an opponent
    Hit {
        shooter: Uuid,
        target: Uuid,
        part: VehiclePart,
        damage: f32,
    },
    /// A hit dropped this player's health to zero
    HealthDepleted { session_id: Uuid },
}

pub struct World {
    phys: PhysicsWorld,
    tanks: HashMap<Uuid, Tank>,
    shells: Vec<Shell>,
    last_processed: HashMap<Uuid, LastProcessedInput>,
    rng: ChaCha8Rng,
    /// Simulation clock in milliseconds, advanced one sub-step at a time
    sim_time_ms: f64,
}

impl World {
    pub fn new(rng: ChaCha8Rng) -> Self {
        let mut phys = PhysicsWorld::new();
        build_arena(&mut phys);
        Self {
            phys,
            tanks: HashMap::new(),
            shells: Vec::new(),
            last_processed: HashMap::new(),
            rng,
            sim_time_ms: 0.0,
        }
    }

    pub fn sim_time_ms(&self) -> f64 {
        self.sim_time_ms
    }

    pub fn tank_count(&self) -> usize {
        self.tanks.len()
    }

    pub fn health_of(&self, session_id: &Uuid) -> Option<f32> {
        self.tanks.get(session_id).map(|t| t.health)
    }

    /// Spawn a tank. The first player lands in a random edge zone; any later
    /// player spawns mirrored across the arena center from an existing one,
    /// so the pair always starts facing-off across the map.
    pub fn create_tank(&mut self, session_id: Uuid) {
        let spawn = match self.tanks.values().next() {
            Some(other) => {
                let pos = other
                    .hull_translation(&self.phys)
                    .unwrap_or(vector![0.0, SPAWN_HEIGHT, 0.0]);
                vector![-pos.x, SPAWN_HEIGHT, -pos.z]
            }
            None => {
                let along = self.rng.gen_range(-SPAWN_EDGE..SPAWN_EDGE);
                match self.rng.gen_range(0..4u8) {
                    0 => vector![along, SPAWN_HEIGHT, SPAWN_EDGE],
                    1 => vector![along, SPAWN_HEIGHT, -SPAWN_EDGE],
                    2 => vector![SPAWN_EDGE, SPAWN_HEIGHT, along],
                    _ => vector![-SPAWN_EDGE, SPAWN_HEIGHT, along],
                }
            }
        };
        debug!(%session_id, x = spawn.x, z = spawn.z, "spawning tank");
        let tank = Tank::create(&mut self.phys, session_id, spawn);
        self.tanks.insert(session_id, tank);
    }

    /// Remove a player's tank and any shells they still have in flight.
    /// Safe to call twice.
    pub fn remove_tank(&mut self, session_id: &Uuid) {
        if let Some(mut tank) = self.tanks.remove(session_id) {
            tank.dispose(&mut self.phys);
        }
        let phys = &mut self.phys;
        self.shells.retain_mut(|shell| {
            if shell.owner == *session_id {
                shell.dispose(phys);
                false
            } else {
                true
            }
        });
        self.last_processed.remove(session_id);
    }

    /// Run one server tick. Queued inputs are consumed in lockstep rounds:
    /// each round pops one command per player (or substitutes an idle command
    /// for players whose queue ran dry) followed by exactly one physics
    /// sub-step, so a burst of delayed packets replays at the same rate it
    /// was produced. Rounds per tick are capped at `MAX_CATCHUP_STEPS`;
    /// commands past the cap stay queued for the next tick.
    pub fn update(&mut self, inputs: &mut HashMap<Uuid, InputManager>) -> Vec<WorldEvent> {
        let mut events = Vec::new();

        let rounds = inputs
            .values()
            .map(|mgr| mgr.queue().len())
            .max()
            .unwrap_or(0)
            .min(MAX_CATCHUP_STEPS)
            .max(1);

        let dt = crate::util::time::tick_delta();

        for _ in 0..rounds {
            for (sid, tank) in self.tanks.iter_mut() {
                let cmd = match inputs.get_mut(sid).and_then(InputManager::pop) {
                    Some(cmd) => {
                        self.last_processed.insert(
                            *sid,
                            LastProcessedInput {
                                step: cmd.step,
                                timestamp: cmd.timestamp,
                            },
                        );
                        cmd
                    }
                    None => InputCommand::idle(),
                };

                let effects = tank.apply_input(dt, &cmd, &mut self.phys, self.sim_time_ms);
                if let Some(shell) = effects.fired_shell {
                    events.push(WorldEvent::ShellFired { session_id: *sid });
                    self.shells.push(shell);
                }
                if tank.before_step(self.sim_time_ms, &mut self.phys) {
                    events.push(WorldEvent::ShellLoaded { session_id: *sid });
                }
            }

            let collisions = self.phys.step();
            self.resolve_collisions(&collisions, &mut events);
            self.cull_stray_shells();
            self.sim_time_ms += tick_delta_ms();
        }

        events
    }

    /// Apply damage and dispose spent shells for this sub-step's contacts.
    /// A shell passing through its own vehicle is ignored entirely and keeps
    /// flying.
    fn resolve_collisions(&mut self, collisions: &[CollisionEvent], events: &mut Vec<WorldEvent>) {
        for event in collisions {
            let CollisionEvent::Started(h1, h2, _) = event else {
                continue;
            };
            let (Some(o1), Some(o2)) = (self.phys.owner_of(*h1), self.phys.owner_of(*h2)) else {
                continue;
            };

            for (shell_owner, other, other_collider) in [(o1, o2, *h2), (o2, o1, *h1)] {
                let BodyOwner::Shell { shell_id, owner } = shell_owner else {
                    continue;
                };
                // Only fired shells resolve; a loaded shell is still locked
                // to its barrel and its contacts are meaningless
                let Some(idx) = self
                    .shells
                    .iter()
                    .position(|s| s.id == shell_id && s.is_spent())
                else {
                    continue;
                };

                match other {
                    BodyOwner::Vehicle { session_id, .. } if session_id == owner => {
                        // Self-hit immunity: the shell keeps flying
                    }
                    BodyOwner::Vehicle { session_id, part } => {
                        if let Some(struck) = self.phys.collider_parent(other_collider) {
                            self.shells[idx].impact(&mut self.phys, struck);
                        }
                        let damage = tank::part_damage(part);
                        if let Some(target) = self.tanks.get_mut(&session_id) {
                            let was_alive = target.health > 0.0;
                            target.damage(damage);
                            events.push(WorldEvent::Hit {
                                shooter: owner,
                                target: session_id,
                                part,
                                damage,
                            });
                            if was_alive && target.health <= 0.0 {
                                events.push(WorldEvent::HealthDepleted {
                                    session_id,
                                });
                            }
                        }
                        self.shells[idx].dispose(&mut self.phys);
                    }
                    _ => {
                        // Terrain, barriers or another shell: the shell is
                        // simply spent
                        self.shells[idx].dispose(&mut self.phys);
                    }
                }
            }
        }

        self.shells.retain(|s| !s.is_disposed());
    }

    /// Drop any shell that escaped the play area
    fn cull_stray_shells(&mut self) {
        let phys = &mut self.phys;
        self.shells.retain_mut(|shell| {
            if shell.is_spent() && shell.out_of_bounds(phys) {
                shell.dispose(phys);
                false
            } else {
                true
            }
        });
    }

    /// Acknowledgement for the most recent command this player had applied.
    /// Holds its previous value over ticks where the player sent nothing.
    pub fn last_processed(&self, session_id: &Uuid) -> Option<LastProcessedInput> {
        self.last_processed.get(session_id).copied()
    }

    pub fn player_snapshot(&self, session_id: &Uuid, uid: &str) -> Option<PlayerSnapshot> {
        let tank = self.tanks.get(session_id)?;
        let position = tank.hull_translation(&self.phys)?;
        let rotation = tank.hull_rotation(&self.phys)?;
        let turret = tank.turret_rotation(&self.phys)?;
        let barrel = tank.barrel_rotation(&self.phys)?;

        Some(PlayerSnapshot {
            uid: uid.to_string(),
            position: WireVec3 {
                x: position.x,
                y: position.y,
                z: position.z,
            },
            rotation: wire_quat(&rotation),
            turret_rotation: wire_quat(&turret),
            barrel_rotation: wire_quat(&barrel),
            left_speed: tank.left_speed,
            right_speed: tank.right_speed,
            health: tank.health,
            can_fire: tank.can_fire,
            last_processed_input: self.last_processed(session_id),
        })
    }
}

fn wire_quat(rot: &Rotation<Real>) -> WireQuat {
    WireQuat {
        x: rot.i,
        y: rot.j,
        z: rot.k,
        w: rot.w,
    }
}

/// Static arena: a flat ground slab and four walls just inside the edges
fn build_arena(phys: &mut PhysicsWorld) {
    let half = ARENA_SIZE / 2.0;

    let ground = phys.add_body(RigidBodyBuilder::fixed().translation(vector![0.0, -0.1, 0.0]));
    phys.add_collider(
        ground,
        ColliderBuilder::cuboid(half, 0.1, half).friction(1.0),
        BodyOwner::Ground,
    );

    let walls = [
        (vector![BARRIER_POS, BARRIER_CENTER_Y, 0.0], (0.5, half)),
        (vector![-BARRIER_POS, BARRIER_CENTER_Y, 0.0], (0.5, half)),
        (vector![0.0, BARRIER_CENTER_Y, BARRIER_POS], (half, 0.5)),
        (vector![0.0, BARRIER_CENTER_Y, -BARRIER_POS], (half, 0.5)),
    ];
    for (pos, (hx, hz)) in walls {
        let wall = phys.add_body(RigidBodyBuilder::fixed().translation(pos));
        phys.add_collider(
            wall,
            ColliderBuilder::cuboid(hx, BARRIER_HALF_HEIGHT, hz),
            BodyOwner::Barrier,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn world() -> World {
        World::new(ChaCha8Rng::seed_from_u64(7))
    }

    fn input_with(keys: &[&str], step: u32, ts: f64) -> InputManager {
        let mut mgr = InputManager::new();
        let raw: HashMap<String, bool> = keys.iter().map(|k| (k.to_string(), true)).collect();
        mgr.submit(step, ts, &raw, 0.0, ts);
        mgr
    }

    #[test]
    fn second_spawn_mirrors_the_first() {
        let mut w = world();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        w.create_tank(a);
        w.create_tank(b);

        let pa = w.tanks[&a].hull_translation(&w.phys).unwrap();
        let pb = w.tanks[&b].hull_translation(&w.phys).unwrap();
        assert!((pa.x + pb.x).abs() < 1e-4);
        assert!((pa.z + pb.z).abs() < 1e-4);
        assert_eq!(pb.y, SPAWN_HEIGHT);
    }

    #[test]
    fn first_spawn_sits_in_an_edge_zone() {
        let mut w = world();
        let a = Uuid::new_v4();
        w.create_tank(a);
        let pos = w.tanks[&a].hull_translation(&w.phys).unwrap();
        assert!(pos.x.abs() <= SPAWN_EDGE + 1e-4);
        assert!(pos.z.abs() <= SPAWN_EDGE + 1e-4);
        assert!(pos.x.abs() >= SPAWN_EDGE - 1e-4 || pos.z.abs() >= SPAWN_EDGE - 1e-4);
    }

    #[test]
    fn update_advances_one_sub_step_per_queued_command() {
        let mut w = world();
        let a = Uuid::new_v4();
        w.create_tank(a);

        let mut inputs = HashMap::new();
        let mut mgr = InputManager::new();
        for step in 0..3 {
            let raw: HashMap<String, bool> =
                [("forward".to_string(), true)].into_iter().collect();
            mgr.submit(step, step as f64 * 16.0, &raw, 0.0, step as f64 * 16.0);
        }
        inputs.insert(a, mgr);

        w.update(&mut inputs);
        // Three queued commands means three sub-steps of simulated time
        assert!((w.sim_time_ms() - 3.0 * tick_delta_ms()).abs() < 1e-9);
        assert!(inputs.get_mut(&a).unwrap().queue().is_empty());
    }

    #[test]
    fn input_burst_cannot_fast_forward_the_match_clock() {
        let mut w = world();
        let a = Uuid::new_v4();
        w.create_tank(a);

        // A client flushing a large buffer in one go
        let mut mgr = InputManager::new();
        let raw: HashMap<String, bool> = [("forward".to_string(), true)].into_iter().collect();
        for step in 0..120u32 {
            mgr.submit(step, step as f64 * 16.0, &raw, 0.0, step as f64 * 16.0);
        }
        let mut inputs = HashMap::new();
        inputs.insert(a, mgr);

        // One scheduled tick advances at most the catch-up cap
        w.update(&mut inputs);
        let expected = MAX_CATCHUP_STEPS as f64 * tick_delta_ms();
        assert!((w.sim_time_ms() - expected).abs() < 1e-9);

        // Nothing was dropped; the remainder replays on later ticks
        assert_eq!(inputs[&a].queue().len(), 120 - MAX_CATCHUP_STEPS);
        w.update(&mut inputs);
        assert_eq!(inputs[&a].queue().len(), 120 - 2 * MAX_CATCHUP_STEPS);
        assert_eq!(
            w.last_processed(&a).unwrap().step,
            2 * MAX_CATCHUP_STEPS as u32 - 1
        );
    }

    #[test]
    fn empty_queues_still_run_one_sub_step() {
        let mut w = world();
        let a = Uuid::new_v4();
        w.create_tank(a);

        let mut inputs = HashMap::new();
        inputs.insert(a, InputManager::new());
        w.update(&mut inputs);
        assert!((w.sim_time_ms() - tick_delta_ms()).abs() < 1e-9);
    }

    #[test]
    fn ack_retains_previous_value_over_an_idle_tick() {
        let mut w = world();
        let a = Uuid::new_v4();
        w.create_tank(a);

        let mut inputs = HashMap::new();
        inputs.insert(a, input_with(&["forward"], 42, 700.0));
        w.update(&mut inputs);
        let ack = w.last_processed(&a).unwrap();
        assert_eq!(ack.step, 42);

        // No new input; the acknowledgement must not regress
        w.update(&mut inputs);
        assert_eq!(w.last_processed(&a).unwrap().step, 42);
    }

    #[test]
    fn firing_registers_shot_and_stats_events() {
        let mut w = world();
        let a = Uuid::new_v4();
        w.create_tank(a);

        let mut inputs = HashMap::new();
        inputs.insert(a, input_with(&["fire"], 0, 0.0));
        let events = w.update(&mut inputs);
        assert!(events.contains(&WorldEvent::ShellFired { session_id: a }));
    }

    #[test]
    fn removing_an_unknown_tank_is_a_no_op() {
        let mut w = world();
        w.remove_tank(&Uuid::new_v4());
        assert_eq!(w.tank_count(), 0);
    }

    #[test]
    fn snapshot_carries_health_and_fire_readiness() {
        let mut w = world();
        let a = Uuid::new_v4();
        w.create_tank(a);

        let snap = w.player_snapshot(&a, "uid-1").unwrap();
        assert_eq!(snap.health, 100.0);
        assert_eq!(snap.uid, "uid-1");
        assert!(snap.last_processed_input.is_none());
    }
}
