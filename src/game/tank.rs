//! Vehicle controller: skid-steer drive, turret/barrel aim, fire and reload
//!
//! A tank is a hull rigid body, ten wheel bodies on motorized suspension
//! constraints (five per side), a yaw-limited turret and a pitch-limited
//! barrel. Track speeds are authoritative state here; the physics engine only
//! sees them as angular-velocity motor targets on the axle constraints.

use rapier3d::prelude::*;
use uuid::Uuid;

use super::input::InputCommand;
use super::physics::{BodyOwner, PhysicsWorld, VehiclePart};
use super::shell::Shell;
use crate::ws::protocol::GameInput;

/// Tuning constants for the tank model
pub mod config {
    pub const MAX_ENGINE_POWER: f32 = 100.0;
    pub const SPEED_MODIFIER: f32 = 10.0;
    pub const DECELERATION_MODIFIER: f32 = 4.0;
    pub const MAX_SPEED: f32 = 15.0;
    pub const MAX_TURNING_SPEED: f32 = 3.0;
    pub const MAX_TURRET_ANGLE: f32 = 1.17; // ~67 deg
    pub const MAX_BARREL_ANGLE: f32 = 0.43; // ~25 deg
    pub const MAX_TURRET_SPEED: f32 = 14.0;
    pub const MAX_BARREL_SPEED: f32 = 14.0;
    pub const BODY_MASS: f32 = 2.0;
    pub const BODY_FRICTION: f32 = 1.0;
    pub const WHEEL_MASS: f32 = 1.0;
    pub const WHEEL_FRICTION: f32 = 0.8;
    pub const WHEEL_RADIUS: f32 = 0.375;
    pub const TURRET_MASS: f32 = 0.2;
    pub const BARREL_MASS: f32 = 0.09;
    pub const AXLE_FRICTION: f32 = 0.0;
    pub const SUSPENSION_MIN_LIMIT: f32 = -0.2;
    pub const SUSPENSION_MAX_LIMIT: f32 = 0.033;
    pub const SUSPENSION_STIFFNESS: f32 = 100.0;
    pub const SUSPENSION_DAMPING: f32 = 7.0;
    pub const NO_OF_WHEELS: usize = 10;
    pub const RECOIL_FORCE: f32 = 7.5;
    /// Minimum simulation time between successful fires (ms)
    pub const COOLDOWN_MS: f64 = 5000.0;
    /// Time after firing before a fresh shell is loaded (ms)
    pub const LOAD_COOLDOWN_MS: f64 = 2500.0;
    /// Reset action stops nudging within this angular tolerance (rad)
    pub const RESET_TOLERANCE: f32 = 0.01;
}

/// Damage dealt by a live enemy shell, keyed to the struck sub-part
pub fn part_damage(part: VehiclePart) -> f32 {
    match part {
        VehiclePart::Barrel => 10.0,
        VehiclePart::Turret => 25.0,
        // The hull is the most punishing hit; wheels count as hull
        VehiclePart::Hull | VehiclePart::Wheel => 30.0,
    }
}

const HULL_HALF_EXTENTS: (f32, f32, f32) = (1.4, 0.6, 2.4);
const TURRET_OFFSET: (f32, f32, f32) = (0.0, 1.05, 0.0);
const TURRET_HALF_EXTENTS: (f32, f32, f32) = (0.7, 0.3, 0.9);
const BARREL_OFFSET: (f32, f32, f32) = (0.0, -0.51, 1.79);
const BARREL_HALF_LENGTH: f32 = 1.1;

/// Hull-local wheel anchor positions: five per side, front to back
const WHEEL_POSITIONS: [(f32, f32, f32); config::NO_OF_WHEELS] = [
    (-1.475, 0.2, 2.0),
    (-1.475, 0.2, 1.0),
    (-1.475, 0.2, 0.0),
    (-1.475, 0.2, -1.0),
    (-1.475, 0.2, -2.0),
    (1.475, 0.2, 2.0),
    (1.475, 0.2, 1.0),
    (1.475, 0.2, 0.0),
    (1.475, 0.2, -1.0),
    (1.475, 0.2, -2.0),
];

/// Effects of applying one input command for one sub-step
#[derive(Default)]
pub struct TankTickEffects {
    /// The shell released by a successful fire this sub-step
    pub fired_shell: Option<Shell>,
}

/// A player's vehicle and its combat state
pub struct Tank {
    pub session_id: Uuid,
    hull: RigidBodyHandle,
    turret: RigidBodyHandle,
    barrel: RigidBodyHandle,
    wheels: Vec<RigidBodyHandle>,
    /// Axle motors, index-aligned with `WHEEL_POSITIONS` (first five left)
    axle_motors: Vec<ImpulseJointHandle>,
    turret_motor: ImpulseJointHandle,
    barrel_motor: ImpulseJointHandle,
    loaded_shell: Option<Shell>,
    pub left_speed: f32,
    pub right_speed: f32,
    pub health: f32,
    pub can_fire: bool,
    last_fired_ms: f64,
    is_cannon_ready: bool,
    disposed: bool,
}

impl Tank {
    /// Assemble a tank at the given spawn point with a shell already loaded
    pub fn create(phys: &mut PhysicsWorld, session_id: Uuid, spawn: Vector<Real>) -> Self {
        let hull = phys.add_body(RigidBodyBuilder::dynamic().translation(spawn));
        phys.add_collider(
            hull,
            ColliderBuilder::cuboid(
                HULL_HALF_EXTENTS.0,
                HULL_HALF_EXTENTS.1,
                HULL_HALF_EXTENTS.2,
            )
            .mass(config::BODY_MASS)
            .friction(config::BODY_FRICTION)
            .restitution(0.0),
            BodyOwner::Vehicle {
                session_id,
                part: VehiclePart::Hull,
            },
        );

        // Turret, yaw-constrained to the hull
        let turret_pos = spawn + vector![TURRET_OFFSET.0, TURRET_OFFSET.1, TURRET_OFFSET.2];
        let turret = phys.add_body(RigidBodyBuilder::dynamic().translation(turret_pos));
        phys.add_collider(
            turret,
            ColliderBuilder::cuboid(
                TURRET_HALF_EXTENTS.0,
                TURRET_HALF_EXTENTS.1,
                TURRET_HALF_EXTENTS.2,
            )
            .mass(config::TURRET_MASS)
            .friction(0.0)
            .restitution(0.0),
            BodyOwner::Vehicle {
                session_id,
                part: VehiclePart::Turret,
            },
        );
        let turret_motor = phys.add_joint(
            hull,
            turret,
            GenericJointBuilder::new(
                JointAxesMask::LIN_X
                    | JointAxesMask::LIN_Y
                    | JointAxesMask::LIN_Z
                    | JointAxesMask::ANG_X
                    | JointAxesMask::ANG_Z,
            )
            .local_anchor1(point![TURRET_OFFSET.0, TURRET_OFFSET.1, TURRET_OFFSET.2])
            .local_anchor2(point![0.0, 0.0, 0.0])
            .limits(
                JointAxis::AngY,
                [-config::MAX_TURRET_ANGLE, config::MAX_TURRET_ANGLE],
            )
            .motor_velocity(JointAxis::AngY, 0.0, 1.0)
            .motor_max_force(JointAxis::AngY, 100.0)
            .build(),
        );

        // Barrel, pitch-constrained to the turret
        let barrel_pos = turret_pos + vector![BARREL_OFFSET.0, BARREL_OFFSET.1, BARREL_OFFSET.2];
        let barrel = phys.add_body(RigidBodyBuilder::dynamic().translation(barrel_pos));
        phys.add_collider(
            barrel,
            ColliderBuilder::cuboid(0.1, 0.1, BARREL_HALF_LENGTH)
                .translation(vector![0.0, 0.0, BARREL_HALF_LENGTH])
                .mass(config::BARREL_MASS)
                .friction(0.0)
                .restitution(0.0),
            BodyOwner::Vehicle {
                session_id,
                part: VehiclePart::Barrel,
            },
        );
        let barrel_motor = phys.add_joint(
            turret,
            barrel,
            GenericJointBuilder::new(
                JointAxesMask::LIN_X
                    | JointAxesMask::LIN_Y
                    | JointAxesMask::LIN_Z
                    | JointAxesMask::ANG_Y
                    | JointAxesMask::ANG_Z,
            )
            .local_anchor1(point![BARREL_OFFSET.0, BARREL_OFFSET.1, BARREL_OFFSET.2])
            .local_anchor2(point![0.0, 0.0, 0.0])
            .limits(
                JointAxis::AngX,
                [-config::MAX_BARREL_ANGLE, config::MAX_BARREL_ANGLE],
            )
            .motor_velocity(JointAxis::AngX, 0.0, 1.0)
            .motor_max_force(JointAxis::AngX, 100.0)
            .build(),
        );

        // Wheels on motorized suspension
        let mut wheels = Vec::with_capacity(config::NO_OF_WHEELS);
        let mut axle_motors = Vec::with_capacity(config::NO_OF_WHEELS);
        for (x, y, z) in WHEEL_POSITIONS {
            let wheel_pos = spawn + vector![x, y, z];
            let wheel = phys.add_body(RigidBodyBuilder::dynamic().translation(wheel_pos));
            phys.add_collider(
                wheel,
                ColliderBuilder::ball(config::WHEEL_RADIUS)
                    .mass(config::WHEEL_MASS)
                    .friction(config::WHEEL_FRICTION)
                    .restitution(0.0),
                BodyOwner::Vehicle {
                    session_id,
                    part: VehiclePart::Wheel,
                },
            );
            let motor = phys.add_joint(
                hull,
                wheel,
                GenericJointBuilder::new(
                    JointAxesMask::LIN_X
                        | JointAxesMask::LIN_Z
                        | JointAxesMask::ANG_Y
                        | JointAxesMask::ANG_Z,
                )
                .local_anchor1(point![x, y, z])
                .local_anchor2(point![0.0, 0.0, 0.0])
                .local_axis1(Vector::x_axis())
                .local_axis2(Vector::x_axis())
                .limits(
                    JointAxis::LinY,
                    [config::SUSPENSION_MIN_LIMIT, config::SUSPENSION_MAX_LIMIT],
                )
                .motor_position(
                    JointAxis::LinY,
                    0.0,
                    config::SUSPENSION_STIFFNESS,
                    config::SUSPENSION_DAMPING,
                )
                .motor_velocity(JointAxis::AngX, config::AXLE_FRICTION, 1.0)
                .motor_max_force(JointAxis::AngX, config::MAX_ENGINE_POWER)
                .build(),
            );
            wheels.push(wheel);
            axle_motors.push(motor);
        }

        let mut tank = Self {
            session_id,
            hull,
            turret,
            barrel,
            wheels,
            axle_motors,
            turret_motor,
            barrel_motor,
            loaded_shell: None,
            left_speed: 0.0,
            right_speed: 0.0,
            health: 100.0,
            can_fire: true,
            // Backdated past the cooldown so a fresh tank may fire at once
            last_fired_ms: -(config::COOLDOWN_MS + 1.0),
            is_cannon_ready: false,
            disposed: false,
        };
        tank.loaded_shell = Shell::load(phys, session_id, barrel);
        tank.is_cannon_ready = tank.loaded_shell.is_some();
        tank
    }

    // ------------------------------------------------------------------
    // Per-sub-step input application
    // ------------------------------------------------------------------

    /// Apply one input command for one fixed sub-step. At most one drive
    /// regime runs; turret, barrel, fire and reset are evaluated
    /// independently.
    pub fn apply_input(
        &mut self,
        dt: f32,
        cmd: &InputCommand,
        phys: &mut PhysicsWorld,
        now_ms: f64,
    ) -> TankTickEffects {
        let mut effects = TankTickEffects::default();

        let turning_direction: i8 = if cmd.pressed(GameInput::Left) {
            -1
        } else if cmd.pressed(GameInput::Right) {
            1
        } else {
            0
        };
        let is_accelerating =
            cmd.pressed(GameInput::Forward) || cmd.pressed(GameInput::Reverse);
        let is_turret_moving =
            cmd.pressed(GameInput::TurretLeft) || cmd.pressed(GameInput::TurretRight);
        let is_barrel_moving =
            cmd.pressed(GameInput::BarrelUp) || cmd.pressed(GameInput::BarrelDown);

        let mut is_moving = false;
        if cmd.pressed(GameInput::Forward) {
            self.accelerate(dt, turning_direction, phys);
            is_moving = true;
        }
        if cmd.pressed(GameInput::Reverse) {
            self.reverse(dt, turning_direction, phys);
            is_moving = true;
        }
        if cmd.pressed(GameInput::Left) {
            self.left(dt, is_accelerating, phys);
            is_moving = true;
        }
        if cmd.pressed(GameInput::Right) {
            self.right(dt, is_accelerating, phys);
            is_moving = true;
        }
        if cmd.pressed(GameInput::Brake) {
            self.brake(dt, phys);
        }
        if !is_moving {
            self.decelerate(dt, config::DECELERATION_MODIFIER, phys);
        }

        if !is_turret_moving {
            self.stop_turret(phys);
        }
        if !is_barrel_moving {
            self.stop_barrel(phys);
        }
        if cmd.pressed(GameInput::TurretLeft) {
            self.turret_left(dt, phys);
        }
        if cmd.pressed(GameInput::TurretRight) {
            self.turret_right(dt, phys);
        }
        if cmd.pressed(GameInput::BarrelUp) {
            self.barrel_up(dt, phys);
        }
        if cmd.pressed(GameInput::BarrelDown) {
            self.barrel_down(dt, phys);
        }
        if cmd.pressed(GameInput::Reset) && !is_turret_moving && !is_barrel_moving {
            self.reset_turret(dt, phys);
        }
        if cmd.pressed(GameInput::Fire) {
            effects.fired_shell = self.try_fire(now_ms, phys);
        }

        effects
    }

    // ------------------------------------------------------------------
    // Drive
    // ------------------------------------------------------------------

    /// Increase both track speeds; the track on the inside of an active turn
    /// is held so the turn keeps biting
    pub fn accelerate(&mut self, dt: f32, turning_direction: i8, phys: &mut PhysicsWorld) {
        if turning_direction != -1 {
            self.left_speed = clamp(
                self.left_speed + dt * config::SPEED_MODIFIER,
                -config::MAX_SPEED,
                config::MAX_SPEED,
            );
        }
        if turning_direction != 1 {
            self.right_speed = clamp(
                self.right_speed + dt * config::SPEED_MODIFIER,
                -config::MAX_SPEED,
                config::MAX_SPEED,
            );
        }
        self.apply_track_targets(phys);
    }

    pub fn reverse(&mut self, dt: f32, turning_direction: i8, phys: &mut PhysicsWorld) {
        if turning_direction != -1 {
            self.left_speed = clamp(
                self.left_speed - dt * config::SPEED_MODIFIER,
                -config::MAX_SPEED,
                config::MAX_SPEED,
            );
        }
        if turning_direction != 1 {
            self.right_speed = clamp(
                self.right_speed - dt * config::SPEED_MODIFIER,
                -config::MAX_SPEED,
                config::MAX_SPEED,
            );
        }
        self.apply_track_targets(phys);
    }

    /// Turn left: stationary turns even the tracks out toward the turning
    /// speed; turns while accelerating lerp the inner track toward half the
    /// outer track for a sharper skid-steer response
    pub fn left(&mut self, dt: f32, is_accelerating: bool, phys: &mut PhysicsWorld) {
        if !is_accelerating {
            self.left_speed = clamp(
                self.left_speed
                    + sign_toward(self.left_speed, -config::MAX_TURNING_SPEED)
                        * dt
                        * config::SPEED_MODIFIER,
                -config::MAX_SPEED,
                config::MAX_SPEED,
            );
            self.right_speed = clamp(
                self.right_speed
                    + sign_toward(self.right_speed, config::MAX_TURNING_SPEED)
                        * dt
                        * config::DECELERATION_MODIFIER,
                -config::MAX_SPEED,
                config::MAX_SPEED,
            );
        } else {
            self.left_speed = lerp(
                self.left_speed,
                self.right_speed / 2.0,
                dt * config::SPEED_MODIFIER,
            );
        }
        self.apply_track_targets(phys);
    }

    pub fn right(&mut self, dt: f32, is_accelerating: bool, phys: &mut PhysicsWorld) {
        if !is_accelerating {
            self.left_speed = clamp(
                self.left_speed
                    + sign_toward(self.left_speed, config::MAX_TURNING_SPEED)
                        * dt
                        * config::DECELERATION_MODIFIER,
                -config::MAX_SPEED,
                config::MAX_SPEED,
            );
            self.right_speed = clamp(
                self.right_speed
                    + sign_toward(self.right_speed, -config::MAX_TURNING_SPEED)
                        * dt
                        * config::SPEED_MODIFIER,
                -config::MAX_SPEED,
                config::MAX_SPEED,
            );
        } else {
            self.right_speed = lerp(
                self.right_speed,
                self.left_speed / 2.0,
                dt * config::SPEED_MODIFIER,
            );
        }
        self.apply_track_targets(phys);
    }

    /// Brake decays at the full speed rate, faster than coasting
    pub fn brake(&mut self, dt: f32, phys: &mut PhysicsWorld) {
        self.decelerate(dt, config::SPEED_MODIFIER, phys);
    }

    /// Decay both tracks toward a shared average speed (coasting)
    pub fn decelerate(&mut self, dt: f32, modifier: f32, phys: &mut PhysicsWorld) {
        let step = dt * modifier;
        self.left_speed = decay_toward_zero(self.left_speed, step);
        self.right_speed = decay_toward_zero(self.right_speed, step);

        // Even out while decelerating
        let target = (self.left_speed + self.right_speed) / 2.0;
        for motor in &self.axle_motors {
            phys.set_motor_velocity(*motor, JointAxis::AngX, target, 1.0);
        }
    }

    fn apply_track_targets(&mut self, phys: &mut PhysicsWorld) {
        for (idx, motor) in self.axle_motors.iter().enumerate() {
            let target = if idx < config::NO_OF_WHEELS / 2 {
                self.left_speed
            } else {
                self.right_speed
            };
            phys.set_motor_velocity(*motor, JointAxis::AngX, target, 1.0);
        }
    }

    // ------------------------------------------------------------------
    // Turret and barrel
    // ------------------------------------------------------------------

    pub fn turret_left(&mut self, dt: f32, phys: &mut PhysicsWorld) {
        phys.set_motor_velocity(
            self.turret_motor,
            JointAxis::AngY,
            -dt * config::MAX_TURRET_SPEED,
            1.0,
        );
    }

    pub fn turret_right(&mut self, dt: f32, phys: &mut PhysicsWorld) {
        phys.set_motor_velocity(
            self.turret_motor,
            JointAxis::AngY,
            dt * config::MAX_TURRET_SPEED,
            1.0,
        );
    }

    /// Zero velocity target: active damping, not freewheeling
    pub fn stop_turret(&mut self, phys: &mut PhysicsWorld) {
        phys.set_motor_velocity(self.turret_motor, JointAxis::AngY, 0.0, 1.0);
    }

    pub fn barrel_up(&mut self, dt: f32, phys: &mut PhysicsWorld) {
        phys.set_motor_velocity(
            self.barrel_motor,
            JointAxis::AngX,
            -dt * config::MAX_BARREL_SPEED,
            1.0,
        );
    }

    pub fn barrel_down(&mut self, dt: f32, phys: &mut PhysicsWorld) {
        phys.set_motor_velocity(
            self.barrel_motor,
            JointAxis::AngX,
            dt * config::MAX_BARREL_SPEED,
            1.0,
        );
    }

    pub fn stop_barrel(&mut self, phys: &mut PhysicsWorld) {
        phys.set_motor_velocity(self.barrel_motor, JointAxis::AngX, 0.0, 1.0);
    }

    /// Drive turret and barrel back toward zero orientation
    pub fn reset_turret(&mut self, dt: f32, phys: &mut PhysicsWorld) {
        let turret_yaw = self.turret_yaw(phys);
        let barrel_pitch = self.barrel_pitch(phys);

        if turret_yaw.abs() > config::RESET_TOLERANCE {
            if turret_yaw < 0.0 {
                self.turret_right(dt, phys);
            } else {
                self.turret_left(dt, phys);
            }
        }
        if barrel_pitch.abs() > config::RESET_TOLERANCE {
            if barrel_pitch < 0.0 {
                self.barrel_down(dt, phys);
            } else {
                self.barrel_up(dt, phys);
            }
        }
    }

    /// Turret yaw relative to the hull (rad)
    pub fn turret_yaw(&self, phys: &PhysicsWorld) -> f32 {
        match (phys.body_rotation(self.hull), phys.body_rotation(self.turret)) {
            (Some(hull), Some(turret)) => (hull.inverse() * turret).euler_angles().1,
            _ => 0.0,
        }
    }

    /// Barrel pitch relative to the turret (rad)
    pub fn barrel_pitch(&self, phys: &PhysicsWorld) -> f32 {
        match (
            phys.body_rotation(self.turret),
            phys.body_rotation(self.barrel),
        ) {
            (Some(turret), Some(barrel)) => (turret.inverse() * barrel).euler_angles().0,
            _ => 0.0,
        }
    }

    // ------------------------------------------------------------------
    // Fire, reload, damage
    // ------------------------------------------------------------------

    /// Attempt to fire the loaded shell. Fails (returns `None`, leaving
    /// `last_fired` untouched) while the cooldown is still running.
    pub fn try_fire(&mut self, now_ms: f64, phys: &mut PhysicsWorld) -> Option<Shell> {
        if now_ms - self.last_fired_ms <= config::COOLDOWN_MS {
            return None;
        }
        let mut shell = self.loaded_shell.take()?;
        shell.fire(phys);
        self.simulate_recoil(phys);

        self.last_fired_ms = now_ms;
        self.is_cannon_ready = false;
        Some(shell)
    }

    /// Opposite impulse on the hull at an offset contact point, so firing
    /// rocks the chassis
    fn simulate_recoil(&mut self, phys: &mut PhysicsWorld) {
        let (Some(hull_pos), Some(hull_rot), Some(turret_rot)) = (
            phys.body_translation(self.hull),
            phys.body_rotation(self.hull),
            phys.body_rotation(self.turret),
        ) else {
            return;
        };

        let recoil =
            (turret_rot * vector![0.0, 1.0, -1.0]).normalize() * config::RECOIL_FORCE;
        let up = hull_rot * vector![0.0, 1.0, 0.0];
        let turret_forward = turret_rot * vector![0.0, 0.0, 1.0];
        let contact = Point::from(hull_pos + up + turret_forward);
        phys.apply_impulse_at_point(self.hull, recoil, contact);
    }

    /// Per-sub-step combat upkeep: refresh `can_fire` and reload once the
    /// load delay after a shot has elapsed. Returns true when a fresh shell
    /// was loaded (so the owner can be notified).
    pub fn before_step(&mut self, now_ms: f64, phys: &mut PhysicsWorld) -> bool {
        self.can_fire = now_ms - self.last_fired_ms > config::COOLDOWN_MS;

        if !self.is_cannon_ready && now_ms - self.last_fired_ms > config::LOAD_COOLDOWN_MS {
            self.loaded_shell = Shell::load(phys, self.session_id, self.barrel);
            // Loading is flagged immediately so a slow asset path can't queue
            // up duplicate shells
            self.is_cannon_ready = true;
            return true;
        }
        false
    }

    /// Clamp health downward; never below zero
    pub fn damage(&mut self, amount: f32) {
        self.health = (self.health - amount).max(0.0);
    }

    pub fn last_fired_ms(&self) -> f64 {
        self.last_fired_ms
    }

    pub fn hull_translation(&self, phys: &PhysicsWorld) -> Option<Vector<Real>> {
        phys.body_translation(self.hull)
    }

    pub fn hull_rotation(&self, phys: &PhysicsWorld) -> Option<Rotation<Real>> {
        phys.body_rotation(self.hull)
    }

    pub fn turret_rotation(&self, phys: &PhysicsWorld) -> Option<Rotation<Real>> {
        phys.body_rotation(self.turret)
    }

    pub fn barrel_rotation(&self, phys: &PhysicsWorld) -> Option<Rotation<Real>> {
        phys.body_rotation(self.barrel)
    }

    /// Tear the tank down. Idempotent; tolerates an already-disposed shell.
    pub fn dispose(&mut self, phys: &mut PhysicsWorld) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        if let Some(mut shell) = self.loaded_shell.take() {
            shell.dispose(phys);
        }
        phys.remove_body(self.barrel);
        phys.remove_body(self.turret);
        for wheel in self.wheels.drain(..) {
            phys.remove_body(wheel);
        }
        phys.remove_body(self.hull);
    }
}

fn clamp(val: f32, min: f32, max: f32) -> f32 {
    val.max(min).min(max)
}

fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}

/// One deceleration step, snapping to zero instead of oscillating across it
fn decay_toward_zero(speed: f32, step: f32) -> f32 {
    if speed.abs() <= step.max(0.001) {
        0.0
    } else {
        speed - speed.signum() * step
    }
}

/// Unit step toward a target: -1 when above it, +1 when below
fn sign_toward(current: f32, target: f32) -> f32 {
    if current > target {
        -1.0
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::time::tick_delta;

    fn fixture() -> (PhysicsWorld, Tank) {
        let mut phys = PhysicsWorld::new();
        let tank = Tank::create(&mut phys, Uuid::new_v4(), vector![0.0, 14.0, 0.0]);
        (phys, tank)
    }

    #[test]
    fn track_speed_stays_clamped_under_sustained_acceleration() {
        let (mut phys, mut tank) = fixture();
        let dt = tick_delta();

        for _ in 0..2000 {
            tank.accelerate(dt, 0, &mut phys);
            assert!(tank.left_speed <= config::MAX_SPEED);
            assert!(tank.right_speed <= config::MAX_SPEED);
        }
        assert_eq!(tank.left_speed, config::MAX_SPEED);

        for _ in 0..5000 {
            tank.reverse(dt, 0, &mut phys);
            assert!(tank.left_speed >= -config::MAX_SPEED);
            assert!(tank.right_speed >= -config::MAX_SPEED);
        }
        assert_eq!(tank.right_speed, -config::MAX_SPEED);
    }

    #[test]
    fn turning_holds_the_inner_track_while_accelerating() {
        let (mut phys, mut tank) = fixture();
        let dt = tick_delta();

        // Accelerating while turning left: the left (inner) track is held
        tank.accelerate(dt, -1, &mut phys);
        assert_eq!(tank.left_speed, 0.0);
        assert!(tank.right_speed > 0.0);
    }

    #[test]
    fn coasting_decays_both_tracks_toward_zero() {
        let (mut phys, mut tank) = fixture();
        let dt = tick_delta();

        for _ in 0..120 {
            tank.accelerate(dt, 0, &mut phys);
        }
        let initial = tank.left_speed;
        assert!(initial > 0.0);

        for _ in 0..2000 {
            tank.decelerate(dt, config::DECELERATION_MODIFIER, &mut phys);
        }
        assert_eq!(tank.left_speed, 0.0);
        assert_eq!(tank.right_speed, 0.0);
    }

    #[test]
    fn brake_decays_faster_than_coasting() {
        let (mut phys, mut tank) = fixture();
        let dt = tick_delta();

        for _ in 0..120 {
            tank.accelerate(dt, 0, &mut phys);
        }
        let start = tank.left_speed;

        // One sub-step of each regime from the same speed
        let (mut phys2, mut tank2) = fixture();
        tank2.left_speed = start;
        tank2.right_speed = start;
        tank2.brake(dt, &mut phys2);

        tank.decelerate(dt, config::DECELERATION_MODIFIER, &mut phys);

        assert!(tank2.left_speed < tank.left_speed);
    }

    #[test]
    fn second_fire_within_cooldown_fails_and_keeps_last_fired() {
        let (mut phys, mut tank) = fixture();

        let shell = tank.try_fire(6000.0, &mut phys);
        assert!(shell.is_some());
        assert_eq!(tank.last_fired_ms(), 6000.0);

        // 4 seconds later: still cooling down
        let second = tank.try_fire(10_000.0, &mut phys);
        assert!(second.is_none());
        assert_eq!(tank.last_fired_ms(), 6000.0);
    }

    #[test]
    fn can_fire_only_after_strictly_more_than_the_cooldown() {
        let (mut phys, mut tank) = fixture();

        tank.try_fire(1000.0, &mut phys).unwrap();

        tank.before_step(1000.0 + config::COOLDOWN_MS, &mut phys);
        assert!(!tank.can_fire);

        tank.before_step(1000.0 + config::COOLDOWN_MS + 1.0, &mut phys);
        assert!(tank.can_fire);
    }

    #[test]
    fn reload_happens_once_after_the_load_delay() {
        let (mut phys, mut tank) = fixture();

        tank.try_fire(1000.0, &mut phys).unwrap();

        // Before the load delay: nothing happens
        assert!(!tank.before_step(2000.0, &mut phys));
        // Past it: a single reload
        assert!(tank.before_step(1000.0 + config::LOAD_COOLDOWN_MS + 1.0, &mut phys));
        assert!(!tank.before_step(1000.0 + config::LOAD_COOLDOWN_MS + 2.0, &mut phys));
    }

    #[test]
    fn damage_clamps_health_at_zero() {
        let (_phys, mut tank) = fixture();

        tank.damage(30.0);
        assert_eq!(tank.health, 70.0);
        tank.damage(80.0);
        assert_eq!(tank.health, 0.0);
    }

    #[test]
    fn dispose_is_idempotent() {
        let (mut phys, mut tank) = fixture();
        tank.dispose(&mut phys);
        assert!(tank.hull_translation(&phys).is_none());
        tank.dispose(&mut phys);
    }

    #[test]
    fn hull_hits_hurt_most() {
        assert_eq!(part_damage(VehiclePart::Barrel), 10.0);
        assert_eq!(part_damage(VehiclePart::Turret), 25.0);
        assert_eq!(part_damage(VehiclePart::Hull), 30.0);
        assert!(part_damage(VehiclePart::Hull) > part_damage(VehiclePart::Turret));
    }
}
