//! Shell lifecycle: locked in the barrel, free flight, resolution
//!
//! A loaded shell is a real physics body pinned to the barrel tip by a lock
//! constraint, so it inherits the barrel's motion at fire time ballistically
//! instead of by velocity copy. Firing releases the lock and applies a forward
//! impulse. Resolution (collision or out-of-bounds) disposes the body exactly
//! once.

use rapier3d::prelude::*;
use uuid::Uuid;

use super::physics::{BodyOwner, PhysicsWorld};

/// Impulse applied along barrel-forward at fire time
const ENERGY: f32 = 0.02;
/// Shell rest position forward of the barrel pivot
const BARREL_TIP_OFFSET: f32 = 4.8;
/// Any coordinate beyond this magnitude counts as "missed everything"
const BOUNDS_LIMIT: f32 = 750.0;

const SHELL_RADIUS: f32 = 0.05;
const SHELL_MASS: f32 = 0.0001;

/// A single shell, owned by its tank while loaded and by the world once fired
pub struct Shell {
    pub id: Uuid,
    /// Session id of the firing player, for self-hit immunity and stats
    pub owner: Uuid,
    body: RigidBodyHandle,
    pub collider: ColliderHandle,
    lock: Option<ImpulseJointHandle>,
    is_spent: bool,
    disposed: bool,
}

impl Shell {
    /// Create a shell locked to the given barrel's tip
    pub fn load(phys: &mut PhysicsWorld, owner: Uuid, barrel: RigidBodyHandle) -> Option<Self> {
        let barrel_pos = phys.body_translation(barrel)?;
        let barrel_rot = phys.body_rotation(barrel)?;

        let id = Uuid::new_v4();
        let tip = barrel_pos + barrel_rot * vector![0.0, 0.0, BARREL_TIP_OFFSET];

        let body = phys.add_body(
            RigidBodyBuilder::dynamic()
                .translation(tip)
                .rotation(barrel_rot.scaled_axis()),
        );
        let collider = phys.add_collider(
            body,
            ColliderBuilder::ball(SHELL_RADIUS)
                .mass(SHELL_MASS)
                .restitution(0.0)
                .active_events(ActiveEvents::COLLISION_EVENTS),
            BodyOwner::Shell { shell_id: id, owner },
        );

        let lock = FixedJointBuilder::new()
            .local_anchor1(point![0.0, 0.0, BARREL_TIP_OFFSET])
            .local_anchor2(point![0.0, 0.0, 0.0])
            .build();
        let lock = phys.add_joint(barrel, body, lock.into());

        Some(Self {
            id,
            owner,
            body,
            collider,
            lock: Some(lock),
            is_spent: false,
            disposed: false,
        })
    }

    /// Release the barrel lock and send the shell on its way
    pub fn fire(&mut self, phys: &mut PhysicsWorld) {
        if self.is_spent {
            return;
        }
        if let Some(lock) = self.lock.take() {
            phys.remove_joint(lock);
        }
        if let Some(rot) = phys.body_rotation(self.body) {
            let impulse = rot * vector![0.0, 0.0, 1.0] * ENERGY;
            phys.apply_impulse(self.body, impulse);
        }
        self.is_spent = true;
    }

    pub fn is_spent(&self) -> bool {
        self.is_spent
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn body(&self) -> RigidBodyHandle {
        self.body
    }

    /// World-space forward direction (impulse direction at impact)
    pub fn forward(&self, phys: &PhysicsWorld) -> Vector<Real> {
        phys.body_rotation(self.body)
            .map(|rot| rot * vector![0.0, 0.0, 1.0])
            .unwrap_or_else(|| vector![0.0, 0.0, 1.0])
    }

    pub fn translation(&self, phys: &PhysicsWorld) -> Option<Vector<Real>> {
        phys.body_translation(self.body)
    }

    /// Shove a struck body along the shell's travel direction
    pub fn impact(&self, phys: &mut PhysicsWorld, target: RigidBodyHandle) {
        let push = self.forward(phys) * ENERGY;
        phys.apply_impulse(target, push);
    }

    /// Shot-missed-everything cleanup check, run after each sub-step
    pub fn out_of_bounds(&self, phys: &PhysicsWorld) -> bool {
        match phys.body_translation(self.body) {
            Some(pos) => {
                pos.x.abs() > BOUNDS_LIMIT || pos.y.abs() > BOUNDS_LIMIT || pos.z.abs() > BOUNDS_LIMIT
            }
            None => false,
        }
    }

    /// Remove the shell's body from the scene. Safe to call more than once.
    pub fn dispose(&mut self, phys: &mut PhysicsWorld) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.lock = None; // removed together with the body's joints
        phys.remove_body(self.body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn barrel_fixture(phys: &mut PhysicsWorld) -> RigidBodyHandle {
        // A kinematic stand-in for a barrel so the shell has something to lock to
        let barrel = phys.add_body(
            RigidBodyBuilder::kinematic_position_based().translation(vector![0.0, 5.0, 0.0]),
        );
        phys.add_collider(
            barrel,
            ColliderBuilder::cuboid(0.1, 0.1, 1.0),
            BodyOwner::Ground,
        );
        barrel
    }

    #[test]
    fn loaded_shell_rests_at_the_barrel_tip() {
        let mut phys = PhysicsWorld::new();
        let barrel = barrel_fixture(&mut phys);
        let shell = Shell::load(&mut phys, Uuid::new_v4(), barrel).unwrap();

        let pos = shell.translation(&phys).unwrap();
        assert!((pos.z - BARREL_TIP_OFFSET).abs() < 1e-4);
        assert!(!shell.is_spent());
    }

    #[test]
    fn firing_imparts_forward_velocity() {
        let mut phys = PhysicsWorld::new();
        let barrel = barrel_fixture(&mut phys);
        let mut shell = Shell::load(&mut phys, Uuid::new_v4(), barrel).unwrap();

        shell.fire(&mut phys);
        assert!(shell.is_spent());

        phys.step();
        let vel = phys.body_linvel(shell.body()).unwrap();
        assert!(vel.z > 0.0, "shell should fly barrel-forward, vz = {}", vel.z);
    }

    #[test]
    fn fire_is_idempotent() {
        let mut phys = PhysicsWorld::new();
        let barrel = barrel_fixture(&mut phys);
        let mut shell = Shell::load(&mut phys, Uuid::new_v4(), barrel).unwrap();

        shell.fire(&mut phys);
        phys.step();
        let vel_after_first = phys.body_linvel(shell.body()).unwrap();

        // A second fire must not add another impulse
        shell.fire(&mut phys);
        let vel_after_second = phys.body_linvel(shell.body()).unwrap();
        assert_eq!(vel_after_first.z, vel_after_second.z);
    }

    #[test]
    fn dispose_is_idempotent_and_removes_the_body() {
        let mut phys = PhysicsWorld::new();
        let barrel = barrel_fixture(&mut phys);
        let mut shell = Shell::load(&mut phys, Uuid::new_v4(), barrel).unwrap();

        shell.dispose(&mut phys);
        assert!(shell.is_disposed());
        assert!(shell.translation(&phys).is_none());
        shell.dispose(&mut phys);
    }

    #[test]
    fn bounds_check_triggers_far_from_origin() {
        let mut phys = PhysicsWorld::new();
        let barrel = phys.add_body(
            RigidBodyBuilder::kinematic_position_based().translation(vector![800.0, 5.0, 0.0]),
        );
        let shell = Shell::load(&mut phys, Uuid::new_v4(), barrel).unwrap();
        assert!(shell.out_of_bounds(&phys));
    }
}
