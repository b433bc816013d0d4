//! Narrow wrapper over the rapier3d rigid-body engine
//!
//! The simulation only needs a small surface: create bodies and colliders,
//! attach motorized 6-DoF constraints, apply impulses, advance by a fixed
//! sub-step and collect collision events. Everything else stays behind this
//! module so the rest of the game code never touches solver internals.
//!
//! Every collider is registered with an owner tag so collision resolution can
//! switch on owner kind instead of matching body names.

use std::collections::HashMap;

use crossbeam_channel::Receiver;
use rapier3d::prelude::*;
use uuid::Uuid;

use crate::util::time::tick_delta;

/// Which sub-part of a vehicle a collider belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehiclePart {
    Hull,
    Turret,
    Barrel,
    Wheel,
}

/// Owner tag carried by every collider in the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyOwner {
    Ground,
    Barrier,
    Vehicle { session_id: Uuid, part: VehiclePart },
    Shell { shell_id: Uuid, owner: Uuid },
}

/// The physics scene. Exclusively owned by the world loop; vehicles and
/// projectiles mutate only their own bodies through the methods here.
pub struct PhysicsWorld {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    event_collector: ChannelEventCollector,
    collision_recv: Receiver<CollisionEvent>,
    _contact_force_recv: Receiver<ContactForceEvent>,
    owners: HashMap<ColliderHandle, BodyOwner>,
}

impl PhysicsWorld {
    pub fn new() -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = tick_delta();

        let (collision_send, collision_recv) = crossbeam_channel::unbounded();
        let (contact_force_send, contact_force_recv) = crossbeam_channel::unbounded();

        Self {
            gravity: vector![0.0, -9.8, 0.0],
            integration_parameters,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            event_collector: ChannelEventCollector::new(collision_send, contact_force_send),
            collision_recv,
            _contact_force_recv: contact_force_recv,
            owners: HashMap::new(),
        }
    }

    /// Insert a rigid body
    pub fn add_body(&mut self, builder: RigidBodyBuilder) -> RigidBodyHandle {
        self.bodies.insert(builder)
    }

    /// Attach a collider to a body and register its owner tag
    pub fn add_collider(
        &mut self,
        body: RigidBodyHandle,
        builder: ColliderBuilder,
        owner: BodyOwner,
    ) -> ColliderHandle {
        let handle = self
            .colliders
            .insert_with_parent(builder, body, &mut self.bodies);
        self.owners.insert(handle, owner);
        handle
    }

    /// Connect two bodies with a 6-DoF constraint
    pub fn add_joint(
        &mut self,
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
        joint: GenericJoint,
    ) -> ImpulseJointHandle {
        self.impulse_joints.insert(body1, body2, joint, true)
    }

    /// Set the velocity motor target on one axis of a constraint
    pub fn set_motor_velocity(
        &mut self,
        joint: ImpulseJointHandle,
        axis: JointAxis,
        target_vel: f32,
        factor: f32,
    ) {
        if let Some(j) = self.impulse_joints.get_mut(joint) {
            j.data.set_motor_velocity(axis, target_vel, factor);
        }
    }

    /// Remove a constraint (used to release a shell's barrel lock)
    pub fn remove_joint(&mut self, joint: ImpulseJointHandle) {
        self.impulse_joints.remove(joint, true);
    }

    /// Apply an impulse at the body's center of mass
    pub fn apply_impulse(&mut self, body: RigidBodyHandle, impulse: Vector<Real>) {
        if let Some(b) = self.bodies.get_mut(body) {
            b.apply_impulse(impulse, true);
        }
    }

    /// Apply an impulse at a world-space point
    pub fn apply_impulse_at_point(
        &mut self,
        body: RigidBodyHandle,
        impulse: Vector<Real>,
        point: Point<Real>,
    ) {
        if let Some(b) = self.bodies.get_mut(body) {
            b.apply_impulse_at_point(impulse, point, true);
        }
    }

    pub fn body_translation(&self, body: RigidBodyHandle) -> Option<Vector<Real>> {
        self.bodies.get(body).map(|b| *b.translation())
    }

    pub fn body_rotation(&self, body: RigidBodyHandle) -> Option<Rotation<Real>> {
        self.bodies.get(body).map(|b| *b.rotation())
    }

    pub fn body_linvel(&self, body: RigidBodyHandle) -> Option<Vector<Real>> {
        self.bodies.get(body).map(|b| *b.linvel())
    }

    /// Owner tag for a collider, if it still exists
    pub fn owner_of(&self, collider: ColliderHandle) -> Option<BodyOwner> {
        self.owners.get(&collider).copied()
    }

    /// Body a collider is attached to
    pub fn collider_parent(&self, collider: ColliderHandle) -> Option<RigidBodyHandle> {
        self.colliders.get(collider).and_then(|c| c.parent())
    }

    /// Remove a body, its colliders, their owner tags, and any joints
    pub fn remove_body(&mut self, body: RigidBodyHandle) {
        if let Some(b) = self.bodies.get(body) {
            for collider in b.colliders() {
                self.owners.remove(collider);
            }
        }
        self.bodies.remove(
            body,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    /// Advance the scene by exactly one fixed sub-step, returning the
    /// collision events it produced
    pub fn step(&mut self) -> Vec<CollisionEvent> {
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &self.event_collector,
        );

        self.collision_recv.try_iter().collect()
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collider_owner_registry_round_trips() {
        let mut phys = PhysicsWorld::new();
        let session_id = Uuid::new_v4();

        let body = phys.add_body(RigidBodyBuilder::dynamic().translation(vector![0.0, 5.0, 0.0]));
        let collider = phys.add_collider(
            body,
            ColliderBuilder::cuboid(1.0, 0.5, 2.0),
            BodyOwner::Vehicle {
                session_id,
                part: VehiclePart::Hull,
            },
        );

        assert_eq!(
            phys.owner_of(collider),
            Some(BodyOwner::Vehicle {
                session_id,
                part: VehiclePart::Hull
            })
        );
        assert_eq!(phys.collider_parent(collider), Some(body));
    }

    #[test]
    fn removing_a_body_unregisters_its_colliders() {
        let mut phys = PhysicsWorld::new();
        let body = phys.add_body(RigidBodyBuilder::dynamic());
        let collider = phys.add_collider(body, ColliderBuilder::ball(0.5), BodyOwner::Ground);

        phys.remove_body(body);
        assert_eq!(phys.owner_of(collider), None);
        // A second removal is a no-op
        phys.remove_body(body);
    }

    #[test]
    fn dynamic_bodies_fall_under_gravity() {
        let mut phys = PhysicsWorld::new();
        let body = phys.add_body(RigidBodyBuilder::dynamic().translation(vector![0.0, 10.0, 0.0]));
        phys.add_collider(body, ColliderBuilder::ball(0.5), BodyOwner::Ground);

        for _ in 0..60 {
            phys.step();
        }

        let y = phys.body_translation(body).unwrap().y;
        assert!(y < 10.0, "body should have fallen, y = {y}");
    }
}
