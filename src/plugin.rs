/*
    Copyright 2023 github.com/programaquatic

   Licensed under the Apache License, Version 2.0 (the "License");
   you may not use this file except in compliance with the License.
   You may obtain a copy of the License at

       http://www.apache.org/licenses/LICENSE-2.0

   Unless required by applicable law or agreed to in writing, software
   distributed under the License is distributed on an "AS IS" BASIS,
   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
   See the License for the specific language governing permissions and
   limitations under the License.
*/

//! The only module in this crate that talks bevy_rapier3d. [`RapierWorld`]
//! implements [`crate::particle::host::RigidBodyWorld`] against the host's
//! rigid-body world so [`ParticleSimPlugin`] can drive a
//! [`ParticleSystem<RapierHandles>`] from a single `Update` system, the same
//! way the teacher drives its own MLS-MPM fluid from `FluidPlugin`
//! (`src/water/fluid.rs`).
//!
//! The particle plane is the rigid-body world's XY plane at `z = 0`; every
//! query inflates that plane by [`PARTICLE_PLANE_THICKNESS`] along Z so a
//! particle at `z = 0` still finds fixtures whose collider isn't
//! infinitely thin.

use bevy::math::{Vec2, Vec3};
use bevy::prelude::*;
use bevy_rapier3d::prelude::*;

use crate::constants::Tunables;
use crate::particle::host::{Aabb, RigidBodyWorld};
use crate::particle::system::{ParticleSystem, Step};

/// How far the broad-phase query extrudes along Z around the particle
/// plane. Half the default particle diameter is a reasonable default: wide
/// enough to catch a collider resting exactly on the plane, narrow enough
/// not to pull in unrelated geometry above or below the tank's cross-section.
pub const PARTICLE_PLANE_THICKNESS: f32 = 0.5;

fn to_3d(p: Vec2) -> Vec3 {
    Vec3::new(p.x, p.y, 0.0)
}

fn to_2d(p: Vec3) -> Vec2 {
    Vec2::new(p.x, p.y)
}

/// Bridges [`RigidBodyWorld`] to a live `bevy_rapier3d` scene. Built fresh
/// each `Update` tick from the system params `step_particle_system` holds;
/// `Fixture` and `Body` are both plain `Entity` (this crate doesn't split
/// collider entities from rigid-body entities, matching how the decoration
/// colliders are spawned in the teacher's own scenes).
pub struct RapierWorld<'w, 's, 'a> {
    pub context: &'a ReadDefaultRapierContext<'w, 's>,
    pub transforms: &'a Query<'w, 's, &'static GlobalTransform>,
    pub colliders: &'a Query<'w, 's, (&'static Collider, Option<&'static Sensor>)>,
    pub bodies: &'a Query<'w, 's, (Option<&'static Velocity>, Option<&'static ReadMassProperties>)>,
    pub impulses: &'a mut Query<'w, 's, &'static mut ExternalImpulse>,
    pub gravity: Vec2,
}

impl<'w, 's, 'a> RigidBodyWorld for RapierWorld<'w, 's, 'a> {
    type Fixture = Entity;
    type Body = Entity;

    fn query_aabb(&self, aabb: Aabb, callback: &mut dyn FnMut(Self::Fixture) -> bool) {
        let rapier_aabb = bevy_rapier3d::parry::bounding_volume::Aabb::new(
            to_3d(aabb.lower).into(),
            (to_3d(aabb.upper) + Vec3::new(0.0, 0.0, PARTICLE_PLANE_THICKNESS)).into(),
        );
        self.context.colliders_with_aabb_intersecting_aabb(rapier_aabb, |entity| callback(entity));
    }

    fn fixture_aabb(&self, fixture: Self::Fixture) -> Aabb {
        let Some(raw) = self.context.collider_aabb(fixture) else {
            return Aabb::new(Vec2::ZERO, Vec2::ZERO);
        };
        Aabb::new(to_2d(raw.mins.into()), to_2d(raw.maxs.into()))
    }

    fn fixture_is_sensor(&self, fixture: Self::Fixture) -> bool {
        self.colliders.get(fixture).map(|(_, sensor)| sensor.is_some()).unwrap_or(false)
    }

    fn body_of(&self, fixture: Self::Fixture) -> Self::Body {
        fixture
    }

    fn compute_distance(&self, fixture: Self::Fixture, point: Vec2) -> (f32, Vec2) {
        let Ok((collider, _)) = self.colliders.get(fixture) else {
            return (f32::MAX, Vec2::Y);
        };
        let transform = self.transforms.get(fixture).copied().unwrap_or(GlobalTransform::IDENTITY).compute_transform();
        let world_point = to_3d(point);
        let projection = collider.project_point_with_max_dist(transform.translation, transform.rotation, world_point, true, f32::MAX);
        let Some(projection) = projection else {
            return (f32::MAX, Vec2::Y);
        };
        let delta = world_point - projection.point;
        let distance = if projection.is_inside { -delta.length() } else { delta.length() };
        let normal = delta.truncate().normalize_or_zero();
        let normal = if normal == Vec2::ZERO { Vec2::Y } else { normal };
        (distance, normal)
    }

    fn ray_cast_fixture(&self, fixture: Self::Fixture, p1: Vec2, p2: Vec2) -> Option<(f32, Vec2)> {
        let Ok((collider, _)) = self.colliders.get(fixture) else {
            return None;
        };
        let transform = self.transforms.get(fixture).copied().unwrap_or(GlobalTransform::IDENTITY).compute_transform();
        let origin = to_3d(p1);
        let dir = to_3d(p2) - origin;
        let max_toi = dir.length();
        if max_toi <= f32::EPSILON {
            return None;
        }
        let hit = collider.cast_ray_and_get_normal(
            transform.translation,
            transform.rotation,
            origin,
            dir.normalize(),
            max_toi,
            true,
        )?;
        Some((hit.time_of_impact / max_toi, hit.normal.truncate().normalize_or_zero()))
    }

    fn body_world_center(&self, body: Self::Body) -> Vec2 {
        to_2d(self.transforms.get(body).copied().unwrap_or(GlobalTransform::IDENTITY).translation())
    }

    fn body_inv_mass(&self, body: Self::Body) -> f32 {
        self.bodies
            .get(body)
            .ok()
            .and_then(|(_, mp)| mp)
            .map(|mp| if mp.0.mass > 0.0 { 1.0 / mp.0.mass } else { 0.0 })
            .unwrap_or(0.0)
    }

    fn body_inv_inertia(&self, body: Self::Body) -> f32 {
        self.bodies
            .get(body)
            .ok()
            .and_then(|(_, mp)| mp)
            .map(|mp| {
                let i = mp.0.principal_inertia.z;
                if i > 0.0 {
                    1.0 / i
                } else {
                    0.0
                }
            })
            .unwrap_or(0.0)
    }

    fn body_linear_velocity_at_point(&self, body: Self::Body, point: Vec2) -> Vec2 {
        let Ok((velocity, _)) = self.bodies.get(body) else {
            return Vec2::ZERO;
        };
        let Some(velocity) = velocity else {
            return Vec2::ZERO;
        };
        let center = self.body_world_center(body);
        let r = point - center;
        let tangential = Vec2::new(-velocity.angvel.z * r.y, velocity.angvel.z * r.x);
        to_2d(velocity.linvel) + tangential
    }

    fn apply_linear_impulse(&mut self, body: Self::Body, impulse: Vec2, point: Vec2, _wake: bool) {
        let Ok(mut external) = self.impulses.get_mut(body) else {
            return;
        };
        let center = self.body_world_center(body);
        let r = point - center;
        let torque = r.x * impulse.y - r.y * impulse.x;
        external.impulse += to_3d(impulse);
        external.torque_impulse += Vec3::new(0.0, 0.0, torque);
    }

    fn gravity(&self) -> Vec2 {
        self.gravity
    }
}

/// Fixes `ParticleSystem`'s `Body` handle to `Entity` without fixing it to
/// any particular borrow. [`RapierWorld`] carries a different lifetime every
/// tick (it borrows that tick's system params), so it can't itself be the
/// type parameter of a resource that has to outlive any single tick; this
/// zero-sized marker is `'static` instead; `ParticleSystem::solve` only
/// requires the *argument* it's called with to share its `Body` type, which
/// [`RapierWorld`] does. Its methods are never invoked — [`step_particle_system`]
/// always calls `solve` with a live [`RapierWorld`], never with this marker.
#[derive(Default, Clone, Copy)]
pub struct RapierHandles;

impl RigidBodyWorld for RapierHandles {
    type Fixture = Entity;
    type Body = Entity;

    fn query_aabb(&self, _aabb: Aabb, _callback: &mut dyn FnMut(Self::Fixture) -> bool) {}
    fn fixture_aabb(&self, _fixture: Self::Fixture) -> Aabb {
        Aabb::new(Vec2::ZERO, Vec2::ZERO)
    }
    fn fixture_is_sensor(&self, _fixture: Self::Fixture) -> bool {
        false
    }
    fn body_of(&self, fixture: Self::Fixture) -> Self::Body {
        fixture
    }
    fn compute_distance(&self, _fixture: Self::Fixture, _point: Vec2) -> (f32, Vec2) {
        (f32::MAX, Vec2::Y)
    }
    fn ray_cast_fixture(&self, _fixture: Self::Fixture, _p1: Vec2, _p2: Vec2) -> Option<(f32, Vec2)> {
        None
    }
    fn body_world_center(&self, _body: Self::Body) -> Vec2 {
        Vec2::ZERO
    }
    fn body_inv_mass(&self, _body: Self::Body) -> f32 {
        0.0
    }
    fn body_inv_inertia(&self, _body: Self::Body) -> f32 {
        0.0
    }
    fn body_linear_velocity_at_point(&self, _body: Self::Body, _point: Vec2) -> Vec2 {
        Vec2::ZERO
    }
    fn apply_linear_impulse(&mut self, _body: Self::Body, _impulse: Vec2, _point: Vec2, _wake: bool) {}
    fn gravity(&self) -> Vec2 {
        Vec2::ZERO
    }
}

/// Wires [`ParticleSystem<RapierHandles>`] into the host app. Loads
/// [`Tunables`] the same way the teacher's own `Tank`/`Constants` resources
/// load (`FromWorld` over a commented JSON fixture), inserts it as a
/// resource, and schedules [`step_particle_system`] in `Update` after
/// bevy_rapier3d's own physics step so particle-body contacts see this
/// frame's collider transforms.
pub struct ParticleSimPlugin;

impl Plugin for ParticleSimPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Tunables>();
        let tunables = *app.world().resource::<Tunables>();
        app.insert_resource(ParticleSystem::<RapierHandles>::new(tunables))
            .add_systems(Update, step_particle_system.after(PhysicsSet::Writeback));
    }
}

/// The single per-tick entry point (§4.G): builds one [`RapierWorld`] out of
/// this frame's rigid-body queries and hands it to
/// [`ParticleSystem::solve`], mirroring the teacher's single `FluidPlugin`
/// system driving its own per-tick solve.
#[allow(clippy::too_many_arguments)]
fn step_particle_system(
    time: Res<Time>,
    rapier_config: Res<RapierConfiguration>,
    r3d_context: ReadDefaultRapierContext,
    transforms: Query<&GlobalTransform>,
    colliders: Query<(&Collider, Option<&Sensor>)>,
    bodies: Query<(Option<&Velocity>, Option<&ReadMassProperties>)>,
    mut impulses: Query<&mut ExternalImpulse>,
    mut particles: ResMut<ParticleSystem<RapierHandles>>,
) {
    let dt = time.delta_seconds();
    if dt <= 0.0 {
        return;
    }
    let mut world = RapierWorld {
        context: &r3d_context,
        transforms: &transforms,
        colliders: &colliders,
        bodies: &bodies,
        impulses: &mut impulses,
        gravity: to_2d(rapier_config.gravity),
    };
    particles.solve(&mut world, Step::new(dt));
}
