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

use bevy::{
    diagnostic::{FrameTimeDiagnosticsPlugin, LogDiagnosticsPlugin},
    prelude::*,
};
use bevy_rapier3d::prelude::*;

use particle_core::particle::group::Transform2D;
use particle_core::particle::host::BoxShape;
use particle_core::plugin::RapierHandles;
use particle_core::{GroupId, ParticleFlags, ParticleGroupDef, ParticleSimPlugin, ParticleSystem};

/// Tags a visual marker spawned for one particle index so
/// [`sync_particle_visuals`] knows which particle drives its transform.
#[derive(Component)]
struct ParticleMarker(usize);

/// Fixed bowl the demo group falls into: a floor and two side walls, all
/// `RigidBody::Fixed` colliders the particle system discovers through
/// `RapierWorld::query_aabb` the same way the teacher's tank walls are
/// discovered by its own fluid grid (`src/water/grid.rs`).
fn setup_scene(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(0.0, 0.0, 40.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    commands.spawn((
        PointLight {
            intensity: 600_000.0,
            range: 200.0,
            ..default()
        },
        Transform::from_xyz(0.0, 20.0, 30.0),
    ));

    let wall_material = materials.add(StandardMaterial {
        base_color: Color::linear_rgba(0.5, 0.5, 0.5, 1.0),
        ..default()
    });

    commands.spawn((
        RigidBody::Fixed,
        Collider::cuboid(20.0, 1.0, 5.0),
        Mesh3d(meshes.add(Cuboid::new(40.0, 2.0, 10.0))),
        MeshMaterial3d(wall_material.clone()),
        Transform::from_xyz(0.0, -15.0, 0.0),
    ));
    commands.spawn((
        RigidBody::Fixed,
        Collider::cuboid(1.0, 16.0, 5.0),
        Mesh3d(meshes.add(Cuboid::new(2.0, 32.0, 10.0))),
        MeshMaterial3d(wall_material.clone()),
        Transform::from_xyz(-20.0, 0.0, 0.0),
    ));
    commands.spawn((
        RigidBody::Fixed,
        Collider::cuboid(1.0, 16.0, 5.0),
        Mesh3d(meshes.add(Cuboid::new(2.0, 32.0, 10.0))),
        MeshMaterial3d(wall_material),
        Transform::from_xyz(20.0, 0.0, 0.0),
    ));
}

/// Fills one `WATER`-flagged group (§4.F) above the bowl and spawns one
/// debug sphere per particle to visualize it, mirroring the teacher's own
/// "one visible marker per simulated particle" debug path in `fluid.rs`.
fn spawn_demo_particles(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut particles: ResMut<ParticleSystem<RapierHandles>>,
) {
    let shape = BoxShape { half_extents: Vec2::new(8.0, 5.0) };
    let def = ParticleGroupDef {
        flags: ParticleFlags::TENSILE,
        transform: Transform2D { position: Vec2::new(0.0, 8.0), angle: 0.0 },
        strength: 1.0,
        ..Default::default()
    };
    let group_id: GroupId = particles.create_particle_group(&def, &shape);
    let group = particles.groups().get(group_id);

    let radius = particles.tunables().PARTICLE_RADIUS;
    let material = materials.add(StandardMaterial {
        base_color: Color::linear_rgba(0.1, 0.3, 1.0, 0.85),
        ..default()
    });
    let mesh = meshes.add(Sphere::new(radius).mesh().ico(2).unwrap());

    for index in group.first_index..group.last_index {
        commands.spawn((
            ParticleMarker(index),
            Mesh3d(mesh.clone()),
            MeshMaterial3d(material.clone()),
            Transform::default(),
        ));
    }
}

/// Copies the particle system's 2-D positions onto the visible markers'
/// transforms every frame, after the solve step has advanced them.
fn sync_particle_visuals(
    particles: Res<ParticleSystem<RapierHandles>>,
    mut markers: Query<(&ParticleMarker, &mut Transform)>,
) {
    let positions = particles.positions();
    for (marker, mut transform) in &mut markers {
        if let Some(p) = positions.get(marker.0) {
            transform.translation = Vec3::new(p.x, p.y, 0.0);
        }
    }
}

fn main() {
    App::new()
        .add_plugins(DefaultPlugins)
        .add_plugins(LogDiagnosticsPlugin::default())
        .add_plugins(FrameTimeDiagnosticsPlugin)
        .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
        .insert_resource(RapierConfiguration { gravity: Vec3::new(0.0, -9.8, 0.0), ..default() })
        .add_plugins(ParticleSimPlugin)
        .add_systems(Startup, (setup_scene, spawn_demo_particles).chain())
        .add_systems(PostUpdate, sync_particle_visuals)
        .run();
}
