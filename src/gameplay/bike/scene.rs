use super::*;
use bevy::asset::RenderAssetUsages;
use bevy::mesh::{Indices, PrimitiveTopology};

const BIKE_HULL_SIZE: Vec3 = Vec3::new(0.7, 0.45, 2.2);
const BIKE_CANOPY_SIZE: Vec3 = Vec3::new(0.5, 0.3, 0.9);
const BIKE_CANOPY_OFFSET: Vec3 = Vec3::new(0.0, 0.35, -0.2);
const RIBBON_BEHIND_M: f32 = 60.0;
const RIBBON_AHEAD_M: f32 = 900.0;
const RIBBON_STEP_M: f32 = 4.0;
const RIBBON_LIFT_M: f32 = 0.05;
const TERRAIN_HALF_WIDTH_M: f32 = 160.0;
const TERRAIN_STEP_M: f32 = 8.0;

#[derive(Component)]
pub(super) struct TrackScenery;

pub(super) fn spawn_bike_scene(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    track: Res<Track>,
    existing_bike: Query<Entity, With<PlayerBike>>,
    existing_scenery: Query<Entity, With<TrackScenery>>,
) {
    if existing_bike.is_empty() {
        let start = track.route_point_at(0.0);
        let heading = track.route_direction_at(0.0);
        let state = BikeState::at_spawn(track.as_ref(), start);
        let spawn_height = state.cur_world_height;

        let bike_entity = commands
            .spawn((
                Name::new("PlayerBike"),
                PlayerBike,
                state,
                Transform::from_translation(Vec3::new(start.x, spawn_height, start.z))
                    .looking_to(heading, Vec3::Y),
                Visibility::Inherited,
            ))
            .id();

        let hull_material = materials.add(StandardMaterial {
            base_color: Color::srgb(0.86, 0.33, 0.18),
            perceptual_roughness: 0.55,
            ..default()
        });
        let canopy_material = materials.add(StandardMaterial {
            base_color: Color::srgb(0.24, 0.30, 0.38),
            perceptual_roughness: 0.25,
            ..default()
        });

        commands.entity(bike_entity).with_children(|parent| {
            parent.spawn((
                Name::new("BikeHull"),
                Mesh3d(meshes.add(Cuboid::new(
                    BIKE_HULL_SIZE.x,
                    BIKE_HULL_SIZE.y,
                    BIKE_HULL_SIZE.z,
                ))),
                MeshMaterial3d(hull_material),
                Transform::default(),
            ));
            parent.spawn((
                Name::new("BikeCanopy"),
                Mesh3d(meshes.add(Cuboid::new(
                    BIKE_CANOPY_SIZE.x,
                    BIKE_CANOPY_SIZE.y,
                    BIKE_CANOPY_SIZE.z,
                ))),
                MeshMaterial3d(canopy_material),
                Transform::from_translation(BIKE_CANOPY_OFFSET),
            ));
        });
    }

    if existing_scenery.is_empty() {
        let route_material = materials.add(StandardMaterial {
            base_color: Color::srgb(0.32, 0.36, 0.42),
            perceptual_roughness: 0.9,
            ..default()
        });
        let terrain_material = materials.add(StandardMaterial {
            base_color: Color::srgb(0.16, 0.28, 0.18),
            perceptual_roughness: 1.0,
            ..default()
        });

        commands.spawn((
            Name::new("RouteRibbon"),
            TrackScenery,
            Mesh3d(meshes.add(build_route_ribbon_mesh(&track))),
            MeshMaterial3d(route_material),
            Transform::default(),
        ));

        commands.spawn((
            Name::new("TerrainPatch"),
            TrackScenery,
            Mesh3d(meshes.add(build_terrain_patch_mesh(&track))),
            MeshMaterial3d(terrain_material),
            Transform::default(),
        ));

        commands.spawn((
            Name::new("SunLight"),
            TrackScenery,
            DirectionalLight {
                illuminance: 12_000.0,
                shadows_enabled: true,
                ..default()
            },
            Transform::from_xyz(40.0, 80.0, 20.0).looking_at(Vec3::ZERO, Vec3::Y),
        ));
    }
}

pub(super) fn cleanup_bike_scene(
    mut commands: Commands,
    mut follow: ResMut<OrbitFollowState>,
    mut commands_state: ResMut<BikeCommands>,
    mut telemetry: ResMut<BikeTelemetry>,
    bike_query: Query<Entity, With<PlayerBike>>,
    scenery_query: Query<Entity, With<TrackScenery>>,
) {
    for entity in &bike_query {
        commands.entity(entity).despawn();
    }
    for entity in &scenery_query {
        commands.entity(entity).despawn();
    }

    *follow = OrbitFollowState::default();
    *commands_state = BikeCommands::default();
    *telemetry = BikeTelemetry::default();
}

/// Two-vertex-per-sample strip along the route centerline, the width of
/// the drivable surface, lifted just above the terrain to avoid z-fighting.
fn build_route_ribbon_mesh(track: &Track) -> Mesh {
    let sample_count = ((RIBBON_BEHIND_M + RIBBON_AHEAD_M) / RIBBON_STEP_M).ceil() as usize + 1;
    let mut positions = Vec::with_capacity(sample_count * 2);
    let mut normals = Vec::with_capacity(sample_count * 2);
    let mut uvs = Vec::with_capacity(sample_count * 2);
    let mut indices = Vec::with_capacity(sample_count.saturating_sub(1) * 6);

    for index in 0..sample_count {
        let s = -RIBBON_BEHIND_M + index as f32 * RIBBON_STEP_M;
        let center = track.route_point_at(s);
        let lateral = track.route_direction_at(s).cross(Vec3::Y);
        let left = center - lateral * track.route_half_width();
        let right = center + lateral * track.route_half_width();

        positions.push([left.x, left.y + RIBBON_LIFT_M, left.z]);
        positions.push([right.x, right.y + RIBBON_LIFT_M, right.z]);
        normals.push([0.0, 1.0, 0.0]);
        normals.push([0.0, 1.0, 0.0]);
        let u = s / RIBBON_STEP_M;
        uvs.push([u, 0.0]);
        uvs.push([u, 1.0]);
    }

    for index in 0..sample_count.saturating_sub(1) {
        let base = (index * 2) as u32;
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 1, base + 3]);
    }

    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::default(),
    );
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
    mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs);
    mesh.insert_indices(Indices::U32(indices));
    mesh
}

/// Heightfield grid around the route corridor, sampled straight from the
/// track's height function.
fn build_terrain_patch_mesh(track: &Track) -> Mesh {
    let columns = ((TERRAIN_HALF_WIDTH_M * 2.0) / TERRAIN_STEP_M).ceil() as usize + 1;
    let rows = ((RIBBON_BEHIND_M + RIBBON_AHEAD_M) / TERRAIN_STEP_M).ceil() as usize + 1;
    let mut positions = Vec::with_capacity(columns * rows);
    let mut normals = Vec::with_capacity(columns * rows);
    let mut uvs = Vec::with_capacity(columns * rows);
    let mut indices = Vec::with_capacity(columns.saturating_sub(1) * rows.saturating_sub(1) * 6);

    for row in 0..rows {
        let z = RIBBON_BEHIND_M - row as f32 * TERRAIN_STEP_M;
        for column in 0..columns {
            let x = -TERRAIN_HALF_WIDTH_M + column as f32 * TERRAIN_STEP_M;
            // Underwater terrain renders at water level, matching the
            // height rule the bike resolves against.
            let y = track.height_at(x, z).max(0.0);
            positions.push([x, y, z]);
            normals.push([0.0, 1.0, 0.0]);
            uvs.push([
                column as f32 / columns.saturating_sub(1).max(1) as f32,
                row as f32 / rows.saturating_sub(1).max(1) as f32,
            ]);
        }
    }

    for row in 0..rows.saturating_sub(1) {
        for column in 0..columns.saturating_sub(1) {
            let base = (row * columns + column) as u32;
            let next_row = base + columns as u32;
            indices.extend_from_slice(&[
                base,
                base + 1,
                next_row,
                next_row,
                base + 1,
                next_row + 1,
            ]);
        }
    }

    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::default(),
    );
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
    mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs);
    mesh.insert_indices(Indices::U32(indices));
    mesh
}
