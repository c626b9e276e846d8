mod camera;
mod motion;
mod scene;

use crate::config::{BikeConfig, CameraConfig, GameConfig};
use crate::gameplay::easing;
use crate::gameplay::track::{Track, TrackSample, TrackSampler};
use crate::states::GameState;
use bevy::prelude::*;
use std::f32::consts::{FRAC_PI_2, PI};

pub use camera::OrbitFollowState;

const EPS: f32 = 0.000_001;

pub struct BikeGameplayPlugin;

impl Plugin for BikeGameplayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<BikeCommands>()
            .init_resource::<BikeInputBindings>()
            .init_resource::<BikeTelemetry>()
            .init_resource::<OrbitFollowState>()
            .add_systems(OnExit(GameState::InRun), scene::cleanup_bike_scene)
            .add_systems(
                Update,
                (
                    scene::spawn_bike_scene,
                    read_bike_commands,
                    motion::apply_bike_kinematics,
                    update_bike_telemetry,
                    camera::follow_bike_with_camera,
                    camera::apply_camera_zoom,
                )
                    .chain()
                    .run_if(in_state(GameState::InRun))
                    .run_if(resource_exists::<GameConfig>)
                    .run_if(resource_exists::<Track>),
            );
    }
}

#[derive(Component)]
pub struct PlayerBike;

/// Per-bike simulation state. World position and heading live on the
/// entity's `Transform`; everything else the motion update owns is here.
#[derive(Component, Debug, Clone)]
pub struct BikeState {
    /// Forward speed for the current tick, `0 <= speed <= ceiling`.
    pub speed: f32,
    /// Signed degrees-per-tick turn request; 0 when no turn key is held.
    pub turn_rate: f32,
    /// Monotonic simulation clock driving the hover phase.
    pub timer: f32,
    /// Last resolved terrain height under the bike, hover excluded.
    pub cur_world_height: f32,
    /// Running dt-scaled speed ceiling; reset to 0 by a coasting tick.
    pub ceiling: f32,
    /// Track sample the current tick resolved against.
    pub sample: TrackSample,
    /// Prior tick's sample, kept one tick for continuity.
    pub previous_sample: TrackSample,
}

impl BikeState {
    pub fn at_spawn(track: &impl TrackSampler, position: Vec3) -> Self {
        let sample = track.sample_nearest(position);
        Self {
            speed: 0.0,
            turn_rate: 0.0,
            timer: 0.0,
            cur_world_height: sample.route_point.y,
            ceiling: 0.0,
            sample,
            previous_sample: sample,
        }
    }
}

/// Command signals sampled once per tick from key state. Event handlers
/// never touch simulation state directly.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct BikeCommands {
    pub turn_left: bool,
    pub turn_right: bool,
    pub accelerate: bool,
    pub decelerate: bool,
}

#[derive(Resource, Debug, Clone)]
pub struct BikeInputBindings {
    turn_left: Vec<KeyCode>,
    turn_right: Vec<KeyCode>,
    accelerate: Vec<KeyCode>,
    decelerate: Vec<KeyCode>,
}

impl Default for BikeInputBindings {
    fn default() -> Self {
        Self {
            turn_left: vec![KeyCode::ArrowLeft, KeyCode::KeyA],
            turn_right: vec![KeyCode::ArrowRight, KeyCode::KeyD],
            accelerate: vec![KeyCode::ArrowUp, KeyCode::KeyW],
            decelerate: vec![KeyCode::ArrowDown, KeyCode::KeyS],
        }
    }
}

#[derive(Resource, Debug, Clone, Default)]
pub struct BikeTelemetry {
    pub speed: f32,
    pub distance_to_route: f32,
    pub world_height: f32,
    pub position: Vec3,
    pub route_direction: Vec3,
    pub orbit_angle: f32,
}

fn read_bike_commands(
    keyboard: Res<ButtonInput<KeyCode>>,
    bindings: Res<BikeInputBindings>,
    mut commands_state: ResMut<BikeCommands>,
) {
    commands_state.turn_left = bindings.turn_left.iter().any(|key| keyboard.pressed(*key));
    commands_state.turn_right = bindings.turn_right.iter().any(|key| keyboard.pressed(*key));
    commands_state.accelerate = bindings.accelerate.iter().any(|key| keyboard.pressed(*key));
    commands_state.decelerate = bindings.decelerate.iter().any(|key| keyboard.pressed(*key));
}

fn update_bike_telemetry(
    follow: Res<OrbitFollowState>,
    mut telemetry: ResMut<BikeTelemetry>,
    bike_query: Query<(&Transform, &BikeState), With<PlayerBike>>,
) {
    let Ok((transform, state)) = bike_query.single() else {
        return;
    };

    telemetry.speed = state.speed;
    telemetry.distance_to_route = state.sample.distance_to_route;
    telemetry.world_height = state.cur_world_height;
    telemetry.position = transform.translation;
    telemetry.orbit_angle = follow.orbit_angle;

    // Estimate the route heading from the two retained samples; fall back
    // to the sampler's tangent hint while the bike is parked.
    let mut travelled = state.sample.route_point - state.previous_sample.route_point;
    travelled.y = 0.0;
    telemetry.route_direction = if travelled.length_squared() > EPS {
        travelled.normalize()
    } else {
        state.sample.route_direction
    };
}
