use super::*;
use bevy::input::mouse::MouseWheel;

/// Normalized-angle threshold below which the camera considers itself
/// already aligned with the bike's heading.
const ALIGN_THRESHOLD: f32 = 0.001;
const ZOOM_STEP_BASE: f32 = 0.95;

/// Orbit-follow bookkeeping. Owned by the camera systems only; the bike
/// never reads it.
#[derive(Resource, Debug, Clone)]
pub struct OrbitFollowState {
    pub orbit_angle: f32,
    pub previous_bike_position: Vec3,
    pub initialized: bool,
}

impl Default for OrbitFollowState {
    fn default() -> Self {
        Self {
            orbit_angle: -FRAC_PI_2,
            previous_bike_position: Vec3::ZERO,
            initialized: false,
        }
    }
}

pub(super) fn follow_bike_with_camera(
    config: Res<GameConfig>,
    mut follow: ResMut<OrbitFollowState>,
    bike_query: Query<(&Transform, &BikeState), (With<PlayerBike>, Without<Camera3d>)>,
    mut camera_query: Query<&mut Transform, (With<Camera3d>, Without<PlayerBike>)>,
) {
    let Ok((bike_transform, bike_state)) = bike_query.single() else {
        return;
    };
    let Ok(mut camera_transform) = camera_query.single_mut() else {
        return;
    };

    if !follow.initialized {
        place_camera_behind_bike(
            &mut camera_transform,
            &mut follow,
            bike_transform,
            &config.game.camera,
        );
        follow.initialized = true;
        return;
    }

    follow_step(
        &mut camera_transform,
        &mut follow,
        bike_transform,
        bike_state.turn_rate,
        &config.game.camera,
    );
}

pub(super) fn apply_camera_zoom(
    mut wheel_events: MessageReader<MouseWheel>,
    config: Res<GameConfig>,
    follow: Res<OrbitFollowState>,
    bike_query: Query<&Transform, (With<PlayerBike>, Without<Camera3d>)>,
    mut camera_query: Query<&mut Transform, (With<Camera3d>, Without<PlayerBike>)>,
) {
    if !follow.initialized {
        wheel_events.clear();
        return;
    }

    let Ok(bike_transform) = bike_query.single() else {
        return;
    };
    let Ok(mut camera_transform) = camera_query.single_mut() else {
        return;
    };

    // One multiplicative step per wheel notch. Wheel-up zooms in; the
    // zoom delta is positive zooming out.
    for event in wheel_events.read() {
        if event.y == 0.0 {
            continue;
        }
        zoom_step(
            &mut camera_transform,
            bike_transform.translation,
            -event.y,
            &config.game.camera,
        );
    }
}

/// Seat the camera directly behind the bike, looking at it, and reset the
/// orbit bookkeeping to match.
pub(super) fn place_camera_behind_bike(
    camera: &mut Transform,
    follow: &mut OrbitFollowState,
    bike: &Transform,
    tuning: &CameraConfig,
) {
    let behind = -bike.forward().as_vec3() * tuning.look_distance;
    camera.translation = bike.translation + behind + Vec3::Y * tuning.height_distance;
    camera.look_at(bike.translation, Vec3::Y);
    follow.orbit_angle = -FRAC_PI_2;
    follow.previous_bike_position = bike.translation;
}

/// One camera tick: ease the orbit back behind a turning bike, then carry
/// the camera along with the bike's displacement and re-aim.
pub(super) fn follow_step(
    camera: &mut Transform,
    follow: &mut OrbitFollowState,
    bike: &Transform,
    turn_rate: f32,
    tuning: &CameraConfig,
) {
    let bike_position = bike.translation;

    // A camera sitting on the bike has no usable aim direction; hold the
    // previous placement for this tick.
    if (bike_position - camera.translation).length_squared() <= EPS {
        return;
    }

    let mut bike_heading = bike.forward().as_vec3();
    bike_heading.y = 0.0;
    let mut camera_heading = camera.forward().as_vec3();
    camera_heading.y = 0.0;
    if bike_heading.length_squared() <= EPS || camera_heading.length_squared() <= EPS {
        return;
    }

    let angle = camera_heading.angle_between(bike_heading) / PI;
    if angle > ALIGN_THRESHOLD && turn_rate != 0.0 {
        let eased = easing::in_out_cubic(angle);
        follow.orbit_angle += if turn_rate < 0.0 { eased } else { -eased };

        let mut offset = bike_position - camera.translation;
        offset.x += follow.orbit_angle.cos() * tuning.look_distance;
        offset.z += follow.orbit_angle.sin() * tuning.look_distance;
        camera.translation += offset;
    }

    if bike_position != follow.previous_bike_position || angle > ALIGN_THRESHOLD {
        camera.translation += bike_position - follow.previous_bike_position;
        camera.look_at(bike_position, Vec3::Y);
        follow.previous_bike_position = bike_position;
    }
}

/// Scale the camera-to-bike distance by one multiplicative step per zoom
/// delta sign, clamp it, and reseat the camera on the same bearing.
pub(super) fn zoom_step(
    camera: &mut Transform,
    bike_position: Vec3,
    delta: f32,
    tuning: &CameraConfig,
) {
    let to_camera = camera.translation - bike_position;
    let distance = to_camera.length();
    if distance <= EPS {
        return;
    }

    let step = ZOOM_STEP_BASE.powf(tuning.zoom_speed);
    let scale = if delta < 0.0 { step } else { 1.0 / step };
    let clamped =
        (distance * scale).clamp(tuning.min_look_distance, tuning.max_look_distance);

    camera.translation = bike_position + (to_camera / distance) * clamped;
    camera.look_at(bike_position, Vec3::Y);
}
