use crate::config::{GameConfig, TrackConfig};
use bevy::prelude::*;

const REFINE_PASSES: usize = 3;
const REFINE_SAMPLES: i32 = 8;

pub struct TrackPlugin;

impl Plugin for TrackPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            sync_track_from_config.run_if(resource_exists::<GameConfig>),
        );
    }
}

fn sync_track_from_config(mut commands: Commands, config: Res<GameConfig>) {
    if !config.is_changed() {
        return;
    }

    commands.insert_resource(Track::from_config(&config.game.track));
}

/// Result of querying the track surface at a world position. Recomputed
/// fresh on every query; the motion core retains at most one previous
/// sample for continuity.
#[derive(Debug, Clone, Copy)]
pub struct TrackSample {
    pub distance_to_route: f32,
    pub route_point: Vec3,
    pub sampled_height: f32,
    pub route_half_width: f32,
    pub route_direction: Vec3,
}

/// Query contract the simulation consumes. Implementations must be pure
/// functions of position and return finite values for finite inputs.
pub trait TrackSampler {
    fn sample_nearest(&self, position: Vec3) -> TrackSample;
}

/// Procedurally sampled track: a sum-of-sines heightfield with a
/// sinusoidal route centerline winding toward -z.
#[derive(Resource, Debug, Clone)]
pub struct Track {
    base_height: f32,
    wave_a_amplitude: f32,
    wave_a_frequency: f32,
    wave_b_amplitude: f32,
    wave_b_frequency: f32,
    route_curve_amplitude: f32,
    route_curve_frequency: f32,
    route_half_width: f32,
    route_elevation_bias: f32,
}

impl Track {
    pub fn from_config(track: &TrackConfig) -> Self {
        Self {
            base_height: track.base_height,
            wave_a_amplitude: track.wave_a_amplitude,
            wave_a_frequency: track.wave_a_frequency,
            wave_b_amplitude: track.wave_b_amplitude,
            wave_b_frequency: track.wave_b_frequency,
            route_curve_amplitude: track.route_curve_amplitude,
            route_curve_frequency: track.route_curve_frequency,
            route_half_width: track.route_width * 0.5,
            route_elevation_bias: track.route_elevation_bias,
        }
    }

    pub fn route_half_width(&self) -> f32 {
        self.route_half_width
    }

    /// Raw terrain height under `(x, z)`. Negative values are underwater.
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        self.base_height
            + (x * self.wave_a_frequency).sin() * self.wave_a_amplitude
            + (z * self.wave_b_frequency).sin() * self.wave_b_amplitude
    }

    /// Centerline point at arc parameter `s` (meters driven toward -z).
    /// The route surface never dips below water level.
    pub fn route_point_at(&self, s: f32) -> Vec3 {
        let x = (s * self.route_curve_frequency).sin() * self.route_curve_amplitude;
        let z = -s;
        let y = self.height_at(x, z).max(0.0) + self.route_elevation_bias;
        Vec3::new(x, y, z)
    }

    /// Horizontal unit tangent of the centerline at `s`.
    pub fn route_direction_at(&self, s: f32) -> Vec3 {
        let ds = 0.5;
        let mut direction = self.route_point_at(s + ds) - self.route_point_at(s - ds);
        direction.y = 0.0;
        let direction = direction.normalize_or_zero();
        if direction.length_squared() > 0.0 {
            direction
        } else {
            Vec3::NEG_Z
        }
    }

    fn horizontal_distance_to_route(&self, position: Vec3, s: f32) -> f32 {
        let route_point = self.route_point_at(s);
        let dx = position.x - route_point.x;
        let dz = position.z - route_point.z;
        (dx * dx + dz * dz).sqrt()
    }
}

impl TrackSampler for Track {
    fn sample_nearest(&self, position: Vec3) -> TrackSample {
        // The centerline never folds back on itself, so the query's z
        // seeds the parameter and a shrinking window refines it.
        let mut best_s = -position.z;
        let mut best_distance = self.horizontal_distance_to_route(position, best_s);
        let mut window = (self.route_curve_amplitude + self.route_half_width).max(1.0);

        for _ in 0..REFINE_PASSES {
            let center = best_s;
            for step in -REFINE_SAMPLES..=REFINE_SAMPLES {
                let s = center + window * (step as f32 / REFINE_SAMPLES as f32);
                let distance = self.horizontal_distance_to_route(position, s);
                if distance < best_distance {
                    best_distance = distance;
                    best_s = s;
                }
            }
            window *= 0.25;
        }

        TrackSample {
            distance_to_route: best_distance,
            route_point: self.route_point_at(best_s),
            sampled_height: self.height_at(position.x, position.z),
            route_half_width: self.route_half_width,
            route_direction: self.route_direction_at(best_s),
        }
    }
}
