use super::*;

pub(super) fn apply_bike_kinematics(
    time: Res<Time>,
    config: Res<GameConfig>,
    track: Res<Track>,
    commands_state: Res<BikeCommands>,
    mut bike_query: Query<(&mut Transform, &mut BikeState), With<PlayerBike>>,
) {
    let Ok((mut transform, mut state)) = bike_query.single_mut() else {
        return;
    };
    let Some(bike) = config.bikes_by_id.get(&config.game.app.starting_bike) else {
        return;
    };

    step_bike(
        &mut transform,
        &mut state,
        &commands_state,
        bike,
        track.as_ref(),
        time.delta_secs(),
    );
}

/// One full simulation tick: speed, rotation, and height sub-steps in
/// order, then the sample handover. A non-positive `dt` is a no-op tick.
pub(super) fn step_bike(
    transform: &mut Transform,
    state: &mut BikeState,
    commands: &BikeCommands,
    tuning: &BikeConfig,
    track: &impl TrackSampler,
    dt: f32,
) {
    if dt <= 0.0 {
        return;
    }

    update_turn_rate(state, commands, tuning);
    update_speed(transform, state, commands, tuning, track, dt);
    update_rotation(transform, state);
    update_height(transform, state, tuning, dt);

    state.previous_sample = state.sample;
}

fn update_turn_rate(state: &mut BikeState, commands: &BikeCommands, tuning: &BikeConfig) {
    state.turn_rate = if commands.turn_left && !commands.turn_right {
        tuning.turn_angle_degrees
    } else if commands.turn_right && !commands.turn_left {
        -tuning.turn_angle_degrees
    } else {
        0.0
    };
}

fn update_speed(
    transform: &mut Transform,
    state: &mut BikeState,
    commands: &BikeCommands,
    tuning: &BikeConfig,
    track: &impl TrackSampler,
    dt: f32,
) {
    // The tuning constants are calibrated against a millisecond dt.
    let max_speed = tuning.max_speed * dt * 1000.0;
    let min_speed = tuning.min_speed * dt * 1000.0;
    if state.ceiling < max_speed {
        state.ceiling = max_speed;
    }

    let accel = state.ceiling / tuning.speed_up;
    let brake = state.ceiling / tuning.braking;
    let decel = state.ceiling / tuning.speed_down;

    // Decelerate wins when both speed commands are held.
    let accelerating = commands.accelerate && !commands.decelerate;
    if accelerating {
        state.speed = (state.speed + accel).min(state.ceiling);
    } else if commands.decelerate {
        state.speed = (state.speed - brake).max(0.0);
    } else {
        state.speed = (state.speed - decel).max(0.0);
        // Coasting resets the ramp; the next acceleration starts over.
        state.ceiling = 0.0;
    }

    if state.speed <= 0.0 {
        return;
    }

    let forward = transform.forward().as_vec3();
    let step = forward * state.speed;
    let candidate = Vec3::new(
        transform.translation.x + step.x,
        transform.translation.y,
        transform.translation.z + step.z,
    );

    let sample = track.sample_nearest(candidate);
    state.speed *= confinement_factor(sample.distance_to_route, sample.route_half_width);
    if accelerating && state.speed < min_speed {
        state.speed = min_speed;
    }

    let step = forward.normalize_or_zero() * state.speed;
    transform.translation.x += step.x;
    transform.translation.z += step.z;

    state.sample = sample;
}

/// Lateral confinement response: 1 on the centerline, easing to 0 exactly
/// at the route half-width. A degenerate half-width saturates to 0.
pub(super) fn confinement_factor(distance_to_route: f32, route_half_width: f32) -> f32 {
    if route_half_width <= EPS {
        return 0.0;
    }
    1.0 - easing::in_quint((distance_to_route / route_half_width).clamp(0.0, 1.0))
}

fn update_rotation(transform: &mut Transform, state: &BikeState) {
    if state.turn_rate != 0.0 {
        // Post-multiplied, so held keys compound the turn tick by tick.
        transform.rotate_local_y(state.turn_rate.to_radians());
    }
}

fn update_height(transform: &mut Transform, state: &mut BikeState, tuning: &BikeConfig, dt: f32) {
    state.timer += dt;

    let sample = &state.sample;
    state.cur_world_height = if sample.sampled_height < 0.0 {
        // Underwater terrain floors at water level.
        0.0
    } else if sample.sampled_height < sample.route_point.y {
        sample.route_point.y
    } else {
        sample.sampled_height
    };

    let hover = easing::unit_sine(state.timer * 1000.0, tuning.hover_frequency)
        * tuning.hover_amplitude
        + tuning.hover_distance;
    transform.translation.y = state.cur_world_height + hover;
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 0.016;

    fn fixture_tuning() -> BikeConfig {
        BikeConfig {
            id: "test_bike".to_string(),
            max_speed: 0.02,
            min_speed: 0.004,
            speed_up: 4.0,
            braking: 2.0,
            speed_down: 6.0,
            turn_angle_degrees: 2.0,
            hover_frequency: 0.001,
            hover_amplitude: 0.25,
            hover_distance: 1.4,
        }
    }

    /// Sampler with a fixed lateral offset and terrain profile, enough to
    /// steer every branch of the motion update from tests.
    struct StubTrack {
        distance_to_route: f32,
        route_y: f32,
        sampled_height: f32,
        half_width: f32,
    }

    impl StubTrack {
        fn centered() -> Self {
            Self {
                distance_to_route: 0.0,
                route_y: 0.0,
                sampled_height: 0.0,
                half_width: 7.0,
            }
        }
    }

    impl TrackSampler for StubTrack {
        fn sample_nearest(&self, position: Vec3) -> TrackSample {
            TrackSample {
                distance_to_route: self.distance_to_route,
                route_point: Vec3::new(position.x, self.route_y, position.z),
                sampled_height: self.sampled_height,
                route_half_width: self.half_width,
                route_direction: Vec3::NEG_Z,
            }
        }
    }

    fn fixture_state(track: &impl TrackSampler) -> (Transform, BikeState) {
        let transform = Transform::default();
        let state = BikeState::at_spawn(track, transform.translation);
        (transform, state)
    }

    fn commands(accelerate: bool, decelerate: bool) -> BikeCommands {
        BikeCommands {
            turn_left: false,
            turn_right: false,
            accelerate,
            decelerate,
        }
    }

    #[test]
    fn first_accelerate_tick_matches_ramp_curve() {
        let track = StubTrack::centered();
        let tuning = fixture_tuning();
        let (mut transform, mut state) = fixture_state(&track);

        step_bike(
            &mut transform,
            &mut state,
            &commands(true, false),
            &tuning,
            &track,
            DT,
        );

        // ceiling = 0.02 * 0.016 * 1000 = 0.32, accel = 0.32 / 4 = 0.08
        assert!((state.ceiling - 0.32).abs() < 1e-6);
        assert!((state.speed - 0.08).abs() < 1e-6);
        // Default heading is -z, so the displacement lands on z.
        assert!((transform.translation.z + 0.08).abs() < 1e-6);
        assert_eq!(transform.translation.x, 0.0);
    }

    #[test]
    fn speed_stays_within_ceiling_while_accelerating() {
        let track = StubTrack::centered();
        let tuning = fixture_tuning();
        let (mut transform, mut state) = fixture_state(&track);

        for _ in 0..200 {
            step_bike(
                &mut transform,
                &mut state,
                &commands(true, false),
                &tuning,
                &track,
                DT,
            );
            assert!(state.speed >= 0.0);
            assert!(state.speed <= state.ceiling + 1e-6);
        }
        assert!((state.speed - state.ceiling).abs() < 1e-6);
    }

    #[test]
    fn coasting_resets_the_ceiling() {
        let track = StubTrack::centered();
        let tuning = fixture_tuning();
        let (mut transform, mut state) = fixture_state(&track);

        for _ in 0..5 {
            step_bike(
                &mut transform,
                &mut state,
                &commands(true, false),
                &tuning,
                &track,
                DT,
            );
        }
        step_bike(
            &mut transform,
            &mut state,
            &commands(false, false),
            &tuning,
            &track,
            DT,
        );
        assert_eq!(state.ceiling, 0.0);

        let speed_before = state.speed;
        step_bike(
            &mut transform,
            &mut state,
            &commands(true, false),
            &tuning,
            &track,
            DT,
        );
        // The ramp restarts from the per-tick ceiling, not the old one.
        assert!((state.ceiling - 0.32).abs() < 1e-6);
        assert!((state.speed - (speed_before + 0.08).min(0.32)).abs() < 1e-6);
    }

    #[test]
    fn decelerate_wins_over_accelerate() {
        let track = StubTrack::centered();
        let tuning = fixture_tuning();
        let (mut transform, mut state) = fixture_state(&track);

        for _ in 0..5 {
            step_bike(
                &mut transform,
                &mut state,
                &commands(true, false),
                &tuning,
                &track,
                DT,
            );
        }
        let speed_before = state.speed;
        step_bike(
            &mut transform,
            &mut state,
            &commands(true, true),
            &tuning,
            &track,
            DT,
        );
        assert!(state.speed < speed_before);
    }

    #[test]
    fn confinement_factor_hits_both_rails() {
        assert!((confinement_factor(0.0, 7.0) - 1.0).abs() < 1e-6);
        assert_eq!(confinement_factor(7.0, 7.0), 0.0);
        assert_eq!(confinement_factor(12.0, 7.0), 0.0);
        assert_eq!(confinement_factor(1.0, 0.0), 0.0);
    }

    #[test]
    fn accelerating_holds_the_minimum_speed_through_damping() {
        let track = StubTrack {
            // One sample shy of the boundary damps speed close to zero.
            distance_to_route: 6.95,
            route_y: 0.0,
            sampled_height: 0.0,
            half_width: 7.0,
        };
        let tuning = fixture_tuning();
        let (mut transform, mut state) = fixture_state(&track);

        step_bike(
            &mut transform,
            &mut state,
            &commands(true, false),
            &tuning,
            &track,
            DT,
        );

        let min_speed = tuning.min_speed * DT * 1000.0;
        assert!((state.speed - min_speed).abs() < 1e-6);
    }

    #[test]
    fn underwater_terrain_floors_height_at_water_level() {
        let track = StubTrack {
            distance_to_route: 0.0,
            route_y: 2.0,
            sampled_height: -1.0,
            half_width: 7.0,
        };
        let tuning = fixture_tuning();
        let (mut transform, mut state) = fixture_state(&track);

        step_bike(
            &mut transform,
            &mut state,
            &commands(true, false),
            &tuning,
            &track,
            DT,
        );
        assert_eq!(state.cur_world_height, 0.0);
    }

    #[test]
    fn terrain_below_route_snaps_to_route_surface() {
        let track = StubTrack {
            distance_to_route: 0.0,
            route_y: 2.0,
            sampled_height: 0.5,
            half_width: 7.0,
        };
        let tuning = fixture_tuning();
        let (mut transform, mut state) = fixture_state(&track);

        step_bike(
            &mut transform,
            &mut state,
            &commands(true, false),
            &tuning,
            &track,
            DT,
        );
        assert_eq!(state.cur_world_height, 2.0);
    }

    #[test]
    fn terrain_above_route_is_followed() {
        let track = StubTrack {
            distance_to_route: 0.0,
            route_y: 2.0,
            sampled_height: 3.5,
            half_width: 7.0,
        };
        let tuning = fixture_tuning();
        let (mut transform, mut state) = fixture_state(&track);

        step_bike(
            &mut transform,
            &mut state,
            &commands(true, false),
            &tuning,
            &track,
            DT,
        );
        assert_eq!(state.cur_world_height, 3.5);
    }

    #[test]
    fn hover_oscillates_around_the_rest_height() {
        let track = StubTrack::centered();
        let tuning = fixture_tuning();
        let (mut transform, mut state) = fixture_state(&track);
        let neutral = commands(false, false);

        // hover_frequency 0.001 over scaled ms gives a 1 s period; a
        // quarter period puts the phase on the positive crest.
        step_bike(&mut transform, &mut state, &neutral, &tuning, &track, 0.25);
        let crest = tuning.hover_distance + tuning.hover_amplitude;
        assert!((transform.translation.y - crest).abs() < 1e-3);

        // One full period later the phase is back on the crest.
        step_bike(&mut transform, &mut state, &neutral, &tuning, &track, 1.0);
        assert!((transform.translation.y - crest).abs() < 1e-3);

        // Half a period from the crest is the trough.
        step_bike(&mut transform, &mut state, &neutral, &tuning, &track, 0.5);
        let trough = tuning.hover_distance - tuning.hover_amplitude;
        assert!((transform.translation.y - trough).abs() < 1e-3);
    }

    #[test]
    fn non_positive_dt_is_a_no_op_tick() {
        let track = StubTrack::centered();
        let tuning = fixture_tuning();
        let (mut transform, mut state) = fixture_state(&track);

        for dt in [0.0, -0.016] {
            step_bike(
                &mut transform,
                &mut state,
                &commands(true, false),
                &tuning,
                &track,
                dt,
            );
            assert_eq!(state.speed, 0.0);
            assert_eq!(state.timer, 0.0);
            assert_eq!(transform.translation, Vec3::ZERO);
        }
    }

    #[test]
    fn held_turn_key_compounds_the_heading() {
        let track = StubTrack::centered();
        let tuning = fixture_tuning();
        let (mut transform, mut state) = fixture_state(&track);
        let left_turn = BikeCommands {
            turn_left: true,
            turn_right: false,
            accelerate: false,
            decelerate: false,
        };

        for _ in 0..3 {
            step_bike(&mut transform, &mut state, &left_turn, &tuning, &track, DT);
        }

        let (yaw, _, _) = transform.rotation.to_euler(EulerRot::YXZ);
        assert!((yaw - (3.0 * tuning.turn_angle_degrees).to_radians()).abs() < 1e-4);

        // Releasing the key zeroes the request and holds the heading.
        step_bike(
            &mut transform,
            &mut state,
            &commands(false, false),
            &tuning,
            &track,
            DT,
        );
        assert_eq!(state.turn_rate, 0.0);
        let (held_yaw, _, _) = transform.rotation.to_euler(EulerRot::YXZ);
        assert!((held_yaw - yaw).abs() < 1e-6);
    }
}
