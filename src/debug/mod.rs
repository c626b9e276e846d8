use crate::config::{BikeConfig, GameConfig};
use crate::gameplay::bike::{BikeCommands, BikeTelemetry};
use crate::states::GameState;
use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};
use std::ops::RangeInclusive;

pub struct DebugOverlayPlugin;

impl Plugin for DebugOverlayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<OverlayState>()
            .init_resource::<BikeTuningPanelState>()
            .add_systems(Update, spawn_debug_overlay)
            .add_systems(Update, toggle_debug_overlay)
            .add_systems(Update, toggle_bike_tuning_panel)
            .add_systems(
                Update,
                update_debug_overlay_text
                    .run_if(in_state(GameState::InRun))
                    .run_if(resource_exists::<GameConfig>),
            )
            .add_systems(
                EguiPrimaryContextPass,
                bike_tuning_panel_ui
                    .run_if(in_state(GameState::InRun))
                    .run_if(resource_exists::<GameConfig>),
            );
    }
}

#[derive(Component)]
struct DebugOverlayText;

#[derive(Resource, Debug, Clone, Default)]
struct OverlayState {
    hidden: bool,
}

#[derive(Resource, Debug, Clone, Default)]
struct BikeTuningPanelState {
    visible: bool,
    source_bike_id: String,
    params: Option<BikeTuningParams>,
    status: String,
}

#[derive(Debug, Clone)]
struct BikeTuningParams {
    max_speed: f32,
    min_speed: f32,
    speed_up: f32,
    braking: f32,
    speed_down: f32,
    turn_angle_degrees: f32,
    hover_frequency: f32,
    hover_amplitude: f32,
    hover_distance: f32,
}

impl BikeTuningParams {
    fn from_bike(bike: &BikeConfig) -> Self {
        Self {
            max_speed: bike.max_speed,
            min_speed: bike.min_speed,
            speed_up: bike.speed_up,
            braking: bike.braking,
            speed_down: bike.speed_down,
            turn_angle_degrees: bike.turn_angle_degrees,
            hover_frequency: bike.hover_frequency,
            hover_amplitude: bike.hover_amplitude,
            hover_distance: bike.hover_distance,
        }
    }

    fn write_into(&self, bike: &mut BikeConfig) {
        bike.max_speed = self.max_speed;
        bike.min_speed = self.min_speed;
        bike.speed_up = self.speed_up;
        bike.braking = self.braking;
        bike.speed_down = self.speed_down;
        bike.turn_angle_degrees = self.turn_angle_degrees;
        bike.hover_frequency = self.hover_frequency;
        bike.hover_amplitude = self.hover_amplitude;
        bike.hover_distance = self.hover_distance;
    }
}

fn spawn_debug_overlay(
    mut commands: Commands,
    config: Option<Res<GameConfig>>,
    existing_overlay: Query<Entity, With<DebugOverlayText>>,
) {
    if !existing_overlay.is_empty() {
        return;
    }

    let Some(config) = config else {
        return;
    };

    if !config.game.app.debug_overlay {
        return;
    }

    commands.spawn((
        Name::new("DebugOverlayText"),
        DebugOverlayText,
        Text::new("debug overlay initializing..."),
        TextFont {
            font_size: 16.0,
            ..default()
        },
        TextColor(Color::srgb(0.92, 0.95, 0.97)),
        Node {
            position_type: PositionType::Absolute,
            top: Val::Px(8.0),
            left: Val::Px(8.0),
            ..default()
        },
    ));
}

fn toggle_debug_overlay(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut overlay_state: ResMut<OverlayState>,
    mut overlay_query: Query<&mut Visibility, With<DebugOverlayText>>,
) {
    if !keyboard.just_pressed(KeyCode::F1) {
        return;
    }

    overlay_state.hidden = !overlay_state.hidden;
    for mut visibility in &mut overlay_query {
        *visibility = if overlay_state.hidden {
            Visibility::Hidden
        } else {
            Visibility::Inherited
        };
    }
}

fn toggle_bike_tuning_panel(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut panel_state: ResMut<BikeTuningPanelState>,
) {
    if keyboard.just_pressed(KeyCode::F2) {
        panel_state.visible = !panel_state.visible;
    }
}

fn update_debug_overlay_text(
    diagnostics: Res<DiagnosticsStore>,
    telemetry: Res<BikeTelemetry>,
    commands_state: Res<BikeCommands>,
    mut overlay_query: Query<&mut Text, With<DebugOverlayText>>,
) {
    let Ok(mut text) = overlay_query.single_mut() else {
        return;
    };

    let fps = diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FPS)
        .and_then(|value| value.smoothed())
        .unwrap_or(0.0);

    let throttle = match (commands_state.accelerate, commands_state.decelerate) {
        (_, true) => "brake",
        (true, false) => "accel",
        _ => "coast",
    };

    text.0 = format!(
        "fps {fps:.0}\n\
speed {speed:.3}\n\
d2r {d2r:.2}\n\
height {height:.2}\n\
orbit {orbit:.2} rad\n\
throttle {throttle}\n\
pos ({x:.1}, {y:.1}, {z:.1})\n\
route dir ({rx:.2}, {rz:.2})\n\
F1 overlay | F2 tuning | F5 reload config",
        speed = telemetry.speed,
        d2r = telemetry.distance_to_route,
        height = telemetry.world_height,
        orbit = telemetry.orbit_angle,
        x = telemetry.position.x,
        y = telemetry.position.y,
        z = telemetry.position.z,
        rx = telemetry.route_direction.x,
        rz = telemetry.route_direction.z,
    );
}

fn bike_tuning_panel_ui(
    mut egui_contexts: EguiContexts,
    mut panel_state: ResMut<BikeTuningPanelState>,
    mut config: ResMut<GameConfig>,
) {
    if !panel_state.visible {
        return;
    }

    if panel_state.params.is_none() || panel_state.source_bike_id != config.game.app.starting_bike
    {
        let bike_id = config.game.app.starting_bike.clone();
        let Some(bike) = config.bikes_by_id.get(&bike_id) else {
            panel_state.status = format!("bike `{bike_id}` missing from config");
            return;
        };
        panel_state.params = Some(BikeTuningParams::from_bike(bike));
        panel_state.source_bike_id = bike_id;
        panel_state.status.clear();
    }

    let Some(mut params) = panel_state.params.clone() else {
        return;
    };

    let mut window_open = panel_state.visible;
    let mut reload_clicked = false;
    let mut apply_clicked = false;
    let bike_id = panel_state.source_bike_id.clone();
    let status = panel_state.status.clone();

    let Ok(ctx) = egui_contexts.ctx_mut() else {
        return;
    };
    egui::Window::new("Bike Tuning")
        .open(&mut window_open)
        .resizable(true)
        .default_width(420.0)
        .show(ctx, |ui| {
            ui.label(format!("Active bike: {bike_id}"));
            ui.separator();

            ui.collapsing("Speed Curve", |ui| {
                tuning_slider_row(ui, "max_speed", &mut params.max_speed, 0.001..=0.2);
                tuning_slider_row(ui, "min_speed", &mut params.min_speed, 0.0..=0.05);
                tuning_slider_row(ui, "speed_up", &mut params.speed_up, 1.0..=30.0);
                tuning_slider_row(ui, "braking", &mut params.braking, 1.0..=30.0);
                tuning_slider_row(ui, "speed_down", &mut params.speed_down, 1.0..=30.0);
            });

            ui.collapsing("Steering + Hover", |ui| {
                tuning_slider_row(
                    ui,
                    "turn_angle_degrees",
                    &mut params.turn_angle_degrees,
                    0.1..=10.0,
                );
                tuning_slider_row(
                    ui,
                    "hover_frequency",
                    &mut params.hover_frequency,
                    0.0001..=0.01,
                );
                tuning_slider_row(ui, "hover_amplitude", &mut params.hover_amplitude, 0.0..=2.0);
                tuning_slider_row(ui, "hover_distance", &mut params.hover_distance, 0.0..=6.0);
            });

            ui.separator();
            ui.horizontal(|ui| {
                apply_clicked = ui.button("Apply to running game").clicked();
                reload_clicked = ui.button("Reload from config").clicked();
            });
            if !status.is_empty() {
                ui.label(status);
            }
        });

    if reload_clicked {
        panel_state.params = None;
        panel_state.visible = window_open;
        return;
    }

    if apply_clicked {
        if let Some(bike) = config.bikes_by_id.get_mut(&bike_id) {
            params.write_into(bike);
        }
        if let Some(row) = config.bikes.bikes.iter_mut().find(|row| row.id == bike_id) {
            params.write_into(row);
        }
        panel_state.status = format!("applied tuning to `{bike_id}`");
        info!("Applied debug tuning to bike `{bike_id}`.");
    }

    panel_state.params = Some(params);
    panel_state.visible = window_open;
}

fn tuning_slider_row(
    ui: &mut egui::Ui,
    label: &str,
    value: &mut f32,
    range: RangeInclusive<f32>,
) -> bool {
    ui.horizontal(|ui| {
        let slider = ui.add(egui::Slider::new(value, range).text(label));
        slider.changed()
    })
    .inner
}
