use bevy::prelude::*;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = "config";

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, load_game_config)
            .add_systems(Update, reload_game_config_hotkey);
    }
}

fn load_game_config(mut commands: Commands) {
    let config = GameConfig::load_from_dir(Path::new(CONFIG_DIR)).unwrap_or_else(|error| {
        panic!("failed to load configuration from `{CONFIG_DIR}`: {error}");
    });

    log_config_summary("Loaded", &config);
    info!("Press F5 to hot-reload config files from `{CONFIG_DIR}`.");

    commands.insert_resource(config);
}

fn reload_game_config_hotkey(
    keyboard: Res<ButtonInput<KeyCode>>,
    game_config: Option<ResMut<GameConfig>>,
) {
    if !keyboard.just_pressed(KeyCode::F5) {
        return;
    }

    let Some(mut current_config) = game_config else {
        warn!("Config hot-reload requested, but `GameConfig` resource is not initialized yet.");
        return;
    };

    match GameConfig::load_from_dir(Path::new(CONFIG_DIR)) {
        Ok(new_config) => {
            *current_config = new_config;
            log_config_summary("Hot-reloaded", &current_config);
        }
        Err(error) => {
            error!("Config hot-reload failed; keeping previous config: {error}");
        }
    }
}

fn log_config_summary(prefix: &str, config: &GameConfig) {
    info!(
        "{prefix} config: {} bikes, starting bike `{}`, route width {:.1}.",
        config.bikes_by_id.len(),
        config.game.app.starting_bike,
        config.game.track.route_width
    );
}

#[derive(Resource, Debug, Clone)]
pub struct GameConfig {
    pub game: GameFile,
    pub bikes: BikesFile,
    pub bikes_by_id: HashMap<String, BikeConfig>,
}

impl GameConfig {
    pub fn load_from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        let game: GameFile = read_toml(&config_dir.join("game.toml"))?;
        let bikes: BikesFile = read_toml(&config_dir.join("bikes.toml"))?;

        let config = Self {
            bikes_by_id: to_index("bikes.toml::bikes", &bikes.bikes)?,
            game,
            bikes,
        };

        config.validate_references()?;
        Ok(config)
    }

    fn validate_references(&self) -> Result<(), ConfigError> {
        if !self.bikes_by_id.contains_key(&self.game.app.starting_bike) {
            return Err(ConfigError::Validation(format!(
                "game.toml::app.starting_bike references unknown bike id `{}`",
                self.game.app.starting_bike
            )));
        }

        for (index, bike) in self.bikes.bikes.iter().enumerate() {
            if bike.max_speed <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "bikes.toml::bikes[{index}].max_speed must be > 0"
                )));
            }
            if bike.min_speed < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "bikes.toml::bikes[{index}].min_speed must be >= 0"
                )));
            }
            if bike.min_speed >= bike.max_speed {
                return Err(ConfigError::Validation(format!(
                    "bikes.toml::bikes[{index}].min_speed must be < max_speed"
                )));
            }
            if bike.speed_up < 1.0 || bike.braking < 1.0 || bike.speed_down < 1.0 {
                return Err(ConfigError::Validation(format!(
                    "bikes.toml::bikes[{index}] speed_up/braking/speed_down must be >= 1"
                )));
            }
            if bike.turn_angle_degrees <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "bikes.toml::bikes[{index}].turn_angle_degrees must be > 0"
                )));
            }
            if bike.hover_frequency <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "bikes.toml::bikes[{index}].hover_frequency must be > 0"
                )));
            }
            if bike.hover_amplitude < 0.0 || bike.hover_distance < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "bikes.toml::bikes[{index}] hover_amplitude/hover_distance must be >= 0"
                )));
            }
        }

        let track = &self.game.track;
        if track.route_width <= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::track.route_width must be > 0".to_string(),
            ));
        }
        if track.wave_a_frequency < 0.0 || track.wave_b_frequency < 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::track wave frequencies must be >= 0".to_string(),
            ));
        }
        if track.route_curve_frequency < 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::track.route_curve_frequency must be >= 0".to_string(),
            ));
        }

        let camera = &self.game.camera;
        if camera.look_distance <= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::camera.look_distance must be > 0".to_string(),
            ));
        }
        if camera.height_distance < 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::camera.height_distance must be >= 0".to_string(),
            ));
        }
        if camera.min_look_distance <= 0.0 || camera.max_look_distance <= camera.min_look_distance {
            return Err(ConfigError::Validation(
                "game.toml::camera look distance range is invalid (0 < min < max)".to_string(),
            ));
        }
        if camera.zoom_speed <= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::camera.zoom_speed must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: Box<toml::de::Error>,
    },
    Validation(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse `{}`: {source}", path.display())
            }
            Self::Validation(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

fn to_index<T>(label: &str, rows: &[T]) -> Result<HashMap<String, T>, ConfigError>
where
    T: HasId + Clone,
{
    let mut map = HashMap::new();

    for row in rows {
        let id = row.id();
        if id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{label} contains an empty id"
            )));
        }

        if map.insert(id.to_string(), row.clone()).is_some() {
            return Err(ConfigError::Validation(format!(
                "{label} contains duplicate id `{id}`"
            )));
        }
    }

    Ok(map)
}

trait HasId {
    fn id(&self) -> &str;
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameFile {
    pub app: AppConfig,
    pub track: TrackConfig,
    pub camera: CameraConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub starting_bike: String,
    pub debug_overlay: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackConfig {
    pub base_height: f32,
    pub wave_a_amplitude: f32,
    pub wave_a_frequency: f32,
    pub wave_b_amplitude: f32,
    pub wave_b_frequency: f32,
    pub route_curve_amplitude: f32,
    pub route_curve_frequency: f32,
    pub route_width: f32,
    pub route_elevation_bias: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    pub look_distance: f32,
    pub height_distance: f32,
    pub min_look_distance: f32,
    pub max_look_distance: f32,
    pub zoom_speed: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BikesFile {
    pub bikes: Vec<BikeConfig>,
}

/// Tuning table for one bike. `max_speed`/`min_speed` are tuned for a
/// millisecond-scaled dt; the per-tick ceiling is `max_speed * dt * 1000`.
#[derive(Debug, Clone, Deserialize)]
pub struct BikeConfig {
    pub id: String,
    pub max_speed: f32,
    pub min_speed: f32,
    pub speed_up: f32,
    pub braking: f32,
    pub speed_down: f32,
    pub turn_angle_degrees: f32,
    pub hover_frequency: f32,
    pub hover_amplitude: f32,
    pub hover_distance: f32,
}

impl HasId for BikeConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_bike(id: &str) -> BikeConfig {
        BikeConfig {
            id: id.to_string(),
            max_speed: 0.02,
            min_speed: 0.004,
            speed_up: 4.0,
            braking: 2.0,
            speed_down: 6.0,
            turn_angle_degrees: 2.0,
            hover_frequency: 0.0012,
            hover_amplitude: 0.25,
            hover_distance: 1.4,
        }
    }

    fn fixture_config(starting_bike: &str, bikes: Vec<BikeConfig>) -> GameConfig {
        let bikes_by_id = bikes
            .iter()
            .map(|bike| (bike.id.clone(), bike.clone()))
            .collect();
        GameConfig {
            game: GameFile {
                app: AppConfig {
                    starting_bike: starting_bike.to_string(),
                    debug_overlay: true,
                },
                track: TrackConfig {
                    base_height: -2.5,
                    wave_a_amplitude: 4.0,
                    wave_a_frequency: 0.021,
                    wave_b_amplitude: 1.6,
                    wave_b_frequency: 0.047,
                    route_curve_amplitude: 26.0,
                    route_curve_frequency: 0.008,
                    route_width: 14.0,
                    route_elevation_bias: 0.4,
                },
                camera: CameraConfig {
                    look_distance: 9.0,
                    height_distance: 1.0,
                    min_look_distance: 4.0,
                    max_look_distance: 50.0,
                    zoom_speed: 1.0,
                },
            },
            bikes: BikesFile {
                bikes: bikes.clone(),
            },
            bikes_by_id,
        }
    }

    #[test]
    fn validation_fails_for_missing_bike_reference() {
        let config = fixture_config("missing_bike", vec![fixture_bike("hoverbike_mk1")]);

        let error = config
            .validate_references()
            .expect_err("validation should fail");
        let message = error.to_string();

        assert!(message.contains("starting_bike"));
        assert!(message.contains("missing_bike"));
    }

    #[test]
    fn validation_rejects_min_speed_at_or_above_max() {
        let mut bike = fixture_bike("hoverbike_mk1");
        bike.min_speed = bike.max_speed;
        let config = fixture_config("hoverbike_mk1", vec![bike]);

        let error = config
            .validate_references()
            .expect_err("validation should fail");
        assert!(error.to_string().contains("min_speed"));
    }

    #[test]
    fn validation_rejects_inverted_camera_range() {
        let mut config = fixture_config("hoverbike_mk1", vec![fixture_bike("hoverbike_mk1")]);
        config.game.camera.max_look_distance = config.game.camera.min_look_distance;

        let error = config
            .validate_references()
            .expect_err("validation should fail");
        assert!(error.to_string().contains("look distance range"));
    }

    #[test]
    fn validation_accepts_fixture() {
        let config = fixture_config("hoverbike_mk1", vec![fixture_bike("hoverbike_mk1")]);
        config.validate_references().expect("fixture is valid");
    }
}
