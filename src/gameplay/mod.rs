pub mod bike;
pub mod easing;
pub mod track;

use bevy::prelude::*;
use bike::BikeGameplayPlugin;
use track::TrackPlugin;

pub struct GameplayPlugin;

impl Plugin for GameplayPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(TrackPlugin).add_plugins(BikeGameplayPlugin);
    }
}
