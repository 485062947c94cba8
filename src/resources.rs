use std::path::PathBuf;

use bevy::prelude::*;

#[derive(Resource, Debug)]
pub struct Lives(pub u32);

/// Level file loaded on entering `AppState::Loading`.
#[derive(Resource, Debug, Clone)]
pub struct LevelSource(pub PathBuf);

impl Default for LevelSource {
    fn default() -> Self {
        Self(PathBuf::from("assets/levels/level_01.txt"))
    }
}

// ---------------------------------------------------------------------------
// Game stats
// ---------------------------------------------------------------------------

#[derive(Resource, Debug, Default)]
pub struct GameStats {
    pub deaths: u32,
    /// Replans that installed a new route.
    pub routes_installed: u64,
    /// Replans whose search found no route.
    pub routes_missing: u64,
}
