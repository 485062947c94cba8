pub mod camera;
pub mod debug_overlay;
pub mod game_over;
pub mod level;
pub mod player;
pub mod pursuit;
pub mod telemetry;
