pub mod describe;
pub mod doctor;
pub mod leaderboard;
pub mod list;
pub mod play;
pub mod profile;
pub mod stats;
pub mod submit;
pub mod sync;
