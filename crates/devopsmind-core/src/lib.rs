pub mod config;
pub mod doctor;
pub mod engine;
pub mod error;
pub mod io;
pub mod leaderboard;
pub mod ledger;
pub mod paths;
pub mod profile;
pub mod queue;
pub mod rank;
pub mod registry;
pub mod relay;
pub mod session;
pub mod store;
pub mod types;
pub mod validator;
pub mod workspace;

pub use error::{DevopsmindError, Result};
