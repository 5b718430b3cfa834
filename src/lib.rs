pub use utils::{Changes, Pos};
mod utils;

pub use world::{Cell, Grid};
mod world;

pub use error::{Error, Result};
pub mod error;

pub use config::SimConfig;
pub mod config;

pub use sim::{Event, RunState, Sim, SimHandle, Watch};
mod sim;
