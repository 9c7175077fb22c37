pub mod config;
pub mod cycler;
pub mod error;
pub mod events;
pub mod sequence;
pub mod surface;
pub mod tasks {
    pub mod controls;
    pub mod files;
    pub mod loader;
    pub mod player;
    pub mod supervisor;
}

pub use error::Error;
