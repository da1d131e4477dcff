pub mod config;
pub mod error;
pub mod images;
pub mod logging;
pub mod platform {
    pub mod command;
    pub mod display;
}
pub mod resolver;
pub mod rotation;
pub mod selector;
pub mod state;
