pub mod compose;
pub mod config;
pub mod error;
pub mod events;
pub mod guard;
pub mod navigation;
pub mod rotation;
pub mod settings;
pub mod slide;
pub mod source;
pub mod store;
pub mod tasks {
    pub mod files;
    pub mod input;
    pub mod manager;
    pub mod viewer;
}
