pub mod error;
pub mod observer;
pub mod settings;
pub mod uuid;
