pub mod build;
pub mod repositories;
pub mod variants;
pub mod verify;
pub mod wiring;
