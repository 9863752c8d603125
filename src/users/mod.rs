#[cfg(test)]
pub mod memory;
pub mod manager;
pub mod model;
pub mod repo;

pub use manager::UserManager;
pub use model::{ExtraFields, User};
