#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
pub mod clock;
pub mod constraint;
pub mod loader;
pub mod model;
pub mod validation;
