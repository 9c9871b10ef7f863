#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
pub mod decode;
pub mod engine;
pub mod schedule;
