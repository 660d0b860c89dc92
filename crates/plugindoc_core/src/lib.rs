pub mod config;
pub mod confluence;
pub mod descriptor;
pub mod directory;
pub mod error;
pub mod markup;
pub mod render;
pub mod session;
pub mod sync;

#[cfg(test)]
mod memory;
