//! Domain types for StopLab

pub mod bar;

pub use bar::Bar;
