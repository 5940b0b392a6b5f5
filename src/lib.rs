pub mod api;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod occupancy;
pub mod slots;
pub mod state;
