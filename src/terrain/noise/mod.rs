pub mod noise_parameters;
pub mod noise_manager;
pub mod noise_utils;

pub use noise_parameters::{LayerBlend, NoiseLayer};
pub use noise_manager::LayeredNoise;
