// src/terrain/noise/noise_manager.rs
use serde::{Deserialize, Serialize};

use crate::core::error::{WorldError, WorldResult};
use crate::terrain::noise::noise_parameters::{LayerBlend, NoiseLayer};
use crate::terrain::noise::noise_utils::lerp;

pub const HARD_FLOOR_RANGE: (f32, f32) = (0.0, 128.0);

/// Ordered stack of noise layers combined into one scalar field.
///
/// Layers fold in append order: `Add` layers add `unit * strength`,
/// `Multiply` layers scale the running value by `unit * strength`. With the
/// hard floor enabled, any combined value below `hard_floor_height` is pulled
/// toward it by `hard_floor_strength / (1 + hard_floor_strength)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayeredNoise {
    layers: Vec<NoiseLayer>,
    pub hard_floor: bool,
    pub hard_floor_height: f32,
    pub hard_floor_strength: f32,
}

impl Default for LayeredNoise {
    fn default() -> Self {
        LayeredNoise {
            layers: Vec::new(),
            hard_floor: false,
            hard_floor_height: 8.0,
            hard_floor_strength: 1.0,
        }
    }
}

impl LayeredNoise {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layer(mut self, layer: NoiseLayer) -> Self {
        self.add_layer(layer);
        self
    }

    pub fn with_hard_floor(mut self, height: f32, strength: f32) -> Self {
        self.hard_floor = true;
        self.hard_floor_height = height;
        self.hard_floor_strength = strength;
        self
    }

    pub fn add_layer(&mut self, layer: NoiseLayer) {
        self.layers.push(layer);
    }

    pub fn layers(&self) -> &[NoiseLayer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [NoiseLayer] {
        &mut self.layers
    }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut NoiseLayer> {
        self.layers.get_mut(index)
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    // Combined value with the hard floor applied
    pub fn sample(&self, world_x: f32, world_z: f32) -> f32 {
        let raw = self.fold(|layer| layer.sample_unit(world_x, world_z));
        self.apply_hard_floor(raw)
    }

    // Combined value divided by the field's maximum amplitude, in [0, 1]
    pub fn normalized(&self, world_x: f32, world_z: f32) -> f32 {
        let amplitude = self.max_amplitude();
        if amplitude <= 0.0 {
            return 0.0;
        }
        (self.sample(world_x, world_z) / amplitude).clamp(0.0, 1.0)
    }

    // The value the fold reaches when every layer samples its maximum
    pub fn max_amplitude(&self) -> f32 {
        self.fold(|_| 1.0)
    }

    fn fold<F>(&self, unit: F) -> f32
    where
        F: Fn(&NoiseLayer) -> f32,
    {
        self.layers.iter().fold(0.0, |acc, layer| match layer.blend() {
            LayerBlend::Add => acc + unit(layer) * layer.strength(),
            LayerBlend::Multiply => acc * unit(layer) * layer.strength(),
        })
    }

    pub fn apply_hard_floor(&self, value: f32) -> f32 {
        if !self.hard_floor || value >= self.hard_floor_height {
            return value;
        }
        let strength = self.hard_floor_strength.max(0.0);
        let t = strength / (1.0 + strength);
        lerp(value, self.hard_floor_height, t)
    }

    pub fn validate(&self, owner: &str) -> WorldResult<()> {
        for layer in &self.layers {
            layer.validate(owner)?;
        }
        let (min, max) = HARD_FLOOR_RANGE;
        if !(min..=max).contains(&self.hard_floor_height) {
            return Err(WorldError::invalid(
                format!("{owner}.hard_floor_height"),
                format!("{} is outside {min}..={max}", self.hard_floor_height),
            ));
        }
        if !(min..=max).contains(&self.hard_floor_strength) {
            return Err(WorldError::invalid(
                format!("{owner}.hard_floor_strength"),
                format!("{} is outside {min}..={max}", self.hard_floor_strength),
            ));
        }
        Ok(())
    }
}
