// src/terrain/noise/noise_parameters.rs
use noise::{Fbm, NoiseFn, Perlin};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::error::{WorldError, WorldResult};
use crate::terrain::noise::noise_utils::create_fbm_from_layer;

pub const OCTAVE_RANGE: (u32, u32) = (1, 16);
pub const STRENGTH_RANGE: (f32, f32) = (0.0, 512.0);

// How a layer folds into the accumulated value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerBlend {
    #[default]
    Add,
    Multiply,
}

/// One seeded fractal noise layer.
///
/// The compiled noise function is built lazily on first sample and dropped
/// whenever a parameter changes, so a layer can be edited in place and then
/// snapshotted for the workers.
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseLayer {
    name: String,
    seed: i32,
    scale: (f32, f32),
    strength: f32,
    frequency: f32,
    fractal_octaves: u32,
    fractal_lacunarity: f32,
    fractal_gain: f32,
    blend: LayerBlend,

    #[serde(skip)]
    sampler: OnceCell<Fbm<Perlin>>,
}

impl Default for NoiseLayer {
    fn default() -> Self {
        NoiseLayer {
            name: "layer".to_string(),
            seed: 0,
            scale: (1.0, 1.0),
            strength: 1.0,
            frequency: 0.01,
            fractal_octaves: 3,
            fractal_lacunarity: 2.0,
            fractal_gain: 0.5,
            blend: LayerBlend::Add,
            sampler: OnceCell::new(),
        }
    }
}

// Copies start without a compiled sampler and build their own on demand
impl Clone for NoiseLayer {
    fn clone(&self) -> Self {
        NoiseLayer {
            name: self.name.clone(),
            seed: self.seed,
            scale: self.scale,
            strength: self.strength,
            frequency: self.frequency,
            fractal_octaves: self.fractal_octaves,
            fractal_lacunarity: self.fractal_lacunarity,
            fractal_gain: self.fractal_gain,
            blend: self.blend,
            sampler: OnceCell::new(),
        }
    }
}

impl fmt::Debug for NoiseLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoiseLayer")
            .field("name", &self.name)
            .field("seed", &self.seed)
            .field("scale", &self.scale)
            .field("strength", &self.strength)
            .field("frequency", &self.frequency)
            .field("fractal_octaves", &self.fractal_octaves)
            .field("fractal_lacunarity", &self.fractal_lacunarity)
            .field("fractal_gain", &self.fractal_gain)
            .field("blend", &self.blend)
            .field("compiled", &self.sampler.get().is_some())
            .finish()
    }
}

impl NoiseLayer {
    pub fn new(name: impl Into<String>, seed: i32) -> Self {
        NoiseLayer {
            name: name.into(),
            seed,
            ..Default::default()
        }
    }

    pub fn with_scale(mut self, x: f32, z: f32) -> Self {
        self.set_scale(x, z);
        self
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.set_strength(strength);
        self
    }

    pub fn with_octaves(mut self, octaves: u32) -> Self {
        self.set_fractal_octaves(octaves);
        self
    }

    pub fn with_frequency(mut self, frequency: f32) -> Self {
        self.set_frequency(frequency);
        self
    }

    pub fn with_blend(mut self, blend: LayerBlend) -> Self {
        self.blend = blend;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seed(&self) -> i32 {
        self.seed
    }

    pub fn scale(&self) -> (f32, f32) {
        self.scale
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn fractal_octaves(&self) -> u32 {
        self.fractal_octaves
    }

    pub fn fractal_lacunarity(&self) -> f32 {
        self.fractal_lacunarity
    }

    pub fn fractal_gain(&self) -> f32 {
        self.fractal_gain
    }

    pub fn blend(&self) -> LayerBlend {
        self.blend
    }

    pub fn set_seed(&mut self, seed: i32) {
        self.seed = seed;
        self.invalidate();
    }

    pub fn set_scale(&mut self, x: f32, z: f32) {
        self.scale = (x, z);
    }

    // Scale, strength and frequency act outside the compiled function
    pub fn set_strength(&mut self, strength: f32) {
        self.strength = strength;
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency;
    }

    pub fn set_fractal_octaves(&mut self, octaves: u32) {
        self.fractal_octaves = octaves;
        self.invalidate();
    }

    pub fn set_fractal_lacunarity(&mut self, lacunarity: f32) {
        self.fractal_lacunarity = lacunarity;
        self.invalidate();
    }

    pub fn set_fractal_gain(&mut self, gain: f32) {
        self.fractal_gain = gain;
        self.invalidate();
    }

    pub fn set_blend(&mut self, blend: LayerBlend) {
        self.blend = blend;
    }

    fn invalidate(&mut self) {
        self.sampler = OnceCell::new();
    }

    // Layer value in [0, 1] before strength is applied
    pub fn sample_unit(&self, world_x: f32, world_z: f32) -> f32 {
        let fbm = self.sampler.get_or_init(|| create_fbm_from_layer(self));
        let point = [
            (world_x * self.scale.0 * self.frequency) as f64,
            (world_z * self.scale.1 * self.frequency) as f64,
        ];
        let value = fbm.get(point) as f32;
        ((value + 1.0) * 0.5).clamp(0.0, 1.0)
    }

    pub fn sample(&self, world_x: f32, world_z: f32) -> f32 {
        self.sample_unit(world_x, world_z) * self.strength
    }

    pub fn validate(&self, owner: &str) -> WorldResult<()> {
        let field = |name: &str| format!("{owner}.{}.{name}", self.name);
        if self.fractal_octaves < OCTAVE_RANGE.0 || self.fractal_octaves > OCTAVE_RANGE.1 {
            return Err(WorldError::invalid(
                field("fractal_octaves"),
                format!("{} is outside {}..={}", self.fractal_octaves, OCTAVE_RANGE.0, OCTAVE_RANGE.1),
            ));
        }
        if !self.strength.is_finite() || self.strength < STRENGTH_RANGE.0 || self.strength > STRENGTH_RANGE.1 {
            return Err(WorldError::invalid(
                field("strength"),
                format!("{} is outside {}..={}", self.strength, STRENGTH_RANGE.0, STRENGTH_RANGE.1),
            ));
        }
        if !(self.frequency.is_finite() && self.frequency > 0.0) {
            return Err(WorldError::invalid(field("frequency"), "must be a positive number"));
        }
        if !(self.scale.0.is_finite() && self.scale.1.is_finite()) {
            return Err(WorldError::invalid(field("scale"), "must be finite"));
        }
        if !(self.fractal_lacunarity.is_finite() && self.fractal_gain.is_finite()) {
            return Err(WorldError::invalid(field("fractal"), "lacunarity and gain must be finite"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_layer() {
        let a = NoiseLayer::new("a", 543).with_scale(2.5, 1.5);
        let b = NoiseLayer::new("b", 543).with_scale(2.5, 1.5);
        for i in 0..20 {
            let x = i as f32 * 13.7;
            assert_eq!(a.sample(x, -x), b.sample(x, -x));
        }
    }

    #[test]
    fn test_unit_range() {
        let layer = NoiseLayer::new("range", 7654).with_octaves(6);
        for x in 0..30 {
            for z in 0..30 {
                let v = layer.sample_unit(x as f32 * 7.0, z as f32 * 11.0);
                assert!((0.0..=1.0).contains(&v));
            }
        }
    }

    #[test]
    fn test_strength_scales_sample() {
        let layer = NoiseLayer::new("s", 1).with_strength(64.0);
        let unit = layer.sample_unit(120.0, 45.0);
        assert!((layer.sample(120.0, 45.0) - unit * 64.0).abs() < 1e-4);
    }

    #[test]
    fn test_seed_change_rebuilds_sampler() {
        let mut layer = NoiseLayer::new("reseed", 1);
        let before: Vec<f32> = (0..10).map(|i| layer.sample_unit(i as f32 * 31.0, 17.0)).collect();
        layer.set_seed(2);
        let after: Vec<f32> = (0..10).map(|i| layer.sample_unit(i as f32 * 31.0, 17.0)).collect();
        assert_ne!(before, after);
    }

    #[test]
    fn test_octave_validation() {
        let layer = NoiseLayer::new("bad", 1).with_octaves(0);
        assert!(layer.validate("World").is_err());
        let layer = NoiseLayer::new("ok", 1).with_octaves(16);
        assert!(layer.validate("World").is_ok());
    }
}
