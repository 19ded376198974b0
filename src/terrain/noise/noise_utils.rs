// src/terrain/noise/noise_utils.rs
use noise::{Fbm, MultiFractal, Perlin};

use crate::terrain::noise::noise_parameters::{NoiseLayer, OCTAVE_RANGE};

// Build the fractal function backing a layer. Frequency and scale are applied
// to the input coordinates by the layer itself, so the function runs at unit
// frequency.
pub fn create_fbm_from_layer(layer: &NoiseLayer) -> Fbm<Perlin> {
    let octaves = layer.fractal_octaves().clamp(OCTAVE_RANGE.0, OCTAVE_RANGE.1) as usize;
    Fbm::<Perlin>::new(layer.seed() as u32)
        .set_frequency(1.0)
        .set_octaves(octaves)
        .set_lacunarity(layer.fractal_lacunarity() as f64)
        .set_persistence(layer.fractal_gain() as f64)
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use noise::NoiseFn;

    #[test]
    fn test_same_layer_same_function() {
        let layer = NoiseLayer::new("fbm", 99).with_octaves(4);
        let a = create_fbm_from_layer(&layer);
        let b = create_fbm_from_layer(&layer);
        assert_eq!(a.get([0.37, 1.91]), b.get([0.37, 1.91]));
    }

    #[test]
    fn test_lerp_endpoints() {
        assert_eq!(lerp(2.0, 6.0, 0.0), 2.0);
        assert_eq!(lerp(2.0, 6.0, 1.0), 6.0);
        assert_eq!(lerp(2.0, 6.0, 0.25), 3.0);
    }
}
