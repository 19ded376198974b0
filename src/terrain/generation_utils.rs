use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::terrain::cell::CellCoordinate;

// Stable 64-bit FNV-1a of a grid name, used to salt per-cell seeds
pub fn name_salt(name: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    name.bytes().fold(OFFSET, |hash, byte| (hash ^ byte as u64).wrapping_mul(PRIME))
}

// splitmix64 finaliser
fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

// Seed for one cell's random stream. Depends only on the inputs, never on
// the order in which cells are generated.
pub fn cell_seed(world_seed: u64, salt: u64, coord: CellCoordinate, stream: u64) -> u64 {
    let mut h = mix(world_seed ^ salt);
    h = mix(h ^ (coord.x as u32 as u64));
    h = mix(h ^ ((coord.z as u32 as u64) << 32));
    mix(h ^ stream)
}

pub fn cell_rng(world_seed: u64, salt: u64, coord: CellCoordinate, stream: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(cell_seed(world_seed, salt, coord, stream))
}
