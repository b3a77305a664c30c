// Everything pseudo-random in the smoke plane comes from here.
//
// Seeding the generator makes the noise texture, and therefore the rendered
// frames, reproducible between runs.

use rand::distr::{Alphanumeric, StandardUniform};
use rand::prelude::*;
use rand_pcg::Pcg32;
use rand_seeder::Seeder;

pub type SmokeRng = Pcg32;

pub fn from_seed(optional_seed: &Option<String>) -> SmokeRng {
    let seed = optional_seed.as_ref().cloned().unwrap_or_else(|| {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect()
    });

    log::debug!("🌱 Seed: {}", seed);

    Seeder::from(seed).into_rng()
}

pub fn gen<T>(rng: &mut SmokeRng) -> T
where
    StandardUniform: Distribution<T>,
{
    rng.random::<T>()
}
