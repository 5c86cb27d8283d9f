//! Generates a fresh synthetic LWE instance and seed sample store (spec
//! section 6's "initial conversion" role, played here by random generation
//! rather than an external challenge file — see `lpn-convert` for that
//! adaptor). Hard-coded to scenario A of spec section 8: `n=10, q=101,
//! alpha=0.01`, ~100k seed samples.

use rand::rngs::SmallRng;
use rand::SeedableRng;

use lpn_app::{report_initial, stage_dir};
use lpn_core::arith::ModTables;
use lpn_core::error::Result;
use lpn_core::instance::LweInstance;
use lpn_core::transition::write_unsorted_store;

const N: usize = 10;
const Q: u32 = 101;
const ALPHA: f64 = 0.01;
const NUM_SEED_SAMPLES: usize = 100_000;
const RNG_SEED: u64 = 0xC0FFEE;
const VERBOSE: bool = true;

fn run() -> Result<()> {
    let mut rng = SmallRng::seed_from_u64(RNG_SEED);
    let instance = LweInstance::generate(N, Q, ALPHA, &mut rng);
    let tables = ModTables::new(Q);

    let samples: Vec<_> = (0..NUM_SEED_SAMPLES)
        .map(|i| {
            if VERBOSE && i % 20_000 == 0 {
                println!("lpn-generate: {:.0}% drawn", 100.0 * i as f64 / NUM_SEED_SAMPLES as f64);
            }
            instance.random_sample(&mut rng, &tables)
        })
        .collect();

    let seed_dir = stage_dir("seed");
    // `write_unsorted_store` creates `seed_dir` (via `Store::create`) and
    // writes a minimal `params.txt`; overwrite it afterwards with the full
    // instance, including the secret, now that the directory exists.
    write_unsorted_store(&seed_dir, N, Q, ALPHA, &samples)?;
    instance.write_params(&seed_dir)?;

    Ok(())
}

fn main() {
    std::process::exit(report_initial("lpn-generate", run()));
}
