//! Mod-2 projection plus FWHT solve over the same final store
//! `lpn-run-step` produces (spec section 8 scenario A continued as a
//! binary-case solve): `n=10, q=101`, positions 0-7 already zeroed, FWHT
//! over the remaining two positions 8-9.

use lpn_app::stage_dir;
use lpn_core::error::StepStatus;
use lpn_core::transition::{mod2_project, read_unsorted_store};
use lpn_solve::fwht::solve_fwht;

const N: usize = 10;
const Q: u32 = 101;
const ZERO_POSITIONS: usize = 8;
const FWHT_POSITIONS: usize = 2;

fn run() -> lpn_core::error::Result<Vec<u8>> {
    let final_unsorted = stage_dir("final_unsorted");
    let mod2_dir = stage_dir("mod2");
    let status = mod2_project(&final_unsorted, &mod2_dir, N, Q)?;
    if status == StepStatus::Skipped {
        println!("lpn-solve-fwht: mod2 projection already present, reusing it");
    }
    let samples = read_unsorted_store(&mod2_dir)?;
    solve_fwht(&samples, ZERO_POSITIONS, FWHT_POSITIONS)
}

fn main() {
    match run() {
        Ok(recovered) => {
            println!(
                "recovered centered-mod2 positions {}..{}: {:?}",
                ZERO_POSITIONS,
                ZERO_POSITIONS + FWHT_POSITIONS,
                recovered
            );
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("step failed: lpn-solve-fwht: {err}");
            std::process::exit(1);
        }
    }
}
