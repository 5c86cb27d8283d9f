//! FFT solve over the final store produced by `lpn-run-step` (spec
//! section 8 scenario A): `n=10, q=101`, positions 0-7 already zeroed, FFT
//! over the remaining two positions 8-9.

use lpn_app::stage_dir;
use lpn_core::transition::read_unsorted_store;
use lpn_solve::fft::solve_fft;

const N: usize = 10;
const Q: u32 = 101;
const FFT_POSITIONS: usize = 2;

fn run() -> lpn_core::error::Result<Vec<i16>> {
    let samples = read_unsorted_store(&stage_dir("final_unsorted"))?;
    solve_fft(&samples, N, Q, &[], FFT_POSITIONS)
}

fn main() {
    match run() {
        Ok(recovered) => {
            println!("recovered positions {}..{}: {:?}", N - FFT_POSITIONS, N, recovered);
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("step failed: lpn-solve-fft: {err}");
            std::process::exit(1);
        }
    }
}
