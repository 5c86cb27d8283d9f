//! Spectral peak-finding solvers: the final stage that turns a fully
//! reduced sample store back into the secret vector.
//!
//! Both solvers share a shape (accumulate a tally indexed by a window of
//! still-unknown coordinates, transform, argmax) but differ in domain:
//! [`fft`] works over `Z_q` via the complex DFT, [`fwht`] works over `Z_2`
//! via the Walsh-Hadamard transform after a mod-2 projection. Grounded on
//! `original_source/src/solve_fft.c` and `original_source/src/solve_fwht.c`
//! respectively.

pub mod fft;
pub mod fwht;

pub use lpn_core::error::{PipelineError, Result};

/// Default worker count for [`fwht::solve_fwht_bruteforce`], mirroring the
/// `Configs::maxProcs <= 0` -> `num_cpus::get()` fallback used across this
/// workspace's pipeline drivers.
pub fn default_num_threads() -> usize {
    num_cpus::get()
}
