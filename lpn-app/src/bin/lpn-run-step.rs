//! Runs the full plainBKW reduction schedule of spec section 8's scenario
//! A over the seed store produced by `lpn-generate`: one sort into the
//! first category store, three combination ("BKW") steps, then the final
//! step. Each stage is its own store directory; an already-existing
//! directory causes that stage to be skipped (spec section 6/7).

use lpn_app::{report, stage_dir};
use lpn_core::category::{BkwStepParameters, SortingMode};
use lpn_core::config::PipelineConfig;
use lpn_core::transition::{run_bkw_step, run_final_step, sort_unsorted_into_store, Selection};

const N: usize = 10;
const Q: u32 = 101;
const ALPHA: f64 = 0.01;
const BLOCK: usize = 2;

fn params(start: usize) -> BkwStepParameters {
    BkwStepParameters {
        sorting_mode: SortingMode::PlainBkw,
        start_position: start,
        num_positions: BLOCK,
        q: Q,
        p: Q,
        meta_skipped: 0,
        prev_p1: Q,
    }
}

fn main() {
    let cfg = PipelineConfig::default();
    let cap_file = 64u64;
    let cap_buf = 64u64;

    let seed = stage_dir("seed");
    let store0 = stage_dir("store0");
    let store1 = stage_dir("store1");
    let store2 = stage_dir("store2");
    let store3 = stage_dir("store3");
    let final_unsorted = stage_dir("final_unsorted");

    let status = sort_unsorted_into_store(&seed, &store0, N, Q, ALPHA, params(0), cap_file, cap_buf, cfg.min_flush_load_percent);
    let code = report("sort-into-store0", status);
    if code != 0 {
        std::process::exit(code);
    }

    let steps: [(&std::path::Path, &std::path::Path, usize); 3] =
        [(&store0, &store1, 2), (&store1, &store2, 4), (&store2, &store3, 6)];
    for (src, dst, next_start) in steps {
        let status = run_bkw_step(
            src,
            dst,
            N,
            Q,
            ALPHA,
            params(next_start),
            Selection::Lf1,
            cap_file,
            cap_buf,
            cfg.min_flush_load_percent,
            cfg.early_abort_load_percent,
            None,
        );
        let code = report("bkw-step", status);
        if code != 0 {
            std::process::exit(code);
        }
    }

    let status = run_final_step(
        &store3,
        &final_unsorted,
        N,
        Q,
        ALPHA,
        Selection::Lf1,
        cap_file,
        cap_buf,
        cfg.min_flush_load_percent,
        cfg.early_abort_load_percent,
        None,
    );
    let code = report("final-step", status);
    std::process::exit(code);
}
