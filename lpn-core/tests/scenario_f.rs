//! Spec section 8 scenario F: pure `lpn-core` utility round-trips, with no
//! sample stores or pipeline stages involved — the category-index and
//! sorting-descriptor bijections the rest of the pipeline's correctness
//! leans on.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use lpn_core::category::{BkwStepParameters, CodeVariant, SortingMode};
use lpn_core::store::{sorting_description_to_params, SortingDescription};

fn plain_bkw_2(q: u32) -> BkwStepParameters {
    BkwStepParameters { sorting_mode: SortingMode::PlainBkw, start_position: 0, num_positions: 2, q, p: q, meta_skipped: 0, prev_p1: q }
}

#[test]
fn plain_bkw_2_position_category_index_is_an_exact_bijection_at_realistic_scale() {
    let q = 101u32;
    let params = plain_bkw_2(q);
    let mut rng = SmallRng::seed_from_u64(0xF0000);
    for _ in 0..1000 {
        let p0 = rng.gen_range(0..q as i16);
        let p1 = rng.gen_range(0..q as i16);
        let cat = params.position_values_to_category_index(&[p0, p1]);
        assert!(cat < params.num_categories());
        let back = params.category_index_to_position_values(cat);
        assert_eq!(back, vec![p0, p1], "cat2pos(pos2cat(({p0},{p1}))) should round-trip at q={q}");
    }
}

fn round_trip(params: BkwStepParameters) {
    let desc: SortingDescription = (&params).into();
    let text = desc.sorting_as_string();
    let parsed = SortingDescription::sorting_from_string(&text).unwrap();
    let reconstructed = sorting_description_to_params(&parsed).unwrap();
    assert_eq!(reconstructed, params, "sortingFromString(sortingAsString(m)) should recover m for {text}");
}

#[test]
fn sorting_descriptor_round_trips_through_its_string_grammar_for_every_mode() {
    round_trip(BkwStepParameters { sorting_mode: SortingMode::PlainBkw, start_position: 0, num_positions: 2, q: 101, p: 101, meta_skipped: 0, prev_p1: 101 });
    round_trip(BkwStepParameters { sorting_mode: SortingMode::Lms, start_position: 4, num_positions: 2, q: 101, p: 22, meta_skipped: 0, prev_p1: 101 });
    round_trip(BkwStepParameters { sorting_mode: SortingMode::SmoothLms { p1: 21 }, start_position: 6, num_positions: 2, q: 101, p: 22, meta_skipped: 1, prev_p1: 21 });
    round_trip(BkwStepParameters { sorting_mode: SortingMode::CodedBkw(CodeVariant::C2_1), start_position: 0, num_positions: 2, q: 101, p: 101, meta_skipped: 0, prev_p1: 101 });
    round_trip(BkwStepParameters { sorting_mode: SortingMode::CodedBkw(CodeVariant::C3_1), start_position: 0, num_positions: 3, q: 101, p: 101, meta_skipped: 0, prev_p1: 101 });
    round_trip(BkwStepParameters { sorting_mode: SortingMode::CodedBkw(CodeVariant::C4_1), start_position: 0, num_positions: 4, q: 101, p: 101, meta_skipped: 0, prev_p1: 101 });
    round_trip(BkwStepParameters { sorting_mode: SortingMode::CodedBkw(CodeVariant::Concat2_1_2_1), start_position: 0, num_positions: 4, q: 101, p: 101, meta_skipped: 0, prev_p1: 101 });
}
