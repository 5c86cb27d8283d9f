//! Category sorting: mapping a run of sample coordinates onto a category
//! index, for each of the four supported BKW variants.
//!
//! The original implementation's `include/position_values_2_category_index.h`
//! declares this family of functions but its `.c` body was not part of the
//! retrievable source set; the digit-compression and coset-sum schemes below
//! are written directly from the textual description of each variant rather
//! than transliterated from a reference body. See `DESIGN.md` for the note.

/// Which of the four category-sorting schemes a BKW step uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortingMode {
    /// Category index is the exact base-`q` digits of the active positions.
    PlainBkw,
    /// Lazy Modulus Switching: each position is compressed from `Z_q` down
    /// to `Z_p` (`p < q`) before forming the base-`p` digit index.
    Lms,
    /// Smooth LMS: same digit compression as LMS for every position but
    /// the block's last one, which is compressed to a second, independent
    /// scale `p1` (applied again to the *next* block's first position, so
    /// the boundary between two blocks is smoothed rather than sharp).
    SmoothLms { p1: u32 },
    /// Coded BKW: positions are compressed through a linear code, trading
    /// category count for a larger combinable cluster per category.
    CodedBkw(CodeVariant),
}

/// Linear codes used by [`SortingMode::CodedBkw`]. Each is a length-`b`,
/// dimension-1 "sum" code: its coset representative is the (mod `q`) sum of
/// the `b` active coordinates, which collapses `q^b` possible digit-tuples
/// onto only `q` categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeVariant {
    /// `[2,1]`: two positions summed into one category.
    C2_1,
    /// `[3,1]`: three positions summed into one category.
    C3_1,
    /// `[4,1]`: four positions summed into one category.
    C4_1,
    /// Two independent `[2,1]` codes concatenated over disjoint position
    /// pairs, giving `q^2` categories instead of `q^4`.
    Concat2_1_2_1,
}

impl CodeVariant {
    /// Number of raw positions this code consumes per BKW step.
    pub fn num_positions(self) -> usize {
        match self {
            CodeVariant::C2_1 => 2,
            CodeVariant::C3_1 => 3,
            CodeVariant::C4_1 => 4,
            CodeVariant::Concat2_1_2_1 => 4,
        }
    }
}

/// Parameters describing one BKW reduction step's category scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BkwStepParameters {
    pub sorting_mode: SortingMode,
    /// Index of the first coordinate this step consumes.
    pub start_position: usize,
    /// Number of coordinates, or "raw positions", consumed this step.
    pub num_positions: usize,
    pub q: u32,
    /// Compressed modulus for [`SortingMode::Lms`]/[`SortingMode::SmoothLms`].
    /// Unused (and conventionally set to `q`) for the other two modes.
    pub p: u32,
    /// Smooth-LMS meta-skip level: `0` sorts every position at sort time;
    /// `1` or `2` defers one or two trailing positions' bucketing to
    /// combination time to keep the category count from exploding.
    /// Unused (and `0`) outside [`SortingMode::SmoothLms`].
    pub meta_skipped: u8,
    /// The `p1` scale the *previous* step used on this block's first
    /// position, carried forward so combination respects a boundary
    /// constraint it didn't choose. Conventionally `q` (no constraint)
    /// outside [`SortingMode::SmoothLms`].
    ///
    /// The companion quality filter, spec section 4.2's
    /// `unnatural_selection_ts`, is realized as
    /// [`crate::transition::UnnaturalSelection`] rather than a field here —
    /// it is passed into [`crate::transition::run_bkw_step`] alongside the
    /// step's parameters, not consulted while computing a category index.
    pub prev_p1: u32,
}

impl BkwStepParameters {
    /// Total number of categories this step's scheme produces.
    pub fn num_categories(&self) -> u64 {
        match self.sorting_mode {
            SortingMode::PlainBkw => (self.q as u64).pow(self.num_positions as u32),
            SortingMode::Lms => (self.p as u64).pow(self.num_positions as u32),
            SortingMode::SmoothLms { p1 } => {
                (self.p as u64).pow((self.num_positions - 1) as u32) * p1 as u64
            }
            SortingMode::CodedBkw(variant) => match variant {
                CodeVariant::C2_1 | CodeVariant::C3_1 | CodeVariant::C4_1 => self.q as u64,
                CodeVariant::Concat2_1_2_1 => (self.q as u64) * (self.q as u64),
            },
        }
    }

    /// Folds `value` to its negative representative when that is closer to
    /// zero (`|v - q| < v`, i.e. `v > q/2`), matching the rule spec section
    /// 4.2 gives for LMS digit compression and the one
    /// [`BkwStepParameters::plain_bkw_category_index`] already applies for
    /// plainBKW. Returned in `(-q/2, q/2]`.
    fn centered(value: i16, q: u32) -> i64 {
        let v = value as i64;
        let qi = q as i64;
        if 2 * v > qi {
            v - qi
        } else {
            v
        }
    }

    /// Compresses a centered representative of `value` into one of `buckets`
    /// digits, `0..buckets`, with the all-zero value landing in the centre
    /// digit `buckets/2`. Because the fold above maps `v` and `q-v` to
    /// representatives `v` and `-v`, this places negation-paired values on
    /// matching or adjacent digits rather than opposite ends of the range.
    fn folded_digit(&self, value: i16, buckets: u32) -> u32 {
        let c = Self::centered(value, self.q);
        let scaled = (c * buckets as i64).div_euclid(self.q as i64);
        (scaled + (buckets / 2) as i64).clamp(0, buckets as i64 - 1) as u32
    }

    fn lms_digit(&self, value: i16) -> u32 {
        self.folded_digit(value, self.p)
    }

    /// Maps one step's active-position values to a category index.
    pub fn position_values_to_category_index(&self, values: &[i16]) -> u64 {
        debug_assert_eq!(values.len(), self.num_positions);
        match self.sorting_mode {
            SortingMode::PlainBkw => self.plain_bkw_category_index(values),
            SortingMode::Lms => values
                .iter()
                .fold(0u64, |acc, &v| acc * self.p as u64 + self.lms_digit(v) as u64),
            SortingMode::SmoothLms { p1 } => {
                let (head, last) = values.split_at(values.len() - 1);
                let acc = head
                    .iter()
                    .fold(0u64, |acc, &v| acc * self.p as u64 + self.lms_digit(v) as u64);
                acc * p1 as u64 + self.folded_digit(last[0], p1) as u64
            }
            SortingMode::CodedBkw(variant) => self.coded_bkw_category_index(variant, values),
        }
    }

    /// Inverse of [`BkwStepParameters::position_values_to_category_index`].
    /// Exact (a true bijection) for plainBKW, matching testable property 5.
    /// For LMS, smoothLMS and codedBKW the forward map is a compression —
    /// several tuples share one category — so this returns a representative
    /// tuple for that category rather than recovering the original values.
    pub fn category_index_to_position_values(&self, category: u64) -> Vec<i16> {
        match self.sorting_mode {
            SortingMode::PlainBkw => self.plain_bkw_category_to_values(category, self.num_positions),
            SortingMode::Lms => {
                let digits = Self::decode_base_p_digits(category, self.p as u64, self.num_positions);
                digits.iter().map(|&d| self.digit_to_representative(d, self.p)).collect()
            }
            SortingMode::SmoothLms { p1 } => {
                let last = (category % p1 as u64) as u32;
                let head = category / p1 as u64;
                let mut digits = Self::decode_base_p_digits(head, self.p as u64, self.num_positions - 1);
                let mut values: Vec<i16> = digits
                    .drain(..)
                    .map(|d| self.digit_to_representative(d, self.p))
                    .collect();
                values.push(self.digit_to_representative(last, p1));
                values
            }
            SortingMode::CodedBkw(variant) => self.coded_bkw_category_to_values(variant, category),
        }
    }

    fn decode_base_p_digits(mut value: u64, base: u64, count: usize) -> Vec<u32> {
        let mut digits = vec![0u32; count];
        for k in (0..count).rev() {
            digits[k] = (value % base) as u32;
            value /= base;
        }
        digits
    }

    /// Un-does [`BkwStepParameters::folded_digit`] by returning the
    /// bucket's midpoint value in `[0, q)`.
    fn digit_to_representative(&self, digit: u32, buckets: u32) -> i16 {
        let shifted = digit as i64 - (buckets / 2) as i64;
        let centered = shifted * self.q as i64 / buckets as i64;
        let v = if centered >= 0 { centered } else { centered + self.q as i64 };
        (v % self.q as i64) as i16
    }

    /// PlainBKW's "constructive table" (spec section 4.2): the all-zero
    /// tuple is its own singleton category 0; every other tuple `v` and its
    /// negation `-v mod q` (assumed `q` odd, so the only fixed point of
    /// negation is the zero tuple) land on adjacent indices `2k+1, 2k+2`.
    /// `k` is the tuple's rank among "representative" (first-nonzero-digit
    /// in the positive half `[1, (q-1)/2]`) tuples, computed digit-by-digit
    /// in `O(num_positions)` rather than via a precomputed `q^b`-sized
    /// table.
    fn plain_bkw_category_index(&self, values: &[i16]) -> u64 {
        let qi = self.q as i64;
        let half = (qi - 1) / 2;
        let b = values.len();

        let i0 = match values.iter().position(|&v| v != 0) {
            Some(i) => i,
            None => return 0,
        };

        let v0 = values[i0] as i64;
        let positive = v0 <= half;
        let rep_v0 = if positive { v0 } else { qi - v0 };
        let rest: Vec<i64> = values[i0 + 1..]
            .iter()
            .map(|&v| if positive { v as i64 } else { (qi - v as i64) % qi })
            .collect();

        let mut offset: u64 = 0;
        for j in 0..i0 {
            offset += half as u64 * (qi as u64).pow((b - 1 - j) as u32);
        }
        let mut rest_val: u64 = 0;
        for &r in &rest {
            rest_val = rest_val * qi as u64 + r as u64;
        }
        let within = (rep_v0 as u64 - 1) * (qi as u64).pow((b - 1 - i0) as u32) + rest_val;
        let rank = offset + within;

        1 + 2 * rank + if positive { 0 } else { 1 }
    }

    /// Exact inverse of [`BkwStepParameters::plain_bkw_category_index`].
    /// `b` is the tuple length the category was built over — the step's own
    /// `num_positions` for plainBKW, or the reduced sum-tuple length (1 or
    /// 2) when reused by [`BkwStepParameters::coded_bkw_category_to_values`].
    fn plain_bkw_category_to_values(&self, category: u64, b: usize) -> Vec<i16> {
        let qi = self.q as i64;
        let half = (qi - 1) / 2;
        if category == 0 {
            return vec![0; b];
        }
        let rank = (category - 1) / 2;
        let positive = (category - 1) % 2 == 0;

        let mut remaining = rank;
        let mut i0 = b - 1;
        for j in 0..b {
            let block_size = half as u64 * (qi as u64).pow((b - 1 - j) as u32);
            if remaining < block_size {
                i0 = j;
                break;
            }
            remaining -= block_size;
        }

        let rest_len = b - 1 - i0;
        let rest_span = (qi as u64).pow(rest_len as u32);
        let rep_v0 = (remaining / rest_span) as i64 + 1;
        let rest_digits = Self::decode_base_p_digits(remaining % rest_span, qi as u64, rest_len);

        let mut values = vec![0i16; b];
        values[i0] = if positive { rep_v0 } else { (qi - rep_v0) % qi } as i16;
        for (k, &d) in rest_digits.iter().enumerate() {
            let d = d as i64;
            values[i0 + 1 + k] = if positive { d } else { (qi - d) % qi } as i16;
        }
        values
    }

    /// A coded-BKW category is a plainBKW category over the code's sum
    /// representatives rather than the raw positions: one sum for
    /// `C2_1`/`C3_1`/`C4_1`, two independent sums for `Concat2_1_2_1`. This
    /// reuses [`BkwStepParameters::plain_bkw_category_index`] directly on
    /// that reduced tuple instead of the raw sum value, so that a coded
    /// tuple's negation — which negates every coordinate and hence every
    /// sum — lands on an adjacent category index exactly the way a
    /// plainBKW tuple's negation does. A raw `sum mod q` index (tried
    /// first) does not have this property in general, which broke
    /// [`crate::reader::StorageReader::next_adjacent_category_pair`]'s
    /// adjacent-pair assumption; see `DESIGN.md`.
    fn coded_bkw_category_index(&self, variant: CodeVariant, values: &[i16]) -> u64 {
        let sum_mod_q = |vals: &[i16]| -> i16 {
            let mut acc: i64 = 0;
            for &v in vals {
                acc = (acc + v as i64).rem_euclid(self.q as i64);
            }
            acc as i16
        };
        match variant {
            CodeVariant::C2_1 | CodeVariant::C3_1 | CodeVariant::C4_1 => {
                self.plain_bkw_category_index(&[sum_mod_q(values)])
            }
            CodeVariant::Concat2_1_2_1 => {
                self.plain_bkw_category_index(&[sum_mod_q(&values[0..2]), sum_mod_q(&values[2..4])])
            }
        }
    }

    /// Exact inverse of [`BkwStepParameters::coded_bkw_category_index`]'s
    /// sum code is not recoverable (many tuples share one sum); this
    /// returns a representative tuple that puts the decoded sum(s) in the
    /// block's first sub-code position(s) and zero elsewhere.
    fn coded_bkw_category_to_values(&self, variant: CodeVariant, category: u64) -> Vec<i16> {
        let mut values = vec![0i16; variant.num_positions()];
        match variant {
            CodeVariant::C2_1 | CodeVariant::C3_1 | CodeVariant::C4_1 => {
                values[0] = self.plain_bkw_category_to_values(category, 1)[0];
            }
            CodeVariant::Concat2_1_2_1 => {
                let sums = self.plain_bkw_category_to_values(category, 2);
                values[0] = sums[0];
                values[2] = sums[1];
            }
        }
        values
    }

    /// True if `category` has no adjacent partner category to pair with in
    /// [`crate::reader::StorageReader::next_adjacent_category_pair`]: a real
    /// singleton is one whose negation maps to itself.
    ///
    /// PlainBKW's only self-paired tuple is the all-zero one, which
    /// [`BkwStepParameters::plain_bkw_category_index`] always places at
    /// category 0. CodedBkw's sum code negates every coordinate when the
    /// tuple is negated, so the sum (and hence the category) is fixed only
    /// when it's zero — category 0 for every variant, including
    /// `Concat2_1_2_1`, since `idx0*q + idx1 == 0` iff both sub-sums are 0.
    /// LMS/smoothLMS fold every position to a centred digit in
    /// [`BkwStepParameters::folded_digit`]; the all-centre-digit tuple is
    /// the one whose fold is its own negation.
    pub fn is_singleton(&self, category: u64) -> bool {
        match self.sorting_mode {
            SortingMode::PlainBkw => category == 0,
            SortingMode::CodedBkw(_) => category == 0,
            SortingMode::Lms => {
                let center = (self.p / 2) as u64;
                Self::decode_base_p_digits(category, self.p as u64, self.num_positions)
                    .iter()
                    .all(|&d| d as u64 == center)
            }
            SortingMode::SmoothLms { p1 } => {
                let last = category % p1 as u64;
                if last != (p1 / 2) as u64 {
                    return false;
                }
                let center = (self.p / 2) as u64;
                Self::decode_base_p_digits(category / p1 as u64, self.p as u64, self.num_positions - 1)
                    .iter()
                    .all(|&d| d as u64 == center)
            }
        }
    }
}
