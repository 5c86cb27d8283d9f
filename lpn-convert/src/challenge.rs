//! External challenge file grammar (spec section 6): four header lines
//! (`n`, `numSamples`, `q`, `alpha`), then a `[b_0 b_1 ... b_{m-1}]`
//! bracketed vector, then a `[[...] [...] ... [...]]` bracketed matrix.
//!
//! The original reads this with a sequence of `fscanf` calls that don't
//! care about newlines inside the bracketed blocks; this parser mirrors
//! that by tokenizing the whole body (ignoring all whitespace, including
//! newlines) into brackets and signed integers.

use std::path::PathBuf;

use lpn_core::error::PipelineError;
use lpn_core::sample::Sample;

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed challenge file: {0}")]
    Malformed(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

pub type Result<T> = std::result::Result<T, ConvertError>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    Num(i64),
}

fn tokenize(body: &str) -> Result<Vec<Token>> {
    let mut out = Vec::new();
    let mut num = String::new();
    let mut flush = |num: &mut String, out: &mut Vec<Token>| -> Result<()> {
        if !num.is_empty() {
            let value: i64 = num
                .parse()
                .map_err(|_| ConvertError::Malformed(format!("not an integer: {num:?}")))?;
            out.push(Token::Num(value));
            num.clear();
        }
        Ok(())
    };
    for c in body.chars() {
        match c {
            '[' => {
                flush(&mut num, &mut out)?;
                out.push(Token::Open);
            }
            ']' => {
                flush(&mut num, &mut out)?;
                out.push(Token::Close);
            }
            c if c.is_whitespace() => flush(&mut num, &mut out)?,
            '-' | '0'..='9' => num.push(c),
            other => return Err(ConvertError::Malformed(format!("unexpected character {other:?}"))),
        }
    }
    flush(&mut num, &mut out)?;
    Ok(out)
}

/// The four header scalars plus the parsed `b`-vector and `a`-matrix,
/// `error` left unknown per sample (spec section 3: "−1 sentinel if
/// unknown, e.g. after conversion from external format").
pub struct ParsedChallenge {
    pub n: usize,
    pub num_samples: usize,
    pub q: u32,
    pub alpha: f64,
    pub b: Vec<i16>,
    pub a: Vec<Vec<i16>>,
}

struct TokenCursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    fn expect_open(&mut self) -> Result<()> {
        match self.tokens.get(self.pos) {
            Some(Token::Open) => {
                self.pos += 1;
                Ok(())
            }
            other => Err(ConvertError::Malformed(format!("expected '[', found {other:?}"))),
        }
    }

    fn expect_close(&mut self) -> Result<()> {
        match self.tokens.get(self.pos) {
            Some(Token::Close) => {
                self.pos += 1;
                Ok(())
            }
            other => Err(ConvertError::Malformed(format!("expected ']', found {other:?}"))),
        }
    }

    fn next_num(&mut self) -> Result<i64> {
        match self.tokens.get(self.pos) {
            Some(Token::Num(v)) => {
                self.pos += 1;
                Ok(*v)
            }
            other => Err(ConvertError::Malformed(format!("expected a number, found {other:?}"))),
        }
    }
}

pub fn parse_challenge_file(text: &str) -> Result<ParsedChallenge> {
    let mut lines = text.lines();
    let n: usize = lines
        .next()
        .ok_or_else(|| ConvertError::Malformed("missing n".to_string()))?
        .trim()
        .parse()
        .map_err(|_| ConvertError::Malformed("n is not an integer".to_string()))?;
    let num_samples: usize = lines
        .next()
        .ok_or_else(|| ConvertError::Malformed("missing numSamples".to_string()))?
        .trim()
        .parse()
        .map_err(|_| ConvertError::Malformed("numSamples is not an integer".to_string()))?;
    let q: u32 = lines
        .next()
        .ok_or_else(|| ConvertError::Malformed("missing q".to_string()))?
        .trim()
        .parse()
        .map_err(|_| ConvertError::Malformed("q is not an integer".to_string()))?;
    let alpha: f64 = lines
        .next()
        .ok_or_else(|| ConvertError::Malformed("missing alpha".to_string()))?
        .trim()
        .parse()
        .map_err(|_| ConvertError::Malformed("alpha is not a float".to_string()))?;

    let rest: String = lines.collect::<Vec<_>>().join(" ");
    let tokens = tokenize(&rest)?;
    let mut cursor = TokenCursor { tokens: &tokens, pos: 0 };

    cursor.expect_open()?;
    let mut b = Vec::with_capacity(num_samples);
    for _ in 0..num_samples {
        b.push(cursor.next_num()? as i16);
    }
    cursor.expect_close()?;

    cursor.expect_open()?;
    let mut a = Vec::with_capacity(num_samples);
    for _ in 0..num_samples {
        cursor.expect_open()?;
        let mut row = Vec::with_capacity(n);
        for _ in 0..n {
            row.push(cursor.next_num()? as i16);
        }
        cursor.expect_close()?;
        a.push(row);
    }
    cursor.expect_close()?;

    Ok(ParsedChallenge { n, num_samples, q, alpha, b, a })
}

/// Builds unsorted-store [`Sample`]s from a parsed challenge: `error` is
/// [`lpn_core::sample::UNKNOWN_ERROR`] until the initial transform or a
/// later step determines it.
pub fn samples_from_challenge(parsed: &ParsedChallenge) -> Vec<Sample> {
    (0..parsed.num_samples)
        .map(|i| {
            let mut sample = Sample::default();
            for (j, &v) in parsed.a[i].iter().enumerate() {
                sample.a[j] = v;
            }
            sample.sum_with_error = parsed.b[i];
            sample.recompute_hash(parsed.n, 0);
            sample
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_bracketed_blocks() {
        let text = "2\n3\n101\n0.01\n[5 -3 10]\n[[1 2] [3 4] [5 6]]\n";
        let parsed = parse_challenge_file(text).unwrap();
        assert_eq!(parsed.n, 2);
        assert_eq!(parsed.num_samples, 3);
        assert_eq!(parsed.q, 101);
        assert_eq!(parsed.alpha, 0.01);
        assert_eq!(parsed.b, vec![5, -3, 10]);
        assert_eq!(parsed.a, vec![vec![1, 2], vec![3, 4], vec![5, 6]]);
    }

    #[test]
    fn tolerates_newlines_inside_the_bracketed_blocks() {
        let text = "1\n2\n11\n0.0\n[1\n2]\n[[3]\n[4]]\n";
        let parsed = parse_challenge_file(text).unwrap();
        assert_eq!(parsed.b, vec![1, 2]);
        assert_eq!(parsed.a, vec![vec![3], vec![4]]);
    }

    #[test]
    fn rejects_mismatched_brackets() {
        let text = "1\n1\n11\n0.0\n[1]\n[[2]\n";
        assert!(parse_challenge_file(text).is_err());
    }

    #[test]
    fn samples_from_challenge_carry_unknown_error() {
        let parsed = ParsedChallenge {
            n: 2,
            num_samples: 1,
            q: 101,
            alpha: 0.01,
            b: vec![7],
            a: vec![vec![1, 2]],
        };
        let samples = samples_from_challenge(&parsed);
        assert_eq!(samples[0].error, lpn_core::sample::UNKNOWN_ERROR);
        assert_eq!(samples[0].sum_with_error, 7);
    }
}
