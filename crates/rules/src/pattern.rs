//! Compiled `LIKE` wildcard patterns.
//!
//! `%` matches any run of characters (including empty), `_` matches exactly
//! one. The pattern is compiled to a token sequence and matched with an
//! iterative two-pointer scan, bounded at O(pattern x target). No general
//! regular-expression engine sits behind it.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatternToken {
    Literal(char),
    AnyOne,
    AnyRun,
}

/// A compiled `LIKE` pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikePattern {
    raw: String,
    tokens: Vec<PatternToken>,
}

impl LikePattern {
    pub fn compile(raw: &str) -> Self {
        let mut tokens = Vec::with_capacity(raw.len());
        for c in raw.chars() {
            match c {
                // Consecutive `%` runs collapse to one.
                '%' => {
                    if tokens.last() != Some(&PatternToken::AnyRun) {
                        tokens.push(PatternToken::AnyRun);
                    }
                }
                '_' => tokens.push(PatternToken::AnyOne),
                other => tokens.push(PatternToken::Literal(other)),
            }
        }
        Self {
            raw: raw.to_string(),
            tokens,
        }
    }

    /// The original pattern text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match the whole target against the pattern. Case-sensitive, like
    /// ANSI `LIKE`.
    pub fn matches(&self, target: &str) -> bool {
        let target: Vec<char> = target.chars().collect();
        let pattern = &self.tokens;

        let mut ti = 0;
        let mut pi = 0;
        // Most recent AnyRun, for retrying with a longer run.
        let mut run_pi: Option<usize> = None;
        let mut run_ti = 0;

        while ti < target.len() {
            match pattern.get(pi) {
                Some(PatternToken::AnyRun) => {
                    run_pi = Some(pi);
                    run_ti = ti;
                    pi += 1;
                }
                Some(PatternToken::AnyOne) => {
                    pi += 1;
                    ti += 1;
                }
                Some(PatternToken::Literal(c)) if *c == target[ti] => {
                    pi += 1;
                    ti += 1;
                }
                _ => match run_pi {
                    // Let the last run absorb one more character.
                    Some(rp) => {
                        pi = rp + 1;
                        run_ti += 1;
                        ti = run_ti;
                    }
                    None => return false,
                },
            }
        }

        // Only trailing runs may remain unconsumed.
        while pattern.get(pi) == Some(&PatternToken::AnyRun) {
            pi += 1;
        }
        pi == pattern.len()
    }
}
