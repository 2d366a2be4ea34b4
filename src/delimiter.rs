//! Best-effort field separator detection for documents of unknown dialect.

use log::debug;

pub const CANDIDATE_DELIMITERS: [char; 5] = [',', ';', '\t', '|', ':'];
pub const DEFAULT_DELIMITER: char = ',';

const SAMPLE_LINES: usize = 5;

/// Outcome of scoring one candidate against the sampled lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimiterGuess {
    pub delimiter: char,
    pub consistent: bool,
    pub total_tokens: usize,
}

pub fn detect_delimiter(text: &str) -> char {
    detect_delimiter_with_report(text).delimiter
}

/// Scores every candidate over the first non-blank lines. Only candidates
/// yielding the same column count (more than one) on every sampled line
/// qualify; the one with the most tokens wins, earlier candidates win ties.
/// Falls back to a comma.
pub fn detect_delimiter_with_report(text: &str) -> DelimiterGuess {
    let sample: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(SAMPLE_LINES)
        .collect();

    let fallback = DelimiterGuess {
        delimiter: DEFAULT_DELIMITER,
        consistent: false,
        total_tokens: 0,
    };
    if sample.is_empty() {
        return fallback;
    }

    let mut best: Option<DelimiterGuess> = None;
    for candidate in CANDIDATE_DELIMITERS {
        let guess = score_candidate(&sample, candidate);
        debug!(
            "Delimiter candidate {:?}: consistent={} tokens={}",
            candidate, guess.consistent, guess.total_tokens
        );
        if !guess.consistent {
            continue;
        }
        if best.is_none_or(|current| guess.total_tokens > current.total_tokens) {
            best = Some(guess);
        }
    }

    best.unwrap_or(fallback)
}

fn score_candidate(sample: &[&str], delimiter: char) -> DelimiterGuess {
    let counts: Vec<usize> = sample
        .iter()
        .map(|line| line.split(delimiter).count())
        .collect();
    let consistent =
        counts.first().is_some_and(|first| *first > 1) && counts.iter().all(|n| n == &counts[0]);
    DelimiterGuess {
        delimiter,
        consistent,
        total_tokens: counts.iter().sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_delimiters() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3\n4,5,6"), ',');
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b\n1|2"), '|');
    }

    #[test]
    fn inconsistent_candidates_are_rejected() {
        // Commas vary per line, semicolons do not.
        let text = "name;note\nAda;x,y,z\nBob;plain";
        assert_eq!(detect_delimiter(text), ';');
    }

    #[test]
    fn blank_lines_are_skipped_when_sampling() {
        let text = "\n\na;b\n\n1;2\n";
        let guess = detect_delimiter_with_report(text);
        assert_eq!(guess.delimiter, ';');
        assert!(guess.consistent);
        assert_eq!(guess.total_tokens, 4);
    }

    #[test]
    fn empty_text_falls_back_to_comma() {
        let guess = detect_delimiter_with_report("   \n");
        assert_eq!(guess.delimiter, ',');
        assert!(!guess.consistent);
    }

    #[test]
    fn no_consistent_candidate_falls_back_to_comma() {
        let text = "a,b;c\n1;2;3,4,5\nx,y";
        assert_eq!(detect_delimiter(text), ',');
    }
}
