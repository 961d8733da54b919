use regex::{Regex, RegexBuilder};

use crate::config::AnalyzerConfig;
use crate::errors::{AnalysisError, AnalysisResult};
use crate::record::AggregateCount;

/// Counts words and keyword occurrences in text.
///
/// Text is trimmed of ASCII control characters and spaces, then split on
/// runs of ASCII whitespace (space, tab, line feed, vertical tab, form feed,
/// carriage return); blank text has zero words. Non-ASCII spaces such as
/// U+00A0 are part of a word. Keyword
/// occurrences are the non-overlapping, case-insensitive matches of one
/// pattern. The analyzer holds no mutable state, so a single instance is
/// shared by reference across every worker of a run.
#[derive(Debug, Clone)]
pub struct Analyzer {
    keyword: Regex,
}

impl Analyzer {
    /// Builds an analyzer for a keyword, escaping it unless `is_regex` is set
    pub fn new(keyword: &str, is_regex: bool) -> AnalysisResult<Self> {
        if keyword.is_empty() {
            return Err(AnalysisError::invalid_pattern("keyword cannot be empty"));
        }

        let source = if is_regex {
            keyword.to_string()
        } else {
            regex::escape(keyword)
        };

        let keyword = RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .map_err(|e| AnalysisError::invalid_pattern(e.to_string()))?;

        // A pattern that matches nothing would count every position
        if keyword.is_match("") {
            return Err(AnalysisError::invalid_pattern(format!(
                "'{}' matches the empty string",
                source
            )));
        }

        Ok(Self { keyword })
    }

    pub fn from_config(config: &AnalyzerConfig) -> AnalysisResult<Self> {
        Self::new(&config.keyword, config.keyword_is_regex)
    }

    /// The compiled keyword pattern
    pub fn pattern(&self) -> &str {
        self.keyword.as_str()
    }

    pub fn count_words(&self, text: &str) -> u64 {
        let trimmed = text.trim_matches(|c: char| c <= ' ');
        if trimmed.is_empty() {
            return 0;
        }
        trimmed
            .split(is_word_separator)
            .filter(|token| !token.is_empty())
            .count() as u64
    }

    pub fn count_keywords(&self, text: &str) -> u64 {
        self.keyword.find_iter(text).count() as u64
    }

    /// Counts one body of text as a whole
    pub fn analyze(&self, text: &str) -> AggregateCount {
        AggregateCount::new(self.count_words(text), self.count_keywords(text))
    }

    /// Counts lines one at a time into a local accumulator
    pub fn analyze_lines<S: AsRef<str>>(&self, lines: &[S]) -> AggregateCount {
        let mut total = AggregateCount::ZERO;
        for line in lines {
            total += self.analyze(line.as_ref());
        }
        total
    }
}

fn is_word_separator(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0B' | '\x0C' | '\r')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_counting() {
        let analyzer = Analyzer::new("error", false).unwrap();
        assert_eq!(analyzer.count_words("hello world"), 2);
        assert_eq!(analyzer.count_words("  spaced \t out\n words  "), 3);
        assert_eq!(analyzer.count_words(""), 0);
        assert_eq!(analyzer.count_words(" \n\t "), 0);
    }

    #[test]
    fn test_word_separators_are_ascii_only() {
        let analyzer = Analyzer::new("error", false).unwrap();
        assert_eq!(analyzer.count_words("a\u{00A0}b"), 1);
        assert_eq!(analyzer.count_words("a\u{2003}b c"), 2);
        assert_eq!(analyzer.count_words("a\x0Bb\x0Cc"), 3);
    }

    #[test]
    fn test_control_characters_are_trimmed() {
        let analyzer = Analyzer::new("error", false).unwrap();
        assert_eq!(analyzer.count_words("\x01"), 0);
        assert_eq!(analyzer.count_words("\x01a b\x1F"), 2);
        // Only trimmed at the ends, never a separator inside the text
        assert_eq!(analyzer.count_words("a\x01b"), 1);
    }

    #[test]
    fn test_keyword_is_case_insensitive() {
        let analyzer = Analyzer::new("error", false).unwrap();
        assert_eq!(analyzer.count_keywords("ERROR occurred error here"), 2);
        assert_eq!(analyzer.count_keywords("Error: errors everywhere"), 2);
        assert_eq!(analyzer.count_keywords("all good"), 0);
    }

    #[test]
    fn test_keyword_matches_do_not_overlap() {
        let analyzer = Analyzer::new("aa", false).unwrap();
        assert_eq!(analyzer.count_keywords("aaaa"), 2);
        assert_eq!(analyzer.count_keywords("aaa"), 1);
    }

    #[test]
    fn test_literal_keyword_is_escaped() {
        let analyzer = Analyzer::new("a.b", false).unwrap();
        assert_eq!(analyzer.pattern(), r"a\.b");
        assert_eq!(analyzer.count_keywords("a.b axb"), 1);
    }

    #[test]
    fn test_regex_keyword() {
        let analyzer = Analyzer::new(r"fatal|panic", true).unwrap();
        assert_eq!(analyzer.count_keywords("FATAL then Panic then fatality"), 3);
    }

    #[test]
    fn test_invalid_patterns_are_rejected() {
        assert!(matches!(
            Analyzer::new("", false),
            Err(AnalysisError::InvalidPattern(_))
        ));
        assert!(matches!(
            Analyzer::new("(unclosed", true),
            Err(AnalysisError::InvalidPattern(_))
        ));
        assert!(matches!(
            Analyzer::new("x*", true),
            Err(AnalysisError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_analyze_lines_sums_per_line() {
        let analyzer = Analyzer::new("error", false).unwrap();
        let lines = ["hello world", "", "ERROR occurred error here"];
        assert_eq!(analyzer.analyze_lines(&lines), AggregateCount::new(6, 2));
    }
}
