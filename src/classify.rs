//! Header/data classification shared by the counting and parsing passes.

/// How a single line was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Header block noise: column captions, dash rules, blanks, preamble text.
    Header,
    Data,
    /// Non-data line after the header block ended (trailing blanks etc.).
    Ignored,
}

/// `true` when the line starts with one or more ASCII digits followed
/// immediately by `|`.
pub fn is_data_line(line: &str) -> bool {
    let bytes = line.as_bytes();
    let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    digits > 0 && bytes.get(digits) == Some(&b'|')
}

fn is_header_noise(line: &str) -> bool {
    line.starts_with("CIK|") || line.contains("---") || line.trim().is_empty()
}

/// Two-state machine: header-skip until the first data line, then data.
#[derive(Debug, Default, Clone)]
pub struct LineClassifier {
    in_data: bool,
}

impl LineClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_data(&self) -> bool {
        self.in_data
    }

    pub fn classify(&mut self, line: &str) -> LineKind {
        if self.in_data {
            return if is_data_line(line) {
                LineKind::Data
            } else {
                LineKind::Ignored
            };
        }

        if is_header_noise(line) {
            LineKind::Header
        } else if is_data_line(line) {
            self.in_data = true;
            LineKind::Data
        } else {
            LineKind::Header
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_line_predicate() {
        assert!(is_data_line("1000275|ACME|10-K|20240115|x"));
        assert!(is_data_line("7|"));
        assert!(!is_data_line("|ACME"));
        assert!(!is_data_line("CIK|Company Name"));
        assert!(!is_data_line("12a|x"));
        assert!(!is_data_line(""));
    }

    #[test]
    fn header_block_then_data() {
        let mut c = LineClassifier::new();
        let kinds: Vec<LineKind> = [
            "Description:           Master Index of EDGAR Dissemination Feed",
            "Last Data Received:    January 15, 2024",
            "",
            "CIK|Company Name|Form Type|Date Filed|Filename",
            "--------------------------------------------------------------------------------",
            "1000275|ACME|10-K|20240115|edgar/data/1000275/0000950103-24-000123.txt",
            "not data",
            "1000276|BETA|8-K|20240115|edgar/data/1000276/0000950103-24-000124.txt",
            "",
        ]
        .iter()
        .map(|l| c.classify(l))
        .collect();

        use LineKind::*;
        assert_eq!(
            kinds,
            vec![Header, Header, Header, Header, Header, Data, Ignored, Data, Ignored]
        );
        assert!(c.in_data());
    }

    #[test]
    fn dash_rule_is_header_even_if_numeric_prefix_follows() {
        let mut c = LineClassifier::new();
        assert_eq!(c.classify("123|---|"), LineKind::Header);
        assert!(!c.in_data());
    }
}
