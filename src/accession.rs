use once_cell::sync::Lazy;
use regex::Regex;

// <digits>-<yy>-<digits>.<ext> as the last path segment
static ACCESSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|/)(\d+)-(\d{2})-(\d+)\.(\w+)$").expect("static regex")
});

/// Accession number decoded from an index file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accession {
    pub filer: u64,
    pub sequence: u64,
    pub extension: String,
}

impl Accession {
    /// Decode `edgar/data/1000275/0000950103-24-000123.txt`. The year group is
    /// matched but not kept.
    pub fn from_path(path: &str) -> Option<Self> {
        let caps = ACCESSION_RE.captures(path)?;
        Some(Self {
            filer: caps[1].parse().ok()?,
            sequence: caps[3].parse().ok()?,
            extension: caps[4].to_string(),
        })
    }
}
