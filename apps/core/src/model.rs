use std::path::Path;

/// One candidate shown by the ticket box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub text: String,
}

impl Row {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }

    /// Builds a row from one tab-separated candidate line: the first two
    /// fields joined by a single space, anything after them dropped.
    pub fn from_tsv_line(line: &str) -> Self {
        let text = line
            .trim()
            .split('\t')
            .take(2)
            .collect::<Vec<_>>()
            .join(" ");
        Self { text }
    }
}

pub fn parse_candidates(raw: &str) -> Vec<Row> {
    raw.lines().map(Row::from_tsv_line).collect()
}

pub fn load_candidates(path: &Path) -> Result<Vec<Row>, std::io::Error> {
    let raw = std::fs::read_to_string(path)?;
    Ok(parse_candidates(&raw))
}
