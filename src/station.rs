use std::cmp::Ordering;
use std::fmt;

// ---------------------------------------------------------------------------
// StationCode – typed field-station identifier
// ---------------------------------------------------------------------------

/// Sub-station suffix of a coded station: the two exploratory boreholes come
/// first in any listing, then the numbered ones ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Suffix {
    /// `EX1` / `EX2`.
    Exploratory(u8),
    /// `01`..`09`.
    Numbered(u8),
}

impl fmt::Display for Suffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Suffix::Exploratory(n) => write!(f, "EX{n}"),
            Suffix::Numbered(n) => write!(f, "{n:02}"),
        }
    }
}

/// A station identifier. Campaign stations follow `SS-<nn>[-<suffix>]`
/// (e.g. `SS-01`, `SS-05-EX1`, `SS-12-03`); anything else is kept verbatim
/// so a stray label in the sheet never aborts the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StationCode {
    raw: String,
    parts: Option<(u8, Option<Suffix>)>,
}

impl StationCode {
    /// Build from the raw cell text. Returns `None` only for blank input;
    /// non-conforming labels are preserved uncoded.
    pub fn new(raw: &str) -> Option<StationCode> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(StationCode {
            raw: raw.to_string(),
            parts: parse_parts(raw),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Site number for coded stations (`SS-05-EX1` → 5).
    pub fn site(&self) -> Option<u8> {
        self.parts.map(|(site, _)| site)
    }

    pub fn suffix(&self) -> Option<Suffix> {
        self.parts.and_then(|(_, suffix)| suffix)
    }

    /// `SS-<nn>` prefix shared by all sub-stations of a site.
    pub fn site_prefix(&self) -> Option<String> {
        self.site().map(|n| format!("SS-{n:02}"))
    }

    /// Sort key implementing the display order: coded stations first, by
    /// site then EX1, EX2, 01..09; everything else lexicographic after.
    fn sort_key(&self) -> (u8, u8, u8, u8, &str) {
        match self.parts {
            Some((site, suffix)) => {
                let (kind, n) = match suffix {
                    None => (0, 0),
                    Some(Suffix::Exploratory(n)) => (1, n),
                    Some(Suffix::Numbered(n)) => (2, n),
                };
                (0, site, kind, n, "")
            }
            None => (1, 0, 0, 0, self.raw.as_str()),
        }
    }
}

fn parse_parts(raw: &str) -> Option<(u8, Option<Suffix>)> {
    let rest = raw.strip_prefix("SS-")?;
    let (site_str, suffix_str) = match rest.split_once('-') {
        Some((site, suffix)) => (site, Some(suffix)),
        None => (rest, None),
    };
    if site_str.len() != 2 {
        return None;
    }
    let site: u8 = site_str.parse().ok()?;
    let suffix = match suffix_str {
        None => None,
        Some(s) => Some(parse_suffix(s)?),
    };
    Some((site, suffix))
}

fn parse_suffix(s: &str) -> Option<Suffix> {
    if let Some(n) = s.strip_prefix("EX") {
        let n: u8 = n.parse().ok()?;
        return (1..=2).contains(&n).then_some(Suffix::Exploratory(n));
    }
    if s.len() == 2 {
        let n: u8 = s.parse().ok()?;
        return (1..=9).contains(&n).then_some(Suffix::Numbered(n));
    }
    None
}

impl fmt::Display for StationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl PartialOrd for StationCode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StationCode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> StationCode {
        StationCode::new(s).unwrap()
    }

    #[test]
    fn parses_site_and_suffix() {
        let c = code("SS-05-EX1");
        assert_eq!(c.site(), Some(5));
        assert_eq!(c.suffix(), Some(Suffix::Exploratory(1)));
        assert_eq!(c.site_prefix().as_deref(), Some("SS-05"));
        assert_eq!(c.to_string(), "SS-05-EX1");
    }

    #[test]
    fn bare_site_code_has_no_suffix() {
        let c = code("SS-12");
        assert_eq!(c.site(), Some(12));
        assert_eq!(c.suffix(), None);
    }

    #[test]
    fn out_of_range_suffix_is_left_uncoded() {
        assert_eq!(code("SS-01-10").site(), None);
        assert_eq!(code("SS-01-EX3").site(), None);
        assert_eq!(code("Borehole A").site(), None);
    }

    #[test]
    fn blank_station_is_rejected() {
        assert!(StationCode::new("  ").is_none());
    }

    #[test]
    fn ordering_puts_exploratory_first() {
        let mut codes = vec![
            code("SS-05-02"),
            code("SS-05-EX2"),
            code("SS-05-01"),
            code("SS-05-EX1"),
        ];
        codes.sort();
        let names: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["SS-05-EX1", "SS-05-EX2", "SS-05-01", "SS-05-02"]);
    }

    #[test]
    fn sites_sort_numerically() {
        let mut codes = vec![code("SS-10-01"), code("SS-02-01")];
        codes.sort();
        assert_eq!(codes[0].to_string(), "SS-02-01");
    }
}
