//! Approximate matching of reporting-airport names to IATA codes.
//!
//! Scores are integers in `0..=100`. The weighted ratio combines a plain
//! character ratio with token-order-insensitive and substring-aware variants,
//! then discounts the variants so an exact character match always ranks
//! highest.

use std::collections::BTreeSet;

use metrics::counter;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::domain::{ReferenceAirport, SurrogateId};
use crate::pipeline::processing::masters::MasterTables;

const TOKEN_SCALE: f64 = 0.95;
const PARTIAL_SCALE: f64 = 0.9;
const LONG_PARTIAL_SCALE: f64 = 0.6;

/// Upper-case, turn punctuation into spaces and collapse whitespace.
pub fn preprocess(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Length of the longest common subsequence of two char slices.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut row = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            row[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                row[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev[b.len()]
}

/// Indel similarity: `2 * matches / (|a| + |b|)`, scaled to 0..=100.
fn ratio(a: &str, b: &str) -> f64 {
    let (a, b): (Vec<char>, Vec<char>) = (a.chars().collect(), b.chars().collect());
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let total = (a.len() + b.len()) as f64;
    200.0 * lcs_len(&a, &b) as f64 / total
}

/// Best `ratio` of the shorter string against every equal-length window of the longer.
fn partial_ratio(a: &str, b: &str) -> f64 {
    let (a, b): (Vec<char>, Vec<char>) = (a.chars().collect(), b.chars().collect());
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return 0.0;
    }

    let needle: String = short.iter().collect();
    let mut best = 0.0_f64;
    for window in long.windows(short.len()) {
        let window: String = window.iter().collect();
        best = best.max(ratio(&needle, &window));
        if best >= 100.0 {
            break;
        }
    }
    best
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn token_sort(a: &str, b: &str, scorer: fn(&str, &str) -> f64) -> f64 {
    scorer(&sorted_tokens(a), &sorted_tokens(b))
}

fn token_set(a: &str, b: &str, scorer: fn(&str, &str) -> f64) -> f64 {
    let left: BTreeSet<&str> = a.split_whitespace().collect();
    let right: BTreeSet<&str> = b.split_whitespace().collect();
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let join = |tokens: Vec<&str>| tokens.join(" ");
    let sect = join(left.intersection(&right).copied().collect());
    let only_left = join(left.difference(&right).copied().collect());
    let only_right = join(right.difference(&left).copied().collect());

    let combined_left = format!("{} {}", sect, only_left).trim().to_string();
    let combined_right = format!("{} {}", sect, only_right).trim().to_string();

    scorer(&sect, &combined_left)
        .max(scorer(&sect, &combined_right))
        .max(scorer(&combined_left, &combined_right))
}

/// Weighted similarity of two names in `0..=100`.
pub fn weighted_ratio(a: &str, b: &str) -> u8 {
    let (a, b) = (preprocess(a), preprocess(b));
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let (len_a, len_b) = (a.chars().count() as f64, b.chars().count() as f64);
    let len_ratio = len_a.max(len_b) / len_a.min(len_b);
    let base = ratio(&a, &b);

    let best = if len_ratio < 1.5 {
        base.max(token_sort(&a, &b, ratio) * TOKEN_SCALE)
            .max(token_set(&a, &b, ratio) * TOKEN_SCALE)
    } else {
        let scale = if len_ratio < 8.0 { PARTIAL_SCALE } else { LONG_PARTIAL_SCALE };
        base.max(partial_ratio(&a, &b) * scale)
            .max(token_sort(&a, &b, partial_ratio) * TOKEN_SCALE * scale)
            .max(token_set(&a, &b, partial_ratio) * TOKEN_SCALE * scale)
    };

    best.round().clamp(0.0, 100.0) as u8
}

/// The best-scoring reference entry for a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchCandidate {
    pub reference_name: String,
    pub iata_code: String,
    pub score: u8,
}

/// Outcome of one pass over the airport master.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    pub matched: usize,
    pub unmatched: usize,
    pub already_coded: usize,
}

/// Assigns IATA codes to airports by exhaustive weighted-ratio scoring.
pub struct AirportMatcher {
    reference: Vec<ReferenceAirport>,
    threshold: u8,
}

impl AirportMatcher {
    pub fn new(reference: Vec<ReferenceAirport>, threshold: u8) -> Self {
        Self { reference, threshold }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Highest-scoring reference entry. On a tie the earliest entry wins.
    pub fn best_match(&self, name: &str) -> Option<MatchCandidate> {
        let mut best: Option<(&ReferenceAirport, u8)> = None;
        for entry in &self.reference {
            let score = weighted_ratio(name, &entry.name);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((entry, score));
            }
        }
        best.map(|(entry, score)| MatchCandidate {
            reference_name: entry.name.clone(),
            iata_code: entry.iata_code.clone(),
            score,
        })
    }

    /// Accept a candidate only when its score is strictly above the threshold.
    pub fn accept(&self, name: &str) -> Option<MatchCandidate> {
        self.best_match(name).filter(|c| c.score > self.threshold)
    }

    /// Fill `iata_code` for every airport that has none.
    ///
    /// Only the code column changes; airport ids and other dimensions are
    /// left alone.
    #[instrument(skip(self, masters), fields(reference = self.reference.len(), threshold = self.threshold))]
    pub fn resolve_iata(&self, masters: &mut MasterTables) -> MatchSummary {
        let mut summary = MatchSummary::default();
        let pending: Vec<(SurrogateId, String)> = masters
            .airports
            .iter()
            .filter(|(id, _)| {
                let coded = masters.iata_code(*id).is_some();
                if coded {
                    summary.already_coded += 1;
                }
                !coded
            })
            .map(|(id, key)| (id, key.name().to_string()))
            .collect();

        for (airport_id, name) in pending {
            match self.accept(&name) {
                Some(candidate) => {
                    debug!(
                        airport = %name,
                        reference = %candidate.reference_name,
                        score = candidate.score,
                        "Matched airport"
                    );
                    if masters.set_iata_code(airport_id, &candidate.iata_code) {
                        summary.matched += 1;
                    }
                }
                None => {
                    warn!(airport = %name, "No reference airport above threshold");
                    summary.unmatched += 1;
                }
            }
        }

        counter!("etl_airports_matched_total").increment(summary.matched as u64);
        info!(
            "✅ Airport code matching: {} matched, {} unmatched",
            summary.matched, summary.unmatched
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AirportKey;

    fn reference(entries: &[(&str, &str)]) -> Vec<ReferenceAirport> {
        entries
            .iter()
            .map(|(name, code)| ReferenceAirport {
                name: name.to_string(),
                iata_code: code.to_string(),
            })
            .collect()
    }

    fn masters_with(names: &[&str]) -> MasterTables {
        let mut masters = MasterTables::new();
        let keys: Vec<AirportKey> = names.iter().map(|n| AirportKey::new(n)).collect();
        masters.airports.register(&keys);
        masters
    }

    #[test]
    fn test_weighted_ratio_scores() {
        assert_eq!(weighted_ratio("GATWICK", "gatwick"), 100);
        assert_eq!(weighted_ratio("HEATHROW LONDON", "LONDON HEATHROW"), 95);
        assert_eq!(weighted_ratio("LONDON HEATHROW AIRPORT", "LONDON HEATHROW"), 90);
        assert_eq!(weighted_ratio("", "LONDON HEATHROW"), 0);
        assert!(weighted_ratio("ABERDEEN", "LONDON HEATHROW") < 50);
    }

    #[test]
    fn test_single_insertion_costs_little() {
        assert_eq!(weighted_ratio("CORK", "CORKS"), 89);
        assert_eq!(weighted_ratio("GATWICK", "GATWICKX"), 93);
        assert_eq!(lcs_len(&['A', 'B', 'C', 'D'], &['A', 'C', 'B', 'D']), 3);
    }

    #[test]
    fn test_near_threshold_name_is_accepted() {
        let matcher = AirportMatcher::new(reference(&[("CORKS", "ORK")]), 80);
        let candidate = matcher.accept("CORK").unwrap();
        assert_eq!(candidate.iata_code, "ORK");
        assert_eq!(candidate.score, 89);
    }

    #[test]
    fn test_punctuation_is_ignored() {
        assert_eq!(weighted_ratio("LONDON (HEATHROW)", "LONDON HEATHROW"), 100);
    }

    #[test]
    fn test_threshold_boundary() {
        let refs = reference(&[("LONDON HEATHROW", "LHR")]);

        let mut masters = masters_with(&["LONDON HEATHROW AIRPORT"]);
        let summary = AirportMatcher::new(refs.clone(), 80).resolve_iata(&mut masters);
        assert_eq!(summary.matched, 1);
        assert_eq!(masters.iata_code(SurrogateId(1)), Some("LHR"));

        let mut masters = masters_with(&["LONDON HEATHROW AIRPORT"]);
        let summary = AirportMatcher::new(refs, 90).resolve_iata(&mut masters);
        assert_eq!(summary.unmatched, 1);
        assert_eq!(masters.iata_code(SurrogateId(1)), None);
    }

    #[test]
    fn test_tie_goes_to_first_reference_entry() {
        let matcher = AirportMatcher::new(reference(&[("GATWICK", "LGW"), ("GATWICK", "XGW")]), 80);
        let candidate = matcher.best_match("GATWICK").unwrap();
        assert_eq!(candidate.iata_code, "LGW");
        assert_eq!(candidate.score, 100);
    }

    #[test]
    fn test_existing_codes_are_kept() {
        let mut masters = masters_with(&["GATWICK", "LUTON"]);
        masters.set_iata_code(SurrogateId(1), "ZZZ");
        let matcher = AirportMatcher::new(reference(&[("GATWICK", "LGW"), ("LUTON", "LTN")]), 80);

        let summary = matcher.resolve_iata(&mut masters);
        assert_eq!(summary, MatchSummary { matched: 1, unmatched: 0, already_coded: 1 });
        assert_eq!(masters.iata_code(SurrogateId(1)), Some("ZZZ"));
        assert_eq!(masters.iata_code(SurrogateId(2)), Some("LTN"));
        assert_eq!(masters.counts().airports, 2);
    }

    #[test]
    fn test_empty_reference_matches_nothing() {
        let matcher = AirportMatcher::new(Vec::new(), 80);
        assert!(matcher.best_match("GATWICK").is_none());
    }
}
