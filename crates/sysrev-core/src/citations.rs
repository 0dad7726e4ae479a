//! Citation-marker integrity enforcement.
//!
//! The single point guaranteeing that no citation in final prose can
//! reference a source outside the verified bibliography. Out-of-range
//! markers are silently removed, not flagged — the design goal is integrity
//! of the artifact, not diagnostics for the generator.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

static MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(\d+)\]").unwrap());

/// Strip every occurrence of any citation marker `[k]` with `k < 1` or
/// `k > n_sources`. Valid markers — duplicates and any ordering included —
/// are left untouched. Idempotent.
///
/// Removal can splice the surrounding text into a marker the initial scan
/// never saw (`"[1[7]]"` → `"[1]"`), so the scan-and-strip repeats until a
/// pass removes nothing. Each pass shortens the text, so the loop terminates.
pub fn enforce_citations(text: &str, n_sources: usize) -> String {
    let mut out = text.to_string();
    loop {
        let mut invalid: BTreeSet<String> = BTreeSet::new();
        for cap in MARKER.captures_iter(&out) {
            let in_range = cap[1]
                .parse::<usize>()
                .is_ok_and(|k| k >= 1 && k <= n_sources);
            if !in_range {
                invalid.insert(cap[0].to_string());
            }
        }
        if invalid.is_empty() {
            return out;
        }
        for marker in &invalid {
            out = out.replace(marker.as_str(), "");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_out_of_range_markers() {
        assert_eq!(
            enforce_citations("Emissions have declined [1][3][7].", 3),
            "Emissions have declined [1][3]."
        );
    }

    #[test]
    fn zero_is_never_valid() {
        assert_eq!(enforce_citations("see [0] and [1]", 3), "see  and [1]");
    }

    #[test]
    fn strips_everything_when_no_sources() {
        assert_eq!(enforce_citations("claims [1] and [2]", 0), "claims  and ");
    }

    #[test]
    fn valid_duplicates_survive_in_order() {
        let text = "see [2], then [1], then [2] again";
        assert_eq!(enforce_citations(text, 2), text);
    }

    #[test]
    fn every_occurrence_of_an_invalid_marker_goes() {
        assert_eq!(enforce_citations("[9] a [9] b [9]", 3), " a  b ");
    }

    #[test]
    fn untouched_text_passes_through() {
        let text = "no markers here, just [brackets] and 12 digits";
        assert_eq!(enforce_citations(text, 5), text);
    }

    #[test]
    fn overlong_digit_runs_are_out_of_range() {
        // Larger than usize::MAX — unparsable counts as invalid.
        assert_eq!(
            enforce_citations("x [99999999999999999999999999] y", 5),
            "x  y"
        );
    }

    #[test]
    fn spliced_markers_are_stripped_too() {
        // Removing [7] splices the remainder into [1], which must not
        // survive when the bibliography is empty.
        assert_eq!(enforce_citations("[1[7]]", 0), "");
        // Nested twice over.
        assert_eq!(enforce_citations("[1[7[8]]]", 0), "");
    }

    #[test]
    fn no_marker_out_of_range_survives_splicing() {
        for n_sources in 0..4 {
            let out = enforce_citations("a [1[7]] b [2[9]] c", n_sources);
            for cap in regex::Regex::new(r"\[(\d+)\]").unwrap().captures_iter(&out) {
                let k: usize = cap[1].parse().unwrap();
                assert!(k >= 1 && k <= n_sources, "marker [{k}] with n={n_sources}");
            }
        }
    }

    #[test]
    fn idempotent_on_splicing_input() {
        for (text, n_sources) in [("[1[7]]", 0), ("[1[7]]", 1), ("x[2[3[4]]]y", 2)] {
            let once = enforce_citations(text, n_sources);
            let twice = enforce_citations(&once, n_sources);
            assert_eq!(once, twice, "input {text:?} with n={n_sources}");
        }
    }

    #[test]
    fn idempotent_for_mixed_input() {
        let text = "a [1] b [4] c [0] d [2][2]";
        let once = enforce_citations(text, 2);
        let twice = enforce_citations(&once, 2);
        assert_eq!(once, twice);
        assert_eq!(once, "a [1] b  c  d [2][2]");
    }
}
