//! Venue name expansion.
//!
//! Sources report venues as abbreviations ("NIPS", "CVPR"); citations
//! want the full proceedings name. Unknown venues pass through as-is.

/// Abbreviation to full venue name. Keys are matched case-insensitively.
const VENUES: &[(&str, &str)] = &[
    ("nips", "Advances in Neural Information Processing Systems"),
    ("neurips", "Advances in Neural Information Processing Systems"),
    ("icml", "International Conference on Machine Learning"),
    ("iclr", "International Conference on Learning Representations"),
    ("cvpr", "IEEE/CVF Conference on Computer Vision and Pattern Recognition"),
    ("iccv", "IEEE/CVF International Conference on Computer Vision"),
    ("eccv", "European Conference on Computer Vision"),
    ("aaai", "AAAI Conference on Artificial Intelligence"),
    ("ijcai", "International Joint Conference on Artificial Intelligence"),
    ("acl", "Annual Meeting of the Association for Computational Linguistics"),
    ("emnlp", "Conference on Empirical Methods in Natural Language Processing"),
    ("naacl", "Conference of the North American Chapter of the Association for Computational Linguistics"),
    ("kdd", "ACM SIGKDD Conference on Knowledge Discovery and Data Mining"),
    ("sigir", "International ACM SIGIR Conference on Research and Development in Information Retrieval"),
    ("www", "The Web Conference"),
    ("jmlr", "Journal of Machine Learning Research"),
    ("pami", "IEEE Transactions on Pattern Analysis and Machine Intelligence"),
    ("tpami", "IEEE Transactions on Pattern Analysis and Machine Intelligence"),
    ("corr", "Computing Research Repository"),
];

/// Full name for a known abbreviation.
pub fn expand_venue(abbrev: &str) -> Option<&'static str> {
    let key = abbrev.trim().to_lowercase();
    VENUES
        .iter()
        .find(|(abbr, _)| *abbr == key)
        .map(|(_, full)| *full)
}

/// Expanded name when known, the original spelling otherwise.
pub fn display_venue(venue: &str) -> String {
    expand_venue(venue)
        .map(str::to_string)
        .unwrap_or_else(|| venue.trim().to_string())
}

/// Heuristic: does this venue name look like a conference rather than a
/// journal?
pub fn is_conference(venue: &str) -> bool {
    let lowered = display_venue(venue).to_lowercase();
    const MARKERS: &[&str] = &[
        "conference",
        "proceedings",
        "symposium",
        "workshop",
        "meeting",
        "advances in neural",
    ];
    MARKERS.iter().any(|m| lowered.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_abbreviations() {
        assert_eq!(
            expand_venue("NIPS"),
            Some("Advances in Neural Information Processing Systems")
        );
        assert_eq!(expand_venue("neurips"), expand_venue("NIPS"));
        assert_eq!(
            expand_venue(" icml "),
            Some("International Conference on Machine Learning")
        );
    }

    #[test]
    fn unknown_venue_passes_through() {
        assert_eq!(expand_venue("VLDB Endowment"), None);
        assert_eq!(display_venue(" VLDB Endowment "), "VLDB Endowment");
    }

    #[test]
    fn conference_detection() {
        assert!(is_conference("NIPS"));
        assert!(is_conference("Proceedings of the 38th ICML"));
        assert!(!is_conference("Journal of Machine Learning Research"));
        assert!(!is_conference("IEEE Transactions on Pattern Analysis and Machine Intelligence"));
    }
}
