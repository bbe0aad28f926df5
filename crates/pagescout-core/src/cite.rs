//! Citation rendering for resolved papers.
//!
//! Two output forms: a GB/T 7714 style reference line (`[C]//` for
//! conference papers, `[J]` for journal articles) and a BibTeX entry.

use crate::{ResolvedPaper, venues};

/// One-line reference string.
pub fn format_citation(paper: &ResolvedPaper) -> String {
    let r = &paper.record;
    let authors = if r.authors.is_empty() {
        "Anon".to_string()
    } else {
        r.authors.join(", ")
    };
    let mut out = format!("{authors}. {}", r.title);

    if let Some(venue) = &r.venue {
        let full = venues::display_venue(venue);
        if venues::is_conference(venue) {
            out.push_str(&format!("[C]//{full}"));
        } else {
            out.push_str(&format!("[J]. {full}"));
            if let Some(volume) = &r.volume {
                out.push_str(&format!(", {volume}"));
                if let Some(issue) = &r.issue {
                    out.push_str(&format!("({issue})"));
                }
            }
        }
    }
    if let Some(year) = r.year {
        out.push_str(&format!(", {year}"));
    }
    if let Some(pages) = &r.pages {
        out.push_str(&format!(": {pages}"));
    }
    out.push('.');
    out
}

/// BibTeX entry; `@inproceedings` for conferences, `@article` otherwise.
pub fn format_bibtex(paper: &ResolvedPaper) -> String {
    let r = &paper.record;
    let conference = r.venue.as_deref().is_some_and(venues::is_conference);
    let kind = if conference { "inproceedings" } else { "article" };
    let venue_field = if conference { "booktitle" } else { "journal" };

    let mut fields = Vec::new();
    fields.push(format!("  title = {{{}}}", r.title));
    if !r.authors.is_empty() {
        fields.push(format!("  author = {{{}}}", r.authors.join(" and ")));
    }
    if let Some(venue) = &r.venue {
        fields.push(format!("  {venue_field} = {{{}}}", venues::display_venue(venue)));
    }
    if let Some(year) = r.year {
        fields.push(format!("  year = {{{year}}}"));
    }
    if let Some(volume) = &r.volume {
        fields.push(format!("  volume = {{{volume}}}"));
    }
    if let Some(issue) = &r.issue {
        fields.push(format!("  number = {{{issue}}}"));
    }
    if let Some(pages) = &r.pages {
        let spelled = match pages.end() {
            Some(end) => format!("{}--{}", pages.start(), end),
            None => pages.start().to_string(),
        };
        fields.push(format!("  pages = {{{spelled}}}"));
    }
    if let Some(doi) = &r.doi {
        fields.push(format!("  doi = {{{doi}}}"));
    }
    if let Some(url) = &r.url {
        fields.push(format!("  url = {{{url}}}"));
    }

    format!("@{kind}{{{},\n{}\n}}", citation_key(paper), fields.join(",\n"))
}

/// `lastname2017firstword` style key.
fn citation_key(paper: &ResolvedPaper) -> String {
    let r = &paper.record;
    let surname = r
        .authors
        .first()
        .and_then(|a| a.split_whitespace().last())
        .unwrap_or("anon")
        .to_lowercase();
    let year = r.year.map(|y| y.to_string()).unwrap_or_default();
    let first_word = crate::matching::normalize_query(&r.title)
        .split(' ')
        .find(|w| w.len() > 3)
        .unwrap_or("paper")
        .to_string();
    format!("{surname}{year}{first_word}")
}
