//! Terminal output formatting.

use std::io::IsTerminal;

use owo_colors::OwoColorize;
use pagescout_core::{CacheStats, ResolvedPaper, cite};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub fn enabled(self) -> bool {
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => std::io::stdout().is_terminal(),
        }
    }
}

fn field(label: &str, value: &str, color: bool) {
    if color {
        println!("  {:<10} {}", label.dimmed(), value);
    } else {
        println!("  {label:<10} {value}");
    }
}

pub fn print_resolved(paper: &ResolvedPaper, color: bool) {
    let r = &paper.record;
    if color {
        println!("{} {}", "found".green().bold(), r.title.bold());
    } else {
        println!("found {}", r.title);
    }
    if !r.authors.is_empty() {
        field("authors", &r.authors.join(", "), color);
    }
    if let Some(venue) = &r.venue {
        field("venue", venue, color);
    }
    if let Some(year) = r.year {
        field("year", &year.to_string(), color);
    }
    match (&r.pages, &paper.pages_source) {
        (Some(pages), Some(via)) => field("pages", &format!("{pages} (via {via})"), color),
        (Some(pages), None) => field("pages", &pages.to_string(), color),
        (None, _) => field("pages", "not available", color),
    }
    if let Some(doi) = &r.doi {
        field("doi", doi, color);
    }
    if let Some(url) = &r.url {
        field("url", url, color);
    }
    field("source", &r.source, color);
}

pub fn print_not_found(title: &str, color: bool) {
    if color {
        println!("{} {}", "not found".red().bold(), title);
    } else {
        println!("not found {title}");
    }
}

pub fn print_citation(paper: &ResolvedPaper) {
    println!("{}", cite::format_citation(paper));
}

pub fn print_bibtex(paper: &ResolvedPaper) {
    println!("{}", cite::format_bibtex(paper));
}

pub fn print_cache_stats(stats: &CacheStats, color: bool) {
    field("memory", &stats.memory_entries.to_string(), color);
    match stats.disk_entries {
        Some(n) => field("disk", &n.to_string(), color),
        None => field("disk", "not persistent", color),
    }
    field("hits", &stats.hits.to_string(), color);
    field("misses", &stats.misses.to_string(), color);
}

pub struct BatchSummary {
    pub resolved: usize,
    pub with_pages: usize,
    pub not_found: usize,
}

pub fn print_batch_summary(summary: &BatchSummary, color: bool) {
    let line = format!(
        "{} resolved ({} with pages), {} not found",
        summary.resolved, summary.with_pages, summary.not_found
    );
    if color {
        println!("\n{}", line.bold());
    } else {
        println!("\n{line}");
    }
}
