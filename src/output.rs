// SPDX-License-Identifier: MIT OR Apache-2.0

//! Output and color utilities for consistent terminal formatting
//!
//! Renders search results and ingestion counters as text or JSON, with
//! colors that respect the NO_COLOR environment variable.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;

use crate::ingest::IngestStats;
use crate::search::SearchResult;

/// Longest comment excerpt shown in text output, in characters.
pub const SNIPPET_CHARS: usize = 240;

/// Check if colors should be used (respects NO_COLOR env var)
pub fn use_colors() -> bool {
    std::env::var("NO_COLOR").is_err()
}

/// Print a value as JSON, pretty unless `compact`.
pub fn print_json<T: Serialize + ?Sized>(value: &T, compact: bool) -> serde_json::Result<()> {
    let rendered = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", rendered);
    Ok(())
}

/// Colorize author (cyan)
pub fn colorize_author(text: &str, use_color: bool) -> String {
    if use_color {
        text.cyan().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize similarity score (yellow)
pub fn colorize_score(score: f32, use_color: bool) -> String {
    let text = format!("{:.4}", score);
    if use_color {
        text.yellow().to_string()
    } else {
        text
    }
}

/// Colorize the matching term (green)
pub fn colorize_term(text: &str, use_color: bool) -> String {
    if use_color {
        text.green().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize comment excerpt (dimmed)
pub fn colorize_snippet(text: &str, use_color: bool) -> String {
    if use_color {
        text.dimmed().to_string()
    } else {
        text.to_string()
    }
}

/// Collapses whitespace and cuts `text` to at most `max_chars` characters.
pub fn snippet(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &collapsed[..cut]),
        None => collapsed,
    }
}

/// Text rendering of a result list.
pub fn render_results(results: &[SearchResult], terms: &[String], use_color: bool) -> String {
    let mut out = String::new();
    let query = terms.join(", ");

    if results.is_empty() {
        if use_color {
            let _ = writeln!(out, "{} No results found for: {}", "✗".red(), query.yellow());
        } else {
            let _ = writeln!(out, "No results found for: {}", query);
        }
        return out;
    }

    if use_color {
        let _ = writeln!(
            out,
            "\n{} Found {} results for: {}\n",
            "✓".green(),
            results.len().to_string().cyan(),
            query.yellow()
        );
    } else {
        let _ = writeln!(out, "\nFound {} results for: {}\n", results.len(), query);
    }

    for (rank, result) in results.iter().enumerate() {
        let author = result.item.as_ref().map(|i| i.author.as_str()).unwrap_or("?");
        let _ = writeln!(
            out,
            "{:>3}. {} #{} {} [{}]",
            rank + 1,
            colorize_score(result.similarity, use_color),
            result.item_id,
            colorize_author(author, use_color),
            colorize_term(&result.term, use_color)
        );
        if let Some(item) = &result.item {
            let _ = writeln!(
                out,
                "     {}",
                colorize_snippet(&snippet(&item.text, SNIPPET_CHARS), use_color)
            );
        }
    }
    out
}

/// Text rendering of ingestion counters.
pub fn render_ingest_stats(stats: &IngestStats, model: &str, use_color: bool) -> String {
    let embedded = if use_color {
        stats.embedded.to_string().cyan().to_string()
    } else {
        stats.embedded.to_string()
    };
    let mark = if use_color {
        "✓".green().to_string()
    } else {
        "✓".to_string()
    };
    format!(
        "{} Embedded {} comments with {} ({} posts scanned, {} pending, {} empty skipped)\n",
        mark, embedded, model, stats.posts, stats.pending, stats.skipped_empty
    )
}
