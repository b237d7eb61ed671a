//! Human-readable renderings of check reports and conversion summaries.

use crate::commands::ConversionSummary;
use crate::document::Report;
use crate::errors::FileError;
use std::fmt::Write;

/// Items listed per section before the rest is summarized
const LIST_LIMIT: usize = 10;

const RULE: &str = "============================================================";

/// Render a check report with sections for broken links, unreferenced
/// files, files without links and statistics.
pub fn render_check_report(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Link integrity report");
    let _ = writeln!(out, "{}", RULE);

    let _ = writeln!(out, "\nBroken links ({})", report.stats.broken_links);
    if report.broken.is_empty() {
        let _ = writeln!(out, "  none");
    }
    for file in &report.broken {
        let _ = writeln!(out, "  {}", file.file);
        for link in &file.links {
            let _ = writeln!(out, "    line {}: {} ({})", link.line, link.target, link.reason);
            if !link.suggestions.is_empty() {
                let names: Vec<&str> = link.suggestions.iter().map(|s| s.as_str()).collect();
                let _ = writeln!(out, "      did you mean: {}", names.join(", "));
            }
        }
    }

    let _ = writeln!(out, "\nUnreferenced files ({})", report.unreferenced.len());
    push_limited(&mut out, report.unreferenced.iter().map(|p| p.to_string()));

    let _ = writeln!(out, "\nFiles with no links ({})", report.no_links.len());
    push_limited(&mut out, report.no_links.iter().map(|p| p.to_string()));

    if !report.errors.is_empty() {
        let _ = writeln!(out, "\nUnreadable files ({})", report.errors.len());
        push_limited(&mut out, report.errors.iter().map(FileError::to_string));
    }

    let stats = &report.stats;
    let _ = writeln!(out, "\nStatistics");
    let _ = writeln!(out, "  Total files:             {}", stats.total_files);
    let _ = writeln!(out, "  Markdown files:          {}", stats.markdown_files);
    let _ = writeln!(out, "  Files with broken links: {}", stats.files_with_broken_links);
    let _ = writeln!(out, "  Unreferenced files:      {}", stats.unreferenced);
    let _ = writeln!(out, "  Files with no links:     {}", stats.no_links);
    let _ = writeln!(out, "  Valid links:             {}", stats.valid_links);
    let _ = writeln!(out, "  Broken links:            {}", stats.broken_links);
    let _ = writeln!(out, "  External links:          {}", stats.external_links);
    let _ = write!(out, "  Fragment links:          {}", stats.fragment_links);
    out
}

/// Render a conversion summary. A dry run also lists the planned mapping.
pub fn render_conversion_summary(summary: &ConversionSummary) -> String {
    let mut out = String::new();
    let title = if summary.dry_run {
        "Conversion plan (dry run)"
    } else {
        "Conversion summary"
    };
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "Source: {}", summary.source);
    let _ = writeln!(out, "Target: {}", summary.target);

    if summary.dry_run {
        let _ = writeln!(out, "\nMapping ({})", summary.mappings.len());
        for entry in &summary.mappings {
            if entry.from == entry.to {
                let _ = writeln!(out, "  {} (unchanged)", entry.from);
            } else {
                let _ = writeln!(out, "  {} -> {}", entry.from, entry.to);
            }
        }
    }

    let _ = writeln!(out);
    if !summary.dry_run {
        let _ = writeln!(out, "Files processed:  {}", summary.files_processed);
        let _ = writeln!(out, "Bytes written:    {}", summary.bytes_written);
    }
    let _ = writeln!(out, "Files mapped:     {}", summary.files_mapped);
    let _ = writeln!(out, "Files skipped:    {}", summary.skipped.len());
    let _ = writeln!(out, "Links rewritten:  {}", summary.links.rewritten);
    let _ = writeln!(out, "Links unchanged:  {}", summary.links.unchanged);
    let _ = writeln!(out, "Broken links:     {}", summary.links.broken);
    let _ = write!(out, "Unsafe links:     {}", summary.links.unsafe_links);

    if !summary.errors.is_empty() {
        let _ = writeln!(out, "\n\nErrors ({})", summary.errors.len());
        push_limited(&mut out, summary.errors.iter().map(FileError::to_string));
        trim_trailing_newline(&mut out);
    }
    if !summary.skipped.is_empty() {
        let _ = writeln!(out, "\n\nSkipped ({})", summary.skipped.len());
        push_limited(&mut out, summary.skipped.iter().map(FileError::to_string));
        trim_trailing_newline(&mut out);
    }
    if summary.interrupted {
        let _ = write!(
            out,
            "\n\nInterrupted after {} file(s); the target tree is incomplete",
            summary.files_processed
        );
    }
    out
}

fn push_limited(out: &mut String, items: impl ExactSizeIterator<Item = String>) {
    let total = items.len();
    if total == 0 {
        let _ = writeln!(out, "  none");
        return;
    }
    for item in items.take(LIST_LIMIT) {
        let _ = writeln!(out, "  {}", item);
    }
    if total > LIST_LIMIT {
        let _ = writeln!(out, "  ... and {} more", total - LIST_LIMIT);
    }
}

fn trim_trailing_newline(out: &mut String) {
    if out.ends_with('\n') {
        out.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BrokenFile, BrokenLink, BrokenReason, Stats};
    use crate::errors::ItemError;
    use crate::mapping::MappingEntry;
    use crate::path::RelPath;
    use crate::rewrite::RewriteStats;

    fn rel(path: &str) -> RelPath {
        RelPath::new(path).unwrap()
    }

    fn summary() -> ConversionSummary {
        ConversionSummary {
            source: "/export".to_string(),
            target: "/docs".to_string(),
            dry_run: false,
            files_processed: 2,
            files_mapped: 2,
            bytes_written: 42,
            mappings: vec![MappingEntry {
                from: rel("a 0123456789abcdef.md"),
                to: rel("a.md"),
            }],
            errors: Vec::new(),
            skipped: Vec::new(),
            links: RewriteStats::default(),
            interrupted: false,
        }
    }

    #[test]
    fn test_check_report_sections() {
        let report = Report {
            broken: vec![BrokenFile {
                file: rel("docs/Getting-Started.md"),
                links: vec![BrokenLink {
                    line: 3,
                    target: "./images/setup.png".to_string(),
                    reason: BrokenReason::NotFound,
                    suggestions: vec![rel("images/setup.png")],
                }],
            }],
            unreferenced: vec![rel("images/unused-image.png")],
            no_links: vec![rel("README.md")],
            errors: Vec::new(),
            stats: Stats {
                broken_links: 1,
                ..Stats::default()
            },
        };

        let text = render_check_report(&report);

        assert!(text.contains("Broken links (1)"));
        assert!(text.contains("  docs/Getting-Started.md\n    line 3: ./images/setup.png (target not found in corpus)"));
        assert!(text.contains("did you mean: images/setup.png"));
        assert!(text.contains("Unreferenced files (1)\n  images/unused-image.png"));
        assert!(text.contains("Files with no links (1)\n  README.md"));
        assert!(text.contains("Statistics"));
        assert!(!text.contains("Unreadable files"));
    }

    #[test]
    fn test_long_lists_are_truncated() {
        let mut summary = summary();
        summary.errors = (0..13)
            .map(|i| FileError::new(format!("f{}.md", i), ItemError::NonUtf8Path))
            .collect();

        let text = render_conversion_summary(&summary);

        assert!(text.contains("Errors (13)"));
        assert!(text.contains("  f9.md: path is not valid UTF-8"));
        assert!(!text.contains("f10.md"));
        assert!(text.contains("  ... and 3 more"));
    }

    #[test]
    fn test_dry_run_lists_mapping() {
        let mut summary = summary();
        summary.dry_run = true;

        let text = render_conversion_summary(&summary);

        assert!(text.starts_with("Conversion plan (dry run)"));
        assert!(text.contains("  a 0123456789abcdef.md -> a.md"));
        assert!(!text.contains("Files processed"));
    }

    #[test]
    fn test_interrupted_is_reported() {
        let mut summary = summary();
        summary.interrupted = true;

        let text = render_conversion_summary(&summary);
        assert!(text.ends_with("Interrupted after 2 file(s); the target tree is incomplete"));
    }
}
