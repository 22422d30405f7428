//! Sous-commande `search` : table de permutation vers texte, hex ou JSON.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use sd_core::DitherConfig;
use sd_perm::cache;
use sd_perm::table::{PermutationTable, words_per_matrix};
use serde::Serialize;

use crate::cli::{OutputFormat, SearchArgs};

#[derive(Serialize)]
struct TableReport {
    n: usize,
    words_per_matrix: usize,
    entries: Vec<EntryReport>,
}

#[derive(Serialize)]
struct EntryReport {
    score: u32,
    cells: Vec<u8>,
    words: Vec<u32>,
}

/// Run the search (or reuse the cache) and write the table.
///
/// # Errors
/// Search, cache, formatting or output failure.
pub fn run(args: &SearchArgs, config: &DitherConfig) -> Result<()> {
    let mut settings = config.search.clone();
    args.apply(&mut settings);

    let table = match args.cache.as_deref() {
        Some(path) => cache::load_or_build(path, args.size, &settings)?,
        None => PermutationTable::build(args.size, &settings)?,
    };
    if let Some(best) = table.entries().first() {
        log::info!(
            "{} matrices {n}x{n}, meilleur score {}",
            table.len(),
            best.score,
            n = table.n()
        );
    }

    let rendered = render(&table, args.format)?;
    match args.output.as_deref() {
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("Impossible d'écrire {}", path.display()))?,
        None => print!("{rendered}"),
    }
    Ok(())
}

/// Format a table.
///
/// # Errors
/// The table cannot be packed or serialised.
pub fn render(table: &PermutationTable, format: OutputFormat) -> Result<String> {
    let n = table.n();
    let mut out = String::new();
    match format {
        OutputFormat::Text => {
            for (i, entry) in table.entries().iter().enumerate() {
                writeln!(out, "# {i} score {}", entry.score)?;
                for row in entry.matrix.cells().chunks(n) {
                    let line: Vec<String> = row.iter().map(|v| format!("{v:2}")).collect();
                    writeln!(out, "{}", line.join(" "))?;
                }
            }
        }
        OutputFormat::Hex => {
            let stride = words_per_matrix(n)?;
            for words in table.pack()?.chunks(stride) {
                let line: Vec<String> = words.iter().map(|w| format!("0x{w:08X}")).collect();
                writeln!(out, "{}", line.join(", "))?;
            }
        }
        OutputFormat::Json => {
            let stride = words_per_matrix(n)?;
            let packed = table.pack()?;
            let report = TableReport {
                n,
                words_per_matrix: stride,
                entries: table
                    .entries()
                    .iter()
                    .zip(packed.chunks(stride))
                    .map(|(e, words)| EntryReport {
                        score: e.score,
                        cells: e.matrix.cells().to_vec(),
                        words: words.to_vec(),
                    })
                    .collect(),
            };
            out = serde_json::to_string_pretty(&report)?;
            out.push('\n');
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use sd_core::config::SearchSettings;

    use super::*;

    fn table_3x3() -> PermutationTable {
        let settings = SearchSettings {
            max_results: 4,
            ..SearchSettings::default()
        };
        PermutationTable::build(3, &settings).unwrap()
    }

    #[test]
    fn text_lists_each_matrix() {
        let table = table_3x3();
        let text = render(&table, OutputFormat::Text).unwrap();
        assert_eq!(text.lines().count(), table.len() * 4);
        assert!(text.starts_with("# 0 score "));
    }

    #[test]
    fn hex_one_line_per_matrix() {
        let table = PermutationTable::seed_only(4).unwrap();
        let hex = render(&table, OutputFormat::Hex).unwrap();
        let line = hex.lines().next().unwrap();
        assert_eq!(line.split(", ").count(), 2);
        assert!(line.starts_with("0x"));
    }

    #[test]
    fn json_round_trips_through_packing() {
        let table = table_3x3();
        let json = render(&table, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["n"], 3);
        assert_eq!(value["words_per_matrix"], 1);
        let entries = value["entries"].as_array().unwrap();
        assert_eq!(entries.len(), table.len());

        let words: Vec<u32> = entries
            .iter()
            .map(|e| u32::try_from(e["words"][0].as_u64().unwrap()).unwrap())
            .collect();
        let back = PermutationTable::from_packed(3, &words).unwrap();
        assert_eq!(back.entries(), table.entries());
    }
}
