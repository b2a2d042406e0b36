//! Parser for catalog data files.
//!
//! This module handles parsing the .dat files:
//! - users.dat: userId::item1|item2|...
//! - items.dat: itemId::name::category::genre1|genre2|...
//! - ratings.dat: userId::itemId::score
//!
//! Empty history, name and genre fields are allowed; identifiers are not.
//! Items can also be written back in the same format.

use crate::error::{CatalogError, Result};
use crate::types::*;
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

const FIELD_SEPARATOR: &str = "::";
const LIST_SEPARATOR: char = '|';

/// Read a whole file into owned lines, mapping a missing file to `FileNotFound`
fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => CatalogError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => CatalogError::IoError(e),
    })?;
    Ok(content.lines().map(|s| s.to_string()).collect())
}

/// Pull the next `::`-separated field or fail with the line's location
fn next_field<'a>(
    parts: &mut impl Iterator<Item = &'a str>,
    file: &str,
    line: usize,
    field: &str,
) -> Result<&'a str> {
    parts.next().ok_or_else(|| CatalogError::ParseError {
        file: file.to_string(),
        line,
        reason: format!("Missing {}", field),
    })
}

fn required_id(value: &str, file: &str, line: usize, field: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CatalogError::ParseError {
            file: file.to_string(),
            line,
            reason: format!("Empty {}", field),
        });
    }
    Ok(value.to_string())
}

/// Split a `|`-separated list, dropping blanks
fn split_list(s: &str) -> impl Iterator<Item = &str> {
    s.split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|part| !part.is_empty())
}

/// Iterate over non-blank lines with their 1-based line numbers
fn data_lines(lines: &[String]) -> impl Iterator<Item = (usize, &str)> {
    lines
        .iter()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
}

/// Parse the users.dat file
///
/// Format: userId::item1|item2|...
pub fn parse_users(path: &Path) -> Result<Vec<User>> {
    const FILE: &str = "users.dat";
    let lines = read_lines(path)?;
    let mut users = Vec::new();

    for (line_no, line) in data_lines(&lines) {
        let mut parts = line.split(FIELD_SEPARATOR);
        let user_id = next_field(&mut parts, FILE, line_no, "userId")?;
        let history = next_field(&mut parts, FILE, line_no, "viewing history")?;

        users.push(User {
            id: required_id(user_id, FILE, line_no, "userId")?,
            viewing_history: split_list(history).map(str::to_string).collect(),
        });
    }

    Ok(users)
}

/// Parse the items.dat file
///
/// Format: itemId::name::category::genre1|genre2|...
///
/// An empty name becomes `None`; an empty category falls back to "movie".
pub fn parse_items(path: &Path) -> Result<Vec<Item>> {
    const FILE: &str = "items.dat";
    let lines = read_lines(path)?;
    let mut items = Vec::new();

    for (line_no, line) in data_lines(&lines) {
        let mut parts = line.split(FIELD_SEPARATOR);
        let item_id = next_field(&mut parts, FILE, line_no, "itemId")?;
        let name = next_field(&mut parts, FILE, line_no, "name")?.trim();
        let category = next_field(&mut parts, FILE, line_no, "category")?.trim();
        let genres = next_field(&mut parts, FILE, line_no, "genres")?;

        items.push(Item {
            id: required_id(item_id, FILE, line_no, "itemId")?,
            name: (!name.is_empty()).then(|| name.to_string()),
            category: if category.is_empty() {
                DEFAULT_CATEGORY.to_string()
            } else {
                category.to_string()
            },
            genres: parse_genres(genres),
        });
    }
    Ok(items)
}

/// Parse the ratings.dat file
///
/// Format: userId::itemId::score
pub fn parse_ratings(path: &Path) -> Result<Vec<Rating>> {
    const FILE: &str = "ratings.dat";
    let lines = read_lines(path)?;
    let mut ratings = Vec::new();

    for (line_no, line) in data_lines(&lines) {
        let mut parts = line.split(FIELD_SEPARATOR);
        let user_id = next_field(&mut parts, FILE, line_no, "userId")?;
        let item_id = next_field(&mut parts, FILE, line_no, "itemId")?;
        let score = next_field(&mut parts, FILE, line_no, "score")?;

        ratings.push(Rating {
            user_id: required_id(user_id, FILE, line_no, "userId")?,
            item_id: required_id(item_id, FILE, line_no, "itemId")?,
            score: score.trim().parse().map_err(|e| CatalogError::ParseError {
                file: FILE.to_string(),
                line: line_no,
                reason: format!("Invalid score: {}", e),
            })?,
        });
    }
    Ok(ratings)
}

/// Parse pipe-separated genres, collapsing duplicates
///
/// Example: "Action|Sci-Fi|Action" -> {"Action", "Sci-Fi"}
fn parse_genres(s: &str) -> BTreeSet<String> {
    split_list(s).map(str::to_string).collect()
}

/// Make a free-text value safe to embed as one field.
///
/// Colon runs collapse to a single colon and edge colons are trimmed, so the
/// value can never produce a `::`. Line breaks become spaces.
fn clean_field(value: &str) -> String {
    let mut cleaned = String::with_capacity(value.len());
    for c in value.chars() {
        let c = if matches!(c, '\n' | '\r') { ' ' } else { c };
        if c == ':' && cleaned.ends_with(':') {
            continue;
        }
        cleaned.push(c);
    }
    cleaned
        .trim_matches(|c: char| c == ':' || c.is_whitespace())
        .to_string()
}

/// Render one items.dat line
pub fn format_item(item: &Item) -> String {
    let genres: Vec<String> = item
        .genres
        .iter()
        .map(|genre| clean_field(genre).replace(LIST_SEPARATOR, "/"))
        .collect();
    format!(
        "{id}{sep}{name}{sep}{category}{sep}{genres}",
        id = item.id,
        name = clean_field(item.name.as_deref().unwrap_or_default()),
        category = clean_field(&item.category),
        genres = genres.join("|"),
        sep = FIELD_SEPARATOR,
    )
}

/// Write items.dat, replacing the file
pub fn write_items(path: &Path, items: &[Item]) -> Result<()> {
    let mut content = String::new();
    for item in items {
        content.push_str(&format_item(item));
        content.push('\n');
    }
    fs::write(path, content)?;
    Ok(())
}
