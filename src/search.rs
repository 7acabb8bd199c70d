//! Fuzzy inventory search
//!
//! Stateless scoring over a snapshot of servers and their ports. Each server
//! is matched on its name, ip, port notes and port numbers; the best field
//! decides its score. Contiguous matches beat scattered ones.

use crate::models::ServerWithPorts;

/// Score for a contiguous (substring) match at the very start of a field
const SUBSTRING_SCORE: f32 = 1.0;

/// Upper bound for a scattered (subsequence) match
const SUBSEQUENCE_SCORE: f32 = 0.5;

/// Filter and rank `entries` by how well they match `query`.
///
/// An empty query keeps every entry in its incoming order.
pub fn search(entries: Vec<ServerWithPorts>, query: &str) -> Vec<ServerWithPorts> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return entries;
    }

    let mut scored: Vec<(f32, ServerWithPorts)> = entries
        .into_iter()
        .filter_map(|entry| score_entry(&entry, &query).map(|score| (score, entry)))
        .collect();

    // Highest score first, ties keep id order
    scored.sort_by(|(a, ea), (b, eb)| b.total_cmp(a).then(ea.server.id.cmp(&eb.server.id)));
    scored.into_iter().map(|(_, entry)| entry).collect()
}

/// Best score across the searchable fields of one server, `None` if nothing matches.
///
/// `query` must already be lowercased.
pub fn score_entry(entry: &ServerWithPorts, query: &str) -> Option<f32> {
    let mut fields: Vec<String> = vec![entry.server.name.clone(), entry.server.ip.clone()];
    for port in &entry.ports {
        if let Some(note) = &port.note {
            fields.push(note.clone());
        }
        fields.push(port.port.to_string());
    }

    fields
        .iter()
        .filter_map(|field| fuzzy_score(&field.to_lowercase(), query))
        .max_by(f32::total_cmp)
}

/// Score `needle` against `haystack` (both lowercase), in `0.0..=1.0`
pub fn fuzzy_score(haystack: &str, needle: &str) -> Option<f32> {
    if needle.is_empty() {
        return Some(SUBSTRING_SCORE);
    }

    let hay: Vec<char> = haystack.chars().collect();
    let pat: Vec<char> = needle.chars().collect();
    if pat.len() > hay.len() {
        return None;
    }

    if let Some(byte_pos) = haystack.find(needle) {
        // Earlier hits rank slightly higher; whole-field hits rank highest
        let char_pos = haystack[..byte_pos].chars().count();
        let position_penalty = 0.25 * char_pos as f32 / hay.len() as f32;
        let coverage = pat.len() as f32 / hay.len() as f32;
        return Some(SUBSTRING_SCORE - position_penalty + 0.1 * coverage - 0.1);
    }

    // Greedy subsequence: every needle char in order, gaps allowed
    let mut first = None;
    let mut last = 0;
    let mut next = 0;
    for (i, &c) in hay.iter().enumerate() {
        if next < pat.len() && c == pat[next] {
            first.get_or_insert(i);
            last = i;
            next += 1;
        }
    }

    if next < pat.len() {
        return None;
    }

    let span = (last - first.unwrap_or(0) + 1) as f32;
    Some(SUBSEQUENCE_SCORE * pat.len() as f32 / span)
}
