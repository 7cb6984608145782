//! Text normalization collaborator.
//!
//! The governance core treats normalized text as opaque; this is the
//! default normalizer wired into the pipeline. Deeper typo correction or
//! device-name disambiguation can replace it behind the same trait.

use mesa_core::event::TextNormalizer;

/// Lowercases, folds Spanish diacritics (keeping ñ), and collapses runs of
/// whitespace.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicNormalizer;

impl TextNormalizer for BasicNormalizer {
    fn normalize(&self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        let mut pending_space = false;

        for c in raw.trim().chars() {
            if c.is_whitespace() {
                pending_space = true;
                continue;
            }
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            for lower in c.to_lowercase() {
                out.push(fold_diacritic(lower));
            }
        }

        out
    }
}

/// Accent folding for the vowels users most often type inconsistently.
/// `ñ` is meaningful in Spanish and is kept as-is.
fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        _ => c,
    }
}
