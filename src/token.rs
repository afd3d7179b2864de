//! URL-safe tokens derived from text.

use lazy_static::lazy_static;
use regex::Regex;

use crate::connection::StoreConfig;
use crate::core::{DbError, Result};

lazy_static! {
    static ref TAG: Regex = Regex::new(r"<[^>]*>").unwrap();
    static ref SEPARATOR: Regex = Regex::new(r"(\s+|_|/|\\)").unwrap();
    static ref DISALLOWED: Regex = Regex::new(r"[^a-z0-9-]+").unwrap();
    static ref HYPHENS: Regex = Regex::new(r"-+").unwrap();
}

/// ASCII stand-in for accented and special characters.
fn fold(c: char) -> Option<&'static str> {
    Some(match c {
        'à' | 'á' | 'â' | 'ä' | 'ã' | 'å' | 'ā' | 'ă' | 'ą' | 'ǎ' | 'ǻ' | 'À' | 'Á' | 'Â' | 'Ä'
        | 'Ã' | 'Å' | 'Ā' | 'Ă' | 'Ą' | 'Ǎ' | 'Ǻ' => "a",
        'æ' | 'ǽ' | 'Æ' | 'Ǽ' => "ae",
        '@' => "at",
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' | 'Ç' | 'Ć' | 'Ĉ' | 'Ċ' | 'Č' => "c",
        'ď' | 'đ' | 'Ď' | 'Đ' => "d",
        'ð' | 'Ð' => "dh",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' | 'È' | 'É' | 'Ê' | 'Ë' | 'Ē' | 'Ĕ'
        | 'Ė' | 'Ę' | 'Ě' | '€' => "e",
        'ĝ' | 'ğ' | 'ġ' | 'ģ' | 'Ĝ' | 'Ğ' | 'Ġ' | 'Ģ' => "g",
        'ĥ' | 'ħ' | 'Ĥ' | 'Ħ' => "h",
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' | 'Ì' | 'Í' | 'Î' | 'Ï' | 'Ĩ' | 'Ī'
        | 'Ĭ' | 'Į' | 'İ' => "i",
        'ĳ' | 'Ĳ' => "ij",
        'ĵ' | 'Ĵ' => "j",
        'ķ' | 'ĸ' | 'Ķ' => "k",
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' | 'Ĺ' | 'Ļ' | 'Ľ' | 'Ŀ' | 'Ł' => "l",
        'ñ' | 'ń' | 'ņ' | 'ň' | 'ŉ' | 'ŋ' | 'Ñ' | 'Ń' | 'Ņ' | 'Ň' | 'Ŋ' => "n",
        'ò' | 'ó' | 'ô' | 'ö' | 'õ' | 'ø' | 'ō' | 'ŏ' | 'ő' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø'
        | 'Ō' | 'Ŏ' | 'Ő' => "o",
        'œ' | 'Œ' => "oe",
        'ŕ' | 'ŗ' | 'ř' | 'Ŕ' | 'Ŗ' | 'Ř' => "r",
        'ś' | 'ŝ' | 'ş' | 'š' | 'Ś' | 'Ŝ' | 'Ş' | 'Š' => "s",
        'ß' => "ss",
        'ţ' | 'ť' | 'ŧ' | 'Ţ' | 'Ť' | 'Ŧ' => "t",
        'þ' | 'Þ' => "th",
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' | 'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ũ'
        | 'Ū' | 'Ŭ' | 'Ů' | 'Ű' | 'Ų' => "u",
        'ŵ' | 'Ŵ' => "w",
        'ý' | 'ÿ' | 'ŷ' | 'Ý' | 'Ŷ' | 'Ÿ' => "y",
        'ź' | 'ż' | 'ž' | 'Ź' | 'Ż' | 'Ž' => "z",
        _ => return None,
    })
}

/// Normalize text into a lowercase, hyphen-separated slug.
///
/// May return an empty string when nothing URL-safe is left.
pub fn slugify(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    for c in text.chars() {
        match fold(c) {
            Some(ascii) => folded.push_str(ascii),
            None => folded.push(c),
        }
    }

    let lowered = folded.trim().to_lowercase();
    let stripped = TAG.replace_all(&lowered, "");
    let hyphenated = SEPARATOR.replace_all(&stripped, "-");
    let cleaned = DISALLOWED.replace_all(&hyphenated, "");
    let collapsed = HYPHENS.replace_all(&cleaned, "-");
    collapsed.trim_matches('-').to_string()
}

/// Generates per-entity unique tokens.
#[derive(Debug, Clone)]
pub struct TokenGenerator {
    max_retries: u32,
    empty_default: String,
}

impl TokenGenerator {
    pub fn new(max_retries: u32, empty_default: &str) -> Self {
        Self {
            max_retries,
            empty_default: empty_default.to_string(),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.tokenizer_max_retries, &config.empty_token_default)
    }

    /// First free candidate among `slug`, `slug-2`, `slug-3`, ...
    ///
    /// `is_taken` reports whether another record already uses a candidate.
    /// Gives up after `max_retries` candidates.
    pub fn generate(
        &self,
        source: &str,
        entity_type: &str,
        field: &str,
        mut is_taken: impl FnMut(&str) -> Result<bool>,
    ) -> Result<String> {
        let mut base = slugify(source);
        if base.is_empty() {
            base = self.empty_default.clone();
        }

        for attempt in 1..=self.max_retries {
            let candidate = if attempt == 1 {
                base.clone()
            } else {
                format!("{}-{}", base, attempt)
            };
            if !is_taken(&candidate)? {
                return Ok(candidate);
            }
            tracing::trace!(entity = entity_type, field, candidate = %candidate, "token taken");
        }

        Err(DbError::ExhaustedRetries {
            entity: entity_type.to_string(),
            field: field.to_string(),
            attempts: self.max_retries,
        })
    }
}
