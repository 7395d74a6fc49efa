//! Text helpers shared by the extractor, the resolver and the renderer.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;
use unicode_normalization::UnicodeNormalization;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Compose to NFC, collapse every whitespace run (NBSP included) into a
/// single space and trim the ends.
pub fn normalize_text(s: &str) -> String {
    let composed = s.nfc().collect::<String>();
    RE_WHITESPACE.replace_all(&composed, " ").trim().to_string()
}

/// Concatenation of every text node below `el`.
pub fn element_text(el: &ElementRef) -> String {
    el.text().collect::<String>()
}

/// True when the element's class attribute contains any of `keywords`
/// (case-insensitive substring match on the whole attribute).
pub fn class_contains_any(el: &ElementRef, keywords: &[&str]) -> bool {
    match el.value().attr("class") {
        Some(class_attr) => {
            let cls = class_attr.to_lowercase();
            keywords.iter().any(|kw| cls.contains(kw))
        }
        None => false,
    }
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}
