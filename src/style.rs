//! Naming styles - translating dataset names into storage object names
//!
//! When a dataset does not name its storage object explicitly, its name is
//! run through a [`Style`]:
//! - `Named`: strips a trailing `Data` (`CategoryData` → `Category`)
//! - `CamelAndUnders`: `ProductKeyword` → `product_keyword`
//! - `Trimmed`: strips a fixed prefix and/or suffix
//! - `Chain`: applies several styles left to right

use crate::dataset::Meta;
use crate::{Error, Result};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Style {
    /// Use the dataset name as is
    Verbatim,
    Named,
    CamelAndUnders,
    Trimmed {
        prefix: Option<String>,
        suffix: Option<String>,
    },
    Chain(Vec<Style>),
}

impl Default for Style {
    fn default() -> Self {
        Style::Chain(vec![Style::Named, Style::CamelAndUnders])
    }
}

impl Style {
    /// Translate a dataset name into a storage object name
    pub fn to_storable(&self, dataset: &str) -> String {
        match self {
            Style::Verbatim => dataset.to_string(),
            Style::Named => match dataset.strip_suffix("Data") {
                Some(stem) if !stem.is_empty() => stem.to_string(),
                _ => dataset.to_string(),
            },
            Style::CamelAndUnders => camel_to_unders(dataset),
            Style::Trimmed { prefix, suffix } => {
                let mut name = dataset;
                if let Some(p) = prefix {
                    name = name.strip_prefix(p.as_str()).unwrap_or(name);
                }
                if let Some(s) = suffix {
                    name = name.strip_suffix(s.as_str()).unwrap_or(name);
                }
                name.to_string()
            }
            Style::Chain(styles) => styles
                .iter()
                .fold(dataset.to_string(), |name, style| style.to_storable(&name)),
        }
    }

    /// Append another style, flattening chains
    pub fn then(self, next: Style) -> Style {
        let mut styles = match self {
            Style::Chain(styles) => styles,
            other => vec![other],
        };
        match next {
            Style::Chain(more) => styles.extend(more),
            other => styles.push(other),
        }
        Style::Chain(styles)
    }

    /// Storage object for a dataset: explicit `storable`, then `storable_name`,
    /// then the translated dataset name
    pub fn storable_for(&self, dataset: &str, meta: &Meta) -> String {
        meta.storable
            .clone()
            .or_else(|| meta.storable_name.clone())
            .unwrap_or_else(|| self.to_storable(dataset))
    }
}

impl FromStr for Style {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "verbatim" | "none" => Ok(Style::Verbatim),
            "named" | "named-data" => Ok(Style::Named),
            "camel-and-unders" | "snake" | "snake-case" => Ok(Style::CamelAndUnders),
            _ => Err(Error::Parse(format!("Unknown naming style: {}", s))),
        }
    }
}

fn camel_to_unders(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            if i > 0 && (prev_lower || (prev_upper && next_lower)) && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::MetaConfig;

    #[test]
    fn test_named_style() {
        assert_eq!(Style::Named.to_storable("CategoryData"), "Category");
        assert_eq!(Style::Named.to_storable("Data"), "Data");
        assert_eq!(Style::Named.to_storable("Books"), "Books");
    }

    #[test]
    fn test_camel_and_unders() {
        assert_eq!(Style::CamelAndUnders.to_storable("ProductKeyword"), "product_keyword");
        assert_eq!(Style::CamelAndUnders.to_storable("HTTPRequest"), "http_request");
        assert_eq!(Style::CamelAndUnders.to_storable("already_snake"), "already_snake");
    }

    #[test]
    fn test_default_chain() {
        assert_eq!(Style::default().to_storable("ProductKeywordData"), "product_keyword");
    }

    #[test]
    fn test_trimmed_then_named() {
        let style = Style::Trimmed {
            prefix: Some("Foo_".into()),
            suffix: None,
        }
        .then(Style::Named);
        assert_eq!(style.to_storable("Foo_CategoryData"), "Category");
    }

    #[test]
    fn test_meta_wins_over_style() {
        let meta = crate::dataset::Meta::merged(MetaConfig::default().storable_name("PretendStorage"));
        assert_eq!(Style::default().storable_for("Chairs", &meta), "PretendStorage");

        let meta = crate::dataset::Meta::merged(
            MetaConfig::default().storable("categories").storable_name("ignored"),
        );
        assert_eq!(Style::default().storable_for("WhateverIWantToCallIt", &meta), "categories");
    }

    #[test]
    fn test_parse() {
        assert_eq!("named".parse::<Style>().unwrap(), Style::Named);
        assert!("shouting".parse::<Style>().is_err());
    }
}
