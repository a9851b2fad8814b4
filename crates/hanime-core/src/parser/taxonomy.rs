//! Tag and category option parser
//!
//! The search page carries the full filter form: tag checkboxes and genre
//! choices. Both lists are read from there.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::text::{clean_text, parse_count};
use super::{element_text, ensure_recognizable};
use crate::error::ParseError;
use crate::types::{CategoryEntry, TagEntry};

const PAGE: &str = "search filter";

/// The "no filter" choice offered among the genres
const ALL_GENRES: &[&str] = &["全部", "All", "all"];

static TAG_INPUT: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"input[name="tags[]"], [data-tag]"#).expect("tag input selector")
});
static GENRE_OPTION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"input[name="genre"][value], [data-genre], .genre-option"#)
        .expect("genre option selector")
});
static LABEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("label").expect("label selector"));
static COUNT_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d[\d,.]*\s*[萬万kK]?)\)").expect("count hint regex"));

/// Parses the tag checkboxes of the search page
///
/// # Errors
/// `StructureChanged` when the page offers no tags at all.
pub fn parse_tag_list(html: &str) -> Result<Vec<TagEntry>, ParseError> {
    ensure_recognizable(html)?;
    let document = Html::parse_document(html);

    let entries = collect_options(&document, &TAG_INPUT, &["value", "data-tag"]);
    if entries.is_empty() {
        return Err(ParseError::StructureChanged {
            page: PAGE,
            anchor: "tag options",
        });
    }

    Ok(entries
        .into_iter()
        .map(|(name, count)| TagEntry { name, count })
        .collect())
}

/// Parses the genre choices of the search page
///
/// # Errors
/// `StructureChanged` when the page offers no genres at all.
pub fn parse_category_list(html: &str) -> Result<Vec<CategoryEntry>, ParseError> {
    ensure_recognizable(html)?;
    let document = Html::parse_document(html);

    let entries = collect_options(&document, &GENRE_OPTION, &["data-genre", "value"]);
    let entries: Vec<_> = entries
        .into_iter()
        .filter(|(name, _)| !ALL_GENRES.contains(&name.as_str()))
        .collect();
    if entries.is_empty() {
        return Err(ParseError::StructureChanged {
            page: PAGE,
            anchor: "genre options",
        });
    }

    Ok(entries
        .into_iter()
        .map(|(name, count)| CategoryEntry { name, count })
        .collect())
}

/// Option names (from the first present attribute, else the element text)
/// with their count hints, deduplicated in document order
fn collect_options(
    document: &Html,
    selector: &Selector,
    name_attrs: &[&str],
) -> Vec<(String, Option<u64>)> {
    let mut seen = HashSet::new();
    document
        .select(selector)
        .filter_map(|option| {
            let name = name_attrs
                .iter()
                .filter_map(|attr| option.value().attr(attr))
                .map(clean_text)
                .find(|name| !name.is_empty())
                .or_else(|| {
                    let text = element_text(&option);
                    let text = COUNT_HINT.replace(&text, "").trim().to_string();
                    (!text.is_empty()).then_some(text)
                })?;
            Some((name, count_hint(&option)))
        })
        .filter(|(name, _)| seen.insert(name.clone()))
        .collect()
}

/// Count shown next to the option, e.g. `中文字幕 (1234)`
fn count_hint(option: &ElementRef) -> Option<u64> {
    let label = option
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| LABEL.matches(ancestor))
        .unwrap_or(*option);

    let text = element_text(&label);
    let caps = COUNT_HINT.captures(&text)?;
    parse_count(caps.get(1)?.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_PAGE: &str = r#"<html><body>
    <form id="hentai-form" action="/search">
        <input type="hidden" name="genre" value="全部">
        <div class="genre-modal">
            <div class="genre-option" data-genre="全部">全部</div>
            <div class="genre-option" data-genre="裏番">裏番</div>
            <div class="genre-option" data-genre="泡麵番">泡麵番 (88)</div>
            <div class="genre-option">3DCG</div>
            <div class="genre-option" data-genre="裏番">裏番</div>
        </div>
        <div class="tags-modal">
            <label class="hentai-tags-wrapper"><input type="checkbox" name="tags[]" value="中文字幕"> 中文字幕 (1,234)</label>
            <label class="hentai-tags-wrapper"><input type="checkbox" name="tags[]" value="無碼"> 無碼</label>
            <label class="hentai-tags-wrapper"><input type="checkbox" name="tags[]" value=" "> </label>
            <label class="hentai-tags-wrapper"><input type="checkbox" name="tags[]" value="巨乳"> 巨乳 (9.7萬)</label>
        </div>
    </form>
    </body></html>"#;

    #[test]
    fn test_parse_tag_list() {
        let tags = parse_tag_list(SEARCH_PAGE).unwrap();
        assert_eq!(
            tags,
            vec![
                TagEntry { name: "中文字幕".to_string(), count: Some(1234) },
                TagEntry { name: "無碼".to_string(), count: None },
                TagEntry { name: "巨乳".to_string(), count: Some(97_000) },
            ]
        );
    }

    #[test]
    fn test_parse_category_list_skips_all_and_duplicates() {
        let categories = parse_category_list(SEARCH_PAGE).unwrap();
        let names: Vec<_> = categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["裏番", "泡麵番", "3DCG"]);
        assert_eq!(categories[1].count, Some(88));
        assert_eq!(categories[0].count, None);
    }

    #[test]
    fn test_empty_lists_are_structure_change() {
        let html = "<html><body><div id=\"home-rows-wrapper\"></div></body></html>";
        assert!(matches!(
            parse_tag_list(html),
            Err(ParseError::StructureChanged { anchor: "tag options", .. })
        ));
        assert!(matches!(
            parse_category_list(html),
            Err(ParseError::StructureChanged { anchor: "genre options", .. })
        ));
    }

    #[test]
    fn test_only_all_genre_is_structure_change() {
        let html = r#"<html><body><input name="genre" value="全部"></body></html>"#;
        assert!(matches!(
            parse_category_list(html),
            Err(ParseError::StructureChanged { .. })
        ));
    }

    #[test]
    fn test_empty_body_is_unrecognized() {
        assert!(matches!(parse_tag_list(""), Err(ParseError::Unrecognized(_))));
    }
}
