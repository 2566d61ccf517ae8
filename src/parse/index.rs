//! Index-page parsing.

use scraper::Html;

use crate::models::IndexEntry;
use crate::parse::tags;
use crate::parse::ParseWarning;

/// Parses a catalog index page into entries.
///
/// Returns every entry found on the page together with its raw tag set;
/// phase admission and quality filtering are downstream policy, not parsing.
/// An empty result is a legal terminal condition for `all`-mode paging.
pub fn parse_index(html_text: &str, page: u32) -> (Vec<IndexEntry>, Vec<ParseWarning>) {
    let html = Html::parse_document(html_text);
    let mut entries = Vec::new();
    let mut warnings = Vec::new();

    let Some(list) = html.select(&tags::INDEX_MOVIE_LIST).next() else {
        warnings.push(ParseWarning::new(page, "no movie list on index page"));
        return (entries, warnings);
    };

    for item in list.select(&tags::INDEX_ITEM) {
        let Some(card) = item.select(&tags::INDEX_BOX).next() else {
            continue;
        };
        let Some(href) = card.value().attr("href") else {
            warnings.push(ParseWarning::new(page, "card without href"));
            continue;
        };

        let card_tags: Vec<String> = card
            .select(&tags::INDEX_TAGS)
            .map(|span| span.text().collect::<String>().trim().to_string())
            .collect();

        let video_code = card
            .select(&tags::INDEX_TITLE)
            .next()
            .map(|div| div.text().collect::<String>().trim().to_string())
            .unwrap_or_default();
        if video_code.is_empty() {
            warnings.push(ParseWarning::new(page, format!("card {href} without code")));
        }

        let title = card
            .value()
            .attr("title")
            .map(str::to_string)
            .unwrap_or_else(|| video_code.clone());

        let score_text = card
            .select(&tags::INDEX_SCORE)
            .next()
            .map(|span| span.text().collect::<String>())
            .unwrap_or_default();
        let rating = tags::RATING_RE
            .captures(&score_text)
            .and_then(|c| c[1].parse::<f64>().ok());
        let comment_count = tags::COMMENTS_RE
            .captures(&score_text)
            .and_then(|c| c[1].parse::<u32>().ok());

        entries.push(IndexEntry {
            href: href.to_string(),
            video_code,
            title,
            page,
            rating,
            comment_count,
            tags: card_tags,
        });
    }

    (entries, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(href: &str, code: &str, tags: &[&str], score: &str) -> String {
        let tag_spans: String = tags
            .iter()
            .map(|t| format!(r#"<span class="tag">{t}</span>"#))
            .collect();
        format!(
            r#"<div class="item">
                 <a class="box" href="{href}" title="{code} title text">
                   <div class="video-title">{code}</div>
                   <div class="score"><span class="value">{score}</span></div>
                   <div class="tags has-addons">{tag_spans}</div>
                 </a>
               </div>"#
        )
    }

    fn page_html(cards: &[String]) -> String {
        format!(
            r#"<html><body><div class="movie-list h cols-4 vcols-8">{}</div></body></html>"#,
            cards.join("")
        )
    }

    #[test]
    fn test_parse_index_extracts_fields() {
        let html = page_html(&[card(
            "/v/abc123",
            "ABC-123",
            &["含中字磁鏈", "今日新種"],
            "4.47分, 由595人評價",
        )]);
        let (entries, warnings) = parse_index(&html, 3);
        assert!(warnings.is_empty());
        assert_eq!(entries.len(), 1);

        let entry = &entries[0];
        assert_eq!(entry.href, "/v/abc123");
        assert_eq!(entry.video_code, "ABC-123");
        assert_eq!(entry.title, "ABC-123 title text");
        assert_eq!(entry.page, 3);
        assert_eq!(entry.rating, Some(4.47));
        assert_eq!(entry.comment_count, Some(595));
        assert_eq!(entry.tags, vec!["含中字磁鏈", "今日新種"]);
    }

    #[test]
    fn test_parse_index_missing_score_yields_none() {
        let html = page_html(&[card("/v/x", "X-1", &["今日新種"], "")]);
        let (entries, _) = parse_index(&html, 1);
        assert_eq!(entries[0].rating, None);
        assert_eq!(entries[0].comment_count, None);
    }

    #[test]
    fn test_parse_index_empty_page() {
        let (entries, warnings) = parse_index("<html><body>nothing</body></html>", 7);
        assert!(entries.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_parse_index_preserves_discovery_order() {
        let html = page_html(&[
            card("/v/a", "A-1", &[], ""),
            card("/v/b", "B-2", &[], ""),
            card("/v/c", "C-3", &[], ""),
        ]);
        let (entries, _) = parse_index(&html, 1);
        let hrefs: Vec<_> = entries.iter().map(|e| e.href.as_str()).collect();
        assert_eq!(hrefs, vec!["/v/a", "/v/b", "/v/c"]);
    }
}
