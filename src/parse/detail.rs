//! Detail-page parsing.

use scraper::Html;

use crate::models::{DetailPage, Magnet};
use crate::parse::tags;
use crate::parse::ParseWarning;

/// Parses a detail page: the magnet offers plus the attributes the index
/// card does not carry (actor, canonical code).
///
/// Magnet anchors whose href is not a magnet URI are skipped with a warning;
/// the URI invariant holds for everything returned.
pub fn parse_detail(html_text: &str, page: u32) -> (DetailPage, Vec<ParseWarning>) {
    let html = Html::parse_document(html_text);
    let mut detail = DetailPage::default();
    let mut warnings = Vec::new();

    detail.video_code = html
        .select(&tags::DETAIL_COPY_BUTTON)
        .next()
        .and_then(|a| a.value().attr("data-clipboard-text"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    for block in html.select(&tags::DETAIL_PANEL_BLOCK) {
        let label = block
            .select(&tags::DETAIL_PANEL_STRONG)
            .next()
            .map(|s| s.text().collect::<String>())
            .unwrap_or_default();
        if !label.contains(tags::ACTOR_PANEL_LABEL) {
            continue;
        }
        detail.actor = block
            .select(&tags::DETAIL_PANEL_VALUE)
            .next()
            .map(|a| a.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty());
        break;
    }

    let Some(container) = html.select(&tags::DETAIL_MAGNETS).next() else {
        warnings.push(ParseWarning::new(page, "no magnets container on detail page"));
        return (detail, warnings);
    };

    for item in container.select(&tags::DETAIL_MAGNET_ITEM) {
        let Some(anchor) = item.select(&tags::DETAIL_MAGNET_NAME).next() else {
            continue;
        };
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if !href.starts_with("magnet:") {
            warnings.push(ParseWarning::new(
                page,
                format!("magnet anchor with non-magnet href: {}", truncate(href, 40)),
            ));
            continue;
        }

        let name = anchor
            .select(&tags::DETAIL_NAME_SPAN)
            .next()
            .map(|s| s.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let size_text = anchor
            .select(&tags::DETAIL_META_SPAN)
            .next()
            .map(|s| s.text().collect::<String>())
            .and_then(|meta| {
                tags::SIZE_RE
                    .captures(&meta)
                    .map(|c| c[1].trim().to_string())
            })
            .unwrap_or_default();

        let timestamp = item
            .select(&tags::DETAIL_TIME_SPAN)
            .next()
            .map(|s| s.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let magnet_tags: Vec<String> = anchor
            .select(&tags::DETAIL_MAGNET_TAGS)
            .map(|span| {
                span.text()
                    .collect::<String>()
                    .trim()
                    .to_lowercase()
            })
            .collect();

        detail.magnets.push(Magnet {
            uri: href.to_string(),
            name,
            tags: magnet_tags,
            size_text,
            timestamp,
        });
    }

    if detail.magnets.is_empty() {
        warnings.push(ParseWarning::new(page, "detail page without magnets"));
    }

    (detail, warnings)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn magnet_item(href: &str, name: &str, tags: &[&str], meta: &str, time: &str) -> String {
        let tag_spans: String = tags
            .iter()
            .map(|t| format!(r#"<span class="tag">{t}</span>"#))
            .collect();
        format!(
            r#"<div class="item columns is-desktop">
                 <div class="magnet-name">
                   <a href="{href}">
                     <span class="name">{name}</span>
                     <span class="meta">{meta}</span>
                     <div class="tags">{tag_spans}</div>
                   </a>
                 </div>
                 <div class="date"><span class="time">{time}</span></div>
               </div>"#
        )
    }

    fn detail_html(items: &[String], actor: Option<&str>) -> String {
        let actor_panel = actor
            .map(|a| {
                format!(
                    r#"<div class="video-meta-panel">
                         <div class="panel-block">
                           <strong>演員:</strong>
                           <span class="value"><a href="/actors/x">{a}</a></span>
                         </div>
                       </div>"#
                )
            })
            .unwrap_or_default();
        format!(
            r#"<html><body>
                 <a class="button is-white copy-to-clipboard" data-clipboard-text="ABC-123"></a>
                 {actor_panel}
                 <div id="magnets-content">{}</div>
               </body></html>"#,
            items.join("")
        )
    }

    #[test]
    fn test_parse_detail_extracts_magnets() {
        let html = detail_html(
            &[magnet_item(
                "magnet:?xt=urn:btih:aaa",
                "ABC-123-C",
                &["字幕", "高清"],
                "4.94GB, 1個文件",
                "2025-06-01",
            )],
            Some("Actor Name"),
        );
        let (detail, warnings) = parse_detail(&html, 1);
        assert!(warnings.is_empty());
        assert_eq!(detail.video_code.as_deref(), Some("ABC-123"));
        assert_eq!(detail.actor.as_deref(), Some("Actor Name"));
        assert_eq!(detail.magnets.len(), 1);

        let magnet = &detail.magnets[0];
        assert_eq!(magnet.uri, "magnet:?xt=urn:btih:aaa");
        assert_eq!(magnet.name, "ABC-123-C");
        // Tags come out lowercased
        assert_eq!(magnet.tags, vec!["字幕", "高清"]);
        assert_eq!(magnet.size_text, "4.94GB");
        assert_eq!(magnet.timestamp, "2025-06-01");
    }

    #[test]
    fn test_parse_detail_skips_non_magnet_hrefs() {
        let html = detail_html(
            &[magnet_item("https://evil.example.com/t", "X", &[], "", "")],
            None,
        );
        let (detail, warnings) = parse_detail(&html, 1);
        assert!(detail.magnets.is_empty());
        // One warning for the bad href, one for the now-empty magnet list
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_parse_detail_no_container() {
        let (detail, warnings) = parse_detail("<html><body></body></html>", 1);
        assert!(detail.magnets.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_parse_detail_missing_size_and_time() {
        let html = detail_html(
            &[magnet_item("magnet:?xt=urn:btih:bbb", "X-1", &[], "no size here", "")],
            None,
        );
        let (detail, _) = parse_detail(&html, 1);
        assert_eq!(detail.magnets[0].size_text, "");
        assert_eq!(detail.magnets[0].timestamp, "");
    }
}
