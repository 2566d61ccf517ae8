//! The single table of site-markup recognition data.
//!
//! Everything that is bit-exact against the catalog's current markup lives
//! here: tag spellings (the site serves traditional, simplified, and English
//! variants depending on locale), magnet naming markers, CSS class names,
//! text-extraction regexes, and block-page fingerprints. A markup change on
//! the site should touch this file and nothing else.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Selector;

/// Card tags meaning "this entry has a Chinese-subtitle magnet".
pub const SUBTITLE_CARD_TAGS: &[&str] = &["含中字磁鏈", "含中字磁链", "CnSub DL"];

/// Card tags meaning "released today".
pub const TODAY_CARD_TAGS: &[&str] = &["今日新種", "今日新种", "Today"];

/// Card tags meaning "released yesterday".
pub const YESTERDAY_CARD_TAGS: &[&str] = &["昨日新種", "昨日新种", "Yesterday"];

/// Magnet tags meaning the torrent embeds subtitles (compared lowercase).
pub const SUBTITLE_MAGNET_TAGS: &[&str] = &["字幕", "subtitle"];

/// Name suffixes marking an uncut-crack release that also embeds subtitles.
/// Highest crack priority.
pub const UNCUT_CRACK_SUBTITLE_MARKERS: &[&str] = &["-UC", "-CU", "-U-C", "-C-U", "-C.无码破解"];

/// Name marker for an uncut release.
pub const UNCUT_MARKER: &str = "-U";

/// Name marker for a crack-only release. Torrents carrying it are never
/// counted as subtitle torrents even when a subtitle tag is present.
pub const CRACK_ONLY_MARKER: &str = ".无码破解";

/// Name markers for a 4K release (compared lowercase).
pub const FOUR_K_MARKERS: &[&str] = &["-4k", "4k"];

/// Fingerprints of the challenge block page (compared lowercase).
pub const CHALLENGE_PAGE_MARKERS: &[&str] = &["security verification", "turnstile"];

/// Keyword in a small bypass-service response that signals bypass failure.
pub const BYPASS_FAILURE_KEYWORD: &str = "fail";

/// Path fragments of the login and age-gate pages; landing on one of these
/// via redirect while a session cookie was sent reads as a ban.
pub const AUTH_REDIRECT_FRAGMENTS: &[&str] = &["/login", "/over18"];

fn selector(css: &str) -> Selector {
    // Selectors here are compile-time constants; a parse failure is a typo
    // in this file, not a runtime condition.
    Selector::parse(css).unwrap_or_else(|e| panic!("bad selector {css:?}: {e}"))
}

/// Index-page selectors.
pub static INDEX_MOVIE_LIST: Lazy<Selector> = Lazy::new(|| selector("div.movie-list"));
pub static INDEX_ITEM: Lazy<Selector> = Lazy::new(|| selector("div.item"));
pub static INDEX_BOX: Lazy<Selector> = Lazy::new(|| selector("a.box"));
pub static INDEX_TAGS: Lazy<Selector> = Lazy::new(|| selector("div.tags.has-addons span.tag"));
pub static INDEX_TITLE: Lazy<Selector> = Lazy::new(|| selector("div.video-title"));
pub static INDEX_SCORE: Lazy<Selector> = Lazy::new(|| selector("div.score span.value"));

/// Detail-page selectors.
pub static DETAIL_CONTENT: Lazy<Selector> = Lazy::new(|| selector("div.video-detail"));
pub static DETAIL_MAGNETS: Lazy<Selector> = Lazy::new(|| selector("div#magnets-content"));
pub static DETAIL_MAGNET_ITEM: Lazy<Selector> = Lazy::new(|| selector("div.item.columns"));
pub static DETAIL_MAGNET_NAME: Lazy<Selector> = Lazy::new(|| selector("div.magnet-name a"));
pub static DETAIL_NAME_SPAN: Lazy<Selector> = Lazy::new(|| selector("span.name"));
pub static DETAIL_META_SPAN: Lazy<Selector> = Lazy::new(|| selector("span.meta"));
pub static DETAIL_TIME_SPAN: Lazy<Selector> = Lazy::new(|| selector("span.time"));
pub static DETAIL_MAGNET_TAGS: Lazy<Selector> = Lazy::new(|| selector("div.tags span.tag"));
pub static DETAIL_COPY_BUTTON: Lazy<Selector> = Lazy::new(|| selector("a.copy-to-clipboard"));
pub static DETAIL_PANEL_BLOCK: Lazy<Selector> =
    Lazy::new(|| selector("div.video-meta-panel div.panel-block"));
pub static DETAIL_PANEL_STRONG: Lazy<Selector> = Lazy::new(|| selector("strong"));
pub static DETAIL_PANEL_VALUE: Lazy<Selector> = Lazy::new(|| selector("span.value a"));

/// Age-gate selectors.
pub static AGE_GATE_MODAL: Lazy<Selector> = Lazy::new(|| selector("div.modal.is-active.over18-modal"));
pub static AGE_GATE_LINKS: Lazy<Selector> = Lazy::new(|| selector("a[href]"));

/// Panel label marking the actor row on a detail page.
pub const ACTOR_PANEL_LABEL: &str = "演員:";

/// `"4.47分"` → rating `4.47`.
pub static RATING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+\.?\d*)分").unwrap_or_else(|e| panic!("rating regex: {e}")));

/// `"由595人評價"` → comment count `595`.
pub static COMMENTS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"由(\d+)人評價").unwrap_or_else(|e| panic!("comments regex: {e}")));

/// `"4.94GB, 1個文件"` → size text `4.94GB`.
pub static SIZE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([\d.]+\s*(?:GB|MB|KB))").unwrap_or_else(|e| panic!("size regex: {e}"))
});

/// True when a card tag set carries the subtitle-magnet tag.
pub fn has_subtitle_tag(tags: &[String]) -> bool {
    tags.iter()
        .any(|t| SUBTITLE_CARD_TAGS.contains(&t.as_str()))
}

/// True when a card tag set carries the released-today-or-yesterday tag.
pub fn has_release_tag(tags: &[String]) -> bool {
    tags.iter().any(|t| {
        TODAY_CARD_TAGS.contains(&t.as_str()) || YESTERDAY_CARD_TAGS.contains(&t.as_str())
    })
}

/// True when a body is the challenge block page.
pub fn is_challenge_page(body: &str) -> bool {
    let lower = body.to_lowercase();
    CHALLENGE_PAGE_MARKERS.iter().all(|m| lower.contains(m))
}

/// True when a bypass-service response signals bypass failure rather than
/// page content: tiny body plus the failure keyword.
pub fn is_bypass_failure(body: &str) -> bool {
    body.len() < crate::config::BYPASS_FAILURE_MAX_BYTES
        && body.to_lowercase().contains(BYPASS_FAILURE_KEYWORD)
}

/// True when a final URL landed on the login or age-gate page.
pub fn is_auth_redirect(final_url: &str) -> bool {
    AUTH_REDIRECT_FRAGMENTS.iter().any(|f| final_url.contains(f))
}

/// True when a page carries real catalog content (an index list or a detail
/// body). Used to tell a decorative age-gate modal from an empty shell.
pub fn has_catalog_content(html: &scraper::Html) -> bool {
    html.select(&INDEX_MOVIE_LIST).next().is_some()
        || html.select(&DETAIL_CONTENT).next().is_some()
}

/// Finds the age-gate confirmation href in a page, if the modal is present.
pub fn age_confirm_href(html: &scraper::Html) -> Option<String> {
    let modal = html.select(&AGE_GATE_MODAL).next()?;
    modal
        .select(&AGE_GATE_LINKS)
        .filter_map(|a| a.value().attr("href"))
        .find(|href| href.contains("over18"))
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtitle_tag_variants() {
        for spelling in ["含中字磁鏈", "含中字磁链", "CnSub DL"] {
            assert!(has_subtitle_tag(&[spelling.to_string()]), "{spelling}");
        }
        assert!(!has_subtitle_tag(&["今日新種".to_string()]));
    }

    #[test]
    fn test_release_tag_variants() {
        for spelling in ["今日新種", "昨日新种", "Today", "Yesterday"] {
            assert!(has_release_tag(&[spelling.to_string()]), "{spelling}");
        }
        assert!(!has_release_tag(&["含中字磁鏈".to_string()]));
    }

    #[test]
    fn test_challenge_page_requires_both_markers() {
        assert!(is_challenge_page(
            "<title>Security Verification</title><script src=turnstile.js>"
        ));
        // A page merely mentioning one keyword is not a block page
        assert!(!is_challenge_page("<p>turnstile article</p>"));
    }

    #[test]
    fn test_bypass_failure_fingerprint() {
        assert!(is_bypass_failure("{\"status\":\"failed\"}"));
        assert!(!is_bypass_failure("everything is fine"));
        // Big bodies are content even if the word appears
        let big = format!("{}{}", "x".repeat(2000), "fail");
        assert!(!is_bypass_failure(&big));
    }

    #[test]
    fn test_rating_and_comment_regexes() {
        let caps = RATING_RE.captures("4.47分, 由595人評價").map(|c| c[1].to_string());
        assert_eq!(caps.as_deref(), Some("4.47"));
        let caps = COMMENTS_RE.captures("4.47分, 由595人評價").map(|c| c[1].to_string());
        assert_eq!(caps.as_deref(), Some("595"));
        assert!(RATING_RE.captures("no score").is_none());
    }

    #[test]
    fn test_age_confirm_href() {
        let html = scraper::Html::parse_document(
            r#"<div class="modal is-active over18-modal">
                 <a href="/over18?back=/">I am over 18</a>
               </div>"#,
        );
        assert_eq!(age_confirm_href(&html).as_deref(), Some("/over18?back=/"));

        let plain = scraper::Html::parse_document("<div>no modal</div>");
        assert_eq!(age_confirm_href(&plain), None);
    }
}
