//! Magnet classification and per-bucket selection.
//!
//! Every magnet falls into exactly one of the four buckets; for each bucket
//! the best offer wins. "Best" is: crack-marker priority (crack buckets),
//! then larger parsed size, then newer timestamp, then input order. The
//! `no_subtitle` bucket prefers a 4K offer when one exists.

use std::collections::BTreeMap;

use crate::models::{Magnet, MagnetCell, TorrentType};
use crate::parse::tags;

/// The chosen magnet per bucket. Buckets with no offer are absent.
pub type Selection = BTreeMap<TorrentType, MagnetCell>;

/// Crack-marker priority, used as the primary tie-break inside the crack
/// buckets. Higher is better.
fn crack_rank(name: &str) -> u8 {
    if tags::UNCUT_CRACK_SUBTITLE_MARKERS
        .iter()
        .any(|m| name.contains(m))
    {
        3
    } else if name.contains(tags::UNCUT_MARKER) {
        2
    } else if name.contains(tags::CRACK_ONLY_MARKER) {
        1
    } else {
        0
    }
}

fn has_crack_marker(name: &str) -> bool {
    crack_rank(name) > 0
}

/// A magnet counts as a subtitle offer when it carries a subtitle tag and is
/// not a crack release (crack releases with subtitles live in
/// `hacked_subtitle`).
fn is_subtitle_offer(magnet: &Magnet) -> bool {
    let tagged = magnet.tags.iter().any(|t| {
        tags::SUBTITLE_MAGNET_TAGS
            .iter()
            .any(|marker| t.contains(marker))
    });
    tagged && !magnet.name.contains(tags::CRACK_ONLY_MARKER)
}

fn is_4k(magnet: &Magnet) -> bool {
    let name = magnet.name.to_lowercase();
    tags::FOUR_K_MARKERS.iter().any(|m| name.contains(m))
        || magnet.tags.iter().any(|t| t.contains("4k"))
}

/// Assigns a magnet to its single bucket. Total: every magnet lands
/// somewhere, and the rules are checked in fixed order so the result is
/// deterministic.
pub fn bucket_of(magnet: &Magnet) -> TorrentType {
    let crack_with_subtitle = tags::UNCUT_CRACK_SUBTITLE_MARKERS
        .iter()
        .any(|m| magnet.name.contains(m));
    if crack_with_subtitle {
        return TorrentType::HackedSubtitle;
    }
    if has_crack_marker(&magnet.name) {
        return TorrentType::HackedNoSubtitle;
    }
    if is_subtitle_offer(magnet) {
        return TorrentType::Subtitle;
    }
    TorrentType::NoSubtitle
}

/// Parses a displayed size (`"4.94GB"`, `"980 MB"`) into bytes.
/// Unparseable text is zero, which simply loses the size tie-break.
pub fn parse_size_bytes(text: &str) -> u64 {
    let upper = text.trim().to_uppercase();
    let (multiplier, digits) = if let Some(rest) = upper.strip_suffix("GB") {
        (1024u64 * 1024 * 1024, rest)
    } else if let Some(rest) = upper.strip_suffix("MB") {
        (1024 * 1024, rest)
    } else if let Some(rest) = upper.strip_suffix("KB") {
        (1024, rest)
    } else {
        return 0;
    };
    digits
        .trim()
        .parse::<f64>()
        .map(|n| (n * multiplier as f64) as u64)
        .unwrap_or(0)
}

/// Sort key inside a bucket: crack rank, size, timestamp, stable order.
fn pick_best<'a, I>(candidates: I) -> Option<&'a Magnet>
where
    I: Iterator<Item = (usize, &'a Magnet)>,
{
    candidates
        .max_by(|(idx_a, a), (idx_b, b)| {
            crack_rank(&a.name)
                .cmp(&crack_rank(&b.name))
                .then_with(|| parse_size_bytes(&a.size_text).cmp(&parse_size_bytes(&b.size_text)))
                .then_with(|| a.timestamp.cmp(&b.timestamp))
                // max_by keeps the later element on Equal; invert the index
                // comparison so the earlier offer wins ties.
                .then_with(|| idx_b.cmp(idx_a))
        })
        .map(|(_, magnet)| magnet)
}

/// Classifies a detail page's magnets and selects the preferred offer per
/// bucket.
pub fn classify_magnets(magnets: &[Magnet]) -> Selection {
    let mut selection = Selection::new();

    for bucket in [
        TorrentType::HackedSubtitle,
        TorrentType::HackedNoSubtitle,
        TorrentType::Subtitle,
    ] {
        let best = pick_best(
            magnets
                .iter()
                .enumerate()
                .filter(|(_, m)| bucket_of(m) == bucket),
        );
        if let Some(magnet) = best {
            selection.insert(
                bucket,
                MagnetCell {
                    magnet: magnet.uri.clone(),
                    size: magnet.size_text.clone(),
                },
            );
        }
    }

    // no_subtitle: a 4K offer beats everything else in the bucket
    let plain = || {
        magnets
            .iter()
            .enumerate()
            .filter(|(_, m)| bucket_of(m) == TorrentType::NoSubtitle)
    };
    let best = pick_best(plain().filter(|(_, m)| is_4k(m))).or_else(|| pick_best(plain()));
    if let Some(magnet) = best {
        selection.insert(
            TorrentType::NoSubtitle,
            MagnetCell {
                magnet: magnet.uri.clone(),
                size: magnet.size_text.clone(),
            },
        );
    }

    selection
}
