//! Interest aggregation.
//!
//! Turns the flat list of a user's interest records into one
//! [`InterestGroup`] per category. Groups are rebuilt for every ranking
//! call and never cached.

use std::collections::BTreeMap;

use crate::models::{InterestGroup, InterestRecord, KeywordScore};

/// Interest groups keyed by category, iterated in category-name order.
pub type InterestGroups = BTreeMap<String, InterestGroup>;

/// Group interest records by category.
///
/// Every record contributes its score to the category total. Records with a
/// specific keyword also add that keyword to the group's list, which is
/// sorted by descending score. Keywords are not deduplicated here; the
/// store's upsert key already makes them unique per category.
pub fn aggregate(records: &[InterestRecord]) -> InterestGroups {
    let mut groups = InterestGroups::new();

    for record in records {
        let group = groups
            .entry(record.category.clone())
            .or_insert_with(|| InterestGroup {
                category: record.category.clone(),
                ..InterestGroup::default()
            });

        group.total_score += record.score;

        if let Some(keyword) = record.specific_keyword() {
            group.keywords.push(KeywordScore {
                keyword: keyword.to_string(),
                score: record.score,
            });
        }
    }

    for group in groups.values_mut() {
        group.keywords.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    groups
}
