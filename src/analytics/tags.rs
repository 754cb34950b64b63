use std::collections::HashMap;

use crate::domain::{TagScore, TaggedPost};

/// Engagement weights applied to each tagged post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagWeights {
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
}

impl Default for TagWeights {
    fn default() -> Self {
        Self {
            views: 1,
            likes: 2,
            comments: 3,
        }
    }
}

impl TagWeights {
    pub fn score(&self, post: &TaggedPost) -> i64 {
        post.views
            .saturating_mul(self.views)
            .saturating_add(post.likes.saturating_mul(self.likes))
            .saturating_add(post.comments.saturating_mul(self.comments))
    }
}

/// Rank tags by the weighted engagement of the published posts carrying them.
/// Every occurrence of a tag on a post contributes that post's score.
pub fn popular_tags(posts: &[TaggedPost], weights: &TagWeights) -> Vec<TagScore> {
    let mut scores: HashMap<&str, i64> = HashMap::new();

    for post in posts.iter().filter(|p| p.published) {
        let score = weights.score(post);
        for tag in post.tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            let total = scores.entry(tag).or_insert(0);
            *total = total.saturating_add(score);
        }
    }

    let mut ranked: Vec<TagScore> = scores
        .into_iter()
        .map(|(name, count)| TagScore {
            name: name.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PostId;
    use chrono::Utc;

    fn post(tags: &[&str], published: bool, views: i64, likes: i64, comments: i64) -> TaggedPost {
        TaggedPost {
            id: PostId::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            published,
            views,
            likes,
            comments,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_weighted_score() {
        let weights = TagWeights::default();
        assert_eq!(weights.score(&post(&[], true, 10, 2, 1)), 10 + 4 + 3);
    }

    #[test]
    fn test_popular_tags_ranking() {
        let posts = vec![
            post(&["rust", "web"], true, 10, 0, 0),
            post(&["rust"], true, 0, 1, 1),
            post(&["go"], true, 3, 0, 0),
        ];
        let tags = popular_tags(&posts, &TagWeights::default());

        assert_eq!(
            tags,
            vec![
                TagScore {
                    name: "rust".to_string(),
                    count: 15
                },
                TagScore {
                    name: "web".to_string(),
                    count: 10
                },
                TagScore {
                    name: "go".to_string(),
                    count: 3
                },
            ]
        );
    }

    #[test]
    fn test_unpublished_posts_ignored() {
        let posts = vec![
            post(&["draft"], false, 100, 100, 100),
            post(&["live"], true, 1, 0, 0),
        ];
        let tags = popular_tags(&posts, &TagWeights::default());
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "live");
    }

    #[test]
    fn test_ties_sorted_by_name() {
        let posts = vec![post(&["beta", "alpha"], true, 5, 0, 0)];
        let tags = popular_tags(&posts, &TagWeights::default());
        assert_eq!(tags[0].name, "alpha");
        assert_eq!(tags[1].name, "beta");
    }

    #[test]
    fn test_blank_tags_skipped_and_trimmed() {
        let posts = vec![post(&[" rust ", "", "  "], true, 2, 0, 0)];
        let tags = popular_tags(&posts, &TagWeights::default());
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "rust");
    }

    #[test]
    fn test_duplicate_tag_counts_each_occurrence() {
        let posts = vec![post(&["rust", "rust"], true, 1, 0, 0)];
        let tags = popular_tags(&posts, &TagWeights::default());
        assert_eq!(tags[0].count, 2);
    }

    #[test]
    fn test_huge_counters_saturate() {
        let posts = vec![
            post(&["viral"], true, i64::MAX, i64::MAX, i64::MAX),
            post(&["viral"], true, i64::MAX, 0, 0),
        ];

        assert_eq!(TagWeights::default().score(&posts[0]), i64::MAX);

        let tags = popular_tags(&posts, &TagWeights::default());
        assert_eq!(tags[0].count, i64::MAX);
    }

    #[test]
    fn test_no_posts() {
        assert!(popular_tags(&[], &TagWeights::default()).is_empty());
    }
}
