use crate::config::RankPolicy;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Scores closer than this share a competition rank.
const COMPETITION_TIE_EPSILON: f64 = 0.001;

fn by_score_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Ranks one cohort. Students without a score get no entry.
///
/// The sort is stable, so under [`RankPolicy::Sequential`] equal scores keep cohort order and
/// receive consecutive ranks.
pub fn rank<'a, I>(cohort: I, policy: RankPolicy) -> BTreeMap<String, u32>
where
    I: IntoIterator<Item = (&'a str, Option<f64>)>,
{
    let mut scored: Vec<(&str, f64)> = cohort
        .into_iter()
        .filter_map(|(code, score)| score.filter(|s| s.is_finite()).map(|s| (code, s)))
        .collect();

    let mut out = BTreeMap::new();
    match policy {
        RankPolicy::Sequential => {
            scored.sort_by(|a, b| by_score_desc(a.1, b.1));
            for (idx, (code, _)) in scored.iter().enumerate() {
                out.insert(code.to_string(), idx as u32 + 1);
            }
        }
        RankPolicy::Competition => {
            scored.sort_by(|a, b| by_score_desc(a.1, b.1).then_with(|| a.0.cmp(b.0)));
            let mut current_rank = 0_u32;
            let mut prev: Option<f64> = None;
            for (idx, (code, score)) in scored.iter().enumerate() {
                let shares = prev
                    .map(|p| (p - score).abs() <= COMPETITION_TIE_EPSILON)
                    .unwrap_or(false);
                if !shares {
                    current_rank = idx as u32 + 1;
                }
                prev = Some(*score);
                out.insert(code.to_string(), current_rank);
            }
        }
    }
    out
}
