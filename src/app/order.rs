use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::config::OrderDirectives;

use super::episode::EpisodeKey;

/// Per-feed episode lists grouped by tier. BTreeMap iteration gives ascending
/// tier keys; lists within a tier stay in the order they were inserted, which
/// is the feed declaration order in the config.
pub(crate) type TierMap = BTreeMap<i64, Vec<Vec<EpisodeKey>>>;

pub(crate) fn group_by_tier(prepared: Vec<(i64, Vec<EpisodeKey>)>) -> TierMap {
    let mut tiers = TierMap::new();
    for (tier, episodes) in prepared {
        if episodes.is_empty() {
            continue;
        }
        tiers.entry(tier).or_default().push(episodes);
    }
    tiers
}

/// Combines tier-grouped feed lists into the final playlist sequence. The
/// output is always a permutation of the input union.
pub(crate) fn order_episodes<R: Rng>(
    tiers: TierMap,
    directives: &OrderDirectives,
    rng: &mut R,
) -> Vec<EpisodeKey> {
    let mut ordered = Vec::new();

    if directives.tier {
        for (_, feed_lists) in tiers {
            let mut feed_lists: Vec<Vec<EpisodeKey>> = feed_lists
                .into_iter()
                .filter(|list| !list.is_empty())
                .collect();
            if directives.shuffle && !directives.roundrobin {
                let mut flat: Vec<EpisodeKey> = feed_lists.into_iter().flatten().collect();
                flat.shuffle(rng);
                ordered.extend(flat);
            } else if directives.roundrobin {
                if directives.shuffle {
                    for list in &mut feed_lists {
                        list.shuffle(rng);
                    }
                }
                ordered.extend(round_robin(feed_lists));
            } else {
                ordered.extend(feed_lists.into_iter().flatten());
            }
        }
    } else if directives.roundrobin {
        // Tier boundaries are ignored, but each feed keeps its own list.
        let mut feed_lists: Vec<Vec<EpisodeKey>> = tiers
            .into_values()
            .flatten()
            .filter(|list| !list.is_empty())
            .collect();
        if directives.shuffle {
            for list in &mut feed_lists {
                list.shuffle(rng);
            }
        }
        ordered.extend(round_robin(feed_lists));
    } else {
        let mut flat: Vec<EpisodeKey> = tiers.into_values().flatten().flatten().collect();
        flat.shuffle(rng);
        ordered.extend(flat);
    }

    ordered
}

/// Takes one element from each list in turn, dropping exhausted lists from
/// the rotation, until every list is empty.
pub(crate) fn round_robin<T>(lists: Vec<Vec<T>>) -> Vec<T> {
    let mut iters: Vec<std::vec::IntoIter<T>> = lists.into_iter().map(Vec::into_iter).collect();
    let mut out = Vec::new();
    while !iters.is_empty() {
        iters.retain_mut(|iter| match iter.next() {
            Some(value) => {
                out.push(value);
                true
            }
            None => false,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_robin_interleaves_uneven_lists_fairly() {
        let combined = round_robin(vec![
            vec!["A", "B", "C"],
            vec!["D"],
            vec!["E", "F"],
        ]);
        assert_eq!(combined, vec!["A", "D", "E", "B", "F", "C"]);
    }

    #[test]
    fn round_robin_preserves_every_element_exactly_once() {
        let lists = vec![vec![1, 2, 3, 4], vec![], vec![5], vec![6, 7]];
        let total: usize = lists.iter().map(Vec::len).sum();

        let mut combined = round_robin(lists);
        assert_eq!(combined.len(), total);
        combined.sort_unstable();
        assert_eq!(combined, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn group_by_tier_skips_empty_feed_lists() {
        let key = |id: &str| EpisodeKey::new("item", id);
        let tiers = group_by_tier(vec![
            (2, vec![key("a")]),
            (1, vec![]),
            (2, vec![key("b")]),
        ]);
        assert_eq!(tiers.len(), 1);
        assert_eq!(tiers[&2].len(), 2);
    }
}
