use std::collections::HashMap;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::{FeedConfig, OrderDirectives, PlaylistConfig};

use super::compose_playlist;
use super::episode::{
    EpisodeCandidate, EpisodeKey, Progress, ProgressMap, prepare_feed, should_include,
};
use super::order::{group_by_tier, order_episodes};

fn key(id: &str) -> EpisodeKey {
    EpisodeKey::new("item", id)
}

fn candidate(id: &str, published_at: i64) -> EpisodeCandidate {
    EpisodeCandidate {
        key: key(id),
        published_at: Some(published_at),
    }
}

fn feed(name: &str, sort: &str, count: usize, tier: i64) -> FeedConfig {
    FeedConfig {
        feed_name: name.to_string(),
        sort: sort.to_string(),
        count,
        tier,
    }
}

fn policy(include_in_progress: bool, include_finished: bool) -> PlaylistConfig {
    PlaylistConfig {
        playlist_name: "Test".to_string(),
        include_in_progress,
        include_finished,
        sort_order: Vec::new(),
        feeds: Vec::new(),
    }
}

fn started(fraction: f64) -> Progress {
    Progress {
        fraction,
        is_finished: false,
    }
}

fn finished() -> Progress {
    Progress {
        fraction: 1.0,
        is_finished: true,
    }
}

#[test]
fn never_started_episodes_count_as_in_progress_candidates() {
    assert!(should_include(&policy(true, false), None));
    assert!(!should_include(&policy(false, true), None));
    assert!(!should_include(&policy(false, false), None));
}

#[test]
fn partially_played_episodes_need_the_in_progress_flag() {
    assert!(should_include(&policy(true, false), Some(&started(0.5))));
    assert!(!should_include(&policy(false, true), Some(&started(0.5))));
}

#[test]
fn zero_and_complete_fractions_do_not_count_as_in_progress() {
    assert!(!should_include(&policy(true, false), Some(&started(0.0))));
    assert!(!should_include(&policy(true, false), Some(&started(1.0))));
}

#[test]
fn finished_episodes_are_only_admitted_by_the_finished_flag() {
    assert!(should_include(&policy(false, true), Some(&finished())));
    assert!(should_include(&policy(true, true), Some(&finished())));
    // Finished and in-progress are mutually exclusive categories: the
    // in-progress flag alone never admits a finished episode.
    assert!(!should_include(&policy(true, false), Some(&finished())));
    assert!(!should_include(&policy(false, false), Some(&finished())));
}

#[test]
fn prepare_sorts_oldest_first_when_configured() {
    let candidates = vec![candidate("b", 200), candidate("a", 100), candidate("c", 300)];

    let prepared = prepare_feed(
        &feed("f", "oldest", 0, 0),
        &policy(true, true),
        &candidates,
        &ProgressMap::new(),
    );

    assert_eq!(prepared, vec![key("a"), key("b"), key("c")]);
}

#[test]
fn prepare_sorts_newest_first_when_configured() {
    let candidates = vec![candidate("b", 200), candidate("a", 100), candidate("c", 300)];

    let prepared = prepare_feed(
        &feed("f", "newest", 0, 0),
        &policy(true, true),
        &candidates,
        &ProgressMap::new(),
    );

    assert_eq!(prepared, vec![key("c"), key("b"), key("a")]);
}

#[test]
fn prepare_keeps_input_order_for_unknown_sort() {
    let candidates = vec![candidate("b", 200), candidate("a", 100), candidate("c", 300)];

    let prepared = prepare_feed(
        &feed("f", "whatever", 0, 0),
        &policy(true, true),
        &candidates,
        &ProgressMap::new(),
    );

    assert_eq!(prepared, vec![key("b"), key("a"), key("c")]);
}

#[test]
fn prepare_deduplicates_by_identity_keeping_the_first_occurrence() {
    let candidates = vec![candidate("a", 100), candidate("b", 200), candidate("a", 300)];

    let prepared = prepare_feed(
        &feed("f", "", 0, 0),
        &policy(true, true),
        &candidates,
        &ProgressMap::new(),
    );

    assert_eq!(prepared, vec![key("a"), key("b")]);
}

#[test]
fn truncation_applies_after_filtering_not_to_the_raw_feed() {
    // 5 raw episodes, only 3 pass the filter (the finished ones drop out),
    // count = 2 keeps the first 2 survivors.
    let candidates: Vec<EpisodeCandidate> =
        (1..=5).map(|n| candidate(&format!("e{n}"), n * 100)).collect();
    let mut progress = ProgressMap::new();
    progress.insert(key("e1"), finished());
    progress.insert(key("e3"), finished());

    let prepared = prepare_feed(
        &feed("f", "oldest", 2, 0),
        &policy(true, false),
        &candidates,
        &progress,
    );

    assert_eq!(prepared, vec![key("e2"), key("e4")]);
}

#[test]
fn zero_count_means_unlimited() {
    let candidates: Vec<EpisodeCandidate> =
        (1..=4).map(|n| candidate(&format!("e{n}"), n)).collect();

    let prepared = prepare_feed(
        &feed("f", "", 0, 0),
        &policy(true, true),
        &candidates,
        &ProgressMap::new(),
    );

    assert_eq!(prepared.len(), 4);
}

fn tiered_fixture() -> Vec<(i64, Vec<EpisodeKey>)> {
    vec![
        (2, vec![key("x1"), key("x2")]),
        (1, vec![key("a"), key("b"), key("c")]),
        (1, vec![key("d")]),
    ]
}

#[test]
fn tier_directive_concatenates_tiers_in_ascending_key_order() {
    let directives = OrderDirectives {
        tier: true,
        ..Default::default()
    };
    let mut rng = StdRng::seed_from_u64(0);

    let ordered = order_episodes(group_by_tier(tiered_fixture()), &directives, &mut rng);

    assert_eq!(
        ordered,
        vec![key("a"), key("b"), key("c"), key("d"), key("x1"), key("x2")]
    );
}

#[test]
fn tier_with_roundrobin_interleaves_within_each_tier() {
    let directives = OrderDirectives {
        tier: true,
        roundrobin: true,
        ..Default::default()
    };
    let mut rng = StdRng::seed_from_u64(0);

    let ordered = order_episodes(group_by_tier(tiered_fixture()), &directives, &mut rng);

    assert_eq!(
        ordered,
        vec![key("a"), key("d"), key("b"), key("c"), key("x1"), key("x2")]
    );
}

#[test]
fn roundrobin_without_tier_ignores_tier_boundaries() {
    let directives = OrderDirectives {
        roundrobin: true,
        ..Default::default()
    };
    let mut rng = StdRng::seed_from_u64(0);

    let ordered = order_episodes(group_by_tier(tiered_fixture()), &directives, &mut rng);

    // Feed lists from both tiers rotate together: tier 1 lists first (map
    // iteration is ascending), then the tier 2 list joins the cycle.
    assert_eq!(
        ordered,
        vec![key("a"), key("d"), key("x1"), key("b"), key("x2"), key("c")]
    );
}

#[test]
fn ordering_without_shuffle_is_deterministic_across_runs() {
    for directives in [
        OrderDirectives {
            tier: true,
            ..Default::default()
        },
        OrderDirectives {
            tier: true,
            roundrobin: true,
            ..Default::default()
        },
        OrderDirectives {
            roundrobin: true,
            ..Default::default()
        },
    ] {
        let mut first_rng = StdRng::seed_from_u64(1);
        let mut second_rng = StdRng::seed_from_u64(99);
        let first = order_episodes(group_by_tier(tiered_fixture()), &directives, &mut first_rng);
        let second = order_episodes(group_by_tier(tiered_fixture()), &directives, &mut second_rng);
        assert_eq!(first, second, "directives {directives:?} should ignore the rng");
    }
}

#[test]
fn shuffle_outputs_a_permutation_and_is_seed_deterministic() {
    let directives = OrderDirectives {
        shuffle: true,
        ..Default::default()
    };

    let mut rng = StdRng::seed_from_u64(7);
    let ordered = order_episodes(group_by_tier(tiered_fixture()), &directives, &mut rng);

    let mut sorted: Vec<String> = ordered.iter().map(|k| k.episode_id.clone()).collect();
    sorted.sort();
    assert_eq!(sorted, vec!["a", "b", "c", "d", "x1", "x2"]);

    let mut same_seed = StdRng::seed_from_u64(7);
    let replay = order_episodes(group_by_tier(tiered_fixture()), &directives, &mut same_seed);
    assert_eq!(ordered, replay);
}

#[test]
fn tier_with_shuffle_keeps_tiers_segregated() {
    let directives = OrderDirectives {
        tier: true,
        shuffle: true,
        ..Default::default()
    };
    let mut rng = StdRng::seed_from_u64(3);

    let ordered = order_episodes(group_by_tier(tiered_fixture()), &directives, &mut rng);

    assert_eq!(ordered.len(), 6);
    let tier_two_start = ordered
        .iter()
        .position(|k| k.episode_id.starts_with('x'))
        .expect("tier 2 episodes should be present");
    assert!(
        ordered[tier_two_start..].iter().all(|k| k.episode_id.starts_with('x')),
        "tier 1 episodes must all come before tier 2: {ordered:?}"
    );
}

#[test]
fn tier_shuffle_roundrobin_still_takes_one_from_each_feed_per_round() {
    let directives = OrderDirectives {
        tier: true,
        roundrobin: true,
        shuffle: true,
        ..Default::default()
    };
    let mut rng = StdRng::seed_from_u64(11);

    let tiers = group_by_tier(vec![
        (1, vec![key("a1"), key("a2")]),
        (1, vec![key("b1"), key("b2")]),
    ]);
    let ordered = order_episodes(tiers, &directives, &mut rng);

    // Internal order of each feed is shuffled, but the first round still
    // holds one episode from each feed.
    assert_eq!(ordered.len(), 4);
    let first_round: Vec<char> = ordered[..2]
        .iter()
        .filter_map(|k| k.episode_id.chars().next())
        .collect();
    assert!(first_round.contains(&'a') && first_round.contains(&'b'));
}

#[test]
fn compose_skips_unknown_feeds_and_empty_feeds() {
    let playlist = PlaylistConfig {
        playlist_name: "Morning".to_string(),
        include_in_progress: true,
        include_finished: false,
        sort_order: vec!["tier".to_string()],
        feeds: vec![
            feed("Known", "oldest", 0, 1),
            feed("Missing", "oldest", 0, 1),
            feed("All Finished", "oldest", 0, 1),
        ],
    };

    let mut feeds = HashMap::new();
    feeds.insert("Known", vec![candidate("k1", 1), candidate("k2", 2)]);
    feeds.insert("All Finished", vec![candidate("f1", 1)]);
    let mut progress = ProgressMap::new();
    progress.insert(key("f1"), finished());

    let mut rng = StdRng::seed_from_u64(0);
    let target = compose_playlist(&playlist, &feeds, &progress, &mut rng);

    assert_eq!(target, vec![key("k1"), key("k2")]);
}

#[test]
fn compose_runs_the_full_pipeline_in_feed_declaration_order() {
    let playlist = PlaylistConfig {
        playlist_name: "Mixed".to_string(),
        include_in_progress: true,
        include_finished: true,
        sort_order: vec!["tier".to_string(), "roundrobin".to_string()],
        feeds: vec![
            feed("News", "newest", 2, 1),
            feed("Stories", "oldest", 0, 1),
            feed("Archive", "oldest", 0, 2),
        ],
    };

    let mut feeds = HashMap::new();
    feeds.insert(
        "News",
        vec![candidate("n1", 100), candidate("n2", 200), candidate("n3", 300)],
    );
    feeds.insert("Stories", vec![candidate("s1", 10), candidate("s2", 20)]);
    feeds.insert("Archive", vec![candidate("r1", 1)]);

    let mut rng = StdRng::seed_from_u64(0);
    let target = compose_playlist(&playlist, &feeds, &ProgressMap::new(), &mut rng);

    // News truncates to its 2 newest; tier 1 round-robins News with Stories
    // in declaration order; tier 2 follows.
    assert_eq!(
        target,
        vec![key("n3"), key("s1"), key("n2"), key("s2"), key("r1")]
    );
}
