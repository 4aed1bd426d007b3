//! Ranked eligibility: who may be matched with whom.
//!
//! A player P accepts an opponent Q when
//! `|score(Q) - score(P)| <= ratio * seconds_waited(P)`. The tolerance
//! only grows while P waits, so anyone P would accept now they will
//! still accept later, and a long enough wait makes everyone acceptable.
//!
//! A ranked group is a set of `match_size` players who all accept each
//! other: each member lies in the intersection of the others' eligibility
//! sets. Candidates are tried in queue order, so among possible groups
//! the one made of the earliest-queued players wins.

use std::time::Duration;

use guessmatch_protocol::PlayerId;

/// A present (non-absent) ranked player, as seen at one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub id: PlayerId,
    pub score: u32,
    pub waited: Duration,
}

/// Score difference a player accepts after waiting `waited`.
pub fn tolerance(ratio: f64, waited: Duration) -> f64 {
    ratio * waited.as_secs_f64()
}

/// Whether `p` accepts `q` as an opponent. Not symmetric.
pub fn accepts(p: &Candidate, q: &Candidate, ratio: f64) -> bool {
    let diff = f64::from(p.score.abs_diff(q.score));
    diff <= tolerance(ratio, p.waited)
}

fn mutually_eligible(a: &Candidate, b: &Candidate, ratio: f64) -> bool {
    accepts(a, b, ratio) && accepts(b, a, ratio)
}

/// Finds the first group of `match_size` mutually eligible candidates.
///
/// Returns indices into `candidates`, ascending. `None` when no such group
/// exists, which includes an empty queue or one shorter than
/// `match_size`.
pub fn find_ranked_group(candidates: &[Candidate], match_size: usize, ratio: f64) -> Option<Vec<usize>> {
    if match_size == 0 || candidates.len() < match_size {
        return None;
    }
    let mut group = Vec::with_capacity(match_size);
    extend_group(candidates, match_size, ratio, 0, &mut group).then_some(group)
}

/// Depth-first search in queue order. `group` holds indices already
/// chosen; tries every later candidate compatible with all of them.
fn extend_group(
    candidates: &[Candidate],
    match_size: usize,
    ratio: f64,
    from: usize,
    group: &mut Vec<usize>,
) -> bool {
    if group.len() == match_size {
        return true;
    }
    let needed = match_size - group.len();
    for i in from..candidates.len() {
        if candidates.len() - i < needed {
            break;
        }
        let fits = group
            .iter()
            .all(|&g| mutually_eligible(&candidates[g], &candidates[i], ratio));
        if fits {
            group.push(i);
            if extend_group(candidates, match_size, ratio, i + 1, group) {
                return true;
            }
            group.pop();
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn c(id: u64, score: u32, waited_secs: u64) -> Candidate {
        Candidate {
            id: PlayerId(id),
            score,
            waited: Duration::from_secs(waited_secs),
        }
    }

    #[test]
    fn test_find_ranked_group_empty_or_singleton_is_none() {
        assert_eq!(find_ranked_group(&[], 2, 10.0), None);
        assert_eq!(find_ranked_group(&[c(1, 0, 100)], 2, 10.0), None);
    }

    #[test]
    fn test_find_ranked_group_equal_scores_match_immediately() {
        let group = find_ranked_group(&[c(1, 50, 0), c(2, 50, 0)], 2, 10.0);
        assert_eq!(group, Some(vec![0, 1]));
    }

    #[test]
    fn test_find_ranked_group_needs_both_sides_to_accept() {
        // Player 1 has waited long enough to accept a 100-point gap,
        // player 2 has not.
        let players = [c(1, 0, 10), c(2, 100, 5)];
        assert_eq!(find_ranked_group(&players, 2, 10.0), None);

        let players = [c(1, 0, 10), c(2, 100, 10)];
        assert_eq!(find_ranked_group(&players, 2, 10.0), Some(vec![0, 1]));
    }

    #[test]
    fn test_find_ranked_group_prefers_earlier_queued() {
        let players = [c(1, 300, 0), c(2, 10, 2), c(3, 20, 2), c(4, 15, 2)];
        assert_eq!(find_ranked_group(&players, 2, 10.0), Some(vec![1, 2]));
    }

    #[test]
    fn test_find_ranked_group_backtracks_past_bad_first_pick() {
        // 1 and 2 accept each other, but 3 only fits with 1 and 4.
        let players = [c(1, 100, 3), c(2, 130, 3), c(3, 75, 3), c(4, 80, 3)];
        assert_eq!(find_ranked_group(&players, 3, 10.0), Some(vec![0, 2, 3]));
    }

    #[test]
    fn test_tolerance_grows_with_wait() {
        assert_eq!(tolerance(10.0, Duration::ZERO), 0.0);
        assert_eq!(tolerance(10.0, Duration::from_millis(2500)), 25.0);
    }

    fn candidates() -> impl Strategy<Value = Vec<Candidate>> {
        prop::collection::vec((0u32..500, 0u64..30), 0..8).prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, (score, wait))| c(i as u64, score, wait))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_accepts_is_monotonic_in_wait(
            a in 0u32..1000, b in 0u32..1000, wait in 0u64..100, extra in 0u64..100,
        ) {
            let early = c(1, a, wait);
            let late = c(1, a, wait + extra);
            let other = c(2, b, 0);
            if accepts(&early, &other, 10.0) {
                prop_assert!(accepts(&late, &other, 10.0));
            }
        }

        #[test]
        fn prop_group_is_full_size_and_mutually_eligible(players in candidates(), size in 2usize..4) {
            if let Some(group) = find_ranked_group(&players, size, 10.0) {
                prop_assert_eq!(group.len(), size);
                for &x in &group {
                    for &y in &group {
                        prop_assert!(accepts(&players[x], &players[y], 10.0));
                    }
                }
            }
        }

        #[test]
        fn prop_longer_waits_never_lose_a_match(players in candidates(), extra in 0u64..30, size in 2usize..4) {
            let later: Vec<Candidate> = players
                .iter()
                .map(|p| Candidate { waited: p.waited + Duration::from_secs(extra), ..*p })
                .collect();
            if find_ranked_group(&players, size, 10.0).is_some() {
                prop_assert!(find_ranked_group(&later, size, 10.0).is_some());
            }
        }
    }
}
