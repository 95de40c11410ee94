use std::cmp::Reverse;

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::roster::Player;

/// One ranked line of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    pub player_id: Uuid,
    pub nickname: String,
    pub score: u32,
    /// 1-based position.
    pub rank: usize,
}

/// Rank players by score, earliest joiner first on ties.
///
/// The join sequence breaks ties between identical join timestamps, so the
/// result is a pure function of the roster snapshot.
pub fn rank<'a>(players: impl IntoIterator<Item = &'a Player>) -> Vec<LeaderboardEntry> {
    let mut sorted: Vec<&Player> = players.into_iter().collect();
    sorted.sort_by_key(|player| (Reverse(player.score), player.joined_at, player.join_seq));

    sorted
        .into_iter()
        .enumerate()
        .map(|(position, player)| LeaderboardEntry {
            player_id: player.id,
            nickname: player.nickname.clone(),
            score: player.score,
            rank: position + 1,
        })
        .collect()
}

/// Keep the `limit` best entries.
pub fn top(entries: Vec<LeaderboardEntry>, limit: usize) -> Vec<LeaderboardEntry> {
    entries.into_iter().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    fn player(nickname: &str, score: u32, joined_offset_ms: u64, join_seq: u64) -> Player {
        Player {
            id: Uuid::new_v4(),
            nickname: nickname.into(),
            score,
            joined_at: SystemTime::UNIX_EPOCH + Duration::from_millis(joined_offset_ms),
            join_seq,
            connected: true,
            eligible_from: 0,
        }
    }

    #[test]
    fn higher_scores_rank_first() {
        let players = [player("b", 0, 0, 0), player("a", 900, 10, 1)];
        let board = rank(&players);

        let names: Vec<_> = board.iter().map(|entry| entry.nickname.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[1].rank, 2);
    }

    #[test]
    fn ties_go_to_the_earliest_joiner() {
        let players = [
            player("late", 500, 30, 2),
            player("early", 500, 10, 0),
            player("same-time", 500, 10, 1),
        ];
        let names: Vec<_> = rank(&players)
            .into_iter()
            .map(|entry| entry.nickname)
            .collect();
        assert_eq!(names, ["early", "same-time", "late"]);
    }

    #[test]
    fn ranking_is_deterministic() {
        let players = [
            player("c", 100, 5, 2),
            player("a", 300, 1, 0),
            player("b", 100, 5, 1),
            player("d", 0, 0, 3),
        ];
        assert_eq!(rank(&players), rank(&players));
        assert_eq!(rank(players.iter().rev()), rank(&players));
    }

    #[test]
    fn top_truncates() {
        let players = [player("a", 3, 0, 0), player("b", 2, 0, 1), player("c", 1, 0, 2)];
        let best = top(rank(&players), 2);
        assert_eq!(best.len(), 2);
        assert_eq!(best[1].nickname, "b");
    }
}
