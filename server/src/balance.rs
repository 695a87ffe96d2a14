//! Team balancing.
//!
//! Only red and blue count. When they differ by more than one player, half
//! the surplus (rounded down) moves from the larger team to the smaller one,
//! most recently joined first, so long-time members keep their team.

use crate::player::Player;
use shared::Team;
use std::cmp::Reverse;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeamCounts {
    pub red: usize,
    pub blue: usize,
    pub spectator: usize,
}

impl TeamCounts {
    pub fn imbalance(&self) -> usize {
        self.red.abs_diff(self.blue)
    }

    pub fn is_balanced(&self) -> bool {
        self.imbalance() <= 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalancePlan {
    pub from: Team,
    pub to: Team,
    /// Slots to force into `to`, in move order
    pub moves: Vec<u32>,
}

/// Computes the moves that even out red and blue, `None` if already balanced
pub fn plan_balance<'a>(
    counts: TeamCounts,
    players: impl IntoIterator<Item = &'a Player>,
) -> Option<BalancePlan> {
    if counts.is_balanced() {
        return None;
    }
    let (from, to) = if counts.red > counts.blue {
        (Team::Red, Team::Blue)
    } else {
        (Team::Blue, Team::Red)
    };
    let to_move = counts.imbalance() / 2;

    let mut candidates: Vec<&Player> = players
        .into_iter()
        .filter(|player| player.team == from && !player.is_world())
        .collect();
    candidates.sort_by_key(|player| (Reverse(player.time_joined), Reverse(player.slot)));

    Some(BalancePlan {
        from,
        to,
        moves: candidates
            .into_iter()
            .take(to_move)
            .map(|player| player.slot)
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(slot: u32, team: Team, joined: u64) -> Player {
        let mut player = Player::new(slot, "1.1.1.1", &format!("G{}", slot), "P", joined);
        player.team = team;
        player
    }

    fn counts(players: &[Player]) -> TeamCounts {
        let mut counts = TeamCounts::default();
        for p in players {
            match p.team {
                Team::Red => counts.red += 1,
                Team::Blue => counts.blue += 1,
                _ => counts.spectator += 1,
            }
        }
        counts
    }

    #[test]
    fn test_five_against_two_moves_newest_red() {
        let players = vec![
            player(0, Team::Red, 10),
            player(1, Team::Red, 50),
            player(2, Team::Red, 20),
            player(3, Team::Red, 40),
            player(4, Team::Red, 30),
            player(5, Team::Blue, 5),
            player(6, Team::Blue, 6),
        ];
        let plan = plan_balance(counts(&players), &players).unwrap();
        assert_eq!(plan.from, Team::Red);
        assert_eq!(plan.to, Team::Blue);
        assert_eq!(plan.moves, vec![1]);
    }

    #[test]
    fn test_three_against_two_is_balanced() {
        let players = vec![
            player(0, Team::Red, 1),
            player(1, Team::Red, 2),
            player(2, Team::Red, 3),
            player(3, Team::Blue, 4),
            player(4, Team::Blue, 5),
        ];
        assert!(plan_balance(counts(&players), &players).is_none());
    }

    #[test]
    fn test_blue_surplus_moves_to_red() {
        let players = vec![
            player(0, Team::Blue, 1),
            player(1, Team::Blue, 2),
            player(2, Team::Blue, 3),
            player(3, Team::Blue, 4),
            player(4, Team::Blue, 5),
            player(5, Team::Spectator, 9),
        ];
        let plan = plan_balance(counts(&players), &players).unwrap();
        assert_eq!(plan.to, Team::Red);
        assert_eq!(plan.moves, vec![4, 3]);
    }

    #[test]
    fn test_imbalance() {
        let counts = TeamCounts {
            red: 2,
            blue: 6,
            spectator: 1,
        };
        assert_eq!(counts.imbalance(), 4);
        assert!(!counts.is_balanced());
    }
}
