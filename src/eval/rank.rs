use std::collections::HashMap;

use utoipa::ToSchema;
use uuid::Uuid;

use super::score::{aggregate_scores, Grouping, ScoreEntry, ScoreQuery};
use crate::data::submission::EvaluationStatus;
use crate::error::EvalError;
use crate::store::{DirectoryStore, SubmissionStore, TaskStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub rank: u32,
    pub entity_id: Uuid,
    pub name: Option<String>,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Leaderboard {
    /// Rank of every ranked entity, including rows left out by [`Leaderboard::page`].
    pub ranks: HashMap<Uuid, u32>,
    pub rows: Vec<LeaderboardRow>,
}

impl Leaderboard {
    pub fn rank_of(&self, entity_id: Uuid) -> Option<u32> {
        self.ranks.get(&entity_id).copied()
    }

    /// Keeps the rows of one display page.
    pub fn page(mut self, len: usize, page: usize) -> Leaderboard {
        self.rows = self
            .rows
            .into_iter()
            .skip(len.saturating_mul(page))
            .take(len)
            .collect();
        self
    }
}

/// Dense ranks for scores already sorted in descending order: equal scores
/// share a rank and the next distinct score gets the following rank.
pub fn dense_ranks(sorted_scores: &[f64]) -> Vec<u32> {
    let mut ranks = Vec::with_capacity(sorted_scores.len());
    let mut previous: Option<(f64, u32)> = None;

    for score in sorted_scores {
        let rank = match previous {
            None => 1,
            Some((previous_score, previous_rank)) if previous_score == *score => previous_rank,
            Some((_, previous_rank)) => previous_rank + 1,
        };
        ranks.push(rank);
        previous = Some((*score, rank));
    }

    ranks
}

/// Orders entries by score (descending), display name and id, then assigns
/// dense ranks.
pub fn rank(entries: Vec<ScoreEntry>, names: &HashMap<Uuid, String>) -> Leaderboard {
    let mut keyed: Vec<(String, LeaderboardRow)> = entries
        .into_iter()
        .map(|entry| {
            let name = names.get(&entry.entity_id).cloned();
            let sort_name = name
                .clone()
                .unwrap_or_else(|| entry.entity_id.to_string());
            let row = LeaderboardRow {
                rank: 0,
                entity_id: entry.entity_id,
                name,
                score: entry.aggregate_score,
            };
            (sort_name, row)
        })
        .collect();

    keyed.sort_by(|(a_name, a), (b_name, b)| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a_name.cmp(b_name))
            .then_with(|| a.entity_id.cmp(&b.entity_id))
    });
    let mut rows: Vec<LeaderboardRow> = keyed.into_iter().map(|(_, row)| row).collect();

    let scores: Vec<f64> = rows.iter().map(|it| it.score).collect();
    for (row, rank) in rows.iter_mut().zip(dense_ranks(&scores)) {
        row.rank = rank;
    }

    Leaderboard {
        ranks: rows.iter().map(|it| (it.entity_id, it.rank)).collect(),
        rows,
    }
}

/// Ranks students or classes by their aggregate score.
///
/// Only submissions with a completed evaluation count towards the score.
#[tracing::instrument(skip(store))]
pub async fn leaderboard<S>(store: &S, query: &ScoreQuery) -> Result<Leaderboard, EvalError>
where
    S: SubmissionStore + TaskStore + DirectoryStore,
{
    let query = ScoreQuery {
        evaluation_status: Some(EvaluationStatus::Completed),
        ..query.clone()
    };
    let entries = aggregate_scores(store, &query).await?;
    let ids: Vec<Uuid> = entries.iter().map(|it| it.entity_id).collect();

    let names = match query.grouping {
        Grouping::Student => store.student_names(&ids).await?,
        Grouping::Class => store
            .get_classes(&ids)
            .await?
            .into_iter()
            .map(|it| (it.id, it.name))
            .collect(),
    };

    Ok(rank(entries, &names))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(score: f64) -> ScoreEntry {
        ScoreEntry {
            entity_id: Uuid::new_v4(),
            aggregate_score: score,
            submission_count: 1,
        }
    }

    #[test]
    fn dense_rank_law() {
        assert_eq!(dense_ranks(&[90.0, 90.0, 80.0, 70.0, 70.0]), vec![1, 1, 2, 3, 3]);
    }

    #[test]
    fn dense_ranks_of_nothing() {
        assert!(dense_ranks(&[]).is_empty());
    }

    #[test]
    fn rank_sorts_unordered_input() {
        let entries = vec![entry(70.0), entry(90.0), entry(80.0), entry(90.0), entry(70.0)];
        let board = rank(entries, &HashMap::new());

        let ranked: Vec<(f64, u32)> = board.rows.iter().map(|it| (it.score, it.rank)).collect();
        assert_eq!(
            ranked,
            vec![(90.0, 1), (90.0, 1), (80.0, 2), (70.0, 3), (70.0, 3)]
        );
    }

    #[test]
    fn ties_are_ordered_by_name() {
        let zoe = entry(10.0);
        let ana = entry(10.0);
        let names = HashMap::from([
            (zoe.entity_id, "Zoe".to_string()),
            (ana.entity_id, "Ana".to_string()),
        ]);

        let board = rank(vec![zoe.clone(), ana.clone()], &names);
        assert_eq!(board.rows[0].entity_id, ana.entity_id);
        assert_eq!(board.rows[1].entity_id, zoe.entity_id);
        assert_eq!(board.rank_of(zoe.entity_id), Some(1));
    }

    #[test]
    fn partial_credit_ranks_between_whole_scores() {
        let board = rank(vec![entry(3.0), entry(3.5), entry(3.5), entry(2.0)], &HashMap::new());

        let ranks: Vec<u32> = board.rows.iter().map(|it| it.rank).collect();
        assert_eq!(ranks, vec![1, 1, 2, 3]);
        assert_eq!(board.rows[0].score, 3.5);
    }

    #[test]
    fn unnamed_entities_are_ordered_by_id() {
        let mut entries = vec![entry(1.0), entry(1.0), entry(1.0)];
        let mut ids: Vec<Uuid> = entries.iter().map(|it| it.entity_id).collect();
        ids.sort_by_key(|it| it.to_string());
        entries.reverse();

        let board = rank(entries, &HashMap::new());
        let order: Vec<Uuid> = board.rows.iter().map(|it| it.entity_id).collect();
        assert_eq!(order, ids);
    }

    #[test]
    fn paged_out_rows_keep_their_rank() {
        let entries = vec![entry(3.0), entry(2.0), entry(1.0)];
        let last = entries[2].entity_id;

        let board = rank(entries, &HashMap::new()).page(2, 0);

        assert_eq!(board.rows.len(), 2);
        assert_eq!(board.rank_of(last), Some(3));
    }

    #[test]
    fn paging_skips_earlier_pages() {
        let entries = vec![entry(5.0), entry(4.0), entry(3.0), entry(2.0), entry(1.0)];
        let board = rank(entries, &HashMap::new()).page(2, 1);

        let ranks: Vec<u32> = board.rows.iter().map(|it| it.rank).collect();
        assert_eq!(ranks, vec![3, 4]);
    }
}
