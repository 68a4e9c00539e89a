use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::FormError;
use crate::team_rows::{GroupBy, GroupPartition, StatKey, StatSide, TeamMatchView, season_partitions};

// Stand-in for the lag that does not exist before a team's first match of a
// chain. Exposed as-is for a debut, blended with the carried seed otherwise.
pub const NEUTRAL_VALUE: f64 = 0.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FormConfig {
    // EMA span S; alpha = 2 / (S + 1).
    pub span: f64,
    // Discount applied to the last exposed value of a season before it
    // seeds the next one.
    pub season_penalty: f64,
}

impl FormConfig {
    pub fn fine() -> Self {
        Self {
            span: 35.0,
            season_penalty: 0.75,
        }
    }

    // Shorter memory for coarse composite signals like team strength.
    pub fn coarse() -> Self {
        Self {
            span: 10.0,
            season_penalty: 0.75,
        }
    }

    pub fn alpha(&self) -> f64 {
        2.0 / (self.span + 1.0)
    }

    fn validate(&self) -> Result<(), FormError> {
        if !self.span.is_finite() || self.span < 1.0 {
            return Err(FormError::InvalidConfig {
                reason: format!("span must be >= 1, got {}", self.span),
            });
        }
        if !self.season_penalty.is_finite() || !(0.0..=1.0).contains(&self.season_penalty) {
            return Err(FormError::InvalidConfig {
                reason: format!(
                    "season_penalty must be within [0, 1], got {}",
                    self.season_penalty
                ),
            });
        }
        Ok(())
    }
}

impl Default for FormConfig {
    fn default() -> Self {
        Self::fine()
    }
}

// Per (key, season) accumulator. Created on the first observation of a
// season, carried over the boundary only as a discounted seed, then dropped.
#[derive(Debug, Clone, Copy)]
pub struct RollingFormState {
    ema: Option<f64>,
    last_exposed: f64,
    seen: usize,
}

impl RollingFormState {
    fn start_of_career() -> Self {
        Self {
            ema: None,
            last_exposed: NEUTRAL_VALUE,
            seen: 0,
        }
    }

    fn next_season(self, penalty: f64) -> Self {
        let seed = self.last_exposed * penalty;
        Self {
            ema: Some((NEUTRAL_VALUE + seed) / 2.0),
            last_exposed: NEUTRAL_VALUE,
            seen: 0,
        }
    }

    // The value attached to the current match: everything absorbed so far,
    // nothing from the match itself.
    fn expose(&mut self) -> f64 {
        let value = self.ema.unwrap_or(NEUTRAL_VALUE);
        self.last_exposed = value;
        value
    }

    fn absorb(&mut self, x: f64, alpha: f64) {
        self.ema = Some(match self.ema {
            None => x,
            Some(prev) => alpha * x + (1.0 - alpha) * prev,
        });
        self.seen += 1;
    }
}

/// Season-aware lagged EMA of one stat, one value per input view, aligned by
/// index. Grouping by `Opponent` reproduces a key's form from the rows of
/// the sides that faced it, which must agree with the `Team` grouping on the
/// mirrored rows.
pub fn rolling_ema(
    views: &[TeamMatchView],
    group: GroupBy,
    side: StatSide,
    stat: StatKey,
    cfg: &FormConfig,
) -> Result<Vec<f64>, FormError> {
    cfg.validate()?;
    let partitions = season_partitions(views, group)?;

    // Keys never share state, so the fold parallelizes across them freely.
    let folded: Vec<Result<Vec<(usize, f64)>, FormError>> = partitions
        .par_iter()
        .map(|partition| fold_group(views, partition, side, stat, cfg))
        .collect();

    let mut out = vec![NEUTRAL_VALUE; views.len()];
    for group_values in folded {
        for (idx, value) in group_values? {
            out[idx] = value;
        }
    }
    Ok(out)
}

fn fold_group(
    views: &[TeamMatchView],
    partition: &GroupPartition<'_>,
    side: StatSide,
    stat: StatKey,
    cfg: &FormConfig,
) -> Result<Vec<(usize, f64)>, FormError> {
    let alpha = cfg.alpha();
    let mut out = Vec::new();
    let mut carried: Option<RollingFormState> = None;

    for slice in &partition.seasons {
        if slice.indices.is_empty() {
            return Err(FormError::EmptyPartition {
                team: partition.key.to_string(),
                season: slice.season.to_string(),
            });
        }

        let mut state = match carried {
            None => RollingFormState::start_of_career(),
            Some(previous) => previous.next_season(cfg.season_penalty),
        };

        for &idx in &slice.indices {
            let view = &views[idx];
            let x = view.stat(side, stat);
            if !x.is_finite() {
                return Err(FormError::NonFiniteStat {
                    stat: stat.name(),
                    team: view.team.clone(),
                    date: view.date,
                });
            }
            out.push((idx, state.expose()));
            state.absorb(x, alpha);
        }
        carried = Some(state);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_dataset::TeamStats;
    use chrono::NaiveDate;

    fn view(team: &str, opponent: &str, season: &str, day: u32, xg: f64) -> TeamMatchView {
        TeamMatchView {
            division: "E0".to_string(),
            season: season.to_string(),
            date: NaiveDate::from_ymd_opt(2021, 8, day).unwrap(),
            team: team.to_string(),
            opponent_team: opponent.to_string(),
            home: true,
            own: TeamStats {
                goals: 0.0,
                xg,
                shots: 0.0,
                deep: 0.0,
                ppda: 0.0,
                avg_market_value: 0.0,
            },
            opponent: TeamStats {
                goals: 0.0,
                xg: 0.0,
                shots: 0.0,
                deep: 0.0,
                ppda: 0.0,
                avg_market_value: 0.0,
            },
        }
    }

    #[test]
    fn invalid_span_is_rejected() {
        let views = vec![view("A", "B", "2021", 1, 1.0)];
        let cfg = FormConfig {
            span: 0.0,
            season_penalty: 0.75,
        };
        let err =
            rolling_ema(&views, GroupBy::Team, StatSide::Own, StatKey::Xg, &cfg).unwrap_err();
        assert!(matches!(err, FormError::InvalidConfig { .. }));
    }

    #[test]
    fn invalid_penalty_is_rejected() {
        let views = vec![view("A", "B", "2021", 1, 1.0)];
        let cfg = FormConfig {
            span: 10.0,
            season_penalty: 1.5,
        };
        let err =
            rolling_ema(&views, GroupBy::Team, StatSide::Own, StatKey::Xg, &cfg).unwrap_err();
        assert!(matches!(err, FormError::InvalidConfig { .. }));
    }

    #[test]
    fn single_observation_career_exposes_neutral() {
        let views = vec![view("A", "B", "2021", 1, 3.2)];
        let cfg = FormConfig::fine();
        let out = rolling_ema(&views, GroupBy::Team, StatSide::Own, StatKey::Xg, &cfg).unwrap();
        assert_eq!(out, vec![NEUTRAL_VALUE]);
    }

    #[test]
    fn non_finite_stat_fails_the_run() {
        let views = vec![view("A", "B", "2021", 1, f64::INFINITY)];
        let cfg = FormConfig::fine();
        let err =
            rolling_ema(&views, GroupBy::Team, StatSide::Own, StatKey::Xg, &cfg).unwrap_err();
        assert!(matches!(err, FormError::NonFiniteStat { .. }));
    }

    #[test]
    fn unsorted_input_is_an_ordering_error() {
        let views = vec![
            view("A", "B", "2021", 20, 1.0),
            view("A", "C", "2021", 10, 2.0),
        ];
        let cfg = FormConfig::fine();
        let err =
            rolling_ema(&views, GroupBy::Team, StatSide::Own, StatKey::Xg, &cfg).unwrap_err();
        assert!(matches!(err, FormError::NonMonotonicDates { .. }));
    }
}
