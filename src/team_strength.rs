use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::FormError;
use crate::match_dataset::SalaryRow;
use crate::team_rows::TeamMatchView;

// Composite weights over the standardized season aggregates. The xG
// difference dominates; wages are a small prior on squad quality.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StrengthWeights {
    pub xg_diff: f64,
    pub goal_diff: f64,
    pub salary: f64,
}

impl Default for StrengthWeights {
    fn default() -> Self {
        Self {
            xg_diff: 0.75,
            goal_diff: 0.2,
            salary: 0.05,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TeamSeasonStrength {
    pub season: String,
    pub team: String,
    pub matches: usize,
    pub avg_xg_diff: f64,
    pub avg_goal_diff: f64,
    pub weekly_wage_m: Option<f64>,
    pub strength: f64,
}

#[derive(Debug, Clone)]
pub struct StrengthTable {
    rows: Vec<TeamSeasonStrength>,
    index: HashMap<(String, String), usize>,
    pub salary_misses: usize,
}

impl StrengthTable {
    pub fn get(&self, season: &str, team: &str) -> Option<&TeamSeasonStrength> {
        self.index
            .get(&(season.to_string(), team.to_string()))
            .map(|&i| &self.rows[i])
    }

    pub fn rows(&self) -> &[TeamSeasonStrength] {
        &self.rows
    }
}

/// One strength score per (season, team): z-scored season averages of xG
/// difference and goal difference plus the z-scored weekly wage, combined
/// with `weights`. Wage rows are joined on exact (season, team) equality;
/// misses stay `None`, count toward `salary_misses`, and contribute a
/// neutral 0 to the composite.
pub fn compute_team_strength(
    views: &[TeamMatchView],
    salaries: &[SalaryRow],
    weights: &StrengthWeights,
) -> Result<StrengthTable, FormError> {
    for (name, w) in [
        ("xg_diff", weights.xg_diff),
        ("goal_diff", weights.goal_diff),
        ("salary", weights.salary),
    ] {
        if !w.is_finite() {
            return Err(FormError::InvalidConfig {
                reason: format!("strength weight {name} is not finite"),
            });
        }
    }

    struct Agg {
        matches: usize,
        xg_diff_sum: f64,
        goal_diff_sum: f64,
    }

    let mut order: Vec<(String, String)> = Vec::new();
    let mut aggs: HashMap<(String, String), Agg> = HashMap::new();
    for view in views {
        let key = (view.season.clone(), view.team.clone());
        let agg = aggs.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            Agg {
                matches: 0,
                xg_diff_sum: 0.0,
                goal_diff_sum: 0.0,
            }
        });
        agg.matches += 1;
        agg.xg_diff_sum += view.own.xg - view.opponent.xg;
        agg.goal_diff_sum += view.own.goals - view.opponent.goals;
    }

    let mut wages: HashMap<(&str, &str), f64> = HashMap::new();
    for salary in salaries {
        wages.insert((salary.season.as_str(), salary.team.as_str()), salary.weekly_wage_m);
    }

    let mut salary_misses = 0usize;
    let mut rows = Vec::with_capacity(order.len());
    for key in &order {
        let Some(agg) = aggs.get(key) else {
            return Err(FormError::EmptyPartition {
                team: key.1.clone(),
                season: key.0.clone(),
            });
        };
        let n = agg.matches as f64;
        let weekly_wage_m = wages.get(&(key.0.as_str(), key.1.as_str())).copied();
        if weekly_wage_m.is_none() {
            salary_misses += 1;
        }
        rows.push(TeamSeasonStrength {
            season: key.0.clone(),
            team: key.1.clone(),
            matches: agg.matches,
            avg_xg_diff: agg.xg_diff_sum / n,
            avg_goal_diff: agg.goal_diff_sum / n,
            weekly_wage_m,
            strength: 0.0,
        });
    }

    let z_xg_diff = zscores(&rows.iter().map(|r| r.avg_xg_diff).collect::<Vec<_>>());
    let z_goal_diff = zscores(&rows.iter().map(|r| r.avg_goal_diff).collect::<Vec<_>>());
    let z_wage = zscores_with_gaps(&rows.iter().map(|r| r.weekly_wage_m).collect::<Vec<_>>());

    for (i, row) in rows.iter_mut().enumerate() {
        row.strength = weights.xg_diff * z_xg_diff[i]
            + weights.goal_diff * z_goal_diff[i]
            + weights.salary * z_wage[i];
    }

    let index = rows
        .iter()
        .enumerate()
        .map(|(i, r)| ((r.season.clone(), r.team.clone()), i))
        .collect();

    Ok(StrengthTable {
        rows,
        index,
        salary_misses,
    })
}

fn zscores(values: &[f64]) -> Vec<f64> {
    let Some((mean, std)) = mean_std(values) else {
        return vec![0.0; values.len()];
    };
    values.iter().map(|v| (v - mean) / std).collect()
}

// Mean and spread come from the present values only; absent entries land on
// the neutral 0.
fn zscores_with_gaps(values: &[Option<f64>]) -> Vec<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let Some((mean, std)) = mean_std(&present) else {
        return vec![0.0; values.len()];
    };
    values
        .iter()
        .map(|v| match v {
            Some(v) => (v - mean) / std,
            None => 0.0,
        })
        .collect()
}

fn mean_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();
    if std <= f64::EPSILON {
        return None;
    }
    Some((mean, std))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_dataset::TeamStats;
    use chrono::NaiveDate;

    fn view(team: &str, opponent: &str, day: u32, xg: f64, xga: f64, gf: f64, ga: f64) -> TeamMatchView {
        TeamMatchView {
            division: "E0".to_string(),
            season: "2021".to_string(),
            date: NaiveDate::from_ymd_opt(2021, 9, day).unwrap(),
            team: team.to_string(),
            opponent_team: opponent.to_string(),
            home: true,
            own: TeamStats {
                goals: gf,
                xg,
                shots: 0.0,
                deep: 0.0,
                ppda: 0.0,
                avg_market_value: 0.0,
            },
            opponent: TeamStats {
                goals: ga,
                xg: xga,
                shots: 0.0,
                deep: 0.0,
                ppda: 0.0,
                avg_market_value: 0.0,
            },
        }
    }

    fn salary(team: &str, wage_m: f64) -> SalaryRow {
        SalaryRow {
            season: "2021".to_string(),
            team: team.to_string(),
            weekly_wage_m: wage_m,
        }
    }

    #[test]
    fn stronger_team_scores_higher() {
        let views = vec![
            view("A", "B", 1, 2.0, 0.5, 3.0, 0.0),
            view("B", "A", 1, 0.5, 2.0, 0.0, 3.0),
            view("A", "B", 8, 1.8, 0.7, 2.0, 1.0),
            view("B", "A", 8, 0.7, 1.8, 1.0, 2.0),
        ];
        let salaries = vec![salary("A", 3.5), salary("B", 1.2)];
        let table =
            compute_team_strength(&views, &salaries, &StrengthWeights::default()).unwrap();

        let a = table.get("2021", "A").unwrap();
        let b = table.get("2021", "B").unwrap();
        assert_eq!(a.matches, 2);
        assert!(a.strength > b.strength);
        // Symmetric two-team league: composites mirror each other.
        assert!((a.strength + b.strength).abs() < 1e-9);
    }

    #[test]
    fn missing_salary_is_counted_not_dropped() {
        let views = vec![
            view("A", "B", 1, 2.0, 0.5, 3.0, 0.0),
            view("B", "A", 1, 0.5, 2.0, 0.0, 3.0),
        ];
        let salaries = vec![salary("A", 3.5)];
        let table =
            compute_team_strength(&views, &salaries, &StrengthWeights::default()).unwrap();

        assert_eq!(table.salary_misses, 1);
        let b = table.get("2021", "B").unwrap();
        assert!(b.weekly_wage_m.is_none());
        // Row survives with a neutral salary term.
        assert!(b.strength.is_finite());
    }

    #[test]
    fn non_finite_weight_is_rejected() {
        let views = vec![view("A", "B", 1, 1.0, 1.0, 1.0, 1.0)];
        let weights = StrengthWeights {
            xg_diff: f64::NAN,
            ..StrengthWeights::default()
        };
        let err = compute_team_strength(&views, &[], &weights).unwrap_err();
        assert!(matches!(err, FormError::InvalidConfig { .. }));
    }
}
