use chrono::NaiveDate;

use crate::error::FormError;
use crate::team_rows::{GroupBy, TeamMatchView, season_partitions};

/// Whole days since the team's previous match, one value per view, aligned
/// by index. Resets to 0 at the first match of each (team, season) pair:
/// unlike the rolling EMA, rest does not carry over the summer break.
pub fn days_rest(views: &[TeamMatchView]) -> Result<Vec<i64>, FormError> {
    let partitions = season_partitions(views, GroupBy::Team)?;
    let mut out = vec![0i64; views.len()];

    for partition in &partitions {
        for slice in &partition.seasons {
            if slice.indices.is_empty() {
                return Err(FormError::EmptyPartition {
                    team: partition.key.to_string(),
                    season: slice.season.to_string(),
                });
            }
            let mut previous: Option<NaiveDate> = None;
            for &idx in &slice.indices {
                let date = views[idx].date;
                out[idx] = match previous {
                    None => 0,
                    Some(prev) => date.signed_duration_since(prev).num_days(),
                };
                previous = Some(date);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_dataset::TeamStats;

    fn view(team: &str, season: &str, ymd: (i32, u32, u32)) -> TeamMatchView {
        let blank = TeamStats {
            goals: 0.0,
            xg: 0.0,
            shots: 0.0,
            deep: 0.0,
            ppda: 0.0,
            avg_market_value: 0.0,
        };
        TeamMatchView {
            division: "E0".to_string(),
            season: season.to_string(),
            date: NaiveDate::from_ymd_opt(ymd.0, ymd.1, ymd.2).unwrap(),
            team: team.to_string(),
            opponent_team: "Other".to_string(),
            home: true,
            own: blank,
            opponent: blank,
        }
    }

    #[test]
    fn gaps_are_counted_in_whole_days() {
        let views = vec![
            view("A", "2021", (2021, 8, 14)),
            view("A", "2021", (2021, 8, 21)),
            view("A", "2021", (2021, 8, 24)),
        ];
        let rest = days_rest(&views).unwrap();
        assert_eq!(rest, vec![0, 7, 3]);
    }

    #[test]
    fn rest_resets_at_every_season_start() {
        // Three months between the last 2021 match and the 2022 opener; the
        // opener must still read 0.
        let views = vec![
            view("A", "2021", (2022, 5, 22)),
            view("A", "2022", (2022, 8, 13)),
            view("A", "2022", (2022, 8, 20)),
        ];
        let rest = days_rest(&views).unwrap();
        assert_eq!(rest, vec![0, 0, 7]);
    }

    #[test]
    fn teams_do_not_share_rest_state() {
        let views = vec![
            view("A", "2021", (2021, 8, 14)),
            view("B", "2021", (2021, 8, 15)),
            view("A", "2021", (2021, 8, 20)),
            view("B", "2021", (2021, 8, 25)),
        ];
        let rest = days_rest(&views).unwrap();
        assert_eq!(rest, vec![0, 0, 6, 10]);
    }

    #[test]
    fn backwards_dates_are_an_ordering_error() {
        let views = vec![
            view("A", "2021", (2021, 8, 21)),
            view("A", "2021", (2021, 8, 14)),
        ];
        let err = days_rest(&views).unwrap_err();
        assert!(matches!(err, FormError::NonMonotonicDates { .. }));
    }
}
