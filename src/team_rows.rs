use std::collections::HashMap;

use chrono::NaiveDate;

use crate::error::FormError;
use crate::match_dataset::{MatchRecord, TeamStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKey {
    Goals,
    Xg,
    Shots,
    Deep,
    Ppda,
    MarketValue,
}

impl StatKey {
    pub const ALL: [StatKey; 6] = [
        StatKey::Goals,
        StatKey::Xg,
        StatKey::Shots,
        StatKey::Deep,
        StatKey::Ppda,
        StatKey::MarketValue,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StatKey::Goals => "goals",
            StatKey::Xg => "xg",
            StatKey::Shots => "shots",
            StatKey::Deep => "deep",
            StatKey::Ppda => "ppda",
            StatKey::MarketValue => "avg_market_value",
        }
    }

    pub fn of(self, stats: &TeamStats) -> f64 {
        match self {
            StatKey::Goals => stats.goals,
            StatKey::Xg => stats.xg,
            StatKey::Shots => stats.shots,
            StatKey::Deep => stats.deep,
            StatKey::Ppda => stats.ppda,
            StatKey::MarketValue => stats.avg_market_value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatSide {
    Own,
    Opponent,
}

// One match seen from one side. Every fixture yields exactly two of these,
// and they are exact mirror images of each other.
#[derive(Debug, Clone)]
pub struct TeamMatchView {
    pub division: String,
    pub season: String,
    pub date: NaiveDate,
    pub team: String,
    pub opponent_team: String,
    pub home: bool,
    pub own: TeamStats,
    pub opponent: TeamStats,
}

impl TeamMatchView {
    pub fn stat(&self, side: StatSide, key: StatKey) -> f64 {
        match side {
            StatSide::Own => key.of(&self.own),
            StatSide::Opponent => key.of(&self.opponent),
        }
    }
}

pub fn symmetrize(records: &[MatchRecord]) -> Result<Vec<TeamMatchView>, FormError> {
    let mut views = Vec::with_capacity(records.len() * 2);
    for record in records {
        for (team, stats) in [
            (&record.home_team, &record.home),
            (&record.away_team, &record.away),
        ] {
            for (stat, value) in stats.named() {
                if !value.is_finite() {
                    return Err(FormError::NonFiniteStat {
                        stat,
                        team: team.clone(),
                        date: record.date,
                    });
                }
            }
        }
        views.push(perspective(record, true));
        views.push(perspective(record, false));
    }

    views.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.division.cmp(&b.division))
            .then_with(|| a.team.cmp(&b.team))
            .then_with(|| a.opponent_team.cmp(&b.opponent_team))
    });
    Ok(views)
}

// The whole home/away -> own/opponent renaming lives in this one swap, so
// the two perspectives cannot drift apart column by column.
fn perspective(record: &MatchRecord, home: bool) -> TeamMatchView {
    let (team, opponent_team, own, opponent) = if home {
        (&record.home_team, &record.away_team, record.home, record.away)
    } else {
        (&record.away_team, &record.home_team, record.away, record.home)
    };
    TeamMatchView {
        division: record.division.clone(),
        season: record.season.clone(),
        date: record.date,
        team: team.clone(),
        opponent_team: opponent_team.clone(),
        home,
        own,
        opponent,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Team,
    Opponent,
}

impl GroupBy {
    fn key(self, view: &TeamMatchView) -> &str {
        match self {
            GroupBy::Team => &view.team,
            GroupBy::Opponent => &view.opponent_team,
        }
    }
}

#[derive(Debug)]
pub(crate) struct SeasonSlice<'a> {
    pub season: &'a str,
    pub indices: Vec<usize>,
}

#[derive(Debug)]
pub(crate) struct GroupPartition<'a> {
    pub key: &'a str,
    pub seasons: Vec<SeasonSlice<'a>>,
}

// Splits the date-sorted view table into per-key, per-season index runs.
// Seasons must form contiguous blocks within a key and dates must not run
// backwards; either condition failing means the loader mis-sorted.
pub(crate) fn season_partitions<'a>(
    views: &'a [TeamMatchView],
    group: GroupBy,
) -> Result<Vec<GroupPartition<'a>>, FormError> {
    struct Builder<'a> {
        partition: GroupPartition<'a>,
        last_date: Option<NaiveDate>,
    }

    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut builders: Vec<Builder<'a>> = Vec::new();

    for (i, view) in views.iter().enumerate() {
        let key = group.key(view);
        let slot = *index.entry(key).or_insert_with(|| {
            builders.push(Builder {
                partition: GroupPartition {
                    key,
                    seasons: Vec::new(),
                },
                last_date: None,
            });
            builders.len() - 1
        });
        let builder = &mut builders[slot];

        if let Some(prev) = builder.last_date
            && view.date < prev
        {
            return Err(FormError::NonMonotonicDates {
                team: key.to_string(),
                season: view.season.clone(),
                prev,
                next: view.date,
            });
        }
        builder.last_date = Some(view.date);

        let current = builder.partition.seasons.last().map(|s| s.season);
        if current != Some(view.season.as_str()) {
            if builder
                .partition
                .seasons
                .iter()
                .any(|s| s.season == view.season)
            {
                return Err(FormError::SeasonsNotSeparable {
                    team: key.to_string(),
                    season: view.season.clone(),
                    interleaved: current.unwrap_or_default().to_string(),
                });
            }
            builder.partition.seasons.push(SeasonSlice {
                season: &view.season,
                indices: Vec::new(),
            });
        }
        if let Some(slice) = builder.partition.seasons.last_mut() {
            slice.indices.push(i);
        }
    }

    Ok(builders.into_iter().map(|b| b.partition).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(goals: f64, xg: f64) -> TeamStats {
        TeamStats {
            goals,
            xg,
            shots: 10.0,
            deep: 4.0,
            ppda: 9.0,
            avg_market_value: 20.0,
        }
    }

    fn record(date: &str, home_team: &str, away_team: &str) -> MatchRecord {
        MatchRecord {
            division: "E0".to_string(),
            season: "2021".to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            home: stats(2.0, 1.7),
            away: stats(1.0, 0.9),
        }
    }

    #[test]
    fn every_record_yields_two_mirror_views() {
        let records = vec![record("2021-08-14", "Arsenal", "Chelsea")];
        let views = symmetrize(&records).unwrap();
        assert_eq!(views.len(), 2);

        let home = views.iter().find(|v| v.home).unwrap();
        let away = views.iter().find(|v| !v.home).unwrap();
        assert_eq!(home.team, "Arsenal");
        assert_eq!(home.opponent_team, "Chelsea");
        assert_eq!(away.team, "Chelsea");
        assert_eq!(away.opponent_team, "Arsenal");
        assert_eq!(home.own, away.opponent);
        assert_eq!(home.opponent, away.own);
    }

    #[test]
    fn views_are_sorted_by_date_then_division_then_team() {
        let records = vec![
            record("2021-08-21", "Chelsea", "Leeds"),
            record("2021-08-14", "Arsenal", "Chelsea"),
        ];
        let views = symmetrize(&records).unwrap();
        assert_eq!(views.len(), 4);
        for pair in views.windows(2) {
            assert!(pair[0].date <= pair[1].date);
        }
        assert_eq!(views[0].team, "Arsenal");
    }

    #[test]
    fn non_finite_stat_is_rejected() {
        let mut bad = record("2021-08-14", "Arsenal", "Chelsea");
        bad.away.xg = f64::NAN;
        let err = symmetrize(&[bad]).unwrap_err();
        match err {
            FormError::NonFiniteStat { stat, team, .. } => {
                assert_eq!(stat, "xg");
                assert_eq!(team, "Chelsea");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn interleaved_seasons_are_detected() {
        let mut a = record("2021-08-14", "Arsenal", "Chelsea");
        a.season = "2021".to_string();
        let mut b = record("2021-08-21", "Arsenal", "Leeds");
        b.season = "2022".to_string();
        let mut c = record("2021-08-28", "Arsenal", "Spurs");
        c.season = "2021".to_string();

        let views = symmetrize(&[a, b, c]).unwrap();
        let err = season_partitions(&views, GroupBy::Team).unwrap_err();
        assert!(matches!(err, FormError::SeasonsNotSeparable { .. }));
    }
}
