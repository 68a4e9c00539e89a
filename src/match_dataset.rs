use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Deserialize;

use crate::error::FormError;

const DATE_FORMAT: &str = "%Y-%m-%d";

const MATCH_COLUMNS: &[&str] = &[
    "division",
    "season",
    "match_date",
    "home_team",
    "away_team",
    "home_goals",
    "away_goals",
    "home_xgoals",
    "away_xgoals",
    "home_shots",
    "away_shots",
    "home_deep",
    "away_deep",
    "home_ppda",
    "away_ppda",
    "home_avg_market_value",
    "away_avg_market_value",
];

const SALARY_COLUMNS: &[&str] = &["season", "team", "weekly_wage_k"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeamStats {
    pub goals: f64,
    pub xg: f64,
    pub shots: f64,
    pub deep: f64,
    pub ppda: f64,
    pub avg_market_value: f64,
}

impl TeamStats {
    // The one list of per-side stats; callers iterate this instead of
    // keeping their own column lists.
    pub fn named(&self) -> [(&'static str, f64); 6] {
        [
            ("goals", self.goals),
            ("xg", self.xg),
            ("shots", self.shots),
            ("deep", self.deep),
            ("ppda", self.ppda),
            ("avg_market_value", self.avg_market_value),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct MatchRecord {
    pub division: String,
    pub season: String,
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub home: TeamStats,
    pub away: TeamStats,
}

#[derive(Debug, Clone)]
pub struct SalaryRow {
    pub season: String,
    pub team: String,
    // Weekly wage in millions; input files carry thousands.
    pub weekly_wage_m: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    // Some leagues do not track ppda/deep. With this set, rows missing a
    // stat are dropped and counted instead of failing the batch.
    pub drop_incomplete: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadReport {
    pub rows_read: usize,
    pub rows_dropped: usize,
    pub duplicates_removed: usize,
}

#[derive(Debug, Clone, Default)]
struct RawMatch {
    division: String,
    season: String,
    date: String,
    home_team: String,
    away_team: String,
    home_goals: Option<f64>,
    away_goals: Option<f64>,
    home_xgoals: Option<f64>,
    away_xgoals: Option<f64>,
    home_shots: Option<f64>,
    away_shots: Option<f64>,
    home_deep: Option<f64>,
    away_deep: Option<f64>,
    home_ppda: Option<f64>,
    away_ppda: Option<f64>,
    home_avg_market_value: Option<f64>,
    away_avg_market_value: Option<f64>,
}

pub fn open_db(path: &Path) -> Result<Connection, FormError> {
    let conn = Connection::open(path)?;
    Ok(conn)
}

pub fn load_matches_sqlite(
    conn: &Connection,
    opts: &LoadOptions,
) -> Result<(Vec<MatchRecord>, LoadReport), FormError> {
    let mut stmt = conn.prepare(
        r#"
        SELECT DISTINCT
            division, season, match_date, home_team, away_team,
            home_goals, away_goals, home_xgoals, away_xgoals,
            home_shots, away_shots, home_deep, away_deep,
            home_ppda, away_ppda, home_avg_market_value, away_avg_market_value
        FROM match_data
        ORDER BY match_date ASC, division ASC, home_team ASC
        "#,
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(RawMatch {
            division: row.get(0)?,
            season: row.get(1)?,
            date: row.get(2)?,
            home_team: row.get(3)?,
            away_team: row.get(4)?,
            home_goals: row.get(5)?,
            away_goals: row.get(6)?,
            home_xgoals: row.get(7)?,
            away_xgoals: row.get(8)?,
            home_shots: row.get(9)?,
            away_shots: row.get(10)?,
            home_deep: row.get(11)?,
            away_deep: row.get(12)?,
            home_ppda: row.get(13)?,
            away_ppda: row.get(14)?,
            home_avg_market_value: row.get(15)?,
            away_avg_market_value: row.get(16)?,
        })
    })?;

    let mut raw = Vec::new();
    for row in rows {
        raw.push(row?);
    }
    finish_load(raw, opts)
}

pub fn load_matches_csv(
    path: &Path,
    opts: &LoadOptions,
) -> Result<(Vec<MatchRecord>, LoadReport), FormError> {
    let file = std::fs::File::open(path)?;
    parse_matches_csv(file, &path.display().to_string(), opts)
}

pub fn load_salaries_csv(path: &Path) -> Result<Vec<SalaryRow>, FormError> {
    let file = std::fs::File::open(path)?;
    parse_salaries_csv(file, &path.display().to_string())
}

fn parse_matches_csv<R: Read>(
    reader: R,
    origin: &str,
    opts: &LoadOptions,
) -> Result<(Vec<MatchRecord>, LoadReport), FormError> {
    let mut rdr = csv::Reader::from_reader(reader);
    check_columns(rdr.headers()?, MATCH_COLUMNS, origin)?;

    #[derive(Debug, Deserialize)]
    struct CsvMatchRow {
        division: String,
        season: String,
        match_date: String,
        home_team: String,
        away_team: String,
        home_goals: Option<f64>,
        away_goals: Option<f64>,
        home_xgoals: Option<f64>,
        away_xgoals: Option<f64>,
        home_shots: Option<f64>,
        away_shots: Option<f64>,
        home_deep: Option<f64>,
        away_deep: Option<f64>,
        home_ppda: Option<f64>,
        away_ppda: Option<f64>,
        home_avg_market_value: Option<f64>,
        away_avg_market_value: Option<f64>,
    }

    let mut raw = Vec::new();
    for row in rdr.deserialize::<CsvMatchRow>() {
        let row = row?;
        raw.push(RawMatch {
            division: row.division,
            season: row.season,
            date: row.match_date,
            home_team: row.home_team,
            away_team: row.away_team,
            home_goals: row.home_goals,
            away_goals: row.away_goals,
            home_xgoals: row.home_xgoals,
            away_xgoals: row.away_xgoals,
            home_shots: row.home_shots,
            away_shots: row.away_shots,
            home_deep: row.home_deep,
            away_deep: row.away_deep,
            home_ppda: row.home_ppda,
            away_ppda: row.away_ppda,
            home_avg_market_value: row.home_avg_market_value,
            away_avg_market_value: row.away_avg_market_value,
        });
    }
    finish_load(raw, opts)
}

fn parse_salaries_csv<R: Read>(reader: R, origin: &str) -> Result<Vec<SalaryRow>, FormError> {
    let mut rdr = csv::Reader::from_reader(reader);
    check_columns(rdr.headers()?, SALARY_COLUMNS, origin)?;

    #[derive(Debug, Deserialize)]
    struct CsvSalaryRow {
        season: String,
        team: String,
        weekly_wage_k: Option<f64>,
    }

    let mut out = Vec::new();
    for row in rdr.deserialize::<CsvSalaryRow>() {
        let row = row?;
        let Some(wage_k) = row.weekly_wage_k.filter(|w| w.is_finite()) else {
            return Err(FormError::InvalidValue {
                column: "weekly_wage_k".to_string(),
                value: format!("{} / {}", row.season, row.team),
            });
        };
        out.push(SalaryRow {
            season: row.season,
            team: row.team,
            weekly_wage_m: wage_k / 1000.0,
        });
    }
    Ok(out)
}

fn check_columns(
    headers: &csv::StringRecord,
    required: &[&str],
    origin: &str,
) -> Result<(), FormError> {
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(FormError::MissingColumn {
                column: column.to_string(),
                origin: origin.to_string(),
            });
        }
    }
    Ok(())
}

fn finish_load(
    raw: Vec<RawMatch>,
    opts: &LoadOptions,
) -> Result<(Vec<MatchRecord>, LoadReport), FormError> {
    let mut report = LoadReport {
        rows_read: raw.len(),
        ..LoadReport::default()
    };

    let mut records = Vec::with_capacity(raw.len());
    for row in raw {
        if let Some(record) = build_record(row, opts, &mut report)? {
            records.push(record);
        }
    }

    records.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.division.cmp(&b.division))
            .then_with(|| a.home_team.cmp(&b.home_team))
    });

    // One row per fixture: the same (date, home, away) must never feed the
    // rolling calculator twice.
    let mut seen: HashSet<(NaiveDate, String, String)> = HashSet::new();
    records.retain(|r| {
        let fresh = seen.insert((r.date, r.home_team.clone(), r.away_team.clone()));
        if !fresh {
            report.duplicates_removed += 1;
        }
        fresh
    });

    Ok((records, report))
}

fn build_record(
    raw: RawMatch,
    opts: &LoadOptions,
    report: &mut LoadReport,
) -> Result<Option<MatchRecord>, FormError> {
    let date = NaiveDate::parse_from_str(raw.date.trim(), DATE_FORMAT).map_err(|_| {
        FormError::InvalidValue {
            column: "match_date".to_string(),
            value: raw.date.clone(),
        }
    })?;

    let stats = [
        ("home_goals", raw.home_goals),
        ("away_goals", raw.away_goals),
        ("home_xgoals", raw.home_xgoals),
        ("away_xgoals", raw.away_xgoals),
        ("home_shots", raw.home_shots),
        ("away_shots", raw.away_shots),
        ("home_deep", raw.home_deep),
        ("away_deep", raw.away_deep),
        ("home_ppda", raw.home_ppda),
        ("away_ppda", raw.away_ppda),
        ("home_avg_market_value", raw.home_avg_market_value),
        ("away_avg_market_value", raw.away_avg_market_value),
    ];

    let unusable = stats
        .iter()
        .find_map(|(name, value)| match value {
            None => Some(*name),
            Some(v) if !v.is_finite() => Some(*name),
            Some(_) => None,
        });
    if let Some(stat) = unusable {
        if opts.drop_incomplete {
            report.rows_dropped += 1;
            return Ok(None);
        }
        return Err(FormError::MissingStat {
            stat,
            home_team: raw.home_team,
            away_team: raw.away_team,
            date,
        });
    }

    let home = TeamStats {
        goals: raw.home_goals.unwrap_or_default(),
        xg: raw.home_xgoals.unwrap_or_default(),
        shots: raw.home_shots.unwrap_or_default(),
        deep: raw.home_deep.unwrap_or_default(),
        ppda: raw.home_ppda.unwrap_or_default(),
        avg_market_value: raw.home_avg_market_value.unwrap_or_default(),
    };
    let away = TeamStats {
        goals: raw.away_goals.unwrap_or_default(),
        xg: raw.away_xgoals.unwrap_or_default(),
        shots: raw.away_shots.unwrap_or_default(),
        deep: raw.away_deep.unwrap_or_default(),
        ppda: raw.away_ppda.unwrap_or_default(),
        avg_market_value: raw.away_avg_market_value.unwrap_or_default(),
    };

    Ok(Some(MatchRecord {
        division: raw.division,
        season: raw.season,
        date,
        home_team: raw.home_team,
        away_team: raw.away_team,
        home,
        away,
    }))
}
