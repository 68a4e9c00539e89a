use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;

use crate::days_rest::days_rest;
use crate::error::FormError;
use crate::match_dataset::SalaryRow;
use crate::rolling_form::{FormConfig, rolling_ema};
use crate::team_rows::{GroupBy, StatKey, StatSide, TeamMatchView};
use crate::team_strength::{StrengthWeights, compute_team_strength};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    XgFor,
    GoalsFor,
}

impl Target {
    pub fn column_name(self) -> &'static str {
        match self {
            Target::XgFor => "xg_for",
            Target::GoalsFor => "goals_for",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssembleOptions {
    pub division: Option<String>,
    pub target: Target,
    pub form: FormConfig,
    pub weights: StrengthWeights,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            division: None,
            target: Target::XgFor,
            form: FormConfig::default(),
            weights: StrengthWeights::default(),
        }
    }
}

// Failed lookups never drop a row; they become empty cells and a count here.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoinReport {
    pub opponent_misses: usize,
    pub salary_misses: usize,
}

#[derive(Debug, Clone)]
pub struct ModelRow {
    pub division: String,
    pub season: String,
    pub date: NaiveDate,
    pub team: String,
    pub opponent_team: String,
    pub home: bool,
    pub days_rest: i64,
    pub own_rolling_xg_for: f64,
    pub own_rolling_xg_against: f64,
    pub own_strength: f64,
    pub own_wage_m: Option<f64>,
    pub opponent_rolling_xg_for: Option<f64>,
    pub opponent_rolling_xg_against: Option<f64>,
    pub opponent_strength: Option<f64>,
    pub opponent_wage_m: Option<f64>,
    pub target: f64,
}

pub const FEATURE_NAMES: [&str; 10] = [
    "home",
    "days_rest",
    "own_rolling_xg_for",
    "own_rolling_xg_against",
    "own_strength",
    "own_wage_m",
    "opponent_rolling_xg_for",
    "opponent_rolling_xg_against",
    "opponent_strength",
    "opponent_wage_m",
];

#[derive(Debug, Clone)]
pub struct ModelTable {
    pub rows: Vec<ModelRow>,
    pub report: JoinReport,
    pub target: Target,
}

/// Joins the symmetric view table with its rolling, rest and strength
/// signals into one model-input row per view. Opponent columns come from
/// the mirrored row of the same fixture.
pub fn assemble(
    views: &[TeamMatchView],
    salaries: &[SalaryRow],
    opts: &AssembleOptions,
) -> Result<ModelTable, FormError> {
    let rest = days_rest(views)?;
    let xg_for = rolling_ema(views, GroupBy::Team, StatSide::Own, StatKey::Xg, &opts.form)?;
    let xg_against = rolling_ema(
        views,
        GroupBy::Team,
        StatSide::Opponent,
        StatKey::Xg,
        &opts.form,
    )?;
    let strength = compute_team_strength(views, salaries, &opts.weights)?;

    let mut report = JoinReport {
        salary_misses: strength.salary_misses,
        ..JoinReport::default()
    };

    let mut mirror: HashMap<(NaiveDate, &str, &str, &str), usize> = HashMap::new();
    for (i, view) in views.iter().enumerate() {
        mirror.insert(
            (
                view.date,
                view.division.as_str(),
                view.team.as_str(),
                view.opponent_team.as_str(),
            ),
            i,
        );
    }

    let mut rows = Vec::new();
    for (i, view) in views.iter().enumerate() {
        if let Some(division) = &opts.division
            && &view.division != division
        {
            continue;
        }

        let Some(own) = strength.get(&view.season, &view.team) else {
            return Err(FormError::EmptyPartition {
                team: view.team.clone(),
                season: view.season.clone(),
            });
        };

        let mirror_idx = mirror
            .get(&(
                view.date,
                view.division.as_str(),
                view.opponent_team.as_str(),
                view.team.as_str(),
            ))
            .copied();
        if mirror_idx.is_none() {
            report.opponent_misses += 1;
        }
        let opponent = strength.get(&view.season, &view.opponent_team);

        let target = match opts.target {
            Target::XgFor => view.own.xg,
            Target::GoalsFor => view.own.goals,
        };

        rows.push(ModelRow {
            division: view.division.clone(),
            season: view.season.clone(),
            date: view.date,
            team: view.team.clone(),
            opponent_team: view.opponent_team.clone(),
            home: view.home,
            days_rest: rest[i],
            own_rolling_xg_for: xg_for[i],
            own_rolling_xg_against: xg_against[i],
            own_strength: own.strength,
            own_wage_m: own.weekly_wage_m,
            opponent_rolling_xg_for: mirror_idx.map(|j| xg_for[j]),
            opponent_rolling_xg_against: mirror_idx.map(|j| xg_against[j]),
            opponent_strength: opponent.map(|o| o.strength),
            opponent_wage_m: opponent.and_then(|o| o.weekly_wage_m),
            target,
        });
    }

    Ok(ModelTable {
        rows,
        report,
        target: opts.target,
    })
}

impl ModelTable {
    /// Feature matrix plus target vector for the regression step. Counted
    /// join misses fall back to the neutral 0.
    pub fn design_matrix(&self) -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut rows = Vec::with_capacity(self.rows.len());
        let mut targets = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            rows.push(vec![
                if row.home { 1.0 } else { 0.0 },
                row.days_rest as f64,
                row.own_rolling_xg_for,
                row.own_rolling_xg_against,
                row.own_strength,
                row.own_wage_m.unwrap_or(0.0),
                row.opponent_rolling_xg_for.unwrap_or(0.0),
                row.opponent_rolling_xg_against.unwrap_or(0.0),
                row.opponent_strength.unwrap_or(0.0),
                row.opponent_wage_m.unwrap_or(0.0),
            ]);
            targets.push(row.target);
        }
        (rows, targets)
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), FormError> {
        let mut wtr = csv::Writer::from_path(path)?;
        self.write_into(&mut wtr)
    }

    pub fn to_csv_string(&self) -> Result<String, FormError> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        self.write_into(&mut wtr)?;
        let bytes = wtr
            .into_inner()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| FormError::Io(std::io::Error::other(e.to_string())))
    }

    fn write_into<W: Write>(&self, wtr: &mut csv::Writer<W>) -> Result<(), FormError> {
        let mut header = vec![
            "division",
            "season",
            "date",
            "team",
            "opponent_team",
        ];
        header.extend_from_slice(&FEATURE_NAMES);
        header.push(self.target.column_name());
        wtr.write_record(&header)?;

        for row in &self.rows {
            wtr.write_record(&[
                row.division.clone(),
                row.season.clone(),
                row.date.format("%Y-%m-%d").to_string(),
                row.team.clone(),
                row.opponent_team.clone(),
                if row.home { "1" } else { "0" }.to_string(),
                row.days_rest.to_string(),
                row.own_rolling_xg_for.to_string(),
                row.own_rolling_xg_against.to_string(),
                row.own_strength.to_string(),
                optional_cell(row.own_wage_m),
                optional_cell(row.opponent_rolling_xg_for),
                optional_cell(row.opponent_rolling_xg_against),
                optional_cell(row.opponent_strength),
                optional_cell(row.opponent_wage_m),
                row.target.to_string(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn optional_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
