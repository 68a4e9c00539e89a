use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use matchform::match_dataset::{self, LoadOptions};
use matchform::match_outcome::outcome_probs;
use matchform::model_table::{AssembleOptions, FEATURE_NAMES, Target, assemble};
use matchform::rolling_form::FormConfig;
use matchform::team_rows::symmetrize;
use matchform::team_strength::StrengthWeights;
use matchform::xg_model;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let db_path = flag_value(&args, "--db").map(PathBuf::from);
    let csv_path = flag_value(&args, "--csv").map(PathBuf::from);
    let salaries_path = flag_value(&args, "--salaries").map(PathBuf::from);
    let division = flag_value(&args, "--division");
    let save_path = flag_value(&args, "--save").map(PathBuf::from);
    let ridge = match flag_value(&args, "--ridge") {
        Some(raw) => raw
            .parse::<f64>()
            .with_context(|| format!("invalid --ridge `{raw}`"))?,
        None => 0.0,
    };

    let load_opts = LoadOptions {
        drop_incomplete: true,
    };
    let (records, _) = match (db_path, csv_path) {
        (Some(db), None) => {
            let conn = match_dataset::open_db(&db)
                .with_context(|| format!("open sqlite db {}", db.display()))?;
            match_dataset::load_matches_sqlite(&conn, &load_opts)?
        }
        (None, Some(path)) => match_dataset::load_matches_csv(&path, &load_opts)?,
        _ => return Err(anyhow!("pass exactly one of --db <path> or --csv <path>")),
    };
    if records.is_empty() {
        return Err(anyhow!("no usable match rows after loading"));
    }

    let salaries = match salaries_path {
        Some(path) => match_dataset::load_salaries_csv(&path)?,
        None => Vec::new(),
    };

    let views = symmetrize(&records)?;
    let table = assemble(
        &views,
        &salaries,
        &AssembleOptions {
            division,
            target: Target::XgFor,
            form: FormConfig::default(),
            weights: StrengthWeights::default(),
        },
    )?;

    let (mut rows, targets) = table.design_matrix();
    xg_model::standardize_rows(&mut rows);
    let summary = xg_model::fit(&rows, &targets, &FEATURE_NAMES, ridge)?;

    println!("xG regression fit");
    println!("Samples: {}", summary.samples);
    println!("Coefficient of determination: {:.4}", summary.r_squared);
    println!("Intercept: {:.4}", summary.intercept);
    for (name, coef) in summary.feature_names.iter().zip(&summary.coefficients) {
        println!("  {name:>28}: {coef:>9.4}");
    }

    if let Some(path) = save_path {
        save_summary(&summary, &path)?;
        println!("Saved fit to {}", path.display());
    }

    // League-average outcome check: mean predicted xG for home rows vs away
    // rows, pushed through the Poisson outcome model.
    let mut home_sum = 0.0;
    let mut home_n = 0usize;
    let mut away_sum = 0.0;
    let mut away_n = 0usize;
    for (features, model_row) in rows.iter().zip(&table.rows) {
        let pred = summary.predict(features)?;
        if model_row.home {
            home_sum += pred;
            home_n += 1;
        } else {
            away_sum += pred;
            away_n += 1;
        }
    }
    if home_n > 0 && away_n > 0 {
        let xg_home = home_sum / home_n as f64;
        let xg_away = away_sum / away_n as f64;
        let probs = outcome_probs(xg_home, xg_away);
        println!(
            "League-average match (xG {:.2} vs {:.2}): home {:.1}% draw {:.1}% away {:.1}%",
            xg_home,
            xg_away,
            probs.home * 100.0,
            probs.draw * 100.0,
            probs.away * 100.0
        );
    }

    Ok(())
}

fn save_summary(summary: &xg_model::FitSummary, path: &PathBuf) -> Result<()> {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(summary).context("serialize fit summary")?;
    std::fs::write(&tmp, json).context("write fit summary")?;
    std::fs::rename(&tmp, path).context("swap fit summary")?;
    Ok(())
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    for (idx, arg) in args.iter().enumerate() {
        if arg == flag {
            return args.get(idx + 1).cloned();
        }
        if let Some(value) = arg
            .strip_prefix(flag)
            .and_then(|rest| rest.strip_prefix('='))
        {
            return Some(value.to_string());
        }
    }
    None
}

fn print_usage() {
    println!("fit_xg --db <path> | --csv <path> [options]");
    println!("  --db <path>         sqlite database with a match_data table");
    println!("  --csv <path>        match stats csv");
    println!("  --salaries <path>   weekly wage csv (season,team,weekly_wage_k)");
    println!("  --division <name>   restrict the fit to one division");
    println!("  --ridge <lambda>    ridge penalty (default 0 = plain OLS)");
    println!("  --save <path>       write the fitted coefficients as json");
}
