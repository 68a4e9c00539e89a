use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use matchform::match_dataset::{self, LoadOptions};
use matchform::model_table::{AssembleOptions, Target, assemble};
use matchform::rolling_form::FormConfig;
use matchform::team_rows::symmetrize;
use matchform::team_strength::StrengthWeights;

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
    let out_path = flag_value(&args, "--out")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("model_features.csv"));
    let target = match flag_value(&args, "--target").as_deref() {
        None | Some("xg") => Target::XgFor,
        Some("goals") => Target::GoalsFor,
        Some(other) => return Err(anyhow!("unknown target `{other}` (expected xg or goals)")),
    };

    let mut form = FormConfig::default();
    if let Some(span) = flag_value(&args, "--span") {
        form.span = span
            .parse::<f64>()
            .with_context(|| format!("invalid --span `{span}`"))?;
    }

    // Leagues without ppda/deep tracking produce holes; drop-and-count is
    // the default, --strict turns every hole into a hard failure.
    let load_opts = LoadOptions {
        drop_incomplete: !args.iter().any(|a| a == "--strict"),
    };

    let (records, load_report) = match (db_path, csv_path) {
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
            target,
            form,
            weights: StrengthWeights::default(),
        },
    )?;
    table.write_csv(&out_path)?;

    let teams: BTreeSet<&str> = views.iter().map(|v| v.team.as_str()).collect();
    let seasons: BTreeSet<&str> = views.iter().map(|v| v.season.as_str()).collect();

    println!("Feature build complete");
    println!("Out: {}", out_path.display());
    println!(
        "Matches: {} loaded, {} dropped, {} duplicates removed",
        records.len(),
        load_report.rows_dropped,
        load_report.duplicates_removed
    );
    println!(
        "Rows: {} ({} team-match views, {} teams, {} seasons)",
        table.rows.len(),
        views.len(),
        teams.len(),
        seasons.len()
    );
    println!(
        "Join misses: {} opponent, {} salary",
        table.report.opponent_misses, table.report.salary_misses
    );

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
    println!("build_features --db <path> | --csv <path> [options]");
    println!("  --db <path>         sqlite database with a match_data table");
    println!("  --csv <path>        match stats csv");
    println!("  --salaries <path>   weekly wage csv (season,team,weekly_wage_k)");
    println!("  --division <name>   restrict output rows to one division");
    println!("  --target xg|goals   target column (default xg)");
    println!("  --span <n>          rolling EMA span (default 35)");
    println!("  --out <path>        output csv (default model_features.csv)");
    println!("  --strict            fail on rows with missing stats instead of dropping");
}
