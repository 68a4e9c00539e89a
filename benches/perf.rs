use std::hint::black_box;

use chrono::NaiveDate;
use criterion::{Criterion, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use matchform::match_dataset::{MatchRecord, SalaryRow, TeamStats};
use matchform::model_table::{AssembleOptions, assemble};
use matchform::rolling_form::{FormConfig, rolling_ema};
use matchform::team_rows::{GroupBy, StatKey, StatSide, symmetrize};

// Ten seasons of a 20-team double round robin, deterministic.
fn synthetic_league() -> (Vec<MatchRecord>, Vec<SalaryRow>) {
    let mut rng = StdRng::seed_from_u64(42);
    let teams: Vec<String> = (0..20).map(|i| format!("Team{i:02}")).collect();

    let mut records = Vec::new();
    let mut salaries = Vec::new();
    for season_idx in 0..10u32 {
        let season = format!("{}", 2015 + season_idx);
        let season_start = NaiveDate::from_ymd_opt(2015 + season_idx as i32, 8, 1).unwrap();

        for (i, team) in teams.iter().enumerate() {
            salaries.push(SalaryRow {
                season: season.clone(),
                team: team.clone(),
                weekly_wage_m: 1.0 + i as f64 * 0.2,
            });
        }

        let mut fixture = 0i64;
        for home in 0..teams.len() {
            for away in 0..teams.len() {
                if home == away {
                    continue;
                }
                fixture += 1;
                let date = season_start + chrono::Duration::days(fixture % 270);
                let side = |rng: &mut StdRng| TeamStats {
                    goals: rng.gen_range(0..5) as f64,
                    xg: rng.gen_range(0.0..3.5),
                    shots: rng.gen_range(2.0..25.0),
                    deep: rng.gen_range(0.0..15.0),
                    ppda: rng.gen_range(4.0..20.0),
                    avg_market_value: rng.gen_range(5.0..60.0),
                };
                records.push(MatchRecord {
                    division: "E0".to_string(),
                    season: season.clone(),
                    date,
                    home_team: teams[home].clone(),
                    away_team: teams[away].clone(),
                    home: side(&mut rng),
                    away: side(&mut rng),
                });
            }
        }
    }
    records.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.home_team.cmp(&b.home_team))
    });
    (records, salaries)
}

fn bench_rolling_ema(c: &mut Criterion) {
    let (records, _) = synthetic_league();
    let views = symmetrize(&records).expect("symmetrize");
    let cfg = FormConfig::default();

    c.bench_function("rolling_ema_xg", |b| {
        b.iter(|| {
            let out = rolling_ema(
                black_box(&views),
                GroupBy::Team,
                StatSide::Own,
                StatKey::Xg,
                &cfg,
            )
            .expect("rolling");
            black_box(out.len());
        })
    });
}

fn bench_symmetrize(c: &mut Criterion) {
    let (records, _) = synthetic_league();

    c.bench_function("symmetrize", |b| {
        b.iter(|| {
            let views = symmetrize(black_box(&records)).expect("symmetrize");
            black_box(views.len());
        })
    });
}

fn bench_assemble(c: &mut Criterion) {
    let (records, salaries) = synthetic_league();
    let views = symmetrize(&records).expect("symmetrize");
    let opts = AssembleOptions::default();

    c.bench_function("assemble_model_table", |b| {
        b.iter(|| {
            let table = assemble(black_box(&views), &salaries, &opts).expect("assemble");
            black_box(table.rows.len());
        })
    });
}

criterion_group!(
    benches,
    bench_rolling_ema,
    bench_symmetrize,
    bench_assemble
);
criterion_main!(benches);
