use rand::Rng;

// Scorelines beyond this carry negligible mass at football xG levels; the
// pmf tail residue is folded into the last bucket so nothing is lost.
pub const MAX_GOALS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

#[derive(Debug, Clone, Copy)]
pub struct Prob3 {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl Prob3 {
    pub fn uniform() -> Self {
        Self {
            home: 1.0 / 3.0,
            draw: 1.0 / 3.0,
            away: 1.0 / 3.0,
        }
    }
}

pub fn classify_outcome(home_goals: i32, away_goals: i32) -> Outcome {
    if home_goals > away_goals {
        Outcome::Home
    } else if home_goals < away_goals {
        Outcome::Away
    } else {
        Outcome::Draw
    }
}

/// Home/draw/away probabilities from two xG estimates, treating each side's
/// goal count as an independent Poisson draw truncated at `MAX_GOALS`.
pub fn outcome_probs(xg_home: f64, xg_away: f64) -> Prob3 {
    let pmf_home = poisson_pmf(xg_home, MAX_GOALS);
    let pmf_away = poisson_pmf(xg_away, MAX_GOALS);

    let mut p_home = 0.0;
    let mut p_draw = 0.0;
    let mut p_away = 0.0;
    for (h, p_h) in pmf_home.iter().enumerate() {
        for (a, p_a) in pmf_away.iter().enumerate() {
            let p = p_h * p_a;
            if h > a {
                p_home += p;
            } else if h < a {
                p_away += p;
            } else {
                p_draw += p;
            }
        }
    }

    // Guard against tiny float drift.
    let sum = p_home + p_draw + p_away;
    if sum > 0.0 {
        Prob3 {
            home: p_home / sum,
            draw: p_draw / sum,
            away: p_away / sum,
        }
    } else {
        Prob3::uniform()
    }
}

pub fn simulate_outcome<R: Rng>(rng: &mut R, probs: Prob3) -> Outcome {
    let total = (probs.home + probs.draw + probs.away).max(1e-12);
    let roll = rng.gen_range(0.0..1.0) * total;
    if roll < probs.home {
        Outcome::Home
    } else if roll < probs.home + probs.draw {
        Outcome::Draw
    } else {
        Outcome::Away
    }
}

fn poisson_pmf(lambda: f64, max_k: u32) -> Vec<f64> {
    let max_k = max_k as usize;
    let lambda = lambda.max(0.0);
    let mut out = vec![0.0; max_k + 1];

    out[0] = (-lambda).exp();
    for k in 1..=max_k {
        out[k] = out[k - 1] * lambda / k as f64;
    }

    let sum: f64 = out.iter().sum();
    if sum < 1.0 {
        out[max_k] += 1.0 - sum;
    }
    out
}
