// core/src/training.rs
//! Svak supervisjon + logistisk regresjon.
//!
//! Det finnes ingen logg over faktiske observasjoner av morild, så treningssettet
//! syntetiseres: tilfeldige tidspunkter får features fra miljømodellen og en
//! label fra en håndskrevet regel. Regelen er en modellantakelse, ikke et funn.
use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{debug, info, warn};
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::{LabelRule, TrainingConfig};
use crate::error::{BlueGlowError, Result};
use crate::features::{feature_names, EnvironmentModel, FeatureVector, NightMode};
use crate::model::{sigmoid, ClassReport, Evaluation, ModelMetadata, TrainedModel, MODEL_TYPE};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingSample {
    pub features: FeatureVector,
    pub label: u8,
}

/// Mørk natt + lavvann + lave bølger => 1, ellers 0.
pub fn weak_label_rule(
    illumination: f64,
    is_night: bool,
    tide_level: f64,
    wave_height: f64,
    rule: &LabelRule,
) -> u8 {
    let dark_night = illumination < rule.max_illumination && is_night;
    let low_tide = tide_level < rule.max_tide_level;
    let low_wave = wave_height < rule.max_wave_height;
    u8::from(dark_night && low_tide && low_wave)
}

pub fn weak_label(f: &FeatureVector, rule: &LabelRule) -> u8 {
    weak_label_rule(
        f.moon_illumination,
        f.is_night,
        f.tide_level,
        f.wave_height,
        rule,
    )
}

/// Strategi for å trekke treningstidspunkter.
pub trait TimestampSampler {
    fn sample(&mut self) -> DateTime<Utc>;
}

/// Uniformt over dag 0..365 og time 0..24 i ett år, med eksplisitt seed.
pub struct UniformYearSampler {
    year_start: DateTime<Utc>,
    rng: StdRng,
}

impl UniformYearSampler {
    pub fn new(year: i32, seed: u64) -> Result<Self> {
        let year_start = NaiveDate::from_ymd_opt(year, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| BlueGlowError::validation(format!("invalid sample year {year}")))?
            .and_utc();
        Ok(Self {
            year_start,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl TimestampSampler for UniformYearSampler {
    fn sample(&mut self) -> DateTime<Utc> {
        let day = self.rng.gen_range(0..365);
        let hour = self.rng.gen_range(0..24);
        self.year_start + Duration::days(day) + Duration::hours(hour)
    }
}

pub fn generate_samples(
    env: &dyn EnvironmentModel,
    sampler: &mut dyn TimestampSampler,
    n: usize,
    rule: &LabelRule,
) -> Vec<TrainingSample> {
    let samples: Vec<TrainingSample> = (0..n)
        .map(|_| {
            let features = env.features(sampler.sample(), NightMode::FromSun);
            TrainingSample {
                features,
                label: weak_label(&features, rule),
            }
        })
        .collect();
    let positives = samples.iter().filter(|s| s.label == 1).count();
    info!(
        "🏷️ {} svake sampler: {} positive ({:.1} %), {} negative",
        n,
        positives,
        100.0 * positives as f64 / n.max(1) as f64,
        n - positives
    );
    samples
}

/// Stratifisert split: samme klasseandel i train og test.
pub fn stratified_split(
    samples: &[TrainingSample],
    test_fraction: f64,
    seed: u64,
) -> (Vec<TrainingSample>, Vec<TrainingSample>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(samples.len());
    let mut test = Vec::new();
    for class in [0u8, 1u8] {
        let mut idx: Vec<usize> = (0..samples.len())
            .filter(|&i| samples[i].label == class)
            .collect();
        idx.shuffle(&mut rng);
        let n_test = (idx.len() as f64 * test_fraction).round() as usize;
        for (k, i) in idx.into_iter().enumerate() {
            if k < n_test {
                test.push(samples[i]);
            } else {
                train.push(samples[i]);
            }
        }
    }
    (train, test)
}

#[derive(Debug, Clone)]
pub struct FitOptions {
    pub c: f64,
    pub max_iter: usize,
    pub tolerance: f64,
}

#[derive(Debug, Clone)]
pub struct FitResult {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
}

/// Balanserte klassevekter n / (2·n_klasse).
pub fn balanced_class_weights(y: &[u8]) -> [f64; 2] {
    let n = y.len() as f64;
    let pos = y.iter().filter(|&&v| v == 1).count() as f64;
    let neg = n - pos;
    [
        if neg > 0.0 { n / (2.0 * neg) } else { 0.0 },
        if pos > 0.0 { n / (2.0 * pos) } else { 0.0 },
    ]
}

fn dot(beta: &[f64], x: &[f64]) -> f64 {
    beta[0] + beta[1..].iter().zip(x).map(|(b, v)| b * v).sum::<f64>()
}

/// 0.5·||w||² + C·Σ s_i·logloss_i (intercept ustraffet).
fn objective(beta: &[f64], x: &[Vec<f64>], y: &[u8], w: &[f64; 2], c: f64) -> f64 {
    let penalty = 0.5 * beta[1..].iter().map(|b| b * b).sum::<f64>();
    let loss: f64 = x
        .iter()
        .zip(y)
        .map(|(xi, &yi)| {
            let z = dot(beta, xi);
            // log(1 + e^z) - y·z, numerisk stabilt
            let softplus = if z > 0.0 {
                z + (-z).exp().ln_1p()
            } else {
                z.exp().ln_1p()
            };
            w[yi as usize] * (softplus - f64::from(yi) * z)
        })
        .sum();
    penalty + c * loss
}

/// Gauss-eliminasjon med delvis pivotering.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by_key(|&r| OrderedFloat(a[r][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return Err(BlueGlowError::Training("singular Hessian".into()));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for r in col + 1..n {
            let f = a[r][col] / a[col][col];
            if f == 0.0 {
                continue;
            }
            for k in col..n {
                a[r][k] -= f * a[col][k];
            }
            b[r] -= f * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for r in (0..n).rev() {
        let s: f64 = (r + 1..n).map(|k| a[r][k] * x[k]).sum();
        x[r] = (b[r] - s) / a[r][r];
    }
    Ok(x)
}

/// L2-regularisert, klassebalansert logistisk regresjon via Newton–Raphson
/// med backtracking.
pub fn fit_logistic(x: &[Vec<f64>], y: &[u8], opts: &FitOptions) -> Result<FitResult> {
    if x.is_empty() || x.len() != y.len() {
        return Err(BlueGlowError::Training(
            "empty training set or length mismatch".into(),
        ));
    }
    let p = x[0].len();
    if x.iter().any(|row| row.len() != p || row.iter().any(|v| !v.is_finite())) {
        return Err(BlueGlowError::Training(
            "ragged or non-finite feature rows".into(),
        ));
    }
    let w = balanced_class_weights(y);
    if w[0] == 0.0 || w[1] == 0.0 {
        return Err(BlueGlowError::Training(
            "training set contains a single class".into(),
        ));
    }

    let dim = p + 1;
    let mut beta = vec![0.0; dim];
    let mut current = objective(&beta, x, y, &w, opts.c);
    let mut converged = false;
    let mut iterations = 0;

    for iter in 1..=opts.max_iter {
        iterations = iter;
        let mut grad = vec![0.0; dim];
        let mut hess = vec![vec![0.0; dim]; dim];
        for (xi, &yi) in x.iter().zip(y) {
            let prob = sigmoid(dot(&beta, xi));
            let s = w[yi as usize];
            let r = opts.c * s * (prob - f64::from(yi));
            let h = opts.c * s * prob * (1.0 - prob);
            for j in 0..dim {
                let xj = if j == 0 { 1.0 } else { xi[j - 1] };
                grad[j] += r * xj;
                for k in j..dim {
                    let xk = if k == 0 { 1.0 } else { xi[k - 1] };
                    hess[j][k] += h * xj * xk;
                }
            }
        }
        for j in 0..dim {
            for k in 0..j {
                hess[j][k] = hess[k][j];
            }
        }
        for j in 1..dim {
            grad[j] += beta[j];
            hess[j][j] += 1.0;
        }

        let delta = solve(hess, grad)?;
        let mut step = 1.0;
        let mut candidate: Vec<f64>;
        let mut value;
        loop {
            candidate = beta.iter().zip(&delta).map(|(b, d)| b - step * d).collect();
            value = objective(&candidate, x, y, &w, opts.c);
            if value <= current || step < 1e-6 {
                break;
            }
            step *= 0.5;
        }
        let max_change = delta.iter().map(|d| (step * d).abs()).fold(0.0, f64::max);
        beta = candidate;
        debug!("newton iter {iter}: objective {value:.6}, step {step}, max Δ {max_change:.3e}");
        let improvement = current - value;
        current = value;
        if max_change < opts.tolerance || improvement.abs() < opts.tolerance * current.abs().max(1.0)
        {
            converged = true;
            break;
        }
    }
    if !converged {
        warn!(
            "⚠️ Logistisk regresjon konvergerte ikke på {} iterasjoner",
            opts.max_iter
        );
    }

    Ok(FitResult {
        intercept: beta[0],
        coefficients: beta[1..].to_vec(),
        iterations,
        converged,
    })
}

fn class_report(tp: usize, fp: usize, fn_: usize) -> ClassReport {
    let ratio = |a: usize, b: usize| if b == 0 { 0.0 } else { a as f64 / b as f64 };
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    ClassReport {
        precision,
        recall,
        f1,
        support: tp + fn_,
    }
}

/// ROC-AUC som Mann–Whitney U med snittrang for like verdier.
pub fn roc_auc(y: &[u8], scores: &[f64]) -> Option<f64> {
    let n_pos = y.iter().filter(|&&v| v == 1).count();
    let n_neg = y.len() - n_pos;
    if n_pos == 0 || n_neg == 0 || y.len() != scores.len() {
        return None;
    }
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by_key(|&i| OrderedFloat(scores[i]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // rangene i..=j (1-basert) deler snittet
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            ranks[order[k]] = avg;
        }
        i = j + 1;
    }
    let rank_sum: f64 = y
        .iter()
        .zip(&ranks)
        .filter(|(&l, _)| l == 1)
        .map(|(_, r)| *r)
        .sum();
    let u = rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Some(u / (n_pos as f64 * n_neg as f64))
}

pub fn evaluate(model: &TrainedModel, test: &[TrainingSample], train_size: usize) -> Result<Evaluation> {
    let mut probs = Vec::with_capacity(test.len());
    let (mut tp, mut fp, mut tn, mut fn_) = (0, 0, 0, 0);
    for s in test {
        let p = model.predict_proba(&s.features)?;
        probs.push(p);
        match (p > 0.5, s.label == 1) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, false) => tn += 1,
            (false, true) => fn_ += 1,
        }
    }
    let labels: Vec<u8> = test.iter().map(|s| s.label).collect();
    Ok(Evaluation {
        low: class_report(tn, fn_, fp),
        high: class_report(tp, fp, fn_),
        accuracy: if test.is_empty() {
            0.0
        } else {
            (tp + tn) as f64 / test.len() as f64
        },
        roc_auc: roc_auc(&labels, &probs),
        train_size,
        test_size: test.len(),
    })
}

fn log_evaluation(model: &TrainedModel, e: &Evaluation) {
    info!("📊 Modellytelse (test, n={}):", e.test_size);
    for (name, r) in [("Low", &e.low), ("High", &e.high)] {
        info!(
            "   {:<5} precision {:.2}  recall {:.2}  f1 {:.2}  support {}",
            name, r.precision, r.recall, r.f1, r.support
        );
    }
    info!("   accuracy {:.3}", e.accuracy);
    match e.roc_auc {
        Some(auc) => info!("   ROC-AUC {auc:.3}"),
        None => warn!("⚠️ ROC-AUC udefinert (én klasse i testsettet)"),
    }
    info!("📈 Koeffisienter (proxy for feature-viktighet):");
    for (name, coef) in model.feature_names.iter().zip(&model.coefficients) {
        info!("   {name:<20}: {coef:+.3}");
    }
}

/// Hele treningssteget: sampler → labels → split → fit → evaluering.
pub fn train(
    env: &dyn EnvironmentModel,
    cfg: &TrainingConfig,
    sampler: &mut dyn TimestampSampler,
) -> Result<TrainedModel> {
    let samples = generate_samples(env, sampler, cfg.n_samples, &cfg.label_rule);
    let positives = samples.iter().filter(|s| s.label == 1).count();
    if positives == 0 || positives == samples.len() {
        return Err(BlueGlowError::Training(format!(
            "weak labels produced a single class ({positives}/{} positive)",
            samples.len()
        )));
    }

    let (train_set, test_set) = stratified_split(&samples, cfg.test_fraction, cfg.seed);
    info!(
        "🤖 Trener logistisk regresjon: train {}, test {}",
        train_set.len(),
        test_set.len()
    );

    let names = feature_names();
    let x = train_set
        .iter()
        .map(|s| s.features.to_ordered(&names))
        .collect::<Result<Vec<_>>>()?;
    let y: Vec<u8> = train_set.iter().map(|s| s.label).collect();
    let fit = fit_logistic(
        &x,
        &y,
        &FitOptions {
            c: cfg.c,
            max_iter: cfg.max_iter,
            tolerance: cfg.tolerance,
        },
    )?;

    let mut model = TrainedModel {
        model_type: MODEL_TYPE.to_string(),
        intercept: fit.intercept,
        coefficients: fit.coefficients,
        feature_names: names,
        metadata: ModelMetadata {
            trained_at: Utc::now(),
            version: cfg.version.clone(),
            n_samples: samples.len(),
            positive_rate: positives as f64 / samples.len() as f64,
            seed: cfg.seed,
            iterations: fit.iterations,
            converged: fit.converged,
            evaluation: Evaluation::default(),
            note: "Trained with weak supervision (dark night AND low tide AND low wave)."
                .to_string(),
        },
    };
    model.validate()?;
    model.metadata.evaluation = evaluate(&model, &test_set, train_set.len())?;
    log_evaluation(&model, &model.metadata.evaluation);
    Ok(model)
}

/// `train` med standard-sampleren seedet fra konfig.
pub fn train_seeded(env: &dyn EnvironmentModel, cfg: &TrainingConfig) -> Result<TrainedModel> {
    let mut sampler = UniformYearSampler::new(cfg.sample_year, cfg.seed)?;
    train(env, cfg, &mut sampler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solve_small_system() {
        let a = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        let x = solve(a, vec![3.0, 5.0]).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn singular_system_is_an_error() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(solve(a, vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn balanced_weights() {
        let w = balanced_class_weights(&[0, 0, 0, 1]);
        assert!((w[0] - 4.0 / 6.0).abs() < 1e-12);
        assert!((w[1] - 2.0).abs() < 1e-12);
    }
}
