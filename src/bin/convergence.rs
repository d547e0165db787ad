//! Correction-method sweep.
//!
//! For every problem size in the requested range, this runner builds one seeded
//! random operator and solves it with each correction strategy (DPR, Olsen and
//! Jacobi-Davidson with the selected linear solver). One CSV row is written per run
//! with the iteration count, the wall-clock time, the final residual norm and the
//! largest eigenvalue error against faer's dense eigensolver.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use davidson_project::{
    CorrectionMethod, DavidsonConfig, DavidsonSolver, LinearSolveMethod,
    utils::generators::random_dense_operator,
};
use faer::Side;
use rand::{SeedableRng, rngs::StdRng};
use serde::Serialize;
use std::{path::PathBuf, time::Instant};

/// Command-line arguments for the sweep.
#[derive(Parser, Debug)]
#[clap(
    name = "convergence",
    about = "Compares the Davidson correction strategies over a range of problem sizes."
)]
struct Args {
    /// The smallest operator dimension.
    #[clap(long, default_value_t = 100)]
    n_start: usize,
    /// The largest operator dimension.
    #[clap(long, default_value_t = 1000)]
    n_end: usize,
    /// The step between operator dimensions.
    #[clap(long, default_value_t = 100)]
    n_step: usize,
    /// Number of eigenpairs to compute.
    #[clap(long, default_value_t = 5)]
    neigen: usize,
    /// Strength of the off-diagonal entries.
    #[clap(long, default_value_t = 0.01)]
    eps: f64,
    /// Linear solver for the Jacobi-Davidson runs.
    #[clap(long, value_enum, default_value_t = LinearSolveMethod::Cg)]
    linsolve: LinearSolveMethod,
    /// Convergence threshold on the mean residual norm.
    #[clap(long, default_value_t = 1e-8)]
    tol: f64,
    /// Seed of the random generator.
    #[clap(long, default_value_t = 42)]
    seed: u64,
    /// Path to the output CSV file.
    #[clap(long, value_name = "PATH")]
    output: PathBuf,
}

/// Represents a single row of data in the output CSV.
#[derive(Debug, Serialize)]
struct ConvergenceRecord {
    method: CorrectionMethod,
    linsolve: Option<LinearSolveMethod>,
    n: usize,
    k: usize,
    iterations: usize,
    converged: bool,
    time_s: f64,
    residual_norm: f64,
    max_eigenvalue_error: f64,
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logger: {}", e))?;

    let args = Args::parse();
    if args.n_step == 0 {
        return Err(anyhow!("--n-step must be positive"));
    }

    let mut writer = csv::Writer::from_path(&args.output)
        .with_context(|| format!("Failed to create CSV writer for {:?}", &args.output))?;

    let methods = [
        CorrectionMethod::Dpr,
        CorrectionMethod::Olsen,
        CorrectionMethod::Jacobi,
    ];

    for n in (args.n_start..=args.n_end).step_by(args.n_step) {
        log::info!("Processing problem size: n = {n}");
        let mut rng = StdRng::seed_from_u64(args.seed);
        let a = random_dense_operator(n, args.eps, &mut rng);
        let reference = a
            .self_adjoint_eigenvalues(Side::Lower)
            .map_err(|e| anyhow!("Dense eigensolver failed for n = {n}: {e:?}"))?;

        for method in methods {
            let config = DavidsonConfig::default()
                .with_correction(method)
                .with_linear_solver(args.linsolve)
                .with_tolerance(args.tol);

            let start = Instant::now();
            let result = DavidsonSolver::new(config)
                .solve(&a, args.neigen)
                .with_context(|| format!("{method} solve failed for n = {n}"))?;
            let time_s = start.elapsed().as_secs_f64();

            let max_eigenvalue_error = if result.converged {
                result
                    .eigenvalues
                    .iter()
                    .zip(&reference)
                    .map(|(value, expected)| (value - expected).abs())
                    .fold(0.0, f64::max)
            } else {
                f64::NAN
            };
            log::info!(
                "{method}: {} iterations, {time_s:.4} s, max error {max_eigenvalue_error:.3e}",
                result.iterations
            );

            writer.serialize(ConvergenceRecord {
                method,
                linsolve: (method == CorrectionMethod::Jacobi).then_some(args.linsolve),
                n,
                k: args.neigen,
                iterations: result.iterations,
                converged: result.converged,
                time_s,
                residual_norm: result.residual_norm,
                max_eigenvalue_error,
            })?;
            writer.flush()?;
        }
    }

    log::info!("Results written to {:?}", args.output);
    Ok(())
}
