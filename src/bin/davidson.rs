//! Comparison runner for the Davidson eigensolver.
//!
//! Builds a test operator (a seeded random dense matrix, or a matrix-free operator
//! with `--mf`), computes its lowest eigenpairs with Davidson and with faer's full
//! dense eigensolver, and logs both timings along with a side-by-side table of the
//! eigenvalues.

use anyhow::{Context, Result, anyhow, ensure};
use clap::Parser;
use davidson_project::{
    CorrectionMethod, DavidsonConfig, DavidsonSolver, LinearSolveMethod, MatrixFreeOperator,
    SymmetricOperator, utils::generators::random_dense_operator,
};
use faer::{Mat, Side};
use rand::{SeedableRng, rngs::StdRng};
use std::time::Instant;

/// Command-line arguments for the comparison runner.
#[derive(Parser, Debug)]
#[clap(
    name = "davidson",
    about = "Computes the lowest eigenpairs of a test operator with the Davidson method."
)]
struct Args {
    /// Dimension N of the operator.
    #[clap(long, default_value_t = 100)]
    size: usize,
    /// Strength of the off-diagonal entries.
    #[clap(long, default_value_t = 0.01)]
    eps: f64,
    /// Number of eigenpairs to compute.
    #[clap(long, default_value_t = 5)]
    neigen: usize,
    /// Correction strategy.
    #[clap(long, value_enum, default_value_t = CorrectionMethod::Dpr)]
    corr: CorrectionMethod,
    /// Linear solver for the Jacobi-Davidson correction.
    #[clap(long, value_enum, default_value_t = LinearSolveMethod::Cg)]
    linsolve: LinearSolveMethod,
    /// Use a matrix-free operator instead of a dense matrix.
    #[clap(long)]
    mf: bool,
    /// Seed of the random generator.
    #[clap(long, default_value_t = 42)]
    seed: u64,
    /// Convergence threshold on the mean residual norm.
    #[clap(long, default_value_t = 1e-6)]
    tol: f64,
    /// Maximum number of Davidson iterations.
    #[clap(long, default_value_t = 1000)]
    max_iter: usize,
    /// Subspace dimension that triggers a restart.
    #[clap(long, default_value_t = 100)]
    max_search_space: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logger: {}", e))?;

    let args = Args::parse();
    let mut rng = StdRng::seed_from_u64(args.seed);

    let config = DavidsonConfig::default()
        .with_correction(args.corr)
        .with_linear_solver(args.linsolve)
        .with_tolerance(args.tol)
        .with_max_iterations(args.max_iter)
        .with_max_search_space(args.max_search_space);
    let solver = DavidsonSolver::new(config);

    log::info!("Matrix size: {0} x {0}", args.size);
    if args.mf {
        log::info!("Operator: matrix-free, sparsity {}", args.eps);
        let op = MatrixFreeOperator::random(args.size, args.eps, &mut rng);
        let dense = op.to_dense();
        run(&solver, &op, &dense, args.neigen)
    } else {
        log::info!("Operator: dense, eps {}", args.eps);
        let dense = random_dense_operator(args.size, args.eps, &mut rng);
        run(&solver, &dense, &dense, args.neigen)
    }
}

/// Solves with Davidson on `op` and with the dense eigensolver on `dense`, which
/// must represent the same matrix.
fn run<O>(solver: &DavidsonSolver, op: &O, dense: &Mat<f64>, k: usize) -> Result<()>
where
    O: SymmetricOperator + ?Sized,
{
    let start = Instant::now();
    let result = solver
        .solve(op, k)
        .context("Davidson solve failed")?;
    let davidson_time = start.elapsed();
    log::info!(
        "Davidson: {:.6} s, {} iterations",
        davidson_time.as_secs_f64(),
        result.iterations
    );
    ensure!(
        result.converged,
        "Davidson did not converge (residual norm {:.3e})",
        result.residual_norm
    );

    let start = Instant::now();
    let reference = dense
        .self_adjoint_eigenvalues(Side::Lower)
        .map_err(|e| anyhow!("Dense eigensolver failed: {e:?}"))?;
    let dense_time = start.elapsed();
    log::info!("Dense eigensolver: {:.6} s", dense_time.as_secs_f64());

    log::info!("{:>4} {:>20} {:>20} {:>12}", "root", "davidson", "dense", "error");
    for (j, (value, expected)) in result.eigenvalues.iter().zip(&reference).enumerate() {
        log::info!(
            "{j:>4} {value:>20.12} {expected:>20.12} {:>12.3e}",
            (value - expected).abs()
        );
    }
    Ok(())
}
