use clap::Parser;
use std::io::{self, Write};
use voltaic::analysis::{self, AnalysisResult, TranParams};
use voltaic::compiler;
use voltaic::ir::{Netlist, OutputRequest};
use voltaic::output;
use voltaic::parser;
use voltaic::solver::cpu::CpuSolver;
use voltaic::solver::newton::NewtonParams;
use voltaic::solver::sparse_direct::SparseLuSolver;
use voltaic::solver::LinearSolver;
use voltaic::stats::Stats;

/// SPICE-style circuit simulator
#[derive(Parser)]
#[command(name = "voltaic", version)]
struct Cli {
    /// SPICE netlist file to simulate
    netlist: String,

    /// Use the dense Gaussian-elimination solver instead of sparse LU
    #[arg(long)]
    dense: bool,

    /// Print performance stats to stderr
    #[arg(long)]
    stats: bool,

    /// Newton-Raphson iteration limit per operating point
    #[arg(long, default_value_t = 100)]
    max_iter: usize,

    /// Newton-Raphson absolute tolerance
    #[arg(long, default_value_t = 5e-5)]
    abstol: f64,

    /// Newton-Raphson relative tolerance
    #[arg(long, default_value_t = 1e-3)]
    reltol: f64,

    /// Internal transient sub-steps per reported step
    #[arg(long, default_value_t = 1)]
    step_split: usize,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut stats = if cli.stats { Some(Stats::new()) } else { None };

    let input = std::fs::read_to_string(&cli.netlist).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {}", cli.netlist, e);
        std::process::exit(1);
    });

    let netlist = parser::parse(&input).unwrap_or_else(|e| {
        eprintln!("{}", e);
        std::process::exit(1);
    });
    if !netlist.title.is_empty() {
        tracing::info!(title = %netlist.title, "loaded netlist");
    }

    let system = compiler::compile(&netlist).unwrap_or_else(|e| {
        eprintln!("{}", e);
        std::process::exit(1);
    });

    let solver: Box<dyn LinearSolver> = if cli.dense {
        Box::new(CpuSolver::new())
    } else {
        Box::new(SparseLuSolver::new())
    };

    let tran_params = TranParams {
        step_split: cli.step_split,
        newton: NewtonParams {
            max_iterations: cli.max_iter,
            abs_tol: cli.abstol,
            rel_tol: cli.reltol,
        },
    };

    let mut stdout = io::stdout().lock();

    let results = analysis::run_all(
        &system,
        &netlist.analyses,
        solver.as_ref(),
        &tran_params,
        stats.as_mut(),
    );

    let mut failed = 0;
    for (analysis_cmd, result) in netlist.analyses.iter().zip(&results) {
        let Ok(result) = result else {
            failed += 1;
            continue;
        };
        write_result(&mut stdout, &netlist, &system, analysis_cmd, result).unwrap_or_else(|e| {
            eprintln!("Output error: {}", e);
            std::process::exit(1);
        });
    }

    if let Some(ref stats) = stats {
        stats.display();
    }
    if failed > 0 {
        eprintln!("{failed} of {} analyses failed", results.len());
        std::process::exit(1);
    }
}

/// Write one CSV block per matching print/plot request, or every node
/// voltage and branch current when the netlist asks for nothing.
fn write_result<W: Write>(
    w: &mut W,
    netlist: &Netlist,
    system: &compiler::MnaSystem,
    analysis_cmd: &voltaic::ir::Analysis,
    result: &AnalysisResult,
) -> voltaic::error::Result<()> {
    let requests: Vec<&OutputRequest> = netlist
        .outputs
        .iter()
        .filter(|r| r.analysis == analysis_cmd.kind())
        .collect();

    let blocks = if requests.is_empty() {
        vec![output::collect_columns(
            system,
            result,
            &output::default_variables(system),
        )]
    } else {
        requests
            .iter()
            .map(|r| output::collect_columns(system, result, &r.variables))
            .collect()
    };

    for data in &blocks {
        match result {
            AnalysisResult::Op(_) => output::write_op_csv(w, data)?,
            _ => output::write_csv(w, data)?,
        }
        writeln!(w)?;
    }
    Ok(())
}
