use argh::FromArgs;
use std::path::PathBuf;

use kornia_cpd::{
    io::{read_points_txt, write_points_txt},
    utils::average_translation,
    Nonrigid, Registration, Rigid, Runner, RunnerConfig,
};

#[derive(FromArgs)]
/// Coherent Point Drift registration of two text point files
struct Args {
    /// path to the fixed points, one point per line
    #[argh(positional)]
    fixed: PathBuf,

    /// path to the moving points, one point per line
    #[argh(positional)]
    moving: PathBuf,

    /// the deformation model: rigid or nonrigid
    #[argh(option, default = "String::from(\"rigid\")")]
    method: String,

    /// the file to write the resulting points to
    #[argh(option)]
    outfile: Option<PathBuf>,

    /// the initial value for sigma2, 0 computes it from the data
    #[argh(option, default = "0.0")]
    sigma2: f64,

    /// the name of the comparer to use
    #[argh(option, default = "String::from(\"direct\")")]
    comparer: String,

    /// the maximum number of iterations
    #[argh(option, default = "150")]
    max_iterations: usize,

    /// the convergence tolerance
    #[argh(option, default = "1e-5")]
    tolerance: f64,

    /// the outlier weight in [0, 1)
    #[argh(option, default = "0.1")]
    outliers: f64,

    /// the affinity kernel width of the nonrigid model
    #[argh(option, default = "3.0")]
    beta: f64,

    /// the regularization strength of the nonrigid model
    #[argh(option, default = "3.0")]
    lambda: f64,

    /// do not normalize the point sets before registering
    #[argh(switch)]
    no_normalize: bool,

    /// compute the correspondence of each moving point
    #[argh(switch)]
    correspondence: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let fixed = read_points_txt(&args.fixed)?;
    println!("Fixed points: #{} x {}", fixed.nrows(), fixed.ncols());

    let moving = read_points_txt(&args.moving)?;
    println!("Moving points: #{} x {}", moving.nrows(), moving.ncols());

    let config = RunnerConfig {
        max_iterations: args.max_iterations,
        tolerance: args.tolerance,
        sigma2: args.sigma2,
        outliers: args.outliers,
        normalize: !args.no_normalize,
        correspondence: args.correspondence,
        comparer: args.comparer.clone(),
    };

    let points = match args.method.as_str() {
        "rigid" => {
            let result = Runner::new(Rigid::new(), config)?.run(fixed.as_ref(), moving.as_ref())?;
            report(&result);
            let rigid = &result.transform;
            println!("Scale: {}", rigid.scale());
            println!("Translation: {:?}", rigid.translation());
            println!("Rotation: {:?}", rigid.rotation());
            result.points
        }
        "nonrigid" => {
            let nonrigid = Nonrigid::new(args.beta, args.lambda);
            let result = Runner::new(nonrigid, config)?.run(fixed.as_ref(), moving.as_ref())?;
            report(&result);
            result.points
        }
        other => return Err(format!("unknown method: {other}").into()),
    };

    println!(
        "Average translation: {:?}",
        average_translation(points.as_ref(), moving.as_ref())
    );

    if let Some(outfile) = args.outfile {
        write_points_txt(&outfile, points.as_ref())?;
        log::info!("Wrote {} points to {}", points.nrows(), outfile.display());
    }

    Ok(())
}

fn report<T>(result: &Registration<T>) {
    println!("Iterations: {}", result.iterations);
    println!("sigma2: {}", result.sigma2);
    println!("Runtime: {:?}", result.runtime);
    if let Some(correspondence) = &result.correspondence {
        println!("Correspondence: {:?}", correspondence);
    }
}
