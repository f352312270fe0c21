//! Writes a cubic sample point cloud as an `.npy` file for `npy2csv`.
use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use ndarray::Array3;
use npy2csv::{write_npy, DEFAULT_INPUT};
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Pattern {
    /// 0, 1, 2, ... in row-major order
    Sequential,
    /// 0/1 occupancy of a spherical shell centred in the cube
    Sphere,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Where to write the `.npy` file.
    #[arg(default_value = DEFAULT_INPUT)]
    output: PathBuf,
    /// What to fill the cloud with.
    #[arg(long, value_enum, default_value_t = Pattern::Sphere)]
    pattern: Pattern,
    /// Edge length of the cube.
    #[arg(long, default_value_t = 64)]
    side: usize,
}

fn generate(pattern: Pattern, side: usize) -> Array3<f64> {
    match pattern {
        Pattern::Sequential => {
            Array3::from_shape_fn((side, side, side), |(i, j, k)| ((i * side + j) * side + k) as f64)
        }
        Pattern::Sphere => {
            let centre = (side as f64 - 1.) / 2.;
            let radius = side as f64 / 2. - 2.;
            Array3::from_shape_fn((side, side, side), |(i, j, k)| {
                let d = [i, j, k].map(|x| x as f64 - centre);
                let r = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt();
                if (r - radius).abs() < 0.5 {
                    1.
                } else {
                    0.
                }
            })
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let cloud = generate(cli.pattern, cli.side);
    log::debug!(
        "{:?} cloud of side {}: {} occupied voxels",
        cli.pattern,
        cli.side,
        cloud.iter().filter(|&&v| v != 0.).count()
    );
    write_npy(&cli.output, &cloud).with_context(|| format!("writing {}", cli.output.display()))?;
    println!(
        "Wrote {side}*{side}*{side} {:?} cloud to {}.",
        cli.pattern,
        cli.output.display(),
        side = cli.side,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_counts_in_row_major_order() {
        let cloud = generate(Pattern::Sequential, 4);
        assert_eq!(cloud[[0, 0, 3]], 3.);
        assert_eq!(cloud[[1, 0, 0]], 16.);
        assert_eq!(cloud[[3, 3, 3]], 63.);
    }

    #[test]
    fn sphere_is_binary_and_hollow() {
        let cloud = generate(Pattern::Sphere, 16);
        assert!(cloud.iter().all(|&v| v == 0. || v == 1.));
        assert!(cloud.iter().any(|&v| v == 1.));
        assert_eq!(cloud[[8, 8, 8]], 0.);
    }
}
