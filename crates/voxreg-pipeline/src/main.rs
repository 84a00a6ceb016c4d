use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use burn::backend::Autodiff;
use burn_ndarray::NdArray;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use voxreg_core::field::{mask_field, ScatterMethod, ScatteredField};
use voxreg_core::filter::{
    auto_threshold, binarize, reorient_to, MedianFilter, ProtocolCalibration, ResampleFilter,
};
use voxreg_core::image::Image;
use voxreg_core::interpolation::LinearInterpolator;
use voxreg_core::transform::Affine;
use voxreg_io::{nifti_io, stl_io, transform_io, vtk_io, vtu_io};
use voxreg_registration::{
    register_volumes, IterationRecord, MetricKind, OptimizerKind, RegistrationConfig,
};

type Backend = Autodiff<NdArray<f32>>;

#[derive(Parser)]
#[command(name = "voxreg")]
#[command(about = "MRI registration and resampling pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MetricArg {
    /// Parzen-window mutual information (multi-modal).
    Mi,
    /// Mean squared intensity difference (mono-modal).
    Mse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OptimizerArg {
    GradientDescent,
    Adam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MethodArg {
    Nearest,
    Linear,
}

#[derive(Subcommand)]
enum Commands {
    /// Denoise a volume and produce a binary vessel mask
    Preprocess {
        /// Input volume (DICOM directory, .nii/.nii.gz or legacy .vtk)
        input: PathBuf,

        /// Acquisition protocol name, used for threshold calibration
        #[arg(short, long)]
        protocol: String,

        /// Median filter radius in voxels (0 disables denoising)
        #[arg(long, default_value_t = 1)]
        median_radius: usize,

        /// Output mask path (.vtk)
        #[arg(short, long)]
        output: PathBuf,

        /// Write the VTK payload as big-endian binary instead of ASCII
        #[arg(long)]
        binary: bool,
    },

    /// Rigidly register a moving volume onto a fixed volume
    Register {
        #[arg(long)]
        fixed: PathBuf,

        #[arg(long)]
        moving: PathBuf,

        #[arg(long, value_enum, default_value_t = MetricArg::Mi)]
        metric: MetricArg,

        #[arg(long, value_enum, default_value_t = OptimizerArg::GradientDescent)]
        optimizer: OptimizerArg,

        /// Fraction of fixed voxels sampled per iteration
        #[arg(long, default_value_t = 0.9)]
        sampling_fraction: f64,

        /// Iteration cap per pyramid level
        #[arg(long, default_value_t = 200)]
        iterations: usize,

        #[arg(long, default_value_t = 0.3)]
        learning_rate: f64,

        /// Number of multi-resolution levels (1 = full resolution only)
        #[arg(long, default_value_t = 1)]
        levels: usize,

        /// RNG seed for voxel sampling
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Where to write the 4x4 matrix dump
        #[arg(long)]
        output_transform: PathBuf,

        /// Optional resampled moving volume, on the fixed grid
        #[arg(long)]
        output_image: Option<PathBuf>,

        /// Optional per-iteration metric/parameter log (CSV)
        #[arg(long)]
        output_history: Option<PathBuf>,
    },

    /// Apply a dumped affine to a mesh (.vtu) or vector field (.vtk)
    ApplyTransform {
        /// Matrix dump produced by `register`
        #[arg(long)]
        matrix: PathBuf,

        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        output: PathBuf,

        /// Apply the inverse (moving-to-fixed) mapping instead
        #[arg(long)]
        invert: bool,
    },

    /// Zero vector-field samples outside a binary mask
    MaskField {
        /// Vector field (.vtk, VECTORS array)
        #[arg(long)]
        field: PathBuf,

        /// Binary mask on the same grid (.vtk)
        #[arg(long)]
        mask: PathBuf,

        #[arg(long)]
        output: PathBuf,
    },

    /// Interpolate scattered mesh vectors onto a regular grid
    ResampleField {
        /// Source mesh with a per-point vector array (.vtu)
        #[arg(long)]
        source: PathBuf,

        /// Volume whose grid defines the output sampling (.vtk)
        #[arg(long)]
        target: PathBuf,

        #[arg(long, value_enum, default_value_t = MethodArg::Nearest)]
        method: MethodArg,

        /// Support radius in mm for linear interpolation
        #[arg(long, default_value_t = 2.0)]
        radius: f64,

        /// Value assigned where no source point supports the voxel
        #[arg(long, default_value_t = 0.0)]
        fill: f64,

        #[arg(long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Preprocess {
            input,
            protocol,
            median_radius,
            output,
            binary,
        } => preprocess(&input, &protocol, median_radius, &output, binary),
        Commands::Register {
            fixed,
            moving,
            metric,
            optimizer,
            sampling_fraction,
            iterations,
            learning_rate,
            levels,
            seed,
            output_transform,
            output_image,
            output_history,
        } => register(RegisterArgs {
            fixed,
            moving,
            metric,
            optimizer,
            sampling_fraction,
            iterations,
            learning_rate,
            levels,
            seed,
            output_transform,
            output_image,
            output_history,
        }),
        Commands::ApplyTransform {
            matrix,
            input,
            output,
            invert,
        } => apply_transform(&matrix, &input, &output, invert),
        Commands::MaskField {
            field,
            mask,
            output,
        } => run_mask_field(&field, &mask, &output),
        Commands::ResampleField {
            source,
            target,
            method,
            radius,
            fill,
            output,
        } => resample_field(&source, &target, method, radius, fill, &output),
    }
}

/// Calibration factors for the supported acquisition protocols.
fn calibration_table() -> ProtocolCalibration {
    ProtocolCalibration::from_entries([
        ("Ax_3DTOF", 1.5),
        ("Sag_PCA", 1.75),
        ("Sag_GRE", 1.85),
        ("Sag_GRE2", 2.0),
        ("Sag_Optm", 2.1),
    ])
}

/// Axis code to normalize a protocol's volumes to, if any.
fn reorientation_code(protocol: &str) -> Option<&'static str> {
    match protocol {
        "Ax_3DTOF" => Some("PIR"),
        _ => None,
    }
}

fn preprocess(
    input: &Path,
    protocol: &str,
    median_radius: usize,
    output: &Path,
    binary: bool,
) -> Result<()> {
    let device = Default::default();
    let mut volume: Image<Backend, 3> = voxreg_io::read_volume(input, &device)
        .with_context(|| format!("reading {}", input.display()))?;

    if let Some(code) = reorientation_code(protocol) {
        info!(protocol, code, "reorienting volume");
        volume = reorient_to(&volume, code).context("reorienting volume")?;
    }

    if median_radius > 0 {
        volume = MedianFilter::new(median_radius).apply(&volume);
    }

    let calibration = calibration_table();
    let threshold = auto_threshold(&volume, protocol, &calibration)
        .with_context(|| format!("thresholding for protocol {protocol}"))?;
    info!(threshold, "binarizing");
    let mask = binarize(&volume, threshold, f64::INFINITY);

    vtk_io::write_structured_points(output, &mask, binary)
        .with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}

struct RegisterArgs {
    fixed: PathBuf,
    moving: PathBuf,
    metric: MetricArg,
    optimizer: OptimizerArg,
    sampling_fraction: f64,
    iterations: usize,
    learning_rate: f64,
    levels: usize,
    seed: u64,
    output_transform: PathBuf,
    output_image: Option<PathBuf>,
    output_history: Option<PathBuf>,
}

fn register(args: RegisterArgs) -> Result<()> {
    let device = Default::default();
    let fixed: Image<Backend, 3> = voxreg_io::read_volume(&args.fixed, &device)
        .with_context(|| format!("reading {}", args.fixed.display()))?;
    let moving: Image<Backend, 3> = voxreg_io::read_volume(&args.moving, &device)
        .with_context(|| format!("reading {}", args.moving.display()))?;

    if args.levels == 0 {
        bail!("levels must be at least 1");
    }
    let mut shrink_factors = Vec::with_capacity(args.levels);
    let mut smoothing_sigmas = Vec::with_capacity(args.levels);
    for i in 0..args.levels {
        let factor = 2usize.pow((args.levels - 1 - i) as u32);
        shrink_factors.push(factor);
        smoothing_sigmas.push(if factor > 1 { 0.5 * factor as f64 } else { 0.0 });
    }

    let config = RegistrationConfig {
        metric: match args.metric {
            MetricArg::Mi => MetricKind::MutualInformation,
            MetricArg::Mse => MetricKind::MeanSquares,
        },
        optimizer: match args.optimizer {
            OptimizerArg::GradientDescent => OptimizerKind::GradientDescent,
            OptimizerArg::Adam => OptimizerKind::Adam,
        },
        learning_rate: args.learning_rate,
        max_iterations: args.iterations,
        sampling_fraction: args.sampling_fraction,
        seed: args.seed,
        shrink_factors,
        smoothing_sigmas,
        ..Default::default()
    };

    let outcome = register_volumes(&fixed, &moving, &config).context("registration failed")?;
    info!(
        status = ?outcome.status,
        iterations = outcome.history.len(),
        final_metric = ?outcome.final_metric(),
        "registration finished"
    );

    let affine = outcome.transform.affine();
    transform_io::write_transforms(&args.output_transform, &[affine])
        .with_context(|| format!("writing {}", args.output_transform.display()))?;

    if let Some(path) = &args.output_history {
        write_history(path, &outcome.history)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    if let Some(path) = &args.output_image {
        let resampler = ResampleFilter::from_reference(
            &fixed,
            outcome.transform,
            LinearInterpolator::new(),
            0.0,
        );
        let resampled = resampler.apply(&moving);
        write_volume(path, &resampled)?;
    }
    Ok(())
}

fn write_history(path: &Path, history: &[IterationRecord]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "iteration,metric,rx,ry,rz,tx,ty,tz")?;
    for record in history {
        let p = record.params;
        writeln!(
            out,
            "{},{:.8},{:.8},{:.8},{:.8},{:.8},{:.8},{:.8}",
            record.iteration, record.metric, p[0], p[1], p[2], p[3], p[4], p[5]
        )?;
    }
    Ok(())
}

fn write_volume(path: &Path, image: &Image<Backend, 3>) -> Result<()> {
    let name = path.to_string_lossy().to_ascii_lowercase();
    if name.ends_with(".vtk") {
        vtk_io::write_structured_points(path, image, false)
            .with_context(|| format!("writing {}", path.display()))?;
    } else if name.ends_with(".nii") || name.ends_with(".nii.gz") {
        nifti_io::write_nifti(path, image)
            .with_context(|| format!("writing {}", path.display()))?;
    } else {
        bail!("unsupported output volume format: {}", path.display());
    }
    Ok(())
}

fn apply_transform(matrix: &Path, input: &Path, output: &Path, invert: bool) -> Result<()> {
    let transforms = transform_io::read_transforms(matrix)
        .with_context(|| format!("reading {}", matrix.display()))?;
    let Some(affine) = transforms.first().copied() else {
        bail!("{} holds no transforms", matrix.display());
    };
    let affine: Affine = if invert {
        affine.inverse().context("matrix is not invertible")?
    } else {
        affine
    };

    let name = input.to_string_lossy().to_ascii_lowercase();
    if name.ends_with(".vtu") {
        let mut mesh = vtu_io::read_vtu(input)
            .with_context(|| format!("reading {}", input.display()))?;
        mesh.transform(&affine);

        let out_name = output.to_string_lossy().to_ascii_lowercase();
        if out_name.ends_with(".stl") {
            stl_io::write_stl(output, &mesh)
        } else {
            vtu_io::write_vtu(output, &mesh)
        }
        .with_context(|| format!("writing {}", output.display()))?;
    } else if name.ends_with(".vtk") {
        let mut field = vtk_io::read_vector_field(input)
            .with_context(|| format!("reading {}", input.display()))?;
        field.transform(&affine);
        vtk_io::write_vector_field(output, &field, false)
            .with_context(|| format!("writing {}", output.display()))?;
    } else {
        bail!("unsupported input for apply-transform: {}", input.display());
    }
    Ok(())
}

fn run_mask_field(field_path: &Path, mask_path: &Path, output: &Path) -> Result<()> {
    let device = Default::default();
    let field = vtk_io::read_vector_field(field_path)
        .with_context(|| format!("reading {}", field_path.display()))?;
    let mask: Image<Backend, 3> = vtk_io::read_structured_points(mask_path, &device)
        .with_context(|| format!("reading {}", mask_path.display()))?;

    let masked = mask_field(&field, &mask).context("field and mask grids disagree")?;
    vtk_io::write_vector_field(output, &masked, false)
        .with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}

fn resample_field(
    source: &Path,
    target: &Path,
    method: MethodArg,
    radius: f64,
    fill: f64,
    output: &Path,
) -> Result<()> {
    let device = Default::default();
    let mesh = vtu_io::read_vtu(source)
        .with_context(|| format!("reading {}", source.display()))?;
    let Some((name, vectors)) = mesh.point_vectors().iter().next() else {
        bail!("{} has no per-point vector array", source.display());
    };
    info!(array = %name, points = mesh.num_points(), "resampling scattered field");

    let target_volume: Image<Backend, 3> = vtk_io::read_structured_points(target, &device)
        .with_context(|| format!("reading {}", target.display()))?;

    let scattered = ScatteredField::new(mesh.points().to_vec(), vectors.clone())
        .context("building scattered field")?;
    let method = match method {
        MethodArg::Nearest => ScatterMethod::Nearest,
        MethodArg::Linear => ScatterMethod::Linear { radius },
    };
    let resampled = scattered
        .resample_to_grid(&target_volume.grid(), method, fill)
        .context("resampling failed")?;

    vtk_io::write_vector_field(output, &resampled, false)
        .with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}
