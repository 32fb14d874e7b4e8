use avatar_crop::config;
use avatar_crop::imaging::{Crop, DisplayTransform, ImageBackend, RustBackend};
use avatar_crop::input::AvatarInput;
use avatar_crop::session::FileSelection;
use clap::{Parser, Subcommand};
use log::{debug, info};
use std::path::PathBuf;
use tokio::time::Instant;

/// Where and how the image is shown while cropping.
#[derive(clap::Args, Clone, Debug)]
struct DisplayArgs {
    /// Displayed image width in pixels (defaults to the natural width)
    #[arg(long, requires = "display_height")]
    display_width: Option<f64>,

    /// Displayed image height in pixels (defaults to the natural height)
    #[arg(long, requires = "display_width")]
    display_height: Option<f64>,

    /// Clockwise rotation of the displayed image, in degrees
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    rotate: f64,

    /// Uniform zoom of the displayed image about its center
    #[arg(long, default_value_t = 1.0)]
    scale: f64,
}

#[derive(Parser)]
#[command(name = "avatar-crop")]
#[command(about = "Crop a photo into an avatar data URL")]
#[command(long_about = "\
Crop a photo into an avatar data URL

The image is decoded, a centered square crop covering 90% of its shorter
edge is proposed, optionally replaced by --x/--y/--size, rendered at the
device pixel ratio, and encoded as a data: URL.

Crop coordinates are in displayed pixels. Without --display-width and
--display-height the image is displayed at its natural size.

Settings are read from avatar.toml in the --config directory.
Run 'avatar-crop gen-config' to generate a documented avatar.toml.
Set RUST_LOG=debug to trace the editing session.")]
#[command(version)]
struct Cli {
    /// Directory containing avatar.toml
    #[arg(long, default_value = ".", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crop an image and print the resulting data URL
    Crop {
        /// Image file to crop
        file: PathBuf,

        /// Left edge of the crop, in displayed pixels
        #[arg(long)]
        x: Option<f64>,

        /// Top edge of the crop, in displayed pixels
        #[arg(long)]
        y: Option<f64>,

        /// Side of the square crop, in displayed pixels
        #[arg(long)]
        size: Option<f64>,

        /// Device pixel ratio (overrides avatar.toml)
        #[arg(long)]
        dpr: Option<f64>,

        #[command(flatten)]
        display: DisplayArgs,

        /// Write the data URL to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print an image's dimensions and default crop as JSON
    Inspect {
        /// Image file to inspect
        file: PathBuf,
    },
    /// Print a stock avatar.toml with all options documented
    GenConfig,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Crop {
            file,
            x,
            y,
            size,
            dpr,
            display,
            out,
        } => {
            let mut policy = config::load_policy(&cli.config)?;
            if let Some(dpr) = dpr {
                policy.device_pixel_ratio = dpr;
                policy.validate()?;
            }
            let url = crop(file, x, y, size, &display, policy).await?;
            match out {
                Some(path) => {
                    std::fs::write(&path, &url)?;
                    println!("Wrote {} ({} bytes)", path.display(), url.len());
                }
                None => println!("{url}"),
            }
        }
        Command::Inspect { file } => {
            let policy = config::load_policy(&cli.config)?;
            let bytes = tokio::fs::read(&file).await?;
            let source = RustBackend::new().decode(&bytes)?;
            let default = avatar_crop::imaging::geometry::centered_aspect_crop(
                source.width() as f64,
                source.height() as f64,
                policy.aspect(),
                policy.coverage_fraction(),
                policy.min_size,
            )
            .map(|crop| {
                avatar_crop::imaging::geometry::convert_to_pixel_crop(
                    &crop,
                    source.width() as f64,
                    source.height() as f64,
                    policy.aspect(),
                )
            });
            let report = serde_json::json!({
                "file": file.display().to_string(),
                "format": source.format().map(|f| format!("{f:?}").to_lowercase()),
                "width": source.width(),
                "height": source.height(),
                "default_crop": default.map(|c| serde_json::json!({
                    "x": c.x,
                    "y": c.y,
                    "width": c.width,
                    "height": c.height,
                })),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Drive one editing session end to end and return the committed value.
async fn crop(
    file: PathBuf,
    x: Option<f64>,
    y: Option<f64>,
    size: Option<f64>,
    display: &DisplayArgs,
    policy: config::CropPolicy,
) -> Result<String, Box<dyn std::error::Error>> {
    let mut input = AvatarInput::new("avatar", "", policy, RustBackend::new());
    input.on_change(|value| info!("avatar value changed ({} bytes)", value.len()));

    let session = input.session_mut();
    session.load(&FileSelection::from_path(file)).await?;

    let natural = session
        .layout()
        .ok_or(avatar_crop::AvatarError::NoImage)?;
    let layout = match (display.display_width, display.display_height) {
        (Some(w), Some(h)) => DisplayTransform::fitted(w, h),
        _ => natural,
    }
    .with_rotation(display.rotate)
    .with_scale(display.scale);
    session.set_display_layout(layout, Instant::now())?;

    if x.is_some() || y.is_some() || size.is_some() {
        let current = session
            .pixel_crop()
            .ok_or(avatar_crop::AvatarError::NoImage)?;
        let side = size.unwrap_or(current.width);
        session.update_crop(Crop::pixels(
            x.unwrap_or(current.x),
            y.unwrap_or(current.y),
            side,
            side,
        ))?;
    }
    let completed = session.complete_crop(Instant::now())?;
    debug!("completed crop {completed:?}");

    let avatar = input.save().await?;
    for command in input.take_commands() {
        debug!("host command: {command:?}");
    }
    Ok(avatar.into_string())
}
