//! # Paperlink CLI
//!
//! Command-line interface for printing images on serial e-ink panels.
//!
//! ## Usage
//!
//! ```bash
//! # List serial ports
//! paperlink list
//!
//! # Print a black/white image
//! paperlink print photo.png --device /dev/ttyACM0
//!
//! # Four-color panel, red wins over black
//! paperlink print poster.png --device-mode bwry --blend-order red,black,yellow
//!
//! # Write the dithered result as PNG instead of printing
//! paperlink print poster.png --device-mode bwr --output preview.png
//!
//! # Tuning from a file, verbose logs
//! paperlink -v print photo.png --config panel.json --read-device-output
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use paperlink::{
    ColorMode, DisplayConfig, PaperlinkError,
    config::{ColorPlaneConfig, Config},
    logging::{self, LogLevel},
    protocol,
    render::{self, canvas, canvas::Alignment, dither::Kernel, planes::BlendOrder},
    transport,
};

/// Paperlink - E-ink panel printing utility
#[derive(Parser, Debug)]
#[command(name = "paperlink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    log_level: LogLevel,

    /// Debug logging (same as --log-level debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List serial ports
    List,

    /// Print an image on the panel
    Print(PrintArgs),
}

#[derive(Args, Debug)]
struct PrintArgs {
    /// Image file (PNG, JPEG, GIF, BMP, ...)
    image: PathBuf,

    /// Serial device of the panel
    #[arg(long, default_value = "/dev/ttyACM0")]
    device: PathBuf,

    /// Colors supported by the panel firmware
    #[arg(long, value_enum, default_value_t = ColorMode::Bw)]
    device_mode: ColorMode,

    /// JSON config file; flags below override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the dithered planes as PNG instead of printing
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Image position on the canvas
    #[arg(long, value_enum)]
    align: Option<Alignment>,

    /// Scale small images up to fill the panel
    #[arg(long)]
    enlarge: bool,

    /// Priority of ink colors on overlapping pixels, e.g. "red,black,yellow"
    #[arg(long)]
    blend_order: Option<BlendOrder>,

    #[command(flatten)]
    black: BlackArgs,

    #[command(flatten)]
    red: RedArgs,

    #[command(flatten)]
    yellow: YellowArgs,

    #[command(flatten)]
    transfer: TransferArgs,
}

#[derive(Args, Debug)]
struct BlackArgs {
    /// Dithering kernel of the black plane
    #[arg(long, value_enum)]
    kernel: Option<Kernel>,

    /// Luminance threshold of the black plane (0-255)
    #[arg(long)]
    threshold: Option<u8>,
}

#[derive(Args, Debug)]
struct RedArgs {
    /// Dithering kernel of the red plane
    #[arg(long, value_enum)]
    red_kernel: Option<Kernel>,

    /// Score threshold of the red plane (0-255)
    #[arg(long)]
    red_threshold: Option<u8>,

    /// Hue window of the red plane (degrees)
    #[arg(long, value_parser = clap::value_parser!(u16).range(0..=360))]
    red_hue_width: Option<u16>,

    /// Minimum red saturation (%)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    red_min_saturation: Option<u8>,

    /// Maximum red lightness (%)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    red_max_lightness: Option<u8>,
}

#[derive(Args, Debug)]
struct YellowArgs {
    /// Dithering kernel of the yellow plane
    #[arg(long, value_enum)]
    yellow_kernel: Option<Kernel>,

    /// Score threshold of the yellow plane (0-255)
    #[arg(long)]
    yellow_threshold: Option<u8>,

    /// Hue window of the yellow plane (degrees)
    #[arg(long, value_parser = clap::value_parser!(u16).range(0..=360))]
    yellow_hue_width: Option<u16>,

    /// Minimum yellow saturation (%)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    yellow_min_saturation: Option<u8>,

    /// Maximum yellow lightness (%)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    yellow_max_lightness: Option<u8>,
}

#[derive(Args, Debug)]
struct TransferArgs {
    /// Pause after each chunk (ms)
    #[arg(long, value_name = "MS")]
    write_pause: Option<u64>,

    /// Wait for the panel to redraw (ms)
    #[arg(long, value_name = "MS")]
    refresh_pause: Option<u64>,

    /// Read chunk echoes and verify the device byte count
    #[arg(long)]
    read_device_output: bool,

    /// Transmit passes allowed on byte count mismatch
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Use the background-reader transfer
    #[arg(long)]
    detached: bool,

    /// Detached transfer idle timeout (s)
    #[arg(long, value_name = "SECS")]
    idle_timeout: Option<u64>,
}

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level.with_verbose(cli.verbose));

    if let Err(e) = run(cli.command) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), PaperlinkError> {
    match command {
        Commands::List => list_ports(),
        Commands::Print(args) => print(args),
    }
}

fn list_ports() -> Result<(), PaperlinkError> {
    let ports = transport::list_ports()?;
    if ports.is_empty() {
        tracing::error!("no serial ports found");
        return Ok(());
    }
    for port in ports {
        println!("{}", port);
    }
    Ok(())
}

fn print(args: PrintArgs) -> Result<(), PaperlinkError> {
    let config = load_config(&args)?;
    let display = DisplayConfig::default();
    let mode = args.device_mode;

    tracing::info!(image = %args.image.display(), "preparing image");
    let frame = canvas::prepare(&args.image, &display, config.image.align, config.image.enlarge)?;

    tracing::info!(%mode, "dithering");
    let planes = render::separate(&frame, mode, &config.image);

    if let Some(output) = &args.output {
        canvas::save(&canvas::preview(&planes, &config.image.blend_order), output)?;
        tracing::info!(path = %output.display(), "saved preview");
        return Ok(());
    }

    let job = planes.into_job(&display, mode, &config.image.blend_order)?;
    tracing::info!(device = %args.device.display(), bytes = job.len(), "printing");

    if args.transfer.detached {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(protocol::print_detached(&args.device, &job, &config.transfer))?;
    } else {
        protocol::print(&args.device, &job, &config.transfer)?;
    }

    tracing::info!("printed successfully");
    Ok(())
}

/// Config file (or defaults) with the command line flags applied on top.
fn load_config(args: &PrintArgs) -> Result<Config, PaperlinkError> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let image = &mut config.image;
    if let Some(align) = args.align {
        image.align = align;
    }
    image.enlarge |= args.enlarge;
    if let Some(order) = &args.blend_order {
        image.blend_order = order.clone();
    }
    if let Some(kernel) = args.black.kernel {
        image.black.kernel = kernel;
    }
    if let Some(threshold) = args.black.threshold {
        image.black.threshold = threshold;
    }
    let r = &args.red;
    override_plane(
        &mut image.red,
        (r.red_kernel, r.red_threshold),
        (r.red_hue_width, r.red_min_saturation, r.red_max_lightness),
    );
    let y = &args.yellow;
    override_plane(
        &mut image.yellow,
        (y.yellow_kernel, y.yellow_threshold),
        (y.yellow_hue_width, y.yellow_min_saturation, y.yellow_max_lightness),
    );

    let transfer = &mut config.transfer;
    let t = &args.transfer;
    if let Some(ms) = t.write_pause {
        transfer.write_pause_ms = ms;
    }
    if let Some(ms) = t.refresh_pause {
        transfer.refresh_pause_ms = ms;
    }
    transfer.read_device_output |= t.read_device_output;
    if let Some(n) = t.max_attempts {
        transfer.max_attempts = n;
    }
    if let Some(secs) = t.idle_timeout {
        transfer.idle_timeout_secs = secs;
    }

    Ok(config)
}

fn override_plane(
    plane: &mut ColorPlaneConfig,
    (kernel, threshold): (Option<Kernel>, Option<u8>),
    (hue_width, min_saturation, max_lightness): (Option<u16>, Option<u8>, Option<u8>),
) {
    if let Some(kernel) = kernel {
        plane.kernel = kernel;
    }
    if let Some(threshold) = threshold {
        plane.threshold = threshold;
    }
    if let Some(width) = hue_width {
        plane.hue_width = width;
    }
    if let Some(s) = min_saturation {
        plane.min_saturation = s;
    }
    if let Some(l) = max_lightness {
        plane.max_lightness = l;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> PrintArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Print(args) => args,
            Commands::List => panic!("expected print"),
        }
    }

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_print_defaults() {
        let args = parse(&["paperlink", "print", "photo.png"]);
        assert_eq!(args.device, PathBuf::from("/dev/ttyACM0"));
        assert_eq!(args.device_mode, ColorMode::Bw);
        assert_eq!(load_config(&args).unwrap(), Config::default());
    }

    #[test]
    fn test_flags_override_config() {
        let args = parse(&[
            "paperlink",
            "print",
            "poster.png",
            "--device-mode",
            "bwry",
            "--align",
            "top-left",
            "--blend-order",
            "red,black",
            "--kernel",
            "stucki",
            "--red-threshold",
            "100",
            "--yellow-max-lightness",
            "70",
            "--write-pause",
            "250",
            "--read-device-output",
        ]);
        let config = load_config(&args).unwrap();

        assert_eq!(args.device_mode, ColorMode::Bwry);
        assert_eq!(config.image.align, Alignment::TopLeft);
        assert_eq!(config.image.black.kernel, Kernel::Stucki);
        assert_eq!(config.image.red.threshold, 100);
        assert_eq!(config.image.red.kernel, Kernel::Atkinson);
        assert_eq!(config.image.yellow.max_lightness, 70);
        assert_eq!(config.transfer.write_pause_ms, 250);
        assert!(config.transfer.read_device_output);
        assert_eq!(config.transfer.refresh_pause_ms, 5000);
    }

    #[test]
    fn test_bad_blend_order_is_rejected() {
        assert!(
            Cli::try_parse_from(["paperlink", "print", "x.png", "--blend-order", "red,red"])
                .is_err()
        );
    }

    #[test]
    fn test_hue_width_range() {
        assert!(
            Cli::try_parse_from(["paperlink", "print", "x.png", "--red-hue-width", "400"])
                .is_err()
        );
    }
}
