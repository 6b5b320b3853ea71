mod settings;

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};

use frame_archive_core::archive::infrastructure::archive_writer::{ArchiveWriter, WriterOptions};
use frame_archive_core::shared::constants::IMAGE_EXTENSIONS;
use frame_archive_core::{
    ArchiveCatalog, ArchiveClip, ClipRequest, FrameImage, ResolvedClip, TimeStamp, VideoBuffer,
    VideoSequence,
};

use crate::settings::Settings;

/// Inspect, query and build time-indexed frame archives.
#[derive(Parser)]
#[command(name = "frame-archive")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the clips reachable from the given sources.
    Info {
        /// Clip indexes or manifests (defaults to the configured sources).
        sources: Vec<String>,
    },
    /// Resolve a request to a time range and print it.
    Resolve {
        #[command(flatten)]
        request: RequestArgs,

        /// Print a URI for the resolved range instead of a frame count.
        #[arg(long)]
        uri: bool,
    },
    /// Write the frames of a resolved request as PNG files.
    Extract {
        #[command(flatten)]
        request: RequestArgs,

        /// Output directory.
        #[arg(long)]
        out: PathBuf,
    },
    /// Build an archive clip from a directory of images.
    Pack {
        /// Directory of images, packed in file name order.
        images: PathBuf,

        /// Output directory.
        #[arg(long)]
        out: PathBuf,

        #[arg(long)]
        mission: String,

        #[arg(long, default_value = "")]
        stream: String,

        /// Codec tag for stored frames: raw, png, jpeg, bmp or tiff.
        #[arg(long)]
        codec: Option<String>,

        /// Frame rate; frame times are written in milliseconds.
        #[arg(long, default_value = "30.0")]
        fps: f64,

        /// Base name of the written files.
        #[arg(long, default_value = "clip")]
        name: String,
    },
    /// Show or change the stored settings.
    Config {
        #[arg(long)]
        padding: Option<f64>,

        /// Add a default source.
        #[arg(long)]
        add_source: Vec<String>,

        #[arg(long)]
        clear_sources: bool,
    },
}

#[derive(Args)]
struct RequestArgs {
    #[arg(long)]
    mission: String,

    #[arg(long)]
    stream: Option<String>,

    /// Range start; -1 leaves it open.
    #[arg(long, default_value = "-1", allow_negative_numbers = true)]
    start: f64,

    /// Range end; -1 leaves it open.
    #[arg(long, default_value = "-1", allow_negative_numbers = true)]
    end: f64,

    /// Extra time on each side (defaults to the configured padding).
    #[arg(long)]
    padding: Option<f64>,

    /// Clip indexes or manifests (defaults to the configured sources).
    #[arg(long = "source")]
    sources: Vec<String>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = Settings::load();

    match cli.command {
        Command::Info { sources } => run_info(&load_catalog(&sources, &settings)?),
        Command::Resolve { request, uri } => run_resolve(&request, uri, &settings),
        Command::Extract { request, out } => run_extract(&request, &out, &settings),
        Command::Pack {
            images,
            out,
            mission,
            stream,
            codec,
            fps,
            name,
        } => {
            let options = WriterOptions {
                mission_id: mission,
                stream_id: stream,
                codec: codec.unwrap_or_else(|| settings.codec.clone()),
                embed_metadata: false,
                write_metadata_file: false,
            };
            run_pack(&images, &out, &name, options, fps, &settings)
        }
        Command::Config {
            padding,
            add_source,
            clear_sources,
        } => run_config(settings, padding, add_source, clear_sources),
    }
}

fn load_catalog(sources: &[String], settings: &Settings) -> Result<ArchiveCatalog, Box<dyn std::error::Error>> {
    let sources = if sources.is_empty() { &settings.sources } else { sources };
    if sources.is_empty() {
        return Err("no sources given and none configured".into());
    }
    let mut catalog = ArchiveCatalog::new();
    for source in sources {
        match catalog.add_source(source) {
            Ok(count) => log::info!("Loaded {count} clips from {source}"),
            Err(e) => log::warn!("Skipping {source}: {e}"),
        }
    }
    if catalog.is_empty() {
        return Err("no clips could be loaded".into());
    }
    Ok(catalog)
}

fn run_info(catalog: &ArchiveCatalog) -> Result<(), Box<dyn std::error::Error>> {
    for mission in catalog.missions() {
        println!("{mission}");
        for clip in catalog.clips_for_mission(mission) {
            let range = clip
                .time_range()
                .map(|(first, last)| format!("[{first}, {last}]"))
                .unwrap_or_else(|| "[empty]".to_string());
            let uri = catalog
                .uri_of(clip)
                .map(ToString::to_string)
                .unwrap_or_default();
            println!(
                "  {:<12} {range} {} frames, {} metadata  {uri}",
                display_stream(clip),
                clip.frame_count(),
                clip.metadata().len()
            );
        }
    }
    Ok(())
}

fn display_stream(clip: &ArchiveClip) -> &str {
    match clip.stream_id() {
        "" => "-",
        stream => stream,
    }
}

fn to_request(args: &RequestArgs, settings: &Settings) -> ClipRequest {
    let mut request = ClipRequest::new(&args.mission, args.start, args.end)
        .with_padding(args.padding.unwrap_or(settings.padding));
    if let Some(stream) = &args.stream {
        request = request.with_stream(stream);
    }
    request
}

fn run_resolve(args: &RequestArgs, want_uri: bool, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = load_catalog(&args.sources, settings)?;
    let request = to_request(args, settings);

    match catalog.get_clip(&request, want_uri)? {
        ResolvedClip::Uri(uri) => println!("{uri}"),
        ResolvedClip::Clip(clip) => {
            let (first, last) = clip.time_range().ok_or("resolved clip is empty")?;
            println!("{first} {last} ({} frames)", clip.frame_count());
        }
    }
    Ok(())
}

fn run_extract(args: &RequestArgs, out: &Path, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = load_catalog(&args.sources, settings)?;
    let request = to_request(args, settings);
    let ResolvedClip::Clip(mut clip) = catalog.get_clip(&request, false)? else {
        return Err("expected a clip".into());
    };

    fs::create_dir_all(out)?;
    let total = clip.frame_count();
    let mut written = 0;
    let mut position = clip.rewind();
    while let Some(timestamp) = position {
        let image = clip.current_image();
        if image.is_valid() {
            let path = out.join(frame_file_name(&timestamp, written));
            image.to_bitmap()?.save(&path)?;
            written += 1;
            eprint!("\rExtracting frame {written}/{total}");
        }
        position = clip.advance();
    }
    eprintln!();
    log::info!("Wrote {written} frames to {}", out.display());
    Ok(())
}

fn frame_file_name(timestamp: &TimeStamp, index: usize) -> String {
    match timestamp.time() {
        Some(time) => format!("frame_{time}.png"),
        None => format!("frame_{index:06}.png"),
    }
}

fn run_pack(
    images: &Path,
    out: &Path,
    name: &str,
    options: WriterOptions,
    fps: f64,
    settings: &Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    if fps.is_nan() || fps <= 0.0 {
        return Err(format!("invalid frame rate {fps}").into());
    }
    let files = list_images(images)?;
    if files.is_empty() {
        return Err(format!("no images found in {}", images.display()).into());
    }

    // Stage every decoded image first so a bad file aborts before any output.
    let mut buffer = VideoBuffer::new(&settings.buffer)?;
    for (n, file) in files.iter().enumerate() {
        let bitmap = image::open(file)?.to_rgb8();
        let time = (n as f64 * 1000.0 / fps).round();
        buffer.insert_image(TimeStamp::new(Some(time), Some(n as u32)), &FrameImage::from_bitmap(&bitmap))?;
        eprint!("\rReading image {}/{}", n + 1, files.len());
    }
    eprintln!();

    fs::create_dir_all(out)?;
    let mut writer = ArchiveWriter::create(out, name, options)?;
    let mut position = buffer.rewind();
    while let Some(timestamp) = position {
        let time = timestamp.time().ok_or("staged frame has no time")? as i64;
        let image = buffer.current_frame().ok_or("staged frame vanished")?.image()?;
        writer.write_frame(time, &image, None)?;
        position = buffer.advance();
    }
    let index = writer.finish()?;
    log::info!("Packed {} images into {}", files.len(), index.display());
    println!("{}", index.display());
    Ok(())
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_image(path))
        .collect();
    files.sort();
    Ok(files)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn run_config(
    mut settings: Settings,
    padding: Option<f64>,
    add_source: Vec<String>,
    clear_sources: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let changed = padding.is_some() || !add_source.is_empty() || clear_sources;
    if clear_sources {
        settings.sources.clear();
    }
    if let Some(padding) = padding {
        settings.padding = padding;
    }
    settings.sources.extend(add_source);
    if changed {
        settings.save();
    }
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
