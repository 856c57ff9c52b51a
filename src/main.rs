use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use postflow::api::types::{JobOutcome, PlatformResults};
use postflow::config::{self, AppConfig};
use postflow::context::AppContext;
use postflow::core::models::{Captions, Platform};
use postflow::core::{
    ImageJobRequest, Orchestrator, PollHandle, PollState, Submission, VideoJobRequest, VideoMode,
    VideoPost,
};
use postflow::upload::MediaFile;
use postflow::{db, logging};
use serde::Serialize;
use tracing::Instrument;

#[derive(Parser)]
#[command(name = "postflow")]
#[command(about = "Upload media, preview AI captions and post to social platforms", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(long, global = true, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(flatten)]
    overrides: Overrides,
}

/// Command-line values layered over the configuration file.
#[derive(Args, Serialize)]
struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    api_base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    profile: Option<String>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[serde(rename = "json_logs", skip_serializing_if = "std::ops::Not::not")]
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Stage a file through the upload cascade and print its URL
    Upload { file: PathBuf },
    /// Process videos and print titles and captions
    ProcessVideo(VideoArgs),
    /// Generate captions for images and post them
    PostImages(ImageArgs),
    /// Process videos and post them
    PostVideo(PostVideoArgs),
    /// Follow a submitted job until it finishes
    Status { job_id: String },
    /// List recent jobs
    Jobs,
}

#[derive(Args)]
struct VideoArgs {
    #[arg(required = true)]
    files: Vec<PathBuf>,

    #[arg(long, default_value = "")]
    description: String,

    /// YouTube only, unlisted
    #[arg(long)]
    special: bool,
}

#[derive(Args)]
struct ImageArgs {
    #[arg(required = true)]
    images: Vec<PathBuf>,

    #[arg(long, default_value = "")]
    description: String,

    /// Caption for one platform, e.g. `twitter=Hello`. Skips caption generation.
    #[arg(long = "caption", value_parser = parse_caption)]
    captions: Vec<(Platform, String)>,

    /// Post each image separately, spaced by --interval-hours
    #[arg(long)]
    multi: bool,

    #[arg(long, default_value_t = 0.0)]
    interval_hours: f64,

    #[arg(long)]
    no_overlay: bool,

    #[arg(long)]
    font_size: Option<u32>,

    /// Return after submitting instead of following the job
    #[arg(long)]
    no_wait: bool,
}

#[derive(Args)]
struct PostVideoArgs {
    #[command(flatten)]
    video: VideoArgs,

    /// Comma-separated platforms (default: all)
    #[arg(long, value_delimiter = ',')]
    platforms: Vec<Platform>,

    /// Post each video separately, spaced by --interval-hours
    #[arg(long)]
    multi: bool,

    #[arg(long, default_value_t = 0.0)]
    interval_hours: f64,

    #[arg(long)]
    no_wait: bool,
}

fn parse_caption(value: &str) -> Result<(Platform, String), String> {
    let (platform, text) = value
        .split_once('=')
        .ok_or_else(|| format!("expected PLATFORM=TEXT, got `{}`", value))?;
    Ok((platform.parse()?, text.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config, Some(&cli.overrides))?;
    logging::init(logging::LogConfig::from(&config));

    let db_conn = db::init(&config.database_path).await?;
    let ctx = AppContext::new(config, db_conn).context("Failed to build backend client")?;
    let span = tracing::info_span!("session", id = %ctx.session_id);
    let orchestrator = Orchestrator::new(ctx);

    async move {
        match cli.command {
            Commands::Upload { file } => run_upload(&orchestrator, file).await,
            Commands::ProcessVideo(args) => run_process_video(&orchestrator, args).await,
            Commands::PostImages(args) => run_post_images(&orchestrator, args).await,
            Commands::PostVideo(args) => run_post_video(&orchestrator, args).await,
            Commands::Status { job_id } => {
                let state = follow(orchestrator.track(&job_id)).await?;
                print_final(&state)
            }
            Commands::Jobs => run_jobs(&orchestrator).await,
        }
    }
    .instrument(span)
    .await
}

async fn run_upload(orchestrator: &Orchestrator, path: PathBuf) -> Result<()> {
    let file = MediaFile::open(&path).await?;
    let url = orchestrator
        .context()
        .api
        .cascade()
        .upload(&file)
        .await
        .with_context(|| format!("Failed to upload {}", path.display()))?;
    println!("{}", url);
    Ok(())
}

async fn open_all(paths: &[PathBuf]) -> Result<Vec<MediaFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(MediaFile::open(path).await?);
    }
    Ok(files)
}

async fn run_process_video(orchestrator: &Orchestrator, args: VideoArgs) -> Result<()> {
    let files = open_all(&args.files).await?;
    let results = orchestrator
        .prepare_videos(&files, &args.description, args.special)
        .await?;

    for (file, result) in files.iter().zip(&results) {
        println!("{}: {}", file.name(), result.title);
        println!("  url: {}", result.video_url);
        if let Some(seconds) = result.processing_time {
            println!("  processed in {:.1}s", seconds);
        }
        print_captions(&result.platform_captions, "  ");
    }
    Ok(())
}

async fn run_post_images(orchestrator: &Orchestrator, args: ImageArgs) -> Result<()> {
    let images = open_all(&args.images).await?;
    let font_size = args.font_size;
    let mut overlay_texts = Vec::new();

    let request = if args.captions.is_empty() {
        let preview = orchestrator
            .context()
            .api
            .process_images(
                &images,
                &args.description,
                !args.no_overlay,
                args.multi,
                font_size,
            )
            .await
            .context("Failed to generate captions")?;
        overlay_texts = preview.overlay_texts;

        if args.multi {
            let Some(per_image) = preview.per_image_captions else {
                bail!("Backend returned no per-image captions");
            };
            ImageJobRequest::multi(images, per_image, args.interval_hours)
        } else {
            ImageJobRequest::standard(images, preview.platform_captions.unwrap_or_default())
        }
    } else {
        let captions: Captions = args.captions.into_iter().collect();
        if args.multi {
            let per_image = vec![captions; images.len()];
            ImageJobRequest::multi(images, per_image, args.interval_hours)
        } else {
            ImageJobRequest::standard(images, captions)
        }
    };
    let request = request
        .with_overlay(overlay_texts, !args.no_overlay)
        .with_font_size(font_size);

    let submission = Submission::Images(request);
    print_schedule(&submission, "Image");
    let job = orchestrator.publish(&submission, &args.description).await?;
    println!("Submitted job {}", job.id);

    if args.no_wait {
        return Ok(());
    }
    let state = follow(orchestrator.track(&job.id)).await?;
    print_final(&state)
}

async fn run_post_video(orchestrator: &Orchestrator, args: PostVideoArgs) -> Result<()> {
    let files = open_all(&args.video.files).await?;
    let results = orchestrator
        .prepare_videos(&files, &args.video.description, args.video.special)
        .await?;

    let posts: Vec<VideoPost> = results
        .iter()
        .map(|result| VideoPost::from_result(result, result.platform_captions.clone()))
        .collect();

    let mode = if args.video.special {
        VideoMode::Special
    } else if args.platforms.is_empty() {
        VideoMode::Standard {
            platforms: Platform::VIDEO.to_vec(),
        }
    } else {
        VideoMode::Standard {
            platforms: args.platforms,
        }
    };

    let request = VideoJobRequest::new(posts, args.interval_hours, args.multi, mode);
    let submission = Submission::Video(request);
    print_schedule(&submission, "Video");
    let job = orchestrator
        .publish(&submission, &args.video.description)
        .await?;
    println!("Submitted job {}", job.id);

    if args.no_wait {
        return Ok(());
    }
    let state = follow(orchestrator.track(&job.id)).await?;
    print_final(&state)
}

async fn run_jobs(orchestrator: &Orchestrator) -> Result<()> {
    let records = orchestrator.context().store.list().await?;
    if records.is_empty() {
        println!("No jobs yet");
        return Ok(());
    }

    for record in records {
        println!(
            "{}  {:<10}  {}  {}",
            record.time.format("%Y-%m-%d %H:%M"),
            record.status.as_str(),
            record.id,
            record.desc
        );
    }
    Ok(())
}

/// Print progress labels until the poll settles. Ctrl-C stops polling.
async fn follow(handle: PollHandle) -> Result<PollState> {
    println!("Following job {}", handle.job_id());
    let mut rx = handle.subscribe();
    println!("{}", rx.borrow_and_update().label());

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                println!("{}", state.label());
                if state.is_settled() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                handle.stop();
                break;
            }
        }
    }

    handle.wait().await
}

/// Print posting offsets for jobs that post more than one item.
fn print_schedule(submission: &Submission, item: &str) {
    let slots = submission.schedule();
    if slots.len() < 2 {
        return;
    }
    for (index, slot) in slots.iter().enumerate() {
        println!("{} {}: {}", item, index + 1, slot.label());
    }
}

fn print_final(state: &PollState) -> Result<()> {
    match state {
        PollState::Finished { outcome, .. } => {
            print_outcome(outcome);
            Ok(())
        }
        PollState::Errored(message) => bail!("Status check failed: {}", message),
        PollState::Cancelled => {
            println!("Stopped following; check later with `postflow status`");
            Ok(())
        }
        PollState::Waiting { .. } => Ok(()),
    }
}

fn print_outcome(outcome: &JobOutcome) {
    match outcome {
        JobOutcome::Platforms(results) => print_platforms(results, ""),
        JobOutcome::Items(items) => {
            for item in items {
                println!("{}", item.label());
                print_platforms(&item.platform_results, "  ");
            }
        }
        JobOutcome::Error(message) => println!("Error: {}", message),
        JobOutcome::Empty => println!("No results reported"),
    }
}

fn print_platforms(results: &PlatformResults, indent: &str) {
    for (platform, result) in results {
        match (result.success, &result.url, &result.error) {
            (true, Some(url), _) => println!("{}{}: posted {}", indent, platform, url),
            (true, None, _) => println!("{}{}: posted", indent, platform),
            (false, _, Some(error)) => println!("{}{}: failed ({})", indent, platform, error),
            (false, _, None) => println!("{}{}: failed", indent, platform),
        }
    }
}

fn print_captions(captions: &Captions, indent: &str) {
    for (platform, text) in captions {
        println!("{}{}: {}", indent, platform, text);
    }
}
