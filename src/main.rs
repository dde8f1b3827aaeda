use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use tablescribe::{
    OllamaOracle, OracleConfig, RepairConfig, RepairOrchestrator, Roster, SpanTranscriber,
    TranscriberConfig, WindowConfig, deduplicate, export_transcript, group_adjacent,
    identify_low_confidence, parse_transcript_file,
};

#[derive(Parser)]
#[command(name = "tablescribe")]
#[command(author, version, about = "Tabletop-session transcript repair pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Repair a transcript and export the cleaned segment sequence
    Process {
        /// Input transcript file (aligned JSON format)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file; format chosen by extension (.json, .srt, or text)
        #[arg(short, long)]
        output: PathBuf,

        /// Character roster JSON file
        #[arg(long)]
        roster: Option<PathBuf>,

        /// Audio reference for span retranscription
        #[arg(long)]
        audio: Option<String>,

        /// Disable the retranscription repair stage
        #[arg(long)]
        no_retranscription: bool,

        /// Confidence threshold below which segments are repaired
        #[arg(long, default_value = "0.7")]
        confidence_threshold: f64,

        /// Context window size in segments
        #[arg(long, default_value = "5")]
        window_size: usize,

        /// Overlap between consecutive context chunks
        #[arg(long, default_value = "1")]
        overlap: usize,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Analyze a transcript without making changes
    Analyze {
        /// Input transcript file (aligned JSON format)
        #[arg(short, long)]
        input: PathBuf,

        /// Character roster JSON file
        #[arg(long)]
        roster: Option<PathBuf>,

        /// Confidence threshold used for the low-confidence report
        #[arg(long, default_value = "0.7")]
        confidence_threshold: f64,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            input,
            output,
            roster,
            audio,
            no_retranscription,
            confidence_threshold,
            window_size,
            overlap,
            verbose,
        } => {
            setup_logging(verbose);
            process_transcript(
                input,
                output,
                roster,
                audio,
                no_retranscription,
                confidence_threshold,
                window_size,
                overlap,
            )
            .await
        }
        Commands::Analyze {
            input,
            roster,
            confidence_threshold,
            verbose,
        } => {
            setup_logging(verbose);
            analyze_transcript(input, roster, confidence_threshold)
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

#[allow(clippy::too_many_arguments)]
async fn process_transcript(
    input: PathBuf,
    output: PathBuf,
    roster_path: Option<PathBuf>,
    audio: Option<String>,
    no_retranscription: bool,
    confidence_threshold: f64,
    window_size: usize,
    overlap: usize,
) -> Result<()> {
    info!("Loading transcript from {:?}", input);
    let mut transcript =
        parse_transcript_file(&input).context("Failed to parse input transcript")?;

    info!(
        "Loaded {} segments, {} speakers, {:.1}s of audio",
        transcript.segments.len(),
        transcript.speakers().len(),
        transcript.audio_duration
    );

    let roster = match roster_path {
        Some(path) => {
            let roster = Roster::load(&path).context("Failed to load roster")?;
            info!(
                "Roster: {} characters, {} players",
                roster.characters.len(),
                roster.players.len()
            );
            Some(roster)
        }
        None => None,
    };

    let window = WindowConfig::new(window_size, overlap)?;
    let repair_config = RepairConfig {
        confidence_threshold,
        window,
        use_retranscription: !no_retranscription,
        ..RepairConfig::default()
    };

    let oracle = OllamaOracle::new(OracleConfig::from_env());

    // The transcriber is only opened when an audio reference exists; it is
    // reused across all segments in the run
    let transcriber = match (&audio, no_retranscription) {
        (Some(_), false) => Some(tablescribe::HttpTranscriber::new(
            TranscriberConfig::from_env(),
        )),
        _ => None,
    };

    let orchestrator = RepairOrchestrator::new(
        &oracle,
        transcriber.as_ref().map(|t| t as &dyn SpanTranscriber),
        roster.as_ref(),
        repair_config,
    )?;

    let repair_result = orchestrator.execute(&mut transcript, audio.as_deref()).await;

    info!("Deduplicating repaired segments...");
    let dedup_result = deduplicate(std::mem::take(&mut transcript.segments));
    transcript.segments = dedup_result.segments;
    transcript.metadata.segment_count = transcript.segments.len();

    export_transcript(&transcript, &output).context("Failed to export transcript")?;
    info!("Output written to {:?}", output);

    info!(
        "Complete: {} segments repaired, {} duplicates removed, {} segments exported",
        repair_result.segments_repaired,
        dedup_result.duplicates_removed,
        transcript.segments.len()
    );

    Ok(())
}

fn analyze_transcript(
    input: PathBuf,
    roster_path: Option<PathBuf>,
    confidence_threshold: f64,
) -> Result<()> {
    info!("Analyzing transcript from {:?}", input);
    let transcript = parse_transcript_file(&input).context("Failed to parse input transcript")?;

    println!("Transcript Analysis");
    println!("==================");
    println!("Total segments: {}", transcript.segments.len());
    println!("Speakers: {:?}", transcript.speakers());
    println!("Duration: {:.1}s", transcript.audio_duration);
    println!();

    let low = identify_low_confidence(&transcript.segments, confidence_threshold);
    let runs = group_adjacent(&low);

    println!("Low Confidence (threshold {:.2})", confidence_threshold);
    println!("-------------------------------");
    println!("Flagged segments: {}", low.len());
    println!("Contiguous runs: {}", runs.len());
    for run in &runs {
        let first = &transcript.segments[run[0]];
        let last = &transcript.segments[run[run.len() - 1]];
        println!(
            "  segments {}-{} ({:.1}s - {:.1}s)",
            run[0], run[run.len() - 1], first.start_time, last.end_time
        );
    }
    println!();

    if let Some(path) = roster_path {
        let roster = Roster::load(&path).context("Failed to load roster")?;
        let mut name_hits = 0;
        for segment in &transcript.segments {
            let corrected = roster.correct_names(&segment.text);
            if corrected != segment.text {
                name_hits += 1;
            }
        }
        println!("Roster");
        println!("------");
        println!("Characters: {}", roster.characters.len());
        println!("Players: {}", roster.players.len());
        println!("Segments with correctable names: {}", name_hits);
        println!();
    }

    println!("Speaker Statistics");
    println!("------------------");
    for speaker in transcript.speakers() {
        let segments: Vec<_> = transcript
            .segments
            .iter()
            .filter(|s| s.speaker == speaker)
            .collect();
        let spoken: f64 = segments.iter().map(|s| s.duration()).sum();
        let with_conf: Vec<f64> = segments.iter().filter_map(|s| s.confidence).collect();
        let avg_conf = if with_conf.is_empty() {
            None
        } else {
            Some(with_conf.iter().sum::<f64>() / with_conf.len() as f64)
        };

        match avg_conf {
            Some(conf) => println!(
                "{}: {} segments, {:.1}s spoken, avg conf {:.2}",
                speaker,
                segments.len(),
                spoken,
                conf
            ),
            None => println!(
                "{}: {} segments, {:.1}s spoken, no confidence data",
                speaker,
                segments.len(),
                spoken
            ),
        }
    }

    Ok(())
}
