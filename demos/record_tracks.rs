//! Multitrack recording example.
//!
//! Records three synthetic sources as three tracks of one container file.
//! Each track runs through its own encoder; the container is opened once
//! every encoder has announced its format.
//!
//! Run with: cargo run --example record_tracks
//!
//! Set `RUST_LOG=multitrack_capture=debug` to watch the capture loop.

use std::time::Duration;

use multitrack_capture::{
    AudioFormat, FileWriter, MockSource, PcmEncoder, PipelineEvent, Recorder, SessionSetup,
};
use tracing_subscriber::EnvFilter;

const SAMPLE_RATE: u32 = 16_000;

fn voice(frequency: f64, ms: u64) -> MockSource {
    let mut source = MockSource::new(SAMPLE_RATE, 1).with_name(format!("voice-{frequency}"));
    source.generate_sine(frequency, ms);
    source
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let format = AudioFormat::pcm_s16le(SAMPLE_RATE, 1);
    let output = "interview.mtrk";

    let setup = SessionSetup::builder()
        .add_track(voice(220.0, 3_000), PcmEncoder::new(format.clone()))
        .add_track(voice(330.0, 3_000), PcmEncoder::new(format.clone()))
        // A slow encoder: the container still waits for it
        .add_track(
            voice(440.0, 3_000),
            PcmEncoder::new(format).with_format_delay(40),
        )
        .container(FileWriter::new(output))
        .on_event(|event| match event {
            PipelineEvent::TrackFormatRegistered {
                track,
                container_track,
                registered,
                total,
            } => {
                println!("Track {track} -> container track {container_track} ({registered}/{total})");
            }
            PipelineEvent::ContainerOpened { tracks } => {
                println!("Container opened with {tracks} tracks");
            }
            PipelineEvent::TrackEnded { track, streaming } => {
                println!("Track {track} ended, {streaming} still streaming");
            }
            PipelineEvent::SessionAborted { reason } => {
                eprintln!("Session aborted: {reason}");
            }
            _ => {}
        })
        .build()?;

    let recorder = Recorder::new();
    println!("{}", recorder.start_session(setup)?);

    tokio::time::sleep(Duration::from_secs(2)).await;
    println!("{}", recorder.request_stop());
    println!("{}", recorder.request_stop());

    let phase = recorder.closed().await;
    let report = recorder.wait()?;

    println!();
    println!("Session {phase:?}: wrote {output}");
    for track in &report.tracks {
        println!(
            "  track {} (container {:?}): {} samples, {} bytes, last pts {}us",
            track.track,
            track.container_track,
            track.samples_written,
            track.bytes_written,
            track.last_pts_us
        );
    }

    Ok(())
}
