//! Simulated end-to-end scan
//!
//! Orbits a synthetic sphere, feeds the depth frames and a few mesh anchors
//! through the scan controller, then exports a model.
//!
//! Usage:
//!   cargo run --bin scan_demo -- --frames 120 --anchors 8 --output ./scans
//!   RUST_LOG=debug cargo run --bin scan_demo -- --host-unavailable

use anyhow::{bail, Context, Result};
use clap::Parser;
use lidarscan_core::{Point3, Transform3D, TriangleMesh, UnitQuaternion, Vector3};
use lidarscan_session::{
    AnchorId, EventSink, HostUnavailablePolicy, MeshAnchor, ModelFormat, ScanController, ScanEvent,
    ScannerConfig, SimulatedDepthSource, SimulatedHost, SimulationConfig, StaticCapability,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Simulated depth scan and model export
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scanner configuration (YAML); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory for exported models (overrides the config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Model format: glb, obj or usdz
    #[arg(short, long)]
    format: Option<ModelFormat>,

    /// Depth frames to capture
    #[arg(long, default_value = "60")]
    frames: usize,

    /// Mesh anchors to report during the scan (0 exports a placeholder)
    #[arg(long, default_value = "4")]
    anchors: usize,

    /// Seed for the simulated depth noise
    #[arg(long, default_value = "7")]
    seed: u64,

    /// Pretend the AR session cannot start and fall back to simulation
    #[arg(long)]
    host_unavailable: bool,

    /// Print every event as JSON
    #[arg(long)]
    events: bool,
}

struct PrintSink;

impl EventSink for PrintSink {
    fn on_event(&self, event: &ScanEvent) {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("unprintable event: {e}"),
        }
    }
}

fn sphere_anchor(index: usize, count: usize, radius: f32) -> MeshAnchor {
    let angle = index as f32 / count.max(1) as f32 * std::f32::consts::TAU;
    let rotation = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), angle);
    let offset = rotation * Vector3::new(0.0, 0.0, -radius);
    MeshAnchor::new(
        AnchorId::new_v4(),
        Transform3D::from_translation_rotation(offset, rotation),
        TriangleMesh::cuboid(Point3::origin(), radius * 0.3),
    )
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ScannerConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ScannerConfig::load_default().context("loading default config")?,
    };
    if let Some(output) = args.output {
        config.export.output_dir = output;
    }

    let host = if args.host_unavailable {
        config.host_unavailable = HostUnavailablePolicy::Simulate;
        SimulatedHost::unavailable("demo: AR session disabled")
    } else {
        SimulatedHost::new()
    };

    let controller = ScanController::new(config, Box::new(host), Box::new(StaticCapability(true)))?;
    let sink = Arc::new(PrintSink);
    if args.events {
        controller.attach(&sink);
    }

    controller.initialize_scan()?;
    let capture = controller.capture_handle();
    let sim = SimulationConfig::default();
    let radius = sim.radius;
    let mut source = SimulatedDepthSource::new(sim, args.seed);

    let anchor_every = if args.anchors == 0 { usize::MAX } else { (args.frames / args.anchors).max(1) };
    let mut anchors_sent = 0;

    for i in 0..args.frames {
        if i == args.frames / 2 {
            controller.pause_scan()?;
            controller.resume_scan()?;
        }

        let frame = source.next_frame();
        let accepted = capture.on_depth_frame(&frame.as_frame());

        if i % anchor_every == 0 && anchors_sent < args.anchors {
            capture.add_anchors(vec![sphere_anchor(anchors_sent, args.anchors, radius)]);
            anchors_sent += 1;
        }

        if i % 10 == 0 {
            let status = controller.info()?;
            info!(
                frame = i,
                accepted,
                points = status.point_count,
                progress = status.progress,
                quality = status.quality,
                "captured frame"
            );
        }
    }

    let result = controller.complete_scan(args.format)?;
    if !result.success {
        bail!(
            "export failed: {}",
            result.error_message.as_deref().unwrap_or("unknown error")
        );
    }

    let status = controller.info()?;
    info!(
        path = %result.model_path.display(),
        format = %result.format,
        placeholder = result.placeholder,
        points = status.point_count,
        anchors = status.anchor_count,
        simulated = status.simulated,
        "scan exported"
    );
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
