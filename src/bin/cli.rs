use anyhow::{anyhow, bail, Context, Result};
use crabscan::replay::{replay, DetectionTrace, StepOutcome};
use crabscan::{DocumentImage, PerspectiveRectifier, Quad, ScanConfig};
use std::env;
use std::path::PathBuf;

fn main() -> Result<()> {
    crabscan::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: crabscan-cli <rectify|replay|default-config> [args]");
        std::process::exit(1);
    }

    let command = &args[1];
    match command.as_str() {
        "rectify" => cmd_rectify(&args),
        "replay" => cmd_replay(&args),
        "default-config" => cmd_default_config(&args),
        _ => {
            eprintln!("Unknown command: {}", command);
            std::process::exit(1);
        }
    }
}

fn cmd_rectify(args: &[String]) -> Result<()> {
    // rectify <input> <output> <x0,y0,x1,y1,x2,y2,x3,y3> [--normalized] [--config <path>]
    let mut positional = Vec::new();
    let mut normalized = false;
    let mut config_path = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--normalized" => normalized = true,
            "--config" => {
                i += 1;
                config_path = Some(args.get(i).context("--config needs a path")?.clone());
            }
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    if positional.len() != 3 {
        eprintln!(
            "Usage: crabscan-cli rectify <input> <output> <x0,y0,x1,y1,x2,y2,x3,y3> [--normalized]"
        );
        std::process::exit(1);
    }

    let config = load_config(config_path)?;
    let input = &positional[0];
    let output = &positional[1];
    let corners = parse_corners(&positional[2])?;

    let source = image::open(input).with_context(|| format!("reading {}", input))?;
    let quad = if normalized {
        Quad::from_normalized(&corners, source.width() as f64, source.height() as f64)
    } else {
        corners
    };

    let rectifier = PerspectiveRectifier::from_config(&config.rectify);
    let document = rectifier.rectify_or_original(source, &quad);
    if let DocumentImage::Original { reason, .. } = &document {
        eprintln!("Rectification failed ({}), writing original image", reason);
    }
    let (width, height) = document.dimensions();
    document
        .into_dynamic()
        .to_rgb8()
        .save(output)
        .with_context(|| format!("writing {}", output))?;
    println!("{}x{} -> {}", width, height, output);
    Ok(())
}

fn cmd_replay(args: &[String]) -> Result<()> {
    // replay <trace.json> [--config <path>] [--fps <n>] [--json]
    let mut trace_path = None;
    let mut config_path = None;
    let mut fps = None;
    let mut json = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                config_path = Some(args.get(i).context("--config needs a path")?.clone());
            }
            "--fps" => {
                i += 1;
                fps = Some(args.get(i).context("--fps needs a value")?.parse::<f64>()?);
            }
            "--json" => json = true,
            other => {
                if trace_path.is_none() {
                    trace_path = Some(other.to_string());
                }
            }
        }
        i += 1;
    }

    let trace_path = trace_path.ok_or_else(|| anyhow!("trace path required"))?;
    let config = load_config(config_path)?;
    let trace = DetectionTrace::load_from_file(&trace_path)?;
    let report = replay(&trace, &config, fps);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for step in &report.steps {
        let line = match &step.outcome {
            StepOutcome::CoolingDown { remaining_ms } => format!("cooldown ({} ms left)", remaining_ms),
            StepOutcome::Rejected { reason, discarded } => {
                format!("rejected: {} (discarded {})", reason, discarded)
            }
            StepOutcome::Accumulating { filled, required } => {
                format!("accumulating {}/{}", filled, required)
            }
            StepOutcome::Unstable { jitter } => format!("unstable, jitter {:.2}", jitter),
            StepOutcome::Stable { jitter } => format!("stable (paused), jitter {:.2}", jitter),
            StepOutcome::Captured { id, .. } => format!("CAPTURE {}", id),
        };
        println!(
            "#{:<5} {:>7} ms  {:>3.0}%  {}",
            step.index,
            step.at_ms,
            step.progress * 100.0,
            line
        );
    }
    println!("{} capture(s)", report.captures);
    Ok(())
}

fn cmd_default_config(args: &[String]) -> Result<()> {
    let path = args
        .get(2)
        .map(PathBuf::from)
        .unwrap_or_else(ScanConfig::default_path);
    ScanConfig::default().save_to_file(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn load_config(path: Option<String>) -> Result<ScanConfig> {
    match path {
        Some(p) => Ok(ScanConfig::load_from_file(&p)?),
        None => Ok(ScanConfig::load_or_default()),
    }
}

fn parse_corners(s: &str) -> Result<Quad> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .context("corners must be eight comma-separated numbers")?;
    if values.len() != 8 {
        bail!("expected 8 corner values, got {}", values.len());
    }
    Ok(Quad::from_array([
        [values[0], values[1]],
        [values[2], values[3]],
        [values[4], values[5]],
        [values[6], values[7]],
    ]))
}
