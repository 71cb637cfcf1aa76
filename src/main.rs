// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod args;

use args::Args;
use clap::Parser;
use edgefirst_jpegdec::{
    decoder::{DecodedImage, Decoder},
    soft::SoftCore,
    stats,
};
use serde_json::json;
use std::{error::Error, fs::File, time::Instant};
use tracing::{info, warn};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, Registry};
use tracing_tracy::TracyLayer;

fn init_tracing(args: &Args) -> Result<(), Box<dyn Error>> {
    let filter = match args.verbose {
        true => EnvFilter::new("debug"),
        false => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let stdout_log = tracing_subscriber::fmt::layer().compact();

    // Skipped silently when the journal socket is missing.
    let journald = match args.journald {
        true => tracing_journald::layer().ok(),
        false => None,
    };

    let tracy = match args.tracy {
        true => {
            tracy_client::Client::start();
            Some(TracyLayer::default())
        }
        false => None,
    };

    let subscriber = Registry::default()
        .with(filter)
        .with(stdout_log)
        .with(journald)
        .with(tracy);
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(&args)?;

    let decoder = Decoder::new(SoftCore, (&args).into());
    let request = args.request();
    let mut file = File::open(&args.input)?;

    if args.bounds {
        let bounds = decoder.read_bounds(&mut file, &request)?;
        let header = &bounds.header;
        let doc = json!({
            "input": args.input,
            "width": bounds.width,
            "height": bounds.height,
            "config": bounds.config.to_string(),
            "scale": bounds.scale.divisor(),
            "header": {
                "width": header.width,
                "height": header.height,
                "coded_width": header.coded_width,
                "coded_height": header.coded_height,
                "sampling": header.sampling.to_string(),
                "progressive": header.progressive,
                "length": header.payload_len,
            },
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    stats::init(stats::DEFAULT_WINDOW);
    let start = Instant::now();
    let mut image: Option<DecodedImage> = None;
    for n in 0..args.repeat.max(1) {
        match decoder.decode(&mut file, &request) {
            Ok(decoded) => image = Some(decoded),
            Err(e) if args.repeat > 1 => warn!("decode {} failed: {}", n, e),
            Err(e) => return Err(e.into()),
        }
    }

    let snapshot = stats::snapshot();
    info!(
        "{} decodes, {} failures in {:?} (average {} /s)",
        snapshot.decodes,
        snapshot.failures,
        start.elapsed(),
        snapshot.rate
    );

    let Some(image) = image else {
        return Err("no successful decode".into());
    };
    info!("{}", image);
    if let Some(output) = &args.output {
        std::fs::write(output, &image.pixels)?;
        info!("wrote {}", output.display());
    }

    Ok(())
}
