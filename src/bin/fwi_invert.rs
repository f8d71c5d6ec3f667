// SPDX-License-Identifier: AGPL-3.0-only

//! Encoded-super-shot full waveform inversion driver.
//!
//! Run: `fwi_invert <config.json>`
//!
//! Requires `CHECKPOINTDIR` to point at a writable directory for the
//! wavefield checkpoints. Exit code 0 on success, 1 on configuration,
//! geometry, or I/O failure.

use std::path::PathBuf;
use std::process;
use std::time::Instant;

use tracing_subscriber::EnvFilter;

use riptide::checkpoint::DirStore;
use riptide::config::FwiConfig;
use riptide::driver::InversionDriver;
use riptide::error::{Error, Result};
use riptide::io;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run() {
        eprintln!("fwi_invert: {e}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or_else(|| Error::Config("usage: fwi_invert <config.json>".into()))?;

    let config = FwiConfig::from_file(&config_path)?;
    let model = io::read_velocity(&config.vinit)?;
    let dobs = io::read_shots(&config.shots, config.ns, config.nt, config.ng)?;
    let mut store = DirStore::from_env()?;

    println!("═══ riptide FWI ═══");
    println!(
        "  Grid:        {}×{} interior + {}-cell sponge, dx = {} m",
        model.nz, model.nx, config.nb, model.dx
    );
    println!(
        "  Acquisition: {} shots × {} receivers, nt = {}, dt = {} s",
        config.ns, config.ng, config.nt, config.dt
    );
    println!(
        "  Source:      Ricker fm = {} Hz, amp = {}",
        config.fm, config.amp
    );
    println!(
        "  Inversion:   {} iterations, clamp [{}, {}] m/s, maxdv = {} m/s",
        config.niter, config.vmin, config.vmax, config.maxdv
    );
    println!("  Threads:     {}", rayon::current_num_threads());
    println!();

    let t_total = Instant::now();
    let mut driver = InversionDriver::new(&config, &model, dobs)?;
    driver.run(&mut store)?;

    println!(
        "Inversion finished: {} iterations in {:.1}s, model appended to {}",
        config.niter,
        t_total.elapsed().as_secs_f64(),
        config.vupdates.display()
    );
    Ok(())
}
