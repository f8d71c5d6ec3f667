// SPDX-License-Identifier: AGPL-3.0-only

//! Forward-model the observed shot dataset from a velocity model.
//!
//! Run: `fwi_forward <config.json>`
//!
//! Treats `vinit` as the modeling velocity and writes one gather per shot
//! to the `shots` dataset, ordered `(is, it, ig)` with receivers fast.
//! Exit code 0 on success, 1 on configuration, geometry, or I/O failure.

use std::path::PathBuf;
use std::process;
use std::time::Instant;

use tracing_subscriber::EnvFilter;

use riptide::config::FwiConfig;
use riptide::error::{Error, Result};
use riptide::io::{self, DatasetHeader};
use riptide::propagator::{forward_modeling, Damp4t10d};
use riptide::velocity::Velocity;
use riptide::wavelet::ricker_wavelet;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run() {
        eprintln!("fwi_forward: {e}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or_else(|| Error::Config("usage: fwi_forward <config.json>".into()))?;

    let config = FwiConfig::from_file(&config_path)?;
    let model = io::read_velocity(&config.vinit)?;
    if (model.dz - model.dx).abs() > 1e-6 * model.dx {
        return Err(Error::Config(format!(
            "cell spacing must be square, got dz={} dx={}",
            model.dz, model.dx
        )));
    }
    config.validate_geometry(model.nz, model.nx)?;

    let (dt, dx, nb, nt) = (config.dt, model.dx, config.nb, config.nt);
    let v_lo = model.data.iter().copied().fold(f32::INFINITY, f32::min);
    let v_hi = model.data.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut vel = Velocity::new(model.data, model.nz, model.nx).expand_domain(nb);
    vel.transform(dx, dt);
    let prop = Damp4t10d::new(vel, dt, dx, config.fm, nb);

    let sources = config.source_positions().shifted(nb);
    let receivers = config.receiver_positions().shifted(nb);
    let wavelet = ricker_wavelet(nt, config.fm, dt, config.amp);

    let mut header = DatasetHeader::new(&config.shots);
    header.set("n1", config.ng);
    header.set("n2", nt);
    header.set("n3", config.ns);
    header.set("d1", config.jgx as f32 * dx);
    header.set("d2", dt);
    header.set("label1", "Lateral");
    header.set("label2", "Time");
    header.set("label3", "Shot");
    header.set("unit1", "m");
    header.set("unit2", "sec");
    header.set("amp", config.amp);
    header.set("fm", config.fm);
    header.set("nb", nb);
    header.set("szbeg", config.szbeg);
    header.set("sxbeg", config.sxbeg);
    header.set("gzbeg", config.gzbeg);
    header.set("gxbeg", config.gxbeg);
    header.set("jsx", config.jsx);
    header.set("jsz", config.jsz);
    header.set("jgx", config.jgx);
    header.set("jgz", config.jgz);
    header.set("vmin", v_lo);
    header.set("vmax", v_hi);
    header.write()?;
    io::write_floats(&header.binary_path(), &[])?;

    println!("═══ riptide forward modeling ═══");
    println!(
        "  {} shots × {} receivers, nt = {}, grid {}×{} + {}-cell sponge",
        config.ns, config.ng, nt, model.nz, model.nx, nb
    );

    let t_total = Instant::now();
    for is in 0..config.ns {
        let t_shot = Instant::now();
        let shot_src = sources.clip_range(is, is);
        let gather = forward_modeling(&prop, &shot_src, &receivers, &wavelet, nt);
        io::append_floats(&header.binary_path(), &gather)?;
        tracing::info!(
            shot = is,
            elapsed_s = t_shot.elapsed().as_secs_f64(),
            "shot modeled"
        );
    }

    println!(
        "Modeled {} shots in {:.1}s → {}",
        config.ns,
        t_total.elapsed().as_secs_f64(),
        config.shots.display()
    );
    Ok(())
}
