mod config;
mod readout;

use std::{
    error::Error,
    path::{Path, PathBuf},
    process::ExitCode,
};

use bf2::{collision::CollisionMesh, mesh::AnyVisibleMesh};
use clap::Parser;
use config::Config;

/// Prints the contents of a BF2 mesh file and optionally writes it back out.
#[derive(Debug, PartialEq, Parser)]
#[command(name = "bf2-readout")]
#[command(version)]
struct Args {
    /// `.staticmesh`, `.bundledmesh`, `.skinnedmesh` or `.collisionmesh` file
    input: PathBuf,

    /// Re-encode the mesh to this file
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Settings file, `conf.ini` in the working directory if present
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn is_collision_mesh(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| CollisionMesh::EXTENSION[1..].eq_ignore_ascii_case(e))
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None if Path::new("conf.ini").exists() => Config::load(Path::new("conf.ini"))?,
        None => Config::default(),
    };
    log::debug!("{config:?}");

    if is_collision_mesh(&args.input) {
        let mesh = CollisionMesh::load(&args.input)?;
        readout::collision(&mesh);
        if let Some(out) = &args.out {
            mesh.save(out, &config.collision_options())?;
            log::info!("wrote {}", out.display());
        }
    } else {
        let mesh = AnyVisibleMesh::load(&args.input)?;
        readout::visible(&mesh);
        if let Some(out) = &args.out {
            mesh.save(out, &config.mesh_options())?;
            log::info!("wrote {}", out.display());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}: {e}", args.input.display());
            ExitCode::FAILURE
        }
    }
}
