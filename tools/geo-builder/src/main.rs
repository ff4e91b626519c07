//! geo-builder - Aion client to server geodata compiler
//!
//! # Commands
//!
//! - `geo-builder build` - Build `geo.mesh` and `<level>.geo` files
//! - `geo-builder check` - Validate the configuration and key tables
//! - `geo-builder list <pak>` - List the entries of an archive
//! - `geo-builder extract <pak> <name>` - Unpack one archive entry
//! - `geo-builder inspect <file>` - Show what a CGF/CGA file contains
//!
//! # Configuration (geobuilder.toml)
//!
//! ```toml
//! [client]
//! path = "C:/Games/Aion"
//!
//! [output]
//! path = "out"
//!
//! [[archive.keys]]
//! table = "keys/aion.bin"
//! offset_mask = 0x3FF
//! ```

use aion_cgf::{Geometry, canonicalize};
use aion_pak::PakArchive;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use geo_builder::config::{DEFAULT_CONFIG_FILE, load_material_table};
use geo_builder::{BuildOptions, GeoBuilder, GeoConfig};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "geo-builder")]
#[command(about = "Compiles Aion client levels into server geodata")]
#[command(version)]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build geo.mesh and one .geo file per level
    Build {
        /// Path to geobuilder.toml
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Client installation folder (overrides config)
        #[arg(short, long)]
        client: Option<PathBuf>,

        /// Output folder (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only build this level id
        #[arg(short, long)]
        level: Option<String>,

        /// Server world_maps.xml to use instead of the client level map
        #[arg(short, long)]
        world_maps: Option<PathBuf>,

        /// Worker threads
        #[arg(short, long)]
        threads: Option<usize>,
    },

    /// Validate config and key tables without building
    Check {
        /// Path to geobuilder.toml
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },

    /// List the entries of an archive
    List {
        /// Archive (.pak)
        pak: PathBuf,

        /// Show which key decrypts the archive
        #[arg(long)]
        keys: bool,

        /// Config providing the key tables
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },

    /// Unpack a single archive entry
    Extract {
        /// Archive (.pak)
        pak: PathBuf,

        /// Entry name as shown by `list`
        name: String,

        /// Output file (default: the entry's file name)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Config providing the key tables
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },

    /// Show nodes, materials and collision meshes of a geometry file
    Inspect {
        /// CGF or CGA file
        input: PathBuf,

        /// Material dictionary (default: built-in table)
        #[arg(short, long)]
        materials: Option<PathBuf>,

        /// Also show the state at this animation tick
        #[arg(long)]
        tick: Option<i32>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    match cli.command {
        Commands::Build {
            config,
            client,
            output,
            level,
            world_maps,
            threads,
        } => {
            let mut config = load_config(&config)?;
            if client.is_some() {
                config.client.path = client;
            }
            if let Some(output) = output {
                config.output.path = output;
            }
            if level.is_some() {
                config.build.level = level;
            }
            if world_maps.is_some() {
                config.client.world_maps = world_maps;
            }
            if threads.is_some() {
                config.build.threads = threads;
            }
            config.validate()?;

            let options = BuildOptions::from_config(&config)?;
            let builder = GeoBuilder::new(options, config.load_keys()?, config.material_table()?);
            let report = builder.run()?;
            tracing::info!("Build complete: {report}");
        }

        Commands::Check { config } => {
            tracing::info!("Checking {:?}", config);
            let config = load_config(&config)?;
            config.validate()?;
            let keys = config.load_keys()?;
            let materials = config.material_table()?;
            if let Some(client) = &config.client.path
                && !client.is_dir()
            {
                anyhow::bail!("Client path is not a folder: {}", client.display());
            }
            tracing::info!(keys = keys.len(), materials = materials.len(), "Config is valid!");
        }

        Commands::List { pak, keys, config } => {
            let archive = open_archive(&pak, &config)?;
            if keys {
                println!("key: {}", archive.key_name().unwrap_or("(none, archive is empty)"));
            }
            for entry in archive.entries() {
                println!(
                    "{:>10} {:>10} {:?} {}",
                    entry.compressed_size, entry.uncompressed_size, entry.compression, entry.name
                );
            }
            println!("{} entries", archive.len());
        }

        Commands::Extract {
            pak,
            name,
            output,
            config,
        } => {
            let archive = open_archive(&pak, &config)?;
            let data = archive
                .unpack(&name)?
                .with_context(|| format!("{} has no entry {name}", pak.display()))?;
            let output = output.unwrap_or_else(|| {
                PathBuf::from(name.rsplit('/').next().unwrap_or(name.as_str()))
            });
            std::fs::write(&output, &data)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            tracing::info!("{name} -> {:?} ({} bytes)", output, data.len());
        }

        Commands::Inspect {
            input,
            materials,
            tick,
        } => {
            let table = match materials {
                Some(path) => load_material_table(&path)?,
                None => aion_cgf::MaterialTable::builtin(),
            };
            let data = std::fs::read(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let geometry = Geometry::load(&data, &table)
                .with_context(|| format!("Failed to decode {}", input.display()))?;
            print_geometry(&geometry);
            if let Some(tick) = tick {
                println!("\n--- tick {tick} ---");
                print_geometry(&geometry.snapshot_at_tick(tick)?);
            }
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<GeoConfig> {
    GeoConfig::load(path)
}

fn open_archive(pak: &Path, config: &Path) -> Result<PakArchive> {
    let keys = load_config(config)?.load_keys()?;
    PakArchive::open(pak, &keys).with_context(|| format!("Failed to open {}", pak.display()))
}

fn print_geometry(geometry: &Geometry) {
    println!(
        "{} chunks, {} nodes, {} bones",
        geometry.chunks().len(),
        geometry.nodes().len(),
        geometry.bones().len()
    );

    println!("materials:");
    for (index, material) in geometry.materials() {
        println!(
            "  [{index}] {} id={} collideable={} semantic={:?}",
            material.name, material.id, material.collideable, material.semantic_id
        );
    }

    println!("nodes:");
    for (index, node) in geometry.nodes().iter().enumerate() {
        println!(
            "  [{index}] {} parent={} children={} collideable={}",
            node.name,
            node.parent_id,
            node.children.len(),
            geometry.is_collideable(index)
        );
    }

    let mut slots = geometry.traverse();
    canonicalize(&mut slots);
    println!("collision slots:");
    for slot in &slots {
        println!(
            "  material={} intention={:?} vertices={} faces={}",
            slot.material_id,
            slot.intention,
            slot.vertices.len(),
            slot.faces.len()
        );
    }
}
