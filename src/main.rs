use clap::{Parser, Subcommand, ValueEnum};
use pdbf::asset::{Document, LoadOptions};
use pdbf::mesh::Mesh;
use pdbf::records::circuit::Circuit;
use pdbf::records::vehicle::{Condition, Vehicle, Wheel};
use pdbf::records::{AssetKind, Payload, TextureList};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pdbf", about = "Inspect and extract PDBF vehicle and circuit files")]
struct Cli {
    /// Fail on reads past the end of the data instead of zero-filling
    #[arg(long, global = true)]
    strict: bool,
    /// Asset kind; detected from the extension when omitted
    #[arg(long, global = true, value_enum)]
    kind: Option<KindArg>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Vehicle,
    Circuit,
}

impl From<KindArg> for AssetKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Vehicle => AssetKind::Vehicle,
            KindArg::Circuit => AssetKind::Circuit,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show key, block layout and offset table
    Info {
        input: PathBuf,
    },
    /// Write the decrypted payload
    Decrypt {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print the parsed document as JSON
    Dump {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Summarise the meshes built from every sub-object
    Mesh {
        input: PathBuf,
    },
    /// Export texture pages as PNG
    Textures {
        input: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let options = LoadOptions { strict: cli.strict, kind: cli.kind.map(AssetKind::from) };

    match cli.command {

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let raw = std::fs::read(&input)?;
            let payload = Payload::open(&raw, options.strict)?;
            let digest = blake3::hash(payload.cursor.data());

            println!("── PDBF file ────────────────────────────────────────────");
            println!("  Path           {}", input.display());
            println!("  File size      {} B", raw.len());
            println!("  Key            {:#010x}", payload.key);
            println!("  Scheme         {:?}", payload.scheme);
            println!("  Block size     {} B", payload.block_size);
            println!("  Blocks         {}", raw.len() / payload.block_size);
            println!("  Payload        {} B", payload.cursor.len());
            println!("  Stored size    {} B", payload.header.file_size);
            println!("  BLAKE3         {}", hex::encode(digest.as_bytes()));
            println!("  Offsets ({}):", payload.header.offsets.len());
            for (i, (raw_off, adj)) in payload.header.raw_offsets.iter().zip(&payload.header.offsets).enumerate() {
                println!("    [{i}] {raw_off:>10} -> {adj:>10}");
            }
        }

        // ── Decrypt ──────────────────────────────────────────────────────────
        Commands::Decrypt { input, output } => {
            let raw = std::fs::read(&input)?;
            let d = pdbf::decrypt(&raw)?;
            std::fs::write(&output, &d.data)?;
            println!("Decrypted {} blocks ({} B) to {}", d.blocks, d.data.len(), output.display());
        }

        // ── Dump ─────────────────────────────────────────────────────────────
        Commands::Dump { input, output } => {
            let doc = pdbf::load_asset_with(&input, &options)?;
            let json = serde_json::to_string_pretty(&doc)?;
            match output {
                Some(path) => std::fs::write(&path, json)?,
                None       => println!("{json}"),
            }
        }

        // ── Mesh ─────────────────────────────────────────────────────────────
        Commands::Mesh { input } => {
            match pdbf::load_asset_with(&input, &options)? {
                Document::Vehicle(v) => print_vehicle_meshes(&v)?,
                Document::Circuit(c) => print_circuit_meshes(&c)?,
            }
        }

        // ── Textures ─────────────────────────────────────────────────────────
        Commands::Textures { input, output_dir } => {
            std::fs::create_dir_all(&output_dir)?;
            let doc = pdbf::load_asset_with(&input, &options)?;
            let stem = input.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
            let mut written = 0;
            match &doc {
                Document::Vehicle(v) => {
                    if let Some(list) = &v.textures {
                        written += export_pages(list, &output_dir, &stem)?;
                    }
                }
                Document::Circuit(c) => {
                    written += export_pages(&c.textures, &output_dir, &stem)?;
                    written += export_pages(&c.background.textures, &output_dir, &format!("{stem}_background"))?;
                    written += export_pages(&c.sky.textures, &output_dir, &format!("{stem}_sky"))?;
                    for (i, d) in c.environment.decorations.iter().enumerate() {
                        written += export_pages(&d.textures, &output_dir, &format!("{stem}_decoration{i}"))?;
                    }
                }
            }
            println!("Wrote {} pages to {}", written, output_dir.display());
        }
    }

    Ok(())
}

fn print_mesh(label: &str, mesh: &Mesh) {
    println!(
        "{:<24} {:>4} groups {:>7} triangles  min {:?} max {:?}",
        label,
        mesh.groups.len(),
        mesh.triangle_count(),
        mesh.bounds.min.to_array(),
        mesh.bounds.max.to_array(),
    );
}

fn print_vehicle_meshes(v: &Vehicle) -> Result<(), Box<dyn std::error::Error>> {
    println!("Vehicle: {}", v.name);
    for (label, condition) in [("chassis (good)", Condition::Good), ("chassis (damaged)", Condition::Damaged), ("chassis (ruined)", Condition::Ruined)] {
        print_mesh(label, &v.chassis_mesh(condition)?);
    }
    for wheel in Wheel::ALL {
        print_mesh(&format!("wheel {wheel:?}"), &v.wheel_mesh(wheel)?);
    }
    for (ruined, rear) in [(false, false), (false, true), (true, false), (true, true)] {
        print_mesh(&format!("shadow ruined={ruined} rear={rear}"), &v.shadow_mesh(ruined, rear)?);
    }
    for i in 0..v.collisions.len() {
        print_mesh(&format!("collision {i}"), &v.collision_mesh(i)?);
    }
    println!("Characteristics total: {}", v.characteristics.total());
    Ok(())
}

fn print_circuit_meshes(c: &Circuit) -> Result<(), Box<dyn std::error::Error>> {
    println!("Circuit: {} ({})", c.track_name, c.project_name);
    for (i, mesh) in pdbf::perf::build_sector_meshes(c)?.iter().enumerate() {
        print_mesh(&format!("sector {i}"), mesh);
    }
    for (i, mesh) in pdbf::perf::build_decoration_meshes(c)?.iter().enumerate() {
        print_mesh(&format!("decoration {i} {}", c.environment.decorations[i].name), mesh);
    }
    Ok(())
}

fn export_pages(list: &TextureList, dir: &Path, stem: &str) -> Result<usize, Box<dyn std::error::Error>> {
    for i in 0..list.len() {
        let rgba = list.rgba(i as u32)?;
        let img = image::RgbaImage::from_raw(list.width, list.height, rgba)
            .ok_or("texture page size does not match its dimensions")?;
        let path = dir.join(format!("{stem}_{i:02}.png"));
        img.save(&path)?;
        println!("  wrote  {}", path.display());
    }
    Ok(list.len())
}
