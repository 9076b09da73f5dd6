use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use glam::{Mat4, Vec2, Vec3};

use sprig_engine::EngineContext;
use sprig_engine::asset::bake::{FontBakeSettings, bake_font};
use sprig_engine::asset::{AssetId, AssetKind, AssetRegistry, SpriteSpec, TextureSpec};
use sprig_engine::coords::{pixel_projection, rect_transform};
use sprig_engine::device::{GpuDevice, RecordingDevice, WgpuDevice, WgpuInit};
use sprig_engine::logging::{LoggingConfig, init_logging};
use sprig_engine::paint::Color;
use sprig_engine::render::{BatchConfig, BatchStats};

/// Headless tool for sprig asset registries.
#[derive(Debug, Parser)]
#[command(name = "sprig-studio", version, about)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List every registered asset.
    Inspect { registry: PathBuf },

    /// Register an image as a texture, optionally sliced into sprites.
    RegisterTexture {
        registry: PathBuf,
        image: PathBuf,
        /// Defaults to the image file stem.
        #[arg(long)]
        name: Option<String>,
        /// Sprite grid as COLUMNSxROWS, e.g. `4x2`.
        #[arg(long, value_parser = parse_grid)]
        grid: Option<[u32; 2]>,
        /// Also register one sprite per grid cell.
        #[arg(long, requires = "grid")]
        slice: bool,
    },

    /// Rasterize a TrueType font into an atlas and register it.
    BakeFont {
        registry: PathBuf,
        ttf: PathBuf,
        /// Where to write the atlas PNG.
        #[arg(long)]
        atlas: PathBuf,
        /// Pixels per em.
        #[arg(long, default_value_t = 32.0)]
        size: f32,
        #[arg(long, default_value_t = 512)]
        atlas_size: u32,
        #[arg(long)]
        name: Option<String>,
    },

    /// Render a contact sheet of every drawable asset.
    Render {
        registry: PathBuf,
        /// Output PNG (required unless --dry-run).
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, default_value_t = 1024)]
        width: u32,
        #[arg(long, default_value_t = 768)]
        height: u32,
        #[arg(long, default_value_t = BatchConfig::default().max_quads)]
        max_quads: u32,
        /// Record submissions in memory instead of using the GPU.
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(LoggingConfig::with_verbosity(cli.verbose));

    match cli.command {
        Command::Inspect { registry } => inspect(&registry),
        Command::RegisterTexture {
            registry,
            image,
            name,
            grid,
            slice,
        } => register_texture(&registry, &image, name, grid, slice),
        Command::BakeFont {
            registry,
            ttf,
            atlas,
            size,
            atlas_size,
            name,
        } => bake(&registry, &ttf, &atlas, size, atlas_size, name),
        Command::Render {
            registry,
            out,
            width,
            height,
            max_quads,
            dry_run,
        } => render(&registry, out.as_deref(), [width, height], max_quads, dry_run),
    }
}

fn parse_grid(s: &str) -> Result<[u32; 2], String> {
    let (x, y) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected COLUMNSxROWS, got `{s}`"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| format!("`{v}` is not a positive cell count"))
    };
    Ok([parse(x)?, parse(y)?])
}

// ── registry editing ──────────────────────────────────────────────────────

fn open_or_new(path: &Path) -> Result<AssetRegistry> {
    if path.exists() {
        AssetRegistry::read_from_file(path).with_context(|| format!("reading {}", path.display()))
    } else {
        log::info!("{} does not exist; starting an empty registry", path.display());
        Ok(AssetRegistry::new())
    }
}

/// `path` relative to the registry's directory when it lives below it.
fn relative_to_registry(registry: &Path, path: &Path) -> PathBuf {
    let base = registry
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    match (base.canonicalize(), path.canonicalize()) {
        (Ok(base), Ok(full)) => full
            .strip_prefix(&base)
            .map(Path::to_path_buf)
            .unwrap_or(full),
        _ => path.to_path_buf(),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_owned())
}

fn inspect(path: &Path) -> Result<()> {
    let registry =
        AssetRegistry::read_from_file(path).with_context(|| format!("reading {}", path.display()))?;

    println!("{} ({} assets)", path.display(), registry.len());
    for kind in AssetKind::ALL {
        let rows: Vec<String> = match kind {
            AssetKind::Texture => registry
                .textures()
                .map(|t| {
                    let grid = t
                        .sprite_grid()
                        .map(|[x, y]| format!("  grid {x}x{y}"))
                        .unwrap_or_default();
                    format!("{}  {}  {}{grid}", t.id, t.name, t.path.display())
                })
                .collect(),
            AssetKind::Sprite => registry
                .sprites()
                .map(|s| {
                    let parent = registry
                        .texture(s.texture)
                        .map_or("<missing texture>", |t| t.name.as_str());
                    format!("{}  {}  {parent} [{}, {}]", s.id, s.name, s.cell[0], s.cell[1])
                })
                .collect(),
            AssetKind::Shader => registry
                .shaders()
                .map(|s| {
                    format!(
                        "{}  {}  {} / {}",
                        s.id,
                        s.name,
                        s.vertex_path.display(),
                        s.fragment_path.display()
                    )
                })
                .collect(),
            AssetKind::Font => registry
                .fonts()
                .map(|f| {
                    format!(
                        "{}  {}  {}  {} glyphs @ {}px",
                        f.id,
                        f.name,
                        f.atlas_path.display(),
                        f.metrics.glyphs.len(),
                        f.metrics.em_size
                    )
                })
                .collect(),
        };

        println!("\n{kind}s: {}", rows.len());
        for row in rows {
            println!("  {row}");
        }
    }
    Ok(())
}

fn register_texture(
    registry_path: &Path,
    image_path: &Path,
    name: Option<String>,
    grid: Option<[u32; 2]>,
    slice: bool,
) -> Result<()> {
    let (w, h) = image::image_dimensions(image_path)
        .with_context(|| format!("reading {}", image_path.display()))?;
    let mut registry = open_or_new(registry_path)?;

    let name = name.unwrap_or_else(|| file_stem(image_path));
    let mut spec = TextureSpec::new(&name, relative_to_registry(registry_path, image_path));
    spec.set_sprite_grid(grid);
    let cells = spec.cell_count();
    let texture = registry.register_texture(spec);
    println!("texture {texture}  {name}  {w}x{h}");

    if slice {
        for y in 0..cells[1] {
            for x in 0..cells[0] {
                let id = registry.register_sprite(SpriteSpec::new(format!("{name}_{x}_{y}"), texture, [x, y]));
                println!("sprite  {id}  {name}_{x}_{y}");
            }
        }
    }

    registry
        .write_to_file(registry_path)
        .with_context(|| format!("writing {}", registry_path.display()))
}

fn bake(
    registry_path: &Path,
    ttf: &Path,
    atlas_path: &Path,
    px: f32,
    atlas_size: u32,
    name: Option<String>,
) -> Result<()> {
    let bytes = std::fs::read(ttf).with_context(|| format!("reading {}", ttf.display()))?;
    let settings = FontBakeSettings {
        px,
        atlas_size: [atlas_size, atlas_size],
        ..FontBakeSettings::default()
    };
    let baked = bake_font(&bytes, &settings).with_context(|| format!("baking {}", ttf.display()))?;
    baked
        .atlas
        .save(atlas_path)
        .with_context(|| format!("writing {}", atlas_path.display()))?;

    let mut registry = open_or_new(registry_path)?;
    let name = name.unwrap_or_else(|| file_stem(ttf));
    let id = registry.register_font(baked.to_spec(&name, relative_to_registry(registry_path, atlas_path)));
    println!(
        "font {id}  {name}  {} glyphs into {}",
        baked.metrics.glyphs.len(),
        atlas_path.display()
    );

    registry
        .write_to_file(registry_path)
        .with_context(|| format!("writing {}", registry_path.display()))
}

// ── rendering ─────────────────────────────────────────────────────────────

const CELL: f32 = 128.0;
const MARGIN: f32 = 8.0;
const LABEL_PX: f32 = 24.0;

fn render(
    registry: &Path,
    out: Option<&Path>,
    size: [u32; 2],
    max_quads: u32,
    dry_run: bool,
) -> Result<()> {
    let config = BatchConfig {
        max_quads,
        ..BatchConfig::default()
    };

    if dry_run {
        let mut ctx = EngineContext::from_registry_file(RecordingDevice::new(), registry, config)?;
        let stats = draw_contact_sheet(&mut ctx, size);
        report(&stats);
        log::info!(
            "dry run: {} submissions recorded, nothing written",
            ctx.device().draw_count()
        );
        return Ok(());
    }

    let Some(out) = out else {
        bail!("--out is required unless --dry-run is given");
    };

    let device = WgpuDevice::new_blocking(WgpuInit {
        target_size: size,
        ..WgpuInit::default()
    })?;
    let mut ctx = EngineContext::from_registry_file(device, registry, config)?;
    ctx.device_mut().clear(Color::from_rgba_u8(32, 36, 40, 255));

    let stats = draw_contact_sheet(&mut ctx, size);
    report(&stats);

    let image = ctx.device_mut().read_target()?;
    image
        .save(out)
        .with_context(|| format!("writing {}", out.display()))?;
    println!("wrote {}", out.display());
    Ok(())
}

fn report(stats: &BatchStats) {
    println!(
        "{} quads in {} submissions ({} slot flushes, {} capacity flushes)",
        stats.quads, stats.draw_calls, stats.slot_flushes, stats.capacity_flushes
    );
}

/// Lays every texture, sprite and font out on a grid, top-left first.
fn draw_contact_sheet<D: GpuDevice>(ctx: &mut EngineContext<D>, size: [u32; 2]) -> BatchStats {
    let registry = ctx.assets().registry();
    let ids: Vec<(AssetId, AssetKind)> = registry
        .textures()
        .map(|t| (t.id, AssetKind::Texture))
        .chain(registry.sprites().map(|s| (s.id, AssetKind::Sprite)))
        .chain(registry.fonts().map(|f| (f.id, AssetKind::Font)))
        .collect();
    let handles: Vec<_> = ids
        .iter()
        .map(|&(id, kind)| (ctx.get(id), kind))
        .collect();

    let columns = ((size[0] as f32 / CELL) as usize).max(1);
    let top = size[1] as f32;
    ctx.renderer_mut().reset_stats();

    let mut batch = ctx.batch(pixel_projection(size[0], size[1]));
    for (i, (handle, kind)) in handles.iter().enumerate() {
        let cell_min = Vec2::new(
            (i % columns) as f32 * CELL,
            top - ((i / columns) as f32 + 1.0) * CELL,
        );
        let tag = i as i32;

        batch.draw_quad(
            &rect_transform(cell_min + Vec2::splat(2.0), Vec2::splat(CELL - 4.0), 0.0),
            Color::from_rgba_u8(52, 58, 64, 255),
            tag,
        );

        let inner = CELL - 2.0 * MARGIN;
        match kind {
            AssetKind::Font => {
                let origin = cell_min + Vec2::new(MARGIN, CELL * 0.5);
                let em = Mat4::from_translation(origin.extend(0.0))
                    * Mat4::from_scale(Vec3::new(LABEL_PX, LABEL_PX, 1.0));
                batch.draw_text(&em, handle, "Aa Bb\n0123", Color::WHITE, tag);
            }
            _ => {
                let fit = handle
                    .upgrade()
                    .map(|r| r.pixel_size())
                    .filter(|s| s.x > 0.0 && s.y > 0.0)
                    .map_or(Vec2::splat(inner), |s| s * (inner / s.max_element()));
                let min = cell_min + Vec2::splat(MARGIN) + (Vec2::splat(inner) - fit) * 0.5;
                batch.draw_texture(&rect_transform(min, fit, 0.0), handle, Color::WHITE, tag);
            }
        }
    }
    batch.end();

    ctx.renderer().stats()
}
