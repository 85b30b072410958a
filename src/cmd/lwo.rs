use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use argh::FromArgs;
use lwolib::{
    format::lwo::{dump_chunks, load, ChunkNode, ImportOptions},
    scene::{Clip, Layer, Scene, Surface, DEFAULT_ALPHA_CHANNEL_NAME},
    util::file::map_file,
};

#[derive(FromArgs, PartialEq, Debug)]
/// process LWO files
#[argh(subcommand, name = "lwo")]
pub struct Args {
    #[argh(subcommand)]
    command: SubCommand,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
enum SubCommand {
    Info(InfoArgs),
    Dump(DumpArgs),
    Export(ExportArgs),
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// prints a summary of an LWO file
#[argh(subcommand, name = "info")]
pub struct InfoArgs {
    #[argh(positional)]
    /// input LWO
    input: PathBuf,
    #[argh(switch)]
    /// read layers flagged as hidden
    load_hidden: bool,
    #[argh(switch)]
    /// ignore skelegon name and roll tags
    no_skelegons: bool,
    #[argh(option, default = "DEFAULT_ALPHA_CHANNEL_NAME.to_owned()")]
    /// color map receiving RGBA alpha channels
    alpha_name: String,
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// prints the chunk layout of an LWO file
#[argh(subcommand, name = "dump")]
pub struct DumpArgs {
    #[argh(positional)]
    /// input LWO
    input: PathBuf,
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// writes the decoded scene as JSON
#[argh(subcommand, name = "export")]
pub struct ExportArgs {
    #[argh(positional)]
    /// input LWO
    input: PathBuf,
    #[argh(positional)]
    /// output JSON
    output: PathBuf,
    #[argh(switch)]
    /// read layers flagged as hidden
    load_hidden: bool,
    #[argh(switch)]
    /// ignore skelegon name and roll tags
    no_skelegons: bool,
    #[argh(option, default = "DEFAULT_ALPHA_CHANNEL_NAME.to_owned()")]
    /// color map receiving RGBA alpha channels
    alpha_name: String,
}

pub fn run(args: Args) -> Result<()> {
    match args.command {
        SubCommand::Info(c_args) => info(c_args),
        SubCommand::Dump(c_args) => dump(c_args),
        SubCommand::Export(c_args) => export(c_args),
    }
}

fn import_options(load_hidden: bool, no_skelegons: bool, alpha_name: &str) -> ImportOptions {
    ImportOptions {
        load_hidden,
        import_skelegons: !no_skelegons,
        alpha_channel_name: alpha_name.to_owned(),
        ..Default::default()
    }
}

/// First candidate path of `clip` that exists on disk.
fn resolve_clip(clip: &Clip) -> Option<&str> {
    clip.candidates().into_iter().find(|p| Path::new(p).exists())
}

fn log_layer(layer: &Layer, scene: &Scene) {
    log::info!("Layer {} {:?}", layer.index, layer.name);
    if let Some(parent) = scene.layer_parent(layer) {
        log::info!("  Parent: {} {:?}", parent.index, parent.name);
    }
    log::info!(
        "  Points: {}, polygons: {}{}",
        layer.points.len(),
        layer.polygons.len(),
        if layer.has_subds { " (subdivision)" } else { "" }
    );
    let names = |keys: Vec<&String>| keys.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ");
    if !layer.uv_maps.is_empty() || !layer.discontinuous_uv_maps.is_empty() {
        let mut keys = layer.uv_maps.keys().collect::<Vec<_>>();
        keys.extend(layer.discontinuous_uv_maps.keys().filter(|k| !layer.uv_maps.contains_key(*k)));
        log::info!("  UV maps: {}", names(keys));
    }
    if !layer.weight_maps.is_empty() {
        log::info!("  Weight maps: {}", names(layer.weight_maps.keys().collect()));
    }
    if !layer.color_maps.is_empty() {
        log::info!("  Color maps: {}", names(layer.color_maps.keys().collect()));
    }
    if !layer.morphs.is_empty() {
        log::info!("  Morphs: {}", names(layer.morphs.keys().collect()));
    }
    if !layer.edge_weights.is_empty() {
        log::info!("  Edge weights: {}", layer.edge_weights.len());
    }
    for (tag, polygons) in &layer.surface_tags {
        let surface = scene.surface_for_tag(*tag).map(|s| s.name.as_str()).unwrap_or("?");
        log::info!("  Surface {tag} ({surface}): {} polygon(s)", polygons.len());
    }
    let bones = layer.skeleton();
    if !bones.is_empty() {
        log::info!("  Bones: {}", bones.len());
        for bone in &bones {
            let parent = bone.parent.map(|p| bones[p].name.as_str()).unwrap_or("-");
            log::info!("    {} (parent {parent})", bone.name);
        }
    }
}

fn log_surface(surface: &Surface, scene: &Scene) {
    log::info!("Surface {:?}", surface.name);
    log::info!(
        "  Color: {:?}, diffuse {}, specular {}, glossiness {}",
        surface.color,
        surface.diffuse,
        surface.specular,
        surface.glossiness
    );
    log::info!("  Smooth: {}, double sided: {}", surface.smooth, surface.double_sided());
    for texture in &surface.textures {
        let path = scene
            .clips
            .get(&texture.clip_id)
            .map(|clip| resolve_clip(clip).unwrap_or("(missing)"))
            .unwrap_or("(no clip)");
        let projection = texture
            .projection_mode()
            .map(|p| p.to_string())
            .unwrap_or_else(|| texture.projection.to_string());
        log::info!(
            "  Texture {} [{}]: {} on {:?}, opacity {}",
            texture.ord_seq_ix,
            projection,
            path,
            texture.uv_map,
            texture.opacity
        );
    }
    for texture in &surface.legacy_textures {
        let slot = texture.slot.map(|s| s.to_string()).unwrap_or_else(|| "-".to_owned());
        log::info!("  Texture [{slot}]: {}", texture.path);
    }
}

fn info(args: InfoArgs) -> Result<()> {
    let options = import_options(args.load_hidden, args.no_skelegons, &args.alpha_name);
    let scene = load(&args.input, &options)?;
    log::info!("Format: {:?}", scene.format);
    for layer in &scene.layers {
        log_layer(layer, &scene);
    }
    for surface in scene.surfaces.values() {
        log_surface(surface, &scene);
    }
    for clip in scene.clips.values() {
        match resolve_clip(clip) {
            Some(path) => log::info!("Clip {}: {}", clip.id, path),
            None => {
                log::warn!("Clip {}: not found ({} or {})", clip.id, clip.path, clip.relative_path)
            }
        }
    }
    log::info!("Tags: {}", scene.tags.join(", "));
    Ok(())
}

fn log_node(node: &ChunkNode, depth: usize) {
    log::info!("{:indent$}{} ({} bytes)", "", node.id, node.size, indent = depth * 2);
    for child in &node.children {
        log_node(child, depth + 1);
    }
}

fn dump(args: DumpArgs) -> Result<()> {
    let data = map_file(&args.input)?;
    let tree = dump_chunks(&data)
        .with_context(|| format!("Failed to read '{}'", args.input.display()))?;
    log::info!("Format: {}", tree.format);
    for node in &tree.chunks {
        log_node(node, 0);
    }
    Ok(())
}

fn export(args: ExportArgs) -> Result<()> {
    let options = import_options(args.load_hidden, args.no_skelegons, &args.alpha_name);
    let scene = load(&args.input, &options)?;
    let mut file = BufWriter::new(
        File::create(&args.output)
            .with_context(|| format!("Failed to create output file '{}'", args.output.display()))?,
    );
    log::info!("Writing {}", args.output.display());
    serde_json::to_writer_pretty(&mut file, &scene)?;
    file.flush()?;
    Ok(())
}
