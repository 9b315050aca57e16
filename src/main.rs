/// Scene pipeline main entry point: load a scene document, run the fix-up
/// pass, and save it with all of its resources to a new location.
use std::env;
use std::path::Path;

use scene_pipeline::{load_scene, make_scene_directories, save_scene};

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args: Vec<String> = env::args().collect();
    let (paths, flags): (Vec<&String>, Vec<&String>) =
        args[1..].iter().partition(|arg| !arg.starts_with("--"));
    if paths.len() != 2 || flags.iter().any(|flag| flag.as_str() != "--noparallel") {
        eprintln!("Usage: {} <input.json> <output.json> [--noparallel]", args[0]);
        std::process::exit(1);
    }
    let noparallel = !flags.is_empty();

    let input = Path::new(paths[0]);
    let output = Path::new(paths[1]);

    let scene = load_scene(input, noparallel)?;
    println!(
        "loaded {}: {} cameras, {} shapes, {} textures, {} materials, {} instances",
        input.display(),
        scene.cameras.len(),
        scene.shapes.len(),
        scene.textures.len(),
        scene.materials.len(),
        scene.instances.len()
    );

    make_scene_directories(output, &scene)?;
    save_scene(output, &scene, noparallel)?;
    println!("saved {}", output.display());

    Ok(())
}
