/// End-to-end scene pipeline tests: JSON documents with external and inline
/// resources, loaded and saved through temporary directories.
use std::fs;
use std::path::Path;

use scene_pipeline::{
    LineEnd, SceneData, ShapeData, TextureData, load_scene, make_scene_directories, save_scene,
    save_shape, save_texture,
};
use tempfile::TempDir;

fn write_scene_document(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

fn sample_mesh() -> ShapeData {
    ShapeData {
        triangles: vec![[0, 1, 2]],
        positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        normals: vec![[0.0, 0.0, 1.0]; 3],
        ..ShapeData::default()
    }
}

fn sample_texture() -> TextureData {
    TextureData {
        width: 2,
        height: 1,
        linear: false,
        pixelsf: Vec::new(),
        pixelsb: vec![[10, 20, 30, 255], [200, 100, 50, 255]],
    }
}

#[test]
fn scene_survives_a_full_round_trip() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir(tmp.path().join("shapes")).unwrap();
    fs::create_dir(tmp.path().join("textures")).unwrap();
    save_shape(&tmp.path().join("shapes/mesh.ply"), &sample_mesh()).unwrap();
    save_texture(&tmp.path().join("textures/checker.png"), &sample_texture()).unwrap();

    let input = write_scene_document(
        tmp.path(),
        "scene.json",
        r#"{
            "asset": { "version": "4.2", "copyright": "test scene" },
            "cameras": [ { "name": "main", "lens": 0.085 } ],
            "textures": [ { "name": "checker", "uri": "textures/checker.png" } ],
            "materials": [
                { "name": "paint", "type": "glossy", "color": [0.8, 0.1, 0.1], "color_tex": 0 }
            ],
            "shapes": [
                { "name": "mesh", "uri": "shapes/mesh.ply" },
                { "type": "line",
                  "position1": [0.0, 0.0, 0.0], "position2": [0.0, 1.0, 0.0],
                  "radius1": 0.01, "radius2": 0.02, "arrow2": true },
                { "type": "triangle",
                  "position1": [0.0, 0.0, 0.0], "position2": [1.0, 0.0, 0.0],
                  "position3": [0.0, 1.0, 0.0] }
            ],
            "instances": [
                { "name": "mesh", "shape": 0, "material": 0 },
                { "shape": 1 },
                { "shape": 2 }
            ]
        }"#,
    );

    let scene = load_scene(&input, false).unwrap();
    assert_eq!(scene.copyright, "test scene");
    assert_eq!(scene.cameras.len(), 1);
    assert_eq!(scene.cameras[0].lens, 0.085);
    assert_eq!(scene.shapes[0].triangles, vec![[0, 1, 2]]);
    assert_eq!(scene.shapes[1].ends, vec![LineEnd::Cap, LineEnd::Arrow]);
    assert_eq!(scene.textures[0].pixelsb.len(), 2);
    assert_eq!(scene.instances[1].material, -1);

    let output = tmp.path().join("out").join("scene.json");
    make_scene_directories(&output, &scene).unwrap();
    save_scene(&output, &scene, false).unwrap();

    let reloaded = load_scene(&output, false).unwrap();
    assert_eq!(reloaded, scene);
}

#[test]
fn noparallel_load_matches_parallel_load() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir(tmp.path().join("shapes")).unwrap();
    save_shape(&tmp.path().join("shapes/mesh.ply"), &sample_mesh()).unwrap();
    let input = write_scene_document(
        tmp.path(),
        "scene.json",
        r#"{
            "asset": { "version": "5.0" },
            "shapes": [
                { "uri": "shapes/mesh.ply" },
                { "type": "point", "position": [1.0, 2.0, 3.0], "radius": 0.5 }
            ]
        }"#,
    );
    let parallel = load_scene(&input, false).unwrap();
    let sequential = load_scene(&input, true).unwrap();
    assert_eq!(parallel, sequential);
}

#[test]
fn empty_scene_gains_a_camera_and_no_subdirectories() {
    let tmp = TempDir::new().unwrap();
    let input = write_scene_document(tmp.path(), "empty.json", r#"{ "asset": { "version": "4.2" } }"#);

    let scene = load_scene(&input, false).unwrap();
    assert_eq!(scene.cameras.len(), 1);
    assert_eq!(scene.camera_names, vec!["camera".to_string()]);
    assert!(scene.shapes.is_empty());

    let output = tmp.path().join("out").join("empty.json");
    make_scene_directories(&output, &scene).unwrap();
    save_scene(&output, &scene, false).unwrap();
    assert!(output.exists());
    assert!(!output.parent().unwrap().join("shapes").exists());
    assert!(!output.parent().unwrap().join("textures").exists());
}

#[test]
fn fixups_fill_radius_and_caps_for_uri_shapes() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir(tmp.path().join("shapes")).unwrap();
    let bare_line = ShapeData {
        lines: vec![[0, 1]],
        positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
        ..ShapeData::default()
    };
    save_shape(&tmp.path().join("shapes/wire.ply"), &bare_line).unwrap();
    let input = write_scene_document(
        tmp.path(),
        "scene.json",
        r#"{
            "asset": { "version": "4.2" },
            "shapes": [ { "uri": "shapes/wire.ply", "border_size": 0.25 } ]
        }"#,
    );

    let scene = load_scene(&input, false).unwrap();
    assert_eq!(scene.shapes[0].radius, vec![0.001, 0.001]);
    assert_eq!(scene.shapes[0].ends, vec![LineEnd::Cap, LineEnd::Cap]);
    assert_eq!(scene.shapes[0].border_radius, 0.25);
}

#[test]
fn missing_shape_file_reports_both_paths() {
    let tmp = TempDir::new().unwrap();
    let input = write_scene_document(
        tmp.path(),
        "scene.json",
        r#"{
            "asset": { "version": "4.2" },
            "shapes": [ { "uri": "shapes/missing.ply" } ]
        }"#,
    );
    let error = load_scene(&input, false).unwrap_err().to_string();
    assert!(error.contains("cannot load"));
    assert!(error.contains("scene.json"));
    assert!(error.contains("since"));
    assert!(error.contains("missing.ply"));
}

#[test]
fn unsupported_versions_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let old = write_scene_document(tmp.path(), "old.json", r#"{ "asset": { "version": "3.1" } }"#);
    let error = load_scene(&old, false).unwrap_err().to_string();
    assert!(error.contains("unsupported version"));

    let bare = write_scene_document(tmp.path(), "bare.json", r#"{ "cameras": [] }"#);
    let error = load_scene(&bare, false).unwrap_err().to_string();
    assert!(error.contains("unsupported version"));
}

#[test]
fn non_json_documents_are_rejected() {
    let error = load_scene(Path::new("scene.yaml"), false)
        .unwrap_err()
        .to_string();
    assert!(error.contains("unsupported format"));
    let error = save_scene(Path::new("scene.yaml"), &SceneData::default(), false)
        .unwrap_err()
        .to_string();
    assert!(error.contains("unsupported format"));
}

#[test]
fn unnamed_resources_save_under_indexed_filenames() {
    let tmp = TempDir::new().unwrap();
    let input = write_scene_document(
        tmp.path(),
        "scene.json",
        r#"{
            "asset": { "version": "4.2" },
            "shapes": [
                { "type": "point", "position": [0.0, 0.0, 0.0], "radius": 0.1 },
                { "type": "point", "position": [1.0, 0.0, 0.0], "radius": 0.1 }
            ]
        }"#,
    );
    let scene = load_scene(&input, false).unwrap();

    let output = tmp.path().join("out").join("scene.json");
    make_scene_directories(&output, &scene).unwrap();
    save_scene(&output, &scene, false).unwrap();

    let out_dir = output.parent().unwrap();
    assert!(out_dir.join("shapes/shape0.ply").exists());
    assert!(out_dir.join("shapes/shape1.ply").exists());
    let text = fs::read_to_string(&output).unwrap();
    assert!(text.contains("shapes/shape1.ply"));
}

#[test]
fn hdr_textures_save_with_an_hdr_extension() {
    let tmp = TempDir::new().unwrap();
    let mut scene = SceneData::default();
    scene.textures.push(TextureData {
        width: 1,
        height: 1,
        linear: true,
        pixelsf: vec![[2.0, 1.0, 0.5, 1.0]],
        pixelsb: Vec::new(),
    });
    scene.texture_names.push("env".to_string());

    let output = tmp.path().join("out").join("scene.json");
    make_scene_directories(&output, &scene).unwrap();
    save_scene(&output, &scene, false).unwrap();

    let out_dir = output.parent().unwrap();
    assert!(out_dir.join("textures/env.hdr").exists());
    let text = fs::read_to_string(&output).unwrap();
    assert!(text.contains("textures/env.hdr"));
}

#[test]
fn failed_resource_save_leaves_the_document_behind() {
    let tmp = TempDir::new().unwrap();
    let input = write_scene_document(
        tmp.path(),
        "scene.json",
        r#"{
            "asset": { "version": "4.2" },
            "shapes": [ { "type": "point", "position": [0.0, 0.0, 0.0], "radius": 0.1 } ]
        }"#,
    );
    let scene = load_scene(&input, false).unwrap();

    let out_dir = tmp.path().join("out");
    fs::create_dir(&out_dir).unwrap();
    // A file squatting on the shapes directory name.
    fs::write(out_dir.join("shapes"), "not a directory").unwrap();

    let output = out_dir.join("scene.json");
    make_scene_directories(&output, &scene).unwrap();
    let error = save_scene(&output, &scene, false).unwrap_err().to_string();
    assert!(error.contains("cannot save"));
    assert!(error.contains("since"));
    // No rollback: the document itself was written before the failure.
    assert!(output.exists());
}
