/// Scene document IO: JSON parsing, dependent resource loading/saving, and
/// the post-load fix-up pass.
///
/// A scene document lists cameras, textures, materials, shapes, and
/// instances. Shapes are either inline primitives (point, line, triangle,
/// quad) or references to external mesh files; textures always reference
/// external image files. Resources load and save through the bounded worker
/// pool unless `noparallel` asks for sequential execution.
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::parallel::{parallel_for, parallel_foreach};
use crate::scene::{
    CameraData, InstanceData, LineEnd, MaterialData, MaterialType, SceneData, ShapeData,
    TextureData, add_missing_camera, add_missing_caps, add_missing_radius, trim_memory,
};
use crate::{Error, Result, paths, shape_io, texture_io};

const GENERATOR: &str = "scene-pipeline";
const VERSION: &str = "4.2";

/// Load a scene, dispatching on the file extension.
pub fn load_scene(filename: &Path, noparallel: bool) -> Result<SceneData> {
    match paths::extension(filename).as_str() {
        "json" => load_json_scene(filename, noparallel),
        _ => Err(format!("unsupported format {}", filename.display()).into()),
    }
}

/// Save a scene, dispatching on the file extension.
pub fn save_scene(filename: &Path, scene: &SceneData, noparallel: bool) -> Result<()> {
    match paths::extension(filename).as_str() {
        "json" => save_json_scene(filename, scene, noparallel),
        _ => Err(format!("unsupported format {}", filename.display()).into()),
    }
}

/// Create the output directory plus the shapes/ and textures/ subdirectories
/// the saved scene will write into. Subdirectories are only created when the
/// scene has elements of that kind.
pub fn make_scene_directories(filename: &Path, scene: &SceneData) -> Result<()> {
    let dirname = filename.parent().unwrap_or(Path::new(""));
    paths::make_directory(dirname)?;
    if !scene.shapes.is_empty() {
        paths::make_directory(&dirname.join("shapes"))?;
    }
    if !scene.textures.is_empty() {
        paths::make_directory(&dirname.join("textures"))?;
    }
    Ok(())
}

// Document mirror of the scene aggregate. Every field is optional on read;
// on write, fields matching their element's default are omitted.

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct SceneDocument {
    asset: AssetSection,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cameras: Vec<CameraEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    textures: Vec<TextureEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    materials: Vec<MaterialEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    shapes: Vec<ShapeEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    instances: Vec<InstanceEntry>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct AssetSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    copyright: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct CameraEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frame: Option<[f32; 12]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    orthographic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lens: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aspect: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    film: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    focus: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aperture: Option<f32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct TextureEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uri: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct MaterialEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<MaterialType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    emission: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metallic: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    roughness: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ior: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trdepth: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scattering: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scanisotropy: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    opacity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    emission_tex: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color_tex: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    roughness_tex: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scattering_tex: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    normal_tex: Option<i32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ShapeEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    border_size: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    radius: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    position1: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    position2: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    position3: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    position4: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    radius1: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    radius2: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    arrow1: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    arrow2: Option<bool>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct InstanceEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frame: Option<[f32; 12]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shape: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    material: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    border_material: Option<i32>,
}

/// Where a shape's geometry comes from: the document itself, or an external
/// mesh file whose border size is spliced in after loading.
enum ShapeSource {
    Inline,
    Uri { uri: String, border_radius: f32 },
}

fn line_end(arrow: Option<bool>) -> LineEnd {
    if arrow.unwrap_or(false) {
        LineEnd::Arrow
    } else {
        LineEnd::Cap
    }
}

fn shape_from_entry(entry: &ShapeEntry) -> (ShapeData, ShapeSource) {
    match entry.kind.as_deref() {
        Some("point") => (
            ShapeData {
                points: vec![0],
                positions: vec![entry.position.unwrap_or_default()],
                radius: vec![entry.radius.unwrap_or_default()],
                ..ShapeData::default()
            },
            ShapeSource::Inline,
        ),
        Some("line") => (
            ShapeData {
                lines: vec![[0, 1]],
                positions: vec![
                    entry.position1.unwrap_or_default(),
                    entry.position2.unwrap_or_default(),
                ],
                radius: vec![
                    entry.radius1.unwrap_or_default(),
                    entry.radius2.unwrap_or_default(),
                ],
                ends: vec![line_end(entry.arrow1), line_end(entry.arrow2)],
                ..ShapeData::default()
            },
            ShapeSource::Inline,
        ),
        Some("triangle") => (
            ShapeData {
                triangles: vec![[0, 1, 2]],
                positions: vec![
                    entry.position1.unwrap_or_default(),
                    entry.position2.unwrap_or_default(),
                    entry.position3.unwrap_or_default(),
                ],
                border_radius: entry.border_size.unwrap_or_default(),
                ..ShapeData::default()
            },
            ShapeSource::Inline,
        ),
        Some("quad") => (
            ShapeData {
                quads: vec![[0, 1, 2, 3]],
                positions: vec![
                    entry.position1.unwrap_or_default(),
                    entry.position2.unwrap_or_default(),
                    entry.position3.unwrap_or_default(),
                    entry.position4.unwrap_or_default(),
                ],
                border_radius: entry.border_size.unwrap_or_default(),
                ..ShapeData::default()
            },
            ShapeSource::Inline,
        ),
        _ => (
            ShapeData::default(),
            ShapeSource::Uri {
                uri: entry.uri.clone().unwrap_or_default(),
                border_radius: entry.border_size.unwrap_or_default(),
            },
        ),
    }
}

fn dependent_error(action: &str, filename: &Path, cause: Error) -> Error {
    format!("cannot {action} {} since {cause}", filename.display()).into()
}

fn load_json_scene(filename: &Path, noparallel: bool) -> Result<SceneData> {
    let text = fs::read_to_string(filename)
        .map_err(|_| format!("cannot open {}", filename.display()))?;
    let document: SceneDocument = serde_json::from_str(&text)
        .map_err(|_| format!("cannot parse {}", filename.display()))?;

    if !matches!(document.asset.version.as_deref(), Some("4.2") | Some("5.0")) {
        return Err(format!("unsupported version {}", filename.display()).into());
    }

    let mut scene = SceneData {
        copyright: document.asset.copyright.clone().unwrap_or_default(),
        ..SceneData::default()
    };

    for entry in &document.cameras {
        let default = CameraData::default();
        scene.camera_names.push(entry.name.clone().unwrap_or_default());
        scene.cameras.push(CameraData {
            frame: entry.frame.unwrap_or(default.frame),
            orthographic: entry.orthographic.unwrap_or(default.orthographic),
            lens: entry.lens.unwrap_or(default.lens),
            aspect: entry.aspect.unwrap_or(default.aspect),
            film: entry.film.unwrap_or(default.film),
            focus: entry.focus.unwrap_or(default.focus),
            aperture: entry.aperture.unwrap_or(default.aperture),
        });
    }

    let mut texture_uris = Vec::with_capacity(document.textures.len());
    for entry in &document.textures {
        scene.texture_names.push(entry.name.clone().unwrap_or_default());
        scene.textures.push(TextureData::default());
        texture_uris.push(entry.uri.clone().unwrap_or_default());
    }

    for entry in &document.materials {
        let default = MaterialData::default();
        scene.material_names.push(entry.name.clone().unwrap_or_default());
        scene.materials.push(MaterialData {
            kind: entry.kind.unwrap_or(default.kind),
            emission: entry.emission.unwrap_or(default.emission),
            color: entry.color.unwrap_or(default.color),
            metallic: entry.metallic.unwrap_or(default.metallic),
            roughness: entry.roughness.unwrap_or(default.roughness),
            ior: entry.ior.unwrap_or(default.ior),
            trdepth: entry.trdepth.unwrap_or(default.trdepth),
            scattering: entry.scattering.unwrap_or(default.scattering),
            scanisotropy: entry.scanisotropy.unwrap_or(default.scanisotropy),
            opacity: entry.opacity.unwrap_or(default.opacity),
            emission_tex: entry.emission_tex.unwrap_or(default.emission_tex),
            color_tex: entry.color_tex.unwrap_or(default.color_tex),
            roughness_tex: entry.roughness_tex.unwrap_or(default.roughness_tex),
            scattering_tex: entry.scattering_tex.unwrap_or(default.scattering_tex),
            normal_tex: entry.normal_tex.unwrap_or(default.normal_tex),
        });
    }

    let mut shape_sources = Vec::with_capacity(document.shapes.len());
    for entry in &document.shapes {
        let (shape, source) = shape_from_entry(entry);
        scene.shape_names.push(entry.name.clone().unwrap_or_default());
        scene.shapes.push(shape);
        shape_sources.push(source);
    }

    for entry in &document.instances {
        let default = InstanceData::default();
        scene.instance_names.push(entry.name.clone().unwrap_or_default());
        scene.instances.push(InstanceData {
            frame: entry.frame.unwrap_or(default.frame),
            shape: entry.shape.unwrap_or(default.shape),
            material: entry.material.unwrap_or(default.material),
            border_material: entry.border_material.unwrap_or(default.border_material),
        });
    }

    // Load external resources, shapes first then textures.
    let dirname = filename.parent().unwrap_or(Path::new("")).to_path_buf();
    if noparallel {
        for (shape, source) in scene.shapes.iter_mut().zip(&shape_sources) {
            load_shape_source(shape, source, &dirname)
                .map_err(|cause| dependent_error("load", filename, cause))?;
        }
        for (texture, uri) in scene.textures.iter_mut().zip(&texture_uris) {
            *texture = texture_io::load_texture(&dirname.join(uri))
                .map_err(|cause| dependent_error("load", filename, cause))?;
        }
    } else {
        let mut shape_work: Vec<(&mut ShapeData, &ShapeSource)> =
            scene.shapes.iter_mut().zip(shape_sources.iter()).collect();
        parallel_foreach(&mut shape_work, |(shape, source)| {
            load_shape_source(shape, source, &dirname)
        })
        .map_err(|cause| dependent_error("load", filename, cause))?;

        let mut texture_work: Vec<(&mut TextureData, &String)> =
            scene.textures.iter_mut().zip(texture_uris.iter()).collect();
        parallel_foreach(&mut texture_work, |(texture, uri)| {
            **texture = texture_io::load_texture(&dirname.join(uri.as_str()))?;
            Ok(())
        })
        .map_err(|cause| dependent_error("load", filename, cause))?;
    }

    // Fix up the loaded scene.
    add_missing_camera(&mut scene);
    add_missing_radius(&mut scene);
    add_missing_caps(&mut scene);
    trim_memory(&mut scene);

    Ok(scene)
}

fn load_shape_source(shape: &mut ShapeData, source: &ShapeSource, dirname: &Path) -> Result<()> {
    if let ShapeSource::Uri { uri, border_radius } = source {
        *shape = shape_io::load_shape(&dirname.join(uri))?;
        shape.border_radius = *border_radius;
    }
    Ok(())
}

/// Filename an external resource saves to: the element's name when it has
/// one, otherwise a deterministic name from its index.
fn resource_filename(names: &[String], index: usize, basename: &str, extension: &str) -> String {
    match names.get(index) {
        Some(name) if !name.is_empty() => format!("{basename}s/{name}{extension}"),
        _ => format!("{basename}s/{basename}{index}{extension}"),
    }
}

fn nonempty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

fn sparse<T: PartialEq>(value: T, default: T) -> Option<T> {
    if value == default { None } else { Some(value) }
}

fn save_json_scene(filename: &Path, scene: &SceneData, noparallel: bool) -> Result<()> {
    let shape_filenames: Vec<String> = (0..scene.shapes.len())
        .map(|index| resource_filename(&scene.shape_names, index, "shape", ".ply"))
        .collect();
    let texture_filenames: Vec<String> = (0..scene.textures.len())
        .map(|index| {
            let extension = if scene.textures[index].pixelsf.is_empty() {
                ".png"
            } else {
                ".hdr"
            };
            resource_filename(&scene.texture_names, index, "texture", extension)
        })
        .collect();

    let name_of = |names: &[String], index: usize| -> Option<String> {
        nonempty(names.get(index).cloned().unwrap_or_default())
    };

    let document = SceneDocument {
        asset: AssetSection {
            copyright: nonempty(scene.copyright.clone()),
            generator: Some(GENERATOR.to_string()),
            version: Some(VERSION.to_string()),
        },
        cameras: scene
            .cameras
            .iter()
            .enumerate()
            .map(|(index, camera)| {
                let default = CameraData::default();
                CameraEntry {
                    name: name_of(&scene.camera_names, index),
                    frame: sparse(camera.frame, default.frame),
                    orthographic: sparse(camera.orthographic, default.orthographic),
                    lens: sparse(camera.lens, default.lens),
                    aspect: sparse(camera.aspect, default.aspect),
                    film: sparse(camera.film, default.film),
                    focus: sparse(camera.focus, default.focus),
                    aperture: sparse(camera.aperture, default.aperture),
                }
            })
            .collect(),
        textures: scene
            .textures
            .iter()
            .enumerate()
            .map(|(index, _)| TextureEntry {
                name: name_of(&scene.texture_names, index),
                uri: Some(texture_filenames[index].clone()),
            })
            .collect(),
        materials: scene
            .materials
            .iter()
            .enumerate()
            .map(|(index, material)| {
                let default = MaterialData::default();
                MaterialEntry {
                    name: name_of(&scene.material_names, index),
                    kind: sparse(material.kind, default.kind),
                    emission: sparse(material.emission, default.emission),
                    color: sparse(material.color, default.color),
                    metallic: sparse(material.metallic, default.metallic),
                    roughness: sparse(material.roughness, default.roughness),
                    ior: sparse(material.ior, default.ior),
                    trdepth: sparse(material.trdepth, default.trdepth),
                    scattering: sparse(material.scattering, default.scattering),
                    scanisotropy: sparse(material.scanisotropy, default.scanisotropy),
                    opacity: sparse(material.opacity, default.opacity),
                    emission_tex: sparse(material.emission_tex, default.emission_tex),
                    color_tex: sparse(material.color_tex, default.color_tex),
                    roughness_tex: sparse(material.roughness_tex, default.roughness_tex),
                    scattering_tex: sparse(material.scattering_tex, default.scattering_tex),
                    normal_tex: sparse(material.normal_tex, default.normal_tex),
                }
            })
            .collect(),
        shapes: scene
            .shapes
            .iter()
            .enumerate()
            .map(|(index, _)| ShapeEntry {
                name: name_of(&scene.shape_names, index),
                uri: Some(shape_filenames[index].clone()),
                ..ShapeEntry::default()
            })
            .collect(),
        instances: scene
            .instances
            .iter()
            .enumerate()
            .map(|(index, instance)| {
                let default = InstanceData::default();
                InstanceEntry {
                    name: name_of(&scene.instance_names, index),
                    frame: sparse(instance.frame, default.frame),
                    shape: sparse(instance.shape, default.shape),
                    material: sparse(instance.material, default.material),
                    border_material: sparse(instance.border_material, default.border_material),
                }
            })
            .collect(),
    };

    make_scene_directories(filename, scene)?;
    let text = serde_json::to_string_pretty(&document)
        .map_err(|_| format!("cannot save {}", filename.display()))?;
    fs::write(filename, text).map_err(|_| format!("cannot save {}", filename.display()))?;

    // Save external resources after the document; there is no rollback if a
    // resource fails, the document stays on disk.
    let dirname = filename.parent().unwrap_or(Path::new("")).to_path_buf();
    if noparallel {
        for (index, shape) in scene.shapes.iter().enumerate() {
            shape_io::save_shape(&dirname.join(&shape_filenames[index]), shape)
                .map_err(|cause| dependent_error("save", filename, cause))?;
        }
        for (index, texture) in scene.textures.iter().enumerate() {
            texture_io::save_texture(&dirname.join(&texture_filenames[index]), texture)
                .map_err(|cause| dependent_error("save", filename, cause))?;
        }
    } else {
        parallel_for(scene.shapes.len(), |index| {
            shape_io::save_shape(&dirname.join(&shape_filenames[index]), &scene.shapes[index])
        })
        .map_err(|cause| dependent_error("save", filename, cause))?;
        parallel_for(scene.textures.len(), |index| {
            texture_io::save_texture(
                &dirname.join(&texture_filenames[index]),
                &scene.textures[index],
            )
        })
        .map_err(|cause| dependent_error("save", filename, cause))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_resources_keep_their_name() {
        let names = vec!["floor".to_string()];
        assert_eq!(
            resource_filename(&names, 0, "shape", ".ply"),
            "shapes/floor.ply"
        );
    }

    #[test]
    fn unnamed_resources_fall_back_to_their_index() {
        assert_eq!(
            resource_filename(&[], 1, "shape", ".ply"),
            "shapes/shape1.ply"
        );
        assert_eq!(
            resource_filename(&["".to_string()], 0, "texture", ".png"),
            "textures/texture0.png"
        );
    }

    #[test]
    fn inline_point_carries_position_and_radius() {
        let entry: ShapeEntry = serde_json::from_str(
            r#"{ "type": "point", "position": [1.0, 2.0, 3.0], "radius": 0.5 }"#,
        )
        .unwrap();
        let (shape, source) = shape_from_entry(&entry);
        assert!(matches!(source, ShapeSource::Inline));
        assert_eq!(shape.points, vec![0]);
        assert_eq!(shape.positions, vec![[1.0, 2.0, 3.0]]);
        assert_eq!(shape.radius, vec![0.5]);
    }

    #[test]
    fn inline_line_maps_arrows_to_ends() {
        let entry: ShapeEntry = serde_json::from_str(
            r#"{ "type": "line",
                 "position1": [0.0, 0.0, 0.0], "position2": [1.0, 0.0, 0.0],
                 "radius1": 0.1, "radius2": 0.2, "arrow2": true }"#,
        )
        .unwrap();
        let (shape, _) = shape_from_entry(&entry);
        assert_eq!(shape.lines, vec![[0, 1]]);
        assert_eq!(shape.radius, vec![0.1, 0.2]);
        assert_eq!(shape.ends, vec![LineEnd::Cap, LineEnd::Arrow]);
    }

    #[test]
    fn entries_without_type_reference_a_file() {
        let entry: ShapeEntry =
            serde_json::from_str(r#"{ "uri": "shapes/mesh.ply", "border_size": 0.25 }"#).unwrap();
        let (shape, source) = shape_from_entry(&entry);
        assert_eq!(shape, ShapeData::default());
        match source {
            ShapeSource::Uri { uri, border_radius } => {
                assert_eq!(uri, "shapes/mesh.ply");
                assert_eq!(border_radius, 0.25);
            }
            ShapeSource::Inline => panic!("expected a uri source"),
        }
    }

    #[test]
    fn quad_border_size_lands_on_the_shape() {
        let entry: ShapeEntry = serde_json::from_str(
            r#"{ "type": "quad",
                 "position1": [0.0, 0.0, 0.0], "position2": [1.0, 0.0, 0.0],
                 "position3": [1.0, 1.0, 0.0], "position4": [0.0, 1.0, 0.0],
                 "border_size": 0.02 }"#,
        )
        .unwrap();
        let (shape, _) = shape_from_entry(&entry);
        assert_eq!(shape.quads, vec![[0, 1, 2, 3]]);
        assert_eq!(shape.border_radius, 0.02);
    }
}
