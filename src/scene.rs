/// Scene aggregate data model, bounds computation, and post-load fix-ups.
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Identity frame: three rotation columns followed by the origin.
pub const IDENTITY_FRAME: [f32; 12] = [
    1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0,
];

/// Marker for unset element references.
pub const INVALID_ID: i32 = -1;

/// Uniform radius spliced into point/line shapes that carry none.
const DEFAULT_RADIUS: f32 = 0.001;

/// Line end-cap marker, one per vertex of a line shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnd {
    #[default]
    Cap,
    Arrow,
}

/// Perspective/orthographic camera.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraData {
    pub frame: [f32; 12],
    pub orthographic: bool,
    pub lens: f32,
    pub film: f32,
    pub aspect: f32,
    pub focus: f32,
    pub aperture: f32,
}

impl Default for CameraData {
    fn default() -> Self {
        Self {
            frame: IDENTITY_FRAME,
            orthographic: false,
            lens: 0.050,
            film: 0.036,
            aspect: 16.0 / 9.0,
            focus: 10000.0,
            aperture: 0.0,
        }
    }
}

/// Material model selector, serialized lowercase in scene documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialType {
    #[default]
    Matte,
    Glossy,
    Reflective,
    Transparent,
    Refractive,
    Subsurface,
    Volumetric,
    Gltfpbr,
}

/// Surface material with optional texture references (`INVALID_ID` = unset).
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialData {
    pub kind: MaterialType,
    pub emission: [f32; 3],
    pub color: [f32; 3],
    pub metallic: f32,
    pub roughness: f32,
    pub ior: f32,
    pub trdepth: f32,
    pub scattering: [f32; 3],
    pub scanisotropy: f32,
    pub opacity: f32,
    pub emission_tex: i32,
    pub color_tex: i32,
    pub roughness_tex: i32,
    pub scattering_tex: i32,
    pub normal_tex: i32,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            kind: MaterialType::Matte,
            emission: [0.0; 3],
            color: [0.0; 3],
            metallic: 0.0,
            roughness: 0.0,
            ior: 1.5,
            trdepth: 0.01,
            scattering: [0.0; 3],
            scanisotropy: 0.0,
            opacity: 1.0,
            emission_tex: INVALID_ID,
            color_tex: INVALID_ID,
            roughness_tex: INVALID_ID,
            scattering_tex: INVALID_ID,
            normal_tex: INVALID_ID,
        }
    }
}

/// Indexed geometry with optional per-vertex channels.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShapeData {
    pub points: Vec<i32>,
    pub lines: Vec<[i32; 2]>,
    pub triangles: Vec<[i32; 3]>,
    pub quads: Vec<[i32; 4]>,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub texcoords: Vec<[f32; 2]>,
    pub colors: Vec<[f32; 4]>,
    pub radius: Vec<f32>,
    pub ends: Vec<LineEnd>,
    pub border_radius: f32,
}

/// Image texture: float pixels for HDR content, byte pixels for LDR.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextureData {
    pub width: usize,
    pub height: usize,
    pub linear: bool,
    pub pixelsf: Vec<[f32; 4]>,
    pub pixelsb: Vec<[u8; 4]>,
}

/// Placement of a shape with its materials.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceData {
    pub frame: [f32; 12],
    pub shape: i32,
    pub material: i32,
    pub border_material: i32,
}

impl Default for InstanceData {
    fn default() -> Self {
        Self {
            frame: IDENTITY_FRAME,
            shape: INVALID_ID,
            material: INVALID_ID,
            border_material: INVALID_ID,
        }
    }
}

/// Scene aggregate: parallel element and name arrays.
///
/// Invariant: a non-empty name array has exactly one name per element;
/// missing names are synthesized from the element index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SceneData {
    pub cameras: Vec<CameraData>,
    pub shapes: Vec<ShapeData>,
    pub textures: Vec<TextureData>,
    pub materials: Vec<MaterialData>,
    pub instances: Vec<InstanceData>,
    pub camera_names: Vec<String>,
    pub shape_names: Vec<String>,
    pub texture_names: Vec<String>,
    pub material_names: Vec<String>,
    pub instance_names: Vec<String>,
    pub copyright: String,
}

/// Axis-aligned scene bounds, initialized empty.
#[derive(Debug, Clone)]
pub struct SceneBounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl SceneBounds {
    pub fn new() -> Self {
        Self {
            min: [f32::INFINITY; 3],
            max: [f32::NEG_INFINITY; 3],
        }
    }

    /// Grow the bounds to contain a point.
    pub fn update(&mut self, point: [f32; 3]) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(point[axis]);
            self.max[axis] = self.max[axis].max(point[axis]);
        }
    }

    /// Grow the bounds to contain another bounds.
    pub fn merge(&mut self, other: &SceneBounds) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(other.min[axis]);
            self.max[axis] = self.max[axis].max(other.max[axis]);
        }
    }

    /// True when no point was ever added.
    pub fn is_empty(&self) -> bool {
        self.min[0] > self.max[0]
    }

    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
            (self.min[2] + self.max[2]) / 2.0,
        ]
    }

    fn corners(&self) -> [[f32; 3]; 8] {
        let (min, max) = (self.min, self.max);
        [
            [min[0], min[1], min[2]],
            [max[0], min[1], min[2]],
            [min[0], max[1], min[2]],
            [max[0], max[1], min[2]],
            [min[0], min[1], max[2]],
            [max[0], min[1], max[2]],
            [min[0], max[1], max[2]],
            [max[0], max[1], max[2]],
        ]
    }
}

impl Default for SceneBounds {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute scene bounds from instanced shape geometry.
///
/// Shapes are bounded in parallel chunks; instances transform the corners of
/// their shape's bounds. Scenes without instances fall back to the raw shape
/// bounds.
pub fn compute_bounds(scene: &SceneData) -> SceneBounds {
    let shape_bounds: Vec<SceneBounds> = scene
        .shapes
        .iter()
        .map(|shape| bounds_of_positions(&shape.positions))
        .collect();

    let mut bounds = SceneBounds::new();
    if scene.instances.is_empty() {
        for shape in &shape_bounds {
            bounds.merge(shape);
        }
        return bounds;
    }
    for instance in &scene.instances {
        if instance.shape < 0 {
            continue;
        }
        let Some(shape) = shape_bounds.get(instance.shape as usize) else {
            continue;
        };
        if shape.is_empty() {
            continue;
        }
        for corner in shape.corners() {
            bounds.update(transform_point(&instance.frame, corner));
        }
    }
    bounds
}

fn bounds_of_positions(positions: &[[f32; 3]]) -> SceneBounds {
    positions
        .par_chunks(4096)
        .map(|chunk| {
            let mut local_bounds = SceneBounds::new();
            for &position in chunk {
                local_bounds.update(position);
            }
            local_bounds
        })
        .reduce_with(|mut a, b| {
            a.merge(&b);
            a
        })
        .unwrap_or_else(SceneBounds::new)
}

/// Synthesize a default camera framed to the scene bounds if none exists.
pub fn add_missing_camera(scene: &mut SceneData) {
    if !scene.cameras.is_empty() {
        return;
    }
    let camera = CameraData::default();
    let mut bounds = compute_bounds(scene);
    if bounds.is_empty() {
        bounds = SceneBounds {
            min: [-1.0; 3],
            max: [1.0; 3],
        };
    }
    let center = bounds.center();
    let bounds_radius = length(sub(bounds.max, bounds.min)) / 2.0;
    let camera_dir = [0.0, 0.0, 1.0];
    // Doubled to match the tracer camera model.
    let camera_dist = bounds_radius * camera.lens / (camera.film / camera.aspect) * 2.0;
    let from = add(scale(camera_dir, camera_dist), center);
    let up = [0.0, 1.0, 0.0];
    scene.camera_names.push("camera".to_string());
    scene.cameras.push(CameraData {
        frame: lookat_frame(from, center, up),
        focus: length(sub(from, center)),
        ..camera
    });
}

/// Give instances without a material a shared default gray one.
pub fn add_missing_material(scene: &mut SceneData) {
    let mut default_material = INVALID_ID;
    for index in 0..scene.instances.len() {
        if scene.instances[index].material >= 0 {
            continue;
        }
        if default_material == INVALID_ID {
            scene.materials.push(MaterialData {
                color: [0.8, 0.8, 0.8],
                ..MaterialData::default()
            });
            default_material = scene.materials.len() as i32 - 1;
        }
        scene.instances[index].material = default_material;
    }
}

/// Give point/line shapes without explicit radii a uniform default.
pub fn add_missing_radius(scene: &mut SceneData) {
    for shape in &mut scene.shapes {
        if shape.points.is_empty() && shape.lines.is_empty() {
            continue;
        }
        if !shape.radius.is_empty() {
            continue;
        }
        shape.radius = vec![DEFAULT_RADIUS; shape.positions.len()];
    }
}

/// Give line shapes without explicit end markers a capped end per vertex.
pub fn add_missing_caps(scene: &mut SceneData) {
    for shape in &mut scene.shapes {
        if !shape.lines.is_empty() && shape.ends.is_empty() {
            shape.ends = vec![LineEnd::Cap; shape.positions.len()];
        }
    }
}

/// Shrink every container to its occupied size to reduce memory usage.
pub fn trim_memory(scene: &mut SceneData) {
    for shape in &mut scene.shapes {
        shape.points.shrink_to_fit();
        shape.lines.shrink_to_fit();
        shape.triangles.shrink_to_fit();
        shape.quads.shrink_to_fit();
        shape.positions.shrink_to_fit();
        shape.normals.shrink_to_fit();
        shape.texcoords.shrink_to_fit();
        shape.colors.shrink_to_fit();
        shape.radius.shrink_to_fit();
        shape.ends.shrink_to_fit();
    }
    for texture in &mut scene.textures {
        texture.pixelsf.shrink_to_fit();
        texture.pixelsb.shrink_to_fit();
    }
    scene.cameras.shrink_to_fit();
    scene.shapes.shrink_to_fit();
    scene.textures.shrink_to_fit();
    scene.materials.shrink_to_fit();
    scene.instances.shrink_to_fit();
}

/// Frame from an eye point looking at a center point.
pub(crate) fn lookat_frame(from: [f32; 3], to: [f32; 3], up: [f32; 3]) -> [f32; 12] {
    let w = normalize(sub(from, to));
    let u = normalize(cross(up, w));
    let v = cross(w, u);
    [
        u[0], u[1], u[2], v[0], v[1], v[2], w[0], w[1], w[2], from[0], from[1], from[2],
    ]
}

fn transform_point(frame: &[f32; 12], point: [f32; 3]) -> [f32; 3] {
    let mut result = [0.0f32; 3];
    for axis in 0..3 {
        result[axis] = frame[axis] * point[0]
            + frame[3 + axis] * point[1]
            + frame[6 + axis] * point[2]
            + frame[9 + axis];
    }
    result
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn add(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn scale(a: [f32; 3], s: f32) -> [f32; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn length(a: [f32; 3]) -> f32 {
    (a[0] * a[0] + a[1] * a[1] + a[2] * a[2]).sqrt()
}

fn normalize(a: [f32; 3]) -> [f32; 3] {
    let len = length(a);
    if len == 0.0 { a } else { scale(a, 1.0 / len) }
}
