/// Shape file IO with extension dispatch. ASCII PLY is the supported format.
use std::fs;
use std::path::Path;

use crate::scene::{LineEnd, ShapeData};
use crate::{Error, Result, paths};

/// Load an indexed shape, dispatching on the file extension.
pub fn load_shape(filename: &Path) -> Result<ShapeData> {
    match paths::extension(filename).as_str() {
        "ply" => load_ply(filename),
        _ => Err(format!("unsupported format {}", filename.display()).into()),
    }
}

/// Save an indexed shape, dispatching on the file extension.
pub fn save_shape(filename: &Path, shape: &ShapeData) -> Result<()> {
    match paths::extension(filename).as_str() {
        "ply" => save_ply(filename, shape),
        _ => Err(format!("unsupported format {}", filename.display()).into()),
    }
}

/// Write an ASCII PLY file. Vertex channels are emitted only when present;
/// connectivity goes into face (3/4-lists), line, and point elements.
fn save_ply(filename: &Path, shape: &ShapeData) -> Result<()> {
    let mut text = String::new();
    text.push_str("ply\n");
    text.push_str("format ascii 1.0\n");
    text.push_str("comment written by scene-pipeline\n");

    text.push_str(&format!("element vertex {}\n", shape.positions.len()));
    text.push_str("property float x\nproperty float y\nproperty float z\n");
    if !shape.normals.is_empty() {
        text.push_str("property float nx\nproperty float ny\nproperty float nz\n");
    }
    if !shape.texcoords.is_empty() {
        text.push_str("property float u\nproperty float v\n");
    }
    if !shape.colors.is_empty() {
        text.push_str(
            "property float red\nproperty float green\nproperty float blue\nproperty float alpha\n",
        );
    }
    if !shape.radius.is_empty() {
        text.push_str("property float radius\n");
    }
    if !shape.ends.is_empty() {
        text.push_str("property uchar end\n");
    }

    let faces = shape.triangles.len() + shape.quads.len();
    if faces > 0 {
        text.push_str(&format!("element face {faces}\n"));
        text.push_str("property list uchar int vertex_indices\n");
    }
    if !shape.lines.is_empty() {
        text.push_str(&format!("element line {}\n", shape.lines.len()));
        text.push_str("property list uchar int vertex_indices\n");
    }
    if !shape.points.is_empty() {
        text.push_str(&format!("element point {}\n", shape.points.len()));
        text.push_str("property list uchar int vertex_indices\n");
    }
    text.push_str("end_header\n");

    for index in 0..shape.positions.len() {
        let position = shape.positions[index];
        let mut row = format!("{} {} {}", position[0], position[1], position[2]);
        if !shape.normals.is_empty() {
            let normal = shape.normals[index];
            row.push_str(&format!(" {} {} {}", normal[0], normal[1], normal[2]));
        }
        if !shape.texcoords.is_empty() {
            let texcoord = shape.texcoords[index];
            row.push_str(&format!(" {} {}", texcoord[0], texcoord[1]));
        }
        if !shape.colors.is_empty() {
            let color = shape.colors[index];
            row.push_str(&format!(
                " {} {} {} {}",
                color[0], color[1], color[2], color[3]
            ));
        }
        if !shape.radius.is_empty() {
            row.push_str(&format!(" {}", shape.radius[index]));
        }
        if !shape.ends.is_empty() {
            let end = match shape.ends[index] {
                LineEnd::Cap => 0,
                LineEnd::Arrow => 1,
            };
            row.push_str(&format!(" {end}"));
        }
        row.push('\n');
        text.push_str(&row);
    }
    for triangle in &shape.triangles {
        text.push_str(&format!(
            "3 {} {} {}\n",
            triangle[0], triangle[1], triangle[2]
        ));
    }
    for quad in &shape.quads {
        text.push_str(&format!("4 {} {} {} {}\n", quad[0], quad[1], quad[2], quad[3]));
    }
    for line in &shape.lines {
        text.push_str(&format!("2 {} {}\n", line[0], line[1]));
    }
    for point in &shape.points {
        text.push_str(&format!("1 {point}\n"));
    }

    fs::write(filename, text).map_err(|_| format!("cannot create {}", filename.display()))?;
    Ok(())
}

struct PlyElement {
    name: String,
    count: usize,
    properties: Vec<String>,
}

/// Read an ASCII PLY file, mapping declared vertex properties to channels.
fn load_ply(filename: &Path) -> Result<ShapeData> {
    let text =
        fs::read_to_string(filename).map_err(|_| format!("cannot open {}", filename.display()))?;
    let parse_error = || Error::from(format!("cannot parse {}", filename.display()));

    // Header.
    let mut lines_iter = text.lines();
    let mut elements: Vec<PlyElement> = Vec::new();
    let mut header_done = false;
    for line in &mut lines_iter {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.first().copied() {
            Some("ply") | Some("comment") | None => {}
            Some("format") => {
                if tokens.get(1) != Some(&"ascii") {
                    return Err(format!("unsupported format {}", filename.display()).into());
                }
            }
            Some("element") => {
                let (Some(name), Some(count)) = (tokens.get(1), tokens.get(2)) else {
                    return Err(parse_error());
                };
                elements.push(PlyElement {
                    name: name.to_string(),
                    count: count.parse().map_err(|_| parse_error())?,
                    properties: Vec::new(),
                });
            }
            Some("property") => {
                let Some(element) = elements.last_mut() else {
                    return Err(parse_error());
                };
                // Scalar properties record their name; lists keep one slot.
                let name = if tokens.get(1) == Some(&"list") {
                    tokens.get(4)
                } else {
                    tokens.get(2)
                };
                element.properties.push(name.ok_or_else(parse_error)?.to_string());
            }
            Some("end_header") => {
                header_done = true;
                break;
            }
            Some(_) => return Err(parse_error()),
        }
    }
    if !header_done {
        return Err(parse_error());
    }

    // Data rows, element by element in declaration order.
    let mut shape = ShapeData::default();
    for element in &elements {
        let has = |name: &str| element.properties.iter().any(|property| property == name);
        let (has_normals, has_texcoords, has_colors, has_radius, has_ends) = (
            has("nx"),
            has("u"),
            has("red"),
            has("radius"),
            has("end"),
        );
        for _ in 0..element.count {
            let line = lines_iter.next().ok_or_else(parse_error)?;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match element.name.as_str() {
                "vertex" => {
                    if tokens.len() != element.properties.len() {
                        return Err(parse_error());
                    }
                    let mut position = [0.0f32; 3];
                    let mut normal = [0.0f32; 3];
                    let mut texcoord = [0.0f32; 2];
                    let mut color = [0.0f32; 4];
                    let mut radius = 0.0f32;
                    let mut end = 0.0f32;
                    for (property, token) in element.properties.iter().zip(&tokens) {
                        let value: f32 = token.parse().map_err(|_| parse_error())?;
                        match property.as_str() {
                            "x" => position[0] = value,
                            "y" => position[1] = value,
                            "z" => position[2] = value,
                            "nx" => normal[0] = value,
                            "ny" => normal[1] = value,
                            "nz" => normal[2] = value,
                            "u" => texcoord[0] = value,
                            "v" => texcoord[1] = value,
                            "red" => color[0] = value,
                            "green" => color[1] = value,
                            "blue" => color[2] = value,
                            "alpha" => color[3] = value,
                            "radius" => radius = value,
                            "end" => end = value,
                            _ => {}
                        }
                    }
                    shape.positions.push(position);
                    if has_normals {
                        shape.normals.push(normal);
                    }
                    if has_texcoords {
                        shape.texcoords.push(texcoord);
                    }
                    if has_colors {
                        shape.colors.push(color);
                    }
                    if has_radius {
                        shape.radius.push(radius);
                    }
                    if has_ends {
                        shape.ends.push(if end != 0.0 {
                            LineEnd::Arrow
                        } else {
                            LineEnd::Cap
                        });
                    }
                }
                "face" | "line" | "point" => {
                    let indices = parse_index_list(&tokens).ok_or_else(parse_error)?;
                    match (element.name.as_str(), indices.as_slice()) {
                        ("face", &[a, b, c]) => shape.triangles.push([a, b, c]),
                        ("face", &[a, b, c, d]) => shape.quads.push([a, b, c, d]),
                        ("line", &[a, b]) => shape.lines.push([a, b]),
                        ("point", &[a]) => shape.points.push(a),
                        _ => return Err(parse_error()),
                    }
                }
                _ => {} // skip rows of unknown elements
            }
        }
    }

    if shape.points.is_empty()
        && shape.lines.is_empty()
        && shape.triangles.is_empty()
        && shape.quads.is_empty()
    {
        return Err(format!("empty shape {}", filename.display()).into());
    }
    Ok(shape)
}

fn parse_index_list(tokens: &[&str]) -> Option<Vec<i32>> {
    let count: usize = tokens.first()?.parse().ok()?;
    if tokens.len() != count + 1 {
        return None;
    }
    tokens[1..].iter().map(|token| token.parse().ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn ply_round_trip_preserves_all_channels() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("shape.ply");

        let shape = ShapeData {
            points: vec![3],
            lines: vec![[2, 3]],
            triangles: vec![[0, 1, 2]],
            quads: vec![[0, 1, 2, 3]],
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            normals: vec![[0.0, 0.0, 1.0]; 4],
            texcoords: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            colors: vec![[0.25, 0.5, 0.75, 1.0]; 4],
            radius: vec![0.01, 0.02, 0.03, 0.04],
            ends: vec![LineEnd::Cap, LineEnd::Arrow, LineEnd::Cap, LineEnd::Arrow],
            border_radius: 0.0,
        };

        save_shape(&path, &shape).unwrap();
        let loaded = load_shape(&path).unwrap();
        assert_eq!(loaded, shape);
    }

    #[test]
    fn geometry_only_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tri.ply");

        let shape = ShapeData {
            triangles: vec![[0, 1, 2]],
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            ..ShapeData::default()
        };
        save_shape(&path, &shape).unwrap();
        let loaded = load_shape(&path).unwrap();
        assert_eq!(loaded, shape);
        assert!(loaded.radius.is_empty());
        assert!(loaded.ends.is_empty());
    }

    #[test]
    fn shape_without_connectivity_is_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bare.ply");
        let shape = ShapeData {
            positions: vec![[0.0, 0.0, 0.0]],
            ..ShapeData::default()
        };
        save_shape(&path, &shape).unwrap();
        let error = load_shape(&path).unwrap_err().to_string();
        assert!(error.contains("empty shape"));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let error = load_shape(Path::new("shape.fbx")).unwrap_err().to_string();
        assert!(error.contains("unsupported format"));
        let error = save_shape(Path::new("shape.fbx"), &ShapeData::default())
            .unwrap_err()
            .to_string();
        assert!(error.contains("unsupported format"));
    }

    #[test]
    fn missing_file_reports_its_path() {
        let error = load_shape(Path::new("/nonexistent/mesh.ply"))
            .unwrap_err()
            .to_string();
        assert!(error.contains("cannot open"));
        assert!(error.contains("/nonexistent/mesh.ply"));
    }
}
