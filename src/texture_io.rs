/// Texture file IO with extension dispatch.
///
/// LDR formats (png, jpg, tga, bmp) decode to byte pixels through the
/// `image` crate; hdr decodes to float pixels through its Radiance codec and
/// exr through the `exr` crate.
use std::fs::{self, File};
use std::io::{BufWriter, Cursor};
use std::path::Path;

use image::codecs::hdr::{HdrDecoder, HdrEncoder};
use image::{ImageFormat, Rgb, RgbaImage};

use crate::scene::TextureData;
use crate::{Error, Result, paths};

fn is_hdr_extension(extension: &str) -> bool {
    matches!(extension, "hdr" | "exr")
}

fn is_ldr_extension(extension: &str) -> bool {
    matches!(extension, "png" | "jpg" | "jpeg" | "tga" | "bmp")
}

/// Load a texture, choosing float or byte pixels based on the extension.
pub fn load_texture(filename: &Path) -> Result<TextureData> {
    let read_error = || Error::from(format!("cannot read {}", filename.display()));
    match paths::extension(filename).as_str() {
        "hdr" => {
            let buffer = fs::read(filename)
                .map_err(|_| format!("cannot open {}", filename.display()))?;
            let decoder = HdrDecoder::new(Cursor::new(buffer)).map_err(|_| read_error())?;
            let metadata = decoder.metadata();
            let pixels = decoder.read_image_hdr().map_err(|_| read_error())?;
            Ok(TextureData {
                width: metadata.width as usize,
                height: metadata.height as usize,
                linear: true,
                pixelsf: pixels
                    .iter()
                    .map(|pixel| [pixel[0], pixel[1], pixel[2], 1.0])
                    .collect(),
                pixelsb: Vec::new(),
            })
        }
        "exr" => load_exr(filename),
        "png" | "jpg" | "jpeg" | "tga" | "bmp" => {
            let buffer = fs::read(filename)
                .map_err(|_| format!("cannot open {}", filename.display()))?;
            let decoded = image::load_from_memory(&buffer)
                .map_err(|_| read_error())?
                .to_rgba8();
            let (width, height) = decoded.dimensions();
            Ok(TextureData {
                width: width as usize,
                height: height as usize,
                linear: false,
                pixelsf: Vec::new(),
                pixelsb: decoded.pixels().map(|pixel| pixel.0).collect(),
            })
        }
        _ => Err(format!("unsupported format {}", filename.display()).into()),
    }
}

/// Save a texture. Float pixels must go to an HDR extension and byte pixels
/// to an LDR one; mismatches are immediate errors.
pub fn save_texture(filename: &Path, texture: &TextureData) -> Result<()> {
    let write_error = || Error::from(format!("cannot write {}", filename.display()));
    let extension = paths::extension(filename);

    if !texture.pixelsf.is_empty() && is_ldr_extension(&extension) {
        return Err(format!("cannot save hdr texture to ldr file {}", filename.display()).into());
    }
    if !texture.pixelsb.is_empty() && is_hdr_extension(&extension) {
        return Err(format!("cannot save ldr texture to hdr file {}", filename.display()).into());
    }

    match extension.as_str() {
        "hdr" => {
            let file = File::create(filename)
                .map_err(|_| format!("cannot create {}", filename.display()))?;
            let pixels: Vec<Rgb<f32>> = texture
                .pixelsf
                .iter()
                .map(|pixel| Rgb([pixel[0], pixel[1], pixel[2]]))
                .collect();
            HdrEncoder::new(BufWriter::new(file))
                .encode(&pixels, texture.width, texture.height)
                .map_err(|_| write_error())?;
            Ok(())
        }
        "exr" => exr::prelude::write_rgba_file(filename, texture.width, texture.height, |x, y| {
            let pixel = texture.pixelsf[y * texture.width + x];
            (pixel[0], pixel[1], pixel[2], pixel[3])
        })
        .map_err(|_| write_error()),
        "png" | "tga" | "bmp" => {
            let image = rgba_image(texture).ok_or_else(write_error)?;
            let format = match extension.as_str() {
                "png" => ImageFormat::Png,
                "tga" => ImageFormat::Tga,
                _ => ImageFormat::Bmp,
            };
            image
                .save_with_format(filename, format)
                .map_err(|_| write_error())
        }
        "jpg" | "jpeg" => {
            // JPEG has no alpha channel.
            let image = rgba_image(texture).ok_or_else(write_error)?;
            image::DynamicImage::ImageRgba8(image)
                .to_rgb8()
                .save_with_format(filename, ImageFormat::Jpeg)
                .map_err(|_| write_error())
        }
        _ => Err(format!("unsupported format {}", filename.display()).into()),
    }
}

fn rgba_image(texture: &TextureData) -> Option<RgbaImage> {
    let raw: Vec<u8> = texture.pixelsb.iter().flatten().copied().collect();
    RgbaImage::from_raw(texture.width as u32, texture.height as u32, raw)
}

fn load_exr(filename: &Path) -> Result<TextureData> {
    use exr::prelude::*;
    let image = read_first_rgba_layer_from_file(
        filename,
        |resolution, _| {
            (
                vec![[0.0f32; 4]; resolution.width() * resolution.height()],
                resolution.width(),
            )
        },
        |(pixels, width): &mut (Vec<[f32; 4]>, usize),
         position,
         (r, g, b, a): (f32, f32, f32, f32)| {
            pixels[position.y() * *width + position.x()] = [r, g, b, a];
        },
    )
    .map_err(|_| format!("cannot read {}", filename.display()))?;

    let size = image.layer_data.size;
    let (pixels, _) = image.layer_data.channel_data.pixels;
    Ok(TextureData {
        width: size.width(),
        height: size.height(),
        linear: true,
        pixelsf: pixels,
        pixelsb: Vec::new(),
    })
}
