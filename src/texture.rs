use std::path::Path;

use image::DynamicImage;
use log::{debug, error};

use crate::config::TextureOptions;
use crate::error::TextureError;
use crate::gpu::{RenderContext, TextureFormat};

/// Decoded pixels ready for upload.
struct Pixels {
    format: TextureFormat,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Pixels {
    fn from_image(image: DynamicImage) -> Self {
        match TextureFormat::from_channels(image.color().channel_count()) {
            Some(TextureFormat::Red) => {
                let luma = image.to_luma8();
                Self {
                    format: TextureFormat::Red,
                    width: luma.width(),
                    height: luma.height(),
                    data: luma.into_raw(),
                }
            }
            Some(TextureFormat::Rgb) => {
                let rgb = image.to_rgb8();
                Self {
                    format: TextureFormat::Rgb,
                    width: rgb.width(),
                    height: rgb.height(),
                    data: rgb.into_raw(),
                }
            }
            // RGBA, plus luma-alpha and 16-bit layouts.
            _ => {
                let rgba = image.to_rgba8();
                Self {
                    format: TextureFormat::Rgba,
                    width: rgba.width(),
                    height: rgba.height(),
                    data: rgba.into_raw(),
                }
            }
        }
    }
}

/// Decodes the image at `path` into a new mipmapped 2D texture.
///
/// The texture is left bound to the active unit.
pub fn load_texture<C: RenderContext>(
    ctx: &C,
    path: impl AsRef<Path>,
    options: TextureOptions,
) -> Result<C::Texture, TextureError> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|source| TextureError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let image = if options.flip_vertically { image.flipv() } else { image };
    let pixels = Pixels::from_image(image);

    let texture = ctx.create_texture()?;
    ctx.bind_texture(Some(texture));
    ctx.tex_image_2d(pixels.format, pixels.width, pixels.height, &pixels.data);
    ctx.generate_mipmap();
    ctx.set_default_sampling();

    debug!(
        "loaded {}x{} {:?} texture from {}",
        pixels.width,
        pixels.height,
        pixels.format,
        path.display()
    );
    Ok(texture)
}

/// Like [`load_texture`], but a decode failure is logged and an empty
/// texture object (sampling set, no image) is returned instead.
pub fn load_texture_or_empty<C: RenderContext>(
    ctx: &C,
    path: impl AsRef<Path>,
    options: TextureOptions,
) -> Result<C::Texture, TextureError> {
    match load_texture(ctx, path, options) {
        Err(err @ TextureError::Decode { .. }) => {
            error!("{err}: {}", source_message(&err));
            let texture = ctx.create_texture()?;
            ctx.bind_texture(Some(texture));
            ctx.set_default_sampling();
            Ok(texture)
        }
        other => other,
    }
}

fn source_message(err: &TextureError) -> String {
    std::error::Error::source(err).map_or_else(String::new, ToString::to_string)
}
