use std::{fmt, str::FromStr};

use anyhow::{anyhow, bail};
use image::ImageBuffer;
use jpeg_decoder::PixelFormat;

use super::Image;

/// Selects the library used to decode JPEG and Motion JPEG data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JpegBackend {
    /// Uses the `zune-jpeg` crate, a pure-Rust JPEG decoder somewhat faster than `jpeg-decoder`.
    #[default]
    ZuneJpeg,
    /// Uses the `jpeg-decoder` crate, a robust but slow pure-Rust JPEG decoder.
    JpegDecoder,
}

impl FromStr for JpegBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zune-jpeg" => Ok(Self::ZuneJpeg),
            "jpeg-decoder" => Ok(Self::JpegDecoder),
            _ => bail!("unknown JPEG backend '{s}' (expected `zune-jpeg` or `jpeg-decoder`)"),
        }
    }
}

impl fmt::Display for JpegBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ZuneJpeg => "zune-jpeg",
            Self::JpegDecoder => "jpeg-decoder",
        })
    }
}

pub(super) fn decode_jpeg(data: &[u8], backend: JpegBackend) -> anyhow::Result<Image> {
    let buf = match backend {
        JpegBackend::ZuneJpeg => {
            use zune_jpeg::zune_core::colorspace::ColorSpace;
            use zune_jpeg::zune_core::options::DecoderOptions;

            let mut decomp = zune_jpeg::JpegDecoder::new_with_options(
                DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::RGBA),
                data,
            );
            decomp.decode_headers()?;
            let colorspace = decomp
                .get_output_colorspace()
                .ok_or_else(|| anyhow!("JPEG headers did not specify a colorspace"))?;
            if colorspace != ColorSpace::RGBA {
                bail!("unsupported colorspace {colorspace:?} (expected RGBA)");
            }

            let size = decomp
                .output_buffer_size()
                .ok_or_else(|| anyhow!("failed to compute JPEG output size"))?;
            let mut buf = vec![0; size];
            decomp.decode_into(&mut buf)?;
            let (width, height) = decomp
                .dimensions()
                .ok_or_else(|| anyhow!("JPEG headers did not specify dimensions"))?;
            ImageBuffer::from_raw(width.into(), height.into(), buf)
                .ok_or_else(|| anyhow!("decoded JPEG data does not match its dimensions"))?
        }
        JpegBackend::JpegDecoder => {
            let mut decoder = jpeg_decoder::Decoder::new(data);
            let pixels = decoder.decode()?;
            let info = decoder
                .info()
                .ok_or_else(|| anyhow!("JPEG decoder did not produce image metadata"))?;
            let rgba = match info.pixel_format {
                PixelFormat::RGB24 => pixels
                    .chunks_exact(3)
                    .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
                    .collect::<Vec<_>>(),
                PixelFormat::L8 => pixels.iter().flat_map(|&l| [l, l, l, 255]).collect(),
                other => bail!("unsupported JPEG pixel format {other:?}"),
            };
            ImageBuffer::from_raw(info.width.into(), info.height.into(), rgba)
                .ok_or_else(|| anyhow!("decoded JPEG data does not match its dimensions"))?
        }
    };

    Ok(Image { buf })
}
