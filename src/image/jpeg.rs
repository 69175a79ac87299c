use anyhow::{anyhow, bail};
use image::ImageBuffer;
use jpeg_decoder::PixelFormat;

use super::Image;

/// The pure-Rust JPEG decoders we can decode webcam frames with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JpegBackend {
    /// Uses the `jpeg-decoder` crate, a robust but slow pure-Rust JPEG decoder.
    JpegDecoder,
    /// Uses the `zune-jpeg` crate, a pure-Rust JPEG decoder somewhat faster than `jpeg-decoder`.
    #[default]
    ZuneJpeg,
}

impl JpegBackend {
    /// Looks up a backend by the name used in the `HANDDIST_JPEG_BACKEND` variable.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "zune-jpeg" => Some(Self::ZuneJpeg),
            "jpeg-decoder" => Some(Self::JpegDecoder),
            _ => None,
        }
    }
}

pub(super) fn decode_jpeg(backend: JpegBackend, data: &[u8]) -> anyhow::Result<Image> {
    let (width, height, buf) = match backend {
        JpegBackend::JpegDecoder => {
            let mut decoder = jpeg_decoder::Decoder::new(data);
            let pixels = decoder.decode()?;
            let info = decoder
                .info()
                .ok_or_else(|| anyhow!("JPEG decoder returned no image info"))?;

            let buf = match info.pixel_format {
                PixelFormat::RGB24 => pixels
                    .chunks_exact(3)
                    .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
                    .collect(),
                PixelFormat::L8 => pixels.iter().flat_map(|&l| [l, l, l, 255]).collect(),
                format => bail!("unsupported JPEG pixel format {format:?}"),
            };
            (u32::from(info.width), u32::from(info.height), buf)
        }
        JpegBackend::ZuneJpeg => {
            use zune_jpeg::zune_core::colorspace::ColorSpace;
            use zune_jpeg::zune_core::options::DecoderOptions;

            let mut decomp = zune_jpeg::JpegDecoder::new_with_options(
                DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::RGBA),
                data,
            );
            decomp.decode_headers()?;
            match decomp.get_output_colorspace() {
                Some(ColorSpace::RGBA) => {}
                colorspace => bail!("unsupported colorspace {colorspace:?} (expected RGBA)"),
            }

            let size = decomp
                .output_buffer_size()
                .ok_or_else(|| anyhow!("JPEG headers not decoded"))?;
            let mut buf = vec![0; size];
            decomp.decode_into(&mut buf)?;
            let (width, height) = decomp
                .dimensions()
                .ok_or_else(|| anyhow!("JPEG headers not decoded"))?;
            (u32::from(width), u32::from(height), buf)
        }
    };

    match ImageBuffer::from_raw(width, height, buf) {
        Some(buf) => Ok(Image { buf }),
        None => bail!("decoded JPEG data does not match its {width}x{height} size"),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{codecs::jpeg::JpegEncoder, ColorType};

    use super::*;

    fn encode_gray(width: u32, height: u32) -> Vec<u8> {
        let pixels = vec![128; (width * height * 3) as usize];
        let mut out = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut out, 95)
            .encode(&pixels, width, height, ColorType::Rgb8)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn backend_names() {
        assert_eq!(
            JpegBackend::from_name("zune-jpeg"),
            Some(JpegBackend::ZuneJpeg)
        );
        assert_eq!(
            JpegBackend::from_name("jpeg-decoder"),
            Some(JpegBackend::JpegDecoder)
        );
        assert_eq!(JpegBackend::from_name("mozjpeg"), None);
        assert_eq!(JpegBackend::default(), JpegBackend::ZuneJpeg);
    }

    #[test]
    fn decode_with_each_backend() {
        let jpeg = encode_gray(16, 8);
        for backend in [JpegBackend::JpegDecoder, JpegBackend::ZuneJpeg] {
            let image = decode_jpeg(backend, &jpeg).unwrap();
            assert_eq!((image.width(), image.height()), (16, 8), "{backend:?}");
            let color = image.get(3, 3);
            assert_eq!(color.a(), 255);
            assert!(color.r().abs_diff(128) <= 4, "{backend:?}: {color:?}");
        }
    }

    #[test]
    fn garbage_is_an_error() {
        for backend in [JpegBackend::JpegDecoder, JpegBackend::ZuneJpeg] {
            assert!(decode_jpeg(backend, b"not a jpeg").is_err());
        }
    }
}
