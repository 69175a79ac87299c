//! V4L2 webcam access.
//!
//! Currently, only V4L2 `VIDEO_CAPTURE` devices yielding JFIF JPEG or Motion JPEG frames are
//! supported.

use std::cmp::Reverse;

use anyhow::bail;
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, PixelFormat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::{
    image::{Image, JpegBackend, Resolution},
    timer::Timer,
};

use super::FrameSource;

/// Indicates whether to prefer a higher resolution or frame rate.
///
/// By default, [`ParamPreference::Resolution`] is used, which keeps the desired resolution and
/// gives up on the frame rate first if the camera cannot deliver both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamPreference {
    /// Prefer increased resolution over higher frame rates.
    #[default]
    Resolution,
    /// Prefer higher frame rate over higher image resolution.
    Framerate,
}

#[derive(Debug, Default, Clone, Copy)]
struct FramePrefs {
    resolution: Option<Resolution>,
    fps: Option<u32>,
    pref: ParamPreference,
}

/// Format negotiation options.
#[derive(Debug, Default, Clone)]
pub struct WebcamOptions {
    name: Option<String>,
    frame: FramePrefs,
    jpeg_backend: JpegBackend,
}

impl WebcamOptions {
    /// Sets the name of the webcam device to open.
    ///
    /// If no webcam with the given name can be found, opening the webcam will result in an error.
    #[inline]
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the desired image resolution.
    ///
    /// A lower resolution might be selected if the webcam cannot deliver the desired resolution.
    #[inline]
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.frame.resolution = Some(resolution);
        self
    }

    /// Sets the desired frame rate.
    ///
    /// A lower frame rate might be selected if the webcam cannot deliver the desired frame rate.
    #[inline]
    pub fn fps(mut self, fps: u32) -> Self {
        self.frame.fps = Some(fps);
        self
    }

    /// Selects whether to prefer a higher resolution or frame rate.
    ///
    /// When the camera cannot deliver the desired frame rate or resolution, this parameter controls
    /// which one will be maintained.
    #[inline]
    pub fn prefer(mut self, pref: ParamPreference) -> Self {
        self.frame.pref = pref;
        self
    }

    /// Selects the decoder for the MJPG frames delivered by the webcam.
    #[inline]
    pub fn jpeg_backend(mut self, backend: JpegBackend) -> Self {
        self.jpeg_backend = backend;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FrameFormat {
    resolution: Resolution,
    frame_interval: Fract,
}

fn negotiate_format(device: &Device, prefs: FramePrefs) -> anyhow::Result<(PixFormat, Fract)> {
    let mut pixel_format = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format?;
        if format.pixel_format() == PixelFormat::JPEG || format.pixel_format() == PixelFormat::MJPG {
            pixel_format = Some(format.pixel_format());
            break;
        }
    }

    let Some(pixel_format) = pixel_format else {
        bail!("no supported pixel format found");
    };

    let mut formats = Vec::new();
    match device.frame_sizes(pixel_format)? {
        FrameSizes::Discrete(sizes) => {
            for size in sizes {
                let intervals =
                    match device.frame_intervals(pixel_format, size.width(), size.height())? {
                        FrameIntervals::Discrete(intervals) => intervals,
                        FrameIntervals::Stepwise(_) | FrameIntervals::Continuous(_) => {
                            bail!("stepwise or continuous frame rates are not supported")
                        }
                    };
                for rate in intervals {
                    formats.push(FrameFormat {
                        resolution: Resolution::new(size.width(), size.height()),
                        frame_interval: *rate.fract(),
                    });
                }
            }
        }
        FrameSizes::Stepwise(_) | FrameSizes::Continuous(_) => {
            bail!("stepwise or continuous resolutions are not supported");
        }
    }

    let Some(fmt) = negotiate(&formats, prefs) else {
        bail!("failed to negotiate a webcam format");
    };
    Ok((
        PixFormat::new(
            fmt.resolution.width(),
            fmt.resolution.height(),
            pixel_format,
        ),
        fmt.frame_interval,
    ))
}

/// Picks a format, dropping constraints in order of the preference until one matches.
fn negotiate(formats: &[FrameFormat], mut prefs: FramePrefs) -> Option<FrameFormat> {
    loop {
        if let Some(fmt) = negotiate_format_step(formats, prefs) {
            return Some(fmt);
        }

        log::debug!("failed to negotiate format with prefs {:?}", prefs);
        match prefs.pref {
            ParamPreference::Resolution => {
                if prefs.fps.take().is_none() && prefs.resolution.take().is_none() {
                    return None;
                }
            }
            ParamPreference::Framerate => {
                if prefs.resolution.take().is_none() && prefs.fps.take().is_none() {
                    return None;
                }
            }
        }
        log::debug!("retrying with new prefs {:?}", prefs);
    }
}

fn negotiate_format_step(formats: &[FrameFormat], prefs: FramePrefs) -> Option<FrameFormat> {
    let mut formats = formats
        .iter()
        .filter(|fmt| {
            prefs.resolution.map_or(true, |res| {
                fmt.resolution.width() >= res.width() && fmt.resolution.height() >= res.height()
            }) && prefs.fps.map_or(true, |fps| {
                (1.0 / fmt.frame_interval.as_f32()).round() >= fps as f32
            })
        })
        .copied()
        .collect::<Vec<_>>();

    // Closest match wins: the smallest eligible format along the preferred axis, and the best
    // available one along the other.
    match prefs.pref {
        ParamPreference::Resolution => formats.sort_by_key(|fmt| {
            (
                Reverse(fmt.resolution.num_pixels()),
                Reverse(fmt.frame_interval),
            )
        }),
        ParamPreference::Framerate => {
            formats.sort_by_key(|fmt| (fmt.frame_interval, fmt.resolution.num_pixels()))
        }
    }
    formats.last().copied()
}

/// A webcam yielding a stream of [`Image`]s.
pub struct Webcam {
    stream: ReadStream,
    jpeg_backend: JpegBackend,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the first supported webcam found.
    ///
    /// This function can block for a significant amount of time while the webcam initializes (on
    /// the order of hundreds of milliseconds).
    pub fn open(options: WebcamOptions) -> anyhow::Result<Self> {
        if let Some(name) = &options.name {
            log::debug!("looking for webcam '{name}'");
        }
        for res in linuxvideo::list()? {
            match res {
                Ok(dev) => match Self::open_impl(dev, &options) {
                    Ok(Some(webcam)) => return Ok(webcam),
                    Ok(None) => {}
                    Err(e) => {
                        log::debug!("{}", e);
                    }
                },
                Err(e) => {
                    log::warn!("{}", e);
                }
            }
        }

        match &options.name {
            Some(name) => bail!("no supported webcam named '{name}' found"),
            None => bail!("no supported webcam device found"),
        }
    }

    fn open_impl(dev: Device, options: &WebcamOptions) -> anyhow::Result<Option<Self>> {
        let caps = dev.capabilities()?;
        if let Some(name) = &options.name {
            if caps.card() != name.as_str() {
                return Ok(None);
            }
        }

        let cap_flags = caps.device_capabilities();
        let path = dev.path()?;
        log::debug!(
            "device {} ({}) capabilities: {:?}",
            caps.card(),
            path.display(),
            cap_flags,
        );

        if !cap_flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let (pixfmt, fract) = negotiate_format(&dev, options.frame)?;
        let capture = dev.video_capture(pixfmt)?;
        let format = capture.format();
        let resolution = Resolution::new(format.width(), format.height());
        let actual = capture.set_frame_interval(fract)?;

        log::info!(
            "opened {} ({}), {} @ {:.1}Hz",
            caps.card(),
            path.display(),
            resolution,
            1.0 / actual.as_f32(),
        );

        let stream = capture.into_stream()?;

        log::debug!("decoding frames with {:?}", options.jpeg_backend);

        Ok(Some(Self {
            stream,
            jpeg_backend: options.jpeg_backend,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        }))
    }

    /// Reads the next frame from the camera.
    ///
    /// If no frame is available, this method will block until one is. Webcams occasionally
    /// produce corrupted MJPG frames; those are returned as errors.
    pub fn read(&mut self) -> anyhow::Result<Image> {
        let dequeue_guard = self.t_dequeue.start();
        let t_decode = &self.t_decode;
        let backend = self.jpeg_backend;
        let image = self.stream.dequeue(|buf| {
            drop(dequeue_guard);
            Ok(t_decode.time(|| Image::decode_jpeg(backend, &buf)))
        })?;
        image.map_err(|e| e.context("webcam decode error"))
    }
}

impl FrameSource for Webcam {
    fn read_frame(&mut self) -> anyhow::Result<Image> {
        self.read()
    }

    /// Returns profiling timers for webcam access and decoding.
    fn timers(&self) -> Vec<&Timer> {
        vec![&self.t_dequeue, &self.t_decode]
    }
}
