//! Video input.

pub mod webcam;

use crate::{image::Image, timer::Timer};

/// A pull-based source of video frames.
pub trait FrameSource {
    /// Reads the next frame, blocking until one is available.
    ///
    /// Errors may be transient (eg. a corrupted frame), so callers can retry.
    fn read_frame(&mut self) -> anyhow::Result<Image>;

    /// Returns profiling timers, if the source keeps any.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn read_frame(&mut self) -> anyhow::Result<Image> {
        (**self).read_frame()
    }

    fn timers(&self) -> Vec<&Timer> {
        (**self).timers()
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read_frame(&mut self) -> anyhow::Result<Image> {
        (**self).read_frame()
    }

    fn timers(&self) -> Vec<&Timer> {
        (**self).timers()
    }
}

/// A [`FrameSource`] that opens the underlying source on first use.
///
/// If opening fails, the failure is returned from [`read_frame`][FrameSource::read_frame] like any
/// other frame error, and the next call tries to open the source again.
pub struct Reopen<S, F> {
    open: F,
    source: Option<S>,
}

impl<S, F> Reopen<S, F>
where
    S: FrameSource,
    F: FnMut() -> anyhow::Result<S>,
{
    pub fn new(open: F) -> Self {
        Self { open, source: None }
    }
}

impl<S, F> FrameSource for Reopen<S, F>
where
    S: FrameSource,
    F: FnMut() -> anyhow::Result<S>,
{
    fn read_frame(&mut self) -> anyhow::Result<Image> {
        let source = match &mut self.source {
            Some(source) => source,
            None => self.source.insert((self.open)()?),
        };
        source.read_frame()
    }

    fn timers(&self) -> Vec<&Timer> {
        self.source.as_ref().map_or_else(Vec::new, S::timers)
    }
}

#[cfg(test)]
mod tests {
    use crate::test::StubFrames;

    use super::*;

    #[test]
    fn reopen_retries_until_open() {
        let mut attempts = 0;
        let mut source = Reopen::new(|| {
            attempts += 1;
            if attempts < 3 {
                anyhow::bail!("no camera");
            }
            Ok(StubFrames::blank(4, 4))
        });

        assert!(source.read_frame().is_err());
        assert!(source.read_frame().is_err());
        assert!(source.read_frame().is_ok());
        assert!(source.read_frame().is_ok());
        drop(source);
        assert_eq!(attempts, 3);
    }
}
