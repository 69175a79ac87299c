//! Neural Network inference.

use std::{
    ops::{Index, RangeInclusive},
    path::Path,
    sync::Arc,
};

use ndarray::{Array4, ArrayD};
use tract_onnx::prelude::{
    Framework, Graph, InferenceModelExt, SimplePlan, TValue, TVec, TypedFact, TypedOp,
};

use crate::{
    image::{Color, Image, Resolution},
    rect::RotatedRect,
};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A convolutional neural network (CNN) that operates on image data.
///
/// Like the underlying [`NeuralNetwork`], this is a cheaply [`Clone`]able handle to the underlying
/// data.
#[derive(Clone)]
pub struct Cnn {
    nn: NeuralNetwork,
    shape: CnnInputShape,
    input_res: Resolution,
    color_mapper: ColorMapper,
}

impl Cnn {
    /// Creates a CNN wrapper from a [`NeuralNetwork`].
    ///
    /// The network must have exactly one input of shape `[1, 3, H, W]` or `[1, H, W, 3]`.
    pub fn new(nn: NeuralNetwork, color_mapper: ColorMapper) -> anyhow::Result<Self> {
        if nn.num_inputs() != 1 {
            anyhow::bail!(
                "CNN network has to take exactly 1 input, this one takes {}",
                nn.num_inputs(),
            );
        }

        let tensor_shape = nn.input_shape(0)?;
        let (shape, w, h) = match *tensor_shape {
            [1, 3, h, w] => (CnnInputShape::NCHW, w, h),
            [1, h, w, 3] => (CnnInputShape::NHWC, w, h),
            _ => anyhow::bail!("invalid CNN input shape {:?}", tensor_shape),
        };

        let (w, h): (u32, u32) = (w.try_into()?, h.try_into()?);
        let input_res = Resolution::new(w, h);
        log::trace!("CNN input: {input_res} {shape:?}");

        Ok(Self {
            nn,
            shape,
            input_res,
            color_mapper,
        })
    }

    /// Returns the expected input image size.
    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Runs the network on a region of an input image, returning the estimated outputs.
    ///
    /// `roi` is sampled to create the network's input tensor, so that the top of a rotated `roi`
    /// becomes the top of the input. Parts of `roi` that lie outside of `image` are treated as
    /// black. If the aspect ratio of `roi` does not match the network's input aspect ratio, the
    /// image will be stretched.
    pub fn estimate(&self, image: &Image, roi: impl Into<RotatedRect>) -> anyhow::Result<Outputs> {
        let roi = roi.into();
        let (w, h) = (
            self.input_res.width() as usize,
            self.input_res.height() as usize,
        );
        let pixels: Vec<[f32; 3]> = sample_roi(image, roi, self.input_res)
            .into_iter()
            .map(|color| self.color_mapper.map(color))
            .collect();

        let tensor = match self.shape {
            CnnInputShape::NCHW => {
                Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| pixels[y * w + x][c])
            }
            CnnInputShape::NHWC => {
                Array4::from_shape_fn((1, h, w, 3), |(_, y, x, c)| pixels[y * w + x][c])
            }
        };

        self.nn.estimate(&Inputs::from(tensor.into_dyn()))
    }
}

/// Samples `roi` at the centers of a `res`-sized grid, using nearest-neighbor lookup.
///
/// Returns the colors in row-major order.
fn sample_roi(image: &Image, roi: RotatedRect, res: Resolution) -> Vec<Color> {
    let (w, h) = (res.width(), res.height());
    let mut out = Vec::with_capacity(res.num_pixels() as usize);
    for y in 0..h {
        for x in 0..w {
            let u = (x as f32 + 0.5) / w as f32;
            let v = (y as f32 + 0.5) / h as f32;
            let [px, py] = roi.transform_out(u, v);
            out.push(image.get_or_null(px.floor() as i32, py.floor() as i32));
        }
    }
    out
}

#[derive(Clone)]
enum ColorMapperKind {
    Linear { target_range: RangeInclusive<f32> },
}

/// Maps sRGB pixel colors to the value range a network expects.
#[derive(Clone)]
pub struct ColorMapper {
    kind: ColorMapperKind,
}

impl ColorMapper {
    /// Creates a simple color mapper that uniformly maps sRGB values to `target_range`.
    ///
    /// Note that this operates on *non-linear* sRGB colors, but maps them linearly to the target
    /// range.
    pub fn linear(target_range: RangeInclusive<f32>) -> Self {
        let start = *target_range.start();
        let end = *target_range.end();
        assert!(end > start);

        Self {
            kind: ColorMapperKind::Linear { target_range },
        }
    }

    fn map(&self, color: Color) -> [f32; 3] {
        match &self.kind {
            ColorMapperKind::Linear { target_range } => {
                let start = *target_range.start();
                let end = *target_range.end();

                let adjust_range = (end - start) / 255.0;
                let rgb = [color.r(), color.g(), color.b()];
                rgb.map(|col| col as f32 * adjust_range + start)
            }
        }
    }
}

/// Describes in what order a CNN expects its input image data.
///
/// - `N` is the number of images, often fixed at 1.
/// - `C` is the number of color channels, often 3 for RGB inputs.
/// - `H` and `W` are the height and width of the input, respectively.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CnnInputShape {
    /// Shape is `[N, C, H, W]`.
    NCHW,
    /// Shape is `[N, H, W, C]`.
    NHWC,
}

/// A neural network that can be used for inference.
///
/// This is a cheaply [`Clone`]able handle to the underlying network structures.
#[derive(Clone)]
pub struct NeuralNetwork(Arc<Model>);

impl NeuralNetwork {
    /// Loads a pre-trained model from an ONNX file path.
    ///
    /// The path must have a `.onnx` extension.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Self::load_impl(path.as_ref())
    }

    fn load_impl(path: &Path) -> anyhow::Result<Self> {
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => anyhow::bail!(
                "neural network file '{}' must have `.onnx` extension",
                path.display()
            ),
        }

        let model_data = std::fs::read(path)
            .map_err(|e| anyhow::anyhow!("failed to read '{}': {e}", path.display()))?;
        Self::from_onnx(&model_data)
    }

    /// Loads and optimizes a pre-trained model from an in-memory ONNX file.
    ///
    /// Returns an error if the network data is malformed, if the network data is incomplete, or if
    /// the network uses unimplemented operations.
    pub fn from_onnx(raw: &[u8]) -> anyhow::Result<Self> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut &*raw)?
            .into_optimized()?
            .into_runnable()?;
        Ok(Self(Arc::new(model)))
    }

    /// Returns the number of input nodes of the network.
    pub fn num_inputs(&self) -> usize {
        self.0.model().inputs.len()
    }

    /// Returns the tensor shape of input `index`.
    pub fn input_shape(&self, index: usize) -> anyhow::Result<Vec<usize>> {
        let fact = self.0.model().input_fact(index)?;
        match fact.shape.as_concrete() {
            Some(shape) => Ok(shape.to_vec()),
            None => anyhow::bail!("network input {index} has symbolic shape {:?}", fact.shape),
        }
    }

    /// Runs the network on a set of [`Inputs`], returning the estimated [`Outputs`].
    #[doc(alias = "infer")]
    pub fn estimate(&self, inputs: &Inputs) -> anyhow::Result<Outputs> {
        let outputs = self.0.run(
            inputs
                .inner
                .iter()
                .map(|t| TValue::from_const(Arc::new(t.clone().into())))
                .collect(),
        )?;
        let inner = outputs
            .iter()
            .map(|t| Ok(t.to_array_view::<f32>()?.to_owned()))
            .collect::<anyhow::Result<_>>()?;
        Ok(Outputs { inner })
    }
}

/// The result of a neural network inference pass.
///
/// This is a list of tensors corresponding to the network's output nodes.
#[derive(Debug)]
pub struct Outputs {
    inner: TVec<ArrayD<f32>>,
}

impl Outputs {
    /// Returns the number of tensors in this inference output.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl Index<usize> for Outputs {
    type Output = ArrayD<f32>;

    fn index(&self, index: usize) -> &ArrayD<f32> {
        &self.inner[index]
    }
}

/// List of input tensors for neural network inference.
#[derive(Debug)]
pub struct Inputs {
    inner: TVec<ArrayD<f32>>,
}

impl From<ArrayD<f32>> for Inputs {
    fn from(t: ArrayD<f32>) -> Self {
        Self {
            inner: std::iter::once(t).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use crate::rect::Rect;

    use super::*;

    #[test]
    fn color_mapper() {
        let mapper = ColorMapper::linear(-1.0..=1.0);
        assert_eq!(mapper.map(Color::BLACK), [-1.0, -1.0, -1.0]);
        assert_eq!(mapper.map(Color::WHITE), [1.0, 1.0, 1.0]);

        let mapper = ColorMapper::linear(0.0..=1.0);
        assert_eq!(mapper.map(Color::BLACK), [0.0, 0.0, 0.0]);
        assert_eq!(mapper.map(Color::RED), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn sample_roi_outside_is_black() {
        let mut image = Image::new(4, 4);
        image.clear(Color::WHITE);

        // Left half of the RoI lies outside of the image.
        let roi = Rect::from_top_left(-4.0, 0.0, 8.0, 4.0);
        let colors = sample_roi(&image, roi.into(), Resolution::new(2, 1));
        assert_eq!(colors, [Color::NULL, Color::WHITE]);
    }

    #[test]
    fn sample_roi_nearest() {
        let mut image = Image::new(4, 2);
        image.set(1, 0, Color::RED);
        image.set(3, 1, Color::BLUE);
        let colors = sample_roi(
            &image,
            Rect::from_top_left(0.0, 0.0, 4.0, 2.0).into(),
            Resolution::new(2, 2),
        );
        assert_eq!(colors[0], Color::RED);
        assert_eq!(colors[3], Color::BLUE);
    }

    #[test]
    fn sample_roi_rotated() {
        let mut image = Image::new(4, 4);
        image.clear(Color::BLACK);
        image.set(3, 1, Color::RED);

        // Turned a quarter clockwise, the top row of the sampled grid comes from the right column of
        // the image.
        let roi = RotatedRect::new(Rect::from_top_left(0.0, 0.0, 4.0, 4.0), FRAC_PI_2);
        let colors = sample_roi(&image, roi, Resolution::new(4, 4));
        assert_eq!(colors.iter().filter(|&&c| c == Color::RED).count(), 1);
        assert_eq!(colors[1], Color::RED);
    }

    #[test]
    fn load_requires_onnx_extension() {
        let err = NeuralNetwork::load("model.tflite").err().unwrap();
        assert!(err.to_string().contains("`.onnx`"), "{err}");
    }
}
