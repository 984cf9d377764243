use machine_learning::arch::{Sequential, layers::Layer};

/// The amount of classes every MNIST-family dataset has.
pub const NUM_CLASSES: usize = 10;

/// Builds the classifier for `28x28` single channel images.
///
/// Two `5x5` convolutions each followed by a relu and a `2x2` max pool, then two dense layers.
/// The output is a log-probability per class.
pub fn mnist_net() -> Sequential {
    Sequential::new([
        Layer::conv2d("conv1", (1, 20), 5),
        Layer::relu(),
        Layer::max_pool2d(2),
        Layer::conv2d("conv2", (20, 50), 5),
        Layer::relu(),
        Layer::max_pool2d(2),
        Layer::flatten(),
        Layer::dense("fc1", (4 * 4 * 50, 500)),
        Layer::relu(),
        Layer::dense("fc2", (500, NUM_CLASSES)),
        Layer::log_softmax(),
    ])
}
