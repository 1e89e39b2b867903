// Finite-difference checks of the hand-written backward passes.

use approx::assert_relative_eq;
use inception_net::utils::concat::BranchConcat;
use inception_net::utils::conv2d::Conv2d;
use inception_net::utils::linear::LinearLayer;
use inception_net::utils::mat::Matrix;
use inception_net::utils::misc::{random_shuffle, SeedRng};
use inception_net::utils::nn_trait::Layer;
use inception_net::utils::pad::ZeroPad2d;
use inception_net::utils::pool::{AvgPool2d, GlobalAvgPool, MaxPool2d};
use inception_net::utils::sequential::Sequential;
use inception_net::utils::shape::Shape;

const EPS: f32 = 1e-2;

fn random_matrix(rows: usize, cols: usize, seed: u32) -> Matrix {
    let mut rng = SeedRng::new(seed);
    Matrix::from_vec(
        rows,
        cols,
        (0..rows * cols).map(|_| rng.uniform(-1.0, 1.0)).collect(),
    )
}

// L = sum(forward(x) * r)
fn weighted_sum<L: Layer>(layer: &mut L, x: &Matrix, r: &Matrix) -> f32 {
    let out = layer.forward(x.clone());
    out.as_slice()
        .iter()
        .zip(r.as_slice().iter())
        .map(|(a, b)| a * b)
        .sum()
}

fn check_input_gradient<L: Layer>(layer: &mut L, x: &Matrix, eps: f32) {
    let out_len = layer.output_shape().len();
    let r = random_matrix(x.number_of_row(), out_len, 77);
    layer.forward(x.clone());
    let analytic = layer.backward(r.clone());
    assert_eq!(analytic.shape(), x.shape());

    for j in 0..x.as_slice().len() {
        let mut plus = x.clone();
        plus.as_mut_slice()[j] += eps;
        let mut minus = x.clone();
        minus.as_mut_slice()[j] -= eps;
        let numeric =
            (weighted_sum(layer, &plus, &r) - weighted_sum(layer, &minus, &r)) / (2.0 * eps);
        assert_relative_eq!(analytic.as_slice()[j], numeric, epsilon = 1e-2);
    }
}

#[test]
fn conv_strided_padded_input_gradient() {
    let mut rng = SeedRng::new(3);
    let mut conv = Conv2d::new(Shape::new(5, 5, 2), 3, 3, 2, 1, &mut rng).unwrap();
    let x = random_matrix(2, 50, 4);
    check_input_gradient(&mut conv, &x, EPS);
}

#[test]
fn conv_weight_gradient() {
    let mut rng = SeedRng::new(3);
    let mut conv = Conv2d::new(Shape::new(4, 4, 2), 2, 3, 1, 0, &mut rng).unwrap();
    let x = random_matrix(2, 32, 5);
    let r = random_matrix(2, conv.output_shape().len(), 6);
    conv.forward(x.clone());
    conv.backward(r.clone());
    let analytic = conv.weight.grad.clone();
    let bias_analytic = conv.bias.grad.clone();

    for j in 0..analytic.as_slice().len() {
        conv.weight.value.as_mut_slice()[j] += EPS;
        let plus = weighted_sum(&mut conv, &x, &r);
        conv.weight.value.as_mut_slice()[j] -= 2.0 * EPS;
        let minus = weighted_sum(&mut conv, &x, &r);
        conv.weight.value.as_mut_slice()[j] += EPS;
        let numeric = (plus - minus) / (2.0 * EPS);
        assert_relative_eq!(analytic.as_slice()[j], numeric, epsilon = 1e-2);
    }
    // bias gradient is the sum of the upstream gradient per channel
    let mut expected = vec![0.0; 2];
    for (i, v) in r.as_slice().iter().enumerate() {
        expected[i % 2] += v;
    }
    for c in 0..2 {
        assert_relative_eq!(bias_analytic.as_slice()[c], expected[c], epsilon = 1e-4);
    }
}

#[test]
fn linear_input_gradient() {
    let mut rng = SeedRng::new(8);
    let mut fc = LinearLayer::new(6, 4, &mut rng);
    let x = random_matrix(3, 6, 9);
    check_input_gradient(&mut fc, &x, EPS);
}

#[test]
fn avg_pool_input_gradient() {
    let mut pool = AvgPool2d::new(Shape::new(6, 6, 2), 5, 3, 1).unwrap();
    let x = random_matrix(2, 72, 10);
    check_input_gradient(&mut pool, &x, EPS);
}

#[test]
fn max_pool_input_gradient() {
    let shape = Shape::new(7, 7, 2);
    let mut pool = MaxPool2d::new(shape, 3, 2).unwrap();
    // well separated values so the perturbation never changes a window's winner
    let mut order = (0..shape.len()).collect::<Vec<_>>();
    random_shuffle(&mut order, 12);
    let x = Matrix::from_vec(1, shape.len(), order.iter().map(|v| *v as f32 * 0.1).collect());
    check_input_gradient(&mut pool, &x, 1e-3);
}

#[test]
fn zero_pad_and_global_pool_input_gradient() {
    let mut pad = ZeroPad2d::new(Shape::new(3, 2, 2), 2);
    check_input_gradient(&mut pad, &random_matrix(2, 12, 13), EPS);
    let mut pool = GlobalAvgPool::new(Shape::new(3, 3, 4));
    check_input_gradient(&mut pool, &random_matrix(2, 36, 14), EPS);
}

#[test]
fn branch_concat_input_gradient() {
    let shape = Shape::new(4, 4, 2);
    let mut rng = SeedRng::new(15);
    let mut conv_branch = Sequential::new(shape);
    conv_branch.push(Conv2d::new(shape, 3, 3, 1, 1, &mut rng).unwrap());
    let mut one_by_one = Sequential::new(shape);
    one_by_one.push(Conv2d::new(shape, 1, 1, 1, 0, &mut rng).unwrap());
    let mut pool_branch = Sequential::new(shape);
    pool_branch.push(AvgPool2d::new(shape, 3, 1, 1).unwrap());
    let mut block =
        BranchConcat::new(shape, vec![conv_branch, one_by_one, pool_branch]).unwrap();
    assert_eq!(block.output_shape(), Shape::new(4, 4, 6));
    check_input_gradient(&mut block, &random_matrix(2, 32, 16), EPS);
}
