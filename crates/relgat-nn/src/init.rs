//! Parameter initializers not provided by `candle_nn::init`.

use candle_nn::Init;

/// Glorot/Xavier-uniform: `U(-b, b)` with `b = sqrt(6 / (fan_in + fan_out))`.
///
/// For tensors of rank > 2 the reference convention takes the last two
/// dimensions as `(fan_in, fan_out)`.
pub fn glorot(fan_in: usize, fan_out: usize) -> Init {
    xavier_uniform(fan_in, fan_out, 1.0)
}

/// Xavier-uniform scaled by `gain` (e.g. `sqrt(2)` ahead of a ReLU).
pub fn xavier_uniform(fan_in: usize, fan_out: usize, gain: f64) -> Init {
    let bound = gain * (6.0 / (fan_in + fan_out).max(1) as f64).sqrt();
    Init::Uniform { lo: -bound, up: bound }
}
