//! Overlap-add window

/// Minimum weight of any window tap and of the accumulated weight sum
pub const WINDOW_FLOOR: f32 = 1e-4;

/// Symmetric Hann window of `len` taps, clamped to [`WINDOW_FLOOR`]
///
/// `w[n] = 0.5 - 0.5 * cos(2πn / (len - 1))`. A one-tap window is `[1.0]`.
pub fn create_hann_window(len: usize) -> Vec<f32> {
    match len {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let denom = (len - 1) as f64;
            (0..len)
                .map(|i| {
                    let phase = 2.0 * std::f64::consts::PI * i as f64 / denom;
                    ((0.5 - 0.5 * phase.cos()) as f32).max(WINDOW_FLOOR)
                })
                .collect()
        }
    }
}
