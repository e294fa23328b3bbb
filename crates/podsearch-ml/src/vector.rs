//! Vector helpers shared by the embedding engines

/// Normalize a vector to unit length; near-zero vectors are returned as-is
pub fn normalize_vector(v: &[f32]) -> Vec<f32> {
    let sum_sq: f64 = v.iter().map(|&x| (x as f64) * (x as f64)).sum();

    if sum_sq < 1e-10 {
        return v.to_vec();
    }

    let norm = (1.0 / sum_sq.sqrt()) as f32;
    v.iter().map(|&x| x * norm).collect()
}

/// Average token vectors `[tokens, hidden]` (row-major) over positions whose
/// mask is non-zero
pub fn mean_pool(hidden: &[f32], mask: &[i64], hidden_size: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden_size];
    let mut count = 0usize;

    for (row, &m) in hidden.chunks(hidden_size).zip(mask) {
        if m == 0 {
            continue;
        }
        for (acc, &x) in pooled.iter_mut().zip(row) {
            *acc += x;
        }
        count += 1;
    }

    if count > 0 {
        let scale = 1.0 / count as f32;
        pooled.iter_mut().for_each(|x| *x *= scale);
    }
    pooled
}
