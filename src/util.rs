pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Population standard deviation.
pub fn std_dev(data: &[f64]) -> Option<f64> {
    let data_mean = mean(data)?;
    let variance = data
        .iter()
        .map(|value| {
            let diff = data_mean - *value;

            diff * diff
        })
        .sum::<f64>()
        / data.len() as f64;

    Some(variance.sqrt())
}

/// Standard deviation relative to the mean. None for empty input or a zero mean.
pub fn coefficient_of_variation(data: &[f64]) -> Option<f64> {
    let data_mean = mean(data)?;
    if data_mean == 0.0 {
        return None;
    }
    std_dev(data).map(|sd| sd / data_mean)
}
