//! Square falloff mask that fades a height layer out towards the window edges.

use super::height_field::HeightField;

const FALLOFF_STEEPNESS: f32 = 3.0;
const FALLOFF_SHIFT: f32 = 2.2;

/// Builds a `width` x `height` mask that is ~0 in the middle and rises to 1 at the edges.
pub fn falloff_map(width: usize, height: usize) -> HeightField {
    let mut values = Vec::with_capacity(width * height);
    for j in 0..height {
        for i in 0..width {
            let x = i as f32 / width as f32 * 2.0 - 1.0;
            let y = j as f32 / height as f32 * 2.0 - 1.0;
            values.push(evaluate(x.abs().max(y.abs())));
        }
    }
    HeightField::from_values(width, height, values)
}

/// Subtracts the falloff mask from `field`, keeping the result in [0, 1].
pub fn apply_falloff(field: &HeightField) -> HeightField {
    let mask = falloff_map(field.width(), field.height());
    field.map(|x, y, v| (v - mask.get_or_zero(x as i32, y as i32)).clamp(0.0, 1.0))
}

fn evaluate(value: f32) -> f32 {
    let a = FALLOFF_STEEPNESS;
    let b = FALLOFF_SHIFT;
    let rising = value.powf(a);
    rising / (rising + (b - b * value).powf(a))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_is_low_in_center_and_high_at_edges() {
        let mask = falloff_map(21, 21);
        let center = mask.get(10, 10).unwrap();
        let corner = mask.get(0, 0).unwrap();
        assert!(center < 0.01, "center should barely fade, got {center}");
        assert!(corner > 0.99, "corner should fade completely, got {corner}");
    }

    #[test]
    fn test_applied_falloff_never_goes_negative() {
        let field = HeightField::flat(9, 9, 0.3);
        let faded = apply_falloff(&field);
        assert!(faded.min_value() >= 0.0);
        assert!(faded.max_value() <= 0.3);
    }
}
