//! Median-cut palette reduction.
//!
//! Boxes of pixels are split along the channel with the widest range, at the
//! median value of that channel, until the palette budget is reached or every
//! box holds a single color. Each pixel then takes the mean color of its box.
//! All orderings are total, so the same input always yields the same palette.

use image::Rgb;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quantized {
    pub palette: Vec<Rgb<u8>>,
    /// Palette index per input pixel, in input order.
    pub indices: Vec<u8>,
}

impl Quantized {
    pub fn color_at(&self, pixel: usize) -> Rgb<u8> {
        self.palette[usize::from(self.indices[pixel])]
    }
}

pub fn median_cut(pixels: &[Rgb<u8>], max_colors: usize) -> Quantized {
    let max_colors = max_colors.clamp(1, 256);
    if pixels.is_empty() {
        return Quantized {
            palette: Vec::new(),
            indices: Vec::new(),
        };
    }

    let mut boxes: Vec<Vec<usize>> = vec![(0..pixels.len()).collect()];
    while boxes.len() < max_colors {
        let Some(target) = widest_box(pixels, &boxes) else {
            break;
        };
        let members = boxes.remove(target);
        let (lower, upper) = split_box(pixels, members);
        boxes.insert(target, upper);
        boxes.insert(target, lower);
    }

    let mut palette = Vec::with_capacity(boxes.len());
    let mut indices = vec![0u8; pixels.len()];
    for (box_idx, members) in boxes.iter().enumerate() {
        palette.push(mean_color(pixels, members));
        for &member in members {
            indices[member] = box_idx as u8;
        }
    }
    Quantized { palette, indices }
}

fn channel_ranges(pixels: &[Rgb<u8>], members: &[usize]) -> [u8; 3] {
    let mut min = [u8::MAX; 3];
    let mut max = [u8::MIN; 3];
    for &member in members {
        let pixel = pixels[member];
        for ch in 0..3 {
            min[ch] = min[ch].min(pixel[ch]);
            max[ch] = max[ch].max(pixel[ch]);
        }
    }
    [max[0] - min[0], max[1] - min[1], max[2] - min[2]]
}

/// Index of the splittable box with the largest single-channel range; the
/// earliest box wins ties.
fn widest_box(pixels: &[Rgb<u8>], boxes: &[Vec<usize>]) -> Option<usize> {
    let mut best: Option<(usize, u8)> = None;
    for (idx, members) in boxes.iter().enumerate() {
        let range = channel_ranges(pixels, members).into_iter().max().unwrap_or(0);
        if range == 0 {
            continue;
        }
        if best.map(|(_, best_range)| range > best_range).unwrap_or(true) {
            best = Some((idx, range));
        }
    }
    best.map(|(idx, _)| idx)
}

fn split_box(pixels: &[Rgb<u8>], mut members: Vec<usize>) -> (Vec<usize>, Vec<usize>) {
    let ranges = channel_ranges(pixels, &members);
    let mut channel = 0;
    for ch in 1..3 {
        if ranges[ch] > ranges[channel] {
            channel = ch;
        }
    }

    members.sort_by_key(|&member| {
        let pixel = pixels[member];
        (pixel[channel], pixel.0, member)
    });
    let median = pixels[members[members.len() / 2]][channel];
    // Never split equal values across boxes; the box has a non-zero range on
    // `channel`, so one of the two cut points is interior.
    let mut cut = members.partition_point(|&member| pixels[member][channel] < median);
    if cut == 0 {
        cut = members.partition_point(|&member| pixels[member][channel] <= median);
    }
    let upper = members.split_off(cut);
    (members, upper)
}

fn mean_color(pixels: &[Rgb<u8>], members: &[usize]) -> Rgb<u8> {
    let count = members.len().max(1) as u64;
    let mut sums = [0u64; 3];
    for &member in members {
        let pixel = pixels[member];
        for ch in 0..3 {
            sums[ch] += u64::from(pixel[ch]);
        }
    }
    let mean = |sum: u64| ((sum + count / 2) / count) as u8;
    Rgb([mean(sums[0]), mean(sums[1]), mean(sums[2])])
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use image::Rgb;

    use super::median_cut;

    fn gradient(len: usize) -> Vec<Rgb<u8>> {
        (0..len)
            .map(|idx| {
                let v = (idx * 7 % 256) as u8;
                Rgb([v, v.wrapping_mul(3), 255 - v])
            })
            .collect()
    }

    #[test]
    fn uniform_input_keeps_a_single_color() {
        let pixels = vec![Rgb([200, 10, 10]); 1024];
        let quantized = median_cut(&pixels, 16);
        assert_eq!(quantized.palette, vec![Rgb([200, 10, 10])]);
        assert!(quantized.indices.iter().all(|idx| *idx == 0));
    }

    #[test]
    fn palette_never_exceeds_budget() {
        let pixels = gradient(1024);
        let quantized = median_cut(&pixels, 16);
        assert_eq!(quantized.palette.len(), 16);
        let used: HashSet<[u8; 3]> = (0..pixels.len())
            .map(|idx| quantized.color_at(idx).0)
            .collect();
        assert!(used.len() <= 16);
    }

    #[test]
    fn few_distinct_colors_are_preserved_exactly() {
        let colors = [Rgb([0, 0, 0]), Rgb([255, 0, 0]), Rgb([0, 0, 255])];
        let pixels: Vec<Rgb<u8>> = (0..300).map(|idx| colors[idx % 3]).collect();
        let quantized = median_cut(&pixels, 16);
        assert_eq!(quantized.palette.len(), 3);
        for (idx, pixel) in pixels.iter().enumerate() {
            assert_eq!(quantized.color_at(idx), *pixel);
        }
    }

    #[test]
    fn split_uses_widest_channel_and_box_means() {
        let pixels = vec![
            Rgb([10, 0, 0]),
            Rgb([20, 0, 0]),
            Rgb([200, 0, 0]),
            Rgb([220, 0, 0]),
        ];
        let quantized = median_cut(&pixels, 2);
        assert_eq!(quantized.palette, vec![Rgb([15, 0, 0]), Rgb([210, 0, 0])]);
        assert_eq!(quantized.indices, vec![0, 0, 1, 1]);
    }

    #[test]
    fn quantization_is_deterministic() {
        let pixels = gradient(777);
        assert_eq!(median_cut(&pixels, 16), median_cut(&pixels, 16));
    }

    #[test]
    fn empty_input_yields_empty_palette() {
        let quantized = median_cut(&[], 16);
        assert!(quantized.palette.is_empty());
        assert!(quantized.indices.is_empty());
    }
}
