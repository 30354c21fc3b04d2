use video_dataset::{mask_img_stack, reg_img_stack, rescale_img_stack, ImageStack};

fn gradient_stack(h: usize, w: usize, phases: usize, samples: usize) -> ImageStack {
    let mut data = Vec::with_capacity(h * w * phases * samples);
    for s in 0..samples {
        for p in 0..phases {
            for y in 0..h {
                for x in 0..w {
                    data.push((x + 2 * y + 3 * p + 5 * s) as f32);
                }
            }
        }
    }
    ImageStack::new(h, w, phases, samples, data).expect("stack")
}

#[test]
fn registration_to_own_landmarks_is_identity() {
    let stack = gradient_stack(24, 24, 2, 3);
    let coords = vec![[4.0, 4.0, 16.0, 18.0]; 3];
    let (registered, max_dist) = reg_img_stack(&stack, &coords, None).expect("register");
    assert_eq!(max_dist, vec![0.0; 3]);
    for (a, b) in registered.data.iter().zip(stack.data.iter()) {
        assert!((a - b).abs() < 1e-4);
    }
}

#[test]
fn registration_undoes_translation() {
    let stack = gradient_stack(16, 16, 1, 2);
    // Second sample's landmarks sit one pixel to the right of the first's.
    let coords = vec![[4.0, 4.0, 10.0, 8.0], [5.0, 4.0, 11.0, 8.0]];
    let (registered, max_dist) = reg_img_stack(&stack, &coords, None).expect("register");
    assert!((max_dist[1] - 1.0).abs() < 1e-5);
    // Output (x, y) samples source (x + 1, y).
    let expected = stack.get(3, 6, 0, 1);
    assert!((registered.get(3, 5, 0, 1) - expected).abs() < 1e-4);
}

#[test]
fn registration_requires_one_row_per_sample() {
    let stack = gradient_stack(8, 8, 1, 3);
    assert!(reg_img_stack(&stack, &[[0.0, 0.0, 4.0, 4.0]; 2], None).is_err());
}

#[test]
fn rescale_rounds_output_size() {
    let stack = gradient_stack(30, 20, 2, 2);
    for scale in [4.0f32, 8.0] {
        let out = rescale_img_stack(&stack, scale).expect("rescale");
        assert_eq!(out.height, (30.0 / scale).round() as usize);
        assert_eq!(out.width, (20.0 / scale).round() as usize);
        assert_eq!((out.phases, out.samples), (2, 2));
    }
    assert!(rescale_img_stack(&stack, 0.0).is_err());
}

#[test]
fn masking_zeroes_only_masked_pixels() {
    let stack = gradient_stack(4, 4, 2, 2);
    let mask: Vec<u8> = (0..16).map(|i| (i % 3 != 0) as u8).collect();
    let masked = mask_img_stack(&stack, &mask).expect("mask");
    for s in 0..2 {
        for p in 0..2 {
            for (i, (&m, &v)) in mask.iter().zip(masked.image(p, s)).enumerate() {
                if m == 0 {
                    assert_eq!(v, 0.0);
                } else {
                    assert_eq!(v, stack.image(p, s)[i]);
                }
            }
        }
    }
    assert!(mask_img_stack(&stack, &mask[..8]).is_err());
}
