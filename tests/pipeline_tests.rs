//! # Pipeline Tests
//!
//! End-to-end checks from an RGBA frame (or image file) to the escaped
//! payload that goes on the wire.

use image::{Rgba, RgbaImage};
use paperlink::config::ImageConfig;
use paperlink::render::dither::{self, INK, Kernel, PAPER};
use paperlink::render::planes::{self, BlendOrder, PrintJob};
use paperlink::render::{self, canvas, canvas::Alignment, classify::Classifier};
use paperlink::{ColorMode, DisplayConfig, PaperlinkError};
use pretty_assertions::assert_eq;

const DISPLAY: DisplayConfig = DisplayConfig::IL075;

fn solid(color: [u8; 3]) -> RgbaImage {
    RgbaImage::from_pixel(
        DISPLAY.width,
        DISPLAY.height,
        Rgba([color[0], color[1], color[2], 255]),
    )
}

/// Horizontal gray ramp with a red band and a yellow band.
fn test_card() -> RgbaImage {
    RgbaImage::from_fn(DISPLAY.width, DISPLAY.height, |x, y| {
        if (100..140).contains(&y) {
            Rgba([230, 20, 20, 255])
        } else if (200..240).contains(&y) {
            Rgba([250, 220, 10, 255])
        } else {
            let v = (x * 255 / (DISPLAY.width - 1)) as u8;
            Rgba([v, v, v, 255])
        }
    })
}

fn job(frame: &RgbaImage, mode: ColorMode) -> Result<PrintJob, PaperlinkError> {
    let config = ImageConfig::default();
    render::separate(frame, mode, &config).into_job(&DISPLAY, mode, &config.blend_order)
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn test_all_white_bw_plane() {
    let job = job(&solid([255, 255, 255]), ColorMode::Bw).unwrap();
    assert_eq!(job.len(), 48_000);
    assert!(job.payload().iter().all(|&b| b == 0xFF));
}

#[test]
fn test_all_black_bw_plane() {
    let job = job(&solid([0, 0, 0]), ColorMode::Bw).unwrap();
    assert!(job.payload().iter().all(|&b| b == 0x00));
}

#[test]
fn test_combined_row_scenario() {
    let row = |ink: [bool; 4]| {
        RgbaImage::from_fn(4, 1, |x, _| if ink[x as usize] { INK } else { PAPER })
    };
    let black = row([true, false, false, false]);
    let red = row([false, false, false, true]);
    let yellow = row([false; 4]);

    let order = "black,red,yellow".parse::<BlendOrder>().unwrap();
    let plane = planes::encode_combined(&black, &red, &yellow, &order).unwrap();
    assert_eq!(plane, vec![0b00_01_01_11]);
}

// ============================================================================
// PLANE PROPERTIES
// ============================================================================

#[test]
fn test_payload_lengths_per_mode() {
    let card = test_card();
    assert_eq!(job(&card, ColorMode::Bw).unwrap().len(), 48_000);
    assert_eq!(job(&card, ColorMode::Bwr).unwrap().len(), 96_000);
    assert_eq!(job(&card, ColorMode::Bwry).unwrap().len(), 96_000);
}

#[test]
fn test_payload_never_contains_cr() {
    let card = test_card();
    for mode in [ColorMode::Bw, ColorMode::Bwr, ColorMode::Bwry] {
        let job = job(&card, mode).unwrap();
        assert!(!job.payload().contains(&planes::CR), "{:?}", mode);
    }
}

#[test]
fn test_escape_touches_only_cr() {
    let mut all: Vec<u8> = (0..=255).collect();
    planes::escape(&mut all);
    for (i, &b) in all.iter().enumerate() {
        let expected = if i == 0x0D { 0x0C } else { i as u8 };
        assert_eq!(b, expected);
    }
}

#[test]
fn test_unpacking_reproduces_dithered_image() {
    let classifier = Classifier::Grayscale { threshold: 128 };
    let dithered = dither::dither(&test_card(), &classifier, Kernel::Atkinson);
    let plane = planes::encode(&dithered);
    assert_eq!(plane.len(), DISPLAY.plane_len());

    for (i, pixel) in dithered.pixels().enumerate() {
        let paper = plane[i / 8] & (0x80 >> (i % 8)) != 0;
        assert_eq!(paper, !planes::is_ink(pixel), "pixel {}", i);
    }
}

#[test]
fn test_dithering_is_deterministic() {
    let card = test_card();
    for kernel in [
        Kernel::FloydSteinberg,
        Kernel::JarvisJudiceNinke,
        Kernel::Stucki,
        Kernel::Atkinson,
        Kernel::Burkes,
        Kernel::Sierra,
    ] {
        let classifier = Classifier::Grayscale { threshold: 128 };
        let a = dither::dither(&card, &classifier, kernel);
        let b = dither::dither(&card, &classifier, kernel);
        assert!(a == b, "{:?} is not deterministic", kernel);
    }
}

#[test]
fn test_color_bands_land_in_color_planes() {
    let config = ImageConfig::default();
    let planes = render::separate(&test_card(), ColorMode::Bwry, &config);
    let red = planes.red.unwrap();
    let yellow = planes.yellow.unwrap();

    // Middle of the bands, away from dithering edges
    assert!(planes::is_ink(red.get_pixel(400, 120)));
    assert!(!planes::is_ink(yellow.get_pixel(400, 120)));
    assert!(planes::is_ink(yellow.get_pixel(400, 220)));
    assert!(!planes::is_ink(red.get_pixel(400, 220)));
    // Gray ramp never reaches the color planes
    assert!(!planes::is_ink(red.get_pixel(10, 10)));
    assert!(!planes::is_ink(yellow.get_pixel(10, 10)));
}

#[test]
fn test_saturated_red_stays_red_with_defaults() {
    let config = ImageConfig::default();
    let frame = solid([255, 0, 0]);

    let bwr = render::separate(&frame, ColorMode::Bwr, &config);
    let preview = canvas::preview(&bwr, &config.blend_order);
    assert_eq!(*preview.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
    assert_eq!(*preview.get_pixel(799, 479), Rgba([255, 0, 0, 255]));

    let job = job(&frame, ColorMode::Bwry).unwrap();
    assert_eq!(job.payload()[0], 0b11_11_11_11);
    assert!(job.payload().iter().all(|&b| b == 0xFF));
}

#[test]
fn test_wrong_plane_length_rejected_before_encoding() {
    let err = PrintJob::bwr(&DISPLAY, vec![0; 48_000], vec![0; 100]).unwrap_err();
    assert!(err.to_string().contains("RW image data length mismatch"));
}

// ============================================================================
// IMAGE FILES
// ============================================================================

#[test]
fn test_prepare_and_preview_from_file() {
    let dir = std::env::temp_dir().join(format!("paperlink-pipeline-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let input = dir.join("input.png");
    let output = dir.join("preview.png");

    // 200x100 red image, transparent left half
    let img = RgbaImage::from_fn(200, 100, |x, _| {
        if x < 100 { Rgba([0, 0, 0, 0]) } else { Rgba([255, 0, 0, 255]) }
    });
    img.save(&input).unwrap();

    let frame = canvas::prepare(&input, &DISPLAY, Alignment::TopLeft, false).unwrap();
    assert_eq!(frame.dimensions(), (800, 480));
    assert_eq!(*frame.get_pixel(50, 50), Rgba([255, 255, 255, 255]));
    assert_eq!(*frame.get_pixel(150, 50), Rgba([255, 0, 0, 255]));
    assert_eq!(*frame.get_pixel(300, 300), Rgba([255, 255, 255, 255]));

    let config = ImageConfig::default();
    let planes = render::separate(&frame, ColorMode::Bwr, &config);
    let preview = canvas::preview(&planes, &config.blend_order);
    canvas::save(&preview, &output).unwrap();

    let reloaded = image::open(&output).unwrap().to_rgba8();
    std::fs::remove_dir_all(&dir).unwrap();

    assert_eq!(reloaded.dimensions(), (800, 480));
    assert_eq!(*reloaded.get_pixel(300, 300), Rgba([255, 255, 255, 255]));
}

#[test]
fn test_missing_image_file() {
    let err = canvas::prepare("/nonexistent/photo.png", &DISPLAY, Alignment::Middle, false)
        .unwrap_err();
    assert!(matches!(err, PaperlinkError::Image(_)));
}
