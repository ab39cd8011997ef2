#![cfg(feature = "ffmpeg")]

use std::path::{Path, PathBuf};

use clip_cutter::{
    clipping::{Clipping, ClippingConversion, ClippingKey, ConversionOptions, NoProgress},
    error::{EncodeError, OpenError},
    video::{Decoder, Encoder, EncoderSettings, FrameSink, FrameSource},
};
use tempfile::tempdir;

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;
const FPS: f64 = 25.0;
const FRAMES: usize = 30;

/// Uniform gray level of the 1-based `frame` in the fixture
fn level(frame: i64) -> u8 {
    ((frame - 1) * 8) as u8
}

/// Write a short MJPEG clip whose frames are uniform gray ramps
fn write_fixture(dir: &Path) -> PathBuf {
    let path = dir.join("fixture.mp4");
    let settings = EncoderSettings::new("mjpeg", &path.to_string_lossy(), WIDTH, HEIGHT, FPS, 0);
    let mut encoder = Encoder::create(settings).unwrap();

    for frame in 1..=FRAMES as i64 {
        let rgb = vec![level(frame); (WIDTH * HEIGHT * 3) as usize];
        encoder.frame(&rgb).unwrap();
    }

    encoder.finish().unwrap();
    assert_eq!(encoder.frame_pts(), FRAMES as i64);
    path
}

fn mean(picture: &[u8]) -> f64 {
    picture.iter().map(|&v| f64::from(v)).sum::<f64>() / picture.len() as f64
}

fn assert_on_frame(decoder: &mut Decoder, frame: i64) {
    assert_eq!(decoder.frame_number(), frame);
    let value = mean(decoder.picture().unwrap());
    let expected = f64::from(level(frame));
    assert!(
        (value - expected).abs() < 4.0,
        "frame {} has level {}, expected {}",
        frame,
        value,
        expected
    );
}

#[test]
fn test_encode_then_decode() {
    let dir = tempdir().unwrap();
    let path = write_fixture(dir.path());

    let mut decoder = Decoder::open(&path).unwrap();
    assert_eq!(decoder.width(), WIDTH);
    assert_eq!(decoder.height(), HEIGHT);
    assert!((decoder.fps() - FPS).abs() < 0.01);
    assert!((FRAMES as i64 - 1..=FRAMES as i64 + 1).contains(&decoder.frame_count()));
    assert!(decoder.is_special_codec());

    assert_on_frame(&mut decoder, 1);
    assert_eq!(decoder.frame_pts(), 0);

    let mut read = 1;
    while decoder.next() {
        read += 1;
        assert_on_frame(&mut decoder, read);
    }
    assert!(read >= FRAMES as i64 - 1);
}

#[test]
fn test_seek_frame_is_exact() {
    let dir = tempdir().unwrap();
    let path = write_fixture(dir.path());
    let mut decoder = Decoder::open(&path).unwrap();

    for target in [20, 5, 12, 1, 25, 2] {
        decoder.seek_frame(target);
        assert_on_frame(&mut decoder, target);
    }

    decoder.seek_frame(0);
    assert_on_frame(&mut decoder, 1);
}

#[test]
fn test_seek_time() {
    let dir = tempdir().unwrap();
    let path = write_fixture(dir.path());
    let mut decoder = Decoder::open(&path).unwrap();

    decoder.seek_time(400);
    assert_on_frame(&mut decoder, 10);

    decoder.seek_time(0);
    assert_on_frame(&mut decoder, 1);
}

#[test]
fn test_missing_file() {
    let result = Decoder::open("/definitely/not/here.mp4");
    assert!(matches!(result, Err(OpenError::NotFound { .. })));
}

#[test]
fn test_odd_width_is_sticky() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("odd.mp4");
    let settings = EncoderSettings::new("mjpeg", &path.to_string_lossy(), 81, 48, FPS, 0);

    let mut encoder = Encoder::configure(settings.clone());
    assert!(!encoder.is_opened());
    assert_eq!(encoder.error(), Some(&EncodeError::OddWidth { width: 81 }));

    let rgb = vec![0; 81 * 48 * 3];
    assert_eq!(encoder.frame(&rgb), Err(EncodeError::OddWidth { width: 81 }));
    assert_eq!(encoder.finish(), Err(EncodeError::OddWidth { width: 81 }));

    assert!(Encoder::create(settings).is_err());
}

#[test]
fn test_invalid_codec_name() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.mp4");
    let settings = EncoderSettings::new("divx", &path.to_string_lossy(), WIDTH, HEIGHT, FPS, 0);

    let encoder = Encoder::configure(settings);
    assert_eq!(
        encoder.error(),
        Some(&EncodeError::InvalidCodecName { name: "divx".into() })
    );
}

#[test]
fn test_finish_twice_and_write_after_finish() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("twice.mp4");
    let settings = EncoderSettings::new("mjpeg", &path.to_string_lossy(), WIDTH, HEIGHT, FPS, 0);
    let mut encoder = Encoder::create(settings).unwrap();

    let rgb = vec![128; (WIDTH * HEIGHT * 3) as usize];
    encoder.frame(&rgb).unwrap();
    assert_eq!(
        encoder.frame(&rgb[1..]),
        Err(EncodeError::InvalidBuffer { expected: rgb.len(), actual: rgb.len() - 1 })
    );

    encoder.finish().unwrap();
    encoder.finish().unwrap();
    assert_eq!(encoder.frame(&rgb), Err(EncodeError::NotOpened));
}

#[test]
fn test_clipping_conversion_into_encoder() {
    let dir = tempdir().unwrap();
    let source_path = write_fixture(dir.path());
    let output_path = dir.path().join("clip.mp4");

    let mut decoder = Decoder::open(&source_path).unwrap();
    let frame_count = decoder.frame_count() as u32;

    let mut clipping = Clipping::new(&source_path.to_string_lossy(), WIDTH, HEIGHT, frame_count);
    clipping.set_wh(32, 24);
    clipping.add(ClippingKey::new(3, 32.0, 24.0, 1.0, 0.0));
    clipping.add(ClippingKey::new(12, 32.0, 24.0, 1.0, 0.0));

    let settings = EncoderSettings::new("mjpeg", &output_path.to_string_lossy(), 32, 24, FPS, 0);
    let mut encoder = Encoder::create(settings).unwrap();

    let conversion = ClippingConversion::new(
        &clipping,
        ConversionOptions {
            from_start: false,
            ..ConversionOptions::default()
        },
    );
    let written = conversion
        .convert(&mut decoder, &mut encoder, &mut NoProgress)
        .unwrap();
    assert_eq!(written, 10);

    let mut output = Decoder::open(&output_path).unwrap();
    assert_eq!((output.width(), output.height()), (32, 24));

    let first = mean(output.picture().unwrap());
    assert!((first - f64::from(level(12))).abs() < 4.0);

    output.seek_frame(9);
    let ninth = mean(output.picture().unwrap());
    assert!((ninth - f64::from(level(4))).abs() < 4.0);
}
