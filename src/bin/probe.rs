// Diagnostic binary: opens a video and checks frame-accurate seeking

use std::path::PathBuf;

use clip_cutter::{
    timefmt::seconds_to_str,
    video::{Decoder, FrameSource},
};

const SEEK_SAMPLES: i64 = 8;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => {
            eprintln!("usage: probe <video>");
            std::process::exit(2);
        }
    };

    println!("Probing {}", path.display());

    // Test 1: Open
    println!("\n1. Opening...");
    let mut decoder = match Decoder::open(&path) {
        Ok(decoder) => {
            println!("   ✅ Opened");
            decoder
        }
        Err(e) => {
            println!("   ❌ Could not open: {}", e);
            return Err(e.into());
        }
    };

    let info = decoder.info();
    println!("   Codec: {}", info.codec);
    println!("   Size: {}x{}", info.width, info.height);
    println!("   FPS: {:.3}", info.fps);
    println!("   Frames: {}", info.frame_count);
    println!("   Duration: {}", seconds_to_str(info.duration, true));

    // Test 2: Sequential read
    println!("\n2. Reading every frame...");
    let mut frames = 1;
    let mut key_frames = usize::from(decoder.is_key_frame());
    while decoder.next() {
        frames += 1;
        if decoder.is_key_frame() {
            key_frames += 1;
        }
    }
    println!("   Read {} frames ({} key frames)", frames, key_frames);
    if frames != info.frame_count {
        println!("   ⚠️  Container reports {} frames", info.frame_count);
    }

    // Test 3: Seek accuracy, walking backwards to force real seeks
    println!("\n3. Checking seek accuracy...");
    let last = frames.max(1);
    let step = (last / SEEK_SAMPLES).max(1);
    let mut misses = 0;
    let mut target = last;
    while target >= 1 {
        decoder.seek_frame(target);
        let landed = decoder.frame_number();
        if landed == target {
            println!("   ✅ Frame {} at {}", target, seconds_to_str(decoder.frame_time(), true));
        } else {
            println!("   ❌ Frame {} landed on {}", target, landed);
            misses += 1;
        }
        target -= step;
    }

    // Test 4: Picture conversion
    println!("\n4. Converting the current picture...");
    decoder.seek_frame(1);
    match decoder.picture() {
        Ok(picture) => println!("   ✅ {} bytes", picture.len()),
        Err(e) => println!("   ❌ {}", e),
    }

    println!();
    if misses == 0 {
        println!("🎉 All seeks landed on their frame");
    } else {
        println!("⚠️  {} seek(s) missed", misses);
    }

    Ok(())
}
