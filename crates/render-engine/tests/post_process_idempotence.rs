use image::{Rgb, RgbImage};

use zoomcast_effect_core::EffectParams;
use zoomcast_render_engine::{
    MemoryFrameDecoder, MemoryFrameWriter, PostProcessor, ProcessReport,
};
use zoomcast_session_model::{parse_events, TimestampedEvent, VideoTimeline};

const EVENTS_JSON: &str = r#"[
    {"time": 0.10, "type": "move", "x": 40.0, "y": 30.0},
    {"time": 0.50, "type": "move", "x": 120.0, "y": 60.0},
    {"time": 0.50, "type": "click", "x": 120.0, "y": 60.0, "button": "left"},
    {"time": 1.20, "type": "pause_start"},
    {"time": 1.60, "type": "pause_end"},
    {"time": 1.80, "type": "move", "x": 300.0, "y": 170.0},
    {"time": 2.00, "type": "click", "x": 300.0, "y": 170.0, "button": "left"},
    {"time": 2.10, "type": "click", "x": 10.0, "y": 10.0, "button": "right"}
]"#;

fn source_frames(count: u32) -> Vec<RgbImage> {
    (0..count)
        .map(|i| {
            RgbImage::from_fn(320, 180, |x, y| {
                Rgb([(x % 256) as u8, (y % 256) as u8, (i % 256) as u8])
            })
        })
        .collect()
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn render(events: &[TimestampedEvent], timeline: VideoTimeline) -> (ProcessReport, u64) {
    let params = EffectParams {
        zoom_max: 1.5,
        smoothing: 0.2,
        zoom_duration: 1.0,
    };
    let processor = PostProcessor::new(params);
    let mut decoder = MemoryFrameDecoder::new(source_frames(90), 30.0);
    let mut writer = MemoryFrameWriter::new();
    let frames = writer.frames();
    let report = processor
        .render_frames(&mut decoder, &mut writer, events, timeline, None)
        .expect("render should succeed");

    let mut hash_input = Vec::new();
    for frame in frames.lock().iter() {
        hash_input.extend_from_slice(frame.as_raw());
    }
    (report, fnv1a_64(&hash_input))
}

fn overlay_signature(report: &ProcessReport) -> String {
    report
        .effects
        .iter()
        .map(|e| {
            format!(
                "{:.3}|{:.6}|{}|{}|{}|{}|{:?}|{:?}",
                e.time,
                e.zoom,
                e.crop.x,
                e.crop.y,
                e.crop.width,
                e.crop.height,
                e.cursor.map(|c| (c.x.round() as i64, c.y.round() as i64)),
                e.ripple.map(|r| (r.radius, r.center.x.round() as i64)),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn processing_twice_gives_identical_overlays() {
    let events = parse_events(EVENTS_JSON).expect("fixture events should parse");

    let (first, first_pixels) = render(&events, VideoTimeline::Continuous);
    let (second, second_pixels) = render(&events, VideoTimeline::Continuous);

    assert_eq!(first.effects, second.effects);
    assert_eq!(overlay_signature(&first), overlay_signature(&second));
    assert_eq!(first_pixels, second_pixels);
    // 1.2s to 1.6s is cut: 12 frames at 30 fps.
    assert_eq!(first.frames_cut, 12);
    assert_eq!(first.frames_written, 78);
}

#[test]
fn event_order_in_the_log_does_not_change_the_render() {
    let events = parse_events(EVENTS_JSON).expect("fixture events should parse");
    let mut shuffled = events.clone();
    shuffled.reverse();

    let (sorted, sorted_pixels) = render(&events, VideoTimeline::Continuous);
    let (reversed, reversed_pixels) = render(&shuffled, VideoTimeline::Continuous);

    assert_eq!(sorted.effects, reversed.effects);
    assert_eq!(sorted_pixels, reversed_pixels);
}

#[test]
fn ripple_follows_each_click_for_half_a_second() {
    let events = parse_events(EVENTS_JSON).expect("fixture events should parse");
    let (report, _) = render(&events, VideoTimeline::Continuous);

    let with_ripple: Vec<f64> = report
        .effects
        .iter()
        .filter(|e| e.ripple.is_some())
        .map(|e| e.time)
        .collect();
    assert!(!with_ripple.is_empty());
    assert!(with_ripple
        .iter()
        .all(|t| (0.5..1.0).contains(t) || (2.0..2.61).contains(t)));
}

#[test]
fn legacy_and_unknown_entries_keep_the_rest_of_the_log() {
    let mixed = r#"[
        {"time": 0.10, "type": "move", "x": 40.0, "y": 30.0},
        {"time": 0.50, "x": 120.0, "y": 60.0, "button": "Button.left"},
        {"time": 0.80, "type": "scroll", "dy": -2},
        {"time": 0.90, "type": "move"}
    ]"#;
    let events = parse_events(mixed).expect("array log should parse");
    assert_eq!(events.len(), 2);

    let (report, _) = render(&events, VideoTimeline::Continuous);
    assert_eq!(report.frames_cut, 0);
    assert!(report.effects.iter().any(|e| e.ripple.is_some()));
    assert!(report.effects.iter().any(|e| e.zoom > 1.05));
}
