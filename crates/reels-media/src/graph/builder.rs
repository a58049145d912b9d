//! Pure construction of the reel's media graph.

use reels_models::encoding::OUTPUT_FPS;
use reels_models::StylePreset;

use super::{GraphArena, InputRole, InputSource, MediaGraph, NodeKind, StreamRef, TextOverlay, Transform};
use crate::captions::caption_text;
use crate::error::{MediaError, MediaResult};
use crate::style_policy::accent_placement;

/// Silent stereo bed used when no music asset is configured.
pub const SILENT_MUSIC_SOURCE: &str = "anullsrc=channel_layout=stereo:sample_rate=48000";

/// Everything the builder needs. Paths are already local or remote references.
#[derive(Debug, Clone)]
pub struct GraphSpec<'a> {
    pub photos: &'a [String],
    pub script: &'a str,
    pub style: StylePreset,
    pub duration_sec: u32,
    pub voice: &'a str,
    /// Background music file; `None` generates silence
    pub music: Option<&'a str>,
    /// Accent clip, if one was produced upstream
    pub accent: Option<&'a str>,
}

/// `duration_sec / photo_count`, rejecting zero photos.
pub fn per_photo_duration(duration_sec: u32, photo_count: usize) -> MediaResult<f64> {
    if photo_count == 0 {
        return Err(MediaError::invalid_input("at least one photo is required"));
    }
    Ok(f64::from(duration_sec) / photo_count as f64)
}

/// Build the graph for one reel.
///
/// Deterministic and free of I/O. Fails only on precondition violations.
pub fn build_graph(spec: &GraphSpec<'_>) -> MediaResult<MediaGraph> {
    if spec.duration_sec == 0 {
        return Err(MediaError::invalid_input("duration must be positive"));
    }
    let photo_duration = per_photo_duration(spec.duration_sec, spec.photos.len())?;
    let frames = ((photo_duration * f64::from(OUTPUT_FPS)).round() as u32).max(1);

    let mut arena = GraphArena::default();

    // Inputs are registered in encoder order: photos, voice, music, accent.
    let photo_sources: Vec<StreamRef> = spec
        .photos
        .iter()
        .enumerate()
        .map(|(i, photo)| arena.source(InputRole::Photo(i), InputSource::Media(photo.clone())))
        .collect();
    let voice = arena.source(InputRole::Voice, InputSource::Media(spec.voice.to_string()));
    let music_source = match spec.music {
        Some(path) => InputSource::Media(path.to_string()),
        None => InputSource::Lavfi {
            expr: SILENT_MUSIC_SOURCE.to_string(),
            duration_sec: f64::from(spec.duration_sec),
        },
    };
    let music = arena.source(InputRole::Music, music_source);

    let placement = accent_placement(spec.style, spec.photos.len(), spec.accent.is_some());
    let accent_source = match (placement, spec.accent) {
        (Some(_), Some(path)) => Some(arena.source(InputRole::Accent, InputSource::Media(path.to_string()))),
        _ => None,
    };

    let photos: Vec<StreamRef> = photo_sources
        .into_iter()
        .enumerate()
        .map(|(i, src)| {
            arena.filter(
                format!("photo{i}"),
                NodeKind::Transform(Transform::KenBurns { frames }),
                vec![src],
            )
        })
        .collect();

    let accent = accent_source.map(|src| arena.filter("accent", NodeKind::Transform(Transform::FillCrop), vec![src]));

    let mut blends = 0usize;
    let mut blend = |arena: &mut GraphArena, a: StreamRef, b: StreamRef| {
        let out = arena.filter(format!("xfade{blends}"), NodeKind::Blend, vec![a, b]);
        blends += 1;
        out
    };

    let mut current = photos[0];
    for (i, photo) in photos.iter().enumerate().skip(1) {
        current = blend(&mut arena, current, *photo);
        if let (Some(placement), Some(accent)) = (placement, accent) {
            if i + 1 == placement.insert_index {
                current = arena.filter("accent_insert", NodeKind::Concat, vec![current, accent]);
            }
        }
    }

    let video = arena.filter(
        "captioned",
        NodeKind::Overlay(TextOverlay {
            text: caption_text(spec.script),
        }),
        vec![current],
    );
    let audio = arena.filter("audio", NodeKind::AudioMix, vec![voice, music]);

    Ok(arena.finish(video, audio, photo_duration, spec.duration_sec))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photos(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("/scratch/photo{i}.jpg")).collect()
    }

    fn spec<'a>(photos: &'a [String], style: StylePreset, accent: Option<&'a str>) -> GraphSpec<'a> {
        GraphSpec {
            photos,
            script: "Welcome to Tulum. Save this for your next trip.",
            style,
            duration_sec: 30,
            voice: "/scratch/voice.wav",
            music: None,
            accent,
        }
    }

    #[test]
    fn test_per_photo_duration_is_exact_division() {
        for count in 1..=12usize {
            for duration in [1u32, 7, 15, 30, 45, 60] {
                let got = per_photo_duration(duration, count).unwrap();
                assert_eq!(got, duration as f64 / count as f64);
            }
        }
    }

    #[test]
    fn test_zero_photos_is_rejected() {
        assert!(matches!(per_photo_duration(30, 0), Err(MediaError::InvalidInput(_))));
        let empty: Vec<String> = Vec::new();
        assert!(build_graph(&spec(&empty, StylePreset::Classic, None)).is_err());
    }

    #[test]
    fn test_blend_count_is_photos_minus_one() {
        for n in 1..=8 {
            let photos = photos(n);
            let graph = build_graph(&spec(&photos, StylePreset::Classic, None)).unwrap();
            assert_eq!(graph.blend_count(), n - 1);
            assert_eq!(graph.concat_count(), 0);
        }
    }

    #[test]
    fn test_single_photo_feeds_overlay_directly() {
        let photos = photos(1);
        let graph = build_graph(&spec(&photos, StylePreset::Hybrid, Some("/scratch/accent.mp4"))).unwrap();
        let overlay = graph.node(graph.video_output());
        assert_eq!(graph.node(overlay.inputs()[0]).label(), Some("photo0"));
        assert!(graph.inputs().iter().all(|i| i.role != InputRole::Accent));
    }

    #[test]
    fn test_three_photo_classic_scenario() {
        let photos = photos(3);
        let graph = build_graph(&spec(&photos, StylePreset::Classic, None)).unwrap();

        assert_eq!(graph.per_photo_duration(), 10.0);
        assert_eq!(graph.blend_count(), 2);
        assert_eq!(graph.count(|k| matches!(k, NodeKind::Overlay(_))), 1);
        assert_eq!(graph.count(|k| matches!(k, NodeKind::AudioMix)), 1);
        assert_eq!(
            graph.count(|k| matches!(k, NodeKind::Transform(Transform::KenBurns { frames: 300 }))),
            3
        );
        assert_eq!(graph.node(graph.video_output()).label(), Some("captioned"));
        assert_eq!(graph.node(graph.audio_output()).label(), Some("audio"));
    }

    #[test]
    fn test_hybrid_inserts_one_concat_between_photo_one_and_two() {
        let photos = photos(4);
        let graph = build_graph(&spec(&photos, StylePreset::Hybrid, Some("/scratch/accent.mp4"))).unwrap();

        assert_eq!(graph.concat_count(), 1);
        assert_eq!(graph.blend_count(), 3);

        let concat = graph.find("accent_insert").unwrap();
        let first = graph.node(graph.node(concat).inputs()[0]);
        assert_eq!(first.kind(), &NodeKind::Blend);
        let blended: Vec<_> = first.inputs().iter().map(|r| graph.node(*r).label()).collect();
        assert_eq!(blended, vec![Some("photo0"), Some("photo1")]);
        assert_eq!(graph.node(graph.node(concat).inputs()[1]).label(), Some("accent"));

        let next = graph.find("xfade1").unwrap();
        assert_eq!(graph.node(next).inputs(), &[concat, graph.find("photo2").unwrap()]);

        assert_eq!(graph.inputs().len(), 4 + 3);
        assert_eq!(graph.inputs()[6].role, InputRole::Accent);
    }

    #[test]
    fn test_hybrid_degrades_to_classic_without_clip_or_photos() {
        let many = photos(3);
        let classic = build_graph(&spec(&many, StylePreset::Classic, None)).unwrap();
        let no_clip = build_graph(&spec(&many, StylePreset::Hybrid, None)).unwrap();
        assert_eq!(classic, no_clip);

        let few = photos(1);
        let classic = build_graph(&spec(&few, StylePreset::Classic, None)).unwrap();
        let short = build_graph(&spec(&few, StylePreset::Hybrid, Some("/scratch/accent.mp4"))).unwrap();
        assert_eq!(classic, short);
    }

    #[test]
    fn test_accent_ignored_for_non_hybrid() {
        let photos = photos(3);
        let plain = build_graph(&spec(&photos, StylePreset::Classic, None)).unwrap();
        for style in [StylePreset::Classic, StylePreset::Parallax, StylePreset::Destination] {
            let graph = build_graph(&spec(&photos, style, Some("/scratch/accent.mp4"))).unwrap();
            assert_eq!(graph, plain);
        }
    }

    #[test]
    fn test_every_edge_points_backwards() {
        let photos = photos(6);
        let graph = build_graph(&spec(&photos, StylePreset::Hybrid, Some("/scratch/accent.mp4"))).unwrap();
        for (i, node) in graph.nodes().iter().enumerate() {
            assert!(node.inputs().iter().all(|r| r.index() < i));
        }
    }

    #[test]
    fn test_music_file_replaces_silence() {
        let photos = photos(2);
        let mut with_music = spec(&photos, StylePreset::Classic, None);
        with_music.music = Some("/assets/music.mp3");
        let graph = build_graph(&with_music).unwrap();
        assert_eq!(graph.inputs()[3].source, InputSource::Media("/assets/music.mp3".into()));

        let silent = build_graph(&spec(&photos, StylePreset::Classic, None)).unwrap();
        assert_eq!(
            silent.inputs()[3].source,
            InputSource::Lavfi {
                expr: SILENT_MUSIC_SOURCE.into(),
                duration_sec: 30.0
            }
        );
    }

    #[test]
    fn test_empty_script_overlay_is_passthrough() {
        let photos = photos(2);
        let mut spec = spec(&photos, StylePreset::Classic, None);
        spec.script = "";
        let graph = build_graph(&spec).unwrap();
        match graph.node(graph.video_output()).kind() {
            NodeKind::Overlay(overlay) => assert!(overlay.is_passthrough()),
            other => panic!("unexpected terminal node {other:?}"),
        }
    }
}
