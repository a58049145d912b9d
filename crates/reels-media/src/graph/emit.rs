//! Serialization of a [`MediaGraph`] to FFmpeg `-filter_complex` syntax.

use std::path::Path;

use reels_models::encoding::{OUTPUT_HEIGHT, OUTPUT_WIDTH};
use reels_models::EncodingConfig;

use super::{InputSource, MediaGraph, Node, NodeKind, StreamRef, TextOverlay, Transform};
use crate::command::FfmpegCommand;

const ZOOM_STEP: f64 = 0.0015;
const ZOOM_MAX: f64 = 1.5;

/// Weights keyed on absolute stream time `T`, not on the pair's offset.
/// Until T=0.5 the top layer ramps in linearly over a full bottom layer; from
/// T=0.5 the top layer is full and the bottom layer ramps out, reaching zero at T=1.
const CROSSFADE_EXPR: &str = "A*(if(gte(T,0.5),1,2*T))+B*(if(lt(T,0.5),1,2-2*T))";

const CAPTION_STYLE: &str =
    "fontsize=64:fontcolor=white:x=(w-text_w)/2:y=h-380:box=1:boxcolor=black@0.5:boxborderw=10";

/// Render the graph as one `;`-separated filter_complex string.
///
/// Source nodes produce no statement; consumers reference them as `[n]`.
pub fn to_filter_complex(graph: &MediaGraph) -> String {
    graph
        .nodes()
        .iter()
        .filter_map(|node| statement(graph, node))
        .collect::<Vec<_>>()
        .join(";")
}

/// Full encode invocation: inputs in order, the filter graph, both maps and
/// the output parameters.
pub fn encode_command(graph: &MediaGraph, encoding: &EncodingConfig, output: impl AsRef<Path>) -> FfmpegCommand {
    let mut cmd = FfmpegCommand::new(output);
    for input in graph.inputs() {
        cmd = match &input.source {
            InputSource::Media(path) => cmd.input(path.clone()),
            InputSource::Lavfi { expr, duration_sec } => cmd.lavfi_input(expr.clone(), *duration_sec),
        };
    }

    cmd.filter_complex(to_filter_complex(graph))
        .map(pad(graph, graph.video_output()))
        .map(pad(graph, graph.audio_output()))
        .encoding(encoding)
}

fn statement(graph: &MediaGraph, node: &Node) -> Option<String> {
    let label = node.label()?;
    let inputs: String = node.inputs().iter().map(|r| pad(graph, *r)).collect();
    let filter = match node.kind() {
        NodeKind::Source { .. } => return None,
        NodeKind::Transform(transform) => transform_filter(transform),
        NodeKind::Blend => format!("blend=all_expr='{CROSSFADE_EXPR}':shortest=1"),
        NodeKind::Concat => format!("concat=n={}:v=1:a=0", node.inputs().len()),
        NodeKind::Overlay(overlay) => overlay_filter(overlay),
        NodeKind::AudioMix => format!("amix=inputs={}:duration=first:dropout_transition=2", node.inputs().len()),
    };
    Some(format!("{inputs}{filter}[{label}]"))
}

fn pad(graph: &MediaGraph, stream: StreamRef) -> String {
    let node = graph.node(stream);
    match (node.kind(), node.label()) {
        (NodeKind::Source { input }, _) => format!("[{input}]"),
        (_, Some(label)) => format!("[{label}]"),
        (_, None) => format!("[n{}]", stream.index()),
    }
}

fn fill_crop() -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}",
        w = OUTPUT_WIDTH,
        h = OUTPUT_HEIGHT
    )
}

fn transform_filter(transform: &Transform) -> String {
    match transform {
        Transform::FillCrop => fill_crop(),
        Transform::KenBurns { frames } => format!(
            "{},zoompan=z='min(zoom+{ZOOM_STEP},{ZOOM_MAX})':d={frames}:x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':s={}x{}",
            fill_crop(),
            OUTPUT_WIDTH,
            OUTPUT_HEIGHT
        ),
    }
}

fn overlay_filter(overlay: &TextOverlay) -> String {
    if overlay.is_passthrough() {
        return "null".to_string();
    }
    format!("drawtext=text='{}':{CAPTION_STYLE}", escape_drawtext(&overlay.text))
}

/// Make arbitrary script text safe inside a quoted drawtext value.
///
/// Straight quotes become typographic ones since a quote cannot be escaped
/// inside a quoted filter argument. Newlines are kept as line breaks.
pub fn escape_drawtext(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\'' => out.push('\u{2019}'),
            '\\' => out.push_str("\\\\"),
            ':' => out.push_str("\\:"),
            '%' => out.push_str("\\%"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{build_graph, GraphSpec};
    use reels_models::StylePreset;

    fn photos(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("p{i}.jpg")).collect()
    }

    fn graph(photos: &[String], style: StylePreset, script: &str, accent: Option<&str>) -> MediaGraph {
        build_graph(&GraphSpec {
            photos,
            script,
            style,
            duration_sec: 30,
            voice: "voice.wav",
            music: None,
            accent,
        })
        .unwrap()
    }

    const KB: &str = "scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920,zoompan=z='min(zoom+0.0015,1.5)':d=300:x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':s=1080x1920";
    const BLEND: &str = "blend=all_expr='A*(if(gte(T,0.5),1,2*T))+B*(if(lt(T,0.5),1,2-2*T))':shortest=1";

    #[test]
    fn test_classic_three_photos() {
        let photos = photos(3);
        let fc = to_filter_complex(&graph(&photos, StylePreset::Classic, "a b c d e", None));
        let statements: Vec<&str> = fc.split(';').collect();

        assert_eq!(statements.len(), 3 + 2 + 1 + 1);
        assert_eq!(statements[0], format!("[0]{KB}[photo0]"));
        assert_eq!(statements[2], format!("[2]{KB}[photo2]"));
        assert_eq!(statements[3], format!("[photo0][photo1]{BLEND}[xfade0]"));
        assert_eq!(statements[4], format!("[xfade0][photo2]{BLEND}[xfade1]"));
        assert_eq!(
            statements[5],
            "[xfade1]drawtext=text='a b c d\ne':fontsize=64:fontcolor=white:x=(w-text_w)/2:y=h-380:box=1:boxcolor=black@0.5:boxborderw=10[captioned]"
        );
        assert_eq!(statements[6], "[3][4]amix=inputs=2:duration=first:dropout_transition=2[audio]");
    }

    #[test]
    fn test_hybrid_statements() {
        let photos = photos(3);
        let fc = to_filter_complex(&graph(&photos, StylePreset::Hybrid, "hello", Some("accent.mp4")));

        assert!(fc.contains("[5]scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920[accent]"));
        assert!(fc.contains("[xfade0][accent]concat=n=2:v=1:a=0[accent_insert]"));
        assert!(fc.contains(&format!("[accent_insert][photo2]{BLEND}[xfade1]")));
        assert!(fc.contains("[xfade1]drawtext=text='hello'"));
    }

    #[test]
    fn test_empty_caption_is_null_filter() {
        let photos = photos(1);
        let fc = to_filter_complex(&graph(&photos, StylePreset::Classic, "", None));
        assert!(fc.contains("[photo0]null[captioned]"));
        assert!(!fc.contains("drawtext"));
    }

    #[test]
    fn test_labels_defined_before_use() {
        let photos = photos(5);
        let fc = to_filter_complex(&graph(&photos, StylePreset::Hybrid, "x", Some("accent.mp4")));
        let mut defined: Vec<String> = Vec::new();
        for stmt in fc.split(';') {
            let (head, out) = stmt.rsplit_once('[').unwrap();
            let mut rest = head;
            while let Some(start) = rest.find('[') {
                let end = rest[start..].find(']').unwrap() + start;
                let label = &rest[start + 1..end];
                if label.parse::<usize>().is_err() {
                    assert!(defined.iter().any(|d| d == label), "{label} used before definition");
                }
                rest = &rest[end + 1..];
                if !rest.starts_with('[') {
                    break;
                }
            }
            defined.push(out.trim_end_matches(']').to_string());
        }
    }

    #[test]
    fn test_encode_command_layout() {
        let photos = photos(2);
        let g = graph(&photos, StylePreset::Classic, "hi", None);
        let args = encode_command(&g, &EncodingConfig::default(), "/tmp/job/reel.mp4").build_args();
        let joined = args.join(" ");

        assert!(joined.contains(
            "-i p0.jpg -i p1.jpg -i voice.wav -f lavfi -t 30 -i anullsrc=channel_layout=stereo:sample_rate=48000"
        ));
        assert!(joined.contains("-map [captioned] -map [audio] -c:v libx264"));
        assert!(joined.ends_with("-pix_fmt yuv420p /tmp/job/reel.mp4"));
    }

    #[test]
    fn test_escape_drawtext() {
        assert_eq!(escape_drawtext("You'll love it"), "You\u{2019}ll love it");
        assert_eq!(escape_drawtext("Check-in: 3pm, 100%"), "Check-in\\: 3pm, 100\\%");
        assert_eq!(escape_drawtext("a\\b"), "a\\\\b");
        assert_eq!(escape_drawtext("line one\nline two"), "line one\nline two");
    }
}
