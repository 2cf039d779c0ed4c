use crate::error::Result;
use reelcut_core::error::CoreError;
use reelcut_core::filters::FilterChain;
use reelcut_core::types::*;
use serde::Serialize;

/// Pixels per aspect unit for the scale/crop working frame (9:16 -> 1620x2880).
pub const GEOMETRY_MULTIPLIER: u32 = 180;

/// Largest working-frame side the encoders accept.
pub const MAX_FRAME_DIMENSION: u32 = 16384;

/// Seconds over which a fade-in overlay reaches full opacity.
const OVERLAY_FADE_SECS: f64 = 1.0;

/// A compiled export job, ready to be flattened into engine arguments.
///
/// Fields are kept in the order the engine consumes them; see [`CompiledCommand::to_args`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompiledCommand {
    pub input: String,
    pub trim: TrimArgs,
    pub geometry: FrameGeometry,
    pub fit: FrameFit,
    pub filter_graph: String,
    pub quality: QualityArgs,
    pub fps: u32,
    pub codec_args: Vec<String>,
    pub output: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct TrimArgs {
    pub start_secs: f64,
    pub duration_secs: f64,
}

/// Exact pixel size of the working frame.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

impl FrameGeometry {
    /// Working frame for an aspect ratio. Ratios whose frame would exceed
    /// [`MAX_FRAME_DIMENSION`] on either side are rejected.
    pub fn for_aspect(aspect: AspectRatio) -> reelcut_core::error::Result<Self> {
        aspect.validate()?;
        let side = |units: u32| {
            units
                .checked_mul(GEOMETRY_MULTIPLIER)
                .filter(|px| *px <= MAX_FRAME_DIMENSION)
                .ok_or(CoreError::InvalidAspectRatio {
                    width: aspect.width,
                    height: aspect.height,
                })
        };
        Ok(Self {
            width: side(aspect.width)?,
            height: side(aspect.height)?,
        })
    }

    /// Scale the source against the working frame: up to cover it, or down to fit inside it.
    pub fn scale_filter(&self, fit: FrameFit) -> String {
        let mode = match fit {
            FrameFit::Cover => "increase",
            FrameFit::Letterbox => "decrease",
        };
        format!(
            "scale={}:{}:force_original_aspect_ratio={mode}",
            self.width, self.height
        )
    }

    /// Center crop to the exact working frame.
    pub fn crop_filter(&self) -> String {
        format!("crop={}:{}", self.width, self.height)
    }

    /// Center the scaled source on a black frame of the exact working size.
    pub fn pad_filter(&self) -> String {
        format!("pad={}:{}:(ow-iw)/2:(oh-ih)/2", self.width, self.height)
    }

    /// Scale followed by crop or pad, depending on the fit.
    pub fn fit_filters(&self, fit: FrameFit) -> [String; 2] {
        let fill = match fit {
            FrameFit::Cover => self.crop_filter(),
            FrameFit::Letterbox => self.pad_filter(),
        };
        [self.scale_filter(fit), fill]
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QualityArgs {
    pub width: u32,
    pub height: u32,
    pub bitrate: String,
}

impl CompiledCommand {
    /// Flatten into the positional argument list the engine expects.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["-i".to_string(), self.input.clone()];

        args.push("-ss".to_string());
        args.push(self.trim.start_secs.to_string());
        args.push("-t".to_string());
        args.push(self.trim.duration_secs.to_string());

        args.push("-vf".to_string());
        args.push(self.filter_graph.clone());

        args.push("-s".to_string());
        args.push(format!("{}x{}", self.quality.width, self.quality.height));
        args.push("-b:v".to_string());
        args.push(self.quality.bitrate.clone());

        args.push("-r".to_string());
        args.push(self.fps.to_string());

        args.extend(self.codec_args.iter().cloned());

        args.push(self.output.clone());
        args
    }
}

/// Compile a parameter set and its color chain into an engine command.
///
/// Fails before producing anything if the trim range, aspect ratio or
/// overlays are malformed.
pub fn compile(
    input: &str,
    output: &str,
    params: &ParameterSet,
    chain: &FilterChain,
) -> Result<CompiledCommand> {
    params.trim.validate()?;
    params.aspect.validate()?;
    for overlay in &params.overlays {
        overlay.validate()?;
    }

    let trim = TrimArgs {
        start_secs: params.trim.start_secs,
        duration_secs: params.trim.duration_secs(),
    };

    let geometry = FrameGeometry::for_aspect(params.aspect)?;

    // Geometry first, then color, then text on top.
    let mut filters = geometry.fit_filters(params.fit).to_vec();
    filters.extend(chain.filter_strings());
    filters.extend(
        params
            .overlays
            .iter()
            .map(|overlay| drawtext_filter(overlay, trim.start_secs)),
    );

    let (width, height) = params.quality.resolution();
    let quality = QualityArgs {
        width,
        height,
        bitrate: params.quality.bitrate_arg().to_string(),
    };

    Ok(CompiledCommand {
        input: input.to_string(),
        trim,
        geometry,
        fit: params.fit,
        filter_graph: filters.join(","),
        quality,
        fps: params.fps.as_u32(),
        codec_args: codec_args(params.format),
        output: output.to_string(),
    })
}

fn codec_args(format: OutputFormat) -> Vec<String> {
    let args: &[&str] = match format {
        OutputFormat::Mp4 => &[
            "-c:v", "libx264", "-preset", "medium", "-crf", "23", "-c:a", "aac", "-b:a", "128k",
            "-movflags", "+faststart",
        ],
        OutputFormat::Mov => &[
            "-c:v", "libx264", "-preset", "medium", "-crf", "23", "-c:a", "aac", "-b:a", "128k",
            "-f", "mov",
        ],
        OutputFormat::Webm => &[
            "-c:v", "libvpx-vp9", "-crf", "30", "-c:a", "libopus", "-b:a", "128k",
        ],
    };
    args.iter().map(|s| s.to_string()).collect()
}

/// Backslash-escape `value` for one level of ffmpeg filter parsing.
///
/// Quotes, backslashes and `specials` are escaped everywhere; whitespace only
/// at either end, where the parser would otherwise strip it.
fn escape_filter_level(value: &str, specials: &[char]) -> String {
    let first_kept = value.len() - value.trim_start().len();
    let last_kept = value.trim_end().len();
    let mut escaped = String::with_capacity(value.len() + 8);
    for (i, c) in value.char_indices() {
        let edge_space = c.is_whitespace() && (i < first_kept || i >= last_kept);
        if c == '\\' || c == '\'' || specials.contains(&c) || edge_space {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `drawtext` filter for one overlay. `trim_start` is the source time the
/// export starts at, since the filter sees source timestamps.
///
/// Option values are escaped for the option parser (`:` separated), then the
/// whole option string again for the graph parser (`,` `;` `[` `]`).
/// Expansion is off so the text is drawn as given, `%` included.
fn drawtext_filter(overlay: &TextOverlay, trim_start: f64) -> String {
    let y = match overlay.position {
        TextPosition::Top => "h*0.1",
        TextPosition::Center => "(h-text_h)/2",
        TextPosition::Bottom => "h*0.9-text_h",
    };

    let mut options: Vec<(&str, String)> = vec![
        ("text", overlay.text.clone()),
        ("expansion", "none".to_string()),
        ("fontsize", overlay.font_size.to_string()),
        (
            "fontcolor",
            format!("0x{}", overlay.color.trim_start_matches('#')),
        ),
        ("x", "(w-text_w)/2".to_string()),
        ("y", y.to_string()),
    ];

    if let Some(font) = &overlay.font {
        options.push(("font", font.clone()));
    }
    if overlay.effects.shadow {
        options.push(("shadowcolor", "black@0.6".to_string()));
        options.push(("shadowx", "2".to_string()));
        options.push(("shadowy", "2".to_string()));
    }
    if overlay.effects.outline {
        options.push(("borderw", "3".to_string()));
        options.push(("bordercolor", "black".to_string()));
    }
    if overlay.effects.background {
        options.push(("box", "1".to_string()));
        options.push(("boxcolor", "black@0.5".to_string()));
        options.push(("boxborderw", "12".to_string()));
    }
    if overlay.animation == TextAnimation::FadeIn {
        options.push((
            "alpha",
            format!("min(max((t-{trim_start})/{OVERLAY_FADE_SECS},0),1)"),
        ));
    }

    let option_string = options
        .iter()
        .map(|(key, value)| format!("{key}={}", escape_filter_level(value, &[':'])))
        .collect::<Vec<_>>()
        .join(":");

    format!(
        "drawtext={}",
        escape_filter_level(&option_string, &['[', ']', ',', ';'])
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;
    use reelcut_core::error::CoreError;
    use reelcut_core::filters;

    fn make_params(start: f64, end: f64) -> ParameterSet {
        ParameterSet {
            trim: Trim {
                start_secs: start,
                end_secs: end,
            },
            aspect: AspectRatio::new_unchecked(9, 16),
            fit: FrameFit::Cover,
            filter: "clarendon".to_string(),
            adjustment: Adjustment::default(),
            quality: Quality::Fhd1080p,
            format: OutputFormat::Mp4,
            fps: FrameRate::Fps30,
            overlays: vec![],
        }
    }

    fn compile_params(params: &ParameterSet) -> Result<CompiledCommand> {
        let chain = filters::build(&params.filter, &params.adjustment).unwrap();
        compile("input.mp4", "output.mp4", params, &chain)
    }

    #[test]
    fn compile_full_argument_order() {
        let cmd = compile_params(&make_params(5.0, 15.0)).unwrap();
        let expected: Vec<String> = [
            "-i",
            "input.mp4",
            "-ss",
            "5",
            "-t",
            "10",
            "-vf",
            "scale=1620:2880:force_original_aspect_ratio=increase,crop=1620:2880,eq=contrast=1.22:brightness=0.05:saturation=1.35",
            "-s",
            "1920x1080",
            "-b:v",
            "12M",
            "-r",
            "30",
            "-c:v",
            "libx264",
            "-preset",
            "medium",
            "-crf",
            "23",
            "-c:a",
            "aac",
            "-b:a",
            "128k",
            "-movflags",
            "+faststart",
            "output.mp4",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        assert_eq!(cmd.to_args(), expected);
    }

    #[test]
    fn compile_rejects_inverted_or_empty_trim() {
        for (start, end) in [(15.0, 5.0), (5.0, 5.0), (-1.0, 3.0)] {
            let result = compile_params(&make_params(start, end));
            assert!(
                matches!(
                    result,
                    Err(RenderError::Core(CoreError::InvalidTrimRange { .. }))
                ),
                "expected InvalidTrimRange for {start}..{end}"
            );
        }
    }

    #[test]
    fn compile_rejects_zero_aspect() {
        let mut params = make_params(0.0, 3.0);
        params.aspect = AspectRatio::new_unchecked(0, 16);
        assert!(matches!(
            compile_params(&params),
            Err(RenderError::Core(CoreError::InvalidAspectRatio { .. }))
        ));
    }

    #[test]
    fn crop_matches_target_ratio_exactly() {
        let cmd = compile_params(&make_params(5.0, 15.0)).unwrap();
        let g = cmd.geometry;
        assert_eq!((g.width, g.height), (1620, 2880));
        assert_eq!(g.width * 16, g.height * 9);
        assert!(cmd.filter_graph.contains("crop=1620:2880"));
    }

    #[test]
    fn scale_and_crop_share_multiplier_for_every_preset() {
        for preset in reelcut_core::registry::ASPECT_PRESETS {
            let g = FrameGeometry::for_aspect(preset.ratio).unwrap();
            assert_eq!(g.width * preset.ratio.height, g.height * preset.ratio.width);
            assert!(g.scale_filter(FrameFit::Cover).starts_with(&format!("scale={}:{}", g.width, g.height)));
            assert_eq!(g.crop_filter(), format!("crop={}:{}", g.width, g.height));
            assert_eq!(
                g.pad_filter(),
                format!("pad={}:{}:(ow-iw)/2:(oh-ih)/2", g.width, g.height)
            );
            assert_eq!(g.width % 2, 0);
            assert_eq!(g.height % 2, 0);
        }
    }

    #[test]
    fn geometry_precedes_color_steps() {
        let mut params = make_params(0.0, 4.0);
        params.filter = "none".into();
        params.adjustment.vibrance = 20;
        let cmd = compile_params(&params).unwrap();
        assert_eq!(
            cmd.filter_graph,
            "scale=1620:2880:force_original_aspect_ratio=increase,crop=1620:2880,vibrance=intensity=1.2"
        );
    }

    #[test]
    fn identity_chain_leaves_only_geometry() {
        let mut params = make_params(0.0, 4.0);
        params.filter = "none".into();
        let cmd = compile_params(&params).unwrap();
        assert_eq!(
            cmd.filter_graph,
            "scale=1620:2880:force_original_aspect_ratio=increase,crop=1620:2880"
        );
    }

    #[test]
    fn fractional_trim_is_passed_as_given() {
        let cmd = compile_params(&make_params(2.5, 8.75)).unwrap();
        let args = cmd.to_args();
        assert_eq!(args[2..6], ["-ss", "2.5", "-t", "6.25"]);
    }

    #[test]
    fn webm_uses_vp9_and_opus() {
        let mut params = make_params(0.0, 3.0);
        params.format = OutputFormat::Webm;
        params.fps = FrameRate::Fps60;
        params.quality = Quality::Sd480p;
        let cmd = compile("input.mov", "output.webm", &params, &FilterChain::default()).unwrap();
        let args = cmd.to_args();

        assert!(args.windows(2).any(|w| w == ["-c:v", "libvpx-vp9"]));
        assert!(args.windows(2).any(|w| w == ["-c:a", "libopus"]));
        assert!(args.windows(2).any(|w| w == ["-crf", "30"]));
        assert!(args.windows(2).any(|w| w == ["-r", "60"]));
        assert!(args.windows(2).any(|w| w == ["-s", "854x480"]));
        assert!(args.windows(2).any(|w| w == ["-b:v", "2.5M"]));
        assert!(!args.contains(&"libx264".to_string()));
        assert_eq!(args.last().unwrap(), "output.webm");
    }

    #[test]
    fn mov_reuses_mp4_codecs_with_mov_container() {
        let mut params = make_params(0.0, 3.0);
        params.format = OutputFormat::Mov;
        let cmd = compile_params(&params).unwrap();
        assert_eq!(
            cmd.codec_args,
            [
                "-c:v", "libx264", "-preset", "medium", "-crf", "23", "-c:a", "aac", "-b:a",
                "128k", "-f", "mov"
            ]
        );
    }

    #[test]
    fn quality_args_come_after_filter_graph() {
        let mut params = make_params(1.0, 2.0);
        params.quality = Quality::Uhd4k;
        let args = compile_params(&params).unwrap().to_args();
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        let size = args.iter().position(|a| a == "-s").unwrap();
        let rate = args.iter().position(|a| a == "-r").unwrap();
        let codec = args.iter().position(|a| a == "-c:v").unwrap();
        assert!(vf < size && size < rate && rate < codec);
        assert_eq!(args[size + 1], "3840x2160");
        assert_eq!(args[size + 3], "40M");
    }

    #[test]
    fn compile_is_deterministic() {
        let params = make_params(3.0, 9.0);
        assert_eq!(
            compile_params(&params).unwrap(),
            compile_params(&params).unwrap()
        );
    }

    #[test]
    fn oversized_aspect_is_rejected_without_overflow() {
        for (w, h) in [(30_000_000, 1), (1, u32::MAX), (92, 1)] {
            let mut params = make_params(0.0, 3.0);
            params.aspect = AspectRatio::new_unchecked(w, h);
            assert!(
                matches!(
                    compile_params(&params),
                    Err(RenderError::Core(CoreError::InvalidAspectRatio { width, height }))
                        if width == w && height == h
                ),
                "expected InvalidAspectRatio for {w}:{h}"
            );
        }

        let widest = FrameGeometry::for_aspect(AspectRatio::new_unchecked(91, 1)).unwrap();
        assert_eq!((widest.width, widest.height), (16380, 180));
    }

    #[test]
    fn cover_fit_scales_up_and_crops() {
        let mut params = make_params(0.0, 4.0);
        params.filter = "none".into();
        params.aspect = AspectRatio::new_unchecked(4, 5);
        let cmd = compile_params(&params).unwrap();
        assert_eq!(cmd.fit, FrameFit::Cover);
        assert_eq!(
            cmd.filter_graph,
            "scale=720:900:force_original_aspect_ratio=increase,crop=720:900"
        );
    }

    #[test]
    fn letterbox_fit_scales_down_and_pads() {
        let mut params = make_params(0.0, 4.0);
        params.fit = FrameFit::Letterbox;
        let cmd = compile_params(&params).unwrap();
        assert_eq!(cmd.fit, FrameFit::Letterbox);
        assert_eq!((cmd.geometry.width, cmd.geometry.height), (1620, 2880));
        assert!(cmd.filter_graph.starts_with(
            "scale=1620:2880:force_original_aspect_ratio=decrease,pad=1620:2880:(ow-iw)/2:(oh-ih)/2,eq="
        ));
        assert!(!cmd.filter_graph.contains("crop="));
    }

    // -----------------------------------------------------------------------
    // Filter graph parsing, as libavfilter reads it back
    // -----------------------------------------------------------------------

    const WHITESPACE: [char; 4] = [' ', '\n', '\t', '\r'];

    /// One token as `av_get_token` reads it: backslash escapes a character,
    /// single quotes are literal, unescaped whitespace at the ends is dropped.
    fn get_token<'a>(buf: &'a str, term: &[char]) -> (String, &'a str) {
        let rest = buf.trim_start_matches(WHITESPACE);
        let mut out = String::new();
        let mut kept = 0;
        let mut consumed = rest.len();
        let mut chars = rest.char_indices();
        while let Some((i, c)) = chars.next() {
            if term.contains(&c) {
                consumed = i;
                break;
            }
            match c {
                '\\' => match chars.next() {
                    Some((_, next)) => {
                        out.push(next);
                        kept = out.len();
                    }
                    None => out.push(c),
                },
                '\'' => {
                    for (_, quoted) in chars.by_ref() {
                        if quoted == '\'' {
                            break;
                        }
                        out.push(quoted);
                    }
                    kept = out.len();
                }
                _ => out.push(c),
            }
        }
        let tail = out[kept..].trim_end_matches(WHITESPACE).len();
        out.truncate(kept + tail);
        (out, &rest[consumed..])
    }

    /// `key=value` pairs of one filter. Positional values get an empty key.
    fn parse_options(opts: &str) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let mut rest = opts;
        while !rest.is_empty() {
            let key_len = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
                .unwrap_or(rest.len());
            let (key, value_start) = match rest[key_len..].strip_prefix('=') {
                Some(after) => (rest[..key_len].to_string(), after),
                None => (String::new(), rest),
            };
            let (value, after) = get_token(value_start, &[':']);
            pairs.push((key, value));
            rest = after.strip_prefix(':').unwrap_or(after);
        }
        pairs
    }

    /// Filters of a linear chain, each with its parsed options.
    fn parse_chain(graph: &str) -> Vec<(String, Vec<(String, String)>)> {
        let mut filters = Vec::new();
        let mut rest = graph;
        while !rest.is_empty() {
            let (name, after) = get_token(rest, &['=', ',', ';', '[']);
            rest = after;
            let mut options = Vec::new();
            if let Some(after) = rest.strip_prefix('=') {
                let (opts, after) = get_token(after, &['[', ']', ',', ';']);
                options = parse_options(&opts);
                rest = after;
            }
            filters.push((name, options));
            rest = rest.strip_prefix(',').unwrap_or(rest);
        }
        filters
    }

    fn option<'a>(options: &'a [(String, String)], key: &str) -> Option<&'a str> {
        options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn overlay_graph(text: &str) -> String {
        let mut params = make_params(4.0, 9.0);
        params.filter = "none".into();
        let mut overlay = TextOverlay::new(text);
        overlay.position = TextPosition::Top;
        overlay.effects.background = true;
        overlay.effects.shadow = true;
        overlay.animation = TextAnimation::FadeIn;
        params.overlays.push(overlay);
        compile_params(&params).unwrap().filter_graph
    }

    #[test]
    fn plain_overlay_text_needs_no_escaping() {
        let mut params = make_params(0.0, 3.0);
        params.filter = "none".into();
        params.overlays.push(TextOverlay::new("Hello"));
        let cmd = compile_params(&params).unwrap();
        assert!(cmd.filter_graph.ends_with(
            ",drawtext=text=Hello:expansion=none:fontsize=50:fontcolor=0xFFFFFF\
             :x=(w-text_w)/2:y=h*0.9-text_h:shadowcolor=black@0.6:shadowx=2:shadowy=2"
        ));
    }

    #[test]
    fn overlay_text_survives_both_parse_levels() {
        for text in [
            "Day 1: Beach",
            "It's 100%",
            "50% off!",
            "a, b; [c]",
            r"C:\path\to",
            "'quoted' \\ 'twice'",
            " padded ",
        ] {
            let graph = overlay_graph(text);
            let filters = parse_chain(&graph);
            let names: Vec<&str> = filters.iter().map(|(n, _)| n.as_str()).collect();
            assert_eq!(names, ["scale", "crop", "drawtext"], "graph for {text:?}: {graph}");

            let drawtext = &filters[2].1;
            assert_eq!(option(drawtext, "text"), Some(text), "graph: {graph}");
            assert_eq!(option(drawtext, "expansion"), Some("none"));
            assert_eq!(option(drawtext, "fontsize"), Some("50"));
            assert_eq!(option(drawtext, "fontcolor"), Some("0xFFFFFF"));
            assert_eq!(option(drawtext, "y"), Some("h*0.1"));
            assert_eq!(option(drawtext, "shadowcolor"), Some("black@0.6"));
            assert_eq!(option(drawtext, "box"), Some("1"));
            assert_eq!(option(drawtext, "alpha"), Some("min(max((t-4)/1,0),1)"));
        }
    }

    #[test]
    fn overlay_font_name_is_escaped_like_text() {
        let mut params = make_params(0.0, 3.0);
        params.filter = "none".into();
        let mut overlay = TextOverlay::new("Hi");
        overlay.font = Some("Noto Sans:Bold, 'Display'".into());
        params.overlays.push(overlay);
        let graph = compile_params(&params).unwrap().filter_graph;

        let filters = parse_chain(&graph);
        assert_eq!(filters.len(), 3);
        assert_eq!(
            option(&filters[2].1, "font"),
            Some("Noto Sans:Bold, 'Display'")
        );
    }

    #[test]
    fn overlays_follow_color_steps() {
        let mut params = make_params(4.0, 9.0);
        params.overlays.push(TextOverlay::new("Hi"));
        let graph = compile_params(&params).unwrap().filter_graph;
        let names: Vec<String> = parse_chain(&graph).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["scale", "crop", "eq", "drawtext"]);
    }

    #[test]
    fn invalid_overlay_fails_fast() {
        let mut params = make_params(0.0, 3.0);
        params.overlays.push(TextOverlay::new(""));
        assert!(matches!(
            compile_params(&params),
            Err(RenderError::Core(CoreError::InvalidOverlay(_)))
        ));
    }
}
