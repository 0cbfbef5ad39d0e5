//! Query-string parameters describing an image transformation
//!
//! Recognized keys: `w`, `h`, `fit`, `crop`, `mono`, `flip`, `rot`, `blur`,
//! `fm`, `q`, `auto`. Anything else, and any value that does not parse for
//! its key, is left out of the [`ProcessSpec`].

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::ProcessorConfig;

#[derive(Debug, Error)]
#[error("unknown processing parameter: {0}")]
pub struct UnknownParamKey(pub String);

/// Canonical parameter keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamKey {
    Width,
    Height,
    Fit,
    Crop,
    Mono,
    Flip,
    Rotate,
    Blur,
    Format,
    Quality,
    Auto,
}

impl ParamKey {
    pub const ALL: [ParamKey; 11] = [
        ParamKey::Width,
        ParamKey::Height,
        ParamKey::Fit,
        ParamKey::Crop,
        ParamKey::Mono,
        ParamKey::Flip,
        ParamKey::Rotate,
        ParamKey::Blur,
        ParamKey::Format,
        ParamKey::Quality,
        ParamKey::Auto,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKey::Width => "w",
            ParamKey::Height => "h",
            ParamKey::Fit => "fit",
            ParamKey::Crop => "crop",
            ParamKey::Mono => "mono",
            ParamKey::Flip => "flip",
            ParamKey::Rotate => "rot",
            ParamKey::Blur => "blur",
            ParamKey::Format => "fm",
            ParamKey::Quality => "q",
            ParamKey::Auto => "auto",
        }
    }
}

impl FromStr for ParamKey {
    type Err = UnknownParamKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParamKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| UnknownParamKey(s.to_string()))
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a resize treats the aspect ratio when both dimensions are given
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitMode {
    /// Cover the target box, then cut the overflow at the crop anchor
    Crop,
    /// Stretch to exactly the target box
    Scale,
}

impl FromStr for FitMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "crop" => Ok(FitMode::Crop),
            "scale" => Ok(FitMode::Scale),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Horizontal {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Vertical {
    Top,
    #[default]
    Center,
    Bottom,
}

/// Where the crop window sits inside the resized image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Anchor {
    pub horizontal: Horizontal,
    pub vertical: Vertical,
}

impl FromStr for Anchor {
    type Err = ();

    /// Accepts comma separated edges, e.g. `top`, `bottom,right`, `center`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut anchor = Anchor::default();
        for token in s.split(',').map(str::trim) {
            match token.to_ascii_lowercase().as_str() {
                "top" => anchor.vertical = Vertical::Top,
                "bottom" => anchor.vertical = Vertical::Bottom,
                "left" => anchor.horizontal = Horizontal::Left,
                "right" => anchor.horizontal = Horizontal::Right,
                "center" | "centre" => {}
                _ => return Err(()),
            }
        }
        Ok(anchor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flip {
    pub horizontal: bool,
    pub vertical: bool,
}

impl FromStr for Flip {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "h" => Ok(Flip {
                horizontal: true,
                vertical: false,
            }),
            "v" => Ok(Flip {
                horizontal: false,
                vertical: true,
            }),
            "hv" | "vh" => Ok(Flip {
                horizontal: true,
                vertical: true,
            }),
            _ => Err(()),
        }
    }
}

/// Clockwise rotation in quarter turns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl FromStr for Rotation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let degrees: i64 = s.parse().map_err(|_| ())?;
        match degrees.rem_euclid(360) {
            0 => Ok(Rotation::None),
            90 => Ok(Rotation::Cw90),
            180 => Ok(Rotation::Cw180),
            270 => Ok(Rotation::Cw270),
            _ => Err(()),
        }
    }
}

/// Encoded output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
    WebP,
    Gif,
}

impl FromStr for OutputFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "webp" => Ok(OutputFormat::WebP),
            "gif" => Ok(OutputFormat::Gif),
            _ => Err(()),
        }
    }
}

/// Monochrome conversion, optionally tinted towards an RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mono {
    pub tint: Option<[u8; 3]>,
}

impl FromStr for Mono {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if matches!(s.to_ascii_lowercase().as_str(), "true" | "1" | "yes") {
            return Ok(Mono { tint: None });
        }

        let hex = s.trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ());
        Ok(Mono {
            tint: Some([channel(0)?, channel(2)?, channel(4)?]),
        })
    }
}

/// A single parsed parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Param {
    Width(u32),
    Height(u32),
    Fit(FitMode),
    Crop(Anchor),
    Mono(Mono),
    Flip(Flip),
    Rotate(Rotation),
    Blur(f32),
    Format(OutputFormat),
    Quality(u8),
    /// `auto=compress`: re-encode with the default quality
    Compress,
}

impl Param {
    /// Typed parse of `value` for `key`; `None` when the value is malformed
    pub fn parse(key: ParamKey, value: &str) -> Option<Param> {
        let value = value.trim();
        match key {
            ParamKey::Width => positive(value).map(Param::Width),
            ParamKey::Height => positive(value).map(Param::Height),
            ParamKey::Fit => value.parse().ok().map(Param::Fit),
            ParamKey::Crop => value.parse().ok().map(Param::Crop),
            ParamKey::Mono => value.parse().ok().map(Param::Mono),
            ParamKey::Flip => value.parse().ok().map(Param::Flip),
            ParamKey::Rotate => value.parse().ok().map(Param::Rotate),
            ParamKey::Blur => value
                .parse::<f32>()
                .ok()
                .filter(|sigma| *sigma > 0.0 && *sigma <= 1000.0)
                .map(Param::Blur),
            ParamKey::Format => value.parse().ok().map(Param::Format),
            ParamKey::Quality => value
                .parse::<u8>()
                .ok()
                .filter(|q| (1..=100).contains(q))
                .map(Param::Quality),
            ParamKey::Auto => value
                .eq_ignore_ascii_case("compress")
                .then_some(Param::Compress),
        }
    }

    pub fn key(&self) -> ParamKey {
        match self {
            Param::Width(_) => ParamKey::Width,
            Param::Height(_) => ParamKey::Height,
            Param::Fit(_) => ParamKey::Fit,
            Param::Crop(_) => ParamKey::Crop,
            Param::Mono(_) => ParamKey::Mono,
            Param::Flip(_) => ParamKey::Flip,
            Param::Rotate(_) => ParamKey::Rotate,
            Param::Blur(_) => ParamKey::Blur,
            Param::Format(_) => ParamKey::Format,
            Param::Quality(_) => ParamKey::Quality,
            Param::Compress => ParamKey::Auto,
        }
    }
}

fn positive(value: &str) -> Option<u32> {
    value.parse::<u32>().ok().filter(|v| *v > 0)
}

/// Requested transformation, in query order
///
/// [`ProcessSpec::EMPTY`] means "serve the bytes unmodified". A spec holding
/// explicit no-op values (`rot=0`) is not empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcessSpec {
    params: Vec<Param>,
}

impl ProcessSpec {
    pub const EMPTY: ProcessSpec = ProcessSpec { params: Vec::new() };

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn width(&self) -> Option<u32> {
        self.find(|p| match p {
            Param::Width(w) => Some(*w),
            _ => None,
        })
    }

    pub fn height(&self) -> Option<u32> {
        self.find(|p| match p {
            Param::Height(h) => Some(*h),
            _ => None,
        })
    }

    pub fn fit(&self) -> Option<FitMode> {
        self.find(|p| match p {
            Param::Fit(fit) => Some(*fit),
            _ => None,
        })
    }

    pub fn crop(&self) -> Anchor {
        self.find(|p| match p {
            Param::Crop(anchor) => Some(*anchor),
            _ => None,
        })
        .unwrap_or_default()
    }

    pub fn mono(&self) -> Option<Mono> {
        self.find(|p| match p {
            Param::Mono(mono) => Some(*mono),
            _ => None,
        })
    }

    pub fn flip(&self) -> Option<Flip> {
        self.find(|p| match p {
            Param::Flip(flip) => Some(*flip),
            _ => None,
        })
    }

    pub fn rotation(&self) -> Option<Rotation> {
        self.find(|p| match p {
            Param::Rotate(rot) => Some(*rot),
            _ => None,
        })
    }

    pub fn blur(&self) -> Option<f32> {
        self.find(|p| match p {
            Param::Blur(sigma) => Some(*sigma),
            _ => None,
        })
    }

    pub fn format(&self) -> Option<OutputFormat> {
        self.find(|p| match p {
            Param::Format(fm) => Some(*fm),
            _ => None,
        })
    }

    pub fn quality(&self) -> Option<u8> {
        self.find(|p| match p {
            Param::Quality(q) => Some(*q),
            _ => None,
        })
    }

    pub fn compress(&self) -> bool {
        self.params.contains(&Param::Compress)
    }

    fn find<T>(&self, pick: impl Fn(&Param) -> Option<T>) -> Option<T> {
        self.params.iter().find_map(pick)
    }
}

impl FromIterator<Param> for ProcessSpec {
    fn from_iter<I: IntoIterator<Item = Param>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().collect(),
        }
    }
}

/// Turns query pairs into a [`ProcessSpec`]
///
/// The recognized key set can be extended with aliases and narrowed by
/// disabling keys; see [`ProcessorConfig`].
#[derive(Debug, Clone, Default)]
pub struct SpecParser {
    aliases: HashMap<String, ParamKey>,
    disabled: HashSet<ParamKey>,
}

impl SpecParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ProcessorConfig) -> Result<Self, UnknownParamKey> {
        let mut parser = Self::new();
        for (alias, target) in &config.aliases {
            parser = parser.with_alias(alias.clone(), target.parse()?);
        }
        for key in &config.disabled {
            parser = parser.without(key.parse()?);
        }
        Ok(parser)
    }

    pub fn with_alias(mut self, alias: impl Into<String>, key: ParamKey) -> Self {
        self.aliases.insert(alias.into(), key);
        self
    }

    pub fn without(mut self, key: ParamKey) -> Self {
        self.disabled.insert(key);
        self
    }

    /// Query keys this parser accepts, canonical keys first
    pub fn recognized_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = ParamKey::ALL
            .into_iter()
            .filter(|key| !self.disabled.contains(key))
            .map(|key| key.as_str().to_string())
            .collect();

        let mut aliases: Vec<String> = self
            .aliases
            .iter()
            .filter(|(_, key)| !self.disabled.contains(*key))
            .map(|(alias, _)| alias.clone())
            .collect();
        aliases.sort();

        keys.extend(aliases);
        keys
    }

    fn resolve(&self, key: &str) -> Option<ParamKey> {
        let key = match self.aliases.get(key) {
            Some(key) => *key,
            None => key.parse().ok()?,
        };
        (!self.disabled.contains(&key)).then_some(key)
    }

    /// Never fails: unknown keys, empty values and malformed values are
    /// dropped. The first occurrence of a key decides its value.
    pub fn parse(&self, pairs: &[(String, String)]) -> ProcessSpec {
        let mut seen = HashSet::new();
        let mut params = Vec::new();

        for (raw_key, value) in pairs {
            if value.is_empty() {
                continue;
            }
            let Some(key) = self.resolve(raw_key) else {
                continue;
            };
            if !seen.insert(key) {
                continue;
            }

            match Param::parse(key, value) {
                Some(param) => params.push(param),
                None => tracing::debug!(key = %raw_key, %value, "Dropping malformed parameter"),
            }
        }

        ProcessSpec { params }
    }
}
