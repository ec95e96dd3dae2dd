//! Command encoding
//!
//! Each variant renders (via `Display`) to exactly one protocol line without
//! the CRLF terminator, which the client appends.

use std::fmt;

/// Channel/layer address, rendered as `channel-layer`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Layer {
    pub channel: u16,
    pub layer: u16,
}

impl Layer {
    pub fn new(channel: u16, layer: u16) -> Self {
        Self { channel, layer }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.channel, self.layer)
    }
}

/// What to load on a layer
#[derive(Debug, Clone, PartialEq)]
pub enum Clip {
    /// Server-relative media path, always quoted on the wire
    Media(String),
    /// Transparent producer, used to fade a layer out
    Empty,
}

/// Chroma-key parameters for `MIXER ... CHROMA`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChromaKey {
    pub color: KeyColor,
    pub threshold: f32,
    pub softness: f32,
    pub spill: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyColor {
    Green,
    Blue,
}

impl fmt::Display for KeyColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyColor::Green => f.write_str("GREEN"),
            KeyColor::Blue => f.write_str("BLUE"),
        }
    }
}

/// Fill rectangle for `MIXER ... FILL`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl From<[f32; 4]> for Fill {
    fn from(v: [f32; 4]) -> Self {
        Self {
            x: v[0],
            y: v[1],
            scale_x: v[2],
            scale_y: v[3],
        }
    }
}

/// Protocol commands used by the automation engine
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `CLS` — full media listing
    ListMedia,
    /// `INFO c-l` — XML status for one layer
    Info(Layer),
    /// `PLAY c-l "clip" [MIX n] [LOOP] [AUTO]`
    Play {
        layer: Layer,
        clip: Clip,
        /// Cross-fade duration in frames
        mix: Option<u32>,
        looping: bool,
        auto: bool,
    },
    /// `STOP c-l`
    Stop(Layer),
    /// `CLEAR c` — clear every layer of a channel
    ClearChannel(u16),
    /// `MIXER c-l FILL x y sx sy`
    MixerFill { layer: Layer, fill: Fill },
    /// `MIXER c-l CHROMA color threshold softness spill`
    MixerChroma { layer: Layer, key: ChromaKey },
    /// `CG c ADD cg_layer template play_on_load data`
    CgAdd {
        channel: u16,
        cg_layer: u16,
        template: String,
        play_on_load: bool,
        /// Already quoted/escaped data argument
        data: String,
    },
}

impl Command {
    /// Cross-faded play of a media file
    pub fn play_mix(layer: Layer, path: impl Into<String>, mix_frames: u32) -> Self {
        Command::Play {
            layer,
            clip: Clip::Media(path.into()),
            mix: Some(mix_frames),
            looping: false,
            auto: false,
        }
    }

    /// Looping background play
    pub fn play_loop(layer: Layer, path: impl Into<String>, mix: Option<u32>) -> Self {
        Command::Play {
            layer,
            clip: Clip::Media(path.into()),
            mix,
            looping: true,
            auto: false,
        }
    }

    /// Fade a layer to nothing
    pub fn fade_out(layer: Layer, mix_frames: u32) -> Self {
        Command::Play {
            layer,
            clip: Clip::Empty,
            mix: Some(mix_frames),
            looping: false,
            auto: false,
        }
    }

    /// Command verb, as echoed in the server's status reply
    pub fn verb(&self) -> &'static str {
        match self {
            Command::ListMedia => "CLS",
            Command::Info(_) => "INFO",
            Command::Play { .. } => "PLAY",
            Command::Stop(_) => "STOP",
            Command::ClearChannel(_) => "CLEAR",
            Command::MixerFill { .. } | Command::MixerChroma { .. } => "MIXER",
            Command::CgAdd { .. } => "CG",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::ListMedia => f.write_str("CLS"),
            Command::Info(layer) => write!(f, "INFO {}", layer),
            Command::Play {
                layer,
                clip,
                mix,
                looping,
                auto,
            } => {
                write!(f, "PLAY {}", layer)?;
                match clip {
                    Clip::Media(path) => write!(f, " \"{}\"", path)?,
                    Clip::Empty => f.write_str(" EMPTY")?,
                }
                if let Some(frames) = mix {
                    write!(f, " MIX {}", frames)?;
                }
                if *looping {
                    f.write_str(" LOOP")?;
                }
                if *auto {
                    f.write_str(" AUTO")?;
                }
                Ok(())
            }
            Command::Stop(layer) => write!(f, "STOP {}", layer),
            Command::ClearChannel(channel) => write!(f, "CLEAR {}", channel),
            Command::MixerFill { layer, fill } => write!(
                f,
                "MIXER {} FILL {} {} {} {}",
                layer, fill.x, fill.y, fill.scale_x, fill.scale_y
            ),
            Command::MixerChroma { layer, key } => write!(
                f,
                "MIXER {} CHROMA {} {} {} {}",
                layer, key.color, key.threshold, key.softness, key.spill
            ),
            Command::CgAdd {
                channel,
                cg_layer,
                template,
                play_on_load,
                data,
            } => write!(
                f,
                "CG {} ADD {} {} {} {}",
                channel,
                cg_layer,
                template,
                u8::from(*play_on_load),
                data
            ),
        }
    }
}
