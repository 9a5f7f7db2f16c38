mod engine;
mod envelope;
mod filter;
mod midi;
mod oscillator;
mod sample;
mod timeline;
mod voice;

#[cfg(feature = "host")]
pub mod demo;
#[cfg(feature = "host")]
pub mod host;

pub use engine::{Engine, MidiEvent};
pub use envelope::{Dl4r4Params, Envelope, LadParams, LadsrParams};
pub use filter::{Delay, Filter, Pass, PassMode};
pub use midi::{decode, Message};
pub use oscillator::{Oscillator, SampleData, Waveform};
pub use sample::load as load_sample;
pub use timeline::Timeline;
pub use voice::Voice;
