//! External collaborators around the dubbing engine: translation and
//! speech synthesis.

pub mod synth;
pub mod translate;

pub use synth::{CommandSynthesizer, MockSynthesizer, SpeechSynthesizer};
#[cfg(feature = "libretranslate")]
pub use translate::LibreTranslate;
pub use translate::{MockTranslator, Passthrough, Translator, translate_or_original};
