//! The song model and the three corpus readers (ABC/Nottingham, Rock
//! Corpus, MARG CSV) that feed the statistical model builder.

mod abc;
mod marg;
mod rs;
mod song;

pub use song::{Measure, Song};

pub mod readers {
    pub use crate::abc::parse as parse_abc;
    pub use crate::marg::parse_song as parse_marg_song;
    pub use crate::rs::{convert as convert_rs_chord, parse_song as parse_rs_song};
}
