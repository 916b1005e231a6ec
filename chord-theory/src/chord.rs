//! Relative and absolute chord value types.
//!
//! A `RelativeChord` is a chord shape independent of root: a triad quality,
//! an optional seventh, and an inversion count. A `Chord` pairs an optional
//! absolute-or-relative root (semitone 0..11, or `None` for "no chord") with
//! an optional `RelativeChord` (`None` meaning a pedal tone on the root).

use serde::{Deserialize, Serialize};

/// Triad quality. Suspensions are treated as major for coarsening purposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quality {
    Maj,
    Min,
    Dim,
    Aug,
    MajB5,
    Sus2,
    Sus4,
}

impl Quality {
    fn as_str(self) -> &'static str {
        match self {
            Quality::Maj => "maj",
            Quality::Min => "min",
            Quality::Dim => "dim",
            Quality::Aug => "aug",
            Quality::MajB5 => "majb5",
            Quality::Sus2 => "sus2",
            Quality::Sus4 => "sus4",
        }
    }

    fn parse(s: &str) -> Result<Self, String> {
        match s {
            "maj" => Ok(Quality::Maj),
            "min" => Ok(Quality::Min),
            "dim" => Ok(Quality::Dim),
            "aug" => Ok(Quality::Aug),
            "majb5" => Ok(Quality::MajB5),
            "sus2" => Ok(Quality::Sus2),
            "sus4" => Ok(Quality::Sus4),
            other => Err(format!("unknown chord quality: {other}")),
        }
    }

    /// Triad offsets above the root, before any seventh or inversion.
    fn triad_offsets(self) -> [i32; 2] {
        match self {
            Quality::Maj => [4, 7],
            Quality::Min => [3, 7],
            Quality::Dim => [3, 6],
            Quality::Aug => [4, 8],
            Quality::MajB5 => [4, 6],
            Quality::Sus2 => [2, 7],
            Quality::Sus4 => [5, 7],
        }
    }
}

/// Seventh quality layered atop the triad.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Seventh {
    Maj,
    Min,
    Dim,
}

impl Seventh {
    fn as_str(self) -> &'static str {
        match self {
            Seventh::Maj => "maj",
            Seventh::Min => "min",
            Seventh::Dim => "dim",
        }
    }

    fn parse(s: &str) -> Result<Self, String> {
        match s {
            "maj" => Ok(Seventh::Maj),
            "min" => Ok(Seventh::Min),
            "dim" => Ok(Seventh::Dim),
            other => Err(format!("unknown seventh quality: {other}")),
        }
    }

    fn offset(self) -> i32 {
        match self {
            Seventh::Maj => 11,
            Seventh::Min => 10,
            Seventh::Dim => 9,
        }
    }
}

/// A chord shape independent of root: quality, optional seventh, inversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelativeChord {
    pub quality: Quality,
    pub seventh: Option<Seventh>,
    pub inversions: u8,
}

impl PartialOrd for RelativeChord {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RelativeChord {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.stringify().cmp(&other.stringify())
    }
}

impl RelativeChord {
    pub fn new(quality: Quality, seventh: Option<Seventh>, inversions: u8) -> Self {
        Self {
            quality,
            seventh,
            inversions,
        }
    }

    pub fn triad(quality: Quality) -> Self {
        Self::new(quality, None, 0)
    }

    /// Coarsened to {maj, min}: dim collapses into min, everything else maj.
    pub fn simple_quality(&self) -> Quality {
        match self.quality {
            Quality::Min | Quality::Dim => Quality::Min,
            _ => Quality::Maj,
        }
    }

    /// Coarsened to {maj, min, dim}: dim is preserved as its own bucket.
    pub fn beta_quality(&self) -> Quality {
        match self.quality {
            Quality::Min => Quality::Min,
            Quality::Dim => Quality::Dim,
            _ => Quality::Maj,
        }
    }

    /// Drop everything but simple quality and dominant-seventh-ness; drop inversions.
    pub fn rs_collapse(&self) -> Self {
        let sq = self.simple_quality();
        let seventh = if self.seventh == Some(Seventh::Min) && sq == Quality::Maj {
            Some(Seventh::Min)
        } else {
            None
        };
        Self::new(sq, seventh, 0)
    }

    /// Like `rs_collapse`, but preserves dim as its own quality bucket.
    pub fn beta_collapse(&self) -> Self {
        let bq = self.beta_quality();
        let seventh = if self.seventh == Some(Seventh::Min)
            && matches!(bq, Quality::Min | Quality::Maj)
        {
            Some(Seventh::Min)
        } else {
            None
        };
        Self::new(bq, seventh, 0)
    }

    pub fn simplified(&self) -> Self {
        Self::triad(self.simple_quality())
    }

    /// Semitone offsets above the root, rotated once per inversion with the
    /// departing bass note pushed up an octave.
    pub fn render_offsets(&self) -> Vec<i32> {
        let mut offsets = vec![0];
        offsets.extend(self.quality.triad_offsets());
        if let Some(seventh) = self.seventh {
            offsets.push(seventh.offset());
        }
        for _ in 0..self.inversions {
            let departing = offsets.remove(0);
            offsets.push(departing + 12);
        }
        offsets
    }

    pub fn stringify(&self) -> String {
        let seventh = self.seventh.map_or("None".to_string(), |s| s.as_str().to_string());
        format!("{} {} {}", self.quality.as_str(), seventh, self.inversions)
    }

    pub fn parse(s: &str) -> Result<Self, String> {
        let mut parts = s.split(' ');
        let quality = Quality::parse(parts.next().ok_or("missing quality")?)?;
        let seventh_str = parts.next().ok_or("missing seventh")?;
        let seventh = if seventh_str == "None" {
            None
        } else {
            Some(Seventh::parse(seventh_str)?)
        };
        let inversions: u8 = parts
            .next()
            .ok_or("missing inversions")?
            .parse()
            .map_err(|_| "inversions must be an integer".to_string())?;
        Ok(Self::new(quality, seventh, inversions))
    }
}

/// Common named relative chords, mirroring the reference corpus's chord
/// constant table (dominant/minor/major sevenths, diminished variants, …).
pub mod rc {
    use super::{Quality, RelativeChord, Seventh};

    pub fn maj() -> RelativeChord {
        RelativeChord::triad(Quality::Maj)
    }
    pub fn min() -> RelativeChord {
        RelativeChord::triad(Quality::Min)
    }
    pub fn aug() -> RelativeChord {
        RelativeChord::triad(Quality::Aug)
    }
    pub fn dim() -> RelativeChord {
        RelativeChord::triad(Quality::Dim)
    }
    pub fn sus2() -> RelativeChord {
        RelativeChord::triad(Quality::Sus2)
    }
    pub fn sus4() -> RelativeChord {
        RelativeChord::triad(Quality::Sus4)
    }
    pub fn sus47() -> RelativeChord {
        RelativeChord::new(Quality::Sus4, Some(Seventh::Min), 0)
    }
    pub fn aug7() -> RelativeChord {
        RelativeChord::new(Quality::Aug, Some(Seventh::Min), 0)
    }
    pub fn dom7() -> RelativeChord {
        RelativeChord::new(Quality::Maj, Some(Seventh::Min), 0)
    }
    pub fn min7() -> RelativeChord {
        RelativeChord::new(Quality::Min, Some(Seventh::Min), 0)
    }
    pub fn maj7() -> RelativeChord {
        RelativeChord::new(Quality::Maj, Some(Seventh::Maj), 0)
    }
    pub fn min_maj7() -> RelativeChord {
        RelativeChord::new(Quality::Min, Some(Seventh::Maj), 0)
    }
    pub fn dim7() -> RelativeChord {
        RelativeChord::new(Quality::Dim, Some(Seventh::Dim), 0)
    }
    pub fn half_dim7() -> RelativeChord {
        RelativeChord::new(Quality::Dim, Some(Seventh::Min), 0)
    }
}

/// A chord: an optional root semitone (`None` = no chord) paired with an
/// optional relative shape (`None` = pedal tone on the root alone).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chord {
    pub root: Option<u8>,
    pub relative: Option<RelativeChord>,
}

impl PartialOrd for Chord {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Chord {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.stringify().cmp(&other.stringify())
    }
}

impl Chord {
    pub fn new(root: Option<u8>, relative: Option<RelativeChord>) -> Self {
        Self { root, relative }
    }

    pub fn no_chord() -> Self {
        Self::new(None, None)
    }

    pub fn pedal(root: u8) -> Self {
        Self::new(Some(root), None)
    }

    pub fn simple_quality(&self) -> Option<Quality> {
        self.relative.map(|rc| rc.simple_quality())
    }

    /// Semitone offsets above nothing in particular: the chord's own
    /// absolute pitch-class list, root-first.
    pub fn render(&self) -> Vec<i32> {
        let Some(root) = self.root else {
            return Vec::new();
        };
        match self.relative {
            None => vec![root as i32],
            Some(rc) => rc.render_offsets().into_iter().map(|o| root as i32 + o).collect(),
        }
    }

    /// Render the chord's pitches with the bass voice folded into the
    /// octave starting at `bottom_bass`, then transposed up by `offset`.
    pub fn render_offset(&self, offset: i32, bottom_bass: i32) -> Vec<i32> {
        let rendered = self.render();
        let Some(&bass) = rendered.first() else {
            return Vec::new();
        };
        let new_bass = (bass + offset - bottom_bass).rem_euclid(12) + bottom_bass;
        rendered.into_iter().map(|note| new_bass - bass + note).collect()
    }

    pub fn rs_collapse(&self) -> Self {
        Self::new(self.root, self.relative.map(|rc| rc.rs_collapse()))
    }

    pub fn beta_collapse(&self) -> Self {
        Self::new(self.root, self.relative.map(|rc| rc.beta_collapse()))
    }

    pub fn simplified(&self) -> Self {
        Self::new(self.root, self.relative.map(|rc| rc.simplified()))
    }

    pub fn stringify(&self) -> String {
        match (self.root, self.relative) {
            (None, _) => String::new(),
            (Some(root), None) => root.to_string(),
            (Some(root), Some(rc)) => format!("{root:02}:{}", rc.stringify()),
        }
    }

    pub fn parse(s: &str) -> Result<Self, String> {
        if s.is_empty() {
            return Ok(Self::no_chord());
        }
        match s.split_once(':') {
            None => {
                let root: u8 = s.parse().map_err(|_| format!("invalid chord root: {s}"))?;
                Ok(Self::pedal(root))
            }
            Some((root, rest)) => {
                let root: u8 = root.parse().map_err(|_| format!("invalid chord root: {root}"))?;
                Ok(Self::new(Some(root), Some(RelativeChord::parse(rest)?)))
            }
        }
    }

    pub fn transpose(&self, steps: i32) -> Self {
        match self.root {
            None => *self,
            Some(root) => Self::new(Some(((root as i32 + steps).rem_euclid(12)) as u8), self.relative),
        }
    }

    /// Convert a chord stored relative to a major-key tonic into an
    /// absolute chord, given the key signature's circle-of-fifths position.
    pub fn relative_to_absolute(&self, key_signature: i32) -> Self {
        self.transpose(key_signature * 7)
    }

    /// Inverse of `relative_to_absolute`.
    pub fn absolute_to_relative(&self, key_signature: i32) -> Self {
        self.transpose(key_signature * 5)
    }
}

/// Common absolute chords at root 0, named after their diatonic function
/// relative to a major tonic.
pub mod c {
    use super::{Chord, Quality, RelativeChord};

    pub fn tonic_major() -> Chord {
        Chord::new(Some(0), Some(RelativeChord::triad(Quality::Maj)))
    }
    pub fn tonic_minor() -> Chord {
        Chord::new(Some(0), Some(RelativeChord::triad(Quality::Min)))
    }
    pub fn i() -> Chord {
        tonic_major()
    }
    pub fn i_minor() -> Chord {
        tonic_minor()
    }
    pub fn ii() -> Chord {
        Chord::new(Some(2), Some(RelativeChord::triad(Quality::Min)))
    }
    pub fn iv() -> Chord {
        Chord::new(Some(5), Some(RelativeChord::triad(Quality::Maj)))
    }
    pub fn v() -> Chord {
        Chord::new(Some(7), Some(RelativeChord::triad(Quality::Maj)))
    }
    pub fn vi() -> Chord {
        Chord::new(Some(9), Some(RelativeChord::triad(Quality::Min)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stringify_parse_roundtrip_full_chord() {
        let chord = Chord::new(Some(7), Some(RelativeChord::new(Quality::Maj, Some(Seventh::Min), 2)));
        let s = chord.stringify();
        assert_eq!(Chord::parse(&s).unwrap(), chord);
    }

    #[test]
    fn stringify_parse_roundtrip_pedal() {
        let chord = Chord::pedal(3);
        assert_eq!(Chord::parse(&chord.stringify()).unwrap(), chord);
    }

    #[test]
    fn stringify_parse_roundtrip_no_chord() {
        let chord = Chord::no_chord();
        assert_eq!(Chord::parse(&chord.stringify()).unwrap(), chord);
    }

    #[test]
    fn transpose_round_trip() {
        let chord = c::v();
        let back = chord.transpose(5).transpose(-5);
        assert_eq!(chord, back);
    }

    #[test]
    fn relative_absolute_round_trip() {
        let chord = c::ii();
        let back = chord.relative_to_absolute(3).absolute_to_relative(3);
        assert_eq!(chord, back);
    }

    #[test]
    fn render_offsets_dominant_seventh_root_position() {
        let rc = rc::dom7();
        assert_eq!(rc.render_offsets(), vec![0, 4, 7, 10]);
    }

    #[test]
    fn render_offsets_first_inversion_rotates_and_octaves() {
        let rc = RelativeChord::new(Quality::Maj, None, 1);
        assert_eq!(rc.render_offsets(), vec![4, 7, 12]);
    }

    #[test]
    fn rs_collapse_preserves_dominant_seventh_only() {
        let rc = rc::dom7();
        let collapsed = rc.rs_collapse();
        assert_eq!(collapsed.quality, Quality::Maj);
        assert_eq!(collapsed.seventh, Some(Seventh::Min));
        assert_eq!(collapsed.inversions, 0);
    }

    #[test]
    fn rs_collapse_drops_major_seventh() {
        let rc = rc::maj7();
        let collapsed = rc.rs_collapse();
        assert_eq!(collapsed.seventh, None);
    }

    #[test]
    fn beta_collapse_preserves_dim() {
        let chord = Chord::new(Some(2), Some(rc::dim7()));
        let collapsed = chord.beta_collapse();
        assert_eq!(collapsed.relative.unwrap().quality, Quality::Dim);
    }

    #[test]
    fn render_offset_folds_bass_into_target_octave() {
        let chord = c::v();
        let rendered = chord.render_offset(0, 48);
        assert_eq!(rendered[0], 55);
    }

    #[test]
    fn no_chord_renders_empty() {
        assert!(Chord::no_chord().render().is_empty());
        assert!(Chord::no_chord().render_offset(0, 48).is_empty());
    }
}
