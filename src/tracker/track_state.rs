/// Where an occurrence sits within its lineage segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// The segment continues in the next frame
    #[default]
    Continued,
    /// The segment reached the last frame of the stack
    LastFrame,
    /// The cell divided into two daughter segments
    Divided,
    /// No continuation was found (cell lost or left the field of view)
    Lost,
}

impl TrackState {
    /// True for the states that close a segment.
    pub fn is_terminal(self) -> bool {
        !matches!(self, TrackState::Continued)
    }
}
