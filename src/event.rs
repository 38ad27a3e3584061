/// User commands delivered to the running session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlEvent {
    TogglePlayback,
    /// Relative seek in seconds.
    Seek {
        delta: f64,
    },
    /// Enter or leave scrub mode, where the playhead holds still while seeking.
    ToggleScrub,
    Restart,
    CycleGlobalPreset,
    CycleSectionPreset,
    Quit,
}
