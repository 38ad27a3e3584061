//! Playback clock.
//!
//! The clock owns the player state and is advanced once per frame by whoever hosts the
//! frame loop. Without an external [`TimeSource`] it integrates wall time between ticks;
//! with one bound, the source is the authority on both position and duration.

use std::time::Instant;

use tracing::{debug, info};

/// Something that plays media on its own and can report where it is.
pub trait TimeSource {
    fn play(&mut self);
    fn pause(&mut self);
    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, time: f64);
    /// `None` until the source knows its length.
    fn duration(&self) -> Option<f64>;
    fn has_ended(&self) -> bool;
    /// Frees whatever the source holds. Called once, right before it is dropped.
    fn release(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayerState {
    pub current_time: f64,
    pub is_playing: bool,
    pub duration: f64,
    pub is_seeking: bool,
}

pub struct PlaybackClock {
    state: PlayerState,
    source: Option<Box<dyn TimeSource>>,
    last_tick: Option<Instant>,
    destroyed: bool,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PlaybackClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackClock")
            .field("state", &self.state)
            .field("has_source", &self.source.is_some())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self {
            state: PlayerState::default(),
            source: None,
            last_tick: None,
            destroyed: false,
        }
    }

    pub fn current_time(&self) -> f64 {
        self.state.current_time
    }

    pub fn duration(&self) -> f64 {
        self.state.duration
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing
    }

    pub fn is_seeking(&self) -> bool {
        self.state.is_seeking
    }

    pub fn has_ended(&self) -> bool {
        !self.state.is_playing && self.state.current_time >= self.state.duration
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn progress(&self) -> f64 {
        if self.state.duration > 0.0 {
            self.state.current_time / self.state.duration
        } else {
            0.0
        }
    }

    pub fn formatted_time(&self) -> String {
        format_time(self.state.current_time)
    }

    pub fn formatted_duration(&self) -> String {
        format_time(self.state.duration)
    }

    pub fn play(&mut self) {
        if self.destroyed {
            return;
        }
        if self.state.current_time >= self.state.duration {
            self.seek_to(0.0);
        }
        self.state.is_playing = true;
        if let Some(source) = self.source.as_mut() {
            source.play();
        }
    }

    pub fn pause(&mut self) {
        self.state.is_playing = false;
        if let Some(source) = self.source.as_mut() {
            source.pause();
        }
    }

    pub fn toggle(&mut self) {
        if self.state.is_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn seek_to(&mut self, time: f64) {
        if self.destroyed {
            return;
        }
        self.state.current_time = self.clamp(time);
        if let Some(source) = self.source.as_mut() {
            source.set_current_time(self.state.current_time);
        }
        self.last_tick = None;
    }

    pub fn seek_by(&mut self, delta: f64) {
        self.seek_to(self.state.current_time + delta);
    }

    /// While seeking the clock holds its position even if playing.
    pub fn set_seeking(&mut self, seeking: bool) {
        if self.destroyed {
            return;
        }
        self.state.is_seeking = seeking;
        self.last_tick = None;
    }

    /// Ignored once a time source is bound; the source reports its own duration.
    pub fn set_duration(&mut self, duration: f64) {
        if self.source.is_none() && !self.destroyed {
            self.state.duration = duration.max(0.0);
            self.state.current_time = self.clamp(self.state.current_time);
        }
    }

    pub fn restart(&mut self) {
        self.seek_to(0.0);
        self.pause();
        self.last_tick = None;
    }

    /// Binds a new time source, releasing the previous one first. A destroyed clock
    /// releases the new source right away instead.
    pub fn attach_source(&mut self, mut source: Box<dyn TimeSource>) {
        if self.destroyed {
            source.release();
            return;
        }
        self.release_source();
        info!("attached external time source");
        self.source = Some(source);
        self.seek_to(0.0);
        self.state.is_playing = false;
    }

    pub fn detach_source(&mut self) {
        self.release_source();
    }

    fn release_source(&mut self) {
        if let Some(mut previous) = self.source.take() {
            previous.pause();
            previous.release();
            info!("released external time source");
        }
    }

    /// Advances the clock to `now`. Call once per frame.
    pub fn tick(&mut self, now: Instant) {
        if self.destroyed {
            return;
        }
        let delta = match self.last_tick {
            Some(last) => now.saturating_duration_since(last).as_secs_f64(),
            None => 0.0,
        };
        self.last_tick = Some(now);

        if let Some(source) = self.source.as_ref() {
            if let Some(duration) = source.duration() {
                self.state.duration = duration.max(0.0);
            }
            if source.has_ended() {
                self.state.is_playing = false;
            }
        }

        if !self.state.is_playing || self.state.is_seeking {
            return;
        }

        self.state.current_time = match self.source.as_ref() {
            Some(source) => source.current_time(),
            None => self.state.current_time + delta,
        };

        if self.state.current_time >= self.state.duration {
            self.state.current_time = self.state.duration;
            self.state.is_playing = false;
            if let Some(source) = self.source.as_mut() {
                source.pause();
            }
            debug!(duration = self.state.duration, "playback reached the end");
        }
        self.state.current_time = self.state.current_time.max(0.0);
    }

    /// Stops the loop for good and releases the bound source. Commands sent afterwards are
    /// ignored.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.state.is_playing = false;
        self.last_tick = None;
        self.release_source();
    }

    fn clamp(&self, time: f64) -> f64 {
        if time.is_nan() {
            return 0.0;
        }
        time.max(0.0).min(self.state.duration)
    }
}

impl Drop for PlaybackClock {
    fn drop(&mut self) {
        self.release_source();
    }
}

/// `M:SS`, minutes unpadded.
pub fn format_time(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let minutes = (seconds / 60.0).floor() as u64;
    let rest = (seconds % 60.0).floor() as u64;
    format!("{minutes}:{rest:0>2}")
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        rc::Rc,
        time::{Duration, Instant},
    };

    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    fn clock_with(duration: f64) -> PlaybackClock {
        let mut clock = PlaybackClock::new();
        clock.set_duration(duration);
        clock
    }

    #[derive(Debug, Default)]
    struct FakeSourceLog {
        time: f64,
        duration: Option<f64>,
        playing: bool,
        ended: bool,
        released: bool,
        plays: usize,
        pauses: usize,
    }

    struct FakeSource(Rc<RefCell<FakeSourceLog>>);

    impl TimeSource for FakeSource {
        fn play(&mut self) {
            let mut log = self.0.borrow_mut();
            log.playing = true;
            log.plays += 1;
        }

        fn pause(&mut self) {
            let mut log = self.0.borrow_mut();
            log.playing = false;
            log.pauses += 1;
        }

        fn current_time(&self) -> f64 {
            self.0.borrow().time
        }

        fn set_current_time(&mut self, time: f64) {
            self.0.borrow_mut().time = time;
        }

        fn duration(&self) -> Option<f64> {
            self.0.borrow().duration
        }

        fn has_ended(&self) -> bool {
            self.0.borrow().ended
        }

        fn release(&mut self) {
            self.0.borrow_mut().released = true;
        }
    }

    fn fake_source() -> (Box<dyn TimeSource>, Rc<RefCell<FakeSourceLog>>) {
        let log = Rc::new(RefCell::new(FakeSourceLog::default()));
        (Box::new(FakeSource(log.clone())), log)
    }

    #[test]
    fn seek_clamps_into_range() {
        let mut clock = clock_with(10.0);
        clock.seek_to(25.0);
        assert_eq!(clock.current_time(), 10.0);
        clock.seek_to(-3.0);
        assert_eq!(clock.current_time(), 0.0);
        clock.seek_to(f64::NAN);
        assert_eq!(clock.current_time(), 0.0);
        clock.seek_to(4.5);
        assert_eq!(clock.current_time(), 4.5);
    }

    #[test]
    fn play_at_the_end_rewinds_first() {
        let mut clock = clock_with(10.0);
        clock.seek_to(10.0);
        clock.play();
        assert_eq!(clock.current_time(), 0.0);
        assert!(clock.is_playing());
    }

    #[test]
    fn tick_integrates_wall_time_while_playing() {
        let mut clock = clock_with(10.0);
        let start = Instant::now();
        clock.play();
        clock.tick(start);
        assert_eq!(clock.current_time(), 0.0);
        clock.tick(start + Duration::from_millis(250));
        assert!(close(clock.current_time(), 0.25));
        clock.tick(start + Duration::from_millis(1000));
        assert!(close(clock.current_time(), 1.0));
    }

    #[test]
    fn paused_clock_does_not_advance() {
        let mut clock = clock_with(10.0);
        let start = Instant::now();
        clock.tick(start);
        clock.tick(start + Duration::from_secs(2));
        assert_eq!(clock.current_time(), 0.0);
    }

    #[test]
    fn seek_discards_the_pending_delta() {
        let mut clock = clock_with(10.0);
        let start = Instant::now();
        clock.play();
        clock.tick(start);
        clock.seek_to(5.0);
        // a long gap between the seek and the next frame must not count
        clock.tick(start + Duration::from_secs(3));
        assert_eq!(clock.current_time(), 5.0);
        clock.tick(start + Duration::from_millis(3500));
        assert!(close(clock.current_time(), 5.5));
    }

    #[test]
    fn reaching_the_end_stops_playback() {
        let mut clock = clock_with(1.0);
        let start = Instant::now();
        clock.play();
        clock.tick(start);
        clock.tick(start + Duration::from_secs(3));
        assert_eq!(clock.current_time(), 1.0);
        assert!(!clock.is_playing());
        assert!(clock.has_ended());
    }

    #[test]
    fn toggle_and_pause_are_idempotent() {
        let mut clock = clock_with(5.0);
        clock.toggle();
        assert!(clock.is_playing());
        clock.toggle();
        assert!(!clock.is_playing());
        clock.pause();
        clock.pause();
        assert!(!clock.is_playing());
    }

    #[test]
    fn restart_rewinds_and_pauses() {
        let mut clock = clock_with(5.0);
        clock.seek_to(3.0);
        clock.play();
        clock.restart();
        assert_eq!(clock.current_time(), 0.0);
        assert!(!clock.is_playing());
    }

    #[test]
    fn seeking_freezes_time() {
        let mut clock = clock_with(10.0);
        let start = Instant::now();
        clock.play();
        clock.tick(start);
        clock.set_seeking(true);
        clock.tick(start + Duration::from_secs(1));
        assert_eq!(clock.current_time(), 0.0);
        clock.seek_to(2.0);
        clock.set_seeking(false);
        clock.tick(start + Duration::from_secs(4));
        assert_eq!(clock.current_time(), 2.0);
        clock.tick(start + Duration::from_millis(4500));
        assert!(close(clock.current_time(), 2.5));
    }

    #[test]
    fn shrinking_duration_clamps_position() {
        let mut clock = clock_with(10.0);
        clock.seek_to(8.0);
        clock.set_duration(4.0);
        assert_eq!(clock.current_time(), 4.0);
    }

    #[test]
    fn bound_source_owns_position_and_duration() {
        let mut clock = clock_with(10.0);
        let (source, log) = fake_source();
        clock.attach_source(source);
        assert!(clock.has_source());

        clock.set_duration(99.0);
        assert_eq!(clock.duration(), 10.0);

        log.borrow_mut().duration = Some(30.0);
        clock.play();
        assert!(log.borrow().playing);
        log.borrow_mut().time = 12.5;
        clock.tick(Instant::now());
        assert_eq!(clock.duration(), 30.0);
        assert_eq!(clock.current_time(), 12.5);

        clock.seek_to(20.0);
        assert_eq!(log.borrow().time, 20.0);

        clock.pause();
        assert!(!log.borrow().playing);
    }

    #[test]
    fn source_end_is_reflected_and_paused() {
        let mut clock = clock_with(10.0);
        let (source, log) = fake_source();
        clock.attach_source(source);
        log.borrow_mut().duration = Some(8.0);
        clock.play();
        log.borrow_mut().time = 8.2;
        clock.tick(Instant::now());
        assert_eq!(clock.current_time(), 8.0);
        assert!(!clock.is_playing());
        assert!(!log.borrow().playing);

        clock.play();
        log.borrow_mut().ended = true;
        clock.tick(Instant::now());
        assert!(!clock.is_playing());
    }

    #[test]
    fn attaching_a_source_releases_the_previous_one() {
        let mut clock = clock_with(10.0);
        let (first, first_log) = fake_source();
        let (second, second_log) = fake_source();
        clock.attach_source(first);
        clock.attach_source(second);
        assert!(first_log.borrow().released);
        assert!(first_log.borrow().pauses >= 1);
        assert!(!second_log.borrow().released);
    }

    #[test]
    fn destroy_stops_ticks_and_releases_the_source() {
        let mut clock = clock_with(10.0);
        let (source, log) = fake_source();
        clock.attach_source(source);
        clock.destroy();
        assert!(log.borrow().released);
        assert!(!clock.has_source());

        let mut clock = clock_with(10.0);
        let start = Instant::now();
        clock.play();
        clock.tick(start);
        clock.destroy();
        clock.play();
        clock.tick(start + Duration::from_secs(2));
        assert_eq!(clock.current_time(), 0.0);
        clock.destroy();
        assert!(clock.is_destroyed());
    }

    #[test]
    fn destroyed_clock_ignores_further_commands() {
        let mut clock = clock_with(10.0);
        clock.seek_to(2.0);
        clock.destroy();

        clock.play();
        clock.seek_to(4.0);
        clock.set_seeking(true);
        clock.set_duration(20.0);
        assert_eq!(
            clock.state,
            PlayerState {
                current_time: 2.0,
                is_playing: false,
                duration: 10.0,
                is_seeking: false,
            }
        );

        let (source, log) = fake_source();
        clock.attach_source(source);
        assert!(!clock.has_source());
        assert!(log.borrow().released);
    }

    #[test]
    fn detaching_releases_the_source_and_keeps_position() {
        let mut clock = clock_with(10.0);
        let (source, log) = fake_source();
        clock.attach_source(source);
        log.borrow_mut().duration = Some(30.0);
        clock.play();
        log.borrow_mut().time = 12.0;
        clock.tick(Instant::now());

        clock.detach_source();
        assert!(!clock.has_source());
        assert!(log.borrow().released);
        assert!(!log.borrow().playing);
        assert_eq!(clock.current_time(), 12.0);

        // with no source bound, duration is ours to set again
        clock.set_duration(15.0);
        assert_eq!(clock.duration(), 15.0);
    }

    #[test]
    fn derived_values() {
        let mut clock = clock_with(125.0);
        assert_eq!(clock.progress(), 0.0);
        clock.seek_to(62.5);
        assert!(close(clock.progress(), 0.5));
        assert_eq!(clock.formatted_time(), "1:02");
        assert_eq!(clock.formatted_duration(), "2:05");
        assert_eq!(PlaybackClock::new().progress(), 0.0);
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(600.9), "10:00");
    }
}
