use std::time::{Duration, Instant};

/// The one operation collaborators may call: (re)arm the debounced persist.
pub trait AutosaveScheduler {
    fn start(&mut self);
}

/// Debounced autosave timer. Every edit re-arms it; the app polls
/// [`DebouncedAutosave::take_due`] from the tick handler and persists the
/// active document when the timer fires.
pub struct DebouncedAutosave {
    delay: Duration,
    deadline: Option<Instant>,
}

impl DebouncedAutosave {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// True once per arm, when the deadline has passed. Disarms on fire.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

impl AutosaveScheduler for DebouncedAutosave {
    fn start(&mut self) {
        self.deadline = Some(Instant::now() + self.delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_arm() {
        let mut autosave = DebouncedAutosave::new(Duration::ZERO);
        assert!(!autosave.take_due(Instant::now()));

        autosave.start();
        assert!(autosave.is_armed());
        assert!(autosave.take_due(Instant::now()));
        assert!(!autosave.take_due(Instant::now()));
    }

    #[test]
    fn restart_pushes_the_deadline_back() {
        let mut autosave = DebouncedAutosave::new(Duration::from_secs(3600));
        autosave.start();
        assert!(!autosave.take_due(Instant::now()));
        // Still pending; re-arming keeps it pending rather than firing.
        autosave.start();
        assert!(!autosave.take_due(Instant::now()));
        assert!(autosave.is_armed());
    }

    #[test]
    fn cancel_disarms() {
        let mut autosave = DebouncedAutosave::new(Duration::ZERO);
        autosave.start();
        autosave.cancel();
        assert!(!autosave.take_due(Instant::now()));
    }
}
