//! RAII guard for native callback registrations.

use std::fmt;

/// Owns the right to unregister one native callback.
///
/// The release action runs exactly once: on [`Registration::release`] or on
/// drop, whichever comes first.
#[must_use = "dropping a registration unregisters the callback immediately"]
pub struct Registration {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Registration {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Unregister now.
    pub fn release(mut self) {
        self.run_release();
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    fn run_release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.run_release();
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("active", &self.is_active())
            .finish()
    }
}
