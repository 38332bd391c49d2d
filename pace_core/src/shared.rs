use std::sync::{Arc, Mutex};

use crate::error::PaceError;

/// A device handle that can be moved into a background task.
///
/// The main thread and a background task must not use the same device
/// between spawn and join; the lock only guards against misuse, it is not a
/// scheduling mechanism.
pub struct Shared<T: ?Sized> {
    name: &'static str,
    inner: Arc<Mutex<Box<T>>>,
}

impl<T: ?Sized> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: ?Sized> std::fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared").field("name", &self.name).finish()
    }
}

impl<T: ?Sized> Shared<T> {
    pub fn new(name: &'static str, device: Box<T>) -> Self {
        Self {
            name,
            inner: Arc::new(Mutex::new(device)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run `f` with exclusive access to the device.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, PaceError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| PaceError::Poisoned(self.name))?;
        Ok(f(&mut **guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Counter {
        fn bump(&mut self) -> u32;
    }

    struct Simple(u32);

    impl Counter for Simple {
        fn bump(&mut self) -> u32 {
            self.0 += 1;
            self.0
        }
    }

    fn counter() -> Shared<dyn Counter + Send> {
        Shared::new("counter", Box::new(Simple(0)) as Box<dyn Counter + Send>)
    }

    #[test]
    fn clones_share_the_device() {
        let a = counter();
        let b = a.clone();
        assert_eq!(a.with(|c| c.bump()), Ok(1));
        assert_eq!(b.with(|c| c.bump()), Ok(2));
    }

    #[test]
    fn poisoned_lock_is_reported() {
        let a = counter();
        let b = a.clone();
        let _ = std::thread::spawn(move || {
            let _ = b.with(|_| panic!("device blew up"));
        })
        .join();
        assert_eq!(a.with(|c| c.bump()), Err(PaceError::Poisoned("counter")));
    }
}
