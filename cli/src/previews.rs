//! Terminal stand-in for platform preview URLs: each picked file gets an
//! id that stays live until the core releases it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use shared::capabilities::{PreviewHandle, PreviewId};
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct PreviewRegistry {
    live: HashMap<PreviewId, PathBuf>,
}

impl PreviewRegistry {
    pub fn create(&mut self, path: &Path) -> PreviewHandle {
        let id = PreviewId::generate();
        debug!(preview = %id, path = %path.display(), "preview created");
        self.live.insert(id.clone(), path.to_path_buf());
        PreviewHandle::new(id)
    }

    /// Returns `false` for an id that was never handed out or is already gone.
    pub fn release(&mut self, id: &PreviewId) -> bool {
        match self.live.remove(id) {
            Some(path) => {
                debug!(preview = %id, path = %path.display(), "preview released");
                true
            }
            None => {
                warn!(preview = %id, "release of unknown preview");
                false
            }
        }
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_is_accepted_once() {
        let mut registry = PreviewRegistry::default();
        let handle = registry.create(Path::new("/tmp/bottle.jpg"));
        let id = handle.id().clone();

        assert_eq!(registry.live_count(), 1);

        assert!(registry.release(&id));
        assert!(!registry.release(&id));
        assert_eq!(registry.live_count(), 0);
    }
}
