use crate::classifier::Classifier;
use parking_lot::RwLock;
use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

/// A loaded classifier together with the artifact it came from.
#[derive(Clone)]
pub struct ModelHandle {
    classifier: Arc<dyn Classifier>,
    path: PathBuf,
}

impl ModelHandle {
    pub fn new(classifier: Arc<dyn Classifier>, path: impl Into<PathBuf>) -> Self {
        Self {
            classifier,
            path: path.into(),
        }
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Owner of the active model handle.
///
/// Readers get a cloned `Arc` and keep it for the whole inference call, so a
/// concurrent [`ModelRegistry::swap`] never invalidates work in flight. The
/// lock is only held for the pointer copy on either side.
#[derive(Debug)]
pub struct ModelRegistry {
    active: RwLock<Arc<ModelHandle>>,
}

impl ModelRegistry {
    pub fn new(handle: ModelHandle) -> Self {
        Self {
            active: RwLock::new(Arc::new(handle)),
        }
    }

    pub fn get(&self) -> Arc<ModelHandle> {
        self.active.read().clone()
    }

    pub fn swap(&self, handle: ModelHandle) {
        let next_path = handle.path.clone();
        let previous = std::mem::replace(&mut *self.active.write(), Arc::new(handle));
        tracing::info!(
            "Swapped active model {} -> {}",
            previous.path().display(),
            next_path.display()
        );
    }
}
