use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shared state that edit producers on any thread and the chunk manager on the main
/// thread both touch, such as the pending modification table and the edit log.
///
/// Clones are handles to the same value. Guards are held for a single read or write and
/// never across meshing or generation work. A lock poisoned by a panicking holder is
/// recovered, since the tables behind it only hold plain data.
///
/// ```
/// use voxel_terrain::core::MtResource;
///
/// let pending = MtResource::new(Vec::new());
/// let producer = pending.clone();
/// std::thread::spawn(move || producer.update(|edits| edits.push((4, 12, -3))))
///     .join()
///     .unwrap();
///
/// assert_eq!(pending.update(std::mem::take), vec![(4, 12, -3)]);
/// assert!(pending.get().is_empty());
/// ```
pub struct MtResource<T: Send + Sync> {
    resource: Arc<RwLock<T>>,
}

impl<T: Send + Sync + 'static> MtResource<T> {
    /// Wraps `resource` for sharing.
    pub fn new(resource: T) -> Self {
        Self {
            resource: Arc::new(RwLock::new(resource)),
        }
    }

    /// Read access.
    pub fn get(&self) -> RwLockReadGuard<'_, T> {
        self.resource.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write access.
    pub fn get_mut(&self) -> RwLockWriteGuard<'_, T> {
        self.resource.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` under the write lock and releases it before returning.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.get_mut())
    }
}

impl<T: Send + Sync> Clone for MtResource<T> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_same_value() {
        let table = MtResource::new(Vec::<u32>::new());
        let writer = table.clone();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let writer = writer.clone();
                std::thread::spawn(move || writer.update(|values| values.push(i)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut values = table.get().clone();
        values.sort_unstable();
        assert_eq!(values, vec![0, 1, 2, 3], "every writer should land in the shared table");
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let resource = MtResource::new(7);
        let poisoner = resource.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.get_mut();
            panic!("poison the lock");
        })
        .join();

        assert_eq!(*resource.get(), 7);
        assert_eq!(resource.update(|value| std::mem::replace(value, 8)), 7);
        assert_eq!(*resource.get(), 8);
    }
}
