//! Hologram cameras known to the host application.

use crate::camera::Camera;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CameraId(u32);

/// Owned by the host and passed to whoever needs a camera. The first
/// registered camera that is still alive is the primary one.
#[derive(Debug, Default)]
pub struct CameraRegistry {
    cameras: Vec<(CameraId, Camera)>,
    next_id: u32,
}

impl CameraRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, camera: Camera) -> CameraId {
        let id = CameraId(self.next_id);
        self.next_id += 1;
        self.cameras.push((id, camera));
        log::debug!("Registered hologram camera {:?}", id);
        id
    }

    pub fn unregister(&mut self, id: CameraId) -> Option<Camera> {
        let index = self.cameras.iter().position(|(cid, _)| *cid == id)?;
        Some(self.cameras.remove(index).1)
    }

    pub fn get(&self, id: CameraId) -> Option<&Camera> {
        self.cameras.iter().find(|(cid, _)| *cid == id).map(|(_, c)| c)
    }

    pub fn get_mut(&mut self, id: CameraId) -> Option<&mut Camera> {
        self.cameras.iter_mut().find(|(cid, _)| *cid == id).map(|(_, c)| c)
    }

    pub fn primary(&self) -> Option<CameraId> {
        self.cameras.first().map(|(id, _)| *id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quilt::Lens;

    #[test]
    fn primary_follows_registration_order() {
        let mut registry = CameraRegistry::new();
        assert_eq!(registry.primary(), None);

        let a = registry.register(Camera::new(Lens::default(), 0.75));
        let b = registry.register(Camera::new(Lens::default(), 1.6));
        assert_eq!(registry.primary(), Some(a));
        assert_eq!(registry.len(), 2);

        assert!(registry.unregister(a).is_some());
        assert_eq!(registry.primary(), Some(b));
        assert!(registry.unregister(a).is_none());
        assert!(registry.get(a).is_none());
        assert_eq!(registry.get(b).map(|c| c.aspect), Some(1.6));
    }

    #[test]
    fn ids_are_not_reused() {
        let mut registry = CameraRegistry::new();
        let a = registry.register(Camera::new(Lens::default(), 1.0));
        registry.unregister(a);
        let b = registry.register(Camera::new(Lens::default(), 1.0));
        assert_ne!(a, b);
    }
}
