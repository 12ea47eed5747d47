//! Camera that "shoots" photos already on disk

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use parcel_types::{Error, PhotoRole, Result};

use super::driver::Camera;

/// Serves a fixed front and side image file
pub struct FileCamera {
    front: PathBuf,
    side: PathBuf,
    held: AtomicBool,
}

impl FileCamera {
    pub fn new(front: PathBuf, side: PathBuf) -> Self {
        Self {
            front,
            side,
            held: AtomicBool::new(false),
        }
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}

impl Camera for FileCamera {
    fn acquire(&self) -> Result<()> {
        for path in [&self.front, &self.side] {
            if !path.is_file() {
                return Err(Error::CameraUnavailable(format!(
                    "photo not found: {}",
                    path.display()
                )));
            }
        }
        if self.held.swap(true, Ordering::SeqCst) {
            return Err(Error::CameraUnavailable("camera already in use".to_string()));
        }
        Ok(())
    }

    fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
    }

    fn capture(&self, role: PhotoRole) -> Result<Vec<u8>> {
        if !self.is_held() {
            return Err(Error::CameraUnavailable("camera not acquired".to_string()));
        }
        let path = match role {
            PhotoRole::Front => &self.front,
            PhotoRole::Side => &self.side,
        };
        std::fs::read(path)
            .map_err(|e| Error::CameraUnavailable(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_serves_files_by_role() {
        let dir = tempdir().unwrap();
        let front = dir.path().join("front.jpg");
        let side = dir.path().join("side.jpg");
        std::fs::write(&front, b"front").unwrap();
        std::fs::write(&side, b"side").unwrap();

        let camera = FileCamera::new(front, side);
        assert!(camera.capture(PhotoRole::Front).is_err());
        camera.acquire().unwrap();
        assert!(camera.acquire().is_err());
        assert_eq!(camera.capture(PhotoRole::Side).unwrap(), b"side");
        camera.release();
        assert!(!camera.is_held());
    }

    #[test]
    fn test_missing_file_is_a_camera_fault() {
        let dir = tempdir().unwrap();
        let camera = FileCamera::new(dir.path().join("a.jpg"), dir.path().join("b.jpg"));
        assert!(matches!(camera.acquire(), Err(Error::CameraUnavailable(_))));
    }
}
