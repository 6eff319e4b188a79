use super::create_each;
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk;

/// Synchronization owned by each swapchain image rather than by each frame in
/// flight: the semaphore presentation waits on, and the fence of the last
/// frame that rendered into the image.
#[derive(Default)]
pub struct ImageSync {
    render_finished: Vec<vk::Semaphore>,
    in_flight: Vec<vk::Fence>,
}

impl ImageSync {
    /// Semaphores created before a failure stay stored for `destroy`.
    pub fn create<E>(
        &mut self,
        image_count: usize,
        mut create_semaphore: impl FnMut() -> Result<vk::Semaphore, E>,
    ) -> Result<(), E> {
        self.in_flight = vec![vk::Fence::null(); image_count];
        create_each(&mut self.render_finished, 0..image_count, |_| create_semaphore())
    }

    pub fn render_finished(&self, image_index: usize) -> vk::Semaphore {
        self.render_finished[image_index]
    }

    /// Hands `image_index` to the frame guarded by `fence` and returns the
    /// fence of the frame that used the image before, if any.
    pub fn claim(&mut self, image_index: usize, fence: vk::Fence) -> Option<vk::Fence> {
        let previous = std::mem::replace(&mut self.in_flight[image_index], fence);
        (!previous.is_null()).then_some(previous)
    }

    pub unsafe fn destroy(&mut self, device: &Device) {
        self.render_finished
            .drain(..)
            .for_each(|s| device.destroy_semaphore(s, None));
        self.in_flight.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> impl FnMut() -> Result<vk::Semaphore, vk::ErrorCode> {
        let mut next = 0;
        move || {
            next += 1;
            Ok(vk::Semaphore::from_raw(next))
        }
    }

    #[test]
    fn one_semaphore_per_image() {
        let mut sync = ImageSync::default();
        sync.create(3, counter()).unwrap();

        let semaphores = (0..3).map(|i| sync.render_finished(i)).collect::<Vec<_>>();
        assert_eq!(semaphores.len(), 3);
        assert_ne!(semaphores[0], semaphores[1]);
        assert_ne!(semaphores[1], semaphores[2]);
        assert_ne!(semaphores[0], semaphores[2]);
    }

    #[test]
    fn semaphore_follows_image_not_frame() {
        let mut sync = ImageSync::default();
        sync.create(4, counter()).unwrap();

        // Two frames in flight cycling over four images still get distinct
        // semaphores for every image they present.
        assert_eq!(sync.render_finished(3), vk::Semaphore::from_raw(4));
        assert_eq!(sync.render_finished(2), vk::Semaphore::from_raw(3));
    }

    #[test]
    fn claim_returns_previous_fence() {
        let mut sync = ImageSync::default();
        sync.create(2, counter()).unwrap();

        let first = vk::Fence::from_raw(10);
        let second = vk::Fence::from_raw(11);
        assert_eq!(sync.claim(1, first), None);
        assert_eq!(sync.claim(1, second), Some(first));
        assert_eq!(sync.claim(0, second), None);
    }

    #[test]
    fn recreate_matches_new_image_count() {
        let mut sync = ImageSync::default();
        sync.create(2, counter()).unwrap();
        sync.render_finished.clear();
        sync.create(5, counter()).unwrap();

        assert_eq!(sync.render_finished.len(), 5);
        assert_eq!(sync.claim(4, vk::Fence::from_raw(1)), None);
    }

    #[test]
    fn failed_create_keeps_earlier_semaphores() {
        let mut sync = ImageSync::default();
        let mut made = 0;
        let result = sync.create(3, || {
            made += 1;
            if made == 3 {
                Err(vk::ErrorCode::OUT_OF_HOST_MEMORY)
            } else {
                Ok(vk::Semaphore::from_raw(made))
            }
        });

        assert_eq!(result, Err(vk::ErrorCode::OUT_OF_HOST_MEMORY));
        assert_eq!(sync.render_finished.len(), 2);
    }
}
