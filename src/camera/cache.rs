//! Forward/deferred classification of scene drawables

use crate::camera::config::RenderPath;
use crate::scene::{Drawable, SceneQuery};
use std::rc::{Rc, Weak};

/// Non-owning partition of the scene's drawables, rebuilt on structural change only.
///
/// Callers must call [`DrawableCache::rebuild`] after every scene mutation; the cache
/// records the scene generation it was built from so a missed rebuild is caught in
/// debug builds.
#[derive(Default)]
pub struct DrawableCache {
    forward: Vec<Weak<dyn Drawable>>,
    deferred: Vec<Weak<dyn Drawable>>,
    generation: u64,
}

impl DrawableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rebuild(&mut self, render_path: RenderPath, scene: &dyn SceneQuery) {
        self.forward.clear();
        self.deferred.clear();

        for drawable in scene.drawables() {
            let deferred =
                render_path == RenderPath::Deferred && drawable.supports_deferred_pass();
            let weak = Rc::downgrade(drawable);
            if deferred {
                self.deferred.push(weak);
            } else {
                self.forward.push(weak);
            }
        }
        self.generation = scene.generation();

        log::debug!(
            "Drawable cache rebuilt: {} forward, {} deferred",
            self.forward.len(),
            self.deferred.len()
        );
    }

    /// Whether the scene changed structurally since the last rebuild.
    pub fn is_stale(&self, scene: &dyn SceneQuery) -> bool {
        self.generation != scene.generation()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn forward(&self) -> Vec<Rc<dyn Drawable>> {
        Self::upgrade_all(&self.forward)
    }

    pub fn deferred(&self) -> Vec<Rc<dyn Drawable>> {
        Self::upgrade_all(&self.deferred)
    }

    pub fn forward_len(&self) -> usize {
        self.forward.len()
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    fn upgrade_all(entries: &[Weak<dyn Drawable>]) -> Vec<Rc<dyn Drawable>> {
        entries
            .iter()
            .filter_map(|entry| {
                let drawable = entry.upgrade();
                if drawable.is_none() {
                    log::error!("Drawable cache holds a destroyed drawable; the scene changed without a rebuild");
                    debug_assert!(false, "drawable cache used after an unnotified scene mutation");
                }
                drawable
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{DrawContext, Scene};
    use rstest::rstest;

    struct Probe {
        deferred: bool,
    }

    impl Drawable for Probe {
        fn draw(&self, _ctx: &mut DrawContext<'_>) {}

        fn supports_deferred_pass(&self) -> bool {
            self.deferred
        }
    }

    fn scene(flags: &[bool]) -> Scene {
        let mut scene = Scene::new();
        for &deferred in flags {
            scene.add_drawable(Rc::new(Probe { deferred }));
        }
        scene
    }

    #[rstest]
    #[case::forward(RenderPath::Forward, 4, 0)]
    #[case::deferred(RenderPath::Deferred, 2, 2)]
    fn partition_follows_render_path(
        #[case] path: RenderPath,
        #[case] forward: usize,
        #[case] deferred: usize,
    ) {
        let scene = scene(&[true, false, true, false]);
        let mut cache = DrawableCache::new();
        cache.rebuild(path, &scene);

        assert_eq!(cache.forward_len(), forward);
        assert_eq!(cache.deferred_len(), deferred);
        assert!(cache.deferred().iter().all(|d| d.supports_deferred_pass()));
        assert!(!cache.is_stale(&scene));
    }

    #[test]
    fn mutation_without_rebuild_is_stale() {
        let mut scene = scene(&[false]);
        let mut cache = DrawableCache::new();
        cache.rebuild(RenderPath::Forward, &scene);

        scene.add_drawable(Rc::new(Probe { deferred: false }));

        assert!(cache.is_stale(&scene));
        assert_eq!(cache.forward().len(), 1);
    }
}
