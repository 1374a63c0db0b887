// ELI5:
// ┌──────────────────────────── Preload cycle ────────────────────────────┐
// │ state.preload()  → game.load().texture(..) ... enqueue, cache record  │
// │ start_preload()  → every task spawned at once, no ordering            │
// │ task resolves    → payload written into its record (or warn on fail)  │
// │                  → (cycle, task) sent on the completion channel       │
// │ poll()           → progress = completed / total, on_complete_file     │
// │ last completion  → tasks cleared, signal cleared, state.start()       │
// └───────────────────────────────────────────────────────────────────────┘
use crate::assets::{AssetSource, AudioClip, CubeMap, GeometryAsset, Texture};
use crate::cache::{Asset, Cache, CacheEntry, Cached};
use crate::signal::Signal;
use anyhow::Result;
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::task::{LocalSpawn, LocalSpawnExt};
use log::{debug, warn};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadStatus {
    Pending,
    Complete,
}

enum Request {
    Texture {
        url: String,
        entry: Cached<Texture>,
    },
    CubeMap {
        path: String,
        urls: Vec<String>,
        entry: Cached<CubeMap>,
    },
    Geometry {
        url: String,
        entry: Cached<GeometryAsset>,
    },
    Audio {
        url: String,
        entry: Cached<AudioClip>,
    },
}

struct LoadTask {
    key: String,
    // taken when the task is spawned
    request: Option<Request>,
    completed: bool,
}

struct Completion {
    cycle: u64,
    task: usize,
}

/// Collects asset requests during `preload` and tracks them to completion.
pub struct Loader {
    tasks: Vec<LoadTask>,
    progress: f64,
    preloading: bool,
    cycle: u64,
    on_complete_file: Signal<f64>,
    completions_tx: UnboundedSender<Completion>,
    completions_rx: UnboundedReceiver<Completion>,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader {
    pub fn new() -> Self {
        let (completions_tx, completions_rx) = unbounded();
        Loader {
            tasks: Vec::new(),
            progress: 0.0,
            preloading: false,
            cycle: 0,
            on_complete_file: Signal::new(),
            completions_tx,
            completions_rx,
        }
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn is_preloading(&self) -> bool {
        self.preloading
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Fires after each finished file with the new progress in `[0, 1]`.
    /// Cleared once the cycle completes.
    pub fn on_complete_file(&self) -> &Signal<f64> {
        &self.on_complete_file
    }

    fn enqueue<T: Asset>(
        &mut self,
        cache: &mut Cache,
        name: &str,
        source: &str,
        request: impl FnOnce(Cached<T>) -> Request,
    ) -> Cached<T> {
        let entry = CacheEntry::placeholder(name, source);
        cache.insert(entry.clone());
        self.tasks.push(LoadTask {
            key: name.to_string(),
            request: Some(request(entry.clone())),
            completed: false,
        });
        entry
    }

    /// Issues every queued fetch at once.
    ///
    /// # Returns
    /// * `Complete` - nothing was queued, the caller starts the state right away
    /// * `Pending` - completions arrive through [`Loader::poll`]
    pub fn start_preload(
        &mut self,
        assets: &Rc<dyn AssetSource>,
        spawner: &dyn LocalSpawn,
    ) -> PreloadStatus {
        self.preloading = true;
        self.progress = 0.0;
        if self.tasks.is_empty() {
            return PreloadStatus::Complete;
        }

        debug!("Loader: preloading {} assets", self.tasks.len());
        for (index, task) in self.tasks.iter_mut().enumerate() {
            let Some(request) = task.request.take() else {
                continue;
            };
            let completion = Completion {
                cycle: self.cycle,
                task: index,
            };
            let tx = self.completions_tx.clone();
            let assets = assets.clone();
            let key = task.key.clone();
            let spawned = spawner.spawn_local(async move {
                if let Err(err) = fetch(&*assets, request).await {
                    warn!("Loader: '{}' failed, counted as completed : {:#}", key, err);
                }
                let _ = tx.unbounded_send(completion);
            });
            if let Err(err) = spawned {
                warn!("Loader: could not spawn '{}' : {}", task.key, err);
                let _ = self.completions_tx.unbounded_send(Completion {
                    cycle: self.cycle,
                    task: index,
                });
            }
        }
        PreloadStatus::Pending
    }

    /// Applies every completion received since the last poll.
    ///
    /// Returns `Complete` exactly once per cycle, on the poll that saw the
    /// last task finish.
    pub fn poll(&mut self) -> PreloadStatus {
        while let Ok(Some(completion)) = self.completions_rx.try_next() {
            if completion.cycle != self.cycle {
                debug!("Loader: dropped a completion from an old preload");
                continue;
            }
            let Some(task) = self.tasks.get_mut(completion.task) else {
                continue;
            };
            if task.completed {
                continue;
            }
            task.completed = true;
            if self.notify_completed() {
                return PreloadStatus::Complete;
            }
        }
        PreloadStatus::Pending
    }

    fn notify_completed(&mut self) -> bool {
        let completed = self.tasks.iter().filter(|task| task.completed).count();
        self.progress = completed as f64 / self.tasks.len() as f64;
        self.on_complete_file.dispatch(&self.progress);

        if completed == self.tasks.len() {
            self.tasks.clear();
            self.on_complete_file.clear();
            self.cycle += 1;
            return true;
        }
        false
    }

    /// Marks the preload as over, called right before `state.start()`.
    pub(crate) fn finish(&mut self) {
        self.preloading = false;
    }

    /// Abandons the running cycle. Late completions of it are ignored.
    pub(crate) fn reset(&mut self) {
        if !self.tasks.is_empty() {
            debug!("Loader: abandoning {} unfinished tasks", self.tasks.len());
        }
        self.tasks.clear();
        self.on_complete_file.clear();
        self.progress = 0.0;
        self.preloading = false;
        self.cycle += 1;
    }
}

async fn fetch(assets: &dyn AssetSource, request: Request) -> Result<()> {
    match request {
        Request::Texture { url, entry } => store(&entry, assets.texture(&url).await),
        Request::CubeMap { path, urls, entry } => {
            store(&entry, assets.cube_map(&path, &urls).await)
        }
        Request::Geometry { url, entry } => store(&entry, assets.geometry(&url).await),
        Request::Audio { url, entry } => store(&entry, assets.audio(&url).await),
    }
}

fn store<T>(entry: &Cached<T>, result: Result<T>) -> Result<()> {
    let payload = result?;
    entry.borrow_mut().fill(payload);
    Ok(())
}

/// `game.load()`: enqueue assets from a state's `preload`.
///
/// Each call creates the cache record right away and returns it.
pub struct LoadQueue<'a> {
    loader: &'a mut Loader,
    cache: &'a mut Cache,
}

impl<'a> LoadQueue<'a> {
    pub(crate) fn new(loader: &'a mut Loader, cache: &'a mut Cache) -> Self {
        LoadQueue { loader, cache }
    }

    pub fn texture(&mut self, name: &str, url: &str) -> Cached<Texture> {
        let owned = url.to_string();
        self.loader.enqueue(self.cache, name, url, |entry| Request::Texture {
            url: owned,
            entry,
        })
    }

    /// Faces are fetched from `path` + each of `urls`.
    pub fn cube_map(&mut self, name: &str, path: &str, urls: &[&str]) -> Cached<CubeMap> {
        let owned = path.to_string();
        let urls = urls.iter().map(|url| url.to_string()).collect();
        self.loader.enqueue(self.cache, name, path, |entry| Request::CubeMap {
            path: owned,
            urls,
            entry,
        })
    }

    pub fn json_geometry(&mut self, name: &str, url: &str) -> Cached<GeometryAsset> {
        let owned = url.to_string();
        self.loader.enqueue(self.cache, name, url, |entry| Request::Geometry {
            url: owned,
            entry,
        })
    }

    pub fn audio(&mut self, name: &str, url: &str) -> Cached<AudioClip> {
        let owned = url.to_string();
        self.loader.enqueue(self.cache, name, url, |entry| Request::Audio {
            url: owned,
            entry,
        })
    }

    pub fn on_complete_file(&self) -> &Signal<f64> {
        self.loader.on_complete_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ManualAssets;
    use futures::executor::LocalPool;
    use std::cell::RefCell;

    struct Bench {
        loader: Loader,
        cache: Cache,
        pool: LocalPool,
        assets: Rc<ManualAssets>,
    }

    impl Bench {
        fn new() -> Self {
            Bench {
                loader: Loader::new(),
                cache: Cache::new(),
                pool: LocalPool::new(),
                assets: Rc::new(ManualAssets::new()),
            }
        }

        fn queue(&mut self) -> LoadQueue<'_> {
            LoadQueue::new(&mut self.loader, &mut self.cache)
        }

        fn start(&mut self) -> PreloadStatus {
            let assets: Rc<dyn AssetSource> = self.assets.clone();
            let spawner = self.pool.spawner();
            let status = self.loader.start_preload(&assets, &spawner);
            self.pool.run_until_stalled();
            status
        }

        fn settle(&mut self) -> PreloadStatus {
            self.pool.run_until_stalled();
            self.loader.poll()
        }
    }

    #[test]
    fn empty_queue_completes_immediately() {
        let mut bench = Bench::new();

        assert_eq!(bench.start(), PreloadStatus::Complete);
        assert!(bench.loader.is_preloading());
    }

    #[test]
    fn progress_is_k_over_n_in_any_completion_order() {
        for order in [[0, 1, 2], [2, 0, 1], [1, 2, 0]] {
            let mut bench = Bench::new();
            let urls = ["a.png", "b.png", "c.png"];
            for url in urls {
                bench.queue().texture(url, url);
            }
            let seen = Rc::new(RefCell::new(Vec::new()));
            let sink = seen.clone();
            bench
                .loader
                .on_complete_file()
                .add(move |progress| sink.borrow_mut().push(*progress));

            assert_eq!(bench.start(), PreloadStatus::Pending);
            assert_eq!(bench.assets.pending(), 3);

            let mut completions = 0;
            for (k, index) in order.into_iter().enumerate() {
                bench
                    .assets
                    .resolve_texture(urls[index], Texture::from_pixels(1, 1, vec![0; 4]));
                let status = bench.settle();
                if status == PreloadStatus::Complete {
                    completions += 1;
                    assert_eq!(k, 2);
                }
                assert_eq!(bench.loader.progress(), (k + 1) as f64 / 3.0);
            }

            assert_eq!(completions, 1);
            assert_eq!(*seen.borrow(), vec![1.0 / 3.0, 2.0 / 3.0, 1.0]);
            assert_eq!(bench.loader.task_count(), 0);
            assert!(bench.loader.on_complete_file().is_empty());
        }
    }

    #[test]
    fn failures_count_as_completed() {
        let mut bench = Bench::new();
        let good = bench.queue().texture("good", "good.png");
        let bad = bench.queue().audio("bad", "missing.ogg");
        bench.start();

        bench.assets.fail("missing.ogg");
        assert_eq!(bench.settle(), PreloadStatus::Pending);
        assert_eq!(bench.loader.progress(), 0.5);

        bench
            .assets
            .resolve_texture("good.png", Texture::from_pixels(2, 2, vec![0; 16]));
        assert_eq!(bench.settle(), PreloadStatus::Complete);

        assert!(good.borrow().is_loaded());
        assert!(!bad.borrow().is_loaded());
        assert!(bench.cache.audio("bad").is_some());
    }

    #[test]
    fn cache_record_keeps_its_identity_across_the_load() {
        let mut bench = Bench::new();
        bench.queue().texture("depth", "tex/depth.png");
        let before = bench.cache.texture("depth").unwrap();
        assert!(before.borrow().payload().is_none());

        bench.start();
        bench
            .assets
            .resolve_texture("tex/depth.png", Texture::from_pixels(3, 1, vec![7; 12]));
        bench.settle();

        let after = bench.cache.texture("depth").unwrap();
        assert!(Rc::ptr_eq(&before, &after));
        assert_eq!(after.borrow().payload().unwrap().width, 3);
    }

    #[test]
    fn cube_map_geometry_and_audio_fill_their_tables() {
        let mut bench = Bench::new();
        bench
            .queue()
            .cube_map("sky", "sky/", &["px.png", "nx.png"]);
        bench.queue().json_geometry("ship", "ship.json");
        bench.start();

        bench.assets.resolve_cube_map(
            "sky/",
            CubeMap {
                faces: vec![Texture::default(), Texture::default()],
            },
        );
        bench.assets.resolve_geometry(
            "ship.json",
            GeometryAsset {
                vertices: vec![0.0; 9],
                ..GeometryAsset::default()
            },
        );
        assert_eq!(bench.settle(), PreloadStatus::Complete);

        let sky = bench.cache.cube_map("sky").unwrap();
        assert_eq!(sky.borrow().payload().unwrap().faces.len(), 2);
        let ship = bench.cache.geometry("ship").unwrap();
        assert_eq!(ship.borrow().payload().unwrap().vertex_count(), 3);
    }

    #[test]
    fn reset_ignores_completions_of_the_abandoned_cycle() {
        let mut bench = Bench::new();
        bench.queue().texture("old", "old.png");
        bench.start();

        bench.loader.reset();
        bench.queue().texture("new", "new.png");
        bench.start();

        bench.assets.resolve_texture("old.png", Texture::default());
        assert_eq!(bench.settle(), PreloadStatus::Pending);
        assert_eq!(bench.loader.progress(), 0.0);

        bench.assets.resolve_texture("new.png", Texture::default());
        assert_eq!(bench.settle(), PreloadStatus::Complete);
    }
}
