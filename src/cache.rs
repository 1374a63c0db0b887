use crate::assets::{AudioClip, CubeMap, GeometryAsset, Texture};
use log::error;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared record of one cached asset.
///
/// The loader inserts the record before the fetch starts and fills it in
/// place, so a handle taken early is the same record once it is loaded.
pub type Cached<T> = Rc<RefCell<CacheEntry<T>>>;

#[derive(Debug)]
pub struct CacheEntry<T> {
    name: String,
    source: String,
    payload: Option<T>,
}

impl<T> CacheEntry<T> {
    pub(crate) fn placeholder(name: &str, source: &str) -> Cached<T> {
        Rc::new(RefCell::new(CacheEntry {
            name: name.to_string(),
            source: source.to_string(),
            payload: None,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// `None` until the fetch succeeded. Failed fetches stay `None` forever.
    pub fn payload(&self) -> Option<&T> {
        self.payload.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.payload.is_some()
    }

    pub(crate) fn fill(&mut self, payload: T) {
        self.payload = Some(payload);
    }
}

/// Asset kinds the cache keeps a table for.
pub trait Asset: Sized + 'static {
    const KIND: &'static str;

    fn table(cache: &Cache) -> &HashMap<String, Cached<Self>>;
    fn table_mut(cache: &mut Cache) -> &mut HashMap<String, Cached<Self>>;
}

macro_rules! asset_table {
    ($asset:ty, $kind:literal, $field:ident) => {
        impl Asset for $asset {
            const KIND: &'static str = $kind;

            fn table(cache: &Cache) -> &HashMap<String, Cached<Self>> {
                &cache.$field
            }

            fn table_mut(cache: &mut Cache) -> &mut HashMap<String, Cached<Self>> {
                &mut cache.$field
            }
        }
    };
}

asset_table!(Texture, "texture", textures);
asset_table!(CubeMap, "cube map", cube_maps);
asset_table!(GeometryAsset, "geometry", geometries);
asset_table!(AudioClip, "audio", audios);

/// TABLE:
/// ┌────────────┬──────────────────────┬───────────────────────────┐
/// │ Kind       │ Lookup               │ Payload                   │
/// ├────────────┼──────────────────────┼───────────────────────────┤
/// │ texture    │ cache.texture(name)  │ Texture (size + RGBA)     │
/// │ cube map   │ cache.cube_map(name) │ CubeMap (faces)           │
/// │ geometry   │ cache.geometry(name) │ GeometryAsset (JSON mesh) │
/// │ audio      │ cache.audio(name)    │ AudioClip (AudioBuffer)   │
/// └────────────┴──────────────────────┴───────────────────────────┘
#[derive(Debug, Default)]
pub struct Cache {
    textures: HashMap<String, Cached<Texture>>,
    cube_maps: HashMap<String, Cached<CubeMap>>,
    geometries: HashMap<String, Cached<GeometryAsset>>,
    audios: HashMap<String, Cached<AudioClip>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks a record up; a miss is logged and yields `None`.
    pub fn get<T: Asset>(&self, name: &str) -> Option<Cached<T>> {
        match T::table(self).get(name) {
            Some(entry) => Some(entry.clone()),
            None => {
                error!("Cache: no {} for name '{}'", T::KIND, name);
                None
            }
        }
    }

    pub fn contains<T: Asset>(&self, name: &str) -> bool {
        T::table(self).contains_key(name)
    }

    pub(crate) fn insert<T: Asset>(&mut self, entry: Cached<T>) {
        let name = entry.borrow().name().to_string();
        T::table_mut(self).insert(name, entry);
    }

    pub fn texture(&self, name: &str) -> Option<Cached<Texture>> {
        self.get(name)
    }

    pub fn cube_map(&self, name: &str) -> Option<Cached<CubeMap>> {
        self.get(name)
    }

    pub fn geometry(&self, name: &str) -> Option<Cached<GeometryAsset>> {
        self.get(name)
    }

    pub fn audio(&self, name: &str) -> Option<Cached<AudioClip>> {
        self.get(name)
    }

    /// Forgets every record of every kind. Handles held elsewhere stay valid.
    pub fn clear_cache(&mut self) {
        self.textures = HashMap::new();
        self.cube_maps = HashMap::new();
        self.geometries = HashMap::new();
        self.audios = HashMap::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_none() {
        let cache = Cache::new();

        assert!(cache.texture("nope").is_none());
        assert!(cache.audio("nope").is_none());
    }

    #[test]
    fn same_record_before_and_after_fill() {
        let mut cache = Cache::new();
        cache.insert(CacheEntry::<Texture>::placeholder("depth", "tex/depth.png"));

        let early = cache.texture("depth").unwrap();
        assert!(!early.borrow().is_loaded());

        early
            .borrow_mut()
            .fill(Texture::from_pixels(1, 1, vec![0, 0, 0, 255]));

        let late = cache.texture("depth").unwrap();
        assert!(Rc::ptr_eq(&early, &late));
        assert_eq!(late.borrow().payload().unwrap().width, 1);
        assert_eq!(late.borrow().source(), "tex/depth.png");
    }

    #[test]
    fn kinds_do_not_share_keys() {
        let mut cache = Cache::new();
        cache.insert(CacheEntry::<Texture>::placeholder("sky", "sky.png"));

        assert!(cache.contains::<Texture>("sky"));
        assert!(!cache.contains::<CubeMap>("sky"));
    }

    #[test]
    fn clear_cache_empties_every_table() {
        let mut cache = Cache::new();
        cache.insert(CacheEntry::<Texture>::placeholder("a", "a.png"));
        cache.insert(CacheEntry::<GeometryAsset>::placeholder("b", "b.json"));
        let held = cache.texture("a").unwrap();

        cache.clear_cache();

        assert!(cache.texture("a").is_none());
        assert!(cache.geometry("b").is_none());
        assert_eq!(held.borrow().name(), "a");
    }
}
