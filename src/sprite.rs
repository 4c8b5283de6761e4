use crate::error::{CcssError, CcssResult};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// 精灵图中一个子图的包围盒（像素）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteBox {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl SpriteBox {
    pub fn width(&self) -> i64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i64 {
        self.y2 - self.y1
    }
}

/// 精灵图坐标文件的内容。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpriteMap {
    pub path: PathBuf,
    pub image_url: Option<String>,
    pub resource_dir: Option<String>,
    pub passthru_url: Option<String>,
    pub mapping: IndexMap<String, SpriteBox>,
}

impl SpriteMap {
    /// 解析坐标文件：每行 `name, x1, y1, x2, y2`，
    /// 或 `__url__` / `__resources__` / `__passthru__` 配置行。
    pub fn parse(path: &Path, text: &str, line: usize) -> CcssResult<Self> {
        let mut map = SpriteMap {
            path: path.to_path_buf(),
            ..SpriteMap::default()
        };
        for record in text.lines() {
            if record.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = record.split(',').map(str::trim).collect();
            let key = fields[0];
            if key.len() >= 4 && key.starts_with("__") && key.ends_with("__") {
                let value = fields.get(1).map(|v| v.to_string()).unwrap_or_default();
                match key {
                    "__url__" => map.image_url = Some(value),
                    "__resources__" => map.resource_dir = Some(value),
                    "__passthru__" => map.passthru_url = Some(value),
                    _ => {
                        return Err(CcssError::eval(
                            line,
                            format!("{key:?} is not a valid field in {}", path.display()),
                        ))
                    }
                }
                continue;
            }
            if fields.len() != 5 {
                return Err(CcssError::eval(
                    line,
                    format!("unexpected line in {}: {record:?}", path.display()),
                ));
            }
            let mut coords = [0i64; 4];
            for (slot, raw) in coords.iter_mut().zip(&fields[1..]) {
                *slot = raw.parse().map_err(|_| {
                    CcssError::eval(
                        line,
                        format!("invalid coordinate {raw:?} in {}", path.display()),
                    )
                })?;
            }
            let [x1, y1, x2, y2] = coords;
            map.mapping
                .insert(key.to_string(), SpriteBox { x1, y1, x2, y2 });
        }
        Ok(map)
    }

    /// 配置了 passthru 时每个子图有独立地址，否则共用整张图的地址。
    pub fn sprite_url(&self, name: &str) -> String {
        match (&self.passthru_url, &self.image_url) {
            (Some(passthru), _) => format!("{passthru}{name}"),
            (None, Some(url)) => url.clone(),
            (None, None) => String::new(),
        }
    }
}

/// 求值器通过它读取精灵图并查询子图坐标。
pub trait SpriteSource {
    fn load_map(&mut self, path: &Path, line: usize) -> CcssResult<Rc<SpriteMap>>;

    fn resolve(&mut self, map: &SpriteMap, name: &str) -> Option<SpriteBox>;

    fn sprite_url(&self, map: &SpriteMap, name: &str) -> String {
        map.sprite_url(name)
    }
}

/// 从磁盘读取坐标文件，同一次编译内每个路径只读一次。
#[derive(Debug, Default)]
pub struct FileSpriteSource {
    maps: HashMap<PathBuf, Rc<SpriteMap>>,
    probed: HashMap<PathBuf, SpriteBox>,
}

impl FileSpriteSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpriteSource for FileSpriteSource {
    fn load_map(&mut self, path: &Path, line: usize) -> CcssResult<Rc<SpriteMap>> {
        if let Some(map) = self.maps.get(path) {
            return Ok(Rc::clone(map));
        }
        let text = fs::read_to_string(path).map_err(|err| {
            CcssError::eval(
                line,
                format!("cannot read sprite map {}: {err}", path.display()),
            )
        })?;
        let map = Rc::new(SpriteMap::parse(path, &text, line)?);
        log::debug!(
            "loaded sprite map {} with {} sprites",
            path.display(),
            map.mapping.len()
        );
        self.maps.insert(path.to_path_buf(), Rc::clone(&map));
        Ok(map)
    }

    fn resolve(&mut self, map: &SpriteMap, name: &str) -> Option<SpriteBox> {
        if let Some(bbox) = map.mapping.get(name) {
            return Some(*bbox);
        }
        map.passthru_url.as_ref()?;
        let image = map.path.parent()?.join(name);
        if let Some(bbox) = self.probed.get(&image) {
            return Some(*bbox);
        }
        let bbox = probe_image(&image)?;
        self.probed.insert(image, bbox);
        Some(bbox)
    }
}

#[cfg(feature = "image-probe")]
fn probe_image(path: &Path) -> Option<SpriteBox> {
    let (width, height) = image::image_dimensions(path).ok()?;
    log::debug!("probed sprite image {} ({width}x{height})", path.display());
    Some(SpriteBox {
        x1: 0,
        y1: 0,
        x2: i64::from(width),
        y2: i64::from(height),
    })
}

#[cfg(not(feature = "image-probe"))]
fn probe_image(_path: &Path) -> Option<SpriteBox> {
    None
}

/// 不读取任何文件的解析器，只记录被引用过的子图名。
#[derive(Debug, Default)]
pub struct RecordingSpriteSource {
    maps: HashMap<PathBuf, Rc<SpriteMap>>,
    used: IndexMap<PathBuf, Vec<String>>,
}

impl RecordingSpriteSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按精灵图路径分组的已用子图名，保持首次使用的顺序。
    pub fn used_sprites(&self) -> &IndexMap<PathBuf, Vec<String>> {
        &self.used
    }
}

impl SpriteSource for RecordingSpriteSource {
    fn load_map(&mut self, path: &Path, _line: usize) -> CcssResult<Rc<SpriteMap>> {
        let map = self.maps.entry(path.to_path_buf()).or_insert_with(|| {
            Rc::new(SpriteMap {
                path: path.to_path_buf(),
                image_url: Some("<annotator>".to_string()),
                ..SpriteMap::default()
            })
        });
        Ok(Rc::clone(map))
    }

    fn resolve(&mut self, map: &SpriteMap, name: &str) -> Option<SpriteBox> {
        let names = self.used.entry(map.path.clone()).or_default();
        if !names.iter().any(|used| used == name) {
            names.push(name.to_string());
        }
        Some(SpriteBox {
            x1: 0,
            y1: 0,
            x2: 100,
            y2: 100,
        })
    }

    fn sprite_url(&self, _map: &SpriteMap, name: &str) -> String {
        format!("<annotated {name}>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_records_and_magic_lines() {
        let text = "__url__, sprites.png\n\nlogo, 0, 0, 32, 16\nicon,32,0,48,16\n";
        let map = SpriteMap::parse(Path::new("a.map"), text, 1).unwrap();
        assert_eq!(map.image_url.as_deref(), Some("sprites.png"));
        assert_eq!(
            map.mapping["icon"],
            SpriteBox {
                x1: 32,
                y1: 0,
                x2: 48,
                y2: 16
            }
        );
        assert_eq!(map.mapping["logo"].width(), 32);
        assert_eq!(map.sprite_url("logo"), "sprites.png");
    }

    #[test]
    fn passthru_url_names_each_sprite() {
        let map = SpriteMap::parse(Path::new("a.map"), "__passthru__,/img/\n", 1).unwrap();
        assert_eq!(map.sprite_url("x.png"), "/img/x.png");
    }

    #[test]
    fn unknown_magic_key_fails() {
        let err = SpriteMap::parse(Path::new("a.map"), "__nope__,x\n", 5).unwrap_err();
        assert_eq!(err.line(), 5);
        assert!(err.message().contains("__nope__"));
    }

    #[test]
    fn malformed_record_fails() {
        assert!(SpriteMap::parse(Path::new("a.map"), "logo, 1, 2\n", 1).is_err());
        assert!(SpriteMap::parse(Path::new("a.map"), "logo, 1, 2, x, 4\n", 1).is_err());
    }

    #[test]
    fn recording_source_tracks_usage() {
        let mut source = RecordingSpriteSource::new();
        let map = source.load_map(Path::new("ui.map"), 1).unwrap();
        assert_eq!(source.resolve(&map, "a").unwrap().height(), 100);
        source.resolve(&map, "b");
        source.resolve(&map, "a");
        assert_eq!(source.used_sprites()[Path::new("ui.map")], vec!["a", "b"]);
        assert_eq!(source.sprite_url(&map, "a"), "<annotated a>");
    }

    #[test]
    fn missing_sprite_without_passthru_is_none() {
        let mut source = FileSpriteSource::new();
        let map = SpriteMap::parse(Path::new("a.map"), "logo,0,0,1,1\n", 1).unwrap();
        assert!(source.resolve(&map, "other").is_none());
    }
}
